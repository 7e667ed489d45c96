//! Authentication and authorization
//!
//! # Modules
//!
//! - [`jwt`]: HS256 token validation (and minting, for development tooling)
//! - [`identity`]: Resolving a credential into a verified [`identity::Identity`]
//! - [`authorization`]: Membership and role checks against the store
//!
//! # Example
//!
//! ```
//! use teamboard_shared::auth::identity::{IdentityResolver, JwtIdentityResolver};
//! use teamboard_shared::auth::jwt::{create_token, Claims};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let secret = "development-secret-at-least-32-bytes";
//! let token = create_token(
//!     &Claims::new(Uuid::new_v4(), "dev@example.com", None, "teamboard"),
//!     secret,
//! )?;
//!
//! let resolver = JwtIdentityResolver::new(secret, "teamboard");
//! let identity = resolver.resolve(&token).await?;
//! println!("Resolved {}", identity.display_name());
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod identity;
pub mod jwt;
