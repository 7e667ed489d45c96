//! Realtime fan-out
//!
//! - [`hub`]: per-team publish/subscribe groups over bounded per-connection
//!   queues
//! - [`events`]: the team events published after each mutation
//! - [`protocol`]: client control messages and server replies
//! - [`session`]: handshake enrollment and control message handling, shared
//!   by any transport

pub mod events;
pub mod hub;
pub mod protocol;
pub mod session;

pub use events::TeamEvent;
pub use hub::{Connection, ConnectionHandle, FanoutHub};
pub use protocol::{ClientMessage, ServerMessage};
