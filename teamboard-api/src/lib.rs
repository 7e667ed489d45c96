//! # Teamboard API Server Library
//!
//! HTTP and WebSocket surface over the core services in `teamboard_shared`.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and the authentication layer
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Validated JSON extractor
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
