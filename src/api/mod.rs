//! API access for the asset-management backend.
//!
//! Provides the transport seam, token storage (keychain or memory), the
//! authenticated client with single-flight refresh, and wire types.

pub mod auth;
pub mod client;
pub mod refresh;
pub mod transport;
pub mod types;
