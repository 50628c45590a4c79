//! Client library and CLI for a digital-asset-management backend.
//!
//! Authenticated API access with transparent token refresh, a read-through
//! query cache, direct-to-storage uploads and role-based permission checks.

pub mod api;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod library;
pub mod permissions;
pub mod state;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
