//! Zvuk API integration.
//!
//! # Architecture
//!
//! - **DTOs** (`dto.rs`) - exact response shapes
//! - **Adapter** (`adapter.rs`) - converts DTOs to `crate::model` records
//! - **Client** (`client.rs`) - typed calls on top of [`crate::transport`]
//!
//! Absence of the `result` wrapper, or of the id looked up inside it, is
//! reported as [`ServiceError::NotFound`] and never retried.

mod adapter;
mod client;
pub mod dto;

pub use client::{PlaylistBundle, ReleaseBundle, ServiceClient};

use crate::transport::TransportError;

/// Errors from typed service calls
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Malformed response from {endpoint}: {reason}")]
    Malformed {
        endpoint: &'static str,
        reason: String,
    },
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        Self::NotFound { kind, id }
    }
}
