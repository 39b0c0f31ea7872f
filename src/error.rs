//! Error types for the macvlan driver core.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Main error type for the macvlan driver core.
///
/// Every variant describes a local, recoverable condition; nothing here is
/// fatal to the driver process.
#[derive(Error, Debug)]
pub enum DriverError {
    // Identifier validation errors
    #[error("invalid network id: {id:?}")]
    InvalidNetworkId { id: String },

    #[error("invalid endpoint id: {id:?}")]
    InvalidEndpointId { id: String },

    // Lookup errors
    #[error("network not found: {id}")]
    NetworkNotFound { id: String },

    // Configuration errors
    #[error("invalid value for network option {option}: {reason}")]
    InvalidNetworkOption { option: String, reason: String },

    #[error("invalid subnet {subnet:?} for network {network}")]
    InvalidSubnet { network: String, subnet: String },

    // Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
