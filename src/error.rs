//! Application error types for repo-guard
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::config::ConfigError;

/// IP range expression parsing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpRangeError {
    /// Expression was empty after trimming
    #[error("Empty IP range expression")]
    Empty,

    /// An address part is not a dotted-decimal IPv4 address
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    /// CIDR prefix length is not a number in 0..=32
    #[error("Invalid prefix length: {0}")]
    InvalidPrefix(String),

    /// Dashed range whose start lies after its end
    #[error("Range start is after range end: {0}")]
    InvertedRange(String),
}

/// Request parsing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Path is not of the form `repo/arch/filename`
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Access decision errors
///
/// These never mean "deny": they signal that the decision could not be
/// made because a collaborator broke its contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// A web call reached the protected branch without a resolved remote identity
    #[error("Remote identity missing for web request to {0}")]
    MissingRemoteIdentity(String),
}

/// Application-level error type
///
/// This is the main error type used throughout the application.
/// It aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IP range error
    #[error("IP range error: {0}")]
    IpRange(#[from] IpRangeError),

    /// Access decision error
    #[error("Access error: {0}")]
    Access(#[from] AccessError),
}
