//! Access control for protected repositories
//!
//! This module provides:
//! - IPv4 range expressions for the IP whitelist
//! - Remote host identity classification
//! - The protected repository access filter

pub mod filter;
pub mod host_name;
pub mod ip_range;

pub use filter::{CallOrigin, ProtectedRepoFilter};
pub use host_name::HostName;
pub use ip_range::IpRange;
