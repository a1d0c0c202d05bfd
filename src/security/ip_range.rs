//! IPv4 range expressions
//!
//! An [`IpRange`] is parsed once from configuration and then only queried.
//! Three forms are accepted:
//!
//! ```text
//! 10.0.0.0/24              CIDR block
//! 192.168.1.10             single address (same as /32)
//! 10.1.0.10-10.1.0.20      inclusive range
//! ```
//!
//! Matching is numeric over the 32-bit address space.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::config::{comma_delimited_list, ConfigError};
use crate::error::IpRangeError;

/// An immutable, inclusive range of IPv4 addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRange {
    first: u32,
    last: u32,
    canonical: String,
}

impl IpRange {
    /// Parse a range expression
    pub fn parse(expression: &str) -> Result<Self, IpRangeError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(IpRangeError::Empty);
        }

        if let Some((base, prefix)) = expression.split_once('/') {
            return Self::parse_cidr(base.trim(), prefix.trim());
        }

        if let Some((start, end)) = expression.split_once('-') {
            let first = parse_address(start.trim())?;
            let last = parse_address(end.trim())?;
            if first > last {
                return Err(IpRangeError::InvertedRange(expression.to_string()));
            }
            return Ok(Self {
                first,
                last,
                canonical: format!("{}-{}", Ipv4Addr::from(first), Ipv4Addr::from(last)),
            });
        }

        let address = parse_address(expression)?;
        Ok(Self {
            first: address,
            last: address,
            canonical: Ipv4Addr::from(address).to_string(),
        })
    }

    /// Parse a comma-delimited list of range expressions
    ///
    /// `setting` names the configuration key in the error for a malformed
    /// entry. A blank list yields no ranges.
    pub fn parse_list(value: &str, setting: &str) -> Result<Vec<Self>, ConfigError> {
        comma_delimited_list(value)
            .iter()
            .map(|expression| {
                Self::parse(expression).map_err(|e| {
                    ConfigError::InvalidValue(format!(
                        "{} entry '{}': {}",
                        setting, expression, e
                    ))
                })
            })
            .collect()
    }

    fn parse_cidr(base: &str, prefix: &str) -> Result<Self, IpRangeError> {
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|_| IpRangeError::InvalidPrefix(prefix.to_string()))?;
        if prefix_len > 32 {
            return Err(IpRangeError::InvalidPrefix(prefix.to_string()));
        }

        let mask = if prefix_len == 0 {
            0
        } else {
            !0u32 << (32 - prefix_len)
        };
        let network = parse_address(base)? & mask;

        Ok(Self {
            first: network,
            last: network | !mask,
            canonical: format!("{}/{}", Ipv4Addr::from(network), prefix_len),
        })
    }

    /// Check whether a textual address lies within this range
    ///
    /// Anything that is not a dotted-decimal IPv4 address (including IPv6)
    /// is reported as outside the range.
    pub fn is_in(&self, ip: &str) -> bool {
        match ip.trim().parse::<Ipv4Addr>() {
            Ok(addr) => self.contains(addr),
            Err(_) => false,
        }
    }

    /// Check whether an address lies within this range
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let value = u32::from(ip);
        self.first <= value && value <= self.last
    }

    /// Check whether a socket address lies within this range
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are checked as their
    /// IPv4 form; other IPv6 addresses never match.
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.contains(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(false, |v4| self.contains(v4)),
        }
    }

    /// Lowest address in the range
    pub fn first(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.first)
    }

    /// Highest address in the range
    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.last)
    }
}

impl FromStr for IpRange {
    type Err = IpRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

fn parse_address(text: &str) -> Result<u32, IpRangeError> {
    text.parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| IpRangeError::InvalidAddress(text.to_string()))
}
