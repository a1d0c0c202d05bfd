//! Protected repository access filter
//!
//! Decides whether a requested artifact may be served to a remote client.
//! Only repositories registered as protected are restricted; for those, a
//! web request is allowed when either:
//!
//! - the client is a literal IP inside one of the white-listed ranges, or
//! - the client is a hostname whose short name occurs in the file name.
//!
//! Repository metadata (`repodata`) and internal calls are never restricted.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info};

use crate::config::{comma_delimited_list, ConfigError, SecurityConfig};
use crate::error::AccessError;
use crate::models::ArtifactDescriptor;

use super::host_name::HostName;
use super::ip_range::IpRange;

/// Where an access check originates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOrigin {
    /// In-process call such as propagation; there is no remote client
    Internal,
    /// Request that crossed the network boundary, with the identity the
    /// hosting layer resolved for it (if any)
    Web(Option<HostName>),
}

impl CallOrigin {
    /// Web call with a resolved identity
    pub fn web(host: HostName) -> Self {
        CallOrigin::Web(Some(host))
    }

    pub fn is_web_call(&self) -> bool {
        matches!(self, CallOrigin::Web(_))
    }
}

/// Access filter for protected repositories
///
/// Thread-safe: one instance is shared by all request handlers. The
/// protected set is behind a `RwLock` held only for a single lookup or
/// insert; the IP whitelist never changes after construction.
#[derive(Debug)]
pub struct ProtectedRepoFilter {
    protected_repos: RwLock<HashSet<String>>,
    white_listed_ip_ranges: Vec<IpRange>,
}

impl ProtectedRepoFilter {
    /// Build a filter from comma-delimited configuration values
    ///
    /// A malformed IP range is a configuration error: the service must not
    /// start with an ambiguous whitelist.
    pub fn new(protected_repos: &str, white_listed_ip_ranges: &str) -> Result<Self, ConfigError> {
        let protected_repos: HashSet<String> =
            comma_delimited_list(protected_repos).into_iter().collect();

        let white_listed_ip_ranges = IpRange::parse_list(
            white_listed_ip_ranges,
            "protected_repo_white_listed_ip_ranges",
        )?;

        info!(
            protected_repos = protected_repos.len(),
            white_listed_ip_ranges = white_listed_ip_ranges.len(),
            "Protected repository filter initialized"
        );

        Ok(Self {
            protected_repos: RwLock::new(protected_repos),
            white_listed_ip_ranges,
        })
    }

    /// Build a filter from the `security` configuration section
    pub fn from_config(config: &SecurityConfig) -> Result<Self, ConfigError> {
        Self::new(
            &config.protected_repos,
            &config.protected_repo_white_listed_ip_ranges,
        )
    }

    /// Whether artifacts of `repo` may be propagated to other nodes
    ///
    /// Protected repositories are never propagated.
    pub fn is_allowed_propagation_repo(&self, repo: &str) -> bool {
        !self.is_protected(repo)
    }

    /// Decide whether `descriptor` may be served for a call from `origin`
    ///
    /// Returns `Err` only when a web call reaches the protected branch
    /// without any resolved identity, which means the hosting layer broke
    /// its contract. Callers should answer that with a server error.
    pub fn is_allowed<D>(&self, descriptor: &D, origin: &CallOrigin) -> Result<bool, AccessError>
    where
        D: ArtifactDescriptor + ?Sized,
    {
        let remote = match origin {
            CallOrigin::Internal => return Ok(true),
            CallOrigin::Web(remote) => remote,
        };

        if descriptor.is_repodata() || !self.is_protected(descriptor.repo()) {
            debug!(repo = %descriptor.repo(), arch = %descriptor.arch(), "...allowed.");
            return Ok(true);
        }

        let remote = remote.as_ref().ok_or_else(|| {
            AccessError::MissingRemoteIdentity(format!(
                "{}/{}/{}",
                descriptor.repo(),
                descriptor.arch(),
                descriptor.filename()
            ))
        })?;

        info!(
            remote = %remote,
            repo = %descriptor.repo(),
            arch = %descriptor.arch(),
            filename = %descriptor.filename(),
            "check access permission"
        );

        let allowed = match remote {
            HostName::Ip(ip) => {
                debug!("..is IP...");
                let allowed = self.is_allowed_ip(*ip);
                if !allowed {
                    info!(remote = %remote, "... ip not in whitelist: deny");
                }
                allowed
            }
            HostName::Name(_) => {
                let allowed = descriptor.filename().contains(&remote.short_name());
                if !allowed {
                    info!(remote = %remote, "... not ip, not matching: deny");
                }
                allowed
            }
            HostName::Unresolved(_) => {
                info!(remote = %remote, "... identity unresolved: deny");
                false
            }
        };

        if allowed {
            debug!("...allowed.");
        }
        Ok(allowed)
    }

    /// Whether `ip` lies in any white-listed range
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are checked as their
    /// IPv4 form; other IPv6 addresses never match.
    pub fn is_allowed_ip(&self, ip: IpAddr) -> bool {
        self.white_listed_ip_ranges
            .iter()
            .any(|range| range.contains_ip(ip))
    }

    /// Register `repo` as protected
    ///
    /// Idempotent. Returns `true` if the repository was not protected before.
    pub fn add_protected_repo(&self, repo: impl Into<String>) -> bool {
        let repo = repo.into();
        let added = self
            .protected_repos
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repo.clone());
        if added {
            info!(repo = %repo, "Protected repository added");
        }
        added
    }

    /// Snapshot of the protected repositories
    pub fn protected_repos(&self) -> HashSet<String> {
        self.protected_repos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The configured IP whitelist
    pub fn white_listed_ip_ranges(&self) -> &[IpRange] {
        &self.white_listed_ip_ranges
    }

    fn is_protected(&self, repo: &str) -> bool {
        self.protected_repos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(repo)
    }
}
