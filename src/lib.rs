//! repo-guard - Access control for protected package repositories
//!
//! This crate decides whether a repository artifact may be served to a
//! remote client, and exposes that decision over HTTP for fronting proxies.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod security;
pub mod server;
