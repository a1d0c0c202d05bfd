//! Domain models for repo-guard

pub mod descriptor;

pub use descriptor::{ArtifactDescriptor, FileDescriptor, REPODATA_ARCH};
