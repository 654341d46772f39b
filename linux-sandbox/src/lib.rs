//! Linux enforcement: bubblewrap-based mount namespace jailing (component
//! E) plus the seccomp artifact resolver (component F).

mod bwrap;
mod error;
mod seccomp;

pub use bwrap::BwrapWrapper;
pub use error::LinuxSandboxError;
pub use seccomp::SeccompBlobResolver;
pub use seccomp::SeccompVariant;
