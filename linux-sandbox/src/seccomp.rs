//! Seccomp artifact resolver (component F).
//!
//! Unlike a dynamically constructed filter assembled from rules at startup,
//! the blob this resolver locates is an opaque, pre-compiled BPF program
//! staged ahead of time per CPU ABI; this crate only picks the right file
//! and hands back its path. Attaching it is the jailer's job: `bwrap.rs`
//! passes the resolved path to bubblewrap's own `--seccomp FD` flag, which
//! installs the filter inside the jailed child before it execs the user's
//! command — there is no separate in-process attachment step here.

use std::path::PathBuf;

use crate::error::LinuxSandboxError;

/// Which pre-compiled variant to stage. `Restricted` only allows `AF_UNIX`
/// plus loopback `AF_INET`/`AF_INET6`; `ProxyRouted` is the same but used
/// when a managed proxy is in play (kept distinct so future variants can
/// diverge); `allow_all_unix_sockets` exists as an escape hatch for
/// tooling that creates additional `AF_UNIX` sockets of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeccompVariant {
    Restricted,
    RestrictedAllowAllUnixSockets,
}

impl SeccompVariant {
    pub fn select(network_proxy_active: bool, allow_all_unix_sockets: bool) -> Self {
        let _ = network_proxy_active;
        if allow_all_unix_sockets {
            Self::RestrictedAllowAllUnixSockets
        } else {
            Self::Restricted
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::RestrictedAllowAllUnixSockets => "restricted-allow-unix",
        }
    }
}

/// The CPU ABI component of a blob's filename. Pre-compiled BPF programs
/// are not portable across architectures, so the resolver must pick the
/// variant matching the host.
fn current_abi() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "x86_64"
    } else if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else {
        "unknown"
    }
}

pub struct SeccompBlobResolver {
    vendor_dir: PathBuf,
}

impl SeccompBlobResolver {
    pub fn new(vendor_dir: impl Into<PathBuf>) -> Self {
        Self {
            vendor_dir: vendor_dir.into(),
        }
    }

    /// Returns the path to the staged blob for `variant` on this host's
    /// ABI, failing if no such vendored artifact exists.
    pub fn resolve(&self, variant: SeccompVariant) -> Result<PathBuf, LinuxSandboxError> {
        let path = self.blob_path(variant);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LinuxSandboxError::SeccompBlobMissing { path })
        }
    }

    fn blob_path(&self, variant: SeccompVariant) -> PathBuf {
        self.vendor_dir
            .join(format!("seccomp-{}-{}.bpf", variant.slug(), current_abi()))
    }
}
