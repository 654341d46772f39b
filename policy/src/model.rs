//! The normalized, immutable policy snapshot (component B).
//!
//! Values of [`Policy`] are only ever produced through [`Policy::new`] or
//! [`crate::input::PolicyInput::normalize`], both of which enforce the shape
//! invariants described below. Nothing downstream should need to re-validate
//! a [`Policy`] it already holds.

use crate::host_pattern::HostPatternSet;
use crate::path_pattern::PathPattern;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadRestriction {
    /// Maximally permissive: everything is readable except `deny`.
    DenyOnly { deny: Vec<PathPattern> },
    /// Maximally restrictive: only `allow` (minus `deny_within_allow`) plus
    /// the implicit system paths are readable.
    AllowOnly {
        allow: Vec<PathPattern>,
        deny_within_allow: Vec<PathPattern>,
    },
}

impl ReadRestriction {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::DenyOnly { deny } if deny.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct WriteRestriction {
    pub allow: Vec<PathPattern>,
    pub deny_within_allow: Vec<PathPattern>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Hash)]
pub struct NetworkRestriction {
    pub allowed_hosts: Option<HostPatternSet>,
    pub denied_hosts: Option<HostPatternSet>,
}

impl NetworkRestriction {
    /// Whether this restriction, taken alone (ignoring `unrestricted_network`),
    /// denies all egress: no `allowed_hosts`, or an empty one.
    pub fn denies_all(&self) -> bool {
        match &self.allowed_hosts {
            None => true,
            Some(set) => set.is_empty(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("denyRead and allowRead cannot both be supplied")]
    ConflictingReadRestriction,
}

/// A single immutable, validated policy snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    read_restriction: ReadRestriction,
    write_restriction: Option<WriteRestriction>,
    network_restriction: NetworkRestriction,
    unrestricted_network: bool,
}

impl Policy {
    pub fn new(
        read_restriction: ReadRestriction,
        write_restriction: Option<WriteRestriction>,
        network_restriction: NetworkRestriction,
        unrestricted_network: bool,
    ) -> Self {
        Self {
            read_restriction,
            write_restriction,
            network_restriction,
            unrestricted_network,
        }
    }

    pub fn read_restriction(&self) -> &ReadRestriction {
        &self.read_restriction
    }

    pub fn write_restriction(&self) -> Option<&WriteRestriction> {
        self.write_restriction.as_ref()
    }

    pub fn network_restriction(&self) -> &NetworkRestriction {
        &self.network_restriction
    }

    pub fn unrestricted_network(&self) -> bool {
        self.unrestricted_network
    }

    /// Whether a running proxy is required at all: network restriction is
    /// "in play" (not fully unrestricted) and isn't the no-op "deny nothing"
    /// shape. Per the design notes, an empty `allowed_hosts` still counts —
    /// the proxy must stay wired so a later `updateConfig` can widen access.
    pub fn requires_network_proxy(&self) -> bool {
        !self.unrestricted_network
    }

    /// Network fields compared alone, used to decide whether `updateConfig`
    /// needs to start/stop the proxy versus just swap its snapshot.
    pub fn network_presence_key(&self) -> bool {
        self.requires_network_proxy()
    }

    /// A cheap hash of just the network-affecting fields. The proxy compares
    /// this across an `updateConfig` to skip rebuilding per-connection state
    /// when the new policy's network rules are bit-for-bit identical to the
    /// old one's — filesystem-only edits are common and shouldn't pay for a
    /// snapshot swap on the proxy's hot path.
    pub fn network_fingerprint(&self) -> u64 {
        use std::hash::Hash;
        use std::hash::Hasher;
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.unrestricted_network.hash(&mut hasher);
        self.network_restriction.hash(&mut hasher);
        hasher.finish()
    }
}
