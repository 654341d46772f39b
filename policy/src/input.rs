//! Wire-facing policy DTOs and their normalization into a [`Policy`].
//!
//! These types describe the shape the (external) declarative config loader
//! hands off once it has already parsed and schema-validated a config file;
//! `normalize` performs the structural validation this crate is responsible
//! for, not file parsing.

use serde::Deserialize;

use crate::host_pattern::HostPattern;
use crate::host_pattern::HostPatternSet;
use crate::model::NetworkRestriction;
use crate::model::Policy;
use crate::model::PolicyError;
use crate::model::ReadRestriction;
use crate::model::WriteRestriction;
use crate::path_pattern::PathPattern;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInput {
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub denied_domains: Vec<String>,
    #[serde(default)]
    pub unrestricted_network: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemInput {
    #[serde(default)]
    pub deny_read: Option<Vec<String>>,
    #[serde(default)]
    pub allow_read: Option<Vec<String>>,
    #[serde(default)]
    pub deny_read_within_allow: Vec<String>,
    #[serde(default)]
    pub allow_write: Vec<String>,
    #[serde(default)]
    pub deny_write: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInput {
    #[serde(default)]
    pub network: NetworkInput,
    #[serde(default)]
    pub filesystem: FilesystemInput,
}

impl PolicyInput {
    /// Validates shape invariants and produces an immutable [`Policy`].
    ///
    /// `denyRead` and `allowRead` are mutually exclusive; supplying both is
    /// rejected here rather than silently picking one.
    pub fn normalize(self) -> Result<Policy, PolicyError> {
        let read_restriction = match (self.filesystem.deny_read, self.filesystem.allow_read) {
            (Some(_), Some(_)) => return Err(PolicyError::ConflictingReadRestriction),
            (Some(deny), None) => ReadRestriction::DenyOnly {
                deny: to_patterns(deny),
            },
            (None, Some(allow)) => ReadRestriction::AllowOnly {
                allow: to_patterns(allow),
                deny_within_allow: to_patterns(self.filesystem.deny_read_within_allow),
            },
            (None, None) => ReadRestriction::DenyOnly { deny: Vec::new() },
        };

        let write_restriction = if self.filesystem.allow_write.is_empty()
            && self.filesystem.deny_write.is_empty()
        {
            None
        } else {
            Some(WriteRestriction {
                allow: to_patterns(self.filesystem.allow_write),
                deny_within_allow: to_patterns(self.filesystem.deny_write),
            })
        };

        let network_restriction = NetworkRestriction {
            allowed_hosts: Some(HostPatternSet::new(to_hosts(self.network.allowed_domains))),
            denied_hosts: Some(HostPatternSet::new(to_hosts(self.network.denied_domains))),
        };

        Ok(Policy::new(
            read_restriction,
            write_restriction,
            network_restriction,
            self.network.unrestricted_network,
        ))
    }
}

fn to_patterns(raw: Vec<String>) -> Vec<PathPattern> {
    raw.into_iter().map(PathPattern::new).collect()
}

fn to_hosts(raw: Vec<String>) -> Vec<HostPattern> {
    raw.into_iter().map(HostPattern::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn conflicting_read_restriction_is_rejected() {
        let input = PolicyInput {
            filesystem: FilesystemInput {
                deny_read: Some(vec!["/a".to_string()]),
                allow_read: Some(vec!["/b".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            input.normalize(),
            Err(PolicyError::ConflictingReadRestriction)
        );
    }

    #[test]
    fn empty_filesystem_input_yields_unrestricted_read() {
        let policy = PolicyInput::default().normalize().expect("valid input");
        assert!(policy.read_restriction().is_unrestricted());
        assert!(policy.write_restriction().is_none());
    }

    #[test]
    fn empty_allowed_domains_without_unrestricted_flag_denies_all_network() {
        let policy = PolicyInput::default().normalize().expect("valid input");
        assert!(policy.network_restriction().denies_all());
        assert!(!policy.unrestricted_network());
        assert!(policy.requires_network_proxy());
    }

    #[test]
    fn unrestricted_network_flag_is_propagated() {
        let input = PolicyInput {
            network: NetworkInput {
                unrestricted_network: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let policy = input.normalize().expect("valid input");
        assert!(policy.unrestricted_network());
        assert!(!policy.requires_network_proxy());
    }

    #[test]
    fn allow_write_populates_write_restriction() {
        let input = PolicyInput {
            filesystem: FilesystemInput {
                allow_write: vec!["/tmp".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let policy = input.normalize().expect("valid input");
        let write = policy.write_restriction().expect("write restriction set");
        assert_eq!(write.allow.len(), 1);
    }
}
