//! Getter-facing views over a [`sandbox_policy::Policy`].
//!
//! Per the getter normalization rule, an empty filesystem collection surfaces
//! as `None` rather than `Some(vec![])` — the caller sees "nothing
//! configured" rather than an empty list to iterate. Network host lists are
//! the one exception: an empty allow-list is a meaningful "deny all" state
//! distinct from "no restriction at all", so `NetworkRestrictionConfig`
//! preserves `Some(vec![])` as stored.

use sandbox_policy::Policy;
use sandbox_policy::ReadRestriction;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyView {
    pub deny_read: Option<Vec<String>>,
    pub allow_read: Option<Vec<String>>,
    pub deny_read_within_allow: Option<Vec<String>>,
    pub allow_write: Option<Vec<String>>,
    pub deny_write: Option<Vec<String>>,
    pub unrestricted_network: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkRestrictionConfig {
    pub allowed_hosts: Option<Vec<String>>,
    pub denied_hosts: Option<Vec<String>>,
    pub unrestricted_network: bool,
}

fn normalize(values: &[sandbox_policy::PathPattern]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().map(|p| p.as_str().to_string()).collect())
    }
}

pub fn policy_view(policy: &Policy) -> PolicyView {
    let (deny_read, allow_read, deny_read_within_allow) = match policy.read_restriction() {
        ReadRestriction::DenyOnly { deny } => (normalize(deny), None, None),
        ReadRestriction::AllowOnly {
            allow,
            deny_within_allow,
        } => (None, normalize(allow), normalize(deny_within_allow)),
    };

    let (allow_write, deny_write) = match policy.write_restriction() {
        Some(write) => (normalize(&write.allow), normalize(&write.deny_within_allow)),
        None => (None, None),
    };

    PolicyView {
        deny_read,
        allow_read,
        deny_read_within_allow,
        allow_write,
        deny_write,
        unrestricted_network: policy.unrestricted_network(),
    }
}

pub fn network_restriction_config(policy: &Policy) -> NetworkRestrictionConfig {
    let restriction = policy.network_restriction();
    NetworkRestrictionConfig {
        allowed_hosts: restriction
            .allowed_hosts
            .as_ref()
            .map(|set| set.iter().map(|h| h.as_str().to_string()).collect()),
        denied_hosts: restriction
            .denied_hosts
            .as_ref()
            .map(|set| set.iter().map(|h| h.as_str().to_string()).collect()),
        unrestricted_network: policy.unrestricted_network(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sandbox_policy::HostPattern;
    use sandbox_policy::HostPatternSet;
    use sandbox_policy::NetworkRestriction;
    use sandbox_policy::PathPattern;

    #[test]
    fn empty_write_restriction_surfaces_as_absent() {
        let policy = Policy::new(
            ReadRestriction::DenyOnly {
                deny: Vec::new(),
            },
            None,
            NetworkRestriction::default(),
            true,
        );
        let view = policy_view(&policy);
        assert_eq!(view.deny_read, None);
        assert_eq!(view.allow_write, None);
    }

    #[test]
    fn non_empty_deny_read_surfaces_as_list() {
        let policy = Policy::new(
            ReadRestriction::DenyOnly {
                deny: vec![PathPattern::new("/etc/shadow")],
            },
            None,
            NetworkRestriction::default(),
            true,
        );
        let view = policy_view(&policy);
        assert_eq!(view.deny_read, Some(vec!["/etc/shadow".to_string()]));
    }

    #[test]
    fn empty_allowed_hosts_stays_some_empty_to_mean_deny_all() {
        let policy = Policy::new(
            ReadRestriction::DenyOnly { deny: Vec::new() },
            None,
            NetworkRestriction {
                allowed_hosts: Some(HostPatternSet::new(Vec::<HostPattern>::new())),
                denied_hosts: None,
            },
            false,
        );
        let config = network_restriction_config(&policy);
        assert_eq!(config.allowed_hosts, Some(Vec::new()));
        assert_eq!(config.denied_hosts, None);
    }
}
