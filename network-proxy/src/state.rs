//! The proxy's per-connection decision state: a wait-free policy snapshot
//! plus the violation log and optional ask-callback.
//!
//! The snapshot is held in an [`arc_swap::ArcSwap`] rather than a
//! `tokio::sync::RwLock` — reads on the connection hot path never block
//! behind an `updateConfig` writer, satisfying the "atomic pointer swap or
//! equivalent" requirement for the proxy's decision path.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use sandbox_policy::HostDecision;
use sandbox_policy::Policy;
use sandbox_policy::Violation;
use sandbox_policy::ViolationArgs;
use sandbox_policy::ViolationKind;
use sandbox_policy::ViolationStore;
use sandbox_policy::decide_host;

use crate::decider::AskCallback;

pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ProxyState {
    policy: ArcSwap<Policy>,
    violations: Arc<ViolationStore>,
    ask_callback: Option<Arc<dyn AskCallback>>,
    ask_timeout: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl ProxyState {
    pub fn new(policy: Policy, violations: Arc<ViolationStore>) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            violations,
            ask_callback: None,
            ask_timeout: DEFAULT_ASK_TIMEOUT,
        }
    }

    pub fn with_ask_callback(mut self, callback: Arc<dyn AskCallback>) -> Self {
        self.ask_callback = Some(callback);
        self
    }

    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = timeout;
        self
    }

    /// Wait-free read of the current policy snapshot.
    pub fn current_policy(&self) -> arc_swap::Guard<Arc<Policy>> {
        self.policy.load()
    }

    /// Replaces the live snapshot atomically; in-flight decisions that
    /// already loaded the old snapshot are unaffected.
    pub fn update_policy(&self, policy: Policy) {
        self.policy.store(Arc::new(policy));
        tracing::debug!("proxy policy snapshot updated");
    }

    pub fn violations(&self) -> &Arc<ViolationStore> {
        &self.violations
    }

    /// Evaluates `(host, port)` against the current snapshot, escalating to
    /// the ask callback (if any) when the static rules would deny. A denied
    /// outcome is recorded in the violation log with `reason`.
    pub async fn decide(&self, host: &str, port: u16, reason_prefix: &str) -> Decision {
        let policy = self.current_policy();
        if policy.unrestricted_network() {
            return Decision::Allow;
        }
        let restriction = policy.network_restriction();
        let static_decision = decide_host(
            restriction.allowed_hosts.as_ref(),
            restriction.denied_hosts.as_ref(),
            host,
            Some(port),
        );
        let allowed = match static_decision {
            HostDecision::Allow => true,
            HostDecision::Deny => match &self.ask_callback {
                Some(callback) => {
                    tokio::time::timeout(self.ask_timeout, callback.ask(host, port))
                        .await
                        .unwrap_or(false)
                }
                None => false,
            },
        };

        if allowed {
            tracing::debug!(host, port, "network request allowed");
            Decision::Allow
        } else {
            tracing::warn!(host, port, %reason_prefix, "network request denied");
            self.violations.record(Violation::new(ViolationArgs {
                kind: ViolationKind::Network,
                target: format!("{host}:{port}"),
                matched_rule: None,
                process_hint: Some(reason_prefix.to_string()),
            }));
            Decision::Deny
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sandbox_policy::HostPattern;
    use sandbox_policy::HostPatternSet;
    use sandbox_policy::NetworkRestriction;
    use sandbox_policy::ReadRestriction;

    fn policy_with_allowed(hosts: &[&str]) -> Policy {
        Policy::new(
            ReadRestriction::DenyOnly { deny: Vec::new() },
            None,
            NetworkRestriction {
                allowed_hosts: Some(HostPatternSet::new(
                    hosts.iter().map(|h| HostPattern::new(*h)),
                )),
                denied_hosts: None,
            },
            false,
        )
    }

    #[tokio::test]
    async fn allows_host_matching_allow_list() {
        let state = ProxyState::new(
            policy_with_allowed(&["example.com"]),
            Arc::new(ViolationStore::new(8)),
        );
        assert_eq!(
            state.decide("example.com", 443, "test").await,
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn denies_and_records_violation_for_unmatched_host() {
        let store = Arc::new(ViolationStore::new(8));
        let state = ProxyState::new(policy_with_allowed(&["example.com"]), store.clone());
        assert_eq!(
            state.decide("evil.example", 443, "test").await,
            Decision::Deny
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn ask_callback_overrides_deny_when_true() {
        let store = Arc::new(ViolationStore::new(8));
        let state = ProxyState::new(policy_with_allowed(&[]), store)
            .with_ask_callback(Arc::new(|_host: String, _port: u16| async { true }));
        assert_eq!(
            state.decide("anything.example", 80, "test").await,
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn update_policy_takes_effect_on_next_decision() {
        let state = ProxyState::new(policy_with_allowed(&[]), Arc::new(ViolationStore::new(8)));
        assert_eq!(
            state.decide("example.com", 443, "test").await,
            Decision::Deny
        );
        state.update_policy(policy_with_allowed(&["example.com"]));
        assert_eq!(
            state.decide("example.com", 443, "test").await,
            Decision::Allow
        );
    }
}
