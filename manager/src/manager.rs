//! The process-wide sandbox manager (component H): owns the lifecycle, the
//! live policy snapshot, the filtering proxy, and wrapper synthesis.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use sandbox_network_proxy::FilteringProxy;
use sandbox_network_proxy::ProxyState;
use sandbox_policy::Policy;
use sandbox_policy::PolicyInput;
use sandbox_policy::ViolationStore;
use tokio::sync::Mutex;

use crate::config::NetworkRestrictionConfig;
use crate::config::PolicyView;
use crate::config::network_restriction_config;
use crate::config::policy_view;
use crate::error::ManagerError;
use crate::platform::PlatformWrapper;

const DEFAULT_SHELL: &str = "bash";
const DEFAULT_VIOLATION_CAPACITY: usize = sandbox_policy::DEFAULT_VIOLATION_CAPACITY;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LifecycleState {
    Uninitialized,
    Configured,
    Active,
}

struct Inner {
    state: LifecycleState,
    policy: Option<Policy>,
    proxy: Option<FilteringProxy>,
    proxy_state: Option<Arc<ProxyState>>,
}

pub struct SandboxManager {
    wrapper: PlatformWrapper,
    violations: Arc<ViolationStore>,
    inner: Mutex<Inner>,
}

impl SandboxManager {
    pub fn new(profile_dir: impl Into<PathBuf>, seccomp_vendor_dir: impl Into<PathBuf>) -> Self {
        Self {
            wrapper: PlatformWrapper::new(profile_dir, seccomp_vendor_dir),
            violations: Arc::new(ViolationStore::new(DEFAULT_VIOLATION_CAPACITY)),
            inner: Mutex::new(Inner {
                state: LifecycleState::Uninitialized,
                policy: None,
                proxy: None,
                proxy_state: None,
            }),
        }
    }

    /// Idempotent up to `reset`: fails if already initialized with a
    /// different policy, no-ops if the new policy is structurally equal.
    pub async fn initialize(&self, input: PolicyInput) -> Result<(), ManagerError> {
        let policy = input.normalize()?;
        let mut guard = self.inner.lock().await;
        if guard.state != LifecycleState::Uninitialized {
            match &guard.policy {
                Some(existing) if *existing == policy => return Ok(()),
                _ => return Err(ManagerError::AlreadyInitialized),
            }
        }
        self.apply_locked(&mut guard, policy).await
    }

    /// May be called before or after `initialize`; always succeeds (subject
    /// to the policy itself being well-formed) and atomically replaces the
    /// live snapshot, starting or stopping the proxy if restriction
    /// *presence* changed.
    pub async fn update_config(&self, input: PolicyInput) -> Result<(), ManagerError> {
        let policy = input.normalize()?;
        let mut guard = self.inner.lock().await;
        self.apply_locked(&mut guard, policy).await
    }

    async fn apply_locked(&self, guard: &mut Inner, policy: Policy) -> Result<(), ManagerError> {
        let needs_proxy = policy.requires_network_proxy();
        let had_proxy = guard.proxy.is_some();

        if needs_proxy {
            if let Some(proxy_state) = &guard.proxy_state {
                let unchanged = guard
                    .policy
                    .as_ref()
                    .is_some_and(|old| old.network_fingerprint() == policy.network_fingerprint());
                if unchanged {
                    tracing::debug!("network rules unchanged, skipping proxy snapshot swap");
                } else {
                    proxy_state.update_policy(policy.clone());
                    tracing::debug!("proxy policy snapshot swapped");
                }
            } else {
                let proxy_state = Arc::new(ProxyState::new(policy.clone(), Arc::clone(&self.violations)));
                let proxy = FilteringProxy::bind(Arc::clone(&proxy_state)).await?;
                tracing::info!(port = proxy.port(), "filtering proxy started");
                guard.proxy_state = Some(proxy_state);
                guard.proxy = Some(proxy);
            }
        } else if had_proxy {
            tracing::info!("network now unrestricted, stopping filtering proxy");
            guard.proxy = None;
            guard.proxy_state = None;
        }

        guard.policy = Some(policy);
        guard.state = if guard.proxy.is_some() {
            LifecycleState::Active
        } else {
            LifecycleState::Configured
        };
        Ok(())
    }

    /// Stops the proxy, clears the snapshot and violation log, returns to
    /// `Uninitialized`.
    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.proxy = None;
        guard.proxy_state = None;
        guard.policy = None;
        guard.state = LifecycleState::Uninitialized;
        tracing::info!("sandbox manager reset");
    }

    /// Synthesizes the platform-appropriate shell invocation for `command`.
    /// `shell` defaults to `bash`; an absolute path is honored verbatim.
    pub async fn wrap_with_sandbox(
        &self,
        command: &[String],
        shell: Option<&str>,
        cwd: &Path,
    ) -> Result<String, ManagerError> {
        let guard = self.inner.lock().await;
        let policy = guard.policy.clone().unwrap_or_else(default_unrestricted_policy);
        let proxy_port = guard.proxy.as_ref().map(FilteringProxy::port);
        let shell = shell.unwrap_or(DEFAULT_SHELL);
        tracing::debug!(?proxy_port, shell, "wrapping command with sandbox");
        self.wrapper.wrap(&policy, command, shell, cwd, proxy_port)
    }

    pub async fn proxy_port(&self) -> Option<u16> {
        let guard = self.inner.lock().await;
        guard.proxy.as_ref().map(FilteringProxy::port)
    }

    pub async fn config(&self) -> Option<PolicyView> {
        let guard = self.inner.lock().await;
        guard.policy.as_ref().map(policy_view)
    }

    pub async fn network_restriction_config(&self) -> Option<NetworkRestrictionConfig> {
        let guard = self.inner.lock().await;
        guard.policy.as_ref().map(network_restriction_config)
    }

    pub fn violations(&self) -> &Arc<ViolationStore> {
        &self.violations
    }
}

fn default_unrestricted_policy() -> Policy {
    Policy::new(
        sandbox_policy::ReadRestriction::DenyOnly { deny: Vec::new() },
        None,
        sandbox_policy::NetworkRestriction::default(),
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sandbox_policy::FilesystemInput;
    use sandbox_policy::NetworkInput;
    use tempfile::TempDir;

    fn unrestricted_input() -> PolicyInput {
        PolicyInput {
            network: NetworkInput {
                allowed_domains: Vec::new(),
                denied_domains: Vec::new(),
                unrestricted_network: true,
            },
            filesystem: FilesystemInput::default(),
        }
    }

    fn restricted_input(allowed: &[&str]) -> PolicyInput {
        PolicyInput {
            network: NetworkInput {
                allowed_domains: allowed.iter().map(|s| s.to_string()).collect(),
                denied_domains: Vec::new(),
                unrestricted_network: false,
            },
            filesystem: FilesystemInput::default(),
        }
    }

    #[tokio::test]
    async fn initialize_with_unrestricted_network_starts_no_proxy() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager.initialize(unrestricted_input()).await.expect("init");
        assert_eq!(manager.proxy_port().await, None);
    }

    #[tokio::test]
    async fn initialize_with_restricted_network_starts_proxy() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager
            .initialize(restricted_input(&["example.com"]))
            .await
            .expect("init");
        assert!(manager.proxy_port().await.is_some());
    }

    #[tokio::test]
    async fn second_initialize_with_different_policy_fails() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager.initialize(unrestricted_input()).await.expect("init");
        let result = manager.initialize(restricted_input(&["example.com"])).await;
        assert!(matches!(result, Err(ManagerError::AlreadyInitialized)));
    }

    #[tokio::test]
    async fn second_initialize_with_same_policy_is_a_no_op() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager.initialize(unrestricted_input()).await.expect("init");
        manager.initialize(unrestricted_input()).await.expect("idempotent");
    }

    #[tokio::test]
    async fn update_config_preserves_port_when_restriction_presence_is_unchanged() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager
            .initialize(restricted_input(&["example.com"]))
            .await
            .expect("init");
        let port_before = manager.proxy_port().await;
        manager
            .update_config(restricted_input(&["example.com", "example.org"]))
            .await
            .expect("update");
        assert_eq!(manager.proxy_port().await, port_before);
    }

    #[tokio::test]
    async fn update_config_with_identical_network_rules_skips_policy_swap() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager
            .initialize(restricted_input(&["example.com"]))
            .await
            .expect("init");
        let port_before = manager.proxy_port().await;
        // A filesystem-only edit on top of the same allowed hosts must not
        // touch the proxy's live snapshot identity.
        manager
            .update_config(restricted_input(&["example.com"]))
            .await
            .expect("update");
        assert_eq!(manager.proxy_port().await, port_before);
    }

    #[tokio::test]
    async fn update_config_before_initialize_stores_pending_policy() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager
            .update_config(restricted_input(&["example.com"]))
            .await
            .expect("update before init");
        assert!(manager.proxy_port().await.is_some());
        let config = manager.network_restriction_config().await.expect("config");
        assert_eq!(config.allowed_hosts, Some(vec!["example.com".to_string()]));
    }

    #[tokio::test]
    async fn reset_clears_policy_and_proxy() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager
            .initialize(restricted_input(&["example.com"]))
            .await
            .expect("init");
        manager.reset().await;
        assert_eq!(manager.proxy_port().await, None);
        assert_eq!(manager.config().await, None);
    }

    #[tokio::test]
    async fn wrap_with_sandbox_defaults_shell_to_bash() {
        let dir = TempDir::new().expect("tempdir");
        let manager = SandboxManager::new(dir.path(), dir.path());
        manager.initialize(unrestricted_input()).await.expect("init");
        let invocation = manager
            .wrap_with_sandbox(&["echo".to_string(), "hi".to_string()], None, dir.path())
            .await;
        if cfg!(any(target_os = "macos", target_os = "linux")) {
            let invocation = invocation.expect("wraps");
            assert!(invocation.contains("bash -c"));
        } else {
            assert!(matches!(invocation, Err(ManagerError::PlatformUnsupported)));
        }
    }
}
