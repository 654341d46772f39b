#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("policy input is invalid: {0}")]
    ConfigInvalid(#[from] sandbox_policy::PolicyError),

    #[error("manager is already initialized with a different policy; call reset() first")]
    AlreadyInitialized,

    #[error("failed to start the filtering proxy: {0}")]
    ProxyBindFailed(#[from] sandbox_network_proxy::ProxyError),

    #[error("sandboxing is not supported on this platform")]
    PlatformUnsupported,

    #[cfg(target_os = "macos")]
    #[error(transparent)]
    Seatbelt(#[from] sandbox_seatbelt::SeatbeltError),

    #[cfg(target_os = "linux")]
    #[error(transparent)]
    LinuxSandbox(#[from] sandbox_linux::LinuxSandboxError),
}
