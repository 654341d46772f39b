use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LinuxSandboxError {
    #[error("invalid path pattern")]
    InvalidPattern(#[from] sandbox_policy::PatternError),
    #[error("seccomp blob not found at {path} for this CPU ABI; expected a vendored artifact")]
    SeccompBlobMissing { path: PathBuf },
    #[error("command argument contains a NUL byte")]
    CommandEncoding,
    #[error("bubblewrap is only available on Linux")]
    PlatformUnsupported,
}
