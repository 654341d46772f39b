use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SeatbeltError {
    #[error("invalid path pattern")]
    InvalidPattern(#[from] sandbox_policy::PatternError),
    #[error("failed to write sandbox profile to {path}: {source}")]
    ProfileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sandbox-exec is only available on macOS")]
    PlatformUnsupported,
    #[error("command argument contains a NUL byte")]
    CommandEncoding,
}
