use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("failed to bind proxy listener: {0}")]
    Bind(#[source] io::Error),

    #[error("failed to read local proxy address: {0}")]
    LocalAddr(#[source] io::Error),
}
