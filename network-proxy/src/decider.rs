//! The ask-callback: an opaque asynchronous predicate over `(host, port)`,
//! consulted only when the static allow/deny rules would deny a connection.
//! Mirrors the closure-blanket-impl shape used for other policy callbacks
//! in this stack, so callers can hand the proxy either a trait object or a
//! plain async closure.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

#[async_trait]
pub trait AskCallback: Send + Sync + 'static {
    async fn ask(&self, host: &str, port: u16) -> bool;
}

#[async_trait]
impl<T> AskCallback for Arc<T>
where
    T: AskCallback + ?Sized,
{
    async fn ask(&self, host: &str, port: u16) -> bool {
        (**self).ask(host, port).await
    }
}

#[async_trait]
impl<F, Fut> AskCallback for F
where
    F: Fn(String, u16) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send,
{
    async fn ask(&self, host: &str, port: u16) -> bool {
        (self)(host.to_string(), port).await
    }
}
