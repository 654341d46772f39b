//! Filtering HTTP/HTTPS proxy (component G): a wait-free policy snapshot,
//! an opaque ask-callback escalation path, and a loopback TCP listener that
//! CONNECTs or splices traffic per decision.

mod connection;
mod decider;
mod error;
mod listener;
mod state;

pub use decider::AskCallback;
pub use error::ProxyError;
pub use listener::FilteringProxy;
pub use state::DEFAULT_ASK_TIMEOUT;
pub use state::Decision;
pub use state::ProxyState;
