//! Shared policy model: normalized policy snapshots, path and host pattern
//! matching, and the bounded violation log. Platform-specific enforcement
//! builders (`sandbox-seatbelt`, `sandbox-linux`) and the filtering proxy
//! (`sandbox-network-proxy`) all depend on this crate rather than on each
//! other.

mod host_pattern;
mod input;
mod model;
mod path_pattern;
mod violation;

pub use host_pattern::HostDecision;
pub use host_pattern::HostPattern;
pub use host_pattern::HostPatternSet;
pub use host_pattern::decide_host;
pub use host_pattern::normalize_host;
pub use input::FilesystemInput;
pub use input::NetworkInput;
pub use input::PolicyInput;
pub use model::NetworkRestriction;
pub use model::Policy;
pub use model::PolicyError;
pub use model::ReadRestriction;
pub use model::WriteRestriction;
pub use path_pattern::PathPattern;
pub use path_pattern::PatternError;
pub use path_pattern::ancestors_of;
pub use path_pattern::glob_to_regex;
pub use path_pattern::is_glob;
pub use violation::DEFAULT_VIOLATION_CAPACITY;
pub use violation::Violation;
pub use violation::ViolationArgs;
pub use violation::ViolationKind;
pub use violation::ViolationStore;
