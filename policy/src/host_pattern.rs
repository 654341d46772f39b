//! Host wildcard matching.
//!
//! Semantics: `*` matches any host; `*.suffix` matches hosts with at least
//! one label before `suffix` (never the bare `suffix` itself); anything else
//! matches the exact, case-insensitive host. A pattern may pin a port with
//! `host:port`; a pattern with no port matches any port.

use std::net::IpAddr;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostPattern(String);

impl HostPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split_port(&self) -> (&str, Option<u16>) {
        split_host_port(&self.0)
    }

    /// Whether this pattern matches `(host, port)`. `host` is normalized
    /// before matching.
    pub fn matches(&self, host: &str, port: Option<u16>) -> bool {
        let (pattern_host, pattern_port) = self.split_port();
        if let Some(required) = pattern_port
            && Some(required) != port
        {
            return false;
        }
        let normalized = normalize_host(host);
        match ParsedPattern::parse(pattern_host) {
            ParsedPattern::Any => true,
            ParsedPattern::SubdomainsOnly(suffix) => is_strict_subdomain(&normalized, &suffix),
            ParsedPattern::Exact(exact) => normalized == exact,
        }
    }
}

impl std::fmt::Display for HostPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

enum ParsedPattern {
    Any,
    SubdomainsOnly(String),
    Exact(String),
}

impl ParsedPattern {
    fn parse(input: &str) -> Self {
        let lowered = input.to_ascii_lowercase();
        if lowered == "*" {
            return Self::Any;
        }
        if let Some(suffix) = lowered.strip_prefix("*.") {
            return Self::SubdomainsOnly(suffix.to_string());
        }
        Self::Exact(strip_trailing_dot(&lowered).to_string())
    }
}

fn is_strict_subdomain(candidate: &str, suffix: &str) -> bool {
    candidate != suffix && candidate.ends_with(&format!(".{suffix}"))
}

/// Lowercases, strips a trailing `:port`, strips `[...]` brackets from IPv6
/// literals, and strips a trailing dot.
pub fn normalize_host(host: &str) -> String {
    let trimmed = host.trim();
    let unbracketed = if let Some(inner) = trimmed.strip_prefix('[') {
        inner.split(']').next().unwrap_or(inner)
    } else if trimmed.parse::<IpAddr>().is_ok() {
        trimmed
    } else {
        match trimmed.rsplit_once(':') {
            Some((head, port)) if port.chars().all(|c| c.is_ascii_digit()) => head,
            _ => trimmed,
        }
    };
    strip_trailing_dot(&unbracketed.to_ascii_lowercase()).to_string()
}

fn strip_trailing_dot(host: &str) -> &str {
    host.strip_suffix('.').unwrap_or(host)
}

fn split_host_port(pattern: &str) -> (&str, Option<u16>) {
    if pattern.starts_with('[') {
        return (pattern, None);
    }
    match pattern.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (pattern, None),
        },
        None => (pattern, None),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HostPatternSet(Vec<HostPattern>);

impl HostPatternSet {
    pub fn new(patterns: impl IntoIterator<Item = HostPattern>) -> Self {
        Self(patterns.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, host: &str, port: Option<u16>) -> bool {
        self.0.iter().any(|pattern| pattern.matches(host, port))
    }

    pub fn contains_wildcard_any(&self) -> bool {
        self.0.iter().any(|pattern| pattern.as_str().trim() == "*")
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostPattern> {
        self.0.iter()
    }
}

/// Result of the synchronous allow/deny precedence in §4.3, before any
/// ask-callback escalation (which is the proxy's concern, not this crate's).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostDecision {
    Allow,
    Deny,
}

/// Applies the fixed precedence: explicit deny wins, then an allow-list
/// `*`, then an explicit allow-list match, otherwise deny.
pub fn decide_host(
    allowed_hosts: Option<&HostPatternSet>,
    denied_hosts: Option<&HostPatternSet>,
    host: &str,
    port: Option<u16>,
) -> HostDecision {
    if let Some(denied) = denied_hosts
        && denied.matches(host, port)
    {
        return HostDecision::Deny;
    }
    match allowed_hosts {
        Some(allowed) if allowed.matches(host, port) => HostDecision::Allow,
        _ => HostDecision::Deny,
    }
}
