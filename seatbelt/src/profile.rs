//! SBPL profile text generation (component D).

use std::collections::BTreeSet;
use std::path::Path;

use sandbox_policy::PathPattern;
use sandbox_policy::Policy;
use sandbox_policy::ReadRestriction;
use sandbox_policy::WriteRestriction;

use crate::base_policy::BASE_POLICY;
use crate::error::SeatbeltError;

/// Renders the full SBPL profile for `policy`. `proxy_port`, when present,
/// is the loopback port sandboxed network traffic is redirected to;
/// `cwd` is implicitly readable when reads are restricted to an allow-list.
pub fn build_profile(
    policy: &Policy,
    proxy_port: Option<u16>,
    cwd: &Path,
) -> Result<String, SeatbeltError> {
    let implicit_system_paths = implicit_system_paths(cwd);

    let (read_policy, read_protect) =
        build_read_policy(policy.read_restriction(), &implicit_system_paths)?;
    let (write_policy, write_protect) = build_write_policy(policy.write_restriction())?;
    let network_policy = build_network_policy(policy, proxy_port);

    let mut protected = read_protect;
    protected.extend(write_protect);
    let unlink_policy = build_ancestor_unlink_policy(&protected)?;

    Ok(format!(
        "{BASE_POLICY}\n{network_policy}\n{read_policy}\n{write_policy}\n{unlink_policy}"
    ))
}

fn implicit_system_paths(cwd: &Path) -> Vec<PathPattern> {
    let mut paths: Vec<PathPattern> = [
        "/bin",
        "/usr",
        "/etc",
        "/private/etc",
        "/dev/null",
        "/dev/zero",
        "/dev/urandom",
        "/System/Library",
        "/Library/Developer",
    ]
    .into_iter()
    .map(PathPattern::new)
    .collect();
    paths.push(PathPattern::new(cwd.to_string_lossy().into_owned()));
    if let Some(cache_dir) = crate::macos_dirs::darwin_user_cache_dir() {
        paths.push(PathPattern::new(cache_dir.to_string_lossy().into_owned()));
    }
    paths
}

fn path_clause(pattern: &PathPattern) -> Result<String, SeatbeltError> {
    if pattern.is_glob() {
        let regex = pattern.to_regex()?;
        Ok(format!("(regex #\"{}\")", regex.as_str()))
    } else {
        Ok(format!("(subpath \"{}\")", pattern.as_str()))
    }
}

fn rule(action: &str, class: &str, clauses: &[String]) -> String {
    if clauses.is_empty() {
        return String::new();
    }
    let body = clauses
        .iter()
        .map(|clause| format!("    {clause}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("({action} {class}\n{body})\n")
}

/// Returns the generated policy text plus the set of patterns that must be
/// protected by the ancestor write-unlink defense (§4.4).
fn build_read_policy(
    restriction: &ReadRestriction,
    implicit_system_paths: &[PathPattern],
) -> Result<(String, Vec<PathPattern>), SeatbeltError> {
    match restriction {
        ReadRestriction::DenyOnly { deny } => {
            let mut out = String::from("(allow file-read*)\n");
            let clauses = deny
                .iter()
                .map(path_clause)
                .collect::<Result<Vec<_>, _>>()?;
            out.push_str(&rule("deny", "file-read*", &clauses));
            Ok((out, deny.clone()))
        }
        ReadRestriction::AllowOnly {
            allow,
            deny_within_allow,
        } => {
            let mut out = String::from("(deny file-read*)\n");
            let mut effective_allow = allow.clone();
            effective_allow.extend(implicit_system_paths.iter().cloned());
            let allow_clauses = effective_allow
                .iter()
                .map(path_clause)
                .collect::<Result<Vec<_>, _>>()?;
            out.push_str(&rule("allow", "file-read*", &allow_clauses));
            let deny_clauses = deny_within_allow
                .iter()
                .map(path_clause)
                .collect::<Result<Vec<_>, _>>()?;
            out.push_str(&rule("deny", "file-read*", &deny_clauses));
            Ok((out, deny_within_allow.clone()))
        }
    }
}

fn build_write_policy(
    restriction: Option<&WriteRestriction>,
) -> Result<(String, Vec<PathPattern>), SeatbeltError> {
    let Some(restriction) = restriction else {
        return Ok(("(deny file-write*)\n".to_string(), Vec::new()));
    };
    let mut out = String::from("(deny file-write*)\n");
    let allow_clauses = restriction
        .allow
        .iter()
        .map(path_clause)
        .collect::<Result<Vec<_>, _>>()?;
    out.push_str(&rule("allow", "file-write*", &allow_clauses));
    let deny_clauses = restriction
        .deny_within_allow
        .iter()
        .map(path_clause)
        .collect::<Result<Vec<_>, _>>()?;
    out.push_str(&rule("deny", "file-write*", &deny_clauses));
    Ok((out, restriction.deny_within_allow.clone()))
}

fn build_network_policy(policy: &Policy, proxy_port: Option<u16>) -> String {
    if policy.unrestricted_network() {
        return "(allow network*)\n".to_string();
    }
    match proxy_port {
        Some(port) => format!(
            "(deny network-outbound)\n(deny network-inbound)\n\
(allow network-outbound (remote tcp \"localhost:{port}\"))\n\
(allow network-outbound (remote unix))\n\
(allow mach-lookup (global-name \"com.apple.SystemConfiguration.configd\"))\n"
        ),
        // No proxy listening yet: fail closed rather than leave a hole.
        None => "(deny network-outbound)\n(deny network-inbound)\n".to_string(),
    }
}

/// Emits `file-write-unlink` deny rules for every pattern's literal prefix
/// and every ancestor of that prefix up to `/`. This is what stops an
/// attacker from `mv`-ing a protected path (or one of its ancestor
/// directories) somewhere readable, since Seatbelt's `file-read*` class
/// does not cover `rename(2)`.
fn build_ancestor_unlink_policy(patterns: &[PathPattern]) -> Result<String, SeatbeltError> {
    let mut dirs: BTreeSet<String> = BTreeSet::new();
    for pattern in patterns {
        for ancestor in pattern.ancestors() {
            dirs.insert(ancestor.to_string_lossy().into_owned());
        }
    }
    if dirs.is_empty() {
        return Ok(String::new());
    }
    let clauses: Vec<String> = dirs
        .into_iter()
        .map(|dir| format!("(subpath \"{dir}\")"))
        .collect();
    Ok(rule("deny", "file-write-unlink", &clauses))
}
