//! User-namespace jailer invocation builder (component E).
//!
//! Mount-arg order matters: bubblewrap applies `--bind`/`--ro-bind`/`--tmpfs`
//! in the order given and later mounts shadow earlier ones at the same
//! path, so every builder below lays down the permissive mounts first and
//! the restricting ones last.

use std::path::Path;
use std::path::PathBuf;

use sandbox_policy::PathPattern;
use sandbox_policy::Policy;
use sandbox_policy::ReadRestriction;

use crate::error::LinuxSandboxError;
use crate::seccomp::SeccompBlobResolver;
use crate::seccomp::SeccompVariant;

const IMPLICIT_SYSTEM_DIRS: &[&str] = &["/bin", "/usr", "/etc", "/lib", "/lib64", "/sbin"];

pub struct BwrapWrapper {
    seccomp_resolver: SeccompBlobResolver,
}

impl BwrapWrapper {
    pub fn new(seccomp_vendor_dir: impl Into<PathBuf>) -> Self {
        Self {
            seccomp_resolver: SeccompBlobResolver::new(seccomp_vendor_dir),
        }
    }

    /// Builds the `bwrap ... -- <shell> -c <quoted-command>` invocation.
    /// When network restriction is active, the seccomp blob is attached via
    /// bwrap's `--seccomp FD` flag, fed through a shell fd-redirection
    /// (`9< <blob-path>`) appended to the returned line — the wrapper
    /// output is a shell string, not a bare argv, precisely so this works.
    pub fn wrap(
        &self,
        policy: &Policy,
        command: &[String],
        shell: &str,
        cwd: &Path,
        proxy_port: Option<u16>,
        allow_all_unix_sockets: bool,
    ) -> Result<String, LinuxSandboxError> {
        let mut args = vec!["bwrap".to_string()];
        args.extend(base_flags());
        args.extend(filesystem_args(policy, cwd)?);

        let joined_command = shlex::try_join(command.iter().map(String::as_str))
            .map_err(|_| LinuxSandboxError::CommandEncoding)?;
        let quoted_command = quote_arg(&joined_command)?;

        let mut seccomp_suffix = String::new();
        if !policy.unrestricted_network() {
            let variant = SeccompVariant::select(true, allow_all_unix_sockets);
            let blob_path = self.seccomp_resolver.resolve(variant)?;
            tracing::debug!(path = %blob_path.display(), ?variant, "attaching seccomp filter");
            args.push("--seccomp".to_string());
            args.push("9".to_string());
            seccomp_suffix = format!(" 9< {}", quote_arg(&blob_path.to_string_lossy())?);
        }

        args.push("--".to_string());
        args.push(shell.to_string());
        args.push("-c".to_string());

        let mut invocation = format!(
            "{} {quoted_command}{seccomp_suffix}",
            args.join(" ")
        );

        if !policy.unrestricted_network() {
            if let Some(port) = proxy_port {
                invocation = format!(
                    "HTTP_PROXY=http://127.0.0.1:{port} HTTPS_PROXY=http://127.0.0.1:{port} {invocation}"
                );
            }
        }

        Ok(invocation)
    }
}

fn base_flags() -> Vec<String> {
    [
        "--new-session",
        "--die-with-parent",
        "--unshare-pid",
        "--unshare-ipc",
        "--unshare-uts",
        "--unshare-cgroup",
        "--proc",
        "/proc",
        "--dev",
        "/dev",
        "--tmpfs",
        "/tmp",
    ]
    .into_iter()
    .map(String::to_string)
    .collect()
}

fn filesystem_args(policy: &Policy, cwd: &Path) -> Result<Vec<String>, LinuxSandboxError> {
    let mut args = Vec::new();
    match policy.read_restriction() {
        ReadRestriction::DenyOnly { deny } => {
            bind_ro(&mut args, Path::new("/"));

            if let Some(write) = policy.write_restriction() {
                for pattern in &write.allow {
                    bind_rw_pattern(&mut args, pattern);
                }
            }

            for pattern in deny {
                mask_pattern(&mut args, pattern);
            }

            // Ancestor rename defense: only needed where a write-allow root
            // overlaps a protected ancestor, but re-asserting read-only on
            // every protected ancestor unconditionally is cheap and safe,
            // since it is a no-op where nothing made that ancestor writable.
            let mut protected_ancestors: Vec<PathBuf> =
                deny.iter().flat_map(PathPattern::ancestors).collect();
            if let Some(write) = policy.write_restriction() {
                for pattern in &write.deny_within_allow {
                    mask_pattern(&mut args, pattern);
                    protected_ancestors.extend(pattern.ancestors());
                }
            }
            protected_ancestors.sort();
            protected_ancestors.dedup();
            for ancestor in protected_ancestors {
                bind_ro(&mut args, &ancestor);
            }
        }
        ReadRestriction::AllowOnly {
            allow,
            deny_within_allow,
        } => {
            args.push("--tmpfs".to_string());
            args.push("/".to_string());

            for dir in IMPLICIT_SYSTEM_DIRS {
                bind_ro(&mut args, Path::new(*dir));
            }
            bind_ro(&mut args, cwd);

            for pattern in allow {
                bind_ro_pattern(&mut args, pattern);
            }

            if let Some(write) = policy.write_restriction() {
                for pattern in &write.allow {
                    bind_rw_pattern(&mut args, pattern);
                }
            }

            for pattern in deny_within_allow {
                mask_pattern(&mut args, pattern);
            }
            if let Some(write) = policy.write_restriction() {
                for pattern in &write.deny_within_allow {
                    mask_pattern(&mut args, pattern);
                }
            }
        }
    }
    Ok(args)
}

fn bind_rw_pattern(args: &mut Vec<String>, pattern: &PathPattern) {
    bind_rw(args, &pattern.literal_prefix());
}

fn bind_ro_pattern(args: &mut Vec<String>, pattern: &PathPattern) {
    bind_ro(args, &pattern.literal_prefix());
}

fn mask_pattern(args: &mut Vec<String>, pattern: &PathPattern) {
    let path = pattern.literal_prefix();
    args.push("--tmpfs".to_string());
    args.push(path.to_string_lossy().into_owned());
}

fn bind_rw(args: &mut Vec<String>, path: &Path) {
    let path = path.to_string_lossy().into_owned();
    args.push("--bind".to_string());
    args.push(path.clone());
    args.push(path);
}

fn bind_ro(args: &mut Vec<String>, path: &Path) {
    let path = path.to_string_lossy().into_owned();
    args.push("--ro-bind".to_string());
    args.push(path.clone());
    args.push(path);
}

fn quote_arg(raw: &str) -> Result<String, LinuxSandboxError> {
    shlex::try_quote(raw)
        .map(|cow| cow.into_owned())
        .map_err(|_| LinuxSandboxError::CommandEncoding)
}
