//! Composes the `sandbox-exec` invocation string around a command (the
//! other half of component D: the profile builder produces the policy
//! text, this produces the stable, test-observable shell string).

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use sandbox_policy::Policy;

use crate::error::SeatbeltError;
use crate::profile::build_profile;

pub const MACOS_SANDBOX_EXEC_PATH: &str = "/usr/bin/sandbox-exec";

/// Stages profile files under a directory and synthesizes the final
/// `sandbox-exec ...` invocation.
pub struct SeatbeltWrapper {
    profile_dir: PathBuf,
}

impl SeatbeltWrapper {
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
        }
    }

    /// Builds the profile for `policy`, stages it to disk, and returns the
    /// full shell invocation string:
    /// `[HTTP_PROXY=... HTTPS_PROXY=...] sandbox-exec -f <profile-file> <shell> -c <quoted-command>`.
    pub fn wrap(
        &self,
        policy: &Policy,
        command: &[String],
        shell: &str,
        cwd: &Path,
        proxy_port: Option<u16>,
    ) -> Result<String, SeatbeltError> {
        let profile = build_profile(policy, proxy_port, cwd)?;
        let profile_path = self.stage_profile(&profile)?;
        tracing::debug!(path = %profile_path.display(), "staged seatbelt profile");

        let joined_command =
            shlex::try_join(command.iter().map(String::as_str)).map_err(|_| SeatbeltError::CommandEncoding)?;
        let quoted_command = quote_arg(&joined_command)?;
        let quoted_profile_path = quote_arg(&profile_path.to_string_lossy())?;

        let mut invocation = format!(
            "{MACOS_SANDBOX_EXEC_PATH} -f {quoted_profile_path} {shell} -c {quoted_command}"
        );

        if !policy.unrestricted_network() && let Some(port) = proxy_port {
            invocation = format!(
                "HTTP_PROXY=http://127.0.0.1:{port} HTTPS_PROXY=http://127.0.0.1:{port} {invocation}"
            );
        }

        Ok(invocation)
    }

    fn stage_profile(&self, profile: &str) -> Result<PathBuf, SeatbeltError> {
        std::fs::create_dir_all(&self.profile_dir).map_err(|source| SeatbeltError::ProfileWrite {
            path: self.profile_dir.clone(),
            source,
        })?;
        let mut file = tempfile::Builder::new()
            .prefix("sandbox-")
            .suffix(".sb")
            .tempfile_in(&self.profile_dir)
            .map_err(|source| SeatbeltError::ProfileWrite {
                path: self.profile_dir.clone(),
                source,
            })?;
        file.write_all(profile.as_bytes())
            .map_err(|source| SeatbeltError::ProfileWrite {
                path: self.profile_dir.clone(),
                source,
            })?;
        let (_, path) = file.keep().map_err(|err| SeatbeltError::ProfileWrite {
            path: self.profile_dir.clone(),
            source: err.error,
        })?;
        Ok(path)
    }
}

fn quote_arg(raw: &str) -> Result<String, SeatbeltError> {
    shlex::try_quote(raw)
        .map(|cow| cow.into_owned())
        .map_err(|_| SeatbeltError::CommandEncoding)
}
