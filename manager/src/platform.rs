//! Platform dispatch for wrapper synthesis: macOS uses Seatbelt, Linux uses
//! bubblewrap + seccomp. Any other target has no enforcement backend.

use std::path::Path;
use std::path::PathBuf;

use sandbox_policy::Policy;

use crate::error::ManagerError;

pub struct PlatformWrapper {
    #[cfg(target_os = "macos")]
    seatbelt: sandbox_seatbelt::SeatbeltWrapper,
    #[cfg(target_os = "linux")]
    linux: sandbox_linux::BwrapWrapper,
}

impl PlatformWrapper {
    #[cfg(target_os = "macos")]
    pub fn new(profile_dir: impl Into<PathBuf>, _seccomp_vendor_dir: impl Into<PathBuf>) -> Self {
        Self {
            seatbelt: sandbox_seatbelt::SeatbeltWrapper::new(profile_dir),
        }
    }

    #[cfg(target_os = "linux")]
    pub fn new(_profile_dir: impl Into<PathBuf>, seccomp_vendor_dir: impl Into<PathBuf>) -> Self {
        Self {
            linux: sandbox_linux::BwrapWrapper::new(seccomp_vendor_dir),
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    pub fn new(_profile_dir: impl Into<PathBuf>, _seccomp_vendor_dir: impl Into<PathBuf>) -> Self {
        Self {}
    }

    #[cfg(target_os = "macos")]
    pub fn wrap(
        &self,
        policy: &Policy,
        command: &[String],
        shell: &str,
        cwd: &Path,
        proxy_port: Option<u16>,
    ) -> Result<String, ManagerError> {
        Ok(self.seatbelt.wrap(policy, command, shell, cwd, proxy_port)?)
    }

    #[cfg(target_os = "linux")]
    pub fn wrap(
        &self,
        policy: &Policy,
        command: &[String],
        shell: &str,
        cwd: &Path,
        proxy_port: Option<u16>,
    ) -> Result<String, ManagerError> {
        Ok(self.linux.wrap(policy, command, shell, cwd, proxy_port, false)?)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    pub fn wrap(
        &self,
        _policy: &Policy,
        _command: &[String],
        _shell: &str,
        _cwd: &Path,
        _proxy_port: Option<u16>,
    ) -> Result<String, ManagerError> {
        Err(ManagerError::PlatformUnsupported)
    }
}
