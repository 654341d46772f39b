//! macOS-specific directory discovery via `confstr(3)`.
//!
//! Tools that shell out to Node/npm or other language runtimes expect their
//! per-user cache directory to be writable even under a restrictive policy;
//! `$TMPDIR` alone does not cover it on macOS, since `NSTemporaryDirectory`
//! and `DARWIN_USER_CACHE_DIR` are distinct.

use std::ffi::CStr;
use std::path::PathBuf;

#[cfg(target_os = "macos")]
fn confstr(name: libc::c_int) -> Option<String> {
    let mut buf = vec![0_i8; (libc::PATH_MAX as usize) + 1];
    // SAFETY: `buf` is sized to `PATH_MAX + 1` and confstr never writes more
    // than `buf.len()` bytes, NUL-terminating when it returns a length > 0.
    let len = unsafe { libc::confstr(name, buf.as_mut_ptr(), buf.len()) };
    if len == 0 {
        return None;
    }
    let cstr = unsafe { CStr::from_ptr(buf.as_ptr()) };
    cstr.to_str().ok().map(ToString::to_string)
}

#[cfg(target_os = "macos")]
fn confstr_path(name: libc::c_int) -> Option<PathBuf> {
    let raw = confstr(name)?;
    let path = PathBuf::from(raw);
    Some(path.canonicalize().unwrap_or(path))
}

/// The per-user cache directory (`$DARWIN_USER_CACHE_DIR`), if resolvable.
/// Returns `None` off-macOS or if the kernel does not report one.
#[cfg(target_os = "macos")]
pub fn darwin_user_cache_dir() -> Option<PathBuf> {
    confstr_path(libc::_CS_DARWIN_USER_CACHE_DIR)
}

#[cfg(not(target_os = "macos"))]
pub fn darwin_user_cache_dir() -> Option<PathBuf> {
    None
}

#[cfg(all(test, target_os = "macos"))]
mod tests {
    use super::*;

    #[test]
    fn resolves_to_an_existing_directory() {
        let dir = darwin_user_cache_dir().expect("confstr reports a cache dir");
        assert!(dir.is_absolute());
    }
}
