//! Platform backends for named shared memory.
//!
//! Exactly one backend is compiled in and exported as [`Platform`]:
//! - linux/android: files in the `/dev/shm` tmpfs
//! - macos/ios: `shm_open`/`shm_unlink` invoked as raw syscalls
//! - other unix: the libc `shm_open`/`shm_unlink` wrappers

use std::fs::File;
use std::io;
use std::path::PathBuf;

use crate::error::Result;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod devshm;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use devshm::DevShm as Platform;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod apple;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) use apple::AppleSyscall as Platform;

#[cfg(all(
    unix,
    not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios"
    ))
))]
mod posix;
#[cfg(all(
    unix,
    not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios"
    ))
))]
pub(crate) use posix::PosixShm as Platform;

#[cfg(not(unix))]
compile_error!("the shm crate only supports POSIX shared memory (unix targets)");

/// Operations every backend provides. All calls are blocking and retry `EINTR`.
pub(crate) trait Backend {
    /// Longest name accepted by the platform, in bytes.
    const NAME_MAX: usize;
    /// Prefix every name must start with (`""` when none).
    const REQUIRED_PREFIX: &'static str;
    /// Whether segments are visible as regular files.
    const FILE_SYSTEM_BACKED: bool;

    /// Create `name` read-write, failing with "already exists" if it is taken.
    fn create_exclusive(name: &str, mode: u32) -> Result<File>;

    /// Open an existing `name` read-only. Never creates.
    fn open_existing(name: &str) -> Result<File>;

    /// Remove `name` from the namespace. Existing mappings stay valid.
    fn unlink(name: &str) -> Result<()>;

    /// Path of the backing file, for file system backed platforms.
    fn file_system_path(name: &str) -> Option<PathBuf>;

    /// Name to report for a segment opened as `name`.
    fn display_name(name: &str) -> String {
        name.to_owned()
    }
}

/// Run `f` until it completes with something other than `EINTR`.
pub(crate) fn retry_eintr<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Convert a C-style `-1` return into an `io::Result`.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) fn c_name(name: &str) -> io::Result<std::ffi::CString> {
    std::ffi::CString::new(name).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
}
