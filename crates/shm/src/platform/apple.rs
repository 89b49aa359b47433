//! macOS shm through raw syscalls.
//!
//! The libc `shm_open` is variadic and awkward to call reliably from Rust, so
//! the kernel entry points are invoked directly.

use std::fs::File;
use std::io;
use std::os::fd::FromRawFd;
use std::path::PathBuf;

use super::{c_name, cvt, retry_eintr, Backend};
use crate::error::{Result, ShmError};

pub(crate) struct AppleSyscall;

#[allow(deprecated)]
fn sys_shm_open(name: &str, flags: libc::c_int, mode: libc::c_int) -> io::Result<File> {
    let cname = c_name(name)?;
    let fd = retry_eintr(|| {
        // SAFETY: cname is a valid NUL-terminated string for the duration of the call.
        cvt(unsafe { libc::syscall(libc::SYS_shm_open, cname.as_ptr(), flags, mode) })
    })?;
    // SAFETY: the kernel just handed us this descriptor and nothing else owns it.
    Ok(unsafe { File::from_raw_fd(fd) })
}

impl Backend for AppleSyscall {
    // PSHMNAMLEN is 31 including the terminating NUL.
    const NAME_MAX: usize = 30;
    const REQUIRED_PREFIX: &'static str = "";
    const FILE_SYSTEM_BACKED: bool = false;

    fn create_exclusive(name: &str, mode: u32) -> Result<File> {
        sys_shm_open(
            name,
            libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
            mode as libc::c_int,
        )
        .map_err(|err| ShmError::syscall("shm_open", name, err))
    }

    fn open_existing(name: &str) -> Result<File> {
        sys_shm_open(name, libc::O_RDONLY, 0).map_err(|err| ShmError::syscall("shm_open", name, err))
    }

    #[allow(deprecated)]
    fn unlink(name: &str) -> Result<()> {
        let cname = c_name(name).map_err(|err| ShmError::syscall("shm_unlink", name, err))?;
        retry_eintr(|| {
            // SAFETY: cname outlives the call.
            cvt(unsafe { libc::syscall(libc::SYS_shm_unlink, cname.as_ptr()) })
        })
        .map(drop)
        .map_err(|err| ShmError::syscall("shm_unlink", name, err))
    }

    fn file_system_path(_name: &str) -> Option<PathBuf> {
        None
    }
}
