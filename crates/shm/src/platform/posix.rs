//! Library-level `shm_open` for the BSDs and Solaris-likes.

use std::fs::File;
use std::os::fd::FromRawFd;
use std::path::PathBuf;

use super::{c_name, cvt, retry_eintr, Backend};
use crate::error::{Result, ShmError};

pub(crate) struct PosixShm;

fn shm_open(name: &str, flags: libc::c_int, mode: libc::mode_t) -> Result<File> {
    let cname = c_name(name).map_err(|err| ShmError::syscall("shm_open", name, err))?;
    let fd = retry_eintr(|| {
        // SAFETY: cname is NUL-terminated and alive across the call.
        cvt(unsafe { libc::shm_open(cname.as_ptr(), flags, mode) })
    })
    .map_err(|err| ShmError::syscall("shm_open", name, err))?;
    // SAFETY: fresh descriptor, owned by nobody else.
    Ok(unsafe { File::from_raw_fd(fd) })
}

impl Backend for PosixShm {
    const NAME_MAX: usize = 1023;
    // FreeBSD rejects names without a leading slash.
    const REQUIRED_PREFIX: &'static str = "/";
    const FILE_SYSTEM_BACKED: bool = false;

    fn create_exclusive(name: &str, mode: u32) -> Result<File> {
        shm_open(
            name,
            libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
            mode as libc::mode_t,
        )
    }

    fn open_existing(name: &str) -> Result<File> {
        shm_open(name, libc::O_RDONLY, 0)
    }

    fn unlink(name: &str) -> Result<()> {
        let cname = c_name(name).map_err(|err| ShmError::syscall("shm_unlink", name, err))?;
        retry_eintr(|| {
            // SAFETY: cname outlives the call.
            cvt(unsafe { libc::shm_unlink(cname.as_ptr()) })
        })
        .map(drop)
        .map_err(|err| ShmError::syscall("shm_unlink", name, err))
    }

    fn file_system_path(_name: &str) -> Option<PathBuf> {
        None
    }
}
