//! Error type shared by every shm operation.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShmError>;

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("shm name pattern {pattern:?} contains a path separator")]
    PatternHasSeparator { pattern: String },

    #[error("shm name {name:?} is longer than the platform limit of {max} bytes")]
    PatternTooLong { name: String, max: usize },

    #[error("no free shm name for pattern {pattern:?} after {attempts} attempts")]
    NameExhaustion { pattern: String, attempts: u32 },

    #[error("POSIX shared memory is not supported on this platform")]
    NotSupported(#[source] io::Error),

    #[error("{op}() failed for shm {name:?}")]
    Syscall {
        op: &'static str,
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to truncate shm {name:?} to {size} bytes")]
    Resize {
        name: String,
        size: u64,
        #[source]
        source: io::Error,
    },

    #[error("shm size {size} does not fit in the address space")]
    SizeOverflow { size: u64 },
}

impl ShmError {
    pub(crate) fn syscall(op: &'static str, name: &str, source: io::Error) -> Self {
        if source.raw_os_error() == Some(libc::ENOSYS) {
            return ShmError::NotSupported(source);
        }
        ShmError::Syscall {
            op,
            name: name.to_owned(),
            source,
        }
    }

    /// True when exclusive creation lost to an existing object of the same name.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            ShmError::Syscall { source, .. } if source.kind() == io::ErrorKind::AlreadyExists
        )
    }

    /// True when the named object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ShmError::Syscall { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }
}
