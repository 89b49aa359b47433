//! Shared memory via /dev/shm.
//!
//! Linux exposes POSIX shm as a tmpfs at /dev/shm, so `shm_open(name)` is just
//! `open("/dev/shm/name")`. Going through the file system directly gives us
//! the full path to hand to other processes.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use super::{retry_eintr, Backend};
use crate::error::{Result, ShmError};

const SHM_DIR: &str = "/dev/shm";

pub(crate) struct DevShm;

/// Path in /dev/shm for a named shared memory segment.
///
/// `name` is either a bare entry name or `/dev/shm/<entry>`. Anything that
/// would resolve outside /dev/shm is rejected.
fn shm_path(name: &str) -> io::Result<PathBuf> {
    let entry = name
        .strip_prefix(SHM_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name);
    if entry.is_empty() || entry == "." || entry == ".." || entry.contains('/') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{name:?} is not an entry of {SHM_DIR}"),
        ));
    }
    Ok(Path::new(SHM_DIR).join(entry))
}

fn resolve(op: &'static str, name: &str) -> Result<PathBuf> {
    shm_path(name).map_err(|err| ShmError::syscall(op, name, err))
}

fn wrap(op: &'static str, path: &Path, err: io::Error) -> ShmError {
    if err.kind() == io::ErrorKind::NotFound && !Path::new(SHM_DIR).is_dir() {
        return ShmError::NotSupported(err);
    }
    ShmError::syscall(op, &path.to_string_lossy(), err)
}

impl Backend for DevShm {
    const NAME_MAX: usize = 255;
    const REQUIRED_PREFIX: &'static str = "";
    const FILE_SYSTEM_BACKED: bool = true;

    fn create_exclusive(name: &str, mode: u32) -> Result<File> {
        let path = resolve("open", name)?;
        retry_eintr(|| {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .mode(mode)
                .open(&path)
        })
        .map_err(|err| wrap("open", &path, err))
    }

    fn open_existing(name: &str) -> Result<File> {
        let path = resolve("open", name)?;
        retry_eintr(|| OpenOptions::new().read(true).open(&path))
            .map_err(|err| wrap("open", &path, err))
    }

    fn unlink(name: &str) -> Result<()> {
        let path = resolve("unlink", name)?;
        retry_eintr(|| std::fs::remove_file(&path)).map_err(|err| wrap("unlink", &path, err))
    }

    fn file_system_path(name: &str) -> Option<PathBuf> {
        shm_path(name).ok()
    }

    fn display_name(name: &str) -> String {
        match shm_path(name).ok().as_deref().and_then(Path::file_name) {
            Some(entry) => entry.to_string_lossy().into_owned(),
            None => name.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_resolution() {
        assert_eq!(shm_path("seg-1").unwrap(), PathBuf::from("/dev/shm/seg-1"));
        assert_eq!(shm_path("/dev/shm/seg-1").unwrap(), PathBuf::from("/dev/shm/seg-1"));
        assert_eq!(DevShm::display_name("/dev/shm/seg-1"), "seg-1");
        assert_eq!(DevShm::display_name("seg-1"), "seg-1");
    }

    #[test]
    fn test_names_outside_dev_shm_rejected() {
        for name in [
            "",
            ".",
            "..",
            "../../tmp/seg",
            "a/b",
            "/tmp/seg",
            "/dev/shm/",
            "/dev/shm/../tmp/seg",
            "/dev/shm/a/b",
            "/dev/shmfoo",
        ] {
            let err = shm_path(name).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{name:?}");
            assert!(DevShm::file_system_path(name).is_none(), "{name:?}");
        }
    }

    #[test]
    fn test_traversal_leaves_outside_file_alone() {
        let outside =
            std::env::temp_dir().join(format!("test-devshm-outside-{}", std::process::id()));
        std::fs::write(&outside, b"keep").unwrap();
        let relative = format!("../..{}", outside.display());

        let err = DevShm::unlink(&relative).unwrap_err();
        assert!(matches!(
            &err,
            ShmError::Syscall { op: "unlink", source, .. }
                if source.kind() == io::ErrorKind::InvalidInput
        ));
        assert!(DevShm::open_existing(&relative).is_err());
        assert!(DevShm::unlink(&outside.to_string_lossy()).is_err());
        assert!(DevShm::open_existing(&outside.to_string_lossy()).is_err());

        assert_eq!(std::fs::read(&outside).unwrap(), b"keep");
        std::fs::remove_file(outside).unwrap();
    }

    #[test]
    fn test_create_exclusive_collides() {
        let name = format!("test-devshm-excl-{}", std::process::id());
        let _ = DevShm::unlink(&name);

        let _file = DevShm::create_exclusive(&name, 0o600).unwrap();
        let err = DevShm::create_exclusive(&name, 0o600).unwrap_err();
        assert!(err.is_already_exists());

        DevShm::unlink(&name).unwrap();
        let err = DevShm::open_existing(&name).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unlink_missing() {
        let err = DevShm::unlink("test-devshm-never-created").unwrap_err();
        assert!(matches!(err, ShmError::Syscall { op: "unlink", .. }));
    }
}
