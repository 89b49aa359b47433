//! The shared memory handle returned by `create_temp` and `open`.

use std::fs::File;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::{Result, ShmError};
use crate::mmap::{Access, Region};
use crate::platform::{Backend, Platform};

/// A mapped, named shared memory segment.
///
/// The segment owns its descriptor and mapping. Dropping it unmaps and closes
/// but leaves the name registered, so another process can still `open` it;
/// call [`Segment::unlink`] to remove the name.
#[derive(Debug)]
pub struct Segment {
    name: String,
    fs_path: Option<PathBuf>,
    access: Access,
    file: Option<File>,
    region: Option<Region>,
    unlinked: AtomicBool,
}

impl Segment {
    pub(crate) fn new(name: &str, file: File, region: Region, access: Access) -> Self {
        Self {
            name: Platform::display_name(name),
            fs_path: Platform::file_system_path(name),
            access,
            file: Some(file),
            region: Some(region),
            unlinked: AtomicBool::new(false),
        }
    }

    /// Name the segment is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_file_system_backed(&self) -> bool {
        self.fs_path.is_some()
    }

    /// Full path of the backing file, when the platform has one.
    pub fn file_system_name(&self) -> Option<&Path> {
        self.fs_path.as_deref()
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// The mapped bytes. Empty once the segment is closed.
    pub fn slice(&self) -> &[u8] {
        self.region.as_ref().map_or(&[][..], Region::as_slice)
    }

    /// Writable view of the mapping; `None` for read-only or closed segments.
    pub fn slice_mut(&mut self) -> Option<&mut [u8]> {
        self.region.as_mut().and_then(Region::as_mut_slice)
    }

    pub fn len(&self) -> usize {
        self.slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn is_unlinked(&self) -> bool {
        self.unlinked.load(Ordering::Acquire)
    }

    pub fn as_raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Unmap the region and close the descriptor.
    ///
    /// Meant to be called once; later calls do nothing. The name stays
    /// registered until [`Segment::unlink`]. The descriptor is closed with
    /// `libc::close` rather than dropped so a failing `close(2)` is reported.
    pub fn close(&mut self) -> Result<()> {
        self.region = None;
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let fd = file.into_raw_fd();
        // close(2) must not be retried on EINTR: the descriptor is gone either way.
        // SAFETY: we own fd and nothing else refers to it after into_raw_fd.
        if unsafe { libc::close(fd) } == -1 {
            return Err(ShmError::Syscall {
                op: "close",
                name: self.name.clone(),
                source: std::io::Error::last_os_error(),
            });
        }
        debug!("Closed shm {}", self.name);
        Ok(())
    }

    /// Remove the name from the system. Only the first call does any work.
    pub fn unlink(&self) -> Result<()> {
        if self.unlinked.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let target = match &self.fs_path {
            Some(path) => path.to_string_lossy(),
            None => self.name.as_str().into(),
        };
        Platform::unlink(&target)?;
        debug!("Unlinked shm {}", self.name);
        Ok(())
    }
}

/// Removes a freshly created object unless disarmed.
///
/// The descriptor may still be open when this fires; the object is freed once
/// it closes.
pub(crate) struct UnlinkGuard<'a> {
    name: &'a str,
    armed: bool,
}

impl<'a> UnlinkGuard<'a> {
    pub(crate) fn new(name: &'a str) -> Self {
        Self { name, armed: true }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UnlinkGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match Platform::unlink(self.name) {
            Ok(()) => debug!("Removed partially created shm {}", self.name),
            Err(err) => warn!("Failed to remove partially created shm {}: {}", self.name, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmap;

    fn created(pattern_tag: &str, len: usize) -> Segment {
        let name = format!(
            "{}test-segment-{}-{}",
            Platform::REQUIRED_PREFIX,
            pattern_tag,
            std::process::id()
        );
        let _ = Platform::unlink(&name);
        let file = Platform::create_exclusive(&name, 0o600).unwrap();
        file.set_len(len as u64).unwrap();
        let region = mmap::map(&file, len, Access::Write).unwrap();
        Segment::new(&name, file, region, Access::Write)
    }

    #[test]
    fn test_close_drops_region() {
        let mut seg = created("close", 4096);
        assert_eq!(seg.len(), 4096);
        assert!(seg.as_raw_fd().is_some());

        seg.close().unwrap();
        assert!(seg.is_closed());
        assert!(seg.slice().is_empty());
        assert!(seg.slice_mut().is_none());
        assert!(seg.as_raw_fd().is_none());

        // second close is a no-op
        seg.close().unwrap();
        seg.unlink().unwrap();
    }

    #[test]
    fn test_unlink_once() {
        let seg = created("unlink", 64);
        assert!(!seg.is_unlinked());
        seg.unlink().unwrap();
        assert!(seg.is_unlinked());
        // the name is gone, so a second real unlink would fail
        seg.unlink().unwrap();
        // mapping stays usable after unlink
        assert_eq!(seg.slice().len(), 64);
    }

    #[test]
    fn test_guard_removes_unless_disarmed() {
        let name = format!("{}test-guard-{}", Platform::REQUIRED_PREFIX, std::process::id());
        let _ = Platform::unlink(&name);

        {
            let _guard = UnlinkGuard::new(&name);
            let _file = Platform::create_exclusive(&name, 0o600).unwrap();
        }
        assert!(Platform::open_existing(&name).unwrap_err().is_not_found());

        let guard = UnlinkGuard::new(&name);
        let _file = Platform::create_exclusive(&name, 0o600).unwrap();
        guard.disarm();
        assert!(Platform::open_existing(&name).is_ok());
        Platform::unlink(&name).unwrap();
    }
}
