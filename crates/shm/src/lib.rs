//! Named POSIX shared memory segments.
//!
//! [`create_temp`] allocates a fresh segment under a unique random name and
//! maps it read-write; [`open`] maps an existing segment read-only by name.
//! The name can be handed to another process, which opens the same memory.
//!
//! No synchronization is provided over the mapped bytes.

pub mod error;
pub mod mmap;
pub mod name;
mod platform;
pub mod segment;

use std::fs::File;

use tracing::debug;

use common::config::{ShmConfig, DEFAULT_MAX_CREATE_ATTEMPTS};

pub use crate::error::{Result, ShmError};
pub use crate::mmap::Access;
pub use crate::name::NamePattern;
pub use crate::segment::Segment;

use crate::platform::{retry_eintr, Backend, Platform};
use crate::segment::UnlinkGuard;

/// Default bound on name collisions tolerated by [`create_temp`].
pub const MAX_CREATE_ATTEMPTS: u32 = DEFAULT_MAX_CREATE_ATTEMPTS;

/// Longest segment name accepted on this platform.
pub const NAME_MAX: usize = Platform::NAME_MAX;

/// Prefix the platform requires on every segment name.
pub const REQUIRED_PREFIX: &str = Platform::REQUIRED_PREFIX;

/// Whether segments show up as files that can be passed around by path.
pub const FILE_SYSTEM_BACKED: bool = Platform::FILE_SYSTEM_BACKED;

/// Create a new segment of `size` bytes named after `pattern`.
///
/// The last `*` in `pattern` is replaced by random hex; without a `*` the hex
/// is appended. The memory is zero-filled and mapped shared read-write.
pub fn create_temp(pattern: &str, size: u64) -> Result<Segment> {
    create_temp_with(pattern, size, &ShmConfig::default())
}

/// [`create_temp`] with explicit permission bits and collision bound.
pub fn create_temp_with(pattern: &str, size: u64, config: &ShmConfig) -> Result<Segment> {
    let pattern = NamePattern::parse(pattern, Platform::REQUIRED_PREFIX, Platform::NAME_MAX)?;
    let (name, file) = create_unique(&pattern, config, || pattern.candidate())?;

    let guard = UnlinkGuard::new(&name);

    let len = usize::try_from(size).map_err(|_| ShmError::SizeOverflow { size })?;
    retry_eintr(|| file.set_len(size)).map_err(|source| ShmError::Resize {
        name: name.clone(),
        size,
        source,
    })?;

    let region = mmap::map(&file, len, Access::Write)
        .map_err(|err| ShmError::syscall("mmap", &name, err))?;

    guard.disarm();
    debug!("Created shm {} ({} bytes)", name, size);
    Ok(Segment::new(&name, file, region, Access::Write))
}

/// Open an existing segment read-only, mapping its current size.
pub fn open(name: &str) -> Result<Segment> {
    open_mapped(name, Access::Read)
}

/// Open an existing segment as a private copy-on-write mapping.
///
/// Writes through the returned segment are never seen by other processes.
pub fn open_copy(name: &str) -> Result<Segment> {
    open_mapped(name, Access::Copy)
}

/// Remove a named segment without holding a handle to it.
pub fn unlink(name: &str) -> Result<()> {
    Platform::unlink(name)?;
    debug!("Unlinked shm {}", name);
    Ok(())
}

fn open_mapped(name: &str, access: Access) -> Result<Segment> {
    let file = Platform::open_existing(name)?;

    let size = file
        .metadata()
        .map_err(|err| ShmError::syscall("fstat", name, err))?
        .len();
    let len = usize::try_from(size).map_err(|_| ShmError::SizeOverflow { size })?;

    let region = mmap::map(&file, len, access).map_err(|err| ShmError::syscall("mmap", name, err))?;
    debug!("Opened shm {} ({} bytes, {:?})", name, size, access);
    Ok(Segment::new(name, file, region, access))
}

/// Try candidates from `next` until one is created exclusively.
fn create_unique(
    pattern: &NamePattern,
    config: &ShmConfig,
    mut next: impl FnMut() -> Result<String>,
) -> Result<(String, File)> {
    let mut attempts = 0u32;
    loop {
        let name = next()?;
        match Platform::create_exclusive(&name, config.mode) {
            Ok(file) => return Ok((name, file)),
            Err(err) if err.is_already_exists() => {
                attempts += 1;
                if attempts > config.max_create_attempts {
                    return Err(ShmError::NameExhaustion {
                        pattern: pattern.to_string(),
                        attempts,
                    });
                }
                debug!("shm name {} taken, retrying", name);
            }
            Err(err) => return Err(err),
        }
    }
}
