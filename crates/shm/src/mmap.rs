//! Map a shm descriptor into the address space.

use std::fs::File;
use std::io;

use memmap2::{Mmap, MmapMut, MmapOptions};

/// How a segment is projected into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `MAP_SHARED`, read-only.
    Read,
    /// `MAP_SHARED`, read-write; writes are seen by every other mapper.
    Write,
    /// `MAP_PRIVATE`, copy-on-write; writes stay in this mapping.
    Copy,
}

/// An owned mapping. Dropping it unmaps the memory.
#[derive(Debug)]
pub(crate) enum Region {
    ReadOnly(Mmap),
    Writable(MmapMut),
}

impl Region {
    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            Region::ReadOnly(m) => &m[..],
            Region::Writable(m) => &m[..],
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            Region::ReadOnly(_) => None,
            Region::Writable(m) => Some(&mut m[..]),
        }
    }
}

/// Map exactly `len` bytes of `file` starting at offset 0.
///
/// `Access::Write` needs a descriptor opened read-write; the other modes work
/// with read-only descriptors.
pub(crate) fn map(file: &File, len: usize, access: Access) -> io::Result<Region> {
    let mut opts = MmapOptions::new();
    opts.offset(0).len(len);

    // Safety: other processes may write the object underneath us; callers
    // coordinate access to the contents.
    let region = unsafe {
        match access {
            Access::Read => Region::ReadOnly(opts.map(file)?),
            Access::Write => Region::Writable(opts.map_mut(file)?),
            Access::Copy => Region::Writable(opts.map_copy(file)?),
        }
    };
    Ok(region)
}
