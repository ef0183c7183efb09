//! POSIX shared-memory segment implementation

use std::{
    os::fd::{AsRawFd, OwnedFd},
    sync::atomic::{AtomicU32, Ordering},
    thread,
    time::Duration,
};

use memmap2::{MmapMut, MmapOptions};
use nix::{
    fcntl::OFlag,
    sys::mman::{shm_open, shm_unlink},
    sys::stat::{fstat, Mode},
    unistd::ftruncate,
};

use crate::error::{Result, ShmError};

use super::{config::SegmentConfig, name::canonical_name};

/// Poll step while waiting for a peer to initialize a segment header
const INIT_POLL_STEP_US: u64 = 50;

/// A named POSIX shared-memory object and its in-process mapping.
///
/// The handle owns the file descriptor and the mapping; dropping it unmaps
/// and closes but never unlinks. The object itself stays in the host
/// namespace until [`Segment::disconnect_and_unlink`] or
/// [`unlink_by_name`] removes it, so peers survive a process restart.
#[derive(Debug)]
pub struct Segment {
    logical_name: String,
    canonical: String,
    config: SegmentConfig,
    fd: Option<OwnedFd>,
    map: Option<MmapMut>,
}

impl Segment {
    /// Build a handle without touching the host namespace.
    ///
    /// Fails only on an invalid logical name; the object is opened by the
    /// first [`Segment::connect`].
    pub fn new(logical_name: &str, config: SegmentConfig) -> Result<Self> {
        let canonical = canonical_name(logical_name)?;
        Ok(Self {
            logical_name: logical_name.to_string(),
            canonical,
            config,
            fd: None,
            map: None,
        })
    }

    /// Build and immediately connect with the requested size
    pub fn open(logical_name: &str, config: SegmentConfig, size: usize) -> Result<Self> {
        let mut segment = Self::new(logical_name, config)?;
        segment.connect(size)?;
        Ok(segment)
    }

    /// Open (optionally create) the named object and map it read/write.
    ///
    /// With `size > 0` the object is grown to at least `size` bytes; with
    /// `size == 0` the object's existing size is adopted. The mapping always
    /// covers the full object.
    pub fn connect(&mut self, size: usize) -> Result<()> {
        self.disconnect();

        let oflag = if self.config.create {
            OFlag::O_RDWR | OFlag::O_CREAT
        } else {
            OFlag::O_RDWR
        };
        let mode = Mode::from_bits_truncate(self.config.permission.mode());

        let fd = shm_open(self.canonical.as_str(), oflag, mode)
            .map_err(|e| ShmError::segment_io(e.into(), "Failed to open shared memory object"))?;

        let stat = fstat(fd.as_raw_fd())
            .map_err(|e| ShmError::segment_io(e.into(), "Failed to stat shared memory object"))?;
        let mut len = stat.st_size as usize;

        if size > 0 && len < size {
            ftruncate(&fd, size as libc::off_t).map_err(|e| {
                ShmError::segment_io(e.into(), "Failed to resize shared memory object")
            })?;
            len = size;
        }

        if len == 0 {
            return Err(ShmError::segment(format!(
                "Shared memory object '{}' has zero size",
                self.canonical
            )));
        }

        let map = unsafe {
            MmapOptions::new()
                .len(len)
                .map_mut(&fd)
                .map_err(|e| ShmError::segment_io(e, "Failed to map shared memory object"))?
        };

        self.fd = Some(fd);
        self.map = Some(map);
        Ok(())
    }

    /// Unmap and close. Idempotent; never unlinks.
    pub fn disconnect(&mut self) {
        self.map = None;
        self.fd = None;
    }

    /// Unmap, close and remove the object from the host namespace.
    ///
    /// The link count is sampled first: if another process already unlinked
    /// the object this call does not remove its replacement.
    pub fn disconnect_and_unlink(&mut self) -> Result<()> {
        let still_linked = match &self.fd {
            Some(fd) => fstat(fd.as_raw_fd())
                .map(|stat| stat.st_nlink > 0)
                .unwrap_or(false),
            None => true,
        };
        self.disconnect();
        if still_linked {
            shm_unlink(self.canonical.as_str())
                .map_err(|e| ShmError::segment_io(e.into(), "Failed to unlink shared memory"))?;
        }
        Ok(())
    }

    /// True when the handle holds no mapping or the object was unlinked
    /// underneath us (link count dropped to zero)
    pub fn is_disconnected(&self) -> bool {
        match &self.fd {
            None => true,
            Some(fd) => match fstat(fd.as_raw_fd()) {
                Ok(stat) => stat.st_nlink == 0,
                Err(_) => true,
            },
        }
    }

    /// True when a live mapping is held
    pub fn is_connected(&self) -> bool {
        !self.is_disconnected()
    }

    /// Size of the current mapping in bytes; 0 when disconnected
    pub fn size(&self) -> usize {
        self.map.as_ref().map(|m| m.len()).unwrap_or(0)
    }

    /// Logical name this handle was built from
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Canonical object name in the host namespace
    pub fn canonical_name(&self) -> &str {
        &self.canonical
    }

    /// Base pointer of the mapping (read-only view)
    pub fn as_ptr(&self) -> Option<*const u8> {
        self.map.as_ref().map(|m| m.as_ptr())
    }

    /// Base pointer of the mapping for shared-header views.
    ///
    /// # Safety
    /// The caller must not outlive the mapping with the returned pointer and
    /// must uphold the claim/publish protocol for all writes through it.
    pub unsafe fn as_base_ptr(&self) -> Option<*mut u8> {
        self.map.as_ref().map(|m| m.as_ptr() as *mut u8)
    }
}

/// Remove the object for `logical_name` from the host namespace.
///
/// Processes that still hold a mapping keep using their copy; new
/// connections will create a fresh object.
pub fn unlink_by_name(logical_name: &str) -> Result<()> {
    let canonical = canonical_name(logical_name)?;
    shm_unlink(canonical.as_str())
        .map_err(|e| ShmError::segment_io(e.into(), "Failed to unlink shared memory"))?;
    Ok(())
}

/// Read-only probe for an initialized segment.
///
/// Attempts to open the object without creating it, maps the first page and
/// checks the header init flag (a `u32` at offset 0 whose `0 -> 1`
/// transition publishes the header). Waits up to `timeout_us` microseconds,
/// polling every 50 us.
pub fn segment_exists(logical_name: &str, timeout_us: u64) -> bool {
    let canonical = match canonical_name(logical_name) {
        Ok(c) => c,
        Err(_) => return false,
    };

    let mut waited_us: u64 = 0;
    loop {
        if probe_initialized(&canonical) {
            return true;
        }
        if waited_us >= timeout_us {
            return false;
        }
        thread::sleep(Duration::from_micros(INIT_POLL_STEP_US));
        waited_us += INIT_POLL_STEP_US;
    }
}

fn probe_initialized(canonical: &str) -> bool {
    let fd = match shm_open(canonical, OFlag::O_RDONLY, Mode::empty()) {
        Ok(fd) => fd,
        Err(_) => return false,
    };
    let stat = match fstat(fd.as_raw_fd()) {
        Ok(stat) => stat,
        Err(_) => return false,
    };
    let object_len = stat.st_size as usize;
    if object_len < std::mem::size_of::<u32>() {
        return false;
    }

    let probe_len = object_len.min(4096);
    let map = match unsafe { MmapOptions::new().len(probe_len).map(&fd) } {
        Ok(map) => map,
        Err(_) => return false,
    };
    let flag = unsafe { &*(map.as_ptr() as *const AtomicU32) };
    flag.load(Ordering::Acquire) == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Permission;

    fn unique_name(tag: &str) -> String {
        format!("/shmbus_seg_{}_{}", tag, std::process::id())
    }

    #[test]
    fn test_connect_requires_existing_object_without_create() {
        let name = unique_name("absent");
        let mut segment = Segment::new(&name, SegmentConfig::reader()).unwrap();
        assert!(segment.connect(0).is_err());
        assert!(segment.is_disconnected());
    }

    #[test]
    fn test_create_adopt_and_unlink() {
        let name = unique_name("roundtrip");
        let mut writer =
            Segment::open(&name, SegmentConfig::writer(Permission::default()), 4096).unwrap();
        assert_eq!(writer.size(), 4096);
        assert!(writer.is_connected());

        // A reader adopts the existing size
        let reader = Segment::open(&name, SegmentConfig::reader(), 0).unwrap();
        assert_eq!(reader.size(), 4096);

        writer.disconnect_and_unlink().unwrap();
        assert!(writer.is_disconnected());

        // Idempotent disconnect
        writer.disconnect();
        writer.disconnect();
    }

    #[test]
    fn test_reader_detects_unlink() {
        let name = unique_name("detect");
        let mut writer =
            Segment::open(&name, SegmentConfig::writer(Permission::default()), 4096).unwrap();
        let reader = Segment::open(&name, SegmentConfig::reader(), 0).unwrap();
        assert!(reader.is_connected());

        writer.disconnect_and_unlink().unwrap();
        assert!(reader.is_disconnected());
    }

    #[test]
    fn test_exists_probe_times_out_without_writer() {
        let name = unique_name("probe");
        assert!(!segment_exists(&name, 500));
    }
}
