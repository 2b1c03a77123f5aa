//! POSIX shared memory via `shm_open` + `mmap`.

use std::ffi::CString;

use swiftchannel_core::{Error, Result};

use crate::{validate_name, SharedMemory};

/// A POSIX shared-memory mapping.
pub struct PosixSharedMemory {
    name: String,
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the handle is a plain (pointer, length) pair; cross-thread use of
// the mapped bytes is governed by the channel protocol, not by this type.
unsafe impl Send for PosixSharedMemory {}

impl PosixSharedMemory {
    /// Channel name decorated into a POSIX shared-memory object name.
    fn object_name(name: &str) -> Result<CString> {
        validate_name(name)?;
        CString::new(format!("/swiftchannel_{name}")).map_err(|_| Error::InvalidChannelName)
    }

    /// Region name as seen by the channel, undecorated.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SharedMemory for PosixSharedMemory {
    fn create_or_open(name: &str, size: usize, create: bool) -> Result<Self> {
        let oname = Self::object_name(name)?;

        let oflag = if create {
            libc::O_CREAT | libc::O_RDWR
        } else {
            libc::O_RDWR
        };
        // SAFETY: `oname` is a valid NUL-terminated string. The mode goes
        // through C varargs, so it is passed at int width.
        let fd = unsafe { libc::shm_open(oname.as_ptr(), oflag, 0o666 as libc::c_uint) };
        if fd < 0 {
            return Err(map_errno());
        }

        let len = if create {
            // SAFETY: fd is a live shm descriptor. ftruncate of a fresh
            // object zero-fills it; re-truncating an existing one to the
            // same size is a no-op.
            if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
                let err = map_errno();
                // SAFETY: fd is live and owned here.
                unsafe { libc::close(fd) };
                return Err(err);
            }
            size
        } else {
            // Map whatever the creator sized the region to.
            let mut st: libc::stat = unsafe { std::mem::zeroed() };
            // SAFETY: fd is live; `st` is a valid out-pointer.
            if unsafe { libc::fstat(fd, &mut st) } != 0 {
                let err = map_errno();
                unsafe { libc::close(fd) };
                return Err(err);
            }
            st.st_size as usize
        };

        if len == 0 {
            // SAFETY: fd is live and owned here.
            unsafe { libc::close(fd) };
            return Err(Error::InvalidMemoryLayout);
        }

        // SAFETY: fd is a live descriptor of at least `len` bytes.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        // The descriptor is not needed once the mapping exists.
        // SAFETY: fd is live and owned here.
        unsafe { libc::close(fd) };

        if ptr == libc::MAP_FAILED {
            return Err(map_errno());
        }

        tracing::debug!(name, len, create, "mapped shared-memory region");
        Ok(Self {
            name: name.to_owned(),
            ptr: ptr as *mut u8,
            len,
        })
    }

    fn close(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: (ptr, len) is the mapping produced by mmap above.
            if unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.len) } != 0 {
                tracing::warn!(name = %self.name, "munmap failed: {}", std::io::Error::last_os_error());
            }
            self.ptr = std::ptr::null_mut();
            self.len = 0;
        }
    }

    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for PosixSharedMemory {
    fn drop(&mut self) {
        self.close();
    }
}

/// Destroy the named region. Peers that still hold mappings keep them; new
/// opens fail until the name is recreated.
pub fn unlink(name: &str) -> Result<()> {
    let oname = PosixSharedMemory::object_name(name)?;
    // SAFETY: valid NUL-terminated string.
    if unsafe { libc::shm_unlink(oname.as_ptr()) } != 0 {
        return Err(map_errno());
    }
    Ok(())
}

fn map_errno() -> Error {
    match std::io::Error::last_os_error().raw_os_error().unwrap_or(0) {
        libc::ENOENT => Error::ChannelNotFound,
        libc::EEXIST => Error::ChannelAlreadyExists,
        libc::EACCES | libc::EPERM => Error::PermissionDenied,
        libc::ENOMEM => Error::OutOfMemory,
        libc::EBUSY => Error::ResourceBusy,
        libc::ENAMETOOLONG | libc::EINVAL => Error::InvalidChannelName,
        _ => Error::MappingFailed,
    }
}
