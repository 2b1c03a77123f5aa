//! Windows shared memory via pagefile-backed file mappings.

use swiftchannel_core::{Error, Result};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ACCESS_DENIED, ERROR_ALREADY_EXISTS, ERROR_FILE_NOT_FOUND,
    ERROR_NOT_ENOUGH_MEMORY, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
    MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
};

use crate::{validate_name, SharedMemory};

/// A Windows shared-memory mapping.
pub struct WindowsSharedMemory {
    name: String,
    handle: HANDLE,
    ptr: *mut u8,
    len: usize,
}

// SAFETY: same reasoning as the POSIX handle; the bytes are governed by the
// channel protocol.
unsafe impl Send for WindowsSharedMemory {}

impl WindowsSharedMemory {
    /// Channel name decorated into a session-local mapping name, UTF-16.
    fn object_name(name: &str) -> Result<Vec<u16>> {
        validate_name(name)?;
        let decorated = format!("Local\\SwiftChannel_{name}");
        Ok(decorated.encode_utf16().chain(std::iter::once(0)).collect())
    }

    /// Region name as seen by the channel, undecorated.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SharedMemory for WindowsSharedMemory {
    fn create_or_open(name: &str, size: usize, create: bool) -> Result<Self> {
        let wname = Self::object_name(name)?;
        if size == 0 {
            return Err(Error::InvalidMemoryLayout);
        }

        let handle = if create {
            // SAFETY: `wname` is NUL-terminated UTF-16. Pagefile-backed
            // mappings come back zero-initialized.
            unsafe {
                CreateFileMappingW(
                    INVALID_HANDLE_VALUE,
                    std::ptr::null(),
                    PAGE_READWRITE,
                    (size as u64 >> 32) as u32,
                    size as u32,
                    wname.as_ptr(),
                )
            }
        } else {
            // SAFETY: as above.
            unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, 0, wname.as_ptr()) }
        };
        if handle.is_null() {
            return Err(map_last_error());
        }

        // SAFETY: `handle` is a live mapping object of at least `size` bytes.
        let view: MEMORY_MAPPED_VIEW_ADDRESS =
            unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, size) };
        if view.Value.is_null() {
            let err = map_last_error();
            // SAFETY: handle is live and owned here.
            unsafe { CloseHandle(handle) };
            return Err(err);
        }

        tracing::debug!(name, size, create, "mapped shared-memory region");
        Ok(Self {
            name: name.to_owned(),
            handle,
            ptr: view.Value as *mut u8,
            len: size,
        })
    }

    fn close(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: `ptr` is the view produced by MapViewOfFile above.
            unsafe {
                UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS {
                    Value: self.ptr as *mut core::ffi::c_void,
                });
            }
            self.ptr = std::ptr::null_mut();
            self.len = 0;
        }
        if !self.handle.is_null() {
            // SAFETY: handle is live and owned here.
            unsafe { CloseHandle(self.handle) };
            self.handle = std::ptr::null_mut();
        }
    }

    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for WindowsSharedMemory {
    fn drop(&mut self) {
        self.close();
    }
}

fn map_last_error() -> Error {
    // SAFETY: plain TLS read.
    match unsafe { GetLastError() } {
        ERROR_FILE_NOT_FOUND => Error::ChannelNotFound,
        ERROR_ALREADY_EXISTS => Error::ChannelAlreadyExists,
        ERROR_ACCESS_DENIED => Error::PermissionDenied,
        ERROR_NOT_ENOUGH_MEMORY => Error::OutOfMemory,
        _ => Error::MappingFailed,
    }
}
