// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Memory mapped regions and the 32-bit register view over them.

use crate::error::{Error, Result};
use libc::{
    mmap, munmap, off_t, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, MAP_SHARED, PROT_READ, PROT_WRITE,
};
use std::{
    io,
    os::fd::{AsRawFd, BorrowedFd},
    ptr::{self, null_mut},
    slice,
};
use tracing::{trace, warn};

/// An `mmap`ed region, unmapped on drop.
///
/// `physical` is the bus address the region corresponds to, as reported by the
/// kernel, or 0 for memory that has no fixed physical location.
#[derive(Debug)]
pub struct Mapping {
    ptr: *mut u8,
    len: usize,
    physical: usize,
}

// The mapping is plain memory; ownership moves between threads with the
// element that holds it.
unsafe impl Send for Mapping {}

impl Mapping {
    /// Maps `len` bytes of `fd` starting at `offset`.
    pub fn shared(fd: BorrowedFd<'_>, len: usize, offset: off_t, physical: usize) -> Result<Self> {
        let ptr = unsafe {
            mmap(
                null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                fd.as_raw_fd(),
                offset,
            )
        };
        if ptr == MAP_FAILED {
            return Err(Error::map(
                format!("{len} bytes at offset {offset:#x}"),
                io::Error::last_os_error(),
            ));
        }
        trace!(len, offset, physical, "mapped region");
        Ok(Self {
            ptr: ptr as *mut u8,
            len,
            physical,
        })
    }

    /// Zero-filled private memory, for register blocks without hardware
    /// behind them.
    pub fn anonymous(len: usize) -> Result<Self> {
        let ptr = unsafe {
            mmap(
                null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == MAP_FAILED {
            return Err(Error::map(
                format!("{len} anonymous bytes"),
                io::Error::last_os_error(),
            ));
        }
        Ok(Self {
            ptr: ptr as *mut u8,
            len,
            physical: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn physical_address(&self) -> usize {
        self.physical
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if unsafe { munmap(self.ptr as *mut libc::c_void, self.len) } != 0 {
            warn!("munmap failed: {}", io::Error::last_os_error());
        }
    }
}

/// Array of 32-bit device registers addressed by byte offset.
///
/// Every access is volatile so the compiler neither merges nor reorders
/// register writes. Offsets outside the region or not word aligned panic, the
/// same as out-of-range slice indexing.
#[derive(Debug)]
pub struct RegisterBlock {
    map: Mapping,
}

impl RegisterBlock {
    pub fn new(map: Mapping) -> Self {
        Self { map }
    }

    /// Register block backed by ordinary memory.
    pub fn anonymous(len: usize) -> Result<Self> {
        Ok(Self::new(Mapping::anonymous(len)?))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn word(&self, offset: usize) -> *mut u32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.map.len(),
            "register offset {offset:#x} outside {:#x} byte block",
            self.map.len()
        );
        unsafe { self.map.ptr.add(offset) as *mut u32 }
    }

    pub fn read(&self, offset: usize) -> u32 {
        unsafe { ptr::read_volatile(self.word(offset)) }
    }

    pub fn write(&mut self, offset: usize, value: u32) {
        trace!("reg {offset:#05x} <- {value:#010x}");
        unsafe { ptr::write_volatile(self.word(offset), value) }
    }

    /// Replaces the bits selected by `mask` with those of `value`.
    pub fn modify(&mut self, offset: usize, mask: u32, value: u32) {
        let current = self.read(offset);
        self.write(offset, (current & !mask) | (value & mask));
    }
}
