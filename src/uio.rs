// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Userspace I/O device discovery, memory maps and interrupts.
//!
//! Devices are found by scanning `/sys/class/uio/uioN/name` for the first
//! entry whose name starts with the requested one. Map `N` of a device is
//! exposed by the kernel at `mmap` offset `N * page size`, with its physical
//! address and size published under `maps/mapN/`.

use crate::{
    error::{Error, Result},
    registers::Mapping,
};
use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Write},
    os::{fd::AsFd, unix::fs::OpenOptionsExt},
    path::{Path, PathBuf},
};
use tracing::debug;

pub const SYSFS_CLASS: &str = "/sys/class/uio";
pub const DEV_DIR: &str = "/dev";

/// Completion interrupt of a hardware block.
pub trait Interrupt: Send {
    /// Unmasks the interrupt in the driver for the next event.
    fn enable(&mut self) -> Result<()>;

    /// Blocks until the next interrupt and returns the driver's event count.
    fn wait(&mut self) -> Result<u32>;
}

/// An opened `/dev/uioN` device.
#[derive(Debug)]
pub struct UioDevice {
    name: String,
    path: PathBuf,
    file: File,
}

impl UioDevice {
    pub fn locate(name: &str) -> Result<Self> {
        Self::locate_in(Path::new(SYSFS_CLASS), Path::new(DEV_DIR), name)
    }

    /// Scans `class` for a device whose name starts with `name` and opens the
    /// matching node in `dev`. The scan stops at the first missing index.
    pub fn locate_in(class: &Path, dev: &Path, name: &str) -> Result<Self> {
        for index in 0.. {
            let path = class.join(format!("uio{index}"));
            let found = match fs::read_to_string(path.join("name")) {
                Ok(found) => found,
                Err(_) => break,
            };
            let found = found.lines().next().unwrap_or_default();
            if !found.starts_with(name) {
                continue;
            }

            let node = dev.join(format!("uio{index}"));
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_SYNC)
                .open(&node)?;
            debug!(name = found, node = %node.display(), "located uio device");
            return Ok(Self {
                name: found.to_string(),
                path,
                file,
            });
        }
        Err(Error::DeviceNotFound(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical address and size of map `index`.
    pub fn region(&self, index: usize) -> Result<(usize, usize)> {
        let dir = self.path.join("maps").join(format!("map{index}"));
        let read = |attr: &str| -> Result<usize> {
            let file = dir.join(attr);
            let text = fs::read_to_string(&file)
                .map_err(|e| Error::map(file.display().to_string(), e))?;
            Ok(parse_ulong(&text))
        };
        Ok((read("addr")?, read("size")?))
    }

    /// Maps region `index` of the device.
    pub fn map(&self, index: usize) -> Result<Mapping> {
        let (address, size) = self.region(index)?;
        let offset = index * page_size();
        debug!(
            device = %self.name,
            index,
            "map{index} {address:#x} ({size:#x} bytes)"
        );
        Mapping::shared(self.file.as_fd(), size, offset as libc::off_t, address)
    }
}

impl Interrupt for UioDevice {
    fn enable(&mut self) -> Result<()> {
        self.file.write_all(&1u32.to_ne_bytes())?;
        Ok(())
    }

    fn wait(&mut self) -> Result<u32> {
        let mut count = [0u8; 4];
        self.file.read_exact(&mut count)?;
        Ok(u32::from_ne_bytes(count))
    }
}

fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => 4096,
    }
}

/// Parses a sysfs number the way `strtoul(s, NULL, 0)` does: `0x` prefix for
/// hex, leading `0` for octal, decimal otherwise, stopping at the first
/// invalid digit.
pub fn parse_ulong(text: &str) -> usize {
    let text = text.trim();
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    usize::from_str_radix(&digits[..end], radix).unwrap_or(0)
}
