// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Linux framebuffer the display sink blits into.

use crate::{error::Result, registers::Mapping};
use libc::{c_char, c_ulong};
use std::{
    fs::OpenOptions,
    io,
    os::fd::{AsFd, AsRawFd},
    path::Path,
};
use tracing::debug;

pub const FB_DEVICE: &str = "/dev/fb0";

const FBIOGET_VSCREENINFO: u32 = 0x4600;
const FBIOGET_FSCREENINFO: u32 = 0x4602;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct FbBitfield {
    pub offset: u32,
    pub length: u32,
    pub msb_right: u32,
}

/// `struct fb_var_screeninfo`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct FbVarScreeninfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub grayscale: u32,
    pub red: FbBitfield,
    pub green: FbBitfield,
    pub blue: FbBitfield,
    pub transp: FbBitfield,
    pub nonstd: u32,
    pub activate: u32,
    pub height: u32,
    pub width: u32,
    pub accel_flags: u32,
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

/// `struct fb_fix_screeninfo`
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct FbFixScreeninfo {
    pub id: [c_char; 16],
    pub smem_start: c_ulong,
    pub smem_len: u32,
    pub type_: u32,
    pub type_aux: u32,
    pub visual: u32,
    pub xpanstep: u16,
    pub ypanstep: u16,
    pub ywrapstep: u16,
    pub line_length: u32,
    pub mmio_start: c_ulong,
    pub mmio_len: u32,
    pub accel: u32,
    pub capabilities: u16,
    pub reserved: [u16; 2],
}

impl Default for FbFixScreeninfo {
    fn default() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

nix::ioctl_read_bad!(fbioget_vscreeninfo, FBIOGET_VSCREENINFO, FbVarScreeninfo);
nix::ioctl_read_bad!(fbioget_fscreeninfo, FBIOGET_FSCREENINFO, FbFixScreeninfo);

/// A mapped framebuffer device.
#[derive(Debug)]
pub struct Framebuffer {
    var: FbVarScreeninfo,
    fix: FbFixScreeninfo,
    map: Mapping,
}

impl Framebuffer {
    /// Opens, maps and clears the framebuffer at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut var = FbVarScreeninfo::default();
        let mut fix = FbFixScreeninfo::default();
        unsafe {
            fbioget_vscreeninfo(file.as_raw_fd(), &mut var).map_err(io::Error::from)?;
            fbioget_fscreeninfo(file.as_raw_fd(), &mut fix).map_err(io::Error::from)?;
        }

        let map = Mapping::shared(
            file.as_fd(),
            fix.smem_len as usize,
            0,
            fix.smem_start as usize,
        )?;
        let mut fb = Self { var, fix, map };
        fb.clear();

        debug!(
            "{} {}x{} {}bpp line {} at {:#x}",
            path.display(),
            fb.width(),
            fb.height(),
            fb.bits_per_pixel(),
            fb.line_length(),
            fb.physical_address()
        );
        Ok(fb)
    }

    pub fn width(&self) -> u32 {
        self.var.xres
    }

    pub fn height(&self) -> u32 {
        self.var.yres
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.var.bits_per_pixel
    }

    pub fn line_length(&self) -> u32 {
        self.fix.line_length
    }

    pub fn physical_address(&self) -> usize {
        self.fix.smem_start as usize
    }

    /// Blanks the visible screen.
    pub fn clear(&mut self) {
        let visible = self.fix.line_length as usize * self.var.yres as usize;
        let mem = self.map.as_mut_slice();
        let len = visible.min(mem.len());
        mem[..len].fill(0);
    }
}
