// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! VEU2H colour space conversion, scaling and blit.
//!
//! The VEU reads an NV12 picture from physical memory, resizes it and writes
//! RGB into the framebuffer. It is programmed once per geometry with
//! [`Veu::configure`], then driven once per frame with [`Veu::blit`] followed
//! by [`Veu::wait_for_completion`].

use crate::{
    error::{Error, Result},
    registers::{Mapping, RegisterBlock},
    scale::{Axis, ScaleProgram},
    uio::{Interrupt, UioDevice},
};
use std::fmt;
use tracing::{debug, instrument, warn};

/// UIO name of the VEU block.
pub const VEU_NAME: &str = "VEU2H";

/// Byte offsets of the VEU registers.
pub mod regs {
    /// Start.
    pub const VESTR: usize = 0x00;
    /// Source line length.
    pub const VESWR: usize = 0x10;
    /// Source width and height.
    pub const VESSR: usize = 0x14;
    /// Source Y plane address.
    pub const VSAYR: usize = 0x18;
    /// Source C plane address.
    pub const VSACR: usize = 0x1c;
    /// Bundle mode.
    pub const VBSSR: usize = 0x20;
    /// Destination line length.
    pub const VEDWR: usize = 0x30;
    /// Destination Y/RGB plane address.
    pub const VDAYR: usize = 0x34;
    /// Destination C plane address.
    pub const VDACR: usize = 0x38;
    /// Transform control.
    pub const VTRCR: usize = 0x50;
    /// Resize scale.
    pub const VRFCR: usize = 0x54;
    /// Resize clip.
    pub const VRFSR: usize = 0x58;
    pub const VENHR: usize = 0x5c;
    pub const VFMCR: usize = 0x70;
    pub const VVTCR: usize = 0x74;
    pub const VHTCR: usize = 0x78;
    pub const VAPCR: usize = 0x80;
    pub const VECCR: usize = 0x84;
    pub const VAFXR: usize = 0x90;
    /// Byte swap.
    pub const VSWPR: usize = 0x94;
    /// Interrupt enable.
    pub const VEIER: usize = 0xa0;
    /// Interrupt event.
    pub const VEVTR: usize = 0xa4;
    pub const VSTAR: usize = 0xb0;
    /// Reset.
    pub const VBSRR: usize = 0xb4;
    pub const VMCR00: usize = 0x200;
    pub const VMCR01: usize = 0x204;
    pub const VMCR02: usize = 0x208;
    pub const VMCR10: usize = 0x20c;
    pub const VMCR11: usize = 0x210;
    pub const VMCR12: usize = 0x214;
    pub const VMCR20: usize = 0x218;
    pub const VMCR21: usize = 0x21c;
    pub const VMCR22: usize = 0x220;
    /// Colour conversion offset.
    pub const VCOFFR: usize = 0x224;
    /// Colour conversion clip.
    pub const VCBR: usize = 0x228;

    /// Size of the register window touched by the driver.
    pub const SPAN: usize = VCBR + 4;
}

use regs::*;

const RESET: u32 = 0x100;
const EVENT_CLEAR: u32 = 0x100;
const SWAP: u32 = 0x67;
/// NV12 in, RGB out.
const TRANSFORM_NV12_RGB: u32 = (6 << 16) | 2 | 4;
const COLOR_OFFSET: u32 = 0x0080_0010;

/// BT.601 YCbCr to RGB matrix.
const YUV_TO_RGB: [(usize, u32); 9] = [
    (VMCR00, 0x0cc5),
    (VMCR01, 0x0950),
    (VMCR02, 0x0000),
    (VMCR10, 0x397f),
    (VMCR11, 0x0950),
    (VMCR12, 0x3ccd),
    (VMCR20, 0x0000),
    (VMCR21, 0x0950),
    (VMCR22, 0x1023),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VeuState {
    Uninitialized,
    Initialized,
    Configured,
    Blitting,
}

impl VeuState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Configured => "configured",
            Self::Blitting => "blitting",
        }
    }
}

impl fmt::Display for VeuState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source and destination geometry of a VEU blit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub src_width: u32,
    pub src_height: u32,
    pub dst_width: u32,
    pub dst_height: u32,
    /// Destination line length in bytes.
    pub dst_stride: u32,
    pub pos_x: u32,
    pub pos_y: u32,
    /// Destination surface size; output beyond it is cropped.
    pub max_width: u32,
    pub max_height: u32,
    /// Physical address of the destination surface.
    pub dst_address: usize,
    pub bits_per_pixel: u32,
}

/// Resize chosen by [`Veu::configure`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub horizontal: ScaleProgram,
    pub vertical: ScaleProgram,
    pub src_stride: u32,
    /// Address of the first destination pixel written.
    pub dst_address: usize,
}

pub struct Veu {
    name: String,
    mmio: RegisterBlock,
    mem: Option<Mapping>,
    irq: Box<dyn Interrupt>,
    state: VeuState,
}

impl fmt::Debug for Veu {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Veu")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

impl Veu {
    /// Locates the VEU, maps its registers and general memory and resets it.
    pub fn open() -> Result<Self> {
        let dev = UioDevice::locate(VEU_NAME)?;
        let mmio = RegisterBlock::new(dev.map(0)?);
        let mem = dev.map(1)?;
        let mut veu = Self::from_parts(dev.name().to_string(), mmio, Some(mem), Box::new(dev));
        veu.initialize()?;
        Ok(veu)
    }

    /// Builds an uninitialized VEU from already mapped parts.
    pub fn from_parts(
        name: String,
        mmio: RegisterBlock,
        mem: Option<Mapping>,
        irq: Box<dyn Interrupt>,
    ) -> Self {
        Self {
            name,
            mmio,
            mem,
            irq,
            state: VeuState::Uninitialized,
        }
    }

    pub fn state(&self) -> VeuState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registers(&self) -> &RegisterBlock {
        &self.mmio
    }

    /// General purpose memory of the VEU, used to stage frames that do not
    /// already live in physical memory.
    pub fn memory(&mut self) -> Option<&mut Mapping> {
        self.mem.as_mut()
    }

    /// Resets the block.
    pub fn initialize(&mut self) -> Result<()> {
        self.expect(&[VeuState::Uninitialized, VeuState::Initialized], "initialize")?;
        self.mmio.write(VBSRR, RESET);
        self.state = VeuState::Initialized;
        debug!(name = %self.name, "veu reset");
        Ok(())
    }

    /// Programs source and destination geometry, resize and colour
    /// conversion. May be repeated to renegotiate.
    #[instrument(skip(self))]
    pub fn configure(&mut self, geometry: &Geometry) -> Result<Configuration> {
        self.expect(&[VeuState::Initialized, VeuState::Configured], "configure")?;
        self.check_name()?;

        let g = geometry;
        if g.src_width == 0 || g.src_height == 0 {
            return Err(Error::InvalidDimensions {
                width: g.src_width,
                height: g.src_height,
            });
        }
        if g.dst_width == 0 || g.dst_height == 0 {
            return Err(Error::InvalidDimensions {
                width: g.dst_width,
                height: g.dst_height,
            });
        }

        let src_stride = g
            .src_width
            .checked_add(15)
            .ok_or(Error::InvalidDimensions {
                width: g.src_width,
                height: g.src_height,
            })?
            & !15;
        let pos_x = g.pos_x & !3;
        let pos_y = g.pos_y;
        if pos_x >= g.max_width || pos_y >= g.max_height {
            return Err(Error::InvalidDimensions {
                width: g.max_width,
                height: g.max_height,
            });
        }

        let mut cropped_w = g.dst_width;
        let mut cropped_h = g.dst_height;
        if g.dst_width.saturating_add(pos_x) > g.max_width {
            cropped_w = g.max_width - pos_x;
        }
        if g.dst_height.saturating_add(pos_y) > g.max_height {
            cropped_h = g.max_height - pos_y;
        }

        let dst_address = g.dst_address
            + pos_x as usize * (g.bits_per_pixel / 8) as usize
            + pos_y as usize * g.dst_stride as usize;

        let horizontal = ScaleProgram::compute(g.src_width, g.dst_width, cropped_w);
        let vertical = ScaleProgram::compute(g.src_height, g.dst_height, cropped_h);
        if !horizontal.fits() || !vertical.fits() {
            warn!(
                "{}x{} -> {}x{} is beyond the resize range",
                g.src_width, g.src_height, g.dst_width, g.dst_height
            );
            return Err(Error::InvalidDimensions {
                width: g.dst_width,
                height: g.dst_height,
            });
        }
        self.program_axis(Axis::Horizontal, &horizontal);
        self.program_axis(Axis::Vertical, &vertical);

        self.mmio.write(VESWR, src_stride);
        self.mmio.write(
            VESSR,
            horizontal.rounded_size | (vertical.rounded_size << 16),
        );
        self.mmio.write(VBSSR, 0);

        self.mmio.write(VEDWR, g.dst_stride);
        self.mmio.write(VDAYR, dst_address as u32);
        self.mmio.write(VDACR, 0);

        self.mmio.write(VSWPR, SWAP);
        self.mmio.write(VTRCR, TRANSFORM_NV12_RGB);

        for (reg, value) in YUV_TO_RGB {
            self.mmio.write(reg, value);
        }
        self.mmio.write(VCOFFR, COLOR_OFFSET);

        self.mmio.write(VEIER, 1);

        self.state = VeuState::Configured;
        debug!(
            "{}x{} -> {}x{} (cropped {}x{}) at {},{}",
            g.src_width, g.src_height, g.dst_width, g.dst_height, cropped_w, cropped_h, pos_x, pos_y
        );

        Ok(Configuration {
            horizontal,
            vertical,
            src_stride,
            dst_address,
        })
    }

    /// Writes one axis into its half of the scale and clip registers.
    fn program_axis(&mut self, axis: Axis, program: &ScaleProgram) {
        self.mmio
            .modify(VRFCR, axis.mask(), axis.pack(program.scale_field()));
        self.mmio
            .modify(VRFSR, axis.mask(), axis.pack(program.clip_field()));
    }

    /// Starts conversion of the NV12 picture at the given physical plane
    /// addresses.
    pub fn blit(&mut self, luma: usize, chroma: usize) -> Result<()> {
        self.expect(&[VeuState::Configured], "blit")?;
        self.check_name()?;

        self.mmio.write(VSAYR, luma as u32);
        self.mmio.write(VSACR, chroma as u32);
        self.irq.enable()?;
        self.mmio.write(VESTR, 1);

        self.state = VeuState::Blitting;
        Ok(())
    }

    /// Blocks until the running blit signals completion, then acknowledges
    /// the event. There is no timeout.
    pub fn wait_for_completion(&mut self) -> Result<()> {
        self.expect(&[VeuState::Blitting], "wait for completion")?;
        let events = self.irq.wait()?;
        self.mmio.write(VEVTR, EVENT_CLEAR);
        self.state = VeuState::Configured;
        tracing::trace!(events, "veu blit complete");
        Ok(())
    }

    fn check_name(&self) -> Result<()> {
        if self.name != VEU_NAME {
            return Err(Error::DeviceMismatch {
                expected: VEU_NAME.to_string(),
                found: self.name.clone(),
            });
        }
        Ok(())
    }

    fn expect(&self, allowed: &[VeuState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                state: self.state.as_str(),
                operation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoIrq;

    impl Interrupt for NoIrq {
        fn enable(&mut self) -> Result<()> {
            Ok(())
        }

        fn wait(&mut self) -> Result<u32> {
            Ok(1)
        }
    }

    fn veu(name: &str) -> Veu {
        let mmio = RegisterBlock::anonymous(0x1000).unwrap();
        Veu::from_parts(name.to_string(), mmio, None, Box::new(NoIrq))
    }

    fn geometry() -> Geometry {
        Geometry {
            src_width: 320,
            src_height: 240,
            dst_width: 320,
            dst_height: 240,
            dst_stride: 800 * 2,
            pos_x: 0,
            pos_y: 0,
            max_width: 800,
            max_height: 480,
            dst_address: 0x1000_0000,
            bits_per_pixel: 16,
        }
    }

    #[test]
    fn state_order() {
        let mut veu = veu(VEU_NAME);
        assert!(matches!(
            veu.configure(&geometry()),
            Err(Error::InvalidState { state: "uninitialized", .. })
        ));
        veu.initialize().unwrap();
        assert_eq!(veu.registers().read(VBSRR), RESET);
        assert!(veu.blit(0, 0).is_err());
        assert!(veu.wait_for_completion().is_err());

        veu.configure(&geometry()).unwrap();
        veu.blit(0x100, 0x200).unwrap();
        assert_eq!(veu.state(), VeuState::Blitting);
        assert!(veu.blit(0x100, 0x200).is_err());
        veu.wait_for_completion().unwrap();
        assert_eq!(veu.state(), VeuState::Configured);
        assert_eq!(veu.registers().read(VEVTR), EVENT_CLEAR);
    }

    #[test]
    fn wrong_device() {
        let mut veu = veu("VPU5");
        veu.initialize().unwrap();
        assert!(matches!(
            veu.configure(&geometry()),
            Err(Error::DeviceMismatch { .. })
        ));
    }

    #[test]
    fn position_outside_surface() {
        let mut veu = veu(VEU_NAME);
        veu.initialize().unwrap();
        let mut g = geometry();
        g.pos_y = 480;
        assert!(matches!(
            veu.configure(&g),
            Err(Error::InvalidDimensions { .. })
        ));
    }
}
