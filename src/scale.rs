// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Fixed point resize factors for the VEU.
//!
//! The VEU expresses the source step per destination pixel as a 4.12 fixed
//! point value (denominator 4096). Upscales by exactly 2x, 4x or 8x use the
//! dedicated pixel repeat mode instead.

/// Fixed point denominator of the resize registers.
pub const SCALE_ONE: u32 = 4096;

/// Largest mantissa the 4-bit integer part of a resize field holds.
pub const MAX_MANTISSA: u32 = 0xf;

const FRACTION_MASK: u32 = SCALE_ONE - 1;
const FRACTION_STEP: u32 = 8;

/// Axis of a resize; selects the register half a [`ScaleProgram`] lands in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub const fn shift(self) -> u32 {
        match self {
            Self::Horizontal => 0,
            Self::Vertical => 16,
        }
    }

    /// Bits of the resize registers owned by this axis.
    pub const fn mask(self) -> u32 {
        0xffff << self.shift()
    }

    /// Places a 16-bit field into this axis' half of a register.
    pub const fn pack(self, field: u32) -> u32 {
        (field & 0xffff) << self.shift()
    }
}

/// Register values for one axis of a resize.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScaleProgram {
    pub mantissa: u32,
    /// Always a multiple of 8 and below [`SCALE_ONE`].
    pub fraction: u32,
    /// Pixel repeat count of the special upscale mode: 0, 1, 3 or 7.
    pub repeat: u32,
    /// Destination pixels actually written on this axis.
    pub crop: u32,
    /// Source pixels consumed, rounded up to a multiple of 4.
    pub rounded_size: u32,
}

impl ScaleProgram {
    /// Computes the resize of `input` source pixels to `output` destination
    /// pixels, of which only `crop` are written.
    ///
    /// All sizes must be non-zero.
    pub fn compute(input: u32, output: u32, crop: u32) -> Self {
        debug_assert!(input > 0 && output > 0);
        let (mantissa, fraction, repeat) = factor(input as u64, output as u64, crop as u64);
        let rounded_size = ((input as u64 * crop as u64 / output as u64 + 3) & !3) as u32;

        Self {
            mantissa,
            fraction,
            repeat,
            crop,
            rounded_size,
        }
    }

    /// Whether the factor fits the 4.12 register field. Downscales of about
    /// 16x and more do not.
    pub fn fits(&self) -> bool {
        self.mantissa <= MAX_MANTISSA
    }

    /// Value of this axis' half of the resize scale register.
    pub fn scale_field(&self) -> u32 {
        (self.mantissa << 12) | self.fraction
    }

    /// Value of this axis' half of the resize clip register.
    pub fn clip_field(&self) -> u32 {
        (self.repeat << 12) | self.crop
    }
}

fn factor(input: u64, output: u64, crop: u64) -> (u32, u32, u32) {
    let one = SCALE_ONE as u64;

    if input == output {
        // Cropping still needs a unit step.
        let mantissa = if crop != output { 1 } else { 0 };
        return (mantissa, 0, 0);
    }

    let upscale = output > input;
    if upscale {
        let fixed = one * input / output;
        let mantissa = (fixed / one) as u32;
        let fraction = (fixed % one) as u32 & !(FRACTION_STEP - 1);
        let repeat = match fraction {
            0x800 => 1,
            0x400 => 3,
            0x200 => 7,
            _ => 0,
        };
        if repeat != 0 {
            return (mantissa, fraction, repeat);
        }
    }

    let fixed = one * (input - 1) / (output + 1);
    let mut mantissa = (fixed / one) as u32;
    let mut fraction = (fixed % one) as u32;
    if fraction & (FRACTION_STEP - 1) != 0 {
        fraction &= !(FRACTION_STEP - 1);
        if upscale {
            fraction = fraction.saturating_sub(FRACTION_STEP);
        } else {
            fraction += FRACTION_STEP;
        }
    }
    if fraction > FRACTION_MASK {
        mantissa += 1;
        fraction -= SCALE_ONE;
    }
    (mantissa, fraction, 0)
}
