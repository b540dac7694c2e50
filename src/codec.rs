// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Calling contracts between the bridges and the hardware codec drivers.
//!
//! A driver runs on the bridge's drive thread and calls back into the bridge
//! synchronously: the encoder pulls raw frames through [`EncoderIo`] and
//! pushes encoded bytes back through it, the decoder pushes pictures into a
//! [`FrameSink`] from inside [`DecoderDriver::decode`]. Drivers never see the
//! bridge's locks or threads.

use crate::{buffer::PhysicalPlane, error::Result};

/// Callback verdict returned to the driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop driving; the driver returns from its run call.
    Pause,
}

impl Flow {
    /// Return code of the vendor callbacks: 0 continues, 1 pauses.
    pub fn code(self) -> i32 {
        match self {
            Self::Continue => 0,
            Self::Pause => 1,
        }
    }
}

/// One NV12 picture queued for the encoder, with interleaved chroma.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePair {
    pub luma: Vec<u8>,
    pub chroma: Vec<u8>,
}

/// Answer to an encoder input request.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Frame(FramePair),
    /// Nothing queued yet; the driver asks again.
    Empty,
    Pause,
}

/// Bridge side of a running encoder.
pub trait EncoderIo {
    /// Called whenever the encoder is ready for the next picture. Never
    /// blocks.
    fn provide_input(&mut self) -> Input;

    /// Called with each piece of encoded stream.
    fn consume_output(&mut self, data: &[u8]) -> Flow;
}

pub trait EncoderDriver: Send {
    /// Encodes until a callback returns [`Input::Pause`] or [`Flow::Pause`].
    fn run(&mut self, io: &mut dyn EncoderIo) -> Result<()>;
}

/// Planes of a decoded picture, valid for the duration of the callback.
#[derive(Debug)]
pub enum Planes<'a> {
    /// Hardware owned memory, referenced by physical address.
    Physical {
        luma: PhysicalPlane,
        chroma: PhysicalPlane,
    },
    /// Picture mapped into this process.
    Mapped { luma: &'a [u8], chroma: &'a [u8] },
}

/// Bridge side of a running decoder.
pub trait FrameSink {
    fn frame_decoded(&mut self, planes: Planes<'_>) -> Flow;
}

pub trait DecoderDriver: Send {
    /// Decodes as much of `data` as forms complete units and returns the
    /// number of bytes consumed. Pictures are passed to `frames` as they
    /// complete.
    fn decode(&mut self, data: &[u8], frames: &mut dyn FrameSink) -> Result<usize>;

    /// Flushes pictures still held by the decoder at end of stream.
    fn finalize(&mut self, frames: &mut dyn FrameSink) -> Result<()>;

    /// Pictures decoded so far.
    fn frame_count(&self) -> u64;

    /// Selects [`Planes::Physical`] output. Drivers that can only map their
    /// pictures ignore it.
    fn set_physical_output(&mut self, enabled: bool) -> Result<()> {
        let _ = enabled;
        Ok(())
    }
}
