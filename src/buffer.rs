// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Timestamped output buffers and the downstream delivery contract.

use crate::format::Framerate;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

/// One plane of a picture that lives in hardware memory, addressed
/// physically.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhysicalPlane {
    pub address: usize,
    pub size: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum BufferData {
    /// Bytes owned by the buffer: an encoded frame, or a decoded NV12 picture
    /// with the chroma plane directly after the luma plane.
    Owned(Vec<u8>),
    /// Zero-copy reference to a decoded picture still held by the VPU.
    Hardware {
        luma: PhysicalPlane,
        chroma: PhysicalPlane,
    },
}

/// Buffer handed downstream by the bridges.
#[derive(Debug, PartialEq, Eq)]
pub struct VideoBuffer {
    pub data: BufferData,
    pub timestamp: Option<Duration>,
    pub duration: Duration,
    pub sequence: u64,
}

impl VideoBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: BufferData::Owned(data),
            timestamp: None,
            duration: Duration::ZERO,
            sequence: 0,
        }
    }

    pub fn hardware(luma: PhysicalPlane, chroma: PhysicalPlane) -> Self {
        Self {
            data: BufferData::Hardware { luma, chroma },
            timestamp: None,
            duration: Duration::ZERO,
            sequence: 0,
        }
    }

    /// Bytes of an owned buffer; `None` for hardware buffers.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match &self.data {
            BufferData::Owned(data) => Some(data),
            BufferData::Hardware { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            BufferData::Owned(data) => data.len(),
            BufferData::Hardware { luma, chroma } => luma.size + chroma.size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self.data, BufferData::Hardware { .. })
    }
}

/// Why a downstream consumer refused a buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("not linked")]
    NotLinked,
    #[error("flushing")]
    Flushing,
    #[error("end of stream")]
    Eos,
    #[error("{0}")]
    Failed(String),
}

/// Downstream consumer of the bridges' output.
///
/// Called from the bridge drive threads, hence `Send + Sync`.
pub trait Sink: Send + Sync {
    fn deliver(&self, buffer: VideoBuffer) -> Result<(), FlowError>;

    /// End of stream; the bridges call this at most once per stream.
    fn end_of_stream(&self) {}

    /// Whether the consumer accepts [`BufferData::Hardware`] buffers.
    fn supports_hardware_buffers(&self) -> bool {
        false
    }
}

/// Stamps consecutive output buffers with `index * 1/framerate`.
#[derive(Debug)]
pub struct FrameStamper {
    framerate: Framerate,
    next: u64,
}

impl FrameStamper {
    pub fn new(framerate: Framerate) -> Self {
        Self { framerate, next: 0 }
    }

    pub fn stamp(&mut self, mut buffer: VideoBuffer) -> VideoBuffer {
        buffer.duration = self.framerate.frame_duration();
        buffer.timestamp = Some(self.framerate.timestamp(self.next));
        buffer.sequence = self.next;
        self.next += 1;
        buffer
    }

    pub fn frames(&self) -> u64 {
        self.next
    }
}

/// Ensures a stream signals end-of-stream downstream exactly once.
#[derive(Debug, Default)]
pub struct EosLatch(AtomicBool);

impl EosLatch {
    /// Forwards EOS to `sink` unless it was already sent. Returns whether
    /// this call sent it.
    pub fn send(&self, sink: &dyn Sink) -> bool {
        if self
            .0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("sending eos downstream");
            sink.end_of_stream();
            true
        } else {
            false
        }
    }

    pub fn is_sent(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
