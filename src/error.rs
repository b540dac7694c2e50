// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::io;
use thiserror::Error;

/// Errors reported by the codec bridges, the VEU and the display sink.
///
/// Backpressure and partial consumption of decoder input are not errors and
/// never surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// No UIO device advertises the requested name.
    #[error("uio device {0} not found")]
    DeviceNotFound(String),

    /// The opened device is not the expected hardware block.
    #[error("device name mismatch: expected {expected}, found {found}")]
    DeviceMismatch { expected: String, found: String },

    /// Mapping a device memory region failed.
    #[error("failed to map {what}: {source}")]
    Map {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// A VEU operation was issued out of order.
    #[error("veu is {state}, cannot {operation}")]
    InvalidState {
        state: &'static str,
        operation: &'static str,
    },

    /// A raw frame does not hold exactly one NV12 picture.
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    /// Media type the hardware codec cannot handle.
    #[error("unsupported media type {0}")]
    UnsupportedFormat(String),

    /// No codec format was negotiated or configured.
    #[error("codec format undefined")]
    FormatUndefined,

    #[error("invalid framerate {num}/{den}")]
    InvalidFramerate { num: u32, den: u32 },

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The bridge was paused or has finished; no more data is accepted.
    #[error("stream stopped")]
    Stopped,

    /// Loading or initialising the vendor codec library failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// A control file line matched a key but is malformed.
    #[error("control file {path}: key {key} {problem}")]
    ControlSyntax {
        path: String,
        key: String,
        problem: &'static str,
    },

    #[error("unknown property {0}")]
    UnknownProperty(String),

    #[error("invalid value {value:?} for property {name}")]
    InvalidProperty { name: String, value: String },

    /// A buffer reached the display sink without a timestamp.
    #[error("no timestamp set for the buffer")]
    MissingTimestamp,
}

impl Error {
    pub fn map(what: impl Into<String>, source: io::Error) -> Self {
        Self::Map {
            what: what.into(),
            source,
        }
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
