// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # SH-Mobile Video Library
//!
//! Bridges between streaming producers and the SH-Mobile hardware video
//! blocks: the VPU encoder and decoder driven through the vendor
//! `libshcodecs` library, and the VEU which converts and scales decoded
//! pictures into the framebuffer.
//!
//! ## Features
//!
//! - **Encoder bridge**: one-slot hand-off of raw NV12 frames to the
//!   callback driven hardware encoder, with backpressure and soft stop.
//! - **Decoder bridge**: growable input buffer that preserves bytes the
//!   decoder did not consume and blocks the producer past a size limit.
//! - **VEU programming**: UIO device discovery, register access, resize
//!   factor computation and interrupt driven blits.
//! - **Display sink**: zero-copy display of decoded hardware buffers.
//! - **Control files**: the vendor `key = value;` encoder settings format.
//!
//! ## Example
//!
//! ```no_run
//! use shmobile_video::{
//!     decoder::{DecoderBridge, DecoderConfig, DEFAULT_MAX_BUFFERED},
//!     format::{Framerate, HwBufferMode, VideoFormat},
//!     properties::SinkSettings,
//!     shcodecs::{load_library, ShDecoder},
//!     sink::{SourceCaps, VideoSink},
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let framerate = Framerate::new(30, 1)?;
//! let sink = Arc::new(VideoSink::open(SinkSettings::default())?);
//! sink.set_caps(SourceCaps { width: 320, height: 240, framerate })?;
//!
//! let driver = ShDecoder::new(load_library()?, VideoFormat::H264, 320, 240)?;
//! let config = DecoderConfig {
//!     format: VideoFormat::H264,
//!     width: 320,
//!     height: 240,
//!     framerate,
//!     max_buffered: DEFAULT_MAX_BUFFERED,
//!     hw_buffer: HwBufferMode::Auto,
//! };
//! let mut decoder = DecoderBridge::new(config, Box::new(driver), sink)?;
//! decoder.submit_chunk(&std::fs::read("clip.264")?)?;
//! decoder.finish()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux** with the SH-Mobile UIO drivers exposing `VEU2H` and the VPU
//! - `libshcodecs.so.0` for the encoder and decoder drivers
//!
//! ## Safety
//!
//! Register access, device memory mapping and the vendor library callbacks
//! use `unsafe` code. It is confined to the `registers`, `framebuffer` and
//! `shcodecs` modules behind safe APIs.

pub mod buffer;
pub mod codec;
pub mod control;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;
pub mod framebuffer;
pub mod properties;
pub mod registers;
pub mod scale;
pub mod shcodecs;
pub mod sink;
pub mod uio;
pub mod veu;
