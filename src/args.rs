// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use shmobile_video::{
    format::{Framerate, HwBufferMode, VideoFormat},
    properties::Zoom,
};
use std::path::PathBuf;

/// Element whose properties `inspect` prints.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum Element {
    /// Hardware encoder
    Encoder,
    /// Hardware decoder
    Decoder,
    /// VEU display sink
    Sink,
}

/// Command-line arguments for the SH-Mobile video tool.
///
/// Every option can also be given through the environment variable named in
/// its help text.
///
/// # Example
///
/// ```bash
/// shmobile-video encode --cntl-file h264.ctl --input in.yuv --output out.264
/// shmobile-video play --input clip.264 --zoom full
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also log to the systemd journal when it is available
    #[arg(long, env = "JOURNALD", global = true)]
    pub journald: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY", global = true)]
    pub tracy: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Encode raw NV12 (or planar 4:2:0) frames into MPEG4 or H.264
    Encode(EncodeArgs),
    /// Decode an MPEG4 or H.264 elementary stream into NV12 frames
    Decode(DecodeArgs),
    /// Decode a stream and show it on the framebuffer through the VEU
    Play(PlayArgs),
    /// Print the property schema of an element as JSON
    Inspect {
        #[arg(value_enum)]
        element: Element,
    },
}

#[derive(Parser, Debug, Clone)]
pub struct EncodeArgs {
    /// Raw input frames
    #[arg(short, long, env = "INPUT")]
    pub input: PathBuf,

    /// Encoded output stream
    #[arg(short, long, env = "OUTPUT")]
    pub output: PathBuf,

    /// Encoder control file
    #[arg(long, env = "CNTL_FILE")]
    pub cntl_file: PathBuf,

    /// Output format, overrides the control file stream_type
    #[arg(long, env = "FORMAT")]
    pub format: Option<VideoFormat>,

    /// Frame width, 0 takes x_pic_size from the control file
    #[arg(long, env = "WIDTH", default_value = "0")]
    pub width: u32,

    /// Frame height, 0 takes y_pic_size from the control file
    #[arg(long, env = "HEIGHT", default_value = "0")]
    pub height: u32,

    /// Input framerate as num/den
    #[arg(long, env = "FRAMERATE", default_value = "30/1")]
    pub framerate: Framerate,
}

#[derive(Parser, Debug, Clone)]
pub struct StreamArgs {
    /// Compressed input stream
    #[arg(short, long, env = "INPUT")]
    pub input: PathBuf,

    /// Stream format
    #[arg(long, env = "FORMAT", default_value = "h264")]
    pub format: VideoFormat,

    /// Picture width
    #[arg(long, env = "WIDTH")]
    pub width: u32,

    /// Picture height
    #[arg(long, env = "HEIGHT")]
    pub height: u32,

    /// Stream framerate as num/den
    #[arg(long, env = "FRAMERATE", default_value = "30/1")]
    pub framerate: Framerate,

    /// Limit of buffered compressed input in kB, 0 for no limit
    #[arg(long, env = "BUFFER_SIZE", default_value = "1000")]
    pub buffer_size: u32,

    /// Pass hardware buffers downstream: auto, yes or no
    #[arg(long, env = "HW_BUFFER", default_value = "auto")]
    pub hw_buffer: HwBufferMode,

    /// Bytes read from the input per submitted chunk
    #[arg(long, env = "CHUNK_SIZE", default_value = "4096")]
    pub chunk_size: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Decoded NV12 output
    #[arg(short, long, env = "OUTPUT")]
    pub output: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct PlayArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Output width, 0 for the source width
    #[arg(long, env = "OUT_WIDTH", default_value = "0")]
    pub out_width: u32,

    /// Output height, 0 for the source height
    #[arg(long, env = "OUT_HEIGHT", default_value = "0")]
    pub out_height: u32,

    /// Horizontal position on screen
    #[arg(short, long, env = "POS_X", default_value = "0")]
    pub x: u32,

    /// Vertical position on screen
    #[arg(short, long, env = "POS_Y", default_value = "0")]
    pub y: u32,

    /// Zoom level: orig, full, double or half
    #[arg(long, env = "ZOOM", default_value = "orig")]
    pub zoom: Zoom,
}
