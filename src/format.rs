// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Stream formats shared by the encoder, decoder and display sink.

use crate::error::{Error, Result};
use core::fmt;
use std::{str::FromStr, time::Duration};

/// Compressed formats handled by the SH-Mobile VPU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VideoFormat {
    Mpeg4,
    H264,
}

impl VideoFormat {
    /// Maps a decoder sink media type to a codec format.
    ///
    /// DivX and XviD streams are MPEG4 part 2 and decode as such.
    pub fn from_media_type(media_type: &str) -> Result<Self> {
        match media_type {
            "video/x-h264" => Ok(Self::H264),
            "video/mpeg" | "video/x-divx" | "video/x-xvid" => Ok(Self::Mpeg4),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    /// Maps the media type accepted downstream of the encoder. Anything else
    /// leaves the choice to the control file.
    pub fn from_downstream(media_type: &str) -> Option<Self> {
        match media_type {
            "video/mpeg" => Some(Self::Mpeg4),
            "video/x-h264" => Some(Self::H264),
            _ => None,
        }
    }

    /// Maps the `stream_type` control file value.
    pub fn from_stream_type(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Mpeg4),
            2 => Some(Self::H264),
            _ => None,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Mpeg4 => "video/mpeg",
            Self::H264 => "video/x-h264",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Mpeg4 => write!(f, "mpeg4"),
            Self::H264 => write!(f, "h264"),
        }
    }
}

impl FromStr for VideoFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mpeg4" | "m4v" => Ok(Self::Mpeg4),
            "h264" | "264" => Ok(Self::H264),
            other => Self::from_media_type(other),
        }
    }
}

/// Stream framerate as a fraction of frames per second.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Framerate {
    pub num: u32,
    pub den: u32,
}

impl Framerate {
    pub fn new(num: u32, den: u32) -> Result<Self> {
        if num == 0 || den == 0 {
            return Err(Error::InvalidFramerate { num, den });
        }
        Ok(Self { num, den })
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 * self.den as u64 / self.num as u64)
    }

    /// Presentation time of frame `index` for a stream starting at zero.
    pub fn timestamp(&self, index: u64) -> Duration {
        Duration::from_nanos((self.frame_duration().as_nanos() as u64).saturating_mul(index))
    }

    /// Value of the encoder `frame_rate` knob, in tenths of a frame per
    /// second of the integer rate.
    pub fn encoder_rate(&self) -> i64 {
        (self.num / self.den) as i64 * 10
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Framerate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidProperty {
            name: "framerate".to_string(),
            value: s.to_string(),
        };
        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (num, den),
            None => (s, "1"),
        };
        let num = num.trim().parse().map_err(|_| invalid())?;
        let den = den.trim().parse().map_err(|_| invalid())?;
        Self::new(num, den)
    }
}

/// Layout of the chroma half of an incoming 4:2:0 frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ChromaLayout {
    /// A full Cb plane followed by a full Cr plane; interleaved on copy.
    #[default]
    Planar,
    /// CbCr pairs as the hardware expects them (NV12); copied verbatim.
    Interleaved,
}

impl ChromaLayout {
    /// Maps the `yuv_CbCr_format` control file value.
    pub fn from_control(value: i64) -> Self {
        if value == 0 {
            Self::Planar
        } else {
            Self::Interleaved
        }
    }
}

/// Tri-state hardware buffer passthrough selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum HwBufferMode {
    #[default]
    Auto,
    Yes,
    No,
}

impl HwBufferMode {
    /// Resolves `Auto` against the downstream zero-copy capability.
    pub fn resolve(self, downstream_zero_copy: bool) -> bool {
        match self {
            Self::Auto => downstream_zero_copy,
            Self::Yes => true,
            Self::No => false,
        }
    }
}

impl fmt::Display for HwBufferMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
        }
    }
}

impl FromStr for HwBufferMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            other => Err(Error::InvalidProperty {
                name: "hw-buffer".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Luma plane size of an NV12 picture.
pub const fn luma_size(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Chroma plane size of an NV12 picture.
pub const fn chroma_size(width: u32, height: u32) -> usize {
    luma_size(width, height) / 2
}

/// Total size of an NV12 picture.
pub const fn frame_size(width: u32, height: u32) -> usize {
    luma_size(width, height) + chroma_size(width, height)
}

/// Interleaves a planar Cb/Cr half into CbCr pairs.
///
/// `src` holds the Cb plane followed by the Cr plane; `dst` must be the same
/// length as `src`.
pub fn interleave_chroma(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    let (cb, cr) = src.split_at(src.len() / 2);
    for ((pair, cb), cr) in dst.chunks_exact_mut(2).zip(cb).zip(cr) {
        pair[0] = *cb;
        pair[1] = *cr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_types() {
        assert_eq!(
            VideoFormat::from_media_type("video/x-h264").unwrap(),
            VideoFormat::H264
        );
        for mpeg4 in ["video/mpeg", "video/x-divx", "video/x-xvid"] {
            assert_eq!(
                VideoFormat::from_media_type(mpeg4).unwrap(),
                VideoFormat::Mpeg4
            );
        }
        assert!(matches!(
            VideoFormat::from_media_type("video/x-vp8"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert_eq!(VideoFormat::from_downstream("video/x-divx"), None);
        assert_eq!(VideoFormat::from_stream_type(2), Some(VideoFormat::H264));
        assert_eq!(VideoFormat::from_stream_type(1), None);
    }

    #[test]
    fn framerate_timing() {
        let fps = Framerate::new(25, 1).unwrap();
        assert_eq!(fps.frame_duration(), Duration::from_millis(40));
        assert_eq!(fps.timestamp(0), Duration::ZERO);
        assert_eq!(fps.timestamp(10), Duration::from_millis(400));
        assert_eq!(fps.encoder_rate(), 250);

        let ntsc: Framerate = "30000/1001".parse().unwrap();
        assert_eq!(ntsc.frame_duration(), Duration::from_nanos(33_366_666));
        assert_eq!(ntsc.encoder_rate(), 290);

        assert!(Framerate::new(0, 1).is_err());
        assert!("15/0".parse::<Framerate>().is_err());
        assert_eq!("15".parse::<Framerate>().unwrap(), Framerate::new(15, 1).unwrap());
    }

    #[test]
    fn sizes() {
        assert_eq!(luma_size(320, 240), 76800);
        assert_eq!(chroma_size(320, 240), 38400);
        assert_eq!(frame_size(720, 576), 622080);
    }

    #[test]
    fn interleave() {
        let src = [1, 2, 3, 10, 20, 30];
        let mut dst = [0; 6];
        interleave_chroma(&src, &mut dst);
        assert_eq!(dst, [1, 10, 2, 20, 3, 30]);
    }

    #[test]
    fn hw_buffer_mode() {
        assert!(HwBufferMode::Auto.resolve(true));
        assert!(!HwBufferMode::Auto.resolve(false));
        assert!(HwBufferMode::Yes.resolve(false));
        assert!(!HwBufferMode::No.resolve(true));
        assert_eq!("no".parse::<HwBufferMode>().unwrap(), HwBufferMode::No);
        assert!("maybe".parse::<HwBufferMode>().is_err());
        assert_eq!(HwBufferMode::Auto.to_string(), "auto");
    }
}
