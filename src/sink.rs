// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Display sink: shows decoded NV12 pictures on the framebuffer through the
//! VEU.

use crate::{
    buffer::{BufferData, FlowError, Sink, VideoBuffer},
    error::{Error, Result},
    format::{luma_size, Framerate},
    framebuffer::{Framebuffer, FB_DEVICE},
    properties::{SinkSettings, Zoom},
    veu::{Configuration, Geometry, Veu},
};
use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};
use tracing::{debug, info, instrument, trace, warn};

/// Geometry of the surface the VEU writes into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    /// Line length in bytes.
    pub line_length: u32,
    pub physical_address: usize,
}

impl From<&Framebuffer> for Screen {
    fn from(fb: &Framebuffer) -> Self {
        Self {
            width: fb.width(),
            height: fb.height(),
            bits_per_pixel: fb.bits_per_pixel(),
            line_length: fb.line_length(),
            physical_address: fb.physical_address(),
        }
    }
}

/// Negotiated source stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceCaps {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
}

/// Destination size for `caps` on `screen`. An explicit width or height
/// wins, otherwise the zoom level is applied to the source size.
pub fn destination_size(
    settings: &SinkSettings,
    caps: &SourceCaps,
    screen: &Screen,
) -> Result<(u32, u32)> {
    let zoomed = |src: u32, full: u32| match settings.zoom {
        Zoom::Orig => Some(src),
        Zoom::Full => Some(full),
        Zoom::Double => src.checked_mul(2),
        Zoom::Half => Some((src / 2).max(1)),
    };
    let width = match settings.width {
        0 => zoomed(caps.width, screen.width),
        w => Some(w),
    };
    let height = match settings.height {
        0 => zoomed(caps.height, screen.height),
        h => Some(h),
    };
    match (width, height) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(Error::InvalidDimensions {
            width: caps.width,
            height: caps.height,
        }),
    }
}

struct Inner {
    veu: Veu,
    framebuffer: Option<Framebuffer>,
    caps: Option<SourceCaps>,
}

/// Consumer that blits every delivered picture to the screen.
///
/// Accepts hardware buffers, so a decoder in `auto` mode hands over physical
/// plane addresses instead of copies.
pub struct VideoSink {
    settings: SinkSettings,
    screen: Screen,
    inner: Mutex<Inner>,
}

impl VideoSink {
    /// Opens and clears `/dev/fb0` and the VEU.
    pub fn open(settings: SinkSettings) -> Result<Self> {
        let framebuffer = Framebuffer::open(FB_DEVICE)?;
        let veu = Veu::open()?;
        let mut sink = Self::new(settings, Screen::from(&framebuffer), veu);
        sink.inner_mut().framebuffer = Some(framebuffer);
        Ok(sink)
    }

    /// Builds a sink drawing into `screen` with an initialized VEU.
    pub fn new(settings: SinkSettings, screen: Screen, veu: Veu) -> Self {
        Self {
            settings,
            screen,
            inner: Mutex::new(Inner {
                veu,
                framebuffer: None,
                caps: None,
            }),
        }
    }

    pub fn settings(&self) -> &SinkSettings {
        &self.settings
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn caps(&self) -> Option<SourceCaps> {
        self.lock().caps
    }

    /// Runs `f` with exclusive access to the VEU.
    pub fn with_veu<R>(&self, f: impl FnOnce(&mut Veu) -> R) -> R {
        f(&mut self.lock().veu)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn inner_mut(&mut self) -> &mut Inner {
        self.inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accepts a source format and programs the VEU for it.
    #[instrument(skip(self))]
    pub fn set_caps(&self, caps: SourceCaps) -> Result<Configuration> {
        if caps.width == 0 || caps.height == 0 {
            return Err(Error::InvalidDimensions {
                width: caps.width,
                height: caps.height,
            });
        }
        let (dst_width, dst_height) = destination_size(&self.settings, &caps, &self.screen)?;
        let geometry = Geometry {
            src_width: caps.width,
            src_height: caps.height,
            dst_width,
            dst_height,
            dst_stride: self.screen.line_length,
            pos_x: self.settings.x,
            pos_y: self.settings.y,
            max_width: self.screen.width,
            max_height: self.screen.height,
            dst_address: self.screen.physical_address,
            bits_per_pixel: self.screen.bits_per_pixel,
        };

        let mut inner = self.lock();
        let config = inner.veu.configure(&geometry)?;
        inner.caps = Some(caps);
        info!(
            "showing {}x{} as {}x{} at {},{}",
            caps.width, caps.height, dst_width, dst_height, self.settings.x, self.settings.y
        );
        Ok(config)
    }

    /// Start and end time of `buffer` on the display clock.
    pub fn times(&self, buffer: &VideoBuffer) -> Result<(Duration, Duration)> {
        let start = buffer.timestamp.ok_or(Error::MissingTimestamp)?;
        if buffer.duration >= Duration::from_millis(1) {
            return Ok((start, start + buffer.duration));
        }
        match self.lock().caps {
            Some(caps) if caps.framerate.num > 0 => {
                Ok((start, start + caps.framerate.frame_duration()))
            }
            Some(caps) => Err(Error::InvalidFramerate {
                num: caps.framerate.num,
                den: caps.framerate.den,
            }),
            None => Err(Error::InvalidFramerate { num: 0, den: 1 }),
        }
    }

    /// Blits one picture and waits for the VEU to finish it.
    pub fn show_frame(&self, buffer: &VideoBuffer) -> Result<()> {
        let mut inner = self.lock();
        let caps = inner.caps.ok_or(Error::InvalidState {
            state: "unconfigured",
            operation: "show frame",
        })?;

        let (luma, chroma) = match &buffer.data {
            BufferData::Hardware { luma, chroma } => (luma.address, chroma.address),
            BufferData::Owned(data) => {
                let mem = inner.veu.memory().ok_or_else(|| {
                    Error::codec("VEU has no memory region to stage frames")
                })?;
                if data.len() > mem.len() {
                    return Err(Error::FrameSize {
                        expected: mem.len(),
                        actual: data.len(),
                    });
                }
                mem.as_mut_slice()[..data.len()].copy_from_slice(data);
                let base = mem.physical_address();
                (base, base + luma_size(caps.width, caps.height))
            }
        };

        trace!(sequence = buffer.sequence, "blit {luma:#x} {chroma:#x}");
        inner.veu.blit(luma, chroma)?;
        inner.veu.wait_for_completion()
    }

    /// Blanks the screen.
    pub fn stop(&self) {
        if let Some(fb) = self.lock().framebuffer.as_mut() {
            debug!("clearing framebuffer");
            fb.clear();
        }
    }
}

impl Sink for VideoSink {
    fn deliver(&self, buffer: VideoBuffer) -> Result<(), FlowError> {
        if let Err(e) = self.times(&buffer) {
            warn!("{e}");
            return Err(FlowError::Failed(e.to_string()));
        }
        self.show_frame(&buffer)
            .map_err(|e| FlowError::Failed(e.to_string()))
    }

    fn end_of_stream(&self) {
        debug!("display sink reached end of stream");
    }

    fn supports_hardware_buffers(&self) -> bool {
        true
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        if let Some(fb) = self.inner_mut().framebuffer.as_mut() {
            fb.clear();
        }
    }
}
