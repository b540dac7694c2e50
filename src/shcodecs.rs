// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Encoder and decoder drivers over the vendor `libshcodecs` library.
//!
//! The library calls back into Rust from inside `shcodecs_encoder_run` and
//! `shcodecs_decode`. The trampolines below receive a pointer to a context
//! struct living on the caller's stack for the duration of that call and
//! forward to the bridge's [`EncoderIo`] or [`FrameSink`].

use crate::{
    buffer::PhysicalPlane,
    codec::{DecoderDriver, EncoderDriver, EncoderIo, Flow, FrameSink, Input, Planes},
    control::{apply_knobs, ControlFile, KnobTarget},
    error::{Error, Result},
    format::{Framerate, VideoFormat},
};
use libc::{c_int, c_long, c_uchar, c_void};
use shcodecs_sys::{
    shcodecs, SHCodecs_Decoder, SHCodecs_Encoder, SHCodecs_Format, SHCodecs_Format_H264,
    SHCodecs_Format_MPEG4, LIBRARY_NAME,
};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    ptr, slice,
    sync::Arc,
};
use tracing::{debug, error, instrument, trace};

/// Loads the vendor library.
pub fn load_library() -> Result<Arc<shcodecs>> {
    let lib = unsafe { shcodecs::new(LIBRARY_NAME) }
        .map_err(|e| Error::codec(format!("loading {LIBRARY_NAME}: {e}")))?;
    debug!("loaded {LIBRARY_NAME}");
    Ok(Arc::new(lib))
}

fn raw_format(format: VideoFormat) -> SHCodecs_Format {
    match format {
        VideoFormat::Mpeg4 => SHCodecs_Format_MPEG4,
        VideoFormat::H264 => SHCodecs_Format_H264,
    }
}

fn dimension(value: u32) -> Result<c_int> {
    c_int::try_from(value).map_err(|_| Error::codec(format!("dimension {value} out of range")))
}

/// Hardware encoder handle.
pub struct ShEncoder {
    lib: Arc<shcodecs>,
    handle: *mut SHCodecs_Encoder,
    format: VideoFormat,
}

// The handle is only ever used from one thread at a time.
unsafe impl Send for ShEncoder {}

impl ShEncoder {
    pub fn new(lib: Arc<shcodecs>, format: VideoFormat, width: u32, height: u32) -> Result<Self> {
        let handle = unsafe {
            lib.shcodecs_encoder_init(dimension(width)?, dimension(height)?, raw_format(format))
        };
        if handle.is_null() {
            return Err(Error::codec(format!(
                "encoder init failed for {format} {width}x{height}"
            )));
        }
        Ok(Self {
            lib,
            handle,
            format,
        })
    }

    /// Applies the control file knobs followed by the stream parameters.
    #[instrument(skip(self, control))]
    pub fn configure(
        &mut self,
        control: Option<&mut ControlFile>,
        width: u32,
        height: u32,
        framerate: Option<Framerate>,
    ) -> Result<()> {
        if let Some(file) = control {
            apply_knobs(file, self.format, self)?;
        }
        if let Some(rate) = framerate {
            self.set("frame_rate", rate.encoder_rate())?;
        }
        self.set("xpic_size", width as i64)?;
        self.set("ypic_size", height as i64)?;
        self.set("frame_no_increment", 1)?;
        self.set("frame_number_to_encode", -1)?;

        debug!(
            "encoder init: {}x{} {}fps format:{}",
            self.get("xpic_size")?,
            self.get("ypic_size")?,
            self.get("frame_rate")? / 10,
            unsafe { self.lib.shcodecs_encoder_get_stream_type(self.handle) }
        );
        Ok(())
    }

    /// Calls `shcodecs_encoder_set_<name>`.
    pub fn set(&mut self, name: &str, value: i64) -> Result<()> {
        let setter = unsafe { self.lib.encoder_setter(name) }
            .map_err(|e| Error::codec(format!("encoder setter {name}: {e}")))?;
        let ret = unsafe { setter(self.handle, value as c_long) };
        if ret < 0 {
            return Err(Error::codec(format!("set_{name}({value}) returned {ret}")));
        }
        Ok(())
    }

    /// Calls `shcodecs_encoder_get_<name>`.
    pub fn get(&self, name: &str) -> Result<i64> {
        let getter = unsafe { self.lib.encoder_getter(name) }
            .map_err(|e| Error::codec(format!("encoder getter {name}: {e}")))?;
        Ok(unsafe { getter(self.handle) } as i64)
    }
}

impl KnobTarget for ShEncoder {
    fn set_knob(&mut self, setter: &str, value: i64) -> Result<()> {
        self.set(setter, value)
    }
}

struct EncoderContext<'a> {
    io: &'a mut dyn EncoderIo,
    lib: &'a shcodecs,
}

unsafe extern "C" fn encoder_input(encoder: *mut SHCodecs_Encoder, user_data: *mut c_void) -> c_int {
    let ctx = &mut *(user_data as *mut EncoderContext);
    catch_unwind(AssertUnwindSafe(|| match ctx.io.provide_input() {
        Input::Frame(mut frame) => {
            // The library copies both planes before returning.
            ctx.lib.shcodecs_encoder_input_provide(
                encoder,
                frame.luma.as_mut_ptr(),
                frame.chroma.as_mut_ptr(),
            );
            Flow::Continue.code()
        }
        Input::Empty => Flow::Continue.code(),
        Input::Pause => Flow::Pause.code(),
    }))
    .unwrap_or_else(|_| {
        error!("panic in encoder input callback");
        Flow::Pause.code()
    })
}

unsafe extern "C" fn encoder_output(
    _encoder: *mut SHCodecs_Encoder,
    data: *mut c_uchar,
    length: c_int,
    user_data: *mut c_void,
) -> c_int {
    let ctx = &mut *(user_data as *mut EncoderContext);
    let data: &[u8] = if data.is_null() || length <= 0 {
        &[]
    } else {
        slice::from_raw_parts(data, length as usize)
    };
    catch_unwind(AssertUnwindSafe(|| ctx.io.consume_output(data).code())).unwrap_or_else(|_| {
        error!("panic in encoder output callback");
        Flow::Pause.code()
    })
}

impl EncoderDriver for ShEncoder {
    fn run(&mut self, io: &mut dyn EncoderIo) -> Result<()> {
        let lib = self.lib.clone();
        let mut ctx = EncoderContext { io, lib: &lib };
        let user_data = &mut ctx as *mut EncoderContext as *mut c_void;

        let ret = unsafe {
            lib.shcodecs_encoder_set_input_callback(self.handle, Some(encoder_input), user_data);
            lib.shcodecs_encoder_set_output_callback(self.handle, Some(encoder_output), user_data);
            let ret = lib.shcodecs_encoder_run(self.handle);
            lib.shcodecs_encoder_set_input_callback(self.handle, None, ptr::null_mut());
            lib.shcodecs_encoder_set_output_callback(self.handle, None, ptr::null_mut());
            ret
        };
        debug!(ret, "encoder run returned");
        if ret < 0 {
            return Err(Error::codec(format!("encoder run returned {ret}")));
        }
        Ok(())
    }
}

impl Drop for ShEncoder {
    fn drop(&mut self) {
        unsafe { self.lib.shcodecs_encoder_close(self.handle) };
    }
}

/// Hardware decoder handle, in frame-by-frame mode.
pub struct ShDecoder {
    lib: Arc<shcodecs>,
    handle: *mut SHCodecs_Decoder,
    physical: bool,
}

unsafe impl Send for ShDecoder {}

impl ShDecoder {
    pub fn new(lib: Arc<shcodecs>, format: VideoFormat, width: u32, height: u32) -> Result<Self> {
        let handle = unsafe {
            lib.shcodecs_decoder_init(dimension(width)?, dimension(height)?, raw_format(format))
        };
        if handle.is_null() {
            return Err(Error::codec(format!(
                "decoder init failed for {format} {width}x{height}"
            )));
        }
        unsafe { lib.shcodecs_decoder_set_frame_by_frame(handle, 1) };
        debug!("decoder {format} {width}x{height} initialised");
        Ok(Self {
            lib,
            handle,
            physical: false,
        })
    }

    fn with_callback<R>(&mut self, frames: &mut dyn FrameSink, f: impl FnOnce(&Self) -> R) -> R {
        let mut ctx = DecoderContext {
            frames,
            physical: self.physical,
        };
        let user_data = &mut ctx as *mut DecoderContext as *mut c_void;
        unsafe {
            self.lib
                .shcodecs_decoder_set_decoded_callback(self.handle, Some(decoded), user_data);
        }
        let result = f(self);
        unsafe {
            self.lib
                .shcodecs_decoder_set_decoded_callback(self.handle, None, ptr::null_mut());
        }
        result
    }
}

struct DecoderContext<'a> {
    frames: &'a mut dyn FrameSink,
    physical: bool,
}

unsafe extern "C" fn decoded(
    _decoder: *mut SHCodecs_Decoder,
    y_buf: *mut c_uchar,
    y_size: c_int,
    c_buf: *mut c_uchar,
    c_size: c_int,
    user_data: *mut c_void,
) -> c_int {
    let ctx = &mut *(user_data as *mut DecoderContext);
    let y_size = y_size.max(0) as usize;
    let c_size = c_size.max(0) as usize;
    let planes = if ctx.physical {
        Planes::Physical {
            luma: PhysicalPlane {
                address: y_buf as usize,
                size: y_size,
            },
            chroma: PhysicalPlane {
                address: c_buf as usize,
                size: c_size,
            },
        }
    } else if y_buf.is_null() || c_buf.is_null() {
        return Flow::Continue.code();
    } else {
        Planes::Mapped {
            luma: slice::from_raw_parts(y_buf, y_size),
            chroma: slice::from_raw_parts(c_buf, c_size),
        }
    };
    catch_unwind(AssertUnwindSafe(|| ctx.frames.frame_decoded(planes).code())).unwrap_or_else(
        |_| {
            error!("panic in decoded frame callback");
            Flow::Pause.code()
        },
    )
}

impl DecoderDriver for ShDecoder {
    fn decode(&mut self, data: &[u8], frames: &mut dyn FrameSink) -> Result<usize> {
        let len = data.len().min(c_int::MAX as usize) as c_int;
        // The library only reads the input.
        let ret = self.with_callback(frames, |dec| unsafe {
            dec.lib
                .shcodecs_decode(dec.handle, data.as_ptr() as *mut c_uchar, len)
        });
        trace!(len, ret, "shcodecs_decode");
        if ret < 0 {
            return Err(Error::codec(format!("decode returned {ret}")));
        }
        Ok(ret as usize)
    }

    fn finalize(&mut self, frames: &mut dyn FrameSink) -> Result<()> {
        let ret = self.with_callback(frames, |dec| unsafe {
            dec.lib.shcodecs_decoder_finalize(dec.handle)
        });
        if ret < 0 {
            return Err(Error::codec(format!("finalize returned {ret}")));
        }
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        unsafe { self.lib.shcodecs_decoder_get_frame_count(self.handle) }.max(0) as u64
    }

    fn set_physical_output(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            let ret = unsafe { self.lib.shcodecs_decoder_set_use_physical(self.handle, 1) };
            if ret < 0 {
                return Err(Error::codec(format!("set_use_physical returned {ret}")));
            }
        }
        self.physical = enabled;
        Ok(())
    }
}

impl Drop for ShDecoder {
    fn drop(&mut self) {
        unsafe { self.lib.shcodecs_decoder_close(self.handle) };
    }
}
