// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Dynamically loaded bindings for `libshcodecs`, the userspace driver of the
//! SH-Mobile VPU MPEG4/H.264 encoder and decoder.
//!
//! The library is opened at runtime so the crate builds on hosts without the
//! vendor SDK. Every function the bridges need is resolved eagerly in
//! [`shcodecs::from_library`]; a library missing one of them fails to load.
//! The encoder tuning setters (there are well over a hundred) are resolved
//! lazily by name through [`shcodecs::encoder_setter`].

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]
#![allow(clippy::missing_safety_doc)]

use libc::{c_int, c_long, c_uchar, c_void};

#[repr(C)]
pub struct SHCodecs_Encoder {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct SHCodecs_Decoder {
    _unused: [u8; 0],
}

pub type SHCodecs_Format = c_int;
pub const SHCodecs_Format_NONE: SHCodecs_Format = -1;
pub const SHCodecs_Format_MPEG4: SHCodecs_Format = 0;
pub const SHCodecs_Format_H264: SHCodecs_Format = 2;

/// Input request; return 0 to continue encoding, 1 to stop.
pub type SHCodecs_Encoder_Input =
    Option<unsafe extern "C" fn(encoder: *mut SHCodecs_Encoder, user_data: *mut c_void) -> c_int>;

/// Encoded output; return 0 to continue encoding, 1 to stop.
pub type SHCodecs_Encoder_Output = Option<
    unsafe extern "C" fn(
        encoder: *mut SHCodecs_Encoder,
        data: *mut c_uchar,
        length: c_int,
        user_data: *mut c_void,
    ) -> c_int,
>;

/// Decoded frame; return 0 to continue decoding.
pub type SHCodecs_Decoded_Callback = Option<
    unsafe extern "C" fn(
        decoder: *mut SHCodecs_Decoder,
        y_buf: *mut c_uchar,
        y_size: c_int,
        c_buf: *mut c_uchar,
        c_size: c_int,
        user_data: *mut c_void,
    ) -> c_int,
>;

/// Signature shared by every `shcodecs_encoder_set_*` knob.
pub type SHCodecs_Encoder_Setter =
    unsafe extern "C" fn(encoder: *mut SHCodecs_Encoder, value: c_long) -> c_long;

/// Signature shared by every `shcodecs_encoder_get_*` accessor.
pub type SHCodecs_Encoder_Getter = unsafe extern "C" fn(encoder: *mut SHCodecs_Encoder) -> c_long;

pub struct shcodecs {
    __library: ::libloading::Library,
    pub shcodecs_encoder_init: unsafe extern "C" fn(
        width: c_int,
        height: c_int,
        format: SHCodecs_Format,
    ) -> *mut SHCodecs_Encoder,
    pub shcodecs_encoder_close: unsafe extern "C" fn(encoder: *mut SHCodecs_Encoder),
    pub shcodecs_encoder_set_input_callback: unsafe extern "C" fn(
        encoder: *mut SHCodecs_Encoder,
        input_cb: SHCodecs_Encoder_Input,
        user_data: *mut c_void,
    ) -> c_int,
    pub shcodecs_encoder_set_output_callback: unsafe extern "C" fn(
        encoder: *mut SHCodecs_Encoder,
        output_cb: SHCodecs_Encoder_Output,
        user_data: *mut c_void,
    ) -> c_int,
    pub shcodecs_encoder_run: unsafe extern "C" fn(encoder: *mut SHCodecs_Encoder) -> c_int,
    pub shcodecs_encoder_input_provide: unsafe extern "C" fn(
        encoder: *mut SHCodecs_Encoder,
        y_input: *mut c_uchar,
        c_input: *mut c_uchar,
    ) -> c_int,
    pub shcodecs_encoder_get_stream_type: SHCodecs_Encoder_Getter,
    pub shcodecs_decoder_init: unsafe extern "C" fn(
        width: c_int,
        height: c_int,
        format: SHCodecs_Format,
    ) -> *mut SHCodecs_Decoder,
    pub shcodecs_decoder_close: unsafe extern "C" fn(decoder: *mut SHCodecs_Decoder),
    pub shcodecs_decoder_set_decoded_callback: unsafe extern "C" fn(
        decoder: *mut SHCodecs_Decoder,
        decoded_cb: SHCodecs_Decoded_Callback,
        user_data: *mut c_void,
    ),
    pub shcodecs_decoder_set_frame_by_frame:
        unsafe extern "C" fn(decoder: *mut SHCodecs_Decoder, frame_by_frame: c_int) -> c_int,
    pub shcodecs_decoder_set_use_physical:
        unsafe extern "C" fn(decoder: *mut SHCodecs_Decoder, use_physical: c_int) -> c_int,
    pub shcodecs_decode: unsafe extern "C" fn(
        decoder: *mut SHCodecs_Decoder,
        data: *mut c_uchar,
        len: c_int,
    ) -> c_int,
    pub shcodecs_decoder_finalize: unsafe extern "C" fn(decoder: *mut SHCodecs_Decoder) -> c_int,
    pub shcodecs_decoder_get_frame_count:
        unsafe extern "C" fn(decoder: *mut SHCodecs_Decoder) -> c_int,
}

impl shcodecs {
    pub unsafe fn new<P>(path: P) -> Result<Self, ::libloading::Error>
    where
        P: AsRef<::std::ffi::OsStr>,
    {
        let library = ::libloading::Library::new(path)?;
        Self::from_library(library)
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, ::libloading::Error>
    where
        L: Into<::libloading::Library>,
    {
        let __library = library.into();
        let shcodecs_encoder_init = *__library.get(b"shcodecs_encoder_init\0")?;
        let shcodecs_encoder_close = *__library.get(b"shcodecs_encoder_close\0")?;
        let shcodecs_encoder_set_input_callback =
            *__library.get(b"shcodecs_encoder_set_input_callback\0")?;
        let shcodecs_encoder_set_output_callback =
            *__library.get(b"shcodecs_encoder_set_output_callback\0")?;
        let shcodecs_encoder_run = *__library.get(b"shcodecs_encoder_run\0")?;
        let shcodecs_encoder_input_provide = *__library.get(b"shcodecs_encoder_input_provide\0")?;
        let shcodecs_encoder_get_stream_type =
            *__library.get(b"shcodecs_encoder_get_stream_type\0")?;
        let shcodecs_decoder_init = *__library.get(b"shcodecs_decoder_init\0")?;
        let shcodecs_decoder_close = *__library.get(b"shcodecs_decoder_close\0")?;
        let shcodecs_decoder_set_decoded_callback =
            *__library.get(b"shcodecs_decoder_set_decoded_callback\0")?;
        let shcodecs_decoder_set_frame_by_frame =
            *__library.get(b"shcodecs_decoder_set_frame_by_frame\0")?;
        let shcodecs_decoder_set_use_physical =
            *__library.get(b"shcodecs_decoder_set_use_physical\0")?;
        let shcodecs_decode = *__library.get(b"shcodecs_decode\0")?;
        let shcodecs_decoder_finalize = *__library.get(b"shcodecs_decoder_finalize\0")?;
        let shcodecs_decoder_get_frame_count =
            *__library.get(b"shcodecs_decoder_get_frame_count\0")?;
        Ok(shcodecs {
            __library,
            shcodecs_encoder_init,
            shcodecs_encoder_close,
            shcodecs_encoder_set_input_callback,
            shcodecs_encoder_set_output_callback,
            shcodecs_encoder_run,
            shcodecs_encoder_input_provide,
            shcodecs_encoder_get_stream_type,
            shcodecs_decoder_init,
            shcodecs_decoder_close,
            shcodecs_decoder_set_decoded_callback,
            shcodecs_decoder_set_frame_by_frame,
            shcodecs_decoder_set_use_physical,
            shcodecs_decode,
            shcodecs_decoder_finalize,
            shcodecs_decoder_get_frame_count,
        })
    }

    /// Resolves `shcodecs_encoder_set_<name>`.
    pub unsafe fn encoder_setter(
        &self,
        name: &str,
    ) -> Result<SHCodecs_Encoder_Setter, ::libloading::Error> {
        let symbol = format!("shcodecs_encoder_set_{name}\0");
        self.__library
            .get::<SHCodecs_Encoder_Setter>(symbol.as_bytes())
            .map(|sym| *sym)
    }

    /// Resolves `shcodecs_encoder_get_<name>`.
    pub unsafe fn encoder_getter(
        &self,
        name: &str,
    ) -> Result<SHCodecs_Encoder_Getter, ::libloading::Error> {
        let symbol = format!("shcodecs_encoder_get_{name}\0");
        self.__library
            .get::<SHCodecs_Encoder_Getter>(symbol.as_bytes())
            .map(|sym| *sym)
    }

    pub unsafe fn shcodecs_encoder_init(
        &self,
        width: c_int,
        height: c_int,
        format: SHCodecs_Format,
    ) -> *mut SHCodecs_Encoder {
        (self.shcodecs_encoder_init)(width, height, format)
    }

    pub unsafe fn shcodecs_encoder_close(&self, encoder: *mut SHCodecs_Encoder) {
        (self.shcodecs_encoder_close)(encoder)
    }

    pub unsafe fn shcodecs_encoder_set_input_callback(
        &self,
        encoder: *mut SHCodecs_Encoder,
        input_cb: SHCodecs_Encoder_Input,
        user_data: *mut c_void,
    ) -> c_int {
        (self.shcodecs_encoder_set_input_callback)(encoder, input_cb, user_data)
    }

    pub unsafe fn shcodecs_encoder_set_output_callback(
        &self,
        encoder: *mut SHCodecs_Encoder,
        output_cb: SHCodecs_Encoder_Output,
        user_data: *mut c_void,
    ) -> c_int {
        (self.shcodecs_encoder_set_output_callback)(encoder, output_cb, user_data)
    }

    pub unsafe fn shcodecs_encoder_run(&self, encoder: *mut SHCodecs_Encoder) -> c_int {
        (self.shcodecs_encoder_run)(encoder)
    }

    pub unsafe fn shcodecs_encoder_input_provide(
        &self,
        encoder: *mut SHCodecs_Encoder,
        y_input: *mut c_uchar,
        c_input: *mut c_uchar,
    ) -> c_int {
        (self.shcodecs_encoder_input_provide)(encoder, y_input, c_input)
    }

    pub unsafe fn shcodecs_encoder_get_stream_type(&self, encoder: *mut SHCodecs_Encoder) -> c_long {
        (self.shcodecs_encoder_get_stream_type)(encoder)
    }

    pub unsafe fn shcodecs_decoder_init(
        &self,
        width: c_int,
        height: c_int,
        format: SHCodecs_Format,
    ) -> *mut SHCodecs_Decoder {
        (self.shcodecs_decoder_init)(width, height, format)
    }

    pub unsafe fn shcodecs_decoder_close(&self, decoder: *mut SHCodecs_Decoder) {
        (self.shcodecs_decoder_close)(decoder)
    }

    pub unsafe fn shcodecs_decoder_set_decoded_callback(
        &self,
        decoder: *mut SHCodecs_Decoder,
        decoded_cb: SHCodecs_Decoded_Callback,
        user_data: *mut c_void,
    ) {
        (self.shcodecs_decoder_set_decoded_callback)(decoder, decoded_cb, user_data)
    }

    pub unsafe fn shcodecs_decoder_set_frame_by_frame(
        &self,
        decoder: *mut SHCodecs_Decoder,
        frame_by_frame: c_int,
    ) -> c_int {
        (self.shcodecs_decoder_set_frame_by_frame)(decoder, frame_by_frame)
    }

    pub unsafe fn shcodecs_decoder_set_use_physical(
        &self,
        decoder: *mut SHCodecs_Decoder,
        use_physical: c_int,
    ) -> c_int {
        (self.shcodecs_decoder_set_use_physical)(decoder, use_physical)
    }

    pub unsafe fn shcodecs_decode(
        &self,
        decoder: *mut SHCodecs_Decoder,
        data: *mut c_uchar,
        len: c_int,
    ) -> c_int {
        (self.shcodecs_decode)(decoder, data, len)
    }

    pub unsafe fn shcodecs_decoder_finalize(&self, decoder: *mut SHCodecs_Decoder) -> c_int {
        (self.shcodecs_decoder_finalize)(decoder)
    }

    pub unsafe fn shcodecs_decoder_get_frame_count(&self, decoder: *mut SHCodecs_Decoder) -> c_int {
        (self.shcodecs_decoder_get_frame_count)(decoder)
    }
}

/// Default soname of the vendor library.
pub const LIBRARY_NAME: &str = "libshcodecs.so.0";
