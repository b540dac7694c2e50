// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use serial_test::serial;
use shmobile_video::{
    buffer::{FlowError, Sink, VideoBuffer},
    control::{ControlFile, StreamHeader},
    encoder::{EncoderBridge, EncoderConfig},
    error::Result,
    format::{ChromaLayout, Framerate, VideoFormat},
    shcodecs::{load_library, ShEncoder},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

#[derive(Default)]
struct CountingSink {
    bytes: AtomicUsize,
    eos: AtomicUsize,
}

impl Sink for CountingSink {
    fn deliver(&self, buffer: VideoBuffer) -> Result<(), FlowError> {
        self.bytes.fetch_add(buffer.len(), Ordering::SeqCst);
        Ok(())
    }

    fn end_of_stream(&self) {
        self.eos.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
#[serial]
#[ignore = "needs libshcodecs and the VPU (run with --include-ignored to enable)"]
fn encode_grey_frames() -> Result<()> {
    let mut control = ControlFile::parse(
        "h264.ctl",
        "stream_type = 2;\nx_pic_size = 176;\ny_pic_size = 144;\nbitrate = 256000;\n",
    );
    let header = StreamHeader::read(&mut control);
    let framerate = Framerate::new(15, 1)?;
    let (format, config) = EncoderConfig::resolve(&header, None, 0, 0, framerate)?;
    assert_eq!(format, VideoFormat::H264);

    let mut driver = ShEncoder::new(load_library()?, format, config.width, config.height)?;
    driver.configure(Some(&mut control), config.width, config.height, Some(framerate))?;

    let sink = Arc::new(CountingSink::default());
    let config = EncoderConfig {
        chroma: ChromaLayout::Interleaved,
        ..config
    };
    let mut bridge = EncoderBridge::new(config, Box::new(driver), sink.clone());
    let frames = vec![0x80u8; config.frame_size() * 30];
    assert_eq!(bridge.pump(&frames[..])?, 30);

    assert!(sink.bytes.load(Ordering::SeqCst) > 0);
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);
    Ok(())
}
