// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use serial_test::serial;
use shmobile_video::{
    buffer::{FlowError, PhysicalPlane, Sink, VideoBuffer},
    error::{Error, Result},
    format::{frame_size, Framerate},
    framebuffer::{Framebuffer, FB_DEVICE},
    properties::{SinkSettings, Zoom},
    registers::{Mapping, RegisterBlock},
    sink::{Screen, SourceCaps, VideoSink},
    uio::{Interrupt, UioDevice},
    veu::{regs::*, Geometry, Veu, VeuState, VEU_NAME},
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Clone, Default)]
struct CountingIrq {
    enabled: Arc<AtomicUsize>,
    waited: Arc<AtomicUsize>,
}

impl Interrupt for CountingIrq {
    fn enable(&mut self) -> Result<()> {
        self.enabled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn wait(&mut self) -> Result<u32> {
        Ok(self.waited.fetch_add(1, Ordering::SeqCst) as u32 + 1)
    }
}

fn veu(irq: CountingIrq, mem: Option<Mapping>) -> Veu {
    let mmio = RegisterBlock::anonymous(0x1000).unwrap();
    let mut veu = Veu::from_parts(VEU_NAME.to_string(), mmio, mem, Box::new(irq));
    veu.initialize().unwrap();
    veu
}

fn geometry() -> Geometry {
    Geometry {
        src_width: 320,
        src_height: 240,
        dst_width: 640,
        dst_height: 480,
        dst_stride: 1600,
        pos_x: 10,
        pos_y: 20,
        max_width: 800,
        max_height: 480,
        dst_address: 0x1000_0000,
        bits_per_pixel: 16,
    }
}

#[test]
fn upscale_registers() {
    let mut veu = veu(CountingIrq::default(), None);
    let config = veu.configure(&geometry()).unwrap();
    let r = veu.registers();

    // x is aligned down to 8; 20 lines down at 1600 bytes per line.
    assert_eq!(config.dst_address, 0x1000_0000 + 8 * 2 + 20 * 1600);
    assert_eq!(r.read(VDAYR), 0x1000_0000 + 16 + 32000);
    assert_eq!(r.read(VDACR), 0);

    // Exact 2x on both axes uses pixel repeat; height is cropped to 460.
    assert_eq!(r.read(VRFCR), 0x0800_0800);
    assert_eq!(r.read(VRFSR), (0x1000 | 460) << 16 | (0x1000 | 640));
    assert_eq!(config.vertical.crop, 460);
    assert_eq!(r.read(VESSR), 320 | 232 << 16);

    assert_eq!(r.read(VESWR), 320);
    assert_eq!(r.read(VEDWR), 1600);
    assert_eq!(r.read(VBSSR), 0);
    assert_eq!(r.read(VSWPR), 0x67);
    assert_eq!(r.read(VTRCR), (6 << 16) | 2 | 4);
    assert_eq!(r.read(VMCR00), 0x0cc5);
    assert_eq!(r.read(VMCR12), 0x3ccd);
    assert_eq!(r.read(VMCR22), 0x1023);
    assert_eq!(r.read(VCOFFR), 0x0080_0010);
    assert_eq!(r.read(VEIER), 1);
    assert_eq!(veu.state(), VeuState::Configured);
}

#[test]
fn downscale_registers() {
    let mut veu = veu(CountingIrq::default(), None);
    let g = Geometry {
        src_width: 640,
        src_height: 480,
        dst_width: 320,
        dst_height: 240,
        pos_x: 0,
        pos_y: 0,
        ..geometry()
    };
    veu.configure(&g).unwrap();
    let r = veu.registers();

    assert_eq!(r.read(VRFCR), 0x1fd0 << 16 | 0x1fe0);
    assert_eq!(r.read(VRFSR), 240 << 16 | 320);
    assert_eq!(r.read(VESSR), 480 << 16 | 640);
    assert_eq!(r.read(VESWR), 640);
    assert_eq!(r.read(VDAYR), 0x1000_0000);
}

#[test]
fn reconfigure_replaces_both_halves() {
    let mut veu = veu(CountingIrq::default(), None);
    veu.configure(&geometry()).unwrap();
    let g = Geometry {
        src_width: 640,
        src_height: 480,
        dst_width: 320,
        dst_height: 240,
        pos_x: 0,
        pos_y: 0,
        ..geometry()
    };
    veu.configure(&g).unwrap();
    assert_eq!(veu.registers().read(VRFCR), 0x1fd0 << 16 | 0x1fe0);
    assert_eq!(veu.registers().read(VRFSR), 240 << 16 | 320);
}

#[test]
fn odd_source_stride() {
    let mut veu = veu(CountingIrq::default(), None);
    let g = Geometry {
        src_width: 176,
        src_height: 144,
        dst_width: 176,
        dst_height: 144,
        ..geometry()
    };
    veu.configure(&g).unwrap();
    assert_eq!(veu.registers().read(VESWR), 176);

    let g = Geometry {
        src_width: 170,
        dst_width: 170,
        ..g
    };
    veu.configure(&g).unwrap();
    assert_eq!(veu.registers().read(VESWR), 176);
}

#[test]
fn resize_beyond_range_is_rejected() {
    let mut veu = veu(CountingIrq::default(), None);
    veu.configure(&geometry()).unwrap();

    let g = Geometry {
        src_width: 2560,
        dst_width: 16,
        ..geometry()
    };
    assert!(matches!(
        veu.configure(&g),
        Err(Error::InvalidDimensions { .. })
    ));
    // The previous programming is left alone.
    assert_eq!(veu.registers().read(VRFCR), 0x0800_0800);
    assert_eq!(veu.state(), VeuState::Configured);
}

#[test]
fn oversized_destination_is_cropped() {
    let mut veu = veu(CountingIrq::default(), None);
    let g = Geometry {
        dst_width: u32::MAX,
        dst_height: u32::MAX,
        pos_x: 8,
        pos_y: 0,
        ..geometry()
    };
    let config = veu.configure(&g).unwrap();
    assert_eq!(config.horizontal.crop, 792);
    assert_eq!(config.vertical.crop, 480);

    let g = Geometry {
        src_width: u32::MAX,
        ..geometry()
    };
    assert!(matches!(
        veu.configure(&g),
        Err(Error::InvalidDimensions { .. })
    ));
}

#[test]
fn blit_and_complete() {
    let irq = CountingIrq::default();
    let mut veu = veu(irq.clone(), None);
    veu.configure(&geometry()).unwrap();

    veu.blit(0x2000_0000, 0x2001_2c00).unwrap();
    assert_eq!(veu.registers().read(VSAYR), 0x2000_0000);
    assert_eq!(veu.registers().read(VSACR), 0x2001_2c00);
    assert_eq!(veu.registers().read(VESTR), 1);
    assert_eq!(irq.enabled.load(Ordering::SeqCst), 1);

    veu.wait_for_completion().unwrap();
    assert_eq!(irq.waited.load(Ordering::SeqCst), 1);
    assert_eq!(veu.registers().read(VEVTR), 0x100);
    assert_eq!(veu.state(), VeuState::Configured);
}

fn screen() -> Screen {
    Screen {
        width: 800,
        height: 480,
        bits_per_pixel: 16,
        line_length: 1600,
        physical_address: 0x1000_0000,
    }
}

fn caps() -> SourceCaps {
    SourceCaps {
        width: 16,
        height: 8,
        framerate: Framerate::new(25, 1).unwrap(),
    }
}

fn stamped(mut buffer: VideoBuffer, at: Duration) -> VideoBuffer {
    buffer.timestamp = Some(at);
    buffer
}

#[test]
fn sink_stages_owned_frames() {
    let irq = CountingIrq::default();
    let mem = Mapping::anonymous(4096).unwrap();
    let settings = SinkSettings {
        zoom: Zoom::Double,
        ..Default::default()
    };
    let sink = VideoSink::new(settings, screen(), veu(irq.clone(), Some(mem)));
    assert!(sink.supports_hardware_buffers());

    let config = sink.set_caps(caps()).unwrap();
    assert_eq!(config.horizontal.repeat, 1);
    assert_eq!(config.vertical.repeat, 1);

    let frame: Vec<u8> = (0..frame_size(16, 8)).map(|i| i as u8).collect();
    sink.deliver(stamped(VideoBuffer::new(frame.clone()), Duration::ZERO))
        .unwrap();

    sink.with_veu(|veu| {
        assert_eq!(veu.registers().read(VSAYR), 0);
        assert_eq!(veu.registers().read(VSACR), 16 * 8);
        assert_eq!(veu.state(), VeuState::Configured);
        let mem = veu.memory().unwrap();
        assert_eq!(&mem.as_slice()[..frame.len()], &frame[..]);
    });
    assert_eq!(irq.waited.load(Ordering::SeqCst), 1);
}

#[test]
fn sink_blits_hardware_frames() {
    let irq = CountingIrq::default();
    let sink = VideoSink::new(SinkSettings::default(), screen(), veu(irq.clone(), None));
    sink.set_caps(caps()).unwrap();

    let buffer = VideoBuffer::hardware(
        PhysicalPlane {
            address: 0x4000_0000,
            size: 128,
        },
        PhysicalPlane {
            address: 0x4000_1000,
            size: 64,
        },
    );
    sink.deliver(stamped(buffer, Duration::from_millis(40)))
        .unwrap();

    sink.with_veu(|veu| {
        assert_eq!(veu.registers().read(VSAYR), 0x4000_0000);
        assert_eq!(veu.registers().read(VSACR), 0x4000_1000);
    });
    assert_eq!(irq.enabled.load(Ordering::SeqCst), 1);
    assert_eq!(irq.waited.load(Ordering::SeqCst), 1);
}

#[test]
fn sink_rejects_unusable_frames() {
    let sink = VideoSink::new(
        SinkSettings::default(),
        screen(),
        veu(CountingIrq::default(), None),
    );

    // Not negotiated yet.
    let early = stamped(VideoBuffer::new(vec![0; 192]), Duration::ZERO);
    assert!(sink.show_frame(&early).is_err());

    sink.set_caps(caps()).unwrap();
    assert!(matches!(
        sink.times(&VideoBuffer::new(vec![0; 192])),
        Err(Error::MissingTimestamp)
    ));
    assert!(matches!(
        sink.deliver(VideoBuffer::new(vec![0; 192])),
        Err(FlowError::Failed(_))
    ));
    // No staging memory for owned frames.
    assert!(sink.deliver(early).is_err());
}

#[test]
fn sink_times() {
    let sink = VideoSink::new(
        SinkSettings::default(),
        screen(),
        veu(CountingIrq::default(), None),
    );
    sink.set_caps(caps()).unwrap();

    let start = Duration::from_millis(400);
    let mut buffer = stamped(VideoBuffer::new(vec![]), start);
    assert_eq!(
        sink.times(&buffer).unwrap(),
        (start, start + Duration::from_millis(40))
    );
    buffer.duration = Duration::from_millis(20);
    assert_eq!(
        sink.times(&buffer).unwrap(),
        (start, start + Duration::from_millis(20))
    );
}

#[test]
fn sink_position_outside_screen() {
    let settings = SinkSettings {
        x: 800,
        ..Default::default()
    };
    let sink = VideoSink::new(settings, screen(), veu(CountingIrq::default(), None));
    assert!(matches!(
        sink.set_caps(caps()),
        Err(Error::InvalidDimensions { .. })
    ));
}

#[test]
#[serial]
#[ignore = "needs the VEU2H uio device (run with --include-ignored to enable)"]
fn hardware_veu() -> Result<()> {
    let dev = UioDevice::locate(VEU_NAME)?;
    let (addr, size) = dev.region(1)?;
    println!("{} memory at {addr:#x} ({size} bytes)", dev.name());
    drop(dev);

    let mut veu = Veu::open()?;
    assert_eq!(veu.state(), VeuState::Initialized);
    let fb = Framebuffer::open(FB_DEVICE)?;
    let screen = Screen::from(&fb);
    veu.configure(&Geometry {
        src_width: 320,
        src_height: 240,
        dst_width: 320,
        dst_height: 240,
        dst_stride: screen.line_length,
        pos_x: 0,
        pos_y: 0,
        max_width: screen.width,
        max_height: screen.height,
        dst_address: screen.physical_address,
        bits_per_pixel: screen.bits_per_pixel,
    })?;

    let mem = veu.memory().ok_or(Error::codec("no VEU memory"))?;
    let luma = mem.physical_address();
    mem.as_mut_slice()[..frame_size(320, 240)].fill(0x80);
    veu.blit(luma, luma + 320 * 240)?;
    veu.wait_for_completion()?;
    Ok(())
}
