// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Single slot hand-off between a raw frame producer and the hardware
//! encoder.
//!
//! [`EncoderBridge::submit_frame`] copies one NV12 picture into the slot and
//! blocks while the previous picture has not been taken by the encoder, so
//! the producer runs at hardware speed. The encoder driver runs on its own
//! thread, started with the first frame, and pulls pictures from the slot
//! through [`EncoderIo`]. Encoded output is timestamped and pushed to the
//! downstream [`Sink`]. End of stream is sent exactly once, when the driver
//! returns.

use crate::{
    buffer::{EosLatch, FrameStamper, Sink, VideoBuffer},
    codec::{EncoderDriver, EncoderIo, Flow, FramePair, Input},
    control::StreamHeader,
    error::{Error, Result},
    format::{
        chroma_size, frame_size, interleave_chroma, luma_size, ChromaLayout, Framerate,
        VideoFormat,
    },
};
use std::{
    io::{self, Read},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};
use tracing::{debug, error, info, instrument, trace, warn};

/// Stream parameters of an encoder bridge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    /// Layout of the chroma half of submitted frames.
    pub chroma: ChromaLayout,
}

impl EncoderConfig {
    /// Completes caller supplied parameters from a control file header.
    ///
    /// The codec format comes from the downstream media type when it names
    /// one, else from `stream_type`. A width or height of 0 is taken from
    /// `x_pic_size` / `y_pic_size`.
    pub fn resolve(
        header: &StreamHeader,
        downstream: Option<VideoFormat>,
        width: u32,
        height: u32,
        framerate: Framerate,
    ) -> Result<(VideoFormat, Self)> {
        let format = downstream
            .or_else(|| header.format())
            .ok_or(Error::FormatUndefined)?;
        let width = match width {
            0 => header.width.unwrap_or(0),
            w => w,
        };
        let height = match height {
            0 => header.height.unwrap_or(0),
            h => h,
        };
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok((
            format,
            Self {
                width,
                height,
                framerate,
                chroma: header.chroma,
            },
        ))
    }

    pub fn frame_size(&self) -> usize {
        frame_size(self.width, self.height)
    }
}

#[derive(Debug, Default)]
struct Slot {
    frame: Option<FramePair>,
    /// Pause requested; both callbacks answer "pause".
    stopped: bool,
    /// No more frames will be submitted; pause once the slot is empty.
    draining: bool,
    /// The driver returned.
    finished: bool,
}

struct Shared {
    slot: Mutex<Slot>,
    changed: Condvar,
    eos: EosLatch,
    frames: AtomicU64,
    sink: Arc<dyn Sink>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panic while holding the lock leaves the slot consistent.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut Slot)) {
        f(&mut self.lock());
        self.changed.notify_all();
    }
}

/// Requests a soft stop of an encoder bridge from any thread.
#[derive(Clone)]
pub struct StopHandle(Arc<Shared>);

impl StopHandle {
    /// Makes both encoder callbacks answer "pause" and wakes a blocked
    /// [`EncoderBridge::submit_frame`].
    pub fn stop(&self) {
        debug!("encoder stop requested");
        self.0.update(|slot| slot.stopped = true);
    }
}

pub struct EncoderBridge {
    config: EncoderConfig,
    shared: Arc<Shared>,
    driver: Option<Box<dyn EncoderDriver>>,
    thread: Option<JoinHandle<()>>,
}

impl EncoderBridge {
    pub fn new(config: EncoderConfig, driver: Box<dyn EncoderDriver>, sink: Arc<dyn Sink>) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                changed: Condvar::new(),
                eos: EosLatch::default(),
                frames: AtomicU64::new(0),
                sink,
            }),
            driver: Some(driver),
            thread: None,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.shared.clone())
    }

    pub fn stop(&self) {
        self.stop_handle().stop()
    }

    /// Encoded frames delivered downstream so far.
    pub fn frames_encoded(&self) -> u64 {
        self.shared.frames.load(Ordering::Acquire)
    }

    pub fn eos_sent(&self) -> bool {
        self.shared.eos.is_sent()
    }

    /// Queues one NV12 picture for the encoder.
    ///
    /// Blocks while the previous picture is still queued. A frame of the
    /// wrong size ends the stream: end-of-stream is sent downstream and
    /// [`Error::FrameSize`] returned. After a stop, or once the encoder has
    /// returned, submissions fail with [`Error::Stopped`].
    #[instrument(skip_all, fields(len = frame.len()))]
    pub fn submit_frame(&mut self, frame: &[u8]) -> Result<()> {
        let expected = self.config.frame_size();
        if frame.len() != expected {
            warn!(expected, actual = frame.len(), "frame size mismatch, ending stream");
            self.shared.update(|slot| slot.stopped = true);
            self.shared.eos.send(&*self.shared.sink);
            return Err(Error::FrameSize {
                expected,
                actual: frame.len(),
            });
        }

        let pair = self.split(frame);

        {
            let mut slot = self.shared.lock();
            if slot.frame.is_some() && !slot.stopped && !slot.finished {
                trace!("slot occupied, waiting for the encoder");
                slot = self
                    .shared
                    .changed
                    .wait_while(slot, |s| s.frame.is_some() && !s.stopped && !s.finished)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                trace!("slot released");
            }
            if slot.stopped || slot.finished || slot.draining {
                return Err(Error::Stopped);
            }
            slot.frame = Some(pair);
        }
        self.shared.changed.notify_all();

        self.start();
        Ok(())
    }

    /// Reads whole frames from `reader` until it is exhausted, then drains
    /// the encoder. Returns the number of frames submitted.
    pub fn pump(&mut self, mut reader: impl Read) -> Result<u64> {
        let mut frame = vec![0u8; self.config.frame_size()];
        let mut count = 0;
        loop {
            let len = read_full(&mut reader, &mut frame)?;
            if len == 0 {
                break;
            }
            self.submit_frame(&frame[..len])?;
            count += 1;
        }
        self.finish()?;
        Ok(count)
    }

    /// Lets the encoder consume the queued picture, then waits for it to
    /// return. End-of-stream is sent downstream once.
    pub fn finish(&mut self) -> Result<()> {
        self.shared.update(|slot| slot.draining = true);
        match self.thread.take() {
            Some(thread) => {
                if thread.join().is_err() {
                    error!("encoder thread panicked");
                    self.shared.eos.send(&*self.shared.sink);
                    return Err(Error::codec("encoder thread panicked"));
                }
            }
            None => {
                self.shared.eos.send(&*self.shared.sink);
            }
        }
        info!(frames = self.frames_encoded(), "encoder finished");
        Ok(())
    }

    fn split(&self, frame: &[u8]) -> FramePair {
        let (luma, chroma) = frame.split_at(luma_size(self.config.width, self.config.height));
        debug_assert_eq!(chroma.len(), chroma_size(self.config.width, self.config.height));
        let chroma = match self.config.chroma {
            ChromaLayout::Interleaved => chroma.to_vec(),
            ChromaLayout::Planar => {
                let mut interleaved = vec![0; chroma.len()];
                interleave_chroma(chroma, &mut interleaved);
                interleaved
            }
        };
        FramePair {
            luma: luma.to_vec(),
            chroma,
        }
    }

    fn start(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };
        let shared = self.shared.clone();
        let framerate = self.config.framerate;
        debug!("starting encoder thread");
        self.thread = Some(thread::spawn(move || {
            let mut io = BridgeIo {
                shared: &shared,
                stamper: FrameStamper::new(framerate),
            };
            match driver.run(&mut io) {
                Ok(()) => debug!("encoder returned"),
                Err(e) => error!("encoder failed: {e}"),
            }
            drop(driver);
            shared.update(|slot| slot.finished = true);
            shared.eos.send(&*shared.sink);
        }));
    }
}

impl Drop for EncoderBridge {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shared.update(|slot| slot.stopped = true);
            let _ = thread.join();
        }
    }
}

struct BridgeIo<'a> {
    shared: &'a Shared,
    stamper: FrameStamper,
}

impl EncoderIo for BridgeIo<'_> {
    fn provide_input(&mut self) -> Input {
        let mut slot = self.shared.lock();
        if slot.stopped {
            debug!("encoding stop requested");
            return Input::Pause;
        }
        let frame = slot.frame.take();
        match frame {
            Some(frame) => {
                drop(slot);
                self.shared.changed.notify_all();
                Input::Frame(frame)
            }
            None if slot.draining => {
                debug!("input drained");
                Input::Pause
            }
            None => Input::Empty,
        }
    }

    fn consume_output(&mut self, data: &[u8]) -> Flow {
        if self.shared.lock().stopped {
            debug!("encoding stop requested");
            return Flow::Pause;
        }
        if data.is_empty() {
            return Flow::Continue;
        }

        let buffer = self.stamper.stamp(VideoBuffer::new(data.to_vec()));
        trace!(len = data.len(), sequence = buffer.sequence, "encoded frame");
        match self.shared.sink.deliver(buffer) {
            Ok(()) => {
                self.shared.frames.fetch_add(1, Ordering::AcqRel);
                Flow::Continue
            }
            Err(e) => {
                debug!("push failed: {e}");
                Flow::Pause
            }
        }
    }
}

/// Fills `buf` from `reader`, returning fewer bytes only at end of input.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
