// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Growable byte buffer between a compressed stream producer and the
//! hardware decoder.
//!
//! Chunks submitted with [`DecoderBridge::submit_chunk`] are appended to a
//! pending buffer. The decode thread, started with the first chunk, takes the
//! whole pending buffer, hands it to the driver and puts back whatever the
//! driver did not consume in front of the data that arrived meanwhile, so no
//! byte is lost or reordered. The producer blocks while the pending buffer
//! would grow past the configured limit.

use crate::{
    buffer::{EosLatch, FrameStamper, Sink, VideoBuffer},
    codec::{DecoderDriver, Flow, FrameSink, Planes},
    error::{Error, Result},
    format::{Framerate, HwBufferMode, VideoFormat},
};
use std::{
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};
use tracing::{debug, error, info, instrument, trace, warn};

/// Default limit of buffered compressed bytes.
pub const DEFAULT_MAX_BUFFERED: usize = 1000 * 1024;

/// Stream parameters of a decoder bridge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    /// Limit of buffered compressed bytes; 0 disables it.
    pub max_buffered: usize,
    pub hw_buffer: HwBufferMode,
}

#[derive(Debug, Default)]
struct Pending {
    data: Vec<u8>,
    running: bool,
    /// The decoder made no progress on `data` and waits for it to grow.
    stalled: bool,
    /// The decode thread is gone; nothing will drain `data` any more.
    exited: bool,
}

struct Shared {
    pending: Mutex<Pending>,
    data_ready: Condvar,
    space_freed: Condvar,
    eos: EosLatch,
    frames: AtomicU64,
    passthrough: bool,
    sink: Arc<dyn Sink>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct DecoderBridge {
    config: DecoderConfig,
    shared: Arc<Shared>,
    driver: Option<Box<dyn DecoderDriver>>,
    thread: Option<JoinHandle<Result<()>>>,
    finished: bool,
}

impl DecoderBridge {
    /// Creates the bridge and resolves hardware buffer passthrough against
    /// the downstream consumer.
    pub fn new(
        config: DecoderConfig,
        mut driver: Box<dyn DecoderDriver>,
        sink: Arc<dyn Sink>,
    ) -> Result<Self> {
        let passthrough = config.hw_buffer.resolve(sink.supports_hardware_buffers());
        driver.set_physical_output(passthrough)?;
        debug!(
            format = %config.format,
            hw_buffer = %config.hw_buffer,
            passthrough,
            "decoder {}x{} @ {}",
            config.width,
            config.height,
            config.framerate
        );

        Ok(Self {
            config,
            shared: Arc::new(Shared {
                pending: Mutex::new(Pending::default()),
                data_ready: Condvar::new(),
                space_freed: Condvar::new(),
                eos: EosLatch::default(),
                frames: AtomicU64::new(0),
                passthrough,
                sink,
            }),
            driver: Some(driver),
            thread: None,
            finished: false,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Whether decoded pictures go downstream as hardware buffers.
    pub fn passthrough(&self) -> bool {
        self.shared.passthrough
    }

    /// Pictures delivered downstream so far.
    pub fn frames_decoded(&self) -> u64 {
        self.shared.frames.load(Ordering::Acquire)
    }

    pub fn eos_sent(&self) -> bool {
        self.shared.eos.is_sent()
    }

    /// Bytes waiting for the decoder.
    pub fn buffered(&self) -> usize {
        self.shared.lock().data.len()
    }

    /// Appends a chunk of compressed stream.
    ///
    /// Blocks while already buffered bytes plus `chunk` exceed the limit.
    #[instrument(skip_all, fields(len = chunk.len()))]
    pub fn submit_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::Stopped);
        }

        {
            let max = self.config.max_buffered;
            let over = |p: &mut Pending| {
                max > 0
                    && !p.data.is_empty()
                    && p.data.len() + chunk.len() > max
                    && !p.stalled
                    && !p.exited
            };
            let mut pending = self.shared.lock();
            if over(&mut *pending) {
                debug!(buffered = pending.data.len(), "buffer full, waiting");
                pending = self
                    .shared
                    .space_freed
                    .wait_while(pending, over)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                debug!("got space");
            }
            if pending.exited {
                return Err(Error::Stopped);
            }

            if pending.data.is_empty() {
                trace!("first chunk in buffer");
            }
            pending.data.extend_from_slice(chunk);
            trace!(buffered = pending.data.len(), "chunk added");
        }

        self.start();
        self.shared.data_ready.notify_all();
        Ok(())
    }

    /// Decodes what is still buffered, flushes the decoder and sends
    /// end-of-stream downstream.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        self.shared.lock().running = false;
        self.shared.data_ready.notify_all();

        let result = match self.thread.take() {
            Some(thread) => match thread.join() {
                Ok(result) => result,
                Err(_) => Err(Error::codec("decoder thread panicked")),
            },
            None => Ok(()),
        };
        self.shared.eos.send(&*self.shared.sink);
        info!(frames = self.frames_decoded(), "decoder finished");
        result
    }

    fn start(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        self.shared.lock().running = true;
        let shared = self.shared.clone();
        let framerate = self.config.framerate;
        debug!("starting the decoder thread");
        self.thread = Some(thread::spawn(move || {
            let result = drive(&shared, driver, framerate);
            if let Err(e) = &result {
                error!("decoder failed: {e}");
            }
            shared.lock().exited = true;
            shared.space_freed.notify_all();
            result
        }));
    }
}

impl Drop for DecoderBridge {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shared.lock().running = false;
            self.shared.data_ready.notify_all();
            let _ = thread.join();
        }
    }
}

fn drive(shared: &Shared, mut driver: Box<dyn DecoderDriver>, framerate: Framerate) -> Result<()> {
    let mut delivery = Delivery {
        shared,
        stamper: FrameStamper::new(framerate),
    };
    // Length of a leftover the decoder could not make progress on.
    let mut stalled: Option<usize> = None;

    loop {
        let mut chunk = {
            let mut pending = shared.lock();
            pending = shared
                .data_ready
                .wait_while(pending, |p| {
                    p.running
                        && match stalled {
                            Some(len) => p.data.len() <= len,
                            None => p.data.is_empty(),
                        }
                })
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            let progress = match stalled {
                Some(len) => pending.data.len() > len,
                None => !pending.data.is_empty(),
            };
            if !progress {
                // Stopped with nothing decodable left.
                break;
            }
            pending.stalled = false;
            mem::take(&mut pending.data)
        };
        shared.space_freed.notify_all();

        trace!(len = chunk.len(), "decoding");
        let used = driver.decode(&chunk, &mut delivery)?.min(chunk.len());
        trace!(used, "decoded");

        if used == chunk.len() {
            stalled = None;
            continue;
        }

        chunk.drain(..used);
        let mut pending = shared.lock();
        let arrived = !pending.data.is_empty();
        chunk.extend_from_slice(&pending.data);
        pending.data = chunk;
        debug!(preserved = pending.data.len(), "preserving unused data");
        // Data that came in during the call may complete the leftover.
        stalled = if used == 0 && !arrived {
            Some(pending.data.len())
        } else {
            None
        };
        // A stalled decoder only moves on once more data arrives, so the
        // producer must not wait for space.
        pending.stalled = stalled.is_some();
        drop(pending);
        shared.space_freed.notify_all();
    }

    debug!("calling finalize");
    driver.finalize(&mut delivery)?;
    info!(frames = driver.frame_count(), "stream finalized");
    Ok(())
}

struct Delivery<'a> {
    shared: &'a Shared,
    stamper: FrameStamper,
}

impl FrameSink for Delivery<'_> {
    fn frame_decoded(&mut self, planes: Planes<'_>) -> Flow {
        let buffer = match planes {
            Planes::Physical { luma, chroma } if self.shared.passthrough => {
                VideoBuffer::hardware(luma, chroma)
            }
            Planes::Physical { .. } => {
                warn!("decoder returned physical planes without passthrough, dropping frame");
                return Flow::Continue;
            }
            Planes::Mapped { luma, chroma } => {
                let mut data = Vec::with_capacity(luma.len() + chroma.len());
                data.extend_from_slice(luma);
                data.extend_from_slice(chroma);
                VideoBuffer::new(data)
            }
        };

        let buffer = self.stamper.stamp(buffer);
        trace!(
            sequence = buffer.sequence,
            "pushing frame at {:?}",
            buffer.timestamp
        );
        match self.shared.sink.deliver(buffer) {
            Ok(()) => {
                self.shared.frames.fetch_add(1, Ordering::AcqRel);
            }
            Err(e) => debug!("push failed: {e}"),
        }
        Flow::Continue
    }
}
