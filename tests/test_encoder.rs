// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use shmobile_video::{
    buffer::{FlowError, Sink, VideoBuffer},
    codec::{EncoderDriver, EncoderIo, Flow, FramePair, Input},
    encoder::{EncoderBridge, EncoderConfig},
    error::{Error, Result},
    format::{ChromaLayout, Framerate},
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

const WIDTH: u32 = 4;
const HEIGHT: u32 = 2;
const FRAME: usize = 12;

#[derive(Default)]
struct RecordingSink {
    buffers: Mutex<Vec<VideoBuffer>>,
    eos: AtomicUsize,
    refuse: bool,
}

impl Sink for RecordingSink {
    fn deliver(&self, buffer: VideoBuffer) -> Result<(), FlowError> {
        if self.refuse {
            return Err(FlowError::Failed("not linked".to_string()));
        }
        self.buffers.lock().unwrap().push(buffer);
        Ok(())
    }

    fn end_of_stream(&self) {
        self.eos.fetch_add(1, Ordering::SeqCst);
    }
}

/// Takes pictures as the hardware would and emits the first luma byte
/// four times per picture. With a gate, each taken picture is held until
/// the test sends a permit.
struct StubEncoder {
    consumed: Arc<Mutex<Vec<FramePair>>>,
    gate: Option<Receiver<()>>,
}

impl EncoderDriver for StubEncoder {
    fn run(&mut self, io: &mut dyn EncoderIo) -> Result<()> {
        loop {
            match io.provide_input() {
                Input::Frame(frame) => {
                    let marker = frame.luma[0];
                    self.consumed.lock().unwrap().push(frame);
                    if let Some(gate) = &self.gate {
                        if gate.recv().is_err() {
                            return Ok(());
                        }
                    }
                    if io.consume_output(&[marker; 4]) == Flow::Pause {
                        return Ok(());
                    }
                }
                Input::Empty => thread::sleep(Duration::from_millis(1)),
                Input::Pause => return Ok(()),
            }
        }
    }
}

fn config() -> EncoderConfig {
    EncoderConfig {
        width: WIDTH,
        height: HEIGHT,
        framerate: Framerate::new(30, 1).unwrap(),
        chroma: ChromaLayout::Interleaved,
    }
}

fn bridge(gated: bool) -> (EncoderBridge, Arc<RecordingSink>, Arc<Mutex<Vec<FramePair>>>, Option<Sender<()>>) {
    let sink = Arc::new(RecordingSink::default());
    let consumed = Arc::new(Mutex::new(Vec::new()));
    let (permits, gate) = if gated {
        let (tx, rx) = mpsc::channel();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };
    let driver = StubEncoder {
        consumed: consumed.clone(),
        gate,
    };
    let bridge = EncoderBridge::new(config(), Box::new(driver), sink.clone());
    (bridge, sink, consumed, permits)
}

fn wait_for(flag: &AtomicBool, timeout: Duration) -> bool {
    let start = Instant::now();
    while !flag.load(Ordering::SeqCst) {
        if start.elapsed() > timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

#[test]
fn frames_consumed_in_order() {
    let (mut bridge, sink, consumed, _) = bridge(false);

    bridge.submit_frame(&[0xAA; FRAME]).unwrap();
    bridge.submit_frame(&[0xBB; FRAME]).unwrap();
    bridge.finish().unwrap();

    let consumed = consumed.lock().unwrap();
    assert_eq!(consumed.len(), 2);
    assert!(consumed[0].luma.iter().chain(&consumed[0].chroma).all(|b| *b == 0xAA));
    assert!(consumed[1].luma.iter().chain(&consumed[1].chroma).all(|b| *b == 0xBB));

    let buffers = sink.buffers.lock().unwrap();
    assert_eq!(buffers.len(), 2);
    assert_eq!(buffers[0].as_slice(), Some(&[0xAA; 4][..]));
    assert_eq!(buffers[1].as_slice(), Some(&[0xBB; 4][..]));
    assert_eq!(buffers[0].timestamp, Some(Duration::ZERO));
    assert_eq!(buffers[1].timestamp, Some(Duration::from_nanos(33_333_333)));
    assert_eq!(buffers[1].sequence, 1);
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.frames_encoded(), 2);
}

#[test]
fn planar_chroma_is_interleaved() {
    let sink = Arc::new(RecordingSink::default());
    let consumed = Arc::new(Mutex::new(Vec::new()));
    let driver = StubEncoder {
        consumed: consumed.clone(),
        gate: None,
    };
    let config = EncoderConfig {
        chroma: ChromaLayout::Planar,
        ..config()
    };
    let mut bridge = EncoderBridge::new(config, Box::new(driver), sink);

    let mut frame = vec![0x10; 8];
    frame.extend_from_slice(&[1, 2, 3, 4]);
    bridge.submit_frame(&frame).unwrap();
    bridge.finish().unwrap();

    let consumed = consumed.lock().unwrap();
    assert_eq!(consumed[0].luma, vec![0x10; 8]);
    assert_eq!(consumed[0].chroma, vec![1, 3, 2, 4]);
}

#[test]
fn third_frame_waits_for_consumption() {
    let (mut bridge, sink, consumed, permits) = bridge(true);
    let permits = permits.unwrap();

    // F1 is taken by the encoder and held mid-consumption, F2 fills the slot.
    bridge.submit_frame(&[0x01; FRAME]).unwrap();
    bridge.submit_frame(&[0x02; FRAME]).unwrap();

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        let submit = s.spawn(|| {
            let result = bridge.submit_frame(&[0x03; FRAME]);
            done.store(true, Ordering::SeqCst);
            result
        });

        thread::sleep(Duration::from_millis(100));
        assert!(!done.load(Ordering::SeqCst), "third submit did not block");

        permits.send(()).unwrap();
        assert!(wait_for(&done, Duration::from_secs(5)), "third submit never released");
        submit.join().unwrap().unwrap();
    });

    permits.send(()).unwrap();
    permits.send(()).unwrap();
    bridge.finish().unwrap();

    let markers: Vec<u8> = consumed.lock().unwrap().iter().map(|f| f.luma[0]).collect();
    assert_eq!(markers, vec![1, 2, 3]);
    assert_eq!(sink.buffers.lock().unwrap().len(), 3);
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);
}

#[test]
fn wrong_frame_size_ends_stream() {
    let (mut bridge, sink, consumed, _) = bridge(false);

    assert!(matches!(
        bridge.submit_frame(&[0; FRAME - 1]),
        Err(Error::FrameSize {
            expected: FRAME,
            actual: 11
        })
    ));
    assert!(bridge.eos_sent());
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);

    assert!(matches!(
        bridge.submit_frame(&[0; FRAME]),
        Err(Error::Stopped)
    ));
    bridge.finish().unwrap();
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);
    assert!(consumed.lock().unwrap().is_empty());
}

#[test]
fn stop_wakes_blocked_submit() {
    let (mut bridge, sink, _consumed, permits) = bridge(true);
    let permits = permits.unwrap();
    let stop = bridge.stop_handle();

    bridge.submit_frame(&[0x01; FRAME]).unwrap();
    bridge.submit_frame(&[0x02; FRAME]).unwrap();

    thread::scope(|s| {
        let submit = s.spawn(|| bridge.submit_frame(&[0x03; FRAME]));
        thread::sleep(Duration::from_millis(50));
        stop.stop();
        assert!(matches!(submit.join().unwrap(), Err(Error::Stopped)));
    });

    // The held picture's output is refused once stopped.
    permits.send(()).unwrap();
    bridge.finish().unwrap();

    assert!(sink.buffers.lock().unwrap().is_empty());
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);
    assert!(matches!(
        bridge.submit_frame(&[0x04; FRAME]),
        Err(Error::Stopped)
    ));
}

#[test]
fn pump_reads_whole_frames() {
    let (mut bridge, sink, consumed, _) = bridge(false);
    let mut input = Vec::new();
    for marker in 0..5u8 {
        input.extend_from_slice(&[marker; FRAME]);
    }

    assert_eq!(bridge.pump(&input[..]).unwrap(), 5);
    assert_eq!(consumed.lock().unwrap().len(), 5);
    assert_eq!(sink.buffers.lock().unwrap().len(), 5);
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);
}

#[test]
fn pump_rejects_truncated_tail() {
    let (mut bridge, sink, _consumed, _) = bridge(false);
    let input = vec![0u8; FRAME + 5];

    assert!(matches!(
        bridge.pump(&input[..]),
        Err(Error::FrameSize { actual: 5, .. })
    ));
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);
}

/// Encodes every picture to one byte and records what the bridge answered.
struct FlowRecorder {
    flows: Arc<Mutex<Vec<Flow>>>,
}

impl EncoderDriver for FlowRecorder {
    fn run(&mut self, io: &mut dyn EncoderIo) -> Result<()> {
        loop {
            match io.provide_input() {
                Input::Frame(_) => {
                    let flow = io.consume_output(&[0x42]);
                    self.flows.lock().unwrap().push(flow);
                    if flow == Flow::Pause {
                        return Ok(());
                    }
                }
                Input::Empty => thread::sleep(Duration::from_millis(1)),
                Input::Pause => return Ok(()),
            }
        }
    }
}

#[test]
fn delivery_failure_stops_encoder() {
    let sink = Arc::new(RecordingSink {
        refuse: true,
        ..Default::default()
    });
    let flows = Arc::new(Mutex::new(Vec::new()));
    let driver = FlowRecorder {
        flows: flows.clone(),
    };
    let mut bridge = EncoderBridge::new(config(), Box::new(driver), sink.clone());

    bridge.submit_frame(&[0x01; FRAME]).unwrap();
    bridge.finish().unwrap();

    assert_eq!(*flows.lock().unwrap(), vec![Flow::Pause]);
    assert_eq!(bridge.frames_encoded(), 0);
    assert_eq!(sink.eos.load(Ordering::SeqCst), 1);
    assert!(bridge.eos_sent());
    assert!(matches!(
        bridge.submit_frame(&[0x02; FRAME]),
        Err(Error::Stopped)
    ));
}
