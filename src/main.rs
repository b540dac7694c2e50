// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::{Args, Command, DecodeArgs, Element, EncodeArgs, PlayArgs, StreamArgs};
use clap::Parser;
use shmobile_video::{
    buffer::{FlowError, Sink, VideoBuffer},
    control::{ControlFile, StreamHeader},
    decoder::{DecoderBridge, DecoderConfig},
    encoder::{EncoderBridge, EncoderConfig},
    properties::{
        schema_json, DecoderSettings, SinkSettings, DECODER_PROPERTIES, ENCODER_PROPERTIES,
        SINK_PROPERTIES,
    },
    shcodecs::{load_library, ShDecoder, ShEncoder},
    sink::{SourceCaps, VideoSink},
};
use std::{
    error::Error,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args)?;

    match args.command {
        Command::Encode(encode_args) => encode(encode_args),
        Command::Decode(decode_args) => decode(decode_args),
        Command::Play(play_args) => play(play_args),
        Command::Inspect { element } => inspect(element),
    }
}

fn init_logging(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    };

    let stdout_log = tracing_subscriber::fmt::layer().with_filter(filter());

    let journald = if args.journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer.with_filter(filter())),
            Err(e) => {
                eprintln!("journald logging unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default())
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

/// Writes every delivered buffer to a file.
struct FileSink {
    out: Mutex<BufWriter<File>>,
}

impl FileSink {
    fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            out: Mutex::new(BufWriter::new(File::create(path)?)),
        })
    }
}

impl Sink for FileSink {
    fn deliver(&self, buffer: VideoBuffer) -> Result<(), FlowError> {
        let data = buffer
            .as_slice()
            .ok_or_else(|| FlowError::Failed("hardware buffers cannot be written".to_string()))?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| FlowError::Failed("output poisoned".to_string()))?;
        out.write_all(data)
            .map_err(|e| FlowError::Failed(e.to_string()))
    }

    fn end_of_stream(&self) {
        if let Ok(mut out) = self.out.lock() {
            if let Err(e) = out.flush() {
                warn!("flushing output: {e}");
            }
        }
    }
}

fn encode(args: EncodeArgs) -> Result<(), Box<dyn Error>> {
    let mut control = ControlFile::open(&args.cntl_file)?;
    let header = StreamHeader::read(&mut control);
    let (format, config) =
        EncoderConfig::resolve(&header, args.format, args.width, args.height, args.framerate)?;

    let mut driver = ShEncoder::new(load_library()?, format, config.width, config.height)?;
    driver.configure(
        Some(&mut control),
        config.width,
        config.height,
        Some(config.framerate),
    )?;

    let sink = Arc::new(FileSink::create(&args.output)?);
    let mut bridge = EncoderBridge::new(config, Box::new(driver), sink);
    let input = BufReader::new(File::open(&args.input)?);
    let submitted = bridge.pump(input)?;
    info!(
        submitted,
        encoded = bridge.frames_encoded(),
        "{} written to {}",
        format,
        args.output.display()
    );
    Ok(())
}

fn run_decoder(stream: &StreamArgs, sink: Arc<dyn Sink>) -> Result<u64, Box<dyn Error>> {
    let settings = DecoderSettings {
        buffer_size: stream.buffer_size,
        hw_buffer: stream.hw_buffer,
    };
    let config = DecoderConfig {
        format: stream.format,
        width: stream.width,
        height: stream.height,
        framerate: stream.framerate,
        max_buffered: settings.max_buffered(),
        hw_buffer: settings.hw_buffer,
    };
    let driver = ShDecoder::new(load_library()?, stream.format, stream.width, stream.height)?;
    let mut bridge = DecoderBridge::new(config, Box::new(driver), sink)?;

    let mut input = File::open(&stream.input)?;
    let mut chunk = vec![0u8; stream.chunk_size.max(1)];
    loop {
        let len = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        bridge.submit_chunk(&chunk[..len])?;
    }
    debug!("input exhausted");
    bridge.finish()?;
    Ok(bridge.frames_decoded())
}

fn decode(args: DecodeArgs) -> Result<(), Box<dyn Error>> {
    let sink = Arc::new(FileSink::create(&args.output)?);
    let frames = run_decoder(&args.stream, sink)?;
    info!(frames, "decoded to {}", args.output.display());
    Ok(())
}

fn play(args: PlayArgs) -> Result<(), Box<dyn Error>> {
    let settings = SinkSettings {
        width: args.out_width,
        height: args.out_height,
        x: args.x,
        y: args.y,
        zoom: args.zoom,
    };
    let sink = Arc::new(VideoSink::open(settings)?);
    sink.set_caps(SourceCaps {
        width: args.stream.width,
        height: args.stream.height,
        framerate: args.stream.framerate,
    })?;

    let result = run_decoder(&args.stream, sink.clone());
    sink.stop();
    let frames = result?;
    info!(frames, "playback finished");
    Ok(())
}

fn inspect(element: Element) -> Result<(), Box<dyn Error>> {
    let schema = match element {
        Element::Encoder => schema_json("sh-video-enc", ENCODER_PROPERTIES),
        Element::Decoder => schema_json("sh-video-dec", DECODER_PROPERTIES),
        Element::Sink => schema_json("sh-video-sink", SINK_PROPERTIES),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
