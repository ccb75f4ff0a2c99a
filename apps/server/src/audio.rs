//! Speaker playback backend (cpal).
//!
//! Each opened track is decoded fully into memory and looped by its own cpal
//! output stream. cpal streams are not `Send`, so every stream lives on a
//! dedicated thread that receives play/pause/stop commands over a channel.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use soundscape_core::player::{probe_file, PlayerResult};
use soundscape_core::{PlaybackBackend, PlayerError, PlayerState, TrackPlayer};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Interleaved PCM for one loop iteration.
struct Clip {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

fn decode_clip(path: &Path) -> PlayerResult<Clip> {
    let display = path.display().to_string();
    let decode_err = |e: SymphoniaError| PlayerError::Decode {
        path: display.clone(),
        reason: e.to_string(),
    };

    let file = std::fs::File::open(path).map_err(|source| PlayerError::Io {
        path: display.clone(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut format = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_err)?
        .format;
    let (track_id, params) = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| (t.id, t.codec_params.clone()))
        .ok_or_else(|| PlayerError::NoTrack(display.clone()))?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut samples = Vec::new();
    let mut sample_rate = params.sample_rate.unwrap_or(44_100);
    let mut channels = params.channels.map_or(2, |c| c.count());

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Skip corrupt frames.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(decode_err(e)),
        }
    }

    if samples.is_empty() {
        return Err(PlayerError::NoTrack(display));
    }
    Ok(Clip {
        samples,
        sample_rate,
        channels: u16::try_from(channels).unwrap_or(2),
    })
}

enum StreamCommand {
    Play,
    Pause,
    Stop,
}

fn build_stream(clip: Arc<Clip>) -> PlayerResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlayerError::Output("no output device".to_string()))?;
    let config = cpal::StreamConfig {
        channels: clip.channels,
        sample_rate: cpal::SampleRate(clip.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut position = 0usize;
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = clip.samples[position];
                    position = (position + 1) % clip.samples.len();
                }
            },
            |err| log::error!("[Speaker] Stream error: {}", err),
            None,
        )
        .map_err(|e| PlayerError::Output(e.to_string()))
}

fn run_stream(
    clip: Arc<Clip>,
    ready: mpsc::Sender<PlayerResult<()>>,
    commands: mpsc::Receiver<StreamCommand>,
) {
    let stream = match build_stream(clip) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Ends on Stop or when the player is dropped.
    while let Ok(command) = commands.recv() {
        let result = match command {
            StreamCommand::Play => stream.play().map_err(|e| e.to_string()),
            StreamCommand::Pause => stream.pause().map_err(|e| e.to_string()),
            StreamCommand::Stop => break,
        };
        if let Err(e) = result {
            log::warn!("[Speaker] Stream control failed: {}", e);
        }
    }
}

/// Backend that loops tracks on the default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpeakerBackend;

impl PlaybackBackend for SpeakerBackend {
    fn open(&self, path: &Path) -> PlayerResult<Box<dyn TrackPlayer>> {
        probe_file(path)?;
        let clip = Arc::new(decode_clip(path)?);
        log::debug!(
            "[Speaker] Decoded {} ({} Hz, {} ch, {} samples)",
            path.display(),
            clip.sample_rate,
            clip.channels,
            clip.samples.len()
        );

        let (ready_tx, ready_rx) = mpsc::channel();
        let (commands, command_rx) = mpsc::channel();
        thread::Builder::new()
            .name("soundscape-speaker".to_string())
            .spawn(move || run_stream(clip, ready_tx, command_rx))
            .map_err(|e| PlayerError::Output(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| PlayerError::Output("output thread exited".to_string()))??;

        Ok(Box::new(SpeakerPlayer {
            path: path.to_path_buf(),
            commands,
            state: PlayerState::Idle,
        }))
    }

    fn name(&self) -> &'static str {
        "speaker"
    }
}

/// Handle to one looping output stream.
struct SpeakerPlayer {
    path: PathBuf,
    commands: mpsc::Sender<StreamCommand>,
    state: PlayerState,
}

impl SpeakerPlayer {
    fn send(&self, command: StreamCommand) {
        if self.commands.send(command).is_err() {
            log::warn!("[Speaker] Output thread gone for {}", self.path.display());
        }
    }
}

impl TrackPlayer for SpeakerPlayer {
    fn start(&mut self) {
        self.send(StreamCommand::Play);
        self.state = PlayerState::Running;
    }

    fn pause(&mut self) {
        if self.state == PlayerState::Running {
            self.send(StreamCommand::Pause);
            self.state = PlayerState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state == PlayerState::Paused {
            self.send(StreamCommand::Play);
            self.state = PlayerState::Running;
        }
    }

    fn stop(self: Box<Self>) {
        self.send(StreamCommand::Stop);
        log::debug!("[Speaker] Released {}", self.path.display());
    }

    fn state(&self) -> PlayerState {
        self.state
    }
}
