//! Device-less playback backend.
//!
//! Files are probed and their first audio packet is decoded with symphonia, so
//! a corrupt cache entry is rejected exactly as it would be by a real output
//! backend. The resulting player only tracks its run state.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{PlaybackBackend, PlayerError, PlayerResult, PlayerState, TrackPlayer};

/// Packets read while looking for the first decodable one.
const MAX_PROBE_PACKETS: usize = 16;

/// Stream properties discovered while probing a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
    pub frames: Option<u64>,
}

impl TrackInfo {
    /// Length of one loop iteration, when the container reports it.
    pub fn duration(&self) -> Option<Duration> {
        match (self.frames, self.sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => {
                Some(Duration::from_secs_f64(frames as f64 / f64::from(rate)))
            }
            _ => None,
        }
    }
}

/// Probes `path` and decodes its first audio packet.
///
/// # Errors
///
/// Returns [`PlayerError::Io`] if the file cannot be opened,
/// [`PlayerError::NoTrack`] if it has no audio track, and
/// [`PlayerError::Decode`] for anything the decoder rejects.
pub fn probe_file(path: &Path) -> PlayerResult<TrackInfo> {
    let display = path.display().to_string();
    let decode_err = |e: symphonia::core::errors::Error| PlayerError::Decode {
        path: display.clone(),
        reason: e.to_string(),
    };

    let file = File::open(path).map_err(|source| PlayerError::Io {
        path: display.clone(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_err)?;
    let mut format = probed.format;

    let (track_id, params) = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| (t.id, t.codec_params.clone()))
        .ok_or_else(|| PlayerError::NoTrack(display.clone()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut last_error = None;
    for _ in 0..MAX_PROBE_PACKETS {
        let packet = format.next_packet().map_err(decode_err)?;
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(_) => {
                return Ok(TrackInfo {
                    sample_rate: params.sample_rate,
                    channels: params.channels.map(|c| c.count()),
                    frames: params.n_frames,
                });
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(PlayerError::Decode {
        path: display,
        reason: last_error.unwrap_or_else(|| "no audio packets".to_string()),
    })
}

/// Backend that validates files but produces no sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessBackend;

impl PlaybackBackend for HeadlessBackend {
    fn open(&self, path: &Path) -> PlayerResult<Box<dyn TrackPlayer>> {
        let info = probe_file(path)?;
        log::debug!(
            "[Player] Opened {} (rate={:?}, channels={:?}, loop={:?})",
            path.display(),
            info.sample_rate,
            info.channels,
            info.duration()
        );
        Ok(Box::new(HeadlessPlayer::new(path.to_path_buf(), info)))
    }

    fn name(&self) -> &'static str {
        "headless"
    }
}

/// Player returned by [`HeadlessBackend`].
#[derive(Debug)]
pub struct HeadlessPlayer {
    path: PathBuf,
    info: TrackInfo,
    state: PlayerState,
}

impl HeadlessPlayer {
    fn new(path: PathBuf, info: TrackInfo) -> Self {
        Self {
            path,
            info,
            state: PlayerState::Idle,
        }
    }

    pub fn info(&self) -> TrackInfo {
        self.info
    }
}

impl TrackPlayer for HeadlessPlayer {
    fn start(&mut self) {
        self.state = PlayerState::Running;
    }

    fn pause(&mut self) {
        if self.state == PlayerState::Running {
            self.state = PlayerState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state == PlayerState::Paused {
            self.state = PlayerState::Running;
        }
    }

    fn stop(self: Box<Self>) {
        log::debug!("[Player] Released {}", self.path.display());
    }

    fn state(&self) -> PlayerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::write_wav;

    #[test]
    fn opens_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sound_rain.wav");
        write_wav(&path);

        let info = probe_file(&path).unwrap();
        assert_eq!(info.sample_rate, Some(8_000));
        assert_eq!(info.channels, Some(1));
        assert!(info.duration().is_some());
    }

    #[test]
    fn player_state_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sound_rain.wav");
        write_wav(&path);

        let mut player = HeadlessBackend.open(&path).unwrap();
        assert_eq!(player.state(), PlayerState::Idle);

        player.resume();
        assert_eq!(player.state(), PlayerState::Idle);

        player.start();
        assert_eq!(player.state(), PlayerState::Running);
        player.pause();
        assert_eq!(player.state(), PlayerState::Paused);
        player.pause();
        assert_eq!(player.state(), PlayerState::Paused);
        player.resume();
        assert_eq!(player.state(), PlayerState::Running);

        player.stop();
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sound_rain.mp3");
        std::fs::write(&path, b"<html>404 not found</html>").unwrap();

        let err = HeadlessBackend.open(&path).err().unwrap();
        assert!(matches!(err, PlayerError::Decode { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe_file(&dir.path().join("nope.mp3")).unwrap_err();
        assert!(matches!(err, PlayerError::Io { .. }));
    }

    #[test]
    fn duration_requires_rate_and_frames() {
        let info = TrackInfo {
            sample_rate: Some(8_000),
            channels: Some(1),
            frames: Some(4_000),
        };
        assert_eq!(info.duration(), Some(Duration::from_millis(500)));
        assert_eq!(TrackInfo::default().duration(), None);
    }
}
