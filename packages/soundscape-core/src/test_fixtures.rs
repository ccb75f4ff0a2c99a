//! Shared test fixtures.

use std::io::Cursor;
use std::path::Path;

/// Returns a short mono 8 kHz WAV file (a quarter second of a 440 Hz tone).
pub fn wav_bytes() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for n in 0..2_000u32 {
            let t = n as f32 / 8_000.0;
            let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0;
            writer.write_sample(sample as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Writes [`wav_bytes`] to `path`.
pub fn write_wav(path: &Path) {
    std::fs::write(path, wav_bytes()).unwrap();
}
