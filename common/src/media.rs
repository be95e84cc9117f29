//! Image transcoding and WAV header probing.

use std::fmt;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

use crate::error::SubmissionResult;

/// Decode `raw` (format sniffed from its magic bytes) and re-encode as JPEG.
///
/// JPEG has no alpha channel, so everything is flattened to 8-bit RGB first.
pub fn to_jpeg(raw: &[u8], quality: u8) -> SubmissionResult<Vec<u8>> {
    let img = image::load_from_memory(raw)?;
    debug!(
        "Decoded image {}x{} ({:?})",
        img.width(),
        img.height(),
        img.color()
    );

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(out)
}

/// Basic facts about a RIFF/WAVE payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WavSummary {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub duration_secs: f64,
}

impl fmt::Display for WavSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WAV {} ch, {} Hz, {}-bit, {:.2}s",
            self.channels, self.sample_rate, self.bits_per_sample, self.duration_secs
        )
    }
}

/// Read the WAV header of `raw`, if it is one.
pub fn probe_wav(raw: &[u8]) -> Option<WavSummary> {
    let reader = hound::WavReader::new(Cursor::new(raw)).ok()?;
    let spec = reader.spec();
    let duration_secs = if spec.sample_rate == 0 {
        0.0
    } else {
        reader.duration() as f64 / spec.sample_rate as f64
    };
    Some(WavSummary {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        duration_secs,
    })
}
