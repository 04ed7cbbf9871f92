//! Recorded audio artifacts and their on-disk preview copies

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// MIME type of artifacts produced by the capture pipeline.
/// The backend transcodes whatever audio container it receives.
pub const WAV_MIME: &str = "audio/wav";

/// A slice of encoded audio delivered while recording
pub type Fragment = Vec<u8>;

/// Finalized recording ready for preview and upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
    mime_type: String,
}

impl Artifact {
    /// Concatenate fragments in capture order and fix up the container sizes.
    pub fn assemble(fragments: Vec<Fragment>, mime_type: &str) -> Self {
        let total: usize = fragments.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for fragment in fragments {
            bytes.extend_from_slice(&fragment);
        }

        if mime_type == WAV_MIME {
            finalize_wav_sizes(&mut bytes);
        }

        Self {
            bytes,
            mime_type: mime_type.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Playback length, when the payload is a readable WAV
    pub fn duration(&self) -> Option<Duration> {
        let reader = hound::WavReader::new(Cursor::new(&self.bytes)).ok()?;
        let rate = reader.spec().sample_rate;
        if rate == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(reader.duration() as f64 / rate as f64))
    }
}

/// Build the leading fragment of a mono 16-bit PCM stream.
///
/// The size fields are zero until [`Artifact::assemble`] patches them.
pub fn wav_header(sample_rate: u32) -> hound::Result<Fragment> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    hound::WavWriter::new(&mut cursor, spec)?.finalize()?;
    Ok(cursor.into_inner())
}

/// Encode mono samples as little-endian i16 PCM
pub fn pcm_fragment(samples: &[f32]) -> Fragment {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let amplitude = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&amplitude.to_le_bytes());
    }
    out
}

/// Rewrite the RIFF and `data` chunk sizes to match the buffer length.
/// Buffers that are not RIFF/WAVE are left untouched.
fn finalize_wav_sizes(bytes: &mut [u8]) {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return;
    }

    let riff_size = (bytes.len() - 8) as u32;
    bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());

    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = [bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]];
        if &id == b"data" {
            let data_size = (bytes.len() - pos - 8) as u32;
            bytes[pos + 4..pos + 8].copy_from_slice(&data_size.to_le_bytes());
            return;
        }
        let size = u32::from_le_bytes([
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]) as usize;
        pos += 8 + size + (size & 1);
    }
}

/// Temporary WAV file the user can open to listen before uploading.
/// Removed when dropped.
#[derive(Debug)]
pub struct PreviewFile {
    path: PathBuf,
}

impl PreviewFile {
    pub async fn write(dir: &Path, artifact: &Artifact) -> std::io::Result<Self> {
        let path = dir.join(format!("voice-tasks-{}.wav", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, artifact.bytes()).await?;
        tracing::debug!("Preview written to {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PreviewFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not remove preview {}: {}", self.path.display(), e);
            }
        }
    }
}
