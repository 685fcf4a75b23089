//! Container decode (spec §4.3, §6 "Audio in").
//!
//! Accepts in-memory bytes plus an optional content-type hint. Magic bytes
//! are checked first; the content-type string is only a fallback when the
//! bytes are ambiguous.

use anyhow::{anyhow, Context, Result};
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Raw decode result: mono-mixed-later f32 samples at the container's native
/// sample rate and channel count (downmix happens in `frontend`).
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Content types recognized at the external boundary (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Wav,
    WebM,
    Ogg,
    Mpeg,
    Octet,
}

impl ContentType {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(Self::Wav),
            "audio/webm" => Some(Self::WebM),
            "audio/ogg" => Some(Self::Ogg),
            "audio/mpeg" => Some(Self::Mpeg),
            "application/octet-stream" => Some(Self::Octet),
            _ => None,
        }
    }

    fn extension_hint(self) -> &'static str {
        match self {
            Self::Wav | Self::Octet => "wav",
            Self::WebM => "webm",
            Self::Ogg => "ogg",
            Self::Mpeg => "mp3",
        }
    }
}

/// Sniffs magic bytes, falling back to the declared content type when the
/// bytes don't match a known signature (spec §6: "magic bytes first, content
/// type second").
fn sniff(bytes: &[u8], declared: Option<ContentType>) -> ContentType {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return ContentType::Wav;
    }
    if bytes.len() >= 4 && &bytes[0..4] == b"OggS" {
        return ContentType::Ogg;
    }
    if bytes.len() >= 4 && &bytes[0..4] == [0x1A, 0x45, 0xDF, 0xA3].as_slice() {
        return ContentType::WebM;
    }
    if bytes.len() >= 3 && (&bytes[0..3] == b"ID3" || (bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0)) {
        return ContentType::Mpeg;
    }
    declared.unwrap_or(ContentType::Octet)
}

/// Decodes container bytes into raw PCM samples. `declared` is the
/// caller-supplied content-type hint, if any; it is used only to build a
/// probe hint and as the sniff fallback.
pub fn decode_bytes(bytes: &[u8], declared: Option<ContentType>) -> Result<DecodedAudio> {
    let kind = sniff(bytes, declared);
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(kind.extension_hint());

    let probe_result = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("failed to probe audio format")?;

    let mut format = probe_result.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no audio tracks found"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("sample rate not specified in audio container")?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create decoder")?;

    let mut all_samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(err) => return Err(err).context("failed to read packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .context("failed to decode audio packet")?;

        all_samples.extend(interleaved_f32(&decoded));
    }

    Ok(DecodedAudio {
        samples: all_samples,
        sample_rate,
        channels,
    })
}

/// Converts any symphonia sample format to interleaved f32 in [-1.0, 1.0].
/// Downmixing to mono happens later in `frontend`; this only normalizes
/// sample representation.
fn interleaved_f32(buffer: &AudioBufferRef) -> Vec<f32> {
    let spec = buffer.spec();
    let num_channels = spec.channels.count();
    let duration = buffer.frames();
    let mut out = Vec::with_capacity(duration * num_channels);

    macro_rules! push_frames {
        ($buf:expr, $conv:expr) => {
            for i in 0..duration {
                for ch in 0..num_channels {
                    out.push($conv($buf.chan(ch)[i]));
                }
            }
        };
    }

    match buffer {
        AudioBufferRef::S8(buf) => push_frames!(buf, |s: i8| s as f32 / 128.0),
        AudioBufferRef::F32(buf) => push_frames!(buf, |s: f32| s),
        AudioBufferRef::F64(buf) => push_frames!(buf, |s: f64| s as f32),
        AudioBufferRef::S16(buf) => push_frames!(buf, |s: i16| s as f32 / 32768.0),
        AudioBufferRef::S24(buf) => push_frames!(buf, |s: symphonia::core::sample::i24| {
            s.inner() as f32 / 8_388_608.0
        }),
        AudioBufferRef::S32(buf) => push_frames!(buf, |s: i32| s as f32 / 2_147_483_648.0),
        AudioBufferRef::U8(buf) => push_frames!(buf, |s: u8| s as f32 / 128.0 - 1.0),
        AudioBufferRef::U16(buf) => push_frames!(buf, |s: u16| s as f32 / 32768.0 - 1.0),
        AudioBufferRef::U24(buf) => push_frames!(buf, |s: symphonia::core::sample::u24| {
            s.inner() as f32 / 8_388_608.0 - 1.0
        }),
        AudioBufferRef::U32(buf) => push_frames!(buf, |s: u32| s as f32 / 2_147_483_648.0 - 1.0),
    }

    out
}
