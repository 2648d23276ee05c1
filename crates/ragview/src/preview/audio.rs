//! Decoded audio and a transport that honors seeks issued before decoding finishes.

use std::io::{Cursor, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub type AudioResult<T> = Result<T, AudioError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AudioError {
    #[snafu(display("unrecognized audio container on `{stage}`: {source}"))]
    UnknownFormat {
        stage: &'static str,
        source: SymphoniaError,
    },
    #[snafu(display("audio on `{stage}` has no decodable track"))]
    NoTrack { stage: &'static str },
    #[snafu(display("failed to decode audio on `{stage}`: {source}"))]
    Decode {
        stage: &'static str,
        source: SymphoniaError,
    },
    #[snafu(display("audio stream on `{stage}` has no samples"))]
    EmptyStream { stage: &'static str },
}

/// Interleaved samples normalized to `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl Waveform {
    /// Decodes any container the ingestion service accepts (wav, mp3, m4a, flac, ogg).
    ///
    /// `extension` is only a format hint; the container is detected from the bytes.
    pub fn decode(bytes: impl Into<Bytes>, extension: Option<&str>) -> AudioResult<Self> {
        let stage = "decode-audio";
        let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes.into())), Default::default());
        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let container = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context(UnknownFormatSnafu { stage })?;
        let mut format = container.format;
        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .context(NoTrackSnafu { stage })?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context(DecodeSnafu { stage })?;

        let mut channels = 1_u16;
        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(error)) if error.kind() == ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(source) => return Err(source).context(DecodeSnafu { stage }),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    tracing::debug!(reason, "skipping undecodable audio packet");
                    continue;
                }
                Err(source) => return Err(source).context(DecodeSnafu { stage }),
            };
            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            channels = spec.channels.count() as u16;
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }
        ensure!(!samples.is_empty(), EmptyStreamSnafu { stage });
        let sample_rate = sample_rate.context(EmptyStreamSnafu { stage })?;

        tracing::debug!(
            samples = samples.len(),
            sample_rate,
            channels,
            "decoded audio"
        );
        Ok(Self {
            samples: samples.into(),
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate.max(1)))
    }

    /// Peak amplitude per bucket, for drawing the waveform.
    pub fn peaks(&self, buckets: usize) -> Vec<f32> {
        let frames = self.frame_count();
        if buckets == 0 || frames == 0 {
            return Vec::new();
        }
        let channels = usize::from(self.channels.max(1));
        let frames_per_bucket = frames.div_ceil(buckets);

        self.samples
            .chunks(frames_per_bucket * channels)
            .map(|chunk| chunk.iter().fold(0.0_f32, |peak, sample| peak.max(sample.abs())))
            .collect()
    }
}

/// Playback transport over a waveform that may still be decoding.
#[derive(Debug, Clone, Default)]
pub struct WaveformPlayer {
    waveform: Option<Waveform>,
    queued_seek: Option<Duration>,
    position: Duration,
    playing: bool,
}

impl WaveformPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.waveform.is_some()
    }

    pub fn waveform(&self) -> Option<&Waveform> {
        self.waveform.as_ref()
    }

    /// Installs decoded audio and applies any seek queued while decoding.
    pub fn load(&mut self, waveform: Waveform) {
        self.waveform = Some(waveform);
        self.position = Duration::ZERO;
        if let Some(offset) = self.queued_seek.take() {
            self.seek(offset);
        }
    }

    /// Moves the playhead; queued until the waveform is loaded.
    pub fn seek(&mut self, offset: Duration) {
        match &self.waveform {
            Some(waveform) => self.position = offset.min(waveform.duration()),
            None => self.queued_seek = Some(offset),
        }
    }

    pub fn play(&mut self) {
        self.playing = self.waveform.is_some();
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self) -> Duration {
        self.queued_seek.unwrap_or(self.position)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.waveform.as_ref().map(Waveform::duration)
    }
}
