//! Audio playback to speakers

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

/// Resampler input chunk size
const RESAMPLE_CHUNK: usize = 1024;

/// Slack on top of the expected playback duration
const PLAYBACK_SLACK: Duration = Duration::from_millis(500);

/// Plays audio files to completion
#[async_trait]
pub trait Player: Send + Sync {
    /// Play the file at `path`, returning once playback has finished
    async fn play_file(&self, path: &Path) -> Result<()>;
}

/// Decoded mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays audio to the default output device
#[derive(Debug, Clone)]
pub struct AudioPlayback {
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| Error::Audio(format!("no suitable output config found: {e}")))?;

        let sample_format = supported.sample_format();
        if !matches!(
            sample_format,
            SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
        ) {
            return Err(Error::Audio(format!(
                "unsupported output sample format: {sample_format:?}"
            )));
        }

        let config = supported.config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            ?sample_format,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            sample_format,
        })
    }

    /// Output sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Play mono samples recorded at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub async fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        let playback = self.clone();
        tokio::task::spawn_blocking(move || {
            playback.play_samples_blocking(&DecodedAudio {
                samples,
                sample_rate,
            })
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    /// Decode and play a WAV or MP3 file, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_file_blocking(&self, path: &Path) -> Result<()> {
        let audio = decode_file(path)?;
        self.play_samples_blocking(&audio)
    }

    /// Play samples in a blocking manner
    fn play_samples_blocking(&self, audio: &DecodedAudio) -> Result<()> {
        if audio.samples.is_empty() {
            return Ok(());
        }

        let samples = resample(&audio.samples, audio.sample_rate, self.sample_rate())?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let sample_count = samples.len();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let stream = match self.sample_format {
            SampleFormat::I16 => self.build_stream::<i16>(&device, samples, done_tx)?,
            SampleFormat::U16 => self.build_stream::<u16>(&device, samples, done_tx)?,
            _ => self.build_stream::<f32>(&device, samples, done_tx)?,
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let expected =
            Duration::from_millis((sample_count as u64 * 1000) / u64::from(self.sample_rate()));

        let finished = done_rx.recv_timeout(expected + PLAYBACK_SLACK).is_ok();
        if !finished {
            tracing::warn!(samples = sample_count, "playback did not signal completion");
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }

    fn build_stream<T>(
        &self,
        device: &Device,
        samples: Vec<f32>,
        done: mpsc::Sender<()>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = usize::from(self.config.channels.max(1));
        let mut done = Some(done);
        let mut position = 0usize;

        device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    position = fill_frames(data, channels, &samples, position);

                    if position >= samples.len() {
                        if let Some(tx) = done.take() {
                            let _ = tx.send(());
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))
    }
}

/// Write mono `samples` from `position` into interleaved `data`, returning the
/// next position; past the end is silence
fn fill_frames<T>(data: &mut [T], channels: usize, samples: &[f32], position: usize) -> usize
where
    T: Sample + FromSample<f32>,
{
    let mut position = position;
    for frame in data.chunks_mut(channels) {
        let sample = samples.get(position).copied().unwrap_or(0.0);
        frame.fill(T::from_sample(sample));
        position = position.saturating_add(1);
    }
    position
}

#[async_trait]
impl Player for AudioPlayback {
    async fn play_file(&self, path: &Path) -> Result<()> {
        let playback = self.clone();
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || playback.play_file_blocking(&path))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

/// Stands in for [`AudioPlayback`] when there is no output device
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlayback;

#[async_trait]
impl Player for NoPlayback {
    async fn play_file(&self, _path: &Path) -> Result<()> {
        Err(Error::Audio("no output device available".to_string()))
    }
}

/// Decode a file by extension (`.wav` or `.mp3`)
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let data = std::fs::read(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("wav") => decode_wav(&data),
        Some("mp3") => decode_mp3(&data),
        other => Err(Error::Audio(format!(
            "unsupported audio file type: {}",
            other.unwrap_or("none")
        ))),
    }
}

/// Decode WAV bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not a readable WAV
#[allow(clippy::cast_precision_loss)]
pub fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    Ok(DecodedAudio {
        samples: to_mono(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if decoding fails
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }

                let channels = frame.channels.max(1);
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(to_mono(&pcm, channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("MP3 contained no frames".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

#[allow(clippy::cast_precision_loss)]
fn to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio between rates
///
/// # Errors
///
/// Returns error if the resampler cannot be built for these rates
pub fn resample(input: &[f32], rate_in: u32, rate_out: u32) -> Result<Vec<f32>> {
    if rate_in == rate_out || input.is_empty() {
        return Ok(input.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(rate_in as usize, rate_out as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler: {e}")))?;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let expected = (input.len() as f64 * f64::from(rate_out) / f64::from(rate_in)).ceil() as usize;

    // Output lags input by the filter delay; flush with silence to get it all
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(delay + expected + resampler.output_frames_max());

    // The resampler may round the chunk size up to suit its FFT length
    let chunk_len = resampler.input_frames_next();
    let mut chunks = input.chunks(chunk_len);
    while out.len() < delay + expected {
        let mut block = vec![0.0; chunk_len];
        if let Some(chunk) = chunks.next() {
            block[..chunk.len()].copy_from_slice(chunk);
        }

        let frames = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resample: {e}")))?;
        out.extend_from_slice(&frames[0]);
    }

    out.drain(..delay);
    out.truncate(expected);
    Ok(out)
}
