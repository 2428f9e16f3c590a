//! Audio capture from microphone

use std::sync::mpsc::Sender;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};

use crate::{Error, Result};

/// Preferred sample rate for capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Encoding of an [`AudioClip`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// RIFF WAV, 16-bit signed PCM, mono
    Wav,
}

impl AudioEncoding {
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }
}

/// One recorded phrase, encoded and owned by whoever holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    data: Vec<u8>,
    encoding: AudioEncoding,
    sample_rate: u32,
}

impl AudioClip {
    /// Encode mono samples as a WAV clip
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Result<Self> {
        Ok(Self {
            data: samples_to_wav(samples, sample_rate)?,
            encoding: AudioEncoding::Wav,
            sample_rate,
        })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Give up the encoded bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    #[must_use]
    pub const fn encoding(&self) -> AudioEncoding {
        self.encoding
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The bound default input device
///
/// Holds the device for the whole session; streams are opened per capture.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl AudioCapture {
    /// Bind the default input device
    ///
    /// Prefers mono at 16kHz and falls back to the device default config,
    /// down-mixing to mono in the stream callback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMicrophone`] if there is no input device, or
    /// [`Error::Audio`] if it offers no usable configuration
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::NoMicrophone("no input device available".to_string()))?;

        let preferred = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.sample_format() == SampleFormat::F32
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .map(|c| c.with_sample_rate(SampleRate(SAMPLE_RATE)));

        let supported = match preferred {
            Some(c) => c,
            None => device
                .default_input_config()
                .map_err(|e| Error::Audio(format!("no suitable audio config found: {e}")))?,
        };

        let sample_format = supported.sample_format();
        let config = supported.config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            ?sample_format,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    /// Start a stream that sends mono chunks to `chunks`
    ///
    /// Capture runs until the returned stream is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be built or started
    pub fn start(&self, chunks: Sender<Vec<f32>>) -> Result<Stream> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(chunks)?,
            SampleFormat::I16 => self.build_stream::<i16>(chunks)?,
            SampleFormat::U16 => self.build_stream::<u16>(chunks)?,
            other => {
                return Err(Error::Audio(format!("unsupported sample format: {other:?}")));
            }
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        tracing::trace!("audio capture started");
        Ok(stream)
    }

    fn build_stream<T>(&self, chunks: Sender<Vec<f32>>) -> Result<Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = usize::from(self.config.channels.max(1));

        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    // Receiver gone means the capture finished; drop the chunk
                    let _ = chunks.send(downmix(data, channels));
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))
    }

    /// Sample rate of the mono chunks this device produces
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Device name, for diagnostics
    #[must_use]
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Average interleaved frames down to mono f32
#[allow(clippy::cast_precision_loss)]
fn downmix<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    if channels <= 1 {
        return data.iter().map(|&s| f32::from_sample(s)).collect();
    }

    data.chunks(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
            sum / frame.len() as f32
        })
        .collect()
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(sample_i16)?;
        }

        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let stereo = [0.5f32, -0.5, 1.0, 0.0];
        assert_eq!(downmix(&stereo, 2), vec![0.0, 0.5]);
    }

    #[test]
    fn test_downmix_i16_mono() {
        let mono = [i16::MAX, 0];
        let out = downmix(&mono, 1);
        assert!((out[0] - 1.0).abs() < 0.001);
        assert!(out[1].abs() < f32::EPSILON);
    }

    #[test]
    fn test_clip_encoding() {
        let clip = AudioClip::from_samples(&[0.0, 0.25, -0.25], SAMPLE_RATE).unwrap();
        assert_eq!(clip.encoding(), AudioEncoding::Wav);
        assert_eq!(clip.sample_rate(), SAMPLE_RATE);
        assert_eq!(&clip.bytes()[0..4], b"RIFF");
        assert_eq!(clip.len(), 44 + 3 * 2);
    }
}
