//! Bound microphone served from a dedicated thread
//!
//! cpal streams aren't `Send`, so the device and every stream built from it
//! stay on one OS thread. The async side talks to it over a request channel.

use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::capture::AudioCapture;
use super::detector::{ListenLimits, Listened, SpeechDetector, collect_window, listen_for_phrase};
use crate::{Error, Result};

/// Source of captured phrases
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Re-measure ambient noise for `window`, returning the new energy threshold
    async fn calibrate(&mut self, window: Duration) -> Result<f32>;

    /// Capture one phrase within `limits`
    async fn listen(&mut self, limits: ListenLimits) -> Result<Listened>;

    /// Sample rate of captured phrases
    fn sample_rate(&self) -> u32;
}

enum MicRequest {
    Calibrate {
        window: Duration,
        reply: oneshot::Sender<Result<f32>>,
    },
    Listen {
        limits: ListenLimits,
        reply: oneshot::Sender<Result<Listened>>,
    },
}

/// Handle to the default input device
///
/// Bound once; calibration and capture always use the same device. Dropping
/// the handle stops the device thread.
pub struct Microphone {
    requests: mpsc::Sender<MicRequest>,
    sample_rate: u32,
    device_name: String,
}

impl Microphone {
    /// Bind the default input device on a new thread
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMicrophone`] if no input device exists, or another
    /// error if the device cannot be configured
    pub fn bind() -> Result<Self> {
        let (requests, inbox) = mpsc::channel::<MicRequest>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, String)>>();

        std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || match AudioCapture::open_default() {
                Ok(capture) => {
                    let info = (capture.sample_rate(), capture.device_name());
                    if ready_tx.send(Ok(info)).is_ok() {
                        serve(&capture, &inbox);
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        let (sample_rate, device_name) = ready_rx
            .recv()
            .map_err(|_| Error::Audio("microphone thread exited during startup".to_string()))??;

        tracing::info!(device = %device_name, sample_rate, "microphone bound");

        Ok(Self {
            requests,
            sample_rate,
            device_name,
        })
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn submit(&self, request: MicRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| Error::Audio("microphone thread is not running".to_string()))
    }
}

#[async_trait]
impl AudioSource for Microphone {
    async fn calibrate(&mut self, window: Duration) -> Result<f32> {
        let (reply, response) = oneshot::channel();
        self.submit(MicRequest::Calibrate { window, reply })?;
        response
            .await
            .map_err(|_| Error::Audio("microphone dropped calibration request".to_string()))?
    }

    async fn listen(&mut self, limits: ListenLimits) -> Result<Listened> {
        let (reply, response) = oneshot::channel();
        self.submit(MicRequest::Listen { limits, reply })?;
        response
            .await
            .map_err(|_| Error::Audio("microphone dropped capture request".to_string()))?
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Device thread loop; exits when the handle is dropped
fn serve(capture: &AudioCapture, inbox: &mpsc::Receiver<MicRequest>) {
    let mut detector = SpeechDetector::new(capture.sample_rate());

    while let Ok(request) = inbox.recv() {
        match request {
            MicRequest::Calibrate { window, reply } => {
                let result = record(capture, |chunks| {
                    let ambient = collect_window(chunks, capture.sample_rate(), window)?;
                    Ok(detector.calibrate(&ambient))
                });
                let _ = reply.send(result);
            }
            MicRequest::Listen { limits, reply } => {
                let result = record(capture, |chunks| {
                    listen_for_phrase(chunks, &mut detector, limits)
                });
                let _ = reply.send(result);
            }
        }
    }

    tracing::debug!("microphone thread stopped");
}

/// Run `f` against a freshly started stream, stopping it afterwards
fn record<T>(
    capture: &AudioCapture,
    f: impl FnOnce(&mpsc::Receiver<Vec<f32>>) -> Result<T>,
) -> Result<T> {
    let (tx, rx) = mpsc::channel();
    let stream = capture.start(tx)?;
    let result = f(&rx);
    drop(stream);
    result
}
