//! Microphone capture using cpal

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

use super::artifact::{pcm_fragment, wav_header, Fragment};
use super::error::CaptureError;

/// Samples kept for the live spectrum
pub const WINDOW_LEN: usize = 2048;

/// Shared sink the capture thread writes into.
///
/// Holds every fragment of the session plus a rolling window of the most
/// recent mono samples for the visualizer.
#[derive(Debug)]
pub struct CaptureBuffer {
    fragments: Mutex<Vec<Fragment>>,
    window: Mutex<VecDeque<f32>>,
    window_len: usize,
    sample_rate: AtomicU32,
}

impl CaptureBuffer {
    pub fn new(window_len: usize) -> Self {
        Self {
            fragments: Mutex::new(Vec::new()),
            window: Mutex::new(VecDeque::with_capacity(window_len)),
            window_len,
            sample_rate: AtomicU32::new(0),
        }
    }

    pub fn push_fragment(&self, fragment: Fragment) {
        self.fragments.lock().push(fragment);
    }

    /// Encode a block of mono samples as one fragment and feed the window
    pub fn push_samples(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        self.push_fragment(pcm_fragment(samples));

        let mut window = self.window.lock();
        for &s in samples {
            if window.len() == self.window_len {
                window.pop_front();
            }
            window.push_back(s);
        }
    }

    /// Drain all fragments in capture order
    pub fn take_fragments(&self) -> Vec<Fragment> {
        std::mem::take(&mut *self.fragments.lock())
    }

    /// Copy of the most recent samples, oldest first
    pub fn window(&self) -> Vec<f32> {
        self.window.lock().iter().copied().collect()
    }

    pub fn set_sample_rate(&self, rate: u32) {
        self.sample_rate.store(rate, Ordering::SeqCst);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::SeqCst)
    }
}

/// Exclusive handle on an open input stream.
///
/// Releasing (or dropping) it stops the capture and closes the device.
#[derive(Debug)]
pub struct CaptureStream {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureStream {
    pub fn new(running: Arc<AtomicBool>, worker: Option<JoinHandle<()>>) -> Self {
        Self { running, worker }
    }

    /// Stop capturing and wait for the device to be closed
    pub async fn release(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => tracing::error!("Capture thread panicked"),
                Err(e) => tracing::error!("Could not join capture thread: {}", e),
            }
        }
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Something that can open the microphone
pub trait CaptureSource: Send + Sync {
    /// Open the input and start writing fragments into `buffer`
    fn open(
        &self,
        buffer: Arc<CaptureBuffer>,
    ) -> impl Future<Output = Result<CaptureStream, CaptureError>> + Send;
}

/// Capture from a cpal input device
#[derive(Debug, Clone, Default)]
pub struct CpalSource {
    device_name: Option<String>,
}

impl CpalSource {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl CaptureSource for CpalSource {
    fn open(
        &self,
        buffer: Arc<CaptureBuffer>,
    ) -> impl Future<Output = Result<CaptureStream, CaptureError>> + Send {
        let device_name = self.device_name.clone();

        async move {
            let running = Arc::new(AtomicBool::new(true));
            let (ready_tx, ready_rx) = oneshot::channel();

            // cpal Stream isn't Send, so it lives and dies on its own thread
            let thread_running = running.clone();
            let worker = std::thread::spawn(move || {
                let opened = open_stream(device_name.as_deref(), buffer, thread_running.clone());
                let stream = match opened {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while thread_running.load(Ordering::SeqCst) {
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }

                drop(stream);
                tracing::debug!("Input stream closed");
            });

            match ready_rx.await {
                Ok(Ok(())) => Ok(CaptureStream::new(running, Some(worker))),
                Ok(Err(e)) => {
                    running.store(false, Ordering::SeqCst);
                    Err(e)
                }
                Err(_) => Err(CaptureError::Stream("capture thread exited early".to_string())),
            }
        }
    }
}

/// Pick the device, write the container header and start the stream
fn open_stream(
    device_name: Option<&str>,
    buffer: Arc<CaptureBuffer>,
    running: Arc<AtomicBool>,
) -> Result<cpal::Stream, CaptureError> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| classify_backend(&e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| {
                CaptureError::DeviceUnavailable(format!("device '{}' not found", name))
            })?,
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no input device".to_string()))?,
    };

    if let Ok(name) = device.name() {
        tracing::info!("Using input device: {}", name);
    }

    let supported = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable("device disconnected".to_string())
        }
        cpal::DefaultStreamConfigError::BackendSpecific { err } => {
            classify_backend(&err.description)
        }
        other => CaptureError::DeviceUnavailable(other.to_string()),
    })?;

    let sample_rate = supported.sample_rate().0;
    tracing::debug!(
        "Recording at {} Hz, {} channels, {:?}",
        sample_rate,
        supported.channels(),
        supported.sample_format()
    );

    buffer.set_sample_rate(sample_rate);
    let header = wav_header(sample_rate).map_err(|e| CaptureError::Stream(e.to_string()))?;
    buffer.push_fragment(header);

    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, buffer, running),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, buffer, running),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, buffer, running),
        other => {
            return Err(CaptureError::DeviceUnavailable(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable("device disconnected".to_string())
        }
        cpal::BuildStreamError::BackendSpecific { err } => classify_backend(&err.description),
        other => CaptureError::Stream(other.to_string()),
    })?;

    stream.play().map_err(|e| match e {
        cpal::PlayStreamError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable("device disconnected".to_string())
        }
        cpal::PlayStreamError::BackendSpecific { err } => classify_backend(&err.description),
        #[allow(unreachable_patterns)]
        other => CaptureError::Stream(other.to_string()),
    })?;

    Ok(stream)
}

/// Downmix every callback to mono and hand it to the buffer
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: Arc<CaptureBuffer>,
    running: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;
    use cpal::Sample;

    let channels = (config.channels as usize).max(1);

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            let mono: Vec<f32> = data
                .chunks(channels)
                .map(|frame| {
                    frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32
                })
                .collect();
            buffer.push_samples(&mono);
        },
        |err| {
            tracing::error!("Audio input error: {}", err);
        },
        None,
    )
}

/// Backends report permission problems as free-form text
fn classify_backend(description: &str) -> CaptureError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureError::PermissionDenied
    } else {
        CaptureError::DeviceUnavailable(description.to_string())
    }
}
