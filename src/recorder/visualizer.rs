//! Live frequency spectrum of the active capture

use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::oneshot, task::JoinHandle};

use super::capture::CaptureBuffer;

/// Samples analysed per frame
const BLOCK_LEN: usize = 1024;
const MIN_FREQ: f32 = 60.0;
const MAX_FREQ: f32 = 8000.0;
const FLOOR_DB: f32 = -80.0;

/// One frame of band magnitudes, each in 0..=100
pub type Spectrum = Vec<u64>;

/// Stop handle for a running visualizer loop
#[derive(Debug)]
pub struct VisualizerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl VisualizerHandle {
    /// Stop the loop and wait until it has exited
    pub async fn cancel(mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for VisualizerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start drawing frames from `buffer` every `interval` until cancelled
pub fn spawn<F>(
    buffer: Arc<CaptureBuffer>,
    bars: usize,
    interval: Duration,
    mut on_frame: F,
) -> VisualizerHandle
where
    F: FnMut(Spectrum) + Send + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let window = buffer.window();
                    on_frame(spectrum(&window, buffer.sample_rate(), bars));
                }
            }
        }
        tracing::debug!("Visualizer stopped");
    });

    VisualizerHandle {
        stop_tx: Some(stop_tx),
        task: Some(task),
    }
}

/// Magnitudes of `bars` log-spaced bands over the latest block of samples
pub fn spectrum(samples: &[f32], sample_rate: u32, bars: usize) -> Spectrum {
    if bars == 0 {
        return Vec::new();
    }
    if samples.is_empty() || sample_rate == 0 {
        return vec![0; bars];
    }

    let start = samples.len().saturating_sub(BLOCK_LEN);
    let block = &samples[start..];
    let n = block.len();

    let windowed: Vec<f32> = block
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let hann = if n > 1 {
                0.5 - 0.5 * (2.0 * PI * i as f32 / (n - 1) as f32).cos()
            } else {
                1.0
            };
            s * hann
        })
        .collect();

    let nyquist = sample_rate as f32 / 2.0;
    let top = MAX_FREQ.min(nyquist * 0.95).max(MIN_FREQ * 2.0);
    let ratio = (top / MIN_FREQ).powf(1.0 / bars as f32);

    (0..bars)
        .map(|band| {
            let lo = MIN_FREQ * ratio.powi(band as i32);
            let center = lo * ratio.sqrt();
            let magnitude = goertzel(&windowed, center, sample_rate as f32) / (n as f32 / 4.0);
            to_level(magnitude)
        })
        .collect()
}

/// Magnitude of a single frequency component
fn goertzel(samples: &[f32], freq: f32, sample_rate: f32) -> f32 {
    let coeff = 2.0 * (2.0 * PI * freq / sample_rate).cos();
    let (mut s1, mut s2) = (0.0f32, 0.0f32);
    for &x in samples {
        let s0 = x + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    (s1 * s1 + s2 * s2 - coeff * s1 * s2).max(0.0).sqrt()
}

/// Map a linear magnitude onto 0..=100 over an 80 dB range
fn to_level(magnitude: f32) -> u64 {
    if magnitude <= 0.0 || !magnitude.is_finite() {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = ((db - FLOOR_DB) / -FLOOR_DB).clamp(0.0, 1.0);
    (scaled * 100.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.8)
            .collect()
    }

    #[test]
    fn test_silence_is_flat() {
        let frame = spectrum(&vec![0.0; 2048], 16000, 16);
        assert_eq!(frame, vec![0; 16]);
    }

    #[test]
    fn test_no_samples_yet() {
        assert_eq!(spectrum(&[], 48000, 8), vec![0; 8]);
        assert_eq!(spectrum(&[0.3; 10], 0, 4), vec![0; 4]);
        assert!(spectrum(&[0.3; 10], 16000, 0).is_empty());
    }

    #[test]
    fn test_tone_peaks_in_low_band() {
        let frame = spectrum(&sine(100.0, 16000, 2048), 16000, 16);
        let peak = frame
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap();

        assert!(peak < 4, "100 Hz tone should peak in a low band, got {}", peak);
        assert!(frame.iter().all(|&v| v <= 100));
    }

    #[test]
    fn test_high_tone_peaks_above_low_tone() {
        let peak_of = |freq| {
            let frame = spectrum(&sine(freq, 16000, 2048), 16000, 24);
            frame
                .iter()
                .enumerate()
                .max_by_key(|(_, &v)| v)
                .map(|(i, _)| i)
                .unwrap()
        };
        assert!(peak_of(3000.0) > peak_of(200.0));
    }

    #[tokio::test]
    async fn test_cancel_stops_frames() {
        let buffer = Arc::new(CaptureBuffer::new(64));
        buffer.set_sample_rate(16000);
        let frames = Arc::new(AtomicUsize::new(0));

        let counter = frames.clone();
        let handle = spawn(buffer, 8, Duration::from_millis(5), move |frame| {
            assert_eq!(frame.len(), 8);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.cancel().await;

        let after_cancel = frames.load(Ordering::SeqCst);
        assert!(after_cancel > 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(frames.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test]
    async fn test_drop_aborts_loop() {
        let buffer = Arc::new(CaptureBuffer::new(64));
        let frames = Arc::new(AtomicUsize::new(0));

        let counter = frames.clone();
        let handle = spawn(buffer, 4, Duration::from_millis(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let after_drop = frames.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(frames.load(Ordering::SeqCst), after_drop);
    }
}
