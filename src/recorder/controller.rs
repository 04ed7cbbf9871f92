//! Record → preview → upload lifecycle

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::VisualizerConfig;

use super::artifact::{Artifact, PreviewFile, WAV_MIME};
use super::capture::{CaptureBuffer, CaptureSource, CaptureStream, WINDOW_LEN};
use super::error::{RecorderError, UploadError};
use super::upload::{ArtifactUploader, ProgressFn, UploadProgress};
use super::visualizer::{self, Spectrum, VisualizerHandle};

/// Receives every visualizer frame
pub type FrameSink = Arc<dyn Fn(Spectrum) + Send + Sync>;

/// In-flight upload, to be driven by the caller
pub type UploadJob = BoxFuture<'static, Result<(), UploadError>>;

/// Live capture owned by the controller
#[derive(Debug)]
pub struct RecordingSession {
    buffer: Arc<CaptureBuffer>,
    stream: CaptureStream,
    visualizer: VisualizerHandle,
    started: Instant,
}

/// Finished recording waiting for the user's decision
#[derive(Debug)]
pub struct Preview {
    artifact: Artifact,
    file: PreviewFile,
}

impl Preview {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Debug)]
pub enum RecorderState {
    Idle,
    Recording(RecordingSession),
    Previewing(Preview),
    Uploading {
        progress: UploadProgress,
        preview: PreviewFile,
    },
}

/// State tag without the owned resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Recording,
    Previewing,
    Uploading,
}

/// Result of a settled upload
#[derive(Debug)]
pub enum UploadOutcome {
    /// Backend accepted the artifact; tasks may follow later
    Uploaded,
    Failed(RecorderError),
}

pub struct RecorderController<S, U> {
    source: S,
    uploader: Arc<U>,
    state: RecorderState,
    preview_dir: PathBuf,
    visualizer: VisualizerConfig,
    frame_sink: FrameSink,
}

impl<S, U> RecorderController<S, U>
where
    S: CaptureSource,
    U: ArtifactUploader + 'static,
{
    pub fn new(
        source: S,
        uploader: Arc<U>,
        preview_dir: PathBuf,
        visualizer: VisualizerConfig,
        frame_sink: FrameSink,
    ) -> Self {
        Self {
            source,
            uploader,
            state: RecorderState::Idle,
            preview_dir,
            visualizer,
            frame_sink,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            RecorderState::Idle => Phase::Idle,
            RecorderState::Recording(_) => Phase::Recording,
            RecorderState::Previewing(_) => Phase::Previewing,
            RecorderState::Uploading { .. } => Phase::Uploading,
        }
    }

    /// Time since capture began, while recording
    pub fn elapsed(&self) -> Option<Duration> {
        match &self.state {
            RecorderState::Recording(session) => Some(session.started.elapsed()),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<&Preview> {
        match &self.state {
            RecorderState::Previewing(preview) => Some(preview),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<UploadProgress> {
        match &self.state {
            RecorderState::Uploading { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    /// Open the microphone and begin buffering
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        if !matches!(self.state, RecorderState::Idle) {
            return Err(RecorderError::Busy);
        }

        let buffer = Arc::new(CaptureBuffer::new(WINDOW_LEN));
        let stream = match self.source.open(buffer.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Could not open microphone: {}", e);
                return Err(e.into());
            }
        };

        let sink = self.frame_sink.clone();
        let visualizer = visualizer::spawn(
            buffer.clone(),
            self.visualizer.bar_count(),
            self.visualizer.frame_interval(),
            move |frame| sink(frame),
        );

        self.state = RecorderState::Recording(RecordingSession {
            buffer,
            stream,
            visualizer,
            started: Instant::now(),
        });
        tracing::info!("Recording started");
        Ok(())
    }

    /// Finish capture and move to preview. No-op unless recording.
    pub async fn stop(&mut self) -> Result<(), RecorderError> {
        let session = match std::mem::replace(&mut self.state, RecorderState::Idle) {
            RecorderState::Recording(session) => session,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        let RecordingSession {
            buffer,
            stream,
            visualizer,
            started,
        } = session;

        visualizer.cancel().await;
        stream.release().await;

        let artifact = Artifact::assemble(buffer.take_fragments(), WAV_MIME);
        tracing::info!(
            "Recording stopped after {:.1}s, {} bytes",
            started.elapsed().as_secs_f32(),
            artifact.len()
        );

        let file = PreviewFile::write(&self.preview_dir, &artifact).await?;
        self.state = RecorderState::Previewing(Preview { artifact, file });
        Ok(())
    }

    /// Throw away the preview. No-op unless previewing.
    pub fn discard(&mut self) {
        if let RecorderState::Previewing(_) = self.state {
            let previous = std::mem::replace(&mut self.state, RecorderState::Idle);
            drop(previous);
            tracing::info!("Recording discarded");
        }
    }

    /// Begin uploading the preview. Returns `None` unless previewing.
    pub fn process(&mut self, on_progress: ProgressFn) -> Option<UploadJob> {
        let preview = match std::mem::replace(&mut self.state, RecorderState::Idle) {
            RecorderState::Previewing(preview) => preview,
            other => {
                self.state = other;
                return None;
            }
        };

        let Preview { artifact, file } = preview;
        let total = artifact.len() as u64;
        let job = self.uploader.upload(artifact, on_progress);

        self.state = RecorderState::Uploading {
            progress: UploadProgress::new(0, total),
            preview: file,
        };
        Some(job)
    }

    pub fn report_progress(&mut self, update: UploadProgress) {
        if let RecorderState::Uploading { progress, .. } = &mut self.state {
            *progress = update;
        }
    }

    /// Settle the upload and reset to idle whatever the result
    pub fn finish_upload(&mut self, result: Result<(), UploadError>) -> UploadOutcome {
        if let RecorderState::Uploading { .. } = self.state {
            self.state = RecorderState::Idle;
        } else {
            tracing::warn!("Upload settled while {:?}", self.phase());
        }

        match result {
            Ok(()) => UploadOutcome::Uploaded,
            Err(e) => {
                tracing::warn!("Upload failed: {}", e);
                UploadOutcome::Failed(RecorderError::UploadFailed(e))
            }
        }
    }

    /// Release every resource, whatever the current state
    pub async fn shutdown(&mut self) {
        match std::mem::replace(&mut self.state, RecorderState::Idle) {
            RecorderState::Recording(session) => {
                session.visualizer.cancel().await;
                session.stream.release().await;
            }
            other => drop(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::artifact::{pcm_fragment, wav_header};
    use crate::recorder::error::CaptureError;
    use parking_lot::Mutex;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Writes canned fragments on open, or fails
    struct FakeSource {
        fragments: Vec<Vec<u8>>,
        failure: Option<CaptureError>,
        running: Mutex<Option<Arc<AtomicBool>>>,
    }

    impl FakeSource {
        fn with_fragments(fragments: Vec<Vec<u8>>) -> Self {
            Self {
                fragments,
                failure: None,
                running: Mutex::new(None),
            }
        }

        fn failing(error: CaptureError) -> Self {
            Self {
                fragments: Vec::new(),
                failure: Some(error),
                running: Mutex::new(None),
            }
        }

        fn stream_live(&self) -> bool {
            self.running
                .lock()
                .as_ref()
                .map_or(false, |r| r.load(Ordering::SeqCst))
        }
    }

    impl CaptureSource for FakeSource {
        fn open(
            &self,
            buffer: Arc<CaptureBuffer>,
        ) -> impl Future<Output = Result<CaptureStream, CaptureError>> + Send {
            let result = match &self.failure {
                Some(e) => Err(e.clone()),
                None => {
                    buffer.set_sample_rate(16000);
                    for fragment in &self.fragments {
                        buffer.push_fragment(fragment.clone());
                    }
                    let running = Arc::new(AtomicBool::new(true));
                    *self.running.lock() = Some(running.clone());
                    Ok(CaptureStream::new(running, None))
                }
            };
            async move { result }
        }
    }

    #[derive(Default)]
    struct FakeUploader {
        calls: AtomicUsize,
        received: Mutex<Vec<Artifact>>,
        fail_with: Option<UploadError>,
    }

    impl ArtifactUploader for FakeUploader {
        fn upload(
            &self,
            artifact: Artifact,
            on_progress: ProgressFn,
        ) -> BoxFuture<'static, Result<(), UploadError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let total = artifact.len() as u64;
            self.received.lock().push(artifact);
            let result = match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            };
            Box::pin(async move {
                on_progress(UploadProgress::new(total, total));
                result
            })
        }
    }

    fn controller(
        source: FakeSource,
        uploader: Arc<FakeUploader>,
        dir: &Path,
    ) -> RecorderController<FakeSource, FakeUploader> {
        RecorderController::new(
            source,
            uploader,
            dir.to_path_buf(),
            VisualizerConfig {
                bars: 8,
                frame_ms: 5,
            },
            Arc::new(|_: Spectrum| {}),
        )
    }

    fn voice_fragments() -> Vec<Vec<u8>> {
        vec![
            wav_header(16000).unwrap(),
            pcm_fragment(&[0.2; 320]),
            pcm_fragment(&[-0.1; 97]),
            pcm_fragment(&[0.0; 4000]),
        ]
    }

    fn preview_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_artifact_size_is_sum_of_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let fragments = voice_fragments();
        let expected: usize = fragments.iter().map(Vec::len).sum();
        let mut ctl = controller(
            FakeSource::with_fragments(fragments),
            Arc::new(FakeUploader::default()),
            dir.path(),
        );

        ctl.start().await.unwrap();
        assert_eq!(ctl.phase(), Phase::Recording);
        ctl.stop().await.unwrap();

        assert_eq!(ctl.phase(), Phase::Previewing);
        let preview = ctl.preview().unwrap();
        assert_eq!(preview.artifact().len(), expected);
        assert_eq!(std::fs::read(preview.path()).unwrap().len(), expected);
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(
            FakeSource::with_fragments(voice_fragments()),
            Arc::new(FakeUploader::default()),
            dir.path(),
        );

        ctl.stop().await.unwrap();
        assert_eq!(ctl.phase(), Phase::Idle);

        ctl.start().await.unwrap();
        ctl.stop().await.unwrap();
        ctl.stop().await.unwrap();
        assert_eq!(ctl.phase(), Phase::Previewing);
        assert_eq!(preview_files(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_discard_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::with_fragments(voice_fragments());
        let uploader = Arc::new(FakeUploader::default());
        let mut ctl = controller(source, uploader.clone(), dir.path());

        ctl.start().await.unwrap();
        assert!(ctl.source.stream_live());
        ctl.stop().await.unwrap();
        assert!(!ctl.source.stream_live());
        assert_eq!(preview_files(dir.path()), 1);

        ctl.discard();

        assert_eq!(ctl.phase(), Phase::Idle);
        assert!(ctl.preview().is_none());
        assert_eq!(preview_files(dir.path()), 0);
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_permission_denied_stays_idle() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(FakeUploader::default());
        let mut ctl = controller(
            FakeSource::failing(CaptureError::PermissionDenied),
            uploader.clone(),
            dir.path(),
        );

        let err = ctl.start().await.unwrap_err();
        assert!(matches!(err, RecorderError::PermissionDenied));
        assert_eq!(ctl.phase(), Phase::Idle);

        ctl.stop().await.unwrap();
        assert!(ctl.process(Arc::new(|_: UploadProgress| {})).is_none());
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(
            FakeSource::failing(CaptureError::DeviceUnavailable("no input device".into())),
            Arc::new(FakeUploader::default()),
            dir.path(),
        );

        let err = ctl.start().await.unwrap_err();
        assert!(matches!(err, RecorderError::DeviceUnavailable(_)));
        assert_eq!(ctl.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_start_while_recording_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(
            FakeSource::with_fragments(voice_fragments()),
            Arc::new(FakeUploader::default()),
            dir.path(),
        );

        ctl.start().await.unwrap();
        assert!(matches!(ctl.start().await, Err(RecorderError::Busy)));
        assert_eq!(ctl.phase(), Phase::Recording);
        assert!(ctl.elapsed().is_some());
        ctl.shutdown().await;
    }

    #[tokio::test]
    async fn test_upload_resets_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(FakeUploader::default());
        let mut ctl = controller(
            FakeSource::with_fragments(voice_fragments()),
            uploader.clone(),
            dir.path(),
        );

        ctl.start().await.unwrap();
        ctl.stop().await.unwrap();
        let size = ctl.preview().unwrap().artifact().len() as u64;

        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let job = ctl
            .process(Arc::new(move |p: UploadProgress| sink.lock().push(p)))
            .unwrap();
        assert_eq!(ctl.phase(), Phase::Uploading);
        assert_eq!(ctl.progress(), Some(UploadProgress::new(0, size)));

        let result = job.await;
        for p in reported.lock().iter() {
            ctl.report_progress(*p);
        }
        assert_eq!(ctl.progress().unwrap().percent_complete(), 100);

        let outcome = ctl.finish_upload(result);
        assert!(matches!(outcome, UploadOutcome::Uploaded));
        assert_eq!(ctl.phase(), Phase::Idle);
        assert_eq!(preview_files(dir.path()), 0);
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(uploader.received.lock()[0].mime_type(), "audio/wav");
    }

    #[tokio::test]
    async fn test_failed_upload_still_resets() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(FakeUploader {
            fail_with: Some(UploadError::Status(500)),
            ..Default::default()
        });
        let mut ctl = controller(
            FakeSource::with_fragments(voice_fragments()),
            uploader,
            dir.path(),
        );

        ctl.start().await.unwrap();
        ctl.stop().await.unwrap();
        let job = ctl.process(Arc::new(|_: UploadProgress| {})).unwrap();
        let outcome = ctl.finish_upload(job.await);

        assert!(matches!(
            outcome,
            UploadOutcome::Failed(RecorderError::UploadFailed(UploadError::Status(500)))
        ));
        assert_eq!(ctl.phase(), Phase::Idle);
        assert_eq!(preview_files(dir.path()), 0);

        // Ready for another take
        ctl.start().await.unwrap();
        ctl.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_recording_is_still_sent() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(FakeUploader {
            fail_with: Some(UploadError::Status(400)),
            ..Default::default()
        });
        let mut ctl = controller(
            FakeSource::with_fragments(Vec::new()),
            uploader.clone(),
            dir.path(),
        );

        ctl.start().await.unwrap();
        ctl.stop().await.unwrap();
        assert!(ctl.preview().unwrap().artifact().is_empty());

        let job = ctl.process(Arc::new(|_: UploadProgress| {})).unwrap();
        assert_eq!(ctl.progress().unwrap().percent_complete(), 100);
        ctl.finish_upload(job.await);

        assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
        assert!(uploader.received.lock()[0].is_empty());
        assert_eq!(ctl.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_frames_flow_while_recording() {
        let dir = tempfile::tempdir().unwrap();
        let frames = Arc::new(AtomicUsize::new(0));
        let counter = frames.clone();
        let mut ctl = RecorderController::new(
            FakeSource::with_fragments(voice_fragments()),
            Arc::new(FakeUploader::default()),
            dir.path().to_path_buf(),
            VisualizerConfig {
                bars: 4,
                frame_ms: 5,
            },
            Arc::new(move |frame: Spectrum| {
                assert_eq!(frame.len(), 4);
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        ctl.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        ctl.stop().await.unwrap();

        let seen = frames.load(Ordering::SeqCst);
        assert!(seen > 0);
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(frames.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(
            FakeSource::with_fragments(voice_fragments()),
            Arc::new(FakeUploader::default()),
            dir.path(),
        );

        ctl.start().await.unwrap();
        ctl.shutdown().await;
        assert_eq!(ctl.phase(), Phase::Idle);
        assert!(!ctl.source.stream_live());

        ctl.start().await.unwrap();
        ctl.stop().await.unwrap();
        ctl.shutdown().await;
        assert_eq!(preview_files(dir.path()), 0);
    }
}
