//! Device lifecycle around a sensor pipeline.
//!
//! `Disconnected -> Ready -> Streaming`, and `stop()` returns to
//! `Disconnected` from either. "No device" is a steady state reported
//! through return values, not an error.

use crate::capture::CaptureWorker;
use rgbd::{FrameBundle, SensorError, SensorPipeline};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// A device is attached but not streaming.
    Ready,
    Streaming,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Ready => "Ready",
            SessionState::Streaming => "Streaming",
        }
    }
}

/// Result of `DeviceSession::start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Streaming,
    AlreadyStreaming,
    NoDevice,
    /// A device was found but its pipeline could not be opened.
    OpenFailed(String),
}

/// Result of one wait for frames.
#[derive(Debug)]
pub enum FramePoll {
    Frames(FrameBundle),
    /// Nothing new this tick (timeout, or an empty capture queue).
    Empty,
    NotStreaming,
    /// The pipeline failed mid-stream; the session has been stopped.
    Lost(SensorError),
}

/// Where frame waits happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// The render tick blocks on the pipeline.
    Inline,
    /// A capture thread waits; the tick drains a bounded queue.
    Threaded { capacity: usize },
}

pub struct DeviceSession<P: SensorPipeline + 'static> {
    pipeline: Arc<P>,
    state: SessionState,
    seen_device: bool,
    mode: CaptureMode,
    timeout: Duration,
    worker: Option<CaptureWorker>,
}

impl<P: SensorPipeline + 'static> DeviceSession<P> {
    pub fn new(pipeline: P, mode: CaptureMode, timeout: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            state: SessionState::Disconnected,
            seen_device: false,
            mode,
            timeout,
            worker: None,
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True only while streaming.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Whether a device has been detected at least once.
    #[inline]
    pub fn has_seen_device(&self) -> bool {
        self.seen_device
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Bundles the capture thread discarded without rendering.
    pub fn dropped_frames(&self) -> u64 {
        self.worker.as_ref().map_or(0, |w| w.dropped())
    }

    /// Re-checks device availability without opening the pipeline.
    pub fn probe(&mut self) -> SessionState {
        if self.state == SessionState::Streaming {
            return self.state;
        }

        let count = self.pipeline.enumerate_devices();
        let next = if count > 0 {
            self.seen_device = true;
            SessionState::Ready
        } else {
            SessionState::Disconnected
        };
        if next != self.state {
            log::info!("Device availability changed: {} device(s) attached", count);
        }
        self.state = next;
        self.state
    }

    pub fn start(&mut self) -> StartOutcome {
        if self.state == SessionState::Streaming {
            return StartOutcome::AlreadyStreaming;
        }

        let count = self.pipeline.enumerate_devices();
        if count == 0 {
            self.state = SessionState::Disconnected;
            log::warn!("No device connected");
            return StartOutcome::NoDevice;
        }
        self.seen_device = true;
        self.state = SessionState::Ready;

        if let Err(e) = self.pipeline.open() {
            log::warn!("Failed to start streaming: {}", e);
            return StartOutcome::OpenFailed(e.to_string());
        }

        if let CaptureMode::Threaded { capacity } = self.mode {
            match CaptureWorker::spawn(self.pipeline.clone(), capacity, self.timeout) {
                Ok(worker) => self.worker = Some(worker),
                Err(e) => {
                    self.pipeline.close();
                    log::warn!("Failed to spawn capture thread: {}", e);
                    return StartOutcome::OpenFailed(e.to_string());
                }
            }
        }

        self.state = SessionState::Streaming;
        log::info!("Streaming started ({} device(s) attached)", count);
        StartOutcome::Streaming
    }

    /// Tears down the pipeline. A no-op while disconnected.
    pub fn stop(&mut self) {
        match self.state {
            SessionState::Disconnected => {}
            SessionState::Ready => {
                self.state = SessionState::Disconnected;
            }
            SessionState::Streaming => {
                // Join the capture thread before closing so no wait outlives the pipeline.
                if let Some(mut worker) = self.worker.take() {
                    if let Some(e) = worker.stop() {
                        log::debug!("Capture thread ended with: {}", e);
                    }
                }
                self.pipeline.close();
                self.state = SessionState::Disconnected;
                log::info!("Streaming stopped");
            }
        }
    }

    /// Waits for the next frame bundle. Inline mode blocks up to the
    /// session timeout; threaded mode returns the newest queued bundle.
    pub fn wait_for_frames(&mut self) -> FramePoll {
        if self.state != SessionState::Streaming {
            return FramePoll::NotStreaming;
        }

        let result = match self.worker.as_mut() {
            Some(worker) => match worker.take_latest() {
                Some(bundle) => Ok(bundle),
                None if worker.is_finished() => Err(worker
                    .stop()
                    .unwrap_or_else(|| SensorError::Disconnected("capture thread exited".into()))),
                None => return FramePoll::Empty,
            },
            None => self.pipeline.wait_for_frame_bundle(self.timeout),
        };

        match result {
            Ok(bundle) => FramePoll::Frames(bundle),
            Err(SensorError::Timeout(t)) => {
                log::debug!("No frame bundle within {:?}", t);
                FramePoll::Empty
            }
            Err(e) => {
                log::warn!("Lost device while streaming: {}", e);
                self.stop();
                FramePoll::Lost(e)
            }
        }
    }
}

impl<P: SensorPipeline + 'static> Drop for DeviceSession<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::FakePipeline;
    use rgbd::{SyntheticCamera, SyntheticConfig};

    /// Scripted pipeline for state machine tests.
    mod fake {
        use super::*;
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
        use std::sync::Mutex;

        #[derive(Default)]
        pub struct FakePipeline {
            pub devices: AtomicUsize,
            pub fail_open: AtomicBool,
            pub open: AtomicBool,
            pub opens: AtomicUsize,
            pub closes: AtomicUsize,
            pub next_error: Mutex<Option<SensorError>>,
        }

        impl FakePipeline {
            pub fn with_devices(n: usize) -> Self {
                let p = Self::default();
                p.devices.store(n, Ordering::SeqCst);
                p
            }
        }

        impl SensorPipeline for FakePipeline {
            fn enumerate_devices(&self) -> usize {
                self.devices.load(Ordering::SeqCst)
            }

            fn open(&self) -> Result<(), SensorError> {
                if self.fail_open.load(Ordering::SeqCst) {
                    return Err(SensorError::Open("busy".into()));
                }
                self.opens.fetch_add(1, Ordering::SeqCst);
                self.open.store(true, Ordering::SeqCst);
                Ok(())
            }

            fn close(&self) {
                self.closes.fetch_add(1, Ordering::SeqCst);
                self.open.store(false, Ordering::SeqCst);
            }

            fn wait_for_frame_bundle(&self, timeout: Duration) -> Result<FrameBundle, SensorError> {
                if let Some(e) = self.next_error.lock().unwrap().take() {
                    return Err(e);
                }
                if !self.open.load(Ordering::SeqCst) {
                    return Err(SensorError::NotStreaming);
                }
                if timeout.is_zero() {
                    return Err(SensorError::Timeout(timeout));
                }
                Ok(FrameBundle::new(1.0, Vec::new()))
            }
        }
    }

    use std::sync::atomic::Ordering;

    fn inline(p: FakePipeline) -> DeviceSession<FakePipeline> {
        DeviceSession::new(p, CaptureMode::Inline, Duration::from_millis(10))
    }

    #[test]
    fn start_without_device_stays_disconnected() {
        let mut s = inline(FakePipeline::with_devices(0));
        assert_eq!(s.start(), StartOutcome::NoDevice);
        assert_eq!(s.state(), SessionState::Disconnected);
        assert!(!s.is_ready());
        assert!(!s.has_seen_device());
        assert!(matches!(s.wait_for_frames(), FramePoll::NotStreaming));
    }

    #[test]
    fn retry_after_device_appears() {
        let mut s = inline(FakePipeline::with_devices(0));
        assert_eq!(s.start(), StartOutcome::NoDevice);

        s.pipeline().devices.store(1, Ordering::SeqCst);
        assert_eq!(s.start(), StartOutcome::Streaming);
        assert!(s.is_ready());
        assert!(s.has_seen_device());
        assert!(matches!(s.wait_for_frames(), FramePoll::Frames(_)));
        assert_eq!(s.start(), StartOutcome::AlreadyStreaming);
        assert_eq!(s.pipeline().opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_returns_to_disconnected_and_is_idempotent() {
        let mut s = inline(FakePipeline::with_devices(1));
        s.start();
        s.stop();
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(s.pipeline().closes.load(Ordering::SeqCst), 1);

        s.stop();
        assert_eq!(s.pipeline().closes.load(Ordering::SeqCst), 1);
        assert!(matches!(s.wait_for_frames(), FramePoll::NotStreaming));
    }

    #[test]
    fn open_failure_leaves_device_ready() {
        let p = FakePipeline::with_devices(1);
        p.fail_open.store(true, Ordering::SeqCst);
        let mut s = inline(p);

        assert!(matches!(s.start(), StartOutcome::OpenFailed(_)));
        assert_eq!(s.state(), SessionState::Ready);
        assert!(!s.is_ready());

        s.stop();
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(s.pipeline().closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn probe_tracks_availability() {
        let mut s = inline(FakePipeline::with_devices(0));
        assert_eq!(s.probe(), SessionState::Disconnected);

        s.pipeline().devices.store(2, Ordering::SeqCst);
        assert_eq!(s.probe(), SessionState::Ready);
        assert!(s.has_seen_device());

        s.pipeline().devices.store(0, Ordering::SeqCst);
        assert_eq!(s.probe(), SessionState::Disconnected);
        assert!(s.has_seen_device());
    }

    #[test]
    fn timeout_is_silent() {
        let mut s = DeviceSession::new(FakePipeline::with_devices(1), CaptureMode::Inline, Duration::ZERO);
        s.start();
        assert!(matches!(s.wait_for_frames(), FramePoll::Empty));
        assert!(s.is_ready());
    }

    #[test]
    fn pipeline_failure_stops_session() {
        let mut s = inline(FakePipeline::with_devices(1));
        s.start();
        *s.pipeline().next_error.lock().unwrap() = Some(SensorError::Disconnected("unplugged".into()));

        assert!(matches!(s.wait_for_frames(), FramePoll::Lost(SensorError::Disconnected(_))));
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[test]
    fn threaded_session_streams_and_stops() {
        let cam = SyntheticCamera::new(SyntheticConfig {
            width: 16,
            height: 12,
            fps: 200,
            ..SyntheticConfig::default()
        });
        let mut s = DeviceSession::new(cam, CaptureMode::Threaded { capacity: 2 }, Duration::from_millis(20));
        assert_eq!(s.start(), StartOutcome::Streaming);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut got = false;
        while !got && std::time::Instant::now() < deadline {
            got = matches!(s.wait_for_frames(), FramePoll::Frames(_));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(got);

        s.stop();
        assert_eq!(s.state(), SessionState::Disconnected);
        assert!(matches!(s.wait_for_frames(), FramePoll::NotStreaming));
    }
}
