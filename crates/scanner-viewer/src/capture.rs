//! Background frame capture: one thread waits on the pipeline and hands
//! bundles to the render tick through a small drop-oldest queue.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use rgbd::{FrameBundle, SensorError, SensorPipeline};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Bounded single-producer/single-consumer queue that evicts the oldest
/// bundle when full.
#[derive(Clone)]
pub struct FrameQueue {
    tx: Sender<FrameBundle>,
    rx: Receiver<FrameBundle>,
    dropped: Arc<AtomicU64>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn push(&self, mut bundle: FrameBundle) {
        loop {
            match self.tx.try_send(bundle) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    bundle = back;
                    if self.rx.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                // Both ends live in `self`, so this cannot happen.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Drains the queue and returns the newest bundle.
    pub fn take_latest(&self) -> Option<FrameBundle> {
        let mut latest = None;
        while let Ok(bundle) = self.rx.try_recv() {
            if latest.is_some() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            latest = Some(bundle);
        }
        latest
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Bundles discarded without being rendered.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Owns the capture thread. Dropping the worker cancels and joins it.
pub struct CaptureWorker {
    queue: FrameQueue,
    cancel: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<Result<(), SensorError>>>,
}

impl CaptureWorker {
    pub fn spawn<P>(pipeline: Arc<P>, capacity: usize, timeout: Duration) -> std::io::Result<Self>
    where
        P: SensorPipeline + 'static,
    {
        let queue = FrameQueue::new(capacity);
        let cancel = Arc::new(AtomicBool::new(false));

        let handle = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("frame-capture".into())
                .spawn(move || capture_loop(pipeline.as_ref(), &queue, &cancel, timeout))?
        };

        log::info!("Capture thread started (queue capacity {})", capacity);
        Ok(Self {
            queue,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn take_latest(&self) -> Option<FrameBundle> {
        self.queue.take_latest()
    }

    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// True once the thread has exited on its own (pipeline error).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Cancels the thread and waits for it; returns the error that ended it,
    /// if any. The wait is bounded by one pipeline timeout.
    pub fn stop(&mut self) -> Option<SensorError> {
        self.cancel.store(true, Ordering::Release);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(SensorError::Disconnected("capture thread panicked".into())),
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<P: SensorPipeline + ?Sized>(
    pipeline: &P,
    queue: &FrameQueue,
    cancel: &AtomicBool,
    timeout: Duration,
) -> Result<(), SensorError> {
    while !cancel.load(Ordering::Acquire) {
        match pipeline.wait_for_frame_bundle(timeout) {
            Ok(bundle) => queue.push(bundle),
            Err(SensorError::Timeout(_)) => log::trace!("Capture wait timed out"),
            Err(SensorError::NotStreaming) if cancel.load(Ordering::Acquire) => break,
            Err(e) => {
                log::warn!("Capture thread stopping: {}", e);
                return Err(e);
            }
        }
    }
    log::debug!("Capture thread cancelled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgbd::{SyntheticCamera, SyntheticConfig};
    use std::time::Instant;

    fn bundle(ts: f64) -> FrameBundle {
        FrameBundle::new(ts, Vec::new())
    }

    #[test]
    fn full_queue_drops_oldest() {
        let q = FrameQueue::new(2);
        q.push(bundle(1.0));
        q.push(bundle(2.0));
        q.push(bundle(3.0));

        assert_eq!(q.len(), 2);
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.take_latest().map(|b| b.timestamp_ms), Some(3.0));
        assert!(q.is_empty());
        assert_eq!(q.dropped(), 2);
    }

    #[test]
    fn empty_queue_yields_nothing() {
        let q = FrameQueue::new(3);
        assert!(q.take_latest().is_none());
        assert_eq!(q.dropped(), 0);
    }

    #[test]
    fn worker_delivers_frames_and_stops_promptly() {
        let cam = Arc::new(SyntheticCamera::new(SyntheticConfig {
            width: 16,
            height: 12,
            fps: 200,
            ..SyntheticConfig::default()
        }));
        cam.open().unwrap();

        let mut worker = CaptureWorker::spawn(cam.clone(), 2, Duration::from_millis(20)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut got = None;
        while got.is_none() && Instant::now() < deadline {
            got = worker.take_latest();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(got.is_some_and(|b| b.depth().is_some()));

        let started = Instant::now();
        assert!(worker.stop().is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(worker.is_finished());
    }

    #[test]
    fn worker_exits_when_pipeline_closes_underneath() {
        let cam = Arc::new(SyntheticCamera::new(SyntheticConfig {
            width: 8,
            height: 8,
            ..SyntheticConfig::default()
        }));
        // Never opened: the first wait reports NotStreaming.
        let mut worker = CaptureWorker::spawn(cam, 2, Duration::from_millis(5)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(worker.stop(), Some(SensorError::NotStreaming)));
    }
}
