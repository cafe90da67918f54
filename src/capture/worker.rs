//! Background capture thread for sources whose reads block.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::thread;
use std::time::Duration;

use super::CameraFrame;
use crate::cancel::CancelToken;

/// A camera that hands out frames by blocking until one is ready.
pub(crate) trait BlockingSource {
    fn read_frame(&mut self) -> Result<CameraFrame, String>;

    fn stop(&mut self);
}

/// Owns a [`BlockingSource`] on its own thread and forwards its frames.
///
/// The source is opened on the worker thread, so it never has to be `Send`.
pub(crate) struct CaptureWorker {
    frames: Receiver<CameraFrame>,
    cancel: CancelToken,
    handle: Option<thread::JoinHandle<()>>,
}

impl CaptureWorker {
    /// Frames kept waiting for the consumer; older ones are dropped on the worker side.
    const BACKLOG: usize = 2;

    /// Start the thread and wait at most `open_timeout` for `open` to report.
    pub(crate) fn spawn<S, F>(name: &str, open: F, open_timeout: Duration) -> Result<Self, String>
    where
        S: BlockingSource,
        F: FnOnce() -> Result<S, String> + Send + 'static,
    {
        let (opened_tx, opened_rx) = mpsc::channel();
        let (frame_tx, frames) = mpsc::sync_channel(Self::BACKLOG);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let source = match open() {
                    Ok(source) => source,
                    Err(e) => {
                        let _ = opened_tx.send(Err(e));
                        return;
                    }
                };
                if opened_tx.send(Ok(())).is_err() {
                    // nobody waited long enough
                    let mut source = source;
                    source.stop();
                    return;
                }
                pump(source, &frame_tx, &worker_cancel);
            })
            .map_err(|e| format!("Failed to start capture thread: {}", e))?;

        let worker = Self {
            frames,
            cancel,
            handle: Some(handle),
        };
        match opened_rx.recv_timeout(open_timeout) {
            Ok(Ok(())) => Ok(worker),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(format!(
                "Camera did not open within {:.1}s",
                open_timeout.as_secs_f32()
            )),
            Err(RecvTimeoutError::Disconnected) => Err("Capture thread exited while opening".into()),
        }
    }

    /// Newest frame since the last call, without waiting.
    pub(crate) fn latest(&self) -> Result<Option<CameraFrame>, String> {
        let mut latest = None;
        loop {
            match self.frames.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => return Ok(latest),
                Err(TryRecvError::Disconnected) if latest.is_some() => return Ok(latest),
                Err(TryRecvError::Disconnected) => return Err("Capture thread stopped".into()),
            }
        }
    }

    /// Signal the thread to stop. It exits after its current read returns.
    pub(crate) fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consecutive failed reads after which the stream counts as lost.
const MAX_FAILED_READS: u32 = 30;

fn pump<S: BlockingSource>(mut source: S, frames: &SyncSender<CameraFrame>, cancel: &CancelToken) {
    let mut failed_reads = 0;
    while !cancel.is_cancelled() {
        let frame = match source.read_frame() {
            Ok(frame) => {
                failed_reads = 0;
                frame
            }
            Err(e) => {
                tracing::debug!("Capture read failed: {}", e);
                failed_reads += 1;
                if failed_reads >= MAX_FAILED_READS {
                    tracing::warn!("Capture stream lost after {} failed reads", failed_reads);
                    break;
                }
                continue;
            }
        };
        match frames.try_send(frame) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    source.stop();
    tracing::debug!("Capture thread stopped");
}
