use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::task::Poll;
use std::time::{Duration, Instant};

/// Permissions that unlock headset camera access. Any one of them is enough.
pub const HEADSET_CAMERA_PERMISSIONS: [&str; 2] = [
    "android.permission.CAMERA",
    "horizonos.permission.HEADSET_CAMERA",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

/// An answer that arrives on some later tick.
#[derive(Debug)]
pub struct PermissionRequest {
    rx: Receiver<PermissionOutcome>,
}

impl PermissionRequest {
    /// A request answered through the returned sender.
    pub fn channel() -> (Sender<PermissionOutcome>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }

    /// A request that is already answered.
    pub fn resolved(outcome: PermissionOutcome) -> Self {
        let (tx, request) = Self::channel();
        // receiver is alive, send cannot fail
        let _ = tx.send(outcome);
        request
    }

    /// A dropped sender counts as a denial.
    pub fn poll(&self) -> Poll<PermissionOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Poll::Ready(outcome),
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => Poll::Ready(PermissionOutcome::Denied),
        }
    }
}

/// Platform permission dialogs.
pub trait PermissionBroker {
    fn has_permission(&self, id: &str) -> bool;

    fn request_permission(&mut self, id: &str) -> PermissionRequest;
}

/// Broker with a fixed answer, for platforms without a permission dialog.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions {
    granted: bool,
}

impl StaticPermissions {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

impl PermissionBroker for StaticPermissions {
    fn has_permission(&self, _id: &str) -> bool {
        self.granted
    }

    fn request_permission(&mut self, _id: &str) -> PermissionRequest {
        PermissionRequest::resolved(if self.granted {
            PermissionOutcome::Granted
        } else {
            PermissionOutcome::Denied
        })
    }
}

struct InFlight {
    id: String,
    request: PermissionRequest,
    deadline: Instant,
}

/// Asks for each permission in turn, one request in flight at a time,
/// stopping at the first grant.
pub(crate) struct PermissionFlow {
    remaining: VecDeque<String>,
    in_flight: Option<InFlight>,
    granted: bool,
    timeout: Duration,
}

impl PermissionFlow {
    pub(crate) fn new(ids: &[String], timeout: Duration) -> Self {
        Self {
            remaining: ids.iter().cloned().collect(),
            in_flight: None,
            granted: false,
            timeout,
        }
    }

    /// Resolves to whether any permission was granted.
    pub(crate) fn step(&mut self, broker: &mut dyn PermissionBroker, now: Instant) -> Poll<bool> {
        loop {
            if let Some(in_flight) = self.in_flight.take() {
                match in_flight.request.poll() {
                    Poll::Ready(outcome) => {
                        let granted = outcome == PermissionOutcome::Granted
                            || broker.has_permission(&in_flight.id);
                        tracing::info!("Permission {} granted={}", in_flight.id, granted);
                        self.granted |= granted;
                    }
                    Poll::Pending if now >= in_flight.deadline => {
                        tracing::warn!("Permission request {} timed out", in_flight.id);
                    }
                    Poll::Pending => {
                        self.in_flight = Some(in_flight);
                        return Poll::Pending;
                    }
                }
                continue;
            }

            if self.granted {
                return Poll::Ready(true);
            }
            let Some(id) = self.remaining.pop_front() else {
                return Poll::Ready(false);
            };

            if broker.has_permission(&id) {
                tracing::debug!("Permission {} already granted", id);
                self.granted = true;
                continue;
            }

            let request = broker.request_permission(&id);
            self.in_flight = Some(InFlight {
                id,
                request,
                deadline: now + self.timeout,
            });
        }
    }
}
