//! Cross-thread inspector hand-off.
//!
//! Worker threads that hit a fault request an inspector; the request is
//! queued to the thread that owns the presentation layer. At most one
//! inspector is outstanding, later requests are dropped until it closes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::frame::{call_chain, ExecutionFrame, FrameSummary};
use crate::value::Value;

/// What the inspector shows for a fault.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultReport {
    pub message: String,
    /// Call chain, outermost first.
    pub frames: Vec<FrameSummary>,
    pub locals: Vec<(SmolStr, Value)>,
}

impl FaultReport {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            frames: Vec::new(),
            locals: Vec::new(),
        }
    }

    /// Copy the chain and locals out of the faulting frame.
    #[must_use]
    pub fn capture(message: impl Into<String>, frame: &dyn ExecutionFrame) -> Self {
        Self {
            message: message.into(),
            frames: call_chain(frame),
            locals: frame.locals(),
        }
    }
}

/// Create a gate for worker threads and the receiver for the presentation
/// thread.
#[must_use]
pub fn inspector_channel() -> (InspectorGate, InspectorReceiver) {
    let (tx, rx) = channel();
    let outstanding = Arc::new(AtomicBool::new(false));
    (
        InspectorGate {
            outstanding: Arc::clone(&outstanding),
            tx,
        },
        InspectorReceiver { rx },
    )
}

#[derive(Debug, Clone)]
pub struct InspectorGate {
    outstanding: Arc<AtomicBool>,
    tx: Sender<InspectorRequest>,
}

impl InspectorGate {
    /// Queue a request. Returns `false` when an inspector is already
    /// outstanding or the presentation thread is gone.
    pub fn request(&self, report: FaultReport) -> bool {
        if self
            .outstanding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(message = %report.message, "inspector already open, request dropped");
            return false;
        }
        let request = InspectorRequest {
            report,
            handle: InspectorHandle {
                outstanding: Arc::clone(&self.outstanding),
                closed: false,
            },
        };
        if let Err(err) = self.tx.send(request) {
            warn!("inspector receiver dropped");
            // the returned request carries a handle; dropping it reopens the gate
            drop(err.0);
            return false;
        }
        true
    }

    #[must_use]
    pub fn is_outstanding(&self) -> bool {
        self.outstanding.load(Ordering::Acquire)
    }
}

/// A queued request, consumed once on the presentation thread.
#[derive(Debug)]
pub struct InspectorRequest {
    report: FaultReport,
    handle: InspectorHandle,
}

impl InspectorRequest {
    #[must_use]
    pub fn report(&self) -> &FaultReport {
        &self.report
    }

    /// Take the report and the handle that keeps the inspector outstanding.
    #[must_use]
    pub fn open(self) -> (FaultReport, InspectorHandle) {
        (self.report, self.handle)
    }
}

/// Held while the inspector is visible. Closing or dropping it allows the
/// next request.
#[derive(Debug)]
pub struct InspectorHandle {
    outstanding: Arc<AtomicBool>,
    closed: bool,
}

impl InspectorHandle {
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.outstanding.store(false, Ordering::Release);
        }
    }
}

impl Drop for InspectorHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug)]
pub struct InspectorReceiver {
    rx: Receiver<InspectorRequest>,
}

impl InspectorReceiver {
    /// Non-blocking poll, for use inside a presentation event loop.
    #[must_use]
    pub fn try_next(&self) -> Option<InspectorRequest> {
        self.rx.try_recv().ok()
    }

    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InspectorRequest> {
        match self.rx.recv_timeout(timeout) {
            Ok(request) => Some(request),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn duplicate_requests_are_dropped_until_close() {
        let (gate, receiver) = inspector_channel();
        assert!(gate.request(FaultReport::new("first")));
        assert!(!gate.request(FaultReport::new("second")));

        let request = receiver.try_next().unwrap();
        assert!(receiver.try_next().is_none());
        let (report, handle) = request.open();
        assert_eq!(report.message, "first");
        assert!(gate.is_outstanding());

        handle.close();
        assert!(!gate.is_outstanding());
        assert!(gate.request(FaultReport::new("third")));
    }

    #[test]
    fn worker_threads_hand_off_to_owner() {
        let (gate, receiver) = inspector_channel();
        let workers: Vec<_> = (0..4)
            .map(|idx| {
                let gate = gate.clone();
                thread::spawn(move || gate.request(FaultReport::new(format!("worker {idx}"))))
            })
            .collect();
        let accepted = workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .filter(|accepted| *accepted)
            .count();
        assert_eq!(accepted, 1);

        let request = receiver.recv_timeout(Duration::from_millis(500)).unwrap();
        assert!(request.report().message.starts_with("worker "));
        drop(request);
        assert!(!gate.is_outstanding());
    }

    #[test]
    fn closed_receiver_reopens_gate() {
        let (gate, receiver) = inspector_channel();
        drop(receiver);
        assert!(!gate.request(FaultReport::new("lost")));
        assert!(!gate.is_outstanding());
    }
}
