//! Background rotation worker.
//!
//! Rotation is cooperative: the ingest path notices a stale head
//! timestamp and signals this worker, so ingest itself never pays for
//! more than the reader-lock acquisition. The signal channel holds a
//! single slot; while a rotation is pending, further signals are dropped.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;

use crate::predictor::PredictorShared;

pub(crate) enum RotateRequest {
    At(Instant),
    Shutdown,
}

/// Handle to the rotator thread. Joined on drop.
pub(crate) struct Rotator {
    tx: Sender<RotateRequest>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Rotator {
    pub(crate) fn spawn(shared: Arc<PredictorShared>) -> Self {
        let (tx, rx) = bounded::<RotateRequest>(1);
        let worker = thread::spawn(move || worker_loop(shared, rx));

        Self {
            tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Request a rotation up to `ts`. Never blocks; a request already in
    /// flight covers this one.
    pub(crate) fn signal(&self, ts: Instant) {
        let _ = self.tx.try_send(RotateRequest::At(ts));
    }

    pub(crate) fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = self.tx.send(RotateRequest::Shutdown);
            let _ = worker.join();
        }
    }
}

impl Drop for Rotator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shared: Arc<PredictorShared>, rx: Receiver<RotateRequest>) {
    while let Ok(request) = rx.recv() {
        match request {
            RotateRequest::At(ts) => {
                shared.rotate(ts);
            }
            RotateRequest::Shutdown => break,
        }
    }
}
