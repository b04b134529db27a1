use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded, select};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::CullingConfig;
use crate::culling::{CancellationToken, CullJob, CullOutcome, CullingScan};
use crate::error::InstancingResult;

/// Lifetime counters of a culling worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStats {
    pub jobs_completed: u64,
    pub jobs_cancelled: u64,
    pub jobs_rejected: u64,
    pub instances_tested: u64,
    pub last_elapsed: Duration,
}

/// Runs culling scans on a background thread.
///
/// One job may be in flight and one queued; [`submit`](Self::submit)
/// refuses further jobs until the worker catches up, so the frame thread
/// never blocks on it. Results come back through [`try_recv`](Self::try_recv).
pub struct CullingWorker {
    jobs: Option<Sender<CullJob>>,
    results: Receiver<CullOutcome>,
    // Never sent on; dropping it wakes a worker parked on a full result queue.
    stop: Option<Sender<()>>,
    cancel: CancellationToken,
    stats: Arc<Mutex<WorkerStats>>,
    handle: Option<JoinHandle<()>>,
}

impl CullingWorker {
    pub fn spawn(config: CullingConfig) -> InstancingResult<Self> {
        let (job_tx, job_rx) = bounded::<CullJob>(1);
        let (result_tx, result_rx) = bounded::<CullOutcome>(4);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let cancel = CancellationToken::new();
        let stats = Arc::new(Mutex::new(WorkerStats::default()));

        let worker_cancel = cancel.clone();
        let worker_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("skirmish-culling".into())
            .spawn(move || {
                Self::worker_loop(CullingScan::new(config), job_rx, result_tx, stop_rx, worker_cancel, worker_stats);
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            stop: Some(stop_tx),
            cancel,
            stats,
            handle: Some(handle),
        })
    }

    fn worker_loop(
        scan: CullingScan,
        jobs: Receiver<CullJob>,
        results: Sender<CullOutcome>,
        stop: Receiver<()>,
        cancel: CancellationToken,
        stats: Arc<Mutex<WorkerStats>>,
    ) {
        // Ends when the sender is dropped.
        for job in jobs.iter() {
            if cancel.is_cancelled() {
                break;
            }
            let _span = tracing::debug_span!("culling_job", generation = job.generation).entered();
            let outcome = scan.evaluate(&job, Some(&cancel));
            {
                let mut s = stats.lock();
                s.instances_tested += outcome.stats.tested as u64;
                s.last_elapsed = outcome.stats.elapsed;
                if outcome.cancelled {
                    s.jobs_cancelled += 1;
                } else {
                    s.jobs_completed += 1;
                }
            }
            if outcome.cancelled {
                break;
            }
            let delivered = select! {
                send(results, outcome) -> sent => sent.is_ok(),
                recv(stop) -> _ => false,
            };
            if !delivered {
                break;
            }
        }
        tracing::debug!("culling worker stopped");
    }

    /// Queue a job. Returns false when the worker is still busy with the
    /// previous one or has stopped.
    pub fn submit(&self, job: CullJob) -> bool {
        let Some(jobs) = &self.jobs else {
            return false;
        };
        match jobs.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.stats.lock().jobs_rejected += 1;
                false
            }
        }
    }

    pub fn try_recv(&self) -> Option<CullOutcome> {
        match self.results.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<CullOutcome> {
        self.results.recv_timeout(timeout).ok()
    }

    /// The freshest finished outcome, discarding older ones.
    pub fn latest(&self) -> Option<CullOutcome> {
        let mut latest = None;
        while let Some(outcome) = self.try_recv() {
            latest = Some(outcome);
        }
        latest
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel any running scan, wake the thread and wait for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        self.jobs.take();
        self.stop.take();
        while self.results.try_recv().is_ok() {}
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CullingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::CullEntry;
    use glam::{Mat4, Vec3};
    use skirmish_common::{BoundingSphere, Camera, FixedCamera, InstanceKey, ItemType};

    fn job(count: u64) -> CullJob {
        let camera = FixedCamera::looking_at(Vec3::new(0.0, 5.0, 20.0), Vec3::ZERO, 1.0, 1.0);
        CullJob {
            generation: 1,
            frustum: Some(camera.frustum()),
            entries: (0..count)
                .map(|i| CullEntry {
                    item_type: ItemType(0),
                    key: InstanceKey(i),
                    world: Mat4::from_translation(Vec3::new(i as f32 * 100.0, 0.0, 0.0)),
                    bounds: BoundingSphere::new(Vec3::ZERO, 1.0),
                    was_visible: true,
                })
                .collect(),
        }
    }

    #[test]
    fn round_trip_through_worker() {
        let worker = CullingWorker::spawn(CullingConfig::default()).unwrap();
        assert!(worker.submit(job(4)));
        let outcome = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.stats.tested, 4);
        // Only the instance at the origin stays in view.
        assert_eq!(outcome.changes.len(), 3);
        assert_eq!(worker.stats().jobs_completed, 1);
        worker.shutdown();
    }

    #[test]
    fn shutdown_is_prompt_when_idle() {
        let worker = CullingWorker::spawn(CullingConfig::default()).unwrap();
        let token = worker.cancellation_token();
        worker.shutdown();
        assert!(token.is_cancelled());
    }

    #[test]
    fn shutdown_with_unread_results_does_not_hang() {
        let worker = CullingWorker::spawn(CullingConfig::default()).unwrap();
        let mut accepted = 0;
        for _ in 0..2000 {
            if worker.submit(job(3)) {
                accepted += 1;
                if accepted == 6 {
                    break;
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(accepted, 6);

        let (done_tx, done_rx) = bounded::<()>(1);
        thread::spawn(move || {
            worker.shutdown();
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn drop_joins_the_thread() {
        let worker = CullingWorker::spawn(CullingConfig::default()).unwrap();
        assert!(worker.submit(job(2)));
        drop(worker);
    }
}
