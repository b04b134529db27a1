use glam::Mat4;
use skirmish_common::{BoundingSphere, Frustum, InstanceKey, ItemType};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::CullingConfig;

/// Shared flag a scan polls at every budget checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Snapshot of one live instance taken for a culling pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullEntry {
    pub item_type: ItemType,
    pub key: InstanceKey,
    pub world: Mat4,
    pub bounds: BoundingSphere,
    pub was_visible: bool,
}

/// Everything a scan needs, detached from the registry so it can move to
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct CullJob {
    /// Camera generation the frustum was taken at.
    pub generation: u64,
    pub frustum: Option<Frustum>,
    /// Grouped by item type.
    pub entries: Vec<CullEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChange {
    pub item_type: ItemType,
    pub key: InstanceKey,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    pub tested: usize,
    pub visible: usize,
    pub became_visible: usize,
    pub became_hidden: usize,
    pub throttled: usize,
    pub elapsed: Duration,
}

/// Result of a scan: only the instances whose visibility flipped.
#[derive(Debug, Clone, Default)]
pub struct CullOutcome {
    pub generation: u64,
    pub changes: Vec<VisibilityChange>,
    pub stats: CullStats,
    /// The scan stopped early; `changes` covers the entries tested so far.
    pub cancelled: bool,
}

/// Time-budgeted frustum test over a job's entries.
#[derive(Debug, Clone, Default)]
pub struct CullingScan {
    config: CullingConfig,
}

impl CullingScan {
    pub fn new(config: CullingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    pub fn evaluate(&self, job: &CullJob, cancel: Option<&CancellationToken>) -> CullOutcome {
        let started = Instant::now();
        let mut window = started;
        let mut outcome = CullOutcome {
            generation: job.generation,
            ..CullOutcome::default()
        };
        let Some(frustum) = job.frustum else {
            return outcome;
        };
        let check_interval = self.config.check_interval.max(1);
        let mut since_check = 0;
        let mut previous_type = None;

        for entry in &job.entries {
            let type_boundary = previous_type.is_some_and(|t| t != entry.item_type);
            previous_type = Some(entry.item_type);
            if type_boundary || since_check >= check_interval {
                since_check = 0;
                if cancel.is_some_and(CancellationToken::is_cancelled) {
                    outcome.cancelled = true;
                    break;
                }
                if window.elapsed() > self.config.budget() {
                    self.back_off();
                    outcome.stats.throttled += 1;
                    window = Instant::now();
                }
            }

            let visible = frustum.test_sphere(&entry.world, &entry.bounds);
            outcome.stats.tested += 1;
            since_check += 1;
            if visible {
                outcome.stats.visible += 1;
            }
            if visible != entry.was_visible {
                if visible {
                    outcome.stats.became_visible += 1;
                } else {
                    outcome.stats.became_hidden += 1;
                }
                outcome.changes.push(VisibilityChange {
                    item_type: entry.item_type,
                    key: entry.key,
                    visible,
                });
            }
        }

        outcome.stats.elapsed = started.elapsed();
        tracing::trace!(
            tested = outcome.stats.tested,
            changes = outcome.changes.len(),
            throttled = outcome.stats.throttled,
            "culling scan complete"
        );
        outcome
    }

    fn back_off(&self) {
        let pause = self.config.yield_duration();
        if pause.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(pause);
        }
    }
}
