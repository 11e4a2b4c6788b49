use std::{collections::HashMap, sync::Arc};

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use portable_atomic::{AtomicU128, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{ConfigError, IdScope, SegmentError, SegmentMetrics, SegmentRange, SegmentRepository};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentConfig {
    /// Ids reserved per repository round trip.
    pub step: u32,
}

impl SegmentConfig {
    pub const DEFAULT_STEP: u32 = 1000;
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            step: Self::DEFAULT_STEP,
        }
    }
}

/// The in-memory range of one scope.
///
/// `state` packs `(end << 64) | cursor`, where `cursor` is the last id handed
/// out. A single `fetch_add(1)` both claims the next id and observes the end
/// of the range it was claimed from, so the fast path never locks.
#[derive(Debug)]
struct SegmentBuffer {
    state: CachePadded<AtomicU128>,
    /// End of the last installed range. Held across the repository call.
    refill: Mutex<i64>,
}

impl SegmentBuffer {
    fn new() -> Self {
        Self {
            state: CachePadded::new(AtomicU128::new(0)),
            refill: Mutex::new(0),
        }
    }

    #[inline]
    fn unpack(state: u128) -> (u64, u64) {
        ((state >> 64) as u64, state as u64)
    }

    #[inline]
    fn try_take(&self) -> Option<i64> {
        let (end, prev) = Self::unpack(self.state.fetch_add(1, Ordering::AcqRel));
        let cursor = prev + 1;
        // Both halves are bounded by i64::MAX.
        (cursor <= end).then_some(cursor as i64)
    }

    fn has_remaining(&self) -> bool {
        let (end, cursor) = Self::unpack(self.state.load(Ordering::Acquire));
        cursor < end
    }

    /// Only called once the current range is fully claimed, so increments
    /// overwritten here had all failed.
    fn install(&self, range: SegmentRange) {
        let end = range.end() as u64;
        let cursor = (range.start() - 1) as u64;
        self.state
            .store((u128::from(end) << 64) | u128::from(cursor), Ordering::Release);
    }
}

/// Hands out legacy `i64` ids from locally cached ranges, one counter per
/// [`IdScope`].
///
/// Only one thread per scope pays the repository round trip when a range runs
/// out; everyone else keeps claiming from the atomic cursor.
pub struct SegmentAllocator<R>
where
    R: SegmentRepository,
{
    repository: R,
    step: u32,
    buffers: RwLock<HashMap<IdScope, Arc<SegmentBuffer>>>,
    metrics: SegmentMetrics,
}

impl<R> SegmentAllocator<R>
where
    R: SegmentRepository,
{
    /// # Errors
    ///
    /// A zero step is rejected.
    pub fn new(config: SegmentConfig, repository: R) -> Result<Self, ConfigError> {
        if config.step == 0 {
            return Err(ConfigError::SegmentStep);
        }
        Ok(Self {
            repository,
            step: config.step,
            buffers: RwLock::new(HashMap::new()),
            metrics: SegmentMetrics::default(),
        })
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn metrics(&self) -> &SegmentMetrics {
        &self.metrics
    }

    /// Returns the next id of `scope`: positive and never repeated.
    ///
    /// # Errors
    ///
    /// [`SegmentError::Repository`] when a refill fails, and
    /// [`SegmentError::InvalidRange`] when the repository returns a range
    /// that overlaps or precedes the previous one. In both cases nothing is
    /// installed and the call can be retried.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, scope), fields(scope = %scope)))]
    pub fn next_id(&self, scope: &IdScope) -> Result<i64, SegmentError> {
        let buffer = self.buffer(scope);
        loop {
            if let Some(id) = buffer.try_take() {
                return Ok(id);
            }
            self.refill(scope, &buffer)?;
        }
    }

    fn buffer(&self, scope: &IdScope) -> Arc<SegmentBuffer> {
        if let Some(buffer) = self.buffers.read().get(scope) {
            return Arc::clone(buffer);
        }
        let mut buffers = self.buffers.write();
        Arc::clone(
            buffers
                .entry(scope.clone())
                .or_insert_with(|| Arc::new(SegmentBuffer::new())),
        )
    }

    #[cold]
    fn refill(&self, scope: &IdScope, buffer: &SegmentBuffer) -> Result<(), SegmentError> {
        let mut last_end = buffer.refill.lock();
        if buffer.has_remaining() {
            // Another thread refilled while we waited for the lock.
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(scope = %scope, step = self.step, "requesting segment");

        let range = self.repository.next_range(scope, self.step).map_err(|e| {
            self.metrics.record_refresh_failed();
            #[cfg(feature = "tracing")]
            tracing::error!(scope = %scope, error = %e, "segment refresh failed");
            SegmentError::Repository {
                scope: scope.to_string(),
                source: Box::new(e),
            }
        })?;

        if range.start() <= *last_end {
            self.metrics.record_invalid_range();
            #[cfg(feature = "tracing")]
            tracing::error!(
                scope = %scope,
                start = range.start(),
                end = range.end(),
                last_end = *last_end,
                "repository returned an overlapping range"
            );
            return Err(SegmentError::InvalidRange {
                scope: scope.to_string(),
                start: range.start(),
                end: range.end(),
                reason: "range does not start after the previous one",
            });
        }

        buffer.install(range);
        *last_end = range.end();
        self.metrics.record_refresh();

        #[cfg(feature = "tracing")]
        tracing::info!(
            scope = %scope,
            start = range.start(),
            end = range.end(),
            "installed segment"
        );
        Ok(())
    }
}
