use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{IdScope, SegmentRange};

/// Durable counter rows backing the segment allocator.
///
/// Implementations must make `next_range` an atomic read-increment-write of
/// the scope's `max_id` (for SQL: `SELECT ... FOR UPDATE` then `UPDATE` in
/// one transaction), returning `[old_max + 1, old_max + step]`.
pub trait SegmentRepository: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reserves the next `step` ids of `scope`.
    fn next_range(&self, scope: &IdScope, step: u32) -> Result<SegmentRange, Self::Error>;

    /// Creates the counter row if it does not exist yet. Idempotent.
    fn init_scope_if_absent(
        &self,
        scope: &IdScope,
        initial_max_id: i64,
        step: u32,
    ) -> Result<(), Self::Error>;
}

impl<R> SegmentRepository for std::sync::Arc<R>
where
    R: SegmentRepository + ?Sized,
{
    type Error = R::Error;

    fn next_range(&self, scope: &IdScope, step: u32) -> Result<SegmentRange, Self::Error> {
        (**self).next_range(scope, step)
    }

    fn init_scope_if_absent(
        &self,
        scope: &IdScope,
        initial_max_id: i64,
        step: u32,
    ) -> Result<(), Self::Error> {
        (**self).init_scope_if_absent(scope, initial_max_id, step)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryRepositoryError {
    #[error("scope {0:?} has no ids left below i64::MAX")]
    Exhausted(String),

    #[error("initial max id must not be negative, got {0}")]
    NegativeInitialMax(i64),

    #[error(transparent)]
    Range(#[from] crate::SegmentError),
}

#[derive(Clone, Copy, Debug)]
struct CounterRow {
    max_id: i64,
    step: u32,
}

/// An in-process stand-in for the counter table. Unknown scopes start at
/// `max_id = 0`.
#[derive(Debug, Default)]
pub struct MemorySegmentRepository {
    rows: Mutex<HashMap<String, CounterRow>>,
}

impl MemorySegmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current `max_id` of a scope, if its row exists.
    pub fn max_id(&self, scope: &IdScope) -> Option<i64> {
        self.rows.lock().get(scope.key()).map(|row| row.max_id)
    }

    /// Configured default step of a scope, if its row exists.
    pub fn default_step(&self, scope: &IdScope) -> Option<u32> {
        self.rows.lock().get(scope.key()).map(|row| row.step)
    }
}

impl SegmentRepository for MemorySegmentRepository {
    type Error = MemoryRepositoryError;

    fn next_range(&self, scope: &IdScope, step: u32) -> Result<SegmentRange, Self::Error> {
        let mut rows = self.rows.lock();
        let row = rows
            .entry(scope.key().to_owned())
            .or_insert(CounterRow { max_id: 0, step });
        let end = row
            .max_id
            .checked_add(i64::from(step))
            .ok_or_else(|| MemoryRepositoryError::Exhausted(scope.key().to_owned()))?;
        let range = SegmentRange::new(row.max_id + 1, end)?;
        row.max_id = end;
        Ok(range)
    }

    fn init_scope_if_absent(
        &self,
        scope: &IdScope,
        initial_max_id: i64,
        step: u32,
    ) -> Result<(), Self::Error> {
        if initial_max_id < 0 {
            return Err(MemoryRepositoryError::NegativeInitialMax(initial_max_id));
        }
        self.rows
            .lock()
            .entry(scope.key().to_owned())
            .or_insert(CounterRow {
                max_id: initial_max_id,
                step,
            });
        Ok(())
    }
}
