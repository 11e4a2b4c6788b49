use core::time::Duration;

use crate::{GeneratorError, NodeId};

/// Upper bound on the number of striped lanes.
pub const MAX_STRIPES: usize = 1024;

/// Default lane count: one per core, at most 32.
pub fn default_stripes() -> usize {
    num_cpus::get().clamp(1, 32)
}

/// How callers are mapped onto generator lanes. Fixed for the generator's
/// lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", rename_all = "snake_case"))]
pub enum GeneratorMode {
    /// All calls serialize through a single lane.
    Strict,
    /// Each thread is pinned to one of `stripes` independent lanes.
    Striped { stripes: usize },
}

impl Default for GeneratorMode {
    fn default() -> Self {
        Self::Striped {
            stripes: default_stripes(),
        }
    }
}

/// What a lane does when the wall clock reads earlier than the last
/// timestamp it used.
///
/// Every rollback is counted and its magnitude recorded regardless of policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "policy", rename_all = "snake_case"))]
pub enum RollbackPolicy {
    /// Keep emitting with the last timestamp and keep counting up.
    #[default]
    UseLast,
    /// Reuse the last timestamp for rollbacks up to `threshold_ms`, fail
    /// beyond it.
    FailFast { threshold_ms: u64 },
    /// Reuse the last timestamp for rollbacks up to `tolerance_ms`. Beyond
    /// that, sleep outside the lane lock in steps of at most `max_step_ms`
    /// until the clock catches up, failing once `max_total_ms` is spent.
    Wait {
        tolerance_ms: u64,
        max_step_ms: u64,
        max_total_ms: u64,
    },
}

impl RollbackPolicy {
    pub const DEFAULT_FAIL_FAST_THRESHOLD_MS: u64 = 5_000;
    pub const DEFAULT_WAIT_MAX_STEP_MS: u64 = 50;

    pub const fn fail_fast() -> Self {
        Self::FailFast {
            threshold_ms: Self::DEFAULT_FAIL_FAST_THRESHOLD_MS,
        }
    }

    pub const fn wait() -> Self {
        Self::Wait {
            tolerance_ms: 0,
            max_step_ms: Self::DEFAULT_WAIT_MAX_STEP_MS,
            max_total_ms: Self::DEFAULT_FAIL_FAST_THRESHOLD_MS,
        }
    }
}

/// Outcome of [`RollbackPolicy::on_rollback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RollbackAction {
    /// Keep counting up from the last timestamp.
    ReuseLast,
    /// Back off with [`RollbackPolicy::wait_for_clock`] and retry.
    Wait,
}

impl RollbackPolicy {
    /// Decides how to handle a clock `rollback_ms` behind the last timestamp.
    pub(crate) fn on_rollback(&self, rollback_ms: u64) -> Result<RollbackAction, GeneratorError> {
        match *self {
            Self::UseLast => Ok(RollbackAction::ReuseLast),
            Self::FailFast { threshold_ms } if rollback_ms > threshold_ms => {
                Err(GeneratorError::ClockRollback {
                    rollback_ms,
                    limit_ms: threshold_ms,
                })
            }
            Self::FailFast { .. } => Ok(RollbackAction::ReuseLast),
            Self::Wait { tolerance_ms, .. } if rollback_ms <= tolerance_ms => {
                Ok(RollbackAction::ReuseLast)
            }
            Self::Wait { .. } => Ok(RollbackAction::Wait),
        }
    }

    /// Sleeps one step towards a clock `rollback_ms` behind, returning the
    /// updated total wait. Callers must not hold a lock.
    pub(crate) fn wait_for_clock(
        &self,
        rollback_ms: u64,
        waited_ms: u64,
    ) -> Result<u64, GeneratorError> {
        let Self::Wait {
            max_step_ms,
            max_total_ms,
            ..
        } = *self
        else {
            return Ok(waited_ms);
        };

        let sleep_ms = match max_step_ms {
            0 => rollback_ms,
            step => rollback_ms.min(step),
        };
        let total = waited_ms.saturating_add(sleep_ms);
        if total > max_total_ms {
            #[cfg(feature = "tracing")]
            tracing::error!(rollback_ms, waited_ms, max_total_ms, "gave up waiting for clock");
            return Err(GeneratorError::ClockRollback {
                rollback_ms,
                limit_ms: max_total_ms,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(rollback_ms, sleep_ms, "waiting for clock to catch up");
        if sleep_ms > 0 {
            std::thread::sleep(Duration::from_millis(sleep_ms));
        } else {
            std::thread::yield_now();
        }
        Ok(total)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeneratorConfig {
    pub mode: GeneratorMode,
    pub rollback: RollbackPolicy,
    /// When set, the node id is embedded in every id's random part so two
    /// instances can never collide, even within the same millisecond.
    pub node_id: Option<NodeId>,
}
