use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use portable_atomic::{AtomicUsize, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    ClockStep, GeneratorConfig, GeneratorError, GeneratorMode, MAX_STRIPES, NODE_ID_BITS, NodeId,
    RandSource, RollbackPolicy, SystemClock, ThreadRandom, TimeSource, Ulid128, UlidMetrics,
    generator::RollbackAction,
};

/// Source of per-thread lane assignments, shared by every generator.
static NEXT_LANE: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// Round-robin ticket taken on the thread's first call.
    static LANE_TICKET: usize = NEXT_LANE.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default)]
struct LaneState {
    last_ts: Option<u64>,
    counter: u128,
}

/// Result of one attempt under the lane lock.
enum Attempt {
    Ready(Ulid128),
    /// The counter is saturated for the current millisecond.
    Exhausted,
    /// The clock is too far behind; back off outside the lock.
    Behind { rollback_ms: u64 },
}

/// A thread-safe, monotonic ULID generator with independent lanes.
///
/// The 80-bit random part of every id is split into a counter and a fixed
/// lane tag:
///
/// ```text
///  Bit Index:  79                      tag_bits  0
///              +--------------------------+-------------------------+
///  Field:      | counter                  | node (10, opt) | lane   |
///              +--------------------------+-------------------------+
/// ```
///
/// On a new millisecond the counter is drawn at random with its top bit
/// cleared, leaving at least half the counter space for increments within
/// that millisecond. Within a millisecond it increments by one. Since lanes
/// (and nodes, when configured) own disjoint tags, two lanes can never emit
/// the same value.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Strictly increasing per lane, including across small clock rollbacks
/// - ✅ Unique across lanes without coordination
pub struct UlidGenerator<T = SystemClock, R = ThreadRandom>
where
    T: TimeSource<u64>,
    R: RandSource<u128>,
{
    lanes: Box<[CachePadded<Mutex<LaneState>>]>,
    mode: GeneratorMode,
    policy: RollbackPolicy,
    node_id: Option<NodeId>,
    node_tag: u128,
    tag_bits: u32,
    counter_mask: u128,
    time: T,
    rng: R,
    metrics: UlidMetrics,
}

impl UlidGenerator {
    /// A generator reading the system clock and the thread-local CSPRNG.
    pub fn system(config: &GeneratorConfig) -> Self {
        Self::new(config, SystemClock, ThreadRandom)
    }
}

impl<T, R> UlidGenerator<T, R>
where
    T: TimeSource<u64>,
    R: RandSource<u128>,
{
    /// Creates a generator. The stripe count of [`GeneratorMode::Striped`] is
    /// clamped to `[1, 1024]`.
    pub fn new(config: &GeneratorConfig, time: T, rng: R) -> Self {
        let (mode, lane_count) = match config.mode {
            GeneratorMode::Strict => (GeneratorMode::Strict, 1),
            GeneratorMode::Striped { stripes } => {
                let clamped = stripes.clamp(1, MAX_STRIPES);
                #[cfg(feature = "tracing")]
                {
                    if clamped != stripes {
                        tracing::warn!(requested = stripes, clamped, "stripe count clamped");
                    }
                }
                (GeneratorMode::Striped { stripes: clamped }, clamped)
            }
        };

        let stripe_bits = usize::BITS - (lane_count - 1).leading_zeros();
        let (node_tag, node_bits) = match config.node_id {
            Some(node) => (u128::from(node.get()) << stripe_bits, NODE_ID_BITS),
            None => (0, 0),
        };
        let tag_bits = stripe_bits + node_bits;
        let counter_mask = (1u128 << (Ulid128::RANDOM_BITS - tag_bits)) - 1;

        let lanes = (0..lane_count)
            .map(|_| CachePadded::new(Mutex::new(LaneState::default())))
            .collect();

        Self {
            lanes,
            mode,
            policy: config.rollback,
            node_id: config.node_id,
            node_tag,
            tag_bits,
            counter_mask,
            time,
            rng,
            metrics: UlidMetrics::default(),
        }
    }

    pub fn mode(&self) -> GeneratorMode {
        self.mode
    }

    pub fn stripes(&self) -> usize {
        self.lanes.len()
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    pub fn metrics(&self) -> &UlidMetrics {
        &self.metrics
    }

    /// Generates the next id on the calling thread's lane.
    ///
    /// # Errors
    ///
    /// Only [`GeneratorError::ClockRollback`], when the configured
    /// [`RollbackPolicy`] gives up on a backwards clock.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next(&self) -> Result<Ulid128, GeneratorError> {
        let lane = self.lane_index();
        let mut waited_ms = 0u64;

        loop {
            let now = self.time.current_millis();
            let attempt = {
                let mut state = self.lanes[lane].lock();
                self.try_next(&mut state, lane, now)?
            };

            match attempt {
                Attempt::Ready(id) => {
                    self.metrics.record_generated();
                    return Ok(id);
                }
                Attempt::Exhausted => {
                    self.metrics.record_exhausted();
                    std::thread::yield_now();
                }
                Attempt::Behind { rollback_ms } => {
                    waited_ms = self.wait_for_clock(rollback_ms, waited_ms)?;
                }
            }
        }
    }

    /// Generates the next id as its canonical 26-character text.
    pub fn next_string(&self) -> Result<String, GeneratorError> {
        self.next().map(|id| id.to_string())
    }

    fn lane_index(&self) -> usize {
        match self.lanes.len() {
            1 => 0,
            n => LANE_TICKET.with(|ticket| *ticket % n),
        }
    }

    fn try_next(
        &self,
        state: &mut LaneState,
        lane: usize,
        now: u64,
    ) -> Result<Attempt, GeneratorError> {
        let Some(last) = state.last_ts else {
            return Ok(Attempt::Ready(self.rollover(state, lane, now)));
        };

        match ClockStep::observe(now, last) {
            ClockStep::Forward => Ok(Attempt::Ready(self.rollover(state, lane, now))),
            ClockStep::Same => Ok(self.increment(state, lane, last)),
            ClockStep::Backward { by } => self.cold_clock_behind(state, lane, last, by),
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(
        &self,
        state: &mut LaneState,
        lane: usize,
        last: u64,
        rollback_ms: u64,
    ) -> Result<Attempt, GeneratorError> {
        self.metrics.record_rollback(rollback_ms);
        #[cfg(feature = "tracing")]
        tracing::warn!(rollback_ms, lane, policy = ?self.policy, "clock moved backwards");

        match self.policy.on_rollback(rollback_ms)? {
            RollbackAction::ReuseLast => Ok(self.increment(state, lane, last)),
            RollbackAction::Wait => Ok(Attempt::Behind { rollback_ms }),
        }
    }

    /// Sleeps outside the lane lock, returning the updated total wait.
    fn wait_for_clock(&self, rollback_ms: u64, waited_ms: u64) -> Result<u64, GeneratorError> {
        let total = self.policy.wait_for_clock(rollback_ms, waited_ms)?;
        self.metrics.record_wait();
        Ok(total)
    }

    fn rollover(&self, state: &mut LaneState, lane: usize, now: u64) -> Ulid128 {
        state.last_ts = Some(now);
        state.counter = self.rng.rand() & (self.counter_mask >> 1);
        self.compose(now, state.counter, lane)
    }

    fn increment(&self, state: &mut LaneState, lane: usize, ts: u64) -> Attempt {
        if state.counter >= self.counter_mask {
            return Attempt::Exhausted;
        }
        state.counter += 1;
        Attempt::Ready(self.compose(ts, state.counter, lane))
    }

    #[inline]
    fn compose(&self, ts: u64, counter: u128, lane: usize) -> Ulid128 {
        let tag = self.node_tag | lane as u128;
        Ulid128::from_components(ts, (counter << self.tag_bits) | tag)
    }

    #[cfg(test)]
    pub(crate) fn seed_lane(&self, lane: usize, ts: u64, counter: u128) {
        let mut state = self.lanes[lane].lock();
        state.last_ts = Some(ts);
        state.counter = counter;
    }

    #[cfg(test)]
    pub(crate) fn counter_mask(&self) -> u128 {
        self.counter_mask
    }
}
