/// Clock anomalies the generator could not absorb under its policy.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    /// The wall clock went backwards by more than the policy allows.
    #[error("clock moved backwards by {rollback_ms}ms (limit {limit_ms}ms)")]
    ClockRollback { rollback_ms: u64, limit_ms: u64 },

    /// The clock is past the last millisecond a Snowflake timestamp can hold.
    #[error("{elapsed_ms}ms since the Snowflake epoch exceeds {max_ms}ms")]
    TimestampOverflow { elapsed_ms: u64, max_ms: u64 },
}
