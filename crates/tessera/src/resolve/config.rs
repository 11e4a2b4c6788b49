use std::time::Duration;

use crate::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResolverConfig {
    /// When `false` every lookup answers `DISABLED` without touching a tier.
    pub enabled: bool,
    /// Lifetime of positive entries in the local cache.
    pub l1_ttl: Duration,
    /// Lifetime of not-found entries in both cache tiers.
    pub negative_ttl: Duration,
    /// Lifetime of positive entries in the shared cache.
    pub l2_ttl: Duration,
    pub l1_max_entries: usize,
    /// Upper bound on ids per bulk mapping-table query.
    pub batch_max_in: usize,
}

impl ResolverConfig {
    pub const DEFAULT_L1_TTL: Duration = Duration::from_secs(10 * 60);
    pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(30);
    pub const DEFAULT_L2_TTL: Duration = Duration::from_secs(30 * 60);
    pub const DEFAULT_L1_MAX_ENTRIES: usize = 100_000;
    pub const DEFAULT_BATCH_MAX_IN: usize = 500;

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.l1_max_entries == 0 {
            return Err(ConfigError::Zero {
                field: "l1_max_entries",
            });
        }
        if self.batch_max_in == 0 {
            return Err(ConfigError::Zero {
                field: "batch_max_in",
            });
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            l1_ttl: Self::DEFAULT_L1_TTL,
            negative_ttl: Self::DEFAULT_NEGATIVE_TTL,
            l2_ttl: Self::DEFAULT_L2_TTL,
            l1_max_entries: Self::DEFAULT_L1_MAX_ENTRIES,
            batch_max_in: Self::DEFAULT_BATCH_MAX_IN,
        }
    }
}
