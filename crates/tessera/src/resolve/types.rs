use core::fmt;
use std::borrow::Cow;

use crate::{ConfigError, Ulid128, is_valid_type};

/// A kind of business entity, e.g. `ORDER` with public-id prefix `ord`.
///
/// The `name` keys the mapping table and caches; the `prefix` is the `type`
/// part of every public id minted for it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceType {
    name: Cow<'static, str>,
    prefix: Cow<'static, str>,
}

impl ResourceType {
    /// Builds a resource type from static strings without validation. Use
    /// for compile-time constants whose prefix is known to be well-formed.
    pub const fn new(name: &'static str, prefix: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            prefix: Cow::Borrowed(prefix),
        }
    }

    /// # Errors
    ///
    /// The prefix must match `[a-z0-9]{2,10}` and the name must not be blank.
    pub fn try_new(
        name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let prefix = prefix.into();
        if name.trim().is_empty() {
            return Err(ConfigError::ResourceName);
        }
        if !is_valid_type(&prefix) {
            return Err(ConfigError::ResourcePrefix(prefix));
        }
        Ok(Self {
            name: Cow::Owned(name),
            prefix: Cow::Owned(prefix),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.prefix)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolveKey {
    pub tenant_id: i64,
    pub resource_type: ResourceType,
    pub public_id: String,
}

impl ResolveKey {
    pub fn new(tenant_id: i64, resource_type: ResourceType, public_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            resource_type,
            public_id: public_id.into(),
        }
    }
}

/// Why a resolution ended the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ResolveReason {
    HitL1,
    HitL2,
    HitDb,
    NotFound,
    PrefixMismatch,
    InvalidFormat,
    Disabled,
    /// Decoded from the public id itself; no tier was consulted.
    Derived,
}

impl ResolveReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HitL1 => "HIT_L1",
            Self::HitL2 => "HIT_L2",
            Self::HitDb => "HIT_DB",
            Self::NotFound => "NOT_FOUND",
            Self::PrefixMismatch => "PREFIX_MISMATCH",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::Disabled => "DISABLED",
            Self::Derived => "DERIVED",
        }
    }
}

impl fmt::Display for ResolveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one lookup.
///
/// `hit` is true once the key passed validation and a lookup ran, `exists`
/// only when a mapping was found. A cached negative is `hit && !exists`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ResolveResult {
    pub hit: bool,
    pub exists: bool,
    pub internal_id: Option<Ulid128>,
    pub reason: ResolveReason,
}

impl ResolveResult {
    pub const fn found(internal_id: Ulid128, reason: ResolveReason) -> Self {
        Self {
            hit: true,
            exists: true,
            internal_id: Some(internal_id),
            reason,
        }
    }

    pub const fn not_found() -> Self {
        Self {
            hit: true,
            exists: false,
            internal_id: None,
            reason: ResolveReason::NotFound,
        }
    }

    /// A key rejected before any tier was consulted.
    pub const fn rejected(reason: ResolveReason) -> Self {
        Self {
            hit: false,
            exists: false,
            internal_id: None,
            reason,
        }
    }

    pub const fn disabled() -> Self {
        Self::rejected(ResolveReason::Disabled)
    }
}

/// What a cache tier remembers about a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachedMapping {
    Present(Ulid128),
    /// The mapping table had no row when this was cached.
    Absent,
}

impl CachedMapping {
    /// Marker stored by string-valued shared caches for [`Self::Absent`].
    pub const ABSENT_MARKER: &'static str = "NULL";

    /// The value a string-valued shared cache stores: the canonical ULID
    /// text, or [`Self::ABSENT_MARKER`].
    pub fn to_cache_value(self) -> String {
        match self {
            Self::Present(id) => id.to_string(),
            Self::Absent => Self::ABSENT_MARKER.to_owned(),
        }
    }

    /// Parses a value written by [`Self::to_cache_value`]. Anything else is
    /// `None` and should be treated as a miss.
    pub fn from_cache_value(value: &str) -> Option<Self> {
        if value == Self::ABSENT_MARKER {
            return Some(Self::Absent);
        }
        Ulid128::from_char_column(value).ok().map(Self::Present)
    }

    pub(crate) fn into_result(self, tier: ResolveReason) -> ResolveResult {
        match self {
            Self::Present(id) => ResolveResult::found(id, tier),
            Self::Absent => ResolveResult::not_found(),
        }
    }
}
