//! Resolution of the per-instance node id.
//!
//! The node id is resolved once at startup from, in order: an explicit
//! configured value, the primary environment variable, the legacy
//! environment variable, and finally a platform instance identifier hashed
//! into range. When nothing is available resolution fails closed.

use std::collections::HashMap;

use crate::crc32;

/// Largest valid node id (10 bits).
pub const MAX_NODE_ID: u16 = 1023;

/// Number of bits a node id occupies when embedded in a ULID.
pub const NODE_ID_BITS: u32 = 10;

pub const NODE_ID_ENV: &str = "TESSERA_NODE_ID";
pub const LEGACY_NODE_ID_ENV: &str = "TESSERA_ID_NODE_ID";
pub const DEFAULT_PLATFORM_VARS: [&str; 2] = ["CLOUD_RUN_INSTANCE_ID", "POD_NAME"];

/// An integer in `[0, 1023]` identifying the running instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "i64", into = "u16"))]
pub struct NodeId(u16);

impl NodeId {
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Keeps the low 10 bits of `bits`.
    pub(crate) const fn from_masked(bits: u16) -> Self {
        Self(bits & MAX_NODE_ID)
    }
}

impl TryFrom<i64> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u16::try_from(value)
            .ok()
            .filter(|v| *v <= MAX_NODE_ID)
            .map(Self)
            .ok_or(NodeIdError::OutOfRange {
                value,
                origin: "value".into(),
            })
    }
}

impl From<NodeId> for u16 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NodeIdError {
    #[error("node id {value} from {origin} is outside [0, {MAX_NODE_ID}]")]
    OutOfRange { value: i64, origin: String },

    #[error("node id from {var} is not an integer: {value:?}")]
    NotNumeric { var: String, value: String },

    #[error("no node id configured and none of {tried:?} are set")]
    Unresolved { tried: Vec<String> },
}

/// Read-only view over environment variables.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed snapshot of variables.
#[derive(Clone, Debug, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for MapEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Environment for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NodeIdConfig {
    /// Explicit value; wins over every environment source.
    pub node_id: Option<i64>,
    pub env_var: String,
    pub legacy_env_var: String,
    /// Instance identifiers tried in order and hashed into range.
    pub platform_vars: Vec<String>,
}

impl Default for NodeIdConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            env_var: NODE_ID_ENV.into(),
            legacy_env_var: LEGACY_NODE_ID_ENV.into(),
            platform_vars: DEFAULT_PLATFORM_VARS.iter().map(|v| (*v).into()).collect(),
        }
    }
}

/// Where the resolved node id came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeIdSource {
    Configured,
    PrimaryEnv,
    LegacyEnv,
    /// Hashed from a platform instance identifier. Distinct instances may
    /// collide.
    Platform { var: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedNodeId {
    pub node_id: NodeId,
    pub source: NodeIdSource,
}

/// Resolves the node id. Deterministic for a given environment snapshot.
///
/// # Errors
///
/// Fails on an out-of-range value from any source, a non-integer
/// environment value, or when no source is available.
pub fn resolve_node_id(
    config: &NodeIdConfig,
    env: &impl Environment,
) -> Result<ResolvedNodeId, NodeIdError> {
    let resolved = if let Some(value) = config.node_id {
        ResolvedNodeId {
            node_id: checked(value, "config")?,
            source: NodeIdSource::Configured,
        }
    } else if let Some(node_id) = from_env(env, &config.env_var)? {
        ResolvedNodeId {
            node_id,
            source: NodeIdSource::PrimaryEnv,
        }
    } else if let Some(node_id) = from_env(env, &config.legacy_env_var)? {
        ResolvedNodeId {
            node_id,
            source: NodeIdSource::LegacyEnv,
        }
    } else if let Some((var, node_id)) = from_platform(env, &config.platform_vars) {
        ResolvedNodeId {
            node_id,
            source: NodeIdSource::Platform { var },
        }
    } else {
        let mut tried = vec![config.env_var.clone(), config.legacy_env_var.clone()];
        tried.extend(config.platform_vars.iter().cloned());
        #[cfg(feature = "tracing")]
        tracing::error!(?tried, "unable to resolve node id");
        return Err(NodeIdError::Unresolved { tried });
    };

    #[cfg(feature = "tracing")]
    {
        match &resolved.source {
            NodeIdSource::Platform { var } => tracing::warn!(
                node_id = resolved.node_id.get(),
                var = %var,
                "node id derived from platform instance id; collisions are possible"
            ),
            source => {
                tracing::info!(node_id = resolved.node_id.get(), ?source, "resolved node id");
            }
        }
    }

    Ok(resolved)
}

fn checked(value: i64, origin: &str) -> Result<NodeId, NodeIdError> {
    NodeId::try_from(value).map_err(|_| NodeIdError::OutOfRange {
        value,
        origin: origin.into(),
    })
}

fn non_blank(env: &impl Environment, var: &str) -> Option<String> {
    env.var(var)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn from_env(env: &impl Environment, var: &str) -> Result<Option<NodeId>, NodeIdError> {
    let Some(raw) = non_blank(env, var) else {
        return Ok(None);
    };
    let value = raw.parse::<i64>().map_err(|_| NodeIdError::NotNumeric {
        var: var.into(),
        value: raw.clone(),
    })?;
    checked(value, var).map(Some)
}

fn from_platform(env: &impl Environment, vars: &[String]) -> Option<(String, NodeId)> {
    vars.iter().find_map(|var| {
        let raw = non_blank(env, var)?;
        let hashed = crc32(raw.as_bytes()) as u16;
        Some((var.clone(), NodeId::from_masked(hashed)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NodeIdConfig {
        NodeIdConfig::default()
    }

    #[test]
    fn configured_value_wins() {
        let env = MapEnv::new().with(NODE_ID_ENV, "9");
        let cfg = NodeIdConfig {
            node_id: Some(7),
            ..config()
        };
        let resolved = resolve_node_id(&cfg, &env).unwrap();
        assert_eq!(resolved.node_id.get(), 7);
        assert_eq!(resolved.source, NodeIdSource::Configured);
    }

    #[test]
    fn primary_env_beats_legacy_and_is_trimmed() {
        let env = MapEnv::new()
            .with(NODE_ID_ENV, "  12 ")
            .with(LEGACY_NODE_ID_ENV, "13");
        let resolved = resolve_node_id(&config(), &env).unwrap();
        assert_eq!(resolved.node_id.get(), 12);
        assert_eq!(resolved.source, NodeIdSource::PrimaryEnv);
    }

    #[test]
    fn blank_primary_falls_through_to_legacy() {
        let env = MapEnv::new()
            .with(NODE_ID_ENV, "   ")
            .with(LEGACY_NODE_ID_ENV, "1023");
        let resolved = resolve_node_id(&config(), &env).unwrap();
        assert_eq!(resolved.node_id.get(), 1023);
        assert_eq!(resolved.source, NodeIdSource::LegacyEnv);
    }

    #[test]
    fn out_of_range_values_are_fatal() {
        let cfg = NodeIdConfig {
            node_id: Some(1024),
            ..config()
        };
        assert!(matches!(
            resolve_node_id(&cfg, &MapEnv::new()),
            Err(NodeIdError::OutOfRange { value: 1024, .. })
        ));

        let env = MapEnv::new().with(NODE_ID_ENV, "-1");
        assert!(matches!(
            resolve_node_id(&config(), &env),
            Err(NodeIdError::OutOfRange { value: -1, .. })
        ));
    }

    #[test]
    fn non_numeric_env_is_fatal() {
        let env = MapEnv::new()
            .with(NODE_ID_ENV, "node-3")
            .with("POD_NAME", "api-7f9c");
        assert_eq!(
            resolve_node_id(&config(), &env),
            Err(NodeIdError::NotNumeric {
                var: NODE_ID_ENV.into(),
                value: "node-3".into(),
            })
        );
    }

    #[test]
    fn platform_ids_hash_in_order_and_are_stable() {
        let env = MapEnv::new()
            .with("POD_NAME", "api-7f9c")
            .with("CLOUD_RUN_INSTANCE_ID", "00bf4bf02d");
        let first = resolve_node_id(&config(), &env).unwrap();
        let second = resolve_node_id(&config(), &env).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.source,
            NodeIdSource::Platform {
                var: "CLOUD_RUN_INSTANCE_ID".into()
            }
        );
        let expected = crc32(b"00bf4bf02d") & 1023;
        assert_eq!(u32::from(first.node_id.get()), expected);

        let pod_only = MapEnv::from_iter([("POD_NAME", "api-7f9c")]);
        let resolved = resolve_node_id(&config(), &pod_only).unwrap();
        assert_eq!(
            u32::from(resolved.node_id.get()),
            crc32(b"api-7f9c") & 1023
        );
    }

    #[test]
    fn nothing_available_fails_closed() {
        let err = resolve_node_id(&config(), &MapEnv::new()).unwrap_err();
        assert_eq!(
            err,
            NodeIdError::Unresolved {
                tried: vec![
                    NODE_ID_ENV.into(),
                    LEGACY_NODE_ID_ENV.into(),
                    "CLOUD_RUN_INSTANCE_ID".into(),
                    "POD_NAME".into(),
                ]
            }
        );
    }
}
