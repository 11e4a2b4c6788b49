use core::fmt;

use crate::SegmentError;

/// Width of the durable scope key column.
pub const MAX_SCOPE_KEY_LEN: usize = 64;

/// A logical allocation domain with its own counter row, e.g. a table name,
/// optionally qualified by tenant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdScope {
    key: String,
}

impl IdScope {
    /// A scope shared by all tenants.
    pub fn new(name: &str) -> Result<Self, SegmentError> {
        Self::validate(name, name.to_owned())
    }

    /// A scope with its own counter per tenant. Stored as `name:tenant`.
    pub fn for_tenant(name: &str, tenant_id: i64) -> Result<Self, SegmentError> {
        Self::validate(name, format!("{name}:{tenant_id}"))
    }

    fn validate(name: &str, key: String) -> Result<Self, SegmentError> {
        if name.trim().is_empty() {
            return Err(SegmentError::InvalidScope {
                key,
                reason: "name is blank",
            });
        }
        if key.len() > MAX_SCOPE_KEY_LEN {
            return Err(SegmentError::InvalidScope {
                key,
                reason: "key exceeds 64 bytes",
            });
        }
        Ok(Self { key })
    }

    /// The storage key of the scope's counter row.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for IdScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// An inclusive range of ids reserved for one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentRange {
    start: i64,
    end: i64,
}

impl SegmentRange {
    /// # Errors
    ///
    /// Rejects `start < 1` and `end < start`.
    pub fn new(start: i64, end: i64) -> Result<Self, SegmentError> {
        let reason = if start < 1 {
            "start must be positive"
        } else if end < start {
            "end precedes start"
        } else {
            return Ok(Self { start, end });
        };
        Err(SegmentError::InvalidRange {
            scope: String::new(),
            start,
            end,
            reason,
        })
    }

    pub const fn start(&self) -> i64 {
        self.start
    }

    pub const fn end(&self) -> i64 {
        self.end
    }

    pub const fn size(&self) -> u64 {
        (self.end - self.start) as u64 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_keys() {
        assert_eq!(IdScope::new("orders").unwrap().key(), "orders");
        assert_eq!(
            IdScope::for_tenant("orders", 42).unwrap().to_string(),
            "orders:42"
        );
    }

    #[test]
    fn scope_rejects_blank_and_long_names() {
        assert!(IdScope::new("").is_err());
        assert!(IdScope::new("  ").is_err());
        assert!(IdScope::new(&"x".repeat(64)).is_ok());
        assert!(IdScope::new(&"x".repeat(65)).is_err());
        assert!(IdScope::for_tenant(&"x".repeat(62), 10).is_err());
    }

    #[test]
    fn range_validation() {
        let range = SegmentRange::new(1, 1000).unwrap();
        assert_eq!(range.size(), 1000);
        assert_eq!(SegmentRange::new(5, 5).unwrap().size(), 1);
        assert!(SegmentRange::new(0, 10).is_err());
        assert!(SegmentRange::new(-3, 10).is_err());
        assert!(SegmentRange::new(10, 9).is_err());
    }
}
