use std::collections::HashMap;

use parking_lot::Mutex;
use portable_atomic::{AtomicU64, Ordering};

use crate::Ulid128;

/// One row of the public-id mapping table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PublicIdMapping {
    pub tenant_id: i64,
    pub type_name: String,
    pub public_id: String,
    pub internal_id: Ulid128,
}

/// Result of inserting a mapping row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row for the same `(tenant, type, public_id)` already exists.
    Existing(Ulid128),
}

/// The durable `(tenant, type, public_id) -> internal_id` table.
///
/// Writes go through the caller's transaction handle so that a mapping is
/// committed together with the business row it points at.
pub trait PublicIdMapRepository: Send + Sync {
    type Tx;
    type Error: std::error::Error + Send + Sync + 'static;

    fn find_internal_id(
        &self,
        tenant_id: i64,
        type_name: &str,
        public_id: &str,
    ) -> Result<Option<Ulid128>, Self::Error>;

    /// Bulk lookup (`WHERE public_id IN (...)`). Missing ids are simply
    /// absent from the returned map. Callers bound the slice length.
    fn find_many(
        &self,
        tenant_id: i64,
        type_name: &str,
        public_ids: &[&str],
    ) -> Result<HashMap<String, Ulid128>, Self::Error>;

    /// Inserts unless a row for the key exists, in which case the stored id
    /// is reported and nothing is written.
    fn insert(
        &self,
        tx: &mut Self::Tx,
        mapping: &PublicIdMapping,
    ) -> Result<InsertOutcome, Self::Error>;
}

impl<R> PublicIdMapRepository for std::sync::Arc<R>
where
    R: PublicIdMapRepository + ?Sized,
{
    type Tx = R::Tx;
    type Error = R::Error;

    fn find_internal_id(
        &self,
        tenant_id: i64,
        type_name: &str,
        public_id: &str,
    ) -> Result<Option<Ulid128>, Self::Error> {
        (**self).find_internal_id(tenant_id, type_name, public_id)
    }

    fn find_many(
        &self,
        tenant_id: i64,
        type_name: &str,
        public_ids: &[&str],
    ) -> Result<HashMap<String, Ulid128>, Self::Error> {
        (**self).find_many(tenant_id, type_name, public_ids)
    }

    fn insert(
        &self,
        tx: &mut Self::Tx,
        mapping: &PublicIdMapping,
    ) -> Result<InsertOutcome, Self::Error> {
        (**self).insert(tx, mapping)
    }
}

type RowKey = (i64, String, String);

fn row_key(tenant_id: i64, type_name: &str, public_id: &str) -> RowKey {
    (tenant_id, type_name.to_owned(), public_id.to_owned())
}

/// A commit lost the race for a key to a different internal id.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "{} ({}, tenant {}) is already mapped to {existing}, not {}",
    mapping.public_id,
    mapping.type_name,
    mapping.tenant_id,
    mapping.internal_id
)]
pub struct DuplicateMapping {
    pub mapping: PublicIdMapping,
    pub existing: Ulid128,
}

/// Pending writes of a [`MemoryPublicIdMapRepository`]. Dropping it without
/// [`MemoryPublicIdMapRepository::commit`] rolls back.
#[derive(Debug, Default)]
pub struct MemoryTx {
    pending: Vec<PublicIdMapping>,
}

impl MemoryTx {
    pub fn pending(&self) -> &[PublicIdMapping] {
        &self.pending
    }
}

/// An in-process mapping table with explicit transactions.
#[derive(Debug, Default)]
pub struct MemoryPublicIdMapRepository {
    rows: Mutex<HashMap<RowKey, Ulid128>>,
    queries: AtomicU64,
}

impl MemoryPublicIdMapRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> MemoryTx {
        MemoryTx::default()
    }

    /// Applies the transaction's writes, all or nothing.
    ///
    /// # Errors
    ///
    /// Fails like a unique key violation when another transaction committed
    /// a different id for one of the staged keys in the meantime. Nothing is
    /// written then. Rows committed with the same id are accepted.
    pub fn commit(&self, tx: MemoryTx) -> Result<(), DuplicateMapping> {
        let mut rows = self.rows.lock();
        for mapping in &tx.pending {
            let key = row_key(mapping.tenant_id, &mapping.type_name, &mapping.public_id);
            match rows.get(&key) {
                Some(existing) if *existing != mapping.internal_id => {
                    return Err(DuplicateMapping {
                        mapping: mapping.clone(),
                        existing: *existing,
                    });
                }
                _ => {}
            }
        }
        for mapping in tx.pending {
            rows.entry(row_key(
                mapping.tenant_id,
                &mapping.type_name,
                &mapping.public_id,
            ))
            .or_insert(mapping.internal_id);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of read statements executed so far.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

impl PublicIdMapRepository for MemoryPublicIdMapRepository {
    type Tx = MemoryTx;
    type Error = std::convert::Infallible;

    fn find_internal_id(
        &self,
        tenant_id: i64,
        type_name: &str,
        public_id: &str,
    ) -> Result<Option<Ulid128>, Self::Error> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .rows
            .lock()
            .get(&row_key(tenant_id, type_name, public_id))
            .copied())
    }

    fn find_many(
        &self,
        tenant_id: i64,
        type_name: &str,
        public_ids: &[&str],
    ) -> Result<HashMap<String, Ulid128>, Self::Error> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let rows = self.rows.lock();
        Ok(public_ids
            .iter()
            .filter_map(|public_id| {
                rows.get(&row_key(tenant_id, type_name, public_id))
                    .map(|id| ((*public_id).to_owned(), *id))
            })
            .collect())
    }

    fn insert(
        &self,
        tx: &mut Self::Tx,
        mapping: &PublicIdMapping,
    ) -> Result<InsertOutcome, Self::Error> {
        let key = row_key(mapping.tenant_id, &mapping.type_name, &mapping.public_id);
        if let Some(existing) = self.rows.lock().get(&key) {
            return Ok(InsertOutcome::Existing(*existing));
        }
        let staged = tx.pending.iter().find(|pending| {
            pending.tenant_id == mapping.tenant_id
                && pending.type_name == mapping.type_name
                && pending.public_id == mapping.public_id
        });
        if let Some(staged) = staged {
            return Ok(InsertOutcome::Existing(staged.internal_id));
        }
        tx.pending.push(mapping.clone());
        Ok(InsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(public_id: &str, id: u128) -> PublicIdMapping {
        PublicIdMapping {
            tenant_id: 1,
            type_name: "ORDER".into(),
            public_id: public_id.into(),
            internal_id: Ulid128::from_u128(id),
        }
    }

    #[test]
    fn rows_are_visible_only_after_commit() {
        let repo = MemoryPublicIdMapRepository::new();
        let mut tx = repo.begin();
        assert_eq!(
            repo.insert(&mut tx, &mapping("ord_a", 1)).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(repo.find_internal_id(1, "ORDER", "ord_a").unwrap(), None);

        repo.commit(tx).unwrap();
        assert_eq!(
            repo.find_internal_id(1, "ORDER", "ord_a").unwrap(),
            Some(Ulid128::from_u128(1))
        );
        assert_eq!(repo.find_internal_id(2, "ORDER", "ord_a").unwrap(), None);
    }

    #[test]
    fn rolled_back_transaction_leaves_nothing() {
        let repo = MemoryPublicIdMapRepository::new();
        let mut tx = repo.begin();
        repo.insert(&mut tx, &mapping("ord_a", 1)).unwrap();
        assert_eq!(tx.pending().len(), 1);
        drop(tx);
        assert!(repo.is_empty());
    }

    #[test]
    fn existing_rows_are_reported() {
        let repo = MemoryPublicIdMapRepository::new();
        let mut tx = repo.begin();
        repo.insert(&mut tx, &mapping("ord_a", 1)).unwrap();
        assert_eq!(
            repo.insert(&mut tx, &mapping("ord_a", 2)).unwrap(),
            InsertOutcome::Existing(Ulid128::from_u128(1))
        );
        repo.commit(tx).unwrap();

        let mut tx = repo.begin();
        assert_eq!(
            repo.insert(&mut tx, &mapping("ord_a", 3)).unwrap(),
            InsertOutcome::Existing(Ulid128::from_u128(1))
        );
    }

    #[test]
    fn find_many_skips_missing() {
        let repo = MemoryPublicIdMapRepository::new();
        let mut tx = repo.begin();
        repo.insert(&mut tx, &mapping("ord_a", 1)).unwrap();
        repo.insert(&mut tx, &mapping("ord_b", 2)).unwrap();
        repo.commit(tx).unwrap();

        let found = repo.find_many(1, "ORDER", &["ord_a", "ord_x"]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["ord_a"], Ulid128::from_u128(1));
        assert_eq!(repo.queries(), 1);
    }

    #[test]
    fn racing_commits_keep_the_first_mapping() {
        let repo = MemoryPublicIdMapRepository::new();
        let mut first = repo.begin();
        let mut second = repo.begin();
        repo.insert(&mut first, &mapping("ord_a", 1)).unwrap();
        repo.insert(&mut second, &mapping("ord_b", 5)).unwrap();
        assert_eq!(
            repo.insert(&mut second, &mapping("ord_a", 2)).unwrap(),
            InsertOutcome::Inserted
        );
        repo.commit(first).unwrap();

        let err = repo.commit(second).unwrap_err();
        assert_eq!(err.mapping, mapping("ord_a", 2));
        assert_eq!(err.existing, Ulid128::from_u128(1));
        // All or nothing: the unrelated row of the losing transaction is gone too.
        assert_eq!(repo.find_internal_id(1, "ORDER", "ord_b").unwrap(), None);
        assert_eq!(repo.len(), 1);

        let mut same = repo.begin();
        same.pending.push(mapping("ord_a", 1));
        repo.commit(same).unwrap();
        assert_eq!(repo.len(), 1);
    }
}
