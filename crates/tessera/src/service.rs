//! One handle over every id a service mints: ULIDs, 64-bit ids and public
//! ids.

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    IdScope, MemorySegmentRepository, PublicId, PublicIdCodec, PublicIdError, ResourceType,
    Result, SegmentAllocator, SegmentRepository, SnowflakeGenerator, SystemClock, TimeSource,
    Ulid128, UlidGenerator,
};

/// Where [`IdService::next_long`] draws its ids from.
pub enum LongIdSource<R = MemorySegmentRepository, T = SystemClock>
where
    R: SegmentRepository,
    T: TimeSource<u64>,
{
    /// Node-keyed Snowflake ids. The scope is ignored.
    Snowflake(SnowflakeGenerator<T>),
    /// Per-scope sequences reserved in segments.
    Segment(SegmentAllocator<R>),
}

/// Mints ULIDs, 64-bit ids and public ids from one place.
///
/// ```
/// use tessera::{
///     CodecConfig, GeneratorConfig, IdScope, IdService, LongIdSource, NodeId, PublicIdCodec,
///     ResourceType, SnowflakeConfig, SnowflakeGenerator, UlidGenerator,
/// };
///
/// const ORDER: ResourceType = ResourceType::new("ORDER", "ord");
///
/// let node = NodeId::try_from(1).unwrap();
/// let service: IdService = IdService::new(
///     UlidGenerator::system(&GeneratorConfig::default()),
///     LongIdSource::Snowflake(SnowflakeGenerator::system(node, SnowflakeConfig::default())),
///     PublicIdCodec::new(CodecConfig::default()).unwrap(),
/// );
///
/// let public_id = service.next_public_id(&ORDER).unwrap();
/// assert!(service.validate_public_id(&ORDER, public_id.as_str()).is_ok());
/// assert!(service.next_long(&IdScope::new("orders").unwrap()).unwrap() > 0);
/// ```
pub struct IdService<R = MemorySegmentRepository, T = SystemClock>
where
    R: SegmentRepository,
    T: TimeSource<u64>,
{
    ulids: UlidGenerator<T>,
    long_ids: LongIdSource<R, T>,
    codec: PublicIdCodec,
}

impl<R, T> IdService<R, T>
where
    R: SegmentRepository,
    T: TimeSource<u64>,
{
    pub fn new(ulids: UlidGenerator<T>, long_ids: LongIdSource<R, T>, codec: PublicIdCodec) -> Self {
        Self {
            ulids,
            long_ids,
            codec,
        }
    }

    pub fn ulids(&self) -> &UlidGenerator<T> {
        &self.ulids
    }

    pub fn long_ids(&self) -> &LongIdSource<R, T> {
        &self.long_ids
    }

    pub fn codec(&self) -> &PublicIdCodec {
        &self.codec
    }

    pub fn next_ulid(&self) -> Result<Ulid128> {
        Ok(self.ulids.next()?)
    }

    pub fn next_ulid_string(&self) -> Result<String> {
        Ok(self.ulids.next_string()?)
    }

    /// The next ULID as 16 big-endian bytes, as stored in a `BINARY(16)`
    /// column.
    pub fn next_ulid_bytes(&self) -> Result<[u8; 16]> {
        Ok(self.ulids.next()?.to_bytes())
    }

    /// The next 64-bit id. Segment sources keep one sequence per `scope`.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, scope), fields(scope = %scope)))]
    pub fn next_long(&self, scope: &IdScope) -> Result<i64> {
        match &self.long_ids {
            LongIdSource::Snowflake(generator) => Ok(generator.next_id()?),
            LongIdSource::Segment(allocator) => Ok(allocator.next_id(scope)?),
        }
    }

    /// A fresh ULID encoded under `resource_type`'s prefix.
    pub fn next_public_id(&self, resource_type: &ResourceType) -> Result<PublicId> {
        let id = self.ulids.next()?;
        Ok(self.codec.encode(resource_type.prefix(), id)?)
    }

    /// Decodes `public_id` and checks it was minted for `expected`.
    ///
    /// # Errors
    ///
    /// Any decoding failure, then [`PublicIdError::UnexpectedType`] for a
    /// well-formed id of another type.
    pub fn validate_public_id(
        &self,
        expected: &ResourceType,
        public_id: &str,
    ) -> core::result::Result<Ulid128, PublicIdError> {
        let decoded = self.codec.decode(public_id)?;
        if decoded.id_type != expected.prefix() {
            return Err(PublicIdError::UnexpectedType {
                expected: expected.prefix().to_owned(),
                got: decoded.id_type,
            });
        }
        Ok(decoded.internal_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        CodecConfig, GeneratorConfig, GeneratorMode, ManualClock, NodeId, RollbackPolicy,
        SegmentConfig, SnowflakeConfig, ThreadRandom,
    };

    const TENANT: ResourceType = ResourceType::new("TENANT", "tnt");
    const STORE: ResourceType = ResourceType::new("STORE", "sto");
    const ORDER: ResourceType = ResourceType::new("ORDER", "ord");

    fn ulids(clock: ManualClock) -> UlidGenerator<ManualClock> {
        let config = GeneratorConfig {
            mode: GeneratorMode::Strict,
            rollback: RollbackPolicy::UseLast,
            node_id: None,
        };
        UlidGenerator::new(&config, clock, ThreadRandom)
    }

    fn codec() -> PublicIdCodec {
        PublicIdCodec::new(CodecConfig::default()).unwrap()
    }

    fn segment_service() -> IdService<MemorySegmentRepository, ManualClock> {
        let allocator =
            SegmentAllocator::new(SegmentConfig { step: 1_000 }, MemorySegmentRepository::new())
                .unwrap();
        IdService::new(
            ulids(ManualClock::new(1_700_000_000_000)),
            LongIdSource::Segment(allocator),
            codec(),
        )
    }

    fn snowflake_service(clock: ManualClock) -> IdService<MemorySegmentRepository, ManualClock> {
        let generator = SnowflakeGenerator::new(
            NodeId::try_from(9).unwrap(),
            SnowflakeConfig::default(),
            clock.clone(),
        );
        IdService::new(ulids(clock), LongIdSource::Snowflake(generator), codec())
    }

    #[test]
    fn ulid_strings_are_canonical_and_distinct() {
        let service = segment_service();
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let text = service.next_ulid_string().unwrap();
            assert_eq!(text.len(), 26);
            assert!(
                text.bytes()
                    .all(|b| b.is_ascii_digit() || (b.is_ascii_uppercase() && !b"ILOU".contains(&b)))
            );
            assert!(seen.insert(text));
        }
    }

    #[test]
    fn ulid_bytes_are_big_endian() {
        let service = segment_service();
        let bytes = service.next_ulid_bytes().unwrap();
        let id = Ulid128::from_binary_column(&bytes).unwrap();
        assert_eq!(id.timestamp_ms(), 1_700_000_000_000);
        assert!(service.next_ulid().unwrap() > id);
    }

    #[test]
    fn segment_long_ids_are_unique_and_increasing() {
        let service = segment_service();
        let orders = IdScope::new("orders").unwrap();
        let ids: Vec<i64> = (0..10_000)
            .map(|_| service.next_long(&orders).unwrap())
            .collect();
        assert_eq!(ids.first(), Some(&1));
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        // Scopes count independently.
        let stores = IdScope::new("stores").unwrap();
        assert_eq!(service.next_long(&stores).unwrap(), 1);
    }

    #[test]
    fn snowflake_long_ids_ignore_the_scope() {
        let clock = ManualClock::new(SnowflakeConfig::default().epoch_ms + 60_000);
        let service = snowflake_service(clock);
        let orders = IdScope::new("orders").unwrap();
        let stores = IdScope::new("stores").unwrap();

        let a = service.next_long(&orders).unwrap();
        let b = service.next_long(&stores).unwrap();
        assert!(a > 0);
        assert_eq!(b, a + 1);
        let LongIdSource::Snowflake(generator) = service.long_ids() else {
            panic!("expected a snowflake source");
        };
        assert_eq!(generator.parts(b).node_id.get(), 9);
    }

    #[test]
    fn public_ids_carry_the_type_prefix() {
        let service = segment_service();
        for resource_type in [TENANT, STORE, ORDER] {
            let public_id = service.next_public_id(&resource_type).unwrap();
            let text = public_id.as_str();
            assert!(text.starts_with(&format!("{}_", resource_type.prefix())));
            assert_eq!(text.len(), resource_type.prefix().len() + 1 + 26);
        }

        let distinct: HashSet<String> = (0..10_000)
            .map(|_| service.next_public_id(&ORDER).unwrap().into_string())
            .collect();
        assert_eq!(distinct.len(), 10_000);
    }

    #[test]
    fn validation_checks_format_then_type() {
        let service = segment_service();
        let tenant = service.next_public_id(&TENANT).unwrap();
        let id = service.validate_public_id(&TENANT, tenant.as_str()).unwrap();
        assert_eq!(id.timestamp_ms(), 1_700_000_000_000);

        let store = service.next_public_id(&STORE).unwrap();
        assert_eq!(
            service.validate_public_id(&TENANT, store.as_str()),
            Err(PublicIdError::UnexpectedType {
                expected: "tnt".into(),
                got: "sto".into(),
            })
        );

        assert_eq!(
            service.validate_public_id(&TENANT, "tnt"),
            Err(PublicIdError::MissingSeparator('_'))
        );
        assert!(matches!(
            service.validate_public_id(&TENANT, "tnt01HN8X5K9G3QRST2VW4XYZ"),
            Err(PublicIdError::InvalidType(_))
        ));
        assert_eq!(
            service.validate_public_id(&TENANT, "tnt_01HN8X5K9G3QRST2VW4"),
            Err(PublicIdError::InvalidLength {
                expected: 26,
                got: 19
            })
        );
        assert!(matches!(
            service.validate_public_id(&TENANT, "tnt_01HN8X5K9G3QRST2VW4XYZ!@#"),
            Err(PublicIdError::InvalidLength { expected: 26, .. })
        ));
    }
}
