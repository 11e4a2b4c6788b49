use std::collections::HashMap;

use crate::{
    NoSharedCache, PublicId, PublicIdMapRepository, PublicIdResolver, Registration, ResolveError,
    ResolveKey, ResolveResult, ResourceType, SharedCache, SystemClock, TimeSource, Ulid128,
};

/// How public ids of a resource type are minted and resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Strategy {
    /// The public id is the encoded internal id. Resolving decodes it.
    Codec,
    /// The public id is recorded in the mapping table and resolved through
    /// the cache tiers.
    #[default]
    Registry,
}

/// A public id returned by [`PublicIdService::mint`]. Registry ids still
/// carry the staged mapping; finish with [`PublicIdService::committed`]
/// after the transaction commits.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use = "pass to `committed` once the transaction commits"]
pub struct Minted {
    public_id: PublicId,
    registration: Option<Registration>,
}

impl Minted {
    pub fn public_id(&self) -> &PublicId {
        &self.public_id
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }
}

/// Front door for minting and resolving public ids, routing each resource
/// type to a [`Strategy`]. Types without a route use [`Strategy::Registry`].
pub struct PublicIdService<R, C = NoSharedCache, T = SystemClock>
where
    R: PublicIdMapRepository,
    C: SharedCache,
    T: TimeSource<u64>,
{
    resolver: PublicIdResolver<R, C, T>,
    routes: HashMap<String, Strategy>,
}

impl<R, C, T> PublicIdService<R, C, T>
where
    R: PublicIdMapRepository,
    C: SharedCache,
    T: TimeSource<u64>,
{
    pub fn new(resolver: PublicIdResolver<R, C, T>) -> Self {
        Self {
            resolver,
            routes: HashMap::new(),
        }
    }

    pub fn with_route(mut self, resource_type: &ResourceType, strategy: Strategy) -> Self {
        self.routes
            .insert(resource_type.name().to_owned(), strategy);
        self
    }

    pub fn strategy(&self, resource_type: &ResourceType) -> Strategy {
        self.routes
            .get(resource_type.name())
            .copied()
            .unwrap_or_default()
    }

    pub fn resolver(&self) -> &PublicIdResolver<R, C, T> {
        &self.resolver
    }

    /// Encodes `internal_id` for `resource_type` and, for registry types,
    /// stages the mapping in `tx`.
    ///
    /// # Errors
    ///
    /// See [`PublicIdResolver::register`].
    pub fn mint(
        &self,
        tx: &mut R::Tx,
        tenant_id: i64,
        resource_type: &ResourceType,
        internal_id: Ulid128,
    ) -> Result<Minted, ResolveError> {
        if tenant_id <= 0 {
            return Err(ResolveError::InvalidTenant(tenant_id));
        }
        let public_id = self
            .resolver
            .codec()
            .encode(resource_type.prefix(), internal_id)?;
        let registration = match self.strategy(resource_type) {
            Strategy::Codec => None,
            Strategy::Registry => Some(self.resolver.register(
                tx,
                tenant_id,
                resource_type,
                public_id.as_str(),
                internal_id,
            )?),
        };
        Ok(Minted {
            public_id,
            registration,
        })
    }

    /// Completes a mint once its transaction committed.
    pub fn committed(&self, minted: Minted) -> PublicId {
        if let Some(registration) = minted.registration {
            self.resolver.committed(registration);
        }
        minted.public_id
    }

    /// # Errors
    ///
    /// See [`PublicIdResolver::resolve`].
    pub fn resolve(&self, key: &ResolveKey) -> Result<ResolveResult, ResolveError> {
        match self.strategy(&key.resource_type) {
            Strategy::Codec => Ok(self.resolver.derive(
                key.tenant_id,
                &key.resource_type,
                &key.public_id,
            )),
            Strategy::Registry => self.resolver.resolve(key),
        }
    }

    /// # Errors
    ///
    /// See [`PublicIdResolver::resolve_batch`].
    pub fn resolve_batch<S>(
        &self,
        tenant_id: i64,
        resource_type: &ResourceType,
        public_ids: &[S],
    ) -> Result<HashMap<String, ResolveResult>, ResolveError>
    where
        S: AsRef<str>,
    {
        match self.strategy(resource_type) {
            Strategy::Codec => Ok(public_ids
                .iter()
                .map(|public_id| {
                    let public_id = public_id.as_ref();
                    (
                        public_id.to_owned(),
                        self.resolver.derive(tenant_id, resource_type, public_id),
                    )
                })
                .collect()),
            Strategy::Registry => self
                .resolver
                .resolve_batch(tenant_id, resource_type, public_ids),
        }
    }
}
