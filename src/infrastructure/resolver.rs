//! Batch resolver - cache-aside entity resolution and the write path

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;

use crate::domain::DomainError;
use crate::domain::backend::{Backend, RawRow};
use crate::domain::cache::{CacheStore, KeyScheme};
use crate::domain::entity::{Entity, EntityRef, PrimaryKey, TypeTag};
use crate::domain::resolver::EntityResolver;

/// Resolves entity references through the cache store, falling back to the
/// backing store on misses.
///
/// Batch contract: one cache round-trip per batch, and one backend query per
/// distinct type with at least one miss - never one per missing key. Cache
/// store failures degrade reads to the slow path and are never surfaced;
/// backend failures always propagate.
#[derive(Debug, Clone)]
pub struct BatchResolver {
    cache: Arc<dyn CacheStore>,
    backend: Arc<dyn Backend>,
    keys: KeyScheme,
}

impl BatchResolver {
    pub fn new(cache: Arc<dyn CacheStore>, backend: Arc<dyn Backend>) -> Self {
        Self {
            cache,
            backend,
            keys: KeyScheme::default(),
        }
    }

    pub fn with_key_scheme(mut self, keys: KeyScheme) -> Self {
        self.keys = keys;
        self
    }

    pub fn key_scheme(&self) -> &KeyScheme {
        &self.keys
    }

    /// Resolves a heterogeneous batch of references.
    ///
    /// The input is constraint-free: duplicates and mixed types are fine.
    /// The result maps every input ref that exists in the backing store to
    /// its payload; refs with no corresponding row are simply absent. Callers
    /// needing input order re-project the map against their own sequence.
    pub async fn get_many(
        &self,
        refs: &[EntityRef],
    ) -> Result<HashMap<EntityRef, Value>, DomainError> {
        if refs.is_empty() {
            return Ok(HashMap::new());
        }

        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        for entity_ref in refs {
            if seen.insert(entity_ref.clone()) {
                distinct.push(entity_ref.clone());
            }
        }

        let keys: Vec<String> = distinct.iter().map(|r| self.keys.key_for(r)).collect();

        // One cache round-trip for the whole batch. An unreachable cache
        // degrades to all-miss rather than failing the read.
        let cached = match self.cache.multi_get(&keys).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "cache store unavailable, treating batch as all-miss");
                HashMap::new()
            }
        };

        let mut resolved = HashMap::with_capacity(distinct.len());
        let mut missing: HashMap<TypeTag, Vec<PrimaryKey>> = HashMap::new();

        for (entity_ref, key) in distinct.iter().zip(&keys) {
            match cached.get(key) {
                Some(raw) => match serde_json::from_str::<Value>(raw) {
                    Ok(value) => {
                        resolved.insert(entity_ref.clone(), value);
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "corrupted cache entry, treating as miss");
                        missing
                            .entry(entity_ref.tag().clone())
                            .or_default()
                            .push(entity_ref.primary_key().clone());
                    }
                },
                None => {
                    missing
                        .entry(entity_ref.tag().clone())
                        .or_default()
                        .push(entity_ref.primary_key().clone());
                }
            }
        }

        tracing::debug!(
            requested = distinct.len(),
            hits = resolved.len(),
            missing_types = missing.len(),
            "cache probe complete"
        );

        // One backend query per distinct type with misses.
        let mut writes = Vec::new();
        for (tag, pks) in &missing {
            let rows = self.backend.fetch_by_primary_keys(tag, pks).await?;
            for row in rows {
                let entity_ref = EntityRef::new(tag.clone(), row.primary_key);
                let key = self.keys.key_for(&entity_ref);
                writes.push((key, row.data.to_string()));
                resolved.insert(entity_ref, row.data);
            }
        }

        // Populate the cache with fresh rows; a write failure here must not
        // fail the read.
        let results = join_all(writes.iter().map(|(key, raw)| self.cache.set(key, raw))).await;
        for ((key, _), result) in writes.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(key = %key, error = %e, "failed to populate cache entry");
            }
        }

        Ok(resolved)
    }

    /// Resolves a single entity; absence is a `NotFound` error, distinct
    /// from any transient fetch failure.
    pub async fn get_one<E: Entity, K: Into<PrimaryKey>>(&self, pk: K) -> Result<E, DomainError> {
        let entity_ref = EntityRef::of::<E, K>(pk);
        let value = self
            .resolve(&entity_ref)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("entity '{entity_ref}' not found")))?;

        serde_json::from_value(value).map_err(|e| {
            DomainError::serialization(format!("failed to deserialize entity '{entity_ref}': {e}"))
        })
    }

    /// Resolves a single-type batch re-projected into input order, duplicates
    /// included. Any missing primary key fails the whole call with `NotFound`.
    pub async fn get_batch<E: Entity>(&self, pks: &[PrimaryKey]) -> Result<Vec<E>, DomainError> {
        let refs: Vec<EntityRef> = pks
            .iter()
            .map(|pk| EntityRef::of::<E, _>(pk.clone()))
            .collect();
        let resolved = self.get_many(&refs).await?;

        let mut entities = Vec::with_capacity(refs.len());
        let mut missing = Vec::new();
        for entity_ref in &refs {
            match resolved.get(entity_ref) {
                Some(value) => {
                    let entity: E = serde_json::from_value(value.clone()).map_err(|e| {
                        DomainError::serialization(format!(
                            "failed to deserialize entity '{entity_ref}': {e}"
                        ))
                    })?;
                    entities.push(entity);
                }
                None => missing.push(entity_ref.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(DomainError::not_found(format!(
                "entities not found: {}",
                missing.join(", ")
            )));
        }

        Ok(entities)
    }

    /// Persists an entity and invalidates its cache entry as part of the same
    /// logical operation.
    ///
    /// The entry is deleted, never overwritten, so the next read repopulates
    /// lazily instead of racing a concurrent writer. If a concurrent read
    /// populates the key after this delete, the stale value can remain until
    /// the next write - the accepted staleness window of the layer's
    /// consistency contract.
    pub async fn save<E: Entity>(&self, entity: &E) -> Result<(), DomainError> {
        let row = RawRow::from_entity(entity)?;
        self.backend.upsert(&E::type_tag(), row).await?;
        self.invalidate(&entity.entity_ref()).await;
        Ok(())
    }

    /// Deletes an entity and invalidates its cache entry.
    pub async fn delete<E: Entity>(&self, entity: &E) -> Result<bool, DomainError> {
        let existed = self
            .backend
            .delete(&E::type_tag(), &entity.primary_key())
            .await?;
        self.invalidate(&entity.entity_ref()).await;
        Ok(existed)
    }

    /// Best-effort deletion of one cache entry. An unreachable cache store
    /// leaves a bounded staleness window; the condition is logged, never
    /// surfaced.
    pub async fn invalidate(&self, entity_ref: &EntityRef) {
        let key = self.keys.key_for(entity_ref);
        match self.cache.delete(&key).await {
            Ok(existed) => {
                tracing::debug!(key = %key, existed, "invalidated cache entry");
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "best-effort cache invalidation failed");
            }
        }
    }
}

#[async_trait]
impl EntityResolver for BatchResolver {
    async fn resolve(&self, entity_ref: &EntityRef) -> Result<Option<Value>, DomainError> {
        let mut resolved = self.get_many(std::slice::from_ref(entity_ref)).await?;
        Ok(resolved.remove(entity_ref))
    }

    async fn resolve_reverse(
        &self,
        tag: &TypeTag,
        fk_field: &str,
        owner: &PrimaryKey,
    ) -> Result<Option<Value>, DomainError> {
        let Some(row) = self.backend.fetch_by_foreign_key(tag, fk_field, owner).await? else {
            return Ok(None);
        };

        // Cache under the target's own key, exactly as a forward reference
        // would, so later forward lookups hit.
        let entity_ref = EntityRef::new(tag.clone(), row.primary_key);
        let key = self.keys.key_for(&entity_ref);
        if let Err(e) = self.cache.set(&key, &row.data.to_string()).await {
            tracing::warn!(key = %key, error = %e, "failed to populate cache entry");
        }

        Ok(Some(row.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backend::mock::MockBackend;
    use crate::domain::cache::mock::MockCacheStore;
    use crate::domain::relation::{PolyRelated, Related, ReverseRelated};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Question {
        id: u64,
        question_text: String,
    }

    impl Entity for Question {
        fn type_tag() -> TypeTag {
            TypeTag::new("question")
        }

        fn primary_key(&self) -> PrimaryKey {
            self.id.into()
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Choice {
        id: u64,
        question: Related<Question>,
        related: PolyRelated,
        choice_text: String,
        votes: u32,
    }

    impl Entity for Choice {
        fn type_tag() -> TypeTag {
            TypeTag::new("choice")
        }

        fn primary_key(&self) -> PrimaryKey {
            self.id.into()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ExtraQuestion {
        id: u64,
        question_id: u64,
        extra_text: String,
    }

    impl Entity for ExtraQuestion {
        fn type_tag() -> TypeTag {
            TypeTag::new("extra_question")
        }

        fn primary_key(&self) -> PrimaryKey {
            self.id.into()
        }
    }

    fn question(id: u64, text: &str) -> Question {
        Question {
            id,
            question_text: text.to_string(),
        }
    }

    fn choice(id: u64, question_id: u64, text: &str) -> Choice {
        Choice {
            id,
            question: Related::to(question_id),
            related: PolyRelated::to(EntityRef::of::<Question, _>(question_id)),
            choice_text: text.to_string(),
            votes: 0,
        }
    }

    struct Harness {
        cache: Arc<MockCacheStore>,
        backend: Arc<MockBackend>,
        resolver: BatchResolver,
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn harness(backend: MockBackend) -> Harness {
        init_tracing();
        let cache = Arc::new(MockCacheStore::new());
        let backend = Arc::new(backend);
        let resolver = BatchResolver::new(cache.clone(), backend.clone());
        Harness {
            cache,
            backend,
            resolver,
        }
    }

    #[tokio::test]
    async fn test_repeated_get_one_issues_no_second_backend_query() {
        let h = harness(MockBackend::new().with_entity(&question(7, "Test text question")));

        let first: Question = h.resolver.get_one(7u64).await.unwrap();
        assert_eq!(first.question_text, "Test text question");
        assert_eq!(h.backend.query_count(), 1);

        let second: Question = h.resolver.get_one(7u64).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(h.backend.query_count(), 1);
    }

    #[tokio::test]
    async fn test_save_invalidates_and_next_read_requeries() {
        let h = harness(MockBackend::new().with_entity(&question(7, "original")));

        let fetched: Question = h.resolver.get_one(7u64).await.unwrap();
        assert_eq!(fetched.question_text, "original");
        assert!(h.cache.contains("obj:question:7"));

        h.resolver.save(&question(7, "updated")).await.unwrap();
        assert!(!h.cache.contains("obj:question:7"));

        let updated: Question = h.resolver.get_one(7u64).await.unwrap();
        assert_eq!(updated.question_text, "updated");
        assert_eq!(h.backend.query_count(), 2);
    }

    #[tokio::test]
    async fn test_batch_collapses_to_one_query_per_type() {
        let mut backend = MockBackend::new();
        for i in 1..=4u64 {
            backend = backend
                .with_entity(&question(i, &format!("question {i}")))
                .with_entity(&choice(i + 100, i, &format!("choice {i}")));
        }
        let h = harness(backend);

        let refs: Vec<EntityRef> = (1..=4u64)
            .map(EntityRef::of::<Question, u64>)
            .chain((1..=4u64).map(|i| EntityRef::of::<Choice, _>(i + 100)))
            .collect();

        let resolved = h.resolver.get_many(&refs).await.unwrap();
        assert_eq!(resolved.len(), 8);
        assert_eq!(h.cache.multi_get_count(), 1);
        assert_eq!(h.backend.query_count(), 2);

        // The identical batch again: one more cache probe, zero backend work.
        let resolved = h.resolver.get_many(&refs).await.unwrap();
        assert_eq!(resolved.len(), 8);
        assert_eq!(h.cache.multi_get_count(), 2);
        assert_eq!(h.backend.query_count(), 2);
    }

    #[tokio::test]
    async fn test_text_form_ref_resolves_like_its_int_form() {
        let h = harness(MockBackend::new().with_entity(&question(5, "five")));

        let text_ref = EntityRef::new(
            TypeTag::new("question"),
            PrimaryKey::Text("5".to_string()),
        );
        let resolved = h
            .resolver
            .get_many(std::slice::from_ref(&text_ref))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key(&EntityRef::of::<Question, _>(5u64)));
    }

    #[tokio::test]
    async fn test_duplicate_refs_are_deduplicated() {
        let h = harness(MockBackend::new().with_entity(&question(7, "once")));

        let r = EntityRef::of::<Question, _>(7u64);
        let resolved = h
            .resolver
            .get_many(&[r.clone(), r.clone(), r.clone()])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(h.backend.query_count(), 1);
    }

    #[tokio::test]
    async fn test_absence_signaling() {
        let h = harness(MockBackend::new().with_entity(&question(7, "exists")));

        // get_one surfaces NotFound.
        let err = h.resolver.get_one::<Question, _>(3456u64).await.unwrap_err();
        assert!(err.is_not_found());

        // get_many simply omits the missing ref.
        let refs = [
            EntityRef::of::<Question, _>(7u64),
            EntityRef::of::<Question, _>(3456u64),
        ];
        let resolved = h.resolver.get_many(&refs).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key(&refs[0]));
    }

    #[tokio::test]
    async fn test_get_batch_preserves_input_order_and_duplicates() {
        let mut backend = MockBackend::new();
        for i in 1..=4u64 {
            backend = backend.with_entity(&question(i, &format!("question {i}")));
        }
        let h = harness(backend);

        let pks = [
            PrimaryKey::Int(3),
            PrimaryKey::Int(1),
            PrimaryKey::Int(3),
            PrimaryKey::Int(4),
        ];
        let questions: Vec<Question> = h.resolver.get_batch(&pks).await.unwrap();
        let ids: Vec<u64> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![3, 1, 3, 4]);
        assert_eq!(h.backend.query_count(), 1);
    }

    #[tokio::test]
    async fn test_get_batch_with_missing_key_is_not_found() {
        let h = harness(MockBackend::new().with_entity(&question(1, "only one")));

        let err = h
            .resolver
            .get_batch::<Question>(&[PrimaryKey::Int(1), PrimaryKey::Int(2)])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("question:2"));
    }

    #[tokio::test]
    async fn test_cache_outage_degrades_to_backend() {
        let backend = MockBackend::new().with_entity(&question(7, "still served"));
        let cache = Arc::new(MockCacheStore::new().with_error("connection refused"));
        let backend = Arc::new(backend);
        let resolver = BatchResolver::new(cache, backend.clone());

        let fetched: Question = resolver.get_one(7u64).await.unwrap();
        assert_eq!(fetched.question_text, "still served");
        assert_eq!(backend.query_count(), 1);

        // Every read takes the slow path while the cache is down.
        let _: Question = resolver.get_one(7u64).await.unwrap();
        assert_eq!(backend.query_count(), 2);
    }

    #[tokio::test]
    async fn test_corrupted_cache_entry_is_a_miss() {
        let backend = MockBackend::new().with_entity(&question(7, "fresh"));
        let cache =
            Arc::new(MockCacheStore::new().with_raw_entry("obj:question:7", "{not json"));
        let backend = Arc::new(backend);
        let resolver = BatchResolver::new(cache.clone(), backend.clone());

        let fetched: Question = resolver.get_one(7u64).await.unwrap();
        assert_eq!(fetched.question_text, "fresh");
        assert_eq!(backend.query_count(), 1);

        // Repopulated with a valid payload.
        let _: Question = resolver.get_one(7u64).await.unwrap();
        assert_eq!(backend.query_count(), 1);
    }

    #[tokio::test]
    async fn test_save_succeeds_when_invalidation_fails() {
        let h = harness(MockBackend::new());
        h.cache.fail_with("cache down");

        h.resolver.save(&question(7, "written anyway")).await.unwrap();

        let rows = h
            .backend
            .fetch_by_primary_keys(&Question::type_tag(), &[PrimaryKey::Int(7)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let h = harness(MockBackend::new().with_error("db down"));

        let err = h.resolver.get_one::<Question, _>(7u64).await.unwrap_err();
        assert!(matches!(err, DomainError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_cache_entry() {
        let h = harness(MockBackend::new().with_entity(&question(7, "short-lived")));

        let q: Question = h.resolver.get_one(7u64).await.unwrap();
        assert!(h.cache.contains("obj:question:7"));

        assert!(h.resolver.delete(&q).await.unwrap());
        assert!(!h.cache.contains("obj:question:7"));
        assert!(h.resolver.get_one::<Question, _>(7u64).await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_band_write_leaves_stale_hit() {
        let h = harness(MockBackend::new().with_entity(&question(7, "original")));

        let _: Question = h.resolver.get_one(7u64).await.unwrap();

        // A writer bypassing the invalidation path leaves the cached value
        // stale; this is the accepted weak-consistency contract.
        h.backend.replace_entity(&question(7, "changed behind our back"));

        let stale: Question = h.resolver.get_one(7u64).await.unwrap();
        assert_eq!(stale.question_text, "original");
    }

    #[tokio::test]
    async fn test_relationship_read_through_resolver() {
        let h = harness(
            MockBackend::new()
                .with_entity(&question(7, "Test text question"))
                .with_entity(&choice(101, 7, "Text choice")),
        );

        let choice: Choice = h.resolver.get_one(101u64).await.unwrap();
        assert_eq!(h.backend.query_count(), 1);

        let related = choice.question.load(&h.resolver).await.unwrap().unwrap();
        assert_eq!(related.question_text, "Test text question");
        assert_eq!(h.backend.query_count(), 2);

        // Second read on the same live instance: slot fast path, no I/O.
        let gets_before = h.cache.multi_get_count();
        let related = choice.question.load(&h.resolver).await.unwrap().unwrap();
        assert_eq!(related.question_text, "Test text question");
        assert_eq!(h.backend.query_count(), 2);
        assert_eq!(h.cache.multi_get_count(), gets_before);

        // A freshly fetched instance starts with an empty slot, but the
        // target's cache entry survives, so the read stays backend-free.
        let refetched: Choice = h.resolver.get_one(101u64).await.unwrap();
        let related = refetched.question.load(&h.resolver).await.unwrap().unwrap();
        assert_eq!(related.question_text, "Test text question");
        assert_eq!(h.backend.query_count(), 2);
    }

    #[tokio::test]
    async fn test_polymorphic_read_through_resolver() {
        let h = harness(
            MockBackend::new()
                .with_entity(&question(7, "hi all!!!"))
                .with_entity(&choice(101, 7, "Text choice")),
        );

        let choice: Choice = h.resolver.get_one(101u64).await.unwrap();

        let related: Question = choice.related.load_as(&h.resolver).await.unwrap().unwrap();
        assert_eq!(related.question_text, "hi all!!!");
        assert_eq!(h.backend.query_count(), 2);

        let related: Question = choice.related.load_as(&h.resolver).await.unwrap().unwrap();
        assert_eq!(related.question_text, "hi all!!!");
        assert_eq!(h.backend.query_count(), 2);
    }

    #[tokio::test]
    async fn test_relationship_reflects_saved_changes() {
        let h = harness(
            MockBackend::new()
                .with_entity(&question(7, "original"))
                .with_entity(&choice(101, 7, "Text choice")),
        );

        let choice: Choice = h.resolver.get_one(101u64).await.unwrap();
        let related = choice.question.load(&h.resolver).await.unwrap().unwrap();
        assert_eq!(related.question_text, "original");

        h.resolver.save(&question(7, "3")).await.unwrap();

        // A fresh instance resolves the updated target.
        let refetched: Choice = h.resolver.get_one(101u64).await.unwrap();
        let related = refetched.question.load(&h.resolver).await.unwrap().unwrap();
        assert_eq!(related.question_text, "3");
    }

    #[tokio::test]
    async fn test_reverse_resolution_populates_forward_cache() {
        let extra = ExtraQuestion {
            id: 10,
            question_id: 7,
            extra_text: "Yes".to_string(),
        };
        let h = harness(
            MockBackend::new()
                .with_entity(&question(7, "owner"))
                .with_entity(&extra),
        );

        let reverse: ReverseRelated<ExtraQuestion> = ReverseRelated::new();
        let owner_pk = PrimaryKey::Int(7);

        let loaded = reverse
            .load(&h.resolver, "question_id", &owner_pk)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, extra);
        assert_eq!(h.backend.query_count(), 1);
        assert!(h.cache.contains("obj:extra_question:10"));

        // The reverse resolution cached the row under its forward key.
        let forward: ExtraQuestion = h.resolver.get_one(10u64).await.unwrap();
        assert_eq!(forward, extra);
        assert_eq!(h.backend.query_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_touches_nothing() {
        let h = harness(MockBackend::new());

        let resolved = h.resolver.get_many(&[]).await.unwrap();
        assert!(resolved.is_empty());
        assert_eq!(h.cache.multi_get_count(), 0);
        assert_eq!(h.backend.query_count(), 0);
    }
}
