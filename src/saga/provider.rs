//! SagaProvider: saga lifecycle orchestration.
//!
//! Persists a saga's row before delivering its fired commands and raised
//! events, retrying only the persist step on transient storage failures.
//! Two design decisions worth calling out:
//! - `save` never upserts; starting a saga that already has a row surfaces
//!   `DuplicateSagaId`, and saving one that has none surfaces `SaveSagaFailed`.
//! - the retry loop never retries a `UniqueConstraintViolation`; it is
//!   treated as durable, not transient.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::context::KernelContext;
use crate::message::Message;
use crate::retry::{run_with_retry, RetryPolicy};

use super::lock::SagaLocks;
use super::model::{Saga, SagaFactory, SagaId, SagaMetadata, SagaStatus, StoredSaga};
use super::store::{SagaStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum SagaProviderError {
    #[error("no saga metadata registered for class {0}")]
    SagaMetaDataNotFound(&'static str),

    #[error("duplicate saga id {0}")]
    DuplicateSagaId(SagaId),

    #[error("failed to start saga: {0}")]
    StartSagaFailed(String),

    #[error("failed to load saga: {0}")]
    LoadSagaFailed(String),

    #[error("failed to save saga: {0}")]
    SaveSagaFailed(String),

    #[error("saga {0} was loaded past its expiration and has been closed")]
    ExpiredSagaLoaded(SagaId),

    /// Not raised by `SagaProvider` itself: `obtain` returns a terminal
    /// saga like any other. A saga handler that receives one back and
    /// tries to route a further domain message into it raises this.
    #[error("saga {0} is already closed")]
    SagaAlreadyClosed(SagaId),
}

/// Internal outcome of the persist-then-deliver sequence, before it is
/// translated into the public `SagaProviderError` at each call site.
#[derive(Debug, thiserror::Error)]
enum DoStoreError {
    #[error("unique constraint violation")]
    UniqueConstraintViolation,

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Delivery(#[from] crate::context::ContextError),
}

/// Owns the saga store, the frozen per-class metadata/factory tables, and
/// the per-saga-id lock set. One instance is shared across all concurrent
/// packages.
pub struct SagaProvider {
    store: Arc<dyn SagaStore>,
    factories: HashMap<&'static str, Arc<dyn SagaFactory>>,
    metadata: HashMap<&'static str, SagaMetadata>,
    retry_policy: RetryPolicy,
    locks: SagaLocks,
}

impl SagaProvider {
    pub fn builder() -> SagaProviderBuilder {
        SagaProviderBuilder::default()
    }

    /// Creates and persists a new saga triggered by `trigger`.
    /// Fails with `DuplicateSagaId` if a row already exists for `id`.
    pub async fn start(
        &self,
        id: SagaId,
        trigger: &dyn Message,
        ctx: &KernelContext,
    ) -> Result<Box<dyn Saga>, SagaProviderError> {
        let _guard = self.locks.acquire(&id).await;

        let metadata = self
            .metadata
            .get(id.saga_class)
            .ok_or(SagaProviderError::SagaMetaDataNotFound(id.saga_class))?;
        let factory = self
            .factories
            .get(id.saga_class)
            .ok_or(SagaProviderError::SagaMetaDataNotFound(id.saga_class))?;

        let now = Utc::now();
        let expire_date = now + metadata.expire_date_modifier;
        let mut saga = factory.new_instance(id.clone(), now, expire_date);

        saga.start(trigger)
            .map_err(|e| SagaProviderError::StartSagaFailed(e.to_string()))?;

        self.do_store(saga.as_mut(), ctx, true)
            .await
            .map_err(|e| match e {
                DoStoreError::UniqueConstraintViolation => {
                    SagaProviderError::DuplicateSagaId(id.clone())
                }
                other => SagaProviderError::StartSagaFailed(other.to_string()),
            })?;

        Ok(saga)
    }

    /// Loads a saga, closing and rejecting it if it has run past its
    /// expiration while still in progress. Returns `Ok(None)` if no row
    /// exists for `id`; a terminal-but-unexpired saga is returned as-is,
    /// since rejecting an already-closed saga is the caller's call to make.
    pub async fn obtain(
        &self,
        id: &SagaId,
        ctx: &KernelContext,
    ) -> Result<Option<Box<dyn Saga>>, SagaProviderError> {
        let _guard = self.locks.acquire(id).await;

        let factory = self
            .factories
            .get(id.saga_class)
            .ok_or(SagaProviderError::SagaMetaDataNotFound(id.saga_class))?;

        let stored = match run_with_retry(self.retry_policy, StorageError::is_retryable, || {
            self.store.load(id)
        })
        .await
        .map_err(|e| SagaProviderError::LoadSagaFailed(e.to_string()))?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let mut saga = factory
            .decode(&stored.payload)
            .map_err(|e| SagaProviderError::LoadSagaFailed(e.to_string()))?;

        if saga.status() == SagaStatus::InProgress && Utc::now() > saga.expire_date() {
            saga.make_expired();
            self.do_store(saga.as_mut(), ctx, false)
                .await
                .map_err(|e| SagaProviderError::SaveSagaFailed(e.to_string()))?;
            return Err(SagaProviderError::ExpiredSagaLoaded(id.clone()));
        }

        Ok(Some(saga))
    }

    /// Persists a saga's current state and delivers whatever it queued
    /// during its most recent transition. Does not create a
    /// row if one is missing.
    pub async fn save(
        &self,
        saga: &mut dyn Saga,
        ctx: &KernelContext,
    ) -> Result<(), SagaProviderError> {
        let _guard = self.locks.acquire(saga.id()).await;
        self.do_store(saga, ctx, false)
            .await
            .map_err(|e| SagaProviderError::SaveSagaFailed(e.to_string()))
    }

    /// Persists `saga`'s row (insert if `is_new`, otherwise update), then
    /// delivers its queued commands and events in order, draining them only
    /// once delivery has succeeded.
    async fn do_store(
        &self,
        saga: &mut dyn Saga,
        ctx: &KernelContext,
        is_new: bool,
    ) -> Result<(), DoStoreError> {
        let row = StoredSaga {
            id: saga.id().clone(),
            status: saga.status(),
            payload: saga.encode(),
            created_at: saga.created_at(),
            expire_date: saga.expire_date(),
            closed_at: saga.closed_at(),
        };

        if is_new {
            run_with_retry(self.retry_policy, StorageError::is_retryable, || {
                self.store.save(row.clone())
            })
            .await
            .map_err(|e| match e {
                StorageError::UniqueConstraintViolation => DoStoreError::UniqueConstraintViolation,
                other => DoStoreError::Storage(other),
            })?;
        } else {
            run_with_retry(self.retry_policy, StorageError::is_retryable, || {
                self.store.update(row.clone())
            })
            .await
            .map_err(|e| match e {
                StorageError::UniqueConstraintViolation => DoStoreError::UniqueConstraintViolation,
                other => DoStoreError::Storage(other),
            })?;
        }

        for cmd in saga.fired_commands() {
            ctx.send(cmd.as_ref(), None).await?;
        }
        for evt in saga.raised_events() {
            ctx.publish(evt.as_ref(), None).await?;
        }
        saga.clear_fired();

        Ok(())
    }
}

/// Accumulates saga classes and their store/retry collaborators before
/// freezing them into a `SagaProvider`.
#[derive(Default)]
pub struct SagaProviderBuilder {
    store: Option<Arc<dyn SagaStore>>,
    factories: HashMap<&'static str, Arc<dyn SagaFactory>>,
    metadata: HashMap<&'static str, SagaMetadata>,
    retry_policy: Option<RetryPolicy>,
}

impl SagaProviderBuilder {
    pub fn store(mut self, store: Arc<dyn SagaStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn register_class(mut self, factory: Arc<dyn SagaFactory>, metadata: SagaMetadata) -> Self {
        let class = factory.saga_class();
        self.factories.insert(class, factory);
        self.metadata.insert(class, metadata);
        self
    }

    pub fn build(self) -> SagaProvider {
        SagaProvider {
            store: self.store.expect("SagaProviderBuilder requires a store"),
            factories: self.factories,
            metadata: self.metadata,
            retry_policy: self.retry_policy.unwrap_or_else(RetryPolicy::saga_store_default),
            locks: SagaLocks::default(),
        }
    }
}
