//! Saga lifecycle: identity, persistence, and orchestration.

pub mod lock;
pub mod model;
pub mod provider;
pub mod store;

pub use model::{
    Saga, SagaDecodeError, SagaError, SagaFactory, SagaId, SagaMetadata, SagaState, SagaStatus,
    StoredSaga,
};
pub use provider::{SagaProvider, SagaProviderBuilder, SagaProviderError};
pub use store::{SagaStore, StorageError};
