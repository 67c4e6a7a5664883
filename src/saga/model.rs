//! Saga identity, lifecycle state, and the per-class factory seam.
//!
//! The source framework stores a saga as an opaque blob and reconstructs it
//! by runtime class name. Here each saga class provides a `SagaFactory` that
//! knows how to build a fresh instance and decode a stored one; the blob
//! itself stays opaque to `SagaStore`/`SagaProvider`.

use chrono::{DateTime, Utc};

use crate::message::Message;

/// Identifies one saga instance: the business key plus its class, since two
/// different saga classes may reuse the same business key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SagaId {
    pub value: String,
    pub saga_class: &'static str,
}

impl SagaId {
    pub fn new(value: impl Into<String>, saga_class: &'static str) -> Self {
        Self {
            value: value.into(),
            saga_class,
        }
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.saga_class, self.value)
    }
}

/// A saga's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStatus {
    InProgress,
    Completed,
    Failed,
    Expired,
}

impl SagaStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SagaStatus::InProgress)
    }
}

/// Per-saga-class configuration known ahead of time:
/// how far past creation a saga may run before it is considered abandoned,
/// and which field of the triggering message carries its business key.
#[derive(Debug, Clone)]
pub struct SagaMetadata {
    pub expire_date_modifier: chrono::Duration,
    pub id_field_in_message: String,
}

/// The row shape `SagaStore` persists and loads.
#[derive(Debug, Clone)]
pub struct StoredSaga {
    pub id: SagaId,
    pub status: SagaStatus,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expire_date: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
#[error("saga start failed: {0}")]
pub struct SagaError(pub String);

/// Bookkeeping shared by every saga: identity, lifecycle timestamps, and the
/// outbound messages accumulated by the current transition. Concrete saga
/// types embed one of these and implement `Saga::state`/`state_mut` to get
/// the boilerplate accessors and transitions for free.
#[derive(Debug)]
pub struct SagaState {
    pub id: SagaId,
    pub status: SagaStatus,
    pub created_at: DateTime<Utc>,
    pub expire_date: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub fired_commands: Vec<Box<dyn Message>>,
    pub raised_events: Vec<Box<dyn Message>>,
}

impl SagaState {
    pub fn new(id: SagaId, created_at: DateTime<Utc>, expire_date: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SagaStatus::InProgress,
            created_at,
            expire_date,
            closed_at: None,
            fired_commands: Vec::new(),
            raised_events: Vec::new(),
        }
    }

    pub fn fire_command(&mut self, cmd: Box<dyn Message>) {
        self.fired_commands.push(cmd);
    }

    pub fn raise_event(&mut self, evt: Box<dyn Message>) {
        self.raised_events.push(evt);
    }
}

/// A long-lived process manager. `start` is the only
/// business-specific transition; `make_expired`/`complete`/`fail` close the
/// saga and are mechanical enough to carry default implementations.
pub trait Saga: Send + Sync {
    fn state(&self) -> &SagaState;
    fn state_mut(&mut self) -> &mut SagaState;

    fn id(&self) -> &SagaId {
        &self.state().id
    }

    fn status(&self) -> SagaStatus {
        self.state().status
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.state().created_at
    }

    fn expire_date(&self) -> DateTime<Utc> {
        self.state().expire_date
    }

    fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.state().closed_at
    }

    /// Pending outgoing commands from the most recent transition. Not
    /// drained until `SagaProvider` has persisted and delivered them.
    fn fired_commands(&self) -> &[Box<dyn Message>] {
        &self.state().fired_commands
    }

    fn raised_events(&self) -> &[Box<dyn Message>] {
        &self.state().raised_events
    }

    /// Drops everything queued by the most recent transition. Called by
    /// `SagaProvider` only after those messages have been delivered.
    fn clear_fired(&mut self) {
        let state = self.state_mut();
        state.fired_commands.clear();
        state.raised_events.clear();
    }

    fn make_expired(&mut self) {
        if self.status() == SagaStatus::InProgress {
            let now = Utc::now();
            let state = self.state_mut();
            state.status = SagaStatus::Expired;
            state.closed_at = Some(now);
        }
    }

    fn complete(&mut self) {
        if self.status() == SagaStatus::InProgress {
            let now = Utc::now();
            let state = self.state_mut();
            state.status = SagaStatus::Completed;
            state.closed_at = Some(now);
        }
    }

    fn fail(&mut self) {
        if self.status() == SagaStatus::InProgress {
            let now = Utc::now();
            let state = self.state_mut();
            state.status = SagaStatus::Failed;
            state.closed_at = Some(now);
        }
    }

    /// Business-specific reaction to the triggering message. Runs once, on a
    /// freshly constructed instance, before the first `SagaProvider::start`
    /// persist.
    fn start(&mut self, trigger: &dyn Message) -> Result<(), SagaError>;

    /// Serializes the full instance to an opaque, versioned blob.
    fn encode(&self) -> Vec<u8>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to decode saga snapshot for class {saga_class}: {reason}")]
pub struct SagaDecodeError {
    pub saga_class: &'static str,
    pub reason: String,
}

/// Per-saga-class instantiation and decoding, the static stand-in for the
/// source's "construct by class name" reflection.
pub trait SagaFactory: Send + Sync {
    fn saga_class(&self) -> &'static str;

    fn new_instance(
        &self,
        id: SagaId,
        created_at: DateTime<Utc>,
        expire_date: DateTime<Utc>,
    ) -> Box<dyn Saga>;

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Saga>, SagaDecodeError>;
}
