//! Typed domain messages.
//!
//! The source framework dispatches on runtime class names. Here a message is
//! a `dyn Message` trait object carrying a stable `type_key` plus the chain of
//! supertype keys it also answers to, so `Router::match_message` can walk the
//! hierarchy without reflection.

use std::any::Any;
use std::fmt;

/// The three message archetypes a handler can be registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Event,
    Query,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Command => write!(f, "command"),
            MessageKind::Event => write!(f, "event"),
            MessageKind::Query => write!(f, "query"),
        }
    }
}

/// A domain message: command, event, or query.
///
/// `type_key` identifies the concrete type and must be stable and unique per
/// type. `supertypes` lists the keys of any declared supertypes, outermost
/// first, so a handler registered against a supertype still matches.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Stable identifier for the concrete type, e.g. `"orders.PlaceOrder"`.
    fn type_key(&self) -> &'static str;

    /// Whether this is a command, event, or query.
    fn kind(&self) -> MessageKind;

    /// Declared supertype keys, outermost first. Empty for a message with no
    /// declared supertype.
    fn supertypes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Upcast to `Any` for downcasting back to a concrete type inside a
    /// handler's argument-resolution step.
    fn as_any(&self) -> &dyn Any;

    /// Validate against the given validation groups. The
    /// default accepts everything; message types with constraints override
    /// this to collect violations.
    fn validate(&self, _groups: &[String]) -> crate::validation::ValidationFailure {
        crate::validation::ValidationFailure::default()
    }
}

/// Boxed, type-erased message as carried through the pipeline.
pub type BoxedMessage = Box<dyn Message>;

/// Returns true if `type_key` matches `message`'s own type or any of its
/// declared supertypes.
pub fn matches_type(message: &dyn Message, type_key: &str) -> bool {
    message.type_key() == type_key || message.supertypes().contains(&type_key)
}
