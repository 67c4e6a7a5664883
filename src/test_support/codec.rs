//! A registry-based JSON `MessageDecoder`/`MessageEncoder` for tests. Real
//! deployments bring their own wire format; this one exists so tests can
//! round-trip a handful of message types without hand-writing a codec.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{DecodeFailed, EncodeFailed, MessageDecoder, MessageEncoder};
use crate::message::{BoxedMessage, Message};
use crate::transport::IncomingPackage;

type Decode = Arc<dyn Fn(&[u8]) -> Result<BoxedMessage, String> + Send + Sync>;
type Encode = Arc<dyn Fn(&dyn Message) -> Result<Vec<u8>, String> + Send + Sync>;

/// Looks up the message type from the package's `"type"` header, then
/// dispatches to the decoder registered for that type key.
#[derive(Default)]
pub struct JsonMessageCodec {
    decoders: HashMap<&'static str, Decode>,
    encoders: HashMap<&'static str, Encode>,
}

impl JsonMessageCodec {
    pub fn builder() -> JsonMessageCodecBuilder {
        JsonMessageCodecBuilder::default()
    }
}

impl MessageDecoder for JsonMessageCodec {
    fn decode(&self, pkg: &dyn IncomingPackage) -> Result<BoxedMessage, DecodeFailed> {
        let make_err = |reason: String| DecodeFailed {
            package_id: pkg.id().to_string(),
            trace_id: pkg.trace_id().to_string(),
            reason,
        };
        let type_key = pkg
            .headers()
            .get("type")
            .ok_or_else(|| make_err("missing \"type\" header".to_string()))?;
        let decoder = self
            .decoders
            .get(type_key.as_str())
            .ok_or_else(|| make_err(format!("no decoder registered for type {type_key}")))?;
        decoder(pkg.payload()).map_err(make_err)
    }
}

impl MessageEncoder for JsonMessageCodec {
    fn encode(&self, message: &dyn Message) -> Result<Vec<u8>, EncodeFailed> {
        let encoder = self.encoders.get(message.type_key()).ok_or_else(|| EncodeFailed {
            type_key: message.type_key(),
            reason: "no encoder registered for type".to_string(),
        })?;
        encoder(message).map_err(|reason| EncodeFailed {
            type_key: message.type_key(),
            reason,
        })
    }
}

#[derive(Default)]
pub struct JsonMessageCodecBuilder {
    decoders: HashMap<&'static str, Decode>,
    encoders: HashMap<&'static str, Encode>,
}

impl JsonMessageCodecBuilder {
    /// Registers JSON (de)serialization for one concrete message type.
    pub fn register<M>(mut self, type_key: &'static str) -> Self
    where
        M: Message + Serialize + DeserializeOwned + 'static,
    {
        self.decoders.insert(
            type_key,
            Arc::new(|bytes| {
                serde_json::from_slice::<M>(bytes)
                    .map(|m| Box::new(m) as BoxedMessage)
                    .map_err(|e| e.to_string())
            }),
        );
        self.encoders.insert(
            type_key,
            Arc::new(|message| {
                let concrete = message
                    .as_any()
                    .downcast_ref::<M>()
                    .ok_or_else(|| "message type does not match registered decoder".to_string())?;
                serde_json::to_vec(concrete).map_err(|e| e.to_string())
            }),
        );
        self
    }

    pub fn build(self) -> JsonMessageCodec {
        JsonMessageCodec {
            decoders: self.decoders,
            encoders: self.encoders,
        }
    }
}
