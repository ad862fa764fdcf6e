use crate::error::EventCodecError;
use crate::types::JsonValue;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;

/// Context of a CloudEvent received from a gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventContext {
    /// ID of the event; unique within the scope of the producer
    pub id: String,

    /// URI describing the event producer
    pub source: String,

    /// Version of the CloudEvents specification used by the event
    pub specversion: String,

    /// Type of the occurrence which has happened
    #[serde(rename = "type")]
    pub event_type: String,

    /// MIME string describing the media type of the data
    pub datacontenttype: String,

    /// Subject of the event in the context of the producer
    pub subject: String,

    /// Timestamp of when the event happened
    pub time: DateTime<Utc>,
}

impl EventContext {
    /// Whether the data bytes are declared (or defaulted) to be JSON
    pub fn is_json(&self) -> bool {
        self.datacontenttype.is_empty() || self.datacontenttype.contains("json")
    }
}

/// A CloudEvent: context plus opaque data bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub context: EventContext,
    pub data: Vec<u8>,
}

/// Wire shape of an encoded event. `data` is inline JSON when the bytes
/// parse as a non-string JSON value, otherwise a base64 string.
#[derive(Serialize, Deserialize)]
struct WireEvent {
    context: EventContext,
    data: JsonValue,
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Inline only when the declared content type is JSON; bytes
        // that merely happen to parse stay base64
        let inline = if self.context.is_json() {
            match serde_json::from_slice::<JsonValue>(&self.data) {
                Ok(value) if !value.is_string() => Some(value),
                _ => None,
            }
        } else {
            None
        };
        let data = inline.unwrap_or_else(|| JsonValue::String(BASE64.encode(&self.data)));
        WireEvent {
            context: self.context.clone(),
            data,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = WireEvent::deserialize(deserializer)?;
        let data = match &wire.data {
            JsonValue::String(s) => BASE64.decode(s).map_err(serde::de::Error::custom)?,
            value => serde_json::to_vec(value).map_err(serde::de::Error::custom)?,
        };
        Ok(Self {
            context: wire.context,
            data,
        })
    }
}

impl Event {
    pub fn new(context: EventContext, data: Vec<u8>) -> Self {
        Self { context, data }
    }

    /// Decode the data bytes as JSON.
    ///
    /// Data filters and `dataKey` parameter sources operate on this view,
    /// so a non-JSON content type is an error here rather than a silent
    /// empty value.
    pub fn json_data(&self) -> Result<JsonValue, EventCodecError> {
        if !self.context.is_json() {
            return Err(EventCodecError::NotJson {
                content_type: self.context.datacontenttype.clone(),
            });
        }
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Encode the event for the gateway wire payload
    pub fn encode(&self) -> Result<Vec<u8>, EventCodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode an event from the gateway wire payload
    pub fn decode(payload: &[u8]) -> Result<Self, EventCodecError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
