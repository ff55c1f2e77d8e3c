//! Stateless JSON-RPC frame codec.
//!
//! Outbound requests are serialized with [`encode`]. Inbound frames are
//! classified by [`parse`]:
//!
//! | frame                                   | result                      |
//! |-----------------------------------------|-----------------------------|
//! | `id` present (non-null), no `method`    | [`Incoming::Response`]      |
//! | `method` = `*subscription`, no `id`     | [`Incoming::Notification`]  |
//! | both `id` and `method`                  | [`ProtocolError::Ambiguous`]|
//! | anything else                           | a [`ProtocolError`]         |

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::request::{JsonRpcError, JsonRpcRequest, Notification, Response, SubscriptionId};

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Response(Response),
    Notification(Notification),
}

/// Why an inbound frame could not be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("ambiguous frame: carries both an id and a method")]
    Ambiguous,

    #[error("frame is neither a response nor a subscription notification")]
    Unrecognised,

    #[error("error without request id: {0}")]
    UncorrelatedError(String),

    #[error("invalid request id: {0}")]
    InvalidId(String),

    /// The frame names a request but is unusable; the owner can be failed.
    #[error("malformed response {id}: {reason}")]
    MalformedResponse { id: u64, reason: String },

    #[error("malformed notification: {0}")]
    MalformedNotification(String),
}

/// Serialize a request to its wire form.
pub fn encode(req: &JsonRpcRequest) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(req).map(Bytes::from)
}

/// Parse a request frame (server side of the protocol; used by test servers).
pub fn parse_request(frame: &[u8]) -> Result<JsonRpcRequest, ProtocolError> {
    serde_json::from_slice(frame).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}

/// Parse and classify an inbound frame.
pub fn parse(frame: &[u8]) -> Result<Incoming, ProtocolError> {
    let value: Value =
        serde_json::from_slice(frame).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(ProtocolError::NotAnObject);
    };

    let has_id = obj.get("id").is_some_and(|id| !id.is_null());
    let has_method = obj.contains_key("method");

    match (has_id, has_method) {
        (true, true) => Err(ProtocolError::Ambiguous),
        (true, false) => parse_response(obj).map(Incoming::Response),
        (false, true) => parse_notification(obj).map(Incoming::Notification),
        (false, false) => match obj.get("error") {
            Some(err) if !err.is_null() => Err(ProtocolError::UncorrelatedError(err.to_string())),
            _ => Err(ProtocolError::Unrecognised),
        },
    }
}

fn parse_response(mut obj: Map<String, Value>) -> Result<Response, ProtocolError> {
    let id = match obj.get("id") {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| ProtocolError::InvalidId(n.to_string()))?,
        Some(other) => return Err(ProtocolError::InvalidId(other.to_string())),
        None => return Err(ProtocolError::Unrecognised),
    };

    let error = obj.remove("error").filter(|e| !e.is_null());
    let result = obj.remove("result");

    let outcome = match (result, error) {
        (Some(result), Some(_)) if !result.is_null() => {
            return Err(ProtocolError::MalformedResponse {
                id,
                reason: "carries both result and error".into(),
            })
        }
        (_, Some(error)) => {
            let err: JsonRpcError =
                serde_json::from_value(error).map_err(|e| ProtocolError::MalformedResponse {
                    id,
                    reason: format!("invalid error object: {e}"),
                })?;
            Err(err)
        }
        (Some(result), None) => Ok(result),
        (None, None) => {
            return Err(ProtocolError::MalformedResponse {
                id,
                reason: "missing both result and error".into(),
            })
        }
    };

    Ok(Response { id, outcome })
}

fn parse_notification(mut obj: Map<String, Value>) -> Result<Notification, ProtocolError> {
    let method = obj.get("method").and_then(Value::as_str).unwrap_or_default();
    if !method.ends_with("subscription") {
        return Err(ProtocolError::Unrecognised);
    }

    let Some(Value::Object(mut params)) = obj.remove("params") else {
        return Err(ProtocolError::MalformedNotification(
            "params is not an object".into(),
        ));
    };

    let subscription_id = match params.remove("subscription") {
        Some(Value::String(s)) => SubscriptionId(s),
        Some(Value::Number(n)) => SubscriptionId(n.to_string()),
        _ => {
            return Err(ProtocolError::MalformedNotification(
                "missing subscription id".into(),
            ))
        }
    };

    let payload = params.remove("result").ok_or_else(|| {
        ProtocolError::MalformedNotification(format!("subscription {subscription_id}: missing result"))
    })?;

    Ok(Notification {
        subscription_id,
        payload,
    })
}
