//! Uniform response envelope.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::HttpClientError;

/// Shape every client call resolves with.
///
/// Callers only need to check [`success`](Self::success); transport status
/// codes and error types never leak past the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T = Value> {
    /// True only for 2xx responses.
    pub success: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Informational text, independent of success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Any other top-level fields of a server-sent envelope.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<T> ResponseEnvelope<T> {
    /// Successful envelope around `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            extra: Map::new(),
        }
    }

    /// Failed envelope with an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            extra: Map::new(),
        }
    }

    /// Attach an informational message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Check whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Convert into a `Result`, mapping failures to their error text.
    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.error.unwrap_or_default())
        }
    }
}

impl ResponseEnvelope<Value> {
    /// Normalize a 2xx body.
    ///
    /// A JSON object that already carries a `success` field is the server's
    /// own envelope and passes through unchanged, extra fields included.
    /// Anything else is wrapped as `{ success: true, data: <body> }`; an empty
    /// body becomes `null` and a non-JSON body becomes a JSON string.
    pub fn from_success_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::ok(Value::Null);
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) if map.contains_key("success") => {
                let value = Value::Object(map);
                match serde_json::from_value::<ResponseEnvelope<Value>>(value.clone()) {
                    Ok(envelope) => envelope,
                    // `success` present but not a bool; keep the body as data.
                    Err(_) => Self::ok(value),
                }
            }
            Ok(value) => Self::ok(value),
            Err(_) => Self::ok(Value::String(String::from_utf8_lossy(body).into_owned())),
        }
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(self) -> ResponseEnvelope<T> {
        let data = match self.data {
            Some(value) => match serde_json::from_value::<T>(value) {
                Ok(data) => Some(data),
                Err(e) => {
                    return ResponseEnvelope {
                        success: false,
                        data: None,
                        error: Some(format!("Failed to decode response: {}", e)),
                        message: self.message,
                        extra: self.extra,
                    };
                }
            },
            None => None,
        };

        ResponseEnvelope {
            success: self.success,
            data,
            error: self.error,
            message: self.message,
            extra: self.extra,
        }
    }
}

impl<T> From<HttpClientError> for ResponseEnvelope<T> {
    fn from(err: HttpClientError) -> Self {
        Self::failure(err.to_string())
    }
}
