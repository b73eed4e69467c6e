//! Encrypted envelope handling.
//!
//! The self-service endpoint answers with a JSON body whose `data` field holds a
//! single string: a 16 character IV immediately followed by the Base64
//! ciphertext.

use crate::error::{EnvelopeDefect, HistoryError, Result};
use log::debug;
use serde_json::Value;

/// Number of leading characters that make up the IV.
pub const IV_LEN: usize = 16;

/// An encrypted transaction history as returned by the card service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope(String);

impl Envelope {
    /// Wraps a raw envelope string.
    pub fn new(raw: impl Into<String>) -> Self {
        Envelope(raw.into())
    }

    /// Extracts the envelope from a transport response body.
    ///
    /// Accepts either the full JSON body (`{"data": "..."}`) or the bare envelope
    /// text. A JSON object without a string `data` field means the transport
    /// handed over something other than a history response; the service's
    /// `message`, if any, is kept in the error. The `data` string is taken
    /// verbatim.
    pub fn from_response_body(body: &str) -> Result<Self> {
        let trimmed = body.trim();

        if !trimmed.starts_with('{') {
            return Ok(Envelope::new(trimmed));
        }

        let map = match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => map,
            _ => return Err(no_envelope("body is not a JSON object")),
        };

        match map.get("data") {
            Some(Value::String(data)) => {
                debug!("Extracted {} byte envelope from response body", data.len());
                Ok(Envelope::new(data.as_str()))
            }
            _ => match map.get("message") {
                Some(Value::String(message)) => Err(no_envelope(message)),
                _ => Err(no_envelope("no string `data` field")),
            },
        }
    }

    /// Returns the raw envelope text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the envelope into `(iv, ciphertext)`.
    ///
    /// The IV is the first [`IV_LEN`] characters; the ciphertext is everything
    /// after them and may be empty.
    pub fn split(&self) -> Result<(&str, &str)> {
        let raw = self.0.as_str();

        let boundary = match raw.char_indices().nth(IV_LEN) {
            Some((idx, _)) => idx,
            None => {
                let length = raw.chars().count();
                if length < IV_LEN {
                    return Err(HistoryError::MalformedEnvelope(EnvelopeDefect::TooShort(
                        length,
                    )));
                }
                raw.len()
            }
        };

        Ok(raw.split_at(boundary))
    }
}

fn no_envelope(reason: &str) -> HistoryError {
    HistoryError::MalformedEnvelope(EnvelopeDefect::NoEnvelope(reason.to_string()))
}

impl From<String> for Envelope {
    fn from(raw: String) -> Self {
        Envelope(raw)
    }
}

impl From<&str> for Envelope {
    fn from(raw: &str) -> Self {
        Envelope(raw.to_string())
    }
}
