//! Long-running operation handling.
//!
//! Resource Manager accepts slow writes with `201`/`202` and points at
//! either an `Azure-AsyncOperation` status document or a `Location` that
//! returns the result once done. These functions turn raw responses into
//! engine handles; they do no I/O.

use crate::error::{Error, Result};
use converge::{OperationHandle, PendingOperation, PollMode, PollStatus};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// The parts of an HTTP response the classifiers look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub async_operation: Option<String>,
    pub location: Option<String>,
    pub retry_after: Option<Duration>,
    /// Raw body text; empty when there was none
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parsed JSON body, `None` when empty.
    pub fn json(&self) -> Result<Option<Value>> {
        if self.body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&self.body)?))
    }

    /// Error for a non-success status.
    pub fn error(&self) -> Error {
        Error::from_response(self.status, &self.body)
    }

    fn pending(&self) -> Option<PendingOperation> {
        if let Some(location) = &self.async_operation {
            return Some(PendingOperation {
                location: location.clone(),
                mode: PollMode::StatusResource,
                retry_after: self.retry_after,
            });
        }
        self.location.as_ref().map(|location| PendingOperation {
            location: location.clone(),
            mode: PollMode::ResultResource,
            retry_after: self.retry_after,
        })
    }
}

/// `Retry-After` in seconds. HTTP dates are ignored.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Classify a PUT response.
pub fn classify_write(response: &RawResponse) -> Result<OperationHandle> {
    if !response.is_success() {
        return Err(response.error());
    }
    if response.async_operation.is_some() || response.status == 202 {
        if let Some(pending) = response.pending() {
            return Ok(OperationHandle::Pending(pending));
        }
    }
    Ok(OperationHandle::Done(response.json()?))
}

/// Classify a DELETE response. Not-found means already gone.
pub fn classify_delete(response: &RawResponse) -> Result<OperationHandle> {
    match response.status {
        404 | 204 => Ok(OperationHandle::Done(None)),
        202 => match response.pending() {
            Some(pending) => Ok(OperationHandle::Pending(pending)),
            None => Ok(OperationHandle::Done(None)),
        },
        status if (200..300).contains(&status) => Ok(OperationHandle::Done(None)),
        _ => Err(response.error()),
    }
}

#[derive(Debug, Deserialize)]
struct StatusDocument {
    status: String,
    #[serde(default)]
    error: Option<StatusError>,
}

#[derive(Debug, Deserialize)]
struct StatusError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Classify one poll of a pending operation.
pub fn classify_poll(mode: PollMode, response: &RawResponse) -> Result<PollStatus> {
    if !response.is_success() {
        return Err(response.error());
    }
    if response.status == 202 {
        return Ok(PollStatus::InProgress {
            retry_after: response.retry_after,
        });
    }

    match mode {
        PollMode::ResultResource => Ok(PollStatus::Succeeded(response.json()?)),
        PollMode::StatusResource => {
            let document: StatusDocument = serde_json::from_str(&response.body)?;
            match document.status.to_ascii_lowercase().as_str() {
                "succeeded" => Ok(PollStatus::Succeeded(None)),
                "failed" | "canceled" | "cancelled" => {
                    let message = match document.error {
                        Some(error) if !error.message.is_empty() => {
                            format!("{}: {}", error.code, error.message)
                        }
                        _ => format!("operation {}", document.status),
                    };
                    Ok(PollStatus::Failed(message))
                }
                _ => Ok(PollStatus::InProgress {
                    retry_after: response.retry_after,
                }),
            }
        }
    }
}
