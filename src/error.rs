//! Error types used by the bus core and the persistence wrapper.
//!
//! This module defines the error surface of the crate:
//!
//! - [`BusError`] — errors surfaced to a publisher by the bus itself.
//! - [`HandlerError`] — the error a single handler invocation returns.
//! - [`HandlerFailure`] — one failed invocation, with listener context.
//! - [`PersistError`] — persistence wrapper failures (feature `persist`).
//!
//! All enums provide `as_label()` short snake_case labels for logs/metrics.
//!
//! There are no retries anywhere in this core: the guarantee is at most one
//! delivery attempt per listener per event.

use std::fmt;

use thiserror::Error;

/// # Errors surfaced to a publisher.
///
/// Synchronous dispatch completes the full fan-out before reporting, so a
/// [`BusError::Dispatch`] never means that sibling listeners were skipped —
/// it carries every failure that occurred during that publish call.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// One or more handler invocations failed during synchronous dispatch.
    #[error("{} handler invocation(s) failed during dispatch", failures.len())]
    Dispatch {
        /// Every failed invocation observed during this publish call,
        /// across the publishing bus and the buses it relayed to.
        failures: Vec<HandlerFailure>,
    },

    /// Asynchronous dispatch was requested outside a tokio runtime.
    #[error("no tokio runtime available for asynchronous dispatch")]
    NoRuntime,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use treebus::BusError;
    ///
    /// assert_eq!(BusError::NoRuntime.as_label(), "bus_no_runtime");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Dispatch { .. } => "bus_dispatch_failed",
            BusError::NoRuntime => "bus_no_runtime",
        }
    }
}

/// # Error returned by a single handler invocation.
///
/// Message-carrying by design: the bus does not interpret handler errors,
/// it only collects and reports them.
///
/// # Example
/// ```
/// use treebus::HandlerError;
///
/// let err = HandlerError::msg("connection refused");
/// assert_eq!(err.message(), "connection refused");
/// ```
#[derive(Error, Debug)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for HandlerError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// One failed handler invocation, with enough context to identify the
/// listener and the payload it was handling.
#[derive(Debug)]
pub struct HandlerFailure {
    /// Name of the listener (see [`Listen::name`](crate::Listen::name)).
    pub listener: &'static str,
    /// Concrete type name of the event payload being handled.
    pub payload_type: &'static str,
    /// The error the handler returned.
    pub error: HandlerError,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener={} payload={} error={}",
            self.listener, self.payload_type, self.error
        )
    }
}

/// # Errors produced by the persistence wrapper.
///
/// Raised by [`PersistentBus::save`](crate::PersistentBus::save) and
/// [`PersistentBus::restore`](crate::PersistentBus::restore).
#[cfg(feature = "persist")]
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PersistError {
    /// The snapshot references a listener tag the codec does not know.
    #[error("no decoder registered for listener tag {tag:?}")]
    UnknownTag {
        /// The unrecognized tag from the snapshot.
        tag: String,
    },

    /// A listener's state could not be encoded.
    #[error("failed to encode listener state: {source}")]
    Encode {
        /// The underlying serialization error.
        source: serde_json::Error,
    },

    /// A listener's state could not be decoded.
    #[error("failed to decode listener state for tag {tag:?}: {source}")]
    Decode {
        /// The tag whose record failed to decode.
        tag: String,
        /// The underlying deserialization error.
        source: serde_json::Error,
    },
}

#[cfg(feature = "persist")]
impl PersistError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PersistError::UnknownTag { .. } => "persist_unknown_tag",
            PersistError::Encode { .. } => "persist_encode_failed",
            PersistError::Decode { .. } => "persist_decode_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_conversions() {
        let from_str: HandlerError = "boom".into();
        assert_eq!(from_str.message(), "boom");

        let from_string: HandlerError = String::from("bad").into();
        assert_eq!(from_string.message(), "bad");

        let boxed: Box<dyn std::error::Error + Send + Sync> =
            Box::new(std::io::Error::new(std::io::ErrorKind::Other, "io down"));
        let from_boxed: HandlerError = boxed.into();
        assert_eq!(from_boxed.message(), "io down");
    }

    #[test]
    fn test_dispatch_error_reports_count() {
        let err = BusError::Dispatch {
            failures: vec![
                HandlerFailure {
                    listener: "a",
                    payload_type: "alloc::string::String",
                    error: HandlerError::msg("x"),
                },
                HandlerFailure {
                    listener: "b",
                    payload_type: "i32",
                    error: HandlerError::msg("y"),
                },
            ],
        };
        assert_eq!(err.as_label(), "bus_dispatch_failed");
        assert!(err.to_string().contains("2 handler invocation(s)"));
    }

    #[test]
    fn test_handler_failure_display() {
        let failure = HandlerFailure {
            listener: "audit",
            payload_type: "i32",
            error: HandlerError::msg("nope"),
        };
        assert_eq!(failure.to_string(), "listener=audit payload=i32 error=nope");
    }
}
