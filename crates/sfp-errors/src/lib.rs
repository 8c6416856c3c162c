//! The pipeline's error taxonomy, expressed as tagged result values rather
//! than exceptions.
//!
//! Each variant documents its local retry policy. Retries happen only
//! inside the component that owns the operation (OM, BA, DSW); this type
//! itself carries no retry behavior, only the tag callers dispatch on.

use std::fmt;

use sfp_types::order::OrderState;

/// A single "scope" an operation deadline applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeoutScope {
    BrokerSubmit,
    Sql,
    Redis,
    LockAcquisition,
    PaperMatch,
    SignalProcessing,
}

impl fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The stable, caller-facing error tag. The HTTP control-plane layer
/// (a collaborator, out of scope here) maps each tag to a status code;
/// every component that returns `PipelineError` keeps the tag plus a
/// human message.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineError {
    /// Bad signal, unknown symbol. No retry.
    Validation(String),
    /// Same signature within the rate-limit window; `existing` is the
    /// order id to return to the caller when known.
    Duplicate { existing_order_id: Option<String> },
    /// Same user created an order within `min_order_interval`.
    RateLimited { retry_after_ms: i64 },
    /// Dispatcher is at `max_queue_size`.
    Backpressure,
    QueueFull,
    /// Network blip, 5xx. Retry with backoff, bounded attempts.
    Transient(String),
    /// Broker terminal rejection (insufficient funds, invalid price, ...).
    BrokerReject(String),
    /// Lock contention or a dead peer past the deadline for `scope`.
    LockTimeout { scope: TimeoutScope },
    Timeout { scope: TimeoutScope },
    /// The requested state machine edge does not exist. Always a bug or a
    /// race; never retried.
    InvalidTransition { from: OrderState, to: OrderState },
    /// SQL unreachable past `max_sql_retries`; DSW halts new flushes.
    DbSyncStalled,
    /// Process-level halt after a best-effort flush attempt. The only
    /// kind permitted to abort the process.
    Fatal(String),
    /// No record exists for the given id.
    NotFound,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "VALIDATION: {msg}"),
            Self::Duplicate { existing_order_id } => {
                write!(f, "DUPLICATE existing_order_id={existing_order_id:?}")
            }
            Self::RateLimited { retry_after_ms } => {
                write!(f, "RATE_LIMITED retry_after_ms={retry_after_ms}")
            }
            Self::Backpressure => write!(f, "BACKPRESSURE"),
            Self::QueueFull => write!(f, "QUEUE_FULL"),
            Self::Transient(msg) => write!(f, "TRANSIENT: {msg}"),
            Self::BrokerReject(msg) => write!(f, "BROKER_REJECT: {msg}"),
            Self::LockTimeout { scope } => write!(f, "LOCK_TIMEOUT scope={scope}"),
            Self::Timeout { scope } => write!(f, "TIMEOUT scope={scope}"),
            Self::InvalidTransition { from, to } => {
                write!(f, "INVALID_TRANSITION from={from} to={to}")
            }
            Self::DbSyncStalled => write!(f, "DB_SYNC_STALLED"),
            Self::Fatal(msg) => write!(f, "FATAL: {msg}"),
            Self::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    /// `true` if the component that owns this operation should retry with
    /// backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::LockTimeout { .. })
    }

    /// `true` if this is the sole kind permitted to abort the process.
    pub fn is_process_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        assert!(PipelineError::Transient("503".into()).is_retryable());
    }

    #[test]
    fn broker_reject_is_not_retryable() {
        assert!(!PipelineError::BrokerReject("insufficient funds".into()).is_retryable());
    }

    #[test]
    fn only_fatal_is_process_fatal() {
        assert!(PipelineError::Fatal("oom".into()).is_process_fatal());
        assert!(!PipelineError::DbSyncStalled.is_process_fatal());
    }

    #[test]
    fn display_includes_tag() {
        let e = PipelineError::InvalidTransition {
            from: OrderState::Filled,
            to: OrderState::Cancelling,
        };
        assert!(format!("{e}").starts_with("INVALID_TRANSITION"));
    }
}
