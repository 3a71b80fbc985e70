//! Retry and backoff policy.
//!
//! Every failed remote phase (start, append, finish) of a task counts as one
//! attempt failure; the policy decides whether the scheduler requeues the
//! task after a delay or marks it failed.

mod policy;

pub use policy::{RetryDecision, RetryPolicy};
