//! Span helpers.
//!
//! # Responsibilities
//! - Attach fields to a span after it was opened
//! - Record the outcome of the work a span bounds
//!
//! # Design Decisions
//! - Spans that record outcomes declare `result` and `error` as empty fields
//!   at creation; `tracing` ignores fields a span did not declare

use std::fmt::Display;

use tracing::Span;

/// Attach a string field to the current span.
pub fn add_field(name: &'static str, value: impl Display) {
    Span::current().record(name, tracing::field::display(value));
}

/// Record `result` (and `error` on failure) on `span`.
pub fn record_outcome<T, E: Display>(span: &Span, outcome: &Result<T, E>) {
    match outcome {
        Ok(_) => {
            span.record("result", "success");
        }
        Err(e) => {
            span.record("result", "failure");
            span.record("error", tracing::field::display(e));
        }
    }
}
