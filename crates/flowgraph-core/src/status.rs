//! Phase status values.
//!
//! Every lifecycle phase of an element resolves to a [`Status`]: a numeric
//! code, a human-readable message, and the source location that produced it.
//! A status is OK iff its code is zero. Statuses compose by
//! first-non-OK-wins (see [`Status::absorb`]), which is the only combination
//! rule the engine uses.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Reserved status codes produced by the engine itself.
///
/// User code may return any non-zero code; these constants mark outcomes the
/// engine synthesizes on its own.
pub mod code {
    /// Success.
    pub const OK: i32 = 0;
    /// Generic engine failure.
    pub const ERROR: i32 = -1;
    /// A user method panicked and the default crash handler reported it.
    pub const CRASHED: i32 = -2;
    /// `run` was invoked on an element that does not override it.
    pub const UNSUPPORTED: i32 = -3;
    /// The task carrying the phase was discarded before it could execute.
    pub const CANCELLED: i32 = -4;
}

/// Outcome of one operation or lifecycle phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    code: i32,
    message: String,
    location: String,
}

impl Status {
    /// Successful status. Carries no message or location.
    pub fn ok() -> Self {
        Self {
            code: code::OK,
            message: String::new(),
            location: String::new(),
        }
    }

    /// Status with an explicit code. The location is the caller's `file:line`.
    #[track_caller]
    pub fn new(status_code: i32, message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Self {
            code: status_code,
            message: message.into(),
            location: format!("{}:{}", loc.file(), loc.line()),
        }
    }

    /// Generic failure status.
    #[track_caller]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(code::ERROR, message)
    }

    /// Status reported when a user method panicked.
    #[track_caller]
    pub fn crashed(message: impl Into<String>) -> Self {
        Self::new(code::CRASHED, message)
    }

    /// Status returned by the default `run` implementation.
    #[track_caller]
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::new(code::UNSUPPORTED, what)
    }

    /// Status for work discarded before execution.
    #[track_caller]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(code::CANCELLED, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == code::OK
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `file:line` of the status constructor call site, empty for OK.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Combine with another status: the first non-OK value wins.
    ///
    /// If `self` already carries a failure, `other` is dropped.
    pub fn absorb(&mut self, other: Status) {
        if self.is_ok() && other.is_err() {
            *self = other;
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "OK")
        } else if self.location.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({})", self.code, self.message, self.location)
        }
    }
}
