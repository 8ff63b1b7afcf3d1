//! Non-fatal warnings raised while filling a template.
//!
//! The engine never logs warnings directly. It hands them to a
//! [`Diagnostics`] sink supplied by the caller, which can forward them to
//! the `log` facade ([`LogDiagnostics`]) or keep them for inspection
//! ([`CollectingDiagnostics`]).

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// A recoverable problem found during substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// Placeholder names with no record field; they were filled with the
    /// blank default.
    MissingPlaceholderField {
        /// 1-based page number
        page: usize,
        fields: Vec<String>,
    },
    /// A captured font could not be resolved; text was drawn with the
    /// fallback font instead.
    FontUnavailable {
        /// 1-based page number
        page: usize,
        font: String,
        fallback: String,
        /// Size actually used for the fallback
        size: f32,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingPlaceholderField { page, fields } => write!(
                f,
                "page {}: missing fields {:?}, filled with blanks",
                page, fields
            ),
            Warning::FontUnavailable {
                page,
                font,
                fallback,
                size,
            } => write!(
                f,
                "page {}: font '{}' unavailable, using '{}' at {}pt",
                page, font, fallback, size
            ),
        }
    }
}

/// Sink for warnings.
pub trait Diagnostics: Send + Sync {
    /// Report a warning.
    fn warn(&self, warning: Warning);
}

impl<D: Diagnostics + ?Sized> Diagnostics for &D {
    fn warn(&self, warning: Warning) {
        (**self).warn(warning)
    }
}

/// Forwards every warning to `log::warn!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn warn(&self, warning: Warning) {
        log::warn!("{}", warning);
    }
}

/// Keeps every warning in memory.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the warnings reported so far.
    pub fn warnings(&self) -> Vec<Warning> {
        self.lock().clone()
    }

    /// Remove and return all warnings.
    pub fn take(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Warning>> {
        // A poisoned list is still a valid list of warnings.
        self.warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn warn(&self, warning: Warning) {
        self.lock().push(warning);
    }
}
