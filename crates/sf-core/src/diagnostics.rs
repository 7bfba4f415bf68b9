//! Process-wide record of the failures the lowering pass and the simulator reported.

use once_cell::sync::Lazy;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    /// Stage that reported it, `lower` or `interpret`.
    pub context: &'static str,
    /// `internal` for compiler bugs, `contract` for malformed input.
    pub code: Option<&'static str>,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(context: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context,
            code: None,
            hint: None,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.context, self.message)?;
        if let Some(code) = self.code {
            write!(f, " [{}]", code)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticManager {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticManager {
    pub fn add(&self, diagnostic: Diagnostic) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.push(diagnostic);
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

static GLOBAL_DIAGNOSTIC_MANAGER: Lazy<Arc<DiagnosticManager>> =
    Lazy::new(|| Arc::new(DiagnosticManager::default()));

pub fn diagnostic_manager() -> Arc<DiagnosticManager> {
    GLOBAL_DIAGNOSTIC_MANAGER.clone()
}

/// A simulator failure, recorded and turned into an [`Error`](crate::error::Error).
pub fn report_error(message: impl Into<String>) -> crate::error::Error {
    let diagnostic = Diagnostic::new("interpret", message);
    tracing::error!("{}", diagnostic);
    diagnostic_manager().add(diagnostic.clone());
    crate::error::Error::diagnostic(diagnostic)
}

/// Record a lowering failure with the global manager and hand the error back unchanged.
pub fn report_internal(context: &'static str, error: crate::error::Error) -> crate::error::Error {
    let mut diagnostic = Diagnostic::new(context, error.to_string());
    diagnostic.code = Some(if error.is_internal() { "internal" } else { "contract" });
    diagnostic.hint = error.op().map(|op| format!("inspect {}", op));
    tracing::error!("{}", diagnostic);
    diagnostic_manager().add(diagnostic);
    error
}
