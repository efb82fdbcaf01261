//! Failure values handed to the capture pipeline.
//!
//! Callers classify what they caught into one of three shapes. `Expected`
//! marks an anticipated business-rule violation (validation, insufficient
//! funds, ...) and bypasses capture entirely; everything else is a fault.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// A structured error with a type name, message and optional stack trace.
    Fault {
        name: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
    /// An anticipated failure whose message is shown to the user verbatim.
    Expected { message: String },
    /// Anything that is not a structured error (a bare string, a number, ...).
    Opaque { text: String },
}

impl Failure {
    pub fn fault(name: impl Into<String>, message: impl Into<String>) -> Self {
        Failure::Fault {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn expected(message: impl Into<String>) -> Self {
        Failure::Expected {
            message: message.into(),
        }
    }

    pub fn opaque(text: impl Into<String>) -> Self {
        Failure::Opaque { text: text.into() }
    }

    pub fn with_stack(self, stack: impl Into<String>) -> Self {
        match self {
            Failure::Fault { name, message, .. } => Failure::Fault {
                name,
                message,
                stack: Some(stack.into()),
            },
            other => other,
        }
    }

    pub fn is_expected(&self) -> bool {
        matches!(self, Failure::Expected { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Failure::Fault { message, .. } | Failure::Expected { message } => message,
            Failure::Opaque { text } => text,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Failure::Fault { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn stack(&self) -> Option<&str> {
        match self {
            Failure::Fault { stack, .. } => stack.as_deref().filter(|s| !s.is_empty()),
            _ => None,
        }
    }
}

/// Build a fault from an `anyhow` error. The message is the outermost
/// error's (its context), the stack holds the cause chain and the backtrace
/// when one was captured.
impl From<&anyhow::Error> for Failure {
    fn from(err: &anyhow::Error) -> Self {
        let mut lines = vec![format!("Error: {}", err)];
        for cause in err.chain().skip(1) {
            lines.push(format!("Caused by: {}", cause));
        }

        let backtrace = err.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            lines.push(backtrace.to_string());
        }

        Failure::Fault {
            name: "Error".to_string(),
            message: err.to_string(),
            stack: Some(lines.join("\n")),
        }
    }
}
