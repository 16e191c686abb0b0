//! Error types for the sandboxed interpreter

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

/// Source location information for error messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:{}:{}", file, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Stack frame for error traces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function_name: Option<String>,
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.function_name.as_deref().unwrap_or("<anonymous>");
        let file = self.file.as_deref().unwrap_or("<eval>");
        write!(f, "    at {} ({}:{}:{})", name, file, self.line, self.column)
    }
}

/// Everything the interpreter knew about the failure site.
///
/// All fields are best-effort: natives raise errors without a location and the
/// call site fills it in afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub location: Option<SourceLocation>,
    /// Visible bindings at the failure site as `(name, rendered value)`
    pub scope: Vec<(String, String)>,
    /// Innermost call first
    pub trace: Vec<StackFrame>,
    /// "Did you mean" candidates for unknown names
    pub suggestions: Vec<String>,
}

/// Stable category tag of a [`ScriptError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ParseError,
    ModuleError,
    TypeMismatchError,
    UndefinedVariableError,
    FunctionNotFoundError,
    RuntimeError,
    /// A script-level `throw` that nothing caught
    Uncaught,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::ModuleError => "ModuleError",
            ErrorKind::TypeMismatchError => "TypeMismatchError",
            ErrorKind::UndefinedVariableError => "UndefinedVariableError",
            ErrorKind::FunctionNotFoundError => "FunctionNotFoundError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::Uncaught => "Error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the interpreter
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error("ParseError: {message}{}", format_location(.diagnostics))]
    Parse {
        message: String,
        diagnostics: Box<Diagnostics>,
    },

    #[error("ModuleError: {message}")]
    Module {
        message: String,
        diagnostics: Box<Diagnostics>,
    },

    #[error("TypeMismatchError: {message}{}", format_location(.diagnostics))]
    TypeMismatch {
        message: String,
        diagnostics: Box<Diagnostics>,
    },

    #[error("UndefinedVariableError: {name} is not defined{}{}", format_suggestions(.diagnostics), format_location(.diagnostics))]
    UndefinedVariable {
        name: String,
        diagnostics: Box<Diagnostics>,
    },

    #[error("FunctionNotFoundError: {name} is not a function{}{}", format_suggestions(.diagnostics), format_location(.diagnostics))]
    FunctionNotFound {
        name: String,
        diagnostics: Box<Diagnostics>,
    },

    #[error("RuntimeError: {message}{}", format_location(.diagnostics))]
    Runtime {
        message: String,
        diagnostics: Box<Diagnostics>,
    },

    /// A node outside the synchronous subset was reached in sync mode
    #[error("RuntimeError: {node} is not supported in synchronous evaluation{}", format_location(.diagnostics))]
    SyncUnsupported {
        node: String,
        diagnostics: Box<Diagnostics>,
    },

    /// A script value thrown with `throw` that escaped to the host
    #[error("Uncaught {}", .value.to_display_string())]
    Thrown {
        value: Value,
        diagnostics: Box<Diagnostics>,
    },
}

fn format_location(diagnostics: &Diagnostics) -> String {
    match &diagnostics.location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

fn format_suggestions(diagnostics: &Diagnostics) -> String {
    if diagnostics.suggestions.is_empty() {
        String::new()
    } else {
        format!(". Did you mean: {}?", diagnostics.suggestions.join(", "))
    }
}

impl ScriptError {
    pub fn parse_error(message: impl Into<String>, line: u32, column: u32) -> Self {
        ScriptError::Parse {
            message: message.into(),
            diagnostics: Box::new(Diagnostics {
                location: Some(SourceLocation {
                    file: None,
                    line,
                    column,
                }),
                ..Diagnostics::default()
            }),
        }
    }

    pub fn module_error(message: impl Into<String>) -> Self {
        ScriptError::Module {
            message: message.into(),
            diagnostics: Box::default(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        ScriptError::TypeMismatch {
            message: message.into(),
            diagnostics: Box::default(),
        }
    }

    pub fn undefined_variable(name: impl Into<String>, suggestions: Vec<String>) -> Self {
        ScriptError::UndefinedVariable {
            name: name.into(),
            diagnostics: Box::new(Diagnostics {
                suggestions,
                ..Diagnostics::default()
            }),
        }
    }

    pub fn function_not_found(name: impl Into<String>, suggestions: Vec<String>) -> Self {
        ScriptError::FunctionNotFound {
            name: name.into(),
            diagnostics: Box::new(Diagnostics {
                suggestions,
                ..Diagnostics::default()
            }),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            message: message.into(),
            diagnostics: Box::default(),
        }
    }

    pub fn sync_unsupported(node: impl Into<String>) -> Self {
        ScriptError::SyncUnsupported {
            node: node.into(),
            diagnostics: Box::default(),
        }
    }

    /// Wrap a thrown script value
    pub fn thrown(value: Value) -> Self {
        ScriptError::Thrown {
            value,
            diagnostics: Box::default(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Parse { .. } => ErrorKind::ParseError,
            ScriptError::Module { .. } => ErrorKind::ModuleError,
            ScriptError::TypeMismatch { .. } => ErrorKind::TypeMismatchError,
            ScriptError::UndefinedVariable { .. } => ErrorKind::UndefinedVariableError,
            ScriptError::FunctionNotFound { .. } => ErrorKind::FunctionNotFoundError,
            ScriptError::Runtime { .. } | ScriptError::SyncUnsupported { .. } => {
                ErrorKind::RuntimeError
            }
            ScriptError::Thrown { .. } => ErrorKind::Uncaught,
        }
    }

    /// The human readable part of the error, without category or location
    pub fn message(&self) -> String {
        match self {
            ScriptError::Parse { message, .. }
            | ScriptError::Module { message, .. }
            | ScriptError::TypeMismatch { message, .. }
            | ScriptError::Runtime { message, .. } => message.clone(),
            ScriptError::UndefinedVariable { name, .. } => format!("{} is not defined", name),
            ScriptError::FunctionNotFound { name, .. } => format!("{} is not a function", name),
            ScriptError::SyncUnsupported { node, .. } => {
                format!("{} is not supported in synchronous evaluation", node)
            }
            ScriptError::Thrown { value, .. } => value.to_display_string(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            ScriptError::Parse { diagnostics, .. }
            | ScriptError::Module { diagnostics, .. }
            | ScriptError::TypeMismatch { diagnostics, .. }
            | ScriptError::UndefinedVariable { diagnostics, .. }
            | ScriptError::FunctionNotFound { diagnostics, .. }
            | ScriptError::Runtime { diagnostics, .. }
            | ScriptError::SyncUnsupported { diagnostics, .. }
            | ScriptError::Thrown { diagnostics, .. } => diagnostics,
        }
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        match self {
            ScriptError::Parse { diagnostics, .. }
            | ScriptError::Module { diagnostics, .. }
            | ScriptError::TypeMismatch { diagnostics, .. }
            | ScriptError::UndefinedVariable { diagnostics, .. }
            | ScriptError::FunctionNotFound { diagnostics, .. }
            | ScriptError::Runtime { diagnostics, .. }
            | ScriptError::SyncUnsupported { diagnostics, .. }
            | ScriptError::Thrown { diagnostics, .. } => diagnostics,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.diagnostics().location.as_ref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.diagnostics().suggestions
    }

    /// Attach a location unless one is already known
    pub fn with_location(mut self, line: u32, column: u32, file: Option<&str>) -> Self {
        let diagnostics = self.diagnostics_mut();
        if diagnostics.location.is_none() {
            diagnostics.location = Some(SourceLocation {
                file: file.map(str::to_string),
                line,
                column,
            });
        }
        self
    }

    /// Format the recorded call trace, innermost frame first
    pub fn format_trace(&self) -> String {
        self.diagnostics()
            .trace
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
