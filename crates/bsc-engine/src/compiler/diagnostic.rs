//! Diagnostic infrastructure for error reporting
//!
//! Renders compiler errors with source context through `codespan-reporting`,
//! either to a terminal or as JSON.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, LabelStyle, Severity};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term;
use serde::Serialize;
use std::path::PathBuf;
use termcolor::WriteColor;

use crate::compiler::ast::AstStore;
use crate::compiler::error::CompileError;
use crate::parser::{LexError, Span};

/// Error code for a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// A diagnostic message with source code context
pub struct Diagnostic {
    inner: CsDiagnostic<usize>,
    code: Option<ErrorCode>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            inner: CsDiagnostic::new(severity).with_message(message),
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Set the error code
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self.inner = self.inner.with_code(code.0);
        self
    }

    /// Add a primary label (main error location)
    pub fn with_primary_label(mut self, file_id: usize, span: Span, message: impl Into<String>) -> Self {
        let label = Label::primary(file_id, span.start..span.end).with_message(message);
        self.inner.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.inner.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.notes.push(format!("help: {}", help.into()));
        self
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    /// Get the underlying codespan diagnostic
    pub fn inner(&self) -> &CsDiagnostic<usize> {
        &self.inner
    }

    /// Create a diagnostic from a compile error. Node-based errors are
    /// located through the span table of `store`; errors without a known
    /// location get no label.
    pub fn from_compile_error(error: &CompileError, store: &AstStore, file_id: usize) -> Self {
        use CompileError::*;

        let diagnostic = Diagnostic::error(error.to_string()).with_code(error_code(error));
        let span = error.span(store);
        let labelled = |diagnostic: Diagnostic, message: &str| match span {
            Some(span) => diagnostic.with_primary_label(file_id, span, message),
            None => diagnostic,
        };

        match error {
            Syntax { .. } => labelled(diagnostic, "unexpected token"),
            Layout { type_name, .. } => labelled(diagnostic, "size cannot be computed")
                .with_note(format!(
                    "'{}' is not declared, or its definition refers back to itself",
                    type_name
                )),
            TypeMismatch { expected, .. } => {
                labelled(diagnostic, &format!("expected '{}'", expected)).with_help(
                    "values only widen implicitly; use '<byte>' to narrow a short",
                )
            }
            InvalidOperation { .. } => labelled(diagnostic, "not allowed here"),
            UndefinedName { .. } => labelled(diagnostic, "not found in this scope")
                .with_note("variables are visible after their declaration, in the same class body"),
            UnknownMember { .. } => labelled(diagnostic, "unknown member"),
            Range { .. } => labelled(diagnostic, "value out of range")
                .with_note("constants must fit in a signed 16-bit short"),
            Internal { .. } => labelled(diagnostic, "while compiling this")
                .with_note("this is a bug in the compiler"),
        }
    }

    /// Create a diagnostic from a lexical error
    pub fn from_lex_error(error: &LexError, file_id: usize) -> Self {
        let diagnostic = Diagnostic::error(error.to_string()).with_code(ErrorCode("E1002"));
        match error.span() {
            Some(span) => diagnostic.with_primary_label(file_id, span, "not a valid token"),
            None => diagnostic,
        }
    }

    /// Render the diagnostic to `writer`
    pub fn emit(
        &self,
        writer: &mut dyn WriteColor,
        files: &SimpleFiles<String, String>,
    ) -> Result<(), codespan_reporting::files::Error> {
        let config = term::Config::default();
        term::emit(writer, &config, files, &self.inner)
    }

    /// Convert to JSON representation for tooling
    pub fn to_json(&self, files: &SimpleFiles<String, String>) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&JsonDiagnostic::from_diagnostic(self, files))
    }
}

/// JSON representation of a diagnostic
#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub code: Option<String>,
    pub severity: String,
    pub message: String,
    pub labels: Vec<JsonLabel>,
    pub notes: Vec<String>,
}

/// JSON representation of a diagnostic label, with 1-indexed positions
#[derive(Debug, Serialize)]
pub struct JsonLabel {
    pub file: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: String,
    pub style: String,
}

impl JsonDiagnostic {
    pub fn from_diagnostic(diag: &Diagnostic, files: &SimpleFiles<String, String>) -> Self {
        let severity = match diag.inner.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
            Severity::Bug => "bug",
        };

        let labels = diag
            .inner
            .labels
            .iter()
            .filter_map(|label| {
                let file = files.get(label.file_id).ok()?;
                let start = file.location((), label.range.start).ok()?;
                let end = file.location((), label.range.end).ok()?;

                Some(JsonLabel {
                    file: file.name().to_string(),
                    start_line: start.line_number,
                    start_column: start.column_number,
                    end_line: end.line_number,
                    end_column: end.column_number,
                    message: label.message.clone(),
                    style: match label.style {
                        LabelStyle::Primary => "primary",
                        LabelStyle::Secondary => "secondary",
                    }
                    .to_string(),
                })
            })
            .collect();

        JsonDiagnostic {
            code: diag.code.map(|c| c.0.to_string()),
            severity: severity.to_string(),
            message: diag.inner.message.clone(),
            labels,
            notes: diag.inner.notes.clone(),
        }
    }
}

/// Get the error code for a compile error
pub fn error_code(error: &CompileError) -> ErrorCode {
    use CompileError::*;

    match error {
        Syntax { .. } => ErrorCode("E1001"),
        Layout { .. } => ErrorCode("E2001"),
        TypeMismatch { .. } => ErrorCode("E3001"),
        InvalidOperation { .. } => ErrorCode("E3002"),
        UndefinedName { .. } => ErrorCode("E3003"),
        UnknownMember { .. } => ErrorCode("E3004"),
        Range { .. } => ErrorCode("E4001"),
        Internal { .. } => ErrorCode("E9001"),
    }
}

/// Helper to create a SimpleFiles instance holding one source file
pub fn create_files(path: impl Into<PathBuf>, source: impl Into<String>) -> SimpleFiles<String, String> {
    let mut files = SimpleFiles::new();
    files.add(path.into().display().to_string(), source.into());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{NewNode, NodeId, NodeType};
    use termcolor::NoColor;

    fn store_with_span(span: Span) -> (AstStore, NodeId) {
        let mut store = AstStore::new();
        let node = store
            .append_child(NewNode::new(NodeType::Constant).with_token("300"), NodeId::NONE, 0)
            .unwrap();
        store.set_span(node, span);
        (store, node)
    }

    #[test]
    fn test_error_codes_by_class() {
        let syntax = CompileError::syntax(Span::new(0, 1, 1, 1), "expected ';'");
        assert_eq!(error_code(&syntax), ErrorCode("E1001"));

        let mismatch = CompileError::TypeMismatch {
            expected: "byte".into(),
            found: "short".into(),
            node: NodeId::NONE,
        };
        assert_eq!(error_code(&mismatch).as_str(), "E3001");
    }

    #[test]
    fn test_from_compile_error_labels_node_span() {
        let (store, node) = store_with_span(Span::new(9, 12, 1, 10));
        let error = CompileError::range(node, "constant 300 does not fit in a byte");

        let diag = Diagnostic::from_compile_error(&error, &store, 0);
        assert_eq!(diag.code(), Some(ErrorCode("E4001")));
        assert_eq!(diag.inner().labels.len(), 1);
        assert_eq!(diag.inner().labels[0].range, 9..12);
    }

    #[test]
    fn test_emit_renders_source_line() {
        let (store, node) = store_with_span(Span::new(9, 12, 1, 10));
        let error = CompileError::range(node, "constant out of range");
        let files = create_files("prog.src", "byte b = 300;");

        let mut out = NoColor::new(Vec::new());
        Diagnostic::from_compile_error(&error, &store, 0)
            .emit(&mut out, &files)
            .unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("error[E4001]"));
        assert!(text.contains("prog.src:1:10"));
        assert!(text.contains("byte b = 300;"));
    }

    #[test]
    fn test_json_output() {
        let error = CompileError::syntax(Span::new(5, 6, 1, 6), "expected identifier");
        let files = create_files("prog.src", "byte ;");

        let json = Diagnostic::from_compile_error(&error, &AstStore::new(), 0)
            .to_json(&files)
            .unwrap();
        assert!(json.contains("\"E1001\""));
        assert!(json.contains("\"start_column\": 6"));
        assert!(json.contains("\"primary\""));
    }
}
