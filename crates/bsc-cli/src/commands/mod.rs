//! One module per stage. Each `execute` reads the inputs beside the program
//! file, runs its stage and writes the output beside them.

pub mod check;
pub mod disasm;
pub mod exec;
pub mod gen;
pub mod graph;
pub mod parse;
pub mod resolve;
pub mod run;
pub mod tokenize;

use crate::paths::{read_bytes, Artifacts};
use bsc_engine::compiler::diagnostic::error_code;
use bsc_engine::compiler::{create_files, Diagnostic};
use bsc_engine::{parse_source, AstStore, CompileError, LexError};
use codespan_reporting::files::SimpleFiles;
use std::fmt;
use thiserror::Error;

/// A stage rejected the program. Carries what is needed to print the error
/// against the source text.
#[derive(Error)]
#[error("{message}")]
pub struct StageFailure {
    pub message: String,
    pub diagnostic: Diagnostic,
    pub files: SimpleFiles<String, String>,
}

impl fmt::Debug for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageFailure")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl StageFailure {
    /// Wrap a compile error. Without the source text the diagnostic carries
    /// no snippet.
    pub fn compile(
        artifacts: &Artifacts,
        error: &CompileError,
        store: &AstStore,
        source: Option<&str>,
    ) -> Self {
        let (diagnostic, files) = match source {
            Some(source) => (
                Diagnostic::from_compile_error(error, store, 0),
                create_files(&artifacts.source, source),
            ),
            None => (
                Diagnostic::error(error.to_string()).with_code(error_code(error)),
                SimpleFiles::new(),
            ),
        };
        Self {
            message: error.to_string(),
            diagnostic,
            files,
        }
    }

    /// Wrap the lexer's errors. Only the first one is rendered.
    pub fn lex(artifacts: &Artifacts, errors: &[LexError], source: &str) -> Self {
        let message = errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "tokenizing failed".to_string());
        let mut diagnostic = match errors.first() {
            Some(first) => Diagnostic::from_lex_error(first, 0),
            None => Diagnostic::error(message.clone()),
        };
        if errors.len() > 1 {
            diagnostic = diagnostic.with_note(format!("{} more lexical errors", errors.len() - 1));
        }
        Self {
            message,
            diagnostic,
            files: create_files(&artifacts.source, source),
        }
    }
}

/// A loaded `.ast` file, with spans recovered from the source when it is
/// still next to it.
pub(crate) struct LoadedAst {
    pub store: AstStore,
    pub source: Option<String>,
}

impl LoadedAst {
    pub fn load(artifacts: &Artifacts) -> anyhow::Result<Self> {
        let bytes = read_bytes(&artifacts.ast)?;
        let source = artifacts.read_source().ok();
        let mut store = AstStore::from_bytes(bytes).map_err(|error| {
            StageFailure::compile(artifacts, &error, &AstStore::new(), None)
        })?;

        // The file has no span table. Re-parsing gives the same offsets for
        // every node the parser created.
        if let Some(source) = source.as_deref() {
            match parse_source(source) {
                Ok(parsed) => store.copy_spans_from(&parsed),
                Err(error) => log::debug!("cannot recover spans: {}", error),
            }
        }
        Ok(Self { store, source })
    }

    pub fn failure(&self, artifacts: &Artifacts, error: &CompileError) -> StageFailure {
        StageFailure::compile(artifacts, error, &self.store, self.source.as_deref())
    }
}
