//! Colored terminal output.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR` environment variable and `--color` flag.
//! Stage failures can also be printed as JSON for editors and scripts.

use crate::commands::StageFailure;
use clap::ValueEnum;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// How stage failures are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DiagnosticFormat {
    /// Source snippet with labels
    #[default]
    Text,
    /// One JSON object on stderr
    Json,
}

/// JSON form of a stage failure: code, message, labels with 1-based
/// line/column positions, and notes.
pub fn render_json(failure: &StageFailure) -> anyhow::Result<String> {
    Ok(failure.diagnostic.to_json(&failure.files)?)
}

/// Print a failed command to stderr. Stage failures on user input are
/// rendered with their source snippet (or as JSON), everything else as a
/// plain chain.
pub fn report_error(error: &anyhow::Error, choice: ColorChoice, format: DiagnosticFormat) {
    let mut stderr = StandardStream::stderr(choice);

    if let Some(failure) = error.downcast_ref::<StageFailure>() {
        let rendered = match format {
            DiagnosticFormat::Text => failure
                .diagnostic
                .emit(&mut stderr, &failure.files)
                .map_err(anyhow::Error::from),
            DiagnosticFormat::Json => {
                render_json(failure).and_then(|json| Ok(writeln!(stderr, "{}", json)?))
            }
        };
        match rendered {
            Ok(()) => return,
            Err(render_error) => log::debug!("cannot render diagnostic: {:#}", render_error),
        }
    }

    let mut spec = ColorSpec::new();
    spec.set_fg(Some(Color::Red)).set_bold(true);
    let _ = stderr.set_color(&spec);
    let _ = write!(stderr, "error");
    let _ = stderr.reset();
    let _ = writeln!(stderr, ": {:#}", error);
}

/// Render an evaluation stack as signed bytes, bottom first.
pub fn format_stack(stack: &[i8]) -> String {
    if stack.is_empty() {
        return "(empty)".to_string();
    }
    stack
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
