//! Errors raised while compiling or evaluating a shader template, and their
//! rendering as [`Diagnostic`]s for the host's error reporting.

use std::{fmt, io, path};

/// Number of source lines shown before and after the offending span of a syntax error.
pub const EXCERPT_CONTEXT_LINES: usize = 2;

const TRAY_SEPARATOR: &str = "| ";

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 1-based line and column of a character in a source text.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Position {
	pub line: usize,
	pub column: usize,
}

impl Position {
	pub fn new(line: usize, column: usize) -> Self {
		Self { line, column }
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// Half-open range `[start, end)` in a source text.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct SourceRange {
	pub start: Position,
	pub end: Position,
}

impl SourceRange {
	pub fn new(start: Position, end: Position) -> Self {
		Self { start, end }
	}
}

/// Malformed shader text, as reported by a [`crate::ShaderParser`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{message} at {}", .location.start)]
pub struct SyntaxError {
	pub message: String,
	pub location: SourceRange,
}

impl SyntaxError {
	pub fn new(message: impl Into<String>, location: SourceRange) -> Self {
		Self {
			message: message.into(),
			location,
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Shader text could not be parsed.
	#[error("syntax error in {}: {error}", display_file(.file))]
	Syntax {
		file: Option<path::PathBuf>,
		error: SyntaxError,
		/// Rendered excerpt of the source around `error.location`.
		excerpt: String,
	},

	/// An include specifier could not be resolved by the host.
	#[error(
		"cannot resolve `#include {specifier}` in {} (looked in {})",
		.issuer.display(),
		.context.display()
	)]
	NotFound {
		specifier: String,
		context: path::PathBuf,
		issuer: path::PathBuf,
		#[source]
		source: io::Error,
	},

	/// A resolved include could not be read.
	#[error("cannot read {}", .path.display())]
	Read {
		path: path::PathBuf,
		#[source]
		source: io::Error,
	},

	/// An include chain revisits a file that is already being expanded.
	#[error("cyclic include: {}", display_cycle(.cycle))]
	CyclicInclude { cycle: Vec<path::PathBuf> },

	/// A template was evaluated without a value for one of its variables.
	#[error("no value supplied for template variable `{0}`")]
	MissingVariable(String),

	/// An option name is not a valid identifier.
	#[error("`{0}` is not a valid template variable name")]
	InvalidVariable(String),

	#[error("invalid configuration: {0}")]
	Config(String),

	/// The host-supplied downleveling transform failed.
	#[error("downlevel transform failed: {0}")]
	Downlevel(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification of an [`Error`], for hosts that route diagnostics by kind.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
	Syntax,
	NotFound,
	Read,
	CyclicInclude,
	MissingVariable,
	InvalidVariable,
	Config,
	Downlevel,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Syntax => "SyntaxError",
			Self::NotFound => "NotFound",
			Self::Read => "ReadError",
			Self::CyclicInclude => "CyclicInclude",
			Self::MissingVariable => "MissingVariable",
			Self::InvalidVariable => "InvalidVariable",
			Self::Config => "ConfigError",
			Self::Downlevel => "DownlevelError",
		})
	}
}

/// Structured error report handed to the host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
	pub kind: ErrorKind,
	pub message: String,
	pub excerpt: Option<String>,
}

impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.kind, self.message)?;
		if let Some(excerpt) = &self.excerpt {
			write!(f, "\n{excerpt}")?;
		}
		Ok(())
	}
}

impl Error {
	/// Wraps a parser error, rendering an excerpt of `source` around its location.
	pub fn syntax(error: SyntaxError, file: Option<&path::Path>, source: &str) -> Self {
		let excerpt = render_excerpt(source, &error.location, EXCERPT_CONTEXT_LINES);
		Self::Syntax {
			file: file.map(path::Path::to_path_buf),
			error,
			excerpt,
		}
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Syntax { .. } => ErrorKind::Syntax,
			Self::NotFound { .. } => ErrorKind::NotFound,
			Self::Read { .. } => ErrorKind::Read,
			Self::CyclicInclude { .. } => ErrorKind::CyclicInclude,
			Self::MissingVariable(_) => ErrorKind::MissingVariable,
			Self::InvalidVariable(_) => ErrorKind::InvalidVariable,
			Self::Config(_) => ErrorKind::Config,
			Self::Downlevel(_) => ErrorKind::Downlevel,
		}
	}

	pub fn diagnostic(&self) -> Diagnostic {
		let mut message = self.to_string();
		let mut source = std::error::Error::source(self);
		while let Some(cause) = source {
			message.push_str(&format!(": {cause}"));
			source = cause.source();
		}
		Diagnostic {
			kind: self.kind(),
			message,
			excerpt: match self {
				Self::Syntax { excerpt, .. } => Some(excerpt.clone()),
				_ => None,
			},
		}
	}
}

fn display_file(file: &Option<path::PathBuf>) -> String {
	file.as_ref()
		.map_or_else(|| "<source>".to_string(), |f| f.display().to_string())
}

fn display_cycle(cycle: &[path::PathBuf]) -> String {
	cycle
		.iter()
		.map(|p| p.display().to_string())
		.collect::<Vec<_>>()
		.join(" -> ")
}

/// Renders the lines around `location` with a line-number tray and a caret
/// underline beneath the start of the span.
///
/// ```text
/// 2| void main() {
/// 3|   gl_FragColor = vec4(1.0;
///  |                      ^---
/// 4| }
/// ```
pub fn render_excerpt(source: &str, location: &SourceRange, context_lines: usize) -> String {
	let lines: Vec<&str> = source.split('\n').collect();
	let error_start = location.start.line.saturating_sub(1).min(lines.len() - 1);
	let error_end = location
		.end
		.line
		.saturating_sub(1)
		.clamp(error_start, lines.len() - 1);

	let first = error_start.saturating_sub(context_lines);
	let last = (error_end + context_lines).min(lines.len() - 1);
	let tray_width = (last + 1).to_string().len();

	let mut excerpt = Vec::new();
	for (index, line) in lines.iter().enumerate().take(last + 1).skip(first) {
		excerpt.push(format!(
			"{:>tray_width$}{TRAY_SEPARATOR}{}",
			index + 1,
			line.trim_end_matches('\r')
		));
		if index == error_start {
			let start_column = location.start.column.max(1);
			let underline = if location.start.line == location.end.line {
				location.end.column.saturating_sub(start_column + 1)
			} else {
				0
			};
			excerpt.push(format!(
				"{:tray_width$}{TRAY_SEPARATOR}{}^{}",
				"",
				" ".repeat(start_column - 1),
				"-".repeat(underline)
			));
		}
	}
	excerpt.join("\n")
}
