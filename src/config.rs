//! Per-compilation configuration.

use std::path;

use serde::Deserialize;

use crate::{Error, Result, DEFAULT_CHUNK_EXTENSION, DEFAULT_VARIABLE_PREFIX};

/// Options for one compilation. Passed by reference to every stage; never mutated
/// while a compilation runs.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
	/// Directory that include specifiers starting with `/` are anchored at.
	pub root_path: path::PathBuf,
	/// Extension appended to include specifiers that have none.
	pub chunk_extension: String,
	/// Prefix marking template variables, e.g. `$` in `$color`.
	pub variable_marker_prefix: String,
	/// Whether emitted module source goes through the host's downleveling transform.
	pub downlevel_compile: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			root_path: path::PathBuf::from("/"),
			chunk_extension: DEFAULT_CHUNK_EXTENSION.to_string(),
			variable_marker_prefix: DEFAULT_VARIABLE_PREFIX.to_string(),
			downlevel_compile: false,
		}
	}
}

impl Config {
	/// Reads a configuration from a JSON file; missing keys take their defaults.
	pub fn from_json_file(path: impl AsRef<path::Path>) -> Result<Self> {
		let path = path.as_ref();
		let source = ex::fs::read_to_string(path).map_err(|e| Error::Read {
			path: path.to_path_buf(),
			source: std::io::Error::new(e.kind(), e.to_string()),
		})?;
		Self::from_json_str(&source)
	}

	pub fn from_json_str(source: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	pub fn with_root_path(mut self, root_path: impl Into<path::PathBuf>) -> Self {
		self.root_path = root_path.into();
		self
	}

	pub fn with_chunk_extension(mut self, extension: impl Into<String>) -> Self {
		self.chunk_extension = extension.into();
		self
	}

	pub fn with_variable_marker_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.variable_marker_prefix = prefix.into();
		self
	}

	pub fn with_downlevel_compile(mut self, downlevel_compile: bool) -> Self {
		self.downlevel_compile = downlevel_compile;
		self
	}

	pub fn validate(&self) -> Result<()> {
		let prefix = &self.variable_marker_prefix;
		match prefix.chars().next() {
			None => return Err(Error::Config("variable marker prefix is empty".to_string())),
			Some(c) if c.is_alphanumeric() || c == '_' => {
				return Err(Error::Config(format!(
					"variable marker prefix `{prefix}` starts with an identifier character"
				)))
			}
			Some(_) => {}
		}
		let extension = self.chunk_extension.trim_start_matches('.');
		if extension.is_empty() || extension.contains(['/', '\\']) {
			return Err(Error::Config(format!(
				"`{}` is not a valid chunk extension",
				self.chunk_extension
			)));
		}
		Ok(())
	}
}
