//! Include specifier resolution and the host capabilities it delegates to.

use std::{
	collections::{BTreeMap, BTreeSet},
	io, path,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{config::Config, Error, Result};

/// File lookup and loading capability supplied by the embedding host.
///
/// `resolve` receives the directory to search from and a normalized specifier
/// (extension applied, root anchoring already folded into `context`) and returns
/// the absolute path of the file it designates.
#[async_trait]
pub trait Host: Send + Sync {
	async fn resolve(&self, context: &path::Path, specifier: &str) -> io::Result<path::PathBuf>;

	async fn read(&self, path: &path::Path) -> io::Result<String>;
}

/// Resolves includes against the real filesystem.
///
/// Relative contexts are taken from the process working directory; resolved
/// paths are always absolute.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsHost;

#[async_trait]
impl Host for FsHost {
	async fn resolve(&self, context: &path::Path, specifier: &str) -> io::Result<path::PathBuf> {
		let joined = context.join(specifier);
		let absolute = if joined.is_absolute() {
			joined
		} else {
			std::env::current_dir()?.join(joined)
		};
		let candidate = normalize(&absolute);
		if candidate.is_file() {
			Ok(candidate)
		} else {
			Err(io::Error::new(
				io::ErrorKind::NotFound,
				format!("{} does not exist", candidate.display()),
			))
		}
	}

	async fn read(&self, path: &path::Path) -> io::Result<String> {
		ex::fs::read_to_string(path).map_err(|e| io::Error::new(e.kind(), e.to_string()))
	}
}

/// In-memory file tree, keyed by absolute path.
#[derive(Clone, Debug, Default)]
pub struct MemoryHost {
	files: BTreeMap<path::PathBuf, String>,
}

impl MemoryHost {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_file(mut self, path: impl AsRef<path::Path>, source: impl Into<String>) -> Self {
		self.insert(path, source);
		self
	}

	pub fn insert(&mut self, path: impl AsRef<path::Path>, source: impl Into<String>) {
		self.files.insert(normalize(path.as_ref()), source.into());
	}
}

#[async_trait]
impl Host for MemoryHost {
	async fn resolve(&self, context: &path::Path, specifier: &str) -> io::Result<path::PathBuf> {
		let candidate = normalize(&context.join(specifier));
		if self.files.contains_key(&candidate) {
			Ok(candidate)
		} else {
			Err(io::Error::new(
				io::ErrorKind::NotFound,
				format!("{} is not in the file tree", candidate.display()),
			))
		}
	}

	async fn read(&self, path: &path::Path) -> io::Result<String> {
		self.files.get(path).cloned().ok_or_else(|| {
			io::Error::new(
				io::ErrorKind::NotFound,
				format!("{} is not in the file tree", path.display()),
			)
		})
	}
}

/// Absolute paths of every file read during one compilation.
///
/// Registration only ever adds paths and may happen from concurrent include loads.
#[derive(Debug, Default)]
pub struct DependencySet {
	paths: Mutex<BTreeSet<path::PathBuf>>,
}

impl DependencySet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, path: &path::Path) {
		self.paths.lock().insert(path.to_path_buf());
	}

	pub fn contains(&self, path: &path::Path) -> bool {
		self.paths.lock().contains(path)
	}

	pub fn into_paths(self) -> BTreeSet<path::PathBuf> {
		self.paths.into_inner()
	}
}

/// Directory and specifier to hand to [`Host::resolve`] for one include.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolveRequest {
	pub context: path::PathBuf,
	pub specifier: String,
}

/// Strips terminators, surrounding whitespace and `"…"` / `<…>` delimiters from
/// the raw text of an include directive.
pub fn clean_specifier(raw: &str) -> &str {
	let trimmed = raw.trim().trim_end_matches(';').trim();
	[('"', '"'), ('<', '>')]
		.into_iter()
		.find_map(|(open, close)| trimmed.strip_prefix(open)?.strip_suffix(close))
		.map_or(trimmed, str::trim)
}

/// Computes the lookup request for `raw` issued from the file at `issuer`.
///
/// Extensionless specifiers get the configured chunk extension. Specifiers
/// starting with `/` are anchored at the configured root instead of the
/// filesystem root; all others are relative to the issuer's directory.
pub fn request(raw: &str, issuer: &path::Path, config: &Config) -> ResolveRequest {
	let specifier = clean_specifier(raw);
	let specifier = if path::Path::new(specifier).extension().is_none() {
		format!("{specifier}.{}", config.chunk_extension.trim_start_matches('.'))
	} else {
		specifier.to_string()
	};

	let anchored = specifier
		.strip_prefix('/')
		.map(|rest| format!("./{}", rest.trim_start_matches('/')));
	match anchored {
		Some(specifier) => ResolveRequest {
			context: config.root_path.clone(),
			specifier,
		},
		None => ResolveRequest {
			context: issuer
				.parent()
				.map_or_else(|| config.root_path.clone(), path::Path::to_path_buf),
			specifier,
		},
	}
}

/// Resolves the include `raw` issued from `issuer` to an absolute path.
pub async fn resolve<H: Host + ?Sized>(
	host: &H,
	raw: &str,
	issuer: &path::Path,
	config: &Config,
) -> Result<path::PathBuf> {
	let ResolveRequest { context, specifier } = request(raw, issuer, config);
	log::trace!(
		"resolving `{specifier}` from {} for {}",
		context.display(),
		issuer.display()
	);
	host.resolve(&context, &specifier)
		.await
		.map_err(|source| Error::NotFound {
			specifier: clean_specifier(raw).to_string(),
			context,
			issuer: issuer.to_path_buf(),
			source,
		})
}

/// Lexically normalizes `path`, folding `.` and `..` components.
pub fn normalize(path: &path::Path) -> path::PathBuf {
	let mut normalized = path::PathBuf::new();
	for component in path.components() {
		match component {
			path::Component::CurDir => {}
			path::Component::ParentDir => {
				if !normalized.pop() {
					normalized.push(component);
				}
			}
			other => normalized.push(other),
		}
	}
	normalized
}
