//! Compiles shader source into a [`CompiledTemplate`]: parse, expand includes,
//! serialize, then factor out variable markers.

use std::{collections::BTreeSet, io, path};

use crate::{
	config::Config,
	expand::{self, Expansion},
	resolve::{FsHost, Host},
	syntax::{ChunkParser, ShaderParser},
	template::CompiledTemplate,
	Error, Result,
};

/// Host transform applied to emitted module source when
/// [`Config::downlevel_compile`] is set.
pub trait Downlevel {
	fn downlevel(
		&self,
		module_source: &str,
	) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

impl<F> Downlevel for F
where
	F: Fn(&str) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>>,
{
	fn downlevel(
		&self,
		module_source: &str,
	) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
		self(module_source)
	}
}

/// Output of one successful compilation.
#[derive(Clone, Debug)]
pub struct Compilation {
	pub template: CompiledTemplate,
	/// Absolute paths of every chunk read; the host must recompile when any changes.
	pub dependencies: BTreeSet<path::PathBuf>,
}

/// Compiles shader sources with a fixed configuration, host and parser.
pub struct Compiler<H = FsHost, P = ChunkParser> {
	config: Config,
	host: H,
	parser: P,
}

impl Compiler {
	/// Creates a [`Compiler`] reading chunks from the filesystem.
	pub fn new(config: Config) -> Result<Self> {
		Compiler::with_host(config, FsHost)
	}
}

impl<H: Host> Compiler<H> {
	pub fn with_host(config: Config, host: H) -> Result<Self> {
		Compiler::with_host_and_parser(config, host, ChunkParser)
	}
}

impl<H: Host, P: ShaderParser> Compiler<H, P> {
	pub fn with_host_and_parser(config: Config, host: H, parser: P) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			config,
			host,
			parser,
		})
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	/// Compiles `source`, the contents of the file at `source_path`.
	///
	/// Includes in `source` resolve relative to `source_path`. Nothing is
	/// returned unless every include was resolved and every chunk parsed.
	pub async fn compile(&self, source: &str, source_path: &path::Path) -> Result<Compilation> {
		let tree = self
			.parser
			.parse(source)
			.map_err(|error| Error::syntax(error, Some(source_path), source))?;

		let Expansion { tree, dependencies } =
			expand::expand(tree, source_path, &self.host, &self.parser, &self.config).await?;

		let expanded = self.parser.serialize(&tree);
		let template = CompiledTemplate::compile(&expanded, &self.config.variable_marker_prefix);
		log::debug!(
			"compiled {} with {} dependencies and {} variables",
			source_path.display(),
			dependencies.len(),
			template.variables().len()
		);
		Ok(Compilation {
			template,
			dependencies,
		})
	}

	/// Locates the file at `path` through the host, then reads and compiles it.
	///
	/// The entry is resolved like any include, so a relative `path` is made
	/// absolute the same way its chunks are.
	pub async fn compile_file(&self, path: impl AsRef<path::Path>) -> Result<Compilation> {
		let path = path.as_ref();
		let read_error = |source| Error::Read {
			path: path.to_path_buf(),
			source,
		};
		let file_name = path.file_name().ok_or_else(|| {
			read_error(io::Error::new(io::ErrorKind::InvalidInput, "not a file path"))
		})?;
		let entry = self
			.host
			.resolve(
				path.parent().unwrap_or(path::Path::new("")),
				&file_name.to_string_lossy(),
			)
			.await
			.map_err(read_error)?;
		let source = self.host.read(&entry).await.map_err(read_error)?;
		self.compile(&source, &entry).await
	}

	/// Module source for `template`, passed through `downlevel` when the
	/// configuration asks for it.
	pub fn emit_module(
		&self,
		template: &CompiledTemplate,
		downlevel: Option<&dyn Downlevel>,
	) -> Result<String> {
		let module_source = template.to_module_source();
		if !self.config.downlevel_compile {
			return Ok(module_source);
		}
		let downlevel = downlevel.ok_or_else(|| {
			Error::Config("downlevel compilation requested but no transform was supplied".to_string())
		})?;
		downlevel.downlevel(&module_source).map_err(Error::Downlevel)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{resolve::MemoryHost, ErrorKind, Options};

	fn compiler(host: MemoryHost) -> Compiler<MemoryHost> {
		Compiler::with_host(Config::default().with_root_path("/project"), host).unwrap()
	}

	fn compile_file(compiler: &Compiler<MemoryHost>, path: &str) -> Result<Compilation> {
		pollster::block_on(compiler.compile_file(path))
	}

	#[test]
	fn round_trips_plain_source() {
		let source = "precision highp float;\n\nvoid main() {\n\tgl_FragColor = vec4(1.0);\n}\n";
		let compiler = compiler(MemoryHost::new().with_file("/project/a.glsl", source));
		let compilation = compile_file(&compiler, "/project/a.glsl").unwrap();
		assert_eq!(compilation.template.evaluate(&Options::new()).unwrap(), source);
		assert!(compilation.dependencies.is_empty());
	}

	#[test]
	fn expands_then_substitutes() {
		let host = MemoryHost::new()
			.with_file(
				"/project/shaders/main.frag",
				"#include /lib/color;\nvoid main() {\n\tgl_FragColor = tint($color);\n}\n",
			)
			.with_file(
				"/project/lib/color.glsl",
				"vec4 tint(vec4 c) { return c * $strength; }\n",
			);
		let compiler = compiler(host);
		let compilation = compile_file(&compiler, "/project/shaders/main.frag").unwrap();
		assert_eq!(compilation.template.variables(), ["strength", "color"]);

		let mut options = Options::new();
		options.set("color", "vec4(1.0)").unwrap().set("strength", 0.5f32).unwrap();
		assert_eq!(
			compilation.template.evaluate(&options).unwrap(),
			"vec4 tint(vec4 c) { return c * 0.5; }\n\nvoid main() {\n\tgl_FragColor = tint(vec4(1.0));\n}\n"
		);
		assert_eq!(
			compilation.dependencies,
			BTreeSet::from([path::PathBuf::from("/project/lib/color.glsl")])
		);
	}

	#[test]
	fn syntax_error_has_excerpt() {
		let source = "void main() {\n\tgl_FragColor = vec4(1.0;\n}\n";
		let compiler = compiler(MemoryHost::new());
		let error = pollster::block_on(compiler.compile(source, path::Path::new("/project/a.glsl")))
			.unwrap_err();
		let diagnostic = error.diagnostic();
		assert_eq!(diagnostic.kind, ErrorKind::Syntax);
		assert_eq!(
			diagnostic.message,
			"syntax error in /project/a.glsl: expected `)`, found `}` at 3:1"
		);
		assert_eq!(
			diagnostic.excerpt.as_deref(),
			Some("1| void main() {\n2| \tgl_FragColor = vec4(1.0;\n3| }\n | ^\n4| ")
		);
	}

	#[test]
	fn missing_chunk_emits_nothing() {
		let host = MemoryHost::new().with_file("/project/a.glsl", "#include nope\nvoid main() {}\n");
		let error = compile_file(&compiler(host), "/project/a.glsl").unwrap_err();
		assert_eq!(error.kind(), ErrorKind::NotFound);
		assert!(error.to_string().contains("`#include nope`"));
	}

	#[test]
	fn unreadable_entry_is_a_read_error() {
		let error = compile_file(&compiler(MemoryHost::new()), "/project/none.glsl").unwrap_err();
		assert_eq!(error.kind(), ErrorKind::Read);
	}

	#[test]
	fn invalid_config_is_rejected() {
		let config = Config::default().with_variable_marker_prefix("");
		assert!(matches!(
			Compiler::with_host(config, MemoryHost::new()),
			Err(Error::Config(_))
		));
	}

	#[test]
	fn module_is_downleveled_on_request() {
		let host = MemoryHost::new().with_file("/project/a.glsl", "float x = $x;");
		let plain = compiler(host.clone());
		let template = compile_file(&plain, "/project/a.glsl").unwrap().template;
		let module = plain.emit_module(&template, None).unwrap();
		assert_eq!(module, template.to_module_source());
		assert!(module.ends_with("return `float x = ${v(\"x\")};`; };"));

		let config = Config::default().with_downlevel_compile(true);
		let downleveling = Compiler::with_host(config, host).unwrap();
		assert!(matches!(
			downleveling.emit_module(&template, None),
			Err(Error::Config(_))
		));

		let strict = |source: &str| -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
			Ok(format!("\"use strict\";\n{source}"))
		};
		assert_eq!(
			downleveling.emit_module(&template, Some(&strict)).unwrap(),
			format!("\"use strict\";\n{module}")
		);

		let failing = |_: &str| -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
			Err("unsupported syntax".into())
		};
		assert_eq!(
			downleveling.emit_module(&template, Some(&failing)).unwrap_err().kind(),
			ErrorKind::Downlevel
		);
	}
}
