//! Resolves `#include` chunks in GLSL sources and compiles `$variable` markers
//! into reusable templates.
//!
//! ```no_run
//! use glsl_chunks::{Compiler, Config, Options};
//!
//! # fn main() -> glsl_chunks::Result<()> {
//! let compiler = Compiler::new(Config::default().with_root_path("shaders"))?;
//! let compilation = pollster::block_on(compiler.compile_file("shaders/water.frag"))?;
//!
//! let mut options = Options::new();
//! options.set("color", "vec4(0.0, 0.3, 0.8, 1.0)")?;
//! let source = compilation.template.evaluate(&options)?;
//! # Ok(())
//! # }
//! ```

extern crate self as glsl_chunks;

pub mod compiler;
pub mod config;
pub mod error;
pub mod expand;
pub mod resolve;
pub mod syntax;
pub mod template;

pub use compiler::{Compilation, Compiler, Downlevel};
pub use config::Config;
pub use error::{Diagnostic, Error, ErrorKind, Result, SyntaxError};
pub use glsl_chunks_derive::TemplateOptions;
pub use resolve::{DependencySet, FsHost, Host, MemoryHost};
pub use syntax::{ChunkParser, ShaderParser, SyntaxTree};
pub use template::{CompiledTemplate, Options, Segment, TemplateOptions, TemplateValue};

pub const DIRECTIVE_PREFIX: char = '#';
pub const INCLUDE_DIRECTIVE: &str = "include";
pub const INCLUDE_INSTRUCTION: &str = const_format::concatcp!(DIRECTIVE_PREFIX, INCLUDE_DIRECTIVE);
pub const DEFAULT_CHUNK_EXTENSION: &str = "glsl";
pub const DEFAULT_VARIABLE_PREFIX: &str = "$";

#[cfg(test)]
mod tests {
	use crate::{Compilation, Compiler, Config, Error, ErrorKind, Options, TemplateOptions};
	use std::collections::{BTreeSet, HashMap};

	fn compile(path: &str) -> glsl_chunks::Result<Compilation> {
		let config = Config::default().with_root_path("test_shaders");
		pollster::block_on(Compiler::new(config)?.compile_file(path))
	}

	fn source(path: &str) -> String {
		compile(path).unwrap().template.to_string()
	}

	#[test]
	fn nonexistent() {
		assert_eq!(
			compile("test_shaders/nonexistent.glsl").err().unwrap().kind(),
			ErrorKind::Read
		);
	}

	#[test]
	fn standard_include() {
		assert_eq!(
			source("test_shaders/includer.glsl"),
			source("test_shaders/included.glsl")
		);
	}

	#[test]
	fn missing_include() {
		assert_eq!(
			compile("test_shaders/missing_include.glsl").err().unwrap().kind(),
			ErrorKind::NotFound
		);
	}

	#[test]
	fn nested_include() {
		assert_eq!(
			source("test_shaders/nested_include.glsl"),
			source("test_shaders/includer.glsl")
		);
		let dependencies = compile("test_shaders/nested_include.glsl").unwrap().dependencies;
		let shaders = std::env::current_dir().unwrap().join("test_shaders");
		assert!(dependencies.iter().all(|dependency| dependency.is_absolute()));
		assert_eq!(
			dependencies,
			[shaders.join("included.glsl"), shaders.join("includer.glsl")]
				.into_iter()
				.collect::<BTreeSet<_>>()
		);
	}

	#[test]
	fn multiple_includes() {
		assert_eq!(
			source("test_shaders/multiple_includes.glsl"),
			format!(
				"{}\n{}",
				source("test_shaders/included.glsl"),
				source("test_shaders/included2.glsl")
			)
		);
	}

	#[test]
	fn rooted_include() {
		assert_eq!(
			source("test_shaders/lib/rooted_include.glsl"),
			source("test_shaders/included.glsl")
		);
	}

	#[test]
	fn cyclic_include() {
		let shaders = std::env::current_dir().unwrap().join("test_shaders");
		match compile("test_shaders/cycle_a.glsl") {
			Err(Error::CyclicInclude { cycle }) => assert_eq!(
				cycle,
				[
					shaders.join("cycle_a.glsl"),
					shaders.join("cycle_b.glsl"),
					shaders.join("cycle_a.glsl")
				]
			),
			other => panic!("expected CyclicInclude, got {other:?}"),
		}
	}

	#[test]
	fn put_variables() {
		let template = compile("test_shaders/set_variables.glsl").unwrap().template;
		let mut options = Options::new();
		options.set("ONE", 1u32).unwrap().set("TWO", 2u32).unwrap();
		assert_eq!(
			template.evaluate(&options).unwrap(),
			source("test_shaders/set_variables_processed.glsl")
		);
	}

	#[test]
	fn put_variable_map() {
		let mut values = HashMap::new();
		values.insert("ONE", 1u32);
		values.insert("TWO", 2u32);
		let mut options = Options::new();
		options.set_map(&values).unwrap();
		assert_eq!(
			compile("test_shaders/set_variables.glsl")
				.unwrap()
				.template
				.evaluate(&options)
				.unwrap(),
			source("test_shaders/set_variables_processed.glsl")
		);
	}

	#[test]
	fn put_derived_variables() {
		#[allow(non_snake_case)]
		#[derive(TemplateOptions)]
		struct Constants {
			ONE: u32,
			TWO: u32,
		}
		assert_eq!(
			compile("test_shaders/set_variables.glsl")
				.unwrap()
				.template
				.evaluate(&Constants { ONE: 1, TWO: 2 })
				.unwrap(),
			source("test_shaders/set_variables_processed.glsl")
		);
	}

	#[test]
	fn missing_variable() {
		let template = compile("test_shaders/set_variables.glsl").unwrap().template;
		let mut options = Options::new();
		options.set("ONE", 1u32).unwrap();
		assert_eq!(
			template.evaluate(&options).err().unwrap().kind(),
			ErrorKind::MissingVariable
		);
	}
}
