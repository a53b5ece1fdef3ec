use std::{path, process};

use clap::Parser;
use glsl_chunks::{Compiler, Config, Options};

/// Expands `#include` chunks in a shader and substitutes its `$variables`.
#[derive(Debug, Parser)]
#[command(name = "glsl_chunks", version, about)]
struct Args {
	/// Shader file to compile.
	entry: path::PathBuf,

	/// JSON configuration file (rootPath, chunkExtension, variableMarkerPrefix).
	#[arg(long)]
	config: Option<path::PathBuf>,

	/// Directory that `#include /...` is anchored at.
	#[arg(long)]
	root: Option<path::PathBuf>,

	/// Extension appended to includes that have none.
	#[arg(long)]
	extension: Option<String>,

	/// Variable marker prefix.
	#[arg(long)]
	prefix: Option<String>,

	/// Variable value, as `name=value`. May be repeated.
	#[arg(long = "set", value_name = "NAME=VALUE")]
	variables: Vec<String>,

	/// Print the template as a JavaScript module instead of evaluating it.
	#[arg(long, conflicts_with = "deps")]
	module: bool,

	/// Print the files the entry depends on, one per line.
	#[arg(long)]
	deps: bool,
}

fn main() {
	env_logger::init();
	let args = Args::parse();
	if let Err(error) = run(args) {
		eprintln!("{}", error.diagnostic());
		process::exit(1);
	}
}

fn run(args: Args) -> glsl_chunks::Result<()> {
	let mut config = match &args.config {
		Some(path) => Config::from_json_file(path)?,
		None => Config::default(),
	};
	if let Some(root) = args.root {
		config = config.with_root_path(root);
	}
	if let Some(extension) = args.extension {
		config = config.with_chunk_extension(extension);
	}
	if let Some(prefix) = args.prefix {
		config = config.with_variable_marker_prefix(prefix);
	}

	let compiler = Compiler::new(config)?;
	let compilation = pollster::block_on(compiler.compile_file(&args.entry))?;

	if args.deps {
		for dependency in &compilation.dependencies {
			println!("{}", dependency.display());
		}
	} else if args.module {
		println!("{}", compiler.emit_module(&compilation.template, None)?);
	} else {
		let mut options = Options::new();
		for variable in &args.variables {
			let (name, value) = variable.split_once('=').ok_or_else(|| {
				glsl_chunks::Error::InvalidVariable(variable.to_string())
			})?;
			options.set(name.trim(), value)?;
		}
		print!("{}", compilation.template.evaluate(&options)?);
	}
	Ok(())
}
