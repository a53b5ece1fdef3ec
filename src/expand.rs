//! Recursive `#include` expansion over a [`SyntaxTree`].

use std::{collections::BTreeSet, path};

use futures::future;

use crate::{
	config::Config,
	resolve::{self, DependencySet, Host},
	syntax::{Chunk, Node, NodePath, ShaderParser, SyntaxTree},
	Error, Result,
};

/// A fully expanded tree and the files that were read to build it.
#[derive(Clone, Debug)]
pub struct Expansion {
	pub tree: SyntaxTree,
	pub dependencies: BTreeSet<path::PathBuf>,
}

/// Replaces every include directive in `tree` with the parsed contents of the
/// file it names, until no include directive is left.
///
/// `source_path` is the file `tree` was parsed from; top-level includes resolve
/// relative to it. Includes found in one pass are loaded concurrently and
/// spliced in document order. Any failure discards the whole expansion.
pub async fn expand<H, P>(
	mut tree: SyntaxTree,
	source_path: &path::Path,
	host: &H,
	parser: &P,
	config: &Config,
) -> Result<Expansion>
where
	H: Host + ?Sized,
	P: ShaderParser + ?Sized,
{
	let dependencies = DependencySet::new();
	let mut pass = 0;

	loop {
		let includes = tree.query(Node::is_include);
		if includes.is_empty() {
			break;
		}
		pass += 1;
		log::debug!(
			"{}: include pass {pass} found {} includes",
			source_path.display(),
			includes.len()
		);

		let loads = includes.into_iter().map(|node_path| {
			let (specifier, chain) = include_site(&tree, &node_path, source_path);
			let dependencies = &dependencies;
			async move {
				let chunk = load_chunk(&specifier, chain, host, parser, config, dependencies).await?;
				Ok::<_, Error>((node_path, chunk))
			}
		});
		let chunks = future::try_join_all(loads).await?;

		// `try_join_all` yields results in input order, which is document order.
		for (node_path, chunk) in chunks {
			tree.replace(&node_path, Node::Chunk(chunk));
		}
	}

	Ok(Expansion {
		tree,
		dependencies: dependencies.into_paths(),
	})
}

/// Specifier of the include at `node_path`, and the chain of files being
/// expanded around it (root file first, issuing file last).
fn include_site(
	tree: &SyntaxTree,
	node_path: &NodePath,
	source_path: &path::Path,
) -> (String, Vec<path::PathBuf>) {
	let specifier = match tree.get(node_path) {
		Some(Node::Directive(directive)) => directive.value.clone(),
		_ => String::new(),
	};
	let chain = std::iter::once(source_path)
		.chain(tree.ancestry(node_path))
		.map(resolve::normalize)
		.collect();
	(specifier, chain)
}

async fn load_chunk<H, P>(
	specifier: &str,
	mut chain: Vec<path::PathBuf>,
	host: &H,
	parser: &P,
	config: &Config,
	dependencies: &DependencySet,
) -> Result<Chunk>
where
	H: Host + ?Sized,
	P: ShaderParser + ?Sized,
{
	let issuer = chain.last().cloned().unwrap_or_default();
	let path = resolve::resolve(host, specifier, &issuer, config).await?;

	if chain.contains(&path) {
		chain.push(path);
		return Err(Error::CyclicInclude { cycle: chain });
	}

	dependencies.insert(&path);
	let source = host.read(&path).await.map_err(|source| Error::Read {
		path: path.clone(),
		source,
	})?;
	log::debug!(
		"included {} from {} ({} bytes)",
		path.display(),
		issuer.display(),
		source.len()
	);

	let tree = parser
		.parse(&source)
		.map_err(|error| Error::syntax(error, Some(&path), &source))?;
	Ok(Chunk { path, tree })
}
