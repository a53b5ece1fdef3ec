//! Syntax tree shared by all parsers, and the default directive-aware parser.
//!
//! The tree is deliberately shallow: runs of shader text, preprocessor
//! directives, and chunks (subtrees spliced in from other files). That is all
//! the include expander needs to see, and it lets [`SyntaxTree`] serialize back
//! to exactly the text it was parsed from.

use std::{fmt, path};

use crate::{
	error::{Position, SourceRange, SyntaxError},
	DIRECTIVE_PREFIX, INCLUDE_DIRECTIVE,
};

/// Parser capability used by the compiler.
///
/// Implementations turn shader text into a [`SyntaxTree`] and back. The default
/// implementation is [`ChunkParser`]; hosts with their own grammar engine can
/// supply another one.
pub trait ShaderParser: Send + Sync {
	fn parse(&self, source: &str) -> Result<SyntaxTree, SyntaxError>;

	fn serialize(&self, tree: &SyntaxTree) -> String {
		tree.to_string()
	}
}

/// A preprocessor directive, e.g. `#include utils;` or `#define PI 3.14`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Directive {
	/// Directive name without the prefix, e.g. `include`.
	pub name: String,
	/// Argument text following the name, trimmed and without trailing comments.
	pub value: String,
	/// Exact source text of the directive, used for serialization.
	pub raw: String,
	pub location: SourceRange,
}

impl Directive {
	pub fn is_include(&self) -> bool {
		self.name == INCLUDE_DIRECTIVE
	}
}

/// Subtree spliced in place of an include directive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chunk {
	/// Absolute path of the file the subtree was parsed from.
	pub path: path::PathBuf,
	pub tree: SyntaxTree,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
	Text(String),
	Directive(Directive),
	Chunk(Chunk),
}

impl Node {
	pub fn is_include(&self) -> bool {
		matches!(self, Node::Directive(directive) if directive.is_include())
	}
}

/// Positional handle to a node: the child index at each level, outermost first.
///
/// Two textually identical nodes always have distinct paths.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodePath(Vec<usize>);

impl NodePath {
	pub fn indices(&self) -> &[usize] {
		&self.0
	}

	fn child(&self, index: usize) -> Self {
		let mut indices = self.0.clone();
		indices.push(index);
		Self(indices)
	}
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SyntaxTree {
	pub nodes: Vec<Node>,
}

impl SyntaxTree {
	pub fn new(nodes: Vec<Node>) -> Self {
		Self { nodes }
	}

	/// Returns the paths of every node matching `predicate`, in document order,
	/// descending into spliced chunks.
	pub fn query(&self, predicate: impl Fn(&Node) -> bool) -> Vec<NodePath> {
		let mut found = Vec::new();
		self.collect(&NodePath::default(), &predicate, &mut found);
		found
	}

	fn collect(&self, prefix: &NodePath, predicate: &dyn Fn(&Node) -> bool, found: &mut Vec<NodePath>) {
		for (index, node) in self.nodes.iter().enumerate() {
			let path = prefix.child(index);
			if predicate(node) {
				found.push(path.clone());
			}
			if let Node::Chunk(chunk) = node {
				chunk.tree.collect(&path, predicate, found);
			}
		}
	}

	pub fn get(&self, path: &NodePath) -> Option<&Node> {
		let (last, parents) = path.indices().split_last()?;
		let mut tree = self;
		for &index in parents {
			match tree.nodes.get(index)? {
				Node::Chunk(chunk) => tree = &chunk.tree,
				_ => return None,
			}
		}
		tree.nodes.get(*last)
	}

	/// Replaces the node at `path`, returning the previous node.
	///
	/// Replacement is one-for-one, so every other path into the tree stays valid.
	pub fn replace(&mut self, path: &NodePath, replacement: Node) -> Option<Node> {
		let (last, parents) = path.indices().split_last()?;
		let mut tree = self;
		for &index in parents {
			match tree.nodes.get_mut(index)? {
				Node::Chunk(chunk) => tree = &mut chunk.tree,
				_ => return None,
			}
		}
		let slot = tree.nodes.get_mut(*last)?;
		Some(std::mem::replace(slot, replacement))
	}

	/// Paths of the files whose chunks enclose the node at `path`, outermost first.
	pub fn ancestry(&self, path: &NodePath) -> Vec<&path::Path> {
		let mut ancestry = Vec::new();
		let mut tree = self;
		for &index in path.indices() {
			match tree.nodes.get(index) {
				Some(Node::Chunk(chunk)) => {
					ancestry.push(chunk.path.as_path());
					tree = &chunk.tree;
				}
				_ => break,
			}
		}
		ancestry
	}
}

impl fmt::Display for SyntaxTree {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for node in &self.nodes {
			match node {
				Node::Text(text) => f.write_str(text)?,
				Node::Directive(directive) => f.write_str(&directive.raw)?,
				Node::Chunk(chunk) => fmt::Display::fmt(&chunk.tree, f)?,
			}
		}
		Ok(())
	}
}

/// Default parser for C-like shading languages.
///
/// Recognizes line and block comments, preprocessor directives at the start of
/// a line (with `\` line continuations), and checks that brackets balance.
/// Everything else is kept verbatim as text.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkParser;

impl ShaderParser for ChunkParser {
	fn parse(&self, source: &str) -> Result<SyntaxTree, SyntaxError> {
		Scanner::new(source).scan()
	}
}

struct Scanner<'a> {
	source: &'a str,
	offset: usize,
	position: Position,
	line_start: bool,
	brackets: Vec<(char, Position)>,
	/// Bracket stack at the opening of each enclosing `#if*` conditional.
	conditionals: Vec<Vec<(char, Position)>>,
	text_start: usize,
	nodes: Vec<Node>,
}

impl<'a> Scanner<'a> {
	fn new(source: &'a str) -> Self {
		Self {
			source,
			offset: 0,
			position: Position::new(1, 1),
			line_start: true,
			brackets: Vec::new(),
			conditionals: Vec::new(),
			text_start: 0,
			nodes: Vec::new(),
		}
	}

	fn peek(&self) -> Option<char> {
		self.source[self.offset..].chars().next()
	}

	fn peek_second(&self) -> Option<char> {
		self.source[self.offset..].chars().nth(1)
	}

	fn bump(&mut self) -> Option<char> {
		let c = self.peek()?;
		self.offset += c.len_utf8();
		if c == '\n' {
			self.position = Position::new(self.position.line + 1, 1);
		} else {
			self.position.column += 1;
		}
		Some(c)
	}

	fn scan(mut self) -> Result<SyntaxTree, SyntaxError> {
		while let Some(c) = self.peek() {
			match c {
				'/' if self.peek_second() == Some('/') => self.skip_line_comment(),
				'/' if self.peek_second() == Some('*') => self.skip_block_comment()?,
				c if c == DIRECTIVE_PREFIX && self.line_start => self.directive()?,
				'\n' => {
					self.bump();
					self.line_start = true;
				}
				c if c.is_whitespace() => {
					self.bump();
				}
				'{' | '(' | '[' => {
					self.brackets.push((c, self.position));
					self.bump();
					self.line_start = false;
				}
				'}' | ')' | ']' => {
					self.close_bracket(c)?;
					self.line_start = false;
				}
				_ => {
					self.bump();
					self.line_start = false;
				}
			}
		}

		if let Some(&(open, position)) = self.brackets.last() {
			return Err(SyntaxError::new(
				format!("unclosed `{open}`"),
				SourceRange::new(position, Position::new(position.line, position.column + 1)),
			));
		}

		self.flush_text(self.offset);
		Ok(SyntaxTree::new(self.nodes))
	}

	fn close_bracket(&mut self, close: char) -> Result<(), SyntaxError> {
		let start = self.position;
		self.bump();
		let expected = match self.brackets.pop() {
			Some(('{', _)) => '}',
			Some(('(', _)) => ')',
			Some(('[', _)) => ']',
			_ => {
				return Err(SyntaxError::new(
					format!("unexpected `{close}`"),
					SourceRange::new(start, self.position),
				))
			}
		};
		if close != expected {
			return Err(SyntaxError::new(
				format!("expected `{expected}`, found `{close}`"),
				SourceRange::new(start, self.position),
			));
		}
		Ok(())
	}

	fn skip_line_comment(&mut self) {
		while let Some(c) = self.peek() {
			if c == '\n' {
				break;
			}
			self.bump();
		}
	}

	fn skip_block_comment(&mut self) -> Result<(), SyntaxError> {
		let start = self.position;
		self.bump();
		self.bump();
		loop {
			match self.bump() {
				Some('*') if self.peek() == Some('/') => {
					self.bump();
					return Ok(());
				}
				Some(_) => {}
				None => {
					return Err(SyntaxError::new(
						"unterminated block comment",
						SourceRange::new(start, self.position),
					))
				}
			}
		}
	}

	fn directive(&mut self) -> Result<(), SyntaxError> {
		let source = self.source;
		let begin = self.offset;
		let start = self.position;
		self.bump();

		// Logical line, honouring `\` continuations.
		while let Some(c) = self.peek() {
			if c == '\n' {
				break;
			}
			if c == '\\' && matches!(self.peek_second(), Some('\n')) {
				self.bump();
			}
			self.bump();
		}
		let raw = &source[begin..self.offset];
		let body = raw[DIRECTIVE_PREFIX.len_utf8()..].replace("\\\n", " ");
		let body = body.trim_start();

		let name_length = body
			.find(|c: char| !(c.is_alphanumeric() || c == '_'))
			.unwrap_or(body.len());
		let (name, rest) = body.split_at(name_length);
		let location = SourceRange::new(start, self.position);
		let value = strip_comment(rest).trim().trim_end_matches(';').trim_end();
		// A lone `#` is the null directive.
		if name.is_empty() && !value.is_empty() {
			return Err(SyntaxError::new("expected a directive name", location));
		}
		if name == INCLUDE_DIRECTIVE && value.is_empty() {
			return Err(SyntaxError::new("expected a path after `#include`", location));
		}

		// Every branch of a conditional starts from the brackets open before it.
		match name {
			"if" | "ifdef" | "ifndef" => self.conditionals.push(self.brackets.clone()),
			"elif" | "else" => {
				if let Some(opening) = self.conditionals.last() {
					self.brackets = opening.clone();
				}
			}
			"endif" => {
				self.conditionals.pop();
			}
			_ => {}
		}

		self.flush_text(begin);
		self.nodes.push(Node::Directive(Directive {
			name: name.to_string(),
			value: value.to_string(),
			raw: raw.to_string(),
			location,
		}));
		self.text_start = self.offset;
		Ok(())
	}

	fn flush_text(&mut self, end: usize) {
		if end > self.text_start {
			self.nodes
				.push(Node::Text(self.source[self.text_start..end].to_string()));
		}
	}
}

/// Cuts a trailing comment off a directive value. A leading `"…"` or `<…>`
/// span is skipped, so `#include "a//b.glsl"` keeps its path.
fn strip_comment(value: &str) -> &str {
	let value = value.trim_start();
	let delimited = match value.chars().next() {
		Some('"') => value[1..].find('"'),
		Some('<') => value[1..].find('>'),
		_ => None,
	};
	let from = delimited.map_or(0, |close| close + 2);
	let tail = &value[from..];
	match [tail.find("//"), tail.find("/*")].into_iter().flatten().min() {
		Some(index) => &value[..from + index],
		None => value,
	}
}
