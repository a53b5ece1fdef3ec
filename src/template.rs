//! Variable markers and the compiled, reusable shader template.

use std::{borrow, collections::HashMap, fmt};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{Error, Result, DEFAULT_VARIABLE_PREFIX};

const IDENTIFIER_PATTERN: &str = "[A-Za-z_][A-Za-z0-9_]*";

/// Name of the checked variable lookup in emitted module source.
const MODULE_LOOKUP: &str = "v";

lazy_static! {
	static ref IDENTIFIER: Regex =
		Regex::new(const_format::concatcp!("^", IDENTIFIER_PATTERN, "$")).unwrap();
	static ref DEFAULT_MARKER: Regex = marker_regex(DEFAULT_VARIABLE_PREFIX);
}

fn marker_regex(prefix: &str) -> Regex {
	// The prefix is escaped, so the pattern is always valid.
	Regex::new(&format!("{}({IDENTIFIER_PATTERN})", regex::escape(prefix))).unwrap()
}

pub fn is_identifier(name: &str) -> bool {
	IDENTIFIER.is_match(name)
}

/// Type for values that can be substituted for a template variable.
/// [`TemplateValue`] is already implemented for scalars and strings.
pub trait TemplateValue {
	/// Returns the value in shader source syntax.
	fn to_glsl(&self) -> String;
}

#[duplicate::duplicate_item(scalar_type; [i8]; [i16]; [i32]; [i64]; [isize]; [u8]; [u16]; [u64]; [usize])]
impl TemplateValue for scalar_type {
	fn to_glsl(&self) -> String {
		self.to_string()
	}
}

impl TemplateValue for u32 {
	fn to_glsl(&self) -> String {
		format!("{self}u")
	}
}

#[duplicate::duplicate_item(float_type; [f32]; [f64])]
impl TemplateValue for float_type {
	fn to_glsl(&self) -> String {
		// Debug formatting always keeps a fractional part or exponent, e.g. `1.0`.
		format!("{self:?}")
	}
}

impl TemplateValue for bool {
	fn to_glsl(&self) -> String {
		self.to_string()
	}
}

#[duplicate::duplicate_item(text_type; [str]; [String]; [borrow::Cow<'_, str>])]
impl TemplateValue for text_type {
	fn to_glsl(&self) -> String {
		self.to_string()
	}
}

impl<T: TemplateValue + ?Sized> TemplateValue for &T {
	fn to_glsl(&self) -> String {
		(**self).to_glsl()
	}
}

/// Scalar types that have a GLSL vector type (`vecN`, `ivecN`, ...).
pub trait VectorElement: TemplateValue {
	const VECTOR_PREFIX: &'static str;
}

#[duplicate::duplicate_item(element_type prefix; [f32] [""]; [i32] ["i"]; [u32] ["u"]; [bool] ["b"])]
impl VectorElement for element_type {
	const VECTOR_PREFIX: &'static str = prefix;
}

#[cfg(any(feature = "array_vectors", feature = "cgmath_vectors"))]
fn vector_definition<T: VectorElement>(components: &[T]) -> String {
	format!(
		"{}vec{}({})",
		T::VECTOR_PREFIX,
		components.len(),
		components
			.iter()
			.map(TemplateValue::to_glsl)
			.collect::<Vec<_>>()
			.join(", ")
	)
}

#[cfg(feature = "array_vectors")]
impl<T: VectorElement, const N: usize> TemplateValue for [T; N] {
	fn to_glsl(&self) -> String {
		vector_definition(self)
	}
}

#[cfg(feature = "cgmath_vectors")]
#[duplicate::duplicate_item(vector_type size; [cgmath::Vector2] [2]; [cgmath::Vector3] [3]; [cgmath::Vector4] [4])]
impl<T: VectorElement> TemplateValue for vector_type<T> {
	fn to_glsl(&self) -> String {
		vector_definition(AsRef::<[T; size]>::as_ref(self))
	}
}

/// Values for a template's variables, keyed by validated identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
	values: HashMap<String, String>,
}

impl Options {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the value of variable `name`, failing if `name` is not an identifier.
	pub fn set(&mut self, name: &str, value: impl TemplateValue) -> Result<&mut Self> {
		if !is_identifier(name) {
			return Err(Error::InvalidVariable(name.to_string()));
		}
		self.values.insert(name.to_string(), value.to_glsl());
		Ok(self)
	}

	/// Calls [`Options::set`] for every (name, value) pair in a given [`HashMap`].
	pub fn set_map<V: TemplateValue>(&mut self, values: &HashMap<&str, V>) -> Result<&mut Self> {
		for (name, value) in values {
			self.set(name, value)?;
		}
		Ok(self)
	}

	/// Used by `#[derive(TemplateOptions)]`, whose field names are identifiers already.
	#[doc(hidden)]
	pub fn insert_field(&mut self, name: &str, value: String) {
		self.values.insert(name.to_string(), value);
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.values.get(name).map(String::as_str)
	}
}

/// Types that provide all values for a template at once.
///
/// Usually derived: `#[derive(TemplateOptions)]` on a struct maps each field to
/// the variable of the same name.
pub trait TemplateOptions {
	fn options(&self) -> borrow::Cow<'_, Options>;
}

impl TemplateOptions for Options {
	fn options(&self) -> borrow::Cow<'_, Options> {
		borrow::Cow::Borrowed(self)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
	Literal(String),
	Variable(String),
}

/// Shader text with its variable markers factored out.
///
/// Immutable once compiled; [`CompiledTemplate::evaluate`] can be called any
/// number of times, from any number of threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledTemplate {
	segments: Vec<Segment>,
	prefix: String,
}

impl CompiledTemplate {
	/// Splits `source` into literal runs and `prefix`-marked variables.
	pub fn compile(source: &str, prefix: &str) -> Self {
		let custom;
		let marker = if prefix == DEFAULT_VARIABLE_PREFIX {
			&*DEFAULT_MARKER
		} else {
			custom = marker_regex(prefix);
			&custom
		};

		let mut segments = Vec::new();
		let mut literal_start = 0;
		for captures in marker.captures_iter(source) {
			let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
				continue;
			};
			if whole.start() > literal_start {
				segments.push(Segment::Literal(source[literal_start..whole.start()].to_string()));
			}
			segments.push(Segment::Variable(name.as_str().to_string()));
			literal_start = whole.end();
		}
		if literal_start < source.len() {
			segments.push(Segment::Literal(source[literal_start..].to_string()));
		}
		log::trace!(
			"compiled template with {} segments, marker prefix `{prefix}`",
			segments.len()
		);

		Self {
			segments,
			prefix: prefix.to_string(),
		}
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Distinct variable names, in order of first appearance.
	pub fn variables(&self) -> Vec<&str> {
		let mut variables: Vec<&str> = Vec::new();
		for segment in &self.segments {
			if let Segment::Variable(name) = segment {
				if !variables.contains(&name.as_str()) {
					variables.push(name);
				}
			}
		}
		variables
	}

	/// Renders the template, substituting every variable from `options`.
	pub fn evaluate(&self, options: &impl TemplateOptions) -> Result<String> {
		self.render(&options.options())
	}

	pub fn render(&self, options: &Options) -> Result<String> {
		let mut output = String::new();
		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => output.push_str(text),
				Segment::Variable(name) => output.push_str(
					options
						.get(name)
						.ok_or_else(|| Error::MissingVariable(name.clone()))?,
				),
			}
		}
		Ok(output)
	}

	/// JavaScript module source exporting the template as `opts => string`.
	///
	/// Like [`CompiledTemplate::evaluate`], the exported function throws an
	/// error naming the first variable missing from `opts`.
	pub fn to_module_source(&self) -> String {
		let mut body = String::new();
		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => {
					for c in text.chars() {
						match c {
							'`' | '\\' => {
								body.push('\\');
								body.push(c);
							}
							'$' => body.push_str("\\$"),
							_ => body.push(c),
						}
					}
				}
				Segment::Variable(name) => body.push_str(&format!("${{{MODULE_LOOKUP}(\"{name}\")}}")),
			}
		}
		format!(
			"module.exports = opts => {{ const {MODULE_LOOKUP} = name => {{ if (!(name in opts)) throw new Error(\"MissingVariable: \" + name); return opts[name]; }}; return `{body}`; }};"
		)
	}
}

/// Reproduces the source the template was compiled from.
impl fmt::Display for CompiledTemplate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => f.write_str(text)?,
				Segment::Variable(name) => write!(f, "{}{name}", self.prefix)?,
			}
		}
		Ok(())
	}
}
