//! Attribute compiler: turns described Rust types into GraphQL selection sets.
//!
//! Types describe themselves through [`GraphqlObject`], usually generated by
//! `#[derive(GraphqlObject)]`. Every field carries a tag in the
//! `"name[,arguments]"` form; the compiler walks the fields in declaration
//! order and emits one selection line per tagged field, descending into
//! nested objects until `max_depth` is reached. Recursive references are cut
//! and reported as `#` comments.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::decode::Timestamp;

/// Default depth at which nested objects stop being expanded.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Handle to a described object type, comparable by type identity.
#[derive(Clone, Copy)]
pub struct TypeRef {
    type_id: fn() -> TypeId,
    name: &'static str,
    fields: fn() -> Vec<FieldDescriptor>,
    implementations: fn() -> Vec<TypeRef>,
}

impl TypeRef {
    /// Reference the described type `T`.
    #[must_use]
    pub fn of<T: GraphqlObject>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            name: T::TYPE_NAME,
            fields: T::fields,
            implementations: T::implementations,
        }
    }

    /// Identity of the referenced type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// GraphQL type name, as used in `... on <name>` fragments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Field descriptors of the referenced type.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldDescriptor> {
        (self.fields)()
    }

    /// Concrete implementations, when the type is a GraphQL interface or union.
    #[must_use]
    pub fn implementations(&self) -> Vec<Self> {
        (self.implementations)()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for TypeRef {}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name).finish()
    }
}

/// How a field's type takes part in a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Scalar-like value selected by name only.
    Leaf,
    /// Object whose own fields are selected in a nested block.
    Object(TypeRef),
}

/// Static description of one struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust identifier of the field.
    pub ident: &'static str,
    /// Tag in the `"name[,arguments|directive]"` form. Empty for untagged fields.
    pub tag: &'static str,
    /// Shape of the field type.
    pub shape: FieldShape,
}

impl FieldDescriptor {
    #[must_use]
    pub const fn new(ident: &'static str, tag: &'static str, shape: FieldShape) -> Self {
        Self { ident, tag, shape }
    }
}

/// A type whose fields map onto a GraphQL object, interface or union.
pub trait GraphqlObject: 'static {
    /// GraphQL type name.
    const TYPE_NAME: &'static str;

    /// Field descriptors, in declaration order.
    fn fields() -> Vec<FieldDescriptor>;

    /// Concrete types implementing this interface. Empty for plain objects.
    fn implementations() -> Vec<TypeRef> {
        Vec::new()
    }
}

/// Resolves the selection shape of a field type.
///
/// Containers forward to their element type, scalars are leaves and derived
/// objects point at their own descriptor.
pub trait GraphqlField {
    fn shape() -> FieldShape;
}

macro_rules! leaf_fields {
    ($($ty:ty),* $(,)?) => {
        $(
            impl GraphqlField for $ty {
                fn shape() -> FieldShape {
                    FieldShape::Leaf
                }
            }
        )*
    };
}

leaf_fields!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    Timestamp,
    serde_json::Value,
    serde_json::Number,
    serde_json::Map<String, serde_json::Value>,
);

impl<K, V, S> GraphqlField for HashMap<K, V, S> {
    fn shape() -> FieldShape {
        FieldShape::Leaf
    }
}

impl<K, V> GraphqlField for BTreeMap<K, V> {
    fn shape() -> FieldShape {
        FieldShape::Leaf
    }
}

macro_rules! forwarding_fields {
    ($($container:ident),* $(,)?) => {
        $(
            impl<T: GraphqlField> GraphqlField for $container<T> {
                fn shape() -> FieldShape {
                    T::shape()
                }
            }
        )*
    };
}

forwarding_fields!(Option, Vec, VecDeque, Box, Rc, Arc, BTreeSet);

impl<T: GraphqlField, S> GraphqlField for HashSet<T, S> {
    fn shape() -> FieldShape {
        T::shape()
    }
}

impl<T: GraphqlField, const N: usize> GraphqlField for [T; N] {
    fn shape() -> FieldShape {
        T::shape()
    }
}

impl<T: GraphqlField> GraphqlField for [T] {
    fn shape() -> FieldShape {
        T::shape()
    }
}

/// Decoding directives that may follow the field name in a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDirective {
    /// Catch-all map receiving unclaimed response keys.
    Remain,
    /// Field may be absent.
    OmitEmpty,
    /// Nested struct decoded in place.
    Squash,
}

impl TagDirective {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "remain" => Some(Self::Remain),
            "omitempty" => Some(Self::OmitEmpty),
            "squash" => Some(Self::Squash),
            _ => None,
        }
    }
}

/// Parsed field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTag<'a> {
    /// Symbolic GraphQL name. Empty or `-` means untagged.
    pub name: &'a str,
    /// Call arguments, e.g. `(first: 10)`.
    pub args: Option<&'a str>,
    /// Trailing decoding directive, never echoed into the selection.
    pub directive: Option<TagDirective>,
}

impl<'a> FieldTag<'a> {
    /// Split `"name,rest"` on the first comma.
    ///
    /// `rest` is the argument list, unless it is a reserved directive. A
    /// directive trailing an argument list is stripped as well.
    #[must_use]
    pub fn parse(tag: &'a str) -> Self {
        let (name, rest) = match tag.split_once(',') {
            Some((name, rest)) => (name.trim(), rest.trim()),
            None => (tag.trim(), ""),
        };

        if let Some(directive) = TagDirective::parse(rest) {
            return Self {
                name,
                args: None,
                directive: Some(directive),
            };
        }

        let (args, directive) = match rest.rsplit_once(',') {
            Some((args, tail)) => match TagDirective::parse(tail) {
                Some(directive) => (args.trim(), Some(directive)),
                None => (rest, None),
            },
            None => (rest, None),
        };

        Self {
            name,
            args: (!args.is_empty()).then_some(args),
            directive,
        }
    }

    /// Whether the field takes no part in selections.
    #[must_use]
    pub fn is_untagged(&self) -> bool {
        self.name.is_empty() || self.name == "-"
    }

    /// Selection line for the field: its name, followed by its arguments.
    #[must_use]
    pub fn selection(&self) -> Option<String> {
        if self.is_untagged() {
            return None;
        }
        Some(match self.args {
            Some(args) => format!("{} {args}", self.name),
            None => self.name.to_string(),
        })
    }
}

/// Options controlling selection compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Depth past which nested objects are dropped.
    pub max_depth: usize,
    /// Emit `#` comments for dropped fields.
    pub comments: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            comments: true,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn with_comments(mut self, comments: bool) -> Self {
        self.comments = comments;
        self
    }
}

/// Compile the selection set of `T` with default options.
#[must_use]
pub fn attributes<T: GraphqlField + ?Sized>() -> String {
    compile_attributes::<T>(CompileOptions::default())
}

/// Compile the selection set of `T`.
///
/// The result has its outer braces removed and is indented with one tab per
/// nesting level. Non-object types yield an empty string.
#[must_use]
pub fn compile_attributes<T: GraphqlField + ?Sized>(options: CompileOptions) -> String {
    let FieldShape::Object(root) = T::shape() else {
        return String::new();
    };

    let mut compiler = AttributeCompiler::new(options);
    let attributes = compiler.compile_type(root, 0);
    let trimmed = attributes
        .trim_matches(|c| c == '{' || c == '}')
        .trim_matches('\n');

    format_attributes(trimmed, 0)
}

/// Re-indent a selection set with one tab per brace depth.
///
/// Existing tabs and double spaces are stripped first. Closing braces never
/// take the depth below zero.
#[must_use]
pub fn format_attributes(attributes: &str, offset: isize) -> String {
    let cleaned = attributes.replace('\t', "").replace("  ", "");
    let mut depth = usize::try_from(offset).unwrap_or(0);
    let mut output = String::with_capacity(cleaned.len());

    for line in cleaned.split('\n') {
        let line = line.trim_matches(|c| c == '\t' || c == ' ');
        if line.ends_with('}') {
            depth = depth.saturating_sub(1);
        }
        output.push_str(&"\t".repeat(depth));
        output.push_str(line);
        output.push('\n');
        if line.ends_with('{') {
            depth += 1;
        }
    }

    output.trim_matches('\n').to_string()
}

#[derive(Debug, Clone)]
enum Visit {
    InProgress,
    Compiled(String),
}

/// Per-invocation compiler state. The memo is never shared between calls.
struct AttributeCompiler {
    options: CompileOptions,
    visited: HashMap<TypeId, Visit>,
}

impl AttributeCompiler {
    fn new(options: CompileOptions) -> Self {
        Self {
            options,
            visited: HashMap::new(),
        }
    }

    fn is_in_progress(&self, ty: TypeRef) -> bool {
        matches!(self.visited.get(&ty.type_id()), Some(Visit::InProgress))
    }

    fn compile_type(&mut self, ty: TypeRef, depth: usize) -> String {
        match self.visited.get(&ty.type_id()) {
            Some(Visit::Compiled(attributes)) => return attributes.clone(),
            Some(Visit::InProgress) => return String::new(),
            None => {}
        }
        self.visited.insert(ty.type_id(), Visit::InProgress);

        let mut fragments = Vec::new();
        let mut comments = Vec::new();
        self.collect_fields(ty, depth, &mut fragments, &mut comments);

        for implementation in ty.implementations() {
            if self.is_in_progress(implementation) {
                self.comment(
                    &mut comments,
                    &format!("... on {}", implementation.name()),
                    implementation,
                    "recursion loop",
                );
                continue;
            }
            let attributes = self.compile_type(implementation, depth + 1);
            if !attributes.is_empty() {
                fragments.push(format!("... on {} {attributes}", implementation.name()));
            }
        }

        if fragments.is_empty() {
            self.visited
                .insert(ty.type_id(), Visit::Compiled(String::new()));
            return String::new();
        }

        let mut lines = Vec::with_capacity(fragments.len() + comments.len() + 2);
        lines.push("{".to_string());
        lines.extend(fragments);
        lines.extend(comments);
        lines.push("}".to_string());
        let attributes = lines.join("\n");

        self.visited
            .insert(ty.type_id(), Visit::Compiled(attributes.clone()));
        attributes
    }

    fn collect_fields(
        &mut self,
        ty: TypeRef,
        depth: usize,
        fragments: &mut Vec<String>,
        comments: &mut Vec<String>,
    ) {
        for field in ty.fields() {
            let tag = FieldTag::parse(field.tag);

            let Some(selection) = tag.selection() else {
                if let (Some(TagDirective::Squash), FieldShape::Object(inner)) =
                    (tag.directive, field.shape)
                {
                    self.splice(inner, depth, fragments, comments);
                }
                continue;
            };

            match field.shape {
                FieldShape::Leaf => fragments.push(selection),
                FieldShape::Object(inner) => {
                    if depth > self.options.max_depth {
                        self.comment(comments, &selection, inner, "maximum depth exceeded");
                    } else if self.is_in_progress(inner) {
                        self.comment(comments, &selection, inner, "recursion loop");
                    } else {
                        let attributes = self.compile_type(inner, depth + 1);
                        if !attributes.is_empty() {
                            fragments.push(format!("{selection} {attributes}"));
                        }
                    }
                }
            }
        }
    }

    /// Inline the fields of a squashed struct at the current depth.
    fn splice(
        &mut self,
        inner: TypeRef,
        depth: usize,
        fragments: &mut Vec<String>,
        comments: &mut Vec<String>,
    ) {
        if self.is_in_progress(inner) {
            return;
        }
        let previous = self.visited.insert(inner.type_id(), Visit::InProgress);
        self.collect_fields(inner, depth, fragments, comments);
        match previous {
            Some(visit) => self.visited.insert(inner.type_id(), visit),
            None => self.visited.remove(&inner.type_id()),
        };
    }

    fn comment(&self, comments: &mut Vec<String>, selection: &str, ty: TypeRef, reason: &str) {
        if self.options.comments {
            comments.push(format!("# Ignored '{selection}' ({}): {reason}", ty.name()));
        }
    }
}
