//! Emission of the model and API source files.
//!
//! Each generated `.proto` file produces two Rust modules. Both are written as text into a
//! [`Printer`], then parsed and pretty-printed by [`format_source`](crate::format::format_source).
//!
//! Generated modules expect to live in a module per package that glob re-exports them:
//!
//! ```text
//! mod profile_model;
//! pub use profile_model::*;
//! mod profile_api;
//! pub use profile_api::*;
//! ```
//!
//! Types from the same package are therefore reached through `super::`, and types from other
//! packages through a `use` of the module derived from their import path.

mod api;
mod field;
mod model;

use std::collections::{BTreeMap, HashSet};

use prost_types::{field_descriptor_proto::Type, FieldDescriptorProto};

use crate::{
    annotations::HttpRules,
    case::{is_keyword, to_lower_identifier, to_pascal_case_path},
    config::{Config, PathsMode},
    descriptor::{DescriptorGraph, FileId, Object, FILE_PACKAGE},
    error::Error,
    format::format_source,
    manifest::Manifest,
    resolve::{base_name, dir_name, NameIndex, WELL_KNOWN_IMPORT_PATH},
};

const BANNER: &str = "Code generated by protoc-gen-rain. DO NOT EDIT.";
const DEPRECATION_COMMENT: &str = "Deprecated: Do not use.";

/// A generated output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GeneratedFile {
    pub name: String,
    pub content: String,
}

/// Drives both emission passes over every file selected for generation.
pub(crate) struct Generator<'a> {
    graph: &'a DescriptorGraph,
    index: &'a NameIndex,
    rules: &'a HttpRules,
    config: &'a Config,
    manifest: Manifest,
}

impl<'a> Generator<'a> {
    pub fn new(
        graph: &'a DescriptorGraph,
        index: &'a NameIndex,
        rules: &'a HttpRules,
        config: &'a Config,
    ) -> Self {
        Generator {
            graph,
            index,
            rules,
            config,
            manifest: Manifest::default(),
        }
    }

    /// Generates the model and API files of every file to generate, in request order.
    pub fn generate_all(&mut self) -> Result<Vec<GeneratedFile>, Error> {
        let mut output = Vec::new();
        for &file in self.graph.files_to_generate() {
            let name = self.output_name(file, Pass::Model);
            let source = model::generate(&mut FileContext::new(self, file, Pass::Model))?;
            tracing::debug!(file = %name, "generated model file");
            output.push(GeneratedFile {
                content: format_source(&name, &source)?,
                name,
            });

            let name = self.output_name(file, Pass::Api);
            let (source, services) = api::generate(&mut FileContext::new(self, file, Pass::Api))?;
            let dir = dir_name(&name).to_owned();
            for service in services {
                self.manifest.add(&dir, &service);
            }
            tracing::debug!(file = %name, "generated api file");
            output.push(GeneratedFile {
                content: format_source(&name, &source)?,
                name,
            });
        }
        Ok(output)
    }

    /// The entries to record in `handler.json` for the files generated so far.
    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }

    fn output_name(&self, file: FileId, pass: Pass) -> String {
        let file = self.graph.file(file);
        let base = base_name(file.name());
        let dir = match self.config.params.paths {
            PathsMode::Import => file.package_name.as_str(),
            PathsMode::SourceRelative => dir_name(file.name()),
        };

        match dir {
            "." | "" => format!("{}_{}.rs", base, pass.suffix()),
            dir => format!("{}/{}_{}.rs", dir, base, pass.suffix()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Model,
    Api,
}

impl Pass {
    fn suffix(self) -> &'static str {
        match self {
            Pass::Model => "model",
            Pass::Api => "api",
        }
    }
}

/// Emission state for one output file.
struct FileContext<'g, 'a> {
    gen: &'g Generator<'a>,
    file: FileId,
    pass: Pass,
    imports: Imports,
}

impl<'g, 'a> FileContext<'g, 'a> {
    fn new(gen: &'g Generator<'a>, file: FileId, pass: Pass) -> Self {
        FileContext {
            gen,
            file,
            pass,
            imports: Imports::default(),
        }
    }

    fn graph(&self) -> &'a DescriptorGraph {
        self.gen.graph
    }

    fn import_path(&self) -> &'a str {
        &self.gen.graph.file(self.file).import_path
    }

    /// Resolves a type name from a descriptor, e.g. `.shop.Order`.
    fn lookup(&self, type_name: &str) -> Result<Object, Error> {
        self.gen.index.get(type_name)
    }

    /// The path used to refer to an object from the file being generated.
    fn type_ref(&mut self, object: Object) -> String {
        let graph = self.graph();
        let name = to_pascal_case_path(graph.object_type_name(object));
        let target = graph.object_file(object);

        if target == self.file && self.pass == Pass::Model {
            return name;
        }

        let import_path = &graph.file(target).import_path;
        if import_path == self.import_path() {
            format!("super::{}", name)
        } else {
            let package = self.imports.package(import_path);
            format!("{}::{}", package, name)
        }
    }

    /// The Rust type of a field's element, ignoring its label.
    fn element_type(&mut self, field: &FieldDescriptorProto) -> Result<ElementType, Error> {
        let scalar = match field.r#type() {
            Type::Double => "f64",
            Type::Float => "f32",
            Type::Int64 | Type::Sint64 | Type::Sfixed64 => "i64",
            Type::Uint64 | Type::Fixed64 => "u64",
            Type::Int32 | Type::Sint32 | Type::Sfixed32 => "i32",
            Type::Uint32 | Type::Fixed32 => "u32",
            Type::Bool => "bool",
            Type::String => "String",
            Type::Bytes => "Vec<u8>",
            Type::Enum => {
                let object = self.lookup(field.type_name())?;
                return Ok(ElementType::Enum(self.type_ref(object)));
            }
            Type::Message | Type::Group => {
                if let Some(json) = json_type(field.type_name()) {
                    return Ok(ElementType::Json(json));
                }
                let object = self.lookup(field.type_name())?;
                return Ok(ElementType::Message(self.type_ref(object)));
            }
        };
        Ok(ElementType::Scalar(scalar))
    }

    fn router_path(&self) -> String {
        module_path(&format!("{}/router", self.gen.config.params.repo))
    }

    /// The module path of a package. Well-known types live in the router facade, not under
    /// `import_prefix`.
    fn package_path(&self, import_path: &str) -> String {
        if import_path == WELL_KNOWN_IMPORT_PATH {
            format!("{}::wkt", self.router_path())
        } else {
            let prefix = &self.gen.config.params.import_prefix;
            module_path(&format!("{}{}", prefix, import_path))
        }
    }

    /// Renders the `use` items for the packages referenced during emission.
    fn print_package_imports(&self, printer: &mut Printer) {
        for (import_path, local) in &self.imports.packages {
            let path = self.package_path(import_path);
            if path.rsplit("::").next() == Some(local.as_str()) {
                printer.line(format!("use {};", path));
            } else {
                printer.line(format!("use {} as {};", path, local));
            }
        }
    }

    /// Prints the file banner and the file-level comment as inner doc comments.
    fn print_header(&self, printer: &mut Printer) {
        let file = self.graph().file(self.file);
        printer.inner_doc(BANNER);
        if file.is_deprecated() {
            printer.inner_doc(&format!("{} is a deprecated file.", file.name()));
        } else {
            printer.inner_doc(&format!("source: {}", file.name()));
        }

        if let Some(comment) = file.comment(&FILE_PACKAGE.to_string()) {
            printer.inner_doc("");
            for line in comment_lines(comment) {
                printer.inner_doc(line);
            }
        }
        printer.blank();
    }

    fn comment(&self, path: &str) -> Option<&'a str> {
        self.gen.graph.file(self.file).comment(path)
    }
}

/// The element type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ElementType {
    Scalar(&'static str),
    Enum(String),
    Message(String),
    /// A well-known type represented by a JSON value.
    Json(&'static str),
}

impl ElementType {
    fn as_str(&self) -> &str {
        match self {
            ElementType::Scalar(ty) | ElementType::Json(ty) => ty,
            ElementType::Enum(ty) | ElementType::Message(ty) => ty,
        }
    }
}

/// Well-known types that are represented as free-form JSON.
fn json_type(type_name: &str) -> Option<&'static str> {
    match type_name {
        ".google.protobuf.Any" | ".google.protobuf.Value" => Some("serde_json::Value"),
        ".google.protobuf.Struct" => Some("serde_json::Map<String, serde_json::Value>"),
        ".google.protobuf.ListValue" => Some("Vec<serde_json::Value>"),
        _ => None,
    }
}

/// Converts a slash-separated path such as `crate/api/user` to a module path.
fn module_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .enumerate()
        .map(|(i, segment)| match segment {
            "crate" | "self" | "super" if i == 0 => segment.to_owned(),
            _ => to_lower_identifier(segment),
        })
        .collect();
    segments.join("::")
}

/// Tracks what a generated file needs to import.
#[derive(Debug, Default)]
struct Imports {
    /// Referenced packages, keyed by import path, with the local name allocated for each.
    packages: BTreeMap<String, String>,
    used_names: HashSet<String>,
    serde: bool,
    hash_map: bool,
    is_default: bool,
    binding: bool,
    handlers: bool,
}

impl Imports {
    /// Returns the local name of a package, allocating one on first use.
    fn package(&mut self, import_path: &str) -> String {
        if let Some(name) = self.packages.get(import_path) {
            return name.clone();
        }

        let base = to_lower_identifier(base_name(import_path));
        let mut name = base.clone();
        let mut i = 1;
        while self.used_names.contains(&name) || is_reserved_module(&name) {
            name = format!("{}{}", base, i);
            i += 1;
        }

        self.used_names.insert(name.clone());
        self.packages.insert(import_path.to_owned(), name.clone());
        name
    }
}

fn is_reserved_module(name: &str) -> bool {
    is_keyword(name)
        || matches!(
            name,
            "std" | "core" | "alloc" | "serde" | "serde_json" | "router" | "binding"
        )
}

/// Accumulates generated source text.
#[derive(Debug, Default)]
struct Printer {
    buf: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if !line.is_empty() {
            for _ in 0..self.indent {
                self.buf.push_str("    ");
            }
            self.buf.push_str(line);
        }
        self.buf.push('\n');
    }

    fn blank(&mut self) {
        self.buf.push('\n');
    }

    fn indent(&mut self) {
        self.indent += 1;
    }

    fn outdent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Prints a leading comment from the schema as outer doc comments.
    fn comment(&mut self, comment: Option<&str>, deprecated: bool) {
        if let Some(comment) = comment {
            for line in comment_lines(comment) {
                self.doc(line);
            }
            if deprecated {
                self.doc("");
            }
        }
        if deprecated {
            self.doc(DEPRECATION_COMMENT);
        }
    }

    fn doc(&mut self, line: &str) {
        if line.is_empty() {
            self.line("///");
        } else {
            self.line(format!("/// {}", line));
        }
    }

    fn inner_doc(&mut self, line: &str) {
        if line.is_empty() {
            self.line("//!");
        } else {
            self.line(format!("//! {}", line));
        }
    }

    fn append(&mut self, other: Printer) {
        self.buf.push_str(&other.buf);
    }

    fn finish(self) -> String {
        self.buf
    }
}

/// Splits a schema comment into lines, stripping the indentation that would turn them into code
/// blocks in rustdoc.
fn comment_lines(comment: &str) -> impl Iterator<Item = &str> {
    comment
        .strip_suffix('\n')
        .unwrap_or(comment)
        .split('\n')
        .map(str::trim)
}

/// Escapes a string as a Rust string literal.
fn string_literal(value: &str) -> String {
    format!("{:?}", value)
}
