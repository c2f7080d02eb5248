//! The model pass: serde structs, enum newtypes and public import aliases.

use std::collections::{BTreeMap, HashMap, HashSet};

use prost_types::{field_descriptor_proto::Label, FieldDescriptorProto};

use crate::{
    case::{to_pascal_case, to_pascal_case_path, to_snake_case, to_type_name},
    descriptor::{EnumId, MessageId, Object, ENUM_VALUE, MESSAGE_FIELD, MESSAGE_ONEOF},
    directive::Directives,
    error::Error,
    export::exported_symbols,
};

use super::{
    field::{Field, OneofField, OneofMember, SimpleField},
    string_literal, ElementType, FileContext, Printer,
};

const GROUP_COMMENT: &str = "Encoded as a proto2 group.";

pub(super) fn generate(ctx: &mut FileContext<'_, '_>) -> Result<String, Error> {
    let graph = ctx.graph();
    let file = graph.file(ctx.file);

    let mut type_names: HashSet<String> = file
        .messages
        .iter()
        .map(|&message| to_pascal_case_path(&graph.message(message).type_name))
        .chain(
            file.enums
                .iter()
                .map(|&enum_| to_pascal_case_path(&graph.enumeration(enum_).type_name)),
        )
        .collect();

    let mut body = Printer::default();
    print_aliases(ctx, &mut body);
    for &enum_ in &file.enums {
        print_enum(ctx, &mut body, enum_);
    }
    for &message in &file.messages {
        if !graph.message(message).is_map_entry() {
            print_message(ctx, &mut body, message, &mut type_names)?;
        }
    }
    if ctx.imports.is_default {
        body.line("fn is_default<T: Default + PartialEq>(value: &T) -> bool {");
        body.indent();
        body.line("*value == T::default()");
        body.outdent();
        body.line("}");
    }

    let mut printer = Printer::default();
    ctx.print_header(&mut printer);
    if ctx.imports.serde {
        printer.line("use serde::{Deserialize, Serialize};");
    }
    if ctx.imports.hash_map {
        printer.line("use std::collections::HashMap;");
    }
    ctx.print_package_imports(&mut printer);
    printer.blank();
    printer.append(body);
    Ok(printer.finish())
}

/// Re-exports the symbols of publicly imported files that live in another package.
fn print_aliases(ctx: &mut FileContext<'_, '_>, printer: &mut Printer) {
    let graph = ctx.graph();
    let mut printed = false;
    for &id in &graph.file(ctx.file).imported {
        let object = graph.imported(id).object;
        let import_path = &graph.file(graph.object_file(object)).import_path;
        if import_path == ctx.import_path() {
            continue;
        }

        let symbols = exported_symbols(graph, object);
        if symbols.is_empty() {
            continue;
        }
        let package = ctx.imports.package(import_path);
        for symbol in symbols {
            printer.line(format!("pub use {}::{};", package, symbol));
        }
        printed = true;
    }
    if printed {
        printer.blank();
    }
}

fn print_enum(ctx: &mut FileContext<'_, '_>, printer: &mut Printer, id: EnumId) {
    let graph = ctx.graph();
    let enum_ = graph.enumeration(id);
    let name = to_pascal_case_path(&enum_.type_name);
    ctx.imports.serde = true;

    printer.comment(ctx.comment(&enum_.path), enum_.is_deprecated());
    printer.line("#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]");
    printer.line("#[serde(transparent)]");
    printer.line(format!("pub struct {}(pub i32);", name));
    printer.blank();

    for (index, (value, constant)) in enum_
        .proto
        .value
        .iter()
        .zip(&enum_.constant_names)
        .enumerate()
    {
        let deprecated = value
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());
        let path = format!("{},{},{}", enum_.path, ENUM_VALUE, index);
        printer.comment(ctx.comment(&path), deprecated);
        printer.line(format!(
            "pub const {}: {} = {}({});",
            constant,
            name,
            name,
            value.number()
        ));
    }
    printer.blank();

    // Aliased values share a number; the first declaration names it.
    let mut names = BTreeMap::new();
    for value in &enum_.proto.value {
        names.entry(value.number()).or_insert(value.name());
    }

    printer.line(format!("impl {} {{", name));
    printer.indent();
    printer.doc("The name of the value as declared in the schema, if it is known.");
    printer.line("pub fn name(self) -> Option<&'static str> {");
    printer.indent();
    printer.line("match self.0 {");
    printer.indent();
    for (number, value) in names {
        printer.line(format!("{} => Some({}),", number, string_literal(value)));
    }
    printer.line("_ => None,");
    printer.outdent();
    printer.line("}");
    printer.outdent();
    printer.line("}");
    printer.outdent();
    printer.line("}");
    printer.blank();
}

fn print_message(
    ctx: &mut FileContext<'_, '_>,
    printer: &mut Printer,
    id: MessageId,
    type_names: &mut HashSet<String>,
) -> Result<(), Error> {
    let graph = ctx.graph();
    let message = graph.message(id);
    let name = to_pascal_case_path(&message.type_name);
    tracing::trace!(message = %name, "generating struct");
    ctx.imports.serde = true;

    let fields = build_fields(ctx, id, &name, type_names)?;

    printer.comment(ctx.comment(&message.path), message.is_deprecated());
    if message.group {
        printer.doc(GROUP_COMMENT);
    }
    printer.line("#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]");
    printer.line("#[serde(default)]");
    if fields.is_empty() {
        printer.line(format!("pub struct {} {{}}", name));
    } else {
        printer.line(format!("pub struct {} {{", name));
        printer.indent();
        for field in &fields {
            field.decl(printer, &mut ctx.imports);
        }
        printer.outdent();
        printer.line("}");
    }
    printer.blank();

    for field in &fields {
        field.union_decl(printer);
    }

    if fields.iter().any(Field::has_getters) {
        printer.line(format!("impl {} {{", name));
        printer.indent();
        for field in &fields {
            field.getters(printer);
        }
        printer.outdent();
        printer.line("}");
        printer.blank();
    }
    Ok(())
}

fn build_fields(
    ctx: &mut FileContext<'_, '_>,
    id: MessageId,
    struct_name: &str,
    type_names: &mut HashSet<String>,
) -> Result<Vec<Field>, Error> {
    let graph = ctx.graph();
    let message = graph.message(id);
    let proto3 = graph.is_proto3(ctx.file);

    let mut used = HashSet::new();
    let mut fields = Vec::with_capacity(message.proto.field.len());
    let mut oneofs: HashMap<i32, usize> = HashMap::new();

    for (index, field) in message.proto.field.iter().enumerate() {
        let path = format!("{},{},{}", message.path, MESSAGE_FIELD, index);
        let comment = ctx.comment(&path);
        let deprecated = field
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());
        let wire_name = match &field.json_name {
            Some(json_name) => json_name.clone(),
            None => field.name().to_owned(),
        };

        match field.oneof_index {
            Some(oneof_index) if !field.proto3_optional() => {
                let (ty, value_ty) = match ctx.element_type(field)? {
                    ElementType::Message(ty) => (format!("Box<{}>", ty), ty),
                    ty => (ty.as_str().to_owned(), ty.as_str().to_owned()),
                };
                let member = OneofMember {
                    variant: to_type_name(field.name()),
                    getter: allocate(&mut used, format!("get_{}", to_snake_case(field.name()))),
                    ty,
                    value_ty,
                    wire_name,
                    comment: comment.map(ToOwned::to_owned),
                    deprecated,
                };

                if let Some(&slot) = oneofs.get(&oneof_index) {
                    if let Field::Oneof(oneof) = &mut fields[slot] {
                        oneof.members.push(member);
                    }
                    continue;
                }

                let decl = usize::try_from(oneof_index)
                    .ok()
                    .and_then(|index| message.proto.oneof_decl.get(index));
                let oneof_name = decl.map_or("oneof", |decl| decl.name());
                let oneof_comment = usize::try_from(oneof_index).ok().and_then(|index| {
                    ctx.comment(&format!("{},{},{}", message.path, MESSAGE_ONEOF, index))
                });

                let mut enum_name = format!("{}{}", struct_name, to_pascal_case(oneof_name));
                while !type_names.insert(enum_name.clone()) {
                    enum_name.push_str("Oneof");
                }

                oneofs.insert(oneof_index, fields.len());
                fields.push(Field::Oneof(OneofField {
                    name: allocate(&mut used, to_snake_case(oneof_name)),
                    enum_name,
                    comment: oneof_comment.map(ToOwned::to_owned),
                    members: vec![member],
                }));
            }
            _ => {
                let omit_empty = comment.map_or(true, |comment| Directives::parse(comment).omitempty);
                fields.push(Field::Simple(SimpleField {
                    name: allocate(&mut used, to_snake_case(field.name())),
                    ty: field_type(ctx, field, proto3)?,
                    wire_name,
                    omit_empty,
                    comment: comment.map(ToOwned::to_owned),
                    deprecated,
                }));
            }
        }
    }
    Ok(fields)
}

/// The Rust type of a field that is not part of a oneof.
fn field_type(
    ctx: &mut FileContext<'_, '_>,
    field: &FieldDescriptorProto,
    proto3: bool,
) -> Result<String, Error> {
    if let Some(ty) = map_type(ctx, field)? {
        return Ok(ty);
    }

    let element = ctx.element_type(field)?;
    if field.label() == Label::Repeated {
        return Ok(format!("Vec<{}>", element.as_str()));
    }

    Ok(match element {
        ElementType::Message(ty) => format!("Option<Box<{}>>", ty),
        ElementType::Json(ty) => ty.to_owned(),
        ElementType::Scalar("Vec<u8>") => "Vec<u8>".to_owned(),
        ty if !proto3 || field.proto3_optional() => format!("Option<{}>", ty.as_str()),
        ty => ty.as_str().to_owned(),
    })
}

/// The `HashMap` type of a map field, or `None` if the field is not a map.
fn map_type(
    ctx: &mut FileContext<'_, '_>,
    field: &FieldDescriptorProto,
) -> Result<Option<String>, Error> {
    if field.label() != Label::Repeated || field.type_name().is_empty() {
        return Ok(None);
    }

    let Object::Message(entry) = ctx.lookup(field.type_name())? else {
        return Ok(None);
    };
    let entry = ctx.graph().message(entry);
    if !entry.is_map_entry() {
        return Ok(None);
    }

    let (Some(key), Some(value)) = (entry.proto.field.first(), entry.proto.field.get(1)) else {
        return Ok(None);
    };
    let key = ctx.element_type(key)?;
    let value = ctx.element_type(value)?;
    ctx.imports.hash_map = true;
    Ok(Some(format!("HashMap<{}, {}>", key.as_str(), value.as_str())))
}

/// Reserves a name, appending `_` until it is unused.
fn allocate(used: &mut HashSet<String>, mut name: String) -> String {
    while !used.insert(name.clone()) {
        name.push('_');
    }
    name
}
