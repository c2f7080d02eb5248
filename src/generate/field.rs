use crate::case::sanitize_identifier;

use super::{string_literal, Imports, Printer};

/// A field of a generated struct.
#[derive(Debug)]
pub(super) enum Field {
    Simple(SimpleField),
    /// A oneof, stored as a single optional enum flattened into the struct.
    Oneof(OneofField),
}

#[derive(Debug)]
pub(super) struct SimpleField {
    pub name: String,
    pub ty: String,
    pub wire_name: String,
    pub omit_empty: bool,
    pub comment: Option<String>,
    pub deprecated: bool,
}

#[derive(Debug)]
pub(super) struct OneofField {
    pub name: String,
    pub enum_name: String,
    pub comment: Option<String>,
    pub members: Vec<OneofMember>,
}

#[derive(Debug)]
pub(super) struct OneofMember {
    pub variant: String,
    pub getter: String,
    /// The payload type of the enum variant.
    pub ty: String,
    /// The type a getter returns a reference to.
    pub value_ty: String,
    pub wire_name: String,
    pub comment: Option<String>,
    pub deprecated: bool,
}

impl Field {
    /// Prints the struct field declaration.
    pub fn decl(&self, printer: &mut Printer, imports: &mut Imports) {
        match self {
            Field::Simple(field) => {
                printer.comment(field.comment.as_deref(), field.deprecated);
                if field.omit_empty {
                    imports.is_default = true;
                    printer.line(format!(
                        "#[serde(rename = {}, skip_serializing_if = \"is_default\")]",
                        string_literal(&field.wire_name)
                    ));
                } else {
                    printer.line(format!(
                        "#[serde(rename = {})]",
                        string_literal(&field.wire_name)
                    ));
                }
                printer.line(format!(
                    "pub {}: {},",
                    sanitize_identifier(field.name.clone()),
                    field.ty
                ));
            }
            Field::Oneof(oneof) => {
                printer.comment(oneof.comment.as_deref(), false);
                printer.line("#[serde(flatten)]");
                printer.line(format!(
                    "pub {}: Option<{}>,",
                    sanitize_identifier(oneof.name.clone()),
                    oneof.enum_name
                ));
            }
        }
    }

    /// Prints the enum holding the members of a oneof. Simple fields print nothing.
    pub fn union_decl(&self, printer: &mut Printer) {
        let Field::Oneof(oneof) = self else {
            return;
        };

        printer.line("#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]");
        printer.line(format!("pub enum {} {{", oneof.enum_name));
        printer.indent();
        for member in &oneof.members {
            printer.comment(member.comment.as_deref(), member.deprecated);
            printer.line(format!("#[serde(rename = {})]", string_literal(&member.wire_name)));
            printer.line(format!("{}({}),", member.variant, member.ty));
        }
        printer.outdent();
        printer.line("}");
        printer.blank();
    }

    /// Prints the accessor methods of a field. Only oneof members have accessors.
    pub fn getters(&self, printer: &mut Printer) {
        let Field::Oneof(oneof) = self else {
            return;
        };

        let field = sanitize_identifier(oneof.name.clone());
        for member in &oneof.members {
            printer.line(format!(
                "pub fn {}(&self) -> Option<&{}> {{",
                member.getter, member.value_ty
            ));
            printer.indent();
            printer.line(format!("match &self.{} {{", field));
            printer.indent();
            printer.line(format!(
                "Some({}::{}(value)) => Some(value),",
                oneof.enum_name, member.variant
            ));
            printer.line("_ => None,");
            printer.outdent();
            printer.line("}");
            printer.outdent();
            printer.line("}");
        }
    }

    pub fn has_getters(&self) -> bool {
        matches!(self, Field::Oneof(_))
    }
}
