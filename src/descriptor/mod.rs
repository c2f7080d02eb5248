//! The object graph built from the flat descriptor lists of a plugin request.
//!
//! Files own their messages, enums and extensions through arenas indexed by typed ids. Parent links
//! are plain ids, so the graph has no ownership cycles.

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use prost_types::{
    field_descriptor_proto, DescriptorProto, EnumDescriptorProto, FileDescriptorProto,
};

use crate::error::{Error, ErrorKind};

// Field numbers of the descriptor.proto messages, used to build source-info paths.
pub(crate) const FILE_PACKAGE: i32 = 2;
pub(crate) const FILE_MESSAGE: i32 = 4;
pub(crate) const FILE_ENUM: i32 = 5;
pub(crate) const FILE_SERVICE: i32 = 6;
pub(crate) const MESSAGE_FIELD: i32 = 2;
pub(crate) const MESSAGE_NESTED: i32 = 3;
pub(crate) const MESSAGE_ENUM: i32 = 4;
pub(crate) const MESSAGE_ONEOF: i32 = 8;
pub(crate) const ENUM_VALUE: i32 = 2;
pub(crate) const SERVICE_METHOD: i32 = 2;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub(crate) struct $name(usize);
    };
}

arena_id!(FileId);
arena_id!(MessageId);
arena_id!(EnumId);
arena_id!(ExtensionId);
arena_id!(ImportId);

/// Anything that can be named from another file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Object {
    Message(MessageId),
    Enum(EnumId),
    Extension(ExtensionId),
    Imported(ImportId),
}

#[derive(Debug)]
pub(crate) struct FileDescriptor {
    pub proto: FileDescriptorProto,
    /// Every message in the file, including nested ones, in depth-first declaration order.
    pub messages: Vec<MessageId>,
    /// Every enum in the file. Nested enums are listed here too and are emitted at file scope.
    pub enums: Vec<EnumId>,
    /// Top-level extensions.
    pub extensions: Vec<ExtensionId>,
    /// Symbols re-exported from public dependencies.
    pub imported: Vec<ImportId>,
    /// Leading comments keyed by comma-separated source-info path.
    pub comments: HashMap<String, String>,
    pub import_path: String,
    pub package_name: String,
    pub generate: bool,
}

#[derive(Debug)]
pub(crate) struct MessageDescriptor {
    pub proto: DescriptorProto,
    pub file: FileId,
    pub parent: Option<MessageId>,
    pub nested: Vec<MessageId>,
    pub enums: Vec<EnumId>,
    pub type_name: Vec<String>,
    pub path: String,
    pub group: bool,
}

#[derive(Debug)]
pub(crate) struct EnumDescriptor {
    pub proto: EnumDescriptorProto,
    pub file: FileId,
    pub parent: Option<MessageId>,
    pub type_name: Vec<String>,
    pub path: String,
    /// File-unique constant names, one per value. Assigned during name resolution.
    pub constant_names: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct ExtensionDescriptor {
    pub file: FileId,
    pub type_name: Vec<String>,
}

/// A symbol made visible in `file` by a public import of the file defining `object`.
#[derive(Debug)]
pub(crate) struct ImportedSymbol {
    pub file: FileId,
    pub object: Object,
}

#[derive(Debug, Default)]
pub(crate) struct DescriptorGraph {
    files: Vec<FileDescriptor>,
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
    extensions: Vec<ExtensionDescriptor>,
    imports: Vec<ImportedSymbol>,
    files_by_name: HashMap<String, FileId>,
    generate: Vec<FileId>,
}

impl DescriptorGraph {
    /// Wraps every file of the request and marks the ones named in `file_to_generate`.
    pub fn wrap(
        protos: Vec<FileDescriptorProto>,
        file_to_generate: &[String],
    ) -> Result<Self, Error> {
        if file_to_generate.is_empty() {
            return Err(Error::from_kind(ErrorKind::NoFilesToGenerate));
        }

        let generate: HashSet<&str> = file_to_generate.iter().map(String::as_str).collect();
        let mut graph = DescriptorGraph::default();
        for proto in protos {
            let is_generated = generate.contains(proto.name());
            graph.add_file(proto, is_generated)?;
        }

        for name in file_to_generate {
            match graph.files_by_name.get(name.as_str()) {
                Some(&id) => graph.generate.push(id),
                None => {
                    return Err(Error::from_kind(ErrorKind::FileNotFound { name: name.clone() }))
                }
            }
        }

        Ok(graph)
    }

    fn add_file(&mut self, mut proto: FileDescriptorProto, generate: bool) -> Result<(), Error> {
        let file = FileId(self.files.len());
        let message_types = std::mem::take(&mut proto.message_type);
        let enum_types = std::mem::take(&mut proto.enum_type);

        let mut messages = Vec::new();
        for (index, message) in message_types.into_iter().enumerate() {
            self.wrap_message(&proto, file, message, None, index, &mut messages);
        }
        self.link_nested_messages(&messages)?;

        let mut enums = Vec::new();
        for (index, enum_) in enum_types.into_iter().enumerate() {
            let path = format!("{},{}", FILE_ENUM, index);
            enums.push(self.add_enum(file, enum_, None, path));
        }
        for &message in &messages {
            let nested = self.messages[message.0].proto.enum_type.clone();
            for (index, enum_) in nested.into_iter().enumerate() {
                let path = format!("{},{},{}", self.messages[message.0].path, MESSAGE_ENUM, index);
                enums.push(self.add_enum(file, enum_, Some(message), path));
            }
        }
        self.link_nested_enums(&messages, &enums)?;

        let extensions = proto
            .extension
            .iter()
            .map(|field| {
                let id = ExtensionId(self.extensions.len());
                self.extensions.push(ExtensionDescriptor {
                    file,
                    type_name: vec![field.name().to_owned()],
                });
                id
            })
            .collect();

        let comments = extract_comments(&proto);
        self.files_by_name.insert(proto.name().to_owned(), file);
        self.files.push(FileDescriptor {
            proto,
            messages,
            enums,
            extensions,
            imported: Vec::new(),
            comments,
            import_path: String::new(),
            package_name: String::new(),
            generate,
        });
        Ok(())
    }

    fn wrap_message(
        &mut self,
        file_proto: &FileDescriptorProto,
        file: FileId,
        proto: DescriptorProto,
        parent: Option<MessageId>,
        index: usize,
        messages: &mut Vec<MessageId>,
    ) {
        let (type_name, path) = match parent {
            None => (
                vec![proto.name().to_owned()],
                format!("{},{}", FILE_MESSAGE, index),
            ),
            Some(parent) => {
                let parent = &self.messages[parent.0];
                let mut type_name = parent.type_name.clone();
                type_name.push(proto.name().to_owned());
                let path = format!("{},{},{}", parent.path, MESSAGE_NESTED, index);
                (type_name, path)
            }
        };

        let group = match parent {
            Some(parent) => {
                let full_name = full_name(file_proto.package(), &type_name);
                self.messages[parent.0].proto.field.iter().any(|field| {
                    field.r#type() == field_descriptor_proto::Type::Group
                        && field.type_name() == full_name
                })
            }
            None => false,
        };

        let id = MessageId(self.messages.len());
        let nested = proto.nested_type.clone();
        self.messages.push(MessageDescriptor {
            proto,
            file,
            parent,
            nested: Vec::new(),
            enums: Vec::new(),
            type_name,
            path,
            group,
        });
        messages.push(id);

        for (index, nested) in nested.into_iter().enumerate() {
            self.wrap_message(file_proto, file, nested, Some(id), index, messages);
        }
    }

    fn add_enum(
        &mut self,
        file: FileId,
        proto: EnumDescriptorProto,
        parent: Option<MessageId>,
        path: String,
    ) -> EnumId {
        let mut type_name = match parent {
            Some(parent) => self.messages[parent.0].type_name.clone(),
            None => Vec::new(),
        };
        type_name.push(proto.name().to_owned());

        let id = EnumId(self.enums.len());
        self.enums.push(EnumDescriptor {
            proto,
            file,
            parent,
            type_name,
            path,
            constant_names: Vec::new(),
        });
        id
    }

    fn link_nested_messages(&mut self, messages: &[MessageId]) -> Result<(), Error> {
        for &child in messages {
            if let Some(parent) = self.messages[child.0].parent {
                self.messages[parent.0].nested.push(child);
            }
        }

        for &message in messages {
            let message = &self.messages[message.0];
            if message.nested.len() != message.proto.nested_type.len() {
                return Err(Error::from_kind(ErrorKind::NestingFailure {
                    name: message.proto.name().to_owned(),
                }));
            }
        }
        Ok(())
    }

    fn link_nested_enums(&mut self, messages: &[MessageId], enums: &[EnumId]) -> Result<(), Error> {
        for &enum_ in enums {
            if let Some(parent) = self.enums[enum_.0].parent {
                self.messages[parent.0].enums.push(enum_);
            }
        }

        for &message in messages {
            let message = &self.messages[message.0];
            if message.enums.len() != message.proto.enum_type.len() {
                return Err(Error::from_kind(ErrorKind::EnumNestingFailure {
                    name: message.proto.name().to_owned(),
                }));
            }
        }
        Ok(())
    }

    pub fn file(&self, id: FileId) -> &FileDescriptor {
        &self.files[id.0]
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut FileDescriptor {
        &mut self.files[id.0]
    }

    pub fn message(&self, id: MessageId) -> &MessageDescriptor {
        &self.messages[id.0]
    }

    pub fn enumeration(&self, id: EnumId) -> &EnumDescriptor {
        &self.enums[id.0]
    }

    pub fn enumeration_mut(&mut self, id: EnumId) -> &mut EnumDescriptor {
        &mut self.enums[id.0]
    }

    pub fn imported(&self, id: ImportId) -> &ImportedSymbol {
        &self.imports[id.0]
    }

    pub fn add_imported(&mut self, symbol: ImportedSymbol) -> ImportId {
        let id = ImportId(self.imports.len());
        self.files[symbol.file.0].imported.push(id);
        self.imports.push(symbol);
        id
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> {
        (0..self.files.len()).map(FileId)
    }

    /// The files named in the request's `file_to_generate`, in request order.
    pub fn files_to_generate(&self) -> &[FileId] {
        &self.generate
    }

    pub fn file_by_name(&self, name: &str) -> Option<FileId> {
        self.files_by_name.get(name).copied()
    }

    /// The file an object belongs to. For imported symbols this is the importing file.
    pub fn object_file(&self, object: Object) -> FileId {
        match object {
            Object::Message(id) => self.messages[id.0].file,
            Object::Enum(id) => self.enums[id.0].file,
            Object::Extension(id) => self.extensions[id.0].file,
            Object::Imported(id) => self.imports[id.0].file,
        }
    }

    /// The elements of the dotted type name of an object, without the package.
    pub fn object_type_name(&self, object: Object) -> &[String] {
        match object {
            Object::Message(id) => &self.messages[id.0].type_name,
            Object::Enum(id) => &self.enums[id.0].type_name,
            Object::Extension(id) => &self.extensions[id.0].type_name,
            Object::Imported(id) => self.object_type_name(self.imports[id.0].object),
        }
    }

    /// The fully-qualified name of an object as it appears in descriptors, e.g. `.pkg.Outer.Inner`.
    pub fn object_full_name(&self, object: Object) -> String {
        let package = self.file(self.object_file(object)).proto.package();
        full_name(package, self.object_type_name(object))
    }

    pub fn is_proto3(&self, file: FileId) -> bool {
        self.files[file.0].proto.syntax() == "proto3"
    }
}

impl MessageDescriptor {
    pub fn is_map_entry(&self) -> bool {
        self.proto
            .options
            .as_ref()
            .map_or(false, |options| options.map_entry())
    }

    pub fn is_deprecated(&self) -> bool {
        self.proto
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated())
    }
}

impl EnumDescriptor {
    pub fn is_deprecated(&self) -> bool {
        self.proto
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated())
    }
}

impl FileDescriptor {
    pub fn name(&self) -> &str {
        self.proto.name()
    }

    pub fn is_deprecated(&self) -> bool {
        self.proto
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated())
    }

    pub fn comment(&self, path: &str) -> Option<&str> {
        self.comments.get(path).map(String::as_str)
    }
}

pub(crate) fn full_name<S: AsRef<str>>(package: &str, type_name: &[S]) -> String {
    let mut name = String::from(".");
    if !package.is_empty() {
        name.push_str(package);
        name.push('.');
    }
    for (i, part) in type_name.iter().enumerate() {
        if i > 0 {
            name.push('.');
        }
        name.push_str(part.as_ref());
    }
    name
}

fn extract_comments(proto: &FileDescriptorProto) -> HashMap<String, String> {
    let mut comments = HashMap::new();
    let Some(info) = &proto.source_code_info else {
        return comments;
    };

    for location in &info.location {
        if let Some(comment) = &location.leading_comments {
            let path: Vec<String> = location.path.iter().map(ToString::to_string).collect();
            comments.insert(path.join(","), comment.clone());
        }
    }
    comments
}
