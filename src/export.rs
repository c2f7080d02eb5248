//! Re-export of definitions reached through `import public`.

use crate::{
    case::to_pascal_case_path,
    descriptor::{DescriptorGraph, FileId, ImportedSymbol, Object},
    error::{Error, ErrorKind},
};

/// Records, for every file, the definitions of the files it imports publicly.
///
/// Only direct public dependencies are followed. Map entry messages are never exported.
pub(crate) fn export_public_imports(graph: &mut DescriptorGraph) -> Result<(), Error> {
    let ids: Vec<FileId> = graph.file_ids().collect();
    for id in ids {
        let mut objects = Vec::new();
        for dependency in public_dependencies(graph, id)? {
            let dependency = graph.file(dependency);
            objects.extend(
                dependency
                    .messages
                    .iter()
                    .filter(|&&message| !graph.message(message).is_map_entry())
                    .map(|&message| Object::Message(message)),
            );
            objects.extend(dependency.enums.iter().map(|&enum_| Object::Enum(enum_)));
            objects.extend(
                dependency
                    .extensions
                    .iter()
                    .map(|&extension| Object::Extension(extension)),
            );
        }

        for object in objects {
            graph.add_imported(ImportedSymbol { file: id, object });
        }
    }
    Ok(())
}

fn public_dependencies(graph: &DescriptorGraph, id: FileId) -> Result<Vec<FileId>, Error> {
    let file = graph.file(id);
    file.proto
        .public_dependency
        .iter()
        .map(|&index| {
            let name = usize::try_from(index)
                .ok()
                .and_then(|index| file.proto.dependency.get(index));
            name.and_then(|name| graph.file_by_name(name))
                .ok_or_else(|| {
                    Error::from_kind(ErrorKind::DependencyNotFound {
                        name: name.cloned().unwrap_or_else(|| format!("#{}", index)),
                        file: file.name().to_owned(),
                    })
                })
        })
        .collect()
}

/// The identifiers an object declares in generated code.
///
/// A message declares its struct, an enum its newtype and one constant per value. Extensions
/// declare nothing.
pub(crate) fn exported_symbols(graph: &DescriptorGraph, object: Object) -> Vec<String> {
    match object {
        Object::Message(id) => vec![to_pascal_case_path(&graph.message(id).type_name)],
        Object::Enum(id) => {
            let enum_ = graph.enumeration(id);
            let mut symbols = vec![to_pascal_case_path(&enum_.type_name)];
            symbols.extend(enum_.constant_names.iter().cloned());
            symbols
        }
        Object::Extension(_) => Vec::new(),
        Object::Imported(id) => exported_symbols(graph, graph.imported(id).object),
    }
}

#[cfg(test)]
mod tests {
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, MessageOptions,
    };

    use super::*;
    use crate::resolve::allocate_constant_names;

    fn base_file() -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("common/base.proto".to_owned()),
            package: Some("common".to_owned()),
            message_type: vec![DescriptorProto {
                name: Some("Page".to_owned()),
                nested_type: vec![DescriptorProto {
                    name: Some("LabelsEntry".to_owned()),
                    options: Some(MessageOptions {
                        map_entry: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            enum_type: vec![EnumDescriptorProto {
                name: Some("Order".to_owned()),
                value: vec![
                    EnumValueDescriptorProto {
                        name: Some("ASC".to_owned()),
                        number: Some(0),
                        ..Default::default()
                    },
                    EnumValueDescriptorProto {
                        name: Some("DESC".to_owned()),
                        number: Some(1),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            extension: vec![FieldDescriptorProto {
                name: Some("page_size".to_owned()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn importer(public: bool) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("api/list.proto".to_owned()),
            package: Some("api".to_owned()),
            dependency: vec!["common/base.proto".to_owned()],
            public_dependency: if public { vec![0] } else { vec![] },
            ..Default::default()
        }
    }

    #[test]
    fn export_public_definitions() {
        let mut graph = DescriptorGraph::wrap(
            vec![base_file(), importer(true)],
            &["api/list.proto".to_owned()],
        )
        .unwrap();
        allocate_constant_names(&mut graph);
        export_public_imports(&mut graph).unwrap();

        let file = graph.files_to_generate()[0];
        let symbols: Vec<Vec<String>> = graph
            .file(file)
            .imported
            .iter()
            .map(|&id| {
                assert_eq!(graph.object_file(Object::Imported(id)), file);
                exported_symbols(&graph, Object::Imported(id))
            })
            .collect();
        assert_eq!(
            symbols,
            [
                vec!["Page"],
                vec!["Order", "ORDER_ASC", "ORDER_DESC"],
                vec![],
            ]
        );
    }

    #[test]
    fn plain_imports_export_nothing() {
        let mut graph = DescriptorGraph::wrap(
            vec![base_file(), importer(false)],
            &["api/list.proto".to_owned()],
        )
        .unwrap();
        export_public_imports(&mut graph).unwrap();

        let file = graph.files_to_generate()[0];
        assert!(graph.file(file).imported.is_empty());
    }

    #[test]
    fn missing_public_dependency() {
        let mut graph = DescriptorGraph::wrap(vec![importer(true)], &["api/list.proto".to_owned()])
            .unwrap();
        let err = export_public_imports(&mut graph).unwrap_err();
        assert!(err.is_resolution());
        assert_eq!(
            err.to_string(),
            "could not find dependency common/base.proto of api/list.proto"
        );
    }
}
