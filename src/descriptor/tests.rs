use prost_types::{
    field_descriptor_proto::{Label, Type},
    source_code_info::Location,
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, SourceCodeInfo,
};

use super::*;

fn message(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_owned()),
        ..Default::default()
    }
}

fn enumeration(name: &str, values: &[&str]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_owned()),
        value: values
            .iter()
            .enumerate()
            .map(|(number, value)| EnumValueDescriptorProto {
                name: Some((*value).to_owned()),
                number: Some(number as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn file(name: &str, package: &str) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_owned()),
        package: Some(package.to_owned()),
        syntax: Some("proto3".to_owned()),
        ..Default::default()
    }
}

fn nested_file() -> FileDescriptorProto {
    let mut inner = message("Inner");
    inner.enum_type.push(enumeration("Kind", &["KIND_UNKNOWN", "KIND_A"]));

    let mut outer = message("Outer");
    outer.nested_type.push(inner);
    outer.nested_type.push(message("Other"));

    let mut file = file("shop/order.proto", "shop");
    file.message_type.push(message("First"));
    file.message_type.push(outer);
    file.enum_type.push(enumeration("Status", &["ACTIVE"]));
    file
}

#[test]
fn wrap_nested_messages() {
    let graph = DescriptorGraph::wrap(vec![nested_file()], &["shop/order.proto".to_owned()])
        .unwrap();
    let file = graph.file(graph.files_to_generate()[0]);
    assert!(file.generate);

    let names: Vec<(String, String)> = file
        .messages
        .iter()
        .map(|&id| {
            let message = graph.message(id);
            (message.type_name.join("."), message.path.clone())
        })
        .collect();
    assert_eq!(
        names,
        [
            ("First".to_owned(), "4,0".to_owned()),
            ("Outer".to_owned(), "4,1".to_owned()),
            ("Outer.Inner".to_owned(), "4,1,3,0".to_owned()),
            ("Outer.Other".to_owned(), "4,1,3,1".to_owned()),
        ]
    );

    let outer = graph.message(file.messages[1]);
    assert_eq!(outer.nested, vec![file.messages[2], file.messages[3]]);
    assert_eq!(graph.message(file.messages[2]).parent, Some(file.messages[1]));
}

#[test]
fn nested_enums_keep_their_parent() {
    let graph = DescriptorGraph::wrap(vec![nested_file()], &["shop/order.proto".to_owned()])
        .unwrap();
    let file = graph.file(graph.files_to_generate()[0]);
    assert_eq!(file.enums.len(), 2);

    let status = graph.enumeration(file.enums[0]);
    assert_eq!(status.parent, None);
    assert_eq!(status.path, "5,0");

    let kind = graph.enumeration(file.enums[1]);
    let inner = file.messages[2];
    assert_eq!(kind.parent, Some(inner));
    assert_eq!(kind.path, "4,1,3,0,4,0");
    assert_eq!(
        graph.object_full_name(Object::Enum(file.enums[1])),
        ".shop.Outer.Inner.Kind"
    );
    assert_eq!(graph.message(inner).enums, vec![file.enums[1]]);
}

#[test]
fn detect_group_messages() {
    let mut outer = message("Outer");
    outer.nested_type.push(message("Result"));
    outer.field.push(FieldDescriptorProto {
        name: Some("result".to_owned()),
        number: Some(1),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::Group as i32),
        type_name: Some(".legacy.Outer.Result".to_owned()),
        ..Default::default()
    });
    outer.nested_type.push(message("Plain"));

    let mut file = file("legacy.proto", "legacy");
    file.syntax = Some("proto2".to_owned());
    file.message_type.push(outer);

    let graph = DescriptorGraph::wrap(vec![file], &["legacy.proto".to_owned()]).unwrap();
    let id = graph.files_to_generate()[0];
    let messages = &graph.file(id).messages;
    assert!(!graph.message(messages[0]).group);
    assert!(graph.message(messages[1]).group);
    assert!(!graph.message(messages[2]).group);
    assert!(!graph.is_proto3(id));
}

#[test]
fn leading_comments_only() {
    let mut file = nested_file();
    file.source_code_info = Some(SourceCodeInfo {
        location: vec![
            Location {
                path: vec![4, 1],
                leading_comments: Some(" An outer message.\n".to_owned()),
                ..Default::default()
            },
            Location {
                path: vec![4, 0],
                trailing_comments: Some(" trailing\n".to_owned()),
                ..Default::default()
            },
            Location {
                path: vec![2],
                leading_comments: Some(" Shop package.\n".to_owned()),
                ..Default::default()
            },
        ],
    });

    let graph = DescriptorGraph::wrap(vec![file], &["shop/order.proto".to_owned()]).unwrap();
    let file = graph.file(graph.files_to_generate()[0]);
    assert_eq!(file.comments.len(), 2);
    assert_eq!(file.comment("4,1"), Some(" An outer message.\n"));
    assert_eq!(file.comment("2"), Some(" Shop package.\n"));
    assert_eq!(file.comment("4,0"), None);
}

#[test]
fn missing_file_to_generate() {
    let err = DescriptorGraph::wrap(vec![nested_file()], &["missing.proto".to_owned()])
        .unwrap_err();
    assert!(err.is_resolution());
    assert_eq!(err.to_string(), "could not find file named missing.proto");
}

#[test]
fn no_files_to_generate() {
    let err = DescriptorGraph::wrap(vec![nested_file()], &[]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NoFilesToGenerate));
}

#[test]
fn full_names() {
    assert_eq!(full_name("", &["Root"]), ".Root");
    assert_eq!(full_name("a.b", &["Outer", "Inner"]), ".a.b.Outer.Inner");
}
