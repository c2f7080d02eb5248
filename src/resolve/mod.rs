//! Assigns output identities to files and names to generated symbols.

mod names;

pub(crate) use self::names::NameIndex;

use std::collections::{HashMap, HashSet};

use crate::{
    case::{to_lower_identifier, to_pascal_case, to_pascal_case_path, to_screaming_snake_case},
    config::Parameters,
    descriptor::{DescriptorGraph, FileDescriptor, FileId},
    error::{Error, ErrorKind},
};

/// Import path used for the well-known types unless an `M` parameter says otherwise.
pub(crate) const WELL_KNOWN_IMPORT_PATH: &str = "router/wkt";

const WELL_KNOWN_PREFIX: &str = "google/protobuf/";

/// The interpretation of a file's `go_package` option.
#[derive(Debug, Default, PartialEq, Eq)]
struct PackageOption {
    import_path: Option<String>,
    name: Option<String>,
}

impl PackageOption {
    fn from_file(file: &FileDescriptor) -> Self {
        let option = file
            .proto
            .options
            .as_ref()
            .map(|options| options.go_package())
            .unwrap_or_default();
        Self::parse(option)
    }

    fn parse(option: &str) -> Self {
        if option.is_empty() {
            return PackageOption::default();
        }

        if let Some((path, name)) = option.split_once(';') {
            PackageOption {
                import_path: Some(path.to_owned()).filter(|path| !path.is_empty()),
                name: Some(to_lower_identifier(name)),
            }
        } else if let Some((_, name)) = option.rsplit_once('/') {
            PackageOption {
                import_path: Some(option.to_owned()),
                name: Some(to_lower_identifier(name)),
            }
        } else {
            PackageOption {
                import_path: None,
                name: Some(to_lower_identifier(option)),
            }
        }
    }
}

/// Computes the import path and package identity of every file.
///
/// All files being generated must end up with the same import path and package identity.
pub(crate) fn resolve_packages(graph: &mut DescriptorGraph, params: &Parameters) -> Result<(), Error> {
    let ids: Vec<FileId> = graph.file_ids().collect();
    let mut options = HashMap::with_capacity(ids.len());

    for &id in &ids {
        let file = graph.file(id);
        let option = PackageOption::from_file(file);
        let import_path = import_path(file, &option, params);
        options.insert(id, option);
        graph.file_mut(id).import_path = import_path;
    }

    let mut option_names: HashMap<String, String> = HashMap::new();
    for &id in &ids {
        if let Some(name) = &options[&id].name {
            option_names
                .entry(graph.file(id).import_path.clone())
                .or_insert_with(|| name.clone());
        }
    }

    let default_name = params
        .import_path
        .as_deref()
        .map(|path| base_name(path))
        .filter(|name| !name.is_empty())
        .map(to_lower_identifier);

    for &id in &ids {
        let file = graph.file(id);
        let package_name = if let Some(name) = &options[&id].name {
            name.clone()
        } else if let Some(name) = option_names.get(&file.import_path) {
            name.clone()
        } else if let Some(name) = default_name.as_ref().filter(|_| file.generate) {
            name.clone()
        } else if !file.proto.package().is_empty() {
            to_lower_identifier(file.proto.package())
        } else {
            to_lower_identifier(base_name(file.name()))
        };
        tracing::trace!(
            file = file.name(),
            import_path = %file.import_path,
            package = %package_name,
            "resolved package"
        );
        graph.file_mut(id).package_name = package_name;
    }

    check_consistency(graph)
}

fn import_path(file: &FileDescriptor, option: &PackageOption, params: &Parameters) -> String {
    if let Some(path) = params.import_map.get(file.name()) {
        path.clone()
    } else if file.name().starts_with(WELL_KNOWN_PREFIX) {
        WELL_KNOWN_IMPORT_PATH.to_owned()
    } else if let Some(path) = params.import_path.as_ref().filter(|_| file.generate) {
        path.clone()
    } else if let Some(path) = &option.import_path {
        path.clone()
    } else {
        dir_name(file.name()).to_owned()
    }
}

fn check_consistency(graph: &DescriptorGraph) -> Result<(), Error> {
    let Some((&first, rest)) = graph.files_to_generate().split_first() else {
        return Ok(());
    };

    let first = graph.file(first);
    for &id in rest {
        let file = graph.file(id);
        if first.import_path != file.import_path {
            return Err(Error::from_kind(ErrorKind::InconsistentImportPaths {
                first: first.import_path.clone(),
                second: file.import_path.clone(),
            }));
        }
        if first.package_name != file.package_name {
            return Err(Error::from_kind(ErrorKind::InconsistentPackageNames {
                first: first.package_name.clone(),
                second: file.package_name.clone(),
            }));
        }
    }
    Ok(())
}

/// Gives every enum value a constant name that is unique within its file.
///
/// Constants are named after the enclosing message, or the enum itself at top level, followed by
/// the value name, e.g. `ORDER_PENDING` for value `PENDING` of `Order.State`.
pub(crate) fn allocate_constant_names(graph: &mut DescriptorGraph) {
    let ids: Vec<FileId> = graph.file_ids().collect();
    for id in ids {
        let mut used = HashSet::new();
        for enum_id in graph.file(id).enums.clone() {
            let enum_ = graph.enumeration(enum_id);
            let prefix = match enum_.parent {
                None => to_pascal_case(enum_.proto.name()),
                Some(_) => to_pascal_case_path(&enum_.type_name[..enum_.type_name.len() - 1]),
            };
            let prefix = to_screaming_snake_case(prefix.trim_end_matches('_'));

            let names = enum_
                .proto
                .value
                .iter()
                .map(|value| {
                    let mut name = format!("{}_{}", prefix, value.name().to_ascii_uppercase());
                    while !used.insert(name.clone()) {
                        name.push('_');
                    }
                    name
                })
                .collect();
            graph.enumeration_mut(enum_id).constant_names = names;
        }
    }
}

/// The last element of a slash-separated path, without its extension.
pub(crate) fn base_name(name: &str) -> &str {
    let name = name.rsplit('/').next().unwrap_or(name);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// Everything before the last slash of a path, or `.` when there is none.
pub(crate) fn dir_name(name: &str) -> &str {
    match name.rfind('/') {
        Some(0) => "/",
        Some(slash) => &name[..slash],
        None => ".",
    }
}
