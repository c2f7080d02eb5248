use std::collections::{hash_map, HashMap};

use crate::{
    descriptor::{DescriptorGraph, Object},
    error::{Error, ErrorKind},
};

/// A map of every message and enum of the request, keyed by fully-qualified name.
#[derive(Debug, Default)]
pub(crate) struct NameIndex {
    map: HashMap<String, Object>,
}

impl NameIndex {
    /// Indexes the messages and enums of every file, including files that are not generated.
    pub fn build(graph: &DescriptorGraph) -> Result<Self, Error> {
        let mut index = NameIndex::default();
        for id in graph.file_ids() {
            let file = graph.file(id);
            for &enum_ in &file.enums {
                let object = Object::Enum(enum_);
                index.add(graph.object_full_name(object), object)?;
            }
            for &message in &file.messages {
                let object = Object::Message(message);
                index.add(graph.object_full_name(object), object)?;
            }
        }
        Ok(index)
    }

    fn add(&mut self, name: String, object: Object) -> Result<(), Error> {
        let name = match name.strip_prefix('.') {
            Some(name) => name.to_owned(),
            None => name,
        };

        match self.map.entry(name) {
            hash_map::Entry::Vacant(entry) => {
                entry.insert(object);
                Ok(())
            }
            hash_map::Entry::Occupied(entry) => {
                Err(Error::from_kind(ErrorKind::DuplicateName {
                    name: entry.key().clone(),
                }))
            }
        }
    }

    /// Looks up a type name as it appears in a descriptor, e.g. `.pkg.Outer.Inner`.
    pub fn get(&self, name: &str) -> Result<Object, Error> {
        let key = name.strip_prefix('.').unwrap_or(name);
        self.map.get(key).copied().ok_or_else(|| {
            Error::from_kind(ErrorKind::ObjectNotFound {
                name: name.to_owned(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}
