//! Canonical formatting of generated source.

use std::fmt::Write;

use quote::ToTokens;
use syn::{Item, Visibility};

use crate::error::{Error, ErrorKind};

/// Parses generated source, canonicalizes its leading imports and pretty-prints it.
///
/// `name` is the output file name, used in error messages.
pub(crate) fn format_source(name: &str, source: &str) -> Result<String, Error> {
    let mut file = syn::parse_file(source).map_err(|err| {
        Error::from_kind(ErrorKind::BadSource {
            name: name.to_owned(),
            err,
            listing: Some(number_lines(source)),
        })
    })?;

    sort_imports(&mut file);
    let formatted = prettyplease::unparse(&file);

    if let Err(err) = syn::parse_file(&formatted) {
        return Err(Error::from_kind(ErrorKind::Reformat {
            name: name.to_owned(),
            err,
        }));
    }
    Ok(formatted)
}

/// Sorts and deduplicates the leading run of private `use` items.
fn sort_imports(file: &mut syn::File) {
    let end = file
        .items
        .iter()
        .position(|item| !is_private_use(item))
        .unwrap_or(file.items.len());

    let mut imports: Vec<(String, Item)> = file
        .items
        .drain(..end)
        .map(|item| (item.to_token_stream().to_string(), item))
        .collect();
    imports.sort_by(|(a, _), (b, _)| a.cmp(b));
    imports.dedup_by(|(a, _), (b, _)| a == b);

    file.items
        .splice(0..0, imports.into_iter().map(|(_, item)| item));
}

fn is_private_use(item: &Item) -> bool {
    matches!(item, Item::Use(item) if matches!(item.vis, Visibility::Inherited))
}

fn number_lines(source: &str) -> String {
    let mut listing = String::with_capacity(source.len() + source.lines().count() * 6);
    for (number, line) in source.lines().enumerate() {
        let _ = writeln!(listing, "{:5}\t{}", number + 1, line);
    }
    listing
}
