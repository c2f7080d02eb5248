/// Converts a protobuf identifier such as `user_profile` or `userProfile` to `UserProfile`.
pub fn to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    if result.is_empty() || result.starts_with(|ch: char| ch.is_ascii_digit()) {
        result.insert(0, 'X');
    }

    result
}

/// Joins the elements of a dotted type name, e.g. `["Outer", "inner"]` becomes `OuterInner`.
///
/// The result never collides with `Self` or with a name generated model code uses unqualified.
pub fn to_pascal_case_path<S: AsRef<str>>(parts: &[S]) -> String {
    let name: String = parts
        .iter()
        .map(|part| to_pascal_case(part.as_ref()))
        .collect();
    escape_type_name(name)
}

/// Converts a single identifier to a type or variant name. See [`to_pascal_case_path`].
pub fn to_type_name(name: &str) -> String {
    escape_type_name(to_pascal_case(name))
}

// Pascal case output never ends in `_`, so the escaped name cannot clash with another type.
fn escape_type_name(name: String) -> String {
    if is_reserved_type_name(&name) {
        name + "_"
    } else {
        name
    }
}

fn is_reserved_type_name(name: &str) -> bool {
    matches!(
        name,
        "Self"
            | "Option"
            | "Some"
            | "None"
            | "Result"
            | "Ok"
            | "Err"
            | "Box"
            | "Vec"
            | "String"
            | "HashMap"
            | "Default"
            | "PartialEq"
            | "Serialize"
            | "Deserialize"
    )
}

pub fn to_snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(prev) if prev.is_ascii_lowercase() || prev.is_ascii_digit() => true,
                Some(prev) if prev.is_ascii_uppercase() => {
                    next.map_or(false, |next| next.is_ascii_lowercase())
                }
                _ => false,
            };
            if boundary && !result.ends_with('_') {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }

    result
}

pub fn to_screaming_snake_case(name: &str) -> String {
    to_snake_case(name).to_ascii_uppercase()
}

/// Replaces every character that cannot appear in an identifier with `_`.
pub fn to_lower_identifier(name: &str) -> String {
    let mut result: String = name
        .chars()
        .map(|ch| match ch {
            'a'..='z' | '0'..='9' | '_' => ch,
            'A'..='Z' => ch.to_ascii_lowercase(),
            _ => '_',
        })
        .collect();

    if result.is_empty() || result.starts_with(|ch: char| ch.is_ascii_digit()) {
        result.insert(0, '_');
    }
    if is_keyword(&result) {
        result.push('_');
    }

    result
}

/// Escapes an identifier that collides with a Rust keyword.
///
/// Keywords that cannot be used as raw identifiers get a trailing underscore instead.
pub fn sanitize_identifier(name: String) -> String {
    match name.as_str() {
        "self" | "Self" | "super" | "crate" | "_" => name + "_",
        _ if is_keyword(&name) => format!("r#{}", name),
        _ => name,
    }
}

pub fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "as" | "async"
            | "await"
            | "break"
            | "const"
            | "continue"
            | "crate"
            | "dyn"
            | "else"
            | "enum"
            | "extern"
            | "false"
            | "fn"
            | "for"
            | "if"
            | "impl"
            | "in"
            | "let"
            | "loop"
            | "match"
            | "mod"
            | "move"
            | "mut"
            | "pub"
            | "ref"
            | "return"
            | "self"
            | "Self"
            | "static"
            | "struct"
            | "super"
            | "trait"
            | "true"
            | "type"
            | "unsafe"
            | "use"
            | "where"
            | "while"
            | "abstract"
            | "become"
            | "box"
            | "do"
            | "final"
            | "macro"
            | "override"
            | "priv"
            | "try"
            | "typeof"
            | "unsized"
            | "virtual"
            | "yield"
    )
}
