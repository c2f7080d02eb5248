//! Free-form `@tag` directives embedded in leading comments.
//!
//! A directive line looks like `@tag middleware:auth,quota bindcheck:false binding:form`. The
//! marker must be followed by whitespace; the rest of that line is split on spaces into `key` or
//! `key:value` tokens.

use std::collections::BTreeMap;

const MARKER: &str = "@tag";

/// How a route decodes its request into the input message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Binding {
    #[default]
    Json,
    Form,
    Query,
    FormPost,
    FormMultipart,
}

impl Binding {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "form" => Binding::Form,
            "query" => Binding::Query,
            "formpost" => Binding::FormPost,
            "formmultipart" => Binding::FormMultipart,
            _ => Binding::Json,
        }
    }

    /// The name of the binding type in the router facade's `binding` module.
    pub fn type_name(self) -> &'static str {
        match self {
            Binding::Json => "Json",
            Binding::Form => "Form",
            Binding::Query => "Query",
            Binding::FormPost => "FormPost",
            Binding::FormMultipart => "FormMultipart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Directives {
    /// Ordered middleware chain applied to the route.
    pub middleware: Vec<String>,
    /// Whether bind failures are reported to the client.
    pub bindcheck: bool,
    pub binding: Binding,
    /// Whether a field is omitted from JSON output when it holds its default value.
    pub omitempty: bool,
    raw: BTreeMap<String, String>,
}

impl Default for Directives {
    fn default() -> Self {
        Directives {
            middleware: Vec::new(),
            bindcheck: true,
            binding: Binding::default(),
            omitempty: true,
            raw: BTreeMap::new(),
        }
    }
}

impl Directives {
    pub fn parse(comment: &str) -> Self {
        let mut directives = Directives::default();
        let Some(line) = directive_line(comment) else {
            return directives;
        };

        for token in line.split(' ').map(|token| token.trim()) {
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once(':') {
                Some((key, rest)) => (key, rest.split(':').next().unwrap_or_default()),
                None => (token, ""),
            };
            directives.raw.insert(key.to_owned(), value.to_owned());
        }

        if let Some(middleware) = directives.get("middleware") {
            directives.middleware = middleware
                .split(',')
                .filter(|name| !name.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        if let Some(bindcheck) = directives.get("bindcheck") {
            directives.bindcheck = !bindcheck.eq_ignore_ascii_case("false");
        }
        if let Some(binding) = directives.get("binding") {
            directives.binding = Binding::parse(binding);
        }
        if let Some(omitempty) = directives.get("omitempty") {
            directives.omitempty = omitempty.eq_ignore_ascii_case("true");
        }

        tracing::trace!(?directives, "parsed directives");
        directives
    }

    /// The raw value of a directive key. Keys without a value map to the empty string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }
}

/// Finds the text following the first `@tag` marker that is followed by whitespace.
///
/// The whitespace may span line breaks, in which case the directive is read from the next
/// non-blank line.
fn directive_line(comment: &str) -> Option<&str> {
    let mut rest = comment;
    while let Some(start) = rest.find(MARKER) {
        let after = &rest[start + MARKER.len()..];
        let trimmed = after.trim_start();
        if trimmed.len() < after.len() && !trimmed.is_empty() {
            let end = trimmed.find('\n').unwrap_or(trimmed.len());
            return Some(trimmed[..end].trim_end_matches('\r'));
        }
        rest = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_directives() {
        let directives = Directives::parse(" Creates a profile.\n");
        assert_eq!(directives, Directives::default());
        assert!(directives.bindcheck);
        assert!(directives.omitempty);
    }

    #[test]
    fn method_directives() {
        let directives =
            Directives::parse(" Creates a profile.\n @tag middleware:auth,quota bindcheck:FALSE binding:FormPost\n");
        assert_eq!(directives.middleware, ["auth", "quota"]);
        assert!(!directives.bindcheck);
        assert_eq!(directives.binding, Binding::FormPost);
        assert_eq!(directives.get("middleware"), Some("auth,quota"));
    }

    #[test]
    fn unknown_keys_are_kept() {
        let directives = Directives::parse("@tag  cache:60  experimental");
        assert_eq!(directives.get("cache"), Some("60"));
        assert_eq!(directives.get("experimental"), Some(""));
        assert_eq!(directives.binding, Binding::Json);
        assert!(directives.middleware.is_empty());
    }

    #[test]
    fn value_stops_at_second_colon() {
        let directives = Directives::parse("@tag binding:query:extra");
        assert_eq!(directives.get("binding"), Some("query"));
        assert_eq!(directives.binding, Binding::Query);
    }

    #[test]
    fn omitempty() {
        assert!(!Directives::parse("@tag omitempty:false").omitempty);
        assert!(!Directives::parse("@tag omitempty").omitempty);
        assert!(Directives::parse("@tag omitempty:TRUE").omitempty);
    }

    #[test]
    fn marker_requires_whitespace() {
        assert_eq!(
            Directives::parse("@tagged binding:form"),
            Directives::default()
        );
        let directives = Directives::parse("see @tagged, then @tag binding:form");
        assert_eq!(directives.binding, Binding::Form);
    }

    #[test]
    fn directive_on_next_line() {
        let directives = Directives::parse(" @tag\n binding:query\n");
        assert_eq!(directives.binding, Binding::Query);
    }

    #[test]
    fn only_first_directive_line() {
        let directives = Directives::parse("@tag binding:form\n@tag bindcheck:false\n");
        assert_eq!(directives.binding, Binding::Form);
        assert!(directives.bindcheck);
    }
}
