use std::{fmt, io, num::ParseIntError, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// An error that can occur when generating code from a plugin request.
#[derive(Diagnostic, Error)]
#[error(transparent)]
#[diagnostic(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum ErrorKind {
    #[error("failed to decode code generator request")]
    DecodeRequest {
        #[source]
        err: prost::DecodeError,
    },
    #[error("failed to build descriptor pool from request")]
    DecodeDescriptors {
        #[source]
        err: prost_reflect::DescriptorError,
    },
    #[error("no files to generate")]
    NoFilesToGenerate,
    #[error("unknown path type '{value}'")]
    #[diagnostic(help("want 'import' or 'source_relative'"))]
    InvalidPathType { value: String },
    #[error("invalid GEN_ERROR_CODE '{value}'")]
    #[diagnostic(help("the error code must be an integer, for example GEN_ERROR_CODE=500"))]
    InvalidErrorCode {
        value: String,
        #[source]
        err: ParseIntError,
    },
    #[error("internal error: nesting failure for {name}")]
    NestingFailure { name: String },
    #[error("internal error: enum nesting failure for {name}")]
    EnumNestingFailure { name: String },
    #[error("inconsistent package import paths: {first}, {second}")]
    InconsistentImportPaths { first: String, second: String },
    #[error("inconsistent package names: {first}, {second}")]
    InconsistentPackageNames { first: String, second: String },
    #[error("type name '{name}' is defined twice")]
    DuplicateName { name: String },
    #[error("can't find object with type {name}")]
    ObjectNotFound { name: String },
    #[error("could not find file named {name}")]
    FileNotFound { name: String },
    #[error("could not find dependency {name} of {file}")]
    DependencyNotFound { name: String, file: String },
    #[error("http mapping not found for method {method}")]
    #[diagnostic(help(
        "annotate the method with `option (google.api.http) = {{ get: \"...\" }}` or `post: \"...\"`"
    ))]
    HttpMappingNotFound { method: String },
    #[error("bad Rust source code was generated for {name}: {err}")]
    BadSource {
        name: String,
        err: syn::Error,
        #[help]
        listing: Option<String>,
    },
    #[error("generated Rust source code for {name} could not be reformatted: {err}")]
    Reformat { name: String, err: syn::Error },
    #[error("error accessing handler manifest '{}'", path.display())]
    ManifestIo {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
    #[error("handler manifest '{}' content error", path.display())]
    #[diagnostic(help("the manifest must be a JSON object mapping handler names to directories"))]
    ManifestJson {
        path: PathBuf,
        #[source]
        err: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns true if the request or the plugin configuration could not be used.
    pub fn is_input(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::DecodeRequest { .. }
                | ErrorKind::DecodeDescriptors { .. }
                | ErrorKind::NoFilesToGenerate
                | ErrorKind::InvalidPathType { .. }
                | ErrorKind::InvalidErrorCode { .. }
        )
    }

    /// Returns true if the descriptors in the request do not agree with each other.
    pub fn is_consistency(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::NestingFailure { .. }
                | ErrorKind::EnumNestingFailure { .. }
                | ErrorKind::InconsistentImportPaths { .. }
                | ErrorKind::InconsistentPackageNames { .. }
                | ErrorKind::DuplicateName { .. }
        )
    }

    /// Returns true if a type, file or dependency referenced by the request could not be found.
    pub fn is_resolution(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::ObjectNotFound { .. }
                | ErrorKind::FileNotFound { .. }
                | ErrorKind::DependencyNotFound { .. }
        )
    }

    /// Returns true if a service method is missing a usable `google.api.http` annotation.
    pub fn is_annotation(&self) -> bool {
        matches!(&*self.kind, ErrorKind::HttpMappingNotFound { .. })
    }

    /// Returns true if the generated code was not valid Rust.
    pub fn is_emission(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::BadSource { .. } | ErrorKind::Reformat { .. }
        )
    }

    /// Returns true if this error was caused by reading or writing `handler.json`.
    pub fn is_manifest(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::ManifestIo { .. } | ErrorKind::ManifestJson { .. }
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            ErrorKind::DecodeRequest { err } => write!(f, "{}: {}", self, err),
            ErrorKind::DecodeDescriptors { err } => write!(f, "{}: {}", self, err),
            ErrorKind::InvalidErrorCode { err, .. } => write!(f, "{}: {}", self, err),
            ErrorKind::ManifestIo { err, .. } => write!(f, "{}: {}", self, err),
            ErrorKind::ManifestJson { err, .. } => write!(f, "{}: {}", self, err),
            ErrorKind::BadSource {
                listing: Some(listing),
                ..
            } => write!(f, "{}\n{}", self, listing),
            ErrorKind::NoFilesToGenerate
            | ErrorKind::InvalidPathType { .. }
            | ErrorKind::NestingFailure { .. }
            | ErrorKind::EnumNestingFailure { .. }
            | ErrorKind::InconsistentImportPaths { .. }
            | ErrorKind::InconsistentPackageNames { .. }
            | ErrorKind::DuplicateName { .. }
            | ErrorKind::ObjectNotFound { .. }
            | ErrorKind::FileNotFound { .. }
            | ErrorKind::DependencyNotFound { .. }
            | ErrorKind::HttpMappingNotFound { .. }
            | ErrorKind::BadSource { listing: None, .. }
            | ErrorKind::Reformat { .. } => write!(f, "{}", self),
        }
    }
}

#[test]
fn fmt_debug_manifest_io() {
    let err = Error::from_kind(ErrorKind::ManifestIo {
        path: "out/handler.json".into(),
        err: io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
    });

    assert!(err.is_manifest());
    assert!(!err.is_input());
    assert_eq!(
        format!("{:?}", err),
        "error accessing handler manifest 'out/handler.json': access denied"
    );
}

#[test]
fn fmt_debug_error_code() {
    let err = Error::from_kind(ErrorKind::InvalidErrorCode {
        value: "oops".into(),
        err: "oops".parse::<i64>().unwrap_err(),
    });

    assert!(err.is_input());
    assert_eq!(
        format!("{:?}", err),
        "invalid GEN_ERROR_CODE 'oops': invalid digit found in string"
    );
}

#[test]
fn fmt_display_consistency() {
    let err = Error::from_kind(ErrorKind::InconsistentPackageNames {
        first: "user".into(),
        second: "order".into(),
    });

    assert!(err.is_consistency());
    assert_eq!(err.to_string(), "inconsistent package names: user, order");
}
