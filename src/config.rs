//! Plugin parameters and run-wide settings.

use std::{collections::BTreeMap, env, path::PathBuf};

use crate::error::{Error, ErrorKind};

/// Environment variable holding the error code written into failure envelopes.
pub const ERROR_CODE_VAR: &str = "GEN_ERROR_CODE";

const DEFAULT_ERROR_CODE: i64 = 500;
const DEFAULT_REPO: &str = "crate";

/// How output file names are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathsMode {
    /// Files are placed in a directory named after their package identity.
    #[default]
    Import,
    /// Files are placed next to the `.proto` file they were generated from.
    SourceRelative,
}

/// The parsed form of the `parameter` field of a plugin request.
///
/// The parameter is a comma-separated list of `key` or `key=value` entries. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    /// Prefix prepended to import paths when forming module paths. Defaults to `<repo>/`.
    pub import_prefix: String,
    /// Import path used for every file being generated.
    pub import_path: Option<String>,
    /// Output file naming scheme.
    pub paths: PathsMode,
    /// Root module path of the crate the generated code is compiled into.
    pub repo: String,
    /// Directory containing `handler.json`.
    pub manifest_dir: PathBuf,
    /// Explicit `M<file>=<import path>` overrides.
    pub import_map: BTreeMap<String, String>,
}

impl Parameters {
    /// Parses a plugin parameter string.
    pub fn parse(parameter: &str) -> Result<Self, Error> {
        let mut params = Parameters::default();
        let mut import_prefix = None;

        for entry in parameter.split(',') {
            let (key, value) = match entry.split_once('=') {
                Some((key, value)) => (key, value),
                None => (entry, ""),
            };

            match key {
                "import_prefix" => import_prefix = Some(value.to_owned()),
                "import_path" => {
                    params.import_path = Some(value.to_owned()).filter(|path| !path.is_empty())
                }
                "paths" => {
                    params.paths = match value {
                        "import" => PathsMode::Import,
                        "source_relative" => PathsMode::SourceRelative,
                        _ => {
                            return Err(Error::from_kind(ErrorKind::InvalidPathType {
                                value: value.to_owned(),
                            }))
                        }
                    }
                }
                "repo" if !value.is_empty() => params.repo = value.to_owned(),
                "path" if !value.is_empty() => params.manifest_dir = PathBuf::from(value),
                _ => {
                    if let Some(file) = key.strip_prefix('M') {
                        params.import_map.insert(file.to_owned(), value.to_owned());
                    }
                }
            }
        }

        params.import_prefix = match import_prefix {
            Some(prefix) if !prefix.is_empty() => prefix,
            _ => format!("{}/", params.repo),
        };
        Ok(params)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            import_prefix: format!("{}/", DEFAULT_REPO),
            import_path: None,
            paths: PathsMode::default(),
            repo: DEFAULT_REPO.to_owned(),
            manifest_dir: PathBuf::from("."),
            import_map: BTreeMap::new(),
        }
    }
}

/// Everything that stays fixed for a single generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Parameters passed by the compiler frontend.
    pub params: Parameters,
    /// Code placed in error envelopes written by generated routes.
    pub error_code: i64,
}

impl Config {
    /// Builds the configuration from the request parameter and the process environment.
    pub fn from_env(parameter: &str) -> Result<Self, Error> {
        let error_code = env::var(ERROR_CODE_VAR).ok();
        Ok(Config {
            params: Parameters::parse(parameter)?,
            error_code: parse_error_code(error_code.as_deref())?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            params: Parameters::default(),
            error_code: DEFAULT_ERROR_CODE,
        }
    }
}

pub(crate) fn parse_error_code(value: Option<&str>) -> Result<i64, Error> {
    match value.map(str::trim) {
        None | Some("") => Ok(DEFAULT_ERROR_CODE),
        Some(value) => value.parse().map_err(|err| {
            Error::from_kind(ErrorKind::InvalidErrorCode {
                value: value.to_owned(),
                err,
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let params = Parameters::parse("").unwrap();
        assert_eq!(params, Parameters::default());
        assert_eq!(params.import_prefix, "crate/");
    }

    #[test]
    fn parse_all_keys() {
        let params = Parameters::parse(
            "repo=app,path=out,import_path=api/user,paths=source_relative,Mcommon/page.proto=shared/page,debug",
        )
        .unwrap();

        assert_eq!(params.repo, "app");
        assert_eq!(params.import_prefix, "app/");
        assert_eq!(params.manifest_dir, PathBuf::from("out"));
        assert_eq!(params.import_path.as_deref(), Some("api/user"));
        assert_eq!(params.paths, PathsMode::SourceRelative);
        assert_eq!(
            params.import_map.get("common/page.proto").map(String::as_str),
            Some("shared/page")
        );
    }

    #[test]
    fn explicit_import_prefix() {
        let params = Parameters::parse("import_prefix=crate/gen/,repo=app").unwrap();
        assert_eq!(params.import_prefix, "crate/gen/");
    }

    #[test]
    fn invalid_paths() {
        let err = Parameters::parse("paths=absolute").unwrap_err();
        assert!(err.is_input());
        assert_eq!(err.to_string(), "unknown path type 'absolute'");
    }

    #[test]
    fn error_code() {
        assert_eq!(parse_error_code(None).unwrap(), 500);
        assert_eq!(parse_error_code(Some("")).unwrap(), 500);
        assert_eq!(parse_error_code(Some("10001")).unwrap(), 10001);
        assert!(parse_error_code(Some("bad")).unwrap_err().is_input());
    }
}
