//! The `handler.json` side channel listing generated route groups.

use std::{
    collections::BTreeMap,
    fs, io,
    path::Path,
};

use crate::error::{Error, ErrorKind};

pub(crate) const MANIFEST_FILE: &str = "handler.json";

/// Entries collected while generating API files.
///
/// Each entry maps `<api dir>/<Service>` to `<api dir>`.
#[derive(Debug, Default)]
pub(crate) struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn add(&mut self, dir: &str, service: &str) {
        self.entries
            .insert(format!("{}/{}", dir, service), dir.to_owned());
    }

    /// Merges the collected entries into `<dir>/handler.json`.
    ///
    /// The file is created if it does not exist. Existing entries are kept unless overwritten.
    pub fn write(&self, dir: &Path) -> Result<(), Error> {
        if self.entries.is_empty() {
            return Ok(());
        }

        let path = dir.join(MANIFEST_FILE);
        let mut merged = read(&path)?;
        merged.extend(
            self.entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        let json = serde_json::to_vec(&merged).map_err(|err| {
            Error::from_kind(ErrorKind::ManifestJson {
                path: path.clone(),
                err,
            })
        })?;
        fs::write(&path, json).map_err(|err| {
            Error::from_kind(ErrorKind::ManifestIo {
                path: path.clone(),
                err,
            })
        })?;

        tracing::debug!(
            path = %path.display(),
            entries = self.entries.len(),
            "updated handler manifest"
        );
        Ok(())
    }
}

fn read(path: &Path) -> Result<BTreeMap<String, String>, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => {
            return Err(Error::from_kind(ErrorKind::ManifestIo {
                path: path.to_owned(),
                err,
            }))
        }
    };

    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&contents).map_err(|err| {
        Error::from_kind(ErrorKind::ManifestJson {
            path: path.to_owned(),
            err,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::default();
        manifest.add("user", "UserService");
        manifest.add("user", "AdminService");
        manifest.write(dir.path()).unwrap();

        let written = fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(
            written,
            r#"{"user/AdminService":"user","user/UserService":"user"}"#
        );
    }

    #[test]
    fn merge_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"order/OrderService":"order","user/UserService":"old"}"#,
        )
        .unwrap();

        let mut manifest = Manifest::default();
        manifest.add("user", "UserService");
        manifest.write(dir.path()).unwrap();

        let written = fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(
            written,
            r#"{"order/OrderService":"order","user/UserService":"user"}"#
        );
    }

    #[test]
    fn empty_manifest_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        Manifest::default().write(dir.path()).unwrap();
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "[1, 2]").unwrap();

        let mut manifest = Manifest::default();
        manifest.add("user", "UserService");
        let err = manifest.write(dir.path()).unwrap_err();
        assert!(err.is_manifest());
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::default();
        manifest.add("user", "UserService");
        let err = manifest.write(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ManifestIo { .. }));
    }
}
