use crate::core::{Direction, NO_VERSION};
use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Discovers available migration versions from a directory tree.
///
/// The root holds one subdirectory per version. Each directory declares its
/// version through a numeric name prefix (`0_init`, `1_users`, `2-indexes`,
/// `3`), and the declared set must be exactly contiguous from 0 - gaps,
/// duplicates, a nonzero start, or a directory without a numeric prefix are
/// catalog errors. Within a version directory, the first file (in
/// lexicographic order) named `up*.sql` holds the forward script and the
/// first named `down*.sql` the reverse script; either may be absent.
///
/// The catalog holds no state between calls: every operation re-reads the
/// directory, so it always reflects the current on-disk set.
#[derive(Debug, Clone)]
pub struct MigrationCatalog {
    root: PathBuf,
}

impl MigrationCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All available versions, ascending.
    pub fn list_versions(&self) -> Result<Vec<i64>, Error> {
        Ok(self.scan()?.into_iter().map(|(version, _)| version).collect())
    }

    /// The highest available version, or [NO_VERSION] when the root holds no
    /// migration directories.
    pub fn highest_version(&self) -> Result<i64, Error> {
        Ok(self.list_versions()?.last().copied().unwrap_or(NO_VERSION))
    }

    /// Full text of the version's script for the given direction, or `None`
    /// when the version's directory holds no matching file. A missing script
    /// is a recognized condition, not an error.
    pub fn script_for(&self, version: i64, direction: Direction) -> Result<Option<String>, Error> {
        let directories = self.scan()?;
        let directory = match directories.iter().find(|(declared, _)| *declared == version) {
            Some((_, path)) => path,
            None => {
                return Err(Error::Catalog(format!(
                    "no migration directory declares version {}",
                    version
                )))
            }
        };

        let prefix = direction.script_prefix();
        let entries = fs::read_dir(directory).map_err(|e| {
            Error::Catalog(format!(
                "cannot read migration directory {}: {}",
                directory.display(),
                e
            ))
        })?;
        let mut matches: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::Catalog(format!(
                    "cannot read migration directory {}: {}",
                    directory.display(),
                    e
                ))
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) || !name.ends_with(".sql") {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| {
                Error::Catalog(format!("cannot inspect {}: {}", entry.path().display(), e))
            })?;
            if !file_type.is_file() {
                continue;
            }
            matches.push(entry.path());
        }
        matches.sort();

        match matches.first() {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    Error::Catalog(format!(
                        "cannot read migration script {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    /// Enumerate version directories, sorted ascending by declared version,
    /// and validate that the declared set is exactly `{0 .. N-1}`.
    fn scan(&self) -> Result<Vec<(i64, PathBuf)>, Error> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::Catalog(format!(
                "cannot read migration root {}: {}",
                self.root.display(),
                e
            ))
        })?;
        let mut found: Vec<(i64, String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::Catalog(format!(
                    "cannot read migration root {}: {}",
                    self.root.display(),
                    e
                ))
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| {
                Error::Catalog(format!("cannot inspect {}: {}", entry.path().display(), e))
            })?;
            if !file_type.is_dir() {
                continue;
            }
            let version = match declared_version(&name) {
                Some(version) => version,
                None => {
                    return Err(Error::Catalog(format!(
                        "migration directory '{}' has no numeric version prefix",
                        name
                    )))
                }
            };
            found.push((version, name, entry.path()));
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        for (index, (version, name, _)) in found.iter().enumerate() {
            let expected = index as i64;
            if *version == expected {
                continue;
            }
            if index > 0 && found[index - 1].0 == *version {
                return Err(Error::Catalog(format!(
                    "duplicate version {}: '{}' and '{}'",
                    version,
                    found[index - 1].1,
                    name
                )));
            }
            if index == 0 {
                return Err(Error::Catalog(format!(
                    "migration versions must start at 0, found {} ('{}')",
                    version, name
                )));
            }
            return Err(Error::Catalog(format!(
                "migration versions must be contiguous: expected {}, found {} ('{}')",
                expected, version, name
            )));
        }

        Ok(found
            .into_iter()
            .map(|(version, _, path)| (version, path))
            .collect())
    }
}

/// Parse the leading decimal digits of a directory name as its declared
/// version.
fn declared_version(name: &str) -> Option<i64> {
    let end = name
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(name.len());
    name[..end].parse().ok()
}
