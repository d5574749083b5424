use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::error::DataprovError;

/// Resolved filesystem layout for one run.
///
/// The cache root is owned exclusively by this tool and persists across runs.
/// The staging directory holds freshly extracted archive contents and is
/// fully consumed by relocation; it is a stable path under the project root
/// so that a relocate-only run can replay rules over previous extractions.
#[derive(Debug, Clone)]
pub struct Layout {
    project_root: Utf8PathBuf,
    cache_root: Utf8PathBuf,
}

impl Layout {
    pub fn new() -> Result<Self, DataprovError> {
        let cwd = std::env::current_dir()
            .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        let project_root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| DataprovError::Filesystem("invalid project path".to_string()))?;

        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("dataprov")).ok()
            })
            .ok_or_else(|| {
                DataprovError::Filesystem("unable to resolve cache directory".to_string())
            })?;

        Ok(Self {
            project_root,
            cache_root,
        })
    }

    pub fn new_with_paths(project_root: Utf8PathBuf, cache_root: Utf8PathBuf) -> Self {
        Self {
            project_root,
            cache_root,
        }
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    /// Flat cache, one file per part keyed by its remote name.
    pub fn cache_part_path(&self, name: &str) -> Utf8PathBuf {
        self.cache_root.join(name)
    }

    pub fn staging_dir(&self) -> Utf8PathBuf {
        self.project_root.join("data")
    }

    /// Where the assembler writes the reassembled compressed archive.
    /// Deleted after the extractor reports success.
    pub fn archive_path(&self) -> Utf8PathBuf {
        self.cache_root.join("data.tar.zst")
    }

    pub fn ensure_cache_root(&self) -> Result<(), DataprovError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| DataprovError::Filesystem(err.to_string()))
    }

    pub fn ensure_staging_dir(&self) -> Result<(), DataprovError> {
        fs::create_dir_all(self.staging_dir().as_std_path())
            .map_err(|err| DataprovError::Filesystem(err.to_string()))
    }

    pub fn clear_cache(&self) -> Result<(), DataprovError> {
        if self.cache_root.as_std_path().exists() {
            fs::remove_dir_all(self.cache_root.as_std_path())
                .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = Layout::new_with_paths(
            Utf8PathBuf::from("/work/project"),
            Utf8PathBuf::from("/home/user/.cache/dataprov"),
        );

        assert_eq!(
            layout.cache_part_path("data.tar.zst.part0"),
            Utf8PathBuf::from("/home/user/.cache/dataprov/data.tar.zst.part0")
        );
        assert_eq!(layout.staging_dir(), Utf8PathBuf::from("/work/project/data"));
        assert!(layout.archive_path().starts_with(layout.cache_root()));
    }
}
