use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::DataprovError;

/// A named post-processing routine run after a relocation rule completes,
/// receiving the rule's final destination path. Hooks do structural fixups
/// only; a failure aborts the remaining rules with no rollback.
pub trait Hook: Send + Sync {
    fn apply(&self, path: &Path) -> Result<(), DataprovError>;
}

/// Explicit mapping from manifest-referenced names to hooks, constructed at
/// startup and handed to the relocation engine. Unknown names are rejected
/// when the manifest is loaded, not discovered mid-run.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Box<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the hooks the shipped relocation manifest refers to.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("flatten", Box::new(FlattenDir));
        registry.register("rename_corpus", Box::new(RenameChild::new("corpus", "seeds")));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, hook: Box<dyn Hook>) {
        self.hooks.insert(name.into(), hook);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Hook> {
        self.hooks.get(name).map(|hook| hook.as_ref())
    }
}

/// Collapses one wrapping directory level: if the destination contains
/// exactly one entry and it is a directory, its children move up and the
/// wrapper is removed. Anything else is left untouched.
pub struct FlattenDir;

impl Hook for FlattenDir {
    fn apply(&self, path: &Path) -> Result<(), DataprovError> {
        let entries = read_entries(path)?;
        let [wrapper] = entries.as_slice() else {
            return Ok(());
        };
        if !wrapper.is_dir() {
            return Ok(());
        }

        // The wrapper may contain a child with the wrapper's own name, so it
        // is moved aside before its children come up.
        let parked = path.join(".flatten");
        fs::rename(wrapper, &parked).map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        for child in read_entries(&parked)? {
            let name = child
                .file_name()
                .ok_or_else(|| DataprovError::Filesystem("unnamed directory entry".to_string()))?;
            fs::rename(&child, path.join(name))
                .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        }
        fs::remove_dir(&parked).map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Renames a conventional child directory to the name expected downstream.
/// The child must exist; the rule that names this hook promised it.
pub struct RenameChild {
    from: String,
    to: String,
}

impl RenameChild {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Hook for RenameChild {
    fn apply(&self, path: &Path) -> Result<(), DataprovError> {
        let source = path.join(&self.from);
        if !source.exists() {
            return Err(DataprovError::Filesystem(format!(
                "expected {} under {}",
                self.from,
                path.display()
            )));
        }
        fs::rename(&source, path.join(&self.to))
            .map_err(|err| DataprovError::Filesystem(err.to_string()))
    }
}

fn read_entries(path: &Path) -> Result<Vec<std::path::PathBuf>, DataprovError> {
    let entries = fs::read_dir(path)
        .map_err(|err| DataprovError::Filesystem(format!("read {}: {err}", path.display())))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        out.push(entry.path());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_collapses_single_wrapper() {
        let temp = tempfile::tempdir().unwrap();
        let wrapper = temp.path().join("dataset-v1");
        fs::create_dir_all(wrapper.join("nested")).unwrap();
        fs::write(wrapper.join("a.txt"), b"a").unwrap();
        fs::write(wrapper.join("nested").join("b.txt"), b"b").unwrap();

        FlattenDir.apply(temp.path()).unwrap();

        assert!(temp.path().join("a.txt").exists());
        assert!(temp.path().join("nested").join("b.txt").exists());
        assert!(!temp.path().join("dataset-v1").exists());
    }

    #[test]
    fn flatten_handles_wrapper_named_child() {
        let temp = tempfile::tempdir().unwrap();
        let wrapper = temp.path().join("data");
        fs::create_dir_all(wrapper.join("data")).unwrap();
        fs::write(wrapper.join("data").join("x.txt"), b"x").unwrap();

        FlattenDir.apply(temp.path()).unwrap();

        assert!(temp.path().join("data").join("x.txt").exists());
    }

    #[test]
    fn flatten_leaves_multiple_entries_alone() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("one")).unwrap();
        fs::write(temp.path().join("two.txt"), b"2").unwrap();

        FlattenDir.apply(temp.path()).unwrap();

        assert!(temp.path().join("one").exists());
        assert!(temp.path().join("two.txt").exists());
    }

    #[test]
    fn rename_child_moves_directory() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("corpus")).unwrap();

        RenameChild::new("corpus", "seeds").apply(temp.path()).unwrap();

        assert!(temp.path().join("seeds").exists());
        assert!(!temp.path().join("corpus").exists());
    }

    #[test]
    fn rename_child_fails_when_source_missing() {
        let temp = tempfile::tempdir().unwrap();
        let result = RenameChild::new("corpus", "seeds").apply(temp.path());
        assert!(result.is_err());
    }

    #[test]
    fn builtins_are_registered() {
        let registry = HookRegistry::with_builtins();
        assert!(registry.contains("flatten"));
        assert!(registry.contains("rename_corpus"));
        assert!(!registry.contains("nope"));
    }
}
