use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::DataprovError;
use crate::extract::Extractor;
use crate::hooks::HookRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Directory,
    File,
    Tarball,
}

/// One relocation step: move staged content at `from` (relative to the
/// staging root) to `to` (relative to the project root).
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub from: String,
    pub to: String,
    #[serde(default)]
    kind: Option<RuleKind>,
    #[serde(default)]
    pub hook: Option<String>,
}

impl Rule {
    /// Manifests may omit `kind`; a trailing slash on `from` marks a
    /// directory rule, anything else is a plain file move.
    pub fn kind(&self) -> RuleKind {
        self.kind.unwrap_or(if self.from.ends_with('/') {
            RuleKind::Directory
        } else {
            RuleKind::File
        })
    }
}

/// Ordered relocation rules. Order is semantically significant: later rules
/// may assume the filesystem effects of earlier ones, so rules are never
/// reordered or parallelized.
#[derive(Debug, Clone)]
pub struct Manifest {
    rules: Vec<Rule>,
}

impl Manifest {
    /// Loads the static rule file and validates every referenced hook
    /// against the registry up front.
    pub fn load(path: &Path, registry: &HookRegistry) -> Result<Self, DataprovError> {
        let content = fs::read_to_string(path)
            .map_err(|_| DataprovError::ManifestRead(path.to_path_buf()))?;
        let rules: Vec<Rule> = serde_json::from_str(&content)
            .map_err(|err| DataprovError::ManifestParse(err.to_string()))?;
        Self::from_rules(rules, registry)
    }

    pub fn from_rules(rules: Vec<Rule>, registry: &HookRegistry) -> Result<Self, DataprovError> {
        for rule in &rules {
            if let Some(name) = &rule.hook {
                if !registry.contains(name) {
                    return Err(DataprovError::UnknownHook(name.clone()));
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RelocationReport {
    pub applied: usize,
    pub skipped: usize,
}

/// Sequential state machine over a relocation manifest. Not transactional:
/// a failed rule or hook leaves earlier rules applied.
pub struct RelocationEngine<'a> {
    staging_root: &'a Path,
    project_root: &'a Path,
    registry: &'a HookRegistry,
    extractor: &'a dyn Extractor,
}

impl<'a> RelocationEngine<'a> {
    pub fn new(
        staging_root: &'a Path,
        project_root: &'a Path,
        registry: &'a HookRegistry,
        extractor: &'a dyn Extractor,
    ) -> Self {
        Self {
            staging_root,
            project_root,
            registry,
            extractor,
        }
    }

    pub fn run(
        &self,
        manifest: &Manifest,
        sink: &dyn ProgressSink,
    ) -> Result<RelocationReport, DataprovError> {
        let total = manifest.len();
        let mut applied = 0usize;
        let mut skipped = 0usize;

        for (idx, rule) in manifest.rules().iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!("[{}/{total}] relocating {} -> {}", idx + 1, rule.from, rule.to),
            });

            let source = self.staging_root.join(rule.from.trim_end_matches('/'));
            let destination = self.project_root.join(&rule.to);

            if !source.exists() {
                // Optional dataset slices legitimately leave sources behind.
                tracing::warn!(
                    source = %source.display(),
                    "relocation source missing, skipping rule"
                );
                sink.event(ProgressEvent {
                    message: format!("    {} missing, skipped", rule.from),
                });
                skipped += 1;
                continue;
            }

            match rule.kind() {
                RuleKind::Directory => move_dir_entries(&source, &destination)?,
                RuleKind::File => move_file(&source, &destination)?,
                RuleKind::Tarball => {
                    if !destination.is_dir() {
                        return Err(DataprovError::NotADirectory(destination));
                    }
                    self.extractor.extract(&source, &destination)?;
                    fs::remove_file(&source)
                        .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
                }
            }

            if let Some(name) = &rule.hook {
                let hook = self
                    .registry
                    .get(name)
                    .ok_or_else(|| DataprovError::UnknownHook(name.clone()))?;
                hook.apply(&destination)
                    .map_err(|err| DataprovError::Hook {
                        name: name.clone(),
                        path: destination.clone(),
                        message: err.to_string(),
                    })?;
            }
            applied += 1;
        }

        Ok(RelocationReport { applied, skipped })
    }
}

/// Merge semantics: every entry of `source` moves into `destination`,
/// emptying the source. A same-named destination entry is a conflict this
/// engine does not resolve.
fn move_dir_entries(source: &Path, destination: &Path) -> Result<(), DataprovError> {
    fs::create_dir_all(destination)
        .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
    let entries = fs::read_dir(source)
        .map_err(|err| DataprovError::Filesystem(format!("read {}: {err}", source.display())))?;
    for entry in entries {
        let entry = entry.map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        fs::rename(entry.path(), destination.join(entry.file_name()))
            .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

/// A destination that already resolves to a directory receives the file as a
/// child under its own base name; otherwise the file is renamed to exactly
/// the destination path.
fn move_file(source: &Path, destination: &Path) -> Result<(), DataprovError> {
    let target: PathBuf = if destination.is_dir() {
        let name = source
            .file_name()
            .ok_or_else(|| DataprovError::Filesystem("unnamed source file".to_string()))?;
        destination.join(name)
    } else {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        }
        destination.to_path_buf()
    };
    fs::rename(source, target).map_err(|err| DataprovError::Filesystem(err.to_string()))
}
