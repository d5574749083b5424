use std::fs;

use serde::Serialize;

use crate::assemble;
use crate::catalog;
use crate::error::DataprovError;
use crate::extract::Extractor;
use crate::fetch::{self, FetchOptions};
use crate::figshare::ArticleClient;
use crate::hooks::HookRegistry;
use crate::layout::Layout;
use crate::relocate::{Manifest, RelocationEngine};

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    /// Bypass cache reuse: transfer every part even when its hash matches.
    pub ignore_cache: bool,
    /// Skip fetch/assemble/extract and replay relocation over the existing
    /// staging directory.
    pub relocate_only: bool,
    /// Delete each cached part right after the assembler consumes it.
    pub trim_cache: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DownloadReport {
    pub parts_downloaded: usize,
    pub parts_reused: usize,
    pub rules_applied: usize,
    pub rules_skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub cleared: bool,
    pub cache_root: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub project_root: String,
    pub cache_root: String,
    pub staging_dir: String,
    pub default_article: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Pipeline orchestrator: resolve, fetch, assemble, extract, relocate, in
/// that order, strictly sequentially. The client and extractor seams are
/// generic so tests can substitute fakes.
pub struct App<C: ArticleClient, X: Extractor> {
    layout: Layout,
    client: C,
    extractor: X,
    hooks: HookRegistry,
}

impl<C: ArticleClient, X: Extractor> App<C, X> {
    pub fn new(layout: Layout, client: C, extractor: X, hooks: HookRegistry) -> Self {
        Self {
            layout,
            client,
            extractor,
            hooks,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn download(
        &self,
        article_id: &str,
        manifest: &Manifest,
        options: DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadReport, DataprovError> {
        let mut parts_downloaded = 0usize;
        let mut parts_reused = 0usize;

        if !options.relocate_only {
            sink.event(ProgressEvent {
                message: format!("phase=Resolve; listing article {article_id}"),
            });
            let parts = catalog::resolve(&self.client, article_id)?;

            sink.event(ProgressEvent {
                message: format!("phase=Fetch; {} part files", parts.len()),
            });
            let fetched = fetch::fetch_parts(
                &self.client,
                &parts,
                &self.layout,
                FetchOptions {
                    ignore_cache: options.ignore_cache,
                },
                sink,
            )?;
            parts_downloaded = fetched.downloaded;
            parts_reused = fetched.reused;

            let archive = self.layout.archive_path();
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Assemble; concatenating {} parts into {archive}",
                    fetched.paths.len()
                ),
            });
            assemble::concat_parts(&fetched.paths, archive.as_std_path(), options.trim_cache)?;

            self.layout.ensure_staging_dir()?;
            let staging = self.layout.staging_dir();
            sink.event(ProgressEvent {
                message: format!("phase=Extract; unpacking {archive} into {staging}"),
            });
            self.extractor
                .extract(archive.as_std_path(), staging.as_std_path())?;
            // The compressed artifact goes away only once extraction
            // reported success.
            fs::remove_file(archive.as_std_path())
                .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        }

        sink.event(ProgressEvent {
            message: format!("phase=Relocate; {} rules", manifest.len()),
        });
        let staging = self.layout.staging_dir();
        let engine = RelocationEngine::new(
            staging.as_std_path(),
            self.layout.project_root().as_std_path(),
            &self.hooks,
            &self.extractor,
        );
        let relocation = engine.run(manifest, sink)?;

        Ok(DownloadReport {
            parts_downloaded,
            parts_reused,
            rules_applied: relocation.applied,
            rules_skipped: relocation.skipped,
        })
    }

    pub fn clean(&self, sink: &dyn ProgressSink) -> Result<CleanReport, DataprovError> {
        sink.event(ProgressEvent {
            message: format!("phase=Clean; removing {}", self.layout.cache_root()),
        });
        self.layout.clear_cache()?;
        Ok(CleanReport {
            cleared: true,
            cache_root: self.layout.cache_root().to_string(),
        })
    }

    pub fn info(&self) -> InfoReport {
        InfoReport {
            project_root: self.layout.project_root().to_string(),
            cache_root: self.layout.cache_root().to_string(),
            staging_dir: self.layout.staging_dir().to_string(),
            default_article: crate::figshare::DEFAULT_ARTICLE_ID.to_string(),
        }
    }
}
