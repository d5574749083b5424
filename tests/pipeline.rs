use std::fs;
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use dataprov::app::{App, DownloadOptions};
use dataprov::error::DataprovError;
use dataprov::extract::Extractor;
use dataprov::figshare::{ArticleClient, METADATA_FILE, PartManifest, RemoteFile};
use dataprov::hooks::HookRegistry;
use dataprov::layout::Layout;
use dataprov::output::Silent;
use dataprov::relocate::Manifest;

/// Serves a split archive: the archive bytes are divided into named parts
/// with correct per-part MD5 descriptors.
struct FakeFigshare {
    parts: Vec<(String, Vec<u8>)>,
    downloads: Mutex<usize>,
}

impl FakeFigshare {
    fn split(archive: &[u8], chunk: usize) -> Self {
        let parts = archive
            .chunks(chunk)
            .enumerate()
            .map(|(i, bytes)| (format!("data.tar.zst.part{i}"), bytes.to_vec()))
            .collect();
        Self {
            parts,
            downloads: Mutex::new(0),
        }
    }

    fn downloads(&self) -> usize {
        *self.downloads.lock().unwrap()
    }
}

impl ArticleClient for FakeFigshare {
    fn list_files(&self, _article_id: &str) -> Result<Vec<RemoteFile>, DataprovError> {
        let mut listing = vec![RemoteFile {
            name: METADATA_FILE.to_string(),
            size: 0,
            download_url: "meta://listing".to_string(),
            computed_md5: "0".repeat(32),
        }];
        for (name, bytes) in &self.parts {
            listing.push(RemoteFile {
                name: name.clone(),
                size: bytes.len() as u64,
                download_url: format!("part://{name}"),
                computed_md5: format!("{:x}", md5::compute(bytes)),
            });
        }
        Ok(listing)
    }

    fn fetch_part_manifest(&self, _url: &str) -> Result<PartManifest, DataprovError> {
        Ok(PartManifest {
            part_files: self.parts.iter().map(|(name, _)| name.clone()).collect(),
        })
    }

    fn download_file(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> Result<(), DataprovError> {
        *self.downloads.lock().unwrap() += 1;
        let name = url.trim_start_matches("part://");
        let (_, bytes) = self
            .parts
            .iter()
            .find(|(part, _)| part == name)
            .expect("unknown part url");
        fs::write(destination, bytes).map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        progress(bytes.len() as u64);
        Ok(())
    }
}

/// Checks the assembled archive arrived byte-exact, then fakes extraction by
/// writing a staged tree.
struct FakeExtractor {
    expected_archive: Vec<u8>,
}

impl Extractor for FakeExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), DataprovError> {
        let assembled =
            fs::read(archive).map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        if assembled != self.expected_archive {
            return Err(DataprovError::ExternalTool(
                "assembled archive does not match original bytes".to_string(),
            ));
        }
        let staged = destination.join("docs");
        fs::create_dir_all(&staged).map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        fs::write(staged.join("readme.txt"), b"hello")
            .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        fs::write(destination.join("summary.json"), b"{}")
            .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn test_layout(temp: &tempfile::TempDir) -> Layout {
    let layout = Layout::new_with_paths(
        Utf8PathBuf::from_path_buf(temp.path().join("project")).unwrap(),
        Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap(),
    );
    fs::create_dir_all(layout.project_root().as_std_path()).unwrap();
    layout
}

fn test_manifest(registry: &HookRegistry) -> Manifest {
    let json = r#"[
        { "from": "docs/", "to": "out/docs" },
        { "from": "summary.json", "to": "out/summary.json", "kind": "file" },
        { "from": "absent/", "to": "out/absent" }
    ]"#;
    let rules = serde_json::from_str(json).unwrap();
    Manifest::from_rules(rules, registry).unwrap()
}

#[test]
fn full_pipeline_reassembles_extracts_and_relocates() {
    let temp = tempfile::tempdir().unwrap();
    let layout = test_layout(&temp);
    let archive = b"exactly reassembled archive bytes".to_vec();
    let client = FakeFigshare::split(&archive, 7);
    let extractor = FakeExtractor {
        expected_archive: archive.clone(),
    };

    let hooks = HookRegistry::with_builtins();
    let manifest = test_manifest(&hooks);
    let app = App::new(layout, client, extractor, hooks);

    let report = app
        .download("123", &manifest, DownloadOptions::default(), &Silent)
        .unwrap();

    assert_eq!(report.parts_downloaded, 5);
    assert_eq!(report.parts_reused, 0);
    assert_eq!(report.rules_applied, 2);
    assert_eq!(report.rules_skipped, 1);

    let project = app.layout().project_root();
    assert!(project.join("out/docs/readme.txt").as_std_path().exists());
    assert!(project.join("out/summary.json").as_std_path().exists());
    // The compressed artifact is gone once extraction succeeded.
    assert!(!app.layout().archive_path().as_std_path().exists());
}

#[test]
fn second_run_reuses_entire_cache() {
    let temp = tempfile::tempdir().unwrap();
    let layout = test_layout(&temp);
    let archive = b"exactly reassembled archive bytes".to_vec();
    let client = FakeFigshare::split(&archive, 7);
    let extractor = FakeExtractor {
        expected_archive: archive.clone(),
    };

    let hooks = HookRegistry::with_builtins();
    let manifest = test_manifest(&hooks);
    let app = App::new(layout, client, extractor, hooks);

    app.download("123", &manifest, DownloadOptions::default(), &Silent)
        .unwrap();
    let report = app
        .download("123", &manifest, DownloadOptions::default(), &Silent)
        .unwrap();

    // 5 transfers from the first run only.
    assert_eq!(report.parts_reused, 5);
    assert_eq!(report.parts_downloaded, 0);
}

#[test]
fn trim_cache_deletes_parts_during_assembly() {
    let temp = tempfile::tempdir().unwrap();
    let layout = test_layout(&temp);
    let cache_root = layout.cache_root().to_owned();
    let archive = b"exactly reassembled archive bytes".to_vec();
    let client = FakeFigshare::split(&archive, 7);
    let extractor = FakeExtractor {
        expected_archive: archive.clone(),
    };

    let hooks = HookRegistry::with_builtins();
    let manifest = test_manifest(&hooks);
    let app = App::new(layout, client, extractor, hooks);

    let options = DownloadOptions {
        trim_cache: true,
        ..Default::default()
    };
    app.download("123", &manifest, options, &Silent).unwrap();

    assert!(
        !cache_root.join("data.tar.zst.part0").as_std_path().exists(),
        "consumed parts must be removed"
    );
}

#[test]
fn relocate_only_skips_fetch_and_extract() {
    struct PanickyClient;
    impl ArticleClient for PanickyClient {
        fn list_files(&self, _article_id: &str) -> Result<Vec<RemoteFile>, DataprovError> {
            panic!("relocate-only must not touch the network")
        }
        fn fetch_part_manifest(&self, _url: &str) -> Result<PartManifest, DataprovError> {
            panic!("relocate-only must not touch the network")
        }
        fn download_file(
            &self,
            _url: &str,
            _destination: &Path,
            _progress: &mut dyn FnMut(u64),
        ) -> Result<(), DataprovError> {
            panic!("relocate-only must not touch the network")
        }
    }
    struct PanickyExtractor;
    impl Extractor for PanickyExtractor {
        fn extract(&self, _archive: &Path, _destination: &Path) -> Result<(), DataprovError> {
            panic!("relocate-only must not extract")
        }
    }

    let temp = tempfile::tempdir().unwrap();
    let layout = test_layout(&temp);
    // Pre-populate staging as if a previous run extracted here.
    let staging = layout.staging_dir();
    fs::create_dir_all(staging.join("docs").as_std_path()).unwrap();
    fs::write(staging.join("docs/readme.txt").as_std_path(), b"hi").unwrap();
    fs::write(staging.join("summary.json").as_std_path(), b"{}").unwrap();

    let hooks = HookRegistry::with_builtins();
    let manifest = test_manifest(&hooks);
    let app = App::new(layout, PanickyClient, PanickyExtractor, hooks);

    let options = DownloadOptions {
        relocate_only: true,
        ..Default::default()
    };
    let report = app.download("123", &manifest, options, &Silent).unwrap();

    assert_eq!(report.parts_downloaded, 0);
    assert_eq!(report.rules_applied, 2);
    assert!(
        app.layout()
            .project_root()
            .join("out/docs/readme.txt")
            .as_std_path()
            .exists()
    );
}

#[test]
fn corrupted_download_aborts_before_assembly() {
    struct LyingClient {
        inner: FakeFigshare,
    }
    impl ArticleClient for LyingClient {
        fn list_files(&self, article_id: &str) -> Result<Vec<RemoteFile>, DataprovError> {
            self.inner.list_files(article_id)
        }
        fn fetch_part_manifest(&self, url: &str) -> Result<PartManifest, DataprovError> {
            self.inner.fetch_part_manifest(url)
        }
        fn download_file(
            &self,
            _url: &str,
            destination: &Path,
            progress: &mut dyn FnMut(u64),
        ) -> Result<(), DataprovError> {
            fs::write(destination, b"garbage")
                .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
            progress(7);
            Ok(())
        }
    }
    struct PanickyExtractor;
    impl Extractor for PanickyExtractor {
        fn extract(&self, _archive: &Path, _destination: &Path) -> Result<(), DataprovError> {
            panic!("corrupted parts must never reach extraction")
        }
    }

    let temp = tempfile::tempdir().unwrap();
    let layout = test_layout(&temp);
    let client = LyingClient {
        inner: FakeFigshare::split(b"real archive", 4),
    };

    let hooks = HookRegistry::with_builtins();
    let manifest = test_manifest(&hooks);
    let app = App::new(layout, client, PanickyExtractor, hooks);

    let result = app.download("123", &manifest, DownloadOptions::default(), &Silent);
    assert_matches!(result, Err(DataprovError::Integrity(_)));
}

#[test]
fn failed_extraction_keeps_archive_and_skips_relocation() {
    struct FailingExtractor;
    impl Extractor for FailingExtractor {
        fn extract(&self, _archive: &Path, _destination: &Path) -> Result<(), DataprovError> {
            Err(DataprovError::ExternalTool(
                "tar: unexpected end of file".to_string(),
            ))
        }
    }

    let temp = tempfile::tempdir().unwrap();
    let layout = test_layout(&temp);
    let archive = b"archive".to_vec();
    let client = FakeFigshare::split(&archive, 3);

    let hooks = HookRegistry::with_builtins();
    let manifest = test_manifest(&hooks);
    let app = App::new(layout, client, FailingExtractor, hooks);

    let result = app.download("123", &manifest, DownloadOptions::default(), &Silent);
    assert_matches!(result, Err(DataprovError::ExternalTool(_)));
    // Archive deletion happens only after success.
    assert!(app.layout().archive_path().as_std_path().exists());
    assert!(
        !app.layout()
            .project_root()
            .join("out")
            .as_std_path()
            .exists()
    );
}

#[test]
fn ignore_cache_redownloads_every_part() {
    let temp = tempfile::tempdir().unwrap();
    let layout = test_layout(&temp);
    let archive = b"abcdef".to_vec();
    let client = FakeFigshare::split(&archive, 2);
    assert_eq!(client.downloads(), 0);

    let hooks = HookRegistry::with_builtins();
    let manifest = test_manifest(&hooks);
    let app = App::new(
        layout,
        client,
        FakeExtractor {
            expected_archive: archive,
        },
        hooks,
    );

    app.download("123", &manifest, DownloadOptions::default(), &Silent)
        .unwrap();
    let options = DownloadOptions {
        ignore_cache: true,
        ..Default::default()
    };
    let report = app.download("123", &manifest, options, &Silent).unwrap();
    assert_eq!(report.parts_downloaded, 3);
    assert_eq!(report.parts_reused, 0);
}
