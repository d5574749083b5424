use camino::Utf8PathBuf;

use crate::app::{ProgressEvent, ProgressSink};
use crate::catalog::PartFile;
use crate::checksum;
use crate::error::DataprovError;
use crate::figshare::ArticleClient;
use crate::layout::Layout;

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip cache reuse and transfer every part regardless of local state.
    pub ignore_cache: bool,
}

#[derive(Debug, Clone)]
pub struct FetchSummary {
    /// Local cache paths of all verified parts, in manifest order.
    pub paths: Vec<Utf8PathBuf>,
    pub downloaded: usize,
    pub reused: usize,
}

/// Downloads part files one at a time, in manifest order, converging the
/// cache directory toward a fully valid state.
///
/// A cache entry whose recomputed hash matches its descriptor is reused
/// without any transfer. Anything else, including partial files left by an
/// interrupted run, fails the hash check and is replaced in place. That
/// replacement download is the one retry a stale entry gets: a hash mismatch
/// after the transfer is fatal, corrupted data is never silently accepted.
pub fn fetch_parts(
    client: &dyn ArticleClient,
    parts: &[PartFile],
    layout: &Layout,
    options: FetchOptions,
    sink: &dyn ProgressSink,
) -> Result<FetchSummary, DataprovError> {
    layout.ensure_cache_root()?;

    let total = parts.len();
    let mut paths = Vec::with_capacity(total);
    let mut downloaded = 0usize;
    let mut reused = 0usize;

    for part in parts {
        let name = &part.remote.name;
        let cache_path = layout.cache_part_path(name);

        if !options.ignore_cache
            && cache_path.as_std_path().exists()
            && checksum::matches(cache_path.as_std_path(), &part.remote.computed_md5)?
        {
            sink.event(ProgressEvent {
                message: format!("[{}/{total}] {name}: cache valid, skipping transfer", part.index + 1),
            });
            paths.push(cache_path);
            reused += 1;
            continue;
        }

        sink.event(ProgressEvent {
            message: format!(
                "[{}/{total}] {name}: downloading {} bytes",
                part.index + 1,
                part.remote.size
            ),
        });

        let size = part.remote.size;
        let mut received = 0u64;
        let mut last_decile = 0u64;
        client.download_file(
            &part.remote.download_url,
            cache_path.as_std_path(),
            &mut |chunk| {
                received += chunk;
                let decile = if size == 0 {
                    10
                } else {
                    (received * 10 / size).min(10)
                };
                if decile > last_decile {
                    last_decile = decile;
                    sink.event(ProgressEvent {
                        message: format!("    {name}: {received}/{size} bytes ({}%)", decile * 10),
                    });
                }
            },
        )?;
        downloaded += 1;

        let actual = checksum::file_md5(cache_path.as_std_path())?;
        if !actual.eq_ignore_ascii_case(&part.remote.computed_md5) {
            return Err(DataprovError::Integrity(format!(
                "MD5 mismatch for {name}: expected {}, got {actual}",
                part.remote.computed_md5
            )));
        }
        paths.push(cache_path);
    }

    Ok(FetchSummary {
        paths,
        downloaded,
        reused,
    })
}
