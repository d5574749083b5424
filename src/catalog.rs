use crate::error::DataprovError;
use crate::figshare::{ArticleClient, METADATA_FILE, RemoteFile};

/// A remote part file joined with its position in the assembly order.
///
/// Invariant: concatenating the verified local copies of all `PartFile`
/// entries in `index` order reproduces the original archive byte-for-byte.
#[derive(Debug, Clone)]
pub struct PartFile {
    pub index: usize,
    pub remote: RemoteFile,
}

/// Queries the article listing, locates the fixed-name metadata file, and
/// cross-references its ordered part names against the listing.
pub fn resolve(
    client: &dyn ArticleClient,
    article_id: &str,
) -> Result<Vec<PartFile>, DataprovError> {
    let listing = client.list_files(article_id)?;

    let metadata = listing
        .iter()
        .find(|file| file.name == METADATA_FILE)
        .ok_or_else(|| DataprovError::MetadataNotFound(METADATA_FILE.to_string()))?;

    let manifest = client.fetch_part_manifest(&metadata.download_url)?;

    let mut parts = Vec::with_capacity(manifest.part_files.len());
    for (index, name) in manifest.part_files.iter().enumerate() {
        let remote = listing
            .iter()
            .find(|file| &file.name == name)
            .cloned()
            .ok_or_else(|| {
                DataprovError::Integrity(format!("part file {name} missing from article listing"))
            })?;
        parts.push(PartFile { index, remote });
    }
    Ok(parts)
}
