use std::fs::{self, File};
use std::io;
use std::path::Path;

use camino::Utf8PathBuf;

use crate::error::DataprovError;

/// Concatenates verified part files, strictly in the given order, into one
/// destination archive. Copies in bounded chunks so peak memory stays
/// independent of total size.
///
/// With `delete_sources` each part is removed right after it is consumed,
/// bounding peak disk usage at the assembled prefix plus remaining parts.
pub fn concat_parts(
    parts: &[Utf8PathBuf],
    destination: &Path,
    delete_sources: bool,
) -> Result<(), DataprovError> {
    let mut out = File::create(destination).map_err(|err| {
        DataprovError::Filesystem(format!("create {}: {err}", destination.display()))
    })?;

    for part in parts {
        let mut input = File::open(part.as_std_path())
            .map_err(|err| DataprovError::Filesystem(format!("open {part}: {err}")))?;
        io::copy(&mut input, &mut out)
            .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        if delete_sources {
            fs::remove_file(part.as_std_path())
                .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        }
    }
    Ok(())
}
