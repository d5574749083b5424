use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::DataprovError;

const BLOCK_SIZE: usize = 8192;

/// Streams the file through MD5 in fixed-size chunks. Figshare publishes
/// `computed_md5` per file, so MD5 is the integrity check of record here.
pub fn file_md5(path: &Path) -> Result<String, DataprovError> {
    let mut file = File::open(path)
        .map_err(|err| DataprovError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; BLOCK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

pub fn matches(path: &Path, expected: &str) -> Result<bool, DataprovError> {
    let actual = file_md5(path)?;
    Ok(actual.eq_ignore_ascii_case(expected))
}
