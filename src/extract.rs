use std::path::Path;
use std::process::Command;

use crate::error::DataprovError;

/// Decompress-and-unarchive seam. The pipeline uses it twice: once for the
/// reassembled dataset archive and once per tarball-kind relocation rule.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), DataprovError>;
}

/// Shells out to the system `tar`, synchronously, and treats any nonzero
/// exit as fatal. Zstandard archives need the explicit `--zstd` flag on
/// older tar releases, so it is always passed for `.zst` inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTar;

impl SystemTar {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for SystemTar {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), DataprovError> {
        let mut cmd = Command::new("tar");
        if is_zstd(archive) {
            cmd.arg("--zstd");
        }
        cmd.arg("-xf").arg(archive).arg("-C").arg(destination);

        let output = cmd
            .output()
            .map_err(|err| DataprovError::ExternalTool(format!("spawn tar: {err}")))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("tar exited with {}", output.status)
        } else {
            stderr
        };
        Err(DataprovError::ExternalTool(message))
    }
}

fn is_zstd(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("zst"))
        .unwrap_or(false)
}
