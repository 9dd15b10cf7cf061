//! Chart archive inspection
//!
//! Charts are `.tgz` archives whose top-level directory holds `Chart.yaml`.
//! Only the metadata and digest are needed to index an archive, so nothing
//! is ever unpacked to disk.

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Component, Path};
use tar::Archive;

use crate::chart::ChartMetadata;
use crate::error::{CoreError, Result};

/// File extension of packaged charts
pub const CHART_EXTENSION: &str = "tgz";

/// Read `Chart.yaml` from an in-memory chart archive
pub fn read_chart_metadata(data: &[u8]) -> Result<ChartMetadata> {
    read_metadata_from(GzDecoder::new(data))
}

fn read_metadata_from<R: Read>(reader: R) -> Result<ChartMetadata> {
    let mut archive = Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !is_chart_yaml(&entry.path()?) {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        return ChartMetadata::from_yaml(&content);
    }

    Err(CoreError::MissingChartYaml)
}

/// `Chart.yaml` at the archive root or directly below the chart directory.
/// Subchart manifests under `charts/` sit deeper and are ignored.
fn is_chart_yaml(path: &Path) -> bool {
    let parts: Vec<_> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    match parts.as_slice() {
        [Component::Normal(file)] => *file == "Chart.yaml",
        [Component::Normal(_), Component::Normal(file)] => *file == "Chart.yaml",
        _ => false,
    }
}

/// SHA256 digest of an archive, hex encoded (the format Helm writes to the index)
pub fn digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Whether a path looks like a packaged chart
pub fn is_chart_archive(path: &Path) -> bool {
    path.extension().map(|e| e == CHART_EXTENSION).unwrap_or(false)
}
