use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::asset::ImageAsset;

pub const DOWNLOAD_PREFIX: &str = "nanovision-edit";

/// Writes the asset to `dir` as `nanovision-edit-<unix-millis>.<ext>`.
pub fn export_generated(asset: &ImageAsset, dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let stamp = chrono::Utc::now().timestamp_millis();
    let ext = asset.media_type().extension();
    let mut path = dir.join(format!("{DOWNLOAD_PREFIX}-{stamp}.{ext}"));
    let mut suffix = 1;
    while path.exists() {
        path = dir.join(format!("{DOWNLOAD_PREFIX}-{stamp}-{suffix}.{ext}"));
        suffix += 1;
    }
    fs::write(&path, asset.raw_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
