use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling path that a pending write is staged under. Unique per process and
/// call, so concurrent saves of one record never share a staging file.
fn staging_path(path: &Path) -> Result<PathBuf> {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        bail!("destination path '{}' has no file name", path.display());
    };
    let sequence = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    Ok(path.with_file_name(format!(
        ".{file_name}.staged-{}-{sequence}",
        std::process::id()
    )))
}

/// Replaces `path` with `content` through a staged sibling file and a rename,
/// so readers see either the old record or the new one.
pub async fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
    {
        bail!("destination path '{}' is a directory", path.display());
    }
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let staged = staging_path(path)?;
    tokio::fs::write(&staged, content)
        .await
        .with_context(|| format!("failed to stage {}", staged.display()))?;
    if let Err(error) = tokio::fs::rename(&staged, path).await {
        let _ = tokio::fs::remove_file(&staged).await;
        return Err(error).with_context(|| {
            format!("failed to move {} into place", staged.display())
        });
    }
    Ok(())
}
