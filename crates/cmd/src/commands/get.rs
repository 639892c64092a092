// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use blobfs::{BlobClient, BlobPath, DownloadOptions};
use diagnostics::log_info;
use tokio::io::AsyncWriteExt;

use crate::common::format_file_size;

/// Where a download lands: an explicit file, a file inside a directory, or stdout
fn local_target(remote: &str, local: &Path) -> Result<PathBuf> {
    if !local.is_dir() {
        return Ok(local.to_path_buf());
    }
    let name = BlobPath::canonical(remote).name().to_string();
    if name.is_empty() {
        return Err(anyhow!("cannot derive a file name from '{remote}'"));
    }
    Ok(local.join(name))
}

/// Copy a remote object to a local file, or to stdout when `local` is `None`
pub async fn get_command<F>(
    client: &BlobClient,
    remote: &str,
    local: Option<&Path>,
    delete_after: bool,
    mut handler: F,
) -> Result<()>
where
    F: FnMut(&str),
{
    let Some(local) = local else {
        let mut stdout = tokio::io::stdout();
        let _ = client
            .get(remote, &mut stdout, DownloadOptions { delete_after })
            .await?;
        return Ok(());
    };

    let target = local_target(remote, local)?;
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    // The download lands next to the target and replaces it only once complete
    let partial = tempfile::Builder::new()
        .prefix(".blobfs-")
        .suffix(".part")
        .tempfile_in(&dir)
        .map_err(|e| anyhow!("Failed to create a file in {}: {}", dir.display(), e))?;
    let mut file = tokio::fs::File::from_std(partial.reopen()?);
    let keep = DownloadOptions {
        delete_after: false,
    };
    let bytes = client.get(remote, &mut file, keep).await?;
    file.flush().await?;
    file.sync_all()
        .await
        .map_err(|e| anyhow!("Failed to write {}: {}", target.display(), e))?;
    file.shutdown().await?;
    drop(file);
    _ = partial
        .persist(&target)
        .map_err(|e| anyhow!("Failed to write {}: {}", target.display(), e))?;

    // Only remove the remote copy once the local one is in place
    if delete_after {
        client.delete(remote).await?;
    }

    let local_display = target.display().to_string();
    log_info!("Downloaded {remote} to {local}", remote: remote, local: local_display);
    handler(&format!(
        "{remote} -> {local_display} ({})",
        format_file_size(bytes)
    ));
    if delete_after {
        handler(&format!("deleted {remote}"));
    }
    Ok(())
}
