// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use anyhow::{Result, anyhow};
use blobfs::{BlobClient, UploadOptions, best_filename};
use diagnostics::{log_debug, log_info};

use crate::common::format_file_size;

/// Upload a local file
///
/// Without an explicit `remote` the local file name is used. With
/// `options.delete_source` the local file is removed after a successful upload.
pub async fn put_command<F>(
    client: &BlobClient,
    local: &Path,
    remote: Option<&str>,
    options: UploadOptions,
    mut handler: F,
) -> Result<()>
where
    F: FnMut(&str),
{
    let source_name = local
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let destination = best_filename(
        remote.unwrap_or(""),
        &source_name,
        &client.config().account_name,
    );
    if destination.is_empty() {
        return Err(anyhow!("no destination for '{}'", local.display()));
    }

    let local_display = local.display().to_string();
    log_debug!(
        "PUT local '{local}' to remote '{remote}'",
        local: local_display,
        remote: destination
    );

    let mut file = tokio::fs::File::open(local)
        .await
        .map_err(|e| anyhow!("Failed to open {}: {}", local.display(), e))?;
    let outcome = client.put(&destination, &mut file, options).await?;
    drop(file);

    let written = outcome.path.clone();
    log_info!("Uploaded {local} to {remote}", local: local_display, remote: written);
    handler(&format!(
        "{local_display} -> {written} ({})",
        format_file_size(outcome.bytes)
    ));

    if outcome.delete_source {
        tokio::fs::remove_file(local)
            .await
            .map_err(|e| anyhow!("Failed to remove {}: {}", local.display(), e))?;
        handler(&format!("removed {local_display}"));
    }
    Ok(())
}
