// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use blobfs::BlobClient;
use diagnostics::log_info;

/// Remove an empty directory, or a whole container on an unbound connection
pub async fn rmdir_command<F>(client: &BlobClient, path: &str, mut handler: F) -> Result<()>
where
    F: FnMut(&str),
{
    client.rmdir(path).await?;

    log_info!("Directory removed: {path}", path: path);
    handler(&format!("removed {path}"));
    Ok(())
}
