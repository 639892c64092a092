// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use blobfs::BlobClient;
use diagnostics::log_info;

pub async fn delete_command<F>(client: &BlobClient, paths: &[String], mut handler: F) -> Result<()>
where
    F: FnMut(&str),
{
    for path in paths {
        let path = path.as_str();
        client.delete(path).await?;
        log_info!("Deleted: {path}", path: path);
        handler(&format!("deleted {path}"));
    }
    Ok(())
}
