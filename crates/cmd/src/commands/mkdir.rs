// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use blobfs::BlobClient;
use diagnostics::log_info;

pub async fn mkdir_command<F>(client: &BlobClient, path: &str, mut handler: F) -> Result<()>
where
    F: FnMut(&str),
{
    client.mkdir(path).await?;

    log_info!("Directory created: {path}", path: path);
    handler(&format!("created {path}"));
    Ok(())
}
