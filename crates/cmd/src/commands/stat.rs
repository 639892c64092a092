// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use blobfs::BlobClient;

pub async fn stat_command<F>(client: &BlobClient, path: &str, mut handler: F) -> Result<()>
where
    F: FnMut(&str),
{
    let record = client.attributes(path).await?;

    let kind = if record.is_directory() {
        "directory"
    } else {
        "file"
    };
    handler(&format!("path: {path}"));
    handler(&format!("type: {kind} ({})", record.type_name()));
    handler(&format!("size: {}", record.size()));
    handler(&format!(
        "modified: {}",
        record.last_modified_time().format("%Y-%m-%d %H:%M:%S")
    ));
    Ok(())
}
