// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use blobfs::BlobClient;

use crate::common::format_entry;

/// List the children of `path`, one line per entry, sorted by path
pub async fn list_command<F>(client: &BlobClient, path: &str, mut handler: F) -> Result<()>
where
    F: FnMut(&str),
{
    let mut entries = client.dir(path).await?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    for entry in &entries {
        handler(&format_entry(entry));
    }
    Ok(())
}
