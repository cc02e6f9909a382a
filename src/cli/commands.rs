//! CLI command implementations

use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::Path;

use crate::s3::client::ObjectStorageClient;

/// Upload a local file, printing the stored record
pub async fn cmd_put(client: &ObjectStorageClient, file: &str, key: Option<&str>) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("Failed to read {}", file))?;

    let key = match key {
        Some(k) => k.to_string(),
        None => Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("Cannot derive an object key from {}", file))?,
    };

    let info = client.upload(&key, Bytes::from(data)).await?;

    println!("stored  {}", info.original_path);
    println!("etag    {}", info.etag);
    println!("url     {}", info.path);
    Ok(())
}

/// Fetch an object; print it, or write it to the download directory
pub async fn cmd_get(
    client: &ObjectStorageClient,
    key: &str,
    etag: Option<&str>,
    download: bool,
) -> Result<()> {
    let info = client.reference(key, etag.unwrap_or_default());

    if download {
        let written = client.download(&info).await?;
        let dir = client
            .settings()
            .download_path
            .as_deref()
            .unwrap_or_else(|| Path::new("."));
        println!("{} bytes written to {}", written, dir.join(key).display());
    } else {
        let body = client.get(&info).await?;
        print!("{}", body);
    }
    Ok(())
}

/// Delete an object
pub async fn cmd_rm(client: &ObjectStorageClient, key: &str) -> Result<()> {
    client.delete(&client.reference(key, "")).await?;
    println!("removed {}", key);
    Ok(())
}

/// Print a presigned retrieval URL for an object
pub async fn cmd_presign(client: &ObjectStorageClient, key: &str) -> Result<()> {
    println!("{}", client.presigned_get_url(key));
    Ok(())
}
