use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use log::debug;
use reqwest::Client;
use sha2::{Digest, Sha512};
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    progress::{CancellationToken, ProgressReporter},
    Error, Result,
};

/// Where a download reports to: the reporter plus the pipeline step the bar
/// belongs to.
#[derive(Clone, Copy)]
pub struct DownloadProgress<'a> {
    pub reporter: &'a dyn ProgressReporter,
    pub step: usize,
}

/// Fetches a remote file to a local path.
///
/// Implementations report `(content_length, bytes_written)` per chunk when a
/// [`DownloadProgress`] is given and stop between chunks once `cancel` is
/// triggered. A cancelled download returns `Ok(())` and must not leave a file
/// at `dest`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<DownloadProgress<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        HttpFetcher { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<DownloadProgress<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        debug!("Downloading {} to {}", url, dest.display());
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.client.get(url).send().await?.error_for_status()?;
        let total_size = response.content_length().unwrap_or(0);

        let partial = partial_path(dest);
        let mut file = File::create(&partial).await?;
        let mut written: u64 = 0;
        let mut file_stream = response.bytes_stream();

        while let Some(chunk) = file_stream.next().await {
            if cancel.is_some_and(|x| x.is_cancelled()) {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Ok(());
            }
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(progress) = progress {
                progress
                    .reporter
                    .step_progress(total_size, written, progress.step);
            }
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, dest).await?;

        Ok(())
    }
}

/// Sibling path a download is streamed into before being moved into place.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Checks a file against a hex-encoded SHA-512 digest.
pub async fn verify_sha512(path: &Path, expected: &str) -> Result<()> {
    let data = tokio::fs::read(path).await?;
    let hash = Sha512::digest(&data)
        .iter()
        .map(|x| format!("{:02x}", x))
        .collect::<Vec<String>>()
        .join("");

    if !hash.eq_ignore_ascii_case(expected) {
        return Err(Error::HashMismatch(path.display().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_is_a_sibling() {
        let dest = Path::new("downloads/pack-1.0.zip");
        assert_eq!(partial_path(dest), PathBuf::from("downloads/pack-1.0.zip.part"));
    }

    #[tokio::test]
    async fn sha512_verification_accepts_matching_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mod.jar");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let expected = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                        2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";
        verify_sha512(&path, expected).await.unwrap();

        let err = verify_sha512(&path, "00").await.unwrap_err();
        assert!(matches!(err, Error::HashMismatch(_)));
    }
}
