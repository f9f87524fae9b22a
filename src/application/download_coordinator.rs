use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::{
    api::{self, ApiClient},
    domain::{AppError, CatalogEntry, DownloadProgress},
    utils::normalize_filename,
};

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// The destination already existed; nothing was requested.
    Skipped(PathBuf),
    Progress(DownloadProgress),
    Completed(PathBuf),
    Failed(AppError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    Skipped(PathBuf),
}

/// `{root}/Games/{console}/{filename}`; `filename` must already be normalized.
pub fn destination_for(root: &Path, console: &str, filename: &str) -> PathBuf {
    root.join("Games").join(console).join(filename)
}

#[derive(Clone)]
pub struct DownloadCoordinator {
    api_client: ApiClient,
    chunk_size: usize,
}

impl DownloadCoordinator {
    pub fn new(api_client: ApiClient, chunk_size: usize) -> Self {
        Self {
            api_client,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Lazily download `url` to `path`. Each call starts from byte 0.
    pub fn download_stream(&self, url: String, path: PathBuf) -> BoxStream<'static, DownloadEvent> {
        events(DownloadRuntimeState::Start {
            client: self.api_client.clone(),
            url,
            path,
            chunk_size: self.chunk_size,
        })
    }

    /// Drive [`Self::download_stream`] to its end, forwarding progress ticks.
    pub async fn download<F>(&self, url: &str, path: &Path, mut on_progress: F) -> Result<DownloadOutcome, AppError>
    where
        F: FnMut(&DownloadProgress),
    {
        let mut events = self.download_stream(url.to_string(), path.to_path_buf());
        while let Some(event) = events.next().await {
            match event {
                DownloadEvent::Progress(progress) => on_progress(&progress),
                DownloadEvent::Skipped(path) => return Ok(DownloadOutcome::Skipped(path)),
                DownloadEvent::Completed(path) => return Ok(DownloadOutcome::Downloaded(path)),
                DownloadEvent::Failed(e) => return Err(e),
            }
        }
        Err(AppError::DownloadFailed {
            filename: display_name(path),
            cause: "download ended without a result".to_string(),
        })
    }

    /// Fetch a catalog entry from its first source into the console folder.
    pub async fn download_entry<F>(
        &self,
        entry: &CatalogEntry,
        console: &str,
        root: &Path,
        on_progress: F,
    ) -> Result<DownloadOutcome, AppError>
    where
        F: FnMut(&DownloadProgress),
    {
        let source = entry
            .primary_source()
            .ok_or_else(|| AppError::NoMatch(entry.canonical_name().to_string()))?;
        let path = destination_for(root, console, &normalize_filename(&entry.file_name()));
        self.download(&source.full_url, &path, on_progress).await
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn failed(path: &Path, cause: impl ToString) -> DownloadEvent {
    DownloadEvent::Failed(AppError::DownloadFailed {
        filename: display_name(path),
        cause: cause.to_string(),
    })
}

type Body = BoxStream<'static, api::Result<Bytes>>;

/// Write an already-open response body to `path`.
pub fn body_stream(
    body: Body,
    total: Option<u64>,
    path: PathBuf,
    chunk_size: usize,
) -> BoxStream<'static, DownloadEvent> {
    events(DownloadRuntimeState::Open {
        body,
        total,
        path,
        chunk_size: chunk_size.max(1),
    })
}

fn events(initial: DownloadRuntimeState) -> BoxStream<'static, DownloadEvent> {
    futures::stream::unfold(initial, |state| async move {
        match state {
            DownloadRuntimeState::Start {
                client,
                url,
                path,
                chunk_size,
            } => {
                match tokio::fs::try_exists(&path).await {
                    Ok(true) => {
                        log::info!("Skipped (already exists): {}", path.display());
                        return Some((DownloadEvent::Skipped(path), DownloadRuntimeState::Finished));
                    }
                    Ok(false) => {}
                    Err(e) => return Some((failed(&path, e), DownloadRuntimeState::Finished)),
                }

                if let Some(parent) = path.parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        return Some((
                            failed(&path, format!("Failed to create directory: {}", e)),
                            DownloadRuntimeState::Finished,
                        ));
                    }
                }

                match client.download_file_stream(&url).await {
                    Ok((total, stream)) => Some(open(stream, total, path, chunk_size).await),
                    Err(e) => Some((failed(&path, e), DownloadRuntimeState::Finished)),
                }
            }
            DownloadRuntimeState::Open {
                body,
                total,
                path,
                chunk_size,
            } => Some(open(body, total, path, chunk_size).await),
            DownloadRuntimeState::Downloading {
                mut file,
                mut stream,
                mut pending,
                mut downloaded,
                total,
                path,
                chunk_size,
            } => {
                while pending.is_empty() {
                    match stream.next().await {
                        Some(Ok(chunk)) => pending = chunk,
                        Some(Err(e)) => {
                            drop(file);
                            discard_partial(&path).await;
                            return Some((failed(&path, e), DownloadRuntimeState::Finished));
                        }
                        None => {
                            if let Err(e) = finish(&mut file).await {
                                drop(file);
                                discard_partial(&path).await;
                                return Some((
                                    failed(&path, format!("Failed to sync file: {}", e)),
                                    DownloadRuntimeState::Finished,
                                ));
                            }
                            log::info!("Downloaded: {}", path.display());
                            return Some((DownloadEvent::Completed(path), DownloadRuntimeState::Finished));
                        }
                    }
                }

                let chunk = pending.split_to(chunk_size.min(pending.len()));
                if let Err(e) = file.write_all(&chunk).await {
                    drop(file);
                    discard_partial(&path).await;
                    return Some((
                        failed(&path, format!("Write error: {}", e)),
                        DownloadRuntimeState::Finished,
                    ));
                }
                downloaded += chunk.len() as u64;

                let progress = DownloadProgress {
                    filename: display_name(&path),
                    bytes_downloaded: downloaded,
                    total_bytes: total.unwrap_or(0),
                };

                Some((
                    DownloadEvent::Progress(progress),
                    DownloadRuntimeState::Downloading {
                        file,
                        stream,
                        pending,
                        downloaded,
                        total,
                        path,
                        chunk_size,
                    },
                ))
            }
            DownloadRuntimeState::Finished => None,
        }
    })
    .boxed()
}

/// Create the destination (never replacing an existing file) and emit the
/// zero-byte progress tick.
async fn open(body: Body, total: Option<u64>, path: PathBuf, chunk_size: usize) -> (DownloadEvent, DownloadRuntimeState) {
    let file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return (DownloadEvent::Skipped(path), DownloadRuntimeState::Finished);
        }
        Err(e) => {
            return (
                failed(&path, format!("Failed to create file: {}", e)),
                DownloadRuntimeState::Finished,
            );
        }
    };

    let progress = DownloadProgress {
        filename: display_name(&path),
        bytes_downloaded: 0,
        total_bytes: total.unwrap_or(0),
    };

    (
        DownloadEvent::Progress(progress),
        DownloadRuntimeState::Downloading {
            file,
            stream: body,
            pending: Bytes::new(),
            downloaded: 0,
            total,
            path,
            chunk_size,
        },
    )
}

async fn finish(file: &mut tokio::fs::File) -> std::io::Result<()> {
    file.flush().await?;
    file.sync_all().await
}

async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log::warn!("Could not remove partial download {}: {}", path.display(), e);
    }
}

enum DownloadRuntimeState {
    Start {
        client: ApiClient,
        url: String,
        path: PathBuf,
        chunk_size: usize,
    },
    Open {
        body: Body,
        total: Option<u64>,
        path: PathBuf,
        chunk_size: usize,
    },
    Downloading {
        file: tokio::fs::File,
        stream: Body,
        pending: Bytes,
        downloaded: u64,
        total: Option<u64>,
        path: PathBuf,
        chunk_size: usize,
    },
    Finished,
}
