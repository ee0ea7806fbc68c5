use std::path::{Path, PathBuf};

use futures::future::join_all;
use futures::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{DownloadError, Result, TransportError};
use crate::http::HttpClient;
use crate::part::{part_origins, part_path, plan_partition, total_size, PartData};
use crate::progress::{DownloadPhase, ProgressEvent, ProgressSink};

const MERGE_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub url: String,
    /// Output file. Part artifacts are written next to it as `<path>.<index>`.
    pub path: PathBuf,
    pub task_count: usize,
}

impl EngineConfig {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>, task_count: usize) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            task_count,
        }
    }
}

/// How a run of [`DownloadEngine::start`] ended when nothing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartOutcome {
    Done,
    Cancelled,
}

pub struct DownloadEngine<C> {
    client: C,
    config: EngineConfig,
    parts: Option<Vec<PartData>>,
    file_size: u64,
    sink: ProgressSink,
    cancel: CancellationToken,
}

impl<C: HttpClient> DownloadEngine<C> {
    pub fn new(config: EngineConfig, client: C) -> Result<Self> {
        if config.task_count == 0 {
            return Err(DownloadError::InvalidConfig(
                "task count must be greater than 0".into(),
            ));
        }
        if config.url.is_empty() {
            return Err(DownloadError::InvalidConfig("url is empty".into()));
        }

        Ok(Self {
            client,
            config,
            parts: None,
            file_size: 0,
            sink: ProgressSink::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current partition, once planned or restored.
    pub fn parts(&self) -> Option<&[PartData]> {
        self.parts.as_deref()
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn on_progress<F>(&mut self, observer: F)
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.sink.subscribe(observer);
    }

    /// Signal shared by every fetch task of the next (or current) run.
    ///
    /// A cancellation is consumed by the run it stops; fetch a new token
    /// after a cancelled run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Encoded partition, empty when nothing has been planned yet.
    pub fn encode_state(&self) -> String {
        self.parts.as_deref().map(codec::encode).unwrap_or_default()
    }

    /// Replace the partition with a previously saved one.
    ///
    /// On error the current partition is left as it was.
    pub fn restore_state(&mut self, blob: &str) -> Result<()> {
        let parts = codec::decode(blob)?;
        if parts.len() != self.config.task_count {
            warn!(
                saved = parts.len(),
                configured = self.config.task_count,
                "saved state uses a different part count, keeping the saved layout"
            );
        }

        self.file_size = total_size(&parts);
        let remaining: u64 = parts.iter().map(|p| p.remaining()).sum();
        info!(
            parts = parts.len(),
            size = self.file_size,
            remaining,
            "restored download state"
        );
        self.parts = Some(parts);
        Ok(())
    }

    pub async fn save_state<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(self.encode_state().as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn load_state<R>(&mut self, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut blob = String::new();
        reader
            .read_to_string(&mut blob)
            .await
            .map_err(|e| DownloadError::StateCorrupt(e.to_string()))?;
        self.restore_state(&blob)
    }

    /// Probe the resource and plan the partition, unless one already exists.
    pub async fn prepare(&mut self) -> Result<&[PartData]> {
        if self.parts.is_none() {
            let size = self.client.probe_size(&self.config.url).await?;
            let parts = plan_partition(size, self.config.task_count)?;
            info!(
                url = %self.config.url,
                size,
                parts = parts.len(),
                "planned partition"
            );
            self.file_size = size;
            self.parts = Some(parts);
        }
        Ok(self.parts.as_deref().unwrap_or(&[]))
    }

    /// Fetch every part concurrently, then merge them into the output file.
    ///
    /// Waits for all parts to settle before deciding the outcome. The first
    /// failing part stops its siblings and its error is returned.
    pub async fn start(&mut self) -> Result<DownloadOutcome> {
        self.prepare().await?;

        let run = self.cancel.child_token();
        let outcome = self.run(&run).await;
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        outcome
    }

    async fn run(&mut self, run: &CancellationToken) -> Result<DownloadOutcome> {
        let Self {
            client,
            config,
            parts,
            file_size,
            sink,
            ..
        } = self;
        let Some(parts) = parts.as_mut() else {
            return Err(DownloadError::InvalidResource("no partition planned".into()));
        };

        let ctx = FetchContext {
            client: &*client,
            url: &config.url,
            path: &config.path,
            sink: &*sink,
            cancel: run,
        };
        let origins = part_origins(parts);
        let tasks = parts
            .iter_mut()
            .zip(origins)
            .enumerate()
            .map(|(index, (part, origin))| ctx.fetch_part(index, origin, part));
        let results = join_all(tasks).await;

        let mut cancelled = false;
        for result in results {
            match result? {
                PartOutcome::Done => {}
                PartOutcome::Cancelled => cancelled = true,
            }
        }
        if cancelled {
            info!(url = %config.url, "download cancelled");
            return Ok(DownloadOutcome::Cancelled);
        }

        let size = *file_size;
        if merge_parts(&config.path, parts.len(), size, sink, run).await? == PartOutcome::Cancelled {
            info!(url = %config.url, "merge cancelled");
            return Ok(DownloadOutcome::Cancelled);
        }

        sink.emit(ProgressEvent::whole_file(size, size, DownloadPhase::Completed));
        info!(output = %config.path.display(), size, "download completed");
        Ok(DownloadOutcome::Completed)
    }
}

struct FetchContext<'a, C> {
    client: &'a C,
    url: &'a str,
    path: &'a Path,
    sink: &'a ProgressSink,
    cancel: &'a CancellationToken,
}

impl<C: HttpClient> FetchContext<'_, C> {
    async fn fetch_part(&self, index: usize, origin: u64, part: &mut PartData) -> Result<PartOutcome> {
        let result = self.download_part(index, origin, part).await;
        if let Err(e) = &result {
            warn!(part = index, error = %e, "part failed, stopping remaining parts");
            self.cancel.cancel();
        }
        result
    }

    async fn download_part(&self, index: usize, origin: u64, part: &mut PartData) -> Result<PartOutcome> {
        let mut file = open_part_file(&part_path(self.path, index), index, origin, part).await?;
        if part.is_finished() {
            debug!(part = index, "nothing left to fetch");
            return Ok(PartOutcome::Done);
        }
        if self.cancel.is_cancelled() {
            return Ok(PartOutcome::Cancelled);
        }

        debug!(part = index, start = part.start, end = part.end, "fetching part");
        let mut stream = self.client.fetch_range(self.url, part.start, part.end).await?;

        while !part.is_finished() {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(PartOutcome::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                return Err(TransportError::UnexpectedEof {
                    at: part.start,
                    end: part.end,
                }
                .into());
            };
            let chunk = chunk?;
            if self.cancel.is_cancelled() {
                return Ok(PartOutcome::Cancelled);
            }

            // never write past the end of the part
            let take = (chunk.len() as u64).min(part.remaining()) as usize;
            if take == 0 {
                continue;
            }
            file.write_all(&chunk[..take]).await?;
            file.flush().await?;
            part.start += take as u64;

            self.sink.emit(ProgressEvent::part(index, part.start, part.end));
        }

        debug!(part = index, "part finished");
        Ok(PartOutcome::Done)
    }
}

/// Open (or create) a part artifact for appending and line its length up
/// with the recorded offset.
///
/// A longer file is truncated to `start - origin`. A shorter one moves
/// `start` back so the missing bytes are fetched again.
async fn open_part_file(path: &Path, index: usize, origin: u64, part: &mut PartData) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let on_disk = file.metadata().await?.len();
    let recorded = part.start.saturating_sub(origin);
    if on_disk > recorded {
        warn!(part = index, on_disk, recorded, "truncating part file to recorded offset");
        file.set_len(recorded).await?;
    } else if on_disk < recorded {
        warn!(part = index, on_disk, recorded, "part file is shorter than recorded, refetching the gap");
        part.start = origin + on_disk;
    }

    Ok(file)
}

async fn merge_parts(
    path: &Path,
    count: usize,
    total: u64,
    sink: &ProgressSink,
    cancel: &CancellationToken,
) -> Result<PartOutcome> {
    info!(output = %path.display(), parts = count, "merging parts");

    let mut output = File::create(path).await?;
    let Some(merged) = append_parts(&mut output, path, count, total, sink, cancel).await? else {
        drop(output);
        // part files stay for the next run
        if let Err(e) = fs::remove_file(path).await {
            warn!(output = %path.display(), error = %e, "failed to remove partial output");
        }
        return Ok(PartOutcome::Cancelled);
    };

    if merged != total {
        return Err(DownloadError::StateCorrupt(format!(
            "part files hold {} bytes, expected {}",
            merged, total
        )));
    }

    for index in 0..count {
        let part_file = part_path(path, index);
        if let Err(e) = fs::remove_file(&part_file).await {
            warn!(file = %part_file.display(), error = %e, "failed to remove part file");
        }
    }

    Ok(PartOutcome::Done)
}

/// Copy part files into `output` in index order. Returns the merged byte
/// count, or `None` when cancelled.
async fn append_parts(
    output: &mut File,
    path: &Path,
    count: usize,
    total: u64,
    sink: &ProgressSink,
    cancel: &CancellationToken,
) -> Result<Option<u64>> {
    let mut buffer = vec![0u8; MERGE_BUFFER_SIZE];
    let mut merged: u64 = 0;

    for index in 0..count {
        let mut input = File::open(part_path(path, index)).await?;
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let n = input.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            output.write_all(&buffer[..n]).await?;
            merged += n as u64;
            sink.emit(ProgressEvent::whole_file(merged, total, DownloadPhase::Mixing));
        }
    }
    output.flush().await?;

    Ok(Some(merged))
}
