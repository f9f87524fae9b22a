//! End-to-end collection run: claims, top-N selection, title resolution,
//! then match-and-download one title at a time.
//!
//! The run reports through [`PipelineEvent`]s on an unbounded channel so a
//! front end can render progress without blocking the worker.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::{
    api::{ApiClient, Claim, GameHashes},
    application::{
        download_coordinator::{destination_for, DownloadCoordinator, DownloadOutcome},
        matcher::{derive_title, select_unpatched, Matcher},
    },
    domain::{AppError, DownloadProgress, MatchResult, ResolutionTask, RunPhase, TaskOutcome},
};

const CLAIMS_PERCENT: u8 = 10;
const SELECTION_PERCENT: u8 = 20;
const TITLES_START_PERCENT: u8 = 30;
const TITLES_END_PERCENT: u8 = 50;
const DOWNLOADS_START_PERCENT: u8 = 70;
const DOWNLOADS_END_PERCENT: u8 = 95;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Log(String),
    /// Overall progress, 0-100, never decreasing within a run.
    Percent(u8),
    DownloadTick(DownloadProgress),
    Finished { downloaded: usize, message: String },
    Failed(String),
}

/// Cooperative cancellation, checked between games and between downloads.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub count: usize,
    /// Empty means every console.
    pub consoles: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub downloaded: usize,
    pub outcomes: Vec<(ResolutionTask, TaskOutcome)>,
    /// Stopped early; tasks that never ran carry a "Cancelled" error.
    pub cancelled: bool,
}

impl RunSummary {
    fn cancel_remaining<I>(&mut self, tasks: I)
    where
        I: IntoIterator<Item = ResolutionTask>,
    {
        let cause = AppError::Cancelled.to_string();
        self.outcomes
            .extend(tasks.into_iter().map(|task| (task, TaskOutcome::Error(cause.clone()))));
        self.cancelled = true;
    }
}

/// Most recent `n` claims by `DoneTime`, compared as plain strings.
pub fn select_top_n(mut claims: Vec<Claim>, n: usize) -> Vec<Claim> {
    claims.sort_by(|a, b| b.done_time().cmp(a.done_time()));
    claims.truncate(n);
    claims
}

enum TitleResolution {
    Resolved(String),
    Unknown,
    Error(String),
}

fn unresolved_task(claim: &Claim) -> ResolutionTask {
    ResolutionTask {
        game_id: claim.game_id,
        console_name: claim.console_name.clone(),
        raw_achievement_title: String::new(),
    }
}

fn title_from_hashes(hashes: &GameHashes) -> TitleResolution {
    match select_unpatched(&hashes.results) {
        Some(result) if !result.name.trim().is_empty() => TitleResolution::Resolved(result.name.clone()),
        _ => TitleResolution::Unknown,
    }
}

/// Emits `Percent` only when it moves forward.
struct ProgressMeter<'a> {
    events: &'a UnboundedSender<PipelineEvent>,
    last: u8,
}

impl<'a> ProgressMeter<'a> {
    fn new(events: &'a UnboundedSender<PipelineEvent>) -> Self {
        Self { events, last: 0 }
    }

    fn set(&mut self, percent: u8) {
        let percent = percent.min(100);
        if percent > self.last {
            self.last = percent;
            let _ = self.events.send(PipelineEvent::Percent(percent));
        }
    }

    fn span(&mut self, start: u8, end: u8, done: usize, total: usize) {
        let fraction = if total == 0 { 1.0 } else { done as f32 / total as f32 };
        self.set(start + (fraction * f32::from(end - start)) as u8);
    }
}

#[derive(Clone)]
pub struct Pipeline {
    client: ApiClient,
    matcher: Matcher,
    downloader: DownloadCoordinator,
    download_root: PathBuf,
    request_delay: Duration,
    max_count: usize,
}

impl Pipeline {
    pub fn new(
        client: ApiClient,
        matcher: Matcher,
        downloader: DownloadCoordinator,
        download_root: PathBuf,
        request_delay: Duration,
        max_count: usize,
    ) -> Self {
        Self {
            client,
            matcher,
            downloader,
            download_root,
            request_delay,
            max_count,
        }
    }

    /// Run on the tokio runtime; events arrive on the returned receiver.
    pub fn spawn(
        &self,
        request: RunRequest,
        cancel: CancelFlag,
    ) -> (UnboundedReceiver<PipelineEvent>, JoinHandle<Result<RunSummary, AppError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = self.clone();
        let handle = tokio::spawn(async move { pipeline.run(request, tx, cancel).await });
        (rx, handle)
    }

    pub async fn run(
        &self,
        request: RunRequest,
        events: UnboundedSender<PipelineEvent>,
        cancel: CancelFlag,
    ) -> Result<RunSummary, AppError> {
        let result = self.run_phases(&request, &events, &cancel).await;
        match &result {
            Ok(summary) if summary.cancelled => {
                enter(RunPhase::Error);
                let message = format!("Process cancelled! Downloaded {} ROMs", summary.downloaded);
                log::warn!("{message}");
                let _ = events.send(PipelineEvent::Log(message));
                let _ = events.send(PipelineEvent::Failed(AppError::Cancelled.to_string()));
            }
            Ok(summary) => {
                let message = format!("Process completed! Downloaded {} ROMs", summary.downloaded);
                log::info!("{message}");
                let _ = events.send(PipelineEvent::Percent(100));
                let _ = events.send(PipelineEvent::Finished {
                    downloaded: summary.downloaded,
                    message,
                });
            }
            Err(e) => {
                enter(RunPhase::Error);
                log::warn!("Run stopped: {e}");
                let _ = events.send(PipelineEvent::Failed(e.to_string()));
            }
        }
        result
    }

    async fn run_phases(
        &self,
        request: &RunRequest,
        events: &UnboundedSender<PipelineEvent>,
        cancel: &CancelFlag,
    ) -> Result<RunSummary, AppError> {
        if request.count == 0 || request.count > self.max_count {
            return Err(AppError::InvalidInput(format!(
                "ROM count must be between 1 and {}, got {}",
                self.max_count, request.count
            )));
        }

        let say = |message: String| {
            log::info!("{message}");
            let _ = events.send(PipelineEvent::Log(message));
        };
        let mut meter = ProgressMeter::new(events);

        enter(RunPhase::FetchingClaims);
        say("Fetching recent claims...".to_string());
        let claims = self
            .client
            .get_recent_claims()
            .await
            .map_err(|e| AppError::FeedUnavailable(format!("Failed to fetch claims: {e}")))?;
        meter.set(CLAIMS_PERCENT);

        enter(RunPhase::SelectingTopN);
        say(format!("Processing {} most recent claims...", request.count));
        let selected: Vec<Claim> = select_top_n(claims, request.count)
            .into_iter()
            .filter(|c| request.consoles.is_empty() || request.consoles.contains(&c.console_name))
            .collect();
        meter.set(SELECTION_PERCENT);

        enter(RunPhase::ResolvingTitles);
        say("Retrieving game titles...".to_string());
        meter.set(TITLES_START_PERCENT);
        let mut summary = RunSummary::default();
        let mut pending = Vec::new();
        for (i, claim) in selected.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancel_remaining(pending);
                summary.cancel_remaining(selected[i..].iter().map(unresolved_task));
                return Ok(summary);
            }
            if i > 0 {
                tokio::time::sleep(self.request_delay).await;
            }

            let resolution = match self.client.get_game_hashes(claim.game_id).await {
                Ok(hashes) => title_from_hashes(&hashes),
                Err(e) => TitleResolution::Error(e.to_string()),
            };
            let mut task = unresolved_task(claim);
            match resolution {
                TitleResolution::Resolved(raw) => {
                    say(format!("Found: {} ({})", derive_title(&raw, &claim.console_name), claim.console_name));
                    task.raw_achievement_title = raw;
                    pending.push(task);
                }
                TitleResolution::Unknown => {
                    say(format!("No hash results for game {} ({})", claim.game_id, claim.console_name));
                    task.raw_achievement_title = "Unknown".to_string();
                    summary.outcomes.push((task, TaskOutcome::NoMatch));
                }
                TitleResolution::Error(cause) => {
                    say(format!("Error processing game {}: {cause}", claim.game_id));
                    task.raw_achievement_title = "Error".to_string();
                    summary.outcomes.push((task, TaskOutcome::Error(cause)));
                }
            }
            meter.span(TITLES_START_PERCENT, TITLES_END_PERCENT, i + 1, selected.len());
        }

        enter(RunPhase::MatchingAndDownloading);
        say("Starting ROM downloads...".to_string());
        meter.set(DOWNLOADS_START_PERCENT);
        let total = pending.len();
        let mut remaining = pending.into_iter().enumerate();
        while let Some((i, task)) = remaining.next() {
            if cancel.is_cancelled() {
                summary.cancel_remaining(std::iter::once(task).chain(remaining.map(|(_, t)| t)));
                return Ok(summary);
            }

            let outcome = self.match_and_download(&task, events).await;
            if outcome.is_success() {
                summary.downloaded += 1;
            }
            summary.outcomes.push((task, outcome));
            meter.span(DOWNLOADS_START_PERCENT, DOWNLOADS_END_PERCENT, i + 1, total);
        }

        enter(RunPhase::Done);
        Ok(summary)
    }

    async fn match_and_download(
        &self,
        task: &ResolutionTask,
        events: &UnboundedSender<PipelineEvent>,
    ) -> TaskOutcome {
        let say = |message: String| {
            log::info!("{message}");
            let _ = events.send(PipelineEvent::Log(message));
        };
        let console = task.console_name.as_str();
        let title = derive_title(&task.raw_achievement_title, console);

        say(format!("Searching for: {title}"));
        let found = self
            .matcher
            .find_and_resolve_with(&task.raw_achievement_title, console, |failure| {
                let _ = events.send(PipelineEvent::Log(format!(
                    "Error accessing {}: {}",
                    failure.mirror, failure.error
                )));
            })
            .await;

        let (url, filename) = match found {
            MatchResult::Matched { url, filename } => (url, filename),
            MatchResult::NoSourceForConsole => {
                say(AppError::ConsoleUnsupported(console.to_string()).to_string());
                return TaskOutcome::NoMatch;
            }
            MatchResult::NoMatch => {
                say(AppError::NoMatch(title).to_string());
                return TaskOutcome::NoMatch;
            }
        };

        let path = destination_for(&self.download_root, console, &filename);
        say(format!("Starting download: {filename}"));
        let result = self
            .downloader
            .download(&url, &path, |progress| {
                let _ = events.send(PipelineEvent::DownloadTick(progress.clone()));
            })
            .await;

        match result {
            Ok(DownloadOutcome::Downloaded(path)) => {
                say(format!("Downloaded: {filename}"));
                TaskOutcome::Downloaded(path)
            }
            Ok(DownloadOutcome::Skipped(path)) => {
                say(format!("Skipped (already exists): {filename}"));
                TaskOutcome::SkippedExists(path)
            }
            Err(e) => {
                say(e.to_string());
                TaskOutcome::Error(e.to_string())
            }
        }
    }
}

fn enter(phase: RunPhase) {
    log::debug!("Pipeline phase: {phase:?}");
}
