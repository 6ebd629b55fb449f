use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use anyhow::Result;
use brandkit_contracts::archive::ArchiveSink;
use brandkit_contracts::assets::{AssetResult, AssetStatus, ResultStore};
use brandkit_contracts::events::EventWriter;
use brandkit_contracts::jobs::{build_jobs, GenerationJob};
use brandkit_contracts::runs::summary::{write_summary, RunSummary};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::avatar::describe_avatar;
use crate::cancel::CancelToken;
use crate::clipboard::{extract_from_paste, PasteEvent, PasteOutcome};
use crate::config::StudioConfig;
use crate::download::collect_archive_entries;
use crate::encoder::ImageEncoder;
use crate::error::{messages, StudioError};
use crate::map_object;
use crate::media::{validate_image_file, EncodedPayload, ImageFile, Preview};
use crate::providers::{GenerativeService, Modality, ServiceRequest};

const JOB_MODALITIES: &[Modality] = &[Modality::Image, Modality::Text];

/// Outcome of one `generate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
    pub avatar_description: Option<String>,
    pub cancelled: bool,
    pub summary_path: Option<PathBuf>,
}

/// Read-only view of the session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudioSnapshot {
    pub results: Vec<AssetResult>,
    pub loading: bool,
    pub error: Option<String>,
    pub image_name: Option<String>,
    pub prompt: String,
    pub download_ready: bool,
}

impl StudioSnapshot {
    pub fn has_image(&self) -> bool {
        self.image_name.is_some()
    }

    pub fn count(&self, status: AssetStatus) -> usize {
        self.results
            .iter()
            .filter(|result| result.status == status)
            .count()
    }
}

#[derive(Debug, Clone)]
struct ActiveRun {
    run_id: String,
    token: CancelToken,
}

#[derive(Default)]
struct StudioState {
    image: Option<ImageFile>,
    preview: Option<Preview>,
    prompt: String,
    results: ResultStore,
    loading: bool,
    error: Option<String>,
    run: Option<ActiveRun>,
}

impl StudioState {
    fn is_current(&self, run: &ActiveRun) -> bool {
        self.run
            .as_ref()
            .is_some_and(|active| active.run_id == run.run_id)
    }
}

/// One marketing-asset session: the current image and prompt, the results of
/// the latest run, and the controls acting on them. Cheap to clone; clones
/// share the same session.
#[derive(Clone)]
pub struct Studio {
    state: Arc<Mutex<StudioState>>,
    service: Arc<dyn GenerativeService>,
    encoder: Arc<ImageEncoder>,
    events: EventWriter,
    config: StudioConfig,
}

impl Studio {
    pub fn new(
        service: Arc<dyn GenerativeService>,
        config: StudioConfig,
        events: EventWriter,
    ) -> Self {
        let encoder = ImageEncoder::default().with_budget(config.encode_budget);
        Self {
            state: Arc::new(Mutex::new(StudioState::default())),
            service,
            encoder: Arc::new(encoder),
            events,
            config,
        }
    }

    pub fn with_encoder(mut self, encoder: ImageEncoder) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StudioState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.lock().prompt = prompt.into();
    }

    /// File-picker path: validates, then makes `file` the current image.
    pub fn select_image(&self, file: ImageFile) -> Result<(), StudioError> {
        if let Err(err) = validate_image_file(&file, self.config.max_image_bytes) {
            self.lock().error = Some(err.to_string());
            return Err(err);
        }
        self.accept_image(file, "picker");
        Ok(())
    }

    /// Routes a paste through the clipboard extractor. `Ok(false)` means the
    /// paste carried no image and was left to the host.
    pub fn paste(&self, event: &mut PasteEvent) -> Result<bool, StudioError> {
        match extract_from_paste(event, self.config.max_image_bytes) {
            PasteOutcome::Passthrough => Ok(false),
            PasteOutcome::Accepted(file) => {
                self.accept_image(file, "paste");
                Ok(true)
            }
            PasteOutcome::Rejected(err) => {
                self.lock().error = Some(err.to_string());
                self.events.record(
                    "paste_rejected",
                    map_object(json!({ "reason": err.to_string() })),
                );
                Err(err)
            }
        }
    }

    fn accept_image(&self, file: ImageFile, source: &str) {
        // Undecodable images still upload; the encoder skips the raster path.
        let preview = Preview::from_file(&file).ok();
        let dimensions = preview.as_ref().map(Preview::dimensions);
        let name = file.name().to_string();
        let mime_type = file.mime_type().to_string();
        let bytes = file.len();
        {
            let mut state = self.lock();
            state.image = Some(file);
            state.preview = preview;
            state.results.clear();
            state.error = None;
        }
        self.events.record(
            "image_selected",
            map_object(json!({
                "source": source,
                "name": name,
                "mime_type": mime_type,
                "bytes": bytes,
                "width": dimensions.map(|(width, _)| width),
                "height": dimensions.map(|(_, height)| height),
            })),
        );
    }

    /// Cancels the current run, if any. In-flight requests keep going but
    /// their completions are discarded; results already applied stay.
    pub fn stop(&self) -> bool {
        let mut state = self.lock();
        let Some(run) = state.run.clone() else {
            return false;
        };
        if run.token.is_cancelled() {
            return false;
        }
        run.token.cancel();
        state.loading = false;
        drop(state);
        self.events.record(
            "run_stopped",
            map_object(json!({ "run_id": run.run_id })),
        );
        true
    }

    /// Resets the whole session and cancels any run still in flight.
    pub fn clear(&self) {
        let mut state = self.lock();
        if let Some(run) = state.run.take() {
            run.token.cancel();
        }
        *state = StudioState::default();
    }

    pub fn snapshot(&self) -> StudioSnapshot {
        let state = self.lock();
        StudioSnapshot {
            results: state.results.snapshot(),
            loading: state.loading,
            error: state.error.clone(),
            image_name: state.image.as_ref().map(|file| file.name().to_string()),
            prompt: state.prompt.clone(),
            download_ready: state.results.download_ready(),
        }
    }

    pub fn generate(&self) -> Result<RunReport, StudioError> {
        self.generate_with(&|_| {})
    }

    /// Runs the full pipeline for the current image and prompt, blocking
    /// until every job has settled. `observer` sees each applied update.
    pub fn generate_with(
        &self,
        observer: &dyn Fn(&AssetResult),
    ) -> Result<RunReport, StudioError> {
        let (run, file, preview, product) = self.begin_run()?;
        let started_at = now_utc_iso();
        self.events.record(
            "run_started",
            map_object(json!({
                "run_id": run.run_id,
                "provider": self.service.name(),
                "image": file.name(),
            })),
        );

        let payload = match self.encoder.encode(&file, preview.as_ref(), &self.events) {
            Ok(payload) => payload,
            Err(err) => return Err(self.abort_run(&run, err)),
        };

        let avatar_description = if self.config.avatar_step && !run.token.is_cancelled() {
            describe_avatar(self.service.as_ref(), &payload, &product, &self.events)
        } else {
            None
        };
        let jobs = build_jobs(&product, avatar_description.as_deref());

        let placeholders: Vec<AssetResult> = jobs
            .iter()
            .map(|job| AssetResult::pending(job.title.clone()))
            .collect();
        let mut ledger = ResultStore::new();
        if let Err(err) = ledger.replace_all(placeholders) {
            return Err(self.abort_run(&run, StudioError::Job(format!("{err:#}"))));
        }
        let superseded = {
            let mut state = self.lock();
            if state.is_current(&run) {
                state.results = ledger.clone();
                false
            } else {
                true
            }
        };

        if !superseded && !run.token.is_cancelled() {
            self.dispatch(&run, &payload, &jobs, &mut ledger, observer);
        }

        let report = self.finish_run(&run, &started_at, &ledger, avatar_description);
        Ok(report)
    }

    /// Releases the run before any job was dispatched and surfaces `err`,
    /// unless the run was already stopped or superseded.
    fn abort_run(&self, run: &ActiveRun, err: StudioError) -> StudioError {
        let mut state = self.lock();
        if state.is_current(run) {
            state.loading = false;
            state.run = None;
            if !run.token.is_cancelled() {
                state.error = Some(err.to_string());
            }
        }
        err
    }

    fn begin_run(&self) -> Result<(ActiveRun, ImageFile, Option<Preview>, String), StudioError> {
        let mut state = self.lock();
        let Some(file) = state.image.clone() else {
            let err = StudioError::Validation(messages::MISSING_IMAGE.to_string());
            state.error = Some(err.to_string());
            return Err(err);
        };
        let product = state.prompt.trim().to_string();
        if product.is_empty() {
            let err = StudioError::Validation(messages::MISSING_PROMPT.to_string());
            state.error = Some(err.to_string());
            return Err(err);
        }

        if let Some(previous) = state.run.take() {
            previous.token.cancel();
        }
        let run = ActiveRun {
            run_id: format!("run-{}", Uuid::new_v4().simple()),
            token: CancelToken::new(),
        };
        state.run = Some(run.clone());
        state.loading = true;
        state.error = None;
        state.results.clear();
        Ok((run, file, state.preview.clone(), product))
    }

    fn dispatch(
        &self,
        run: &ActiveRun,
        payload: &EncodedPayload,
        jobs: &[GenerationJob],
        ledger: &mut ResultStore,
        observer: &dyn Fn(&AssetResult),
    ) {
        let service = self.service.as_ref();
        let (tx, rx) = mpsc::channel::<(String, Result<String, StudioError>)>();

        thread::scope(|scope| {
            for (index, job) in jobs.iter().enumerate() {
                let worker_tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("brandkit-job-{index}"))
                    .spawn_scoped(scope, move || {
                        let outcome = run_job(service, payload, job);
                        let _ = worker_tx.send((job.title.clone(), outcome));
                    });
                if let Err(err) = spawned {
                    let _ = tx.send((
                        job.title.clone(),
                        Err(StudioError::Job(format!("worker spawn failed: {err}"))),
                    ));
                }
            }
            drop(tx);

            for (title, outcome) in rx {
                self.apply_completion(run, &title, outcome, ledger, observer);
            }
        });
    }

    fn apply_completion(
        &self,
        run: &ActiveRun,
        title: &str,
        outcome: Result<String, StudioError>,
        ledger: &mut ResultStore,
        observer: &dyn Fn(&AssetResult),
    ) {
        let outcome = outcome.map_err(|err| err.to_string());
        let applied = {
            let mut state = self.lock();
            if !state.is_current(run) || run.token.is_cancelled() {
                None
            } else {
                state.results.settle(title, outcome.clone())
            }
        };

        let Some(updated) = applied else {
            self.events.record(
                "job_discarded",
                map_object(json!({ "run_id": run.run_id, "title": title })),
            );
            return;
        };
        ledger.settle(title, outcome);
        match updated.status {
            AssetStatus::Success => self.events.record(
                "job_succeeded",
                map_object(json!({ "run_id": run.run_id, "title": title })),
            ),
            _ => self.events.record(
                "job_failed",
                map_object(json!({
                    "run_id": run.run_id,
                    "title": title,
                    "error": updated.error_message,
                })),
            ),
        }
        observer(&updated);
    }

    fn finish_run(
        &self,
        run: &ActiveRun,
        started_at: &str,
        ledger: &ResultStore,
        avatar_description: Option<String>,
    ) -> RunReport {
        {
            let mut state = self.lock();
            if state.is_current(run) {
                state.loading = false;
                state.run = None;
            }
        }

        let mut report = RunReport {
            run_id: run.run_id.clone(),
            total: ledger.len(),
            succeeded: ledger.count(AssetStatus::Success),
            failed: ledger.count(AssetStatus::Error),
            pending: ledger.count(AssetStatus::Pending),
            avatar_description,
            cancelled: run.token.is_cancelled(),
            summary_path: None,
        };

        if let Some(out_dir) = self.config.out_dir.as_ref() {
            let path = out_dir.join(&run.run_id).join("summary.json");
            let summary = RunSummary {
                run_id: report.run_id.clone(),
                session_id: self.events.session_id().to_string(),
                started_at: started_at.to_string(),
                finished_at: now_utc_iso(),
                total_jobs: report.total as u64,
                succeeded: report.succeeded as u64,
                failed: report.failed as u64,
                pending: report.pending as u64,
                cancelled: report.cancelled,
                avatar_description: report.avatar_description.clone(),
            };
            match write_summary(&path, &summary, &ledger.snapshot()) {
                Ok(()) => report.summary_path = Some(path),
                Err(err) => eprintln!("brandkit: failed to write run summary: {err:#}"),
            }
        }

        self.events.record(
            "run_settled",
            map_object(json!({
                "run_id": report.run_id,
                "total": report.total,
                "succeeded": report.succeeded,
                "failed": report.failed,
                "pending": report.pending,
                "cancelled": report.cancelled,
                "avatar": report.avatar_description.is_some(),
            })),
        );
        report
    }

    /// Hands every successful asset to `sink`. Returns `None` without
    /// touching the sink when nothing succeeded.
    pub fn download_all(&self, sink: &mut dyn ArchiveSink) -> Result<Option<PathBuf>> {
        let results = self.lock().results.snapshot();
        let entries = collect_archive_entries(&results)?;
        if entries.is_empty() {
            return Ok(None);
        }
        let path = sink.package(&entries)?;
        self.events.record(
            "download_completed",
            map_object(json!({
                "count": entries.len(),
                "path": path.to_string_lossy(),
            })),
        );
        Ok(Some(path))
    }
}

fn run_job(
    service: &dyn GenerativeService,
    payload: &EncodedPayload,
    job: &GenerationJob,
) -> Result<String, StudioError> {
    let request = ServiceRequest {
        image: payload,
        prompt_text: &job.prompt_text,
        response_modalities: JOB_MODALITIES,
    };
    match service.generate(&request) {
        Ok(response) => response
            .first_image()
            .map(EncodedPayload::to_data_url)
            .ok_or_else(|| StudioError::Job(messages::NO_IMAGE_DATA.to_string())),
        Err(err) => {
            let message = format!("{err:#}");
            let message = message.trim();
            if message.is_empty() {
                Err(StudioError::Job(messages::GENERIC_JOB_FAILURE.to_string()))
            } else {
                Err(StudioError::Job(message.to_string()))
            }
        }
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
