// src/engine/session.rs
//
// Single-file session: one selected image, live settings, debounced re-runs.
//
// Every settings edit or file selection starts a new generation. A run is
// tagged with the generation it started under and its result is applied
// only if nothing has changed since; results of superseded runs are dropped
// along with their bytes. Time is passed in explicitly so hosts can drive
// the debounce from their own clock.

use crate::engine::crop::{crop, CropRect};
use crate::engine::io::{AcceptPolicy, SourceImage};
use crate::engine::orchestrator::{Compressor, EncodingOutcome};
use crate::engine::urls::{ObjectUrl, ObjectUrlRegistry};
use crate::error::{PixpressError, Result, UserMessage};
use crate::ops::{CompressionSettings, OutputFormat};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Trailing-edge debounce over an explicit clock.
#[derive(Clone, Copy, Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the wait from `now`.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Consume the deadline if it has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// Waiting for the debounce to elapse
    Pending,
    Compressing,
    Done,
    Error,
}

/// A run handed out by [`Session::begin_run`]. Carries its own copy of the
/// inputs so it can execute elsewhere.
#[derive(Clone, Debug)]
pub struct RunTicket {
    generation: u64,
    source: SourceImage,
    settings: CompressionSettings,
}

impl RunTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    pub fn execute(&self, compressor: &Compressor) -> Result<EncodingOutcome> {
        compressor.compress(&self.source, &self.settings)
    }
}

#[derive(Debug)]
pub struct Session {
    compressor: Compressor,
    registry: ObjectUrlRegistry,
    accept: AcceptPolicy,
    settings: CompressionSettings,
    debouncer: Debouncer,
    phase: SessionPhase,
    generation: u64,
    source: Option<SourceImage>,
    original_url: Option<ObjectUrl>,
    outcome: Option<EncodingOutcome>,
    result_url: Option<ObjectUrl>,
    error: Option<UserMessage>,
}

impl Session {
    pub fn new(compressor: Compressor, registry: ObjectUrlRegistry, accept: AcceptPolicy) -> Self {
        let debouncer = Debouncer::new(compressor.config().debounce_delay());
        Self {
            compressor,
            registry,
            accept,
            settings: CompressionSettings::default(),
            debouncer,
            phase: SessionPhase::Idle,
            generation: 0,
            source: None,
            original_url: None,
            outcome: None,
            result_url: None,
            error: None,
        }
    }

    pub fn with_settings(mut self, settings: CompressionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn outcome(&self) -> Option<&EncodingOutcome> {
        self.outcome.as_ref()
    }

    pub fn error(&self) -> Option<UserMessage> {
        self.error
    }

    pub fn original_url(&self) -> Option<&str> {
        self.original_url.as_ref().map(ObjectUrl::as_str)
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_ref().map(ObjectUrl::as_str)
    }

    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    /// Suggested download name for the current result.
    pub fn download_name(&self) -> Option<String> {
        let source = self.source.as_ref()?;
        let outcome = self.outcome.as_ref()?;
        Some(outcome.file_name(&source.name, &self.compressor.config().output_suffix))
    }

    /// Replace the selected file. Rejected files leave the session untouched.
    pub fn select_file(&mut self, file: SourceImage, now: Instant) -> Result<()> {
        self.accept.check(&file)?;
        self.clear_result();
        let format = OutputFormat::sniff(file.data());
        self.original_url = Some(self.registry.create(file.bytes.clone(), format));
        info!(name = %file.name, size = file.len(), "file selected");
        self.source = Some(file);
        self.schedule(now);
        Ok(())
    }

    /// Crop the selected file and select the region in its place.
    ///
    /// The crop goes through the accept policy like any other pick.
    pub fn apply_crop(&mut self, rect: CropRect, now: Instant) -> Result<()> {
        let source = self.source.as_ref().ok_or_else(|| {
            PixpressError::invalid_argument("crop", "none", "no file is selected")
        })?;
        let cropped = crop(
            source,
            rect,
            self.compressor.encoder(),
            &self.compressor.config().canvas,
        )?;
        self.select_file(cropped, now)
    }

    /// Replace the settings wholesale and schedule a run.
    pub fn update_settings(&mut self, settings: CompressionSettings, now: Instant) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        if self.source.is_some() {
            self.schedule(now);
        }
        Ok(())
    }

    /// Run if the debounce deadline has passed. Returns whether a run happened.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.source.is_none() || !self.debouncer.take_due(now) {
            return false;
        }
        self.run_now();
        true
    }

    /// Run immediately on the calling thread, ignoring any pending debounce.
    pub fn run_now(&mut self) -> SessionPhase {
        if let Some(ticket) = self.begin_run() {
            let result = ticket.execute(&self.compressor);
            self.finish_run(ticket, result);
        }
        self.phase
    }

    /// Start a run for the current file and settings.
    pub fn begin_run(&mut self) -> Option<RunTicket> {
        let source = self.source.clone()?;
        self.debouncer.cancel();
        self.generation += 1;
        self.phase = SessionPhase::Compressing;
        debug!(generation = self.generation, "run started");
        Some(RunTicket {
            generation: self.generation,
            source,
            settings: self.settings.clone(),
        })
    }

    /// Apply a finished run. Returns false when the run was superseded.
    pub fn finish_run(&mut self, ticket: RunTicket, result: Result<EncodingOutcome>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                run = ticket.generation,
                current = self.generation,
                "dropping stale result"
            );
            return false;
        }
        match result {
            Ok(outcome) => {
                if outcome.compression_auto_disabled {
                    self.settings.enable_compression = false;
                }
                let url = self.registry.create(outcome.data.clone(), Some(outcome.format));
                self.result_url = Some(url);
                self.outcome = Some(outcome);
                self.error = None;
                self.phase = SessionPhase::Done;
            }
            Err(err) => {
                warn!(error = %err, "run failed");
                self.outcome = None;
                self.result_url = None;
                self.error = Some(UserMessage::from_error(&err));
                self.phase = SessionPhase::Error;
            }
        }
        true
    }

    /// Drop the file and every result. Settings are kept.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.debouncer.cancel();
        self.clear_result();
        self.original_url = None;
        self.source = None;
        self.phase = SessionPhase::Idle;
    }

    fn schedule(&mut self, now: Instant) {
        // Anything in flight was started with stale inputs.
        self.generation += 1;
        self.debouncer.trigger(now);
        self.phase = SessionPhase::Pending;
    }

    fn clear_result(&mut self) {
        self.outcome = None;
        self.result_url = None;
        self.error = None;
    }
}
