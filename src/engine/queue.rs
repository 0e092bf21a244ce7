// src/engine/queue.rs
//
// Batch queue: many files, one settings value, processed one at a time.
//
// Items only ever move forward (pending -> compressing -> done | error). A
// failing item records its message and the batch carries on; a panic in a
// codec is caught per item so nothing is left in `Compressing`.

use crate::engine::common::run_with_panic_policy;
use crate::engine::io::{output_file_name, AcceptPolicy, SourceImage};
use crate::engine::orchestrator::{Compressor, EncodingOutcome};
use crate::engine::urls::{ObjectUrl, ObjectUrlRegistry};
use crate::error::{Result, UserMessage};
use crate::ops::CompressionSettings;
use tracing::{info, warn};

/// Default name for the archive of a batch download.
pub const ARCHIVE_NAME: &str = "pixpress-compressed.zip";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Compressing,
    Done,
    Error,
}

impl FileStatus {
    pub fn can_advance_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Pending, FileStatus::Compressing)
                | (FileStatus::Compressing, FileStatus::Done)
                | (FileStatus::Compressing, FileStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Error)
    }
}

#[derive(Debug)]
pub struct FileQueueItem {
    id: u64,
    original: SourceImage,
    status: FileStatus,
    outcome: Option<EncodingOutcome>,
    download_url: Option<ObjectUrl>,
    error: Option<UserMessage>,
}

impl FileQueueItem {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn original(&self) -> &SourceImage {
        &self.original
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn outcome(&self) -> Option<&EncodingOutcome> {
        self.outcome.as_ref()
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_ref().map(ObjectUrl::as_str)
    }

    pub fn error(&self) -> Option<UserMessage> {
        self.error
    }

    fn advance(&mut self, next: FileStatus) {
        if self.status.can_advance_to(next) {
            self.status = next;
        } else {
            warn!(id = self.id, from = ?self.status, to = ?next, "ignored illegal status change");
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddReport {
    pub accepted: Vec<u64>,
    pub skipped: Vec<String>,
    /// User-facing warning when anything was skipped
    pub warning: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub done: usize,
    pub failed: usize,
}

/// Receives finished outputs for packaging (e.g. a ZIP writer).
pub trait ArchiveSink {
    fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()>;
}

impl ArchiveSink for Vec<(String, Vec<u8>)> {
    fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.push((name.to_string(), data.to_vec()));
        Ok(())
    }
}

#[derive(Debug)]
pub struct FileQueue {
    accept: AcceptPolicy,
    registry: ObjectUrlRegistry,
    items: Vec<FileQueueItem>,
    next_id: u64,
}

impl FileQueue {
    pub fn new(accept: AcceptPolicy, registry: ObjectUrlRegistry) -> Self {
        Self {
            accept,
            registry,
            items: Vec::new(),
            next_id: 1,
        }
    }

    pub fn items(&self) -> &[FileQueueItem] {
        &self.items
    }

    pub fn get(&self, id: u64) -> Option<&FileQueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add_files(&mut self, files: Vec<SourceImage>) -> AddReport {
        let (accepted, skipped) = self.accept.partition(files);
        let warning = self.accept.rejection_warning(&skipped);
        if let Some(warning) = &warning {
            warn!(skipped = skipped.len(), "{warning}");
        }

        let mut ids = Vec::with_capacity(accepted.len());
        for original in accepted {
            let id = self.next_id;
            self.next_id += 1;
            ids.push(id);
            self.items.push(FileQueueItem {
                id,
                original,
                status: FileStatus::Pending,
                outcome: None,
                download_url: None,
                error: None,
            });
        }
        AddReport {
            accepted: ids,
            skipped,
            warning,
        }
    }

    /// Compress every pending item in order.
    pub fn process_all(
        &mut self,
        compressor: &Compressor,
        settings: &CompressionSettings,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for item in self.items.iter_mut().filter(|item| item.status == FileStatus::Pending) {
            item.advance(FileStatus::Compressing);
            let result =
                run_with_panic_policy("batch", || compressor.compress(&item.original, settings));
            match result {
                Ok(outcome) => {
                    let url = self.registry.create(outcome.data.clone(), Some(outcome.format));
                    item.download_url = Some(url);
                    item.outcome = Some(outcome);
                    item.advance(FileStatus::Done);
                    summary.done += 1;
                }
                Err(err) => {
                    warn!(
                        id = item.id,
                        name = %item.original.name,
                        error = %err,
                        "batch item failed"
                    );
                    item.error = Some(UserMessage::from_error(&err));
                    item.advance(FileStatus::Error);
                    summary.failed += 1;
                }
            }
        }
        info!(done = summary.done, failed = summary.failed, "batch finished");
        summary
    }

    /// Remove one item, revoking its URL. Returns whether it existed.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// `(file name, bytes)` for every finished item, in queue order.
    pub fn completed_outputs(&self, suffix: &str) -> Vec<(String, &[u8])> {
        self.items
            .iter()
            .filter(|item| item.status == FileStatus::Done)
            .filter_map(|item| {
                let outcome = item.outcome.as_ref()?;
                Some((
                    output_file_name(&item.original.name, suffix, outcome.format),
                    outcome.data.as_slice(),
                ))
            })
            .collect()
    }

    /// Hand every finished output to `sink`. Returns how many were written.
    pub fn export_completed(&self, sink: &mut impl ArchiveSink, suffix: &str) -> Result<usize> {
        let outputs = self.completed_outputs(suffix);
        for (name, data) in &outputs {
            sink.add_entry(name, data)?;
        }
        Ok(outputs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineConfig;
    use crate::engine::encoder::NativeEncoder;
    use crate::engine::pool::CompressionWorker;
    use crate::ops::OutputFormat;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Arc;

    fn png(name: &str) -> SourceImage {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(24, 24, |x, y| {
            Rgb([x as u8 * 9, y as u8 * 9, 40])
        }));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png).unwrap();
        SourceImage::from_bytes(name, out)
    }

    fn compressor() -> Compressor {
        Compressor::new(
            EngineConfig::default(),
            Arc::new(NativeEncoder),
            CompressionWorker::inline(),
        )
    }

    #[test]
    fn status_moves_forward_only() {
        use FileStatus::*;
        assert!(Pending.can_advance_to(Compressing));
        assert!(Compressing.can_advance_to(Done));
        assert!(Compressing.can_advance_to(Error));
        assert!(!Pending.can_advance_to(Done));
        assert!(!Done.can_advance_to(Pending));
        assert!(!Error.can_advance_to(Compressing));
    }

    #[test]
    fn add_reports_skipped_files() {
        let mut queue =
            FileQueue::new(AcceptPolicy::only(OutputFormat::Png), ObjectUrlRegistry::new());
        let report = queue.add_files(vec![
            png("a.png"),
            SourceImage::new("b.jpg", "image/jpeg", vec![0xFF, 0xD8]),
        ]);
        assert_eq!(report.accepted, vec![1]);
        assert_eq!(report.skipped, vec!["b.jpg"]);
        assert_eq!(report.warning.as_deref(), Some("Only .PNG files are allowed. Skipped: b.jpg"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn failure_does_not_stop_the_batch() {
        let registry = ObjectUrlRegistry::new();
        let mut queue = FileQueue::new(AcceptPolicy::any_image(), registry.clone());
        queue.add_files(vec![
            png("one.png"),
            SourceImage::new("two.png", "image/png", b"\x89PNG\r\n\x1a\nxx".to_vec()),
            png("three.png"),
        ]);
        let settings = CompressionSettings::default().with_format(OutputFormat::Png);
        let summary = queue.process_all(&compressor(), &settings);
        assert_eq!(summary, BatchSummary { done: 2, failed: 1 });
        assert!(queue.items().iter().all(|item| item.status().is_terminal()));
        assert_eq!(queue.items()[1].error(), Some(UserMessage::GenericFailure));
        assert_eq!(registry.live_count(), 2);

        let second = queue.process_all(&compressor(), &settings);
        assert_eq!(second, BatchSummary::default());
    }

    #[test]
    fn export_names_follow_output_format() {
        let mut queue = FileQueue::new(AcceptPolicy::any_image(), ObjectUrlRegistry::new());
        queue.add_files(vec![png("scan.final.png")]);
        let settings = CompressionSettings::default().with_format(OutputFormat::WebP);
        queue.process_all(&compressor(), &settings);
        let mut sink: Vec<(String, Vec<u8>)> = Vec::new();
        assert_eq!(queue.export_completed(&mut sink, "compressed").unwrap(), 1);
        assert_eq!(sink[0].0, "scan-compressed.webp");
    }

    #[test]
    fn remove_and_reset_revoke_urls() {
        let registry = ObjectUrlRegistry::new();
        let mut queue = FileQueue::new(AcceptPolicy::any_image(), registry.clone());
        let report = queue.add_files(vec![png("a.png"), png("b.png")]);
        queue.process_all(&compressor(), &CompressionSettings::default());
        assert_eq!(registry.live_count(), 2);

        assert!(queue.remove(report.accepted[0]));
        assert!(!queue.remove(999));
        assert_eq!(registry.live_count(), 1);

        queue.reset();
        assert!(queue.is_empty());
        assert_eq!(registry.live_count(), 0);
    }
}
