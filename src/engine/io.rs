// src/engine/io.rs
//
// Input boundary: source images, the per-tool accept list, and output naming.

use crate::error::PixpressError;
use crate::ops::OutputFormat;
use std::sync::Arc;

/// A user-provided file. Immutable; the bytes are shared, never copied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceImage {
    pub name: String,
    /// MIME type declared by the host (may be empty or wrong)
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
}

impl SourceImage {
    pub fn new(
        name: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Arc<Vec<u8>>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Build a source whose declared MIME comes from sniffing the bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime = OutputFormat::sniff(&bytes)
            .map(|f| f.mime().to_string())
            .unwrap_or_default();
        Self::new(name, mime, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Lowercased text after the last `.`, if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn declared_format(&self) -> Option<OutputFormat> {
        OutputFormat::from_mime(&self.mime)
    }
}

/// The set of formats a tool accepts, by extension or declared MIME.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptPolicy {
    allowed: Vec<OutputFormat>,
}

impl Default for AcceptPolicy {
    fn default() -> Self {
        Self::any_image()
    }
}

impl AcceptPolicy {
    pub fn any_image() -> Self {
        Self {
            allowed: vec![OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP],
        }
    }

    pub fn only(format: OutputFormat) -> Self {
        Self {
            allowed: vec![format],
        }
    }

    pub fn allowed(&self) -> &[OutputFormat] {
        &self.allowed
    }

    pub fn accepts(&self, file: &SourceImage) -> bool {
        let by_extension = file
            .extension()
            .and_then(|ext| OutputFormat::parse(&ext).ok())
            .is_some_and(|f| self.allowed.contains(&f));
        let by_mime = file
            .declared_format()
            .is_some_and(|f| self.allowed.contains(&f));
        by_extension || by_mime
    }

    pub fn check(&self, file: &SourceImage) -> Result<(), PixpressError> {
        if self.accepts(file) {
            Ok(())
        } else {
            Err(PixpressError::rejected_file(file.name.clone(), self.label()))
        }
    }

    /// Split into accepted files and the names of rejected ones, keeping order.
    pub fn partition(&self, files: Vec<SourceImage>) -> (Vec<SourceImage>, Vec<String>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for file in files {
            if self.accepts(&file) {
                accepted.push(file);
            } else {
                rejected.push(file.name);
            }
        }
        (accepted, rejected)
    }

    fn label(&self) -> String {
        match self.allowed.as_slice() {
            [single] => format!(
                "Only .{} files are allowed.",
                single.extension().to_ascii_uppercase()
            ),
            many => {
                let list: Vec<String> = many
                    .iter()
                    .map(|f| format!(".{}", f.extension().to_ascii_uppercase()))
                    .collect();
                format!("Only {} files are allowed.", list.join(", "))
            }
        }
    }

    /// Warning for skipped files, `None` when nothing was skipped.
    pub fn rejection_warning(&self, rejected: &[String]) -> Option<String> {
        if rejected.is_empty() {
            return None;
        }
        Some(format!("{} Skipped: {}", self.label(), rejected.join(", ")))
    }
}

/// `<base>-<suffix>.<ext>`, where base is the name before its first `.`.
pub fn output_file_name(original_name: &str, suffix: &str, format: OutputFormat) -> String {
    let base = original_name.split('.').next().unwrap_or_default();
    let base = if base.is_empty() { "image" } else { base };
    format!("{base}-{suffix}.{}", format.extension())
}
