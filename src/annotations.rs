//! Labelled-image import.
//!
//! Reads a labelling-tool export (a JSON array of tasks) and downloads every
//! referenced image that is not already present in the labels directory.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::http::{build_agent, download_image};

#[derive(Debug, Deserialize)]
struct ExportTask {
    data: ExportData,
    file_upload: String,
}

#[derive(Debug, Deserialize)]
struct ExportData {
    image: String,
}

/// One image to fetch: remote path and local file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelledImage {
    pub remote_path: String,
    pub file_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageOutcome {
    Downloaded,
    AlreadyPresent,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub total: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub malformed: usize,
    pub failed: Vec<String>,
}

impl ImportSummary {
    pub fn succeeded(&self) -> usize {
        self.total - self.malformed - self.failed.len()
    }

    /// Fold export entries that never reached the download stage into the totals.
    pub fn with_malformed(mut self, malformed: usize) -> Self {
        self.total += malformed;
        self.malformed += malformed;
        self
    }
}

pub struct AnnotationImporter {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
    labels_dir: PathBuf,
}

/// Parse an export document. Malformed tasks are counted, not fatal.
pub fn parse_export(raw: &str) -> Result<(Vec<LabelledImage>, usize)> {
    let tasks: Vec<serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| anyhow!("export is not a JSON array: {}", e))?;
    let mut images = Vec::with_capacity(tasks.len());
    let mut malformed = 0;
    for (index, task) in tasks.into_iter().enumerate() {
        match serde_json::from_value::<ExportTask>(task) {
            Ok(task) if is_plain_file_name(&task.file_upload) => images.push(LabelledImage {
                remote_path: task.data.image,
                file_name: task.file_upload,
            }),
            Ok(task) => {
                log::warn!("task {}: unsafe file name '{}'", index, task.file_upload);
                malformed += 1;
            }
            Err(e) => {
                log::warn!("task {}: malformed export entry: {}", index, e);
                malformed += 1;
            }
        }
    }
    Ok((images, malformed))
}

/// Read and parse an export file.
pub fn load_export(export_path: &Path) -> Result<(Vec<LabelledImage>, usize)> {
    let raw = std::fs::read_to_string(export_path)
        .with_context(|| format!("export file {} not found", export_path.display()))?;
    parse_export(&raw)
}

impl AnnotationImporter {
    pub fn new(base_url: &str, token: Option<String>, labels_dir: &Path, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            base_url: base_url.to_string(),
            token,
            labels_dir: labels_dir.to_path_buf(),
        }
    }

    pub fn import_file(&self, export_path: &Path) -> Result<ImportSummary> {
        self.import_file_with(export_path, |_, _| {})
    }

    /// `import_file` reporting each image as it completes.
    pub fn import_file_with(
        &self,
        export_path: &Path,
        on_image: impl FnMut(&LabelledImage, ImageOutcome),
    ) -> Result<ImportSummary> {
        let (images, malformed) = load_export(export_path)?;
        Ok(self.import_with(&images, on_image)?.with_malformed(malformed))
    }

    pub fn import(&self, images: &[LabelledImage]) -> Result<ImportSummary> {
        self.import_with(images, |_, _| {})
    }

    pub fn import_with(
        &self,
        images: &[LabelledImage],
        mut on_image: impl FnMut(&LabelledImage, ImageOutcome),
    ) -> Result<ImportSummary> {
        std::fs::create_dir_all(&self.labels_dir)
            .with_context(|| format!("failed to create {}", self.labels_dir.display()))?;

        let authorization = self.token.as_ref().map(|token| format!("Token {}", token));
        let headers: Vec<(&str, &str)> = authorization
            .as_deref()
            .map(|value| vec![("Authorization", value)])
            .unwrap_or_default();

        let mut summary = ImportSummary {
            total: images.len(),
            ..ImportSummary::default()
        };
        for image in images {
            let destination = self.labels_dir.join(&image.file_name);
            let outcome = if destination.exists() {
                summary.already_present += 1;
                ImageOutcome::AlreadyPresent
            } else if download_image(
                &self.agent,
                &format!("{}{}", self.base_url, image.remote_path),
                &destination,
                &headers,
            ) {
                summary.downloaded += 1;
                ImageOutcome::Downloaded
            } else {
                summary.failed.push(image.file_name.clone());
                ImageOutcome::Failed
            };
            on_image(image, outcome);
        }
        Ok(summary)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .file_name()
            .is_some_and(|file| file.to_string_lossy() == name)
}
