// src/stores/upload.rs
use crate::errors::TextileGuardError;
use crate::models::{ImageUpload, Report};
use crate::services::{ImageProcessor, Preview, ReportApi};
use bytes::Bytes;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Selected,
    Submitting,
}

/// An image picked by the user, waiting to be analysed.
#[derive(Debug)]
pub struct PendingUpload {
    pub image: ImageUpload,
    pub preview: Preview,
}

/// What the view needs to show about the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionInfo {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    pub preview_path: PathBuf,
    pub preview_dimensions: (u32, u32),
}

#[derive(Debug)]
enum Slot {
    Idle,
    Selected(PendingUpload),
    Submitting(PendingUpload),
}

pub struct UploadFlow {
    api: Arc<dyn ReportApi>,
    processor: ImageProcessor,
    slot: Mutex<Slot>,
}

impl UploadFlow {
    pub fn new(api: Arc<dyn ReportApi>, processor: ImageProcessor) -> Self {
        Self {
            api,
            processor,
            slot: Mutex::new(Slot::Idle),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> UploadState {
        match *self.slot() {
            Slot::Idle => UploadState::Idle,
            Slot::Selected(_) => UploadState::Selected,
            Slot::Submitting(_) => UploadState::Submitting,
        }
    }

    pub fn selection(&self) -> Option<SelectionInfo> {
        match &*self.slot() {
            Slot::Idle => None,
            Slot::Selected(pending) | Slot::Submitting(pending) => Some(SelectionInfo {
                filename: pending.image.filename.clone(),
                content_type: pending.image.content_type.clone(),
                size: pending.image.size(),
                preview_path: pending.preview.path().to_path_buf(),
                preview_dimensions: pending.preview.dimensions(),
            }),
        }
    }

    pub fn preview_data_uri(&self) -> Option<Result<String, TextileGuardError>> {
        match &*self.slot() {
            Slot::Idle => None,
            Slot::Selected(pending) | Slot::Submitting(pending) => Some(pending.preview.to_data_uri()),
        }
    }

    /// Reads `path` and makes it the current selection. Decoding and
    /// thumbnailing run on the blocking pool.
    pub async fn select_file(&self, path: &Path) -> Result<SelectionInfo, TextileGuardError> {
        self.ensure_not_submitting()?;
        let data = tokio::fs::read(path).await.map_err(|e| {
            TextileGuardError::validation(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let data = Bytes::from(data);
        let processor = self.processor.clone();
        let source = data.clone();
        let preview = tokio::task::spawn_blocking(move || processor.create_preview(&source))
            .await
            .map_err(|e| TextileGuardError::ImageProcessing(format!("Preview task failed: {}", e)))??;
        self.install(filename, data, preview)
    }

    /// Replaces the current selection; the previous preview is released.
    pub fn select_bytes(&self, filename: String, data: Bytes) -> Result<SelectionInfo, TextileGuardError> {
        self.ensure_not_submitting()?;
        let preview = self.processor.create_preview(&data)?;
        self.install(filename, data, preview)
    }

    fn ensure_not_submitting(&self) -> Result<(), TextileGuardError> {
        if self.state() == UploadState::Submitting {
            return Err(TextileGuardError::validation("An upload is already in progress"));
        }
        Ok(())
    }

    fn install(
        &self,
        filename: String,
        data: Bytes,
        preview: Preview,
    ) -> Result<SelectionInfo, TextileGuardError> {
        let content_type = self.processor.content_type(&data).to_string();
        let pending = PendingUpload {
            image: ImageUpload {
                filename,
                content_type,
                data,
            },
            preview,
        };

        let mut slot = self.slot();
        // An upload may have started while the preview was being built.
        if matches!(*slot, Slot::Submitting(_)) {
            return Err(TextileGuardError::validation("An upload is already in progress"));
        }
        info!("Selected {} ({} bytes)", pending.image.filename, pending.image.size());
        let previous = std::mem::replace(&mut *slot, Slot::Selected(pending));
        drop(previous);
        drop(slot);

        self.selection()
            .ok_or_else(|| TextileGuardError::validation("Selection was cleared"))
    }

    pub fn clear_selection(&self) -> Result<(), TextileGuardError> {
        let mut slot = self.slot();
        match *slot {
            Slot::Submitting(_) => Err(TextileGuardError::validation("An upload is already in progress")),
            _ => {
                *slot = Slot::Idle;
                Ok(())
            }
        }
    }

    /// Sends the selected image for analysis and returns the new report.
    /// On failure the selection is kept so the user can retry.
    pub async fn submit(&self) -> Result<Report, TextileGuardError> {
        let image = {
            let mut slot = self.slot();
            match std::mem::replace(&mut *slot, Slot::Idle) {
                Slot::Selected(pending) => {
                    let image = pending.image.clone();
                    *slot = Slot::Submitting(pending);
                    image
                }
                Slot::Idle => {
                    return Err(TextileGuardError::validation(
                        "Please select or capture an image first!",
                    ));
                }
                submitting @ Slot::Submitting(_) => {
                    *slot = submitting;
                    return Err(TextileGuardError::validation("An upload is already in progress"));
                }
            }
        };

        info!("Uploading {} for analysis", image.filename);
        let result = self.api.upload_image(image).await;

        let mut slot = self.slot();
        let pending = match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::Submitting(pending) | Slot::Selected(pending) => Some(pending),
            Slot::Idle => None,
        };

        match result {
            Ok(report) => {
                info!("Analysis finished, report {}", report.id);
                Ok(report)
            }
            Err(e) => {
                warn!("Upload failed: {}", e);
                if let Some(pending) = pending {
                    *slot = Slot::Selected(pending);
                }
                Err(e.into_store_error(TextileGuardError::Upload))
            }
        }
    }
}
