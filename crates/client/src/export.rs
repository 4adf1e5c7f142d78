//! Export orchestration: request an artifact from the backend and hand it
//! to a download sink.
//!
//! At most one export runs at a time. The gate is a single slot holding the
//! ticket of the export in flight; taking the slot and checking it happen
//! under one lock, and the slot is released when the export future finishes
//! or is dropped.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use chrono::{DateTime, Utc};
use pricelist_catalog::SelectionTracker;
use pricelist_core::ProductId;
use uuid::Uuid;

use crate::api::{ApiError, CatalogApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    All,
    Selected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Spreadsheet,
    Xml,
}

impl ExportFormat {
    /// Path segment and file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Spreadsheet => "xlsx",
            ExportFormat::Xml => "xml",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Xml => "application/xml",
        }
    }

    pub fn file_name(&self) -> String {
        format!("products.{}", self.as_str())
    }
}

impl core::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "spreadsheet" => Ok(ExportFormat::Spreadsheet),
            "xml" => Ok(ExportFormat::Xml),
            other => Err(ExportError::Validation(format!(
                "unsupported export format {other:?}"
            ))),
        }
    }
}

/// One export request, built per user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    scope: ExportScope,
    format: ExportFormat,
    ids: Vec<ProductId>,
}

impl ExportJob {
    /// Validate a scope/format/ids combination.
    ///
    /// XML is only offered for selections, and a selection export needs at
    /// least one id.
    pub fn new(
        scope: ExportScope,
        format: ExportFormat,
        ids: Vec<ProductId>,
    ) -> Result<Self, ExportError> {
        match scope {
            ExportScope::All if format != ExportFormat::Spreadsheet => Err(
                ExportError::Validation("full catalog export is only available as xlsx".into()),
            ),
            ExportScope::All => Ok(Self {
                scope,
                format,
                ids: Vec::new(),
            }),
            ExportScope::Selected if ids.is_empty() => Err(ExportError::Validation(
                "select at least one product to export".into(),
            )),
            ExportScope::Selected => Ok(Self { scope, format, ids }),
        }
    }

    pub fn all() -> Self {
        Self {
            scope: ExportScope::All,
            format: ExportFormat::Spreadsheet,
            ids: Vec::new(),
        }
    }

    pub fn selected(format: ExportFormat, ids: &[ProductId]) -> Result<Self, ExportError> {
        Self::new(ExportScope::Selected, format, ids.to_vec())
    }

    pub fn scope(&self) -> ExportScope {
        self.scope
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn ids(&self) -> &[ProductId] {
        &self.ids
    }

    pub fn file_name(&self) -> String {
        self.format.file_name()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{0}")]
    Validation(String),
    #[error("another export is already in progress")]
    Busy,
    #[error("export request failed: {0}")]
    Api(#[from] ApiError),
    #[error("could not save the exported file: {0}")]
    Delivery(String),
}

/// Receives finished export payloads (the client-side "download").
pub trait DownloadSink: Send + Sync {
    /// Store `payload` under `file_name`, returning where it ended up.
    fn deliver(&self, file_name: &str, payload: &[u8]) -> anyhow::Result<PathBuf>;
}

/// Writes downloads into a directory, replacing files of the same name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&self, file_name: &str, payload: &[u8]) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create export directory at {:?}", self.dir))?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, payload)
            .with_context(|| format!("failed to write export file {:?}", path))?;
        Ok(path)
    }
}

/// User-facing notices (the blocking alert of a browser UI).
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(notice = message, "user notice");
    }
}

/// The export currently holding the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTicket {
    pub id: Uuid,
    pub scope: ExportScope,
    pub format: ExportFormat,
    pub started_at: DateTime<Utc>,
}

/// A finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub ticket: Uuid,
    pub file_name: String,
    pub content_type: &'static str,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Releases the gate on drop, so success, failure and cancellation all
/// leave the coordinator ready.
struct SlotGuard<'a> {
    slot: &'a Mutex<Option<ExportTicket>>,
    id: Uuid,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|ticket| ticket.id == self.id) {
            *slot = None;
        }
    }
}

/// Runs export requests against the backend, one at a time.
pub struct ExportCoordinator {
    api: CatalogApi,
    sink: Arc<dyn DownloadSink>,
    notifier: Arc<dyn Notifier>,
    slot: Mutex<Option<ExportTicket>>,
}

impl ExportCoordinator {
    pub fn new(api: CatalogApi, sink: Arc<dyn DownloadSink>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            sink,
            notifier,
            slot: Mutex::new(None),
        }
    }

    /// Whether an export is in flight (drives the "loading" state of buttons).
    pub fn is_busy(&self) -> bool {
        self.in_flight().is_some()
    }

    pub fn in_flight(&self) -> Option<ExportTicket> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Export the whole catalog as `products.xlsx`.
    pub async fn export_all(&self) -> Result<Delivered, ExportError> {
        self.run(ExportJob::all()).await
    }

    /// Export the selected products as `products.<format>`.
    ///
    /// An empty selection is rejected before any request is made.
    pub async fn export_selected(
        &self,
        format: ExportFormat,
        selection: &SelectionTracker,
    ) -> Result<Delivered, ExportError> {
        match ExportJob::selected(format, selection.ids()) {
            Ok(job) => self.run(job).await,
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Full catalog when nothing is selected, selected rows as xlsx otherwise.
    pub async fn export_default(
        &self,
        selection: &SelectionTracker,
    ) -> Result<Delivered, ExportError> {
        if selection.is_empty() {
            self.export_all().await
        } else {
            self.export_selected(ExportFormat::Spreadsheet, selection).await
        }
    }

    /// Run a validated job, reporting failures through the notifier.
    pub async fn run(&self, job: ExportJob) -> Result<Delivered, ExportError> {
        let guard = match self.acquire(&job) {
            Some(guard) => guard,
            None => {
                tracing::debug!(scope = ?job.scope(), "export rejected: gate is taken");
                return Err(ExportError::Busy);
            }
        };

        tracing::info!(
            ticket = %guard.id,
            scope = ?job.scope(),
            format = job.format().as_str(),
            ids = job.ids().len(),
            "export started"
        );

        let result = self.execute(&job, guard.id).await;
        match &result {
            Ok(delivered) => tracing::info!(
                ticket = %delivered.ticket,
                path = %delivered.path.display(),
                content_type = delivered.content_type,
                bytes = delivered.bytes,
                "export delivered"
            ),
            Err(err) => self.report(err),
        }

        drop(guard);
        result
    }

    fn acquire(&self, job: &ExportJob) -> Option<SlotGuard<'_>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return None;
        }
        let ticket = ExportTicket {
            id: Uuid::now_v7(),
            scope: job.scope(),
            format: job.format(),
            started_at: Utc::now(),
        };
        let id = ticket.id;
        *slot = Some(ticket);
        Some(SlotGuard {
            slot: &self.slot,
            id,
        })
    }

    async fn execute(&self, job: &ExportJob, ticket: Uuid) -> Result<Delivered, ExportError> {
        let payload = match job.scope() {
            ExportScope::All => self.api.export_all().await?,
            ExportScope::Selected => self.api.export_selected(job.format(), job.ids()).await?,
        };

        let file_name = job.file_name();
        let bytes = payload.len();

        // Sinks do blocking file IO.
        let sink = Arc::clone(&self.sink);
        let target = file_name.clone();
        let path = tokio::task::spawn_blocking(move || sink.deliver(&target, &payload))
            .await
            .map_err(|e| ExportError::Delivery(format!("delivery task failed: {e}")))?
            .map_err(|e| ExportError::Delivery(format!("{e:#}")))?;

        Ok(Delivered {
            ticket,
            file_name,
            content_type: job.format().content_type(),
            path,
            bytes,
        })
    }

    fn report(&self, err: &ExportError) {
        tracing::error!(error = %err, "export failed");
        self.notifier.notify(&format!("Export failed: {err}"));
    }
}
