//! Spreadsheet page
//!
//! One sheet's worth of state wired together: the grid controller holds the
//! local snapshot and view state, the bulk coordinator is the only path to
//! the store for writes, and the codec handles files in and out.
//!
//! Every successful mutation ends with a re-sync from the store. Bulk
//! actions clear the selection when they succeed and leave it alone when
//! they fail, so the user can retry the same batch.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use labgrid_config::Settings;
use labgrid_engine::column::{ColumnRegistry, RecordType};
use labgrid_engine::controller::GridController;
use labgrid_engine::error::ColumnError;
use labgrid_engine::record::{Fields, Record, RecordId};
use labgrid_engine::value::Value;
use labgrid_io::csv::{self as csv_io, ExportOptions};
use labgrid_io::import::{import_summary, registry_row_parser, required_columns, ImportOutcome};
use labgrid_io::xlsx;
use labgrid_io::{ExportError, ImportError};
use labgrid_store::{BulkCoordinator, BulkError, BulkOutcome, RecordStore, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Bulk(#[from] BulkError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error("import failed: {0}")]
    Import(#[from] ImportError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

impl PageError {
    /// Edited record was gone; the list has already been re-synced
    pub fn is_not_found(&self) -> bool {
        match self {
            PageError::Bulk(e) => e.is_not_found(),
            PageError::Store(e) => matches!(e, StoreError::NotFound(_)),
            _ => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PageError::Bulk(e) => e.is_retryable(),
            PageError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result of a file import that reached the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    /// 1-based line/row numbers that were skipped
    pub skipped_lines: Vec<usize>,
}

impl ImportReport {
    fn from_outcome<T>(outcome: &ImportOutcome<T>) -> Self {
        Self {
            imported: outcome.accepted,
            skipped: outcome.rejected,
            skipped_lines: outcome.rejected_lines.clone(),
        }
    }

    pub fn summary(&self) -> String {
        import_summary(self.imported, self.skipped)
    }
}

pub struct GridPage<S> {
    controller: GridController,
    bulk: BulkCoordinator<S>,
    settings: Settings,
}

impl<S: RecordStore> GridPage<S> {
    /// Load the sheet from the store and apply the saved column layout
    pub async fn open(
        registry: ColumnRegistry,
        store: S,
        settings: Settings,
    ) -> Result<Self, PageError> {
        let bulk = BulkCoordinator::new(store, registry.clone());
        let records = bulk.list().await?;
        log::info!("{}: loaded {} record(s)", registry.name(), records.len());

        let saved = settings
            .saved_hidden_columns(registry.name())
            .map(<[String]>::to_vec);
        let mut controller = GridController::new(registry, records);
        // A saved layout is the whole hidden set, not additions to the defaults
        if let Some(hidden) = saved {
            controller.show_all_columns();
            controller.hide_columns(&hidden);
        }

        Ok(Self {
            controller,
            bulk,
            settings,
        })
    }

    pub async fn open_record_type(
        record_type: RecordType,
        store: S,
        settings: Settings,
    ) -> Result<Self, PageError> {
        Self::open(record_type.registry(), store, settings).await
    }

    pub fn controller(&self) -> &GridController {
        &self.controller
    }

    /// View state (filters, sort, selection). Writes go through the page.
    pub fn controller_mut(&mut self) -> &mut GridController {
        &mut self.controller
    }

    pub fn store(&self) -> &S {
        self.bulk.store()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ColumnRegistry {
        self.controller.registry()
    }

    /// A bulk action is in flight; bulk controls should be disabled
    pub fn is_busy(&self) -> bool {
        self.bulk.is_pending()
    }

    // ------------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------------

    /// Replace the local snapshot with the store's current list
    pub async fn refresh(&mut self) -> Result<(), PageError> {
        let records = self.bulk.list().await?;
        self.controller.set_records(records);
        Ok(())
    }

    /// Re-sync after a failure that may have changed the store. A failed
    /// re-sync is logged; the original error is what the caller sees.
    async fn resync_after_failure(&mut self) {
        if let Err(e) = self.refresh().await {
            log::warn!("{}: re-sync failed: {}", self.registry().name(), e);
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Delete every selected record in one batch
    pub async fn delete_selected(&mut self) -> Result<BulkOutcome, PageError> {
        let ids = self.controller.selected_ids();
        let result = self.bulk.bulk_delete(&ids).await;
        self.finish_bulk(result).await
    }

    /// Set the status column of every selected record in one batch
    pub async fn update_selected_status(&mut self, status: &str) -> Result<BulkOutcome, PageError> {
        let ids = self.controller.selected_ids();
        let result = self.bulk.bulk_update_status(&ids, status).await;
        self.finish_bulk(result).await
    }

    async fn finish_bulk(
        &mut self,
        result: Result<BulkOutcome, BulkError>,
    ) -> Result<BulkOutcome, PageError> {
        match result {
            Ok(outcome) => {
                // A no-op retry may still mean the local list is stale
                self.controller.deselect_all();
                self.refresh().await?;
                Ok(outcome)
            }
            Err(e) => {
                // Part of the batch may have landed
                if matches!(e, BulkError::Incomplete { .. }) {
                    self.resync_after_failure().await;
                }
                Err(e.into())
            }
        }
    }

    /// Save one cell. A record that's gone re-syncs the list and comes back
    /// as an error the caller can show as a notice.
    pub async fn edit_cell(
        &mut self,
        id: &RecordId,
        column_id: &str,
        value: Value,
    ) -> Result<Record, PageError> {
        match self.bulk.update_record(id, column_id, value).await {
            Ok(record) => {
                self.refresh().await?;
                Ok(record)
            }
            Err(e) if e.is_not_found() => {
                log::info!(
                    "{}: {} was removed elsewhere; re-syncing",
                    self.registry().name(),
                    id
                );
                self.resync_after_failure().await;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Add new records from validated payloads
    pub async fn insert(&mut self, payloads: &[Fields]) -> Result<BulkOutcome, PageError> {
        let outcome = self.bulk.bulk_insert(payloads).await?;
        if outcome != BulkOutcome::NoOp {
            self.refresh().await?;
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------------

    /// Import CSV text; the delimiter is detected from the content
    pub async fn import_csv(&mut self, text: &str) -> Result<ImportReport, PageError> {
        let registry = self.controller.registry();
        let outcome = csv_io::parse_import_file(
            text,
            csv_io::sniff_delimiter(text),
            &required_columns(registry),
            registry_row_parser(registry),
        )?;
        self.finish_import(outcome).await
    }

    pub async fn import_csv_file(&mut self, path: &Path) -> Result<ImportReport, PageError> {
        let text = csv_io::read_file_as_utf8(path)?;
        self.import_csv(&text).await
    }

    /// Import the named sheet of a workbook, or its first sheet
    pub async fn import_workbook(
        &mut self,
        path: &Path,
        sheet: Option<&str>,
    ) -> Result<ImportReport, PageError> {
        let registry = self.controller.registry();
        let outcome = xlsx::parse_import_workbook(
            path,
            sheet,
            &required_columns(registry),
            registry_row_parser(registry),
        )?;
        self.finish_import(outcome).await
    }

    async fn finish_import(
        &mut self,
        outcome: ImportOutcome<Fields>,
    ) -> Result<ImportReport, PageError> {
        let report = ImportReport::from_outcome(&outcome);
        self.insert(&outcome.rows).await?;
        log::info!("{}: {}", self.registry().name(), report.summary());
        Ok(report)
    }

    /// CSV with every column's header and one example row
    pub fn import_template(&self) -> Result<String, PageError> {
        Ok(csv_io::import_template(self.controller.registry())?)
    }

    // ------------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------------

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            delimiter: self.settings.export_delimiter.as_byte(),
            include_created_at: self.settings.include_created_at,
        }
    }

    /// `<prefix>-<sheet>-<date>.<ext>`
    pub fn export_filename(&self, date: NaiveDate, ext: &str) -> String {
        self.settings
            .export_filename(self.registry().name(), date.format("%Y-%m-%d"), ext)
    }

    /// Visible rows and columns, in display order, as CSV text
    pub fn export_csv_string(&self) -> Result<String, PageError> {
        let columns = self.controller.visible_columns();
        Ok(csv_io::export_csv_string(
            &columns,
            self.controller.visible_records(),
            &self.export_options(),
        )?)
    }

    /// Write the visible rows to `<dir>/<filename>.csv`
    pub fn export_csv(&self, dir: &Path, date: NaiveDate) -> Result<PathBuf, PageError> {
        let path = dir.join(self.export_filename(date, "csv"));
        let columns = self.controller.visible_columns();
        csv_io::export_csv(
            &path,
            &columns,
            self.controller.visible_records(),
            &self.export_options(),
        )?;
        self.log_export(&path);
        Ok(path)
    }

    /// Write the visible rows to `<dir>/<filename>.xlsx`
    pub fn export_xlsx(&self, dir: &Path, date: NaiveDate) -> Result<PathBuf, PageError> {
        let path = dir.join(self.export_filename(date, "xlsx"));
        let columns = self.controller.visible_columns();
        xlsx::export_xlsx(
            &path,
            self.registry().name(),
            &columns,
            self.controller.visible_records(),
            &self.export_options(),
        )?;
        self.log_export(&path);
        Ok(path)
    }

    fn log_export(&self, path: &Path) {
        log::info!(
            "{}: exported {} row(s) to {}",
            self.registry().name(),
            self.controller.visible_len(),
            path.display()
        );
    }

    // ------------------------------------------------------------------------
    // Column layout
    // ------------------------------------------------------------------------

    /// Show or hide a column and remember the choice in the settings
    pub fn set_column_visible(&mut self, column_id: &str, visible: bool) -> Result<(), PageError> {
        self.controller.set_column_visible(column_id, visible)?;
        self.remember_layout();
        Ok(())
    }

    pub fn toggle_column(&mut self, column_id: &str) -> Result<(), PageError> {
        self.controller.toggle_column(column_id)?;
        self.remember_layout();
        Ok(())
    }

    pub fn show_all_columns(&mut self) {
        self.controller.show_all_columns();
        self.remember_layout();
    }

    fn remember_layout(&mut self) {
        let hidden = self.controller.hidden_columns();
        let sheet = self.controller.registry().name().to_string();
        self.settings.set_hidden_columns(&sheet, hidden);
    }
}
