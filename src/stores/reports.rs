// src/stores/reports.rs
use crate::errors::TextileGuardError;
use crate::models::{Report, ReportPatch};
use crate::services::ReportApi;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ReportState {
    /// Most recent first.
    reports: Vec<Report>,
    selected: Option<String>,
    /// Latest mutation ticket issued per report id.
    tickets: HashMap<String, u64>,
    next_ticket: u64,
    fetch_generation: u64,
}

impl ReportState {
    fn position(&self, id: &str) -> Option<usize> {
        self.reports.iter().position(|r| r.id == id)
    }
}

/// Reports matching `query` (case-insensitive) with the given archive flag,
/// in their original order.
pub fn filter_reports<'a>(reports: &'a [Report], query: &str, archived: bool) -> Vec<&'a Report> {
    let needle = query.to_lowercase();
    reports
        .iter()
        .filter(|r| r.archived == archived)
        .filter(|r| r.search_text().to_lowercase().contains(&needle))
        .collect()
}

/// The signed-in user's reports, kept in sync with the backend.
pub struct ReportStore {
    api: Arc<dyn ReportApi>,
    state: Mutex<ReportState>,
}

impl ReportStore {
    pub fn new(api: Arc<dyn ReportApi>) -> Self {
        Self {
            api,
            state: Mutex::new(ReportState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the local set with the server's. Returns the report count.
    pub async fn fetch_all(&self) -> Result<usize, TextileGuardError> {
        let generation = {
            let mut state = self.state();
            state.fetch_generation += 1;
            state.fetch_generation
        };

        let reports = self.api.list_reports().await.map_err(|e| {
            warn!("Failed to fetch reports: {}", e);
            e.into_store_error(TextileGuardError::Fetch)
        })?;

        let mut state = self.state();
        if state.fetch_generation != generation {
            debug!("Dropping report list overtaken by a newer fetch");
            return Ok(state.reports.len());
        }
        state.reports = reports;
        if let Some(selected) = state.selected.clone() {
            if state.position(&selected).is_none() {
                state.selected = None;
            }
        }
        info!("Loaded {} reports", state.reports.len());
        Ok(state.reports.len())
    }

    /// Puts a freshly analysed report at the top and selects it.
    pub fn add(&self, report: Report) {
        let mut state = self.state();
        info!("Added report {}", report.id);
        state.selected = Some(report.id.clone());
        state.reports.insert(0, report);
    }

    pub async fn rename(&self, id: &str, new_summary: &str) -> Result<(), TextileGuardError> {
        let summary = new_summary.trim();
        if summary.is_empty() {
            return Err(TextileGuardError::validation("Report name cannot be empty"));
        }
        self.patch(
            id,
            ReportPatch {
                summary: Some(summary.to_string()),
                archived: None,
            },
        )
        .await
    }

    pub async fn set_archived(&self, id: &str, archived: bool) -> Result<(), TextileGuardError> {
        self.patch(
            id,
            ReportPatch {
                summary: None,
                archived: Some(archived),
            },
        )
        .await
    }

    /// Sends a partial update and applies the server's copy of the report,
    /// unless a newer mutation of the same report was issued meanwhile or the
    /// report is gone.
    async fn patch(&self, id: &str, patch: ReportPatch) -> Result<(), TextileGuardError> {
        let ticket = {
            let mut state = self.state();
            if state.position(id).is_none() {
                return Err(TextileGuardError::Update(Some("Report not found".to_string())));
            }
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            state.tickets.insert(id.to_string(), ticket);
            ticket
        };

        let result = self.api.update_report(id, &patch).await;

        let mut state = self.state();
        let latest = state.tickets.get(id) == Some(&ticket);
        if latest {
            state.tickets.remove(id);
        }

        let updated = result.map_err(|e| {
            warn!("Failed to update report {}: {}", id, e);
            e.into_store_error(TextileGuardError::Update)
        })?;

        match state.position(id) {
            Some(index) if latest => {
                debug!("Applied {:?} to report {}", patch, id);
                state.reports[index] = updated;
            }
            Some(_) => debug!("Ignoring stale update response for report {}", id),
            None => debug!("Ignoring update response for removed report {}", id),
        }
        Ok(())
    }

    /// Deletes on the server first; the local copy goes only once that succeeded.
    pub async fn remove(&self, id: &str) -> Result<(), TextileGuardError> {
        self.api.delete_report(id).await.map_err(|e| {
            warn!("Failed to delete report {}: {}", id, e);
            e.into_store_error(TextileGuardError::Delete)
        })?;

        let mut state = self.state();
        state.reports.retain(|r| r.id != id);
        state.tickets.remove(id);
        if state.selected.as_deref() == Some(id) {
            state.selected = None;
        }
        info!("Deleted report {}", id);
        Ok(())
    }

    pub fn filtered_view(&self, query: &str, archived: bool) -> Vec<Report> {
        let state = self.state();
        filter_reports(&state.reports, query, archived)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn select(&self, id: &str) -> Result<(), TextileGuardError> {
        let mut state = self.state();
        if state.position(id).is_none() {
            return Err(TextileGuardError::validation(format!("No report with id {}", id)));
        }
        state.selected = Some(id.to_string());
        Ok(())
    }

    pub fn selected(&self) -> Option<Report> {
        let state = self.state();
        let id = state.selected.as_deref()?;
        state.reports.iter().find(|r| r.id == id).cloned()
    }

    pub fn get(&self, id: &str) -> Option<Report> {
        self.state().reports.iter().find(|r| r.id == id).cloned()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.state().reports.clone()
    }

    pub fn len(&self) -> usize {
        self.state().reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets everything, e.g. after logout.
    pub fn clear(&self) {
        let mut state = self.state();
        state.reports.clear();
        state.selected = None;
        state.tickets.clear();
        state.fetch_generation += 1;
    }
}
