//! Client for the TextileGuard fabric inspection service: session handling,
//! the report list, image upload, and a terminal front end.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod stores;

use std::sync::Arc;

use crate::config::Config;
use crate::handlers::App;
use crate::services::{ApiClient, CredentialStore, FileCredentialStore, ImageProcessor};
use crate::stores::{ReportStore, SessionStore, UploadFlow};

/// Wires the stores to one shared HTTP client and credential store.
pub fn build_app(config: &Config, credentials: Arc<dyn CredentialStore>) -> anyhow::Result<App> {
    let api = Arc::new(ApiClient::with_timeout(
        &config.api_url,
        credentials.clone(),
        config.http_timeout,
    )?);

    let session = SessionStore::new(api.clone(), credentials.clone());
    let reports = ReportStore::new(api.clone());
    let upload = UploadFlow::new(
        api,
        ImageProcessor::new(config.preview_dir(), config.preview_size),
    );

    Ok(App::new(session, reports, upload, credentials))
}

/// Same as [`build_app`], persisting credentials under the configured data directory.
pub fn build_app_from_config(config: &Config) -> anyhow::Result<App> {
    let credentials = Arc::new(FileCredentialStore::open(config.credentials_path())?);
    build_app(config, credentials)
}
