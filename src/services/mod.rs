// src/services/mod.rs
pub mod api_client;
pub mod credential_store;
pub mod image_processor;

pub use api_client::{ApiClient, AuthApi, ReportApi};
pub use credential_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use image_processor::{ImageProcessor, Preview};
