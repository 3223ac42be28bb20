// src/services/api_client.rs
use crate::errors::ApiError;
use crate::models::*;
use crate::services::CredentialStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, multipart};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Account endpoints of the TextileGuard backend.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn signup(&self, form: &SignupForm) -> Result<SignupResponse, ApiError>;
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;
    async fn profile(&self) -> Result<Profile, ApiError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError>;
}

/// Report endpoints, including the inference upload.
#[async_trait]
pub trait ReportApi: Send + Sync {
    async fn list_reports(&self) -> Result<Vec<Report>, ApiError>;
    async fn upload_image(&self, image: ImageUpload) -> Result<Report, ApiError>;
    async fn update_report(&self, id: &str, patch: &ReportPatch) -> Result<Report, ApiError>;
    async fn delete_report(&self, id: &str) -> Result<(), ApiError>;
}

pub struct ApiClient {
    base_url: String,
    client: Client,
    credentials: Arc<dyn CredentialStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            credentials,
        }
    }

    pub fn with_timeout(
        base_url: &str,
        credentials: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the bearer token as it is stored right now, so a logout
    /// takes effect on the very next request.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = Self::check(self.authorized(request).send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        Self::check(self.authorized(request).send().await?).await?;
        Ok(())
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&error_text)
            .ok()
            .and_then(|body| body.message());
        log::debug!("Backend answered {}: {}", status, error_text);
        Err(ApiError::Status { status, detail })
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn signup(&self, form: &SignupForm) -> Result<SignupResponse, ApiError> {
        self.send(self.client.post(self.url("/auth/signup")).json(form))
            .await
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.send(self.client.post(self.url("/auth/login")).json(credentials))
            .await
    }

    async fn profile(&self) -> Result<Profile, ApiError> {
        let envelope: ProfileEnvelope = self.send(self.client.get(self.url("/auth/profile"))).await?;
        Ok(envelope.profile)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        self.send_empty(self.client.put(self.url("/auth/profile")).json(update))
            .await
    }
}

#[async_trait]
impl ReportApi for ApiClient {
    async fn list_reports(&self) -> Result<Vec<Report>, ApiError> {
        let envelope: ReportsEnvelope = self.send(self.client.get(self.url("/report"))).await?;
        Ok(envelope.reports)
    }

    async fn upload_image(&self, image: ImageUpload) -> Result<Report, ApiError> {
        let length = image.size() as u64;
        let part = multipart::Part::stream_with_length(image.data, length)
            .file_name(image.filename)
            .mime_str(&image.content_type)?;
        let form = multipart::Form::new().part("image", part);

        let envelope: ReportEnvelope = self
            .send(self.client.post(self.url("/report/upload")).multipart(form))
            .await?;
        Ok(envelope.report)
    }

    async fn update_report(&self, id: &str, patch: &ReportPatch) -> Result<Report, ApiError> {
        let envelope: ReportEnvelope = self
            .send(self.client.patch(self.url(&format!("/report/{}", id))).json(patch))
            .await?;
        Ok(envelope.report)
    }

    async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(self.client.delete(self.url(&format!("/report/{}", id))))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryCredentialStore;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = ApiClient::new(
            "https://textile.example.com/",
            Arc::new(MemoryCredentialStore::new()),
        );
        assert_eq!(client.url("/report"), "https://textile.example.com/report");
    }

    #[test]
    fn bearer_follows_credential_store() {
        let store = Arc::new(MemoryCredentialStore::with_token("t1"));
        let client = ApiClient::new("http://localhost", store.clone());

        let request = client
            .authorized(client.client.get(client.url("/report")))
            .build()
            .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer t1");

        store.clear_token().unwrap();
        let request = client
            .authorized(client.client.get(client.url("/report")))
            .build()
            .unwrap();
        assert!(request.headers().get("authorization").is_none());
    }
}
