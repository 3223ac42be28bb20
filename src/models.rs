// src/models.rs
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const UNTITLED_REPORT: &str = "Untitled Report";
pub const DEFAULT_REPORT_HEADING: &str = "Fabric Analysis Report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Exactly as the server sent it; see [`Report::created_at_time`].
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub archived: bool,
    #[serde(default)]
    pub description: Option<ReportDescription>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub defect_type: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDescription {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overall_severity: Severity,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: Vec<DefectDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefectDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

impl Report {
    pub fn summary(&self) -> Option<&str> {
        self.description
            .as_ref()
            .and_then(|d| d.summary.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn details(&self) -> &[DefectDetail] {
        self.description
            .as_ref()
            .map(|d| d.details.as_slice())
            .unwrap_or_default()
    }

    pub fn severity(&self) -> Severity {
        self.description
            .as_ref()
            .map(|d| d.overall_severity)
            .unwrap_or_default()
    }

    /// Detail titles joined together, or the summary when there are none.
    fn defect_names(&self) -> Option<String> {
        let titles = self
            .details()
            .iter()
            .map(|d| d.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if !titles.is_empty() {
            return Some(titles);
        }
        self.summary().map(str::to_string)
    }

    /// Label used in report lists.
    pub fn list_label(&self) -> String {
        self.defect_names()
            .unwrap_or_else(|| UNTITLED_REPORT.to_string())
    }

    /// Heading used on the detail view.
    pub fn heading(&self) -> &str {
        self.summary().unwrap_or(DEFAULT_REPORT_HEADING)
    }

    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    /// Second precision when the timestamp parses, the raw value otherwise.
    pub fn created_at_label(&self) -> String {
        match self.created_at_time() {
            Some(t) => t.to_rfc3339_opts(SecondsFormat::Secs, true),
            None => self.created_at.clone().unwrap_or_default(),
        }
    }

    /// Text matched by the report search box. Uses the raw server timestamp.
    pub fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.defect_names().unwrap_or_default(),
            self.created_at.as_deref().unwrap_or_default()
        )
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.email)
    }

    pub fn initial(&self) -> char {
        self.name
            .as_deref()
            .and_then(|n| n.chars().next())
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('U')
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// An image ready to be sent to the inference service.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl ImageUpload {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

// Request bodies

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProfileUpdate {
    /// Blank fields become absent so they are left out of the request body.
    pub fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            name: keep(self.name),
            password: keep(self.password),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.as_deref().is_none_or(str::is_empty)
            && self.password.as_deref().is_none_or(str::is_empty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

// Response envelopes

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEnvelope {
    pub profile: Profile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsEnvelope {
    #[serde(default)]
    pub reports: Vec<Report>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportEnvelope {
    pub report: Report,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Only plain string details are shown to users.
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

/// The server stores naive UTC datetimes and sends them without an offset.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `null` decodes like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
