// src/handlers.rs
use crate::errors::TextileGuardError;
use crate::models::{Credentials, ProfileUpdate, Report, SignupForm, Theme};
use crate::routes::{self, Route};
use crate::services::CredentialStore;
use crate::stores::{ReportStore, SessionStore, UploadFlow, UploadState};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

pub const HELP: &str = "\
Commands:
  go <path>                         open /login, /signup or /home
  login <email> <password>
  signup <email> <password> <confirm> <name...>
  logout
  list | refresh                    show or reload your reports
  search [text]                     filter by defect or date (empty clears)
  archived                          switch between active and archived reports
  select <n|id>                     show a report in detail
  rename <n|id> <new name...>
  archive <n|id> | unarchive <n|id>
  delete <n|id>
  pick <image path>                 choose a fabric image
  remove                            drop the chosen image
  preview                           print the chosen image as a data URI
  upload                            upload and analyse the chosen image
  theme                             toggle light/dark
  name <new name...> | password <new password>
  help | quit";

/// A user intent, parsed from one line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Go(String),
    Login(String, String),
    Signup {
        email: String,
        password: String,
        confirm_password: String,
        name: String,
    },
    Logout,
    List,
    Refresh,
    Search(String),
    ToggleArchived,
    Select(String),
    Rename(String, String),
    Archive(String),
    Unarchive(String),
    Delete(String),
    Pick(PathBuf),
    RemoveImage,
    Preview,
    Upload,
    ToggleTheme,
    ChangeName(String),
    ChangePassword(String),
    Help,
    Quit,
}

pub fn parse_intent(line: &str) -> Result<Intent, TextileGuardError> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();
    let usage = |text: &str| TextileGuardError::validation(format!("Usage: {}", text));

    let intent = match command.to_lowercase().as_str() {
        "go" => match args.as_slice() {
            [path] => Intent::Go(path.to_string()),
            _ => return Err(usage("go <path>")),
        },
        "login" => match args.as_slice() {
            [email, password] => Intent::Login(email.to_string(), password.to_string()),
            _ => return Err(usage("login <email> <password>")),
        },
        "signup" => match args.as_slice() {
            [email, password, confirm, name @ ..] if !name.is_empty() => Intent::Signup {
                email: email.to_string(),
                password: password.to_string(),
                confirm_password: confirm.to_string(),
                name: name.join(" "),
            },
            _ => return Err(usage("signup <email> <password> <confirm> <name...>")),
        },
        "logout" => Intent::Logout,
        "list" | "ls" => Intent::List,
        "refresh" => Intent::Refresh,
        "search" => Intent::Search(rest.to_string()),
        "archived" => Intent::ToggleArchived,
        "select" | "show" => match args.as_slice() {
            [target] => Intent::Select(target.to_string()),
            _ => return Err(usage("select <n|id>")),
        },
        "rename" => match args.as_slice() {
            [target, ..] => {
                let name = rest[target.len()..].trim().to_string();
                Intent::Rename(target.to_string(), name)
            }
            _ => return Err(usage("rename <n|id> <new name...>")),
        },
        "archive" | "unarchive" | "delete" => match args.as_slice() {
            [target] => {
                let target = target.to_string();
                match command.to_lowercase().as_str() {
                    "archive" => Intent::Archive(target),
                    "unarchive" => Intent::Unarchive(target),
                    _ => Intent::Delete(target),
                }
            }
            _ => return Err(usage(&format!("{} <n|id>", command))),
        },
        "pick" => {
            if rest.is_empty() {
                return Err(usage("pick <image path>"));
            }
            Intent::Pick(PathBuf::from(rest))
        }
        "remove" => Intent::RemoveImage,
        "preview" => Intent::Preview,
        "upload" => Intent::Upload,
        "theme" => Intent::ToggleTheme,
        "name" => {
            if rest.is_empty() {
                return Err(usage("name <new name...>"));
            }
            Intent::ChangeName(rest.to_string())
        }
        "password" => match args.as_slice() {
            [password] => Intent::ChangePassword(password.to_string()),
            _ => return Err(usage("password <new password>")),
        },
        "help" | "?" => Intent::Help,
        "quit" | "exit" => Intent::Quit,
        other => {
            return Err(TextileGuardError::validation(format!(
                "Unknown command '{}', type 'help'",
                other
            )));
        }
    };
    Ok(intent)
}

#[derive(Debug)]
struct ViewState {
    route: Route,
    search: String,
    show_archived: bool,
    theme: Theme,
}

/// The application shell: owns the stores and the per-screen view state,
/// turns intents into store calls.
pub struct App {
    pub session: SessionStore,
    pub reports: ReportStore,
    pub upload: UploadFlow,
    credentials: Arc<dyn CredentialStore>,
    view: ViewState,
}

impl App {
    pub fn new(
        session: SessionStore,
        reports: ReportStore,
        upload: UploadFlow,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let theme = credentials.theme();
        Self {
            session,
            reports,
            upload,
            credentials,
            view: ViewState {
                route: Route::Login,
                search: String::new(),
                show_archived: false,
                theme,
            },
        }
    }

    pub fn route(&self) -> Route {
        self.view.route
    }

    pub fn theme(&self) -> Theme {
        self.view.theme
    }

    /// Restores the session and, when signed in, loads the report list.
    pub async fn initialize(&mut self) -> Result<(), TextileGuardError> {
        self.session.hydrate().await;
        self.go("/home");
        if self.view.route == Route::Home {
            self.reports.fetch_all().await.map(|_| ())
        } else {
            Ok(())
        }
    }

    fn go(&mut self, path: &str) {
        self.view.route = routes::navigate(path, self.session.phase()).unwrap_or(Route::Login);
    }

    /// Runs one intent. `Ok` carries an optional notice for the user.
    pub async fn dispatch(&mut self, intent: Intent) -> Result<Option<String>, TextileGuardError> {
        let result = self.handle(intent).await;
        if let Err(e) = &result {
            if e.is_session_expired() {
                self.session.invalidate();
                self.reset_home();
            }
        }
        result
    }

    async fn handle(&mut self, intent: Intent) -> Result<Option<String>, TextileGuardError> {
        match intent {
            Intent::Help => Ok(Some(HELP.to_string())),
            Intent::Quit => Ok(None),
            Intent::Go(path) => {
                self.go(&path);
                if self.view.route == Route::Home && self.reports.is_empty() {
                    self.reports.fetch_all().await?;
                }
                Ok(None)
            }
            Intent::Login(email, password) => {
                self.session.login(Credentials { email, password }).await?;
                self.reports.clear();
                self.go("/home");
                self.reports.fetch_all().await?;
                Ok(Some("Login successful!".to_string()))
            }
            Intent::Signup {
                email,
                password,
                confirm_password,
                name,
            } => {
                self.session
                    .signup(SignupForm {
                        name,
                        email,
                        password,
                        confirm_password,
                    })
                    .await?;
                self.go("/login");
                Ok(Some("Signup successful! Please login.".to_string()))
            }
            Intent::Logout => {
                self.session.logout();
                self.reset_home();
                Ok(Some("Logged out".to_string()))
            }
            Intent::ToggleTheme => {
                let theme = self.view.theme.toggled();
                self.credentials.set_theme(theme)?;
                self.view.theme = theme;
                Ok(None)
            }
            intent => {
                self.require_home()?;
                self.handle_home(intent).await
            }
        }
    }

    async fn handle_home(&mut self, intent: Intent) -> Result<Option<String>, TextileGuardError> {
        match intent {
            Intent::List => Ok(None),
            Intent::Refresh => {
                let count = self.reports.fetch_all().await?;
                Ok(Some(format!("Loaded {} reports", count)))
            }
            Intent::Search(query) => {
                self.view.search = query;
                Ok(None)
            }
            Intent::ToggleArchived => {
                self.view.show_archived = !self.view.show_archived;
                Ok(None)
            }
            Intent::Select(target) => {
                let id = self.resolve_target(&target)?;
                self.reports.select(&id)?;
                Ok(None)
            }
            Intent::Rename(target, name) => {
                let id = self.resolve_target(&target)?;
                self.reports.rename(&id, &name).await?;
                Ok(Some("Report renamed".to_string()))
            }
            Intent::Archive(target) => {
                let id = self.resolve_target(&target)?;
                self.reports.set_archived(&id, true).await?;
                Ok(Some("Report archived".to_string()))
            }
            Intent::Unarchive(target) => {
                let id = self.resolve_target(&target)?;
                self.reports.set_archived(&id, false).await?;
                Ok(Some("Report restored".to_string()))
            }
            Intent::Delete(target) => {
                let id = self.resolve_target(&target)?;
                self.reports.remove(&id).await?;
                Ok(Some("Report deleted".to_string()))
            }
            Intent::Pick(path) => {
                let selection = self.upload.select_file(&path).await?;
                Ok(Some(format!(
                    "Selected {} ({} KB)",
                    selection.filename,
                    selection.size.div_ceil(1024)
                )))
            }
            Intent::RemoveImage => {
                self.upload.clear_selection()?;
                Ok(None)
            }
            Intent::Preview => match self.upload.preview_data_uri() {
                Some(uri) => uri.map(Some),
                None => Err(TextileGuardError::validation("No image selected")),
            },
            Intent::Upload => {
                let report = self.upload.submit().await?;
                self.reports.add(report);
                Ok(Some("Analysis complete".to_string()))
            }
            Intent::ChangeName(name) => {
                self.session
                    .update_profile(ProfileUpdate {
                        name: Some(name),
                        password: None,
                    })
                    .await?;
                Ok(Some("Profile updated".to_string()))
            }
            Intent::ChangePassword(password) => {
                self.session
                    .update_profile(ProfileUpdate {
                        name: None,
                        password: Some(password),
                    })
                    .await?;
                Ok(Some("Password changed".to_string()))
            }
            other => Err(TextileGuardError::validation(format!("{:?} is not available here", other))),
        }
    }

    fn require_home(&self) -> Result<(), TextileGuardError> {
        if self.view.route == Route::Home && self.session.is_authenticated() {
            Ok(())
        } else {
            Err(TextileGuardError::validation("Please log in first"))
        }
    }

    /// Drops everything tied to the signed-out user and returns to /login.
    fn reset_home(&mut self) {
        self.reports.clear();
        if let Err(e) = self.upload.clear_selection() {
            log::warn!("Could not drop pending upload: {}", e);
        }
        self.view.search.clear();
        self.view.show_archived = false;
        self.go("/login");
    }

    /// The reports listed on the home screen, in display order.
    pub fn visible_reports(&self) -> Vec<Report> {
        self.reports
            .filtered_view(&self.view.search, self.view.show_archived)
    }

    /// Accepts a 1-based position in the visible list or a report id.
    pub fn resolve_target(&self, target: &str) -> Result<String, TextileGuardError> {
        let visible = self.visible_reports();
        if let Ok(position) = target.parse::<usize>() {
            if let Some(report) = position.checked_sub(1).and_then(|i| visible.get(i)) {
                return Ok(report.id.clone());
            }
        }
        if self.reports.get(target).is_some() {
            return Ok(target.to_string());
        }
        Err(TextileGuardError::validation(format!("No report matches '{}'", target)))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_navbar(&mut out);
        match self.view.route {
            Route::Login => {
                out.push_str("\nLogin\n  login <email> <password>\n  Don't have an account? go /signup\n");
            }
            Route::Signup => {
                out.push_str(
                    "\nSign Up\n  signup <email> <password> <confirm> <name...>\n  Already have an account? go /login\n",
                );
            }
            Route::Home => {
                self.render_sidebar(&mut out);
                self.render_upload_box(&mut out);
                self.render_selected(&mut out);
            }
        }
        out
    }

    fn render_navbar(&self, out: &mut String) {
        let theme = match self.view.theme {
            Theme::Light => "light",
            Theme::Dark => "dark",
        };
        let _ = write!(out, "TextileGuard 🧵  [{} mode]", theme);
        if let Some(user) = self.session.user() {
            let _ = write!(out, "  ({}) {}", user.initial(), user.display_name());
        }
        out.push('\n');
    }

    fn render_sidebar(&self, out: &mut String) {
        let heading = if self.view.show_archived {
            "Archived reports"
        } else {
            "Active reports"
        };
        let _ = write!(out, "\n{}", heading);
        if !self.view.search.is_empty() {
            let _ = write!(out, " matching '{}'", self.view.search);
        }
        out.push('\n');

        let visible = self.visible_reports();
        if visible.is_empty() {
            out.push_str("  No reports found.\n");
        }
        let selected = self.reports.selected().map(|r| r.id);
        for (index, report) in visible.iter().enumerate() {
            let marker = if selected.as_deref() == Some(report.id.as_str()) { '>' } else { ' ' };
            let _ = writeln!(
                out,
                "{} {:>2}. {}  {}  [{}]",
                marker,
                index + 1,
                report.list_label(),
                report.created_at_label(),
                report.id
            );
        }
    }

    fn render_upload_box(&self, out: &mut String) {
        out.push_str("\nUpload Fabric Image\n");
        match self.upload.selection() {
            None => out.push_str("  No image selected (pick <path>)\n"),
            Some(selection) => {
                let status = if self.upload.state() == UploadState::Submitting {
                    "Analyzing..."
                } else {
                    "ready, type 'upload' to analyze"
                };
                let (width, height) = selection.preview_dimensions;
                let _ = writeln!(
                    out,
                    "  {} ({}), preview {}x{} at {}: {}",
                    selection.filename,
                    selection.content_type,
                    width,
                    height,
                    selection.preview_path.display(),
                    status
                );
            }
        }
    }

    fn render_selected(&self, out: &mut String) {
        let Some(report) = self.reports.selected() else {
            out.push_str(
                "\nSelect a report from the sidebar or upload a new one to see details here.\n",
            );
            return;
        };

        let _ = writeln!(out, "\n{}", report.heading());
        match (report.created_at_time(), report.created_at.as_deref()) {
            (Some(created_at), _) => {
                let _ = writeln!(out, "{}", created_at.format("%Y-%m-%d"));
            }
            (None, Some(raw)) => {
                let _ = writeln!(out, "{}", raw);
            }
            (None, None) => {}
        }
        if let Some(url) = report.image_url() {
            let _ = writeln!(out, "Image: {}", url);
        }
        let _ = writeln!(out, "Severity: {}", report.severity());
        for detail in report.details() {
            let _ = writeln!(out, "  - {}", detail.title);
            if !detail.description.is_empty() {
                let _ = writeln!(out, "    {}", detail.description);
            }
            if !detail.recommendation.is_empty() {
                let _ = writeln!(out, "    Recommendation: {}", detail.recommendation);
            }
        }
    }
}
