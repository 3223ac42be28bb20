// tests/common/mod.rs
//! In-process stand-in for the TextileGuard backend.

#![allow(dead_code)]

use actix_multipart::Multipart;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use futures_util::TryStreamExt;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "tok-a";

#[derive(Default)]
pub struct Backend {
    pub users: Vec<Value>,
    /// Most recent first, like the real list endpoint.
    pub reports: Vec<Value>,
    pub uploads: Vec<UploadSeen>,
    pub authorization_headers: Vec<Option<String>>,
    pub signup_requests: usize,
    pub patch_requests: usize,
    pub next_id: usize,
    pub fail_reports: bool,
}

#[derive(Debug, Clone)]
pub struct UploadSeen {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

pub type Shared = web::Data<Mutex<Backend>>;

pub fn report_json(id: &str, summary: &str, titles: &[&str], archived: bool) -> Value {
    json!({
        "_id": id,
        "user_id": "u1",
        "image_url": format!("https://img.example.com/{}.jpg", id),
        "defect_type": ["defect detected"],
        "description": {
            "summary": summary,
            "overall_severity": "high",
            "details": titles.iter().map(|t| json!({
                "title": t,
                "severity": "high",
                "description": "Defects were detected in the fabric.",
                "recommendation": "Inspect and reprocess the affected area."
            })).collect::<Vec<_>>()
        },
        "created_at": "2024-05-01T10:00:00.000000",
        "archived": archived
    })
}

pub fn seeded_backend() -> Backend {
    Backend {
        users: vec![json!({
            "_id": "u1",
            "name": "Ada",
            "email": "a@x.com",
            "password": "secret"
        })],
        reports: vec![
            report_json("r2", "Defect(s) detected", &["Hole"], false),
            report_json("r1", "No defects detected", &["No defect detected"], false),
        ],
        next_id: 3,
        ..Default::default()
    }
}

fn detail(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "detail": message }))
}

fn unauthorized() -> HttpResponse {
    detail(
        actix_web::http::StatusCode::UNAUTHORIZED,
        "Could not validate credentials",
    )
}

/// Records the Authorization header and returns the matching user.
fn current_user(req: &HttpRequest, backend: &mut Backend) -> Option<Value> {
    let header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    backend.authorization_headers.push(header.clone());
    if header.as_deref() == Some(&format!("Bearer {}", TOKEN)) {
        backend.users.first().cloned()
    } else {
        None
    }
}

async fn signup(body: web::Json<Value>, data: Shared) -> HttpResponse {
    let mut backend = data.lock().unwrap();
    backend.signup_requests += 1;
    if body["password"] != body["confirm_password"] {
        return detail(actix_web::http::StatusCode::BAD_REQUEST, "Passwords do not match");
    }
    if backend.users.iter().any(|u| u["email"] == body["email"]) {
        return detail(actix_web::http::StatusCode::BAD_REQUEST, "User already exists");
    }
    let user_id = format!("u{}", backend.users.len() + 1);
    backend.users.push(json!({
        "_id": user_id,
        "name": body["name"],
        "email": body["email"],
        "password": body["password"]
    }));
    HttpResponse::Ok().json(json!({ "message": "User created", "user_id": user_id }))
}

async fn login(body: web::Json<Value>, data: Shared) -> HttpResponse {
    let backend = data.lock().unwrap();
    let valid = backend
        .users
        .iter()
        .any(|u| u["email"] == body["email"] && u["password"] == body["password"]);
    if !valid {
        return detail(actix_web::http::StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    HttpResponse::Ok().json(json!({
        "access_token": TOKEN,
        "token_type": "bearer",
        "expires_in": 3600
    }))
}

async fn profile(req: HttpRequest, data: Shared) -> HttpResponse {
    let mut backend = data.lock().unwrap();
    match current_user(&req, &mut backend) {
        Some(user) => HttpResponse::Ok().json(json!({
            "profile": { "_id": user["_id"], "name": user["name"], "email": user["email"] }
        })),
        None => unauthorized(),
    }
}

async fn update_profile(req: HttpRequest, body: web::Json<Value>, data: Shared) -> HttpResponse {
    let mut backend = data.lock().unwrap();
    if current_user(&req, &mut backend).is_none() {
        return unauthorized();
    }
    if let Some(name) = body.get("name").and_then(Value::as_str) {
        backend.users[0]["name"] = json!(name);
    }
    HttpResponse::Ok().json(json!({ "message": "Profile updated" }))
}

async fn list_reports(req: HttpRequest, data: Shared) -> HttpResponse {
    let mut backend = data.lock().unwrap();
    if current_user(&req, &mut backend).is_none() {
        return unauthorized();
    }
    if backend.fail_reports {
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok().json(json!({ "reports": backend.reports }))
}

async fn upload(req: HttpRequest, mut payload: Multipart, data: Shared) -> Result<HttpResponse, actix_web::Error> {
    if current_user(&req, &mut data.lock().unwrap()).is_none() {
        return Ok(unauthorized());
    }

    let mut seen = Vec::new();
    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(str::to_string);
        let content_type = field.content_type().map(|ct| ct.to_string());

        let mut size = 0;
        while let Some(chunk) = field.try_next().await? {
            size += chunk.len();
        }
        seen.push(UploadSeen {
            field: name,
            filename,
            content_type,
            size,
        });
    }

    let mut backend = data.lock().unwrap();
    backend.uploads.extend(seen.iter().cloned());
    let Some(image) = seen.iter().find(|s| s.field == "image" && s.size > 0) else {
        return Ok(detail(
            actix_web::http::StatusCode::UNPROCESSABLE_ENTITY,
            "Image file is required",
        ));
    };
    if image.filename.as_deref() == Some("reject.png") {
        return Ok(detail(
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Inference service unavailable",
        ));
    }

    let id = format!("r{}", backend.next_id);
    backend.next_id += 1;
    let report = report_json(&id, "Small tear", &[], false);
    backend.reports.insert(0, report.clone());
    Ok(HttpResponse::Ok().json(json!({ "message": "Report saved", "report": report })))
}

async fn update_report(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<Value>,
    data: Shared,
) -> HttpResponse {
    let mut backend = data.lock().unwrap();
    if current_user(&req, &mut backend).is_none() {
        return unauthorized();
    }
    backend.patch_requests += 1;
    let id = path.into_inner();
    let Some(report) = backend.reports.iter_mut().find(|r| r["_id"] == id.as_str()) else {
        return detail(actix_web::http::StatusCode::NOT_FOUND, "Report not found");
    };
    if let Some(summary) = body.get("summary") {
        report["description"]["summary"] = summary.clone();
    }
    if let Some(archived) = body.get("archived").and_then(Value::as_bool) {
        report["archived"] = json!(archived);
    }
    let report = report.clone();
    HttpResponse::Ok().json(json!({ "report": report }))
}

async fn delete_report(req: HttpRequest, path: web::Path<String>, data: Shared) -> HttpResponse {
    let mut backend = data.lock().unwrap();
    if current_user(&req, &mut backend).is_none() {
        return unauthorized();
    }
    let id = path.into_inner();
    let before = backend.reports.len();
    backend.reports.retain(|r| r["_id"] != id.as_str());
    if backend.reports.len() == before {
        return detail(actix_web::http::StatusCode::NOT_FOUND, "Report not found");
    }
    HttpResponse::Ok().json(json!({ "message": "Report deleted" }))
}

pub struct MockServer {
    pub base_url: String,
    pub state: Shared,
}

impl MockServer {
    pub fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.state.lock().unwrap()
    }
}

/// Starts the mock backend on an ephemeral port. Must run inside an actix runtime.
pub fn spawn_backend(backend: Backend) -> MockServer {
    let state: Shared = web::Data::from(Arc::new(Mutex::new(backend)));
    let app_state = state.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .route("/auth/signup", web::post().to(signup))
            .route("/auth/login", web::post().to(login))
            .route("/auth/profile", web::get().to(profile))
            .route("/auth/profile", web::put().to(update_profile))
            .route("/report", web::get().to(list_reports))
            .route("/report/upload", web::post().to(upload))
            .route("/report/{id}", web::patch().to(update_report))
            .route("/report/{id}", web::delete().to(delete_report))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind mock backend");

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());

    MockServer {
        base_url: format!("http://{}/", addr),
        state,
    }
}
