#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, Request},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use his_gateway::client::HisApi;
use his_gateway::config::AppConfig;
use his_gateway::session::cookie::MemoryCookieJar;
use his_gateway::session::storage::MemoryStorage;
use his_gateway::session::{SessionStore, SessionUser};
use his_gateway::{app, AppState};

pub const GOOD_TOKEN: &str = "tok-valid";
pub const GOOD_PASSWORD: &str = "secret";

/// Serve `router` on a free local port for the rest of the test
pub async fn spawn(router: Router) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(format!("http://127.0.0.1:{}", port))
}

/// Stand-in for the HIS backend
pub fn mock_backend() -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/patients", get(search_patients))
        .route("/api/patients/:id", get(get_patient))
        .route("/api/codes/:group", get(codes))
        .route("/api/echo", any(echo))
        .route(
            "/oauth2/authorization/google",
            get(|| async {
                (
                    StatusCode::FOUND,
                    [(header::LOCATION, "https://accounts.example/o/oauth2/auth")],
                )
            }),
        )
}

/// Stand-in for object storage
pub fn mock_storage() -> Router {
    Router::new().route(
        "/uploads/*rest",
        get(|Path(rest): Path<String>| async move { format!("file:{}", rest) }),
    )
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", GOOD_TOKEN))
}

fn expired() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "result": null,
            "message": "세션이 만료되었습니다.",
        })),
    )
        .into_response()
}

async fn login(Json(body): Json<Value>) -> Json<Value> {
    let username = body["username"].as_str().unwrap_or_default();
    if body["password"] != GOOD_PASSWORD {
        return Json(json!({
            "success": false,
            "message": "아이디 또는 비밀번호가 올바르지 않습니다.",
        }));
    }

    Json(json!({
        "success": true,
        "result": {
            "accessToken": GOOD_TOKEN,
            "user": {
                "id": 7,
                "username": username,
                "displayName": "김의사",
                "role": "ROLE_DOCTOR",
            },
            "forcePasswordChange": username == "newhire",
        },
    }))
}

async fn search_patients(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return expired();
    }
    let keyword = query.get("keyword").cloned().unwrap_or_default();
    if keyword == "nobody" {
        // Empty search: success without a result
        return Json(json!({ "success": true })).into_response();
    }
    Json(json!({
        "success": true,
        "result": [
            {
                "id": 1,
                "chartNo": "C0001",
                "name": keyword,
                "birthDate": "1980-04-02",
                "gender": "M",
                "phone": null
            }
        ],
    }))
    .into_response()
}

async fn get_patient(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !authorized(&headers) {
        return expired();
    }
    if id == 404 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "존재하지 않는 환자입니다." })),
        )
            .into_response();
    }
    if id == 500 {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(json!({ "success": true, "result": null })).into_response()
}

async fn codes(Path(group): Path<String>) -> Json<Value> {
    Json(json!({
        "success": true,
        "result": [
            { "group": group, "code": "GS", "label": "외과", "sortOrder": 2 },
            { "group": group, "code": "IM", "label": "내과", "sortOrder": 1 },
        ],
    }))
}

async fn echo(request: Request) -> Response {
    let header_str = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let body = json!({
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "query": request.uri().query(),
        "authorization": header_str("authorization"),
        "cookie": header_str("cookie"),
        "custom": header_str("x-his-client"),
    });

    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.append(header::SET_COOKIE, "his_access_token=abc; Path=/".parse().unwrap());
    headers.append(header::SET_COOKIE, "his_force_password_change=1; Path=/".parse().unwrap());
    response
}

pub struct Harness {
    pub gateway: String,
    pub backend: String,
    pub storage: String,
}

/// Mock backend, mock storage and a gateway in front of both
pub async fn start() -> Result<Harness> {
    let backend = spawn(mock_backend()).await?;
    let storage = spawn(mock_storage()).await?;

    let mut config = AppConfig::development();
    config.backend.origin = backend.clone();
    config.backend.storage_origin = storage.clone();

    let gateway = spawn(app(AppState::new(config)?)).await?;
    Ok(Harness { gateway, backend, storage })
}

/// Browser-like client: cookies are sent by hand and redirects are not followed
pub fn browser() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

pub fn memory_session() -> SessionStore {
    SessionStore::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryCookieJar::new()))
}

pub fn api(origin: &str, session: &SessionStore) -> Result<HisApi> {
    Ok(HisApi::new(reqwest::Client::new(), origin, Arc::new(session.clone()))?)
}

pub fn doctor() -> SessionUser {
    SessionUser {
        id: "7".to_string(),
        username: "doctor01".to_string(),
        display_name: "김의사".to_string(),
        role: "ROLE_DOCTOR".to_string(),
    }
}
