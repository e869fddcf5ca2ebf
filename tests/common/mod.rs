#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use bakery_console::catalog::EntityDef;
use bakery_console::session::Claims;
use bakery_console::{app, AppState, Catalog, DataAccess, EntityKind, JwtIdentity, MemoryBackend, Session, TableBackend};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "test_secret_key_for_bakery_console_tests";
pub const AUDIENCE: &str = "authenticated";

pub fn fields(v: Value) -> HashMap<String, Value> {
    v.as_object()
        .map(|m| m.clone().into_iter().collect())
        .unwrap_or_default()
}

pub fn session() -> Session {
    Session::new("tester", Some("tester@panaderia.test".into()), Utc::now() + Duration::hours(1))
}

/// Data access over a fresh in-memory backend; the backend is returned for out-of-band writes.
pub fn data_access() -> (DataAccess, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(Catalog::bakery().expect("catalog"));
    let data = DataAccess::new(backend.clone(), catalog, session());
    (data, backend)
}

pub fn entity(kind: EntityKind) -> EntityDef {
    Catalog::bakery().expect("catalog").entity(kind).clone()
}

pub fn token_for(sub: &str, exp_offset_secs: i64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        email: Some(format!("{sub}@panaderia.test")),
        exp: Utc::now().timestamp() + exp_offset_secs,
        aud: Some(AUDIENCE.to_string()),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token")
}

/// Router over an in-memory backend with a valid bearer token.
pub struct TestApp {
    router: Router,
    pub token: String,
    pub backend: Arc<dyn TableBackend>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let backend: Arc<dyn TableBackend> = Arc::new(MemoryBackend::new());
        let state = AppState {
            backend: backend.clone(),
            catalog: Arc::new(Catalog::bakery().expect("catalog")),
            identity: Arc::new(JwtIdentity::hs256(SECRET.as_bytes(), Some(AUDIENCE))),
            login_providers: Arc::new(vec!["google".into(), "github".into()]),
        };
        TestApp {
            router: app(state),
            token: token_for("6a1f0a52-5f8e-4a55-9d35-8f4b8d1e2c3a", 3600),
            backend,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, location, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None, Some(&self.token)).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body), Some(&self.token)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body), Some(&self.token)).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None, Some(&self.token)).await
    }
}
