// src/handlers/index.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::config::Branding;

/// Service landing document with the configured branding.
pub async fn index(State(branding): State<Branding>) -> impl IntoResponse {
    Json(json!({
        "name": branding.site_header,
        "admin_title": branding.site_title,
        "index_title": branding.index_title,
        "links": {
            "exams": "/api/exams",
            "user_stats": "/api/stats/users",
            "attempts": "/api/stats/attempts",
        },
    }))
}
