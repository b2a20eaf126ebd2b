use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::str::FromStr;
use tracing::{error, instrument, warn};

use crate::{
    auth::session::SessionUser,
    inference::Category,
    state::AppState,
    views,
};

use super::repo::HistoryRecord;
use super::services::analyze_scan;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/dashboard", get(dashboard))
        .route("/documentation", get(documentation))
        .route("/history", get(history))
        .route(
            "/predict",
            post(predict).layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
        )
}

async fn index(user: SessionUser) -> Html<String> {
    Html(views::index_page(&user.name))
}

async fn dashboard(_user: SessionUser) -> Html<String> {
    Html(views::dashboard_page())
}

#[instrument(skip(state, user), fields(user_id = user.user_id))]
async fn documentation(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Html<String>, (StatusCode, String)> {
    let record = HistoryRecord::last_by_user(&state.db, user.user_id)
        .await
        .map_err(internal)?;
    Ok(Html(views::documentation_page(record.as_ref(), &user.name)))
}

#[instrument(skip(state, user), fields(user_id = user.user_id))]
async fn history(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Html<String>, (StatusCode, String)> {
    let records = HistoryRecord::list_by_user(&state.db, user.user_id)
        .await
        .map_err(internal)?;
    Ok(Html(views::history_page(&records, &user.name)))
}

#[instrument(skip(state, user, multipart), fields(user_id = user.user_id))]
async fn predict(
    State(state): State<AppState>,
    user: SessionUser,
    mut multipart: Multipart,
) -> Result<axum::response::Response, (StatusCode, String)> {
    let mut category: Option<String> = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("category") => {
                category = Some(field.text().await.map_err(bad_request)?);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(bad_request)?;
                file = Some((filename, data));
            }
            _ => {}
        }
    }

    // No file selected: back to the upload form, mirroring the original flow.
    let Some((filename, data)) = file.filter(|(_, d)| !d.is_empty()) else {
        return Ok(Redirect::to("/dashboard").into_response());
    };

    let category = category
        .as_deref()
        .map(Category::from_str)
        .transpose()
        .map_err(|e| {
            warn!(error = %e, "predict with unknown category");
            (StatusCode::BAD_REQUEST, e.to_string())
        })?
        .ok_or((StatusCode::BAD_REQUEST, "category is required".to_string()))?;

    let report = analyze_scan(&state, user.user_id, category, &filename, data)
        .await
        .map_err(|e| {
            error!(error = %e, "analysis pipeline failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Html(views::result_page(&report)).into_response())
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
