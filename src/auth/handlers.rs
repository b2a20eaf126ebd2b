use axum::{
    extract::{FromRef, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect},
    routing::get,
    Form, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, RegisterForm},
        password::{hash_password, verify_password},
        repo::User,
        session::{clear_cookie, SessionKeys},
    },
    state::AppState,
    views,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", get(logout))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

async fn login_page() -> Html<String> {
    Html(views::login_page(None))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Form(mut payload): Form<LoginForm>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Ok(
                Html(views::login_page(Some("Invalid email or password."))).into_response(),
            );
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let valid = verify_password(&payload.password, &user.password_hash)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !valid {
        warn!(email = %payload.email, user_id = user.id, "login invalid password");
        return Ok(Html(views::login_page(Some("Invalid email or password."))).into_response());
    }

    let keys = SessionKeys::from_ref(&state);
    let token = keys
        .sign(user.id, &user.name)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok((
        AppendHeaders([(SET_COOKIE, keys.cookie(&token))]),
        Redirect::to("/"),
    )
        .into_response())
}

async fn register_page() -> Html<String> {
    Html(views::register_page(None))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Form(mut payload): Form<RegisterForm>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Ok(
            Html(views::register_page(Some("Please enter a valid email address.")))
                .into_response(),
        );
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Ok(
            Html(views::register_page(Some("Password must be at least 8 characters.")))
                .into_response(),
        );
    }

    // Pre-check so the common case gets a friendly message; the unique
    // constraint still backstops concurrent registrations.
    if let Ok(Some(_)) = User::find_by_email(&state.db, &payload.email).await {
        warn!(email = %payload.email, "email already registered");
        return Ok(Html(views::register_page(Some("Email already exists!"))).into_response());
    }

    let hash = hash_password(&payload.password)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match User::create(&state.db, payload.name.trim(), &payload.email, &hash).await {
        Ok(user) => {
            info!(user_id = user.id, email = %user.email, "user registered");
            Ok(Redirect::to("/login").into_response())
        }
        Err(e) if e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false) => {
            warn!(email = %payload.email, "email already registered (constraint)");
            Ok(Html(views::register_page(Some("Email already exists!"))).into_response())
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, clear_cookie())]),
        Redirect::to("/login"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@example.com"));
    }
}
