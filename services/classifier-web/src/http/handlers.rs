use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::FormRejection;
use axum::extract::{Multipart, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use snapclass_core::{record_login, record_prediction, record_registration};
use tracing::{debug, info, instrument, warn};

use super::{pages, AppState};
use crate::auth::{PasswordHasher, SessionId};
use crate::error::AppError;
use crate::store::StoreError;
use crate::vision::PredictionResult;

pub const CONFLICT_MESSAGE: &str = "User name has been registered!";
pub const LOGIN_REQUIRED_MESSAGE: &str = "Invalid access: Login required!";
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// A missing or non-form body reads as empty fields, so it fails `require` like a blank form.
    fn from_form(form: Result<Form<Credentials>, FormRejection>) -> Self {
        form.map(|Form(c)| c).unwrap_or_else(|rejection| {
            debug!(%rejection, "credentials body not readable as a form");
            Credentials::default()
        })
    }

    fn require(&self) -> Result<(&str, &str), AppError> {
        if self.name.is_empty() { return Err(AppError::MissingField("name")); }
        if self.password.is_empty() { return Err(AppError::MissingField("password")); }
        Ok((self.name.as_str(), self.password.as_str()))
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub results: Vec<PredictionResult>,
}

pub async fn index() -> Html<String> { Html(pages::index()) }

pub async fn register_page() -> Html<String> { Html(pages::register()) }

pub async fn login_page() -> Html<String> { Html(pages::login()) }

#[instrument(skip_all)]
pub async fn register(State(state): State<AppState>, form: Result<Form<Credentials>, FormRejection>) -> Result<Response, AppError> {
    let form = Credentials::from_form(form);
    let (name, password) = form.require()?;
    if state.store.find_user_by_name(name)?.is_some() {
        record_registration("conflict");
        return Ok(CONFLICT_MESSAGE.into_response());
    }
    let hasher = state.hasher;
    let password = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await?;
    match state.store.insert_user(name, &password_hash) {
        Ok(user) => {
            info!(user_id = user.id, name = %user.name, "user registered");
            record_registration("ok");
            Ok(Redirect::to("/login").into_response())
        }
        Err(StoreError::DuplicateName(_)) => {
            record_registration("conflict");
            Ok(CONFLICT_MESSAGE.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip_all)]
pub async fn login(State(state): State<AppState>, jar: CookieJar, form: Result<Form<Credentials>, FormRejection>) -> Result<Response, AppError> {
    let form = Credentials::from_form(form);
    let (name, password) = form.require()?;
    let Some(user) = state.store.find_user_by_name(name)? else {
        record_login("not_found");
        return Err(AppError::UserNotFound);
    };
    let password = password.to_string();
    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || PasswordHasher::verify(&stored, &password)).await?;
    if !valid {
        record_login("wrong_password");
        return Err(AppError::InvalidCredential);
    }
    let previous = SessionId::from_jar(&jar, &state.cookie_name);
    let session = state.sessions.login(previous.as_ref());
    record_login("ok");
    info!(user_id = user.id, name = %user.name, "login succeeded");
    Ok((jar.add(session.cookie(&state.cookie_name)), Redirect::to("/history")).into_response())
}

#[instrument(skip_all)]
pub async fn predict(State(state): State<AppState>, multipart: Result<Multipart, MultipartRejection>) -> Result<Json<PredictResponse>, AppError> {
    let Ok(mut multipart) = multipart else {
        record_prediction("missing_image");
        return Err(AppError::MissingField(IMAGE_FIELD));
    };
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field.bytes().await?;
            if !bytes.is_empty() { image = Some(bytes); }
        }
    }
    let Some(bytes) = image else {
        record_prediction("missing_image");
        return Err(AppError::MissingField(IMAGE_FIELD));
    };

    let predictor = state.predictor.clone();
    let outcome = tokio::task::spawn_blocking(move || predictor.classify_bytes(&bytes)).await?;
    let result = match outcome {
        Ok(r) => r,
        Err(e) => {
            let err = AppError::from(e);
            record_prediction(if err.status().is_client_error() { "invalid_image" } else { "error" });
            warn!(error = %err, "prediction failed");
            return Err(err);
        }
    };
    let record = state.store.insert_record(&result.model, &result.label, result.probability)?;
    record_prediction("ok");
    info!(record_id = record.id, label = %result.label, probability = result.probability, "prediction stored");
    Ok(Json(PredictResponse { success: true, results: vec![result] }))
}

#[instrument(skip_all)]
pub async fn history(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let granted = SessionId::from_jar(&jar, &state.cookie_name)
        .map(|id| state.sessions.consume_login(&id))
        .unwrap_or(false);
    if !granted {
        return Ok(LOGIN_REQUIRED_MESSAGE.into_response());
    }
    let records = state.store.list_records()?;
    Ok(Html(pages::history(&records)).into_response())
}
