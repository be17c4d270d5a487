use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use server_api::{
    create_form, edit_form, search_and_list, submit_create, submit_edit, FormOutcome, ListQuery,
    ListView,
};
use shared::{
    domain::{EntityKind, RecordId},
    error::{ApiError, ErrorCode},
    form::{FormView, RawForm},
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

mod app_state;
mod auth;
mod config;

use app_state::AppState;
use auth::{Claims, SessionKeys};
use config::{load_settings, prepare_database_url};

const MAX_FORM_BYTES: usize = 64 * 1024;

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let paginator = settings.paginator();
    let sessions = SessionKeys::new(&settings.jwt_secret, settings.session_ttl_seconds);
    let state = AppState::new(storage, paginator, sessions);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, items_per_page = paginator.per_page(), "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let records = Router::new()
        .route("/:entity/search", get(http_search))
        .route("/:entity/create", get(http_create_form).post(http_create))
        .route("/:entity/edit/:id", get(http_edit_form).post(http_edit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .merge(records)
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            error!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn http_search(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListView>, HttpError> {
    let kind = parse_entity(&entity)?;
    let q = ListQuery::from_pairs(pairs);
    let view = search_and_list(&state.api, kind, &q)
        .await
        .map_err(http_error)?;
    Ok(Json(view))
}

async fn http_create_form(Path(entity): Path<String>) -> Result<Json<FormView>, HttpError> {
    let kind = parse_entity(&entity)?;
    Ok(Json(create_form(kind)))
}

async fn http_create(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(entity): Path<String>,
    Form(raw): Form<RawForm>,
) -> Result<Response, HttpError> {
    let kind = parse_entity(&entity)?;
    let outcome = submit_create(&state.api, kind, &raw)
        .instrument(info_span!("record_write", staff = %claims.name))
        .await
        .map_err(http_error)?;
    Ok(outcome_response(outcome))
}

async fn http_edit_form(
    State(state): State<Arc<AppState>>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<Json<FormView>, HttpError> {
    let kind = parse_entity(&entity)?;
    let id = parse_record_id(kind, &id)?;
    let view = edit_form(&state.api, kind, id).await.map_err(http_error)?;
    Ok(Json(view))
}

async fn http_edit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((entity, id)): Path<(String, String)>,
    Form(raw): Form<RawForm>,
) -> Result<Response, HttpError> {
    let kind = parse_entity(&entity)?;
    let id = parse_record_id(kind, &id)?;
    let outcome = submit_edit(&state.api, kind, id, &raw)
        .instrument(info_span!("record_write", staff = %claims.name))
        .await
        .map_err(http_error)?;
    Ok(outcome_response(outcome))
}

fn outcome_response(outcome: FormOutcome) -> Response {
    match outcome {
        FormOutcome::Redirect(target) => Redirect::to(&target).into_response(),
        FormOutcome::Rebound(view) => Json(view).into_response(),
    }
}

fn parse_entity(raw: &str) -> Result<EntityKind, HttpError> {
    raw.parse::<EntityKind>()
        .map_err(|e| http_error(ApiError::not_found(e.to_string())))
}

fn parse_record_id(kind: EntityKind, raw: &str) -> Result<RecordId, HttpError> {
    raw.parse::<i64>()
        .map(RecordId)
        .map_err(|_| http_error(ApiError::not_found(format!("{kind} {raw} not found"))))
}

fn http_error(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => {
            error!(message = %err.message, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
