//! The list/create/edit workflow shared by every entity.
//!
//! Each operation is written once and parameterised by [`EntityKind`]; the
//! kind's schema supplies the searchable field, templates and redirect
//! target. Callers are assumed to be authenticated already.

use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{EntityKind, RecordId},
    error::{ApiError, ErrorCode},
    form::{validate, FormView, RawForm, Validation},
    pagination::{parse_page, Page, Paginator},
    record::Record,
    store::RecordStore,
};
use tracing::{debug, info};

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn RecordStore>,
    pub paginator: Paginator,
}

impl ApiContext {
    pub fn new(store: Arc<dyn RecordStore>, paginator: Paginator) -> Self {
        Self { store, paginator }
    }
}

/// Raw query string of the Search-and-List view. `page` stays a string so a
/// malformed value can fall back to the first page instead of rejecting the
/// request.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<String>,
}

impl ListQuery {
    /// Builds the query from decoded key/value pairs. A repeated key keeps
    /// its last value; unknown keys are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = ListQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "search" => query.search = Some(value),
                "page" => query.page = Some(value),
                _ => {}
            }
        }
        query
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    pub entity: EntityKind,
    pub template: &'static str,
    pub search: Option<String>,
    pub page: Page<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    Redirect(String),
    Rebound(FormView),
}

pub async fn search_and_list(
    ctx: &ApiContext,
    kind: EntityKind,
    query: &ListQuery,
) -> Result<ListView, ApiError> {
    let schema = kind.schema();
    let search = schema
        .search_field
        .and(query.search.as_deref())
        .filter(|needle| !needle.is_empty());
    let requested = parse_page(query.page.as_deref());

    let total_count = ctx.store.count(kind, search).await.map_err(internal)?;
    let window = ctx.paginator.window(requested, total_count);
    let items = ctx
        .store
        .list(kind, search, window.limit, window.offset)
        .await
        .map_err(internal)?;
    debug!(
        entity = %kind,
        search = search.unwrap_or_default(),
        requested,
        page = window.number,
        total_count,
        "listed records"
    );

    Ok(ListView {
        entity: kind,
        template: schema.list_template,
        search: search.map(str::to_string),
        page: Page::new(items, window, total_count),
    })
}

pub fn create_form(kind: EntityKind) -> FormView {
    FormView::unbound(kind)
}

pub async fn submit_create(
    ctx: &ApiContext,
    kind: EntityKind,
    raw: &RawForm,
) -> Result<FormOutcome, ApiError> {
    match validate(kind.schema(), raw) {
        Validation::Valid(values) => {
            let id = ctx.store.insert(kind, &values).await.map_err(internal)?;
            info!(entity = %kind, id = id.0, "record created");
            Ok(FormOutcome::Redirect(kind.redirect_target()))
        }
        Validation::Invalid { raw, errors } => {
            debug!(entity = %kind, fields = errors.len(), "create rejected");
            Ok(FormOutcome::Rebound(FormView::rebound(
                kind, None, &raw, &errors,
            )))
        }
    }
}

pub async fn edit_form(
    ctx: &ApiContext,
    kind: EntityKind,
    id: RecordId,
) -> Result<FormView, ApiError> {
    let record = load_record(ctx, kind, id).await?;
    Ok(FormView::for_record(&record))
}

pub async fn submit_edit(
    ctx: &ApiContext,
    kind: EntityKind,
    id: RecordId,
    raw: &RawForm,
) -> Result<FormOutcome, ApiError> {
    load_record(ctx, kind, id).await?;

    match validate(kind.schema(), raw) {
        Validation::Valid(values) => {
            let updated = ctx
                .store
                .update(kind, id, &values)
                .await
                .map_err(internal)?;
            if !updated {
                return Err(not_found(kind, id));
            }
            info!(entity = %kind, id = id.0, "record updated");
            Ok(FormOutcome::Redirect(kind.redirect_target()))
        }
        Validation::Invalid { raw, errors } => {
            debug!(entity = %kind, id = id.0, fields = errors.len(), "edit rejected");
            Ok(FormOutcome::Rebound(FormView::rebound(
                kind,
                Some(id),
                &raw,
                &errors,
            )))
        }
    }
}

async fn load_record(ctx: &ApiContext, kind: EntityKind, id: RecordId) -> Result<Record, ApiError> {
    ctx.store
        .get(kind, id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(kind, id))
}

fn not_found(kind: EntityKind, id: RecordId) -> ApiError {
    ApiError::not_found(format!("{kind} {} not found", id.0))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
