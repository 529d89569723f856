use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::dtos::profile::{
    ProfileListQuery, ProfileListResponse, ProfileResponse, ProfileSnippet, PROFILE_CONTENT_TYPE,
    PROFILE_LIST_CONTENT_TYPE,
};
use crate::repositories::SortOrder;
use crate::AppState;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub order: SortOrder,
}

/// Only canonical integers are accepted: `01` or `+1` are rejected.
fn parse_integer(raw: Option<&str>, name: &str, default: i64) -> Result<i64, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };

    raw.parse::<i64>()
        .ok()
        .filter(|value| value.to_string() == raw)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid {}", name)))
}

impl Pagination {
    pub fn from_query(query: &ProfileListQuery) -> Result<Self, AppError> {
        let page = parse_integer(query.page.as_deref(), "page", 1)?;
        if page < 1 {
            return Err(AppError::BadRequest(anyhow::anyhow!("Invalid page")));
        }

        let per_page = parse_integer(query.per_page.as_deref(), "per-page", DEFAULT_PER_PAGE)?;
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(AppError::BadRequest(anyhow::anyhow!("Invalid per-page")));
        }

        // The offset must fit the database's signed 64-bit OFFSET.
        if (page - 1).checked_mul(per_page).is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Invalid page")));
        }

        let order = match query.order.as_deref() {
            None => SortOrder::default(),
            Some(order) => order
                .parse()
                .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))?,
        };

        Ok(Self {
            page,
            per_page,
            order,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

/// GET /profiles
#[tracing::instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProfileListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pagination = Pagination::from_query(&query)?;

    let total = state.profiles.count().await?;
    let profiles = state
        .profiles
        .list(
            Some(pagination.per_page),
            Some(pagination.offset()),
            pagination.order,
        )
        .await?;

    if profiles.is_empty() && pagination.page > 1 {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "No page {}",
            pagination.page
        )));
    }

    let body = ProfileListResponse {
        total,
        items: profiles.iter().map(ProfileSnippet::from).collect(),
    };

    Ok(([(header::CONTENT_TYPE, PROFILE_LIST_CONTENT_TYPE)], Json(body)))
}

/// GET /profiles/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.profiles.get(&id).await?;
    let body = ProfileResponse::new(&profile, Utc::now().date_naive());

    Ok(([(header::CONTENT_TYPE, PROFILE_CONTENT_TYPE)], Json(body)))
}
