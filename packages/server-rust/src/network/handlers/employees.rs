//! Employee list endpoint.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::service::PageListing;

/// Query string of `GET /employees`.
///
/// `page` is taken as a raw string so that garbage values fall back to the
/// first page instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct EmployeesQuery {
    pub page: Option<String>,
}

/// Returns one page of employees, served from the cache when possible.
///
/// # Errors
///
/// Returns [`ApiError::Store`] if the record store cannot be read.
pub async fn employees_handler(
    State(state): State<AppState>,
    Query(query): Query<EmployeesQuery>,
) -> Result<Json<PageListing>, ApiError> {
    let listing = state
        .read_path
        .list_page(query.page.as_deref())
        .await
        .map_err(ApiError::Store)?;
    Ok(Json(listing))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use empcache_core::ReadSource;

    use super::*;
    use crate::network::handlers::test_support;
    use crate::testutil::{Fixture, RecordingQueue};

    fn query(page: &str) -> Query<EmployeesQuery> {
        Query(EmployeesQuery {
            page: Some(page.to_string()),
        })
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let fx = Fixture::new(25);
        let state = test_support::state(&fx, Arc::new(RecordingQueue::default()));

        let first = employees_handler(State(state.clone()), query("2")).await.unwrap();
        assert_eq!(first.0.source, ReadSource::Store);
        assert_eq!(first.0.employees[0].id, 11);

        let second = employees_handler(State(state), query("2")).await.unwrap();
        assert_eq!(second.0.source, ReadSource::Cache);
        assert_eq!(second.0.range_start, 11);
        assert_eq!(second.0.range_end, 20);
    }

    #[tokio::test]
    async fn missing_page_defaults_to_first() {
        let fx = Fixture::new(5);
        let state = test_support::state(&fx, Arc::new(RecordingQueue::default()));

        let listing = employees_handler(State(state), Query(EmployeesQuery::default()))
            .await
            .unwrap();

        assert_eq!(listing.0.page, 1);
        assert_eq!(listing.0.count, 5);
        assert!(!listing.0.has_next);
    }
}
