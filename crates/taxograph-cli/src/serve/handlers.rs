//! HTTP route handlers for the viewer API.
//!
//! Handlers are kept thin: they lock the store, load, and convert.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use taxograph_core::store::{GraphRun, StoreError};
use tracing::warn;

use super::graph::to_graph_data;
use super::models::{ErrorBody, GraphData};
use super::AppState;

/// Store failures mapped onto HTTP statuses.
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            StoreError::RunNotFound(_) => StatusCode::NOT_FOUND,
            _ => {
                warn!(error = %self.0, "viewer API request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// GET `/api/runs` - Committed runs, most recent first.
pub async fn api_runs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<GraphRun>>, ApiError> {
    let store = state.store.lock().await;
    Ok(Json(store.list_runs()?))
}

/// GET `/api/graph` - The latest run's graph.
pub async fn api_latest_graph(State(state): State<Arc<AppState>>) -> Result<Json<GraphData>, ApiError> {
    let store = state.store.lock().await;
    let run = store
        .latest_run()?
        .ok_or_else(|| StoreError::RunNotFound("latest".to_string()))?;
    let graph = store.load_graph(&run.id)?;
    Ok(Json(to_graph_data(&run, &graph)))
}

/// GET `/api/graph/{run_id}` - One run's graph.
pub async fn api_graph(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<GraphData>, ApiError> {
    let store = state.store.lock().await;
    let run = store
        .run(&run_id)?
        .ok_or_else(|| StoreError::RunNotFound(run_id.clone()))?;
    let graph = store.load_graph(&run.id)?;
    Ok(Json(to_graph_data(&run, &graph)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxograph_core::pipeline::GraphPipeline;
    use taxograph_core::store::SqliteStore;
    use tokio::sync::Mutex;

    fn state_with_run() -> Arc<AppState> {
        let mut store = SqliteStore::in_memory().unwrap();
        store.insert_taxonomy("Engineering", "Hydraulics", "Pumps").unwrap();
        let mut pipeline = GraphPipeline::new(store);
        pipeline.run().unwrap();

        Arc::new(AppState {
            store: Mutex::new(pipeline.into_inner()),
        })
    }

    #[tokio::test]
    async fn test_latest_graph() {
        let state = state_with_run();

        let Json(runs) = api_runs(State(state.clone())).await.ok().unwrap();
        assert_eq!(runs.len(), 1);

        let Json(data) = api_latest_graph(State(state.clone())).await.ok().unwrap();
        assert_eq!(data.attributes.run_id, runs[0].id);
        assert_eq!(data.nodes.len(), 3);

        let Json(same) = api_graph(State(state), Path(runs[0].id.clone())).await.ok().unwrap();
        assert_eq!(same.edges.len(), data.edges.len());
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let state = state_with_run();

        let err = api_graph(State(state), Path("nope".to_string())).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_no_runs_is_not_found() {
        let state = Arc::new(AppState {
            store: Mutex::new(SqliteStore::in_memory().unwrap()),
        });

        let err = api_latest_graph(State(state)).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
