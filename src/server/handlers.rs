use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::place::discovery::discover;
use crate::place::suggest::{suggest, SuggestionView};
use crate::place::types::{Candidate, Coordinate, Place, PlaceError, Resolution, ResolutionState};
use crate::place::BoundingBox;

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

impl From<PlaceError> for ApiError {
    fn from(e: PlaceError) -> Self {
        let status = match &e {
            PlaceError::EmptyQuery
            | PlaceError::InvalidCoordinate { .. }
            | PlaceError::Validation(_)
            | PlaceError::OutOfRange(_)
            | PlaceError::InvalidRating(_) => StatusCode::BAD_REQUEST,
            PlaceError::NotFound(_)
            | PlaceError::UnknownId(_)
            | PlaceError::NothingToSave => StatusCode::NOT_FOUND,
            PlaceError::DuplicateId(_) => StatusCode::CONFLICT,
            PlaceError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            PlaceError::Network(_) | PlaceError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            PlaceError::Config(_) | PlaceError::Io(_) | PlaceError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError(status, e.to_string())
    }
}

/// Run blocking pipeline work (remote lookups, file writes) off the runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PlaceError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            error!(error = %e, "blocking task failed");
            Err(ApiError(StatusCode::INTERNAL_SERVER_ERROR, "internal error".into()))
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

// ─── Text search & map click ─────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub resolution: Resolution,
    /// False when a newer search replaced this one before it finished.
    pub applied: bool,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let query = params.q.unwrap_or_default();

    let worker = Arc::clone(&state);
    let text = query.clone();
    let (resolution, applied) =
        blocking(move || worker.resolver.resolve_into(&text, &worker.current)).await?;

    info!(
        %query,
        found = resolution.candidate().is_some(),
        applied,
        elapsed_ms = elapsed_ms(start),
        "GET /api/search"
    );
    Ok(Json(SearchResponse { resolution, applied }))
}

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
}

pub async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let at = Coordinate::new(params.lat, params.lng)?;

    let generation = state.current.begin();
    let worker = Arc::clone(&state);
    let resolution = blocking(move || Ok(worker.resolver.reverse(at))).await?;
    let applied = state.current.apply(generation, resolution.clone());

    info!(%at, applied, elapsed_ms = elapsed_ms(start), "GET /api/reverse");
    Ok(Json(SearchResponse { resolution, applied }))
}

// ─── Current result ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct CurrentResponse {
    pub state: ResolutionState,
    pub resolution: Option<Resolution>,
}

pub async fn current(State(state): State<Arc<AppState>>) -> Json<CurrentResponse> {
    Json(CurrentResponse {
        state: state.current.state(),
        resolution: state.current.resolution(),
    })
}

pub async fn close_current(State(state): State<Arc<AppState>>) -> StatusCode {
    state.current.clear();
    StatusCode::NO_CONTENT
}

pub async fn save_current(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<Place>), ApiError> {
    let place = state.current.promote(state.saved())?;
    let worker = Arc::clone(&state);
    blocking(move || worker.persist()).await?;
    info!(id = %place.id, name = %place.name, "POST /api/current/save");
    Ok((StatusCode::CREATED, Json(place)))
}

// ─── Discovery & autocomplete ────────────────────────────────────

#[derive(Deserialize)]
pub struct DiscoverQuery {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

pub async fn discover_area(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DiscoverQuery>,
) -> Result<Json<Vec<Candidate>>, ApiError> {
    let start = Instant::now();
    let bbox = BoundingBox::new(params.south, params.west, params.north, params.east)?;

    let worker = Arc::clone(&state);
    let found = blocking(move || {
        let saved = worker.saved().snapshot();
        Ok(discover(
            worker.resolver.services().area.as_ref(),
            &bbox,
            &saved,
            &worker.resolver.config().image_base,
        ))
    })
    .await?;
    state.suggested.replace(found.clone());

    info!(count = found.len(), elapsed_ms = elapsed_ms(start), "GET /api/discover");
    Ok(Json(found))
}

pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<SuggestionView>>, ApiError> {
    let text = params.q.unwrap_or_default();
    let worker = Arc::clone(&state);
    let found = blocking(move || {
        let config = worker.resolver.config();
        suggest(
            worker.resolver.services().directory.as_ref(),
            &text,
            config.suggest_min_chars,
            config.suggest_limit,
        )
    })
    .await?;
    Ok(Json(found.iter().map(SuggestionView::from).collect()))
}

// ─── Saved places ────────────────────────────────────────────────

pub async fn list_places(State(state): State<Arc<AppState>>) -> Json<Vec<Place>> {
    Json(state.saved().snapshot().to_vec())
}

/// Either a full place, or the id of a discovery result to keep.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum NewPlace {
    Suggested { suggested_id: String },
    Place(Place),
}

pub async fn add_place(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewPlace>,
) -> Result<(StatusCode, Json<Place>), ApiError> {
    let place = match body {
        NewPlace::Place(place) => {
            state.saved().add(place.clone())?;
            place
        }
        NewPlace::Suggested { suggested_id } => {
            let candidate = state
                .suggested
                .snapshot()
                .iter()
                .find(|c| c.id == suggested_id)
                .cloned()
                .ok_or_else(|| PlaceError::UnknownId(suggested_id.clone()))?;
            let place = candidate.into_place();
            state.saved().add(place.clone())?;
            state.suggested.take(&suggested_id);
            place
        }
    };
    let worker = Arc::clone(&state);
    blocking(move || worker.persist()).await?;
    info!(id = %place.id, name = %place.name, "POST /api/places");
    Ok((StatusCode::CREATED, Json(place)))
}

pub async fn remove_place(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Place>, ApiError> {
    let removed = state.saved().remove(&id)?;
    let worker = Arc::clone(&state);
    blocking(move || worker.persist()).await?;
    Ok(Json(removed))
}

#[derive(Serialize)]
pub struct VisitedResponse {
    pub id: String,
    pub visited: bool,
}

pub async fn toggle_visited(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VisitedResponse>, ApiError> {
    let visited = state.saved().toggle_visited(&id)?;
    let worker = Arc::clone(&state);
    blocking(move || worker.persist()).await?;
    Ok(Json(VisitedResponse { id, visited }))
}

#[derive(Deserialize)]
pub struct RatingBody {
    pub rating: Option<u8>,
}

pub async fn rate_place(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RatingBody>,
) -> Result<Json<Place>, ApiError> {
    state.saved().set_rating(&id, body.rating)?;
    let worker = Arc::clone(&state);
    blocking(move || worker.persist()).await?;
    let place = state.saved().get(&id).ok_or(PlaceError::UnknownId(id))?;
    Ok(Json(place))
}

#[derive(Deserialize)]
pub struct ReorderBody {
    pub from: usize,
    pub to: usize,
}

pub async fn reorder_places(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReorderBody>,
) -> Result<Json<Vec<Place>>, ApiError> {
    state.saved().reorder(body.from, body.to)?;
    let worker = Arc::clone(&state);
    blocking(move || worker.persist()).await?;
    Ok(Json(state.saved().snapshot().to_vec()))
}
