/// Song endpoints
///
/// # Endpoints
///
/// - `POST /v1/songs/generate` - Spend a credit and start generating a song
/// - `GET /v1/songs/:id` - Poll a song's status
/// - `GET /v1/teams/:id/songs` - A team's songs, newest first
/// - `GET /v1/genres` - Genres a song can be generated in
///
/// # Generation Flow
///
/// ```text
/// POST /v1/songs/generate
///   ├─> BEGIN
///   │     membership, lock team, balance >= 1
///   │     unused accomplishments in the week window
///   │     INSERT song (pending) -> consume credit -> claim accomplishments
///   │     pending -> generating
///   ├─> COMMIT
///   ├─> spawn_generation (detached)
///   └─> 202 { song_id, status: "generating" }
/// ```
///
/// Nothing is written unless every step succeeds; a team with no credits
/// gets a 402 before any row is touched.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use songteam_shared::{
    auth::{
        authorization::{require_membership, AuthzError},
        middleware::AuthContext,
    },
    genre::Genre,
    ledger::{self, LedgerError},
    models::{
        accomplishment::Accomplishment,
        song::{CreateSong, Song, SongStatus},
        team::Team,
    },
};
use songteam_worker::pipeline::{spawn_generation, GenerationJob};
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 200;
const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// Generate song request
///
/// Dates are `YYYY-MM-DD`. Accomplishments created from the start of
/// `week_start_date` up to the end of `week_end_date` (UTC) go into the song.
#[derive(Debug, Deserialize)]
pub struct GenerateSongRequest {
    pub team_id: Uuid,
    pub genre: String,
    pub week_start_date: String,
    pub week_end_date: String,

    /// Defaults to "<Genre label> Song"
    pub title: Option<String>,
}

/// Generate song response
#[derive(Debug, Serialize)]
pub struct GenerateSongResponse {
    pub song_id: Uuid,
    pub status: SongStatus,
    pub message: String,

    /// Balance after the credit was spent
    pub credits_remaining: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSongsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListSongsResponse {
    pub songs: Vec<Song>,
}

#[derive(Debug, Serialize)]
pub struct GenreInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub emoji: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ListGenresResponse {
    pub genres: Vec<GenreInfo>,
}

/// Validated form of [`GenerateSongRequest`]
#[derive(Debug, Clone, PartialEq)]
struct SongParams {
    genre: Genre,
    week_start: NaiveDate,
    week_end: NaiveDate,
    title: String,
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationErrorDetail {
    ValidationErrorDetail {
        field: field.to_string(),
        message: message.into(),
    }
}

impl GenerateSongRequest {
    fn params(&self) -> Result<SongParams, ApiError> {
        let mut errors = Vec::new();

        let genre = self
            .genre
            .trim()
            .to_lowercase()
            .parse::<Genre>()
            .map_err(|e| errors.push(invalid("genre", e.to_string())))
            .ok();

        let week_start = NaiveDate::parse_from_str(self.week_start_date.trim(), "%Y-%m-%d")
            .map_err(|_| errors.push(invalid("week_start_date", "Expected a date (YYYY-MM-DD)")))
            .ok();

        let week_end = NaiveDate::parse_from_str(self.week_end_date.trim(), "%Y-%m-%d")
            .map_err(|_| errors.push(invalid("week_end_date", "Expected a date (YYYY-MM-DD)")))
            .ok();

        if let (Some(start), Some(end)) = (week_start, week_end) {
            if end < start {
                errors.push(invalid(
                    "week_end_date",
                    "week_end_date must not be before week_start_date",
                ));
            }
        }

        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        if title.as_ref().is_some_and(|t| t.chars().count() > MAX_TITLE_LEN) {
            errors.push(invalid(
                "title",
                format!("Title must be at most {} characters", MAX_TITLE_LEN),
            ));
        }

        match (genre, week_start, week_end) {
            (Some(genre), Some(week_start), Some(week_end)) if errors.is_empty() => {
                Ok(SongParams {
                    genre,
                    week_start,
                    week_end,
                    title: title.unwrap_or_else(|| genre.default_title()),
                })
            }
            _ => Err(ApiError::ValidationError(errors)),
        }
    }
}

/// `[week_start 00:00 UTC, week_end + 1 day 00:00 UTC)`
pub fn accomplishment_window(
    week_start: NaiveDate,
    week_end: NaiveDate,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let from = week_start.and_hms_opt(0, 0, 0)?.and_utc();
    let until = week_end
        .checked_add_days(Days::new(1))?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    Some((from, until))
}

/// Start generating a song
///
/// # Endpoint
///
/// ```text
/// POST /v1/songs/generate
/// Authorization: Bearer <jwt_token>
///
/// {
///   "team_id": "uuid",
///   "genre": "rap",
///   "week_start_date": "2025-01-06",
///   "week_end_date": "2025-01-12",
///   "title": "Ship It"
/// }
/// ```
///
/// # Response (202)
///
/// ```json
/// {
///   "song_id": "uuid",
///   "status": "generating",
///   "message": "Song generation started",
///   "credits_remaining": 3
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unknown genre, bad dates, or no unused
///   accomplishments in the window
/// - `402 Payment Required`: No credits left
/// - `403 Forbidden`: Caller is not a member
pub async fn generate_song(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<GenerateSongRequest>,
) -> ApiResult<(StatusCode, Json<GenerateSongResponse>)> {
    let mut tx = state.db.begin().await?;

    require_membership(&mut *tx, req.team_id, auth.user_id).await?;

    let params = req.params()?;
    let (from, until) = accomplishment_window(params.week_start, params.week_end)
        .ok_or_else(|| ApiError::BadRequest("Date range is out of bounds".to_string()))?;

    let team = Team::lock_for_update(&mut tx, req.team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    if !team.has_credits() {
        return Err(LedgerError::InsufficientCredits {
            team_id: team.id,
            balance: team.song_credits_remaining,
        }
        .into());
    }

    let accomplishments =
        Accomplishment::find_unused_in_window(&mut *tx, team.id, from, until).await?;

    if accomplishments.is_empty() {
        return Err(ApiError::BadRequest(
            "No accomplishments found for the selected period".to_string(),
        ));
    }

    let song = Song::create(
        &mut *tx,
        CreateSong {
            team_id: team.id,
            created_by_user_id: auth.user_id,
            title: params.title,
            genre: params.genre,
            week_start_date: params.week_start,
            week_end_date: params.week_end,
        },
    )
    .await?;

    let credits_remaining = ledger::consume_in(&mut tx, team.id, auth.user_id, song.id).await?;

    let ids: Vec<Uuid> = accomplishments.iter().map(|a| a.id).collect();
    let claimed = Accomplishment::mark_used(&mut *tx, &ids, song.id).await?;
    if claimed != ids.len() as u64 {
        // Dropping the transaction rolls everything back, credit included
        return Err(ApiError::InternalError(format!(
            "Claimed {} of {} accomplishments for song {}",
            claimed,
            ids.len(),
            song.id
        )));
    }

    if !Song::mark_generating(&mut *tx, song.id).await? {
        return Err(ApiError::InternalError(format!(
            "Song {} left pending before generation started",
            song.id
        )));
    }

    tx.commit().await?;

    tracing::info!(
        song_id = %song.id,
        team_id = %team.id,
        user_id = %auth.user_id,
        genre = params.genre.as_str(),
        accomplishments = ids.len(),
        credits_remaining,
        "Song generation started"
    );

    let job = GenerationJob {
        song_id: song.id,
        team_id: team.id,
        team_name: team.name,
        genre: params.genre,
        week_start: params.week_start,
        week_end: params.week_end,
        accomplishments: accomplishments.into_iter().map(|a| a.text).collect(),
    };

    // Detached: the client polls GET /v1/songs/:id for the outcome
    spawn_generation(
        job,
        state.generator.clone(),
        state.store.clone(),
        state.generation_timeout,
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateSongResponse {
            song_id: song.id,
            status: SongStatus::Generating,
            message: "Song generation started".to_string(),
            credits_remaining,
        }),
    ))
}

/// Get a song
///
/// Members of the song's team only. Unknown songs and songs of other teams
/// are both 404, so ids can't be probed.
pub async fn get_song(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(song_id): Path<Uuid>,
) -> ApiResult<Json<Song>> {
    let not_found = || ApiError::NotFound("Song not found".to_string());

    let song = Song::find_by_id(&state.db, song_id)
        .await?
        .ok_or_else(not_found)?;

    require_membership(&state.db, song.team_id, auth.user_id)
        .await
        .map_err(|e| match e {
            AuthzError::NotMember(_) => not_found(),
            other => other.into(),
        })?;

    Ok(Json(song))
}

/// List a team's songs
pub async fn list_team_songs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    Query(query): Query<ListSongsQuery>,
) -> ApiResult<Json<ListSongsResponse>> {
    require_membership(&state.db, team_id, auth.user_id).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let songs = Song::list_by_team(&state.db, team_id, limit).await?;

    Ok(Json(ListSongsResponse { songs }))
}

/// List genres
pub async fn list_genres() -> Json<ListGenresResponse> {
    Json(ListGenresResponse {
        genres: Genre::ALL
            .iter()
            .map(|g| GenreInfo {
                id: g.as_str(),
                label: g.label(),
                emoji: g.emoji(),
            })
            .collect(),
    })
}
