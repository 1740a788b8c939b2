use std::str::FromStr;

use axum::{
    extract::Path,
    routing::{delete, get, post, put},
    Json,
};
use backline_core::{NewSong, ProgressStatus, SongStatus};
use chrono::Utc;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{NewSongSchema, UpdateProgressSchema, ValidatedJson},
    serialized::{Progress, Song, ToSerialized, VoteSummary, WishlistSong},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/bands/{id}/songs",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>, description = "The band's active repertoire")
    )
)]
async fn list_songs(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
) -> ServerResult<Json<Vec<Song>>> {
    let songs = context
        .backline
        .repertoire
        .songs(session.user().id, band_id, SongStatus::Active)
        .await?;

    Ok(Json(songs.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/bands/{id}/wishlist",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<WishlistSong>, description = "Wishlist songs with their vote tallies")
    )
)]
async fn wishlist(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
) -> ServerResult<Json<Vec<WishlistSong>>> {
    let entries = context
        .backline
        .repertoire
        .wishlist(session.user().id, band_id)
        .await?;

    Ok(Json(entries.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/bands/{id}/songs",
    tag = "songs",
    request_body = NewSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
async fn create_song(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<NewSongSchema>,
) -> ServerResult<Json<Song>> {
    let status = body
        .status
        .as_deref()
        .map(SongStatus::from_str)
        .transpose()
        .map_err(|e| ServerError::Validation(e.to_string()))?
        .unwrap_or(SongStatus::Wishlist);

    let song = context
        .backline
        .repertoire
        .create_song(
            session.user().id,
            NewSong {
                band_id,
                title: body.title,
                artist: body.artist,
                status,
                duration_seconds: body.duration_seconds,
                external_track_id: body.external_track_id,
                album_art_url: body.album_art_url,
            },
        )
        .await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/songs/{id}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
async fn song(
    session: Session,
    context: ServerContext,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Song>> {
    let song = context
        .backline
        .repertoire
        .song(session.user().id, song_id)
        .await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/songs/{id}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Song and everything attached to it was removed")
    )
)]
async fn delete_song(
    session: Session,
    context: ServerContext,
    Path(song_id): Path<i32>,
) -> ServerResult<()> {
    context
        .backline
        .repertoire
        .delete_song(session.user().id, song_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/songs/{id}/approve",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song, description = "Song moved into the active repertoire")
    )
)]
async fn approve_song(
    session: Session,
    context: ServerContext,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Song>> {
    let song = context
        .backline
        .repertoire
        .approve_song(session.user().id, song_id)
        .await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/songs/{id}/votes",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = VoteSummary, description = "The tally after toggling the user's vote")
    )
)]
async fn toggle_vote(
    session: Session,
    context: ServerContext,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<VoteSummary>> {
    let summary = context
        .backline
        .repertoire
        .toggle_vote(session.user().id, song_id)
        .await?;

    Ok(Json(summary.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/songs/{id}/progress",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Progress>, description = "Every member's progress on the song")
    )
)]
async fn song_progress(
    session: Session,
    context: ServerContext,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Vec<Progress>>> {
    let progress = context
        .backline
        .repertoire
        .song_progress(session.user().id, song_id)
        .await?;

    Ok(Json(progress.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/songs/{id}/progress",
    tag = "songs",
    request_body = UpdateProgressSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Progress, description = "The user's own progress after the update")
    )
)]
async fn set_progress(
    session: Session,
    context: ServerContext,
    Path(song_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateProgressSchema>,
) -> ServerResult<Json<Progress>> {
    let status = ProgressStatus::from_str(&body.status)
        .map_err(|e| ServerError::Validation(e.to_string()))?;

    let progress = context
        .backline
        .repertoire
        .set_progress(session.user().id, song_id, status)
        .await?;

    Ok(Json(progress.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/songs/{id}/rehearsed",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song, description = "Song with today recorded as its last rehearsal")
    )
)]
async fn mark_rehearsed(
    session: Session,
    context: ServerContext,
    Path(song_id): Path<i32>,
) -> ServerResult<Json<Song>> {
    let today = Utc::now().date_naive();

    let song = context
        .backline
        .repertoire
        .mark_rehearsed(session.user().id, song_id, today)
        .await?;

    Ok(Json(song.to_serialized()))
}

/// Routes living under a band, for its song collections
pub fn band_router() -> Router {
    Router::new()
        .route("/:id/songs", get(list_songs))
        .route("/:id/songs", post(create_song))
        .route("/:id/wishlist", get(wishlist))
}

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(song))
        .route("/:id", delete(delete_song))
        .route("/:id/approve", post(approve_song))
        .route("/:id/votes", post(toggle_vote))
        .route("/:id/progress", get(song_progress))
        .route("/:id/progress", put(set_progress))
        .route("/:id/rehearsed", post(mark_rehearsed))
}
