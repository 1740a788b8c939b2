use axum::{
    extract::Path,
    routing::{get, patch, post},
    Json,
};
use backline_core::SetlistConfigUpdate;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{GenerateSetlistSchema, UpdateSetlistConfigSchema, ValidatedJson},
    serialized::{Setlist, SetlistConfig, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/bands/{id}/setlists",
    tag = "setlists",
    request_body = GenerateSetlistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Setlist),
        (status = 400, description = "Duration or learning ratio is out of range")
    )
)]
async fn generate_setlist(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<GenerateSetlistSchema>,
) -> ServerResult<Json<Setlist>> {
    let setlist = context
        .backline
        .setlists
        .generate(
            session.user().id,
            band_id,
            body.duration_minutes,
            body.learning_ratio,
        )
        .await?;

    Ok(Json(setlist.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/bands/{id}/setlists/config",
    tag = "setlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SetlistConfig)
    )
)]
async fn config(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
) -> ServerResult<Json<SetlistConfig>> {
    let config = context
        .backline
        .setlists
        .config(session.user().id, band_id)
        .await?;

    Ok(Json(config.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/bands/{id}/setlists/config",
    tag = "setlists",
    request_body = UpdateSetlistConfigSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SetlistConfig),
        (status = 400, description = "A field is out of its allowed range, nothing was changed")
    )
)]
async fn update_config(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateSetlistConfigSchema>,
) -> ServerResult<Json<SetlistConfig>> {
    let config = context
        .backline
        .setlists
        .update_config(
            session.user().id,
            SetlistConfigUpdate {
                band_id,
                new_songs_buffer_percent: body.new_songs_buffer_percent,
                learned_songs_buffer_percent: body.learned_songs_buffer_percent,
                break_time_minutes: body.break_time_minutes,
                break_threshold_minutes: body.break_threshold_minutes,
                min_session_minutes: body.min_session_minutes,
                max_session_minutes: body.max_session_minutes,
                time_cluster_minutes: body.time_cluster_minutes,
            },
        )
        .await?;

    Ok(Json(config.to_serialized()))
}

/// Routes living under a band, for planning its sessions
pub fn band_router() -> Router {
    Router::new()
        .route("/:id/setlists", post(generate_setlist))
        .route("/:id/setlists/config", get(config))
        .route("/:id/setlists/config", patch(update_config))
}
