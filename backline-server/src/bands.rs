use std::str::FromStr;

use axum::{
    extract::Path,
    routing::{delete, get, patch, post, put},
    Json,
};
use backline_core::{MemberRole, NewBand, RoleUpdate, UpdatedBand};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{InviteSchema, NewBandSchema, UpdateBandSchema, UpdateRoleSchema, ValidatedJson},
    serialized::{Band, BandMember, Invitation, InvitationPreview, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/bands",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Band>)
    )
)]
async fn list_bands(session: Session, context: ServerContext) -> ServerResult<Json<Vec<Band>>> {
    let bands = context.backline.bands.bands_for(session.user().id).await?;

    Ok(Json(bands.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/bands",
    tag = "bands",
    request_body = NewBandSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Band)
    )
)]
async fn create_band(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewBandSchema>,
) -> ServerResult<Json<Band>> {
    let band = context
        .backline
        .bands
        .create_band(NewBand {
            name: body.name,
            emoji: body.emoji,
            color: body.color,
            monogram: body.monogram,
            user_id: session.user().id,
        })
        .await?;

    Ok(Json(band.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/bands/{id}",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Band)
    )
)]
async fn band(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
) -> ServerResult<Json<Band>> {
    let band = context.backline.bands.band(session.user().id, band_id).await?;

    Ok(Json(band.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/bands/{id}",
    tag = "bands",
    request_body = UpdateBandSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Band)
    )
)]
async fn update_band(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateBandSchema>,
) -> ServerResult<Json<Band>> {
    let band = context
        .backline
        .bands
        .update_band(
            session.user().id,
            UpdatedBand {
                id: band_id,
                name: body.name,
                emoji: body.emoji,
                color: body.color,
                monogram: body.monogram,
                allow_member_invites: body.allow_member_invites,
            },
        )
        .await?;

    Ok(Json(band.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/bands/{id}",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Band and everything in it was deleted")
    )
)]
async fn delete_band(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
) -> ServerResult<()> {
    context
        .backline
        .bands
        .delete_band(session.user().id, band_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/bands/{id}/members",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<BandMember>)
    )
)]
async fn members(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
) -> ServerResult<Json<Vec<BandMember>>> {
    let members = context
        .backline
        .bands
        .members(session.user().id, band_id)
        .await?;

    Ok(Json(members.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/bands/{id}/members/{user_id}",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = bool, description = "Whether the member was removed")
    )
)]
async fn kick_member(
    session: Session,
    context: ServerContext,
    Path((band_id, user_id)): Path<(i32, i32)>,
) -> ServerResult<Json<bool>> {
    let removed = context
        .backline
        .bands
        .kick_member(session.user().id, band_id, user_id)
        .await?;

    Ok(Json(removed))
}

#[utoipa::path(
    put,
    path = "/v1/bands/{id}/members/{user_id}/role",
    tag = "bands",
    request_body = UpdateRoleSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Role was updated")
    )
)]
async fn update_member_role(
    session: Session,
    context: ServerContext,
    Path((band_id, user_id)): Path<(i32, i32)>,
    ValidatedJson(body): ValidatedJson<UpdateRoleSchema>,
) -> ServerResult<()> {
    let role = MemberRole::from_str(&body.role)
        .map_err(|e| ServerError::Validation(e.to_string()))?;

    let update = context
        .backline
        .bands
        .set_member_role(session.user().id, band_id, user_id, role)
        .await?;

    match update {
        RoleUpdate::Updated => Ok(()),
        RoleUpdate::NotAMember => Err(ServerError::NotFound {
            resource: "member",
            identifier: "id",
        }),
    }
}

#[utoipa::path(
    get,
    path = "/v1/bands/{id}/invitations",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Invitation>)
    )
)]
async fn list_invitations(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
) -> ServerResult<Json<Vec<Invitation>>> {
    let invitations = context
        .backline
        .bands
        .invitations(session.user().id, band_id)
        .await?;

    Ok(Json(invitations.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/bands/{id}/invitations",
    tag = "bands",
    request_body = InviteSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Invitation)
    )
)]
async fn create_invitation(
    session: Session,
    context: ServerContext,
    Path(band_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<InviteSchema>,
) -> ServerResult<Json<Invitation>> {
    let invitation = context
        .backline
        .bands
        .invite(session.user().id, band_id, body.email)
        .await?;

    Ok(Json(invitation.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/bands/{id}/invitations/{invitation_id}/resend",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Invitation, description = "Invitation was revived with a fresh expiry")
    )
)]
async fn resend_invitation(
    session: Session,
    context: ServerContext,
    Path((band_id, invitation_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Invitation>> {
    let invitation = context
        .backline
        .bands
        .resend_invitation(session.user().id, band_id, invitation_id)
        .await?;

    Ok(Json(invitation.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/invitations/{code}",
    tag = "bands",
    responses(
        (status = 200, body = InvitationPreview)
    )
)]
async fn invitation_by_code(
    context: ServerContext,
    Path(code): Path<String>,
) -> ServerResult<Json<InvitationPreview>> {
    let preview = context.backline.bands.invitation_preview(&code).await?;

    Ok(Json(preview.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/invitations/{code}/accept",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = BandMember, description = "User joined the band, and the invitation is consumed")
    )
)]
async fn accept_invitation(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
) -> ServerResult<Json<BandMember>> {
    let member = context
        .backline
        .bands
        .accept_invitation(session.user().id, &code)
        .await?;

    Ok(Json(member.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_bands))
        .route("/", post(create_band))
        .route("/:id", get(band))
        .route("/:id", patch(update_band))
        .route("/:id", delete(delete_band))
        .route("/:id/members", get(members))
        .route("/:id/members/:user_id", delete(kick_member))
        .route("/:id/members/:user_id/role", put(update_member_role))
        .route("/:id/invitations", get(list_invitations))
        .route("/:id/invitations", post(create_invitation))
        .route("/:id/invitations/:invitation_id/resend", post(resend_invitation))
}

/// Invitation codes are resolved outside the band scope, so people
/// who aren't members yet can see and accept them
pub fn invitation_router() -> Router {
    Router::new()
        .route("/:code", get(invitation_by_code))
        .route("/:code/accept", post(accept_invitation))
}
