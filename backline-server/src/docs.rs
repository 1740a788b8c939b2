use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Components,
    },
    Modify, OpenApi,
};
use utoipauto::utoipauto;

#[utoipauto(paths = "./backline-server/src")]
#[derive(OpenApi)]
#[openapi(
    modifiers(&SessionAuth),
    info(
        title = "backline",
        description = "Band management: memberships, repertoire and rehearsal planning"
    ),
    tags(
        (name = "auth", description = "Accounts, sessions and the selected band"),
        (name = "bands", description = "Bands, members and invitations"),
        (name = "songs", description = "Repertoire, wishlist votes and progress"),
        (name = "setlists", description = "Rehearsal plans and their configuration")
    )
)]
pub struct ApiDoc;

/// Registers the bearer scheme the session extractor expects
struct SessionAuth;

impl Modify for SessionAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Components::default);

        let scheme = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .bearer_format("Bearer <token>")
            .build();

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme));
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
