use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use backline_core::PrimaryKey;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
    #[validate(length(min = 2, max = 128))]
    pub display_name: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 128))]
    pub email: String,
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SelectBandSchema {
    pub band_id: PrimaryKey,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBandSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 16))]
    pub emoji: Option<String>,
    #[validate(length(max = 32))]
    pub color: Option<String>,
    #[validate(length(min = 1, max = 1))]
    pub monogram: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateBandSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    #[validate(length(max = 16))]
    pub emoji: Option<String>,
    #[validate(length(max = 32))]
    pub color: Option<String>,
    #[validate(length(min = 1, max = 1))]
    pub monogram: Option<String>,
    pub allow_member_invites: Option<bool>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRoleSchema {
    /// Either "leader" or "member"
    pub role: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InviteSchema {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSongSchema {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(min = 1, max = 256))]
    pub artist: String,
    /// Either "wishlist" or "active". Defaults to "wishlist",
    /// adding straight to "active" is a leader action.
    pub status: Option<String>,
    #[validate(range(min = 1))]
    pub duration_seconds: Option<i32>,
    pub external_track_id: Option<String>,
    pub album_art_url: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProgressSchema {
    /// One of "to_listen", "in_practice", "ready_for_rehearsal" or "mastered"
    pub status: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GenerateSetlistSchema {
    pub duration_minutes: i32,
    pub learning_ratio: f64,
}

#[derive(Debug, Default, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSetlistConfigSchema {
    pub new_songs_buffer_percent: Option<f64>,
    pub learned_songs_buffer_percent: Option<f64>,
    pub break_time_minutes: Option<i32>,
    pub break_threshold_minutes: Option<i32>,
    pub min_session_minutes: Option<i32>,
    pub max_session_minutes: Option<i32>,
    pub time_cluster_minutes: Option<i32>,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
