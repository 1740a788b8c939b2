use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use backline_core::{AuthError, BandError, DatabaseError, RepertoireError, SetlistError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("No {resource} matched the given {identifier}")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("A {resource} with {field} \"{value}\" already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Email or password is incorrect")]
    InvalidCredentials,
    #[error("Band not found")]
    BandNotFound,
    #[error("Song not found")]
    SongNotFound,
    #[error("Not permitted to perform this action")]
    NotPermitted,
    #[error("User is not a member of this band")]
    NotAMember,
    #[error("User is already a member of this band")]
    AlreadyMember,
    #[error("Invitation is invalid or expired")]
    InvalidInvitation,
    #[error("Song is not in the wishlist")]
    NotInWishlist,
    #[error("{0}")]
    Validation(String),
    #[error("Something went wrong: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::Validation(_) | Self::NotInWishlist => StatusCode::BAD_REQUEST,
            Self::NotPermitted | Self::NotAMember => StatusCode::FORBIDDEN,
            Self::Conflict { .. } | Self::AlreadyMember => StatusCode::CONFLICT,
            Self::NotFound { .. }
            | Self::BandNotFound
            | Self::SongNotFound
            | Self::InvalidInvitation => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::NotAMember => Self::NotAMember,
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<BandError> for ServerError {
    fn from(value: BandError) -> Self {
        match value {
            BandError::BandNotFound => Self::BandNotFound,
            BandError::NotPermitted => Self::NotPermitted,
            BandError::AlreadyMember => Self::AlreadyMember,
            BandError::InvalidInvitation => Self::InvalidInvitation,
            BandError::Db(e) => e.into(),
        }
    }
}

impl From<RepertoireError> for ServerError {
    fn from(value: RepertoireError) -> Self {
        match value {
            RepertoireError::SongNotFound => Self::SongNotFound,
            RepertoireError::BandNotFound => Self::BandNotFound,
            RepertoireError::NotPermitted => Self::NotPermitted,
            RepertoireError::NotInWishlist => Self::NotInWishlist,
            RepertoireError::Db(e) => e.into(),
        }
    }
}

impl From<SetlistError> for ServerError {
    fn from(value: SetlistError) -> Self {
        match value {
            SetlistError::BandNotFound => Self::BandNotFound,
            SetlistError::NotPermitted => Self::NotPermitted,
            SetlistError::Db(e) => e.into(),
            // Bad generator inputs and out-of-range config fields
            e => Self::Validation(e.to_string()),
        }
    }
}
