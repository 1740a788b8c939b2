use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    db::{BandData, Database, DatabaseError, NewSession, NewUser, PrimaryKey, SessionData, UserData},
    util::random_string,
};

pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Email or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The session tried to select a band the user doesn't belong to
    #[error("User is not a member of this band")]
    NotAMember,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    const SESSION_DURATION_IN_DAYS: usize = 7;

    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let user = self
            .db
            .user_by_email(&credentials.email)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let new_session = NewSession {
            token: random_string(32),
            user_id: user.id,
            expires_at,
        };

        let new_session = self
            .db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)?;

        Ok(new_session)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Creates a user with a hashed password
    pub async fn register(&self, new_user: NewPlainUser) -> Result<UserData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        self.db
            .create_user(NewUser {
                email: new_user.email,
                password: hashed_password,
                display_name: new_user.display_name,
            })
            .await
            .map_err(AuthError::Db)
    }

    /// Returns a session if it exists
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        self.db.session_by_token(token).await
    }

    /// Remembers which band the session operates against.
    /// Only bands the user actually belongs to can be selected.
    pub async fn select_band(
        &self,
        session: &SessionData,
        band_id: PrimaryKey,
    ) -> Result<BandData, AuthError> {
        let role = self
            .db
            .member_role(band_id, session.user.id)
            .await
            .map_err(AuthError::Db)?;

        if role.is_none() {
            return Err(AuthError::NotAMember);
        }

        let band = self.db.band_by_id(band_id).await.map_err(AuthError::Db)?;

        self.db
            .set_session_band(session.id, Some(band.id))
            .await
            .map_err(AuthError::Db)?;

        Ok(band)
    }

    /// The band the session last selected, if the user is still a member of it.
    /// A selection that no longer passes the membership check is treated as
    /// no selection at all, so a stale or forged value grants nothing.
    pub async fn current_band(&self, session: &SessionData) -> Result<Option<BandData>, AuthError> {
        let Some(band_id) = session.band_id else {
            return Ok(None);
        };

        let role = self
            .db
            .member_role(band_id, session.user.id)
            .await
            .map_err(AuthError::Db)?;

        if role.is_none() {
            return Ok(None);
        }

        let band = self.db.band_by_id(band_id).await.map_err(AuthError::Db)?;
        Ok(Some(band))
    }

    async fn clear_expired(&self) {
        self.db
            .clear_expired_sessions()
            .await
            .expect("sessions are cleared")
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::{MemberRole, MemoryDatabase, NewBand, NewBandMember};

    fn auth() -> Auth<MemoryDatabase> {
        Auth::new(&Arc::new(MemoryDatabase::new()))
    }

    fn plain_user(email: &str) -> NewPlainUser {
        NewPlainUser {
            email: email.to_string(),
            password: "correct horse battery staple".to_string(),
            display_name: "Alex".to_string(),
        }
    }

    #[tokio::test]
    async fn passwords_are_hashed_and_verified() {
        let auth = auth();

        let user = auth.register(plain_user("alex@example.com")).await.unwrap();
        assert_ne!(user.password, "correct horse battery staple");

        let session = auth
            .login(Credentials {
                email: "alex@example.com".to_string(),
                password: "correct horse battery staple".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.user.id, user.id);
        assert_eq!(session.token.len(), 32);

        let wrong = auth
            .login(Credentials {
                email: "alex@example.com".to_string(),
                password: "incorrect horse".to_string(),
            })
            .await;

        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn unknown_emails_fail_like_wrong_passwords() {
        let auth = auth();

        let result = auth
            .login(Credentials {
                email: "nobody@example.com".to_string(),
                password: "whatever".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn sessions_end_on_logout() {
        let auth = auth();

        auth.register(plain_user("alex@example.com")).await.unwrap();
        let session = auth
            .login(Credentials {
                email: "alex@example.com".to_string(),
                password: "correct horse battery staple".to_string(),
            })
            .await
            .unwrap();

        assert!(auth.session(&session.token).await.is_ok());
        auth.logout(&session.token).await.unwrap();
        assert!(auth.session(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn band_selection_requires_membership() {
        let db = Arc::new(MemoryDatabase::new());
        let auth = Auth::new(&db);

        let member = auth.register(plain_user("member@example.com")).await.unwrap();
        let outsider = auth
            .register(plain_user("outsider@example.com"))
            .await
            .unwrap();

        let band = db
            .create_band(NewBand {
                name: "The Offcuts".to_string(),
                emoji: None,
                color: None,
                monogram: None,
                user_id: member.id,
            })
            .await
            .unwrap();

        let session = auth
            .login(Credentials {
                email: "outsider@example.com".to_string(),
                password: "correct horse battery staple".to_string(),
            })
            .await
            .unwrap();

        let result = auth.select_band(&session, band.id).await;
        assert!(matches!(result, Err(AuthError::NotAMember)));

        db.create_band_member(NewBandMember {
            user_id: outsider.id,
            band_id: band.id,
            role: MemberRole::Member,
        })
        .await
        .unwrap();

        auth.select_band(&session, band.id).await.unwrap();

        let session = auth.session(&session.token).await.unwrap();
        assert_eq!(session.band_id, Some(band.id));
    }

    #[tokio::test]
    async fn stale_band_selection_grants_nothing() {
        let db = Arc::new(MemoryDatabase::new());
        let auth = Auth::new(&db);

        let user = auth.register(plain_user("alex@example.com")).await.unwrap();
        let band = db
            .create_band(NewBand {
                name: "The Offcuts".to_string(),
                emoji: None,
                color: None,
                monogram: None,
                user_id: user.id,
            })
            .await
            .unwrap();

        let session = auth
            .login(Credentials {
                email: "alex@example.com".to_string(),
                password: "correct horse battery staple".to_string(),
            })
            .await
            .unwrap();

        auth.select_band(&session, band.id).await.unwrap();
        let session = auth.session(&session.token).await.unwrap();

        auth.current_band(&session)
            .await
            .unwrap()
            .expect("band is selected");

        // The selection stops working the moment the membership is gone
        db.delete_band_member(band.id, user.id).await.unwrap();
        assert!(auth.current_band(&session).await.unwrap().is_none());
    }
}
