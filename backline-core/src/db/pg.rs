use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    query, Error as SqlxError, PgPool, Row,
};

use crate::{
    db::{
        BandData, BandMemberData, Database, DatabaseError, DatabaseResult, IntoDatabaseError,
        InvitationData, InvitationStatus, MemberRole, NewBand, NewBandMember, NewInvitation,
        NewProgress, NewSession, NewSong, NewUser, NewVote, PrimaryKey, ProgressData,
        ProgressStatus, Result, SessionData, SongData, SongStatus, UpdatedBand, UserData, VoteData,
    },
    setlist::{SetlistConfigData, SetlistConfigUpdate},
};

/// A postgres database implementation for backline
pub struct PgDatabase {
    pool: PgPool,
}

/// Tables are created on startup if they don't exist yet,
/// so a fresh database needs no manual setup.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        display_name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS bands (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        emoji TEXT,
        color TEXT,
        monogram TEXT,
        allow_member_invites BOOLEAN NOT NULL DEFAULT false,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id SERIAL PRIMARY KEY,
        token TEXT NOT NULL UNIQUE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        band_id INTEGER REFERENCES bands(id) ON DELETE SET NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS band_members (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        band_id INTEGER NOT NULL REFERENCES bands(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        joined_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (user_id, band_id)
    )",
    "CREATE TABLE IF NOT EXISTS songs (
        id SERIAL PRIMARY KEY,
        band_id INTEGER NOT NULL REFERENCES bands(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        artist TEXT NOT NULL,
        status TEXT NOT NULL,
        duration_seconds INTEGER,
        last_rehearsed_on DATE,
        external_track_id TEXT,
        album_art_url TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS song_progress (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
        status TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (user_id, song_id)
    )",
    "CREATE TABLE IF NOT EXISTS votes (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (user_id, song_id)
    )",
    "CREATE TABLE IF NOT EXISTS invitations (
        id SERIAL PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        band_id INTEGER NOT NULL REFERENCES bands(id) ON DELETE CASCADE,
        invited_by INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        invited_email TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS setlist_configs (
        band_id INTEGER PRIMARY KEY REFERENCES bands(id) ON DELETE CASCADE,
        new_songs_buffer_percent DOUBLE PRECISION NOT NULL,
        learned_songs_buffer_percent DOUBLE PRECISION NOT NULL,
        break_time_minutes INTEGER NOT NULL,
        break_threshold_minutes INTEGER NOT NULL,
        min_session_minutes INTEGER NOT NULL,
        max_session_minutes INTEGER NOT NULL,
        time_cluster_minutes INTEGER NOT NULL
    )",
];

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        for statement in SCHEMA {
            query(statement)
                .execute(&pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(Self { pool })
    }
}

fn parse_text<T>(value: String) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| DatabaseError::Internal(Box::new(e)))
}

fn user_from_row(row: &PgRow) -> UserData {
    UserData {
        id: row.get("id"),
        email: row.get("email"),
        password: row.get("password"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

fn band_from_row(row: &PgRow) -> BandData {
    BandData {
        id: row.get("id"),
        name: row.get("name"),
        emoji: row.get("emoji"),
        color: row.get("color"),
        monogram: row.get("monogram"),
        allow_member_invites: row.get("allow_member_invites"),
        created_at: row.get("created_at"),
    }
}

fn song_from_row(row: &PgRow) -> Result<SongData> {
    Ok(SongData {
        id: row.get("id"),
        band_id: row.get("band_id"),
        title: row.get("title"),
        artist: row.get("artist"),
        status: parse_text(row.get("status"))?,
        duration_seconds: row.get("duration_seconds"),
        last_rehearsed_on: row.get::<Option<NaiveDate>, _>("last_rehearsed_on"),
        external_track_id: row.get("external_track_id"),
        album_art_url: row.get("album_art_url"),
        created_at: row.get("created_at"),
    })
}

fn progress_from_row(row: &PgRow) -> Result<ProgressData> {
    Ok(ProgressData {
        user_id: row.get("user_id"),
        song_id: row.get("song_id"),
        status: parse_text(row.get("status"))?,
        updated_at: row.get("updated_at"),
    })
}

fn vote_from_row(row: &PgRow) -> VoteData {
    VoteData {
        user_id: row.get("user_id"),
        song_id: row.get("song_id"),
        created_at: row.get("created_at"),
    }
}

fn invitation_from_row(row: &PgRow) -> Result<InvitationData> {
    Ok(InvitationData {
        id: row.get("id"),
        code: row.get("code"),
        band_id: row.get("band_id"),
        invited_by: row.get("invited_by"),
        invited_email: row.get("invited_email"),
        status: parse_text(row.get("status"))?,
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    })
}

fn config_from_row(row: &PgRow) -> SetlistConfigData {
    SetlistConfigData {
        band_id: row.get("band_id"),
        new_songs_buffer_percent: row.get("new_songs_buffer_percent"),
        learned_songs_buffer_percent: row.get("learned_songs_buffer_percent"),
        break_time_minutes: row.get("break_time_minutes"),
        break_threshold_minutes: row.get("break_threshold_minutes"),
        min_session_minutes: row.get("min_session_minutes"),
        max_session_minutes: row.get("max_session_minutes"),
        time_cluster_minutes: row.get("time_cluster_minutes"),
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(|row| user_from_row(&row))
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map(|row| user_from_row(&row))
            .map_err(|e| e.not_found_or("user", "email"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_email(&new_user.email)
            .await
            .conflict_or_ok("user", "email", &new_user.email)?;

        query(
            "INSERT INTO users (email, password, display_name) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(new_user.email)
        .bind(new_user.password)
        .bind(new_user.display_name)
        .fetch_one(&self.pool)
        .await
        .map(|row| user_from_row(&row))
        .map_err(|e| e.any())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = query(
            "SELECT
                sessions.id,
                sessions.token,
                sessions.band_id,
                sessions.expires_at,
                users.id AS user_id,
                users.email,
                users.password,
                users.display_name,
                users.created_at
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            id: row.get("id"),
            token: row.get("token"),
            expires_at: row.get("expires_at"),
            band_id: row.get("band_id"),
            user: UserData {
                id: row.get("user_id"),
                email: row.get("email"),
                password: row.get("password"),
                display_name: row.get("display_name"),
                created_at: row.get("created_at"),
            },
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        let record = query(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3) RETURNING token",
        )
        .bind(new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let token: String = record.get("token");
        self.session_by_token(&token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE timezone('UTC', now()) > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn set_session_band(
        &self,
        session_id: PrimaryKey,
        band_id: Option<PrimaryKey>,
    ) -> Result<()> {
        let result = query("UPDATE sessions SET band_id = $1 WHERE id = $2")
            .bind(band_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn band_by_id(&self, band_id: PrimaryKey) -> Result<BandData> {
        query("SELECT * FROM bands WHERE id = $1")
            .bind(band_id)
            .fetch_one(&self.pool)
            .await
            .map(|row| band_from_row(&row))
            .map_err(|e| e.not_found_or("band", "id"))
    }

    async fn bands_for_user(&self, user_id: PrimaryKey) -> Result<Vec<BandData>> {
        let rows = query(
            "SELECT bands.*
            FROM bands
                INNER JOIN band_members ON bands.id = band_members.band_id
            WHERE band_members.user_id = $1
            ORDER BY band_members.joined_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.iter().map(band_from_row).collect())
    }

    async fn create_band(&self, new_band: NewBand) -> Result<BandData> {
        let user = self.user_by_id(new_band.user_id).await?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let band_row = query(
            "INSERT INTO bands (name, emoji, color, monogram) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(new_band.name)
        .bind(new_band.emoji)
        .bind(new_band.color)
        .bind(new_band.monogram)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let band = band_from_row(&band_row);

        // The founder joins their own band as its first leader
        query("INSERT INTO band_members (user_id, band_id, role) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(band.id)
            .bind(MemberRole::Leader.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        Ok(band)
    }

    async fn update_band(&self, updated_band: UpdatedBand) -> Result<BandData> {
        let band = self.band_by_id(updated_band.id).await?;

        query(
            "UPDATE bands SET
                name = $1,
                emoji = $2,
                color = $3,
                monogram = $4,
                allow_member_invites = $5
            WHERE id = $6",
        )
        .bind(updated_band.name.unwrap_or(band.name))
        .bind(updated_band.emoji.or(band.emoji))
        .bind(updated_band.color.or(band.color))
        .bind(updated_band.monogram.or(band.monogram))
        .bind(
            updated_band
                .allow_member_invites
                .unwrap_or(band.allow_member_invites),
        )
        .bind(updated_band.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.band_by_id(updated_band.id).await
    }

    async fn delete_band(&self, band_id: PrimaryKey) -> Result<()> {
        // Ensure band exists
        let _ = self.band_by_id(band_id).await?;

        query("DELETE FROM bands WHERE id = $1")
            .bind(band_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn member_role(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<Option<MemberRole>> {
        let row = query("SELECT role FROM band_members WHERE band_id = $1 AND user_id = $2")
            .bind(band_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.any())?;

        row.map(|r| parse_text(r.get("role"))).transpose()
    }

    async fn list_members(&self, band_id: PrimaryKey) -> Result<Vec<BandMemberData>> {
        let rows = query(
            "SELECT
                band_members.role,
                band_members.joined_at,
                users.id,
                users.email,
                users.password,
                users.display_name,
                users.created_at
            FROM band_members
                INNER JOIN users ON band_members.user_id = users.id
            WHERE band_id = $1
            ORDER BY band_members.joined_at",
        )
        .bind(band_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter()
            .map(|row| {
                Ok(BandMemberData {
                    user: user_from_row(row),
                    role: parse_text(row.get("role"))?,
                    joined_at: row.get("joined_at"),
                })
            })
            .collect()
    }

    async fn create_band_member(&self, new_member: NewBandMember) -> Result<BandMemberData> {
        // Ensure the user isn't a member of this band already
        query("SELECT user_id FROM band_members WHERE user_id = $1 AND band_id = $2")
            .bind(new_member.user_id)
            .bind(new_member.band_id)
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| e.not_found_or("", ""))
            .conflict_or_ok(
                "band member",
                "user:band",
                format!("{}:{}", new_member.user_id, new_member.band_id).as_str(),
            )?;

        let user = self.user_by_id(new_member.user_id).await?;

        let row = query(
            "INSERT INTO band_members (user_id, band_id, role)
            VALUES ($1, $2, $3)
            RETURNING joined_at",
        )
        .bind(new_member.user_id)
        .bind(new_member.band_id)
        .bind(new_member.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(BandMemberData {
            user,
            role: new_member.role,
            joined_at: row.get("joined_at"),
        })
    }

    async fn delete_band_member(&self, band_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        query("DELETE FROM band_members WHERE band_id = $1 AND user_id = $2")
            .bind(band_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn update_member_role(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
        role: MemberRole,
    ) -> Result<()> {
        let result = query("UPDATE band_members SET role = $1 WHERE band_id = $2 AND user_id = $3")
            .bind(role.as_str())
            .bind(band_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "band member",
                identifier: "user_id",
            });
        }

        Ok(())
    }

    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData> {
        let row = query("SELECT * FROM songs WHERE id = $1")
            .bind(song_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("song", "id"))?;

        song_from_row(&row)
    }

    async fn list_songs(&self, band_id: PrimaryKey, status: SongStatus) -> Result<Vec<SongData>> {
        let rows = query("SELECT * FROM songs WHERE band_id = $1 AND status = $2 ORDER BY id")
            .bind(band_id)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter().map(song_from_row).collect()
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let row = query(
            "INSERT INTO songs (band_id, title, artist, status, duration_seconds, external_track_id, album_art_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *",
        )
        .bind(new_song.band_id)
        .bind(new_song.title)
        .bind(new_song.artist)
        .bind(new_song.status.as_str())
        .bind(new_song.duration_seconds)
        .bind(new_song.external_track_id)
        .bind(new_song.album_art_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        song_from_row(&row)
    }

    async fn update_song_status(
        &self,
        song_id: PrimaryKey,
        status: SongStatus,
    ) -> Result<SongData> {
        // Ensure song exists
        let _ = self.song_by_id(song_id).await?;

        query("UPDATE songs SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.song_by_id(song_id).await
    }

    async fn set_last_rehearsed(&self, song_id: PrimaryKey, on: NaiveDate) -> Result<SongData> {
        // Ensure song exists
        let _ = self.song_by_id(song_id).await?;

        query("UPDATE songs SET last_rehearsed_on = $1 WHERE id = $2")
            .bind(on)
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.song_by_id(song_id).await
    }

    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()> {
        // Ensure song exists
        let _ = self.song_by_id(song_id).await?;

        query("DELETE FROM songs WHERE id = $1")
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn progress_entry(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<ProgressData> {
        let row = query("SELECT * FROM song_progress WHERE user_id = $1 AND song_id = $2")
            .bind(user_id)
            .bind(song_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("progress", "user_id"))?;

        progress_from_row(&row)
    }

    async fn progress_for_song(&self, song_id: PrimaryKey) -> Result<Vec<ProgressData>> {
        let rows = query("SELECT * FROM song_progress WHERE song_id = $1")
            .bind(song_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter().map(progress_from_row).collect()
    }

    async fn progress_for_band(&self, band_id: PrimaryKey) -> Result<Vec<ProgressData>> {
        let rows = query(
            "SELECT song_progress.*
            FROM song_progress
                INNER JOIN songs ON song_progress.song_id = songs.id
            WHERE songs.band_id = $1",
        )
        .bind(band_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter().map(progress_from_row).collect()
    }

    async fn create_progress(&self, new_progress: NewProgress) -> Result<ProgressData> {
        self.progress_entry(new_progress.user_id, new_progress.song_id)
            .await
            .conflict_or_ok(
                "progress",
                "user:song",
                format!("{}:{}", new_progress.user_id, new_progress.song_id).as_str(),
            )?;

        query("INSERT INTO song_progress (user_id, song_id, status) VALUES ($1, $2, $3)")
            .bind(new_progress.user_id)
            .bind(new_progress.song_id)
            .bind(new_progress.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.progress_entry(new_progress.user_id, new_progress.song_id)
            .await
    }

    async fn update_progress_status(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
        status: ProgressStatus,
    ) -> Result<ProgressData> {
        let result = query(
            "UPDATE song_progress SET status = $1, updated_at = now()
            WHERE user_id = $2 AND song_id = $3",
        )
        .bind(status.as_str())
        .bind(user_id)
        .bind(song_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "progress",
                identifier: "user_id",
            });
        }

        self.progress_entry(user_id, song_id).await
    }

    async fn vote_entry(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<VoteData> {
        query("SELECT * FROM votes WHERE user_id = $1 AND song_id = $2")
            .bind(user_id)
            .bind(song_id)
            .fetch_one(&self.pool)
            .await
            .map(|row| vote_from_row(&row))
            .map_err(|e| e.not_found_or("vote", "user_id"))
    }

    async fn votes_for_band(&self, band_id: PrimaryKey) -> Result<Vec<VoteData>> {
        let rows = query(
            "SELECT votes.*
            FROM votes
                INNER JOIN songs ON votes.song_id = songs.id
            WHERE songs.band_id = $1",
        )
        .bind(band_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.iter().map(vote_from_row).collect())
    }

    async fn create_vote(&self, new_vote: NewVote) -> Result<VoteData> {
        self.vote_entry(new_vote.user_id, new_vote.song_id)
            .await
            .conflict_or_ok(
                "vote",
                "user:song",
                format!("{}:{}", new_vote.user_id, new_vote.song_id).as_str(),
            )?;

        query("INSERT INTO votes (user_id, song_id) VALUES ($1, $2)")
            .bind(new_vote.user_id)
            .bind(new_vote.song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.vote_entry(new_vote.user_id, new_vote.song_id).await
    }

    async fn delete_vote(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        query("DELETE FROM votes WHERE user_id = $1 AND song_id = $2")
            .bind(user_id)
            .bind(song_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn count_votes(&self, song_id: PrimaryKey) -> Result<i64> {
        let row = query("SELECT COUNT(*) AS count FROM votes WHERE song_id = $1")
            .bind(song_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(row.get("count"))
    }

    async fn invitation_by_id(&self, invitation_id: PrimaryKey) -> Result<InvitationData> {
        let row = query("SELECT * FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("invitation", "id"))?;

        invitation_from_row(&row)
    }

    async fn invitation_by_code(&self, code: &str) -> Result<InvitationData> {
        let row = query("SELECT * FROM invitations WHERE code = $1")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("invitation", "code"))?;

        invitation_from_row(&row)
    }

    async fn list_invitations(&self, band_id: PrimaryKey) -> Result<Vec<InvitationData>> {
        let rows = query("SELECT * FROM invitations WHERE band_id = $1 ORDER BY created_at")
            .bind(band_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter().map(invitation_from_row).collect()
    }

    async fn create_invitation(&self, new_invitation: NewInvitation) -> Result<InvitationData> {
        self.invitation_by_code(&new_invitation.code)
            .await
            .conflict_or_ok("invitation", "code", &new_invitation.code)?;

        let row = query(
            "INSERT INTO invitations (code, band_id, invited_by, invited_email, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id",
        )
        .bind(new_invitation.code)
        .bind(new_invitation.band_id)
        .bind(new_invitation.invited_by)
        .bind(new_invitation.invited_email)
        .bind(new_invitation.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.invitation_by_id(row.get("id")).await
    }

    async fn update_invitation_status(
        &self,
        invitation_id: PrimaryKey,
        status: InvitationStatus,
    ) -> Result<()> {
        let result = query("UPDATE invitations SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(invitation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "invitation",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn update_invitation_expiry(
        &self,
        invitation_id: PrimaryKey,
        expires_at: DateTime<Utc>,
    ) -> Result<InvitationData> {
        // Ensure invitation exists
        let _ = self.invitation_by_id(invitation_id).await?;

        query("UPDATE invitations SET expires_at = $1 WHERE id = $2")
            .bind(expires_at)
            .bind(invitation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.invitation_by_id(invitation_id).await
    }

    async fn setlist_config(&self, band_id: PrimaryKey) -> Result<SetlistConfigData> {
        query("SELECT * FROM setlist_configs WHERE band_id = $1")
            .bind(band_id)
            .fetch_one(&self.pool)
            .await
            .map(|row| config_from_row(&row))
            .map_err(|e| e.not_found_or("setlist config", "band_id"))
    }

    async fn create_setlist_config(&self, config: SetlistConfigData) -> Result<SetlistConfigData> {
        self.setlist_config(config.band_id)
            .await
            .conflict_or_ok("setlist config", "band_id", &config.band_id.to_string())?;

        query(
            "INSERT INTO setlist_configs (
                band_id,
                new_songs_buffer_percent,
                learned_songs_buffer_percent,
                break_time_minutes,
                break_threshold_minutes,
                min_session_minutes,
                max_session_minutes,
                time_cluster_minutes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(config.band_id)
        .bind(config.new_songs_buffer_percent)
        .bind(config.learned_songs_buffer_percent)
        .bind(config.break_time_minutes)
        .bind(config.break_threshold_minutes)
        .bind(config.min_session_minutes)
        .bind(config.max_session_minutes)
        .bind(config.time_cluster_minutes)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.setlist_config(config.band_id).await
    }

    async fn update_setlist_config(
        &self,
        update: SetlistConfigUpdate,
    ) -> Result<SetlistConfigData> {
        let current = self.setlist_config(update.band_id).await?;
        let applied = update.apply_to(&current);

        query(
            "UPDATE setlist_configs SET
                new_songs_buffer_percent = $1,
                learned_songs_buffer_percent = $2,
                break_time_minutes = $3,
                break_threshold_minutes = $4,
                min_session_minutes = $5,
                max_session_minutes = $6,
                time_cluster_minutes = $7
            WHERE band_id = $8",
        )
        .bind(applied.new_songs_buffer_percent)
        .bind(applied.learned_songs_buffer_percent)
        .bind(applied.break_time_minutes)
        .bind(applied.break_threshold_minutes)
        .bind(applied.min_session_minutes)
        .bind(applied.max_session_minutes)
        .bind(applied.time_cluster_minutes)
        .bind(update.band_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.setlist_config(update.band_id).await
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
