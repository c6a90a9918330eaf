//! Profile and credential storage.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use kedai_core::{Email, ProfileId, Role};

use super::RepositoryError;
use crate::models::Profile;

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: ProfileId,
    email: Email,
    full_name: Option<String>,
    phone: Option<String>,
    role: Role,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PROFILE_COLUMNS: &str = "id, email, full_name, phone, role, created_at, updated_at";

/// Repository for profile database operations.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a profile by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProfileId) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a profile together with its password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(Profile, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            profile: ProfileRow,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, Row>(
            r"
            SELECT p.id, p.email, p.full_name, p.phone, p.role, p.created_at, p.updated_at,
                   c.password_hash
            FROM profiles p
            JOIN auth_credentials c ON c.profile_id = p.id
            WHERE p.email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| (r.profile.into(), r.password_hash)))
    }

    /// Create a customer profile and its password credential in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_customer(
        &self,
        email: &Email,
        full_name: Option<&str>,
        password_hash: &str,
    ) -> Result<Profile, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r"
            INSERT INTO profiles (email, full_name, role)
            VALUES ($1, $2, 'customer')
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(email)
        .bind(full_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email already exists"))?;

        sqlx::query("INSERT INTO auth_credentials (profile_id, password_hash) VALUES ($1, $2)")
            .bind(row.id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Update contact details. `None` leaves a field unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn update_contact(
        &self,
        id: ProfileId,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Profile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r"
            UPDATE profiles
            SET full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                updated_at = now()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(full_name)
        .bind(phone)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}
