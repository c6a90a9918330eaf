//! Profile lookups for staff login, role resolution and user management.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use kedai_core::{Email, PageRequest, Paginated, ProfileId, Role};

use super::{RepositoryError, like_pattern};
use crate::models::UserSummary;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: ProfileId,
    email: Email,
    full_name: Option<String>,
    phone: Option<String>,
    role: Role,
    order_count: i64,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserSummary {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            role: row.role,
            order_count: row.order_count,
            created_at: row.created_at,
        }
    }
}

/// Credentials needed to check a staff login.
#[derive(Debug, sqlx::FromRow)]
pub struct LoginRecord {
    pub id: ProfileId,
    pub email: Email,
    pub full_name: Option<String>,
    pub role: Role,
    pub password_hash: String,
}

const USER_SELECT: &str = r"
    SELECT p.id, p.email, p.full_name, p.phone, p.role, p.created_at,
           (SELECT COUNT(*) FROM orders o WHERE o.profile_id = p.id) AS order_count
    FROM profiles p
";

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

    /// Profile and password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn login_record(&self, email: &Email) -> Result<Option<LoginRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, LoginRecord>(
            r"
            SELECT p.id, p.email, p.full_name, p.role, c.password_hash
            FROM profiles p
            JOIN auth_credentials c ON c.profile_id = p.id
            WHERE p.email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Current role of a profile; `None` if the profile is gone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn role_of(&self, id: ProfileId) -> Result<Option<Role>, RepositoryError> {
        let role = sqlx::query_scalar::<_, Role>("SELECT role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(role)
    }

    /// A single user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProfileId) -> Result<Option<UserSummary>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Users filtered by role and an email/name search, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        role: Option<Role>,
        q: Option<&str>,
        page: PageRequest,
    ) -> Result<Paginated<UserSummary>, RepositoryError> {
        let pattern = like_pattern(q);
        let filter = r"
            WHERE ($1::user_role IS NULL OR p.role = $1)
              AND ($2::text IS NULL OR p.email ILIKE $2 OR p.full_name ILIKE $2)
        ";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM profiles p {filter}"))
            .bind(role)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{USER_SELECT} {filter} ORDER BY p.created_at DESC, p.id LIMIT $3 OFFSET $4"
        ))
        .bind(role)
        .bind(pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paginated::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            total,
        ))
    }

    /// Change a profile's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn set_role(&self, id: ProfileId, role: Role) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE profiles SET role = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
