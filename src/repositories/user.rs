use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::{NewUser, ProfileChanges, Role, User},
};

/// Storage for identities.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user with the `user` role. Fails with a validation error
    /// on `email` when the address is already registered.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Finds a user by their ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Finds a user by their (lower-cased) email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Applies profile changes and returns the updated record.
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User>;

    /// Replaces the stored password hash.
    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<()>;

    /// Sets the role of an existing user. Only reachable from operator tooling.
    async fn set_role(&self, id: Uuid, role: Role) -> Result<()>;
}

/// Maps a unique-constraint violation on the email column to a validation error.
fn map_duplicate_email(e: tokio_postgres::Error) -> AppError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        AppError::validation("email", "Email is already registered")
    } else {
        AppError::Database(e)
    }
}

/// PostgreSQL-backed user storage.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO users (id, name, email, role, university, department, contact_number, password_hash)
                VALUES ($1, $2, $3, 'user', $4, $5, $6, $7)
                RETURNING *
                "#,
                &[
                    &Uuid::new_v4(),
                    &user.name,
                    &user.email,
                    &user.university,
                    &user.department,
                    &user.contact_number,
                    &user.password_hash,
                ],
            )
            .await
            .map_err(map_duplicate_email)?;
        Ok(User::from(&row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT * FROM users WHERE id = $1", &[&id])
            .await?;
        Ok(row.as_ref().map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT * FROM users WHERE email = $1", &[&email])
            .await?;
        Ok(row.as_ref().map(User::from))
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                UPDATE users
                SET
                    name = COALESCE($2, name),
                    email = COALESCE($3, email),
                    university = COALESCE($4, university),
                    department = COALESCE($5, department),
                    contact_number = COALESCE($6, contact_number)
                WHERE id = $1
                RETURNING *
                "#,
                &[
                    &id,
                    &changes.name,
                    &changes.email,
                    &changes.university,
                    &changes.department,
                    &changes.contact_number,
                ],
            )
            .await
            .map_err(map_duplicate_email)?
            .ok_or_else(|| AppError::NotFound(format!("User not found with id of {}", id)))?;
        Ok(User::from(&row))
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE users SET password_hash = $1 WHERE id = $2",
                &[&password_hash, &id],
            )
            .await?;
        Ok(())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute("UPDATE users SET role = $1 WHERE id = $2", &[&role, &id])
            .await?;
        Ok(())
    }
}
