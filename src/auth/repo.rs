use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{Role, User};

const USER_COLUMNS: &str =
    "id, username, full_name, role, password_hash, is_active, created_at, updated_at";

/// Field changes for an existing user; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserChanges<'a> {
    pub full_name: Option<&'a str>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password_hash: Option<&'a str>,
}

impl User {
    /// Find a user by username.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Create a new user; the caller supplies an already peppered and hashed password.
    pub async fn create(
        db: &PgPool,
        username: &str,
        full_name: &str,
        role: Role,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, full_name, role, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(full_name)
        .bind(role)
        .bind(password_hash)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    pub async fn update(db: &PgPool, id: Uuid, changes: UserChanges<'_>) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET full_name     = COALESCE($2, full_name),
                   role          = COALESCE($3, role),
                   is_active     = COALESCE($4, is_active),
                   password_hash = COALESCE($5, password_hash),
                   updated_at    = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.full_name)
        .bind(changes.role)
        .bind(changes.is_active)
        .bind(changes.password_hash)
        .fetch_optional(db)
        .await
        .context("update user")?;
        Ok(user)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
            .context("count users")?;
        Ok(n)
    }

    pub async fn list(
        db: &PgPool,
        search: Option<&str>,
        role: Option<Role>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<User>, i64)> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE ($1::text IS NULL OR username ILIKE $1 OR full_name ILIKE $1)
               AND ($2::user_role IS NULL OR role = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4
            "#
        ))
        .bind(search)
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list users")?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
              FROM users
             WHERE ($1::text IS NULL OR username ILIKE $1 OR full_name ILIKE $1)
               AND ($2::user_role IS NULL OR role = $2)
            "#,
        )
        .bind(search)
        .bind(role)
        .fetch_one(db)
        .await
        .context("count users")?;

        Ok((rows, total))
    }
}
