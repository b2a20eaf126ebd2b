use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE email = ?1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create(
        db: &SqlitePool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_pool;

    #[tokio::test]
    async fn create_and_find_by_email() {
        let db = test_pool().await;
        let created = User::create(&db, "Asha", "asha@example.com", "hash")
            .await
            .expect("create user");
        let found = User::find_by_email(&db, "asha@example.com")
            .await
            .expect("query")
            .expect("user exists");
        assert_eq!(found.id, created.id);
        assert_eq!(found.name, "Asha");
    }

    #[tokio::test]
    async fn duplicate_email_violates_unique_constraint() {
        let db = test_pool().await;
        User::create(&db, "A", "dup@example.com", "h1")
            .await
            .expect("first insert");
        let err = User::create(&db, "B", "dup@example.com", "h2")
            .await
            .expect_err("second insert must fail");
        let is_unique = err
            .as_database_error()
            .map(|d| d.is_unique_violation())
            .unwrap_or(false);
        assert!(is_unique);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind("dup@example.com")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn unknown_email_is_none() {
        let db = test_pool().await;
        assert!(User::find_by_email(&db, "nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
