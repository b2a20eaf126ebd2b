use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

use crate::inference::{Category, Verdict};

/// One completed analysis, immutable once written. Category is stored
/// uppercase and confidence as a percentage string, matching the rendered
/// views.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryRecord {
    pub id: i64,
    pub user_id: i64,
    pub category: String,
    pub status: String,
    pub confidence: String,
    pub created_at: OffsetDateTime,
}

impl HistoryRecord {
    pub async fn insert(
        db: &SqlitePool,
        user_id: i64,
        category: Category,
        verdict: &Verdict,
    ) -> anyhow::Result<HistoryRecord> {
        let record = sqlx::query_as::<_, HistoryRecord>(
            r#"
            INSERT INTO history (user_id, category, status, confidence, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, user_id, category, status, confidence, created_at
            "#,
        )
        .bind(user_id)
        .bind(category.as_str().to_uppercase())
        .bind(verdict.status.to_string())
        .bind(verdict.confidence_label())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(db)
        .await?;
        Ok(record)
    }

    /// All records for a user, newest first.
    pub async fn list_by_user(db: &SqlitePool, user_id: i64) -> anyhow::Result<Vec<HistoryRecord>> {
        let rows = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, user_id, category, status, confidence, created_at
            FROM history
            WHERE user_id = ?1
            ORDER BY id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn last_by_user(
        db: &SqlitePool,
        user_id: i64,
    ) -> anyhow::Result<Option<HistoryRecord>> {
        let row = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, user_id, category, status, confidence, created_at
            FROM history
            WHERE user_id = ?1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::User;
    use crate::inference::{Status, Verdict};
    use crate::state::test_pool;

    async fn seed_user(db: &SqlitePool) -> i64 {
        User::create(db, "Test", "history@example.com", "hash")
            .await
            .expect("seed user")
            .id
    }

    fn detected(conf: f32) -> Verdict {
        Verdict {
            status: Status::Detected,
            confidence: conf,
            simulated: false,
        }
    }

    #[tokio::test]
    async fn insert_stores_uppercase_category_and_percent_string() {
        let db = test_pool().await;
        let user_id = seed_user(&db).await;
        let record = HistoryRecord::insert(&db, user_id, Category::Brain, &Verdict::simulated())
            .await
            .expect("insert");
        assert_eq!(record.category, "BRAIN");
        assert_eq!(record.status, "Normal");
        assert_eq!(record.confidence, "95.0%");
    }

    #[tokio::test]
    async fn list_is_reverse_chronological() {
        let db = test_pool().await;
        let user_id = seed_user(&db).await;
        HistoryRecord::insert(&db, user_id, Category::Brain, &Verdict::simulated())
            .await
            .unwrap();
        HistoryRecord::insert(&db, user_id, Category::Skin, &detected(87.65))
            .await
            .unwrap();

        let rows = HistoryRecord::list_by_user(&db, user_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "SKIN");
        assert_eq!(rows[0].confidence, "87.65%");
        assert_eq!(rows[1].category, "BRAIN");

        let last = HistoryRecord::last_by_user(&db, user_id).await.unwrap();
        assert_eq!(last.unwrap().category, "SKIN");
    }

    #[tokio::test]
    async fn insert_requires_existing_user() {
        let db = test_pool().await;
        let err = HistoryRecord::insert(&db, 9999, Category::Brain, &Verdict::simulated())
            .await
            .expect_err("foreign key must reject orphan rows");
        assert!(err.to_string().to_lowercase().contains("foreign key"));
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_history() {
        let db = test_pool().await;
        let user_id = seed_user(&db).await;
        HistoryRecord::insert(&db, user_id, Category::Retina, &Verdict::simulated())
            .await
            .unwrap();
        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(user_id)
            .execute(&db)
            .await
            .unwrap();
        let rows = HistoryRecord::list_by_user(&db, user_id).await.unwrap();
        assert!(rows.is_empty());
    }
}
