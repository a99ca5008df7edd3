use sqlx::SqlitePool;

use crate::auth::repo_types::User;

impl User {
    pub async fn find_by_username(db: &SqlitePool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Stores a new admin; `password_hash` must already be hashed.
    pub async fn create(db: &SqlitePool, username: &str, password_hash: &str) -> anyhow::Result<User> {
        let mut tx = db.begin().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES (?, ?)
            RETURNING id, username, password_hash
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password, db::scratch_pool};

    #[tokio::test]
    async fn create_then_find() {
        let (_dir, db) = scratch_pool().await;
        let hash = password::hash_password("hunter22").unwrap();
        let created = User::create(&db, "admin", &hash).await.unwrap();

        let found = User::find_by_username(&db, "admin").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(password::verify_password("hunter22", &found.password_hash).unwrap());
        assert!(User::find_by_username(&db, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn created_user_is_found_right_away() {
        for i in 0..20 {
            let (_dir, db) = scratch_pool().await;
            let username = format!("admin{i}");
            User::create(&db, &username, "x").await.unwrap();
            assert!(User::find_by_username(&db, &username).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let (_dir, db) = scratch_pool().await;
        User::create(&db, "admin", "x").await.unwrap();
        assert!(User::create(&db, "admin", "y").await.is_err());
    }
}
