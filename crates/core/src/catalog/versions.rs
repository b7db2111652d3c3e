use super::models::FileVersion;
use crate::CoreResult;
use sqlx::SqliteConnection;

/// Queries over `file_versions`.
pub struct VersionRepository;

impl VersionRepository {
    /// Full history of a node, oldest first.
    pub async fn list(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
    ) -> CoreResult<Vec<FileVersion>> {
        Ok(sqlx::query_as::<_, FileVersion>(
            "SELECT user_id, id, node_version, created_at, node_size, file_name \
             FROM file_versions WHERE user_id = ? AND id = ? ORDER BY node_version",
        )
        .bind(user_id)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
        version: i64,
    ) -> CoreResult<Option<FileVersion>> {
        Ok(sqlx::query_as::<_, FileVersion>(
            "SELECT user_id, id, node_version, created_at, node_size, file_name \
             FROM file_versions WHERE user_id = ? AND id = ? AND node_version = ?",
        )
        .bind(user_id)
        .bind(id)
        .bind(version)
        .fetch_optional(&mut *conn)
        .await?)
    }

    pub async fn insert(conn: &mut SqliteConnection, version: &FileVersion) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO file_versions (user_id, id, node_version, created_at, node_size, file_name) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(version.user_id)
        .bind(version.id)
        .bind(version.version)
        .bind(version.created_at)
        .bind(version.size)
        .bind(&version.file_name)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn delete(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
        version: i64,
    ) -> CoreResult<()> {
        sqlx::query("DELETE FROM file_versions WHERE user_id = ? AND id = ? AND node_version = ?")
            .bind(user_id)
            .bind(id)
            .bind(version)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn delete_all(conn: &mut SqliteConnection, user_id: i64, id: i64) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM file_versions WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
