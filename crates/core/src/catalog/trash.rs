use super::models::TrashNode;
use crate::CoreResult;
use sqlx::SqliteConnection;

const TRASH_COLUMNS: &str = "trash_id, user_id, id, title, parent_id, node_type, \
     filesystem_path, mime_type, version_created_at, deleted_at, node_size, node_version, file_name";

/// Queries over `trash_box`.
pub struct TrashRepository;

impl TrashRepository {
    /// Highest stored version among trash rows for this logical path, if any.
    pub async fn max_version(
        conn: &mut SqliteConnection,
        user_id: i64,
        filesystem_path: &str,
    ) -> CoreResult<Option<i64>> {
        Ok(sqlx::query_scalar(
            "SELECT MAX(node_version) FROM trash_box WHERE user_id = ? AND filesystem_path = ?",
        )
        .bind(user_id)
        .bind(filesystem_path)
        .fetch_one(&mut *conn)
        .await?)
    }

    /// Inserts `entry` and returns its surrogate id. `entry.trash_id` is ignored.
    pub async fn insert(conn: &mut SqliteConnection, entry: &TrashNode) -> CoreResult<i64> {
        let trash_id = sqlx::query_scalar(
            "INSERT INTO trash_box (user_id, id, title, parent_id, node_type, filesystem_path, \
             mime_type, version_created_at, deleted_at, node_size, node_version, file_name) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING trash_id",
        )
        .bind(entry.user_id)
        .bind(entry.id)
        .bind(&entry.title)
        .bind(entry.parent_id)
        .bind(entry.node_type)
        .bind(&entry.filesystem_path)
        .bind(&entry.mime_type)
        .bind(entry.version_created_at)
        .bind(entry.deleted_at)
        .bind(entry.size)
        .bind(entry.version)
        .bind(&entry.file_name)
        .fetch_one(&mut *conn)
        .await?;
        Ok(trash_id)
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        user_id: i64,
        trash_id: i64,
    ) -> CoreResult<Option<TrashNode>> {
        let sql = format!(
            "SELECT {} FROM trash_box WHERE user_id = ? AND trash_id = ?",
            TRASH_COLUMNS
        );
        Ok(sqlx::query_as::<_, TrashNode>(&sql)
            .bind(user_id)
            .bind(trash_id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    /// Every trash row of the user, grouped by path and ordered by version.
    pub async fn list(conn: &mut SqliteConnection, user_id: i64) -> CoreResult<Vec<TrashNode>> {
        let sql = format!(
            "SELECT {} FROM trash_box WHERE user_id = ? ORDER BY filesystem_path, node_version",
            TRASH_COLUMNS
        );
        Ok(sqlx::query_as::<_, TrashNode>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn delete(conn: &mut SqliteConnection, user_id: i64, trash_id: i64) -> CoreResult<()> {
        sqlx::query("DELETE FROM trash_box WHERE user_id = ? AND trash_id = ?")
            .bind(user_id)
            .bind(trash_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
