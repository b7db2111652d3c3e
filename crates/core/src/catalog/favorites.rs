use super::file_nodes::qualified_columns;
use super::models::FileNode;
use crate::CoreResult;
use sqlx::SqliteConnection;

/// Queries over `favorite_nodes`. Rows go away with their node.
pub struct FavoriteRepository;

impl FavoriteRepository {
    /// Marks `id` as a favorite. Returns `false` if it already was one.
    pub async fn set(conn: &mut SqliteConnection, user_id: i64, id: i64) -> CoreResult<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO favorite_nodes (user_id, id) VALUES (?, ?)")
            .bind(user_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clears the mark. Returns `false` if `id` was not a favorite.
    pub async fn unset(conn: &mut SqliteConnection, user_id: i64, id: i64) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM favorite_nodes WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every favorite node of the user, by title.
    pub async fn list(conn: &mut SqliteConnection, user_id: i64) -> CoreResult<Vec<FileNode>> {
        let sql = format!(
            "SELECT {} FROM file_nodes \
             JOIN favorite_nodes ON favorite_nodes.user_id = file_nodes.user_id \
                 AND favorite_nodes.id = file_nodes.id \
             WHERE file_nodes.user_id = ? \
             ORDER BY file_nodes.title, file_nodes.id",
            qualified_columns()
        );
        Ok(sqlx::query_as::<_, FileNode>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?)
    }
}
