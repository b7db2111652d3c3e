use super::models::FileNodeLock;
use crate::CoreResult;
use sqlx::SqliteConnection;

/// Queries over `file_node_locks`.
pub struct LockRepository;

impl LockRepository {
    /// Every lock on `id`, its ancestors or its descendants, in one query.
    pub async fn locks_in_closure(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
    ) -> CoreResult<Vec<FileNodeLock>> {
        Ok(sqlx::query_as::<_, FileNodeLock>(
            "WITH RECURSIVE \
             above(id, parent_id) AS ( \
                 SELECT id, parent_id FROM file_nodes WHERE user_id = ?1 AND id = ?2 \
                 UNION \
                 SELECT n.id, n.parent_id FROM file_nodes n \
                 JOIN above a ON n.id = a.parent_id WHERE n.user_id = ?1 \
             ), \
             below(id) AS ( \
                 SELECT id FROM file_nodes WHERE user_id = ?1 AND id = ?2 \
                 UNION \
                 SELECT n.id FROM file_nodes n \
                 JOIN below b ON n.parent_id = b.id WHERE n.user_id = ?1 \
             ) \
             SELECT l.user_id, l.id, l.write_lock, l.lock_type FROM file_node_locks l \
             WHERE l.user_id = ?1 \
               AND (l.id IN (SELECT id FROM above) OR l.id IN (SELECT id FROM below))",
        )
        .bind(user_id)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn insert(conn: &mut SqliteConnection, lock: &FileNodeLock) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO file_node_locks (user_id, id, write_lock, lock_type) VALUES (?, ?, ?, ?)",
        )
        .bind(lock.user_id)
        .bind(lock.id)
        .bind(lock.write_lock)
        .bind(lock.lock_type)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, user_id: i64, id: i64) -> CoreResult<()> {
        sqlx::query("DELETE FROM file_node_locks WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
