use super::models::{FileNode, NodeType};
use crate::constants::ROOT_NODE_ID;
use crate::{CoreError, CoreResult};
use sqlx::SqliteConnection;

pub(super) const NODE_COLUMNS: &str = "user_id, id, title, parent_id, node_type, filesystem_path, \
     mime_type, modified_at, node_size, node_version, hash_sum";

/// Queries over `file_nodes`.
pub struct FileNodeRepository;

impl FileNodeRepository {
    pub async fn get(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
    ) -> CoreResult<Option<FileNode>> {
        let sql = format!(
            "SELECT {} FROM file_nodes WHERE user_id = ? AND id = ?",
            NODE_COLUMNS
        );
        Ok(sqlx::query_as::<_, FileNode>(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn get_root(conn: &mut SqliteConnection, user_id: i64) -> CoreResult<Option<FileNode>> {
        Self::get(conn, user_id, ROOT_NODE_ID).await
    }

    /// The live child of `parent_id` titled `title`, file or folder.
    pub async fn get_child_by_title(
        conn: &mut SqliteConnection,
        user_id: i64,
        parent_id: i64,
        title: &str,
    ) -> CoreResult<Option<FileNode>> {
        let sql = format!(
            "SELECT {} FROM file_nodes WHERE user_id = ? AND parent_id = ? AND title = ?",
            NODE_COLUMNS
        );
        Ok(sqlx::query_as::<_, FileNode>(&sql)
            .bind(user_id)
            .bind(parent_id)
            .bind(title)
            .fetch_optional(&mut *conn)
            .await?)
    }

    /// Direct children, folders first then by title.
    pub async fn children(
        conn: &mut SqliteConnection,
        user_id: i64,
        parent_id: i64,
    ) -> CoreResult<Vec<FileNode>> {
        let sql = format!(
            "SELECT {} FROM file_nodes WHERE user_id = ? AND parent_id = ? \
             ORDER BY node_type DESC, title",
            NODE_COLUMNS
        );
        Ok(sqlx::query_as::<_, FileNode>(&sql)
            .bind(user_id)
            .bind(parent_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// The chain from the root down to `id`, inclusive.
    pub async fn ancestors(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
    ) -> CoreResult<Vec<FileNode>> {
        let sql = format!(
            "WITH RECURSIVE chain(id, parent_id, depth) AS ( \
                 SELECT id, parent_id, 0 FROM file_nodes WHERE user_id = ?1 AND id = ?2 \
                 UNION ALL \
                 SELECT n.id, n.parent_id, c.depth + 1 FROM file_nodes n \
                 JOIN chain c ON n.id = c.parent_id WHERE n.user_id = ?1 \
             ) \
             SELECT {} FROM file_nodes JOIN chain USING (id) \
             WHERE file_nodes.user_id = ?1 ORDER BY chain.depth DESC",
            qualified_columns()
        );
        Ok(sqlx::query_as::<_, FileNode>(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// `id` and everything below it, parents before children.
    pub async fn subtree(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
    ) -> CoreResult<Vec<FileNode>> {
        let sql = format!(
            "WITH RECURSIVE below(id, depth) AS ( \
                 SELECT id, 0 FROM file_nodes WHERE user_id = ?1 AND id = ?2 \
                 UNION ALL \
                 SELECT n.id, b.depth + 1 FROM file_nodes n \
                 JOIN below b ON n.parent_id = b.id WHERE n.user_id = ?1 \
             ) \
             SELECT {} FROM file_nodes JOIN below USING (id) \
             WHERE file_nodes.user_id = ?1 ORDER BY below.depth",
            qualified_columns()
        );
        Ok(sqlx::query_as::<_, FileNode>(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// True if `node_id` is `ancestor_id` or lies below it.
    pub async fn is_within(
        conn: &mut SqliteConnection,
        user_id: i64,
        node_id: i64,
        ancestor_id: i64,
    ) -> CoreResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "WITH RECURSIVE chain(id, parent_id) AS ( \
                 SELECT id, parent_id FROM file_nodes WHERE user_id = ?1 AND id = ?2 \
                 UNION ALL \
                 SELECT n.id, n.parent_id FROM file_nodes n \
                 JOIN chain c ON n.id = c.parent_id WHERE n.user_id = ?1 \
             ) \
             SELECT id FROM chain WHERE id = ?3",
        )
        .bind(user_id)
        .bind(node_id)
        .bind(ancestor_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(found.is_some())
    }

    /// Allocates the next node id for `user_id`.
    pub async fn next_id(conn: &mut SqliteConnection, user_id: i64) -> CoreResult<i64> {
        Ok(sqlx::query_scalar(
            "INSERT INTO node_sequences (user_id, next_id) VALUES (?, 1) \
             ON CONFLICT (user_id) DO UPDATE SET next_id = next_id + 1 \
             RETURNING next_id",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?)
    }

    pub async fn insert(conn: &mut SqliteConnection, node: &FileNode) -> CoreResult<()> {
        let sql = format!(
            "INSERT INTO file_nodes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            NODE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(node.user_id)
            .bind(node.id)
            .bind(&node.title)
            .bind(node.parent_id)
            .bind(node.node_type)
            .bind(&node.filesystem_path)
            .bind(&node.mime_type)
            .bind(node.modified_at)
            .bind(node.size)
            .bind(node.version)
            .bind(&node.hash_sum)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Stores a content change: version, size, media type, timestamp and hash.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the row is missing or `node.version`
    /// does not exceed the stored version.
    pub async fn update_content(conn: &mut SqliteConnection, node: &FileNode) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE file_nodes SET node_version = ?, node_size = ?, mime_type = ?, \
             modified_at = ?, hash_sum = ? WHERE user_id = ? AND id = ? AND node_version < ?",
        )
        .bind(node.version)
        .bind(node.size)
        .bind(&node.mime_type)
        .bind(node.modified_at)
        .bind(&node.hash_sum)
        .bind(node.user_id)
        .bind(node.id)
        .bind(node.version)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() != 1 {
            return Err(CoreError::InvalidInput(format!(
                "node {} is missing or already at version {} or later",
                node.id, node.version
            )));
        }
        Ok(())
    }

    /// Renames `id` and rewrites the path prefix of every descendant.
    pub async fn rename(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
        title: &str,
        old_path: &str,
        new_path: &str,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE file_nodes SET title = ?, filesystem_path = ? WHERE user_id = ? AND id = ?",
        )
        .bind(title)
        .bind(new_path)
        .bind(user_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "WITH RECURSIVE below(id) AS ( \
                 SELECT id FROM file_nodes WHERE user_id = ?1 AND parent_id = ?2 \
                 UNION ALL \
                 SELECT n.id FROM file_nodes n JOIN below b ON n.parent_id = b.id \
                 WHERE n.user_id = ?1 \
             ) \
             UPDATE file_nodes SET filesystem_path = ?3 || substr(filesystem_path, ?4) \
             WHERE user_id = ?1 AND id IN (SELECT id FROM below)",
        )
        .bind(user_id)
        .bind(id)
        .bind(new_path)
        .bind(old_path.chars().count() as i64 + 1)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, user_id: i64, id: i64) -> CoreResult<()> {
        sqlx::query("DELETE FROM file_nodes WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Deletes `id` and everything below it in one statement.
    pub async fn delete_subtree(
        conn: &mut SqliteConnection,
        user_id: i64,
        id: i64,
    ) -> CoreResult<u64> {
        let result = sqlx::query(
            "WITH RECURSIVE below(id) AS ( \
                 SELECT id FROM file_nodes WHERE user_id = ?1 AND id = ?2 \
                 UNION ALL \
                 SELECT n.id FROM file_nodes n JOIN below b ON n.parent_id = b.id \
                 WHERE n.user_id = ?1 \
             ) \
             DELETE FROM file_nodes WHERE user_id = ?1 AND id IN (SELECT id FROM below)",
        )
        .bind(user_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Inserts the user's root folder unless it already exists.
    pub async fn ensure_root(conn: &mut SqliteConnection, root: &FileNode) -> CoreResult<()> {
        let sql = format!(
            "INSERT OR IGNORE INTO file_nodes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            NODE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(root.user_id)
            .bind(root.id)
            .bind(&root.title)
            .bind(root.parent_id)
            .bind(NodeType::Folder)
            .bind(&root.filesystem_path)
            .bind(&root.mime_type)
            .bind(root.modified_at)
            .bind(root.size)
            .bind(root.version)
            .bind(&root.hash_sum)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

pub(super) fn qualified_columns() -> String {
    NODE_COLUMNS
        .split(", ")
        .map(|column| format!("file_nodes.{0} AS {0}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
