//! Sorted folder listings and node search.

use super::file_nodes::{qualified_columns, NODE_COLUMNS};
use super::models::{FileNode, NodeType};
use super::FileNodeRepository;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Title,
    ModifiedAt,
    Size,
    Type,
}

impl SortColumn {
    fn column(self) -> &'static str {
        match self {
            SortColumn::Title => "title",
            SortColumn::ModifiedAt => "modified_at",
            SortColumn::Size => "node_size",
            SortColumn::Type => "node_type",
        }
    }
}

impl FromStr for SortColumn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(SortColumn::Title),
            "modified" | "modified_at" => Ok(SortColumn::ModifiedAt),
            "size" => Ok(SortColumn::Size),
            "type" => Ok(SortColumn::Type),
            other => Err(CoreError::InvalidInput(format!(
                "unknown sort column '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Order of a folder listing. Ties break by title, then id.
///
/// The default lists folders first, each group by title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sorting {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for Sorting {
    fn default() -> Self {
        Self {
            column: SortColumn::Type,
            direction: SortDirection::Desc,
        }
    }
}

impl Sorting {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    fn order_by(&self) -> String {
        let direction = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        format!(
            "file_nodes.{} {}, file_nodes.title, file_nodes.id",
            self.column.column(),
            direction
        )
    }
}

/// A child in a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ListedNode {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub node: FileNode,
    pub is_favorite: bool,
}

/// Filters for [`FileNodeRepository::search`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeQuery {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub parent_id: Option<i64>,
    pub node_type: Option<NodeType>,
    pub mime_type: Option<String>,
    pub modified_from: Option<DateTime<Utc>>,
    pub modified_to: Option<DateTime<Utc>>,
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
}

impl FileNodeRepository {
    /// Direct children of `parent_id` in `sorting` order, with favorite flags.
    pub async fn list(
        conn: &mut SqliteConnection,
        user_id: i64,
        parent_id: i64,
        sorting: &Sorting,
    ) -> CoreResult<Vec<ListedNode>> {
        let sql = format!(
            "SELECT {}, (favorite_nodes.id IS NOT NULL) AS is_favorite FROM file_nodes \
             LEFT JOIN favorite_nodes ON favorite_nodes.user_id = file_nodes.user_id \
                 AND favorite_nodes.id = file_nodes.id \
             WHERE file_nodes.user_id = ? AND file_nodes.parent_id = ? \
             ORDER BY {}",
            qualified_columns(),
            sorting.order_by()
        );
        Ok(sqlx::query_as::<_, ListedNode>(&sql)
            .bind(user_id)
            .bind(parent_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// Every node except the root that matches all set filters, by title.
    pub async fn search(
        conn: &mut SqliteConnection,
        user_id: i64,
        query: &NodeQuery,
    ) -> CoreResult<Vec<FileNode>> {
        let mut sql = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM file_nodes WHERE parent_id IS NOT NULL AND user_id = ",
            NODE_COLUMNS
        ));
        sql.push_bind(user_id);
        if let Some(title) = &query.title {
            sql.push(" AND title LIKE ")
                .push_bind(format!("%{}%", escape_like(title)))
                .push(" ESCAPE '\\'");
        }
        if let Some(parent_id) = query.parent_id {
            sql.push(" AND parent_id = ").push_bind(parent_id);
        }
        if let Some(node_type) = query.node_type {
            sql.push(" AND node_type = ").push_bind(node_type);
        }
        if let Some(mime_type) = &query.mime_type {
            sql.push(" AND mime_type = ").push_bind(mime_type.clone());
        }
        if let Some(from) = query.modified_from {
            sql.push(" AND modified_at >= ").push_bind(from);
        }
        if let Some(to) = query.modified_to {
            sql.push(" AND modified_at <= ").push_bind(to);
        }
        if let Some(min) = query.min_size {
            sql.push(" AND node_size >= ").push_bind(min);
        }
        if let Some(max) = query.max_size {
            sql.push(" AND node_size <= ").push_bind(max);
        }
        sql.push(" ORDER BY title, id");

        Ok(sql
            .build_query_as::<FileNode>()
            .fetch_all(&mut *conn)
            .await?)
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
