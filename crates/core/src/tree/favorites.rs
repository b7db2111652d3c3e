use super::{FavoriteResult, TreeService};
use crate::catalog::{FavoriteRepository, FileNode, FileNodeRepository};
use crate::CoreResult;

impl TreeService {
    /// Marks a node as a favorite. Marking it twice is not an error.
    pub async fn set_favorite(&self, user_id: i64, node_id: i64) -> CoreResult<FavoriteResult> {
        let mut conn = self.catalog.acquire().await?;
        if FileNodeRepository::get(&mut conn, user_id, node_id)
            .await?
            .is_none()
        {
            return Ok(FavoriteResult::NodeNotFound);
        }
        if FavoriteRepository::set(&mut conn, user_id, node_id).await? {
            tracing::debug!("node {} is now a favorite of user {}", node_id, user_id);
        }
        Ok(FavoriteResult::Success)
    }

    pub async fn unset_favorite(&self, user_id: i64, node_id: i64) -> CoreResult<FavoriteResult> {
        let mut conn = self.catalog.acquire().await?;
        if FileNodeRepository::get(&mut conn, user_id, node_id)
            .await?
            .is_none()
        {
            return Ok(FavoriteResult::NodeNotFound);
        }
        FavoriteRepository::unset(&mut conn, user_id, node_id).await?;
        Ok(FavoriteResult::Success)
    }

    pub async fn favorites(&self, user_id: i64) -> CoreResult<Vec<FileNode>> {
        let mut conn = self.catalog.acquire().await?;
        FavoriteRepository::list(&mut conn, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn titles(nodes: &[FileNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_favorites_set_and_unset() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let docs = test_support::folder(&service, 0, "docs").await;
        let note = test_support::upload(&service, docs.id, "note.txt", b"n").await;

        assert_eq!(
            service.set_favorite(1, note.id).await.unwrap(),
            FavoriteResult::Success
        );
        assert_eq!(
            service.set_favorite(1, note.id).await.unwrap(),
            FavoriteResult::Success
        );
        service.set_favorite(1, docs.id).await.unwrap();
        assert_eq!(
            titles(&service.favorites(1).await.unwrap()),
            ["docs", "note.txt"]
        );

        service.unset_favorite(1, docs.id).await.unwrap();
        assert_eq!(titles(&service.favorites(1).await.unwrap()), ["note.txt"]);
        assert!(service.favorites(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_favorite_of_missing_node() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let note = test_support::upload(&service, 0, "note.txt", b"n").await;

        assert_eq!(
            service.set_favorite(1, 99).await.unwrap(),
            FavoriteResult::NodeNotFound
        );
        assert_eq!(
            service.set_favorite(2, note.id).await.unwrap(),
            FavoriteResult::NodeNotFound
        );
        assert_eq!(
            service.unset_favorite(1, 99).await.unwrap(),
            FavoriteResult::NodeNotFound
        );
    }

    #[tokio::test]
    async fn test_trashing_drops_favorites_of_the_subtree() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let docs = test_support::folder(&service, 0, "docs").await;
        let note = test_support::upload(&service, docs.id, "note.txt", b"n").await;
        let keep = test_support::upload(&service, 0, "keep.txt", b"k").await;
        service.set_favorite(1, docs.id).await.unwrap();
        service.set_favorite(1, note.id).await.unwrap();
        service.set_favorite(1, keep.id).await.unwrap();

        service
            .delete_node(1, docs.id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(titles(&service.favorites(1).await.unwrap()), ["keep.txt"]);
    }

    #[tokio::test]
    async fn test_listing_flags_favorites() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let a = test_support::upload(&service, 0, "a.txt", b"a").await;
        test_support::upload(&service, 0, "b.txt", b"b").await;
        service.set_favorite(1, a.id).await.unwrap();

        let listed = service
            .list_children(1, 0, &Default::default())
            .await
            .unwrap();
        let flags: Vec<_> = listed
            .iter()
            .map(|l| (l.node.title.as_str(), l.is_favorite))
            .collect();
        assert_eq!(flags, [("a.txt", true), ("b.txt", false)]);
    }
}
