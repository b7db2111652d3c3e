//! Multi-item requests.
//!
//! Items run in batches of [`crate::config::CoreConfig::batch_size`]; the
//! items of one batch run concurrently and each gets its own transaction, so
//! one failing item never rolls back another.

use super::{CopyNodeResult, DeleteNodeResult, TreeService};
use crate::CoreResult;
use futures::future::join_all;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Result for one id of a bulk request.
#[derive(Debug)]
pub struct BatchItem<T> {
    pub id: i64,
    pub outcome: CoreResult<T>,
}

impl TreeService {
    pub async fn copy_nodes(
        &self,
        user_id: i64,
        ids: &[i64],
        destination_id: i64,
        cancel: &CancellationToken,
    ) -> Vec<BatchItem<CopyNodeResult>> {
        self.in_batches(ids, |id| {
            self.copy_node(user_id, id, destination_id, cancel)
        })
        .await
    }

    pub async fn move_nodes(
        &self,
        user_id: i64,
        ids: &[i64],
        destination_id: i64,
        cancel: &CancellationToken,
    ) -> Vec<BatchItem<CopyNodeResult>> {
        self.in_batches(ids, |id| {
            self.move_node(user_id, id, destination_id, cancel)
        })
        .await
    }

    pub async fn delete_nodes(
        &self,
        user_id: i64,
        ids: &[i64],
        cancel: &CancellationToken,
    ) -> Vec<BatchItem<DeleteNodeResult>> {
        self.in_batches(ids, |id| self.delete_node(user_id, id, cancel))
            .await
    }

    async fn in_batches<T, F, Fut>(&self, ids: &[i64], run: F) -> Vec<BatchItem<T>>
    where
        F: Fn(i64) -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let mut items = Vec::with_capacity(ids.len());
        for batch in ids.chunks(self.cfg.batch_size()) {
            let outcomes = join_all(batch.iter().map(|&id| run(id))).await;
            items.extend(
                batch
                    .iter()
                    .zip(outcomes)
                    .map(|(&id, outcome)| BatchItem { id, outcome }),
            );
        }
        items
    }
}
