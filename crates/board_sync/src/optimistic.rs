//! Optimistic board updates: apply locally first, persist concurrently, then
//! reconcile with whatever the store confirms.

use std::{collections::BTreeSet, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use shared::domain::{Board, ItemId, MoveRequest};
use tracing::{debug, info, warn};

use crate::{
    error::{SyncError, SyncResult},
    reorder::{membership, reorder},
    store::BoardStore,
    RetryPolicy,
};

pub struct OptimisticSync {
    store: Arc<dyn BoardStore>,
    retry: RetryPolicy,
}

/// A move that has been applied locally and whose persistence is in flight.
pub struct PendingMove {
    pub previous: Board,
    pub optimistic: Board,
    confirm: BoxFuture<'static, SyncResult<Board>>,
}

/// Outcome of a pending move once the store has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// The store confirmed exactly what was applied optimistically.
    Confirmed(Board),
    /// The store answered with a different layout. The confirmed board wins.
    Diverged { confirmed: Board, optimistic: Board },
    /// Persistence failed; the pre-move snapshot must be shown again.
    Reverted { previous: Board, error: SyncError },
}

impl Settled {
    pub fn state(&self) -> &Board {
        match self {
            Self::Confirmed(board) => board,
            Self::Diverged { confirmed, .. } => confirmed,
            Self::Reverted { previous, .. } => previous,
        }
    }

    pub fn into_state(self) -> Board {
        match self {
            Self::Confirmed(board) => board,
            Self::Diverged { confirmed, .. } => confirmed,
            Self::Reverted { previous, .. } => previous,
        }
    }
}

impl OptimisticSync {
    pub fn new(store: Arc<dyn BoardStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Computes the moved board synchronously and starts persisting it.
    ///
    /// Invalid moves are rejected before anything is sent. Must be called
    /// from within a tokio runtime since the write is spawned immediately.
    pub fn apply_move(&self, current: &Board, mv: &MoveRequest) -> SyncResult<PendingMove> {
        let groups = reorder(&current.groups, mv)?;
        let optimistic = current.with_groups(groups);
        debug!(
            board_id = current.board_id.0,
            from_group = mv.source.group_id.0,
            from_index = mv.source.index,
            to_group = mv.destination.group_id.0,
            to_index = mv.destination.index,
            same_group = mv.is_same_group(),
            "board: applying move optimistically"
        );
        let confirm = self.persist(optimistic.clone());
        Ok(PendingMove {
            previous: current.clone(),
            optimistic,
            confirm,
        })
    }

    /// Spawns a write of `board` honouring the retry policy.
    pub fn persist(&self, board: Board) -> BoxFuture<'static, SyncResult<Board>> {
        let store = Arc::clone(&self.store);
        let retry = self.retry;
        let task =
            tokio::spawn(async move { update_with_retry(store.as_ref(), &board, retry).await });
        async move {
            task.await
                .map_err(|err| SyncError::transport(format!("board write task failed: {err}")))?
        }
        .boxed()
    }
}

impl PendingMove {
    pub async fn settle(self) -> Settled {
        let Self {
            previous,
            optimistic,
            confirm,
        } = self;
        let outcome = confirm.await;
        reconcile(previous, optimistic, outcome)
    }
}

/// Last-confirmed-wins reconciliation of an optimistic guess.
pub fn reconcile(previous: Board, optimistic: Board, outcome: SyncResult<Board>) -> Settled {
    match outcome {
        Ok(confirmed) if same_layout(&confirmed, &optimistic) => Settled::Confirmed(confirmed),
        Ok(confirmed) => {
            info!(
                board_id = confirmed.board_id.0,
                regrouped = regrouped_items(&optimistic, &confirmed).len(),
                "board: confirmed layout diverges from optimistic guess, taking confirmed"
            );
            Settled::Diverged {
                confirmed,
                optimistic,
            }
        }
        Err(error) => {
            warn!(
                board_id = previous.board_id.0,
                %error,
                "board: write failed, reverting to pre-move snapshot"
            );
            Settled::Reverted { previous, error }
        }
    }
}

/// Items whose group differs between the two boards, including items
/// present in only one of them.
pub fn regrouped_items(optimistic: &Board, confirmed: &Board) -> Vec<ItemId> {
    let expected = membership(&optimistic.groups);
    let actual = membership(&confirmed.groups);
    expected
        .keys()
        .chain(actual.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|id| expected.get(id) != actual.get(id))
        .collect()
}

fn same_layout(a: &Board, b: &Board) -> bool {
    a.groups.len() == b.groups.len()
        && a
            .groups
            .iter()
            .zip(&b.groups)
            .all(|(x, y)| x.group_id == y.group_id && x.item_ids == y.item_ids)
}

pub(crate) async fn update_with_retry(
    store: &dyn BoardStore,
    board: &Board,
    retry: RetryPolicy,
) -> SyncResult<Board> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match store.update_board(board.board_id, board).await {
            Ok(confirmed) => return Ok(confirmed),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                warn!(
                    board_id = board.board_id.0,
                    attempt,
                    max_attempts,
                    error = %err,
                    "board: write failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(retry.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "tests/optimistic_tests.rs"]
mod tests;
