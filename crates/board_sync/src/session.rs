//! Event-driven owner of one board view.
//!
//! All mutations funnel through a single command queue handled by one task,
//! so a move is applied and confirmed (or reverted) before the next command
//! is looked at. Results that arrive after `close()` are discarded.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use shared::domain::{Board, BoardId, GroupId, GroupPosition, Item, ItemId, MoveRequest};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

use crate::{
    error::{SyncError, SyncResult},
    optimistic::{OptimisticSync, Settled},
    reorder::{self, check_membership, ReorderError},
    store::BoardStore,
    SyncSettings,
};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    pub board: Board,
    pub items: Vec<Item>,
}

impl BoardView {
    pub fn item(&self, item_id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.item_id == item_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Loaded { board_id: BoardId },
    MoveApplied { request: MoveRequest },
    MoveConfirmed { request: MoveRequest },
    MoveDiverged { request: MoveRequest },
    MoveReverted { request: MoveRequest, error: SyncError },
    ItemAdded { item_id: ItemId, group_id: GroupId },
    ItemRemoved { item_id: ItemId },
    ItemUpdated { item_id: ItemId },
    Error(SyncError),
    Closed,
}

enum SessionCommand {
    Move {
        request: MoveRequest,
        reply: oneshot::Sender<SyncResult<Settled>>,
    },
    DropItem {
        source: GroupPosition,
        destination: Option<GroupPosition>,
        reply: oneshot::Sender<SyncResult<Option<Settled>>>,
    },
    AddItem {
        group_id: GroupId,
        reply: oneshot::Sender<SyncResult<Item>>,
    },
    RemoveItem {
        item_id: ItemId,
        reply: oneshot::Sender<SyncResult<()>>,
    },
    UpdateItem {
        item: Item,
        reply: oneshot::Sender<SyncResult<Item>>,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct BoardSessionHandle {
    board_id: BoardId,
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<BoardView>,
    events: broadcast::Sender<SessionEvent>,
    /// Receiver created with the channel, holding `Loaded`. Handed to the
    /// first `subscribe_events` caller.
    first_events: Arc<Mutex<Option<broadcast::Receiver<SessionEvent>>>>,
    alive: Arc<AtomicBool>,
}

pub struct BoardSession {
    board: Board,
    items: Vec<Item>,
    store: Arc<dyn BoardStore>,
    sync: OptimisticSync,
    view: watch::Sender<BoardView>,
    events: broadcast::Sender<SessionEvent>,
    alive: Arc<AtomicBool>,
}

impl BoardSession {
    /// Fetches the board and its items, then starts the session task.
    pub async fn open(
        store: Arc<dyn BoardStore>,
        board_id: BoardId,
        settings: &SyncSettings,
    ) -> SyncResult<BoardSessionHandle> {
        let (board, items) =
            futures::try_join!(store.get_board(board_id), store.get_items(board_id))?;
        if let Err(err) = check_membership(&board.groups) {
            warn!(board_id = board_id.0, error = %err, "board: fetched layout is inconsistent");
        }
        info!(
            board_id = board_id.0,
            groups = board.groups.len(),
            items = items.len(),
            "board: session opened"
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, first_events) = broadcast::channel(EVENT_BUFFER);
        let (view_tx, view_rx) = watch::channel(BoardView {
            board: board.clone(),
            items: items.clone(),
        });
        let alive = Arc::new(AtomicBool::new(true));

        let session = Self {
            board,
            items,
            sync: OptimisticSync::new(Arc::clone(&store), settings.retry),
            store,
            view: view_tx,
            events: events.clone(),
            alive: Arc::clone(&alive),
        };
        let _ = events.send(SessionEvent::Loaded { board_id });
        tokio::spawn(session.run(command_rx));

        Ok(BoardSessionHandle {
            board_id,
            commands: command_tx,
            view: view_rx,
            events,
            first_events: Arc::new(Mutex::new(Some(first_events))),
            alive,
        })
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = commands.recv().await {
            if !self.is_alive() {
                break;
            }
            match command {
                SessionCommand::Move { request, reply } => {
                    let result = self.handle_move(request).await;
                    let _ = reply.send(result);
                }
                SessionCommand::DropItem {
                    source,
                    destination,
                    reply,
                } => {
                    let result = match destination {
                        Some(destination) => self
                            .handle_move(MoveRequest::new(source, destination))
                            .await
                            .map(Some),
                        None => Ok(None),
                    };
                    let _ = reply.send(result);
                }
                SessionCommand::AddItem { group_id, reply } => {
                    let result = self.handle_add_item(group_id).await;
                    let _ = reply.send(result);
                }
                SessionCommand::RemoveItem { item_id, reply } => {
                    let result = self.handle_remove_item(item_id).await;
                    let _ = reply.send(result);
                }
                SessionCommand::UpdateItem { item, reply } => {
                    let result = self.handle_update_item(item).await;
                    let _ = reply.send(result);
                }
                SessionCommand::Shutdown => break,
            }
        }
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::Closed);
        info!(board_id = self.board.board_id.0, "board: session closed");
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn ensure_alive(&self) -> SyncResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SyncError::SessionClosed)
        }
    }

    fn publish(&self) {
        self.view.send_replace(BoardView {
            board: self.board.clone(),
            items: self.items.clone(),
        });
    }

    fn publish_board(&self, board: &Board) {
        self.view.send_replace(BoardView {
            board: board.clone(),
            items: self.items.clone(),
        });
    }

    fn report(&self, err: SyncError) -> SyncError {
        let _ = self.events.send(SessionEvent::Error(err.clone()));
        err
    }

    async fn handle_move(&mut self, request: MoveRequest) -> SyncResult<Settled> {
        let pending = self
            .sync
            .apply_move(&self.board, &request)
            .map_err(|err| self.report(err))?;
        self.publish_board(&pending.optimistic);
        let _ = self.events.send(SessionEvent::MoveApplied { request });

        let settled = pending.settle().await;
        self.ensure_alive()?;

        self.board = settled.state().clone();
        self.publish();
        let event = match &settled {
            Settled::Confirmed(_) => SessionEvent::MoveConfirmed { request },
            Settled::Diverged { .. } => SessionEvent::MoveDiverged { request },
            Settled::Reverted { error, .. } => SessionEvent::MoveReverted {
                request,
                error: error.clone(),
            },
        };
        let _ = self.events.send(event);
        Ok(settled)
    }

    async fn handle_add_item(&mut self, group_id: GroupId) -> SyncResult<Item> {
        if self.board.group(group_id).is_none() {
            return Err(self.report(ReorderError::UnknownGroup(group_id).into()));
        }
        let board_id = self.board.board_id;
        let item = self
            .store
            .add_item(board_id, group_id)
            .await
            .map_err(|err| self.report(err))?;
        self.ensure_alive()?;
        self.items.push(item.clone());
        self.publish();

        let groups = reorder::append_item(&self.board.groups, group_id, item.item_id)
            .map_err(|err| self.report(err.into()))?;
        let confirmed = self
            .sync
            .persist(self.board.with_groups(groups))
            .await
            .map_err(|err| self.report(err))?;
        self.ensure_alive()?;

        self.board = confirmed;
        self.publish();
        let _ = self.events.send(SessionEvent::ItemAdded {
            item_id: item.item_id,
            group_id,
        });
        Ok(item)
    }

    async fn handle_remove_item(&mut self, item_id: ItemId) -> SyncResult<()> {
        self.store
            .remove_item(item_id)
            .await
            .map_err(|err| self.report(err))?;
        self.ensure_alive()?;
        self.items.retain(|item| item.item_id != item_id);
        self.publish();

        let groups = reorder::remove_item(&self.board.groups, item_id);
        let confirmed = self
            .sync
            .persist(self.board.with_groups(groups))
            .await
            .map_err(|err| self.report(err))?;
        self.ensure_alive()?;

        self.board = confirmed;
        self.publish();
        let _ = self.events.send(SessionEvent::ItemRemoved { item_id });
        Ok(())
    }

    async fn handle_update_item(&mut self, item: Item) -> SyncResult<Item> {
        let item_id = item.item_id;
        if self.items.iter().all(|known| known.item_id != item_id) {
            return Err(self.report(SyncError::InvalidInput(format!(
                "item {item_id} is not on board {}",
                self.board.board_id
            ))));
        }
        let confirmed = self
            .store
            .update_item(item_id, &item)
            .await
            .map_err(|err| self.report(err))?;
        self.ensure_alive()?;

        if let Some(slot) = self.items.iter_mut().find(|known| known.item_id == item_id) {
            *slot = confirmed.clone();
        }
        self.publish();
        let _ = self.events.send(SessionEvent::ItemUpdated { item_id });
        Ok(confirmed)
    }
}

impl BoardSessionHandle {
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn view(&self) -> BoardView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<BoardView> {
        self.view.clone()
    }

    /// The first call also sees `Loaded`; later calls only see events sent
    /// after they subscribed.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.first_events
            .lock()
            .ok()
            .and_then(|mut first| first.take())
            .unwrap_or_else(|| self.events.subscribe())
    }

    pub fn is_open(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub async fn move_item(&self, request: MoveRequest) -> SyncResult<Settled> {
        self.request(|reply| SessionCommand::Move { request, reply }).await
    }

    /// A drop gesture; `None` means it landed outside any group.
    pub async fn drop_item(
        &self,
        source: GroupPosition,
        destination: Option<GroupPosition>,
    ) -> SyncResult<Option<Settled>> {
        self.request(|reply| SessionCommand::DropItem {
            source,
            destination,
            reply,
        })
        .await
    }

    pub async fn add_item(&self, group_id: GroupId) -> SyncResult<Item> {
        self.request(|reply| SessionCommand::AddItem { group_id, reply }).await
    }

    pub async fn remove_item(&self, item_id: ItemId) -> SyncResult<()> {
        self.request(|reply| SessionCommand::RemoveItem { item_id, reply }).await
    }

    /// Replaces the item's content. The view only changes once the store
    /// answers.
    pub async fn update_item(&self, item: Item) -> SyncResult<Item> {
        self.request(|reply| SessionCommand::UpdateItem { item, reply }).await
    }

    /// Tears the view down. In-flight results are dropped instead of
    /// being published.
    pub async fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<SyncResult<T>>) -> SessionCommand,
    ) -> SyncResult<T> {
        if !self.is_open() {
            return Err(SyncError::SessionClosed);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| SyncError::SessionClosed)?;
        reply_rx.await.map_err(|_| SyncError::SessionClosed)?
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
