mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use board_sync::{
    BoardSession, BoardSessionHandle, BoardView, ChatRoom, HttpStore, MemoryStore, Settled,
    SyncSettings,
};
use clap::{Parser, Subcommand};
use shared::domain::{
    Board, BoardId, ChatAuthor, ChatMessage, Group, GroupId, GroupPosition, Item, ItemId,
    MoveRequest, UserId,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "planner", about = "Board and chat client with optimistic sync")]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long, default_value = "planner.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every group of a board with its item titles.
    Show { board_id: i64 },
    /// Move the item at a group position to another position.
    Move {
        board_id: i64,
        from_group: i64,
        from_index: usize,
        to_group: i64,
        to_index: usize,
    },
    AddItem { board_id: i64, group_id: i64 },
    RemoveItem { board_id: i64, item_id: i64 },
    /// Replace an item's title, and its body when `--body` is given.
    UpdateItem {
        board_id: i64,
        item_id: i64,
        title: String,
        #[arg(long)]
        body: Option<String>,
    },
    /// Print thread history, then new messages until interrupted.
    ChatTail {
        #[arg(long)]
        thread: Option<String>,
    },
    ChatPost {
        user_id: i64,
        user_name: String,
        text: String,
        #[arg(long)]
        thread: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// Run sample moves and chat against an in-memory store.
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config)?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    let sync = settings.sync_settings();

    match args.command {
        Command::Show { board_id } => {
            let session = open_remote(&settings.server_url, board_id, &sync).await?;
            print_view(&session.view());
            session.close().await;
        }
        Command::Move {
            board_id,
            from_group,
            from_index,
            to_group,
            to_index,
        } => {
            let session = open_remote(&settings.server_url, board_id, &sync).await?;
            let request = MoveRequest::new(
                GroupPosition::new(GroupId(from_group), from_index),
                GroupPosition::new(GroupId(to_group), to_index),
            );
            let settled = session.move_item(request).await;
            session.close().await;
            report_settled(settled?)?;
        }
        Command::AddItem { board_id, group_id } => {
            let session = open_remote(&settings.server_url, board_id, &sync).await?;
            let item = session.add_item(GroupId(group_id)).await;
            let view = session.view();
            session.close().await;
            println!("Added item {}", item?.item_id);
            print_view(&view);
        }
        Command::RemoveItem { board_id, item_id } => {
            let session = open_remote(&settings.server_url, board_id, &sync).await?;
            let removed = session.remove_item(ItemId(item_id)).await;
            let view = session.view();
            session.close().await;
            removed?;
            println!("Removed item {item_id}");
            print_view(&view);
        }
        Command::UpdateItem {
            board_id,
            item_id,
            title,
            body,
        } => {
            let session = open_remote(&settings.server_url, board_id, &sync).await?;
            let Some(mut item) = session.view().item(ItemId(item_id)).cloned() else {
                session.close().await;
                bail!("item {item_id} is not on board {board_id}");
            };
            item.title = title;
            if let Some(body) = body {
                item.body = body;
            }
            let updated = session.update_item(item).await;
            let view = session.view();
            session.close().await;
            println!("Updated item {}", updated?.item_id);
            print_view(&view);
        }
        Command::ChatTail { thread } => {
            let thread = thread.unwrap_or(settings.thread);
            let store = Arc::new(HttpStore::new(&settings.server_url)?);
            let mut room = ChatRoom::open(store, thread, &sync).await?;
            for message in room.messages() {
                print_message(message);
            }
            loop {
                tokio::select! {
                    batch = room.next_batch() => match batch {
                        Some(batch) => batch.iter().for_each(print_message),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            room.close().await;
        }
        Command::ChatPost {
            user_id,
            user_name,
            text,
            thread,
            avatar_url,
        } => {
            let thread = thread.unwrap_or(settings.thread);
            let store = Arc::new(HttpStore::new(&settings.server_url)?);
            let mut room = ChatRoom::open(store, thread, &sync).await?;
            let author = ChatAuthor {
                user_id: UserId(user_id),
                user_name,
                avatar_url,
            };
            let posted = room.post(&author, &text).await;
            room.close().await;
            println!("{}", serde_json::to_string(&posted?)?);
        }
        Command::Demo => run_demo(&sync).await?,
    }

    Ok(())
}

async fn open_remote(
    server_url: &str,
    board_id: i64,
    sync: &SyncSettings,
) -> Result<BoardSessionHandle> {
    let store = Arc::new(HttpStore::new(server_url)?);
    tracing::info!(server = %store.base_url(), board_id, "planner: opening board");
    Ok(BoardSession::open(store, BoardId(board_id), sync).await?)
}

fn report_settled(settled: Settled) -> Result<()> {
    match &settled {
        Settled::Confirmed(_) => println!("Move confirmed"),
        Settled::Diverged { .. } => println!("Move confirmed with a different layout"),
        Settled::Reverted { error, .. } => bail!("move reverted: {error}"),
    }
    print_board(settled.state(), &[]);
    Ok(())
}

fn print_view(view: &BoardView) {
    print_board(&view.board, &view.items);
}

fn print_board(board: &Board, items: &[Item]) {
    println!("{} (board {})", board.name, board.board_id);
    for group in &board.groups {
        let titles: Vec<String> = group
            .item_ids
            .iter()
            .map(|id| {
                items
                    .iter()
                    .find(|item| item.item_id == *id)
                    .filter(|item| !item.title.is_empty())
                    .map(|item| format!("{} {}", id, item.title))
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();
        println!("  {} ({}): [{}]", group.name, group.group_id, titles.join(", "));
    }
}

fn print_message(message: &ChatMessage) {
    println!(
        "[{}] {}: {}",
        message.sent_at.format("%H:%M:%S"),
        message.user_name,
        message.text
    );
}

fn demo_board() -> (Board, Vec<Item>) {
    let board_id = BoardId(1);
    let board = Board {
        board_id,
        name: "Demo".into(),
        groups: vec![
            Group::new(GroupId(1), "A", vec![ItemId(1), ItemId(2), ItemId(3)]),
            Group::new(GroupId(2), "B", vec![ItemId(4), ItemId(5)]),
        ],
    };
    let items = (1..=5)
        .map(|id| Item {
            item_id: ItemId(id),
            board_id,
            title: format!("task {id}"),
            body: String::new(),
        })
        .collect();
    (board, items)
}

async fn run_demo(sync: &SyncSettings) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let (board, items) = demo_board();
    let board_id = board.board_id;
    store.insert_board(board).await;
    for item in items {
        store.insert_item(item).await;
    }

    let session = BoardSession::open(store.clone(), board_id, sync).await?;
    println!("Initial board:");
    print_view(&session.view());

    println!("\nMove A[0] -> B@1:");
    session
        .move_item(MoveRequest::new(
            GroupPosition::new(GroupId(1), 0),
            GroupPosition::new(GroupId(2), 1),
        ))
        .await?;
    print_view(&session.view());

    println!("\nMove B[1] -> B@2 (same group):");
    session
        .move_item(MoveRequest::new(
            GroupPosition::new(GroupId(2), 1),
            GroupPosition::new(GroupId(2), 2),
        ))
        .await?;
    print_view(&session.view());

    println!("\nDrop B[0] outside any group:");
    let outcome = session
        .drop_item(GroupPosition::new(GroupId(2), 0), None)
        .await?;
    println!("  no-op: {}", outcome.is_none());

    println!("\nAdd an item to A, then remove item 3:");
    let added = session.add_item(GroupId(1)).await?;
    session.remove_item(ItemId(3)).await?;
    print_view(&session.view());
    println!("  added item {}", added.item_id);

    println!("\nRename item 1:");
    if let Some(mut first) = session.view().item(ItemId(1)).cloned() {
        first.title = "task 1 (renamed)".into();
        session.update_item(first).await?;
    }
    print_view(&session.view());
    session.close().await;

    let persisted = store.board(session.board_id()).await;
    println!(
        "\nStore holds {} items on board {board_id}",
        persisted.as_ref().map(Board::item_count).unwrap_or_default()
    );

    let mut room = ChatRoom::open(store.clone(), "all", sync).await?;
    let alice = ChatAuthor {
        user_id: UserId(1),
        user_name: "alice".into(),
        avatar_url: None,
    };
    room.post(&alice, "hello").await?;
    room.post(&alice, "anyone there?").await?;
    println!("\nChat thread '{}':", room.thread());
    let mut seen = 0;
    while seen < 2 {
        match room.next_batch().await {
            Some(batch) => {
                seen += batch.len();
                batch.iter().for_each(print_message);
            }
            None => break,
        }
    }
    room.close().await;
    Ok(())
}
