use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

mod utils;

use chalkcast::channel::{BroadcastChannel, LoopbackTransport, ReceiptMailbox};
use chalkcast::messaging::{
    NoticeReceiver, NoticeSender, LIST_REFRESH_INTERVAL, STATUS_POLL_INTERVAL,
};
use chalkcast::models::MessageStatus;
use chalkcast::store::backend::set_data_dir_override;
use chalkcast::store::{FileStorage, MessageStore};

/// Command line arguments for chalkcast
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Chalkcast: classroom notices with read receipts.",
    long_about = "Chalkcast posts short classroom notices from a sender to local receivers\n\
    and tracks delivery through read receipts.\n\n\
    Optional parameters:\n\
    --data-dir <PATH>      Override the directory holding the persisted notice collections\n\
    Use -h or --help to see all options."
)]
struct Args {
    /// Directory holding the persisted notice collections
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run sender and receiver together and exercise the full receipt flow
    Demo {
        /// Display name recorded on outgoing notices
        #[arg(long)]
        sender_name: Option<String>,

        /// Address to inspect for an inbound read receipt on startup
        #[arg(long, value_name = "URL")]
        activation_url: Option<String>,
    },
    /// List sent notices with their delivery state
    History,
    /// List received notices, newest first
    Inbox,
    /// Remove all stored collections
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The override must land before the first store is opened.
    if let Some(ref dir) = args.data_dir {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
        set_data_dir_override(dir.clone());
    }

    let log_file_path = match &args.data_dir {
        Some(dir) => dir.join("chalkcast.log"),
        None => PathBuf::from("chalkcast.log"),
    };
    utils::setup_logging(log_file_path.to_str(), LevelFilter::Debug)?;

    info!("Chalkcast starting up");
    info!(
        "System information: {} {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    let storage = Arc::new(FileStorage::new_default()?);
    let store = MessageStore::new(storage);

    match args.command {
        Command::Demo {
            sender_name,
            activation_url,
        } => run_demo(store, sender_name, activation_url).await,
        Command::History => print_history(&store),
        Command::Inbox => print_inbox(&store),
        Command::Clear => {
            store.clear_all_data()?;
            println!("All notice collections cleared.");
            Ok(())
        }
    }
}

fn print_history(store: &MessageStore) -> Result<()> {
    let mut messages = store.sent_messages()?;
    if messages.is_empty() {
        println!("No sent notices.");
        return Ok(());
    }

    // Newest first for display
    messages.reverse();
    for message in messages {
        let receipts = match message.read_receipts.len() {
            0 => String::new(),
            n => format!(" | {} device(s) confirmed", n),
        };
        println!(
            "[{}] {} - {} ({:?}{})",
            utils::format_time(message.timestamp),
            message.sender,
            message.content,
            message.status,
            receipts
        );
    }
    Ok(())
}

fn print_inbox(store: &MessageStore) -> Result<()> {
    let mut messages = store.received_messages()?;
    if messages.is_empty() {
        println!("No received notices.");
        return Ok(());
    }

    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    for message in messages {
        println!(
            "[{}] {} - {} ({:?})",
            utils::format_time(message.timestamp),
            message.sender,
            message.content,
            message.status
        );
    }
    Ok(())
}

/// Both roles in one process: the loopback mailbox plays the part of the
/// sender page's address, and every incoming notice is confirmed as read.
async fn run_demo(
    store: MessageStore,
    sender_name: Option<String>,
    activation_url: Option<String>,
) -> Result<()> {
    let channel = BroadcastChannel::new();
    let mailbox = ReceiptMailbox::new();
    let transport = Arc::new(LoopbackTransport::new(mailbox.clone()));

    let sender = Arc::new(NoticeSender::new(store.clone(), channel.clone()));
    if let Some(name) = sender_name {
        sender.set_sender_name(&name)?;
    }

    // A receipt may arrive encoded in the address that launched us.
    if let Some(url) = activation_url {
        match sender.ingest_receipt_from_url(&url)? {
            Some(receipt) => println!(
                "Ingested startup receipt from {} for {}",
                receipt.receiver_id, receipt.message_id
            ),
            None => warn!("Startup address carried no usable receipt"),
        }
    }

    let (receiver, mut events) = NoticeReceiver::new(
        store.clone(),
        channel.clone(),
        transport,
        "http://localhost/send",
    )?;
    let receiver = Arc::new(receiver);
    println!("Receiver device id: {}", receiver.device_id());

    {
        let receiver = receiver.clone();
        tokio::spawn(async move {
            receiver.run().await;
        });
    }

    // Print each incoming notice and confirm it read right away.
    {
        let receiver = receiver.clone();
        tokio::spawn(async move {
            while let Some(message) = events.recv().await {
                println!(
                    "\n<- [{}] {}: {}",
                    utils::format_time(message.timestamp),
                    message.sender,
                    message.content
                );
                if let Err(e) = receiver.send_read_receipt(&message.id).await {
                    warn!("Could not send read receipt: {}", e);
                }
            }
        });
    }

    // The sending side checks its address for receipt requests periodically.
    {
        let sender = sender.clone();
        let mailbox = mailbox.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(tokio::time::Duration::from_secs(1));
            loop {
                timer.tick().await;
                if let Err(e) = sender.ingest_pending_receipts(&mailbox).await {
                    warn!("Receipt ingestion failed: {}", e);
                }
            }
        });
    }

    // Receiver-side list refresh: report the inbox when it changes.
    {
        let store = store.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(LIST_REFRESH_INTERVAL);
            let mut last_count = usize::MAX;
            loop {
                timer.tick().await;
                if let Ok(messages) = store.received_messages() {
                    if messages.len() != last_count {
                        last_count = messages.len();
                        info!("Inbox now holds {} notice(s)", last_count);
                    }
                }
            }
        });
    }

    println!("Type a notice and press enter to send it; 'quit' to exit.");
    loop {
        print!("notice> ");
        std::io::stdout().flush()?;

        let line = tokio::task::spawn_blocking(utils::read_line).await??;
        if line == "quit" || line == "exit" {
            break;
        }
        if line.is_empty() {
            println!("Notice text must not be empty.");
            continue;
        }

        let message = sender.send(&line)?;
        sender.broadcast(&message).await?;
        println!("-> sent {} at {}", message.id, utils::format_time(message.timestamp));

        let mut last_seen: Option<(MessageStatus, usize)> = None;
        sender
            .poll_status(&message.id, STATUS_POLL_INTERVAL, move |message| {
                let snapshot = (message.status, message.read_receipts.len());
                if last_seen != Some(snapshot) {
                    last_seen = Some(snapshot);
                    println!(
                        "   {} is now {:?} ({} receipt(s))",
                        message.id,
                        message.status,
                        message.read_receipts.len()
                    );
                }
            })
            .await;
    }

    Ok(())
}
