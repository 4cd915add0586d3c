//! Sender and receiver flows on top of the store and the side channels.

use tokio::time::Duration;

pub mod device;
pub mod receiver;
pub mod scheduler;
pub mod sender;

pub use receiver::NoticeReceiver;
pub use scheduler::PollScheduler;
pub use sender::NoticeSender;

/// How often the sender re-reads a watched notice's status.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// How often a receiver-side view refreshes its notice list.
pub const LIST_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
