//! Live packet relay
//!
//! The relay decouples one publisher from many viewers per stream identity:
//!
//! ```text
//!                         Arc<RelayHub>
//!                 ┌──────────────────────────┐
//!                 │ streams: HashMap<key,    │
//!                 │   Arc<BroadcastQueue> {  │
//!                 │     header,              │
//!                 │     tx: broadcast::Tx,   │
//!                 │   }                      │
//!                 │ >                        │
//!                 └────────────┬─────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!     [Publisher]         [Viewer]            [Viewer]
//!     queue.write()       cursor.next()       cursor.next()
//! ```
//!
//! `bytes::Bytes` payloads are reference-counted, so fan-out clones the
//! packet envelope but never the media data.

pub mod hub;
pub mod packet;
pub mod queue;

pub use hub::RelayHub;
pub use packet::{MediaPacket, PacketKind};
pub use queue::{BroadcastQueue, Cursor, StreamHeader};
