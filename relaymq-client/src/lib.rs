//! # RelayMQ Client Library
//!
//! An async Rust client for the RelayMQ event bus.
//!
//! A client owns one TCP connection to the broker. On connect it sends a
//! single registration frame naming every event type its receivers handle,
//! optionally requesting a replay of stored history. Thereafter it can
//! publish events (queued in order while the dial is still in flight) and
//! it dispatches every incoming event to the matching registered handlers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relaymq_client::{ClientConfig, EventBusClient, EventReceiver, RoomBooked};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> relaymq_client::Result<()> {
//!     let mut receiver = EventReceiver::new();
//!     receiver.register(|event: RoomBooked| {
//!         println!("room {} booked by {}", event.room_id, event.customer_id);
//!     });
//!
//!     let client = EventBusClient::start(ClientConfig::default(), vec![receiver]);
//!
//!     client.publish(&RoomBooked {
//!         booked_at_ms: 1_700_000_000_000,
//!         event_id: Uuid::new_v4(),
//!         room_id: Uuid::new_v4(),
//!         customer_id: Uuid::new_v4(),
//!     })?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod receiver;

pub use client::EventBusClient;
pub use config::ClientConfig;
pub use connection::ClientConnection;
pub use error::ClientError;
pub use events::{
    BookingCancelled, BookingPaid, CustomerCreated, CustomerUpdated, DomainEvent, EventKind,
    RoomBooked, RoomCreated, RoomUpdated,
};
pub use receiver::EventReceiver;

/// Client library result type
pub type Result<T> = std::result::Result<T, ClientError>;
