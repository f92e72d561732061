//! Foundational system components for the rum services.
//!
//! The batch processors run as services: a spawned task that owns its state and receives
//! messages through an unbounded channel. Producers hold a cheaply cloneable [`Addr`] and never
//! block when sending.
//!
//! # Example
//!
//! ```
//! use rum_system::{AsyncResponse, FromMessage, Interface, Receiver, Sender, Service};
//!
//! #[derive(Debug)]
//! struct Count;
//!
//! #[derive(Debug)]
//! struct Counter(Count, Sender<u64>);
//!
//! impl Interface for Counter {}
//!
//! impl FromMessage<Count> for Counter {
//!     type Response = AsyncResponse<u64>;
//!
//!     fn from_message(message: Count, sender: Sender<u64>) -> Self {
//!         Self(message, sender)
//!     }
//! }
//!
//! struct CounterService(u64);
//!
//! impl Service for CounterService {
//!     type Interface = Counter;
//!
//!     fn spawn_handler(mut self, mut rx: Receiver<Counter>) {
//!         tokio::spawn(async move {
//!             while let Some(Counter(_, sender)) = rx.recv().await {
//!                 self.0 += 1;
//!                 sender.send(self.0);
//!             }
//!         });
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let addr = CounterService(0).start();
//! assert_eq!(addr.send(Count).await.unwrap(), 1);
//! # });
//! ```

#![warn(missing_docs)]

mod service;

pub use self::service::*;
