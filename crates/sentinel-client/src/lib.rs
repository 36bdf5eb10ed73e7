//! sentinel-client: pooled connections to sentinel-managed masters.
//!
//! Sentinel knows which node is the current master of each named group
//! and announces failovers on its `+switch-master` channel. This crate
//! keeps a small connection pool per master name and swaps a pool out
//! the moment sentinel reports that its master moved, so callers only
//! ever ask for "a connection to the master of `cache`".
//!
//! # Architecture
//!
//! - **Coordinator**: one task owning every pool; all gets, puts and
//!   pool swaps go through it in order
//! - **Failover listener**: one task reading the sentinel subscription
//!   and forwarding switch events to the coordinator
//! - **Pool**: idle connections for a single address
//! - **Client**: cheap, cloneable handle used by application tasks
//! - **SubClient**: a connection in pub/sub mode, also usable on its own
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sentinel_client::{Client, ClientConfig};
//!
//! # async fn run() -> Result<(), sentinel_client::ClientError> {
//! let config = ClientConfig::new("127.0.0.1:26379").name("cache").pool_size(4);
//! let client = Client::connect(config).await?;
//!
//! let mut conn = client.get_master("cache").await?;
//! match conn.execute(&["SET", "greeting", "hello"]).await {
//!     // healthy connections go back to the pool
//!     Ok(_) => client.put_master("cache", conn).await,
//!     // faulted ones are closed instead
//!     Err(_) => conn.close().await,
//! }
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connection;
mod coordinator;
mod error;
mod listener;
mod pool;
mod shutdown;
mod subscription;

pub use client::Client;
pub use config::{ClientConfig, Network, DEFAULT_POOL_SIZE, SWITCH_MASTER_CHANNEL};
pub use connection::Connection;
pub use error::{ClientError, ConnectionError};
pub use pool::{Dial, Pool};
pub use sentinel_protocol::Frame;
pub use subscription::{parse_subscription_reply, SubClient, SubscriptionEvent};
