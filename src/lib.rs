//! chatvault — incremental chat-history archiver.
//!
//! Mirrors a user's conversations, messages, senders, attachments, and
//! reactions from a remote messaging service into a local queryable store,
//! on a recurring schedule, without re-downloading previously fetched
//! content and without losing data across restarts.
//!
//! ## Module Organization
//!
//! - `storage/`: the persistence contract and its two backends (embedded
//!   SQLite, networked PostgreSQL)
//! - `sync/`: cursor tracking, the batch fetch-and-persist pipeline, media
//!   acquisition, reconciliation, and the top-level pass entry points
//! - `remote/`: the collaborator trait the remote-service client implements
//! - `filter`: include/exclude decisions per conversation
//! - `config`: TOML configuration, loaded once and passed explicitly
//!
//! The scheduler, viewer UI, exporter, and the concrete remote client live
//! outside this crate. A scheduler drives [`sync::run_sync_pass`] (and
//! optionally [`sync::run_reconcile_pass`]) with a client handle it owns:
//!
//! ```no_run
//! # async fn example(client: &dyn chatvault::remote::ChatClient) -> Result<(), chatvault::error::VaultError> {
//! let config = chatvault::config::Config::default();
//! let storage = chatvault::storage::open_storage(&config.storage)?;
//! storage.initialize_schema()?;
//! chatvault::sync::run_sync_pass(client, storage.as_ref(), &config).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod types;

pub use config::Config;
pub use error::VaultError;
pub use filter::ChatFilter;
pub use storage::{open_storage, Storage};
pub use sync::{run_reconcile_pass, run_sync_pass, PassSummary, ReconcileSummary};
