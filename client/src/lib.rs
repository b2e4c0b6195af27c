//! Rust client for the `solana-twitter` program.
//!
//! Tweets are immutable records signed by their author and stored on the
//! ledger under a freshly generated identity. This crate builds, signs and
//! submits `send_tweet` transactions, waits for them to commit, and reads
//! tweets back with server-side byte filters.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use solana_twitter_client::{ClientConfig, Filter, TwitterClient};
//!
//! let client = TwitterClient::new(ledger, wallet, ClientConfig::default());
//!
//! let tweet = client.create("veganism", "Yay Tofu!").await?;
//! let mine = client.fetch_by_author(&client.wallet()).await?;
//! let vegan = client.fetch_all(&Filter::by_topic("veganism")).await?;
//! ```
//!
//! Any [`Ledger`] implementation can back the client. Two ship with the crate:
//! [`mock::InMemoryLedger`] for tests and, with the `rpc` feature,
//! `rpc::RpcLedger` for a real cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                TwitterClient (Public API)                  │
//! │  .create() │ .fetch_one() │ .fetch_all() │ .airdrop()      │
//! ├────────────────────────────────────────────────────────────┤
//! │                 Transaction Lifecycle                      │
//! │  Draft → Validated → Signed → Pending → Finalized/Rejected │
//! ├──────────────────────────────┬─────────────────────────────┤
//! │   Record Codec │ Filters     │  Retry (backon) │ Timeouts  │
//! ├──────────────────────────────┴─────────────────────────────┤
//! │                 Ledger trait (async)                       │
//! │   RpcLedger (`rpc` feature) │ InMemoryLedger (mock)        │
//! └────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]

mod client;
pub mod codec;
mod config;
mod error;
pub mod filter;
mod keypair;
pub mod ledger;
pub mod mock;
mod retry;
#[cfg(feature = "rpc")]
pub mod rpc;
pub mod transaction;

pub use client::{sort_newest_first, TwitterClient};
pub use codec::{Tweet, TweetRecord};
pub use config::{ClientConfig, ClientConfigBuilder, ConfirmOptions, RetryPolicy};
pub use error::{ClientError, DecodeError, LimitedField, Result, ValidationError};
pub use filter::{Constraint, Filter};
pub use keypair::{verify_signature, Keypair, Signer};
pub use ledger::{
    Commitment, Ledger, LedgerAccount, Rejection, SignedSubmission, SubmissionHandle,
    SubmissionStatus,
};
pub use retry::with_retry;
#[cfg(feature = "rpc")]
pub use rpc::RpcLedger;
