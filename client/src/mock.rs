//! In-memory ledger for testing the client without a cluster.
//!
//! Executes the twitter program's `send_tweet` semantics and airdrops against
//! a local account map, and reproduces the parts of a real ledger the client
//! depends on:
//!
//! - **Two-phase commit**: submissions stay `Pending` for a configurable number
//!   of status polls, then commit (`Confirmed`), then finalize.
//! - **Atomic effects**: nothing a submission writes is visible before it
//!   commits, and a rejected submission writes nothing but its fee.
//! - **Server-side filtering**: `get_program_accounts` evaluates constraints on
//!   raw account bytes.
//! - **Failure injection**: transient unavailability and stalled confirmation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use solana_twitter_client::mock::InMemoryLedger;
//! use solana_twitter_client::{ClientConfig, Keypair, Signer, TwitterClient};
//!
//! # async fn example() -> solana_twitter_client::Result<()> {
//! let ledger = InMemoryLedger::new();
//! let wallet = Keypair::generate();
//! ledger.fund(&wallet.pubkey(), 1_000_000_000);
//!
//! let client = TwitterClient::new(Arc::new(ledger), Arc::new(wallet), ClientConfig::default());
//! let tweet = client.create("veganism", "Hello world").await?;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anchor_lang::{AccountSerialize, AnchorDeserialize, Discriminator};
use async_trait::async_trait;
use parking_lot::RwLock;
use solana_program::{
    hash::{hashv, Hash},
    message::Message,
    pubkey::Pubkey,
    rent::Rent,
    system_program,
};
use solana_twitter::instruction::SendTweet;
use solana_twitter::state::Tweet as TweetAccount;

use crate::error::{ClientError, Result};
use crate::filter::Constraint;
use crate::keypair::verify_signature;
use crate::ledger::{
    Ledger, LedgerAccount, Rejection, SignedSubmission, SubmissionHandle, SubmissionStatus,
};

/// Lamports charged per signature.
pub const FEE_PER_SIGNATURE: u64 = 5_000;

/// What a submission does once it commits.
#[derive(Debug, Clone)]
enum Effect {
    SendTweet {
        payer: Pubkey,
        fee: u64,
        identity: Pubkey,
        author: Pubkey,
        topic: String,
        content: String,
    },
    Airdrop {
        to: Pubkey,
        lamports: u64,
    },
}

#[derive(Debug, Clone)]
enum Outcome {
    Pending { polls: u32 },
    Committed { slot: u64, finalized: bool },
    Rejected(Rejection),
}

#[derive(Debug)]
struct SubmissionEntry {
    effect: Option<Effect>,
    outcome: Outcome,
}

#[derive(Debug)]
struct MockState {
    program_id: Pubkey,
    accounts: RwLock<HashMap<Pubkey, LedgerAccount>>,
    submissions: RwLock<HashMap<SubmissionHandle, SubmissionEntry>>,
    blockhashes: RwLock<HashSet<Hash>>,
    slot: AtomicU64,
    /// Unix time stamped on the next committed tweet; advances per commit.
    clock: AtomicI64,
    pending_polls: AtomicU32,
    stalled: AtomicBool,
    unavailable_count: AtomicUsize,
    submit_count: AtomicUsize,
    airdrop_count: AtomicU64,
}

impl MockState {
    fn new(program_id: Pubkey) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        Self {
            program_id,
            accounts: RwLock::default(),
            submissions: RwLock::default(),
            blockhashes: RwLock::default(),
            slot: AtomicU64::new(1),
            clock: AtomicI64::new(now),
            pending_polls: AtomicU32::new(1),
            stalled: AtomicBool::new(false),
            unavailable_count: AtomicUsize::new(0),
            submit_count: AtomicUsize::new(0),
            airdrop_count: AtomicU64::new(0),
        }
    }

    /// Consumes one injected failure, if any are left.
    fn check_injection(&self) -> Result<()> {
        let injected = self
            .unavailable_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ClientError::Transport {
                message: "injected: ledger unavailable".to_owned(),
            });
        }
        Ok(())
    }

    fn execute(&self, effect: &Effect) -> std::result::Result<(), Rejection> {
        let mut accounts = self.accounts.write();
        match effect {
            Effect::Airdrop { to, lamports } => {
                credit(&mut accounts, to, *lamports);
                Ok(())
            }
            Effect::SendTweet {
                payer,
                fee,
                identity,
                author,
                topic,
                content,
            } => {
                // The fee is charged even when the instruction fails.
                let payer_balance = accounts.get(payer).map_or(0, |a| a.lamports);
                if payer_balance < *fee {
                    return Err(Rejection::new(
                        "InsufficientFundsForFee",
                        format!("{payer} cannot pay the {fee} lamport fee"),
                    ));
                }
                if let Some(account) = accounts.get_mut(payer) {
                    account.lamports -= fee;
                }

                if accounts.contains_key(identity) {
                    return Err(Rejection::new(
                        "AccountInUse",
                        format!("account {identity} already in use"),
                    ));
                }

                let rent = Rent::default().minimum_balance(TweetAccount::LEN);
                let author_balance = accounts.get(author).map_or(0, |a| a.lamports);
                if author_balance < rent {
                    return Err(Rejection::new(
                        "InsufficientFunds",
                        format!("{author} has {author_balance} lamports, needs {rent} for rent"),
                    ));
                }

                TweetAccount::validate(topic, content)
                    .map_err(|e| Rejection::new(e.name(), e.to_string()))?;

                let tweet = TweetAccount {
                    author: *author,
                    timestamp: self.clock.fetch_add(1, Ordering::SeqCst),
                    topic: topic.clone(),
                    content: content.clone(),
                };
                let mut data = Vec::with_capacity(TweetAccount::LEN);
                tweet
                    .try_serialize(&mut data)
                    .map_err(|e| Rejection::new("AccountDidNotSerialize", e.to_string()))?;
                data.resize(TweetAccount::LEN, 0);

                if let Some(account) = accounts.get_mut(author) {
                    account.lamports -= rent;
                }
                accounts.insert(
                    *identity,
                    LedgerAccount {
                        lamports: rent,
                        owner: self.program_id,
                        data,
                    },
                );
                Ok(())
            }
        }
    }

    fn preflight(&self, submission: &SignedSubmission) -> Result<()> {
        let bytes = submission.message.serialize();
        let required = submission.required_signers();
        if submission.signatures.len() != required.len() {
            return Err(rejected(
                "SignatureFailure",
                format!(
                    "expected {} signatures, got {}",
                    required.len(),
                    submission.signatures.len()
                ),
            ));
        }
        for (key, signature) in required.iter().zip(&submission.signatures) {
            if !verify_signature(key, &bytes, signature) {
                return Err(rejected(
                    "SignatureFailure",
                    format!("invalid signature for {key}"),
                ));
            }
        }
        if !self
            .blockhashes
            .read()
            .contains(&submission.message.recent_blockhash)
        {
            return Err(rejected("BlockhashNotFound", "blockhash not found"));
        }
        Ok(())
    }

    fn decode_send_tweet(&self, message: &Message) -> std::result::Result<Effect, Rejection> {
        let [ix] = message.instructions.as_slice() else {
            return Err(Rejection::new(
                "InvalidInstruction",
                "expected exactly one instruction",
            ));
        };
        let key_at = |index: u8| message.account_keys.get(usize::from(index)).copied();

        if key_at(ix.program_id_index) != Some(self.program_id) {
            return Err(Rejection::new(
                "IncorrectProgramId",
                "instruction does not target the twitter program",
            ));
        }
        if ix.data.len() < 8 || ix.data[..8] != SendTweet::DISCRIMINATOR[..] {
            return Err(Rejection::new(
                "InstructionFallbackNotFound",
                "unknown instruction",
            ));
        }
        let args = SendTweet::try_from_slice(&ix.data[8..]).map_err(|e| {
            Rejection::new("InstructionDidNotDeserialize", e.to_string())
        })?;

        let [tweet_idx, author_idx, system_idx] = ix.accounts.as_slice() else {
            return Err(Rejection::new(
                "AccountNotEnoughKeys",
                "send_tweet takes three accounts",
            ));
        };
        let (Some(identity), Some(author), Some(system)) =
            (key_at(*tweet_idx), key_at(*author_idx), key_at(*system_idx))
        else {
            return Err(Rejection::new("AccountNotEnoughKeys", "account index out of range"));
        };
        if !message.is_signer(usize::from(*tweet_idx)) || !message.is_signer(usize::from(*author_idx)) {
            return Err(Rejection::new(
                "AccountNotSigner",
                "tweet and author must both sign",
            ));
        }
        if system != system_program::ID {
            return Err(Rejection::new("InvalidProgramId", "wrong system program"));
        }

        let payer = message.account_keys[0];
        let fee = FEE_PER_SIGNATURE * u64::from(message.header.num_required_signatures);
        Ok(Effect::SendTweet {
            payer,
            fee,
            identity,
            author,
            topic: args.topic,
            content: args.content,
        })
    }

    fn next_slot(&self) -> u64 {
        self.slot.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Adds `lamports` to `to`, creating it as a system account if absent.
fn credit(accounts: &mut HashMap<Pubkey, LedgerAccount>, to: &Pubkey, lamports: u64) {
    let account = accounts.entry(*to).or_insert_with(|| LedgerAccount {
        lamports: 0,
        owner: system_program::ID,
        data: Vec::new(),
    });
    account.lamports = account.lamports.saturating_add(lamports);
}

fn rejected(code: &str, reason: impl Into<String>) -> ClientError {
    ClientError::SubmissionRejected {
        reason: reason.into(),
        code: Some(code.to_owned()),
    }
}

/// In-memory [`Ledger`] implementation.
///
/// Cloning yields another handle to the same ledger.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    state: Arc<MockState>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    /// Creates an empty ledger hosting the twitter program at its declared id.
    pub fn new() -> Self {
        Self::with_program_id(solana_twitter::ID)
    }

    pub fn with_program_id(program_id: Pubkey) -> Self {
        Self {
            state: Arc::new(MockState::new(program_id)),
        }
    }

    /// Credits `lamports` to `address` immediately, like a genesis allocation.
    pub fn fund(&self, address: &Pubkey, lamports: u64) {
        credit(&mut self.state.accounts.write(), address, lamports);
    }

    pub fn balance(&self, address: &Pubkey) -> u64 {
        self.state
            .accounts
            .read()
            .get(address)
            .map_or(0, |a| a.lamports)
    }

    /// Stores raw account state, bypassing the program.
    pub fn set_account(&self, address: Pubkey, account: LedgerAccount) {
        self.state.accounts.write().insert(address, account);
    }

    /// Number of status polls a submission stays pending before it commits.
    pub fn set_pending_polls(&self, polls: u32) {
        self.state.pending_polls.store(polls, Ordering::SeqCst);
    }

    /// Freezes confirmation: every submission stays pending until [`resume`](Self::resume).
    pub fn stall(&self) {
        self.state.stalled.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.state.stalled.store(false, Ordering::SeqCst);
    }

    /// Fails the next `count` requests with a transport error.
    pub fn inject_unavailable(&self, count: usize) {
        self.state.unavailable_count.store(count, Ordering::SeqCst);
    }

    /// Submissions received, including refused ones.
    pub fn submit_count(&self) -> usize {
        self.state.submit_count.load(Ordering::SeqCst)
    }

    /// Sets the timestamp stamped on the next committed tweet.
    pub fn set_clock(&self, unix_timestamp: i64) {
        self.state.clock.store(unix_timestamp, Ordering::SeqCst);
    }

    /// Drives every pending submission to a terminal state, ignoring the
    /// configured poll count. Stalled ledgers are left alone.
    pub fn settle(&self) {
        if self.state.stalled.load(Ordering::SeqCst) {
            return;
        }
        let handles: Vec<SubmissionHandle> =
            self.state.submissions.read().keys().copied().collect();
        for handle in handles {
            self.poll(&handle, true);
        }
    }

    fn poll(&self, handle: &SubmissionHandle, force: bool) -> SubmissionStatus {
        let mut submissions = self.state.submissions.write();
        let Some(entry) = submissions.get_mut(handle) else {
            return SubmissionStatus::Rejected(Rejection::new(
                "SubmissionNotFound",
                format!("no submission {handle}"),
            ));
        };

        match entry.outcome.clone() {
            Outcome::Rejected(rejection) => SubmissionStatus::Rejected(rejection),
            Outcome::Committed { slot, finalized } => {
                if !finalized {
                    entry.outcome = Outcome::Committed {
                        slot,
                        finalized: true,
                    };
                }
                SubmissionStatus::Finalized { slot }
            }
            Outcome::Pending { polls } => {
                let waiting = !force && polls < self.state.pending_polls.load(Ordering::SeqCst);
                if self.state.stalled.load(Ordering::SeqCst) || waiting {
                    entry.outcome = Outcome::Pending { polls: polls + 1 };
                    return SubmissionStatus::Pending;
                }

                let result = match &entry.effect {
                    Some(effect) => self.state.execute(effect),
                    None => Ok(()),
                };
                match result {
                    Ok(()) => {
                        let slot = self.state.next_slot();
                        entry.outcome = Outcome::Committed {
                            slot,
                            finalized: false,
                        };
                        tracing::debug!(handle = %handle, slot, "submission committed");
                        SubmissionStatus::Confirmed { slot }
                    }
                    Err(rejection) => {
                        tracing::debug!(handle = %handle, reason = %rejection.reason, "submission failed");
                        entry.outcome = Outcome::Rejected(rejection.clone());
                        SubmissionStatus::Rejected(rejection)
                    }
                }
            }
        }
    }

    fn track(&self, handle: SubmissionHandle, effect: std::result::Result<Effect, Rejection>) {
        let entry = match effect {
            Ok(effect) => SubmissionEntry {
                effect: Some(effect),
                outcome: Outcome::Pending { polls: 0 },
            },
            Err(rejection) => SubmissionEntry {
                effect: None,
                outcome: Outcome::Rejected(rejection),
            },
        };
        self.state.submissions.write().entry(handle).or_insert(entry);
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn latest_blockhash(&self) -> Result<Hash> {
        self.state.check_injection()?;
        let slot = self.state.slot.load(Ordering::SeqCst);
        let blockhash = hashv(&[b"blockhash", &slot.to_le_bytes()]);
        self.state.blockhashes.write().insert(blockhash);
        Ok(blockhash)
    }

    async fn submit(&self, submission: SignedSubmission) -> Result<SubmissionHandle> {
        self.state.check_injection()?;
        self.state.submit_count.fetch_add(1, Ordering::SeqCst);

        self.state.preflight(&submission)?;
        let handle = submission
            .handle()
            .ok_or_else(|| rejected("SignatureFailure", "submission carries no signatures"))?;

        let effect = self.state.decode_send_tweet(&submission.message);
        self.track(handle, effect);
        tracing::debug!(handle = %handle, "submission accepted");
        Ok(handle)
    }

    async fn submission_status(&self, handle: &SubmissionHandle) -> Result<SubmissionStatus> {
        self.state.check_injection()?;
        Ok(self.poll(handle, false))
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<LedgerAccount>> {
        self.state.check_injection()?;
        Ok(self.state.accounts.read().get(address).cloned())
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        constraints: &[Constraint],
    ) -> Result<Vec<(Pubkey, LedgerAccount)>> {
        self.state.check_injection()?;
        let accounts = self.state.accounts.read();
        Ok(accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .filter(|(_, account)| constraints.iter().all(|c| c.matches(&account.data)))
            .map(|(address, account)| (*address, account.clone()))
            .collect())
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<SubmissionHandle> {
        self.state.check_injection()?;
        let n = self.state.airdrop_count.fetch_add(1, Ordering::SeqCst);
        let digest = hashv(&[b"airdrop", address.as_ref(), &n.to_le_bytes()]).to_bytes();

        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&digest);
        bytes[32..].copy_from_slice(&digest);
        let handle = SubmissionHandle::from_bytes(bytes);

        self.track(
            handle,
            Ok(Effect::Airdrop {
                to: *address,
                lamports,
            }),
        );
        Ok(handle)
    }
}
