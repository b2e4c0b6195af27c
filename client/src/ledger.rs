//! The external ledger service, as consumed by the client.
//!
//! Submission is two-phase: [`Ledger::submit`] only acknowledges receipt, and
//! durability is learned by polling [`Ledger::submission_status`]. Account
//! reads return raw bytes; [`Ledger::get_program_accounts`] evaluates byte
//! constraints on the service side before anything is sent back.

use std::fmt;

use async_trait::async_trait;
use ed25519_dalek::Signature;
use solana_program::{hash::Hash, message::Message, pubkey::Pubkey};

use crate::error::Result;
use crate::filter::Constraint;

/// Identifies a submission; the fee payer's signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionHandle([u8; 64]);

impl SubmissionHandle {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn from_signature(signature: &Signature) -> Self {
        Self(signature.to_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Display for SubmissionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        f.write_str("..")
    }
}

impl fmt::Debug for SubmissionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubmissionHandle({self})")
    }
}

/// Why the ledger refused a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
    pub code: Option<String>,
}

impl Rejection {
    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            code: Some(code.into()),
        }
    }
}

/// Confirmation state of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Received, not yet committed.
    Pending,
    /// Committed in `slot` and visible to reads, but could still be rolled back.
    Confirmed { slot: u64 },
    /// Durable and irreversible.
    Finalized { slot: u64 },
    Rejected(Rejection),
}

/// Confirmation level a caller waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Commitment {
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    /// True once `status` is at least as strong as this commitment.
    pub fn is_reached_by(self, status: &SubmissionStatus) -> bool {
        match (self, status) {
            (_, SubmissionStatus::Finalized { .. }) => true,
            (Commitment::Confirmed, SubmissionStatus::Confirmed { .. }) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Commitment::Confirmed => f.write_str("confirmed"),
            Commitment::Finalized => f.write_str("finalized"),
        }
    }
}

/// A compiled message with one signature per required signer, in the order
/// of the message's signer keys.
#[derive(Debug, Clone)]
pub struct SignedSubmission {
    pub message: Message,
    pub signatures: Vec<Signature>,
}

impl SignedSubmission {
    /// Keys whose signatures the message requires; the fee payer comes first.
    pub fn required_signers(&self) -> &[Pubkey] {
        let n = usize::from(self.message.header.num_required_signatures);
        &self.message.account_keys[..n.min(self.message.account_keys.len())]
    }

    /// The handle the ledger will track this submission under.
    pub fn handle(&self) -> Option<SubmissionHandle> {
        self.signatures.first().map(SubmissionHandle::from_signature)
    }
}

/// Raw account state as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAccount {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
}

/// Operations the client needs from the ledger service.
///
/// Implementations report transient network failures as
/// [`ClientError::Transport`](crate::error::ClientError::Transport) and
/// refusals detected at submission time as
/// [`ClientError::SubmissionRejected`](crate::error::ClientError::SubmissionRejected).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// A blockhash recent enough to anchor a new message.
    async fn latest_blockhash(&self) -> Result<Hash>;

    /// Sends a signed submission. Acknowledgement is not durability.
    async fn submit(&self, submission: SignedSubmission) -> Result<SubmissionHandle>;

    async fn submission_status(&self, handle: &SubmissionHandle) -> Result<SubmissionStatus>;

    /// Returns the account at `address`, or `None` if nothing is stored there.
    async fn get_account(&self, address: &Pubkey) -> Result<Option<LedgerAccount>>;

    /// Returns every account owned by `program_id` whose data satisfies all
    /// `constraints`, in no particular order.
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        constraints: &[Constraint],
    ) -> Result<Vec<(Pubkey, LedgerAccount)>>;

    /// Asks the ledger to credit `lamports` to `address`.
    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<SubmissionHandle>;
}
