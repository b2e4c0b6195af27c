//! Client error taxonomy.
//!
//! Two tiers, as seen from the caller:
//! - **Local errors**: validation, decoding, signing and configuration. These are
//!   deterministic and never retried.
//! - **Ledger errors**: rejections, missing accounts, confirmation timeouts and
//!   transport failures. Only transport failures are retryable, and only for
//!   idempotent reads.

use std::fmt;
use std::time::Duration;

use solana_program::pubkey::Pubkey;
use thiserror::Error;

use crate::ledger::SubmissionHandle;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// A user-supplied field with a length limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedField {
    Topic,
    Content,
}

impl fmt::Display for LimitedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitedField::Topic => f.write_str("topic"),
            LimitedField::Content => f.write_str("content"),
        }
    }
}

/// A field exceeded its on-chain length limit.
///
/// The message matches the program's own error so callers see the same text
/// whether the client or the ledger caught it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("The provided {field} should be {limit} characters long maximum")]
pub struct ValidationError {
    pub field: LimitedField,
    /// Maximum length in characters.
    pub limit: usize,
    /// Actual length in characters.
    pub actual: usize,
}

/// Raw account bytes could not be decoded as a tweet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("bad discriminator: expected {expected:?}, found {found:?}")]
    BadDiscriminator { expected: [u8; 8], found: [u8; 8] },

    #[error("truncated {field}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
}

/// Errors returned by the client and by [`Ledger`](crate::ledger::Ledger)
/// implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("The provided content should not be empty")]
    EmptyContent,

    #[error("failed to decode tweet {identity}: {source}")]
    Decode {
        identity: Pubkey,
        #[source]
        source: DecodeError,
    },

    #[error("submission rejected: {reason}")]
    SubmissionRejected {
        reason: String,
        /// Machine-readable code, e.g. `TopicTooLong` or `AccountInUse`.
        code: Option<String>,
    },

    #[error("no tweet at {identity}")]
    NotFound { identity: Pubkey },

    #[error("account {identity} is owned by {owner}, not the twitter program")]
    WrongOwner { identity: Pubkey, owner: Pubkey },

    /// The ledger may still commit the submission; re-query by identity
    /// instead of resubmitting.
    #[error("confirmation of {handle} timed out after {}ms", .waited.as_millis())]
    Timeout {
        handle: SubmissionHandle,
        waited: Duration,
    },

    #[error("missing signature from required signer {pubkey}")]
    MissingSigner { pubkey: Pubkey },

    #[error("signer {pubkey} failed to sign: {message}")]
    Signing { pubkey: Pubkey, message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    /// The ledger answered, but not with anything usable.
    #[error("ledger RPC error: {message}")]
    Rpc { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl ClientError {
    /// Returns true if the operation may succeed when repeated unchanged.
    ///
    /// Only transport failures qualify. A timed-out submission is not
    /// retryable: its fate is unknown and a resubmission needs a new identity.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns the rejection code if the ledger refused a submission.
    #[must_use]
    pub fn rejection_code(&self) -> Option<&str> {
        match self {
            Self::SubmissionRejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
