//! Lifecycle of a `send_tweet` submission.
//!
//! ```text
//! TweetDraft ──validate──▶ ValidatedTweet ──sign──▶ SignedTweet ──submit──▶ PendingTweet
//!  (Built)                  (Validated)              (Signed)                (Submitted/Pending)
//!                                                                               │ confirm
//!                                                                  ┌────────────┴────────────┐
//!                                                            FinalizedTweet           SubmissionRejected
//!                                                              (Finalized)               (Rejected)
//! ```
//!
//! Each stage is its own type and consumes the previous one, so a draft cannot
//! reach the ledger unvalidated or unsigned. Validation runs before any network
//! call. Confirmation is bounded by a timeout; dropping the future only stops
//! local waiting, the ledger may still commit the submission.

use std::fmt;

use anchor_lang::InstructionData;
use solana_program::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::Message,
    pubkey::Pubkey,
    system_program,
};
use tracing::{debug, trace, warn};

use crate::codec::{self, Tweet};
use crate::config::{ConfirmOptions, RetryPolicy};
use crate::error::{ClientError, Result};
use crate::keypair::{Keypair, Signer};
use crate::ledger::{Ledger, SignedSubmission, SubmissionHandle, SubmissionStatus};

/// Lifecycle stage, for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Built,
    Validated,
    Signed,
    Submitted,
    Pending,
    Finalized,
    Rejected,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Built => "built",
            Stage::Validated => "validated",
            Stage::Signed => "signed",
            Stage::Submitted => "submitted",
            Stage::Pending => "pending",
            Stage::Finalized => "finalized",
            Stage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A tweet assembled in memory with a fresh identity.
#[derive(Debug)]
pub struct TweetDraft {
    identity: Keypair,
    author: Pubkey,
    topic: String,
    content: String,
}

impl TweetDraft {
    /// Builds a draft with a newly generated identity.
    pub fn new(author: Pubkey, topic: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_identity(Keypair::generate(), author, topic, content)
    }

    /// Builds a draft around an existing identity keypair.
    ///
    /// Reusing an identity that already holds a tweet is refused by the ledger.
    pub fn with_identity(
        identity: Keypair,
        author: Pubkey,
        topic: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let draft = Self {
            identity,
            author,
            topic: topic.into(),
            content: content.into(),
        };
        debug!(stage = %Stage::Built, identity = %draft.identity(), author = %author, "tweet drafted");
        draft
    }

    pub fn identity(&self) -> Pubkey {
        self.identity.pubkey()
    }

    pub fn author(&self) -> Pubkey {
        self.author
    }

    /// Checks the draft against the program's limits and assembles the
    /// `send_tweet` instruction. Never touches the network.
    pub fn validate(self, program_id: &Pubkey) -> Result<ValidatedTweet> {
        codec::check_limits(&self.topic, &self.content)?;
        if self.content.is_empty() {
            return Err(ClientError::EmptyContent);
        }

        let payload = codec::encode(&self.author, &self.topic, &self.content)?;
        let identity = self.identity.pubkey();

        let instruction = Instruction {
            program_id: *program_id,
            accounts: vec![
                AccountMeta::new(identity, true),
                AccountMeta::new(self.author, true),
                AccountMeta::new_readonly(system_program::ID, false),
            ],
            data: solana_twitter::instruction::SendTweet {
                topic: self.topic,
                content: self.content,
            }
            .data(),
        };

        debug!(stage = %Stage::Validated, identity = %identity, payload_len = payload.len(), "tweet validated");

        Ok(ValidatedTweet {
            identity: self.identity,
            author: self.author,
            payload,
            instruction,
        })
    }
}

/// A draft that passed validation, ready to be signed.
#[derive(Debug)]
pub struct ValidatedTweet {
    identity: Keypair,
    author: Pubkey,
    payload: Vec<u8>,
    instruction: Instruction,
}

impl ValidatedTweet {
    pub fn identity(&self) -> Pubkey {
        self.identity.pubkey()
    }

    /// The account image the ledger is expected to store, before it stamps
    /// the timestamp.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn instruction(&self) -> &Instruction {
        &self.instruction
    }

    /// Compiles the message with the author as fee payer and collects every
    /// required signature.
    ///
    /// The identity keypair signs for itself. Every other required key must
    /// be among `signers`, otherwise this fails with
    /// [`ClientError::MissingSigner`]. Extra signers are ignored.
    pub fn sign(self, recent_blockhash: Hash, signers: &[&dyn Signer]) -> Result<SignedTweet> {
        let identity = self.identity.pubkey();
        let message =
            Message::new_with_blockhash(&[self.instruction], Some(&self.author), &recent_blockhash);
        let bytes = message.serialize();

        let required = usize::from(message.header.num_required_signatures);
        let mut signatures = Vec::with_capacity(required);
        for key in message.account_keys.iter().take(required) {
            let signature = if *key == identity {
                self.identity.sign(&bytes)
            } else {
                let signer = signers
                    .iter()
                    .find(|s| s.pubkey() == *key)
                    .ok_or(ClientError::MissingSigner { pubkey: *key })?;
                signer.try_sign_message(&bytes)?
            };
            signatures.push(signature);
        }

        debug!(stage = %Stage::Signed, identity = %identity, signatures = signatures.len(), "tweet signed");

        Ok(SignedTweet {
            identity,
            submission: SignedSubmission {
                message,
                signatures,
            },
        })
    }
}

/// A fully signed submission that has not been sent.
#[derive(Debug, Clone)]
pub struct SignedTweet {
    identity: Pubkey,
    submission: SignedSubmission,
}

impl SignedTweet {
    pub fn identity(&self) -> Pubkey {
        self.identity
    }

    pub fn submission(&self) -> &SignedSubmission {
        &self.submission
    }

    /// Sends the submission. Success means the ledger acknowledged it, not
    /// that the tweet exists.
    pub async fn submit(self, ledger: &dyn Ledger) -> Result<PendingTweet> {
        let handle = ledger.submit(self.submission).await?;
        debug!(stage = %Stage::Submitted, identity = %self.identity, handle = %handle, "tweet submitted");
        Ok(PendingTweet {
            identity: self.identity,
            handle,
        })
    }
}

/// A submission acknowledged by the ledger and awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTweet {
    identity: Pubkey,
    handle: SubmissionHandle,
}

impl PendingTweet {
    pub fn identity(&self) -> Pubkey {
        self.identity
    }

    pub fn handle(&self) -> SubmissionHandle {
        self.handle
    }

    /// Waits until the submission reaches `options.commitment`.
    ///
    /// On [`ClientError::Timeout`] the tweet may still appear later; look it
    /// up by [`identity`](Self::identity) rather than submitting again.
    pub async fn confirm(self, ledger: &dyn Ledger, options: &ConfirmOptions) -> Result<FinalizedTweet> {
        debug!(stage = %Stage::Pending, identity = %self.identity, handle = %self.handle, "awaiting confirmation");
        match await_confirmation(ledger, &self.handle, options).await {
            Ok(status) => {
                debug!(stage = %Stage::Finalized, identity = %self.identity, ?status, "tweet committed");
                Ok(FinalizedTweet {
                    identity: self.identity,
                    handle: self.handle,
                    status,
                })
            }
            Err(err) => {
                if matches!(err, ClientError::SubmissionRejected { .. }) {
                    warn!(stage = %Stage::Rejected, identity = %self.identity, error = %err, "tweet rejected");
                }
                Err(err)
            }
        }
    }
}

/// A submission that reached the requested commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTweet {
    identity: Pubkey,
    handle: SubmissionHandle,
    status: SubmissionStatus,
}

impl FinalizedTweet {
    pub fn identity(&self) -> Pubkey {
        self.identity
    }

    pub fn handle(&self) -> SubmissionHandle {
        self.handle
    }

    pub fn status(&self) -> &SubmissionStatus {
        &self.status
    }

    /// Reads the committed account back and decodes it.
    pub async fn fetch(
        &self,
        ledger: &dyn Ledger,
        program_id: &Pubkey,
        policy: &RetryPolicy,
    ) -> Result<Tweet> {
        crate::client::load_tweet(ledger, program_id, &self.identity, policy).await
    }
}

/// Polls the ledger until `handle` reaches `options.commitment`, is
/// rejected, or `options.timeout` elapses.
///
/// Transient transport failures while polling are logged and polling
/// continues. The returned future is cancel-safe.
pub async fn await_confirmation(
    ledger: &dyn Ledger,
    handle: &SubmissionHandle,
    options: &ConfirmOptions,
) -> Result<SubmissionStatus> {
    let poll = async {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match ledger.submission_status(handle).await {
                Ok(SubmissionStatus::Rejected(rejection)) => {
                    return Err(ClientError::SubmissionRejected {
                        reason: rejection.reason,
                        code: rejection.code,
                    });
                }
                Ok(status) if options.commitment.is_reached_by(&status) => return Ok(status),
                Ok(status) => trace!(handle = %handle, attempt, ?status, "not yet {}", options.commitment),
                Err(err) if err.is_retryable() => {
                    warn!(handle = %handle, attempt, error = %err, "status poll failed");
                }
                Err(err) => return Err(err),
            }
            tokio::time::sleep(options.poll_interval).await;
        }
    };

    match tokio::time::timeout(options.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout {
            handle: *handle,
            waited: options.timeout,
        }),
    }
}
