//! [`Ledger`] over a cluster's JSON-RPC endpoint.
//!
//! Reads use the commitment the ledger was built with (`confirmed` unless
//! told otherwise). Submissions go through `sendTransaction` with preflight
//! checks, so most refusals surface from [`Ledger::submit`] rather than from
//! status polling.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use solana_twitter_client::rpc::RpcLedger;
//! use solana_twitter_client::{ClientConfig, Commitment, Keypair, TwitterClient};
//!
//! # async fn example() -> solana_twitter_client::Result<()> {
//! let ledger = RpcLedger::new("https://api.devnet.solana.com");
//! let config = ClientConfig::builder()
//!     .with_commitment(Commitment::Confirmed)
//!     .build()?;
//! let client = TwitterClient::new(Arc::new(ledger), Arc::new(Keypair::generate()), config);
//! let tweets = client.fetch_by_topic("veganism").await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::client_error::{ClientError as RpcClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_program::{hash::Hash, pubkey::Pubkey};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::InstructionError;
use solana_sdk::signature::Signature as RpcSignature;
use solana_sdk::transaction::{Transaction, TransactionError};
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use solana_twitter::errors::TwitterError;

use crate::error::{ClientError, Result};
use crate::filter::Constraint;
use crate::ledger::{
    Ledger, LedgerAccount, Rejection, SignedSubmission, SubmissionHandle, SubmissionStatus,
};

/// Custom error codes the system program raises from `create_account`, which
/// the program's `init` constraint calls.
const SYSTEM_ACCOUNT_ALREADY_IN_USE: u32 = 0;
const SYSTEM_RESULT_WITH_NEGATIVE_LAMPORTS: u32 = 1;

/// A ledger reached through a cluster RPC node.
pub struct RpcLedger {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcLedger {
    /// Connects to `url` reading at `confirmed` commitment.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_commitment(url, CommitmentConfig::confirmed())
    }

    pub fn with_commitment(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self::from_client(RpcClient::new_with_commitment(url.into(), commitment), commitment)
    }

    /// Wraps an already configured client.
    pub fn from_client(client: RpcClient, commitment: CommitmentConfig) -> Self {
        Self { client, commitment }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger")
            .field("url", &self.client.url())
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn latest_blockhash(&self) -> Result<Hash> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(map_rpc_error)
    }

    async fn submit(&self, submission: SignedSubmission) -> Result<SubmissionHandle> {
        let handle = submission.handle().ok_or_else(|| ClientError::SubmissionRejected {
            reason: "submission carries no signatures".to_owned(),
            code: Some("SignatureFailure".to_owned()),
        })?;

        let transaction = Transaction {
            signatures: submission
                .signatures
                .iter()
                .map(|signature| RpcSignature::from(signature.to_bytes()))
                .collect(),
            message: submission.message,
        };
        let signature = self
            .client
            .send_transaction(&transaction)
            .await
            .map_err(map_rpc_error)?;

        tracing::debug!(handle = %handle, signature = %signature, "transaction sent");
        Ok(handle)
    }

    async fn submission_status(&self, handle: &SubmissionHandle) -> Result<SubmissionStatus> {
        let signature = RpcSignature::from(*handle.as_bytes());
        let statuses = self
            .client
            .get_signature_statuses(&[signature])
            .await
            .map_err(map_rpc_error)?
            .value;

        // Unknown to the node yet: still in flight.
        Ok(match statuses.into_iter().next().flatten() {
            Some(status) => status_from(&status),
            None => SubmissionStatus::Pending,
        })
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<LedgerAccount>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(map_rpc_error)?;

        Ok(response.value.map(|account| LedgerAccount {
            lamports: account.lamports,
            owner: account.owner,
            data: account.data,
        }))
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        constraints: &[Constraint],
    ) -> Result<Vec<(Pubkey, LedgerAccount)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(constraints.iter().map(to_filter).collect()),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await
            .map_err(map_rpc_error)?;

        Ok(accounts
            .into_iter()
            .map(|(address, account)| {
                (
                    address,
                    LedgerAccount {
                        lamports: account.lamports,
                        owner: account.owner,
                        data: account.data,
                    },
                )
            })
            .collect())
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<SubmissionHandle> {
        let signature = self
            .client
            .request_airdrop(address, lamports)
            .await
            .map_err(map_rpc_error)?;
        Ok(handle_from(&signature))
    }
}

fn handle_from(signature: &RpcSignature) -> SubmissionHandle {
    let mut bytes = [0u8; 64];
    bytes.copy_from_slice(signature.as_ref());
    SubmissionHandle::from_bytes(bytes)
}

fn to_filter(constraint: &Constraint) -> RpcFilterType {
    RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
        constraint.offset,
        constraint.bytes.clone(),
    ))
}

fn status_from(status: &TransactionStatus) -> SubmissionStatus {
    if let Some(err) = &status.err {
        return SubmissionStatus::Rejected(rejection_from(err));
    }
    let slot = status.slot;
    match &status.confirmation_status {
        Some(TransactionConfirmationStatus::Finalized) => SubmissionStatus::Finalized { slot },
        Some(TransactionConfirmationStatus::Confirmed) => SubmissionStatus::Confirmed { slot },
        Some(TransactionConfirmationStatus::Processed) => SubmissionStatus::Pending,
        // Nodes that predate confirmation_status report rooted as no count.
        None if status.confirmations.is_none() => SubmissionStatus::Finalized { slot },
        None => SubmissionStatus::Pending,
    }
}

fn rejection_from(err: &TransactionError) -> Rejection {
    if let TransactionError::InstructionError(_, InstructionError::Custom(code)) = err {
        if let Some(program_error) = program_error(*code) {
            return Rejection::new(program_error.name(), program_error.to_string());
        }
        match *code {
            SYSTEM_ACCOUNT_ALREADY_IN_USE => {
                return Rejection::new("AccountInUse", err.to_string());
            }
            SYSTEM_RESULT_WITH_NEGATIVE_LAMPORTS => {
                return Rejection::new("InsufficientFunds", err.to_string());
            }
            _ => {}
        }
    }
    Rejection::new(variant_name(err), err.to_string())
}

fn program_error(code: u32) -> Option<TwitterError> {
    [
        TwitterError::TopicTooLong,
        TwitterError::ContentTooLong,
        TwitterError::ContentEmpty,
    ]
    .into_iter()
    .find(|e| u32::from(*e) == code)
}

/// `InsufficientFundsForFee`, `BlockhashNotFound`, ...
fn variant_name(err: &TransactionError) -> String {
    let debug = format!("{err:?}");
    debug
        .split(|c: char| c == '(' || c == ' ' || c == '{')
        .next()
        .unwrap_or_default()
        .to_owned()
}

fn map_rpc_error(err: RpcClientError) -> ClientError {
    if let Some(tx_err) = err.get_transaction_error() {
        let rejection = rejection_from(&tx_err);
        return ClientError::SubmissionRejected {
            reason: rejection.reason,
            code: rejection.code,
        };
    }
    match err.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => ClientError::Transport {
            message: err.to_string(),
        },
        _ => ClientError::Rpc {
            message: err.to_string(),
        },
    }
}
