//! High-level facade over the ledger: create tweets and query them back.

use std::sync::Arc;

use solana_program::pubkey::Pubkey;
use tracing::{debug, info};

use crate::codec::{self, Tweet};
use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{ClientError, Result};
use crate::filter::Filter;
use crate::keypair::Signer;
use crate::ledger::{Ledger, SubmissionStatus};
use crate::retry::with_retry;
use crate::transaction::{await_confirmation, TweetDraft};

/// Client for the twitter program.
///
/// Cheap to clone; clones share the ledger connection and wallet.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use solana_twitter_client::mock::InMemoryLedger;
/// use solana_twitter_client::{ClientConfig, Filter, Keypair, Signer, TwitterClient};
///
/// # async fn example() -> solana_twitter_client::Result<()> {
/// let ledger = InMemoryLedger::new();
/// let wallet = Keypair::generate();
/// ledger.fund(&wallet.pubkey(), 1_000_000_000);
/// let client = TwitterClient::new(Arc::new(ledger), Arc::new(wallet), ClientConfig::default());
///
/// client.create("veganism", "Yay Tofu!").await?;
/// let tweets = client.fetch_all(&Filter::by_topic("veganism")).await?;
/// assert_eq!(tweets.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TwitterClient {
    ledger: Arc<dyn Ledger>,
    wallet: Arc<dyn Signer>,
    config: ClientConfig,
}

impl std::fmt::Debug for TwitterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterClient")
            .field("wallet", &self.wallet.pubkey())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TwitterClient {
    pub fn new(ledger: Arc<dyn Ledger>, wallet: Arc<dyn Signer>, config: ClientConfig) -> Self {
        Self {
            ledger,
            wallet,
            config,
        }
    }

    /// The default author and fee payer.
    pub fn wallet(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Publishes a tweet authored by the client's wallet.
    ///
    /// Returns once the configured commitment is reached and the record has
    /// been read back.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Validation`] or [`ClientError::EmptyContent`] before
    ///   anything is sent
    /// - [`ClientError::SubmissionRejected`] if the ledger or program refuses it
    /// - [`ClientError::Timeout`] if confirmation takes too long; the tweet may
    ///   still land, look it up by identity
    pub async fn create(&self, topic: &str, content: &str) -> Result<Tweet> {
        self.create_as(self.wallet.as_ref(), topic, content).await
    }

    /// Publishes a tweet authored, and paid for, by `author`.
    #[tracing::instrument(skip_all, fields(author = %author.pubkey()))]
    pub async fn create_as(&self, author: &dyn Signer, topic: &str, content: &str) -> Result<Tweet> {
        let draft = TweetDraft::new(author.pubkey(), topic, content);
        let identity = draft.identity();
        let validated = draft.validate(&self.config.program_id)?;

        let ledger = self.ledger.as_ref();
        let blockhash = with_retry(&self.config.retry_policy, move || ledger.latest_blockhash()).await?;

        let pending = validated.sign(blockhash, &[author])?.submit(ledger).await?;
        let finalized = pending
            .confirm(ledger, &self.config.confirm_options())
            .await?;
        let tweet = finalized
            .fetch(ledger, &self.config.program_id, &self.config.retry_policy)
            .await?;

        info!(identity = %identity, topic = %tweet.record.topic, "tweet published");
        Ok(tweet)
    }

    /// Reads a single tweet by identity.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] if nothing is stored there,
    /// [`ClientError::WrongOwner`] if the account does not belong to the
    /// program, [`ClientError::Decode`] if its bytes are not a tweet.
    pub async fn fetch_one(&self, identity: &Pubkey) -> Result<Tweet> {
        load_tweet(
            self.ledger.as_ref(),
            &self.config.program_id,
            identity,
            &self.config.retry_policy,
        )
        .await
    }

    /// Reads every tweet matching `filter`, in no particular order.
    ///
    /// The account discriminator is always added to the filter, so other
    /// account types owned by the program never match. An account that
    /// passes the filter but fails to decode fails the whole query.
    pub async fn fetch_all(&self, filter: &Filter) -> Result<Vec<Tweet>> {
        let filter = filter.clone().and_discriminator();
        let ledger = self.ledger.as_ref();
        let program_id = &self.config.program_id;
        let constraints = filter.constraints();

        let accounts = with_retry(&self.config.retry_policy, move || {
            ledger.get_program_accounts(program_id, constraints)
        })
        .await?;
        debug!(matched = accounts.len(), constraints = constraints.len(), "program accounts fetched");

        accounts
            .into_iter()
            .map(|(identity, account)| {
                let record = codec::decode(&account.data)
                    .map_err(|source| ClientError::Decode { identity, source })?;
                Ok(Tweet { identity, record })
            })
            .collect()
    }

    pub async fn fetch_by_author(&self, author: &Pubkey) -> Result<Vec<Tweet>> {
        self.fetch_all(&Filter::by_author(author)).await
    }

    /// Exact topic match; `"veg"` does not match `"veganism"`.
    pub async fn fetch_by_topic(&self, topic: &str) -> Result<Vec<Tweet>> {
        self.fetch_all(&Filter::by_topic(topic)).await
    }

    /// Requests `lamports` for `address` and waits for the credit to commit.
    pub async fn airdrop(&self, address: &Pubkey, lamports: u64) -> Result<SubmissionStatus> {
        let handle = self.ledger.request_airdrop(address, lamports).await?;
        debug!(address = %address, lamports, handle = %handle, "airdrop requested");
        await_confirmation(self.ledger.as_ref(), &handle, &self.config.confirm_options()).await
    }
}

/// Reads and decodes the tweet stored at `identity`.
pub(crate) async fn load_tweet(
    ledger: &dyn Ledger,
    program_id: &Pubkey,
    identity: &Pubkey,
    policy: &RetryPolicy,
) -> Result<Tweet> {
    let account = with_retry(policy, move || ledger.get_account(identity))
        .await?
        .ok_or(ClientError::NotFound {
            identity: *identity,
        })?;

    if account.owner != *program_id {
        return Err(ClientError::WrongOwner {
            identity: *identity,
            owner: account.owner,
        });
    }

    let record = codec::decode(&account.data).map_err(|source| ClientError::Decode {
        identity: *identity,
        source,
    })?;
    Ok(Tweet {
        identity: *identity,
        record,
    })
}

/// Orders tweets newest first. Ties on timestamp are broken by identity so
/// the order is deterministic.
pub fn sort_newest_first(tweets: &mut [Tweet]) {
    tweets.sort_by(|a, b| {
        b.record
            .timestamp
            .cmp(&a.record.timestamp)
            .then_with(|| a.identity.cmp(&b.identity))
    });
}
