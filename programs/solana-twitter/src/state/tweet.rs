use anchor_lang::prelude::*;

use crate::errors::TwitterError;

/// Maximum topic length, in characters.
pub const MAX_TOPIC_CHARS: usize = 50;
/// Maximum content length, in characters.
pub const MAX_CONTENT_CHARS: usize = 280;

/// Upper bound on the UTF-8 width of a single character.
const MAX_BYTES_PER_CHAR: usize = 4;

/// A single immutable tweet.
/// Created once by `send_tweet`, never updated or closed.
#[account]
pub struct Tweet {
    /// The wallet that signed the tweet
    pub author: Pubkey,
    /// Cluster clock at the time the tweet was committed
    pub timestamp: i64,
    /// Optional topic, may be empty
    pub topic: String,
    /// Tweet body
    pub content: String,
}

impl Tweet {
    pub const DISCRIMINATOR_LENGTH: usize = 8;
    pub const PUBLIC_KEY_LENGTH: usize = 32;
    pub const TIMESTAMP_LENGTH: usize = 8;
    pub const STRING_LENGTH_PREFIX: usize = 4;

    pub const LEN: usize = Self::DISCRIMINATOR_LENGTH
        + Self::PUBLIC_KEY_LENGTH                                       // author
        + Self::TIMESTAMP_LENGTH                                        // timestamp
        + Self::STRING_LENGTH_PREFIX + MAX_TOPIC_CHARS * MAX_BYTES_PER_CHAR // topic
        + Self::STRING_LENGTH_PREFIX + MAX_CONTENT_CHARS * MAX_BYTES_PER_CHAR; // content
    // Total: 1376 bytes

    /// Check the user-supplied fields against the on-chain limits.
    ///
    /// Limits count characters, not bytes; `LEN` reserves the worst-case
    /// width for every character so any accepted string fits.
    pub fn validate(topic: &str, content: &str) -> std::result::Result<(), TwitterError> {
        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(TwitterError::TopicTooLong);
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(TwitterError::ContentTooLong);
        }
        if content.is_empty() {
            return Err(TwitterError::ContentEmpty);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::solana_program::hash::hash;
    use anchor_lang::Discriminator;

    fn sample(topic: &str, content: &str) -> Tweet {
        Tweet {
            author: Pubkey::new_from_array([7u8; 32]),
            timestamp: 1_650_000_000,
            topic: topic.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_len_covers_both_prefixes() {
        assert_eq!(Tweet::LEN, 8 + 32 + 8 + 4 + 200 + 4 + 1120);
    }

    #[test]
    fn test_discriminator_is_anchor_account_hash() {
        let expected = &hash(b"account:Tweet").to_bytes()[..8];
        assert_eq!(&Tweet::DISCRIMINATOR[..], expected);
    }

    #[test]
    fn test_serialized_layout() {
        let tweet = sample("veganism", "I eat plants");
        let mut data = Vec::new();
        tweet.try_serialize(&mut data).unwrap();

        assert_eq!(&data[..8], &Tweet::DISCRIMINATOR[..]);
        assert_eq!(&data[8..40], tweet.author.as_ref());
        assert_eq!(&data[40..48], &1_650_000_000i64.to_le_bytes());
        assert_eq!(&data[48..52], &8u32.to_le_bytes());
        assert_eq!(&data[52..60], b"veganism");
        assert_eq!(&data[60..64], &12u32.to_le_bytes());
        assert_eq!(&data[64..], b"I eat plants");
    }

    #[test]
    fn test_worst_case_fits_len() {
        // 4-byte characters at both limits
        let topic = "\u{1F600}".repeat(MAX_TOPIC_CHARS);
        let content = "\u{1F600}".repeat(MAX_CONTENT_CHARS);
        assert!(Tweet::validate(&topic, &content).is_ok());

        let mut data = Vec::new();
        sample(&topic, &content).try_serialize(&mut data).unwrap();
        assert_eq!(data.len(), Tweet::LEN);
    }

    #[test]
    fn test_validate_limits() {
        let topic_51 = "x".repeat(51);
        let content_281 = "x".repeat(281);

        assert!(Tweet::validate("", "I eat meat").is_ok());
        assert!(Tweet::validate(&"x".repeat(50), &"x".repeat(280)).is_ok());
        assert!(matches!(
            Tweet::validate(&topic_51, "I eat meat"),
            Err(TwitterError::TopicTooLong)
        ));
        assert!(matches!(
            Tweet::validate("hello", &content_281),
            Err(TwitterError::ContentTooLong)
        ));
        assert!(matches!(
            Tweet::validate("hello", ""),
            Err(TwitterError::ContentEmpty)
        ));
    }

    #[test]
    fn test_whitespace_content_is_not_empty() {
        assert!(Tweet::validate("", " ").is_ok());
        assert!(Tweet::validate("", "\n\t").is_ok());
    }

    #[test]
    fn test_limits_count_characters() {
        // 50 two-byte characters is 100 bytes but still within the limit
        let topic = "é".repeat(50);
        assert_eq!(topic.len(), 100);
        assert!(Tweet::validate(&topic, "bonjour").is_ok());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TwitterError::TopicTooLong.to_string(),
            "The provided topic should be 50 characters long maximum"
        );
        assert_eq!(
            TwitterError::ContentTooLong.to_string(),
            "The provided content should be 280 characters long maximum"
        );
    }
}
