//! Binary layout of a tweet account.
//!
//! ```text
//! offset  size  field
//! 0       8     discriminator
//! 8       32    author
//! 40      8     timestamp (i64 LE)
//! 48      4     topic length (u32 LE)
//! 52      T     topic (UTF-8)
//! 52+T    4     content length (u32 LE)
//! 56+T    C     content (UTF-8)
//! ```
//!
//! Everything up to the topic body sits at a fixed offset. The content fields
//! follow the topic, so their offsets depend on the topic's byte length.
//! Stored accounts are zero-padded to the program's fixed account size;
//! trailing bytes after the content are ignored on decode.

use anchor_lang::Discriminator;
use solana_program::pubkey::Pubkey;
use solana_twitter::state::{Tweet as TweetAccount, MAX_CONTENT_CHARS, MAX_TOPIC_CHARS};

use crate::error::{ClientError, DecodeError, LimitedField, ValidationError};

const DISCRIMINATOR_LEN: usize = TweetAccount::DISCRIMINATOR_LENGTH;
const AUTHOR_LEN: usize = TweetAccount::PUBLIC_KEY_LENGTH;
const TIMESTAMP_LEN: usize = TweetAccount::TIMESTAMP_LENGTH;
const PREFIX_LEN: usize = TweetAccount::STRING_LENGTH_PREFIX;

const AUTHOR_OFFSET: usize = DISCRIMINATOR_LEN;
const TIMESTAMP_OFFSET: usize = AUTHOR_OFFSET + AUTHOR_LEN;
const TOPIC_LEN_OFFSET: usize = TIMESTAMP_OFFSET + TIMESTAMP_LEN;
const TOPIC_OFFSET: usize = TOPIC_LEN_OFFSET + PREFIX_LEN;

/// Schema tag of a tweet account.
pub fn discriminator() -> [u8; 8] {
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&TweetAccount::DISCRIMINATOR[..]);
    tag
}

/// A decoded tweet account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetRecord {
    pub author: Pubkey,
    /// Seconds since the Unix epoch, assigned by the ledger at commit.
    pub timestamp: i64,
    pub topic: String,
    pub content: String,
}

/// A record together with the identity it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tweet {
    pub identity: Pubkey,
    pub record: TweetRecord,
}

/// Addressable fields of the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Discriminator,
    Author,
    Timestamp,
    TopicLength,
    Topic,
    ContentLength,
    Content,
}

/// Where a field starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOffset {
    /// Same for every record.
    Fixed(usize),
    /// `base` plus the byte length of the record's topic.
    AfterTopic { base: usize },
}

impl FieldOffset {
    /// Returns the offset if it does not depend on the record.
    #[must_use]
    pub fn fixed(self) -> Option<usize> {
        match self {
            FieldOffset::Fixed(offset) => Some(offset),
            FieldOffset::AfterTopic { .. } => None,
        }
    }

    /// Resolves the offset for a record whose topic is `topic_byte_len` bytes.
    #[must_use]
    pub fn resolve(self, topic_byte_len: usize) -> usize {
        match self {
            FieldOffset::Fixed(offset) => offset,
            FieldOffset::AfterTopic { base } => base + topic_byte_len,
        }
    }
}

/// Byte offset of `field` in an encoded tweet.
pub fn field_offset(field: Field) -> FieldOffset {
    match field {
        Field::Discriminator => FieldOffset::Fixed(0),
        Field::Author => FieldOffset::Fixed(AUTHOR_OFFSET),
        Field::Timestamp => FieldOffset::Fixed(TIMESTAMP_OFFSET),
        Field::TopicLength => FieldOffset::Fixed(TOPIC_LEN_OFFSET),
        Field::Topic => FieldOffset::Fixed(TOPIC_OFFSET),
        Field::ContentLength => FieldOffset::AfterTopic { base: TOPIC_OFFSET },
        Field::Content => FieldOffset::AfterTopic {
            base: TOPIC_OFFSET + PREFIX_LEN,
        },
    }
}

/// Checks topic and content against the program's length limits.
///
/// Lengths are counted in characters, the same unit the program uses, so the
/// client never accepts a tweet the ledger would refuse for length (or the
/// other way round) on multi-byte input.
pub fn check_limits(topic: &str, content: &str) -> Result<(), ValidationError> {
    let topic_chars = topic.chars().count();
    if topic_chars > MAX_TOPIC_CHARS {
        return Err(ValidationError {
            field: LimitedField::Topic,
            limit: MAX_TOPIC_CHARS,
            actual: topic_chars,
        });
    }

    let content_chars = content.chars().count();
    if content_chars > MAX_CONTENT_CHARS {
        return Err(ValidationError {
            field: LimitedField::Content,
            limit: MAX_CONTENT_CHARS,
            actual: content_chars,
        });
    }

    Ok(())
}

/// Encodes a new tweet with a zero timestamp; the ledger stamps the real one.
pub fn encode(author: &Pubkey, topic: &str, content: &str) -> Result<Vec<u8>, ClientError> {
    check_limits(topic, content)?;

    let mut buf =
        Vec::with_capacity(TOPIC_OFFSET + topic.len() + PREFIX_LEN + content.len());
    buf.extend_from_slice(&discriminator());
    buf.extend_from_slice(author.as_ref());
    buf.extend_from_slice(&0i64.to_le_bytes());
    put_string(&mut buf, topic);
    put_string(&mut buf, content);
    Ok(buf)
}

fn put_string(buf: &mut Vec<u8>, value: &str) {
    // check_limits bounds the length far below u32::MAX
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Decodes raw account bytes.
pub fn decode(data: &[u8]) -> Result<TweetRecord, DecodeError> {
    let mut reader = Reader { data, pos: 0 };

    let tag = reader.take("discriminator", DISCRIMINATOR_LEN)?;
    let expected = discriminator();
    if tag != expected {
        let mut found = [0u8; 8];
        found.copy_from_slice(tag);
        return Err(DecodeError::BadDiscriminator { expected, found });
    }

    let mut key = [0u8; AUTHOR_LEN];
    key.copy_from_slice(reader.take("author", AUTHOR_LEN)?);
    let author = Pubkey::new_from_array(key);

    let mut ts = [0u8; TIMESTAMP_LEN];
    ts.copy_from_slice(reader.take("timestamp", TIMESTAMP_LEN)?);
    let timestamp = i64::from_le_bytes(ts);

    let topic = reader.string("topic")?;
    let content = reader.string("content")?;

    Ok(TweetRecord {
        author,
        timestamp,
        topic,
        content,
    })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                field,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let mut prefix = [0u8; PREFIX_LEN];
        prefix.copy_from_slice(self.take(field, PREFIX_LEN)?);
        let len = u32::from_le_bytes(prefix) as usize;

        let body = self.take(field, len)?;
        std::str::from_utf8(body)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::AccountSerialize;
    use proptest::prelude::*;

    fn author() -> Pubkey {
        Pubkey::new_from_array([3u8; 32])
    }

    #[test]
    fn test_offsets() {
        assert_eq!(field_offset(Field::Discriminator), FieldOffset::Fixed(0));
        assert_eq!(field_offset(Field::Author), FieldOffset::Fixed(8));
        assert_eq!(field_offset(Field::Timestamp), FieldOffset::Fixed(40));
        assert_eq!(field_offset(Field::TopicLength), FieldOffset::Fixed(48));
        assert_eq!(field_offset(Field::Topic), FieldOffset::Fixed(52));
        assert_eq!(field_offset(Field::ContentLength).fixed(), None);
        assert_eq!(field_offset(Field::ContentLength).resolve(14), 66);
        assert_eq!(field_offset(Field::Content).resolve(0), 56);
        assert_eq!(field_offset(Field::Content).resolve(14), 70);
    }

    #[test]
    fn test_encode_layout_matches_offsets() {
        let data = encode(&author(), "non_vegetarian", "I eat meat").unwrap();

        assert_eq!(&data[..8], &discriminator());
        assert_eq!(&data[8..40], author().as_ref());
        assert_eq!(&data[40..48], &[0u8; 8]);
        assert_eq!(&data[48..52], &14u32.to_le_bytes());
        assert_eq!(&data[52..66], b"non_vegetarian");

        let content_len_at = field_offset(Field::ContentLength).resolve(14);
        let content_at = field_offset(Field::Content).resolve(14);
        assert_eq!(&data[content_len_at..content_at], &10u32.to_le_bytes());
        assert_eq!(&data[content_at..], b"I eat meat");
    }

    #[test]
    fn test_encode_matches_program_serialization() {
        let account = TweetAccount {
            author: author(),
            timestamp: 0,
            topic: "veganism".to_owned(),
            content: "Always use Rust".to_owned(),
        };
        let mut expected = Vec::new();
        account.try_serialize(&mut expected).unwrap();

        let encoded = encode(&author(), "veganism", "Always use Rust").unwrap();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_decode_ignores_account_padding() {
        let mut data = encode(&author(), "", "I eat meat").unwrap();
        data.resize(TweetAccount::LEN, 0);

        let record = decode(&data).unwrap();
        assert_eq!(record.topic, "");
        assert_eq!(record.content, "I eat meat");
    }

    #[test]
    fn test_empty_topic_round_trips_as_empty_string() {
        let record = decode(&encode(&author(), "", "I eat meat").unwrap()).unwrap();
        assert_eq!(record.topic, String::new());
    }

    #[test]
    fn test_encode_rejects_long_fields() {
        let err = encode(&author(), &"x".repeat(51), "I eat meat").unwrap_err();
        assert_eq!(
            err.to_string(),
            "The provided topic should be 50 characters long maximum"
        );

        let err = encode(&author(), "hello", &"x".repeat(281)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The provided content should be 280 characters long maximum"
        );
    }

    #[test]
    fn test_limits_count_characters_not_bytes() {
        // 50 characters, 150 bytes
        let topic = "\u{20AC}".repeat(50);
        assert!(check_limits(&topic, "ok").is_ok());

        let err = check_limits(&"\u{20AC}".repeat(51), "ok").unwrap_err();
        assert_eq!(err.field, LimitedField::Topic);
        assert_eq!(err.actual, 51);
    }

    #[test]
    fn test_decode_bad_discriminator() {
        let mut data = encode(&author(), "t", "c").unwrap();
        data[0] ^= 0xff;
        assert!(matches!(
            decode(&data),
            Err(DecodeError::BadDiscriminator { .. })
        ));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            decode(&[]),
            Err(DecodeError::Truncated {
                field: "discriminator",
                ..
            })
        ));

        let data = encode(&author(), "topic", "content").unwrap();
        assert!(matches!(
            decode(&data[..30]),
            Err(DecodeError::Truncated { field: "author", .. })
        ));

        // Length prefix claims more than the buffer holds
        let mut data = encode(&author(), "topic", "content").unwrap();
        data[48..52].copy_from_slice(&1000u32.to_le_bytes());
        assert_eq!(
            decode(&data),
            Err(DecodeError::Truncated {
                field: "topic",
                needed: 1000,
                remaining: data.len() - 52,
            })
        );
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let mut data = encode(&author(), "ab", "content").unwrap();
        data[52] = 0xff;
        assert_eq!(
            decode(&data),
            Err(DecodeError::InvalidUtf8 { field: "topic" })
        );
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            key in any::<[u8; 32]>(),
            topic in "\\PC{0,50}",
            content in "\\PC{1,280}",
        ) {
            let author = Pubkey::new_from_array(key);
            let record = decode(&encode(&author, &topic, &content).unwrap()).unwrap();
            prop_assert_eq!(record.author, author);
            prop_assert_eq!(record.timestamp, 0);
            prop_assert_eq!(record.topic, topic);
            prop_assert_eq!(record.content, content);
        }
    }
}
