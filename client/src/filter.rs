//! Server-side byte filters.
//!
//! A [`Constraint`] asks the ledger to return only accounts whose raw data
//! holds `bytes` at `offset`. A [`Filter`] is the conjunction of its
//! constraints; there is no OR, negation or range matching. Anything richer
//! has to fetch a superset and filter after decoding.
//!
//! Offsets come from [`codec::field_offset`], so a schema change moves the
//! filters with it. Only fields at fixed offsets can be filtered: the content
//! starts wherever the topic ends.

use solana_program::pubkey::Pubkey;

use crate::codec::{self, Field};

/// Equality test on a byte range of raw account data.
///
/// The constraint is not checked against the layout. A caller building one
/// by hand is responsible for picking a meaningful offset and length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub offset: usize,
    pub bytes: Vec<u8>,
}

impl Constraint {
    pub fn new(offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            bytes: bytes.into(),
        }
    }

    /// True if `data` holds `bytes` at `offset`. Data too short to contain
    /// the range never matches.
    pub fn matches(&self, data: &[u8]) -> bool {
        let Some(end) = self.offset.checked_add(self.bytes.len()) else {
            return false;
        };
        data.get(self.offset..end) == Some(self.bytes.as_slice())
    }
}

/// AND-composed set of constraints. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    constraints: Vec<Constraint>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tweets written by `author`.
    pub fn by_author(author: &Pubkey) -> Self {
        Self::new().and_author(author)
    }

    /// Tweets whose topic is exactly `topic`.
    pub fn by_topic(topic: &str) -> Self {
        Self::new().and_topic(topic)
    }

    #[must_use]
    pub fn and_author(self, author: &Pubkey) -> Self {
        self.and(Constraint::new(fixed(Field::Author), author.to_bytes()))
    }

    /// Matches the topic body at its fixed offset, plus the length prefix so
    /// a topic that merely starts with `topic` is not a match.
    #[must_use]
    pub fn and_topic(self, topic: &str) -> Self {
        let len = (topic.len() as u32).to_le_bytes();
        self.and(Constraint::new(fixed(Field::TopicLength), len))
            .and(Constraint::new(fixed(Field::Topic), topic.as_bytes()))
    }

    /// Restricts results to tweet accounts.
    #[must_use]
    pub fn and_discriminator(self) -> Self {
        self.and(Constraint::new(fixed(Field::Discriminator), codec::discriminator()))
    }

    #[must_use]
    pub fn and(mut self, constraint: Constraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Evaluates the filter the way the ledger does.
    pub fn matches(&self, data: &[u8]) -> bool {
        self.constraints.iter().all(|c| c.matches(data))
    }
}

fn fixed(field: Field) -> usize {
    match codec::field_offset(field).fixed() {
        Some(offset) => offset,
        None => unreachable!("{field:?} has no fixed offset"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(author: &Pubkey, topic: &str, content: &str) -> Vec<u8> {
        codec::encode(author, topic, content).unwrap()
    }

    #[test]
    fn test_by_author_constraint() {
        let author = Pubkey::new_unique();
        let filter = Filter::by_author(&author);
        assert_eq!(
            filter.constraints(),
            &[Constraint::new(8, author.to_bytes())]
        );
    }

    #[test]
    fn test_by_topic_constraints() {
        let filter = Filter::by_topic("non_vegetarian");
        assert_eq!(
            filter.constraints(),
            &[
                Constraint::new(48, 14u32.to_le_bytes()),
                Constraint::new(52, b"non_vegetarian".to_vec()),
            ]
        );
    }

    #[test]
    fn test_author_filter_matches() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let filter = Filter::by_author(&alice);

        assert!(filter.matches(&tweet(&alice, "", "hi")));
        assert!(!filter.matches(&tweet(&bob, "", "hi")));
    }

    #[test]
    fn test_topic_filter_is_exact() {
        let author = Pubkey::new_unique();
        let filter = Filter::by_topic("veg");

        assert!(filter.matches(&tweet(&author, "veg", "salad")));
        assert!(!filter.matches(&tweet(&author, "vegan", "salad")));
        assert!(!filter.matches(&tweet(&author, "ve", "salad")));
        assert!(!filter.matches(&tweet(&author, "", "salad")));
    }

    #[test]
    fn test_empty_topic_filter() {
        let author = Pubkey::new_unique();
        let filter = Filter::by_topic("");

        assert!(filter.matches(&tweet(&author, "", "no topic")));
        assert!(!filter.matches(&tweet(&author, "rust", "topic")));
    }

    #[test]
    fn test_conjunction() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let filter = Filter::by_author(&alice).and_topic("rust");

        assert!(filter.matches(&tweet(&alice, "rust", "ownership")));
        assert!(!filter.matches(&tweet(&alice, "solana", "ownership")));
        assert!(!filter.matches(&tweet(&bob, "rust", "ownership")));
    }

    #[test]
    fn test_discriminator_filter() {
        let author = Pubkey::new_unique();
        let filter = Filter::new().and_discriminator();

        let mut data = tweet(&author, "", "hi");
        assert!(filter.matches(&data));
        data[3] ^= 1;
        assert!(!filter.matches(&data));
    }

    #[test]
    fn test_short_data_never_matches() {
        let constraint = Constraint::new(8, vec![1u8; 32]);
        assert!(!constraint.matches(&[1u8; 20]));
        assert!(!Constraint::new(usize::MAX, vec![1u8]).matches(&[1u8; 4]));
    }

    #[test]
    fn test_duplicate_constraints_collapse() {
        let author = Pubkey::new_unique();
        let filter = Filter::by_author(&author).and_author(&author);
        assert_eq!(filter.constraints().len(), 1);
        assert!(Filter::new().is_empty());
        assert!(Filter::new().matches(b"anything"));
    }
}
