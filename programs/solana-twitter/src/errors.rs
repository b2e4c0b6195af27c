use anchor_lang::prelude::*;

#[error_code]
pub enum TwitterError {
    #[msg("The provided topic should be 50 characters long maximum")]
    TopicTooLong,
    #[msg("The provided content should be 280 characters long maximum")]
    ContentTooLong,
    #[msg("The provided content should not be empty")]
    ContentEmpty,
}
