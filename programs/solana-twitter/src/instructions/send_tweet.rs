use anchor_lang::prelude::*;

use crate::state::Tweet;

#[derive(Accounts)]
pub struct SendTweet<'info> {
    // Fresh keypair generated by the client; it co-signs its own creation.
    #[account(init, payer = author, space = Tweet::LEN)]
    pub tweet: Account<'info, Tweet>,

    #[account(mut)]
    pub author: Signer<'info>,

    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<SendTweet>, topic: String, content: String) -> Result<()> {
    Tweet::validate(&topic, &content)?;

    let tweet = &mut ctx.accounts.tweet;
    let clock = Clock::get()?;

    tweet.author = ctx.accounts.author.key();
    tweet.timestamp = clock.unix_timestamp;
    tweet.topic = topic;
    tweet.content = content;

    msg!(
        "TWITTER: Tweet {} sent by {} at {}",
        tweet.key(),
        tweet.author,
        tweet.timestamp
    );

    Ok(())
}
