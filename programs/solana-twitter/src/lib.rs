use anchor_lang::prelude::*;

pub mod errors;
pub mod instructions;
pub mod state;

use instructions::*;

declare_id!("DztaazG8QVrABwRoC4kgCJfaPZmmCu711Ms3uCuaKNcR");

#[program]
pub mod solana_twitter {
    use super::*;

    /// Create a new tweet account owned by the program, stamped with the cluster clock
    pub fn send_tweet(ctx: Context<SendTweet>, topic: String, content: String) -> Result<()> {
        instructions::send_tweet::handler(ctx, topic, content)
    }
}
