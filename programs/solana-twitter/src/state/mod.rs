pub mod tweet;

pub use tweet::*;
