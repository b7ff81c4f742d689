pub mod composer;
pub mod conversations;
pub mod embedder;
pub mod escalation;
pub mod messages;
pub mod rate_limit;
pub mod reindex;
pub mod retrieve;

#[cfg(test)]
pub(crate) mod testing;
