pub mod publisher;
pub mod worker;

#[cfg(test)]
pub(crate) mod scripted;
