//! Client core: the collection store, the edit session, and the seams between them.

pub mod composer;
pub mod error;
pub mod gateway;
mod lock;
pub mod refresh;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
