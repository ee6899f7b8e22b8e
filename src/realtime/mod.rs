//! Realtime event dispatch and client synchronization.
//!
//! The dispatcher pushes committed-transition events to per-user channels;
//! the sync layer consumes them on the client side, re-deriving local view
//! state and resolving races between optimistic local updates and
//! server-confirmed truth.

pub mod config;
pub mod dispatcher;
pub mod sync;

pub use config::SyncConfig;
pub use dispatcher::EventDispatcher;

#[cfg(test)]
mod tests;
