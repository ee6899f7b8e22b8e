//! Mandi: local-services marketplace domain core.
//!
//! This crate implements the task lifecycle and bid state machine of a
//! marketplace connecting customers (task posters) with taskers (bidders),
//! together with the realtime layer that keeps concurrent viewers
//! consistent with server state.
//!
//! # Architecture
//!
//! Mandi follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, channels)
//!
//! # Modules
//!
//! - [`marketplace`]: Task/bid domain model, transition engine, storage
//! - [`realtime`]: Event dispatch and client-side synchronization

pub mod marketplace;
pub mod realtime;
