//! Task and bid lifecycle management for the marketplace.
//!
//! This context owns the task/bid state machines, the transition engine
//! that guards them, the domain events describing committed transitions,
//! and the storage contracts the engine commits through. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
