//! Orchestration services for the marketplace context.

mod engine;

pub use engine::{
    Assignment, Cancellation, EngineError, EngineResult, PlaceBidRequest, PostTaskRequest,
    TransitionEngine,
};
