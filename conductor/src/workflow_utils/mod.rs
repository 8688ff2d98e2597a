//! Workflow utilities shared by every runner
//!
//! - **batch**: Bounded, order-preserving concurrent execution
//! - **step**: Step execution with timing and lifecycle events

pub mod batch;
pub mod step;

pub use batch::{execute_batch, TaskContext};
pub use step::execute_step_logged;
