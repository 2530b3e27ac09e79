//! Workflow orchestration engine.
//!
//! ```text
//! Orchestrator ──► Dispatcher ──► ToolExecutor ─────► ToolAdapter
//!      │               │      ├─► ParallelExecutor ─► Dispatcher (per branch)
//!      │               │      ├─► MergeExecutor
//!      │               │      └─► VoteExecutor
//!      │               ▼
//!      └──────────► Context ◄── Envelope per step
//! ```
//!
//! The orchestrator walks a bundle's steps in order. Each step's envelope is
//! recorded in the run [`Context`], where later steps reach it through
//! `${steps.<name>...}` templates.

pub mod condition;
pub mod context;
pub mod dispatcher;
pub mod executor;
pub mod orchestrator;
pub mod run_log;

pub use context::Context;
pub use dispatcher::Dispatcher;
pub use orchestrator::{Orchestrator, RunReport, RunState};
pub use run_log::RunLogger;
