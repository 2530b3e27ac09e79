pub mod bundle;
pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod loader;
pub mod traits;
pub mod types;

pub use bundle::{
    Bundle, Conditional, InputDef, MergeDef, MergeStrategy, Step, StepKind, ToolStep, VoteDef,
    VoteStrategy,
};
pub use config::{AppConfig, EngineConfig, ToolConfig};
pub use envelope::{value_text, Envelope, EnvelopeBuilder, EnvelopeError, ErrorCode, Status};
pub use error::{BatonError, Result};
pub use event::{EventBus, RunEvent};
pub use loader::BundleLoader;
pub use traits::{OutputSink, ToolAdapter};
pub use types::*;
