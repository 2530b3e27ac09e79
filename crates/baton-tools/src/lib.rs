pub mod command;
pub mod manifest;
pub mod presets;
pub mod registry;
pub mod workspace;

pub use command::CommandTool;
pub use registry::ToolRegistry;
pub use workspace::Workspace;
