//! Mocks and fixtures shared by Baton's test suites.

pub mod fixtures;
pub mod memory_sink;
pub mod mock_tool;

pub use fixtures::*;
pub use memory_sink::MemorySink;
pub use mock_tool::MockTool;
