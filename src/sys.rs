pub mod executor;
pub mod host;
pub mod memory_host;
pub mod package;
pub mod view;
