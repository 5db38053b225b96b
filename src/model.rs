pub mod bitmap;
pub mod color;
pub mod generation;
pub mod icon_cache;
pub mod statistics;
pub mod task;
pub mod task_list;

pub use bitmap::Bitmap;
pub use color::Color;
pub use generation::Generation;
pub use task::{LaunchDescriptor, PersistentTaskId, StackId, Task, TaskFlags, TaskHandle};
pub use task_list::{TaskFilter, TaskList};
