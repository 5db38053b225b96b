//! A recents switcher core: keeps an in-memory list of running tasks in sync
//! with a slow, concurrently mutating host task registry, and fills in task
//! icons and thumbnails in the background.

pub mod actor;
pub mod common;
pub mod model;
pub mod sys;
