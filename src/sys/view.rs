//! The surfaces the switcher publishes to. Implementations live with the UI;
//! the switcher only ever calls them from its own thread.

use std::sync::Arc;

use crate::model::task::Task;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMetrics {
    /// Physical pixels per density-independent pixel.
    pub density: f32,
}

impl Default for DisplayMetrics {
    fn default() -> Self { DisplayMetrics { density: 1.0 } }
}

impl DisplayMetrics {
    pub fn px(&self, dp: u32) -> u32 { ((dp as f32 * self.density).round() as u32).max(1) }
}

pub trait SwitcherView: Send {
    fn show(&mut self);
    fn hide(&mut self, fast: bool);
    /// A full relist.
    fn update(&mut self, tasks: &[Arc<Task>]);
    /// Redraws after a local change without a relist.
    fn refresh(&mut self, tasks: &[Arc<Task>]);
    /// Icon, label or colors of one task were resolved.
    fn task_info_changed(&mut self, _task: &Arc<Task>) {}
    fn favorites_changed(&mut self, _favorites: &[String]) {}
}

/// The drag gesture layer, which keeps its own copy of the visible list.
pub trait GestureView: Send {
    fn update(&mut self, tasks: &[Arc<Task>]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_rounds_and_never_returns_zero() {
        let metrics = DisplayMetrics { density: 2.5 };
        assert_eq!(130, metrics.px(52));
        assert_eq!(1, DisplayMetrics { density: 0.1 }.px(1));
        assert_eq!(52, DisplayMetrics::default().px(52));
    }
}
