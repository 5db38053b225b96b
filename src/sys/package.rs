use crate::model::task::LaunchDescriptor;

/// An installed component a launch descriptor resolves to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageItem {
    pub package: String,
    pub component: String,
    pub label: String,
}

pub trait PackageResolver: Send + Sync {
    /// Returns `None` if the descriptor no longer points at an installed
    /// component.
    fn resolve(&self, launch: &LaunchDescriptor) -> Option<PackageItem>;

    /// The encoded icon at the package's own size.
    fn icon_data(&self, item: &PackageItem) -> Option<Vec<u8>>;

    fn is_installed(&self, launch: &LaunchDescriptor) -> bool { self.resolve(launch).is_some() }
}
