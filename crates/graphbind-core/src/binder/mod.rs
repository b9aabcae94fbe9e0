mod builder;
mod creator;
mod custom;
mod property;
pub mod read;
pub mod write;

pub use builder::{BinderBuilder, BuiltBean};
pub use creator::{
    default_value, CreatorDescriptor, CreatorKind, CreatorParamDescriptor, CreatorSet,
    ObjectCreator, PropertyValueBuffer,
};
pub use custom::{CustomReader, CustomWriter};
pub use property::{ManagedLink, PropertyDescriptor, PropertyMap};
pub use read::{ReadBinder, ReadProperty, ValueBinding};
pub use write::{WriteBinder, WriteBinding, WriteProperty};

use std::fmt;

/// Slot index of a binder inside its provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinderId(u32);

impl BinderId {
    pub(crate) fn from_index(index: usize) -> Self {
        BinderId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BinderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
