mod descriptor;
mod parse;

pub use descriptor::{ScalarKind, TypeDescriptor, TypeKind, ValueHandler};
