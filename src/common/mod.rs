pub mod serializer;

pub use crate::types::{bit_eq, Address, Byte};
