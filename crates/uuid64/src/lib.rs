#![doc = include_str!("../README.md")]

mod cache;
mod codec;
mod error;
mod id;
mod node;
mod primes;
mod registry;
mod store;

pub use crate::cache::*;
pub use crate::codec::*;
pub use crate::error::*;
pub use crate::id::*;
pub use crate::node::*;
pub use crate::registry::*;
pub use crate::store::*;
