#![doc = include_str!("../README.md")]
#![no_std]
#![deny(
    unused_imports,
    unused_variables,
    unused_must_use,
    missing_docs,
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented
)]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod tree;
pub use tree::RbTree;

mod iter;
pub use iter::{Iter, Range};

mod rolling;
pub use rolling::RollingQuantile;
