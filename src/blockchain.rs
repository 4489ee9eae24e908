// Thin re-export module: the chain model and validator live under
// `blockchain/core/`.

pub mod core;
pub use core::*;
