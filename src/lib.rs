#![allow(clippy::needless_return)]
#![allow(clippy::len_zero)]
// src/lib.rs

pub mod blockchain;
pub mod bridge;
pub mod cli;
pub mod core;
pub mod registry;
