#![doc = include_str!("RUSTDOC.md")]

pub mod logger;
pub mod monitor;
pub mod platform;
pub mod util;

#[cfg(test)]
pub mod test_support;
