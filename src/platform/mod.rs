#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
pub mod browser;
pub mod page;
pub mod runtime;
