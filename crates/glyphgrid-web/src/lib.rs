#![forbid(unsafe_code)]

//! Web frontend for glyphgrid.
//!
//! This crate is intentionally host-specific (web/WASM). It provides a
//! `wasm-bindgen` API surface for:
//! - mounting a DOM span grid and pushing minimal cell diffs into it,
//! - fetching and instantiating the application module,
//! - maintaining typed overlay views over the module's growable memory,
//! - driving the requestAnimationFrame update loop,
//! - capturing keyboard/mouse/wheel input into the double-buffered queue,
//! - persisting byte blobs on the module's request.
//!
//! The configuration and storage layers are platform-agnostic so the crate
//! keeps a meaningful native test suite; the DOM/module plumbing is
//! compiled for wasm32 only.

pub mod config;
pub mod storage;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod driver;
#[cfg(target_arch = "wasm32")]
mod module;
#[cfg(target_arch = "wasm32")]
mod views;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::GlyphGridApp;

/// Native builds compile this crate as a stub so `cargo check --workspace`
/// and the native test suite stay green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct GlyphGridApp;

#[cfg(not(target_arch = "wasm32"))]
impl GlyphGridApp {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}
