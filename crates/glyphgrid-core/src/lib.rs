#![forbid(unsafe_code)]

//! Host-agnostic engine for glyphgrid.
//!
//! This crate owns everything about the presentation bridge that does not
//! touch the DOM or the WebAssembly host APIs:
//! - the depth-composited cell grid and its minimal render deltas,
//! - packed colors and the ANSI palette,
//! - input events, their packed wire codec, and the double-buffered queue,
//! - the frame-loop state machine and clock,
//! - bookkeeping for overlay views onto the module's growable memory.
//!
//! The `glyphgrid-web` crate layers DOM rendering, input capture, and module
//! instantiation on top of these types.

pub mod cell;
pub mod color;
pub mod grid;
pub mod input;
pub mod memory;
pub mod queue;
pub mod tick;

pub use cell::{BLANK, Cell, CellWrite, StyleFlags};
pub use color::ColorCache;
pub use grid::{CellUpdate, Grid};
pub use input::{ButtonMask, InputEvent, Modifiers, MouseButton, ScrollDirection};
pub use memory::{OverlayLayout, RegionWatch};
pub use queue::InputQueue;
pub use tick::{FrameClock, LoopState, StartError, TickLoop};
