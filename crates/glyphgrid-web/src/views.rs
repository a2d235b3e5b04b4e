#![forbid(unsafe_code)]

//! Typed overlay views over the module's linear memory.
//!
//! The module may grow its memory while servicing any call, which detaches
//! every typed array previously constructed over it; dereferencing a stale
//! view is undefined behavior in the host runtime. [`MemoryViews::refresh`]
//! therefore runs before every overlay access — each tick and each render —
//! comparing the buffer's byte length against the last observation and
//! rebuilding all views on change. Views are also rebuilt when the module
//! publishes (or republishes) its overlay offsets.

use glyphgrid_core::memory::{OverlayLayout, RegionWatch};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};
use wasm_bindgen::JsCast;

/// Reusable copies of the four overlay buffers, sized to the grid once at
/// boot so the per-frame copy never allocates.
pub struct OverlayPlanes {
    pub chars: Vec<u32>,
    pub style: Vec<u8>,
    pub foreground: Vec<u32>,
    pub background: Vec<u32>,
}

impl OverlayPlanes {
    #[must_use]
    pub fn new(cell_count: usize) -> Self {
        Self {
            chars: vec![0; cell_count],
            style: vec![0; cell_count],
            foreground: vec![0; cell_count],
            background: vec![0; cell_count],
        }
    }
}

/// The typed views, rebuilt whenever the underlying buffer is replaced.
struct BuiltViews {
    chars: js_sys::Uint32Array,
    style: js_sys::Uint8Array,
    foreground: js_sys::Uint32Array,
    background: js_sys::Uint32Array,
}

/// Overlay view manager for one module instance.
pub struct MemoryViews {
    memory: js_sys::WebAssembly::Memory,
    layout: Rc<RefCell<Option<OverlayLayout>>>,
    input_ptr: u32,
    cell_count: u32,
    input_capacity: u32,
    watch: RegionWatch,
    built_layout: Option<OverlayLayout>,
    views: Option<BuiltViews>,
    input: Option<js_sys::Uint32Array>,
}

impl MemoryViews {
    #[must_use]
    pub fn new(
        memory: js_sys::WebAssembly::Memory,
        layout: Rc<RefCell<Option<OverlayLayout>>>,
        input_ptr: u32,
        cell_count: u32,
        input_capacity: u32,
    ) -> Self {
        let mut views = Self {
            memory,
            layout,
            input_ptr,
            cell_count,
            input_capacity,
            watch: RegionWatch::new(),
            built_layout: None,
            views: None,
            input: None,
        };
        views.refresh();
        views
    }

    /// Re-check the buffer length and rebuild every view if it changed (or
    /// the overlay layout did). Must run before any view access.
    pub fn refresh(&mut self) {
        let buffer: js_sys::ArrayBuffer = self.memory.buffer().unchecked_into();
        let grew = self.watch.observe(buffer.byte_length());
        let layout = *self.layout.borrow();
        if !grew && layout == self.built_layout && self.input.is_some() {
            return;
        }
        if grew {
            debug!(
                byte_length = self.watch.observed(),
                "module memory replaced, rebuilding overlay views"
            );
        }

        self.input = Some(js_sys::Uint32Array::new_with_byte_offset_and_length(
            buffer.as_ref(),
            self.input_ptr,
            self.input_capacity,
        ));
        self.views = layout.map(|layout| BuiltViews {
            chars: js_sys::Uint32Array::new_with_byte_offset_and_length(
                buffer.as_ref(),
                layout.chars,
                self.cell_count,
            ),
            style: js_sys::Uint8Array::new_with_byte_offset_and_length(
                buffer.as_ref(),
                layout.style,
                self.cell_count,
            ),
            foreground: js_sys::Uint32Array::new_with_byte_offset_and_length(
                buffer.as_ref(),
                layout.foreground,
                self.cell_count,
            ),
            background: js_sys::Uint32Array::new_with_byte_offset_and_length(
                buffer.as_ref(),
                layout.background,
                self.cell_count,
            ),
        });
        self.built_layout = layout;
    }

    /// Whether the module has published its overlay offsets yet.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.views.is_some()
    }

    /// Copy the overlay buffers out into the reusable planes.
    ///
    /// Returns `false` (copying nothing) until the module has published its
    /// offsets.
    pub fn copy_overlays(&self, planes: &mut OverlayPlanes) -> bool {
        let Some(views) = &self.views else {
            return false;
        };
        views.chars.copy_to(&mut planes.chars);
        views.style.copy_to(&mut planes.style);
        views.foreground.copy_to(&mut planes.foreground);
        views.background.copy_to(&mut planes.background);
        true
    }

    /// Write packed input words into the module's input buffer, clamped to
    /// its capacity. Returns the count written.
    pub fn write_inputs(&self, words: &[u32]) -> u32 {
        let Some(input) = &self.input else {
            return 0;
        };
        let count = words.len().min(self.input_capacity as usize);
        for (i, word) in words[..count].iter().enumerate() {
            input.set_index(i as u32, *word);
        }
        trace!(count, "input batch written to module buffer");
        count as u32
    }
}
