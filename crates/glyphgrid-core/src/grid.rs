#![forbid(unsafe_code)]

//! The cell grid and its render deltas.
//!
//! The grid owns a row-major `Vec` of compositor cells plus a parallel
//! "last rendered" shadow. [`Grid::render_delta`] diffs the two and reports,
//! per cell, only the attributes that actually changed — each populated field
//! corresponds to exactly one DOM mutation, which is what keeps the render
//! pass cheap at display refresh rate.
//!
//! The grid is created once at startup and never resized.

use crate::cell::{BLANK, Cell, CellWrite, StyleFlags};
use crate::color::{DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};

/// Per-cell render delta. Every `Some` field is one DOM mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellUpdate {
    /// Row-major cell index.
    pub index: u32,
    pub character: Option<char>,
    pub flags: Option<StyleFlags>,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderedCell {
    character: char,
    flags: StyleFlags,
    foreground: u32,
    background: u32,
}

/// What a freshly mounted DOM cell shows before any render pass.
const RENDERED_BLANK: RenderedCell = RenderedCell {
    character: ' ',
    flags: StyleFlags::empty(),
    foreground: DEFAULT_FOREGROUND,
    background: DEFAULT_BACKGROUND,
};

/// Fixed-size, row-major grid of depth-composited cells.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Vec<Cell>,
    shadow: Vec<RenderedCell>,
    cols: u16,
    rows: u16,
}

impl Grid {
    /// Create a blank grid. Dimension validation happens at the
    /// configuration layer; a zero-sized grid here is simply empty.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        let len = (cols as usize) * (rows as usize);
        Self {
            cells: vec![BLANK; len],
            shadow: vec![RENDERED_BLANK; len],
            cols,
            rows,
        }
    }

    #[must_use]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The composited cell at `(x, y)`, if in bounds.
    #[must_use]
    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.cols && y < self.rows {
            Some(&self.cells[(y as usize) * (self.cols as usize) + (x as usize)])
        } else {
            None
        }
    }

    /// Dispatch a depth-tagged write to the addressed cell's compositor.
    ///
    /// Out-of-bounds coordinates (including negative ones from a misbehaving
    /// module) are silently dropped — rendering never fails on bad writes.
    pub fn set(&mut self, x: i32, y: i32, depth: i32, write: &CellWrite) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= u32::from(self.cols) || y >= u32::from(self.rows) {
            return;
        }
        let index = (y as usize) * (self.cols as usize) + (x as usize);
        self.cells[index].apply(depth, write);
    }

    /// Reset every cell to [`BLANK`], returning all watermarks to the zero
    /// baseline. The DOM is untouched until the next [`Self::render_delta`].
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /// Apply the module's published overlay buffers as a batch of depth-0
    /// writes, one per cell in row-major order.
    ///
    /// Runs after the module's tick, so callback writes at depth ≥ 1 layer
    /// above the buffer plane while depth-0 callback writes from the same
    /// frame are superseded (last writer wins at equal depth). Char codes
    /// that are not valid scalar values leave the glyph untouched. Slices
    /// shorter than the grid cover a prefix; extra entries are ignored.
    pub fn apply_base_plane(&mut self, chars: &[u32], style: &[u8], fg: &[u32], bg: &[u32]) {
        let len = self
            .cells
            .len()
            .min(chars.len())
            .min(style.len())
            .min(fg.len())
            .min(bg.len());
        for i in 0..len {
            let flags = StyleFlags::from_bits_truncate(style[i]);
            let write = CellWrite {
                character: char::from_u32(chars[i]),
                bold: Some(flags.contains(StyleFlags::BOLD)),
                underline: Some(flags.contains(StyleFlags::UNDERLINE)),
                foreground: Some(fg[i]),
                background: Some(bg[i]),
            };
            self.cells[i].apply(0, &write);
        }
    }

    /// Diff composited state against the last-rendered shadow.
    ///
    /// Updates the shadow as it goes, so a second call without intervening
    /// writes returns nothing.
    pub fn render_delta(&mut self) -> Vec<CellUpdate> {
        let mut updates = Vec::new();
        for (i, (cell, rendered)) in self.cells.iter().zip(self.shadow.iter_mut()).enumerate() {
            let mut update = CellUpdate {
                index: i as u32,
                character: None,
                flags: None,
                foreground: None,
                background: None,
            };
            if rendered.character != cell.character() {
                rendered.character = cell.character();
                update.character = Some(cell.character());
            }
            if rendered.flags != cell.flags() {
                rendered.flags = cell.flags();
                update.flags = Some(cell.flags());
            }
            if rendered.foreground != cell.foreground() {
                rendered.foreground = cell.foreground();
                update.foreground = Some(cell.foreground());
            }
            if rendered.background != cell.background() {
                rendered.background = cell.background();
                update.background = Some(cell.background());
            }
            if update.character.is_some()
                || update.flags.is_some()
                || update.foreground.is_some()
                || update.background.is_some()
            {
                updates.push(update);
            }
        }
        updates
    }
}
