#![forbid(unsafe_code)]

//! The depth-composited cell.
//!
//! Within a frame, a cell can receive several overlapping writes from
//! different layers of the scene. Each write carries a depth; the cell keeps
//! two watermarks — one for the foreground group (character, bold, underline,
//! foreground color) and one for the background — and accepts a write only at
//! `depth >= watermark`, advancing the watermark to that depth. The `>=` is
//! deliberate: at equal depth the most recent writer wins, which is what
//! highlight overlays rely on. The two watermarks are independent so a
//! background-only overlay cannot disturb foreground state, and vice versa.

use crate::color::{DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};
use bitflags::bitflags;

bitflags! {
    /// Per-cell style bits, matching the module's style overlay byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u8 {
        const BOLD      = 1 << 0;
        const UNDERLINE = 1 << 1;
    }
}

impl StyleFlags {
    /// CSS class list for this style combination.
    ///
    /// `cell` is the base class every grid span carries.
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match (self.contains(Self::BOLD), self.contains(Self::UNDERLINE)) {
            (false, false) => "cell",
            (true, false) => "cell bold",
            (false, true) => "cell underline",
            (true, true) => "cell bold underline",
        }
    }
}

/// One depth-tagged write. A `None` field means "no opinion": the existing
/// value and its watermark are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellWrite {
    pub character: Option<char>,
    pub bold: Option<bool>,
    pub underline: Option<bool>,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
}

/// A grid cell: visible attributes plus the two depth watermarks gating
/// writes within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    character: char,
    flags: StyleFlags,
    foreground: u32,
    background: u32,
    foreground_depth: i32,
    background_depth: i32,
}

/// The cleared cell: space glyph, white on black, watermarks at the zero
/// baseline.
pub const BLANK: Cell = Cell {
    character: ' ',
    flags: StyleFlags::empty(),
    foreground: DEFAULT_FOREGROUND,
    background: DEFAULT_BACKGROUND,
    foreground_depth: 0,
    background_depth: 0,
};

impl Cell {
    #[must_use]
    pub fn character(&self) -> char {
        self.character
    }

    #[must_use]
    pub fn flags(&self) -> StyleFlags {
        self.flags
    }

    #[must_use]
    pub fn foreground(&self) -> u32 {
        self.foreground
    }

    #[must_use]
    pub fn background(&self) -> u32 {
        self.background
    }

    /// Apply a depth-tagged write, field by field.
    pub fn apply(&mut self, depth: i32, write: &CellWrite) {
        if let Some(character) = write.character {
            self.set_character(character, depth);
        }
        if let Some(bold) = write.bold {
            self.set_bold(bold, depth);
        }
        if let Some(underline) = write.underline {
            self.set_underline(underline, depth);
        }
        if let Some(foreground) = write.foreground {
            self.set_foreground(foreground, depth);
        }
        if let Some(background) = write.background {
            self.set_background(background, depth);
        }
    }

    /// Reset to [`BLANK`], returning both watermarks to the zero baseline.
    pub fn clear(&mut self) {
        *self = BLANK;
    }

    fn set_character(&mut self, character: char, depth: i32) {
        if depth >= self.foreground_depth {
            self.character = character;
            self.foreground_depth = depth;
        }
    }

    fn set_bold(&mut self, bold: bool, depth: i32) {
        if depth >= self.foreground_depth {
            self.flags.set(StyleFlags::BOLD, bold);
            self.foreground_depth = depth;
        }
    }

    fn set_underline(&mut self, underline: bool, depth: i32) {
        if depth >= self.foreground_depth {
            self.flags.set(StyleFlags::UNDERLINE, underline);
            self.foreground_depth = depth;
        }
    }

    fn set_foreground(&mut self, foreground: u32, depth: i32) {
        if depth >= self.foreground_depth {
            self.foreground = foreground;
            self.foreground_depth = depth;
        }
    }

    fn set_background(&mut self, background: u32, depth: i32) {
        if depth >= self.background_depth {
            self.background = background;
            self.background_depth = depth;
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        BLANK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::pack_rgb;

    fn full(ch: char, fg: u32, bg: u32) -> CellWrite {
        CellWrite {
            character: Some(ch),
            bold: Some(false),
            underline: Some(false),
            foreground: Some(fg),
            background: Some(bg),
        }
    }

    #[test]
    fn default_cell_is_blank() {
        let cell = Cell::default();
        assert_eq!(cell.character(), ' ');
        assert_eq!(cell.flags(), StyleFlags::empty());
        assert_eq!(cell.foreground(), DEFAULT_FOREGROUND);
        assert_eq!(cell.background(), DEFAULT_BACKGROUND);
    }

    #[test]
    fn higher_depth_wins() {
        let mut cell = BLANK;
        cell.apply(0, &full('a', 1, 2));
        cell.apply(2, &full('b', 3, 4));
        assert_eq!(cell.character(), 'b');
        assert_eq!(cell.foreground(), 3);
        assert_eq!(cell.background(), 4);
    }

    #[test]
    fn lower_depth_is_rejected() {
        let mut cell = BLANK;
        cell.apply(2, &full('b', 3, 4));
        cell.apply(1, &full('c', 5, 6));
        assert_eq!(cell.character(), 'b');
        assert_eq!(cell.foreground(), 3);
        assert_eq!(cell.background(), 4);
    }

    #[test]
    fn equal_depth_last_writer_wins() {
        let mut cell = BLANK;
        cell.apply(1, &full('x', 10, 20));
        cell.apply(1, &full('y', 30, 40));
        assert_eq!(cell.character(), 'y');
        assert_eq!(cell.foreground(), 30);
        assert_eq!(cell.background(), 40);
    }

    #[test]
    fn background_watermark_is_independent() {
        let mut cell = BLANK;
        // Foreground group written at depth 1.
        cell.apply(
            1,
            &CellWrite {
                character: Some('A'),
                foreground: Some(DEFAULT_FOREGROUND),
                ..CellWrite::default()
            },
        );
        // Background-only write at depth 0 is still accepted: the background
        // watermark sits at the baseline.
        let highlight = pack_rgb(0, 0, 187);
        cell.apply(
            0,
            &CellWrite {
                background: Some(highlight),
                ..CellWrite::default()
            },
        );
        assert_eq!(cell.character(), 'A');
        assert_eq!(cell.background(), highlight);
        // And a later depth-0 foreground write bounces off the depth-1 mark.
        cell.apply(
            0,
            &CellWrite {
                character: Some('z'),
                ..CellWrite::default()
            },
        );
        assert_eq!(cell.character(), 'A');
    }

    #[test]
    fn none_fields_leave_values_and_watermarks_alone() {
        let mut cell = BLANK;
        cell.apply(3, &full('q', 7, 8));
        cell.apply(
            5,
            &CellWrite {
                background: Some(9),
                ..CellWrite::default()
            },
        );
        // The background-only write must not advance the foreground mark.
        cell.apply(
            4,
            &CellWrite {
                character: Some('r'),
                ..CellWrite::default()
            },
        );
        assert_eq!(cell.character(), 'r');
        assert_eq!(cell.background(), 9);
    }

    #[test]
    fn clear_resets_watermarks() {
        let mut cell = BLANK;
        cell.apply(5, &full('x', 1, 2));
        cell.clear();
        assert_eq!(cell, BLANK);
        cell.apply(0, &full('y', 3, 4));
        assert_eq!(cell.character(), 'y');
    }

    #[test]
    fn style_class_table() {
        assert_eq!(StyleFlags::empty().class_name(), "cell");
        assert_eq!(StyleFlags::BOLD.class_name(), "cell bold");
        assert_eq!(StyleFlags::UNDERLINE.class_name(), "cell underline");
        assert_eq!(
            (StyleFlags::BOLD | StyleFlags::UNDERLINE).class_name(),
            "cell bold underline"
        );
    }
}
