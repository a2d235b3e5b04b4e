#![forbid(unsafe_code)]

//! Input events and their encodings.
//!
//! Events originate from DOM callbacks, queue up in the double-buffered
//! [`InputQueue`](crate::queue::InputQueue), and cross the module ABI as
//! fixed-width packed `u32`s: the high byte is the event-kind tag, the
//! remaining three bytes carry the kind-specific payload. Cell coordinates on
//! the wire are 8-bit; the DOM capture layer saturates larger grids.
//!
//! A stable JSON encoding (a `kind` tag plus the minimum semantic fields) is
//! provided for record/replay traces.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Modifier keys held during a key press.
    ///
    /// Encoded as a compact `u8` bitset on the wire and in JSON.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
        const SUPER = 1 << 3;
    }
}

bitflags! {
    /// Buttons held during a mouse move, in DOM `MouseEvent.buttons` layout.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ButtonMask: u8 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

/// A specific mouse button, in DOM `MouseEvent.button` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Middle => 1,
            Self::Right => 2,
        }
    }

    #[must_use]
    pub const fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Left),
            1 => Some(Self::Middle),
            2 => Some(Self::Right),
            _ => None,
        }
    }
}

/// Scroll wheel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }

    #[must_use]
    pub const fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Left),
            3 => Some(Self::Right),
            _ => None,
        }
    }
}

/// A raw input event as captured from the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    KeyPress { code: u8, mods: Modifiers },
    MouseMove { x: u8, y: u8, buttons: ButtonMask },
    MousePress { x: u8, y: u8, button: MouseButton },
    MouseRelease { x: u8, y: u8, button: MouseButton },
    MouseScroll { direction: ScrollDirection, x: u8, y: u8 },
}

const TAG_KEY_PRESS: u32 = 1;
const TAG_MOUSE_MOVE: u32 = 2;
const TAG_MOUSE_PRESS: u32 = 3;
const TAG_MOUSE_RELEASE: u32 = 4;
const TAG_MOUSE_SCROLL: u32 = 5;

impl InputEvent {
    /// Pack into the fixed-width wire word: tag in the high byte, payload in
    /// the remaining three.
    #[must_use]
    pub fn encode(self) -> u32 {
        match self {
            Self::KeyPress { code, mods } => {
                (TAG_KEY_PRESS << 24) | (u32::from(code) << 16) | (u32::from(mods.bits()) << 8)
            }
            Self::MouseMove { x, y, buttons } => {
                (TAG_MOUSE_MOVE << 24)
                    | (u32::from(x) << 16)
                    | (u32::from(y) << 8)
                    | u32::from(buttons.bits())
            }
            Self::MousePress { x, y, button } => {
                (TAG_MOUSE_PRESS << 24)
                    | (u32::from(x) << 16)
                    | (u32::from(y) << 8)
                    | u32::from(button.to_u8())
            }
            Self::MouseRelease { x, y, button } => {
                (TAG_MOUSE_RELEASE << 24)
                    | (u32::from(x) << 16)
                    | (u32::from(y) << 8)
                    | u32::from(button.to_u8())
            }
            Self::MouseScroll { direction, x, y } => {
                (TAG_MOUSE_SCROLL << 24)
                    | (u32::from(direction.to_u8()) << 16)
                    | (u32::from(x) << 8)
                    | u32::from(y)
            }
        }
    }

    /// Decode a wire word. Unknown tags and payloads yield `None`.
    #[must_use]
    pub fn decode(word: u32) -> Option<Self> {
        let a = ((word >> 16) & 0xff) as u8;
        let b = ((word >> 8) & 0xff) as u8;
        let c = (word & 0xff) as u8;
        match word >> 24 {
            TAG_KEY_PRESS => Some(Self::KeyPress {
                code: a,
                mods: Modifiers::from_bits_truncate(b),
            }),
            TAG_MOUSE_MOVE => Some(Self::MouseMove {
                x: a,
                y: b,
                buttons: ButtonMask::from_bits_truncate(c),
            }),
            TAG_MOUSE_PRESS => Some(Self::MousePress {
                x: a,
                y: b,
                button: MouseButton::from_u8(c)?,
            }),
            TAG_MOUSE_RELEASE => Some(Self::MouseRelease {
                x: a,
                y: b,
                button: MouseButton::from_u8(c)?,
            }),
            TAG_MOUSE_SCROLL => Some(Self::MouseScroll {
                direction: ScrollDirection::from_u8(a)?,
                x: b,
                y: c,
            }),
            _ => None,
        }
    }

    /// Encode this event as a stable JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&InputEventJson::from(self))
    }

    /// Decode a previously encoded event JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let json: InputEventJson = serde_json::from_str(s)?;
        Ok(Self::from(json))
    }
}

/// JSON encoding used for record/replay traces: a `kind` tag plus the
/// minimum semantic fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum InputEventJson {
    KeyPress { code: u8, mods: u8 },
    MouseMove { x: u8, y: u8, buttons: u8 },
    MousePress { x: u8, y: u8, button: MouseButton },
    MouseRelease { x: u8, y: u8, button: MouseButton },
    MouseScroll { direction: ScrollDirection, x: u8, y: u8 },
}

impl From<&InputEvent> for InputEventJson {
    fn from(value: &InputEvent) -> Self {
        match *value {
            InputEvent::KeyPress { code, mods } => Self::KeyPress {
                code,
                mods: mods.bits(),
            },
            InputEvent::MouseMove { x, y, buttons } => Self::MouseMove {
                x,
                y,
                buttons: buttons.bits(),
            },
            InputEvent::MousePress { x, y, button } => Self::MousePress { x, y, button },
            InputEvent::MouseRelease { x, y, button } => Self::MouseRelease { x, y, button },
            InputEvent::MouseScroll { direction, x, y } => Self::MouseScroll { direction, x, y },
        }
    }
}

impl From<InputEventJson> for InputEvent {
    fn from(value: InputEventJson) -> Self {
        match value {
            InputEventJson::KeyPress { code, mods } => Self::KeyPress {
                code,
                mods: Modifiers::from_bits_truncate(mods),
            },
            InputEventJson::MouseMove { x, y, buttons } => Self::MouseMove {
                x,
                y,
                buttons: ButtonMask::from_bits_truncate(buttons),
            },
            InputEventJson::MousePress { x, y, button } => Self::MousePress { x, y, button },
            InputEventJson::MouseRelease { x, y, button } => Self::MouseRelease { x, y, button },
            InputEventJson::MouseScroll { direction, x, y } => Self::MouseScroll { direction, x, y },
        }
    }
}

/// Collect DOM keydown modifier flags into a [`Modifiers`] bitset.
#[must_use]
pub fn modifiers_from_dom(shift: bool, alt: bool, ctrl: bool, meta: bool) -> Modifiers {
    let mut mods = Modifiers::empty();
    mods.set(Modifiers::SHIFT, shift);
    mods.set(Modifiers::ALT, alt);
    mods.set(Modifiers::CTRL, ctrl);
    mods.set(Modifiers::SUPER, meta);
    mods
}

/// Build a key-press event from DOM `keyCode` and modifier state.
///
/// Codes above the byte range do not fit the wire format and are dropped.
#[must_use]
pub fn key_press_from_dom(key_code: u32, mods: Modifiers) -> Option<InputEvent> {
    let code = u8::try_from(key_code).ok()?;
    Some(InputEvent::KeyPress { code, mods })
}

/// Interpret the DOM `MouseEvent.buttons` bitmask.
#[must_use]
pub fn button_mask_from_dom(buttons: u16) -> ButtonMask {
    ButtonMask::from_bits_truncate((buttons & 0xff) as u8)
}

/// Interpret the DOM `MouseEvent.button` index. Auxiliary buttons beyond
/// left/middle/right are ignored.
#[must_use]
pub fn mouse_button_from_dom(button: i16) -> Option<MouseButton> {
    match button {
        0 => Some(MouseButton::Left),
        1 => Some(MouseButton::Middle),
        2 => Some(MouseButton::Right),
        _ => None,
    }
}

/// Map wheel deltas to scroll directions: a horizontal and a vertical
/// component may each produce one event, horizontal first.
#[must_use]
pub fn scroll_directions(delta_x: f64, delta_y: f64) -> impl Iterator<Item = ScrollDirection> {
    let horizontal = if delta_x < 0.0 {
        Some(ScrollDirection::Left)
    } else if delta_x > 0.0 {
        Some(ScrollDirection::Right)
    } else {
        None
    };
    let vertical = if delta_y < 0.0 {
        Some(ScrollDirection::Up)
    } else if delta_y > 0.0 {
        Some(ScrollDirection::Down)
    } else {
        None
    };
    [horizontal, vertical].into_iter().flatten()
}
