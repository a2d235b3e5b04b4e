//! Property-based invariant tests for the core engine.
//!
//! Verifies:
//! 1. Wire roundtrip: any InputEvent survives encode → decode.
//! 2. JSON roundtrip: any InputEvent survives to_json_string → from_json_str.
//! 3. Swap bijection: across any push/swap interleaving, the concatenation of
//!    frozen batches equals the accepted push sequence — every event in
//!    exactly one batch, order preserved.
//! 4. Queue never exceeds capacity; drops are exactly the excess pushes.
//! 5. Compositor: the visible attribute of each group equals the value of the
//!    last write among those with maximal depth for that group.
//! 6. Compositor: a clear always restores the blank cell.
//! 7. Render delta is empty immediately after a delta (self-stabilizing).

use glyphgrid_core::cell::{BLANK, Cell, CellWrite};
use glyphgrid_core::grid::Grid;
use glyphgrid_core::input::{
    ButtonMask, InputEvent, Modifiers, MouseButton, ScrollDirection,
};
use glyphgrid_core::queue::InputQueue;
use proptest::prelude::*;

// ── Strategy helpers ──────────────────────────────────────────────────

fn arb_modifiers() -> impl Strategy<Value = Modifiers> {
    (0u8..=15).prop_map(Modifiers::from_bits_truncate)
}

fn arb_button_mask() -> impl Strategy<Value = ButtonMask> {
    (0u8..=7).prop_map(ButtonMask::from_bits_truncate)
}

fn arb_mouse_button() -> impl Strategy<Value = MouseButton> {
    prop_oneof![
        Just(MouseButton::Left),
        Just(MouseButton::Middle),
        Just(MouseButton::Right),
    ]
}

fn arb_scroll_direction() -> impl Strategy<Value = ScrollDirection> {
    prop_oneof![
        Just(ScrollDirection::Up),
        Just(ScrollDirection::Down),
        Just(ScrollDirection::Left),
        Just(ScrollDirection::Right),
    ]
}

fn arb_event() -> impl Strategy<Value = InputEvent> {
    prop_oneof![
        (any::<u8>(), arb_modifiers())
            .prop_map(|(code, mods)| InputEvent::KeyPress { code, mods }),
        (any::<u8>(), any::<u8>(), arb_button_mask())
            .prop_map(|(x, y, buttons)| InputEvent::MouseMove { x, y, buttons }),
        (any::<u8>(), any::<u8>(), arb_mouse_button())
            .prop_map(|(x, y, button)| InputEvent::MousePress { x, y, button }),
        (any::<u8>(), any::<u8>(), arb_mouse_button())
            .prop_map(|(x, y, button)| InputEvent::MouseRelease { x, y, button }),
        (arb_scroll_direction(), any::<u8>(), any::<u8>())
            .prop_map(|(direction, x, y)| InputEvent::MouseScroll { direction, x, y }),
    ]
}

/// One step of a queue interleaving: push an event or swap.
#[derive(Debug, Clone)]
enum QueueOp {
    Push(InputEvent),
    Swap,
}

fn arb_queue_ops() -> impl Strategy<Value = Vec<QueueOp>> {
    prop::collection::vec(
        prop_oneof![
            4 => arb_event().prop_map(QueueOp::Push),
            1 => Just(QueueOp::Swap),
        ],
        0..200,
    )
}

/// A depth-tagged write with independently optional fields.
fn arb_write() -> impl Strategy<Value = (i32, CellWrite)> {
    (
        0i32..6,
        prop::option::of(prop::char::range('a', 'z')),
        prop::option::of(any::<bool>()),
        prop::option::of(any::<bool>()),
        prop::option::of(0u32..0x0100_0000),
        prop::option::of(0u32..0x0100_0000),
    )
        .prop_map(|(depth, character, bold, underline, foreground, background)| {
            (
                depth,
                CellWrite {
                    character,
                    bold,
                    underline,
                    foreground,
                    background,
                },
            )
        })
}

// ── Properties ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn wire_roundtrip(event in arb_event()) {
        prop_assert_eq!(InputEvent::decode(event.encode()), Some(event));
    }

    #[test]
    fn json_roundtrip(event in arb_event()) {
        let json = event.to_json_string().expect("serialize");
        prop_assert_eq!(InputEvent::from_json_str(&json).expect("parse"), event);
    }

    #[test]
    fn swap_is_a_bijection_over_accepted_pushes(ops in arb_queue_ops()) {
        let mut queue = InputQueue::new(32);
        let mut accepted = Vec::new();
        let mut drained = Vec::new();
        for op in &ops {
            match op {
                QueueOp::Push(event) => {
                    if queue.push(*event) {
                        accepted.push(*event);
                    }
                }
                QueueOp::Swap => drained.extend_from_slice(queue.swap_buffers()),
            }
        }
        drained.extend_from_slice(queue.swap_buffers());
        prop_assert_eq!(drained, accepted);
    }

    #[test]
    fn queue_never_exceeds_capacity(ops in arb_queue_ops()) {
        let mut queue = InputQueue::new(8);
        let mut pushes = 0u64;
        let mut accepted = 0u64;
        for op in &ops {
            match op {
                QueueOp::Push(event) => {
                    pushes += 1;
                    if queue.push(*event) {
                        accepted += 1;
                    }
                    prop_assert!(queue.pending() <= queue.capacity());
                }
                QueueOp::Swap => {
                    queue.swap_buffers();
                }
            }
        }
        prop_assert_eq!(queue.dropped(), pushes - accepted);
    }

    #[test]
    fn max_depth_write_wins_per_group(writes in prop::collection::vec(arb_write(), 1..40)) {
        let mut cell = BLANK;
        for (depth, write) in &writes {
            cell.apply(*depth, write);
        }

        // Replay the foreground group as a simple fold to get the expected
        // winners: a write is live if its depth is >= the running watermark.
        let mut expected = BLANK;
        let mut fg_mark = 0i32;
        let mut bg_mark = 0i32;
        for (depth, write) in &writes {
            let fg_touch =
                write.character.is_some() || write.bold.is_some() || write.underline.is_some()
                    || write.foreground.is_some();
            if fg_touch && *depth >= fg_mark {
                expected.apply(i32::MAX - 1, &CellWrite {
                    character: write.character,
                    bold: write.bold,
                    underline: write.underline,
                    foreground: write.foreground,
                    background: None,
                });
                fg_mark = *depth;
            }
            if write.background.is_some() && *depth >= bg_mark {
                expected.apply(i32::MAX - 1, &CellWrite {
                    background: write.background,
                    ..CellWrite::default()
                });
                bg_mark = *depth;
            }
        }

        prop_assert_eq!(cell.character(), expected.character());
        prop_assert_eq!(cell.flags(), expected.flags());
        prop_assert_eq!(cell.foreground(), expected.foreground());
        prop_assert_eq!(cell.background(), expected.background());
    }

    #[test]
    fn clear_always_restores_blank(writes in prop::collection::vec(arb_write(), 0..20)) {
        let mut cell = Cell::default();
        for (depth, write) in &writes {
            cell.apply(*depth, write);
        }
        cell.clear();
        prop_assert_eq!(cell, BLANK);
    }

    #[test]
    fn render_delta_is_self_stabilizing(
        writes in prop::collection::vec((0i32..4, 0i32..6, 0i32..6, arb_write()), 0..50)
    ) {
        let mut grid = Grid::new(5, 5);
        for (depth, x, y, (_, write)) in &writes {
            grid.set(*x, *y, *depth, write);
        }
        let _ = grid.render_delta();
        prop_assert!(grid.render_delta().is_empty());
    }
}
