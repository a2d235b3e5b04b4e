#![forbid(unsafe_code)]

//! The DOM cell grid.
//!
//! One `<span>` per cell plus a `<br>` per row inside the mount element, and
//! a stylesheet fragment in `<head>` for monospace sizing and the
//! bold/underline classes. Render deltas from the core grid map one field to
//! one DOM mutation; spaces are substituted with a non-breaking space so
//! empty cells keep their width in the monospace layout.

use crate::config::AppConfig;
use crate::module::BootError;
use glyphgrid_core::color::ColorCache;
use glyphgrid_core::grid::CellUpdate;
use tracing::debug;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

const NBSP: &str = "\u{a0}";

/// The mounted span grid.
pub struct DomGrid {
    container: Element,
    cells: Vec<HtmlElement>,
    style_sheet: Element,
    colors: ColorCache,
}

impl DomGrid {
    /// Build the grid inside the configured mount element.
    ///
    /// A missing mount target is fatal: there is nothing sane to render
    /// into.
    pub fn mount(document: &Document, config: &AppConfig) -> Result<Self, BootError> {
        let container = document
            .get_element_by_id(&config.mount_id)
            .ok_or_else(|| BootError::MountMissing(config.mount_id.clone()))?;
        container.set_class_name("glyphgrid");

        let style_sheet = document
            .create_element("style")
            .map_err(|_| BootError::Dom("create <style>"))?;
        style_sheet.set_text_content(Some(&config.stylesheet()));
        let head = document.head().ok_or(BootError::Dom("document has no <head>"))?;
        head.append_child(&style_sheet)
            .map_err(|_| BootError::Dom("append stylesheet"))?;

        let mut cells = Vec::with_capacity(config.cell_count());
        for _ in 0..config.grid_height {
            for _ in 0..config.grid_width {
                let cell: HtmlElement = document
                    .create_element("span")
                    .map_err(|_| BootError::Dom("create cell"))?
                    .dyn_into()
                    .map_err(|_| BootError::Dom("cell is not an HtmlElement"))?;
                cell.set_class_name("cell");
                cell.set_text_content(Some(NBSP));
                let style = cell.style();
                let _ = style.set_property("color", "rgb(255,255,255)");
                let _ = style.set_property("background-color", "rgb(0,0,0)");
                container
                    .append_child(&cell)
                    .map_err(|_| BootError::Dom("append cell"))?;
                cells.push(cell);
            }
            let row_break = document
                .create_element("br")
                .map_err(|_| BootError::Dom("create row break"))?;
            container
                .append_child(&row_break)
                .map_err(|_| BootError::Dom("append row break"))?;
        }

        debug!(
            cells = cells.len(),
            mount = %config.mount_id,
            "DOM grid mounted"
        );

        Ok(Self {
            container,
            cells,
            style_sheet,
            colors: ColorCache::new(),
        })
    }

    /// Push a batch of render deltas into the DOM. Each populated field is
    /// exactly one mutation; an empty batch touches nothing.
    pub fn apply(&mut self, updates: &[CellUpdate]) {
        for update in updates {
            let Some(cell) = self.cells.get(update.index as usize) else {
                continue;
            };
            if let Some(character) = update.character {
                if character == ' ' {
                    cell.set_text_content(Some(NBSP));
                } else {
                    let mut buf = [0u8; 4];
                    cell.set_text_content(Some(character.encode_utf8(&mut buf)));
                }
            }
            if let Some(flags) = update.flags {
                cell.set_class_name(flags.class_name());
            }
            let style = cell.style();
            if let Some(foreground) = update.foreground {
                let _ = style.set_property("color", self.colors.css(foreground));
            }
            if let Some(background) = update.background {
                let _ = style.set_property("background-color", self.colors.css(background));
            }
        }
    }

    /// Handles for mapping pointer pixel coordinates to cell coordinates.
    #[must_use]
    pub fn pointer_surface(&self) -> PointerSurface {
        PointerSurface {
            container: self.container.clone(),
            probe: self.cells.first().cloned(),
        }
    }

    /// Remove the injected stylesheet. The cell spans stay; the page owns
    /// the mount element.
    pub fn remove_stylesheet(&self) {
        if let Some(parent) = self.style_sheet.parent_node() {
            let _ = parent.remove_child(&self.style_sheet);
        }
    }
}

/// Maps client pixel coordinates to cell coordinates from live layout
/// measurements, the same way every pointer event is resolved.
pub struct PointerSurface {
    container: Element,
    probe: Option<HtmlElement>,
}

impl PointerSurface {
    /// The cell under `(client_x, client_y)`, saturated to the wire format's
    /// 8-bit coordinate range.
    #[must_use]
    pub fn cell_at(&self, client_x: i32, client_y: i32) -> (u8, u8) {
        let container_rect = self.container.get_bounding_client_rect();
        let (cell_width, cell_height) = match &self.probe {
            Some(probe) => {
                let rect = probe.get_bounding_client_rect();
                (rect.width(), rect.height())
            }
            None => (1.0, 1.0),
        };
        let x = (f64::from(client_x) - container_rect.x()) / cell_width.max(1.0);
        let y = (f64::from(client_y) - container_rect.y()) / cell_height.max(1.0);
        (saturate(x), saturate(y))
    }
}

fn saturate(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}
