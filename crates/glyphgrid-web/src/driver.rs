#![forbid(unsafe_code)]

//! The tick driver.
//!
//! Owns the requestAnimationFrame loop and the DOM input listeners, and runs
//! the per-frame sequence:
//!
//! 1. advance the frame clock (elapsed = now − previous),
//! 2. refresh the overlay views (the module may have grown its memory),
//! 3. swap the input buffers and encode the frozen batch into the module's
//!    input buffer,
//! 4. clear the grid (watermarks back to the zero baseline),
//! 5. call the module's `tick` (it may write cells through `set_cell`),
//! 6. refresh the views again (memory can grow during the call),
//! 7. apply the overlay buffers as the depth-0 base plane,
//! 8. diff against the last-rendered shadow and push the delta into the DOM.
//!
//! Frames are delayed, never skipped, when the module call runs long. Input
//! callbacks only touch the queue and the pointer surface, so they never
//! contend with a borrow the frame holds.

use crate::config::AppConfig;
use crate::dom::DomGrid;
use crate::module::{
    BootError, EnvImports, HostHooks, ModuleAbi, StorageBinding, build_env, fetch_module_bytes,
    instantiate,
};
use crate::storage::BlobStore;
use crate::views::{MemoryViews, OverlayPlanes};
use glyphgrid_core::grid::Grid;
use glyphgrid_core::input::{
    InputEvent, button_mask_from_dom, key_press_from_dom, modifiers_from_dom,
    mouse_button_from_dom, scroll_directions,
};
use glyphgrid_core::queue::InputQueue;
use glyphgrid_core::tick::{StartError, TickLoop};
use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;
use tracing::{debug, trace, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{KeyboardEvent, MouseEvent, Performance, WheelEvent, Window};

/// Everything a running application owns.
pub struct Driver {
    window: Window,
    performance: Performance,
    tick: TickLoop,
    grid: Rc<RefCell<Grid>>,
    queue: Rc<RefCell<InputQueue>>,
    quit: Rc<StdCell<bool>>,
    overflowed: Rc<StdCell<bool>>,
    dom: DomGrid,
    views: MemoryViews,
    module: ModuleAbi,
    app: f64,
    input_ptr: u32,
    planes: OverlayPlanes,
    input_scratch: Vec<u32>,
    raf_id: Option<i32>,
    raf_closure: Option<Closure<dyn FnMut()>>,
    listeners: Vec<(&'static str, Closure<dyn FnMut(JsValue)>)>,
    _env: EnvImports,
}

impl Driver {
    /// Fetch, instantiate, and wire up the application. The grid mounts and
    /// the initial blob loads before the module constructor runs, since the
    /// constructor consumes the blob by value.
    pub async fn boot(config: AppConfig) -> Result<Rc<RefCell<Self>>, BootError> {
        config.validate()?;
        let window = web_sys::window().ok_or(BootError::NoWindow)?;
        let document = window
            .document()
            .ok_or(BootError::MissingHostApi("document"))?;
        let performance = window
            .performance()
            .ok_or(BootError::MissingHostApi("performance"))?;

        let storage = match &config.storage_key {
            Some(key) => Some(Rc::new(StorageBinding {
                store: BlobStore::new(),
                key: key.clone(),
            })),
            None => None,
        };
        let blob = match &storage {
            Some(binding) => binding.store.load(&binding.key).await,
            None => Vec::new(),
        };

        let dom = DomGrid::mount(&document, &config)?;
        let grid = Rc::new(RefCell::new(Grid::new(
            config.grid_width,
            config.grid_height,
        )));
        let queue = Rc::new(RefCell::new(InputQueue::new(config.input_capacity)));
        let hooks = HostHooks {
            layout: Rc::new(RefCell::new(None)),
            grid: grid.clone(),
            memory: Rc::new(RefCell::new(None)),
            quit: Rc::new(StdCell::new(false)),
            storage,
        };
        let env = build_env(config.grid_width, config.grid_height, &hooks);

        let bytes = fetch_module_bytes(&config.module_url).await?;
        let instance = instantiate(&bytes, &env.object).await?;
        let module = ModuleAbi::from_instance(&instance)?;
        *hooks.memory.borrow_mut() = Some(module.memory().clone());

        // One packed u32 per input event.
        let input_ptr = module.alloc_byte_buffer((config.input_capacity as u32) * 4)?;

        let seed = config.seed.unwrap_or_else(random_seed);
        let blob_span = match &hooks.storage {
            Some(_) => {
                let ptr = module.alloc_byte_buffer(blob.len() as u32)?;
                module.write_bytes(ptr, &blob);
                Some((ptr, blob.len() as u32))
            }
            None => None,
        };
        let app = module.alloc_app(seed, blob_span)?;
        if let Some((ptr, len)) = blob_span {
            // The constructor consumed the blob by value; the staging buffer
            // can go back.
            module.free_byte_buffer(ptr, len);
        }

        if let Some((width, height)) = module.exported_size()
            && (width != u32::from(config.grid_width) || height != u32::from(config.grid_height))
        {
            warn!(
                module_width = width,
                module_height = height,
                configured_width = config.grid_width,
                configured_height = config.grid_height,
                "module reports a different grid size than configured"
            );
        }

        let views = MemoryViews::new(
            module.memory().clone(),
            hooks.layout.clone(),
            input_ptr,
            config.cell_count() as u32,
            config.input_capacity as u32,
        );

        debug!(seed, app, blob_len = blob.len(), "application booted");

        let driver = Rc::new(RefCell::new(Self {
            window,
            performance,
            tick: TickLoop::new(),
            grid,
            queue,
            quit: hooks.quit,
            overflowed: Rc::new(StdCell::new(false)),
            dom,
            views,
            module,
            app,
            input_ptr,
            planes: OverlayPlanes::new(config.cell_count()),
            input_scratch: Vec::with_capacity(config.input_capacity),
            raf_id: None,
            raf_closure: None,
            listeners: Vec::new(),
            _env: env,
        }));

        let raf_closure = {
            let driver = driver.clone();
            Closure::wrap(Box::new(move || frame(&driver)) as Box<dyn FnMut()>)
        };
        driver.borrow_mut().raf_closure = Some(raf_closure);

        Ok(driver)
    }

    /// `Idle → Running`: register input listeners, record the baseline
    /// timestamp, schedule the first frame.
    pub fn start(&mut self) -> Result<(), StartError> {
        self.tick.start(self.performance.now())?;
        self.register_listeners();
        self.schedule();
        debug!("frame loop started");
        Ok(())
    }

    /// `Running → Stopped`: cancel the pending frame, remove listeners.
    /// Safe to call from within a frame; no further ticks or input
    /// processing happen after it returns.
    pub fn stop(&mut self) {
        if !self.tick.is_running() {
            return;
        }
        self.tick.stop();
        if let Some(id) = self.raf_id.take() {
            self.window.cancel_animation_frame(id).ok();
        }
        for (name, closure) in self.listeners.drain(..) {
            let _ = self
                .window
                .remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
        }
        self.dom.remove_stylesheet();
        debug!(dropped_events = self.queue.borrow().dropped(), "frame loop stopped");
    }

    fn schedule(&mut self) {
        if let Some(closure) = &self.raf_closure {
            match self
                .window
                .request_animation_frame(closure.as_ref().unchecked_ref())
            {
                Ok(id) => self.raf_id = Some(id),
                Err(_) => warn!("requestAnimationFrame failed; frame loop stalled"),
            }
        }
    }

    fn register_listeners(&mut self) {
        let surface = Rc::new(self.dom.pointer_surface());

        let keydown = {
            let queue = self.queue.clone();
            let overflowed = self.overflowed.clone();
            Closure::wrap(Box::new(move |event: JsValue| {
                let event = event.unchecked_ref::<KeyboardEvent>();
                let mods = modifiers_from_dom(
                    event.shift_key(),
                    event.alt_key(),
                    event.ctrl_key(),
                    event.meta_key(),
                );
                if let Some(InputEvent::KeyPress { code, .. }) =
                    key_press_from_dom(event.key_code(), mods)
                {
                    note_push(&overflowed, queue.borrow_mut().push_key_press(code, mods));
                }
            }) as Box<dyn FnMut(JsValue)>)
        };

        let mousemove = {
            let queue = self.queue.clone();
            let overflowed = self.overflowed.clone();
            let surface = surface.clone();
            Closure::wrap(Box::new(move |event: JsValue| {
                let event = event.unchecked_ref::<MouseEvent>();
                let (x, y) = surface.cell_at(event.client_x(), event.client_y());
                let buttons = button_mask_from_dom(event.buttons());
                note_push(&overflowed, queue.borrow_mut().push_mouse_move(x, y, buttons));
            }) as Box<dyn FnMut(JsValue)>)
        };

        let mousedown = {
            let queue = self.queue.clone();
            let overflowed = self.overflowed.clone();
            let surface = surface.clone();
            Closure::wrap(Box::new(move |event: JsValue| {
                let event = event.unchecked_ref::<MouseEvent>();
                if let Some(button) = mouse_button_from_dom(event.button()) {
                    let (x, y) = surface.cell_at(event.client_x(), event.client_y());
                    note_push(&overflowed, queue.borrow_mut().push_mouse_press(x, y, button));
                }
            }) as Box<dyn FnMut(JsValue)>)
        };

        let mouseup = {
            let queue = self.queue.clone();
            let overflowed = self.overflowed.clone();
            let surface = surface.clone();
            Closure::wrap(Box::new(move |event: JsValue| {
                let event = event.unchecked_ref::<MouseEvent>();
                if let Some(button) = mouse_button_from_dom(event.button()) {
                    let (x, y) = surface.cell_at(event.client_x(), event.client_y());
                    note_push(
                        &overflowed,
                        queue.borrow_mut().push_mouse_release(x, y, button),
                    );
                }
            }) as Box<dyn FnMut(JsValue)>)
        };

        let wheel = {
            let queue = self.queue.clone();
            let overflowed = self.overflowed.clone();
            let surface = surface;
            Closure::wrap(Box::new(move |event: JsValue| {
                let event = event.unchecked_ref::<WheelEvent>();
                let (x, y) = surface.cell_at(event.client_x(), event.client_y());
                for direction in scroll_directions(event.delta_x(), event.delta_y()) {
                    note_push(
                        &overflowed,
                        queue.borrow_mut().push_mouse_scroll(direction, x, y),
                    );
                }
            }) as Box<dyn FnMut(JsValue)>)
        };

        let listeners: [(&'static str, Closure<dyn FnMut(JsValue)>); 5] = [
            ("keydown", keydown),
            ("mousemove", mousemove),
            ("mousedown", mousedown),
            ("mouseup", mouseup),
            ("wheel", wheel),
        ];
        for (name, closure) in listeners {
            let _ = self
                .window
                .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            self.listeners.push((name, closure));
        }
    }
}

/// Track push results so a full queue logs once per burst, not per event.
fn note_push(overflowed: &Rc<StdCell<bool>>, accepted: bool) {
    if accepted {
        overflowed.set(false);
    } else if !overflowed.get() {
        overflowed.set(true);
        warn!("input queue full, dropping events until the next tick");
    }
}

/// One frame of the update loop.
fn frame(driver: &Rc<RefCell<Driver>>) {
    let mut guard = driver.borrow_mut();
    let d = &mut *guard;
    let now = d.performance.now();
    let Some(elapsed) = d.tick.frame(now) else {
        // A stale callback after stop; nothing further runs.
        return;
    };

    d.views.refresh();

    let input_count = {
        let mut queue = d.queue.borrow_mut();
        let frozen = queue.swap_buffers();
        d.input_scratch.clear();
        d.input_scratch.extend(frozen.iter().map(|e| e.encode()));
        frozen.len() as u32
    };
    d.overflowed.set(false);
    let written = d.views.write_inputs(&d.input_scratch);

    // Fresh frame: all watermarks back to the baseline before the module
    // writes.
    d.grid.borrow_mut().clear();

    d.module.tick(d.app, d.input_ptr, written, elapsed);

    // The call may have grown module memory; never touch the overlays
    // through pre-growth views.
    d.views.refresh();
    if d.views.copy_overlays(&mut d.planes) {
        let mut grid = d.grid.borrow_mut();
        grid.apply_base_plane(
            &d.planes.chars,
            &d.planes.style,
            &d.planes.foreground,
            &d.planes.background,
        );
        let updates = grid.render_delta();
        drop(grid);
        trace!(
            elapsed_ms = elapsed,
            inputs = input_count,
            dirty_cells = updates.len(),
            "frame"
        );
        d.dom.apply(&updates);
    }

    if d.quit.get() {
        d.stop();
        return;
    }
    d.schedule();
}

/// Seed for the module RNG when the config does not pin one.
fn random_seed() -> u32 {
    (js_sys::Math::random() * f64::from(u32::MAX)) as u32
}
