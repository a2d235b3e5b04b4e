#![forbid(unsafe_code)]

//! Application module hosting: fetch, instantiation, exports, and the `env`
//! imports the module calls back into.
//!
//! The module is an opaque box behind a small ABI. Consumed exports:
//! `alloc_app`, `tick`, `alloc_byte_buffer`, `free_byte_buffer`, and the
//! growable `memory`. Provided imports (`env`): `get_width`/`get_height`
//! (answering with the configured grid size), `set_bufs` (publishes the
//! overlay buffer offsets), `set_cell` (direct depth-tagged compositor
//! writes), `store` (persistence request), and `quit`.

use crate::config::ConfigError;
use crate::storage::BlobStore;
use glyphgrid_core::cell::{CellWrite, StyleFlags};
use glyphgrid_core::grid::Grid;
use glyphgrid_core::memory::OverlayLayout;
use std::cell::{Cell as StdCell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::Response;

/// Errors that abort boot.
#[derive(Debug)]
pub enum BootError {
    /// Outside a browsing context (no `window`).
    NoWindow,
    /// A required host API was absent.
    MissingHostApi(&'static str),
    /// The mount element was not found in the document.
    MountMissing(String),
    /// A DOM operation failed while building the grid.
    Dom(&'static str),
    /// Fetching the module failed.
    Fetch(String),
    /// `WebAssembly.instantiate` rejected.
    Instantiate(String),
    /// The module lacks a required export.
    MissingExport(&'static str),
    /// A module call returned something other than a number.
    BadReturn(&'static str),
    /// The configuration was rejected.
    Config(ConfigError),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWindow => write!(f, "no window: not running in a browsing context"),
            Self::MissingHostApi(api) => write!(f, "host API `{api}` is unavailable"),
            Self::MountMissing(id) => write!(f, "mount element `#{id}` not found"),
            Self::Dom(what) => write!(f, "DOM operation failed: {what}"),
            Self::Fetch(err) => write!(f, "module fetch failed: {err}"),
            Self::Instantiate(err) => write!(f, "module instantiation failed: {err}"),
            Self::MissingExport(name) => write!(f, "module is missing export `{name}`"),
            Self::BadReturn(name) => write!(f, "module export `{name}` returned a non-number"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for BootError {}

impl From<ConfigError> for BootError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<BootError> for JsValue {
    fn from(err: BootError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

fn js_error_string(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

/// Fetch the module binary.
pub async fn fetch_module_bytes(url: &str) -> Result<Vec<u8>, BootError> {
    let window = web_sys::window().ok_or(BootError::NoWindow)?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|err| BootError::Fetch(js_error_string(&err)))?
        .unchecked_into();
    if !response.ok() {
        return Err(BootError::Fetch(format!(
            "{url}: HTTP {}",
            response.status()
        )));
    }
    let buffer = JsFuture::from(
        response
            .array_buffer()
            .map_err(|err| BootError::Fetch(js_error_string(&err)))?,
    )
    .await
    .map_err(|err| BootError::Fetch(js_error_string(&err)))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

/// Pieces of host state the `env` imports write into. Each is its own
/// shared cell so an import firing mid-`tick` never contends with a borrow
/// the driver is holding.
pub struct HostHooks {
    /// Overlay offsets published by `set_bufs`.
    pub layout: Rc<RefCell<Option<OverlayLayout>>>,
    /// The cell grid, written by `set_cell`.
    pub grid: Rc<RefCell<Grid>>,
    /// Module memory, filled in right after instantiation (the `store`
    /// import needs it to copy the blob out).
    pub memory: Rc<RefCell<Option<js_sys::WebAssembly::Memory>>>,
    /// Set when the module asks the host to stop.
    pub quit: Rc<StdCell<bool>>,
    /// Persistence binding; `None` disables the `store` import.
    pub storage: Option<Rc<StorageBinding>>,
}

/// A store plus the key the application persists under.
pub struct StorageBinding {
    pub store: BlobStore,
    pub key: String,
}

/// The `env` import object, plus the closures backing it (they must outlive
/// the module instance).
pub struct EnvImports {
    pub object: js_sys::Object,
    _get_width: Closure<dyn FnMut() -> u32>,
    _get_height: Closure<dyn FnMut() -> u32>,
    _set_bufs: Closure<dyn FnMut(u32, u32, u32, u32)>,
    _set_cell: Closure<dyn FnMut(i32, i32, i32, u32, u32, u32, u32)>,
    _store: Closure<dyn FnMut(u32, u32)>,
    _quit: Closure<dyn FnMut()>,
}

/// Build the import object for `WebAssembly.instantiate`.
pub fn build_env(grid_width: u16, grid_height: u16, hooks: &HostHooks) -> EnvImports {
    let get_width = {
        let width = u32::from(grid_width);
        Closure::wrap(Box::new(move || width) as Box<dyn FnMut() -> u32>)
    };
    let get_height = {
        let height = u32::from(grid_height);
        Closure::wrap(Box::new(move || height) as Box<dyn FnMut() -> u32>)
    };

    let set_bufs = {
        let layout = hooks.layout.clone();
        Closure::wrap(Box::new(move |chars: u32, style: u32, fg: u32, bg: u32| {
            debug!(chars, style, fg, bg, "module published overlay offsets");
            *layout.borrow_mut() = Some(OverlayLayout {
                chars,
                style,
                foreground: fg,
                background: bg,
            });
        }) as Box<dyn FnMut(u32, u32, u32, u32)>)
    };

    let set_cell = {
        let grid = hooks.grid.clone();
        Closure::wrap(Box::new(
            move |x: i32, y: i32, depth: i32, ch: u32, style: u32, fg: u32, bg: u32| {
                let flags = StyleFlags::from_bits_truncate((style & 0xff) as u8);
                let write = CellWrite {
                    character: char::from_u32(ch),
                    bold: Some(flags.contains(StyleFlags::BOLD)),
                    underline: Some(flags.contains(StyleFlags::UNDERLINE)),
                    foreground: Some(fg),
                    background: Some(bg),
                };
                grid.borrow_mut().set(x, y, depth, &write);
            },
        ) as Box<dyn FnMut(i32, i32, i32, u32, u32, u32, u32)>)
    };

    let store = {
        let memory = hooks.memory.clone();
        let storage = hooks.storage.clone();
        Closure::wrap(Box::new(move |ptr: u32, len: u32| {
            // Copy out synchronously: the module may reuse this span as soon
            // as we return.
            let Some(memory) = memory.borrow().clone() else {
                warn!("store request before module memory was registered");
                return;
            };
            let buffer: js_sys::ArrayBuffer = memory.buffer().unchecked_into();
            let view = js_sys::Uint8Array::new_with_byte_offset_and_length(
                buffer.as_ref(),
                ptr,
                len,
            );
            let bytes = view.to_vec();
            match &storage {
                Some(binding) => {
                    let binding = binding.clone();
                    spawn_local(async move {
                        if let Err(err) = binding.store.store(&binding.key, &bytes).await {
                            warn!(key = %binding.key, error = %err, "persisting blob failed");
                        }
                    });
                }
                None => warn!(len, "module requested persistence but no storage key is configured"),
            }
        }) as Box<dyn FnMut(u32, u32)>)
    };

    let quit = {
        let flag = hooks.quit.clone();
        Closure::wrap(Box::new(move || {
            debug!("module requested quit");
            flag.set(true);
        }) as Box<dyn FnMut()>)
    };

    let env = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&env, &"get_width".into(), get_width.as_ref());
    let _ = js_sys::Reflect::set(&env, &"get_height".into(), get_height.as_ref());
    let _ = js_sys::Reflect::set(&env, &"set_bufs".into(), set_bufs.as_ref());
    let _ = js_sys::Reflect::set(&env, &"set_cell".into(), set_cell.as_ref());
    let _ = js_sys::Reflect::set(&env, &"store".into(), store.as_ref());
    let _ = js_sys::Reflect::set(&env, &"quit".into(), quit.as_ref());

    let imports = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&imports, &"env".into(), &env);

    EnvImports {
        object: imports,
        _get_width: get_width,
        _get_height: get_height,
        _set_bufs: set_bufs,
        _set_cell: set_cell,
        _store: store,
        _quit: quit,
    }
}

/// Instantiate the module over the import object.
pub async fn instantiate(
    bytes: &[u8],
    imports: &js_sys::Object,
) -> Result<js_sys::WebAssembly::Instance, BootError> {
    let result = JsFuture::from(js_sys::WebAssembly::instantiate_buffer(bytes, imports))
        .await
        .map_err(|err| BootError::Instantiate(js_error_string(&err)))?;
    let instance = js_sys::Reflect::get(&result, &"instance".into())
        .map_err(|err| BootError::Instantiate(js_error_string(&err)))?;
    instance
        .dyn_into()
        .map_err(|_| BootError::Instantiate("result has no instance".to_string()))
}

/// The module's exports, resolved once at boot.
pub struct ModuleAbi {
    tick: js_sys::Function,
    alloc_app: js_sys::Function,
    alloc_byte_buffer: js_sys::Function,
    free_byte_buffer: Option<js_sys::Function>,
    size_query: Option<(js_sys::Function, js_sys::Function)>,
    memory: js_sys::WebAssembly::Memory,
}

impl ModuleAbi {
    pub fn from_instance(instance: &js_sys::WebAssembly::Instance) -> Result<Self, BootError> {
        let exports = instance.exports();
        let memory = required(&exports, "memory")?
            .dyn_into()
            .map_err(|_| BootError::MissingExport("memory"))?;
        let size_query = match (optional_fn(&exports, "get_width"), optional_fn(&exports, "get_height"))
        {
            (Some(width), Some(height)) => Some((width, height)),
            _ => None,
        };
        Ok(Self {
            tick: required_fn(&exports, "tick")?,
            alloc_app: required_fn(&exports, "alloc_app")?,
            alloc_byte_buffer: required_fn(&exports, "alloc_byte_buffer")?,
            free_byte_buffer: optional_fn(&exports, "free_byte_buffer"),
            size_query,
            memory,
        })
    }

    #[must_use]
    pub fn memory(&self) -> &js_sys::WebAssembly::Memory {
        &self.memory
    }

    /// Allocate a byte buffer inside module memory.
    pub fn alloc_byte_buffer(&self, len: u32) -> Result<u32, BootError> {
        let value = self
            .alloc_byte_buffer
            .call1(&JsValue::NULL, &JsValue::from_f64(f64::from(len)))
            .map_err(|err| BootError::Instantiate(js_error_string(&err)))?;
        value
            .as_f64()
            .map(|ptr| ptr as u32)
            .ok_or(BootError::BadReturn("alloc_byte_buffer"))
    }

    /// Return a buffer to the module.
    pub fn free_byte_buffer(&self, ptr: u32, len: u32) {
        if let Some(free) = &self.free_byte_buffer {
            let _ = free.call2(
                &JsValue::NULL,
                &JsValue::from_f64(f64::from(ptr)),
                &JsValue::from_f64(f64::from(len)),
            );
        }
    }

    /// Construct the application, handing over the initial blob by value
    /// when persistence is configured.
    pub fn alloc_app(&self, seed: u32, blob_span: Option<(u32, u32)>) -> Result<f64, BootError> {
        let seed = JsValue::from_f64(f64::from(seed));
        let value = match blob_span {
            Some((ptr, len)) => self.alloc_app.call3(
                &JsValue::NULL,
                &seed,
                &JsValue::from_f64(f64::from(ptr)),
                &JsValue::from_f64(f64::from(len)),
            ),
            None => self.alloc_app.call1(&JsValue::NULL, &seed),
        }
        .map_err(|err| BootError::Instantiate(js_error_string(&err)))?;
        value.as_f64().ok_or(BootError::BadReturn("alloc_app"))
    }

    /// One synchronous update step. A trapping module is reported, not
    /// propagated: rendering carries on with whatever state the overlays
    /// hold.
    pub fn tick(&self, app: f64, input_ptr: u32, input_count: u32, elapsed_ms: f64) {
        let args = js_sys::Array::of4(
            &JsValue::from_f64(app),
            &JsValue::from_f64(f64::from(input_ptr)),
            &JsValue::from_f64(f64::from(input_count)),
            &JsValue::from_f64(elapsed_ms),
        );
        if let Err(err) = self.tick.apply(&JsValue::NULL, &args) {
            warn!(error = %js_error_string(&err), "module tick trapped");
        }
    }

    /// The module's own idea of the grid size, when it exports the query
    /// pair.
    #[must_use]
    pub fn exported_size(&self) -> Option<(u32, u32)> {
        let (get_width, get_height) = self.size_query.as_ref()?;
        let width = get_width.call0(&JsValue::NULL).ok()?.as_f64()?;
        let height = get_height.call0(&JsValue::NULL).ok()?.as_f64()?;
        Some((width as u32, height as u32))
    }

    /// Copy a blob into module memory at `ptr`.
    pub fn write_bytes(&self, ptr: u32, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let buffer: js_sys::ArrayBuffer = self.memory.buffer().unchecked_into();
        let view = js_sys::Uint8Array::new_with_byte_offset_and_length(
            buffer.as_ref(),
            ptr,
            bytes.len() as u32,
        );
        view.copy_from(bytes);
    }
}

fn required(exports: &js_sys::Object, name: &'static str) -> Result<JsValue, BootError> {
    let value = js_sys::Reflect::get(exports.as_ref(), &JsValue::from_str(name))
        .map_err(|_| BootError::MissingExport(name))?;
    if value.is_undefined() {
        Err(BootError::MissingExport(name))
    } else {
        Ok(value)
    }
}

fn required_fn(exports: &js_sys::Object, name: &'static str) -> Result<js_sys::Function, BootError> {
    required(exports, name)?
        .dyn_into()
        .map_err(|_| BootError::MissingExport(name))
}

fn optional_fn(exports: &js_sys::Object, name: &str) -> Option<js_sys::Function> {
    js_sys::Reflect::get(exports.as_ref(), &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into().ok())
}
