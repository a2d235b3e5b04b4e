#![forbid(unsafe_code)]

use crate::config::AppConfig;
use crate::driver::Driver;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::wasm_bindgen;

/// A booted glyphgrid application.
///
/// `boot` fetches and instantiates the module, mounts the DOM grid, and
/// loads the persisted blob; `start` begins the frame loop and input
/// capture; `stop` halts both, finally.
#[wasm_bindgen]
pub struct GlyphGridApp {
    driver: Rc<RefCell<Driver>>,
}

#[wasm_bindgen]
impl GlyphGridApp {
    /// Boot an application from a JSON config string.
    ///
    /// Required fields: `module_url`, `mount_id`, `grid_width`,
    /// `grid_height`. Optional: `storage_key`, `seed`, `input_capacity`,
    /// and the styling knobs `font_family`, `font_size`, `line_height`.
    pub async fn boot(config_json: String) -> Result<GlyphGridApp, JsValue> {
        console_error_panic_hook::set_once();
        let config =
            AppConfig::from_json(&config_json).map_err(|err| JsValue::from_str(&err.to_string()))?;
        let driver = Driver::boot(config).await.map_err(JsValue::from)?;
        Ok(Self { driver })
    }

    /// Start the frame loop. Rejects a second start.
    pub fn start(&self) -> Result<(), JsValue> {
        self.driver
            .borrow_mut()
            .start()
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Stop the frame loop and input capture. Idempotent and final: no
    /// further ticks or input processing occur after this returns.
    pub fn stop(&self) {
        self.driver.borrow_mut().stop();
    }
}
