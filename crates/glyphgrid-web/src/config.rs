#![forbid(unsafe_code)]

//! Application configuration.
//!
//! The JS host hands over a plain JSON object; required fields are validated
//! eagerly so a misconfigured page fails at boot instead of rendering into an
//! undefined state. Styling knobs all have defaults.

use serde::Deserialize;
use std::fmt;

/// Default capacity of the input queue and the module-side input buffer.
pub const DEFAULT_INPUT_CAPACITY: usize = 1024;

/// Boot configuration for a glyphgrid application.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// URL of the application module, fetched at boot.
    pub module_url: String,
    /// Id of the DOM element the grid mounts into.
    pub mount_id: String,
    /// Grid width in cells. The grid is never resized.
    pub grid_width: u16,
    /// Grid height in cells.
    pub grid_height: u16,
    /// Storage key for the persisted blob. Persistence is disabled when
    /// absent.
    #[serde(default)]
    pub storage_key: Option<String>,
    /// RNG seed passed to the module constructor; random when absent.
    #[serde(default)]
    pub seed: Option<u32>,
    /// Capacity of the input queue and the module-side input buffer.
    #[serde(default = "default_input_capacity")]
    pub input_capacity: usize,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: String,
    #[serde(default = "default_line_height")]
    pub line_height: String,
}

fn default_input_capacity() -> usize {
    DEFAULT_INPUT_CAPACITY
}

fn default_font_family() -> String {
    "monospace".to_string()
}

fn default_font_size() -> String {
    "16px".to_string()
}

fn default_line_height() -> String {
    "1em".to_string()
}

impl AppConfig {
    /// A config with the given required fields and default styling.
    #[must_use]
    pub fn new(module_url: &str, mount_id: &str, grid_width: u16, grid_height: u16) -> Self {
        Self {
            module_url: module_url.to_string(),
            mount_id: mount_id.to_string(),
            grid_width,
            grid_height,
            storage_key: None,
            seed: None,
            input_capacity: DEFAULT_INPUT_CAPACITY,
            font_family: default_font_family(),
            font_size: default_font_size(),
            line_height: default_line_height(),
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the required fields. Construction must fail on a config that
    /// would render into an undefined state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_url.is_empty() {
            return Err(ConfigError::MissingField("module_url"));
        }
        if self.mount_id.is_empty() {
            return Err(ConfigError::MissingField("mount_id"));
        }
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::ZeroGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if self.input_capacity == 0 {
            return Err(ConfigError::ZeroInputCapacity);
        }
        Ok(())
    }

    /// Number of cells in the grid.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        usize::from(self.grid_width) * usize::from(self.grid_height)
    }

    /// The stylesheet fragment injected at mount: monospace cell sizing plus
    /// the bold/underline classes the render deltas toggle.
    #[must_use]
    pub fn stylesheet(&self) -> String {
        format!(
            concat!(
                ".glyphgrid {{ line-height: {line_height}; }}\n",
                ".glyphgrid .cell {{ font-family: {font_family}; font-size: {font_size}; }}\n",
                ".glyphgrid .bold {{ font-weight: bold; }}\n",
                ".glyphgrid .underline {{ text-decoration: underline; }}\n",
                ".glyphgrid br {{ line-height: 0px; margin: 0px; padding: 0px; }}\n",
            ),
            line_height = self.line_height,
            font_family = self.font_family,
            font_size = self.font_size,
        )
    }
}

/// Configuration rejected at boot.
#[derive(Debug)]
pub enum ConfigError {
    /// The JSON did not parse into a config.
    Parse(serde_json::Error),
    /// A required field was absent or empty.
    MissingField(&'static str),
    /// The grid must have at least one cell in each dimension.
    ZeroGrid { width: u16, height: u16 },
    /// The input queue needs room for at least one event.
    ZeroInputCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "config JSON did not parse: {err}"),
            Self::MissingField(field) => write!(f, "config field `{field}` must be populated"),
            Self::ZeroGrid { width, height } => {
                write!(f, "grid dimensions must be nonzero (got {width}x{height})")
            }
            Self::ZeroInputCapacity => write!(f, "input_capacity must be nonzero"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_gets_defaults() {
        let config = AppConfig::from_json(
            r#"{"module_url":"app.wasm","mount_id":"terminal","grid_width":80,"grid_height":30}"#,
        )
        .expect("minimal config should parse");
        assert_eq!(config.input_capacity, DEFAULT_INPUT_CAPACITY);
        assert_eq!(config.font_family, "monospace");
        assert_eq!(config.storage_key, None);
        assert_eq!(config.seed, None);
        assert_eq!(config.cell_count(), 2400);
    }

    #[test]
    fn zero_grid_is_fatal() {
        let mut config = AppConfig::new("app.wasm", "terminal", 0, 30);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroGrid { width: 0, .. })
        ));
        config.grid_width = 80;
        config.grid_height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_required_fields_are_fatal() {
        let config = AppConfig::new("", "terminal", 80, 30);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("module_url"))
        ));
        let config = AppConfig::new("app.wasm", "", 80, 30);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("mount_id"))
        ));
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        assert!(matches!(
            AppConfig::from_json("{"),
            Err(ConfigError::Parse(_))
        ));
        // Missing required field fails at the serde layer.
        assert!(AppConfig::from_json(r#"{"mount_id":"t"}"#).is_err());
    }

    #[test]
    fn stylesheet_reflects_styling_knobs() {
        let mut config = AppConfig::new("app.wasm", "terminal", 10, 10);
        config.font_size = "20px".to_string();
        let css = config.stylesheet();
        assert!(css.contains("font-size: 20px"));
        assert!(css.contains(".glyphgrid .bold"));
        assert!(css.contains(".glyphgrid .underline"));
    }
}
