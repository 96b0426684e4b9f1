//! WebView node configuration
//!
//! Settings are loaded from `webview.toml` (or defaults when the file is
//! missing) and then overridden by `WEBVIEW_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default file name looked up in the current directory.
pub const CONFIG_FILE: &str = "webview.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WebViewConfig {
    /// Native window settings
    pub window: WindowConfig,
    /// Initial content settings
    pub content: ContentConfig,
    /// Native library settings
    pub native: NativeConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Native window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title applied when the surface is created
    pub title: String,
    /// Width applied when the surface is created
    pub width: i32,
    /// Height applied when the surface is created
    pub height: i32,
    /// Minimum width reported to the host layout
    pub min_width: i32,
    /// Minimum height reported to the host layout
    pub min_height: i32,
}

/// Initial content configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// URL to load when the node becomes ready
    pub initial_url: Option<String>,
    /// Page shown when no URL or HTML has been requested
    pub default_html: String,
}

/// Native library configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NativeConfig {
    /// Path to the webview shared library, or the directory containing it
    pub library_path: Option<PathBuf>,
    /// Enable developer tools in created surfaces
    pub debug: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter directive, e.g. `info` or `webview::owner=debug`
    pub filter: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "WebView".to_string(),
            width: 1024,
            height: 768,
            min_width: 100,
            min_height: 100,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            initial_url: None,
            default_html: "<h1>WebView initialized</h1><p>No content has been requested yet.</p>"
                .to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl WebViewConfig {
    /// Load configuration from a TOML file
    ///
    /// # Returns
    /// * `Ok(WebViewConfig)` - Successfully loaded configuration
    /// * `Err(String)` - Error message if loading failed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load `webview.toml` from the current directory, or defaults if it doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file(CONFIG_FILE).unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        self.merge_with(|key| std::env::var(key).ok());
    }

    /// Merge overrides from an arbitrary variable source
    pub fn merge_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Window settings
        if let Some(title) = lookup("WEBVIEW_TITLE") {
            self.window.title = title;
        }
        if let Some(width) = lookup("WEBVIEW_WIDTH").and_then(|v| v.parse().ok()) {
            self.window.width = width;
        }
        if let Some(height) = lookup("WEBVIEW_HEIGHT").and_then(|v| v.parse().ok()) {
            self.window.height = height;
        }

        // Content settings
        if let Some(url) = lookup("WEBVIEW_URL") {
            self.content.initial_url = Some(url).filter(|u| !u.is_empty());
        }

        // Native settings
        if let Some(path) = lookup("WEBVIEW_LIB_PATH") {
            self.native.library_path = Some(PathBuf::from(path));
        }
        if let Some(val) = lookup("WEBVIEW_DEBUG") {
            self.native.debug = parse_flag(&val);
        }

        // Logging settings
        if let Some(filter) = lookup("WEBVIEW_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from `webview.toml` (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}
