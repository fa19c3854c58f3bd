use std::{fs, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

const APP_NAME: &str = "icy_carousel";

/// Vertical and horizontal layout constants shared by every category row.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct LayoutMetrics {
    pub title_height: f32,
    /// Gap between a category title and its posters
    pub title_spacing: f32,
    /// Gap between the bottom of one row and the next title
    pub row_spacing: f32,
    pub start_x: f32,
    pub left_padding: f32,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            title_height: 25.0,
            title_spacing: 10.0,
            row_spacing: 10.0,
            start_x: 0.0,
            left_padding: 10.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FetchOptions {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Accept self signed and otherwise invalid certificates. Some legacy image hosts need this.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; icy_carousel)".to_string()
}

fn default_accept() -> String {
    "image/webp,image/apng,image/*,*/*;q=0.8".to_string()
}

fn default_max_redirects() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            max_redirects: default_max_redirects(),
            accept_invalid_certs: true,
        }
    }
}

impl FetchOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CarouselOptions {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Offscreen item k of a full load starts after (k + 1) * stagger
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    #[serde(default = "default_scroll_load_delay_ms")]
    pub scroll_load_delay_ms: u64,
    /// Delay before re-trying a load while the surface is not ready
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_animation_ms")]
    pub animation_ms: u64,

    #[serde(default)]
    pub layout: LayoutMetrics,
    #[serde(default)]
    pub fetch: FetchOptions,

    /// Directory that `qrc:/` and `:/` references resolve against
    #[serde(default = "default_resource_root")]
    pub resource_root: PathBuf,
}

fn default_cache_capacity() -> usize {
    50
}

fn default_stagger_ms() -> u64 {
    50
}

fn default_scroll_load_delay_ms() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_animation_ms() -> u64 {
    300
}

fn default_resource_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for CarouselOptions {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            stagger_ms: default_stagger_ms(),
            scroll_load_delay_ms: default_scroll_load_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            animation_ms: default_animation_ms(),
            layout: LayoutMetrics::default(),
            fetch: FetchOptions::default(),
            resource_root: default_resource_root(),
        }
    }
}

impl CarouselOptions {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn scroll_load_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_load_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load_options() -> Self {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "GitHub", APP_NAME) {
            if !proj_dirs.config_dir().exists() && fs::create_dir_all(proj_dirs.config_dir()).is_err() {
                log::error!("Can't create configuration directory {:?}", proj_dirs.config_dir());
                return Self::default();
            }
            let options_file = proj_dirs.config_dir().join("options.toml");
            if options_file.exists() {
                match fs::read_to_string(options_file) {
                    Ok(txt) => match Self::from_toml(&txt) {
                        Ok(result) => return result,
                        Err(err) => log::error!("Error parsing options file: {}", err),
                    },
                    Err(err) => log::error!("Error reading options file: {}", err),
                }
            }
        }
        Self::default()
    }

    pub fn store_options(&self) {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "GitHub", APP_NAME) {
            let file_name = proj_dirs.config_dir().join("options.toml");
            match toml::to_string(self) {
                Ok(text) => {
                    if let Err(err) = fs::write(file_name, text) {
                        log::error!("Error writing options file: {}", err);
                    }
                }
                Err(err) => log::error!("Error writing options file: {}", err),
            }
        }
    }

    /// Returns the directory options and logs are stored in
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "GitHub", APP_NAME).map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
    }
}
