use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

/// Animation and choreography timings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timings {
    /// Upper bound on waiting for a page entrance animation.
    pub page_animation_timeout_ms: u64,
    /// Menu entry never waits longer than this for its animation.
    pub menu_entry_ceiling_ms: u64,
    pub button_fade_delay_ms: u64,
    pub title_dismiss_delay_ms: u64,
    pub question_stagger_ms: u64,
    /// Upper bound on waiting for fade/slide transitions inside a page.
    pub fade_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            page_animation_timeout_ms: 700,
            menu_entry_ceiling_ms: 300,
            button_fade_delay_ms: 300,
            title_dismiss_delay_ms: 5_000,
            question_stagger_ms: 800,
            fade_timeout_ms: 600,
        }
    }
}

impl Timings {
    pub fn page_animation_timeout(&self) -> Duration {
        Duration::from_millis(self.page_animation_timeout_ms)
    }

    pub fn menu_entry_ceiling(&self) -> Duration {
        Duration::from_millis(self.menu_entry_ceiling_ms)
    }

    pub fn button_fade_delay(&self) -> Duration {
        Duration::from_millis(self.button_fade_delay_ms)
    }

    pub fn title_dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.title_dismiss_delay_ms)
    }

    pub fn question_stagger(&self) -> Duration {
        Duration::from_millis(self.question_stagger_ms)
    }

    pub fn fade_timeout(&self) -> Duration {
        Duration::from_millis(self.fade_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub timings: Timings,
    pub reduced_motion: bool,
    pub debug: bool,
    /// When false the account layer is replaced by `DisabledBackend`.
    pub cloud_enabled: bool,
    pub oauth_providers: Vec<String>,
    /// Triangle marker glide speed, pixels per frame.
    pub triangle_speed: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timings: Timings::default(),
            reduced_motion: false,
            debug: false,
            cloud_enabled: true,
            oauth_providers: vec!["google".into(), "github".into()],
            triangle_speed: 6.0,
        }
    }
}

impl AppConfig {
    /// Applies `BETTERLIFE_*` environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(debug) = env_flag("BETTERLIFE_DEBUG") {
            self.debug = debug;
        }
        if let Some(reduced) = env_flag("BETTERLIFE_REDUCED_MOTION") {
            self.reduced_motion = reduced;
        }
        if let Some(cloud) = env_flag("BETTERLIFE_CLOUD") {
            self.cloud_enabled = cloud;
        }
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}

pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<AppConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed config {}: {err}", path.display());
                AppConfig::default()
            })
        } else {
            AppConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data.with_env_overrides()),
        })
    }

    pub fn config(&self) -> AppConfig {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, config: AppConfig) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = config;
        self.persist(&guard)
    }

    fn persist(&self, data: &AppConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }
}
