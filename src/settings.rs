use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::compare::{DEFAULT_MERGE_EPSILON, DEFAULT_PARAGRAPH_GAP, DiffConfig, ExtractOptions, OperationConfig};
use crate::sync::SyncOptions;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagediff";

/// Diff engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSettings {
    pub batch_size: usize,
    pub complex_threshold: usize,
    pub max_word_threshold: usize,
    pub early_stop_enabled: bool,
    pub min_jaccard_unigram: f64,
    pub min_jaccard_bigram: f64,
    pub min_tokens_for_early_stop: usize,
}

impl Default for DiffSettings {
    fn default() -> Self {
        let diff = OperationConfig::default().diff;
        Self {
            batch_size: diff.batch_size,
            complex_threshold: diff.complex_threshold,
            max_word_threshold: diff.max_word_threshold,
            early_stop_enabled: diff.early_stop_enabled,
            min_jaccard_unigram: diff.min_jaccard_unigram,
            min_jaccard_bigram: diff.min_jaccard_bigram,
            min_tokens_for_early_stop: diff.min_tokens_for_early_stop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Baseline jump, in page units, that starts a new paragraph
    pub paragraph_gap: f32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            paragraph_gap: DEFAULT_PARAGRAPH_GAP,
        }
    }
}

/// Side-by-side viewer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub zoom_step: f32,
    pub wheel_threshold: f32,
    pub pinch_damping: f32,
    pub overscroll_dead_zone: f32,
    pub overscroll_step: f32,
    pub key_step: f32,
    pub highlight_epsilon: f32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        let sync = SyncOptions::default();
        Self {
            zoom_step: sync.zoom_step,
            wheel_threshold: sync.wheel_threshold,
            pinch_damping: sync.pinch_damping,
            overscroll_dead_zone: sync.overscroll_dead_zone,
            overscroll_step: sync.overscroll_step,
            key_step: sync.key_step,
            highlight_epsilon: DEFAULT_MERGE_EPSILON,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub diff: DiffSettings,

    #[serde(default)]
    pub extraction: ExtractionSettings,

    #[serde(default)]
    pub viewer: ViewerSettings,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            diff: DiffSettings::default(),
            extraction: ExtractionSettings::default(),
            viewer: ViewerSettings::default(),
        }
    }
}

impl Settings {
    /// Operation config with these settings applied over the defaults
    pub fn operation_config(&self) -> OperationConfig {
        let defaults = OperationConfig::default();
        OperationConfig {
            diff: DiffConfig {
                batch_size: self.diff.batch_size.max(1),
                complex_threshold: self.diff.complex_threshold,
                max_word_threshold: self.diff.max_word_threshold,
                early_stop_enabled: self.diff.early_stop_enabled,
                min_jaccard_unigram: self.diff.min_jaccard_unigram,
                min_jaccard_bigram: self.diff.min_jaccard_bigram,
                min_tokens_for_early_stop: self.diff.min_tokens_for_early_stop,
                ..defaults.diff
            },
            extract: ExtractOptions {
                paragraph_gap: self.extraction.paragraph_gap,
            },
            warnings: defaults.warnings,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            zoom_step: self.viewer.zoom_step,
            wheel_threshold: self.viewer.wheel_threshold,
            pinch_damping: self.viewer.pinch_damping,
            overscroll_dead_zone: self.viewer.overscroll_dead_zone,
            overscroll_step: self.viewer.overscroll_step,
            key_step: self.viewer.key_step,
            ..SyncOptions::default()
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load the settings file, creating it with defaults when missing
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

pub fn load_settings_from_path(path: &Path) {
    match read_settings(path) {
        Ok(mut settings) => {
            debug!("Loaded settings from {path:?}");

            if settings.version < CURRENT_VERSION {
                migrate_settings(&mut settings);
                save_settings_to_file(&settings, path);
            }

            if let Ok(mut global) = SETTINGS.write() {
                *global = settings;
            }
        }
        Err(e) => error!("Failed to load settings file {path:?}: {e}"),
    }
}

fn read_settings(path: &Path) -> anyhow::Result<Settings> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str::<Settings>(&content)?)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pagediff settings
# ============================================================================
# diff.batch_size          tokens per diff window
# diff.complex_threshold   word count above which accuracy may degrade
# diff.max_word_threshold  word count above which runs are slow
# extraction.paragraph_gap baseline jump in page units that starts a paragraph
# viewer.*                 zoom, wheel, pinch and overscroll tuning
# viewer.highlight_epsilon gap (fraction of the page) under which highlights merge

"#;

// Public API for accessing settings

pub fn get_settings() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn get_operation_config() -> OperationConfig {
    get_settings().operation_config()
}

pub fn get_sync_options() -> SyncOptions {
    get_settings().sync_options()
}

pub fn get_highlight_epsilon() -> f32 {
    SETTINGS
        .read()
        .map(|s| s.viewer.highlight_epsilon)
        .unwrap_or(DEFAULT_MERGE_EPSILON)
}

pub fn set_batch_size(batch_size: usize) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.diff.batch_size = batch_size;
    }
}
