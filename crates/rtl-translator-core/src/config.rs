use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Language codes following ISO 639-1 (plus "auto" for detection)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the language is written right-to-left.
    pub fn is_rtl(&self) -> bool {
        let primary = self.0.split(['-', '_']).next().unwrap_or_default();
        RTL_LANGUAGES.contains(&primary.to_ascii_lowercase().as_str())
    }
}

const RTL_LANGUAGES: &[&str] = &["ar", "fa", "he", "iw", "ur", "ps", "sd", "ug", "yi", "ckb", "dv"];

fn default_source_lang() -> Lang {
    Lang::new(DEFAULT_SOURCE_LANG)
}

fn default_target_lang() -> Lang {
    Lang::new(DEFAULT_TARGET_LANG)
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// RGB colour with components in 0.0..=1.0, used for text and erasure fills
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub const fn dark_red() -> Self {
        Self::new(0.8, 0.0, 0.0)
    }

    pub const fn blue() -> Self {
        Self::new(0.0, 0.0, 0.8)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "black" => Some(Self::black()),
            "white" => Some(Self::white()),
            "darkred" | "dark_red" | "dark-red" => Some(Self::dark_red()),
            "blue" => Some(Self::blue()),
            _ => None,
        }
    }

    /// Build from 8-bit channels.
    pub fn from_rgb_bytes(r: u8, g: u8, b: u8) -> Self {
        Self::new(f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0)
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::black()
    }
}

/// Settings for the external translation service and its retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Service hosts, tried in order within one attempt
    #[serde(default = "default_service_urls")]
    pub service_urls: Vec<String>,
    /// Maximum number of texts per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum aggregate characters per request
    #[serde(default = "default_max_batch_chars")]
    pub max_batch_chars: usize,
    /// Attempt ceiling per batch (first try included)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay in milliseconds; doubles every retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_service_urls() -> Vec<String> {
    vec![
        "translate.googleapis.com".to_string(),
        "translate.google.com".to_string(),
    ]
}

const fn default_batch_size() -> usize {
    8
}

const fn default_max_batch_chars() -> usize {
    4000
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_base_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    8000
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            service_urls: default_service_urls(),
            batch_size: default_batch_size(),
            max_batch_chars: default_max_batch_chars(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Request chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk sent for translation
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

const fn default_max_chars() -> usize {
    450
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

/// Geometry thresholds used when grouping fragments into blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Max horizontal gap between fragments of one line, in line heights
    #[serde(default = "default_line_merge_gap")]
    pub line_merge_gap: f32,
    /// Max vertical gap between lines of one paragraph, in line heights
    #[serde(default = "default_paragraph_gap")]
    pub paragraph_gap: f32,
    /// Rectangle distance (points) under which identical blocks are duplicates
    #[serde(default = "default_dedup_tolerance")]
    pub dedup_tolerance: f32,
}

const fn default_line_merge_gap() -> f32 {
    1.0
}

const fn default_paragraph_gap() -> f32 {
    0.6
}

const fn default_dedup_tolerance() -> f32 {
    1.0
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            line_merge_gap: default_line_merge_gap(),
            paragraph_gap: default_paragraph_gap(),
            dedup_tolerance: default_dedup_tolerance(),
        }
    }
}

/// Noise filter toggles and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Skip blocks shorter than this many characters
    #[serde(default = "default_min_block_chars")]
    pub min_block_chars: usize,
    /// Drop blocks that are mostly URLs or e-mail addresses
    #[serde(default = "default_true")]
    pub skip_urls: bool,
    /// Drop blocks dominated by digits and symbols
    #[serde(default = "default_true")]
    pub skip_numeric: bool,
    /// Digit+symbol ratio above which a block counts as numeric noise
    #[serde(default = "default_max_symbol_ratio")]
    pub max_symbol_ratio: f32,
    /// Drop short schematic labels such as `R12` or `A-3`
    #[serde(default = "default_true")]
    pub skip_labels: bool,
    /// Drop figure, table and equation references
    #[serde(default = "default_true")]
    pub skip_figure_refs: bool,
    /// Drop blocks that contain no letters at all
    #[serde(default = "default_true")]
    pub require_letters: bool,
    /// Drop tiny blocks (small area or a single short token)
    #[serde(default)]
    pub skip_small: bool,
    /// Area threshold (square points) for `skip_small`
    #[serde(default = "default_small_block_area")]
    pub small_block_area: f32,
}

const fn default_true() -> bool {
    true
}

const fn default_min_block_chars() -> usize {
    2
}

const fn default_max_symbol_ratio() -> f32 {
    0.65
}

const fn default_small_block_area() -> f32 {
    144.0
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_block_chars: default_min_block_chars(),
            skip_urls: true,
            skip_numeric: true,
            max_symbol_ratio: default_max_symbol_ratio(),
            skip_labels: true,
            skip_figure_refs: true,
            require_letters: true,
            skip_small: false,
            small_block_area: default_small_block_area(),
        }
    }
}

/// Font fitting and drawing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// TrueType font with glyphs for the target script
    #[serde(default = "default_font_path")]
    pub font_path: PathBuf,
    #[serde(default = "default_min_font")]
    pub min_font: f32,
    #[serde(default = "default_max_font")]
    pub max_font: f32,
    /// Line advance as a multiple of the font size
    #[serde(default = "default_line_gap")]
    pub line_gap: f32,
    /// Overflow at the minimum size instead of eliding
    #[serde(default)]
    pub shrink_to_fit: bool,
    /// Outline rectangles and baselines
    #[serde(default)]
    pub debug_overlay: bool,
    #[serde(default)]
    pub text_color: TextColor,
    /// Sample the page raster for the erasure colour (white otherwise)
    #[serde(default = "default_true")]
    pub sample_background: bool,
}

fn default_font_path() -> PathBuf {
    PathBuf::from("fonts/Vazirmatn-Regular.ttf")
}

/// Largest font size accepted for `min_font` and `max_font`, in points.
pub const MAX_FONT_SIZE: f32 = 1000.0;

const fn default_min_font() -> f32 {
    7.0
}

const fn default_max_font() -> f32 {
    14.0
}

const fn default_line_gap() -> f32 {
    1.35
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_path: default_font_path(),
            min_font: default_min_font(),
            max_font: default_max_font(),
            line_gap: default_line_gap(),
            shrink_to_fit: false,
            debug_overlay: false,
            text_color: TextColor::default(),
            sample_background: true,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite file; `None` keeps translations in memory for this run only
    pub path: Option<PathBuf>,

    /// Capacity of the in-memory shadow
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: u64,
}

const fn default_memory_max_entries() -> u64 {
    100_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            memory_max_entries: default_memory_max_entries(),
        }
    }
}

/// Run-level switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Translate but never write the output document
    #[serde(default)]
    pub dry_run: bool,
    /// Number of (original, translated) samples kept for the dry-run report
    #[serde(default = "default_dry_run_preview")]
    pub dry_run_preview: usize,
    /// Replace an existing output file
    #[serde(default)]
    pub overwrite: bool,
    /// Global deadline for the whole run in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

const fn default_dry_run_preview() -> usize {
    5
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            dry_run_preview: default_dry_run_preview(),
            overwrite: false,
            timeout_secs: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source language
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Target language
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    #[serde(default)]
    pub translator: TranslatorConfig,

    #[serde(default)]
    pub chunking: ChunkConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub run: RunConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            translator: TranslatorConfig::default(),
            chunking: ChunkConfig::default(),
            extract: ExtractConfig::default(),
            filter: FilterConfig::default(),
            layout: LayoutConfig::default(),
            cache: CacheConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/rtl-translator/config.toml, ./config.toml)
    pub fn load() -> Self {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("rtl-translator").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Normalise and check values before a run.
    ///
    /// A `max_font` below `min_font` is raised to `min_font`; everything else
    /// that cannot produce a sensible layout is rejected.
    pub fn validate(mut self) -> Result<Self> {
        fn invalid(field: &str, reason: &str) -> Error {
            Error::ConfigInvalid {
                field: field.to_string(),
                reason: reason.to_string(),
            }
        }

        let layout = &mut self.layout;
        if !(layout.min_font.is_finite() && layout.min_font > 0.0) {
            return Err(invalid("layout.min_font", "must be a positive number"));
        }
        if layout.min_font > MAX_FONT_SIZE {
            return Err(invalid("layout.min_font", "must be at most 1000 points"));
        }
        if !(layout.max_font.is_finite() && layout.max_font <= MAX_FONT_SIZE) {
            return Err(invalid("layout.max_font", "must be a number up to 1000 points"));
        }
        if layout.max_font < layout.min_font {
            layout.max_font = layout.min_font;
        }
        if !(layout.line_gap.is_finite() && layout.line_gap > 0.0) {
            return Err(invalid("layout.line_gap", "must be a positive number"));
        }
        if self.chunking.max_chars == 0 {
            return Err(invalid("chunking.max_chars", "must be at least 1"));
        }
        if self.translator.max_retries == 0 {
            return Err(invalid("translator.max_retries", "must be at least 1"));
        }
        if self.translator.batch_size == 0 {
            return Err(invalid("translator.batch_size", "must be at least 1"));
        }
        if self.translator.service_urls.is_empty() {
            return Err(invalid("translator.service_urls", "needs at least one host"));
        }
        if !(0.0..=1.0).contains(&self.filter.max_symbol_ratio) {
            return Err(invalid("filter.max_symbol_ratio", "must be between 0 and 1"));
        }
        if self.target_lang.as_str() == "auto" {
            return Err(invalid("target_lang", "cannot be 'auto'"));
        }

        Ok(self)
    }
}

/// Source languages accepted by the CLI
pub const SOURCE_LANGUAGES: &[&str] = &["auto", "en", "fr"];

/// Default source language code
pub const DEFAULT_SOURCE_LANG: &str = "auto";
/// Default target language code (Persian)
pub const DEFAULT_TARGET_LANG: &str = "fa";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.source_lang.as_str(), "auto");
        assert_eq!(config.target_lang.as_str(), "fa");
        assert_eq!(config.chunking.max_chars, 450);
        assert_eq!(config.run.dry_run_preview, 5);
        assert!((config.layout.line_gap - 1.35).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_raises_max_font() {
        let mut config = AppConfig::default();
        config.layout.min_font = 9.0;
        config.layout.max_font = 6.0;
        let config = config.validate().unwrap();
        assert!((config.layout.max_font - 9.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_rejects_huge_font_sizes() {
        let mut config = AppConfig::default();
        config.layout.max_font = 1e9;
        assert!(matches!(config.validate(), Err(Error::ConfigInvalid { .. })));

        let mut config = AppConfig::default();
        config.layout.min_font = 5000.0;
        assert!(matches!(config.validate(), Err(Error::ConfigInvalid { .. })));

        let mut config = AppConfig::default();
        config.layout.max_font = MAX_FONT_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = AppConfig::default();
        config.chunking.max_chars = 0;
        assert!(matches!(config.validate(), Err(Error::ConfigInvalid { .. })));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            target_lang = "ar"

            [layout]
            shrink_to_fit = true

            [cache]
            path = "/tmp/cache.sqlite3"
            "#,
        )
        .unwrap();
        assert_eq!(config.target_lang.as_str(), "ar");
        assert!(config.layout.shrink_to_fit);
        assert!((config.layout.max_font - 14.0).abs() < f32::EPSILON);
        assert_eq!(config.translator.max_retries, 5);
        assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/cache.sqlite3")));
    }

    #[test]
    fn test_rtl_detection() {
        assert!(Lang::new("fa").is_rtl());
        assert!(Lang::new("ar-EG").is_rtl());
        assert!(!Lang::new("en").is_rtl());
    }
}
