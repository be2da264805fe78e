//! RTL Translator Core Library
//!
//! Translates the text of PDF documents into a right-to-left language while
//! keeping the page layout:
//! - Block extraction, deduplication and noise filtering
//! - Cached, batched, retrying translation requests
//! - Arabic-script shaping, bidi reordering and measured line wrapping
//! - Font-size fitting and drawing back into the source rectangles

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod extract;
pub mod layout;
pub mod pdf;
pub mod pipeline;
pub mod text;
pub mod translator;
pub mod util;

pub use cache::{CacheKey, TranslationCache};
pub use cancel::{CancelHandle, CancelToken};
pub use config::{
    AppConfig, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG, Lang, SOURCE_LANGUAGES, TextColor,
    TranslatorConfig,
};
pub use error::{Error, Result};
pub use extract::{BlockId, DropReason, PageGeometry, Rect, TextBlock, TextFragment};
pub use layout::{FitParams, FittedLayout, Overflow, fit_text};
pub use pdf::{BlockSink, FontResource, GeometrySource, PdfDocument, PdfWriter};
pub use pipeline::{DocumentTranslator, DryRunSample, NullSink, ProgressCallback, RunReport};
pub use translator::{
    Chunk, GoogleTranslator, Outcome, TranslationClient, TranslationResult, Translator,
    create_translator,
};
pub use util::{default_output_path, translation_cache_path};
