mod client;
mod google;
mod retry;
mod traits;

pub use client::{Chunk, Outcome, TranslationClient, TranslationResult};
pub use google::{GoogleTranslator, parse_batch_response};
pub use retry::{RetryPolicy, backoff_delay, retry_with_backoff};
pub use traits::{Translator, TranslatorInfo};

use crate::config::TranslatorConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create the translation backend from configuration
pub fn create_translator(config: &TranslatorConfig) -> Result<Arc<dyn Translator>> {
    Ok(Arc::new(GoogleTranslator::new(config)?))
}
