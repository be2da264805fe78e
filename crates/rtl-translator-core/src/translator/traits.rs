use async_trait::async_trait;

use crate::config::Lang;
use crate::error::Result;

/// Information about a translator backend
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Whether this translator supports auto-detection of source language
    pub supports_auto_detect: bool,
}

/// Trait for translation backends
///
/// A backend answers one request per call and does not retry on its own;
/// errors are classified through [`Error::is_transient`](crate::Error::is_transient).
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Get the translator name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Translate every text in `texts`, returning one translation per input in the same order.
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &Lang,
        target: &Lang,
    ) -> Result<Vec<String>>;
}
