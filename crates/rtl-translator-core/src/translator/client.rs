use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::retry::{RetryPolicy, retry_with_backoff};
use super::traits::Translator;
use crate::cache::{CacheKey, TranslationCache};
use crate::cancel::CancelToken;
use crate::config::{Lang, TranslatorConfig};
use crate::error::Error;
use crate::extract::BlockId;

/// A unit of text sent for translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub origin: BlockId,
    pub source: Lang,
    pub target: Lang,
}

impl Chunk {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.text, &self.source, &self.target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from the cache
    Hit,
    /// Translated by the service in this call
    Fetched,
    /// Could not be translated; `translated_text` holds the original
    Failed,
}

#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub chunk: Chunk,
    pub translated_text: String,
    pub outcome: Outcome,
}

/// One deduplicated miss and the input positions waiting on it.
struct Pending {
    key: CacheKey,
    text: String,
    source: Lang,
    target: Lang,
    positions: Vec<usize>,
}

/// Cache-fronted, batching, retrying access to a [`Translator`].
pub struct TranslationClient {
    translator: Arc<dyn Translator>,
    cache: Arc<TranslationCache>,
    policy: RetryPolicy,
    batch_size: usize,
    max_batch_chars: usize,
    cancel: CancelToken,
}

impl TranslationClient {
    pub fn new(
        translator: Arc<dyn Translator>,
        cache: Arc<TranslationCache>,
        config: &TranslatorConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            translator,
            cache,
            policy: RetryPolicy::from_config(config),
            batch_size: config.batch_size.max(1),
            max_batch_chars: config.max_batch_chars.max(1),
            cancel,
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Translate `chunks`, returning one result per chunk in input order.
    ///
    /// Never fails as a whole: batches that exhaust their retries (or are
    /// cut short by cancellation) yield [`Outcome::Failed`] results carrying
    /// the original text.
    pub async fn translate_batch(&self, chunks: &[Chunk]) -> Vec<TranslationResult> {
        let mut resolved: Vec<Option<(String, Outcome)>> = vec![None; chunks.len()];
        let mut pending: Vec<Pending> = Vec::new();
        let mut by_key: HashMap<CacheKey, usize> = HashMap::new();

        for (i, chunk) in chunks.iter().enumerate() {
            let key = chunk.cache_key();
            if let Some(&slot) = by_key.get(&key) {
                pending[slot].positions.push(i);
                continue;
            }
            if let Some(cached) = self.cache.get(&key).await {
                resolved[i] = Some((cached, Outcome::Hit));
                continue;
            }
            by_key.insert(key.clone(), pending.len());
            pending.push(Pending {
                key,
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                target: chunk.target.clone(),
                positions: vec![i],
            });
        }

        debug!(
            "{} chunk(s): {} cached, {} unique miss(es)",
            chunks.len(),
            resolved.iter().filter(|r| r.is_some()).count(),
            pending.len()
        );

        for batch in self.plan_batches(&pending) {
            let translations = self.fetch(&pending, &batch).await;
            let mut entries = Vec::new();

            for (slot, translated) in batch.iter().zip(translations) {
                let item = &pending[*slot];
                let value = match translated {
                    Some(text) => {
                        entries.push((item.key.clone(), text.clone()));
                        (text, Outcome::Fetched)
                    }
                    None => (item.text.clone(), Outcome::Failed),
                };
                for &pos in &item.positions {
                    resolved[pos] = Some(value.clone());
                }
            }

            self.cache.insert_many(entries).await;
        }

        chunks
            .iter()
            .zip(resolved)
            .map(|(chunk, value)| {
                let (translated_text, outcome) =
                    value.unwrap_or_else(|| (chunk.text.clone(), Outcome::Failed));
                TranslationResult {
                    chunk: chunk.clone(),
                    translated_text,
                    outcome,
                }
            })
            .collect()
    }

    /// Group pending slots into requests sharing a language pair, bounded by
    /// item count and total characters. A single oversized text gets its own batch.
    fn plan_batches(&self, pending: &[Pending]) -> Vec<Vec<usize>> {
        let mut batches: Vec<Vec<usize>> = Vec::new();
        let mut open: HashMap<(&str, &str), (Vec<usize>, usize)> = HashMap::new();
        let mut order: Vec<(&str, &str)> = Vec::new();

        for (slot, item) in pending.iter().enumerate() {
            let pair = (item.source.as_str(), item.target.as_str());
            let len = item.text.chars().count();
            let (current, chars) = open.entry(pair).or_insert_with(|| {
                order.push(pair);
                (Vec::new(), 0)
            });

            if !current.is_empty()
                && (current.len() >= self.batch_size || *chars + len > self.max_batch_chars)
            {
                batches.push(std::mem::take(current));
                *chars = 0;
            }
            current.push(slot);
            *chars += len;
        }

        for pair in order {
            if let Some((rest, _)) = open.remove(&pair)
                && !rest.is_empty()
            {
                batches.push(rest);
            }
        }
        batches
    }

    /// One service request (with retries) for a batch; `None` marks a failed item.
    async fn fetch(&self, pending: &[Pending], batch: &[usize]) -> Vec<Option<String>> {
        let Some(&first) = batch.first() else {
            return Vec::new();
        };
        let source = &pending[first].source;
        let target = &pending[first].target;
        let texts: Vec<String> = batch.iter().map(|&s| pending[s].text.clone()).collect();

        let result = retry_with_backoff(&self.policy, &self.cancel, |_| {
            self.translator.translate_batch(&texts, source, target)
        })
        .await;

        match result {
            Ok(translations) if translations.len() == texts.len() => {
                translations.into_iter().map(Some).collect()
            }
            Ok(translations) => {
                warn!(
                    "{} returned {} translations for {} texts; keeping originals",
                    self.translator.name(),
                    translations.len(),
                    texts.len()
                );
                vec![None; texts.len()]
            }
            Err(Error::Cancelled) => {
                debug!("Batch of {} skipped: run cancelled", texts.len());
                vec![None; texts.len()]
            }
            Err(e) => {
                warn!(
                    "Batch of {} text(s) failed [{}]: {}; keeping originals",
                    texts.len(),
                    e.kind(),
                    e
                );
                vec![None; texts.len()]
            }
        }
    }
}
