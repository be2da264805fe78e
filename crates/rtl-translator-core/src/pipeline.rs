//! Page-by-page orchestration: extract, filter, chunk, translate, fit, draw.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::TranslationCache;
use crate::cancel::CancelToken;
use crate::config::{AppConfig, TextColor};
use crate::error::{Error, Result};
use crate::extract::{BlockId, DropReason, NoiseFilter, TextBlock, extract_blocks};
use crate::layout::{FitParams, Overflow, fit_text};
use crate::pdf::{
    BlockSink, DrawStyle, FontResource, GeometrySource, PageRaster, PdfDocument, PdfWriter,
    sample_background,
};
use crate::text::{FixedWidth, TextMeasure, chunk_text, clean_text, join_chunks};
use crate::translator::{Chunk, Outcome, TranslationClient, Translator};

/// Average advance (in ems) assumed when a dry run has no usable font.
const FALLBACK_ADVANCE: f32 = 0.5;

/// Called with `(pages_done, total_pages)` after every page.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// One translated block, kept for the dry-run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunSample {
    pub block: BlockId,
    pub original: String,
    pub translated: String,
}

/// What happened during a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub pages: usize,
    /// Pages whose geometry could not be read (treated as empty)
    pub pages_failed: usize,
    pub blocks_considered: usize,
    pub blocks_dropped: usize,
    pub dropped_by_reason: BTreeMap<&'static str, usize>,
    pub blocks_translated: usize,
    /// Blocks where at least one chunk kept its original text
    pub blocks_failed: usize,
    pub blocks_elided: usize,
    pub blocks_shrunk: usize,
    /// Blocks the renderer refused (logged, run continued)
    pub blocks_not_drawn: usize,
    pub cache_hits: usize,
    pub chunks_fetched: usize,
    pub samples: Vec<DryRunSample>,
    pub dry_run: bool,
}

impl RunReport {
    fn record_drop(&mut self, reason: DropReason) {
        self.blocks_dropped += 1;
        *self.dropped_by_reason.entry(reason.as_str()).or_default() += 1;
    }
}

/// Ignores everything; used when nothing is drawn.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl BlockSink for NullSink {
    fn draw_block(&mut self, _: usize, _: &crate::layout::FittedLayout, _: TextColor) -> Result<()> {
        Ok(())
    }
}

/// A block that passed the filters, with its slice of the page's chunks.
struct Survivor {
    block: TextBlock,
    text: String,
    chunks: std::ops::Range<usize>,
}

/// Translates whole documents into a right-to-left language.
pub struct DocumentTranslator {
    config: AppConfig,
    client: TranslationClient,
    filter: NoiseFilter,
    cancel: CancelToken,
}

impl DocumentTranslator {
    /// Build with the cache described by `config.cache`.
    pub fn new(config: AppConfig, translator: Arc<dyn Translator>, cancel: CancelToken) -> Self {
        let cache = Arc::new(TranslationCache::open(&config.cache));
        Self::with_cache(config, translator, cache, cancel)
    }

    /// Build around an existing cache.
    pub fn with_cache(
        config: AppConfig,
        translator: Arc<dyn Translator>,
        cache: Arc<TranslationCache>,
        cancel: CancelToken,
    ) -> Self {
        let client = TranslationClient::new(translator, cache, &config.translator, cancel.clone());
        let filter = NoiseFilter::new(config.filter.clone());
        Self {
            config,
            client,
            filter,
            cancel,
        }
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &TranslationCache {
        self.client.cache()
    }

    /// Translate `input` into `output` (nothing is written on a dry run).
    ///
    /// The cache is closed before returning, whatever the outcome.
    pub async fn translate_file(
        &self,
        input: &Path,
        output: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<RunReport> {
        let result = self.translate_file_inner(input, output, progress).await;
        self.client.cache().close();
        result
    }

    async fn translate_file_inner(
        &self,
        input: &Path,
        output: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<RunReport> {
        let run = &self.config.run;
        if !run.dry_run && !run.overwrite && output.exists() {
            return Err(Error::OutputExists(output.to_path_buf()));
        }

        if !self.config.target_lang.is_rtl() {
            warn!(
                "Target language '{}' is not right-to-left; text will still be right-aligned",
                self.config.target_lang
            );
        }

        let document = PdfDocument::from_file(input)?;
        info!(
            "Opened {} ({} page(s))",
            input.display(),
            document.page_count()
        );

        let font = match FontResource::from_file(&self.config.layout.font_path) {
            Ok(font) => Some(font),
            Err(e) if run.dry_run => {
                warn!("{}; dry run measures with an approximate width", e);
                None
            }
            Err(e) => return Err(e),
        };

        if run.dry_run {
            let report = match &font {
                Some(font) => {
                    self.translate_pages(&document, font, &mut NullSink, progress.as_ref())
                        .await?
                }
                None => {
                    self.translate_pages(
                        &document,
                        &FixedWidth(FALLBACK_ADVANCE),
                        &mut NullSink,
                        progress.as_ref(),
                    )
                    .await?
                }
            };
            info!("Dry run finished; {} not written", output.display());
            return Ok(report);
        }

        let Some(font) = font else {
            return Err(Error::FontLoad {
                path: self.config.layout.font_path.clone(),
                reason: "font unavailable".to_string(),
            });
        };

        let style = DrawStyle {
            text_color: self.config.layout.text_color,
            debug_overlay: self.config.layout.debug_overlay,
        };
        let mut writer = PdfWriter::new(document.bytes(), &font, style)?;
        let report = self
            .translate_pages(&document, &font, &mut writer, progress.as_ref())
            .await?;
        debug!("{} page(s) received translated text", writer.touched_pages());

        let bytes = writer.finish()?;
        std::fs::write(output, bytes).map_err(|e| Error::OutputWrite {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Wrote {}", output.display());

        Ok(report)
    }

    /// Run every page of `source` through the pipeline, drawing into `sink`.
    ///
    /// Per-block problems are logged and counted; only cancellation stops
    /// the run early.
    pub async fn translate_pages<S, M>(
        &self,
        source: &S,
        measure: &M,
        sink: &mut dyn BlockSink,
        progress: Option<&ProgressCallback>,
    ) -> Result<RunReport>
    where
        S: GeometrySource + ?Sized,
        M: TextMeasure,
    {
        let total = source.page_count();
        let mut report = RunReport {
            dry_run: self.config.run.dry_run,
            ..RunReport::default()
        };

        for page in 0..total {
            self.cancel.check()?;
            self.translate_page(source, page, measure, sink, &mut report)
                .await?;
            report.pages += 1;
            if let Some(callback) = progress {
                callback(page + 1, total);
            }
        }

        info!(
            "Pages: {}, blocks: {} considered, {} dropped, {} translated, {} failed, {} elided, {} shrunk",
            report.pages,
            report.blocks_considered,
            report.blocks_dropped,
            report.blocks_translated,
            report.blocks_failed,
            report.blocks_elided,
            report.blocks_shrunk
        );
        info!(
            "Chunks: {} from cache, {} fetched",
            report.cache_hits, report.chunks_fetched
        );

        Ok(report)
    }

    async fn translate_page<S, M>(
        &self,
        source: &S,
        page: usize,
        measure: &M,
        sink: &mut dyn BlockSink,
        report: &mut RunReport,
    ) -> Result<()>
    where
        S: GeometrySource + ?Sized,
        M: TextMeasure,
    {
        let geometry = match source.page_geometry(page) {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!(page, kind = e.kind(), "Treating page as empty: {}", e);
                report.pages_failed += 1;
                return Ok(());
            }
        };

        let blocks = extract_blocks(&geometry, &self.config.extract);
        report.blocks_considered += blocks.len();

        let mut survivors = Vec::new();
        let mut chunks = Vec::new();
        for block in blocks {
            self.cancel.check()?;
            let text = clean_text(&block.text);
            if let Some(reason) = self.filter.classify(&text, &block.rect) {
                debug!(block = %block.id(), %reason, "Dropped {:?}", text);
                report.record_drop(reason);
                continue;
            }

            let start = chunks.len();
            chunks.extend(
                chunk_text(&text, self.config.chunking.max_chars)
                    .into_iter()
                    .map(|piece| Chunk {
                        text: piece,
                        origin: block.id(),
                        source: self.config.source_lang.clone(),
                        target: self.config.target_lang.clone(),
                    }),
            );
            if chunks.len() == start {
                report.record_drop(DropReason::Empty);
                continue;
            }
            survivors.push(Survivor {
                block,
                text,
                chunks: start..chunks.len(),
            });
        }

        if survivors.is_empty() {
            debug!(page, "No translatable blocks");
            return Ok(());
        }

        let results = self.client.translate_batch(&chunks).await;
        let raster = self.page_raster(source, page);
        let params = FitParams::from_config(&self.config.layout);

        for survivor in survivors {
            self.cancel.check()?;
            let block = &survivor.block;
            let block_results = &results[survivor.chunks.clone()];

            let mut failed = 0;
            for result in block_results {
                match result.outcome {
                    Outcome::Hit => report.cache_hits += 1,
                    Outcome::Fetched => report.chunks_fetched += 1,
                    Outcome::Failed => failed += 1,
                }
            }
            if failed > 0 {
                warn!(
                    page,
                    block = %block.id(),
                    rect = ?block.rect,
                    kind = "translation_failed",
                    "{} of {} chunk(s) keep their original text",
                    failed,
                    block_results.len()
                );
                report.blocks_failed += 1;
            } else {
                report.blocks_translated += 1;
            }

            let translated = join_chunks(
                &block_results
                    .iter()
                    .map(|r| r.translated_text.as_str())
                    .collect::<Vec<_>>(),
            );

            let layout = fit_text(&translated, &block.rect, measure, params);
            match layout.overflow {
                Some(Overflow::Elided) => report.blocks_elided += 1,
                Some(Overflow::Shrunk) => report.blocks_shrunk += 1,
                None => {}
            }
            debug!(
                block = %block.id(),
                "Fitted {} line(s) at {}pt",
                layout.lines.len(),
                layout.font_size
            );

            if self.config.run.dry_run {
                if report.samples.len() < self.config.run.dry_run_preview {
                    report.samples.push(DryRunSample {
                        block: block.id(),
                        original: survivor.text.clone(),
                        translated,
                    });
                }
                continue;
            }

            let background = raster
                .as_ref()
                .map_or_else(TextColor::white, |r| sample_background(r, &block.rect));
            if let Err(e) = sink.draw_block(page, &layout, background) {
                warn!(
                    page,
                    block = %block.id(),
                    rect = ?block.rect,
                    kind = e.kind(),
                    "Block not drawn: {}",
                    e
                );
                report.blocks_not_drawn += 1;
            }
        }

        Ok(())
    }

    fn page_raster<S: GeometrySource + ?Sized>(&self, source: &S, page: usize) -> Option<PageRaster> {
        if self.config.run.dry_run || !self.config.layout.sample_background {
            return None;
        }
        match source.page_raster(page) {
            Ok(raster) => raster,
            Err(e) => {
                warn!(page, kind = e.kind(), "Background sampling unavailable: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_drop_counts_by_reason() {
        let mut report = RunReport::default();
        report.record_drop(DropReason::Url);
        report.record_drop(DropReason::Url);
        report.record_drop(DropReason::Label);
        assert_eq!(report.blocks_dropped, 3);
        assert_eq!(report.dropped_by_reason.get("url"), Some(&2));
        assert_eq!(report.dropped_by_reason.get("label"), Some(&1));
    }

    #[test]
    fn test_null_sink_accepts_blocks() {
        let layout = fit_text(
            "سلام",
            &crate::extract::Rect::new(0.0, 0.0, 100.0, 20.0),
            &FixedWidth(0.5),
            FitParams::from_config(&crate::config::LayoutConfig::default()),
        );
        assert!(NullSink.draw_block(0, &layout, TextColor::white()).is_ok());
    }
}
