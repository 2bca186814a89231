use anyhow::Result;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cleanup::TextCleanup;
use crate::ocr::{
    self, ConfidenceEstimator, EnhancementLevel, HeuristicConfidence, OcrConfig, OcrEngine,
};
use crate::text::{EnglishFilter, StopWords, WordCounter, WordExtractor, strict_english_filter};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub level: EnhancementLevel,
    pub configs: Vec<OcrConfig>,
    pub smear_gap: u32,
    pub cleanup_timeout: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            level: EnhancementLevel::default(),
            configs: ocr::default_configs(),
            smear_gap: 12,
            cleanup_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_ocr_attempts: usize,
    pub successful_extractions: usize,
    pub average_confidence: f64,
    pub enhancement_level: EnhancementLevel,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub source_file: String,
    pub full_path: String,
    pub pages_processed: usize,
    pub pure_english_text: Vec<String>,
    pub extracted_words: Vec<String>,
    pub processing_stats: ProcessingStats,
    #[serde(default)]
    pub error: Option<String>,
}

impl DocumentResult {
    pub fn new(source_file: impl Into<String>, level: EnhancementLevel) -> Self {
        let source_file = source_file.into();
        Self {
            full_path: source_file.clone(),
            source_file,
            processing_stats: ProcessingStats {
                enhancement_level: level,
                ..ProcessingStats::default()
            },
            ..Self::default()
        }
    }

    /// Records where the document was read from; `source_file` stays the short label.
    pub fn with_full_path(mut self, full_path: impl Into<String>) -> Self {
        self.full_path = full_path.into();
        self
    }

    /// A well-formed result for a document that could not be read at all.
    pub fn failed(
        source_file: impl Into<String>,
        level: EnhancementLevel,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(source_file, level)
        }
    }
}

/// Running totals for one document; dropped if extraction is cancelled.
struct DocumentState {
    result: DocumentResult,
    confidences: Vec<f64>,
    words: WordCounter,
}

impl DocumentState {
    fn finish(mut self) -> DocumentResult {
        self.result.extracted_words = crate::text::deduplicate(&self.words);
        if !self.confidences.is_empty() {
            self.result.processing_stats.average_confidence =
                self.confidences.iter().sum::<f64>() / self.confidences.len() as f64;
        }
        self.result
    }
}

/// Runs the OCR ensemble over the pages of one document and gathers clean
/// English passages and a deduplicated vocabulary.
pub struct DocumentExtractor<'a, E, C, S = HeuristicConfidence> {
    engine: E,
    cleanup: C,
    scorer: S,
    filter: EnglishFilter,
    stop_words: &'a StopWords,
    options: ExtractOptions,
}

impl<E, C> DocumentExtractor<'static, E, C>
where
    E: OcrEngine,
    C: TextCleanup,
{
    pub fn new(engine: E, cleanup: C, options: ExtractOptions) -> Self {
        Self {
            engine,
            cleanup,
            scorer: HeuristicConfidence,
            filter: EnglishFilter::default(),
            stop_words: StopWords::english(),
            options,
        }
    }
}

impl<'a, E, C, S> DocumentExtractor<'a, E, C, S>
where
    E: OcrEngine,
    C: TextCleanup,
    S: ConfidenceEstimator,
{
    pub fn with_scorer<T: ConfidenceEstimator>(self, scorer: T) -> DocumentExtractor<'a, E, C, T> {
        DocumentExtractor {
            engine: self.engine,
            cleanup: self.cleanup,
            scorer,
            filter: self.filter,
            stop_words: self.stop_words,
            options: self.options,
        }
    }

    pub fn with_filter(mut self, filter: EnglishFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_stop_words<'b>(self, stop_words: &'b StopWords) -> DocumentExtractor<'b, E, C, S> {
        DocumentExtractor {
            engine: self.engine,
            cleanup: self.cleanup,
            scorer: self.scorer,
            filter: self.filter,
            stop_words,
            options: self.options,
        }
    }

    /// Processes `pages` strictly in order. Pages that failed to decode are
    /// counted and skipped; if every page failed the result carries an error.
    pub async fn extract<I>(&self, source_file: &str, pages: I) -> DocumentResult
    where
        I: IntoIterator<Item = Result<DynamicImage>>,
    {
        let mut state = DocumentState {
            result: DocumentResult::new(source_file, self.options.level),
            confidences: Vec::new(),
            words: WordCounter::new(),
        };
        let mut failed_pages = 0usize;
        let mut last_error = None;

        for (index, page) in pages.into_iter().enumerate() {
            state.result.pages_processed += 1;
            let page = match page {
                Ok(page) => page,
                Err(err) => {
                    warn!(page = index + 1, "failed to load page: {err:#}");
                    failed_pages += 1;
                    last_error = Some(format!("{err:#}"));
                    continue;
                }
            };
            info!(page = index + 1, source = source_file, "processing page");
            self.extract_page(&ocr::to_gray(&page), &mut state).await;
        }

        if failed_pages > 0 && failed_pages == state.result.pages_processed {
            state.result.error = Some(format!(
                "all {} page(s) failed to load: {}",
                failed_pages,
                last_error.unwrap_or_default()
            ));
        }

        let result = state.finish();
        info!(
            source = source_file,
            pages = result.pages_processed,
            passages = result.pure_english_text.len(),
            words = result.extracted_words.len(),
            average_confidence = result.processing_stats.average_confidence,
            "document finished"
        );
        result
    }

    async fn extract_page(&self, page: &GrayImage, state: &mut DocumentState) {
        if self.options.level.locates_regions() {
            let regions = ocr::locate_text_regions(page, self.options.smear_gap);
            if !regions.is_empty() {
                debug!(regions = regions.len(), "processing text regions");
                for region in &regions {
                    let crop = ocr::crop_region(page, region);
                    self.extract_unit(&crop, state).await;
                }
                return;
            }
            debug!("no text regions found; using the whole page");
        }
        self.extract_unit(page, state).await;
    }

    async fn extract_unit(&self, image: &GrayImage, state: &mut DocumentState) {
        state.result.processing_stats.total_ocr_attempts += 1;
        let ensemble = ocr::recognize(
            &self.engine,
            &self.scorer,
            image,
            self.options.level,
            &self.options.configs,
        );
        let raw = ensemble.text();
        if raw.is_empty() {
            debug!("no usable OCR candidate");
            return;
        }
        state.result.processing_stats.successful_extractions += 1;
        if ensemble.confidence() > 0.0 {
            state.confidences.push(ensemble.confidence());
        }

        if !self.filter.accepts_any_line(raw) {
            debug!("no English line in OCR text; skipping cleanup");
            return;
        }
        let Some(cleaned) = self.clean(raw).await else {
            return;
        };
        let passage = strict_english_filter(&cleaned);
        if passage.is_empty() {
            return;
        }

        let extractor = WordExtractor::new(self.stop_words, self.filter);
        state.words.extend(extractor.extract(&passage));
        state.result.pure_english_text.push(passage);
    }

    async fn clean(&self, raw: &str) -> Option<String> {
        match tokio::time::timeout(self.options.cleanup_timeout, self.cleanup.clean(raw)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                debug!("cleanup returned no text");
                None
            }
            Ok(Err(err)) => {
                warn!("cleanup failed: {err:#}");
                None
            }
            Err(_) => {
                warn!(
                    "cleanup timed out after {:.1}s",
                    self.options.cleanup_timeout.as_secs_f32()
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::{CleanupFuture, Passthrough};
    use anyhow::anyhow;
    use image::Luma;

    struct FixedEngine(&'static str);

    impl OcrEngine for FixedEngine {
        fn recognize(&self, _image: &GrayImage, _config: &OcrConfig) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FixedScore(f64);

    impl ConfidenceEstimator for FixedScore {
        fn estimate(&self, _text: &str) -> f64 {
            self.0
        }
    }

    struct FailingCleanup;

    impl TextCleanup for FailingCleanup {
        fn clean<'a>(&'a self, _raw: &'a str) -> CleanupFuture<'a> {
            Box::pin(async { Err(anyhow!("service unavailable")) })
        }
    }

    fn page() -> Result<DynamicImage> {
        Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            32,
            16,
            Luma([255]),
        )))
    }

    fn light() -> ExtractOptions {
        ExtractOptions {
            level: EnhancementLevel::Light,
            ..ExtractOptions::default()
        }
    }

    #[tokio::test]
    async fn cleanup_failure_keeps_stats_but_drops_passage() {
        let extractor =
            DocumentExtractor::new(FixedEngine("The cat sat on the mat."), FailingCleanup, light())
                .with_scorer(FixedScore(0.5));
        let result = extractor.extract("doc.pdf", vec![page()]).await;
        assert_eq!(result.processing_stats.successful_extractions, 1);
        assert!(result.pure_english_text.is_empty());
        assert!(result.extracted_words.is_empty());
        assert_eq!(result.processing_stats.average_confidence, 0.5);
    }

    #[tokio::test]
    async fn japanese_only_text_never_reaches_cleanup() {
        let extractor = DocumentExtractor::new(FixedEngine("次の問いに答えよ。"), FailingCleanup, light());
        let result = extractor.extract("doc.pdf", vec![page()]).await;
        assert_eq!(result.processing_stats.total_ocr_attempts, 1);
        assert!(result.pure_english_text.is_empty());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn every_page_failing_sets_error() {
        let extractor = DocumentExtractor::new(FixedEngine("ignored"), Passthrough, light());
        let pages: Vec<Result<DynamicImage>> =
            vec![Err(anyhow!("bad png")), Err(anyhow!("truncated"))];
        let result = extractor.extract("broken.pdf", pages).await;
        assert_eq!(result.pages_processed, 2);
        assert_eq!(result.processing_stats.total_ocr_attempts, 0);
        let error = result.error.unwrap();
        assert!(error.contains("all 2 page(s)"), "{error}");
        assert!(error.contains("truncated"), "{error}");
    }

    #[tokio::test]
    async fn one_good_page_clears_error() {
        let extractor = DocumentExtractor::new(FixedEngine("The river ran fast."), Passthrough, light());
        let result = extractor
            .extract("mixed.pdf", vec![Err(anyhow!("bad png")), page()])
            .await;
        assert_eq!(result.pages_processed, 2);
        assert!(result.error.is_none());
        assert_eq!(result.extracted_words, vec!["river", "ran", "fast"]);
    }

    #[tokio::test]
    async fn words_are_deduplicated_across_pages() {
        let extractor = DocumentExtractor::new(
            FixedEngine("The nation was proud of its naton."),
            Passthrough,
            light(),
        );
        let result = extractor.extract("doc.pdf", vec![page(), page()]).await;
        assert_eq!(result.pure_english_text.len(), 2);
        assert_eq!(result.extracted_words, vec!["nation", "proud"]);
    }

    #[tokio::test]
    async fn custom_stop_words_replace_the_english_list() {
        let stop_words = StopWords::from_words(["the", "cat"]);
        let extractor = DocumentExtractor::new(
            FixedEngine("The cat sat on the mat."),
            Passthrough,
            light(),
        )
        .with_stop_words(&stop_words);
        let result = extractor.extract("doc.pdf", vec![page()]).await;
        assert_eq!(result.extracted_words, vec!["sat", "on", "mat"]);
    }

    #[test]
    fn failed_result_is_well_formed() {
        let result = DocumentResult::failed("x.pdf", EnhancementLevel::Aggressive, "boom");
        assert_eq!(result.pages_processed, 0);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.full_path, "x.pdf");
        assert_eq!(
            result.processing_stats.enhancement_level,
            EnhancementLevel::Aggressive
        );
    }

    #[test]
    fn missing_error_serializes_as_null() {
        let result = DocumentResult::new("x.pdf", EnhancementLevel::Light)
            .with_full_path("scans/2019/x.pdf");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["error"], serde_json::Value::Null);
        assert!(value.as_object().unwrap().contains_key("error"));
        assert_eq!(value["source_file"], "x.pdf");
        assert_eq!(value["full_path"], "scans/2019/x.pdf");
    }
}
