use anyhow::{Result, anyhow};
use exam_vocab_ocr::cleanup::{CleanupFuture, Passthrough, TextCleanup};
use exam_vocab_ocr::ocr::{ConfidenceEstimator, EnhancementLevel, OcrConfig, OcrEngine};
use exam_vocab_ocr::{DocumentExtractor, ExtractOptions};
use image::{DynamicImage, GrayImage, Luma};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Reads white pages as `text` and anything else as blank.
struct PageEngine {
    text: &'static str,
    calls: AtomicUsize,
}

impl PageEngine {
    fn new(text: &'static str) -> Self {
        Self {
            text,
            calls: AtomicUsize::new(0),
        }
    }
}

impl OcrEngine for PageEngine {
    fn recognize(&self, image: &GrayImage, _config: &OcrConfig) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.get_pixel(0, 0)[0] == 255 {
            Ok(self.text.to_string())
        } else {
            Ok(String::new())
        }
    }
}

struct FixedScore(f64);

impl ConfidenceEstimator for FixedScore {
    fn estimate(&self, _text: &str) -> f64 {
        self.0
    }
}

struct SlowCleanup;

impl TextCleanup for SlowCleanup {
    fn clean<'a>(&'a self, raw: &'a str) -> CleanupFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(raw.to_string())
        })
    }
}

fn white_page() -> Result<DynamicImage> {
    Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        64,
        32,
        Luma([255]),
    )))
}

fn black_page() -> Result<DynamicImage> {
    Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        64,
        32,
        Luma([0]),
    )))
}

fn options(level: EnhancementLevel) -> ExtractOptions {
    ExtractOptions {
        level,
        ..ExtractOptions::default()
    }
}

#[tokio::test]
async fn single_sentence_page_yields_content_words() {
    let extractor = DocumentExtractor::new(
        PageEngine::new("The cat sat on the mat."),
        Passthrough,
        options(EnhancementLevel::Standard),
    )
    .with_scorer(FixedScore(0.9));

    let result = extractor.extract("exam.pdf", vec![white_page()]).await;

    assert_eq!(result.pages_processed, 1);
    assert_eq!(result.extracted_words, vec!["cat", "sat", "mat"]);
    assert_eq!(result.pure_english_text, vec!["The cat sat on the mat."]);
    assert!((result.processing_stats.average_confidence - 0.9).abs() < 1e-9);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn blank_page_counts_but_is_left_out_of_the_average() {
    let extractor = DocumentExtractor::new(
        PageEngine::new("The cat sat on the mat."),
        Passthrough,
        options(EnhancementLevel::Light),
    )
    .with_scorer(FixedScore(0.9));

    let result = extractor
        .extract("exam.pdf", vec![white_page(), black_page()])
        .await;

    assert_eq!(result.pages_processed, 2);
    assert_eq!(result.processing_stats.total_ocr_attempts, 2);
    assert_eq!(result.processing_stats.successful_extractions, 1);
    assert_eq!(result.extracted_words, vec!["cat", "sat", "mat"]);
    assert!((result.processing_stats.average_confidence - 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn all_blank_document_is_well_formed() {
    let extractor = DocumentExtractor::new(
        PageEngine::new("unused"),
        Passthrough,
        options(EnhancementLevel::Light),
    );

    let result = extractor.extract("empty.pdf", vec![black_page(), black_page()]).await;

    assert_eq!(result.pages_processed, 2);
    assert_eq!(result.processing_stats.successful_extractions, 0);
    assert!(result.extracted_words.is_empty());
    assert!(result.pure_english_text.is_empty());
    assert_eq!(result.processing_stats.average_confidence, 0.0);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn aggressive_mode_without_regions_reads_whole_page() {
    let engine = PageEngine::new("When the rain stopped, we walked home.");
    let extractor = DocumentExtractor::new(&engine, Passthrough, options(EnhancementLevel::Aggressive));

    let result = extractor.extract("exam.pdf", vec![white_page()]).await;

    assert!(result.error.is_none());
    assert_eq!(result.processing_stats.total_ocr_attempts, 1);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 6 * 4);
    assert_eq!(result.extracted_words, vec!["rain", "stopped", "walked", "home"]);
}

#[tokio::test]
async fn aggressive_mode_reads_each_region() {
    let mut page = GrayImage::from_pixel(200, 120, Luma([245]));
    for (x0, y0) in [(20u32, 20u32), (20, 70)] {
        for y in y0..y0 + 12 {
            for x in x0..x0 + 80 {
                page.put_pixel(x, y, Luma([10]));
            }
        }
    }
    let engine = PageEngine::new("ignored");
    let extractor = DocumentExtractor::new(&engine, Passthrough, options(EnhancementLevel::Aggressive));

    let result = extractor
        .extract("exam.pdf", vec![Ok(DynamicImage::ImageLuma8(page))])
        .await;

    assert_eq!(result.processing_stats.total_ocr_attempts, 2);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2 * 6 * 4);
}

#[tokio::test]
async fn slow_cleanup_times_out_without_failing_the_document() {
    let extractor = DocumentExtractor::new(
        PageEngine::new("The cat sat on the mat."),
        SlowCleanup,
        ExtractOptions {
            level: EnhancementLevel::Light,
            cleanup_timeout: Duration::from_millis(20),
            ..ExtractOptions::default()
        },
    );

    let result = extractor.extract("exam.pdf", vec![white_page()]).await;

    assert_eq!(result.processing_stats.successful_extractions, 1);
    assert!(result.pure_english_text.is_empty());
    assert!(result.extracted_words.is_empty());
    assert!(result.error.is_none());
}

#[tokio::test]
async fn result_serializes_with_stable_field_names() {
    let extractor = DocumentExtractor::new(
        PageEngine::new("The cat sat on the mat."),
        Passthrough,
        options(EnhancementLevel::Light),
    )
    .with_scorer(FixedScore(0.75));

    let result = extractor
        .extract("exam.pdf", vec![white_page(), Err(anyhow!("bad scan"))])
        .await
        .with_full_path("scans/2019/exam.pdf");

    insta::assert_json_snapshot!(result, @r#"
    {
      "source_file": "exam.pdf",
      "full_path": "scans/2019/exam.pdf",
      "pages_processed": 2,
      "pure_english_text": [
        "The cat sat on the mat."
      ],
      "extracted_words": [
        "cat",
        "sat",
        "mat"
      ],
      "processing_stats": {
        "total_ocr_attempts": 1,
        "successful_extractions": 1,
        "average_confidence": 0.75,
        "enhancement_level": "light"
      },
      "error": null
    }
    "#);
}
