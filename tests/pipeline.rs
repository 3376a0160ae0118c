//! Integration tests for the extraction pipeline.
//!
//! The rasterizer and recognizer are replaced by in-process fakes, so these
//! run everywhere without tesseract or poppler installed. Each fake page is a
//! blank PNG whose width selects what the fake recognizer "reads" from it.

use async_trait::async_trait;
use futures::StreamExt;
use image::{DynamicImage, RgbImage};
use ocr_extract::{
    BoundingBox, Deadline, ExtractError, ExtractionConfig, ExtractionProgressCallback, Extractor,
    PageError, PdfRasterizer, RecognitionError, RecognizedToken, Recognizer, UploadedDocument,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Page widths understood by [`FakeRecognizer`].
const HOLA: u32 = 10;
const BLANK: u32 = 20;
const BROKEN: u32 = 30;
const TWO_WORDS: u32 = 40;
const UNSCORED: u32 = 50;

fn blank_png(width: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(width, 8))
}

fn png_bytes(width: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    blank_png(width)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Writes one `page-N.png` per configured width.
struct FakeRasterizer {
    widths: Vec<u32>,
    calls: AtomicUsize,
}

impl FakeRasterizer {
    fn new(widths: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            widths: widths.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PdfRasterizer for FakeRasterizer {
    async fn rasterize_pdf(&self, pdf: &Path, out_dir: &Path, _dpi: u32) -> Result<(), ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(pdf.exists(), "staged pdf must exist while rasterizing");
        for (i, w) in self.widths.iter().enumerate() {
            blank_png(*w)
                .save(out_dir.join(format!("page-{}.png", i + 1)))
                .map_err(|e| ExtractError::RasterizationFailed {
                    detail: e.to_string(),
                })?;
        }
        Ok(())
    }
}

/// Never returns; used to exercise the deadline.
struct StuckRasterizer;

#[async_trait]
impl PdfRasterizer for StuckRasterizer {
    async fn rasterize_pdf(&self, _pdf: &Path, _out_dir: &Path, _dpi: u32) -> Result<(), ExtractError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

fn token(text: &str, x: u32, confidence: f32) -> RecognizedToken {
    RecognizedToken {
        page: 0,
        text: text.to_string(),
        confidence,
        bbox: BoundingBox {
            x,
            y: 4,
            width: 40,
            height: 12,
        },
    }
}

/// Reads the page width and answers accordingly.
#[derive(Default)]
struct FakeRecognizer {
    languages: Mutex<Vec<String>>,
}

impl FakeRecognizer {
    fn tokens_for(width: u32) -> Result<Vec<RecognizedToken>, RecognitionError> {
        match width {
            HOLA => Ok(vec![token("Hola", 10, 0.95)]),
            BLANK => Ok(vec![token("   ", 10, 0.40)]),
            BROKEN => Err(RecognitionError::EngineFailed("engine crashed".into())),
            TWO_WORDS => Ok(vec![token("Buenos", 10, 0.91), token("días", 60, 0.87)]),
            UNSCORED => Ok(vec![token("raro", 10, f32::NAN), token("alto", 60, 3.0)]),
            other => Ok(vec![token(&format!("w{other}"), 10, 0.5)]),
        }
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn extract_plain_text(
        &self,
        image: &DynamicImage,
        language: &str,
        _deadline: Deadline,
    ) -> Result<String, RecognitionError> {
        self.languages.lock().unwrap().push(language.to_string());
        let words = Self::tokens_for(image.width())?;
        Ok(words
            .iter()
            .map(|t| t.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    async fn extract_with_layout(
        &self,
        image: &DynamicImage,
        language: &str,
        _deadline: Deadline,
    ) -> Result<Vec<RecognizedToken>, RecognitionError> {
        self.languages.lock().unwrap().push(language.to_string());
        Self::tokens_for(image.width())
    }
}

/// Takes `delay` per page, giving up when the request deadline passes.
struct SlowRecognizer {
    delay: Duration,
    inner: FakeRecognizer,
}

impl SlowRecognizer {
    async fn wait(&self, deadline: Deadline) -> Result<(), RecognitionError> {
        tokio::time::timeout_at(deadline.at(), tokio::time::sleep(self.delay))
            .await
            .map_err(|_| RecognitionError::Cancelled)
    }
}

#[async_trait]
impl Recognizer for SlowRecognizer {
    async fn extract_plain_text(
        &self,
        image: &DynamicImage,
        language: &str,
        deadline: Deadline,
    ) -> Result<String, RecognitionError> {
        self.wait(deadline).await?;
        self.inner.extract_plain_text(image, language, deadline).await
    }

    async fn extract_with_layout(
        &self,
        image: &DynamicImage,
        language: &str,
        deadline: Deadline,
    ) -> Result<Vec<RecognizedToken>, RecognitionError> {
        self.wait(deadline).await?;
        self.inner.extract_with_layout(image, language, deadline).await
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Harness {
    _root: TempDir,
    output_dir: PathBuf,
    staging_dir: PathBuf,
}

/// Route library logs to the test harness; set RUST_LOG to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        let root = tempfile::tempdir().unwrap();
        let output_dir = root.path().join("outputs");
        let staging_dir = root.path().join("staging");
        std::fs::create_dir_all(&staging_dir).unwrap();
        Self {
            _root: root,
            output_dir,
            staging_dir,
        }
    }

    fn config(&self) -> ExtractionConfig {
        self.builder().build().unwrap()
    }

    fn builder(&self) -> ocr_extract::ExtractionConfigBuilder {
        ExtractionConfig::builder()
            .language("spa")
            .output_dir(&self.output_dir)
            .staging_dir(&self.staging_dir)
    }

    fn extractor(&self, widths: &[u32]) -> Extractor {
        Extractor::with_backends(
            self.config(),
            FakeRasterizer::new(widths),
            Arc::new(FakeRecognizer::default()),
        )
    }

    fn staging_entries(&self) -> usize {
        std::fs::read_dir(&self.staging_dir).unwrap().count()
    }

    fn output_entries(&self) -> Vec<String> {
        match std::fs::read_dir(&self.output_dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn pdf(name: &str) -> UploadedDocument {
    UploadedDocument::new(name, b"%PDF-1.4 fake".to_vec())
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_page_pdf_with_one_empty_page() {
    let h = Harness::new();
    let extractor = h.extractor(&[HOLA, BLANK]);

    let out = extractor.extract(pdf("scan.pdf")).await.unwrap();

    assert_eq!(out.filename, "scan.pdf");
    assert_eq!(out.result.total_pages, 2);
    assert_eq!(out.result.total_tokens, 1);
    assert_eq!(out.result.full_text, "--- Página 1 ---\nHola");
    assert!(!out.result.full_text.contains("Página 2"));

    let t = &out.result.tokens[0];
    assert_eq!(t.page, 1);
    assert_eq!(t.text, "Hola");
    assert!((t.confidence - 0.95).abs() < 1e-6);
    assert_eq!(out.stats.failed_pages, 0);
}

#[tokio::test]
async fn artifacts_share_one_identifier_and_are_readable() {
    let h = Harness::new();
    let out = h.extractor(&[HOLA]).extract(pdf("scan.pdf")).await.unwrap();

    assert!(out.warnings.is_empty());
    assert_eq!(out.downloads.written(), 3);
    let id = out.downloads.id;
    let mut names = h.output_entries();
    names.sort();
    assert_eq!(names, vec![format!("{id}.json"), format!("{id}.md"), format!("{id}.txt")]);

    let txt = std::fs::read_to_string(&out.downloads.txt.as_ref().unwrap().path).unwrap();
    assert_eq!(txt, out.result.full_text);

    let md = std::fs::read_to_string(&out.downloads.markdown.as_ref().unwrap().path).unwrap();
    assert!(md.starts_with("# scan.pdf\n\n**Total de páginas:** 1  \n**Palabras detectadas:** 1  \n**Fecha:** "));
    assert!(md.ends_with("---\n\n--- Página 1 ---\nHola"));

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&out.downloads.json.as_ref().unwrap().path).unwrap()).unwrap();
    assert_eq!(json["filename"], "scan.pdf");
    assert_eq!(json["total_lines"], 1);
    assert_eq!(json["total_pages"], 1);
    assert_eq!(json["boxes"][0]["bbox"]["width"], 40);
    assert!(json["processed_at"].is_string());
    assert_eq!(out.downloads.txt.as_ref().unwrap().url, format!("/outputs/{id}.txt"));
}

#[tokio::test]
async fn wire_payload_keeps_result_field_names() {
    let h = Harness::new();
    let out = h.extractor(&[TWO_WORDS]).extract(pdf("a.pdf")).await.unwrap();
    let v = serde_json::to_value(&out).unwrap();
    for key in ["filename", "full_text", "boxes", "total_lines", "total_pages", "processed_at", "downloads"] {
        assert!(v.get(key).is_some(), "missing key {key}");
    }
    assert!(v.get("warnings").is_none());
}

#[tokio::test]
async fn unsupported_extension_is_rejected_before_staging() {
    let h = Harness::new();
    let rasterizer = FakeRasterizer::new(&[HOLA]);
    let extractor = Extractor::with_backends(
        h.config(),
        rasterizer.clone(),
        Arc::new(FakeRecognizer::default()),
    );

    let err = extractor
        .extract(UploadedDocument::new("photo.gif", b"GIF89a".to_vec()))
        .await
        .unwrap_err();

    match err {
        ExtractError::UnsupportedFormat { filename, extension } => {
            assert_eq!(filename, "photo.gif");
            assert_eq!(extension, "gif");
        }
        other => panic!("expected UnsupportedFormat, got {other:?}"),
    }
    assert_eq!(h.staging_entries(), 0);
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    assert!(h.output_entries().is_empty());
}

#[tokio::test]
async fn zero_page_pdf_fails_without_artifacts() {
    let h = Harness::new();
    let err = h.extractor(&[]).extract(pdf("empty.pdf")).await.unwrap_err();
    assert!(matches!(err, ExtractError::RasterizationFailed { .. }), "{err:?}");
    assert!(h.output_entries().is_empty());
    assert_eq!(h.staging_entries(), 0);
}

#[tokio::test]
async fn staging_directory_is_removed_after_success_and_failure() {
    let h = Harness::new();
    let extractor = h.extractor(&[HOLA, BROKEN]);
    extractor.extract(pdf("ok.pdf")).await.unwrap();
    assert_eq!(h.staging_entries(), 0);

    let err = extractor
        .extract(UploadedDocument::new("bad.png", b"not a png".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::DecodeError { .. }), "{err:?}");
    assert_eq!(h.staging_entries(), 0);
}

#[tokio::test]
async fn failing_page_degrades_to_empty_result() {
    let h = Harness::new();
    let out = h
        .extractor(&[HOLA, BROKEN, TWO_WORDS])
        .extract(pdf("mixed.pdf"))
        .await
        .unwrap();

    assert_eq!(out.result.total_pages, 3);
    assert_eq!(out.result.total_tokens, 3);
    assert_eq!(out.stats.failed_pages, 1);
    assert_eq!(
        out.result.full_text,
        "--- Página 1 ---\nHola\n\n--- Página 3 ---\nBuenos días"
    );
}

#[tokio::test]
async fn image_upload_is_a_single_page() {
    let h = Harness::new();
    let rasterizer = FakeRasterizer::new(&[]);
    let extractor = Extractor::with_backends(
        h.config(),
        rasterizer.clone(),
        Arc::new(FakeRecognizer::default()),
    );

    let out = extractor
        .extract(UploadedDocument::new("IMG_001.JPG", {
            let mut buf = std::io::Cursor::new(Vec::new());
            blank_png(HOLA)
                .write_to(&mut buf, image::ImageFormat::Jpeg)
                .unwrap();
            buf.into_inner()
        }))
        .await
        .unwrap();

    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(out.result.total_pages, 1);
    assert_eq!(out.result.tokens[0].page, 1);
}

#[tokio::test]
async fn png_upload_is_decoded_in_process() {
    let h = Harness::new();
    let out = h
        .extractor(&[])
        .extract(UploadedDocument::new("scan.png", png_bytes(TWO_WORDS)))
        .await
        .unwrap();
    assert_eq!(out.result.full_text, "--- Página 1 ---\nBuenos días");
}

#[tokio::test]
async fn tokens_are_in_page_order_with_normalized_confidence() {
    let h = Harness::new();
    let out = h
        .extractor(&[TWO_WORDS, HOLA, 55, TWO_WORDS])
        .extract(pdf("long.pdf"))
        .await
        .unwrap();

    assert!(out.result.tokens.windows(2).all(|w| w[0].page <= w[1].page));
    assert!(out
        .result
        .tokens
        .iter()
        .all(|t| (0.0..=1.0).contains(&t.confidence) && !t.text.trim().is_empty()));
    assert!(out.result.tokens.iter().all(|t| (1..=4).contains(&t.page)));
    assert_eq!(out.result.total_tokens, out.result.tokens.len());
}

#[tokio::test]
async fn same_input_gives_same_result() {
    let h = Harness::new();
    let extractor = h.extractor(&[HOLA, TWO_WORDS]);
    let a = extractor.extract(pdf("x.pdf")).await.unwrap();
    let b = extractor.extract(pdf("x.pdf")).await.unwrap();

    assert_eq!(a.result.full_text, b.result.full_text);
    assert_eq!(a.result.tokens, b.result.tokens);
    assert_ne!(a.downloads.id, b.downloads.id);
}

#[tokio::test]
async fn persistence_failure_is_a_warning_not_an_error() {
    let h = Harness::new();
    // An output path occupied by a regular file fails every write.
    std::fs::create_dir_all(&h.output_dir).unwrap();
    std::fs::write(h.output_dir.join("blocker"), b"").unwrap();
    let config = h.builder().output_dir(h.output_dir.join("blocker")).build().unwrap();

    let extractor = Extractor::with_backends(
        config,
        FakeRasterizer::new(&[HOLA]),
        Arc::new(FakeRecognizer::default()),
    );
    let out = extractor.extract(pdf("scan.pdf")).await.unwrap();

    assert_eq!(out.result.total_tokens, 1);
    assert_eq!(out.downloads.written(), 0);
    assert_eq!(out.warnings.len(), 3);
}

#[tokio::test]
async fn expired_deadline_cancels_rasterization() {
    let h = Harness::new();
    let config = h.builder().timeout_secs(1).build().unwrap();
    let extractor = Extractor::with_backends(
        config,
        Arc::new(StuckRasterizer),
        Arc::new(FakeRecognizer::default()),
    );

    let err = extractor.extract(pdf("slow.pdf")).await.unwrap_err();
    assert!(matches!(err, ExtractError::Cancelled { .. }), "{err:?}");
    assert_eq!(h.staging_entries(), 0);
    assert!(h.output_entries().is_empty());
}

#[tokio::test]
async fn deadline_during_recognition_cancels_remaining_pages() {
    let h = Harness::new();
    let recorder = Arc::new(Recorder::default());
    let config = h
        .builder()
        .timeout_secs(1)
        .progress_callback(recorder.clone() as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap();
    let recognizer = SlowRecognizer {
        delay: Duration::from_millis(700),
        inner: FakeRecognizer::default(),
    };
    let extractor = Extractor::with_backends(
        config,
        FakeRasterizer::new(&[HOLA, TWO_WORDS, HOLA]),
        Arc::new(recognizer),
    );

    let out = extractor.extract(pdf("late.pdf")).await.unwrap();

    assert_eq!(out.result.total_pages, 3);
    assert_eq!(out.result.total_tokens, 1);
    assert!(out.result.tokens.iter().all(|t| t.page == 1));
    assert_eq!(out.result.full_text, "--- Página 1 ---\nHola");
    assert_eq!(out.stats.failed_pages, 2);
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start 3", "ok 1 1", "err 2", "err 3", "done 1/3"]
    );
    assert_eq!(
        *recorder.errors.lock().unwrap(),
        vec![
            PageError::Cancelled { page: 2 }.to_string(),
            PageError::Cancelled { page: 3 }.to_string(),
        ]
    );

    assert!(out.warnings.is_empty());
    assert_eq!(out.downloads.written(), 3);
    assert_eq!(h.output_entries().len(), 3);
    assert_eq!(h.staging_entries(), 0);
}

#[tokio::test]
async fn engine_confidence_outside_unit_range_is_sanitized() {
    let h = Harness::new();
    let out = h.extractor(&[UNSCORED]).extract(pdf("odd.pdf")).await.unwrap();

    let confidences: Vec<f32> = out.result.tokens.iter().map(|t| t.confidence).collect();
    assert_eq!(confidences, vec![0.0, 1.0]);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let h = Harness::new();
    let config = h.builder().max_upload_bytes(4).build().unwrap();
    let extractor = Extractor::with_backends(
        config,
        FakeRasterizer::new(&[HOLA]),
        Arc::new(FakeRecognizer::default()),
    );
    let err = extractor.extract(pdf("big.pdf")).await.unwrap_err();
    assert!(matches!(err, ExtractError::UploadTooLarge { limit: 4, .. }), "{err:?}");
    assert_eq!(h.staging_entries(), 0);
}

#[tokio::test]
async fn configured_language_reaches_the_recognizer() {
    let h = Harness::new();
    let recognizer = Arc::new(FakeRecognizer::default());
    let config = h.builder().language("eng").build().unwrap();
    let extractor = Extractor::with_backends(config, FakeRasterizer::new(&[HOLA, HOLA]), recognizer.clone());

    let out = extractor.extract(pdf("a.pdf")).await.unwrap();
    assert_eq!(extractor.language(), "eng");
    assert_eq!(*recognizer.languages.lock().unwrap(), vec!["eng", "eng"]);
    assert!(out.result.full_text.starts_with("--- Page 1 ---\n"));
}

// ── Plain text, streaming, progress ──────────────────────────────────────────

#[tokio::test]
async fn plain_text_mode_writes_no_artifacts() {
    let h = Harness::new();
    let text = h
        .extractor(&[HOLA, BLANK, BROKEN, TWO_WORDS])
        .extract_text(pdf("scan.pdf"))
        .await
        .unwrap();

    assert_eq!(text, "--- Página 1 ---\nHola\n\n--- Página 4 ---\nBuenos días");
    assert!(h.output_entries().is_empty());
    assert_eq!(h.staging_entries(), 0);
}

#[tokio::test]
async fn stream_yields_pages_in_order_and_cleans_up() {
    let h = Harness::new();
    let extractor = h.extractor(&[HOLA, BROKEN, TWO_WORDS]);

    let stream = extractor.extract_stream(pdf("s.pdf")).await.unwrap();
    assert_eq!(h.staging_entries(), 1);

    let pages: Vec<_> = stream.collect().await;
    assert_eq!(pages.iter().map(|p| p.page_num).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(matches!(pages[1].error, Some(PageError::RecognitionFailed { page: 2, .. })));
    assert_eq!(pages[2].text, "Buenos días");
    assert_eq!(h.staging_entries(), 0);
    assert!(h.output_entries().is_empty());
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_extraction_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }
    fn on_page_complete(&self, page_num: usize, _total: usize, token_count: usize) {
        self.events.lock().unwrap().push(format!("ok {page_num} {token_count}"));
    }
    fn on_page_error(&self, page_num: usize, _total: usize, error: &str) {
        self.events.lock().unwrap().push(format!("err {page_num}"));
        self.errors.lock().unwrap().push(error.to_string());
    }
    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_pages}"));
    }
}

#[tokio::test]
async fn progress_events_follow_page_order() {
    let h = Harness::new();
    let recorder = Arc::new(Recorder::default());
    let config = h
        .builder()
        .progress_callback(recorder.clone() as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap();
    let extractor = Extractor::with_backends(
        config,
        FakeRasterizer::new(&[TWO_WORDS, BROKEN, BLANK]),
        Arc::new(FakeRecognizer::default()),
    );

    extractor.extract(pdf("p.pdf")).await.unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start 3", "ok 1 2", "err 2", "ok 3 0", "done 2/3"]
    );
}

#[test]
fn sync_wrapper_runs_the_pipeline() {
    let h = Harness::new();
    let out = h.extractor(&[HOLA]).extract_sync(pdf("sync.pdf")).unwrap();
    assert_eq!(out.result.total_tokens, 1);
}
