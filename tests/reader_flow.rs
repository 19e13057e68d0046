//! 朗读服务 + 缓存 + 预读 Worker 的集成行为

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use aireader::application::{
    CacheKey, OcrEnginePort, OcrError, OcrRequest, PageContent, PrefetchOutcome, ReaderService,
    ReaderSettings, TtsCache,
};
use aireader::domain::document::{DocumentFingerprint, PageNumber};
use aireader::domain::{SegmentConfig, TextItem};
use aireader::infrastructure::adapters::{FakeTtsClient, FakeTtsClientConfig};
use aireader::infrastructure::{
    EventPublisher, InMemoryTtsCache, ManualClock, PrefetchRequest, PrefetchWorker,
    PrefetchWorkerConfig, ReaderEvent, SledTtsCache,
};

const VOICE: &str = "narrator";

/// 固定返回文本或始终失败的 OCR
struct StubOcr {
    text: Option<String>,
}

#[async_trait]
impl OcrEnginePort for StubOcr {
    async fn recognize(&self, request: OcrRequest) -> Result<String, OcrError> {
        match &self.text {
            Some(text) => Ok(format!("  {} (page {})  ", text, request.page_number)),
            None => Err(OcrError::ServiceError("ocr unavailable".to_string())),
        }
    }
}

struct Fixture {
    reader: Arc<ReaderService>,
    tts: Arc<FakeTtsClient>,
    events: Arc<EventPublisher>,
    clock: Arc<ManualClock>,
}

fn fixture_with(tts: FakeTtsClient, ocr: StubOcr, settings: ReaderSettings) -> Fixture {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = TtsCache::new(Arc::new(InMemoryTtsCache::new(60, clock.clone())));
    let tts = Arc::new(tts);
    let events = Arc::new(EventPublisher::new());
    let reader = Arc::new(ReaderService::new(
        cache,
        tts.clone(),
        Arc::new(ocr),
        events.clone(),
        settings,
    ));
    Fixture {
        reader,
        tts,
        events,
        clock,
    }
}

fn fixture() -> Fixture {
    fixture_with(
        FakeTtsClient::with_defaults().failing_on("boom"),
        StubOcr { text: None },
        ReaderSettings::default(),
    )
}

fn text(value: &str) -> PageContent {
    PageContent::Text(value.to_string())
}

fn page_key(page: u32) -> CacheKey {
    let fingerprint = DocumentFingerprint::of_content("book.txt", b"book contents");
    CacheKey::new(fingerprint, PageNumber::new(page).unwrap(), VOICE)
}

#[tokio::test]
async fn test_page_audio_synthesizes_once_then_hits_cache() {
    let fx = fixture();
    let mut events = fx.events.subscribe_global();
    let key = page_key(1);

    let first = fx.reader.page_audio(&key, text("Hello there.")).await;
    let second = fx.reader.page_audio(&key, text("Hello there.")).await;

    let expected = FakeTtsClient::audio_for(VOICE, "Hello there.");
    assert_eq!(first.as_deref(), Some(expected.as_slice()));
    assert_eq!(second, first);
    assert_eq!(fx.tts.call_count(), 1);

    assert!(matches!(events.try_recv().unwrap(), ReaderEvent::PageCached { page: 1, .. }));
    assert!(matches!(events.try_recv().unwrap(), ReaderEvent::CacheHit { page: 1, .. }));

    let stats = fx.reader.cache().stats().await;
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.hit_count, 1);
}

#[tokio::test]
async fn test_page_audio_resynthesizes_after_ttl() {
    let fx = fixture();
    let key = page_key(2);

    fx.reader.page_audio(&key, text("Some text.")).await.unwrap();
    fx.clock.advance(Duration::from_secs(61));
    fx.reader.page_audio(&key, text("Some text.")).await.unwrap();

    assert_eq!(fx.tts.call_count(), 2);
}

#[tokio::test]
async fn test_page_audio_failure_is_none_and_not_cached() {
    let fx = fixture();
    let mut events = fx.events.subscribe_document(page_key(3).fingerprint.as_str());
    let key = page_key(3);

    assert!(fx.reader.page_audio(&key, text("this will boom")).await.is_none());
    assert!(!fx.reader.cache().has(&key).await);

    match events.try_recv().unwrap() {
        ReaderEvent::SynthesisFailed { page, chunk_index, .. } => {
            assert_eq!(page, Some(3));
            assert_eq!(chunk_index, None);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_page_without_text_is_skipped() {
    let fx = fixture();
    let key = page_key(4);

    assert!(fx.reader.page_audio(&key, text("   ")).await.is_none());
    assert_eq!(fx.reader.prefetch_page(&key, text("")).await, PrefetchOutcome::NoText);
    assert_eq!(fx.tts.call_count(), 0);
}

#[tokio::test]
async fn test_prefetch_page_outcomes() {
    let fx = fixture();

    assert_eq!(fx.reader.prefetch_page(&page_key(1), text("Page one.")).await, PrefetchOutcome::Cached);
    assert_eq!(
        fx.reader.prefetch_page(&page_key(1), text("Page one.")).await,
        PrefetchOutcome::AlreadyCached
    );
    assert_eq!(fx.reader.prefetch_page(&page_key(2), text("boom")).await, PrefetchOutcome::Failed);
    assert_eq!(fx.tts.call_count(), 2);
}

#[tokio::test]
async fn test_page_text_sources() {
    let fx = fixture_with(
        FakeTtsClient::with_defaults(),
        StubOcr {
            text: Some("Scanned words".to_string()),
        },
        ReaderSettings::default(),
    );
    let page = PageNumber::new(2).unwrap();

    let plain = fx.reader.page_text(page, PageContent::Text("  plain  ".to_string())).await;
    assert_eq!(plain, "plain");

    let ocr = fx
        .reader
        .page_text(
            page,
            PageContent::Image {
                data: vec![1, 2, 3],
                file_name: "scan.png".to_string(),
            },
        )
        .await;
    assert_eq!(ocr, "Scanned words (page 2)");

    let items = vec![
        TextItem::new("CHAPTER ONE", 72.0, 700.0, 18.0),
        TextItem::new("a paragraph that is certainly long enough to keep", 72.0, 600.0, 10.0),
        TextItem::new("Page 2 of 9", 300.0, 20.0, 9.0),
    ];
    let positioned = fx
        .reader
        .page_text(page, PageContent::Positioned { items, page_height: 800.0 })
        .await;
    assert_eq!(
        positioned,
        "CHAPTER ONE\na paragraph that is certainly long enough to keep"
    );
}

#[tokio::test]
async fn test_ocr_failure_yields_empty_text() {
    let fx = fixture();
    let text = fx
        .reader
        .page_text(
            PageNumber::first(),
            PageContent::Image {
                data: vec![0; 8],
                file_name: "scan.png".to_string(),
            },
        )
        .await;
    assert!(text.is_empty());
}

#[tokio::test]
async fn test_synthesize_text_skips_failed_chunks() {
    let settings = ReaderSettings {
        segment: SegmentConfig::new(80),
        ..ReaderSettings::default()
    };
    let fx = fixture_with(
        FakeTtsClient::with_defaults().failing_on("boom"),
        StubOcr { text: None },
        settings,
    );
    let mut events = fx.events.subscribe_global();

    let first = format!("{}.", "a".repeat(69));
    let second = format!("boom {}.", "b".repeat(64));
    let third = format!("{}.", "c".repeat(69));
    let text = format!("{} {} {}", first, second, third);

    let results = fx.reader.synthesize_text(&text, VOICE, 0).await;
    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_some());
    assert!(results[1].1.is_none());
    assert!(results[2].1.is_some());
    assert_eq!(results[2].0.text, third);

    assert!(matches!(
        events.try_recv().unwrap(),
        ReaderEvent::SynthesisFailed { chunk_index: Some(1), .. }
    ));

    // 从第三段起点继续
    let resumed = fx.reader.synthesize_text(&text, VOICE, results[2].0.start).await;
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].0.index, 2);
}

#[tokio::test]
async fn test_sled_cache_backs_reader() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(0));
    let store = SledTtsCache::open(dir.path().join("cache.sled"), 3600, clock.clone()).unwrap();
    let cache = TtsCache::new(store.arc());
    let tts = Arc::new(FakeTtsClient::with_defaults());
    let reader = ReaderService::new(
        cache.clone(),
        tts.clone(),
        Arc::new(StubOcr { text: None }),
        Arc::new(EventPublisher::new()),
        ReaderSettings::default(),
    );

    let key = page_key(1);
    reader.page_audio(&key, text("Persisted page.")).await.unwrap();
    reader.page_audio(&key, text("Persisted page.")).await.unwrap();
    assert_eq!(tts.call_count(), 1);

    assert_eq!(cache.evict_document(&key.fingerprint).await, 1);
    assert!(!cache.has(&key).await);
}

#[tokio::test]
async fn test_prefetch_worker_dedupes_in_flight_requests() {
    let tts = FakeTtsClient::new(FakeTtsClientConfig {
        latency: Duration::from_millis(50),
        fail_on: vec!["boom".to_string()],
    });
    let fx = fixture_with(tts, StubOcr { text: None }, ReaderSettings::default());
    fx.reader.prefetch_page(&page_key(5), text("Already here.")).await;

    let (tx, rx) = mpsc::channel(16);
    let worker = PrefetchWorker::new(
        PrefetchWorkerConfig { max_concurrent: 2 },
        rx,
        fx.reader.clone(),
    );

    let requests = [
        (1, "Page one."),
        (1, "Page one."),
        (2, "boom"),
        (3, ""),
        (5, "Already here."),
    ];
    for (page, value) in requests {
        tx.send(PrefetchRequest {
            key: page_key(page),
            content: text(value),
        })
        .await
        .unwrap();
    }
    drop(tx);

    let summary = worker.run().await;
    assert_eq!(summary.cached, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.no_text, 1);
    assert_eq!(summary.already_cached, 1);
    assert!(fx.reader.cache().has(&page_key(1)).await);
}

#[tokio::test]
async fn test_page_audio_extracts_text_when_entry_expires_after_check() {
    let fx = fixture();
    let key = page_key(6);

    fx.reader.page_audio(&key, text("Expiring page.")).await.unwrap();
    assert!(fx.reader.cache().has(&key).await);

    // 检查之后、读取之前过期
    fx.clock.advance(Duration::from_secs(61));
    let audio = fx.reader.page_audio(&key, text("Expiring page.")).await;

    assert_eq!(audio, Some(FakeTtsClient::audio_for(VOICE, "Expiring page.")));
    assert_eq!(fx.tts.call_count(), 2);
}

#[tokio::test]
async fn test_foreground_read_waits_for_prefetch_in_flight() {
    let tts = FakeTtsClient::new(FakeTtsClientConfig {
        latency: Duration::from_millis(100),
        fail_on: Vec::new(),
    });
    let fx = fixture_with(tts, StubOcr { text: None }, ReaderSettings::default());

    let (tx, rx) = mpsc::channel(4);
    let worker = tokio::spawn(
        PrefetchWorker::new(PrefetchWorkerConfig::default(), rx, fx.reader.clone()).run(),
    );
    tx.send(PrefetchRequest {
        key: page_key(2),
        content: text("Next page."),
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let audio = fx.reader.page_audio(&page_key(2), text("Next page.")).await;
    drop(tx);
    let summary = worker.await.unwrap();

    assert_eq!(audio, Some(FakeTtsClient::audio_for(VOICE, "Next page.")));
    assert_eq!(summary.cached, 1);
    assert_eq!(fx.tts.call_count(), 1);
}

#[tokio::test]
async fn test_concurrent_page_reads_synthesize_once() {
    let tts = FakeTtsClient::new(FakeTtsClientConfig {
        latency: Duration::from_millis(50),
        fail_on: Vec::new(),
    });
    let fx = fixture_with(tts, StubOcr { text: None }, ReaderSettings::default());

    let key = page_key(1);
    let (first, second, prefetched) = tokio::join!(
        fx.reader.page_audio(&key, text("Shared page.")),
        fx.reader.page_audio(&key, text("Shared page.")),
        fx.reader.prefetch_page(&key, text("Shared page.")),
    );

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(prefetched, PrefetchOutcome::AlreadyCached);
    assert_eq!(fx.tts.call_count(), 1);
}
