//! AiReader - 文档朗读命令行
//!
//! 子命令:
//! - read / speak: 合成并模拟播放（缓存优先，后台预读）
//! - prefetch: 仅合成写入缓存
//! - extract / segment: 离线文本处理
//! - cache / library: 缓存与文档库管理

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc, watch};

use aireader::application::{
    AddDocument, AddDocumentHandler, CacheCommandHandler, CacheKey, CacheQueryHandler, ClearCache,
    ClearLibrary, ClearLibraryHandler, DocumentLibraryPort, EvictDocumentCache, EvictPageCache,
    GetCacheStats, GetDocument, GetDocumentHandler, GetLibraryStats, GetLibraryStatsHandler,
    ListDocuments, ListDocumentsHandler, OcrEnginePort, PageContent, ReaderService,
    ReaderSettings, RemoveDocument, RemoveDocumentHandler, SweepExpiredCache, TouchDocument,
    TouchDocumentHandler, TtsCache, TtsCachePort, TtsEnginePort,
};
use aireader::config::{load_config_from_path, print_config, AppConfig, TtsBackend};
use aireader::domain::document::{Document, DocumentFingerprint, PageNumber};
use aireader::domain::playback::{AudioChunk, ChunkSource, PlaybackEngine, PlaybackState};
use aireader::domain::{
    extract_readable_text, resume_from, segment_text, LayoutConfig, SegmentConfig, TextItem,
};
use aireader::infrastructure::adapters::{
    FakeTtsClient, HttpOcrClient, HttpOcrClientConfig, HttpTtsClient, HttpTtsClientConfig,
    SimulatedMediaSink,
};
use aireader::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};
use aireader::infrastructure::persistence::SledCacheConfig;
use aireader::infrastructure::{
    CacheSweeper, EventPublisher, InMemoryTtsCache, PrefetchRequest, PrefetchWorker,
    PrefetchWorkerConfig, ReaderEvent, SledTtsCache, SqliteDocumentLibrary, SystemClock,
};

/// 模拟播放的时间片
const TICK: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(author, version, about = "Read documents aloud with cached remote speech synthesis")]
struct Cli {
    /// 配置文件路径（默认搜索 config.toml / config.local.toml）
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a document page by page
    Read {
        /// File path or library id
        source: String,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long, default_value_t = 1)]
        from_page: u32,
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Read a text file chunk by chunk, starting at a character offset
    Speak {
        file: PathBuf,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long, default_value_t = 0)]
        from: usize,
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Synthesize pages into the cache without playing them
    Prefetch {
        /// File path or library id
        source: String,
        #[arg(long)]
        voice: Option<String>,
        /// Page range, e.g. `2-5`
        #[arg(long)]
        pages: Option<String>,
    },
    /// Print the readable text of a page given as positioned items (JSON)
    Extract {
        items: PathBuf,
        #[arg(long)]
        height: f64,
    },
    /// Print the chunks a text file is split into
    Segment {
        file: PathBuf,
        #[arg(long)]
        max_chars: Option<usize>,
        #[arg(long, default_value_t = 0)]
        from: usize,
    },
    /// Manage the audio cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Manage the document library
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    Stats,
    Clear,
    /// Remove expired entries now
    Sweep,
    /// Evict one page, or every page of a document when no page is given
    Evict {
        fingerprint: String,
        #[arg(long, requires = "voice")]
        page: Option<u32>,
        #[arg(long)]
        voice: Option<String>,
    },
}

#[derive(Subcommand)]
enum LibraryAction {
    List,
    Remove { id: String },
    Clear,
}

/// 运行期组装好的服务
struct Services {
    library: Arc<dyn DocumentLibraryPort>,
    cache: TtsCache,
    reader: Arc<ReaderService>,
    events: Arc<EventPublisher>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);
    print_config(&config);

    match cli.command {
        Command::Extract { items, height } => run_extract(&items, height).await,
        Command::Segment {
            file,
            max_chars,
            from,
        } => run_segment(&config, &file, max_chars, from).await,
        command => {
            let services = build_services(&config).await?;
            let result = run_with_services(&config, &services, command).await;
            services.cache.flush().await;
            result
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},aireader={}", config.log.level, config.log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    // 日志写入 stderr，stdout 留给命令输出
    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn build_services(config: &AppConfig) -> anyhow::Result<Services> {
    let clock = Arc::new(SystemClock);

    // 文档库
    if let Some(parent) = Path::new(&config.library.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db_config = DatabaseConfig {
        database_url: config.library.database_url(),
        max_connections: config.library.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;
    let library: Arc<dyn DocumentLibraryPort> =
        Arc::new(SqliteDocumentLibrary::new(pool, clock.clone()));

    // 音频缓存
    let cache_port: Arc<dyn TtsCachePort> = if config.cache.persistent {
        if let Some(parent) = config.cache.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let cache_config = SledCacheConfig {
            db_path: config.cache.path.display().to_string(),
            ttl_secs: config.cache.ttl_secs,
        };
        Arc::new(SledTtsCache::new(&cache_config, clock.clone())?)
    } else {
        Arc::new(InMemoryTtsCache::new(config.cache.ttl_secs, clock.clone()))
    };
    let cache = TtsCache::new(cache_port);

    // 远程服务
    let tts_engine: Arc<dyn TtsEnginePort> = match config.tts.backend {
        TtsBackend::Http => {
            let tts_config = HttpTtsClientConfig::new(config.tts.url.clone())
                .with_timeout(config.tts.timeout_secs)
                .with_retries(config.tts.max_retries);
            Arc::new(HttpTtsClient::new(tts_config)?)
        }
        TtsBackend::Fake => Arc::new(FakeTtsClient::with_defaults()),
    };
    let ocr_config =
        HttpOcrClientConfig::new(config.ocr.url.clone()).with_timeout(config.ocr.timeout_secs);
    let ocr_engine: Arc<dyn OcrEnginePort> = Arc::new(HttpOcrClient::new(ocr_config)?);

    let events = Arc::new(EventPublisher::new());
    spawn_event_logger(events.subscribe_global());

    let settings = ReaderSettings {
        model_id: config.tts.model_id.clone(),
        output_format: config.tts.output_format.clone(),
        segment: SegmentConfig::new(config.segmenter.max_chars),
        layout: LayoutConfig::default(),
    };
    let reader = Arc::new(ReaderService::new(
        cache.clone(),
        tts_engine,
        ocr_engine,
        events.clone(),
        settings,
    ));

    Ok(Services {
        library,
        cache,
        reader,
        events,
    })
}

fn spawn_event_logger(mut receiver: broadcast::Receiver<ReaderEvent>) {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => tracing::debug!(event = ?event, "Reader event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Ctrl+C 时广播关闭信号
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run_with_services(
    config: &AppConfig,
    services: &Services,
    command: Command,
) -> anyhow::Result<()> {
    let shutdown = shutdown_signal();

    let sweeper = config.cache.sweep_enabled.then(|| {
        let sweeper = CacheSweeper::new(
            services.cache.clone(),
            Duration::from_secs(config.cache.sweep_interval_secs),
        );
        let (stop_tx, stop_rx) = watch::channel(false);
        (stop_tx, tokio::spawn(sweeper.run(stop_rx)))
    });

    let result = match command {
        Command::Read {
            source,
            voice,
            from_page,
            rate,
        } => {
            let voice = resolve_voice(config, voice)?;
            let rate = rate.unwrap_or(config.reader.playback_rate);
            run_read(config, services, &source, &voice, from_page, rate, shutdown).await
        }
        Command::Speak {
            file,
            voice,
            from,
            rate,
        } => {
            let voice = resolve_voice(config, voice)?;
            let rate = rate.unwrap_or(config.reader.playback_rate);
            run_speak(services, &file, &voice, from, rate, shutdown).await
        }
        Command::Prefetch {
            source,
            voice,
            pages,
        } => {
            let voice = resolve_voice(config, voice)?;
            run_prefetch(config, services, &source, &voice, pages.as_deref()).await
        }
        Command::Cache { action } => run_cache(services, action).await,
        Command::Library { action } => run_library(services, action).await,
        Command::Extract { .. } | Command::Segment { .. } => Ok(()),
    };

    if let Some((stop_tx, handle)) = sweeper {
        let _ = stop_tx.send(true);
        if let Ok(removed) = handle.await {
            tracing::debug!(removed, "Cache sweeper finished");
        }
    }

    result
}

fn resolve_voice(config: &AppConfig, voice: Option<String>) -> anyhow::Result<String> {
    voice
        .or_else(|| config.reader.default_voice.clone())
        .ok_or_else(|| anyhow!("No voice given; pass --voice or set reader.default_voice"))
}

/// 打开文档：路径存在则加入文档库，否则按文档库 ID 读取
async fn open_document(services: &Services, source: &str) -> anyhow::Result<Document> {
    let path = Path::new(source);
    if path.is_file() {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.to_string());

        let added = AddDocumentHandler::new(services.library.clone())
            .handle(AddDocument { name, content })
            .await?;
        tracing::info!(id = %added.id, name = %added.name, pages = added.page_count, "Document opened");

        let record = GetDocumentHandler::new(services.library.clone())
            .handle(GetDocument { id: added.id })
            .await?;
        return Ok(record.into_document());
    }

    let id = DocumentFingerprint::from_string(source);
    let record = GetDocumentHandler::new(services.library.clone())
        .handle(GetDocument { id: id.clone() })
        .await?;
    TouchDocumentHandler::new(services.library.clone())
        .handle(TouchDocument { id })
        .await?;
    Ok(record.into_document())
}

/// 文档的页面内容：文本文件按分页符分页，其他内容作为单页图像交给 OCR
fn document_pages(document: &Document) -> Vec<PageContent> {
    match document.text_pages() {
        Some(pages) => pages.into_iter().map(PageContent::Text).collect(),
        None => vec![PageContent::Image {
            data: document.content().to_vec(),
            file_name: document.name().to_string(),
        }],
    }
}

fn page_number(value: u32) -> anyhow::Result<PageNumber> {
    PageNumber::new(value).map_err(|e| anyhow!("Invalid page {}: {}", value, e))
}

/// 解析 `a-b` 或 `a` 形式的页码范围
fn parse_page_range(range: &str) -> anyhow::Result<(u32, u32)> {
    let (start, end) = match range.split_once('-') {
        Some((a, b)) => (a.trim().parse::<u32>()?, b.trim().parse::<u32>()?),
        None => {
            let page = range.trim().parse::<u32>()?;
            (page, page)
        }
    };
    if start == 0 || end < start {
        bail!("Invalid page range: {}", range);
    }
    Ok((start, end))
}

async fn run_read(
    config: &AppConfig,
    services: &Services,
    source: &str,
    voice: &str,
    from_page: u32,
    rate: f64,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let document = open_document(services, source).await?;
    let pages = document_pages(&document);
    let last_page = pages.len() as u32;
    let mut next_page = page_number(from_page)?;
    if next_page.value() > last_page {
        bail!("Document has {} pages, cannot start at page {}", last_page, from_page);
    }

    let fingerprint = document.fingerprint().clone();
    let mut document_events = services.events.subscribe_document(fingerprint.as_str());

    // 后台预读
    let (prefetch_tx, prefetch_rx) = mpsc::channel(64);
    let worker = PrefetchWorker::new(
        PrefetchWorkerConfig {
            max_concurrent: config.reader.prefetch_concurrency,
        },
        prefetch_rx,
        services.reader.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    let mut engine = PlaybackEngine::new(SimulatedMediaSink::default());
    engine.set_playback_rate(rate);
    engine.set_on_progress(|progress| {
        tracing::trace!(
            current_time = progress.current_time,
            duration = progress.duration,
            percentage = progress.percentage,
            "Playback progress"
        );
    });

    tracing::info!(
        id = %fingerprint,
        from_page = next_page.value(),
        last_page,
        voice_id = %voice,
        rate,
        "Reading document"
    );

    let mut interrupted = false;
    loop {
        // 当前片段之外保持一页在队列中
        while engine.pending_len() == 0 && next_page.value() <= last_page {
            let page = next_page;
            next_page = next_page.next();

            for offset in 1..=config.reader.read_ahead {
                let ahead = page.value() + offset;
                if ahead > last_page {
                    break;
                }
                let ahead = page_number(ahead)?;
                let request = PrefetchRequest {
                    key: CacheKey::new(fingerprint.clone(), ahead, voice),
                    content: pages[ahead.value() as usize - 1].clone(),
                };
                if prefetch_tx.send(request).await.is_err() {
                    tracing::warn!("Prefetch worker stopped");
                }
            }

            let key = CacheKey::new(fingerprint.clone(), page, voice);
            let content = pages[page.value() as usize - 1].clone();
            match services.reader.page_audio(&key, content).await {
                Some(audio) => {
                    tracing::info!(page = %page, size_bytes = audio.len(), "Page queued");
                    engine.enqueue(AudioChunk::new(
                        format!("page-{}", page),
                        ChunkSource::Bytes(Arc::new(audio)),
                    ));
                }
                None => tracing::info!(page = %page, "Page has no audio, skipping"),
            }
        }

        while let Ok(event) = document_events.try_recv() {
            tracing::trace!(event = ?event, "Document event");
        }

        if engine.state() == PlaybackState::Idle && next_page.value() > last_page {
            break;
        }
        if !drive(&mut engine, &mut shutdown).await {
            interrupted = true;
            break;
        }
    }

    drop(prefetch_tx);
    services.events.unregister_document(fingerprint.as_str());

    let progress = engine.progress();
    tracing::info!(
        played_chunks = engine.played_chunks().len(),
        played_secs = progress.current_time,
        interrupted,
        "Reading finished"
    );

    if interrupted {
        worker_handle.abort();
    } else if let Ok(summary) = worker_handle.await {
        tracing::info!(summary = ?summary, "Read-ahead summary");
    }
    Ok(())
}

async fn run_speak(
    services: &Services,
    file: &Path,
    voice: &str,
    from: usize,
    rate: f64,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut engine = PlaybackEngine::new(SimulatedMediaSink::default());
    engine.set_playback_rate(rate);

    let results = services.reader.synthesize_text(&text, voice, from).await;
    let total = results.len();
    for (chunk, audio) in results {
        if let Some(audio) = audio {
            engine.enqueue(AudioChunk::new(
                format!("chunk-{}", chunk.index),
                ChunkSource::Bytes(Arc::new(audio)),
            ));
        }
    }
    tracing::info!(
        chunks = total,
        queued = engine.pending_len() + usize::from(engine.current_chunk().is_some()),
        "Text synthesized"
    );

    while engine.state() != PlaybackState::Idle {
        if !drive(&mut engine, &mut shutdown).await {
            break;
        }
    }

    tracing::info!(
        played_chunks = engine.played_chunks().len(),
        played_secs = engine.current_time(),
        "Speaking finished"
    );
    Ok(())
}

/// 推进一个时间片；收到关闭信号时暂停并返回 false
async fn drive(
    engine: &mut PlaybackEngine<SimulatedMediaSink>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        _ = shutdown.changed() => {
            engine.pause();
            false
        }
        _ = tokio::time::sleep(TICK) => {
            for event in engine.sink_mut().advance(TICK.as_secs_f64()) {
                engine.handle_event(event);
            }
            true
        }
    }
}

async fn run_prefetch(
    config: &AppConfig,
    services: &Services,
    source: &str,
    voice: &str,
    pages: Option<&str>,
) -> anyhow::Result<()> {
    let document = open_document(services, source).await?;
    let contents = document_pages(&document);
    let last_page = contents.len() as u32;
    let (start, end) = match pages {
        Some(range) => parse_page_range(range)?,
        None => (1, last_page),
    };
    let end = end.min(last_page);

    let (tx, rx) = mpsc::channel(64);
    let worker = PrefetchWorker::new(
        PrefetchWorkerConfig {
            max_concurrent: config.reader.prefetch_concurrency,
        },
        rx,
        services.reader.clone(),
    );
    let handle = tokio::spawn(worker.run());

    for value in start..=end {
        let page = page_number(value)?;
        let request = PrefetchRequest {
            key: CacheKey::new(document.fingerprint().clone(), page, voice),
            content: contents[value as usize - 1].clone(),
        };
        tx.send(request)
            .await
            .map_err(|_| anyhow!("Prefetch worker stopped"))?;
    }
    drop(tx);

    let summary = handle.await?;
    println!(
        "{}: cached {}, already cached {}, no text {}, failed {}",
        document.fingerprint(),
        summary.cached,
        summary.already_cached,
        summary.no_text,
        summary.failed
    );
    Ok(())
}

async fn run_extract(items: &Path, height: f64) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(items)
        .await
        .with_context(|| format!("Failed to read {}", items.display()))?;
    let items: Vec<TextItem> = serde_json::from_str(&json)?;
    println!("{}", extract_readable_text(&items, height, &LayoutConfig::default()));
    Ok(())
}

async fn run_segment(
    config: &AppConfig,
    file: &Path,
    max_chars: Option<usize>,
    from: usize,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let segment_config = SegmentConfig::new(max_chars.unwrap_or(config.segmenter.max_chars));
    let chunks = segment_text(&text, &segment_config);
    for chunk in resume_from(&chunks, from) {
        println!("[{}] {}..{} {}", chunk.index, chunk.start, chunk.end, chunk.text);
    }
    Ok(())
}

async fn run_cache(services: &Services, action: CacheAction) -> anyhow::Result<()> {
    match action {
        CacheAction::Stats => {
            let stats = CacheQueryHandler::new(services.cache.clone())
                .stats(GetCacheStats)
                .await;
            println!(
                "entries: {}\nsize: {} bytes\nhits: {}\nmisses: {}\nhit rate: {:.2}",
                stats.total_entries,
                stats.total_size_bytes,
                stats.hit_count,
                stats.miss_count,
                stats.hit_rate
            );
        }
        CacheAction::Clear => {
            CacheCommandHandler::new(services.cache.clone())
                .clear(ClearCache)
                .await;
            println!("cache cleared");
        }
        CacheAction::Sweep => {
            let removed = CacheCommandHandler::new(services.cache.clone())
                .sweep(SweepExpiredCache)
                .await;
            println!("removed {} expired entries", removed);
        }
        CacheAction::Evict {
            fingerprint,
            page,
            voice,
        } => {
            let handler = CacheCommandHandler::new(services.cache.clone());
            let fingerprint = DocumentFingerprint::from_string(fingerprint);
            match (page, voice) {
                (Some(page), Some(voice_id)) => {
                    handler
                        .evict_page(EvictPageCache {
                            fingerprint,
                            page: page_number(page)?,
                            voice_id,
                        })
                        .await;
                    println!("evicted page {}", page);
                }
                (Some(_), None) => bail!("--page requires --voice"),
                (None, _) => {
                    let removed = handler
                        .evict_document(EvictDocumentCache { fingerprint })
                        .await;
                    println!("evicted {} entries", removed);
                }
            }
        }
    }
    Ok(())
}

async fn run_library(services: &Services, action: LibraryAction) -> anyhow::Result<()> {
    match action {
        LibraryAction::List => {
            let documents = ListDocumentsHandler::new(services.library.clone())
                .handle(ListDocuments)
                .await?;
            for doc in &documents {
                println!("{}  {}  {} bytes  last used {}", doc.id, doc.name, doc.size, doc.last_used);
            }
            let stats = GetLibraryStatsHandler::new(services.library.clone())
                .handle(GetLibraryStats)
                .await?;
            println!("{} documents, {} bytes", stats.count, stats.total_size);
        }
        LibraryAction::Remove { id } => {
            let evicted = RemoveDocumentHandler::new(services.library.clone(), services.cache.clone())
                .handle(RemoveDocument {
                    id: DocumentFingerprint::from_string(id),
                })
                .await?;
            println!("removed, {} cached pages evicted", evicted);
        }
        LibraryAction::Clear => {
            let removed = ClearLibraryHandler::new(services.library.clone())
                .handle(ClearLibrary)
                .await?;
            println!("removed {} documents", removed);
        }
    }
    Ok(())
}
