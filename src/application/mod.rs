//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TtsEngine、OcrEngine、TtsCache、DocumentLibrary、Clock）
//! - services: 容错缓存门面与朗读编排服务
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod services;

pub use commands::{
    handlers::{
        AddDocumentHandler, AddDocumentResponse, CacheCommandHandler, ClearLibraryHandler,
        RemoveDocumentHandler, TouchDocumentHandler,
    },
    AddDocument, ClearCache, ClearLibrary, EvictDocumentCache, EvictPageCache, RemoveDocument,
    SweepExpiredCache, TouchDocument,
};

pub use error::ApplicationError;

pub use ports::{
    CacheError, CacheKey, CacheStats, Clock, DocumentLibraryPort, DocumentRecord,
    DocumentSummary, LibraryStats, OcrEnginePort, OcrError, OcrRequest, RepositoryError,
    SynthesisRequest, SynthesisResponse, TtsCachePort, TtsEnginePort, TtsError,
};

pub use queries::{
    handlers::{
        CacheQueryHandler, CacheStatsResponse, DocumentResponse, GetDocumentHandler,
        GetLibraryStatsHandler, ListDocumentsHandler,
    },
    GetCacheStats, GetDocument, GetLibraryStats, IsPageCached, ListDocuments,
};

pub use services::{PageContent, PrefetchOutcome, ReaderService, ReaderSettings, TtsCache};
