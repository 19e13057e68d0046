//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod clock;
mod document_library;
mod ocr_engine;
mod tts_cache;
mod tts_engine;

pub use clock::Clock;
pub use document_library::{
    DocumentLibraryPort, DocumentRecord, DocumentSummary, LibraryStats, RepositoryError,
};
pub use ocr_engine::{OcrEnginePort, OcrError, OcrRequest};
pub use tts_cache::{CacheError, CacheKey, CacheStats, TtsCachePort};
pub use tts_engine::{
    SynthesisRequest, SynthesisResponse, TtsEnginePort, TtsError, DEFAULT_MODEL_ID,
    DEFAULT_OUTPUT_FORMAT,
};
