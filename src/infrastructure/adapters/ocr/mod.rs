//! OCR Adapter - 页面识别客户端实现

mod http_ocr_client;

pub use http_ocr_client::{HttpOcrClient, HttpOcrClientConfig};
