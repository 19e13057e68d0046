//! Document Context - Aggregate Root

use chrono::{DateTime, Utc};

use super::{DocumentFingerprint, PageNumber};

/// 分页符
pub const PAGE_BREAK: char = '\u{000C}';

/// 文档聚合根
///
/// 不变量:
/// - 指纹由内容、名称与大小确定，创建后不变
/// - 内容不可修改（新内容即新文档）
#[derive(Debug, Clone)]
pub struct Document {
    fingerprint: DocumentFingerprint,
    name: String,
    content: Vec<u8>,
    loaded_at: DateTime<Utc>,
}

impl Document {
    /// 从文件内容创建文档
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        let name = name.into();
        let fingerprint = DocumentFingerprint::of_content(&name, &content);
        Self {
            fingerprint,
            name,
            content,
            loaded_at: Utc::now(),
        }
    }

    /// 按分页符切分为文本页
    ///
    /// 非 UTF-8 内容（如扫描件）返回 None，需要先走 OCR
    pub fn text_pages(&self) -> Option<Vec<String>> {
        let text = std::str::from_utf8(&self.content).ok()?;
        Some(text.split(PAGE_BREAK).map(|p| p.to_string()).collect())
    }

    /// 获取指定页文本
    pub fn page_text(&self, page: PageNumber) -> Option<String> {
        self.text_pages()?
            .into_iter()
            .nth(page.value() as usize - 1)
    }

    pub fn page_count(&self) -> usize {
        self.text_pages().map(|p| p.len()).unwrap_or(0)
    }

    // Getters
    pub fn fingerprint(&self) -> &DocumentFingerprint {
        &self.fingerprint
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_pages() {
        let doc = Document::new("notes.txt", b"first page\x0csecond page".to_vec());
        assert_eq!(doc.page_count(), 2);
        assert_eq!(
            doc.page_text(PageNumber::new(2).unwrap()).as_deref(),
            Some("second page")
        );
        assert!(doc.page_text(PageNumber::new(3).unwrap()).is_none());
    }

    #[test]
    fn test_binary_document_has_no_text_pages() {
        let doc = Document::new("scan.pdf", vec![0xff, 0xfe, 0x00]);
        assert!(doc.text_pages().is_none());
        assert_eq!(doc.page_count(), 0);
    }

    #[test]
    fn test_same_content_same_fingerprint() {
        let a = Document::new("a.txt", b"same".to_vec());
        let b = Document::new("a.txt", b"same".to_vec());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.size(), 4);
    }
}
