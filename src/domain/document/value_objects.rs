//! Document Context - Value Objects

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 指纹中保留的摘要十六进制位数
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// 文档指纹 - 缓存分区键
///
/// 由文件内容的 SHA-256 摘要、文件名与大小确定性地生成：
/// `{name}_{size}_{hex16}`。相同内容、名称与大小总是得到相同指纹
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentFingerprint(String);

impl DocumentFingerprint {
    /// 计算文档指纹
    pub fn compute(name: &str, size: u64, content: &[u8]) -> Self {
        let digest = format!("{:x}", Sha256::digest(content));
        Self(format!("{}_{}_{}", name, size, &digest[..FINGERPRINT_HEX_LEN]))
    }

    /// 根据文件内容计算（大小取内容长度）
    pub fn of_content(name: &str, content: &[u8]) -> Self {
        Self::compute(name, content.len() as u64, content)
    }

    /// 从已存储的字符串恢复
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 页码（从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageNumber(u32);

impl PageNumber {
    pub fn new(page: u32) -> Result<Self, &'static str> {
        if page == 0 {
            return Err("页码从 1 开始");
        }
        Ok(Self(page))
    }

    pub fn first() -> Self {
        Self(1)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for PageNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = DocumentFingerprint::compute("book.pdf", 5, b"hello");
        let b = DocumentFingerprint::compute("book.pdf", 5, b"hello");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("book.pdf_5_"));
        assert_eq!(a.as_str().len(), "book.pdf_5_".len() + FINGERPRINT_HEX_LEN);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = DocumentFingerprint::compute("book.pdf", 5, b"hello");
        let b = DocumentFingerprint::compute("book.pdf", 5, b"hellp");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_known_digest() {
        // sha256("hello") = 2cf24dba5fb0a30e...
        let fp = DocumentFingerprint::of_content("a.txt", b"hello");
        assert_eq!(fp.as_str(), "a.txt_5_2cf24dba5fb0a30e");
    }

    #[test]
    fn test_page_number() {
        assert!(PageNumber::new(0).is_err());
        let page = PageNumber::new(3).unwrap();
        assert_eq!(page.next().value(), 4);
        assert_eq!(PageNumber::first().value(), 1);
    }
}
