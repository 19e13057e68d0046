//! 文本分割器
//!
//! 将任意长度文本切分为适合单次 TTS 请求的片段：
//! - 只在句子边界处切分（`.` `!` `?` 换行或文本末尾）
//! - 贪心合并相邻句子，直到达到最大字符数
//! - 记录每个片段在原文中的字符偏移，用于从任意位置继续朗读

use serde::{Deserialize, Serialize};

/// 默认最大字符数
pub const DEFAULT_MAX_CHARS: usize = 350;

/// 最大字符数下限，小于该值的配置会被提升
pub const MIN_MAX_CHARS: usize = 80;

/// 文本分割配置
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// 单个片段最大字符数（单句超长时允许超出）
    pub max_chars: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl SegmentConfig {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// 实际生效的最大字符数
    pub fn effective_max_chars(&self) -> usize {
        self.max_chars.max(MIN_MAX_CHARS)
    }
}

/// 分割后的文本片段
///
/// 不变量:
/// - `start` 严格递增，片段之间不重叠
/// - `end` 为开区间
/// - `text` 已折叠空白
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl TextChunk {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 句子（原文中的字符区间）
#[derive(Debug, Clone, Copy)]
struct Sentence {
    start: usize,
    end: usize,
}

/// 检查是否为句末分隔符
#[inline]
fn is_boundary(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '\n')
}

/// 按句末分隔符切分，连续分隔符归入同一句
///
/// 返回的区间已去除首尾空白，纯空白句子被丢弃
fn split_sentences(chars: &[char]) -> Vec<Sentence> {
    let mut raw: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    let mut in_boundary = false;

    for (i, &ch) in chars.iter().enumerate() {
        if is_boundary(ch) {
            in_boundary = true;
        } else if in_boundary {
            raw.push((start, i));
            start = i;
            in_boundary = false;
        }
    }
    if start < chars.len() {
        raw.push((start, chars.len()));
    }

    raw.into_iter()
        .filter_map(|(mut start, mut end)| {
            while start < end && chars[start].is_whitespace() {
                start += 1;
            }
            while end > start && chars[end - 1].is_whitespace() {
                end -= 1;
            }
            (start < end).then_some(Sentence { start, end })
        })
        .collect()
}

/// 折叠空白
fn collapse_whitespace(chars: &[char]) -> String {
    let s: String = chars.iter().collect();
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 对文本进行分段
///
/// 偏移基于去除首尾空白后的输入文本（按字符计）
pub fn segment_text(text: &str, config: &SegmentConfig) -> Vec<TextChunk> {
    let chars: Vec<char> = text.trim().chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let max_chars = config.effective_max_chars();
    let mut chunks: Vec<TextChunk> = Vec::new();

    let mut current = String::new();
    let mut current_len = 0usize;
    let mut current_start = 0usize;
    let mut current_end = 0usize;

    for sentence in split_sentences(&chars) {
        let normalized = collapse_whitespace(&chars[sentence.start..sentence.end]);
        let len = normalized.chars().count();

        if current_len > 0 && current_len + 1 + len > max_chars {
            chunks.push(TextChunk {
                index: chunks.len(),
                start: current_start,
                end: current_end,
                text: std::mem::take(&mut current),
            });
            current_len = 0;
        }

        if current_len == 0 {
            current_start = sentence.start;
            current = normalized;
            current_len = len;
        } else {
            current.push(' ');
            current.push_str(&normalized);
            current_len += 1 + len;
        }
        current_end = sentence.end;
    }

    if current_len > 0 {
        chunks.push(TextChunk {
            index: chunks.len(),
            start: current_start,
            end: current_end,
            text: current,
        });
    }

    chunks
}

/// 使用默认配置分段（便捷方法）
pub fn segment_text_default(text: &str) -> Vec<TextChunk> {
    segment_text(text, &SegmentConfig::default())
}

/// 从指定字符偏移继续朗读
///
/// 返回第一个 `end > offset` 的片段及其之后的所有片段
pub fn resume_from(chunks: &[TextChunk], offset: usize) -> &[TextChunk] {
    if offset == 0 {
        return chunks;
    }
    match chunks.iter().position(|c| c.end > offset) {
        Some(idx) => &chunks[idx..],
        None => &[],
    }
}
