//! 版面文本提取器
//!
//! 从页面的定位文本流中提取可朗读的标题与段落：
//! 1. 按 Y 坐标聚合为行
//! 2. 过滤页眉、页脚与页码
//! 3. 按行间距聚合为块
//! 4. 按相对字号或全大写识别标题，丢弃过短的噪声块

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PAGE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^page\s+\d+(\s*of\s*\d+)?$").expect("valid page label regex")
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,4}$").expect("valid page number regex"));

/// 定位文本片段
///
/// `transform` 为仿射矩阵 `[a, b, c, d, e, f]`：`d` 近似字号，`e` 为 x，`f` 为 y（向上增长）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    #[serde(rename = "str")]
    pub text: String,
    pub transform: Vec<f64>,
}

impl TextItem {
    pub fn new(text: impl Into<String>, x: f64, y: f64, font_size: f64) -> Self {
        Self {
            text: text.into(),
            transform: vec![font_size, 0.0, 0.0, font_size, x, y],
        }
    }

    fn component(&self, idx: usize) -> f64 {
        self.transform.get(idx).copied().unwrap_or(0.0)
    }

    pub fn x(&self) -> f64 {
        self.component(4)
    }

    pub fn y(&self) -> f64 {
        self.component(5)
    }

    pub fn font_size(&self) -> f64 {
        self.component(3).abs()
    }
}

/// 提取阈值配置
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// 同一行允许的 Y 偏差
    pub line_y_threshold: f64,
    /// 页边距下限
    pub margin_floor: f64,
    /// 页边距占页高比例
    pub margin_ratio: f64,
    /// 标题字号相对中位数的倍数
    pub heading_ratio: f64,
    /// 分段的最小行间距
    pub block_gap: f64,
    /// 非标题块的最小字符数
    pub min_paragraph_chars: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_y_threshold: 2.0,
            margin_floor: 24.0,
            margin_ratio: 0.08,
            heading_ratio: 1.25,
            block_gap: 14.0,
            min_paragraph_chars: 20,
        }
    }
}

#[derive(Debug, Clone)]
struct Line {
    y: f64,
    text: String,
    font_size: f64,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn is_page_number(text: &str) -> bool {
    let t = text.trim();
    PAGE_LABEL.is_match(t) || BARE_NUMBER.is_match(t)
}

fn is_all_caps(text: &str) -> bool {
    let mut letters = text.chars().filter(|c| c.is_ascii_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| c.is_ascii_uppercase())
}

/// 将同一行的片段按 x 排序后拼接
fn close_line(items: &mut Vec<&TextItem>, lines: &mut Vec<Line>) {
    if items.is_empty() {
        return;
    }
    items.sort_by(|a, b| a.x().total_cmp(&b.x()));
    let joined = items.iter().map(|it| it.text.as_str()).collect::<Vec<_>>().join(" ");
    let text = collapse_whitespace(&joined);
    let font_size = items.iter().map(|it| it.font_size()).sum::<f64>() / items.len() as f64;
    let y = items[0].y();
    if !text.is_empty() {
        lines.push(Line { y, text, font_size });
    }
    items.clear();
}

fn group_lines(items: &[TextItem], config: &LayoutConfig) -> Vec<Line> {
    let mut sorted: Vec<&TextItem> = items.iter().filter(|it| !it.text.is_empty()).collect();
    sorted.sort_by(|a, b| b.y().total_cmp(&a.y()).then(a.x().total_cmp(&b.x())));

    let mut lines = Vec::new();
    let mut current: Vec<&TextItem> = Vec::new();
    let mut current_y: Option<f64> = None;

    for item in sorted {
        match current_y {
            Some(y) if (item.y() - y).abs() <= config.line_y_threshold => current.push(item),
            _ => {
                close_line(&mut current, &mut lines);
                current_y = Some(item.y());
                current.push(item);
            }
        }
    }
    close_line(&mut current, &mut lines);

    lines
}

/// 提取页面可朗读文本
///
/// 标题与段落按原始顺序以换行拼接；无有效内容时返回空字符串
pub fn extract_readable_text(items: &[TextItem], page_height: f64, config: &LayoutConfig) -> String {
    let lines = group_lines(items, config);
    if lines.is_empty() {
        return String::new();
    }

    let margin = config.margin_floor.max(page_height * config.margin_ratio);
    let filtered: Vec<Line> = lines
        .into_iter()
        .filter(|ln| ln.y <= page_height - margin)
        .filter(|ln| ln.y >= margin)
        .filter(|ln| !is_page_number(&ln.text))
        .collect();
    if filtered.is_empty() {
        return String::new();
    }

    let sizes: Vec<f64> = filtered.iter().map(|l| l.font_size).collect();
    let heading_threshold = median(&sizes) * config.heading_ratio;

    let mut blocks: Vec<Vec<&Line>> = Vec::new();
    let mut prev_y: Option<f64> = None;
    for line in &filtered {
        let new_block = match prev_y {
            None => true,
            Some(py) => (py - line.y).abs() > config.block_gap,
        };
        if new_block {
            blocks.push(vec![line]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
        prev_y = Some(line.y);
    }

    let mut out: Vec<String> = Vec::new();
    for block in blocks {
        let joined = block.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join(" ");
        let text = collapse_whitespace(&joined);
        if text.is_empty() {
            continue;
        }
        let max_font = block.iter().map(|l| l.font_size).fold(0.0_f64, f64::max);
        let heading = max_font > heading_threshold || is_all_caps(&text);
        if !heading && text.chars().count() < config.min_paragraph_chars {
            continue;
        }
        out.push(text);
    }

    tracing::trace!(blocks = out.len(), page_height, "Extracted readable blocks");

    out.join("\n")
}

/// 使用默认阈值提取（便捷方法）
pub fn extract_readable_text_default(items: &[TextItem], page_height: f64) -> String {
    extract_readable_text(items, page_height, &LayoutConfig::default())
}
