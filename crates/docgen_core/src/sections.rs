//! crates/docgen_core/src/sections.rs
//!
//! Splits generated text into blocks the document assembler can insert.
//!
//! Heading detection is keyword matching on short lines. It is a best-effort
//! heuristic: model output that does not use the expected section names simply
//! comes out as body text.

use regex::Regex;
use std::sync::LazyLock;

/// Lines at or above this many characters are never headings.
const MAX_HEADING_CHARS: usize = 100;

const TOP_LEVEL_KEYWORDS: &[&str] = &[
    "摘要",
    "引言",
    "结论",
    "Abstract",
    "Introduction",
    "Conclusion",
    "Executive Summary",
];

const SECOND_LEVEL_KEYWORDS: &[&str] = &[
    "文献综述",
    "研究方法",
    "研究结果",
    "讨论",
    "Literature Review",
    "Methodology",
    "Findings",
    "Discussion",
];

const OTHER_SECTION_KEYWORDS: &[&str] = &[
    "参考文献",
    "References",
    "背景介绍",
    "市场分析",
    "数据分析",
    "建议与策略",
    "实施计划",
    "风险评估",
    "Background",
    "Market Analysis",
    "Data Analysis",
    "Recommendations",
    "Implementation Plan",
    "Risk Assessment",
];

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s*").expect("static regex"));
static TABLE_SEPARATOR_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-{3,}:?$").expect("static regex"));

/// One unit of content, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { text: String, level: u8 },
    Paragraph(String),
    Table(Vec<Vec<String>>),
}

/// Partitions text into headings, paragraphs and tables.
pub fn parse_blocks(content: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut table: Vec<Vec<String>> = Vec::new();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(cells) = table_row(line) {
            if !is_separator_row(&cells) {
                table.push(cells);
            }
            continue;
        }
        if !table.is_empty() {
            blocks.push(Block::Table(std::mem::take(&mut table)));
        }

        if is_heading(line) {
            let text = clean_heading(line);
            let level = heading_level(&text);
            blocks.push(Block::Heading { text, level });
        } else {
            blocks.push(Block::Paragraph(line.to_string()));
        }
    }

    if !table.is_empty() {
        blocks.push(Block::Table(table));
    }
    blocks
}

/// Whether a trimmed line looks like a section title.
pub fn is_heading(line: &str) -> bool {
    if line.chars().count() >= MAX_HEADING_CHARS {
        return false;
    }
    // Sentences that merely mention a section name end in punctuation.
    if line.ends_with(['。', '.', '！', '!', '？', '?', '：', ':', '…', '；', ';', '，', ',']) {
        return false;
    }
    TOP_LEVEL_KEYWORDS
        .iter()
        .chain(SECOND_LEVEL_KEYWORDS)
        .chain(OTHER_SECTION_KEYWORDS)
        .any(|k| line.contains(k))
}

/// 1 for top-level sections, 2 for method-style sections, 3 for the rest.
pub fn heading_level(title: &str) -> u8 {
    if TOP_LEVEL_KEYWORDS.iter().any(|k| title.contains(k)) {
        1
    } else if SECOND_LEVEL_KEYWORDS.iter().any(|k| title.contains(k)) {
        2
    } else {
        3
    }
}

fn clean_heading(line: &str) -> String {
    let stripped = MARKDOWN_HEADING.replace(line, "");
    stripped.trim().trim_matches('*').trim().to_string()
}

fn table_row(line: &str) -> Option<Vec<String>> {
    if line.len() < 2 || !line.starts_with('|') || !line.ends_with('|') {
        return None;
    }
    let inner = &line[1..line.len() - 1];
    Some(inner.split('|').map(|c| c.trim().to_string()).collect())
}

fn is_separator_row(cells: &[String]) -> bool {
    cells.iter().all(|c| TABLE_SEPARATOR_CELL.is_match(c))
}
