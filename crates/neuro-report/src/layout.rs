//! 分页排版
//!
//! 单遍排版：维护一个垂直游标，流式文本按内容宽度折行，游标越过下边距时换页；
//! 表格行整体放置，整页放不下的行按文本行拆分；换页时重复表头，
//! 表格标题与表头不会单独留在页尾。
//! 全部章节排完后再统一加盖 "Page i of N"。

use crate::document::{Align, Block, ReportDocument, Table, TextStyle};
use neuro_core::{NeuroError, Result};
use serde::{Deserialize, Serialize};
use std::mem;

/// 1pt 对应的毫米数
pub const PT_TO_MM: f32 = 0.352_778;

/// Helvetica 平均字宽约为字号的一半
const AVG_CHAR_EM: f32 = 0.5;

/// 页面几何参数（毫米）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSetup {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub line_height: f32,
    pub cell_padding: f32,
    /// 页码距页面底边的距离
    pub footer_offset: f32,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            margin_top: 20.0,
            margin_bottom: 20.0,
            margin_left: 20.0,
            margin_right: 20.0,
            line_height: 5.0,
            cell_padding: 1.5,
            footer_offset: 10.0,
        }
    }
}

impl PageSetup {
    pub fn validate(&self) -> Result<()> {
        if self.line_height <= 0.0 {
            return Err(NeuroError::Render("line height must be positive".to_string()));
        }
        if self.content_width() <= 0.0 {
            return Err(NeuroError::Render("horizontal margins leave no content width".to_string()));
        }
        if self.bottom() <= self.margin_top + self.line_height {
            return Err(NeuroError::Render("vertical margins leave no room for text".to_string()));
        }
        Ok(())
    }

    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    /// 游标允许到达的最低位置
    pub fn bottom(&self) -> f32 {
        self.page_height - self.margin_bottom
    }

    /// 该样式下的行高，大字号按字号放大
    pub fn line_height_for(&self, style: TextStyle) -> f32 {
        self.line_height.max(style.font_size() * PT_TO_MM * 1.4)
    }

    /// 给定宽度内可容纳的字符数
    pub fn max_chars(&self, style: TextStyle, width: f32) -> usize {
        ((width / char_width(style)).floor() as usize).max(1)
    }
}

/// 估算的单字符宽度（毫米）
pub fn char_width(style: TextStyle) -> f32 {
    style.font_size() * AVG_CHAR_EM * PT_TO_MM
}

/// 估算的文本宽度（毫米）
pub fn text_width(text: &str, style: TextStyle) -> f32 {
    text.chars().count() as f32 * char_width(style)
}

/// 按字符数折行，超长单词会被截断到多行
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(max_chars) {
            let piece_len = piece.len();
            if current_len > 0 && current_len + 1 + piece_len > max_chars {
                lines.push(mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(piece);
            current_len += piece_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// 已定位的文本，`y` 为基线距页面顶部的毫米数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedText {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub style: TextStyle,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub number: usize,
    pub items: Vec<PlacedText>,
}

impl Page {
    fn new(number: usize) -> Self {
        Self {
            number,
            items: Vec::new(),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.text.as_str())
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().any(|line| line.contains(needle))
    }
}

/// 排版结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaidOutDocument {
    pub title: String,
    pub setup: PageSetup,
    pub pages: Vec<Page>,
}

impl LaidOutDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 首个包含该文本的页码（从 1 开始）
    pub fn find_page(&self, needle: &str) -> Option<usize> {
        self.pages.iter().find(|p| p.contains(needle)).map(|p| p.number)
    }
}

struct Paginator<'a> {
    setup: &'a PageSetup,
    done: Vec<Page>,
    current: Page,
    cursor: f32,
}

impl<'a> Paginator<'a> {
    fn new(setup: &'a PageSetup) -> Self {
        Self {
            setup,
            done: Vec::new(),
            current: Page::new(1),
            cursor: setup.margin_top,
        }
    }

    fn is_fresh(&self) -> bool {
        self.current.items.is_empty()
    }

    fn break_page(&mut self) {
        let next = Page::new(self.done.len() + 2);
        self.done.push(mem::replace(&mut self.current, next));
        self.cursor = self.setup.margin_top;
    }

    fn place(&mut self, text: String, x: f32, y: f32, style: TextStyle, align: Align) {
        self.current.items.push(PlacedText { text, x, y, style, align });
    }

    fn anchor_x(&self, align: Align) -> f32 {
        match align {
            Align::Left => self.setup.margin_left,
            Align::Center => self.setup.page_width / 2.0,
            Align::Right => self.setup.page_width - self.setup.margin_right,
        }
    }

    /// 固定位置文本不移动游标
    fn fixed(&mut self, text: &str, style: TextStyle, y: f32, align: Align) {
        let x = self.anchor_x(align);
        self.place(text.to_string(), x, y, style, align);
    }

    fn footer(&mut self, text: &str, style: TextStyle) {
        let x = self.setup.margin_left;
        let y = self.setup.page_height - self.setup.footer_offset;
        self.place(text.to_string(), x, y, style, Align::Left);
    }

    fn flow(&mut self, text: &str, style: TextStyle) {
        let line_height = self.setup.line_height_for(style);
        let max_chars = self.setup.max_chars(style, self.setup.content_width());

        for paragraph in text.split('\n') {
            for line in wrap_text(paragraph, max_chars) {
                if self.cursor > self.setup.bottom() {
                    self.break_page();
                }
                if !line.is_empty() {
                    let x = self.setup.margin_left;
                    let y = self.cursor;
                    self.place(line, x, y, style, Align::Left);
                }
                self.cursor += line_height;
            }
        }
    }

    fn column_widths(&self, table: &Table) -> Vec<f32> {
        let total: f32 = table.column_weights.iter().sum();
        let width = self.setup.content_width();
        if total <= 0.0 {
            return vec![width / table.columns().max(1) as f32; table.columns()];
        }
        table.column_weights.iter().map(|w| width * w / total).collect()
    }

    fn wrap_row(&self, cells: &[String], widths: &[f32], style: TextStyle) -> Vec<Vec<String>> {
        widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let inner = (width - 2.0 * self.setup.cell_padding).max(char_width(style));
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                wrap_text(cell, self.setup.max_chars(style, inner))
            })
            .collect()
    }

    fn line_count(wrapped: &[Vec<String>]) -> usize {
        wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1)
    }

    fn row_height(&self, wrapped: &[Vec<String>]) -> f32 {
        Self::line_count(wrapped) as f32 * self.setup.line_height + 2.0 * self.setup.cell_padding
    }

    /// 当前页剩余空间可容纳的单元格文本行数
    fn lines_left(&self) -> usize {
        let space = self.setup.bottom() - self.cursor - 2.0 * self.setup.cell_padding;
        (space / self.setup.line_height).floor().max(0.0) as usize
    }

    /// 放置各单元格的第 `from..to` 行文本
    fn emit_lines(&mut self, wrapped: &[Vec<String>], from: usize, to: usize, widths: &[f32], style: TextStyle) {
        let line_height = self.setup.line_height;
        let padding = self.setup.cell_padding;
        let mut x = self.setup.margin_left;

        for (cell, width) in wrapped.iter().zip(widths) {
            for (k, line) in cell.iter().enumerate().take(to).skip(from) {
                if line.is_empty() {
                    continue;
                }
                let y = self.cursor + padding + line_height * ((k - from) as f32 + 0.8);
                self.place(line.clone(), x + padding, y, style, Align::Left);
            }
            x += width;
        }
        self.cursor += (to - from).max(1) as f32 * line_height + 2.0 * padding;
    }

    fn emit_row(&mut self, wrapped: &[Vec<String>], widths: &[f32], style: TextStyle) {
        let lines = Self::line_count(wrapped);
        self.emit_lines(wrapped, 0, lines, widths, style);
    }

    /// 整页放不下的行按文本行拆成多段，每个续页先重复表头
    fn split_row(&mut self, wrapped: &[Vec<String>], header: &[Vec<String>], widths: &[f32]) {
        let total = Self::line_count(wrapped);
        tracing::debug!("Splitting table row of {} lines across pages", total);

        let mut from = 0;
        while from < total {
            let mut fit = self.lines_left();
            if fit == 0 {
                self.break_page();
                self.emit_row(header, widths, TextStyle::Strong);
                fit = self.lines_left().max(1);
            }
            let to = (from + fit).min(total);
            self.emit_lines(wrapped, from, to, widths, TextStyle::Body);
            from = to;
        }
    }

    fn wrap_caption(&self, caption: &str) -> Vec<String> {
        let max_chars = self.setup.max_chars(TextStyle::Subheading, self.setup.content_width());
        wrap_text(caption, max_chars)
    }

    fn caption_height(&self, lines: &[String]) -> f32 {
        if lines.is_empty() {
            return 0.0;
        }
        lines.len() as f32 * self.setup.line_height_for(TextStyle::Subheading) + self.setup.cell_padding
    }

    fn caption(&mut self, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        let line_height = self.setup.line_height_for(TextStyle::Subheading);
        for line in lines {
            let x = self.setup.margin_left;
            let y = self.cursor;
            self.place(line.clone(), x, y, TextStyle::Subheading, Align::Left);
            self.cursor += line_height;
        }
        self.cursor += self.setup.cell_padding;
    }

    fn table(&mut self, table: &Table) {
        let widths = self.column_widths(table);
        let header = self.wrap_row(&table.headers, &widths, TextStyle::Strong);
        let header_height = self.row_height(&header);
        let caption = table.caption.as_deref().map(|c| self.wrap_caption(c)).unwrap_or_default();
        let caption_height = self.caption_height(&caption);
        let bottom = self.setup.bottom();
        // 新页面上表头之下的可用高度
        let room = bottom - self.setup.margin_top - header_height;

        let rows: Vec<Vec<Vec<String>>> = table
            .rows
            .iter()
            .map(|row| self.wrap_row(row, &widths, TextStyle::Body))
            .collect();

        // 标题、表头与首行一起放置；首行超高时只要求其第一段同页
        let lead = match rows.first() {
            Some(first) if self.row_height(first) <= room - caption_height => self.row_height(first),
            Some(_) => self.setup.line_height + 2.0 * self.setup.cell_padding,
            None => 0.0,
        };
        if self.cursor + caption_height + header_height + lead > bottom && !self.is_fresh() {
            self.break_page();
        }
        self.caption(&caption);
        self.emit_row(&header, &widths, TextStyle::Strong);

        for (i, wrapped) in rows.iter().enumerate() {
            let height = self.row_height(wrapped);
            if self.cursor + height <= bottom {
                self.emit_row(wrapped, &widths, TextStyle::Body);
            } else if i > 0 && height <= room {
                self.break_page();
                self.emit_row(&header, &widths, TextStyle::Strong);
                self.emit_row(wrapped, &widths, TextStyle::Body);
            } else {
                self.split_row(wrapped, &header, &widths);
            }
        }
    }

    fn finish(mut self) -> Vec<Page> {
        self.done.push(self.current);
        let total = self.done.len();
        let x = self.setup.page_width - self.setup.margin_right;
        let y = self.setup.page_height - self.setup.footer_offset;

        for page in &mut self.done {
            page.items.push(PlacedText {
                text: format!("Page {} of {}", page.number, total),
                x,
                y,
                style: TextStyle::PageNumber,
                align: Align::Right,
            });
        }
        self.done
    }
}

/// 对报告文档分页
pub fn layout(document: &ReportDocument, setup: &PageSetup) -> Result<LaidOutDocument> {
    setup.validate()?;

    let mut paginator = Paginator::new(setup);
    for section in &document.sections {
        if section.starts_new_page && !paginator.is_fresh() {
            paginator.break_page();
        }
        for block in &section.blocks {
            match block {
                Block::Fixed { text, style, y, align } => paginator.fixed(text, *style, *y, *align),
                Block::Flow { text, style } => paginator.flow(text, *style),
                Block::Footer { text, style } => paginator.footer(text, *style),
                Block::Gap(gap) => paginator.cursor += gap,
                Block::Table(table) => paginator.table(table),
            }
        }
    }

    let pages = paginator.finish();
    tracing::debug!("Laid out report '{}' on {} pages", document.title, pages.len());

    Ok(LaidOutDocument {
        title: document.title.clone(),
        setup: setup.clone(),
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Section, SectionKind};
    use chrono::NaiveDate;

    fn document(sections: Vec<Section>) -> ReportDocument {
        ReportDocument {
            title: "Test".to_string(),
            patient_identifier: "P-1".to_string(),
            generated_on: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            sections,
        }
    }

    fn section(new_page: bool, blocks: Vec<Block>) -> Section {
        let mut section = Section::new(SectionKind::Interpretation, new_page);
        section.blocks = blocks;
        section
    }

    fn table(rows: usize) -> Table {
        let mut table = Table::new(vec!["Date".into(), "Subtype".into()]);
        for i in 0..rows {
            table.push_row(vec![format!("row-{i}"), "MCI".into()]);
        }
        table
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("the quick brown fox", 9), vec!["the quick", "brown fox"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);

        let text = "Lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor";
        assert!(wrap_text(text, 12).iter().all(|line| line.chars().count() <= 12));
    }

    #[test]
    fn test_flow_breaks_at_bottom_margin() {
        let setup = PageSetup::default();
        let text = vec!["line"; 120].join("\n");
        let laid = layout(&document(vec![section(false, vec![Block::body(text)])]), &setup).unwrap();

        assert!(laid.page_count() > 1);
        for page in &laid.pages {
            for item in page.items.iter().filter(|i| i.style == TextStyle::Body) {
                assert!(item.y >= setup.margin_top && item.y <= setup.bottom());
            }
        }
        let body_lines: usize = laid
            .pages
            .iter()
            .map(|p| p.items.iter().filter(|i| i.style == TextStyle::Body).count())
            .sum();
        assert_eq!(body_lines, 120);
    }

    #[test]
    fn test_page_numbers_stamped_on_every_page() {
        let text = vec!["x"; 200].join("\n");
        let laid = layout(&document(vec![section(false, vec![Block::body(text)])]), &PageSetup::default()).unwrap();
        let total = laid.page_count();

        for page in &laid.pages {
            let stamps: Vec<&PlacedText> =
                page.items.iter().filter(|i| i.style == TextStyle::PageNumber).collect();
            assert_eq!(stamps.len(), 1);
            assert_eq!(stamps[0].text, format!("Page {} of {}", page.number, total));
        }
    }

    #[test]
    fn test_sections_can_force_new_page() {
        let doc = document(vec![
            section(false, vec![Block::body("first")]),
            section(true, vec![Block::body("second")]),
            section(false, vec![Block::body("third")]),
        ]);
        let laid = layout(&doc, &PageSetup::default()).unwrap();
        assert_eq!(laid.page_count(), 2);
        assert_eq!(laid.find_page("second"), Some(2));
        assert_eq!(laid.find_page("third"), Some(2));
    }

    #[test]
    fn test_table_header_repeats_on_new_page() {
        let laid = layout(
            &document(vec![section(false, vec![Block::Table(table(80))])]),
            &PageSetup::default(),
        )
        .unwrap();

        assert!(laid.page_count() > 1);
        for page in &laid.pages {
            let first = &page.items[0];
            assert_eq!(first.text, "Date");
            assert_eq!(first.style, TextStyle::Strong);
        }
        for i in 0..80 {
            assert!(laid.find_page(&format!("row-{i}")).is_some());
        }
    }

    #[test]
    fn test_header_never_orphaned() {
        let setup = PageSetup::default();
        // 把游标推到只剩一个表头高度的位置
        let row_height = setup.line_height + 2.0 * setup.cell_padding;
        let gap = setup.bottom() - setup.margin_top - row_height * 1.5;

        let doc = document(vec![section(
            false,
            vec![Block::body("intro"), Block::Gap(gap - setup.line_height), Block::Table(table(2))],
        )]);
        let laid = layout(&doc, &setup).unwrap();

        assert_eq!(laid.page_count(), 2);
        assert!(!laid.pages[0].contains("Date"));
        assert_eq!(laid.find_page("Date"), Some(2));
        assert_eq!(laid.find_page("row-0"), Some(2));
    }

    #[test]
    fn test_rows_stay_atomic() {
        let mut tall = Table::new(vec!["Field".into(), "Value".into()]);
        let long = vec!["word"; 200].join(" ");
        for _ in 0..4 {
            tall.push_row(vec!["Notes".into(), long.clone()]);
        }
        let setup = PageSetup::default();
        let laid = layout(&document(vec![section(false, vec![Block::Table(tall)])]), &setup).unwrap();

        // 每页的 Notes 单元格数量等于该页的行数，所有行内容都不越过下边距
        for page in &laid.pages {
            let rows = page.items.iter().filter(|i| i.text == "Notes").count();
            assert!(rows >= 1);
            for item in page.items.iter().filter(|i| i.style == TextStyle::Body) {
                assert!(item.y <= setup.bottom());
            }
        }
    }

    #[test]
    fn test_oversized_row_splits_across_pages() {
        let mut notes = Table::new(vec!["Field".into(), "Value".into()]).with_weights(vec![1.0, 3.0]);
        notes.push_row(vec!["Gender".into(), "F".into()]);
        notes.push_row(vec!["Notes".into(), vec!["observation"; 1500].join(" ")]);
        notes.push_row(vec!["Closing".into(), "end".into()]);

        let setup = PageSetup::default();
        let laid = layout(&document(vec![section(false, vec![Block::Table(notes)])]), &setup).unwrap();

        assert!(laid.page_count() > 2);
        for page in &laid.pages {
            assert_eq!(page.items[0].text, "Field");
            for item in page.items.iter().filter(|i| i.style != TextStyle::PageNumber) {
                assert!(item.y >= setup.margin_top && item.y <= setup.bottom(), "{:?}", item);
            }
        }

        let words: usize = laid
            .pages
            .iter()
            .flat_map(|p| p.items.iter())
            .map(|i| i.text.split_whitespace().filter(|w| *w == "observation").count())
            .sum();
        assert_eq!(words, 1500);
        assert_eq!(laid.find_page("Notes"), Some(1));
        assert_eq!(laid.find_page("Closing"), Some(laid.page_count()));
    }

    #[test]
    fn test_caption_stays_with_header() {
        let setup = PageSetup::default();
        let row_height = setup.line_height + 2.0 * setup.cell_padding;
        // 剩余空间够放标题与表头，但放不下首行
        let gap = setup.bottom() - setup.margin_top - setup.line_height - row_height * 2.2;

        let doc = document(vec![section(
            false,
            vec![
                Block::body("intro"),
                Block::Gap(gap),
                Block::Table(table(2).with_caption("Prediction History")),
            ],
        )]);
        let laid = layout(&doc, &setup).unwrap();

        assert_eq!(laid.page_count(), 2);
        assert!(!laid.pages[0].contains("Prediction History"));
        let page = &laid.pages[1];
        assert_eq!(page.items[0].text, "Prediction History");
        assert_eq!(page.items[0].style, TextStyle::Subheading);
        assert_eq!(page.items[1].text, "Date");
        assert!(page.items[0].y < page.items[1].y);
        assert!(page.contains("row-0"));
    }

    #[test]
    fn test_fixed_blocks_keep_position() {
        let doc = document(vec![section(
            false,
            vec![Block::fixed("Title", TextStyle::Title, 40.0, Align::Center)],
        )]);
        let laid = layout(&doc, &PageSetup::default()).unwrap();
        let title = &laid.pages[0].items[0];
        assert_eq!(title.x, 105.0);
        assert_eq!(title.y, 40.0);
    }

    #[test]
    fn test_invalid_setup() {
        let setup = PageSetup {
            margin_left: 150.0,
            margin_right: 150.0,
            ..PageSetup::default()
        };
        assert!(layout(&document(vec![]), &setup).is_err());
    }
}
