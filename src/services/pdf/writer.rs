use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::errors::AppError;

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const MARGIN: f32 = 50.0;
const FOOTER_HEIGHT: f32 = 30.0;

pub const BODY_SIZE: f32 = 10.0;
const LINE_SPACING: f32 = 1.35;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Clone, Debug)]
pub struct TableColumn {
    pub title: String,
    /// Доля ширины области контента
    pub width: f32,
    pub align: Align,
}

impl TableColumn {
    pub fn new(title: &str, width: f32, align: Align) -> Self {
        Self {
            title: title.to_string(),
            width,
            align,
        }
    }
}

/// Последовательная вёрстка A4 поверх base-14 шрифтов Helvetica.
///
/// Держит курсор `cursor_y` (расстояние от низа страницы) и переносит
/// блок на новую страницу, если он не помещается над нижним полем.
pub struct PdfWriter {
    title: String,
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    cursor_y: f32,
}

impl PdfWriter {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            pages: Vec::new(),
            current: Vec::new(),
            cursor_y: PAGE_HEIGHT - MARGIN,
        }
    }

    pub fn content_width() -> f32 {
        PAGE_WIDTH - 2.0 * MARGIN
    }

    pub fn cursor_y(&self) -> f32 {
        self.cursor_y
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    fn bottom_limit() -> f32 {
        MARGIN + FOOTER_HEIGHT
    }

    /// Открывает новую страницу, если `height` не помещается
    pub fn ensure_space(&mut self, height: f32) {
        if self.cursor_y - height < Self::bottom_limit() {
            self.new_page();
        }
    }

    pub fn new_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.cursor_y = PAGE_HEIGHT - MARGIN;
    }

    pub fn spacer(&mut self, height: f32) {
        self.cursor_y -= height;
        if self.cursor_y < Self::bottom_limit() {
            self.new_page();
        }
    }

    fn text_at(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        self.current.push(Operation::new("BT", vec![]));
        self.current.push(Operation::new(
            "Tf",
            vec![font.resource().into(), size.into()],
        ));
        self.current.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.current.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_win_ansi(text))],
        ));
        self.current.push(Operation::new("ET", vec![]));
    }

    fn rule(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32) {
        self.current.push(Operation::new("w", vec![width.into()]));
        self.current.push(Operation::new("m", vec![x1.into(), y1.into()]));
        self.current.push(Operation::new("l", vec![x2.into(), y2.into()]));
        self.current.push(Operation::new("S", vec![]));
    }

    fn shade(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.current.push(Operation::new("q", vec![]));
        self.current.push(Operation::new(
            "rg",
            vec![0.93f32.into(), 0.94f32.into(), 0.96f32.into()],
        ));
        self.current.push(Operation::new(
            "re",
            vec![x.into(), y.into(), width.into(), height.into()],
        ));
        self.current.push(Operation::new("f", vec![]));
        self.current.push(Operation::new("Q", vec![]));
    }

    /// Одна строка текста с переводом курсора
    pub fn line(&mut self, text: &str, font: Font, size: f32) {
        let height = size * LINE_SPACING;
        self.ensure_space(height);
        self.cursor_y -= size;
        self.text_at(MARGIN, self.cursor_y, font, size, text);
        self.cursor_y -= height - size;
    }

    pub fn header(&mut self, title: &str, subtitle: Option<&str>) {
        self.ensure_space(60.0);
        self.cursor_y -= 20.0;
        self.text_at(MARGIN, self.cursor_y, Font::Bold, 20.0, title);
        self.cursor_y -= 8.0;
        if let Some(subtitle) = subtitle {
            self.cursor_y -= 12.0;
            self.text_at(MARGIN, self.cursor_y, Font::Italic, 11.0, subtitle);
            self.cursor_y -= 6.0;
        }
        let y = self.cursor_y;
        self.rule(MARGIN, y, PAGE_WIDTH - MARGIN, y, 1.0);
        self.cursor_y -= 14.0;
    }

    pub fn section(&mut self, title: &str) {
        // заголовок не должен остаться один внизу страницы
        self.ensure_space(40.0);
        self.cursor_y -= 8.0;
        self.line(title, Font::Bold, 12.0);
        self.cursor_y -= 2.0;
    }

    pub fn paragraph(&mut self, text: &str) {
        self.paragraph_with(text, Font::Regular, BODY_SIZE);
    }

    pub fn paragraph_with(&mut self, text: &str, font: Font, size: f32) {
        let max_width = Self::content_width();
        for block in text.split('\n') {
            if block.trim().is_empty() {
                self.spacer(size * 0.6);
                continue;
            }
            for wrapped in wrap_text(block, font, size, max_width) {
                self.line(&wrapped, font, size);
            }
        }
        self.cursor_y -= size * 0.5;
    }

    pub fn key_values(&mut self, pairs: &[(&str, String)]) {
        let label_width = pairs
            .iter()
            .map(|(label, _)| text_width(label, Font::Bold, BODY_SIZE))
            .fold(0.0f32, f32::max)
            + 12.0;
        let value_width = Self::content_width() - label_width;

        for (label, value) in pairs {
            let lines = wrap_text(value, Font::Regular, BODY_SIZE, value_width);
            let height = lines.len().max(1) as f32 * BODY_SIZE * LINE_SPACING;
            self.ensure_space(height);
            self.cursor_y -= BODY_SIZE;
            self.text_at(MARGIN, self.cursor_y, Font::Bold, BODY_SIZE, label);
            for (idx, line) in lines.iter().enumerate() {
                if idx > 0 {
                    self.cursor_y -= BODY_SIZE * LINE_SPACING;
                }
                self.text_at(MARGIN + label_width, self.cursor_y, Font::Regular, BODY_SIZE, line);
            }
            self.cursor_y -= BODY_SIZE * (LINE_SPACING - 1.0);
        }
        self.cursor_y -= BODY_SIZE * 0.5;
    }

    /// Два блока рядом (продавец / покупатель)
    pub fn two_columns(&mut self, left: &[String], right: &[String]) {
        let rows = left.len().max(right.len());
        let height = rows as f32 * BODY_SIZE * LINE_SPACING;
        self.ensure_space(height);
        let column_x = MARGIN + Self::content_width() / 2.0 + 10.0;
        for idx in 0..rows {
            self.cursor_y -= BODY_SIZE;
            let font = if idx == 0 { Font::Bold } else { Font::Regular };
            if let Some(text) = left.get(idx) {
                self.text_at(MARGIN, self.cursor_y, font, BODY_SIZE, text);
            }
            if let Some(text) = right.get(idx) {
                self.text_at(column_x, self.cursor_y, font, BODY_SIZE, text);
            }
            self.cursor_y -= BODY_SIZE * (LINE_SPACING - 1.0);
        }
        self.cursor_y -= BODY_SIZE;
    }

    pub fn table(&mut self, columns: &[TableColumn], rows: &[Vec<String>]) {
        let total_width = Self::content_width();
        let row_height = BODY_SIZE * 1.8;
        let widths: Vec<f32> = columns.iter().map(|c| c.width * total_width).collect();

        self.table_header(columns, &widths, row_height);

        for row in rows {
            let first_cell_lines = wrap_text(
                row.first().map(String::as_str).unwrap_or(""),
                Font::Regular,
                BODY_SIZE,
                widths.first().copied().unwrap_or(total_width) - 8.0,
            );
            let height = row_height + (first_cell_lines.len().max(1) - 1) as f32 * BODY_SIZE * LINE_SPACING;
            if self.cursor_y - height < Self::bottom_limit() {
                self.new_page();
                self.table_header(columns, &widths, row_height);
            }

            let baseline = self.cursor_y - BODY_SIZE - 4.0;
            let mut x = MARGIN;
            for (idx, column) in columns.iter().enumerate() {
                let cell = row.get(idx).map(String::as_str).unwrap_or("");
                if idx == 0 {
                    for (line_idx, line) in first_cell_lines.iter().enumerate() {
                        let y = baseline - line_idx as f32 * BODY_SIZE * LINE_SPACING;
                        self.text_at(x + 4.0, y, Font::Regular, BODY_SIZE, line);
                    }
                } else {
                    self.cell(x, baseline, widths[idx], column.align, Font::Regular, cell);
                }
                x += widths[idx];
            }
            self.cursor_y -= height;
            let y = self.cursor_y;
            self.rule(MARGIN, y, PAGE_WIDTH - MARGIN, y, 0.3);
        }
        self.cursor_y -= 10.0;
    }

    fn table_header(&mut self, columns: &[TableColumn], widths: &[f32], row_height: f32) {
        self.ensure_space(row_height * 2.0);
        let y = self.cursor_y - row_height;
        self.shade(MARGIN, y, Self::content_width(), row_height);
        let baseline = self.cursor_y - BODY_SIZE - 4.0;
        let mut x = MARGIN;
        for (idx, column) in columns.iter().enumerate() {
            self.cell(x, baseline, widths[idx], column.align, Font::Bold, &column.title);
            x += widths[idx];
        }
        self.cursor_y = y;
    }

    fn cell(&mut self, x: f32, baseline: f32, width: f32, align: Align, font: Font, text: &str) {
        let text_x = match align {
            Align::Left => x + 4.0,
            Align::Right => x + width - 4.0 - text_width(text, font, BODY_SIZE),
        };
        self.text_at(text_x, baseline, font, BODY_SIZE, text);
    }

    /// Строки итогов, выровненные по правому краю
    pub fn totals(&mut self, rows: &[(&str, String, bool)]) {
        let right = PAGE_WIDTH - MARGIN;
        let label_x = right - 220.0;
        self.ensure_space(rows.len() as f32 * BODY_SIZE * 1.8);
        for (label, value, emphasize) in rows {
            let font = if *emphasize { Font::Bold } else { Font::Regular };
            let size = if *emphasize { BODY_SIZE + 1.0 } else { BODY_SIZE };
            self.cursor_y -= size;
            self.text_at(label_x, self.cursor_y, font, size, label);
            let value_x = right - text_width(value, font, size);
            self.text_at(value_x, self.cursor_y, font, size, value);
            self.cursor_y -= size * 0.8;
        }
        self.cursor_y -= BODY_SIZE;
    }

    pub fn signature_block(&mut self, left: &str, right: &str) {
        let height = 90.0;
        self.ensure_space(height);
        let column_x = MARGIN + Self::content_width() / 2.0 + 10.0;
        self.cursor_y -= BODY_SIZE;
        self.text_at(MARGIN, self.cursor_y, Font::Bold, BODY_SIZE, left);
        self.text_at(column_x, self.cursor_y, Font::Bold, BODY_SIZE, right);
        self.cursor_y -= BODY_SIZE * 1.5;
        self.text_at(MARGIN, self.cursor_y, Font::Italic, 8.0, "Lu et approuvé, date et signature");
        self.text_at(column_x, self.cursor_y, Font::Italic, 8.0, "Lu et approuvé, date et signature");
        let line_y = self.cursor_y - 50.0;
        self.rule(MARGIN, line_y, MARGIN + 200.0, line_y, 0.5);
        self.rule(column_x, line_y, column_x + 200.0, line_y, 0.5);
        self.cursor_y = line_y - 10.0;
    }

    /// Собирает документ: нумерация страниц в подвале, шрифты, каталог
    pub fn finish(mut self) -> Result<Vec<u8>, AppError> {
        let last = std::mem::take(&mut self.current);
        self.pages.push(last);
        let total = self.pages.len();

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(base_font("Helvetica"));
        let bold_id = doc.add_object(base_font("Helvetica-Bold"));
        let italic_id = doc.add_object(base_font("Helvetica-Oblique"));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
                "F3" => italic_id,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(total);
        let pages = std::mem::take(&mut self.pages);
        for (idx, mut operations) in pages.into_iter().enumerate() {
            let footer = format!("{} - page {} / {}", self.title, idx + 1, total);
            let footer_x = PAGE_WIDTH - MARGIN - text_width(&footer, Font::Italic, 8.0);
            self.current = Vec::new();
            self.text_at(footer_x, MARGIN / 2.0, Font::Italic, 8.0, &footer);
            operations.append(&mut self.current);

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => total as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    PAGE_WIDTH.into(),
                    PAGE_HEIGHT.into(),
                ],
            }),
        );

        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(encode_win_ansi(&self.title)),
            "Producer" => Object::string_literal("SimplRH"),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

fn base_font(name: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => name,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Перекодировка в WinAnsi (cp1252): латиница-1 как есть, типографские знаки по таблице
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            'Œ' => 0x8C,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            'œ' => 0x9C,
            'Ÿ' => 0x9F,
            c if (c as u32) < 0x80 => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// Приблизительная ширина строки для Helvetica (в пунктах)
pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    let em: f32 = text
        .chars()
        .map(|c| match c {
            ' ' => 0.278,
            'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' | 'í' | 'ì' | 'î' | 'ï' => 0.24,
            'f' | 't' | 'r' | 'I' | '(' | ')' | '-' | '/' => 0.333,
            'm' | 'w' => 0.833,
            'M' | 'W' | 'Œ' | 'œ' => 0.9,
            '0'..='9' => 0.556,
            '€' => 0.556,
            c if c.is_uppercase() => 0.667,
            _ => 0.52,
        })
        .sum();
    let factor = if font == Font::Bold { 1.06 } else { 1.0 };
    em * size * factor
}

/// Перенос по словам; слишком длинное слово режется посимвольно
pub fn wrap_text(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, font, size) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if text_width(word, font, size) <= max_width {
            current = word.to_string();
        } else {
            for ch in word.chars() {
                current.push(ch);
                if text_width(&current, font, size) > max_width {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_french_characters() {
        assert_eq!(encode_win_ansi("é"), vec![0xE9]);
        assert_eq!(encode_win_ansi("10 €"), vec![b'1', b'0', b' ', 0x80]);
        assert_eq!(encode_win_ansi("œuvre"), vec![0x9C, b'u', b'v', b'r', b'e']);
        assert_eq!(encode_win_ansi("\u{4e2d}"), vec![b'?']);
    }

    #[test]
    fn wraps_long_paragraphs() {
        let text = "Le salarié est engagé à compter de la date de signature du présent contrat ".repeat(6);
        let lines = wrap_text(&text, Font::Regular, BODY_SIZE, 200.0);
        assert!(lines.len() > 3);
        for line in &lines {
            assert!(text_width(line, Font::Regular, BODY_SIZE) <= 200.0);
        }
    }

    #[test]
    fn splits_words_wider_than_the_column() {
        let lines = wrap_text(&"A".repeat(80), Font::Regular, BODY_SIZE, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "A".repeat(80));
    }

    #[test]
    fn produces_a_pdf_document() {
        let mut writer = PdfWriter::new("Test");
        writer.header("Facture", Some("FAC-0001"));
        writer.paragraph("Bonjour à tous.");
        let bytes = writer.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert!(bytes.len() > 200);
    }

    #[test]
    fn breaks_pages_when_cursor_reaches_bottom() {
        let mut writer = PdfWriter::new("Long");
        for idx in 0..120 {
            writer.paragraph(&format!("Paragraphe numéro {}", idx));
        }
        assert!(writer.page_count() > 1);
        assert!(writer.cursor_y() >= MARGIN);
        let bytes = writer.finish().unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }
}
