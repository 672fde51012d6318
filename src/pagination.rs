//! Pagination – splits positioned boxes into pages and freezes them into the
//! [`LayoutConfig`] the renderer consumes.
//!
//! Handles:
//! - page boundaries and explicit break-before / break-after hints
//! - containers taller than a page, whose children paginate individually
//! - tables that split between rows

use crate::layout::{BoxContent, BoxRole, LineDraft, PositionedBox};
use crate::layout_config::*;
use crate::style::TextAlign;

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

/// Recursively expand any plain container taller than a page so its
/// children can be split across pages individually.
fn flatten_for_pagination(boxes: &[PositionedBox], content_height: f32) -> Vec<&PositionedBox> {
    let mut result = Vec::new();
    for pbox in boxes {
        if pbox.height > content_height
            && pbox.role == BoxRole::Block
            && matches!(pbox.content, BoxContent::None)
            && !pbox.children.is_empty()
        {
            result.extend(flatten_for_pagination(&pbox.children, content_height));
        } else {
            result.push(pbox);
        }
    }
    result
}

struct Paginator {
    config: LayoutConfig,
    current: PageLayout,
    /// Document-space y at which the current page begins.
    page_start_doc_y: f32,
    content_height: f32,
    page_margin: f32,
}

impl Paginator {
    fn new_page(&mut self, start_doc_y: f32) {
        let next = PageLayout {
            page_index: self.config.pages.len() + 1,
            boxes: Vec::new(),
        };
        let done = std::mem::replace(&mut self.current, next);
        self.config.pages.push(done);
        self.page_start_doc_y = start_doc_y;
    }

    fn place(&mut self, pbox: &PositionedBox) {
        let y_on_page = (pbox.y - self.page_start_doc_y).max(0.0);
        let abs_y = self.page_margin + y_on_page;
        self.current.boxes.push(build_layout_box(pbox, pbox.x, abs_y));
    }

    fn overflows(&self, pbox: &PositionedBox) -> bool {
        let y_on_page = (pbox.y - self.page_start_doc_y).max(0.0);
        y_on_page + pbox.height > self.content_height && !self.current.boxes.is_empty()
    }
}

/// Convert positioned boxes into a paginated [`LayoutConfig`].
pub fn paginate(
    boxes: &[PositionedBox],
    title: &str,
    page_width: f32,
    page_height: f32,
    page_margin: f32,
) -> LayoutConfig {
    let content_height = page_height - 2.0 * page_margin;
    let mut p = Paginator {
        config: LayoutConfig::new(title, page_width, page_height),
        current: PageLayout {
            page_index: 0,
            boxes: Vec::new(),
        },
        page_start_doc_y: 0.0,
        content_height,
        page_margin,
    };

    for pbox in flatten_for_pagination(boxes, content_height) {
        if pbox.style.page_break_before && !p.current.boxes.is_empty() {
            p.new_page(pbox.y);
        }

        if p.overflows(pbox) {
            if pbox.role == BoxRole::Table {
                for row in &pbox.children {
                    if p.overflows(row) {
                        p.new_page(row.y);
                    }
                    p.place(row);
                }
                continue;
            }
            p.new_page(pbox.y);
        }

        p.place(pbox);

        if pbox.style.page_break_after {
            p.new_page(pbox.y + pbox.height);
        }
    }

    if !p.current.boxes.is_empty() || p.config.pages.is_empty() {
        let last = std::mem::replace(
            &mut p.current,
            PageLayout {
                page_index: 0,
                boxes: Vec::new(),
            },
        );
        p.config.pages.push(last);
    }
    p.config
}

/// Position each line's spans for the final box width.
fn text_content(lines: &[LineDraft], align: TextAlign, box_width: f32) -> TextContent {
    let mut y = 0.0;
    let lines = lines
        .iter()
        .map(|line| {
            let start = match align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (box_width - line.width) / 2.0,
                TextAlign::Right => box_width - line.width,
            }
            .max(0.0);
            let mut x = start;
            let spans = line
                .fragments
                .iter()
                .map(|f| {
                    let span = TextSpan {
                        text: f.text.clone(),
                        x_offset: x,
                        width: f.width,
                        font_size: f.font.font_size,
                        bold: f.font.bold,
                        italic: f.font.italic,
                        underline: f.font.underline,
                        color: f.font.color,
                    };
                    x += f.width;
                    span
                })
                .collect();
            let out = TextLine {
                y_offset: y,
                ascent: line.ascent,
                spans,
            };
            y += line.height;
            out
        })
        .collect();
    TextContent { lines }
}

/// Build a LayoutBox tree with page-absolute coordinates. Child offsets are
/// taken relative to the parent's document-space y.
fn build_layout_box(pbox: &PositionedBox, abs_x: f32, abs_y: f32) -> LayoutBox {
    let mut lb = LayoutBox::new(abs_x, abs_y, pbox.width, pbox.height);

    if !pbox.style.background_color.is_transparent() {
        lb.background_color = Some(pbox.style.background_color.to_array());
    }
    if pbox.style.border_width > 0.0 && pbox.role != BoxRole::Text {
        lb.border = Some(BorderStyle {
            width: pbox.style.border_width,
            color: pbox.style.border_color.to_array(),
        });
    }

    match &pbox.content {
        BoxContent::Text { lines, align } => {
            lb.text = Some(text_content(lines, *align, pbox.width));
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::None => {}
    }

    for child in &pbox.children {
        let child_abs_y = abs_y + (child.y - pbox.y);
        lb.children.push(build_layout_box(child, child.x, child_abs_y));
    }
    lb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TemplateDocument;
    use crate::layout::compute_layout;

    fn paginate_html(html: &str) -> LayoutConfig {
        let doc = TemplateDocument::parse(html);
        let boxes = compute_layout(&doc, 595.0, PAGE_MARGIN_PT).unwrap();
        paginate(&boxes, "t", 595.0, 842.0, PAGE_MARGIN_PT)
    }

    #[test]
    fn single_page() {
        let config = paginate_html("<p>Short text</p>");
        assert_eq!(config.pages.len(), 1);
        assert!(config.plain_text().contains("Short text"));
    }

    #[test]
    fn multiple_pages() {
        let html: String = (0..60)
            .map(|i| format!("<p>Paragraph {i} with some text</p>"))
            .collect();
        let config = paginate_html(&html);
        assert!(config.pages.len() > 1, "got {}", config.pages.len());
        assert_eq!(config.pages[1].page_index, 1);
    }

    #[test]
    fn explicit_break_starts_a_new_page() {
        let config =
            paginate_html(r#"<p style="page-break-after: always">First</p><p>Second</p>"#);
        assert_eq!(config.pages.len(), 2);
    }

    #[test]
    fn centered_text_is_offset() {
        let config = paginate_html(r#"<p style="text-align: center">Hi</p>"#);
        let text = config.pages[0].boxes[0].children[0].text.as_ref().unwrap();
        assert!(text.lines[0].spans[0].x_offset > 100.0);
    }
}
