//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. Everything is positioned in points from the top-left
//! corner of the page; the renderer only has to flip the y axis.

/// A complete document layout ready for rendering.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

#[derive(Debug, Clone)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,

    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

/// Pre-wrapped, pre-aligned lines of a paragraph.
#[derive(Debug, Clone, Default)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
}

impl TextContent {
    /// All visible text, lines joined with `\n`.
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct TextLine {
    /// Offset of the line box top from the top of the text box.
    pub y_offset: f32,
    /// Baseline distance from the line box top.
    pub ascent: f32,
    pub spans: Vec<TextSpan>,
}

/// A piece of a line set in one font.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    /// Offset from the left edge of the text box, alignment applied.
    pub x_offset: f32,
    pub width: f32,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl LayoutConfig {
    pub fn new(title: impl Into<String>, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.into(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    /// Text of every box on every page in paint order.
    pub fn plain_text(&self) -> String {
        fn walk(b: &LayoutBox, out: &mut Vec<String>) {
            if let Some(t) = &b.text {
                out.push(t.plain_text());
            }
            for c in &b.children {
                walk(c, out);
            }
        }
        let mut out = Vec::new();
        for page in &self.pages {
            for b in &page.boxes {
                walk(b, &mut out);
            }
        }
        out.join("\n")
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            image: None,
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_box(y: f32, text: &str) -> LayoutBox {
        let mut b = LayoutBox::new(0.0, y, 100.0, 20.0);
        b.text = Some(TextContent {
            lines: vec![TextLine {
                y_offset: 0.0,
                ascent: 10.0,
                spans: vec![TextSpan {
                    text: text.into(),
                    x_offset: 0.0,
                    width: 50.0,
                    font_size: 12.0,
                    bold: false,
                    italic: false,
                    underline: false,
                    color: [0.0, 0.0, 0.0, 1.0],
                }],
            }],
        });
        b
    }

    #[test]
    fn plain_text_walks_pages_and_nested_boxes() {
        let mut frame = LayoutBox::new(0.0, 0.0, 400.0, 300.0);
        frame.children.push(text_box(10.0, "Certificate"));
        frame.children.push(text_box(40.0, "Jane Doe"));

        let mut config = LayoutConfig::new("Certificate", 400.0, 300.0);
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![frame],
        });
        config.pages.push(PageLayout {
            page_index: 1,
            boxes: vec![text_box(10.0, "page two")],
        });
        assert_eq!(config.plain_text(), "Certificate\nJane Doe\npage two");
    }
}
