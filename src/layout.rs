//! Layout engine – builds a Taffy tree from the template's block tree,
//! computes flexbox layout, and converts the result into positioned boxes in
//! document coordinates.
//!
//! Paragraph text is broken into lines while the tree is built, against an
//! estimate of the width the paragraph will get (the same estimate Taffy
//! ends up producing for column stacks and equal-width table cells).

use std::collections::HashMap;

use taffy::prelude::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId, Rect, Size, Style, TaffyTree,
};

use crate::document::{Block, Paragraph, Run, RunContent, Table, TemplateDocument};
use crate::dom::{DomNode, ElementNode, Tag};
use crate::fonts::{ascender_px, measure_text_width};
use crate::style::{self, resolve_inline_style, resolve_style, ComputedStyle, TextAlign};

// ---------------------------------------------------------------------------
// Output of layout (pre-pagination)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxRole {
    Block,
    Table,
    Row,
    Text,
    Image,
    Rule,
}

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub role: BoxRole,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

impl PositionedBox {
    /// Whether this box or any descendant paints text or an image.
    pub fn has_content(&self) -> bool {
        matches!(self.content, BoxContent::Text { .. } | BoxContent::Image { .. })
            || self.children.iter().any(PositionedBox::has_content)
    }
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text { lines: Vec<LineDraft>, align: TextAlign },
    Image { src: String },
}

/// Font settings of one piece of inline text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunFont {
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: [f32; 4],
    pub line_height: f32,
}

impl RunFont {
    fn from_style(s: &ComputedStyle) -> Self {
        Self {
            font_size: s.font_size,
            bold: s.is_bold(),
            italic: s.is_italic(),
            underline: s.text_decoration == style::TextDecoration::Underline,
            color: s.color.to_array(),
            line_height: s.line_height_px(),
        }
    }

    fn space_width(&self) -> f32 {
        measure_text_width(" ", self.font_size, self.bold)
    }
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub text: String,
    pub font: RunFont,
    pub width: f32,
}

/// One wrapped line, before alignment.
#[derive(Debug, Clone, Default)]
pub struct LineDraft {
    pub fragments: Vec<Fragment>,
    pub width: f32,
    pub height: f32,
    pub ascent: f32,
}

impl LineDraft {
    fn push(&mut self, frag: Fragment) {
        self.width += frag.width;
        if let Some(last) = self.fragments.last_mut() {
            if last.font == frag.font {
                last.text.push_str(&frag.text);
                last.width += frag.width;
                return;
            }
        }
        self.fragments.push(frag);
    }

    fn finish(&mut self, base: RunFont) {
        let (height, size) = self
            .fragments
            .iter()
            .fold((0.0f32, 0.0f32), |(h, s), f| {
                (h.max(f.font.line_height), s.max(f.font.font_size))
            });
        let (height, size) = if self.fragments.is_empty() {
            (base.line_height, base.font_size)
        } else {
            (height, size)
        };
        self.height = height;
        self.ascent = (height - size).max(0.0) / 2.0 + ascender_px(size);
    }
}

// ---------------------------------------------------------------------------
// Inline formatting
// ---------------------------------------------------------------------------

enum InlineToken {
    /// Pieces with no break opportunity between them.
    Word(Vec<Fragment>),
    Space(RunFont),
    Break,
}

fn run_style(run: &Run, base: &ComputedStyle) -> ComputedStyle {
    run.marks
        .iter()
        .fold(base.clone(), |s, m| resolve_inline_style(&m.element, &s))
}

/// Split runs into words and collapsible spaces. Non-breaking spaces are
/// word characters.
fn tokenize(runs: &[&Run], base: &ComputedStyle) -> Vec<InlineToken> {
    fn flush(word: &mut Vec<Fragment>, tokens: &mut Vec<InlineToken>) {
        if word.is_empty() {
            return;
        }
        for frag in word.iter_mut() {
            frag.width = measure_text_width(&frag.text, frag.font.font_size, frag.font.bold);
        }
        tokens.push(InlineToken::Word(std::mem::take(word)));
    }

    let mut tokens = Vec::new();
    let mut word: Vec<Fragment> = Vec::new();
    for run in runs {
        let font = RunFont::from_style(&run_style(run, base));
        match &run.content {
            RunContent::Text(text) => {
                for c in text.chars() {
                    if c.is_whitespace() && c != '\u{00A0}' {
                        flush(&mut word, &mut tokens);
                        if !matches!(tokens.last(), Some(InlineToken::Space(_))) {
                            tokens.push(InlineToken::Space(font));
                        }
                        continue;
                    }
                    match word.last_mut() {
                        Some(last) if last.font == font => last.text.push(c),
                        _ => word.push(Fragment {
                            text: c.to_string(),
                            font,
                            width: 0.0,
                        }),
                    }
                }
            }
            RunContent::Node(DomNode::Element(e)) if e.tag == Tag::Br => {
                flush(&mut word, &mut tokens);
                tokens.push(InlineToken::Break);
            }
            RunContent::Node(_) => {}
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

/// Greedy line breaking. A word wider than `max_width` overflows its line.
fn break_lines(tokens: &[InlineToken], max_width: f32, base: RunFont) -> Vec<LineDraft> {
    let mut lines = Vec::new();
    let mut line = LineDraft::default();
    let mut pending_space: Option<RunFont> = None;

    for token in tokens {
        match token {
            InlineToken::Space(font) => {
                if !line.fragments.is_empty() {
                    pending_space = Some(*font);
                }
            }
            InlineToken::Break => {
                line.finish(base);
                lines.push(std::mem::take(&mut line));
                pending_space = None;
            }
            InlineToken::Word(frags) => {
                let word_width: f32 = frags.iter().map(|f| f.width).sum();
                let space_width = pending_space.map(|f| f.space_width()).unwrap_or(0.0);
                if !line.fragments.is_empty() && line.width + space_width + word_width > max_width {
                    line.finish(base);
                    lines.push(std::mem::take(&mut line));
                    pending_space = None;
                } else if let Some(font) = pending_space.take() {
                    line.push(Fragment {
                        text: " ".to_string(),
                        font,
                        width: space_width,
                    });
                }
                for frag in frags {
                    line.push(frag.clone());
                }
            }
        }
    }
    if !line.fragments.is_empty() || lines.is_empty() {
        line.finish(base);
        lines.push(line);
    }
    lines
}

// ---------------------------------------------------------------------------
// Build Taffy tree from blocks
// ---------------------------------------------------------------------------

struct NodeInfo {
    role: BoxRole,
    style: ComputedStyle,
    content: BoxContent,
}

struct LayoutBuilder {
    taffy: TaffyTree<()>,
    nodes: HashMap<NodeId, NodeInfo>,
}

fn layout_err<E: std::fmt::Debug>(e: E) -> String {
    format!("layout error: {e:?}")
}

/// Content width of a box given the width offered by its parent.
fn inner_width(s: &ComputedStyle, avail: f32) -> f32 {
    let outer = match s.width {
        style::Dimension::Px(w) => w,
        style::Dimension::Percent(p) => avail * p / 100.0,
        style::Dimension::Auto => avail - s.margin_left - s.margin_right,
    };
    (outer - s.padding_left - s.padding_right - 2.0 * s.border_width).max(1.0)
}

fn dim_to_taffy(d: style::Dimension) -> taffy::Dimension {
    match d {
        style::Dimension::Auto => taffy::Dimension::Auto,
        style::Dimension::Px(v) => taffy::Dimension::Length(v),
        style::Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

fn margin_rect(s: &ComputedStyle) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(s.margin_top),
        right: LengthPercentageAuto::Length(s.margin_right),
        bottom: LengthPercentageAuto::Length(s.margin_bottom),
        left: LengthPercentageAuto::Length(s.margin_left),
    }
}

fn padding_rect(s: &ComputedStyle) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(s.padding_top),
        right: LengthPercentage::Length(s.padding_right),
        bottom: LengthPercentage::Length(s.padding_bottom),
        left: LengthPercentage::Length(s.padding_left),
    }
}

fn border_rect(width: f32) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(width),
        right: LengthPercentage::Length(width),
        bottom: LengthPercentage::Length(width),
        left: LengthPercentage::Length(width),
    }
}

fn is_row(s: &ComputedStyle) -> bool {
    s.display == style::Display::Flex && s.flex_direction == style::FlexDirection::Row
}

fn align_self_for(align: TextAlign) -> Option<taffy::AlignSelf> {
    Some(match align {
        TextAlign::Left => taffy::AlignSelf::Start,
        TextAlign::Center => taffy::AlignSelf::Center,
        TextAlign::Right => taffy::AlignSelf::End,
    })
}

/// Taffy style for a block container (paragraph box, div, body).
fn container_style(s: &ComputedStyle) -> Style {
    Style {
        display: taffy::Display::Flex,
        flex_direction: if is_row(s) {
            taffy::FlexDirection::Row
        } else {
            taffy::FlexDirection::Column
        },
        justify_content: Some(match s.justify_content {
            style::JustifyContent::Start => taffy::JustifyContent::Start,
            style::JustifyContent::End => taffy::JustifyContent::End,
            style::JustifyContent::Center => taffy::JustifyContent::Center,
            style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
            style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
        }),
        align_items: Some(match s.align_items {
            style::AlignItems::Start => taffy::AlignItems::Start,
            style::AlignItems::End => taffy::AlignItems::End,
            style::AlignItems::Center => taffy::AlignItems::Center,
            style::AlignItems::Stretch => taffy::AlignItems::Stretch,
        }),
        size: Size {
            width: dim_to_taffy(s.width),
            height: dim_to_taffy(s.height),
        },
        min_size: Size {
            width: taffy::Dimension::Length(0.0),
            height: taffy::Dimension::Auto,
        },
        flex_grow: s.flex_grow,
        margin: margin_rect(s),
        padding: padding_rect(s),
        border: border_rect(s.border_width),
        gap: Size {
            width: LengthPercentage::Length(s.gap),
            height: LengthPercentage::Length(s.gap),
        },
        ..Default::default()
    }
}

impl LayoutBuilder {
    fn new() -> Self {
        Self {
            taffy: TaffyTree::new(),
            nodes: HashMap::new(),
        }
    }

    fn add_node(
        &mut self,
        taffy_style: Style,
        children: &[NodeId],
        info: NodeInfo,
    ) -> Result<NodeId, String> {
        let node = if children.is_empty() {
            self.taffy.new_leaf(taffy_style)
        } else {
            self.taffy.new_with_children(taffy_style, children)
        }
        .map_err(layout_err)?;
        self.nodes.insert(node, info);
        Ok(node)
    }

    fn build_blocks(
        &mut self,
        blocks: &[Block],
        parent: &ComputedStyle,
        avail: f32,
    ) -> Result<Vec<NodeId>, String> {
        let mut ids = Vec::new();
        for block in blocks {
            if let Some(id) = self.build_block(block, parent, avail)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn build_block(
        &mut self,
        block: &Block,
        parent: &ComputedStyle,
        avail: f32,
    ) -> Result<Option<NodeId>, String> {
        match block {
            Block::Paragraph(p) => {
                let style = match &p.element {
                    Some(e) => resolve_style(e, Some(parent)),
                    None => parent.inherit_text(),
                };
                if style.display == style::Display::None {
                    return Ok(None);
                }
                self.build_paragraph(p, style, avail).map(Some)
            }
            Block::Table(t) => self.build_table(t, parent, avail),
            Block::Container(c) => {
                let style = resolve_style(&c.element, Some(parent));
                if style.display == style::Display::None {
                    return Ok(None);
                }
                let inner = inner_width(&style, avail);
                let child_avail = if is_row(&style) {
                    let n = c
                        .blocks
                        .iter()
                        .filter(|b| !matches!(b, Block::Raw(DomNode::Text(_))))
                        .count()
                        .max(1);
                    ((inner - style.gap * (n - 1) as f32) / n as f32).max(1.0)
                } else {
                    inner
                };
                let children = self.build_blocks(&c.blocks, &style, child_avail)?;
                let node = self.add_node(
                    container_style(&style),
                    &children,
                    NodeInfo {
                        role: BoxRole::Block,
                        style,
                        content: BoxContent::None,
                    },
                )?;
                Ok(Some(node))
            }
            Block::Raw(DomNode::Element(e)) => match e.tag {
                Tag::Img => self.build_image(e, parent, avail, parent.text_align),
                Tag::Hr => self.build_rule(e, parent).map(Some),
                _ => Ok(None),
            },
            Block::Raw(_) => Ok(None),
        }
    }

    /// A paragraph box holding text leaves, split around inline images.
    fn build_paragraph(
        &mut self,
        p: &Paragraph,
        style: ComputedStyle,
        avail: f32,
    ) -> Result<NodeId, String> {
        let inner = inner_width(&style, avail);
        let mut children = Vec::new();
        let mut segment: Vec<&Run> = Vec::new();

        for run in &p.runs {
            match &run.content {
                RunContent::Node(DomNode::Element(e)) if e.tag == Tag::Img => {
                    if let Some(id) = self.build_text_leaf(&segment, &style, inner)? {
                        children.push(id);
                    }
                    segment.clear();
                    if let Some(id) = self.build_image(e, &style, inner, style.text_align)? {
                        children.push(id);
                    }
                }
                _ => segment.push(run),
            }
        }
        if let Some(id) = self.build_text_leaf(&segment, &style, inner)? {
            children.push(id);
        }

        let mut taffy_style = container_style(&style);
        taffy_style.flex_direction = taffy::FlexDirection::Column;
        self.add_node(
            taffy_style,
            &children,
            NodeInfo {
                role: BoxRole::Block,
                style,
                content: BoxContent::None,
            },
        )
    }

    fn build_text_leaf(
        &mut self,
        runs: &[&Run],
        style: &ComputedStyle,
        max_width: f32,
    ) -> Result<Option<NodeId>, String> {
        let tokens = tokenize(runs, style);
        if !tokens
            .iter()
            .any(|t| matches!(t, InlineToken::Word(_) | InlineToken::Break))
        {
            return Ok(None);
        }
        let lines = break_lines(&tokens, max_width, RunFont::from_style(style));
        let height: f32 = lines.iter().map(|l| l.height).sum();
        let widest = lines.iter().map(|l| l.width).fold(0.0f32, f32::max);

        let taffy_style = Style {
            size: Size {
                width: taffy::Dimension::Auto,
                height: taffy::Dimension::Length(height),
            },
            min_size: Size {
                width: taffy::Dimension::Length(widest.min(max_width)),
                height: taffy::Dimension::Auto,
            },
            ..Default::default()
        };
        let mut leaf_style = style.inherit_text();
        leaf_style.text_decoration = style.text_decoration;
        let node = self.add_node(
            taffy_style,
            &[],
            NodeInfo {
                role: BoxRole::Text,
                content: BoxContent::Text {
                    lines,
                    align: style.text_align,
                },
                style: leaf_style,
            },
        )?;
        Ok(Some(node))
    }

    fn build_image(
        &mut self,
        e: &ElementNode,
        parent: &ComputedStyle,
        avail: f32,
        align: TextAlign,
    ) -> Result<Option<NodeId>, String> {
        let style = resolve_style(e, Some(parent));
        let src = e.src().unwrap_or_default().to_string();
        let Some((width, height)) = resolve_image_size(&src, &style, avail) else {
            log::warn!("Skipping image with unresolvable size");
            return Ok(None);
        };
        let taffy_style = Style {
            size: Size {
                width: taffy::Dimension::Length(width),
                height: taffy::Dimension::Length(height),
            },
            flex_shrink: 0.0,
            margin: margin_rect(&style),
            align_self: align_self_for(align),
            ..Default::default()
        };
        let node = self.add_node(
            taffy_style,
            &[],
            NodeInfo {
                role: BoxRole::Image,
                style,
                content: BoxContent::Image { src },
            },
        )?;
        Ok(Some(node))
    }

    fn build_rule(&mut self, e: &ElementNode, parent: &ComputedStyle) -> Result<NodeId, String> {
        let mut style = resolve_style(e, Some(parent));
        let thickness = style.border_width.max(1.0);
        style.background_color = style.border_color;
        style.border_width = 0.0;
        let taffy_style = Style {
            size: Size {
                width: dim_to_taffy(style.width),
                height: taffy::Dimension::Length(thickness),
            },
            margin: margin_rect(&style),
            ..Default::default()
        };
        self.add_node(
            taffy_style,
            &[],
            NodeInfo {
                role: BoxRole::Rule,
                style,
                content: BoxContent::None,
            },
        )
    }

    /// Tables are a column of flex rows; cells share the row width in
    /// proportion to their `colspan`.
    fn build_table(
        &mut self,
        t: &Table,
        parent: &ComputedStyle,
        avail: f32,
    ) -> Result<Option<NodeId>, String> {
        let style = resolve_style(&t.element, Some(parent));
        if style.display == style::Display::None {
            return Ok(None);
        }
        let inner = inner_width(&style, avail);
        let cell_border = if style.border_width > 0.0 { 1.0 } else { 0.0 };

        let mut row_ids = Vec::new();
        for row in t.rows() {
            let row_style = resolve_style(&row.element, Some(&style));
            let spans: Vec<f32> = row
                .cells()
                .map(|c| {
                    c.element
                        .attr("colspan")
                        .and_then(|v| v.trim().parse::<f32>().ok())
                        .unwrap_or(1.0)
                        .max(1.0)
                })
                .collect();
            let total_span: f32 = spans.iter().sum::<f32>().max(1.0);

            let mut cell_ids = Vec::new();
            for (cell, span) in row.cells().zip(&spans) {
                let mut cell_style = resolve_style(&cell.element, Some(&row_style));
                cell_style.border_width = cell_style.border_width.max(cell_border);
                let cell_w = match cell_style.width {
                    style::Dimension::Px(w) => w,
                    style::Dimension::Percent(p) => inner * p / 100.0,
                    style::Dimension::Auto => inner * span / total_span,
                };
                let content_w = (cell_w
                    - cell_style.padding_left
                    - cell_style.padding_right
                    - 2.0 * cell_style.border_width)
                    .max(1.0);
                let children = self.build_blocks(&cell.blocks, &cell_style, content_w)?;

                let mut taffy_style = container_style(&cell_style);
                taffy_style.flex_direction = taffy::FlexDirection::Column;
                taffy_style.margin = Rect {
                    top: LengthPercentageAuto::Length(0.0),
                    right: LengthPercentageAuto::Length(0.0),
                    bottom: LengthPercentageAuto::Length(0.0),
                    left: LengthPercentageAuto::Length(0.0),
                };
                if matches!(cell_style.width, style::Dimension::Auto) {
                    taffy_style.flex_grow = *span;
                    taffy_style.flex_basis = taffy::Dimension::Length(0.0);
                } else {
                    taffy_style.flex_shrink = 0.0;
                }
                cell_ids.push(self.add_node(
                    taffy_style,
                    &children,
                    NodeInfo {
                        role: BoxRole::Block,
                        style: cell_style,
                        content: BoxContent::None,
                    },
                )?);
            }

            let row_taffy = Style {
                display: taffy::Display::Flex,
                flex_direction: taffy::FlexDirection::Row,
                align_items: Some(taffy::AlignItems::Stretch),
                size: Size {
                    width: taffy::Dimension::Percent(1.0),
                    height: dim_to_taffy(row_style.height),
                },
                min_size: Size {
                    width: taffy::Dimension::Length(0.0),
                    height: taffy::Dimension::Auto,
                },
                ..Default::default()
            };
            row_ids.push(self.add_node(
                row_taffy,
                &cell_ids,
                NodeInfo {
                    role: BoxRole::Row,
                    style: row_style,
                    content: BoxContent::None,
                },
            )?);
        }

        let mut taffy_style = container_style(&style);
        taffy_style.flex_direction = taffy::FlexDirection::Column;
        taffy_style.align_items = Some(taffy::AlignItems::Stretch);
        let node = self.add_node(
            taffy_style,
            &row_ids,
            NodeInfo {
                role: BoxRole::Table,
                style,
                content: BoxContent::None,
            },
        )?;
        Ok(Some(node))
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, String> {
        let layout = self.taffy.layout(node).map_err(layout_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(layout_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        let (role, style, content) = match self.nodes.get(&node) {
            Some(info) => (info.role, info.style.clone(), info.content.clone()),
            None => (BoxRole::Block, ComputedStyle::default(), BoxContent::None),
        };

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            role,
            style,
            content,
            children,
        })
    }
}

// ---------------------------------------------------------------------------
// Image intrinsic-size helper
// ---------------------------------------------------------------------------

/// Final image size in px: explicit dimensions win, a single explicit
/// dimension keeps the intrinsic aspect ratio, otherwise the intrinsic pixel
/// size (1 px = 1 pt), scaled down to fit `avail`.
fn resolve_image_size(src: &str, style: &ComputedStyle, avail: f32) -> Option<(f32, f32)> {
    let known_w = match style.width {
        style::Dimension::Px(v) => Some(v),
        style::Dimension::Percent(p) => Some(avail * p / 100.0),
        style::Dimension::Auto => None,
    };
    let known_h = match style.height {
        style::Dimension::Px(v) => Some(v),
        _ => None,
    };
    if let (Some(w), Some(h)) = (known_w, known_h) {
        return Some((w, h));
    }

    let (px_w, px_h) = intrinsic_size(src)?;
    let aspect = px_w / px_h;
    let (w, h) = match (known_w, known_h) {
        (Some(w), _) => (w, (w / aspect).max(1.0)),
        (None, Some(h)) => ((h * aspect).max(1.0), h),
        (None, None) => (px_w, px_h),
    };
    if w > avail && avail > 0.0 {
        Some((avail, avail / aspect))
    } else {
        Some((w, h))
    }
}

fn intrinsic_size(src: &str) -> Option<(f32, f32)> {
    use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

    let rest = src.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    if !header.contains(";base64") {
        return None;
    }
    let bytes = BASE64_STD.decode(data.trim()).ok()?;
    let img = ::image::load_from_memory(&bytes).ok()?;
    let (w, h) = (img.width() as f32, img.height() as f32);
    (w > 0.0 && h > 0.0).then_some((w, h))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out a template's body, returning the top-level positioned boxes in
/// document coordinates (x already offset by the page margin).
pub fn compute_layout(
    doc: &TemplateDocument,
    page_width: f32,
    page_margin: f32,
) -> Result<Vec<PositionedBox>, String> {
    let content_width = page_width - 2.0 * page_margin;
    let mut builder = LayoutBuilder::new();

    let mut root_style = match &doc.body {
        Some(body) => resolve_style(body, None),
        None => ComputedStyle::default(),
    };
    // The page box is fixed; body sizing does not apply.
    root_style.width = style::Dimension::Auto;
    root_style.height = style::Dimension::Auto;

    let inner = inner_width(&root_style, content_width);
    let child_ids = builder.build_blocks(&doc.blocks, &root_style, inner)?;

    let mut taffy_root = container_style(&root_style);
    taffy_root.flex_direction = taffy::FlexDirection::Column;
    taffy_root.size = Size {
        width: taffy::Dimension::Length(content_width),
        height: taffy::Dimension::Auto,
    };
    taffy_root.margin = Rect {
        top: LengthPercentageAuto::Length(0.0),
        right: LengthPercentageAuto::Length(0.0),
        bottom: LengthPercentageAuto::Length(0.0),
        left: LengthPercentageAuto::Length(0.0),
    };
    let root = builder
        .taffy
        .new_with_children(taffy_root, &child_ids)
        .map_err(layout_err)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_err)?;

    let root_box = builder.extract(root, page_margin, 0.0)?;
    Ok(root_box.children)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(html: &str) -> Vec<PositionedBox> {
        let doc = TemplateDocument::parse(html);
        compute_layout(&doc, 595.0, 40.0).unwrap()
    }

    fn text_boxes(boxes: &[PositionedBox], out: &mut Vec<PositionedBox>) {
        for b in boxes {
            if b.role == BoxRole::Text {
                out.push(b.clone());
            }
            text_boxes(&b.children, out);
        }
    }

    #[test]
    fn layout_simple_paragraph() {
        let boxes = layout("<p>Hello world</p>");
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].width > 0.0);
        assert!(boxes[0].height > 0.0);
        assert!(boxes[0].has_content());
    }

    #[test]
    fn paragraphs_stack_vertically() {
        let boxes = layout("<p>One</p><p>Two</p>");
        assert_eq!(boxes.len(), 2);
        assert!(boxes[1].y >= boxes[0].y + boxes[0].height);
    }

    #[test]
    fn long_text_wraps_to_content_width() {
        let words = "certificate ".repeat(60);
        let mut texts = Vec::new();
        text_boxes(&layout(&format!("<p>{words}</p>")), &mut texts);
        let BoxContent::Text { lines, .. } = &texts[0].content else {
            panic!("expected text");
        };
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.width <= 515.0));
    }

    #[test]
    fn bold_run_keeps_its_own_font() {
        let mut texts = Vec::new();
        text_boxes(&layout("<p>Awarded to <b>Jane</b>.</p>"), &mut texts);
        let BoxContent::Text { lines, .. } = &texts[0].content else {
            panic!("expected text");
        };
        let frags = &lines[0].fragments;
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[1].text, "Jane");
        assert!(frags[1].font.bold);
        assert_eq!(frags[2].text, ".");
    }

    #[test]
    fn table_cells_share_the_row() {
        let boxes = layout(r#"<table border="1"><tr><td>A</td><td>B</td></tr></table>"#);
        let table = &boxes[0];
        assert_eq!(table.role, BoxRole::Table);
        let row = &table.children[0];
        assert_eq!(row.children.len(), 2);
        let (a, b) = (&row.children[0], &row.children[1]);
        assert!((a.width - b.width).abs() < 1.0);
        assert!(b.x > a.x);
    }

    #[test]
    fn whitespace_only_body_has_no_content() {
        let boxes = layout("<body>\n  <!-- nothing -->\n</body>");
        assert!(boxes.iter().all(|b| !b.has_content()));
    }
}
