//! Style resolver – maps tag defaults, legacy presentational attributes,
//! utility classes and inline `style` declarations onto a flat
//! [`ComputedStyle`] consumed by the layout engine.

use crate::dom::{ElementNode, Tag};

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    // Display / layout
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub flex_grow: f32,
    pub gap: f32,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,

    // Spacing (px)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    // Border
    pub border_width: f32,
    pub border_color: Color,

    // Typography
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,

    // Background
    pub background_color: Color,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            flex_grow: 0.0,
            gap: 0.0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            border_width: 0.0,
            border_color: Color::BLACK,
            font_size: 16.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            text_decoration: TextDecoration::None,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
        }
    }
}

impl ComputedStyle {
    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    pub fn line_height_px(&self) -> f32 {
        self.font_size * self.line_height
    }

    /// Copy of the inheritable text properties only, for anonymous boxes.
    pub fn inherit_text(&self) -> ComputedStyle {
        ComputedStyle {
            font_size: self.font_size,
            font_weight: self.font_weight,
            font_style: self.font_style,
            color: self.color,
            text_align: self.text_align,
            line_height: self.line_height,
            ..ComputedStyle::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb8(0, 0, 0);
    pub const WHITE: Self = Self::rgb8(255, 255, 255);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb8(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb8(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// `#rgb`, `#rrggbb`, `rgb(r, g, b)` or a small set of named colours.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.starts_with('#') {
            return Self::from_hex(s);
        }
        if let Some(inner) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
            let parts: Vec<u8> = inner
                .split(',')
                .filter_map(|p| p.trim().parse::<u8>().ok())
                .collect();
            return match parts.as_slice() {
                [r, g, b] => Some(Self::rgb8(*r, *g, *b)),
                _ => None,
            };
        }
        named_color(&s.to_ascii_lowercase())
    }
}

fn named_color(name: &str) -> Option<Color> {
    let c = match name {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "transparent" => Color::TRANSPARENT,
        "gray" | "grey" => Color::rgb8(128, 128, 128),
        "silver" => Color::rgb8(192, 192, 192),
        "red" => Color::rgb8(255, 0, 0),
        "maroon" => Color::rgb8(128, 0, 0),
        "green" => Color::rgb8(0, 128, 0),
        "blue" => Color::rgb8(0, 0, 255),
        "navy" => Color::rgb8(0, 0, 128),
        "darkblue" => Color::rgb8(0, 0, 139),
        "teal" => Color::rgb8(0, 128, 128),
        "gold" => Color::rgb8(255, 215, 0),
        "goldenrod" => Color::rgb8(218, 165, 32),
        "darkgoldenrod" => Color::rgb8(184, 134, 11),
        _ => return None,
    };
    Some(c)
}

/// Tailwind palette subset: `text-*`, `bg-*`, `border-*`.
fn palette(name: &str) -> Option<Color> {
    let c = match name {
        "white" => Color::WHITE,
        "black" => Color::BLACK,
        "gray-100" => Color::rgb8(243, 244, 246),
        "gray-200" => Color::rgb8(229, 231, 235),
        "gray-300" => Color::rgb8(209, 213, 219),
        "gray-500" => Color::rgb8(107, 114, 128),
        "gray-700" => Color::rgb8(55, 65, 81),
        "gray-900" => Color::rgb8(17, 24, 39),
        "blue-700" => Color::rgb8(29, 78, 216),
        "blue-900" => Color::rgb8(30, 58, 138),
        "yellow-500" => Color::rgb8(234, 179, 8),
        "yellow-600" => Color::rgb8(202, 138, 4),
        "amber-700" => Color::rgb8(180, 83, 9),
        "red-700" => Color::rgb8(185, 28, 28),
        "green-700" => Color::rgb8(21, 128, 61),
        _ => return None,
    };
    Some(c)
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for a block-level element, inheriting text properties
/// from its parent.
pub fn resolve_style(element: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = match parent {
        Some(p) => p.inherit_text(),
        None => ComputedStyle::default(),
    };
    apply_tag_defaults(&mut style, &element.tag);
    apply_presentational_attributes(&mut style, element);
    for class in element.classes() {
        apply_utility_class(&mut style, class);
    }
    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }
    style
}

/// Resolve the text style of a run wrapped in an inline element. Only text
/// properties can change; box properties of inline wrappers are ignored.
pub fn resolve_inline_style(mark: &ElementNode, parent: &ComputedStyle) -> ComputedStyle {
    let mut style = parent.clone();
    match mark.tag {
        Tag::B | Tag::Strong => style.font_weight = FontWeight::Bold,
        Tag::I | Tag::Em => style.font_style = FontStyle::Italic,
        Tag::U | Tag::A => style.text_decoration = TextDecoration::Underline,
        Tag::Small => style.font_size *= 0.83,
        Tag::Font => {
            if let Some(c) = mark.attr("color").and_then(Color::parse) {
                style.color = c;
            }
            if let Some(size) = mark.attr("size").and_then(|s| s.trim().parse::<u8>().ok()) {
                style.font_size = legacy_font_size(size);
            }
        }
        _ => {}
    }
    for class in mark.classes() {
        apply_utility_class(&mut style, class);
    }
    if let Some(inline) = mark.inline_style() {
        apply_inline_style(&mut style, inline);
    }
    style
}

/// `<font size=1..7>`.
fn legacy_font_size(size: u8) -> f32 {
    match size {
        0 | 1 => 10.0,
        2 => 13.0,
        3 => 16.0,
        4 => 18.0,
        5 => 24.0,
        6 => 32.0,
        _ => 48.0,
    }
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    match tag {
        Tag::H1 => heading(s, 32.0, 12.0),
        Tag::H2 => heading(s, 24.0, 10.0),
        Tag::H3 => heading(s, 20.0, 8.0),
        Tag::H4 => heading(s, 16.0, 8.0),
        Tag::H5 | Tag::H6 => heading(s, 14.0, 6.0),
        Tag::P => s.margin_bottom = 10.0,
        Tag::Ul | Tag::Ol => {
            s.margin_bottom = 10.0;
            s.padding_left = 24.0;
        }
        Tag::Li => s.margin_bottom = 4.0,
        Tag::Center => s.text_align = TextAlign::Center,
        Tag::Table => s.margin_bottom = 10.0,
        Tag::Td | Tag::Th => {
            s.padding_top = 4.0;
            s.padding_right = 8.0;
            s.padding_bottom = 4.0;
            s.padding_left = 8.0;
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
            }
        }
        Tag::Hr => {
            s.border_width = 1.0;
            s.border_color = Color::rgb8(160, 160, 160);
            s.margin_top = 8.0;
            s.margin_bottom = 8.0;
        }
        Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Meta | Tag::Link => {
            s.display = Display::None
        }
        // Unknown elements are skipped.
        Tag::Other(_) => s.display = Display::None,
        _ => {}
    }
}

fn heading(s: &mut ComputedStyle, size: f32, margin: f32) {
    s.font_size = size;
    s.font_weight = FontWeight::Bold;
    s.margin_top = margin;
    s.margin_bottom = margin;
}

/// `align`, `bgcolor`, `width`, `height`, `border` as emitted by word
/// processors exporting to HTML.
fn apply_presentational_attributes(s: &mut ComputedStyle, e: &ElementNode) {
    if let Some(align) = e.attr("align") {
        s.text_align = parse_text_align(align);
    }
    if let Some(c) = e.attr("bgcolor").and_then(Color::parse) {
        s.background_color = c;
    }
    if let Some(w) = e.attr("width") {
        s.width = parse_dimension(w);
    }
    if let Some(h) = e.attr("height") {
        s.height = parse_dimension(h);
    }
    if let Some(px) = e.attr("border").and_then(parse_px) {
        s.border_width = px;
    }
}

/// Apply a single utility class.
fn apply_utility_class(s: &mut ComputedStyle, class: &str) {
    match class {
        "flex" => s.display = Display::Flex,
        "block" => s.display = Display::Block,
        "hidden" => s.display = Display::None,
        "flex-row" => s.flex_direction = FlexDirection::Row,
        "flex-col" => s.flex_direction = FlexDirection::Column,
        "flex-1" | "grow" => s.flex_grow = 1.0,

        "justify-start" => s.justify_content = JustifyContent::Start,
        "justify-end" => s.justify_content = JustifyContent::End,
        "justify-center" => s.justify_content = JustifyContent::Center,
        "justify-between" => s.justify_content = JustifyContent::SpaceBetween,
        "justify-around" => s.justify_content = JustifyContent::SpaceAround,

        "items-start" => s.align_items = AlignItems::Start,
        "items-end" => s.align_items = AlignItems::End,
        "items-center" => s.align_items = AlignItems::Center,
        "items-stretch" => s.align_items = AlignItems::Stretch,

        "font-bold" => s.font_weight = FontWeight::Bold,
        "font-normal" => s.font_weight = FontWeight::Normal,
        "italic" => s.font_style = FontStyle::Italic,
        "not-italic" => s.font_style = FontStyle::Normal,
        "underline" => s.text_decoration = TextDecoration::Underline,
        "no-underline" => s.text_decoration = TextDecoration::None,

        "text-left" => s.text_align = TextAlign::Left,
        "text-center" => s.text_align = TextAlign::Center,
        "text-right" => s.text_align = TextAlign::Right,

        "text-xs" => s.font_size = 12.0,
        "text-sm" => s.font_size = 14.0,
        "text-base" => s.font_size = 16.0,
        "text-lg" => s.font_size = 18.0,
        "text-xl" => s.font_size = 20.0,
        "text-2xl" => s.font_size = 24.0,
        "text-3xl" => s.font_size = 30.0,
        "text-4xl" => s.font_size = 36.0,
        "text-5xl" => s.font_size = 48.0,

        "w-full" => s.width = Dimension::Percent(100.0),
        "w-auto" => s.width = Dimension::Auto,
        "w-1/2" => s.width = Dimension::Percent(50.0),
        "w-1/3" => s.width = Dimension::Percent(33.333),
        "w-2/3" => s.width = Dimension::Percent(66.666),

        "border" => s.border_width = 1.0,
        "border-2" => s.border_width = 2.0,
        "border-4" => s.border_width = 4.0,

        "break-before" => s.page_break_before = true,
        "break-after" | "page-break" => s.page_break_after = true,

        _ => {
            if !try_spacing_class(s, class) {
                try_color_class(s, class);
            }
        }
    }
}

/// `p-4`, `mx-2`, `mt-6`, `gap-3` … (1 unit = 4px).
fn try_spacing_class(s: &mut ComputedStyle, class: &str) -> bool {
    let Some((prefix, value)) = class.rsplit_once('-') else {
        return false;
    };
    let Ok(units) = value.parse::<f32>() else {
        return false;
    };
    let v = units * 4.0;
    match prefix {
        "p" => set_sides(&mut s.padding_top, &mut s.padding_right, &mut s.padding_bottom, &mut s.padding_left, v),
        "px" => {
            s.padding_left = v;
            s.padding_right = v;
        }
        "py" => {
            s.padding_top = v;
            s.padding_bottom = v;
        }
        "pt" => s.padding_top = v,
        "pr" => s.padding_right = v,
        "pb" => s.padding_bottom = v,
        "pl" => s.padding_left = v,
        "m" => set_sides(&mut s.margin_top, &mut s.margin_right, &mut s.margin_bottom, &mut s.margin_left, v),
        "mx" => {
            s.margin_left = v;
            s.margin_right = v;
        }
        "my" => {
            s.margin_top = v;
            s.margin_bottom = v;
        }
        "mt" => s.margin_top = v,
        "mr" => s.margin_right = v,
        "mb" => s.margin_bottom = v,
        "ml" => s.margin_left = v,
        "gap" => s.gap = v,
        "w" => s.width = Dimension::Px(v),
        "h" => s.height = Dimension::Px(v),
        _ => return false,
    }
    true
}

fn set_sides(top: &mut f32, right: &mut f32, bottom: &mut f32, left: &mut f32, v: f32) {
    *top = v;
    *right = v;
    *bottom = v;
    *left = v;
}

fn try_color_class(s: &mut ComputedStyle, class: &str) {
    if let Some(c) = class.strip_prefix("text-").and_then(palette) {
        s.color = c;
    } else if let Some(c) = class.strip_prefix("bg-").and_then(palette) {
        s.background_color = c;
    } else if let Some(c) = class.strip_prefix("border-").and_then(palette) {
        s.border_color = c;
    }
}

// ---------------------------------------------------------------------------
// Inline style parsing (limited subset)
// ---------------------------------------------------------------------------

fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        apply_css_property(s, prop.trim(), val.trim());
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    match prop {
        "display" => {
            s.display = match val {
                "flex" => Display::Flex,
                "block" => Display::Block,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = match val {
                "column" => FlexDirection::Column,
                _ => FlexDirection::Row,
            }
        }
        "justify-content" => {
            s.justify_content = match val {
                "center" => JustifyContent::Center,
                "flex-end" | "end" => JustifyContent::End,
                "space-between" => JustifyContent::SpaceBetween,
                "space-around" => JustifyContent::SpaceAround,
                _ => JustifyContent::Start,
            }
        }
        "align-items" => {
            s.align_items = match val {
                "center" => AlignItems::Center,
                "flex-start" | "start" => AlignItems::Start,
                "flex-end" | "end" => AlignItems::End,
                _ => AlignItems::Stretch,
            }
        }
        "flex-grow" | "flex" => {
            if let Ok(v) = val.split_whitespace().next().unwrap_or("").parse::<f32>() {
                s.flex_grow = v;
            }
        }
        "font-size" => {
            if let Some(px) = parse_length(val) {
                s.font_size = px;
            }
        }
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if val.contains("underline") {
                TextDecoration::Underline
            } else {
                TextDecoration::None
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "text-align" => s.text_align = parse_text_align(val),
        "width" => s.width = parse_dimension(val),
        "height" => s.height = parse_dimension(val),
        "margin" => apply_shorthand_spacing(
            val,
            [&mut s.margin_top, &mut s.margin_right, &mut s.margin_bottom, &mut s.margin_left],
        ),
        "margin-top" => set_length(&mut s.margin_top, val),
        "margin-right" => set_length(&mut s.margin_right, val),
        "margin-bottom" => set_length(&mut s.margin_bottom, val),
        "margin-left" => set_length(&mut s.margin_left, val),
        "padding" => apply_shorthand_spacing(
            val,
            [&mut s.padding_top, &mut s.padding_right, &mut s.padding_bottom, &mut s.padding_left],
        ),
        "padding-top" => set_length(&mut s.padding_top, val),
        "padding-right" => set_length(&mut s.padding_right, val),
        "padding-bottom" => set_length(&mut s.padding_bottom, val),
        "padding-left" => set_length(&mut s.padding_left, val),
        "border" => {
            // `2px solid #333`
            for part in val.split_whitespace() {
                if let Some(px) = parse_length(part) {
                    s.border_width = px;
                } else if let Some(c) = Color::parse(part) {
                    s.border_color = c;
                }
            }
        }
        "border-width" => set_length(&mut s.border_width, val),
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(px) = parse_length(val) {
                s.line_height = px / s.font_size;
            }
        }
        "gap" => set_length(&mut s.gap, val),
        "break-before" | "page-break-before" => {
            s.page_break_before = val == "always" || val == "page"
        }
        "break-after" | "page-break-after" => s.page_break_after = val == "always" || val == "page",
        _ => {}
    }
}

fn set_length(slot: &mut f32, val: &str) {
    if let Some(px) = parse_length(val) {
        *slot = px;
    }
}

fn parse_text_align(val: &str) -> TextAlign {
    match val.trim().to_ascii_lowercase().as_str() {
        "center" | "middle" => TextAlign::Center,
        "right" => TextAlign::Right,
        _ => TextAlign::Left,
    }
}

fn parse_px(s: &str) -> Option<f32> {
    s.trim().trim_end_matches("px").trim().parse().ok()
}

/// `px`, `pt` (×4/3) and bare numbers.
fn parse_length(s: &str) -> Option<f32> {
    let s = s.trim();
    if let Some(pt) = s.strip_suffix("pt") {
        return pt.trim().parse::<f32>().ok().map(|v| v * 4.0 / 3.0);
    }
    parse_px(s)
}

fn parse_dimension(s: &str) -> Dimension {
    let s = s.trim();
    if s == "auto" {
        Dimension::Auto
    } else if let Some(pct) = s.strip_suffix('%') {
        pct.trim()
            .parse::<f32>()
            .map(Dimension::Percent)
            .unwrap_or(Dimension::Auto)
    } else {
        parse_length(s).map(Dimension::Px).unwrap_or(Dimension::Auto)
    }
}

fn apply_shorthand_spacing(val: &str, sides: [&mut f32; 4]) {
    let parts: Vec<f32> = val.split_whitespace().filter_map(parse_length).collect();
    let [top, right, bottom, left] = sides;
    match parts.as_slice() {
        [all] => set_sides(top, right, bottom, left, *all),
        [v, h] => {
            *top = *v;
            *bottom = *v;
            *right = *h;
            *left = *h;
        }
        [t, h, b] => {
            *top = *t;
            *right = *h;
            *left = *h;
            *bottom = *b;
        }
        [t, r, b, l] => {
            *top = *t;
            *right = *r;
            *bottom = *b;
            *left = *l;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: Tag, attrs: &[(&str, &str)]) -> ElementNode {
        let mut e = ElementNode::new(tag);
        e.attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        e
    }

    #[test]
    fn utility_padding() {
        let mut s = ComputedStyle::default();
        apply_utility_class(&mut s, "p-4");
        assert_eq!(s.padding_top, 16.0);
        assert_eq!(s.padding_left, 16.0);
    }

    #[test]
    fn inline_style_font_size_and_color() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "font-size: 24px; color: #ff0000; margin: 4px 8px");
        assert_eq!(s.font_size, 24.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
        assert_eq!(s.margin_top, 4.0);
        assert_eq!(s.margin_left, 8.0);
    }

    #[test]
    fn points_convert_to_pixels() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "font-size: 12pt");
        assert!((s.font_size - 16.0).abs() < 0.01);
    }

    #[test]
    fn color_parsing() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::parse("navy"), Some(Color::rgb8(0, 0, 128)));
        assert_eq!(Color::parse("rgb(10, 20, 30)"), Some(Color::rgb8(10, 20, 30)));
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn text_properties_inherit_box_properties_do_not() {
        let parent = resolve_style(
            &element(Tag::Div, &[("style", "font-size: 20px; padding: 12px"), ("align", "center")]),
            None,
        );
        let child = resolve_style(&element(Tag::P, &[]), Some(&parent));
        assert_eq!(child.font_size, 20.0);
        assert_eq!(child.text_align, TextAlign::Center);
        assert_eq!(child.padding_top, 0.0);
    }

    #[test]
    fn inline_marks_adjust_text_only() {
        let base = ComputedStyle::default();
        let bold = resolve_inline_style(&element(Tag::Strong, &[]), &base);
        assert!(bold.is_bold());
        let font = resolve_inline_style(&element(Tag::Font, &[("color", "#008000"), ("size", "5")]), &base);
        assert_eq!(font.color, Color::rgb8(0, 128, 0));
        assert_eq!(font.font_size, 24.0);
    }
}
