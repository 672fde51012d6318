//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::layout_config::*;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// Images whose `src` is not a base64 data URI, or whose bytes cannot be
/// decoded, are skipped with a `log::warn`.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>, String> {
    if config.page_width_pt <= 0.0 || config.page_height_pt <= 0.0 {
        return Err(format!(
            "invalid page size {}x{} pt",
            config.page_width_pt, config.page_height_pt
        ));
    }
    let page_w = Mm(config.page_width_pt * 0.352778); // pt → mm
    let page_h = Mm(config.page_height_pt * 0.352778);

    let mut doc = PdfDocument::new(&config.title);

    // ── Pre-register all images ────────────────────────────────────────────
    let mut all_srcs: HashSet<&str> = HashSet::new();
    for page_layout in &config.pages {
        for lbox in &page_layout.boxes {
            collect_image_srcs(lbox, &mut all_srcs);
        }
    }

    let mut images: HashMap<String, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();
    for src in all_srcs {
        let bytes = match parse_data_uri(src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                continue;
            }
        };
        let (px_width, px_height) = match ::image::load_from_memory(&bytes) {
            Ok(img) => (img.width(), img.height()),
            Err(e) => {
                log::warn!("Skipping image: decode error: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut img_warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping image: PDF encode error: {e}");
                continue;
            }
        };
        let xobj_id = doc.add_image(&raw);
        images.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width,
                px_height,
            },
        );
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let mut pages: Vec<PdfPage> = config
        .pages
        .iter()
        .map(|page_layout| {
            let mut ops = Vec::new();
            for lbox in &page_layout.boxes {
                render_box(&mut ops, lbox, config.page_height_pt, &images);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    Ok(doc.save(&PdfSaveOptions::default(), &mut Vec::new()))
}

/// Windows-1252 bytes for `s`, one per glyph of the builtin fonts'
/// WinAnsiEncoding. Characters outside that table become `?`.
fn winlatin_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Wrap [`winlatin_bytes`] in a `String` for `TextItem::Text`.
///
/// printpdf 0.8 takes builtin-font text as a `String` and copies its bytes
/// into the content stream without re-encoding, so the only way to emit a
/// byte above 0x7F is a `String` that is not valid UTF-8. The result must go
/// straight into a `TextItem` and never be inspected as text. Re-check this
/// when moving off the printpdf 0.8 series.
fn to_winlatin(s: &str) -> String {
    let bytes = winlatin_bytes(s);
    if bytes.is_ascii() {
        return bytes.into_iter().map(char::from).collect();
    }
    // SAFETY: the String is only handed to printpdf, which writes its bytes
    // out verbatim and never reads them as UTF-8 (printpdf 0.8).
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the decoded bytes.
fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src.strip_prefix("data:").ok_or_else(|| {
        let preview: String = src.chars().take(80).collect();
        format!("image src must be a base64 data URI, got {preview:?}")
    })?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

fn collect_image_srcs<'a>(lbox: &'a LayoutBox, srcs: &mut HashSet<&'a str>) {
    if let Some(img) = &lbox.image {
        srcs.insert(img.src.as_str());
    }
    for child in &lbox.children {
        collect_image_srcs(child, srcs);
    }
}

fn rgb(c: &[f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of a rectangle given its PDF-space bottom-left and top-right.
fn rect_points(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<LinePoint> {
    vec![point(x1, y1), point(x2, y1), point(x2, y2), point(x1, y2)]
}

fn builtin_font(bold: bool, italic: bool) -> BuiltinFont {
    match (bold, italic) {
        (true, true) => BuiltinFont::HelveticaBoldOblique,
        (true, false) => BuiltinFont::HelveticaBold,
        (false, true) => BuiltinFont::HelveticaOblique,
        (false, false) => BuiltinFont::Helvetica,
    }
}

/// Recursively render a LayoutBox and its children into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<String, ImageResource>,
) {
    // PDF origin is bottom-left; layout origin is top-left.
    let top = page_height - lbox.y;
    let bottom = top - lbox.height;
    let right = lbox.x + lbox.width;

    if let Some(bg) = &lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: rect_points(lbox.x, bottom, right, top),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    if let Some(border) = &lbox.border {
        // Stroke centred on the inside of the border edge.
        let inset = border.width / 2.0;
        ops.push(Op::SetOutlineColor {
            col: rgb(&border.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(border.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points: rect_points(lbox.x + inset, bottom + inset, right - inset, top - inset),
                is_closed: true,
            },
        });
    }

    if let Some(text) = &lbox.text {
        for line in &text.lines {
            let baseline = top - line.y_offset - line.ascent;
            for span in &line.spans {
                if span.text.trim().is_empty() {
                    continue;
                }
                let font = builtin_font(span.bold, span.italic);
                let x = lbox.x + span.x_offset;
                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(x),
                        y: Pt(baseline),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(span.font_size),
                    font,
                });
                ops.push(Op::SetFillColor {
                    col: rgb(&span.color),
                });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(to_winlatin(&span.text))],
                    font,
                });
                ops.push(Op::EndTextSection);

                if span.underline {
                    let y = baseline - span.font_size * 0.1;
                    ops.push(Op::SetOutlineThickness {
                        pt: Pt((span.font_size / 20.0).max(0.5)),
                    });
                    ops.push(Op::SetOutlineColor {
                        col: rgb(&span.color),
                    });
                    ops.push(Op::DrawLine {
                        line: Line {
                            points: vec![point(x, y), point(x + span.width, y)],
                            is_closed: false,
                        },
                    });
                }
            }
        }
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            // At dpi=72 printpdf renders 1 px = 1 pt, so scale = pt / px.
            let scale_x = if res.px_width > 0 {
                img.width / res.px_width as f32
            } else {
                1.0
            };
            let scale_y = if res.px_height > 0 {
                img.height / res.px_height as f32
            } else {
                1.0
            };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(top - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, page_height, images);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_empty_page() {
        let config = LayoutConfig::new("empty", 595.28, 841.89);
        let bytes = render_pdf(&config).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn rejects_degenerate_page() {
        let config = LayoutConfig::new("bad", 0.0, 100.0);
        assert!(render_pdf(&config).is_err());
    }

    #[test]
    fn winlatin_maps_typographic_quotes() {
        assert_eq!(winlatin_bytes("\u{2019}a\u{00A0}"), vec![0x92, b'a', 0x20]);
    }

    #[test]
    fn accented_names_become_single_winansi_bytes() {
        assert_eq!(
            winlatin_bytes("Jos\u{e9} M\u{fc}ller \u{4e2d}"),
            vec![0x4A, 0x6F, 0x73, 0xE9, 0x20, 0x4D, 0xFC, 0x6C, 0x6C, 0x65, 0x72, 0x20, b'?'],
        );
        assert_eq!(to_winlatin("Jane Doe"), "Jane Doe");
    }

    #[test]
    fn renders_accented_recipient_name() {
        use crate::layout_config::{LayoutBox, PageLayout, TextContent, TextLine, TextSpan};

        let mut name = LayoutBox::new(72.0, 72.0, 300.0, 30.0);
        name.text = Some(TextContent {
            lines: vec![TextLine {
                y_offset: 0.0,
                ascent: 18.0,
                spans: vec![TextSpan {
                    text: "Jos\u{e9} M\u{fc}ller".into(),
                    x_offset: 0.0,
                    width: 120.0,
                    font_size: 24.0,
                    bold: true,
                    italic: false,
                    underline: false,
                    color: [0.0, 0.0, 0.0, 1.0],
                }],
            }],
        });
        let mut config = LayoutConfig::new("Jos\u{e9} M\u{fc}ller", 841.89, 595.28);
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![name],
        });
        let bytes = render_pdf(&config).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn data_uri_requires_base64() {
        assert!(parse_data_uri("https://example.com/logo.png").is_err());
        assert!(parse_data_uri("data:image/png,raw").is_err());
        assert_eq!(parse_data_uri("data:image/png;base64,AAEC").unwrap(), vec![0, 1, 2]);
    }
}
