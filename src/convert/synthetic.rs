//! Last-resort backend: a plain certificate drawn straight from the record,
//! ignoring the template entirely.

use async_trait::async_trait;

use super::{verify_output, AttemptOutcome, BackendId, Capability, ConversionBackend, ConversionJob};
use crate::fonts::{ascender_px, measure_text_width, wrap_text};
use crate::layout_config::{BorderStyle, LayoutBox, LayoutConfig, PageLayout, TextContent, TextLine, TextSpan};
use crate::record::RenderContext;
use crate::render::render_pdf;
use crate::style::Color;
use crate::substitute::ISSUED_DATE_LABEL;

const PAGE_WIDTH: f32 = 841.89;
const PAGE_HEIGHT: f32 = 595.28;
const FRAME_INSET: f32 = 36.0;
const TEXT_WIDTH: f32 = 640.0;

const NAVY: Color = Color::rgb8(30, 58, 138);
const AMBER: Color = Color::rgb8(180, 83, 9);
const INK: Color = Color::rgb8(55, 65, 81);

pub struct SyntheticGenerator {
    enabled: bool,
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

struct Line<'a> {
    text: String,
    size: f32,
    bold: bool,
    color: &'a Color,
    space_before: f32,
}

fn line(text: impl Into<String>, size: f32, bold: bool, color: &Color, space_before: f32) -> Line<'_> {
    Line {
        text: text.into(),
        size,
        bold,
        color,
        space_before,
    }
}

/// One centred text box per visual line, stacked from `top`.
fn centred_lines(lines: &[Line<'_>], top: f32) -> Vec<LayoutBox> {
    let left = (PAGE_WIDTH - TEXT_WIDTH) / 2.0;
    let mut y = top;
    let mut boxes = Vec::new();
    for l in lines {
        y += l.space_before;
        for text in wrap_text(&l.text, l.size, l.bold, TEXT_WIDTH) {
            let width = measure_text_width(&text, l.size, l.bold);
            let height = l.size * 1.3;
            let mut b = LayoutBox::new(left, y, TEXT_WIDTH, height);
            b.text = Some(TextContent {
                lines: vec![TextLine {
                    y_offset: 0.0,
                    ascent: ascender_px(l.size) + (height - l.size) / 2.0,
                    spans: vec![TextSpan {
                        text,
                        x_offset: ((TEXT_WIDTH - width) / 2.0).max(0.0),
                        width,
                        font_size: l.size,
                        bold: l.bold,
                        italic: false,
                        underline: false,
                        color: l.color.to_array(),
                    }],
                }],
            });
            boxes.push(b);
            y += height;
        }
    }
    boxes
}

/// Single-page A4 landscape certificate for `ctx`.
pub fn certificate_layout(ctx: &RenderContext) -> LayoutConfig {
    let subject = capitalize(&ctx.pronouns.subject);
    let lines = [
        line("CERTIFICATE OF COMPLETION", 34.0, true, &NAVY, 0.0),
        line("This certificate is proudly presented to", 14.0, false, &INK, 28.0),
        line(ctx.name.as_str(), 30.0, true, &NAVY, 12.0),
        line(
            format!(
                "for successfully completing the internship program in {}",
                ctx.domain
            ),
            14.0,
            false,
            &INK,
            16.0,
        ),
        line(
            format!("from {} to {}.", ctx.start_date, ctx.end_date),
            14.0,
            false,
            &INK,
            4.0,
        ),
        line(
            format!(
                "{subject} showed dedication throughout, and we wish {} every success.",
                ctx.pronouns.object
            ),
            14.0,
            false,
            &INK,
            4.0,
        ),
        line(
            format!("{ISSUED_DATE_LABEL} {}", ctx.issued_date),
            11.0,
            true,
            &AMBER,
            40.0,
        ),
    ];

    let mut frame = LayoutBox::new(
        FRAME_INSET,
        FRAME_INSET,
        PAGE_WIDTH - 2.0 * FRAME_INSET,
        PAGE_HEIGHT - 2.0 * FRAME_INSET,
    );
    frame.border = Some(BorderStyle {
        width: 4.0,
        color: NAVY.to_array(),
    });
    frame.children = centred_lines(&lines, 110.0);

    let mut config = LayoutConfig::new(
        format!("Certificate of Completion - {}", ctx.name),
        PAGE_WIDTH,
        PAGE_HEIGHT,
    );
    config.pages.push(PageLayout {
        page_index: 0,
        boxes: vec![frame],
    });
    config
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl ConversionBackend for SyntheticGenerator {
    fn id(&self) -> BackendId {
        BackendId::Synthetic
    }

    async fn probe(&self) -> Capability {
        if self.enabled {
            Capability::Ready
        } else {
            Capability::Unavailable("disabled in configuration".into())
        }
    }

    async fn attempt(&self, job: &ConversionJob) -> AttemptOutcome {
        if let Capability::Unavailable(reason) = self.probe().await {
            return AttemptOutcome::Unavailable(reason);
        }
        let ctx = job.context.clone();
        let pdf = match tokio::task::spawn_blocking(move || render_pdf(&certificate_layout(&ctx))).await {
            Ok(Ok(pdf)) => pdf,
            Ok(Err(reason)) => return AttemptOutcome::Failed(reason),
            Err(e) => return AttemptOutcome::Failed(format!("render task aborted: {e}")),
        };
        if let Err(e) = tokio::fs::write(&job.output, pdf).await {
            return AttemptOutcome::Failed(format!("writing {}: {e}", job.output.display()));
        }
        verify_output(job).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::record::{CertificateRequest, Gender};

    fn ctx() -> RenderContext {
        let req = CertificateRequest::new(
            "Jane Doe",
            "Data Science",
            "Jan 1, 2024",
            "Mar 31, 2024",
            Gender::Female,
        );
        RenderContext::with_issued_date(&req, NaiveDate::from_ymd_opt(2024, 4, 2).unwrap())
    }

    #[test]
    fn layout_carries_every_field() {
        let text = certificate_layout(&ctx()).plain_text();
        assert!(text.contains("Jane Doe"));
        assert!(text.contains("Data Science"));
        assert!(text.contains("from Jan 1, 2024 to Mar 31, 2024."));
        assert!(text.contains("She showed dedication"));
        assert!(text.contains("wish her every success"));
        assert!(text.contains("ISSUED DATE : April 02, 2024"));
    }

    #[test]
    fn lines_are_centred_on_the_page() {
        let config = certificate_layout(&ctx());
        let title = &config.pages[0].boxes[0].children[0];
        let span = &title.text.as_ref().unwrap().lines[0].spans[0];
        let centre = title.x + span.x_offset + span.width / 2.0;
        assert!((centre - PAGE_WIDTH / 2.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn writes_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let job = ConversionJob {
            input: dir.path().join("ignored.html"),
            output: dir.path().join("out.pdf"),
            context: ctx(),
        };
        assert_eq!(SyntheticGenerator::new().attempt(&job).await, AttemptOutcome::Success);
        assert_eq!(&std::fs::read(&job.output).unwrap()[..5], b"%PDF-");
        assert!(matches!(
            SyntheticGenerator::disabled().attempt(&job).await,
            AttemptOutcome::Unavailable(_)
        ));
    }
}
