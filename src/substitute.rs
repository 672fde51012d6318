//! Placeholder substitution over a [`TemplateDocument`].
//!
//! Tokens are replaced run by run. A token must sit entirely inside one text
//! run to be replaced; tokens that only appear once the runs of a paragraph
//! are concatenated (for example `{{Na` in one `<span>` and `me}}` in the
//! next) are left alone and reported in [`SubstitutionReport::split_tokens`].

use log::{debug, warn};
use serde::Serialize;

use crate::document::{Paragraph, RunContent, TemplateDocument};
use crate::record::RenderContext;

/// Label after which the issue date is appended.
pub const ISSUED_DATE_LABEL: &str = "ISSUED DATE :";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Name,
    Domain,
    StartDate,
    EndDate,
    Subject,
    Object,
}

impl Placeholder {
    pub const ALL: [Placeholder; 6] = [
        Placeholder::Name,
        Placeholder::Domain,
        Placeholder::StartDate,
        Placeholder::EndDate,
        Placeholder::Subject,
        Placeholder::Object,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Name => "{{Name}}",
            Placeholder::Domain => "{{Domain}}",
            Placeholder::StartDate => "{{Start Date}}",
            Placeholder::EndDate => "{{End Date}}",
            Placeholder::Subject => "{{he/she/they}}",
            Placeholder::Object => "{{him/her/them}}",
        }
    }

    pub fn value(self, ctx: &RenderContext) -> &str {
        match self {
            Placeholder::Name => &ctx.name,
            Placeholder::Domain => &ctx.domain,
            Placeholder::StartDate => &ctx.start_date,
            Placeholder::EndDate => &ctx.end_date,
            Placeholder::Subject => ctx.pronouns.subject,
            Placeholder::Object => ctx.pronouns.object,
        }
    }

    fn at_start_of(s: &str) -> Option<Placeholder> {
        Self::ALL.into_iter().find(|p| s.starts_with(p.token()))
    }
}

/// A token that could not be replaced because it straddles text runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitToken {
    pub token: &'static str,
    pub paragraph: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionReport {
    /// Tokens replaced plus issue-date labels filled in.
    pub replacements: usize,
    pub split_tokens: Vec<SplitToken>,
}

/// Fill every placeholder in `doc` from `ctx`, in place.
pub fn substitute(doc: &mut TemplateDocument, ctx: &RenderContext) -> SubstitutionReport {
    let mut report = SubstitutionReport::default();
    doc.for_each_paragraph_mut(&mut |p| substitute_paragraph(p, ctx, &mut report));

    if report.split_tokens.is_empty() {
        debug!("substitution: {} replacements", report.replacements);
    } else {
        for split in &report.split_tokens {
            warn!(
                "token {} is split across formatting runs and was not replaced: {:?}",
                split.token, split.paragraph
            );
        }
    }
    report
}

fn substitute_paragraph(p: &mut Paragraph, ctx: &RenderContext, report: &mut SubstitutionReport) {
    for run in &mut p.runs {
        if let RunContent::Text(text) = &mut run.content {
            if let Some((filled, n)) = fill_text(text, ctx) {
                *text = filled;
                report.replacements += n;
            }
        }
    }

    // Whatever is still visible after the per-run pass only exists across
    // run boundaries.
    let joined = p.text();
    let leftovers = Placeholder::ALL
        .iter()
        .map(|ph| ph.token())
        .chain(std::iter::once(ISSUED_DATE_LABEL))
        .filter(|token| {
            let in_runs: usize = p
                .runs
                .iter()
                .filter_map(|r| match &r.content {
                    RunContent::Text(t) => Some(t.matches(*token).count()),
                    RunContent::Node(_) => None,
                })
                .sum();
            joined.matches(*token).count() > in_runs
        });
    for token in leftovers {
        report.split_tokens.push(SplitToken {
            token,
            paragraph: joined.trim().to_string(),
        });
    }
}

/// Single left-to-right pass over one run. Values are emitted verbatim and
/// never rescanned. Returns `None` when nothing changed.
pub fn fill_text(text: &str, ctx: &RenderContext) -> Option<(String, usize)> {
    if !text.contains("{{") && !text.contains(ISSUED_DATE_LABEL) {
        return None;
    }

    let date_suffix = format!(" {}", ctx.issued_date);
    let mut out = String::with_capacity(text.len() + 32);
    let mut rest = text;
    let mut count = 0;

    loop {
        let next = match (rest.find("{{"), rest.find(ISSUED_DATE_LABEL)) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => break,
        };
        out.push_str(&rest[..next]);
        let tail = &rest[next..];

        if let Some(ph) = Placeholder::at_start_of(tail) {
            out.push_str(ph.value(ctx));
            rest = &tail[ph.token().len()..];
            count += 1;
        } else if let Some(after) = tail.strip_prefix(ISSUED_DATE_LABEL) {
            out.push_str(ISSUED_DATE_LABEL);
            out.push_str(&date_suffix);
            rest = match after.strip_prefix(date_suffix.as_str()) {
                // Already filled.
                Some(r) => r,
                None => {
                    count += 1;
                    after
                }
            };
        } else {
            out.push_str("{{");
            rest = &tail[2..];
        }
    }
    out.push_str(rest);

    (count > 0).then_some((out, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CertificateRequest, Gender};
    use chrono::NaiveDate;

    fn ctx() -> RenderContext {
        let req = CertificateRequest::new(
            "Jane Doe",
            "Data Science",
            "January 1, 2024",
            "March 31, 2024",
            Gender::Female,
        );
        RenderContext::with_issued_date(&req, NaiveDate::from_ymd_opt(2024, 4, 2).unwrap())
    }

    #[test]
    fn replaces_tokens_in_one_pass() {
        let (out, n) = fill_text(
            "{{Name}} completed {{Domain}} from {{Start Date}} to {{End Date}}; \
             {{he/she/they}} thanks {{him/her/them}}.",
            &ctx(),
        )
        .unwrap();
        assert_eq!(
            out,
            "Jane Doe completed Data Science from January 1, 2024 to March 31, 2024; she thanks her."
        );
        assert_eq!(n, 6);
    }

    #[test]
    fn values_are_not_rescanned() {
        let mut c = ctx();
        c.name = "{{Domain}}".into();
        let (out, n) = fill_text("Hi {{Name}}", &c).unwrap();
        assert_eq!(out, "Hi {{Domain}}");
        assert_eq!(n, 1);
    }

    #[test]
    fn unknown_braces_are_left_alone() {
        assert_eq!(fill_text("{{Unknown}} {{", &ctx()), None);
        let (out, _) = fill_text("{{x {{Name}}", &ctx()).unwrap();
        assert_eq!(out, "{{x Jane Doe");
    }

    #[test]
    fn issued_date_label_is_appended_once() {
        let (out, n) = fill_text("ISSUED DATE :", &ctx()).unwrap();
        assert_eq!(out, "ISSUED DATE : April 02, 2024");
        assert_eq!(n, 1);
        assert_eq!(fill_text(&out, &ctx()), None);
    }

    #[test]
    fn document_substitution_is_idempotent_and_reaches_cells() {
        let mut doc = TemplateDocument::parse(
            "<body><p class=\"lead\">Awarded to <b>{{Name}}</b></p>\
             <table><tr><td>{{Domain}}</td><td><p>ISSUED DATE :</p></td></tr></table></body>",
        );
        let first = substitute(&mut doc, &ctx());
        assert_eq!(first.replacements, 3);
        let html = doc.to_html();
        assert!(html.contains("<p class=\"lead\">Awarded to <b>Jane Doe</b></p>"), "{html}");
        assert!(html.contains("<td>Data Science</td>"), "{html}");
        assert!(html.contains("ISSUED DATE : April 02, 2024"), "{html}");

        let second = substitute(&mut doc, &ctx());
        assert_eq!(second.replacements, 0);
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn split_tokens_are_reported_not_replaced() {
        let mut doc = TemplateDocument::parse("<p><i>{{Na</i>me}} and {{Domain}}</p>");
        let report = substitute(&mut doc, &ctx());
        assert_eq!(report.replacements, 1);
        assert_eq!(report.split_tokens.len(), 1);
        assert_eq!(report.split_tokens[0].token, "{{Name}}");
        assert!(doc.to_html().contains("<i>{{Na</i>me}}"));
    }
}
