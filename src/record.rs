//! Certificate record and the values derived from it at render time.
//!
//! [`RenderContext`] is the read-only view the substitution engine and the
//! synthetic generator consume: the request fields, the resolved
//! [`PronounPair`] and the issue date sampled when the context is created.

use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::error::RenderError;

/// Recipient gender as supplied by the caller.
///
/// Anything other than `male` / `female` (case-insensitive) is normalised to
/// [`Gender::Other`]; an absent value is [`Gender::Unspecified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unspecified,
}

impl Gender {
    /// Total parse: never fails, unknown strings become `Other`.
    pub fn parse_lossy(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Gender::Unspecified;
        }
        match s.to_ascii_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Other,
        }
    }
}

impl From<Option<String>> for Gender {
    fn from(value: Option<String>) -> Self {
        value
            .as_deref()
            .map(Gender::parse_lossy)
            .unwrap_or(Gender::Unspecified)
    }
}

/// Subject / object pronoun pair used in the certificate wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PronounPair {
    pub subject: &'static str,
    pub object: &'static str,
}

impl PronounPair {
    pub const MALE: Self = Self {
        subject: "he",
        object: "him",
    };
    pub const FEMALE: Self = Self {
        subject: "she",
        object: "her",
    };
    pub const NEUTRAL: Self = Self {
        subject: "they",
        object: "them",
    };
}

pub fn resolve_pronouns(gender: Gender) -> PronounPair {
    match gender {
        Gender::Male => PronounPair::MALE,
        Gender::Female => PronounPair::FEMALE,
        Gender::Other | Gender::Unspecified => PronounPair::NEUTRAL,
    }
}

/// Format a date the way it is printed on the certificate ("February 01, 2024").
pub fn issued_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// One certificate to render.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CertificateRequest {
    pub name: String,
    pub domain: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub gender: Gender,
}

impl CertificateRequest {
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        gender: Gender,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            start_date: start_date.into(),
            end_date: end_date.into(),
            gender,
        }
    }

    /// Caller-side check run before the pipeline: every text field must be
    /// non-blank.
    pub fn validate(&self) -> Result<(), RenderError> {
        let fields = [
            ("name", &self.name),
            ("domain", &self.domain),
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(RenderError::MissingField(field));
            }
        }
        Ok(())
    }

    /// Suggested download filename, e.g. `certificate_Jane_Doe.pdf`.
    pub fn download_name(&self) -> String {
        let stem: String = self
            .name
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        format!("certificate_{stem}.pdf")
    }
}

/// Everything a render needs, fixed for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub name: String,
    pub domain: String,
    pub start_date: String,
    pub end_date: String,
    pub pronouns: PronounPair,
    pub issued_date: String,
}

impl RenderContext {
    /// Build a context, sampling today's local date for the issue line.
    pub fn new(request: &CertificateRequest) -> Self {
        Self::with_issued_date(request, Local::now().date_naive())
    }

    pub fn with_issued_date(request: &CertificateRequest, date: NaiveDate) -> Self {
        Self {
            name: request.name.clone(),
            domain: request.domain.clone(),
            start_date: request.start_date.clone(),
            end_date: request.end_date.clone(),
            pronouns: resolve_pronouns(request.gender),
            issued_date: issued_date(date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pronouns_cover_every_gender() {
        assert_eq!(resolve_pronouns(Gender::Male), PronounPair::MALE);
        assert_eq!(resolve_pronouns(Gender::Female), PronounPair::FEMALE);
        assert_eq!(resolve_pronouns(Gender::Other), PronounPair::NEUTRAL);
        assert_eq!(resolve_pronouns(Gender::Unspecified), PronounPair::NEUTRAL);
    }

    #[test]
    fn unknown_gender_strings_map_to_other() {
        for raw in ["nonbinary", "MALEish", "x", "  unknown  "] {
            let g = Gender::parse_lossy(raw);
            assert_eq!(g, Gender::Other, "{raw}");
            assert_eq!(resolve_pronouns(g), PronounPair::NEUTRAL);
        }
        assert_eq!(Gender::parse_lossy("FEMALE"), Gender::Female);
        assert_eq!(Gender::parse_lossy(" Male "), Gender::Male);
    }

    #[test]
    fn issued_date_uses_month_day_year() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(issued_date(d), "February 01, 2024");
    }

    #[test]
    fn request_deserializes_with_default_gender() {
        let req: CertificateRequest = serde_json::from_str(
            r#"{"name":"A","domain":"B","start_date":"C","end_date":"D"}"#,
        )
        .unwrap();
        assert_eq!(req.gender, Gender::Unspecified);

        let req: CertificateRequest = serde_json::from_str(
            r#"{"name":"A","domain":"B","start_date":"C","end_date":"D","gender":"Female"}"#,
        )
        .unwrap();
        assert_eq!(req.gender, Gender::Female);

        let req: CertificateRequest = serde_json::from_str(
            r#"{"name":"A","domain":"B","start_date":"C","end_date":"D","gender":null}"#,
        )
        .unwrap();
        assert_eq!(req.gender, Gender::Unspecified);
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let req = CertificateRequest::new("Jane", " ", "x", "y", Gender::Female);
        match req.validate() {
            Err(RenderError::MissingField(f)) => assert_eq!(f, "domain"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn download_name_replaces_whitespace() {
        let req = CertificateRequest::new("Jane  Q Doe", "d", "s", "e", Gender::Other);
        assert_eq!(req.download_name(), "certificate_Jane__Q_Doe.pdf");
    }
}
