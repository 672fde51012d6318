//! The built-in certificate template and template loading.

use std::io;
use std::path::Path;

use crate::document::TemplateDocument;
use crate::error::RenderError;

/// Internship completion certificate, A4 landscape. Every placeholder occurs
/// in body paragraphs and again inside the signature table.
pub fn certificate_template() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<title>Certificate of Completion</title>
</head>
<body style="padding: 24px">
<div style="border: 4px solid #1e3a8a; padding: 28px" align="center">
    <h1 style="font-size: 40px; color: #1e3a8a; margin-bottom: 4px">CERTIFICATE</h1>
    <h2 style="font-size: 18px; color: #b45309; margin-top: 0px; margin-bottom: 24px">OF COMPLETION</h2>

    <p class="text-gray-700">This certificate is proudly presented to</p>
    <p style="font-size: 32px; margin-top: 8px; margin-bottom: 16px"><b>{{Name}}</b></p>

    <p class="text-gray-700" style="line-height: 1.6">
        for successfully completing the internship program in <b>{{Domain}}</b>
        from <b>{{Start Date}}</b> to <b>{{End Date}}</b>. During this period
        {{he/she/they}} showed dedication and a willingness to learn, and we
        wish {{him/her/them}} every success in the future.
    </p>

    <hr style="margin-top: 24px; margin-bottom: 16px" />

    <table width="100%">
        <tr>
            <td align="left">
                <p style="font-size: 12px">ISSUED DATE :</p>
                <p style="font-size: 12px">Awarded to {{Name}} ({{he/she/they}}/{{him/her/them}})</p>
            </td>
            <td align="right">
                <p style="font-size: 12px">Program: {{Domain}}</p>
                <p style="font-size: 12px">{{Start Date}} to {{End Date}}</p>
            </td>
        </tr>
    </table>
</div>
</body>
</html>
"##
}

/// Parse template bytes; non-UTF-8 input is reported as unreadable.
pub fn parse_template(path: &Path, bytes: Vec<u8>) -> Result<TemplateDocument, RenderError> {
    let html = String::from_utf8(bytes).map_err(|e| RenderError::TemplateUnreadable {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    Ok(TemplateDocument::parse(&html))
}

/// Read and parse the template at `path`.
pub async fn load_template(path: &Path) -> Result<TemplateDocument, RenderError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RenderError::TemplateNotFound {
            path: path.to_path_buf(),
        },
        _ => RenderError::TemplateUnreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    parse_template(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::substitute::{Placeholder, ISSUED_DATE_LABEL};

    #[test]
    fn builtin_template_mentions_every_placeholder() {
        let html = certificate_template();
        for ph in Placeholder::ALL {
            assert!(html.contains(ph.token()), "{}", ph.token());
        }
        assert!(html.contains(ISSUED_DATE_LABEL));
        let doc = TemplateDocument::parse(html);
        assert_eq!(doc.title.as_deref(), Some("Certificate of Completion"));
        assert!(doc.body.is_some());
    }

    #[test]
    fn invalid_utf8_is_unreadable() {
        let err = parse_template(Path::new("t.html"), vec![0xff, 0xfe, b'<']).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateUnreadable);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_template(&dir.path().join("nope.html")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
    }
}
