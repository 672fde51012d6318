//! Text measurement for the built-in Helvetica family.
//!
//! The renderer only uses the PDF base-14 Helvetica faces, so no font files
//! are loaded: advances come from the Helvetica AFM widths for ASCII and a
//! flat half-em estimate for everything else.

/// Advance width of `c` in thousandths of an em (Helvetica regular).
fn helvetica_advance(c: char) -> u16 {
    match c {
        ' ' | '\u{00A0}' | '!' | ',' | '.' | '/' | ':' | ';' | 'I' | 'f' | 't' | '[' | ']' | '\\' => 278,
        'i' | 'j' | 'l' => 222,
        '\'' => 191,
        '"' => 355,
        '(' | ')' | '-' | 'r' | '`' => 333,
        '*' => 389,
        '^' => 469,
        '+' | '<' | '=' | '>' | '~' => 584,
        '#' | '$' | '?' | '_' | '0'..='9' => 556,
        '%' => 889,
        '&' | 'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 667,
        '@' => 1015,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' | 'w' => 722,
        'F' | 'T' | 'Z' => 611,
        'G' | 'O' | 'Q' => 778,
        'J' | 'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' => 500,
        'L' | 'a' | 'b' | 'd' | 'e' | 'g' | 'h' | 'n' | 'o' | 'p' | 'q' | 'u' => 556,
        'M' | 'm' => 833,
        'W' => 944,
        '{' | '}' => 334,
        '|' => 260,
        '\u{2022}' => 350,
        '\u{2013}' => 556,
        '\u{2014}' => 1000,
        _ => 556,
    }
}

/// Width in px of `text` set at `font_size`. Bold faces run about 6% wider.
pub fn measure_text_width(text: &str, font_size: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(|c| helvetica_advance(c) as u32).sum();
    let width = units as f32 * font_size / 1000.0;
    if bold {
        width * 1.06
    } else {
        width
    }
}

/// Distance from the top of a line box to the baseline.
pub fn ascender_px(font_size: f32) -> f32 {
    font_size * 0.75
}

/// Word-wrap plain text to fit within `max_width` px. Existing newlines are
/// kept as hard breaks; a single word wider than the line gets its own line.
pub fn wrap_text(text: &str, font_size: f32, bold: bool, max_width: f32) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure_text_width(&candidate, font_size, bold) > max_width && !current.is_empty() {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn afm_widths() {
        // H=722, e=556, l=222, l=222, o=556 → 2278/1000 × 10
        let w = measure_text_width("Hello", 10.0, false);
        assert!((w - 22.78).abs() < 0.01, "{w}");
        assert!(measure_text_width("Hello", 10.0, true) > w);
    }

    #[test]
    fn word_wrap_basic() {
        let lines = wrap_text("Hello world foo bar", 16.0, false, 60.0);
        assert!(lines.len() >= 2, "Expected wrapping, got {lines:?}");
        assert!(lines.iter().all(|l| !l.starts_with(' ')));
    }

    #[test]
    fn hard_breaks_survive() {
        let lines = wrap_text("one\ntwo", 12.0, false, 500.0);
        assert_eq!(lines, vec!["one", "two"]);
    }
}
