//! HTML parser and serializer for certificate templates.
//!
//! Templates are a controlled subset of HTML. The parser keeps everything it
//! reads (doctype, comments, attribute order, whitespace, raw `<style>`
//! bodies) so that a parse → serialize round trip only changes what the
//! substitution engine deliberately touched.

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag of an element, classified for lowering and styling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Title,
    Style,
    Script,
    Meta,
    Link,
    Div,
    Section,
    Header,
    Footer,
    Main,
    Article,
    Center,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Ul,
    Ol,
    Li,
    Table,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Td,
    Th,
    Span,
    B,
    Strong,
    I,
    Em,
    U,
    Small,
    Font,
    A,
    Br,
    Hr,
    Img,
    /// Anything else, kept verbatim (lower-cased).
    Other(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "title" => Tag::Title,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "div" => Tag::Div,
            "section" => Tag::Section,
            "header" => Tag::Header,
            "footer" => Tag::Footer,
            "main" => Tag::Main,
            "article" => Tag::Article,
            "center" => Tag::Center,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tfoot" => Tag::Tfoot,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "b" => Tag::B,
            "strong" => Tag::Strong,
            "i" => Tag::I,
            "em" => Tag::Em,
            "u" => Tag::U,
            "small" => Tag::Small,
            "font" => Tag::Font,
            "a" => Tag::A,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "img" => Tag::Img,
            other => Tag::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Body => "body",
            Tag::Title => "title",
            Tag::Style => "style",
            Tag::Script => "script",
            Tag::Meta => "meta",
            Tag::Link => "link",
            Tag::Div => "div",
            Tag::Section => "section",
            Tag::Header => "header",
            Tag::Footer => "footer",
            Tag::Main => "main",
            Tag::Article => "article",
            Tag::Center => "center",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::H4 => "h4",
            Tag::H5 => "h5",
            Tag::H6 => "h6",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Table => "table",
            Tag::Thead => "thead",
            Tag::Tbody => "tbody",
            Tag::Tfoot => "tfoot",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Span => "span",
            Tag::B => "b",
            Tag::Strong => "strong",
            Tag::I => "i",
            Tag::Em => "em",
            Tag::U => "u",
            Tag::Small => "small",
            Tag::Font => "font",
            Tag::A => "a",
            Tag::Br => "br",
            Tag::Hr => "hr",
            Tag::Img => "img",
            Tag::Other(name) => name,
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Hr | Tag::Img | Tag::Meta | Tag::Link)
            || matches!(self, Tag::Other(n) if n == "input")
    }

    /// Elements whose body is raw text, not markup.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script | Tag::Title)
    }

    /// Text-level elements that form runs inside a paragraph.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span
                | Tag::B
                | Tag::Strong
                | Tag::I
                | Tag::Em
                | Tag::U
                | Tag::Small
                | Tag::Font
                | Tag::A
                | Tag::Br
        )
    }

    pub fn is_paragraph(&self) -> bool {
        matches!(
            self,
            Tag::P | Tag::H1 | Tag::H2 | Tag::H3 | Tag::H4 | Tag::H5 | Tag::H6 | Tag::Li
        )
    }

    pub fn is_table_section(&self) -> bool {
        matches!(self, Tag::Thead | Tag::Tbody | Tag::Tfoot)
    }
}

/// A node in the template DOM.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
    Comment(String),
    /// `<!DOCTYPE ...>` or `<?...?>`, kept verbatim without the angle brackets.
    Declaration(String),
}

/// An element with its attributes in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over the controlled subset
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of top-level DOM nodes.
///
/// Unbalanced closing tags close the nearest open ancestor with that name;
/// stray closing tags at the top level are dropped.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    let mut nodes = Vec::new();
    loop {
        nodes.extend(parser.parse_nodes(&[]));
        if parser.eof() {
            break;
        }
        // Stray closing tag with no open element.
        parser.skip_closing_tag();
    }
    nodes
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse siblings until EOF or a closing tag. `open` lists the names of
    /// the enclosing elements, innermost last.
    fn parse_nodes(&mut self, open: &[String]) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        while !self.eof() && !self.starts_with("</") {
            if let Some(node) = self.parse_node(open) {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self, open: &[String]) -> Option<DomNode> {
        if self.starts_with("<!--") {
            return Some(DomNode::Comment(self.parse_comment()));
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.advance(1);
            let body = self.take_until(">");
            self.skip_str(">");
            return Some(DomNode::Declaration(body.to_string()));
        }
        if self.starts_with("<") && self.next_is_tag_start() {
            Some(self.parse_element(open))
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // A '<' that does not open a tag is literal text.
        if self.starts_with("<") {
            self.advance_char();
        }
        while !self.eof() && !self.starts_with("<") {
            self.advance_char();
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self, open: &[String]) -> DomNode {
        self.skip_str("<");
        let tag_name = self.parse_name();
        let tag = Tag::from_name(&tag_name);
        let mut elem = ElementNode::new(tag);

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if key.is_empty() && self.pos == before {
                // Unparseable byte inside the tag; skip it.
                self.advance_char();
                continue;
            }
            if !key.is_empty() {
                elem.attributes.push((key, value));
            }
        }

        if self.starts_with("/>") {
            self.advance(2);
            return DomNode::Element(elem);
        }
        self.skip_str(">");
        if elem.tag.is_void() {
            return DomNode::Element(elem);
        }

        let name = elem.tag.name().to_string();
        if elem.tag.is_raw_text() {
            let close = format!("</{name}");
            let body = self.take_until_ignore_case(&close);
            if !body.is_empty() {
                elem.children.push(DomNode::Text(body.to_string()));
            }
            self.consume_closing_tag();
            return DomNode::Element(elem);
        }

        let mut scope: Vec<String> = open.to_vec();
        scope.push(name.clone());
        elem.children = self.parse_nodes(&scope);

        // Only consume a closing tag that belongs to us; any other closing tag
        // is left for the ancestor it names.
        if self.starts_with("</") {
            let closing = self.peek_closing_name();
            if closing == name {
                self.consume_closing_tag();
            } else if !open.iter().any(|o| *o == closing) {
                // Matches nothing open: drop it and keep parsing our children.
                self.consume_closing_tag();
                let more = self.parse_nodes(&scope);
                elem.children.extend(more);
                if self.peek_closing_name() == name {
                    self.consume_closing_tag();
                }
            }
        }

        DomNode::Element(elem)
    }

    fn parse_comment(&mut self) -> String {
        self.advance(4); // <!--
        let body = self.take_until("-->").to_string();
        self.skip_str("-->");
        body
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance_char();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1);
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ["\"", "'"] {
            if self.starts_with(quote) {
                self.advance(1);
                let val = self.take_until(quote).to_string();
                self.skip_str(quote);
                return decode_entities(&val);
            }
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' {
                break;
            }
            if c == '/' && self.input[self.pos..].starts_with("/>") {
                break;
            }
            self.advance_char();
        }
        decode_entities(&self.input[start..self.pos])
    }

    fn peek_closing_name(&self) -> String {
        let rest = &self.input[self.pos..];
        let Some(rest) = rest.strip_prefix("</") else {
            return String::new();
        };
        rest.chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == ':')
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn consume_closing_tag(&mut self) {
        if self.starts_with("</") {
            self.take_until(">");
            self.skip_str(">");
        }
    }

    fn skip_closing_tag(&mut self) {
        if self.starts_with("</") {
            self.consume_closing_tag();
        } else if !self.eof() {
            self.advance_char();
        }
    }

    fn next_is_tag_start(&self) -> bool {
        self.input[self.pos..]
            .chars()
            .nth(1)
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
    }

    fn take_until(&mut self, pat: &str) -> &'a str {
        let rest = &self.input[self.pos..];
        let len = rest.find(pat).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn take_until_ignore_case(&mut self, pat: &str) -> &'a str {
        let rest = &self.input[self.pos..];
        let lower = rest.to_ascii_lowercase();
        let len = lower.find(&pat.to_ascii_lowercase()).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance_char();
        }
    }

    fn skip_str(&mut self, s: &str) {
        if self.starts_with(s) {
            self.pos += s.len();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.advance_char();
        }
    }
}

/// Decode the named entities templates use plus numeric references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{00A0}'),
                "copy" => Some('\u{00A9}'),
                "ndash" => Some('\u{2013}'),
                "mdash" => Some('\u{2014}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(|c| c == 'x' || c == 'X') {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

/// Serialize DOM nodes back into HTML.
pub fn to_html(nodes: &[DomNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

pub(crate) fn write_node(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(t) => escape_text(t, out),
        DomNode::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        DomNode::Declaration(d) => {
            out.push('<');
            out.push_str(d);
            out.push('>');
        }
        DomNode::Element(e) => {
            write_open_tag(e, out);
            if e.tag.is_void() {
                return;
            }
            if e.tag.is_raw_text() {
                for child in &e.children {
                    if let DomNode::Text(t) = child {
                        out.push_str(t);
                    }
                }
            } else {
                for child in &e.children {
                    write_node(child, out);
                }
            }
            write_close_tag(e, out);
        }
    }
}

pub(crate) fn write_open_tag(e: &ElementNode, out: &mut String) {
    out.push('<');
    out.push_str(e.tag.name());
    for (k, v) in &e.attributes {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        escape_attr(v, out);
        out.push('"');
    }
    if e.tag.is_void() {
        out.push_str(" /");
    }
    out.push('>');
}

pub(crate) fn write_close_tag(e: &ElementNode, out: &mut String) {
    out.push_str("</");
    out.push_str(e.tag.name());
    out.push('>');
}

pub(crate) fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[DomNode]) -> &ElementNode {
        nodes
            .iter()
            .find_map(|n| match n {
                DomNode::Element(e) => Some(e),
                _ => None,
            })
            .expect("no element")
    }

    #[test]
    fn parse_keeps_attribute_order_and_classes() {
        let nodes = parse_html(r#"<div id="x" class="title big"><p>Hi</p></div>"#);
        let div = first_element(&nodes);
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.attributes[0].0, "id");
        assert_eq!(div.classes(), vec!["title", "big"]);
        assert_eq!(div.children.len(), 1);
    }

    #[test]
    fn parse_void_and_self_closing() {
        let nodes = parse_html(r#"<p>a<br>b<img src="logo.png"/></p>"#);
        let p = first_element(&nodes);
        assert_eq!(p.children.len(), 4);
        match &p.children[3] {
            DomNode::Element(img) => assert_eq!(img.src(), Some("logo.png")),
            other => panic!("expected img, got {other:?}"),
        }
    }

    #[test]
    fn raw_text_elements_are_not_parsed() {
        let nodes = parse_html("<style>p > span { color: red; }</style><p>x</p>");
        let style = first_element(&nodes);
        assert_eq!(style.tag, Tag::Style);
        assert_eq!(
            style.children,
            vec![DomNode::Text("p > span { color: red; }".into())]
        );
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn entities_decode_and_reencode() {
        let nodes = parse_html("<p>Tom &amp; Jerry &#169; &#x41;&nbsp;</p>");
        let p = first_element(&nodes);
        assert_eq!(p.text_content(), "Tom & Jerry \u{a9} A\u{a0}");
        assert_eq!(to_html(&nodes), "<p>Tom &amp; Jerry \u{a9} A&nbsp;</p>");
    }

    #[test]
    fn round_trip_preserves_structure() {
        let html = "<!DOCTYPE html><html><head><title>Cert</title></head>\
                    <body><!-- logo --><p class=\"c\">Hello <b>there</b></p></body></html>";
        let nodes = parse_html(html);
        assert_eq!(to_html(&nodes), html);
    }

    #[test]
    fn stray_closing_tags_do_not_hang() {
        let nodes = parse_html("</span><p>one</b> two</p>");
        let p = first_element(&nodes);
        assert_eq!(p.text_content(), "one two");
    }

    #[test]
    fn unclosed_child_is_closed_by_parent_end_tag() {
        let nodes = parse_html("<div><p>one</div><p>two</p>");
        assert_eq!(nodes.len(), 2);
        let div = first_element(&nodes);
        assert_eq!(div.text_content(), "one");
    }
}
