//! Template document model – the block tree the substitution engine and the
//! layout engine work on.
//!
//! A template body is lowered into an ordered list of [`Block`]s:
//!
//! - **Paragraph** – `p`, `h1`–`h6`, `li`, or any element whose children are
//!   all inline; its content is a sequence of [`Run`]s (contiguous text units
//!   plus the inline elements that wrap them).
//! - **Table** – rows of cells, each cell holding its own block list.
//! - **Container** – `div`, `section`, … with block-level children.
//! - **Raw** – anything else (images, rules, comments), passed through.
//!
//! Everything outside `<body>` is kept as serialized HTML so a template can
//! be written back out unchanged apart from the runs that were edited.

use crate::dom::{
    self, escape_text, parse_html, write_close_tag, write_node, write_open_tag, DomNode,
    ElementNode, Tag,
};

// ---------------------------------------------------------------------------
// Block tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Container(Container),
    Raw(DomNode),
}

/// An inline element wrapping one or more runs. `id` is unique within a
/// document so consecutive runs sharing a wrapper serialize back into one
/// element.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub id: usize,
    pub element: ElementNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunContent {
    Text(String),
    /// `<br>`, inline images, comments.
    Node(DomNode),
}

/// One contiguous text unit and its inline formatting, outermost mark first.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub marks: Vec<Mark>,
    pub content: RunContent,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            marks: Vec::new(),
            content: RunContent::Text(text.into()),
        }
    }

    pub fn has_mark(&self, tag: &Tag) -> bool {
        self.marks.iter().any(|m| &m.element.tag == tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// `None` for anonymous paragraphs (inline content directly inside a
    /// container or the body).
    pub element: Option<ElementNode>,
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// Visible text of the paragraph; `<br>` becomes a newline.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match &run.content {
                RunContent::Text(t) => out.push_str(t),
                RunContent::Node(DomNode::Element(e)) if e.tag == Tag::Br => out.push('\n'),
                RunContent::Node(_) => {}
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub element: ElementNode,
    pub blocks: Vec<Block>,
}

/// A child of a row or table section: the element the table model cares
/// about, or a node (comment, whitespace, stray markup) kept only so the
/// template serializes back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Item(T),
    Other(DomNode),
}

impl<T> Slot<T> {
    pub fn item(&self) -> Option<&T> {
        match self {
            Slot::Item(t) => Some(t),
            Slot::Other(_) => None,
        }
    }

    pub fn item_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Item(t) => Some(t),
            Slot::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub element: ElementNode,
    pub slots: Vec<Slot<Cell>>,
}

impl Row {
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.slots.iter().filter_map(Slot::item)
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.slots.iter_mut().filter_map(Slot::item_mut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TablePart {
    Row(Row),
    Section { element: ElementNode, slots: Vec<Slot<Row>> },
    Other(DomNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub element: ElementNode,
    pub parts: Vec<TablePart>,
}

impl Table {
    /// Rows in document order, looking through `thead`/`tbody`/`tfoot`.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.parts
            .iter()
            .flat_map(|part| -> Box<dyn Iterator<Item = &Row> + '_> {
                match part {
                    TablePart::Row(r) => Box::new(std::iter::once(r)),
                    TablePart::Section { slots, .. } => {
                        Box::new(slots.iter().filter_map(Slot::item))
                    }
                    TablePart::Other(_) => Box::new(std::iter::empty()),
                }
            })
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Row> {
        self.parts
            .iter_mut()
            .flat_map(|part| -> Box<dyn Iterator<Item = &mut Row> + '_> {
                match part {
                    TablePart::Row(r) => Box::new(std::iter::once(r)),
                    TablePart::Section { slots, .. } => {
                        Box::new(slots.iter_mut().filter_map(Slot::item_mut))
                    }
                    TablePart::Other(_) => Box::new(std::iter::empty()),
                }
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub element: ElementNode,
    pub blocks: Vec<Block>,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A parsed template: the body as a block tree plus the serialized HTML
/// around it.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDocument {
    pub title: Option<String>,
    /// The `<body>` element without its children, when the template has one.
    pub body: Option<ElementNode>,
    pub blocks: Vec<Block>,
    before_body: String,
    after_body: String,
}

impl TemplateDocument {
    pub fn parse(html: &str) -> Self {
        let nodes = parse_html(html);
        let title = find_title(&nodes);

        let mut shell = Shell::default();
        if contains_body(&nodes) {
            split_at_body(nodes, &mut shell);
        } else {
            shell.body = Some(nodes);
        }

        let mut lowering = Lowering::default();
        let blocks = lowering.lower_nodes(shell.body.unwrap_or_default());

        Self {
            title,
            body: shell.body_element,
            blocks,
            before_body: shell.before,
            after_body: shell.after,
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::with_capacity(self.before_body.len() + self.after_body.len() + 1024);
        out.push_str(&self.before_body);
        write_blocks(&self.blocks, &mut out);
        out.push_str(&self.after_body);
        out
    }

    /// Visit every paragraph: first the paragraphs outside tables in document
    /// order, then each table row-major, with every cell walked the same way.
    pub fn for_each_paragraph_mut(&mut self, f: &mut dyn FnMut(&mut Paragraph)) {
        walk_blocks_mut(&mut self.blocks, f);
    }

    pub fn for_each_paragraph(&self, f: &mut dyn FnMut(&Paragraph)) {
        walk_blocks(&self.blocks, f);
    }
}

fn walk_blocks_mut(blocks: &mut [Block], f: &mut dyn FnMut(&mut Paragraph)) {
    walk_paragraphs_mut(blocks, f);
    walk_tables_mut(blocks, f);
}

fn walk_paragraphs_mut(blocks: &mut [Block], f: &mut dyn FnMut(&mut Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(p),
            Block::Container(c) => walk_paragraphs_mut(&mut c.blocks, f),
            Block::Table(_) | Block::Raw(_) => {}
        }
    }
}

fn walk_tables_mut(blocks: &mut [Block], f: &mut dyn FnMut(&mut Paragraph)) {
    for block in blocks {
        match block {
            Block::Table(t) => {
                for row in t.rows_mut() {
                    for cell in row.cells_mut() {
                        walk_blocks_mut(&mut cell.blocks, f);
                    }
                }
            }
            Block::Container(c) => walk_tables_mut(&mut c.blocks, f),
            Block::Paragraph(_) | Block::Raw(_) => {}
        }
    }
}

fn walk_blocks(blocks: &[Block], f: &mut dyn FnMut(&Paragraph)) {
    walk_paragraphs(blocks, f);
    walk_tables(blocks, f);
}

fn walk_paragraphs(blocks: &[Block], f: &mut dyn FnMut(&Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(p),
            Block::Container(c) => walk_paragraphs(&c.blocks, f),
            Block::Table(_) | Block::Raw(_) => {}
        }
    }
}

fn walk_tables(blocks: &[Block], f: &mut dyn FnMut(&Paragraph)) {
    for block in blocks {
        match block {
            Block::Table(t) => {
                for row in t.rows() {
                    for cell in row.cells() {
                        walk_blocks(&cell.blocks, f);
                    }
                }
            }
            Block::Container(c) => walk_tables(&c.blocks, f),
            Block::Paragraph(_) | Block::Raw(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Body extraction
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Shell {
    before: String,
    after: String,
    body: Option<Vec<DomNode>>,
    body_element: Option<ElementNode>,
}

fn contains_body(nodes: &[DomNode]) -> bool {
    nodes.iter().any(|n| match n {
        DomNode::Element(e) => e.tag == Tag::Body || contains_body(&e.children),
        _ => false,
    })
}

fn split_at_body(nodes: Vec<DomNode>, shell: &mut Shell) {
    for node in nodes {
        if shell.body.is_some() {
            write_node(&node, &mut shell.after);
            continue;
        }
        match node {
            DomNode::Element(mut e) if e.tag == Tag::Body => {
                write_open_tag(&e, &mut shell.before);
                shell.body = Some(std::mem::take(&mut e.children));
                write_close_tag(&e, &mut shell.after);
                shell.body_element = Some(e);
            }
            DomNode::Element(mut e) if contains_body(&e.children) => {
                write_open_tag(&e, &mut shell.before);
                let children = std::mem::take(&mut e.children);
                split_at_body(children, shell);
                write_close_tag(&e, &mut shell.after);
            }
            other => write_node(&other, &mut shell.before),
        }
    }
}

fn find_title(nodes: &[DomNode]) -> Option<String> {
    nodes.iter().find_map(|n| match n {
        DomNode::Element(e) if e.tag == Tag::Title => {
            let t = e.text_content().trim().to_string();
            (!t.is_empty()).then_some(t)
        }
        DomNode::Element(e) => find_title(&e.children),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Lowering DOM → blocks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Lowering {
    next_mark: usize,
}

fn shell_of(e: &ElementNode) -> ElementNode {
    ElementNode {
        tag: e.tag.clone(),
        attributes: e.attributes.clone(),
        children: Vec::new(),
    }
}

fn is_inline_node(node: &DomNode) -> bool {
    match node {
        DomNode::Text(_) => true,
        DomNode::Element(e) => e.tag.is_inline(),
        DomNode::Comment(_) | DomNode::Declaration(_) => false,
    }
}

fn is_passthrough(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Head
            | Tag::Title
            | Tag::Style
            | Tag::Script
            | Tag::Meta
            | Tag::Link
            | Tag::Img
            | Tag::Hr
    )
}

fn is_blank_text(node: &DomNode) -> bool {
    matches!(node, DomNode::Text(t) if t.trim().is_empty())
}

impl Lowering {
    fn lower_nodes(&mut self, nodes: Vec<DomNode>) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut inline_group: Vec<DomNode> = Vec::new();

        for node in nodes {
            if is_inline_node(&node) {
                inline_group.push(node);
                continue;
            }
            self.flush_inline(&mut inline_group, &mut blocks);
            blocks.push(self.lower_block(node));
        }
        self.flush_inline(&mut inline_group, &mut blocks);
        blocks
    }

    fn flush_inline(&mut self, group: &mut Vec<DomNode>, blocks: &mut Vec<Block>) {
        if group.is_empty() {
            return;
        }
        let nodes = std::mem::take(group);
        if nodes.iter().all(is_blank_text) {
            // Inter-block whitespace: keep for serialization, nothing to lay out.
            blocks.extend(nodes.into_iter().map(Block::Raw));
            return;
        }
        let mut runs = Vec::new();
        self.collect_runs(nodes, &mut Vec::new(), &mut runs);
        blocks.push(Block::Paragraph(Paragraph {
            element: None,
            runs,
        }));
    }

    fn lower_block(&mut self, node: DomNode) -> Block {
        let e = match node {
            DomNode::Element(e) => e,
            other => return Block::Raw(other),
        };

        if is_passthrough(&e.tag) {
            return Block::Raw(DomNode::Element(e));
        }
        if e.tag == Tag::Table {
            return Block::Table(self.lower_table(e));
        }

        let shell = shell_of(&e);
        let all_inline = e.children.iter().all(is_inline_node);
        if e.tag.is_paragraph() || (all_inline && !e.children.is_empty()) {
            let mut runs = Vec::new();
            self.collect_runs(e.children, &mut Vec::new(), &mut runs);
            return Block::Paragraph(Paragraph {
                element: Some(shell),
                runs,
            });
        }

        Block::Container(Container {
            element: shell,
            blocks: self.lower_nodes(e.children),
        })
    }

    fn lower_table(&mut self, table: ElementNode) -> Table {
        let shell = shell_of(&table);
        let mut parts = Vec::new();
        for child in table.children {
            match child {
                DomNode::Element(e) if e.tag == Tag::Tr => parts.push(TablePart::Row(self.lower_row(e))),
                DomNode::Element(e) if e.tag.is_table_section() => {
                    let element = shell_of(&e);
                    let slots = e
                        .children
                        .into_iter()
                        .map(|n| match n {
                            DomNode::Element(r) if r.tag == Tag::Tr => Slot::Item(self.lower_row(r)),
                            other => Slot::Other(other),
                        })
                        .collect();
                    parts.push(TablePart::Section { element, slots });
                }
                other => parts.push(TablePart::Other(other)),
            }
        }
        Table {
            element: shell,
            parts,
        }
    }

    fn lower_row(&mut self, row: ElementNode) -> Row {
        let element = shell_of(&row);
        let slots = row
            .children
            .into_iter()
            .map(|n| match n {
                DomNode::Element(c) if matches!(c.tag, Tag::Td | Tag::Th) => Slot::Item(Cell {
                    element: shell_of(&c),
                    blocks: self.lower_nodes(c.children),
                }),
                other => Slot::Other(other),
            })
            .collect();
        Row { element, slots }
    }

    /// Flatten inline content into runs, recording the wrapping elements.
    fn collect_runs(&mut self, nodes: Vec<DomNode>, marks: &mut Vec<Mark>, runs: &mut Vec<Run>) {
        for node in nodes {
            match node {
                DomNode::Text(t) => runs.push(Run {
                    marks: marks.clone(),
                    content: RunContent::Text(t),
                }),
                DomNode::Element(e) if e.tag.is_void() || e.tag.is_raw_text() => runs.push(Run {
                    marks: marks.clone(),
                    content: RunContent::Node(DomNode::Element(e)),
                }),
                DomNode::Element(mut e) => {
                    let children = std::mem::take(&mut e.children);
                    self.next_mark += 1;
                    marks.push(Mark {
                        id: self.next_mark,
                        element: e,
                    });
                    if children.is_empty() {
                        runs.push(Run {
                            marks: marks.clone(),
                            content: RunContent::Text(String::new()),
                        });
                    } else {
                        self.collect_runs(children, marks, runs);
                    }
                    marks.pop();
                }
                other => runs.push(Run {
                    marks: marks.clone(),
                    content: RunContent::Node(other),
                }),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Serialization blocks → HTML
// ---------------------------------------------------------------------------

fn write_blocks(blocks: &[Block], out: &mut String) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                if let Some(e) = &p.element {
                    write_open_tag(e, out);
                }
                write_runs(&p.runs, out);
                if let Some(e) = &p.element {
                    write_close_tag(e, out);
                }
            }
            Block::Table(t) => {
                write_open_tag(&t.element, out);
                for part in &t.parts {
                    match part {
                        TablePart::Row(r) => write_row(r, out),
                        TablePart::Section { element, slots } => {
                            write_open_tag(element, out);
                            for slot in slots {
                                match slot {
                                    Slot::Item(r) => write_row(r, out),
                                    Slot::Other(node) => write_node(node, out),
                                }
                            }
                            write_close_tag(element, out);
                        }
                        TablePart::Other(node) => write_node(node, out),
                    }
                }
                write_close_tag(&t.element, out);
            }
            Block::Container(c) => {
                write_open_tag(&c.element, out);
                write_blocks(&c.blocks, out);
                write_close_tag(&c.element, out);
            }
            Block::Raw(node) => write_node(node, out),
        }
    }
}

fn write_row(row: &Row, out: &mut String) {
    write_open_tag(&row.element, out);
    for slot in &row.slots {
        match slot {
            Slot::Item(cell) => {
                write_open_tag(&cell.element, out);
                write_blocks(&cell.blocks, out);
                write_close_tag(&cell.element, out);
            }
            Slot::Other(node) => write_node(node, out),
        }
    }
    write_close_tag(&row.element, out);
}

fn write_runs(runs: &[Run], out: &mut String) {
    let mut open: Vec<&Mark> = Vec::new();
    for run in runs {
        let common = open
            .iter()
            .zip(run.marks.iter())
            .take_while(|(a, b)| a.id == b.id)
            .count();
        while open.len() > common {
            if let Some(m) = open.pop() {
                write_close_tag(&m.element, out);
            }
        }
        for mark in &run.marks[common..] {
            write_open_tag(&mark.element, out);
            open.push(mark);
        }
        match &run.content {
            RunContent::Text(t) => escape_text(t, out),
            RunContent::Node(node) => write_node(node, out),
        }
    }
    while let Some(m) = open.pop() {
        write_close_tag(&m.element, out);
    }
}

/// Parse only a body fragment, for tests and programmatic templates.
pub fn parse_fragment(html: &str) -> Vec<Block> {
    let mut lowering = Lowering::default();
    lowering.lower_nodes(dom::parse_html(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_runs_follow_inline_markup() {
        let doc = TemplateDocument::parse("<p>Hello <b>{{Name}}</b>, welcome</p>");
        let Block::Paragraph(p) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.runs.len(), 3);
        assert!(p.runs[1].has_mark(&Tag::B));
        assert_eq!(p.text(), "Hello {{Name}}, welcome");
    }

    #[test]
    fn tables_lower_through_sections() {
        let doc = TemplateDocument::parse(
            "<table><tbody><tr><td>a</td><td><p>b</p><p>c</p></td></tr></tbody><tr><th>d</th></tr></table>",
        );
        let Block::Table(t) = &doc.blocks[0] else {
            panic!("expected table");
        };
        let rows: Vec<&Row> = t.rows().collect();
        assert_eq!(rows.len(), 2);
        let cells: Vec<&Cell> = rows[0].cells().collect();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].blocks.len(), 2);
    }

    #[test]
    fn comments_inside_rows_and_sections_survive() {
        let html = "<table><tr><!-- signature --><td>x</td></tr>\
            <tbody><!-- s --><tr><td>y</td></tr></tbody></table>";
        let doc = TemplateDocument::parse(html);
        assert_eq!(doc.to_html(), html);

        let Block::Table(t) = &doc.blocks[0] else {
            panic!("expected table");
        };
        let texts: Vec<String> = t
            .rows()
            .flat_map(|r| r.cells())
            .map(|c| match &c.blocks[0] {
                Block::Paragraph(p) => p.text(),
                other => panic!("unexpected block {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["x", "y"]);
    }

    #[test]
    fn whitespace_between_table_rows_is_kept() {
        let html = "<table>\n  <thead>\n    <tr><th>Name</th></tr>\n  </thead>\n  \
            <tr>\n    <td>{{Name}}</td>\n  </tr>\n</table>";
        let doc = TemplateDocument::parse(html);
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn serialization_is_lossless_for_untouched_documents() {
        let html = "<!DOCTYPE html>\n<html><head><title>Certificate</title>\
            <style>.n { font-size: 28px; }</style></head>\n\
            <body class=\"page\">\n<div class=\"frame\"><h1>Certificate</h1>\n\
            <p>Awarded to <span class=\"n\"><b>{{Name}}</b> and <i>co</i></span>.</p>\
            <img src=\"data:image/png;base64,AAAA\" /><!-- sig -->\
            <table border=\"1\"><tr><td>x</td></tr></table></div>\n</body></html>\n";
        let doc = TemplateDocument::parse(html);
        assert_eq!(doc.to_html(), html);
        assert_eq!(doc.title.as_deref(), Some("Certificate"));
    }

    #[test]
    fn paragraph_visit_order_puts_tables_after_paragraphs() {
        let doc = TemplateDocument::parse(
            "<p>one</p><table><tr><td>cell1</td><td>cell2</td></tr></table><div><p>two</p></div>",
        );
        let mut seen = Vec::new();
        doc.for_each_paragraph(&mut |p| seen.push(p.text()));
        assert_eq!(seen, vec!["one", "two", "cell1", "cell2"]);
    }

    #[test]
    fn fragment_without_body_lowers_top_level_text() {
        let blocks = parse_fragment("Dear {{Name}}<p>x</p>");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], Block::Paragraph(p) if p.element.is_none()));
    }
}
