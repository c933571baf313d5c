//! Markdown fragment renderer for model answers.
//!
//! Supports the subset the system instruction asks the model to produce:
//! `### ` headings, `**bold**`, line breaks and pipe tables. Input is not
//! HTML-escaped; answers are inserted as-is.

use std::sync::LazyLock;

use regex::Regex;

static TABLE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|.*\|(?:\r?\n\|.*\|)*").expect("valid regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"### (.*)").expect("valid regex"));
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));

/// A parsed pipe table. Cells keep their inline markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Number of columns of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }

    /// Header and body rows with inline markers stripped, padded to the
    /// same width.
    pub fn plain_rows(&self) -> Vec<Vec<String>> {
        let columns = self.column_count();
        std::iter::once(&self.header)
            .chain(self.rows.iter())
            .map(|row| {
                let mut cells: Vec<String> = row.iter().map(|c| plain_text(c)).collect();
                cells.resize(columns, String::new());
                cells
            })
            .collect()
    }
}

/// One span of an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Markup(String),
    Table(Table),
}

/// Splits `text` into prose spans and table blocks, in order.
pub fn parse_fragments(text: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut cursor = 0;

    for block in TABLE_BLOCK_RE.find_iter(text) {
        if block.start() > cursor {
            fragments.push(Fragment::Markup(text[cursor..block.start()].to_string()));
        }
        match parse_table(block.as_str()) {
            Some(table) => fragments.push(Fragment::Table(table)),
            None => fragments.push(Fragment::Markup(block.as_str().to_string())),
        }
        cursor = block.end();
    }

    if cursor < text.len() {
        fragments.push(Fragment::Markup(text[cursor..].to_string()));
    }
    fragments
}

/// All tables found in `text`.
pub fn extract_tables(text: &str) -> Vec<Table> {
    parse_fragments(text)
        .into_iter()
        .filter_map(|fragment| match fragment {
            Fragment::Table(table) => Some(table),
            Fragment::Markup(_) => None,
        })
        .collect()
}

fn parse_table(block: &str) -> Option<Table> {
    let mut rows = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("---"))
        .map(split_row);

    let header = rows.next()?;
    Some(Table {
        header,
        rows: rows.collect(),
    })
}

fn split_row(line: &str) -> Vec<String> {
    let mut cells: Vec<&str> = line.split('|').map(str::trim).collect();
    if cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells.into_iter().map(str::to_string).collect()
}

/// Renders `text` to display markup.
pub fn render_markdown(text: &str) -> String {
    parse_fragments(text)
        .iter()
        .map(|fragment| match fragment {
            Fragment::Markup(markup) => render_markup(markup),
            Fragment::Table(table) => render_table(table),
        })
        .collect()
}

fn render_markup(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let headed = HEADING_RE.replace_all(&normalized, "<h3>$1</h3>");
    let bolded = render_bold(&headed);
    format!("<div>{}</div>", bolded.replace('\n', "<br/>"))
}

fn render_bold(text: &str) -> String {
    BOLD_RE.replace_all(text, "<strong>$1</strong>").into_owned()
}

/// Renders a parsed table as HTML.
pub fn render_table(table: &Table) -> String {
    let mut html = String::from("<div class=\"table-container\"><table><thead><tr>");
    for cell in &table.header {
        html.push_str("<th>");
        html.push_str(&render_bold(cell));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str("<td>");
            html.push_str(&render_bold(cell));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></div>");
    html
}

/// Strips `**` markers, keeping the enclosed text.
pub fn plain_text(text: &str) -> String {
    BOLD_RE.replace_all(text, "$1").into_owned()
}
