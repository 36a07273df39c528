// src/output/render.rs
// =============================================================================
// Renders markdown as styled, word-wrapped terminal text.
//
// pulldown-cmark turns the markdown into a stream of events (start of a
// heading, some text, end of a heading, ...). We walk that stream and write
// words into lines no wider than the wrap width, styling them with
// `colored` according to what we are inside of (heading, link, code...).
//
// Block layout:
// - headings, paragraphs, code blocks, rules: separated by a blank line
// - list items: "• " or "1. " marker, wrapped lines indented under it
// - block quotes: "│ " gutter
// - code blocks: indented four spaces, never wrapped
//
// Styles add escape codes that take no room on screen, so the writer
// tracks the visible width of a line separately from its bytes. Width is
// counted in terminal columns: CJK and most emoji take two.
//
// Tables are laid out row by row with padded columns instead of wrapping.
// =============================================================================

use crate::scraper::{FetchError, FetchOutcome};
use colored::{ColoredString, Colorize};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use unicode_width::UnicodeWidthStr;

// Narrower than this and wrapping stops making sense
const MIN_WIDTH: usize = 20;

pub struct TerminalRenderer {
    width: usize,
}

impl TerminalRenderer {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(MIN_WIDTH),
        }
    }

    pub fn render(&self, markdown: &str) -> String {
        let mut writer = Writer::new(self.width);
        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
        for event in Parser::new_ext(markdown, options) {
            writer.handle(event);
        }
        writer.finish()
    }

    // Renders one scraped page under a heading naming its URL
    pub fn render_page(&self, url: &str, markdown: &str) -> String {
        self.render(&format!("# {url}\n\n{markdown}"))
    }
}

// Which inline styles are active
#[derive(Debug, Default, Clone, Copy)]
struct Style {
    heading: bool,
    strong: bool,
    emphasis: bool,
    strike: bool,
    link: bool,
    code: bool,
    quote: bool,
}

impl Style {
    fn paint(self, word: &str) -> String {
        let mut s: ColoredString = word.normal();
        if self.heading {
            s = s.cyan().bold();
        }
        if self.link {
            s = s.blue().underline();
        }
        if self.code {
            s = s.yellow();
        }
        if self.strong {
            s = s.bold();
        }
        if self.emphasis {
            s = s.italic();
        }
        if self.strike {
            s = s.strikethrough();
        }
        if self.quote {
            s = s.dimmed();
        }
        s.to_string()
    }
}

struct Writer {
    width: usize,
    out: String,

    // Current line: styled bytes plus visible width
    line: String,
    line_len: usize,
    line_started: bool,
    has_words: bool,
    space: bool,

    // Prefixes for wrapped lines (list indents, quote gutters) and a
    // list marker waiting to be printed on the next line
    indents: Vec<String>,
    marker: Option<String>,

    style: Style,
    quote_depth: usize,
    lists: Vec<Option<u64>>,
    in_code_block: bool,

    // Link target and text seen so far, to print "(target)" after the text
    link: Option<(String, String)>,
    // Image alt text is collected instead of printed
    image_alt: Option<String>,
    // Rows of cells of the table being read, printed once it ends
    table: Option<Vec<Vec<String>>>,
}

impl Writer {
    fn new(width: usize) -> Self {
        Self {
            width,
            out: String::new(),
            line: String::new(),
            line_len: 0,
            line_started: false,
            has_words: false,
            space: false,
            indents: Vec::new(),
            marker: None,
            style: Style::default(),
            quote_depth: 0,
            lists: Vec::new(),
            in_code_block: false,
            link: None,
            image_alt: None,
            table: None,
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                self.style.code = true;
                self.text(&code);
                self.style.code = false;
            }
            Event::SoftBreak => self.space = true,
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                let rule = "─".repeat(self.width);
                self.raw_line(&rule.dimmed().to_string(), self.width);
                self.blank();
            }
            Event::TaskListMarker(checked) => {
                let mark = if checked { "[x] " } else { "[ ] " };
                self.inline(mark, |s| s.to_string());
            }
            Event::FootnoteReference(name) => {
                let note = format!("[^{name}]");
                self.inline(&note, |s| s.dimmed().to_string());
            }
            Event::Html(_) => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.flush(),
            Tag::Heading(level, _, _) => {
                self.flush();
                self.style.heading = true;
                let hashes = "#".repeat(heading_depth(level));
                self.word(&hashes, self.style.paint(&hashes));
                self.space = true;
            }
            Tag::BlockQuote => {
                self.flush();
                self.indents.push("│ ".to_string());
                self.quote_depth += 1;
                self.style.quote = true;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        let label = format!("    {lang}");
                        self.raw_line(&label.dimmed().to_string(), label.width());
                    }
                }
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.indents.push(" ".repeat(marker.width()));
                self.marker = Some(marker);
            }
            Tag::Emphasis => self.style.emphasis = true,
            Tag::Strong => self.style.strong = true,
            Tag::Strikethrough => self.style.strike = true,
            Tag::Link(_, dest, _) => {
                self.style.link = true;
                self.link = Some((dest.to_string(), String::new()));
            }
            Tag::Image(..) => self.image_alt = Some(String::new()),
            Tag::FootnoteDefinition(name) => {
                self.flush();
                let label = format!("[^{name}]:");
                self.word(&label, label.dimmed().to_string());
                self.space = true;
            }
            Tag::Table(_) => {
                self.flush();
                self.table = Some(Vec::new());
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(rows) = self.table.as_mut() {
                    rows.push(Vec::new());
                }
            }
            Tag::TableCell => {
                if let Some(row) = self.table.as_mut().and_then(|rows| rows.last_mut()) {
                    row.push(String::new());
                }
            }
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph | Tag::FootnoteDefinition(_) => self.blank(),
            Tag::Heading(..) => {
                self.style.heading = false;
                self.blank();
            }
            Tag::BlockQuote => {
                self.flush();
                self.indents.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.style.quote = self.quote_depth > 0;
                self.blank();
            }
            Tag::CodeBlock(_) => {
                self.in_code_block = false;
                self.blank();
            }
            Tag::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Tag::Item => {
                self.flush();
                self.indents.pop();
                self.marker = None;
            }
            Tag::Emphasis => self.style.emphasis = false,
            Tag::Strong => self.style.strong = false,
            Tag::Strikethrough => self.style.strike = false,
            Tag::Link(..) => {
                self.style.link = false;
                if let Some((dest, text)) = self.link.take() {
                    if !dest.is_empty() && !dest.starts_with('#') && dest != text {
                        let target = format!(" ({dest})");
                        self.inline(&target, |s| s.dimmed().to_string());
                    }
                }
            }
            Tag::Image(..) => {
                let alt = self.image_alt.take().unwrap_or_default();
                let label = if alt.is_empty() {
                    "[image]".to_string()
                } else {
                    format!("[image: {alt}]")
                };
                self.inline(&label, |s| s.dimmed().to_string());
            }
            Tag::Table(_) => {
                let rows = self.table.take().unwrap_or_default();
                self.table_rows(&rows);
                self.blank();
            }
            Tag::TableHead | Tag::TableRow | Tag::TableCell => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(alt) = self.image_alt.as_mut() {
            alt.push_str(text);
            return;
        }
        if let Some((_, link_text)) = self.link.as_mut() {
            link_text.push_str(text);
        }
        if let Some(cell) = self.cell() {
            cell.push_str(text);
            return;
        }
        if self.in_code_block {
            for line in text.lines() {
                let indented = format!("    {line}");
                let len = indented.width();
                self.raw_line(&indented.yellow().to_string(), len);
            }
            return;
        }

        if text.starts_with(char::is_whitespace) {
            self.space = true;
        }
        let mut words = text.split_whitespace().peekable();
        while let Some(word) = words.next() {
            self.word(word, self.style.paint(word));
            if words.peek().is_some() {
                self.space = true;
            }
        }
        if text.ends_with(char::is_whitespace) {
            self.space = true;
        }
    }

    // The cell being filled, while inside a table
    fn cell(&mut self) -> Option<&mut String> {
        self.table
            .as_mut()
            .and_then(|rows| rows.last_mut())
            .and_then(|row| row.last_mut())
    }

    // Decorations (link targets, image labels, markers) go into the current
    // table cell as plain text, or onto the line as a word of their own.
    // A leading space in `plain` asks for a gap before it.
    fn inline(&mut self, plain: &str, paint: impl Fn(&str) -> String) {
        if let Some(cell) = self.cell() {
            cell.push_str(plain);
            return;
        }
        if plain.starts_with(' ') {
            self.space = true;
        }
        let word = plain.trim();
        self.word(word, paint(word));
        if plain.ends_with(' ') {
            self.space = true;
        }
    }

    // Adds one word, wrapping first if it would overflow the line
    fn word(&mut self, plain: &str, styled: String) {
        let len = plain.width();
        if !self.line_started {
            self.begin_line();
        } else if self.has_words {
            let gap = usize::from(self.space);
            if self.line_len + gap + len > self.width {
                self.newline();
                self.begin_line();
            } else if self.space {
                self.line.push(' ');
                self.line_len += 1;
            }
        }
        self.line.push_str(&styled);
        self.line_len += len;
        self.has_words = true;
        self.space = false;
    }

    // Writes the prefix (indents, or a list marker in place of the last one)
    fn begin_line(&mut self) {
        let mut prefix = String::new();
        let last = self.indents.len().saturating_sub(1);
        for (i, indent) in self.indents.iter().enumerate() {
            match (&self.marker, i == last) {
                (Some(marker), true) => prefix.push_str(marker),
                _ => prefix.push_str(indent),
            }
        }
        self.marker = None;

        self.line_len = prefix.width();
        self.line = if self.quote_depth > 0 {
            prefix.dimmed().to_string()
        } else {
            prefix
        };
        self.line_started = true;
        self.has_words = false;
        self.space = false;
    }

    // Pads every column to its widest cell; the header row is set off by a
    // rule underneath
    fn table_rows(&mut self, rows: &[Vec<String>]) {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.trim().width());
            }
        }

        for (n, row) in rows.iter().enumerate() {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = row.get(i).map_or("", |c| c.trim());
                    format!("{cell}{}", " ".repeat(width - cell.width()))
                })
                .collect();
            let line = cells.join(" │ ");
            let line = line.trim_end();
            if n == 0 {
                self.raw_line(&line.bold().to_string(), line.width());
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                let rule = rule.join("─┼─");
                self.raw_line(&rule.dimmed().to_string(), rule.width());
            } else {
                self.raw_line(line, line.width());
            }
        }
    }

    // A pre-formatted line that is never wrapped
    fn raw_line(&mut self, styled: &str, len: usize) {
        self.flush();
        self.begin_line();
        self.line.push_str(styled);
        self.line_len += len;
        self.has_words = true;
        self.newline();
    }

    fn newline(&mut self) {
        self.out.push_str(self.line.trim_end());
        self.out.push('\n');
        self.line.clear();
        self.line_len = 0;
        self.line_started = false;
        self.has_words = false;
        self.space = false;
    }

    fn flush(&mut self) {
        if self.line_started {
            self.newline();
        }
    }

    fn blank(&mut self) {
        self.flush();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        let trimmed = self.out.trim_end_matches('\n').len();
        self.out.truncate(trimmed);
        self.out.push('\n');
        self.out
    }
}

fn heading_depth(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

// Renders every result: pages under their URL, failures as one-line notes
pub fn render_results(results: &[FetchOutcome], width: usize) -> String {
    let renderer = TerminalRenderer::new(width);
    let mut out = String::new();

    for outcome in results {
        match &outcome.result {
            Ok(page) => {
                out.push_str(&renderer.render_page(&outcome.url, &page.markdown));
                out.push('\n');
            }
            Err(error) => {
                out.push_str(&failure_line(&outcome.url, error));
                out.push_str("\n\n");
            }
        }
    }

    out
}

fn failure_line(url: &str, error: &FetchError) -> String {
    format!("Error scraping {url}: {error}").red().to_string()
}
