//! Markdown → ratatui `Text`.
//!
//! Walks `pulldown_cmark` events and builds styled lines for the banner and
//! CV pages: headings, emphasis, inline code, fenced code (highlighted with
//! syntect when the language is known), lists, quotes, rules and links.
//!
//! All colors come from a [`Palette`]. Callers outside `tui` go through
//! `tui::render`, which turns failures into fallback text.

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use syntect::easy::HighlightLines;
use syntect::highlighting::{self, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::tui::render::Palette;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const TAB: &str = "    ";
const RULE_WIDTH: usize = 40;

/// Render markdown with the given palette.
pub fn render(content: &str, palette: &Palette) -> Text<'static> {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);

    let mut writer = Writer::new(*palette);
    for event in Parser::new_ext(content, opts) {
        writer.handle(event);
    }
    writer.text
}

/// A syntect highlighter for `lang` in the palette's syntax theme, if both
/// are known.
fn highlighter_for(lang: &str, palette: &Palette) -> Option<HighlightLines<'static>> {
    if lang.is_empty() {
        return None;
    }
    let syntax = SYNTAX_SET.find_syntax_by_token(lang)?;
    let theme = THEME_SET.themes.get(palette.syntax_theme)?;
    Some(HighlightLines::new(syntax, theme))
}

fn syntect_span(style: highlighting::Style, fragment: &str) -> Option<Span<'static>> {
    let content = fragment.trim_end_matches('\n').replace('\t', TAB);
    if content.is_empty() {
        return None;
    }
    let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
    Some(Span::styled(content, Style::default().fg(fg)))
}

/// How lines inside the current code block are styled.
enum CodeMode {
    Highlighted(HighlightLines<'static>),
    Plain,
}

struct Writer {
    text: Text<'static>,
    palette: Palette,
    /// Inline styles; each entry is already patched onto its parent.
    styles: Vec<Style>,
    /// Per-line prefixes (quote bar, code border).
    prefixes: Vec<Span<'static>>,
    /// `None` = bullet list, `Some(n)` = ordered list at item `n`.
    lists: Vec<Option<u64>>,
    code: Option<CodeMode>,
    link_url: Option<String>,
    /// A blank line goes before the next block.
    pending_gap: bool,
}

impl Writer {
    fn new(palette: Palette) -> Self {
        Self {
            text: Text::default(),
            palette,
            styles: Vec::new(),
            prefixes: Vec::new(),
            lists: Vec::new(),
            code: None,
            link_url: None,
            pending_gap: false,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| Style::default().fg(self.palette.base_fg))
    }

    fn push_style(&mut self, overlay: Style) {
        self.styles.push(self.style().patch(overlay));
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn border_style(&self) -> Style {
        Style::default().fg(self.palette.muted)
    }

    fn push_line(&mut self, line: Line<'static>) {
        let mut line = line;
        if !self.prefixes.is_empty() {
            let mut spans = self.prefixes.clone();
            spans.append(&mut line.spans);
            line.spans = spans;
        }
        self.text.lines.push(line);
    }

    fn push_span(&mut self, span: Span<'static>) {
        match self.text.lines.last_mut() {
            Some(line) => line.push_span(span),
            None => self.push_line(Line::from(span)),
        }
    }

    fn gap(&mut self) {
        if self.pending_gap {
            self.push_line(Line::default());
            self.pending_gap = false;
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(tag) => self.close(tag),
            Event::Text(text) => self.text(text),
            Event::Code(code) => {
                let style = Style::default()
                    .fg(self.palette.code_fg)
                    .bg(self.palette.code_bg);
                self.push_span(Span::styled(code.to_string(), style));
            }
            Event::SoftBreak => self.push_span(Span::raw(" ")),
            Event::HardBreak => self.push_line(Line::default()),
            Event::Rule => {
                self.gap();
                let rule = Span::styled("─".repeat(RULE_WIDTH), self.border_style());
                self.push_line(Line::from(rule));
                self.pending_gap = true;
            }
            Event::TaskListMarker(done) => {
                self.push_span(Span::raw(if done { "[x] " } else { "[ ] " }));
            }
            _ => {}
        }
    }

    fn open(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.gap();
                self.push_line(Line::default());
            }
            Tag::Heading { level, .. } => {
                self.gap();
                let style = heading_style(&self.palette, level);
                let marker = format!("{} ", "#".repeat(level as usize));
                self.push_line(Line::from(Span::styled(marker, style)));
                // Text inside the heading inherits the heading style.
                self.push_style(style);
            }
            Tag::BlockQuote(_) => {
                self.gap();
                self.prefixes.push(Span::styled("│ ", self.border_style()));
                self.push_style(
                    Style::default()
                        .fg(self.palette.base_fg)
                        .add_modifier(Modifier::DIM | Modifier::ITALIC),
                );
            }
            Tag::CodeBlock(kind) => self.open_code_block(kind),
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.gap();
                }
                self.lists.push(start);
            }
            Tag::Item => self.open_item(),
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.link_url = Some(dest_url.to_string());
                self.push_style(link_style(&self.palette));
            }
            _ => {}
        }
    }

    fn open_code_block(&mut self, kind: CodeBlockKind<'_>) {
        if !self.text.lines.is_empty() {
            self.push_line(Line::default());
        }
        let lang = match &kind {
            CodeBlockKind::Fenced(lang) => lang.as_ref(),
            CodeBlockKind::Indented => "",
        };

        let border = self.border_style();
        let mut top = vec![Span::styled("╭──", border)];
        if !lang.is_empty() {
            top.push(Span::styled(format!(" {lang} "), border.add_modifier(Modifier::BOLD)));
            top.push(Span::styled("──", border));
        }
        self.push_line(Line::from(top));
        self.prefixes.push(Span::styled("│ ", border));

        self.code = Some(match highlighter_for(lang, &self.palette) {
            Some(highlighter) => CodeMode::Highlighted(highlighter),
            None => CodeMode::Plain,
        });
    }

    fn close_code_block(&mut self) {
        self.code = None;
        self.prefixes.pop();
        self.push_line(Line::from(Span::styled("╰──", self.border_style())));
        self.pending_gap = true;
    }

    fn open_item(&mut self) {
        self.push_line(Line::default());
        let indent = "  ".repeat(self.lists.len().saturating_sub(1));
        let marker = match self.lists.last_mut() {
            Some(None) => format!("{indent}- "),
            Some(Some(n)) => {
                let marker = format!("{indent}{n}. ");
                *n += 1;
                marker
            }
            None => return,
        };
        self.push_span(Span::styled(marker, self.border_style()));
    }

    fn close(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.pending_gap = true,
            TagEnd::Heading(_) => {
                self.pop_style();
                self.pending_gap = true;
            }
            TagEnd::BlockQuote(_) => {
                self.prefixes.pop();
                self.pop_style();
                self.pending_gap = true;
            }
            TagEnd::CodeBlock => self.close_code_block(),
            TagEnd::List(_) => {
                self.lists.pop();
                self.pending_gap = true;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link_url.take() {
                    self.push_span(Span::raw(" ("));
                    self.push_span(Span::styled(url, link_style(&self.palette)));
                    self.push_span(Span::raw(")"));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, cow: CowStr<'_>) {
        // ratatui draws '\t' as zero width.
        let text = cow.replace('\t', TAB);

        match self.code.take() {
            Some(CodeMode::Highlighted(mut highlighter)) => {
                for line in LinesWithEndings::from(&text) {
                    let spans: Vec<Span<'static>> = match highlighter.highlight_line(line, &SYNTAX_SET) {
                        Ok(ranges) => ranges
                            .into_iter()
                            .filter_map(|(style, fragment)| syntect_span(style, fragment))
                            .collect(),
                        Err(_) => vec![Span::styled(
                            line.trim_end_matches('\n').to_string(),
                            Style::default().fg(self.palette.code_fg),
                        )],
                    };
                    self.push_line(Line::from(spans));
                }
                self.code = Some(CodeMode::Highlighted(highlighter));
            }
            Some(CodeMode::Plain) => {
                let style = Style::default().fg(self.palette.code_fg);
                for line in text.lines() {
                    self.push_line(Line::from(Span::styled(line.to_string(), style)));
                }
                self.code = Some(CodeMode::Plain);
            }
            None => {
                let style = self.style();
                self.push_span(Span::styled(text, style));
            }
        }
    }
}

fn link_style(palette: &Palette) -> Style {
    Style::default()
        .fg(palette.accent)
        .add_modifier(Modifier::UNDERLINED)
}

fn heading_style(palette: &Palette, level: HeadingLevel) -> Style {
    match level {
        HeadingLevel::H1 => Style::default()
            .fg(palette.heading)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        HeadingLevel::H2 => Style::default()
            .fg(palette.heading)
            .add_modifier(Modifier::BOLD),
        _ => Style::default()
            .fg(palette.base_fg)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC),
    }
}
