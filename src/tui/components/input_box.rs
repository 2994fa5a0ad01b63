//! # InputBox Component
//!
//! Renders the password field: a `> ` prompt, the typed value (masked by
//! default) or the placeholder when empty, and the terminal cursor.
//!
//! The text itself lives in `core::input::LineInput`; this component only
//! reads it. When the value is wider than the field the view scrolls
//! horizontally so the cursor stays visible.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::input::LineInput;
use crate::tui::component::Component;
use crate::tui::render::Palette;

pub const PROMPT: &str = "> ";
pub const MASK_CHAR: char = '•';

/// Password field.
///
/// # Props
///
/// - `input`: the field contents and cursor (from the Session)
/// - `mask`: show `•` per character instead of the text
/// - `palette`: colors for prompt, text and placeholder
pub struct InputBox<'a> {
    pub input: &'a LineInput,
    pub mask: bool,
    pub palette: &'a Palette,
}

impl<'a> InputBox<'a> {
    pub fn new(input: &'a LineInput, mask: bool, palette: &'a Palette) -> Self {
        Self { input, mask, palette }
    }

    fn shown_chars(&self) -> Vec<char> {
        if self.mask {
            vec![MASK_CHAR; self.input.len()]
        } else {
            self.input.chars().to_vec()
        }
    }
}

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

impl Component for InputBox<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let prompt_width = PROMPT.width() as u16;
        let [prompt_area, field_area] =
            Layout::horizontal([Constraint::Length(prompt_width), Constraint::Min(0)]).areas(area);

        frame.render_widget(
            Span::styled(PROMPT, Style::default().fg(self.palette.accent)),
            prompt_area,
        );

        if self.input.is_empty() {
            let placeholder = Span::styled(
                self.input.placeholder.as_str(),
                Style::default().fg(self.palette.muted),
            );
            frame.render_widget(placeholder, field_area);
            frame.set_cursor_position((field_area.x, field_area.y));
            return;
        }

        let shown = self.shown_chars();
        let cursor_col: usize = shown[..self.input.cursor()].iter().map(|&c| char_width(c)).sum();
        // Keep one column free for the cursor at the end of the text.
        let offset = cursor_col.saturating_sub(usize::from(field_area.width.saturating_sub(1)));

        // Drop whole characters off the left until the cursor fits.
        let mut skipped = 0;
        let visible: String = shown
            .into_iter()
            .skip_while(|&c| {
                let skip = skipped < offset;
                if skip {
                    skipped += char_width(c);
                }
                skip
            })
            .collect();
        let field = Paragraph::new(Line::from(visible))
            .style(Style::default().fg(self.palette.base_fg));
        frame.render_widget(field, field_area);

        let visible_col = cursor_col.saturating_sub(skipped);
        let cursor_x = field_area.x
            + u16::try_from(visible_col)
                .unwrap_or(u16::MAX)
                .min(field_area.width.saturating_sub(1));
        frame.set_cursor_position((cursor_x, field_area.y));
    }
}
