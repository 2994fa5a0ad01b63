//! # Gate Component
//!
//! The screen shown until the session authenticates:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ banner (markdown, wrapped)   │
//! │ > ••••                       │  ← InputBox
//! │ (Press enter to continue)    │
//! │ Incorrect password           │  ← only after a submit
//! └──────────────────────────────┘
//! ```
//!
//! The banner gives up rows first on short terminals so the field, hint and
//! notice stay visible.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Span, Text};
use ratatui::widgets::{Paragraph, Wrap};

use crate::core::state::Session;
use crate::tui::component::Component;
use crate::tui::components::InputBox;
use crate::tui::render::Palette;

pub const HINT: &str = "(Press enter to continue)";
pub const INCORRECT_PASSWORD: &str = "Incorrect password";

pub struct Gate<'a> {
    pub banner: &'a Text<'static>,
    pub session: &'a Session,
    pub palette: Palette,
    pub mask: bool,
}

impl<'a> Gate<'a> {
    pub fn new(banner: &'a Text<'static>, session: &'a Session, palette: Palette, mask: bool) -> Self {
        Self { banner, session, palette, mask }
    }
}

impl Component for Gate<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        use Constraint::Length;

        let notice_height = u16::from(self.session.attempt_made());
        let fixed = 2 + notice_height;

        let banner = Paragraph::new(self.banner.clone()).wrap(Wrap { trim: false });
        let banner_lines = u16::try_from(banner.line_count(area.width)).unwrap_or(u16::MAX);
        let banner_height = banner_lines.min(area.height.saturating_sub(fixed));

        let [banner_area, input_area, hint_area, notice_area] = Layout::vertical([
            Length(banner_height),
            Length(1),
            Length(1),
            Length(notice_height),
        ])
        .areas(area);

        frame.render_widget(banner, banner_area);
        InputBox::new(&self.session.input, self.mask, &self.palette).render(frame, input_area);
        frame.render_widget(
            Span::styled(HINT, Style::default().fg(self.palette.muted)),
            hint_area,
        );

        if self.session.attempt_made() {
            let notice = Span::styled(
                INCORRECT_PASSWORD,
                Style::default()
                    .fg(self.palette.error)
                    .add_modifier(Modifier::BOLD),
            );
            frame.render_widget(notice, notice_area);
        }
    }
}
