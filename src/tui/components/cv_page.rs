//! # CvPage Component
//!
//! The rendered CV in a vertical `ScrollView`. The page is laid out at the
//! current width every frame, so a resize rewraps it and the scroll offset
//! is clamped by the view on the next render.

use ratatui::Frame;
use ratatui::layout::{Rect, Size};
use ratatui::text::Text;
use ratatui::widgets::{Paragraph, Wrap};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Scroll position of the CV page. Lives for the whole session.
#[derive(Debug, Default)]
pub struct CvPageState {
    pub scroll_state: ScrollViewState,
}

impl CvPageState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Emits `Some(())` when the event moved the page.
impl EventHandler for CvPageState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => self.scroll_state.scroll_up(),
            TuiEvent::ScrollDown => self.scroll_state.scroll_down(),
            TuiEvent::ScrollPageUp => self.scroll_state.scroll_page_up(),
            TuiEvent::ScrollPageDown => self.scroll_state.scroll_page_down(),
            TuiEvent::CursorHome => self.scroll_state.scroll_to_top(),
            TuiEvent::CursorEnd => self.scroll_state.scroll_to_bottom(),
            _ => return None,
        }
        Some(())
    }
}

pub struct CvPage<'a> {
    pub content: &'a Text<'static>,
    pub state: &'a mut CvPageState,
}

impl<'a> CvPage<'a> {
    pub fn new(content: &'a Text<'static>, state: &'a mut CvPageState) -> Self {
        Self { content, state }
    }
}

impl Component for CvPage<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        // One column for the scrollbar.
        let content_width = area.width.saturating_sub(1);
        let paragraph = Paragraph::new(self.content.clone()).wrap(Wrap { trim: false });
        let height = u16::try_from(paragraph.line_count(content_width)).unwrap_or(u16::MAX);

        let mut scroll_view = ScrollView::new(Size::new(content_width, height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Automatic)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);
        scroll_view.render_widget(paragraph, Rect::new(0, 0, content_width, height));

        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);
    }
}
