//! # TUI Adapter
//!
//! The ratatui-specific layer. Renders the session state into terminal
//! bytes and translates client key presses into `core::Action` values.
//!
//! There is no local terminal: each SSH session gets an off-screen
//! `ratatui::Terminal` whose crossterm backend writes into a `Vec<u8>`. After
//! every draw the buffered escape sequences are taken out and sent down the
//! channel by the caller.
//!
//! ```text
//! bytes ─► KeyDecoder ─► KeyEvent ─► TuiEvent ─► dispatch() ─► Effect
//!                                                   │
//! Session + ViewState ─► SessionTerminal::draw() ─► bytes ─► channel
//! ```
//!
//! A `SteadyBlock` cursor style is used instead of a blinking cursor because
//! ratatui's `set_cursor_position` resets the terminal's blink timer on every
//! `draw()` call.

pub mod component;
pub mod components;
pub mod content;
pub mod event;
pub mod keys;
pub mod markdown;
pub mod render;
mod ui;

use std::io;
use std::sync::Arc;

use crossterm::cursor::{SetCursorStyle, Show};
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::{Terminal, TerminalOptions};

use crate::core::action::{Effect, update};
use crate::core::state::{Session, Viewport};
use crate::tui::component::EventHandler;
use crate::tui::components::CvPageState;
use crate::tui::content::Pages;
use crate::tui::event::TuiEvent;
use crate::tui::render::{Palette, Theme};

/// TUI-specific presentation state (not part of core session logic)
pub struct ViewState {
    pub pages: Arc<Pages>,
    pub cv_page: CvPageState,
    pub palette: Palette,
    /// Show `•` instead of the typed password.
    pub mask: bool,
}

impl ViewState {
    pub fn new(pages: Arc<Pages>, theme: Theme, mask: bool) -> Self {
        Self {
            pages,
            cv_page: CvPageState::new(),
            palette: theme.palette(),
            mask,
        }
    }
}

/// Route one event: scrolling goes to the CV page once authenticated,
/// everything else becomes a core action.
pub fn dispatch(session: &mut Session, view: &mut ViewState, event: TuiEvent) -> Effect {
    if session.is_authenticated() && view.cv_page.handle_event(&event).is_some() {
        return Effect::Redraw;
    }
    match event.to_action() {
        Some(action) => update(session, action),
        None => Effect::None,
    }
}

type ByteTerminal = Terminal<CrosstermBackend<Vec<u8>>>;

/// An off-screen terminal of a fixed size whose output is collected as bytes.
pub struct SessionTerminal {
    terminal: ByteTerminal,
}

impl SessionTerminal {
    pub fn new(viewport: Viewport) -> io::Result<Self> {
        let backend = CrosstermBackend::new(Vec::new());
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: ratatui::Viewport::Fixed(area(viewport)),
            },
        )?;
        Ok(Self { terminal })
    }

    /// Switch the client to the alternate screen.
    pub fn open(&mut self) -> io::Result<Vec<u8>> {
        queue!(
            self.terminal.backend_mut().writer_mut(),
            EnterAlternateScreen,
            SetCursorStyle::SteadyBlock,
            Clear(ClearType::All)
        )?;
        Ok(self.take_output())
    }

    pub fn draw(&mut self, session: &Session, view: &mut ViewState) -> io::Result<Vec<u8>> {
        self.terminal.draw(|f| ui::draw_ui(f, session, view))?;
        Ok(self.take_output())
    }

    /// Change the drawing area; the next `draw` repaints every cell.
    pub fn resize(&mut self, viewport: Viewport) -> io::Result<()> {
        self.terminal.resize(area(viewport))
    }

    /// Restore the client's screen and cursor.
    pub fn close(&mut self) -> io::Result<Vec<u8>> {
        queue!(
            self.terminal.backend_mut().writer_mut(),
            Show,
            SetCursorStyle::DefaultUserShape,
            LeaveAlternateScreen
        )?;
        Ok(self.take_output())
    }

    fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(self.terminal.backend_mut().writer_mut())
    }
}

fn area(viewport: Viewport) -> Rect {
    Rect::new(0, 0, viewport.width, viewport.height)
}
