use ratatui::Frame;

use crate::core::state::Session;
use crate::tui::ViewState;
use crate::tui::component::Component;
use crate::tui::components::{CvPage, Gate};

/// One frame: the gate until authenticated, the CV after.
pub fn draw_ui(frame: &mut Frame, session: &Session, view: &mut ViewState) {
    let area = frame.area();
    if session.is_authenticated() {
        CvPage::new(&view.pages.cv, &mut view.cv_page).render(frame, area);
    } else {
        Gate::new(&view.pages.banner, session, view.palette, view.mask).render(frame, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{Action, update};
    use crate::test_support::test_session;
    use crate::tui::content::Pages;
    use crate::tui::render::Theme;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn screen(session: &Session, view: &mut ViewState) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw_ui(f, session, view)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn view() -> ViewState {
        ViewState::new(Arc::new(Pages::render(Theme::Dark)), Theme::Dark, true)
    }

    #[test]
    fn test_gate_before_auth() {
        let session = test_session("hunter2");
        let text = screen(&session, &mut view());
        assert!(text.contains("Hire Me"));
        assert!(text.contains("(Press enter to continue)"));
    }

    #[test]
    fn test_cv_after_auth() {
        let mut session = test_session("hunter2");
        for c in "hunter2".chars() {
            update(&mut session, Action::Key(c));
        }
        update(&mut session, Action::Submit);

        let text = screen(&session, &mut view());
        assert!(!text.contains("(Press enter to continue)"));
        assert!(text.contains("Experience"));
    }

    #[test]
    fn test_frame_never_blank_with_broken_documents() {
        let pages = Arc::new(Pages::from_markdown("", "", Theme::Dark));
        let mut view = ViewState::new(pages, Theme::Dark, true);
        let mut session = test_session("hunter2");

        let gate = screen(&session, &mut view);
        assert!(gate.contains("Could not render banner"));

        for c in "hunter2".chars() {
            update(&mut session, Action::Key(c));
        }
        update(&mut session, Action::Submit);
        let cv = screen(&session, &mut view);
        assert!(cv.contains("Oh no!"));
    }
}
