//! The two documents served to every session, compiled into the binary.

use ratatui::text::Text;

use crate::tui::render::{BANNER_FALLBACK, CV_FALLBACK, Theme, render_or};

pub const BANNER_MD: &str = include_str!("../../assets/banner.md");
pub const CV_MD: &str = include_str!("../../assets/cv.md");

/// Banner and CV rendered once at startup and shared by all sessions.
#[derive(Debug, Clone)]
pub struct Pages {
    pub banner: Text<'static>,
    pub cv: Text<'static>,
}

impl Pages {
    pub fn render(theme: Theme) -> Self {
        Self::from_markdown(BANNER_MD, CV_MD, theme)
    }

    pub fn from_markdown(banner: &str, cv: &str, theme: Theme) -> Self {
        Self {
            banner: render_or(banner, theme, BANNER_FALLBACK),
            cv: render_or(cv, theme, CV_FALLBACK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text<'_>) -> String {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_bundled_documents_render() {
        let pages = Pages::render(Theme::Dark);
        assert!(plain(&pages.banner).contains("Hire Me"));
        assert!(!plain(&pages.cv).contains(CV_FALLBACK));
        assert!(!plain(&pages.cv).trim().is_empty());
    }

    #[test]
    fn test_bundled_cv_code_is_highlighted() {
        for theme in [Theme::Dark, Theme::Light] {
            let pages = Pages::render(theme);
            assert!(plain(&pages.cv).contains("│ ssh -t cv.example.com"));
            let highlighted = pages.cv.lines.iter().flat_map(|l| l.spans.iter()).any(|s| {
                matches!(s.style.fg, Some(ratatui::style::Color::Rgb(..)))
            });
            assert!(highlighted, "{:?} theme has no highlighted code", theme);
        }
    }

    #[test]
    fn test_broken_documents_fall_back() {
        let pages = Pages::from_markdown("", "  ", Theme::Light);
        assert_eq!(plain(&pages.banner), BANNER_FALLBACK);
        assert_eq!(plain(&pages.cv), CV_FALLBACK);
    }
}
