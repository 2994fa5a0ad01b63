//! # Renderer Adapter
//!
//! The only door into the markdown renderer. `render()` reports failures as
//! `RenderError`; `render_or()` logs them and hands back a fixed fallback
//! text instead, so a frame is never blank and a session never dies because
//! a document failed to render.
//!
//! A panic inside the markdown/syntect stack counts as a failure too.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use clap::ValueEnum;
use log::error;
use ratatui::style::Color;
use ratatui::text::Text;
use serde::{Deserialize, Serialize};

use crate::tui::markdown;

/// Shown when the gate banner cannot be rendered.
pub const BANNER_FALLBACK: &str = "Could not render banner, something is seriously broken behind the scenes. Please email me instead :)";
/// Shown when the CV cannot be rendered.
pub const CV_FALLBACK: &str = "Oh no! Something went wrong and I couldn't render my CV. Please try again later or email me :)";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Colors used by the markdown writer and the gate screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub base_fg: Color,
    pub heading: Color,
    pub accent: Color,
    pub muted: Color,
    pub code_fg: Color,
    pub code_bg: Color,
    /// Failure notice ("Incorrect password").
    pub error: Color,
    /// syntect theme used for fenced code blocks.
    pub syntax_theme: &'static str,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                base_fg: Color::Gray,
                heading: Color::LightMagenta,
                accent: Color::Cyan,
                muted: Color::DarkGray,
                code_fg: Color::White,
                code_bg: Color::DarkGray,
                error: Color::LightRed,
                syntax_theme: "base16-ocean.dark",
            },
            Theme::Light => Palette {
                base_fg: Color::Black,
                heading: Color::Magenta,
                accent: Color::Blue,
                muted: Color::Gray,
                code_fg: Color::Black,
                code_bg: Color::Gray,
                error: Color::LightRed,
                syntax_theme: "InspiredGitHub",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The document produced no visible text.
    Empty,
    /// The renderer panicked; carries the panic message when it was a string.
    Panicked(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Empty => write!(f, "rendered document is empty"),
            RenderError::Panicked(msg) => write!(f, "renderer panicked: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Render markdown with the given theme.
pub fn render(markdown: &str, theme: Theme) -> Result<Text<'static>, RenderError> {
    render_with(markdown, theme, markdown::render)
}

/// Render markdown, substituting `fallback` if rendering fails.
pub fn render_or(markdown: &str, theme: Theme, fallback: &'static str) -> Text<'static> {
    match render(markdown, theme) {
        Ok(text) => text,
        Err(e) => {
            error!("Render failed, showing fallback text: {}", e);
            Text::raw(fallback)
        }
    }
}

/// Shared body of `render`, with the renderer injectable for tests.
fn render_with<F>(markdown: &str, theme: Theme, renderer: F) -> Result<Text<'static>, RenderError>
where
    F: FnOnce(&str, &Palette) -> Text<'static>,
{
    let palette = theme.palette();
    let text = panic::catch_unwind(AssertUnwindSafe(|| renderer(markdown, &palette)))
        .map_err(|payload| RenderError::Panicked(panic_message(payload.as_ref())))?;

    let visible = text
        .lines
        .iter()
        .any(|line| line.spans.iter().any(|s| !s.content.trim().is_empty()));
    if visible { Ok(text) } else { Err(RenderError::Empty) }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
