use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

/// Plain RGB triple that converts into a terminal color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Linear interpolation towards `other`, `t` in [0, 1]
    pub fn blend(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 { (a as f32 + (b as f32 - a as f32) * t).round() as u8 };
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }

    /// Darker variant used while a modal dialog covers the screen
    pub fn dimmed(self) -> Rgb {
        self.blend(Rgb(0, 0, 0), 0.5)
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Color::Rgb(rgb.0, rgb.1, rgb.2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    pub accent: Rgb,
    pub text: Rgb,
    pub background: Rgb,
    /// `None` means the theme leaves the status bar untinted
    pub status_bar: Option<Rgb>,
}

impl Theme {
    fn new(name: &str, accent: Rgb, text: Rgb, background: Rgb, status_bar: Option<Rgb>) -> Self {
        Theme {
            name: name.to_string(),
            accent,
            text,
            background,
            status_bar,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThemeError {
    #[error("unknown theme '{0}'")]
    Unknown(String),
}

pub fn builtin_themes() -> Vec<Theme> {
    vec![
        Theme::new("Yotsuba", Rgb(0x11, 0x77, 0x43), Rgb(0x80, 0x00, 0x00), Rgb(0xff, 0xff, 0xee), Some(Rgb(0x80, 0x00, 0x00))),
        Theme::new("Yotsuba B", Rgb(0x34, 0x34, 0x5c), Rgb(0x00, 0x00, 0x00), Rgb(0xee, 0xf2, 0xff), Some(Rgb(0x2d, 0x3b, 0x8b))),
        Theme::new("Tomorrow", Rgb(0x81, 0xa2, 0xbe), Rgb(0xc5, 0xc8, 0xc6), Rgb(0x1d, 0x1f, 0x21), Some(Rgb(0x28, 0x2a, 0x2e))),
        Theme::new("Photon", Rgb(0xff, 0x66, 0x00), Rgb(0x33, 0x33, 0x33), Rgb(0xee, 0xee, 0xee), Some(Rgb(0xff, 0x66, 0x00))),
        Theme::new("Insomnia", Rgb(0x4b, 0x8b, 0xbe), Rgb(0xb8, 0xb8, 0xb8), Rgb(0x1a, 0x1a, 0x1a), Some(Rgb(0x24, 0x24, 0x24))),
        Theme::new("Black", Rgb(0x4c, 0xaf, 0x50), Rgb(0xe0, 0xe0, 0xe0), Rgb(0x00, 0x00, 0x00), None),
    ]
}

/// Holds the active theme and broadcasts changes to attached widgets.
///
/// Listeners subscribe with [`ThemeEngine::subscribe`] and stop listening by
/// dropping the receiver, so the listener count always equals the number of
/// live receivers.
pub struct ThemeEngine {
    themes: Vec<Theme>,
    current: usize,
    tx: watch::Sender<Theme>,
}

impl ThemeEngine {
    /// Build the engine with the named theme, falling back to the first built-in one
    pub fn new(name: Option<&str>) -> Self {
        let themes = builtin_themes();
        let (tx, _) = watch::channel(themes[0].clone());
        let mut engine = ThemeEngine { themes, current: 0, tx };

        if let Some(name) = name {
            if let Err(e) = engine.set_theme(name) {
                warn!(error = %e, "Using default theme");
            }
        }
        engine
    }

    pub fn current(&self) -> &Theme {
        &self.themes[self.current]
    }

    pub fn accent(&self) -> Color {
        self.current().accent.into()
    }

    pub fn set_theme(&mut self, name: &str) -> Result<(), ThemeError> {
        let index = find_theme(&self.themes, name).ok_or_else(|| ThemeError::Unknown(name.to_string()))?;
        self.current = index;
        self.publish();
        Ok(())
    }

    /// Switch to the next built-in theme
    pub fn cycle(&mut self) -> &Theme {
        self.current = (self.current + 1) % self.themes.len();
        self.publish();
        self.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&mut self) {
        let theme = self.themes[self.current].clone();
        info!(theme = %theme.name, listeners = self.listener_count(), "Theme changed");
        self.tx.send_replace(theme);
    }
}

fn find_theme(themes: &[Theme], name: &str) -> Option<usize> {
    themes.iter().position(|t| t.name.eq_ignore_ascii_case(name))
}
