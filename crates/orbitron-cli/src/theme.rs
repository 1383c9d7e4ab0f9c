//! Dark and light color schemes.

use ratatui::style::Color;

/// Active color scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    /// Light text on a dark background.
    #[default]
    Dark,
    /// Dark text on a light background.
    Light,
}

/// Colors used by the renderer.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub focus: Color,
    pub user: Color,
    pub agent: Color,
    pub error: Color,
    pub warning: Color,
    pub bar: Color,
    pub gutter: Color,
}

impl Theme {
    /// The other scheme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    /// Name shown in the status bar.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    /// syntect theme used by the file viewer.
    #[must_use]
    pub const fn syntax_theme(self) -> &'static str {
        match self {
            Self::Dark => "base16-ocean.dark",
            Self::Light => "base16-ocean.light",
        }
    }

    #[must_use]
    pub const fn palette(self) -> Palette {
        match self {
            Self::Dark => Palette {
                background: Color::Reset,
                text: Color::White,
                muted: Color::DarkGray,
                border: Color::Gray,
                focus: Color::Cyan,
                user: Color::Cyan,
                agent: Color::Green,
                error: Color::Red,
                warning: Color::Yellow,
                bar: Color::DarkGray,
                gutter: Color::Rgb(100, 100, 100),
            },
            Self::Light => Palette {
                background: Color::White,
                text: Color::Black,
                muted: Color::Gray,
                border: Color::DarkGray,
                focus: Color::Blue,
                user: Color::Blue,
                agent: Color::Rgb(0, 110, 60),
                error: Color::Rgb(190, 30, 30),
                warning: Color::Rgb(160, 100, 0),
                bar: Color::Rgb(220, 220, 220),
                gutter: Color::Rgb(150, 150, 150),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_round_trips() {
        assert_eq!(Theme::default(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::Dark.toggled().toggled(), Theme::Dark);
        assert_ne!(Theme::Light.syntax_theme(), Theme::Dark.syntax_theme());
    }
}
