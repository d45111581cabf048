use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

/// Colours used by the renderer for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub user: Color,
    pub assistant: Color,
    pub error: Color,
    pub border: Color,
    pub border_focused: Color,
    pub selection: Color,
}

impl Theme {
    /// Value written to storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light_mode",
            Theme::Dark => "dark_mode",
        }
    }

    /// Anything other than the light name is dark.
    pub fn from_stored(s: &str) -> Self {
        if s.trim() == Theme::Light.as_str() {
            Theme::Light
        } else {
            Theme::Dark
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Label for the toggle control: names the theme it switches to.
    pub fn toggle_label(&self) -> &'static str {
        match self {
            Theme::Light => "dark mode",
            Theme::Dark => "light mode",
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Dark => Palette {
                background: Color::Rgb(36, 36, 36),
                text: Color::Rgb(227, 227, 227),
                muted: Color::DarkGray,
                accent: Color::Cyan,
                user: Color::Cyan,
                assistant: Color::Yellow,
                error: Color::LightRed,
                border: Color::DarkGray,
                border_focused: Color::Cyan,
                selection: Color::Rgb(56, 56, 56),
            },
            Theme::Light => Palette {
                background: Color::Rgb(255, 255, 255),
                text: Color::Rgb(34, 34, 34),
                muted: Color::Gray,
                accent: Color::Blue,
                user: Color::Blue,
                assistant: Color::Magenta,
                error: Color::Red,
                border: Color::Gray,
                border_focused: Color::Blue,
                selection: Color::Rgb(233, 238, 246),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_toggle_is_identity() {
        for theme in [Theme::Light, Theme::Dark] {
            assert_eq!(theme.toggled().toggled(), theme);
            assert_ne!(theme.toggled(), theme);
        }
    }

    #[test]
    fn test_stored_names() {
        assert_eq!(Theme::from_stored("light_mode"), Theme::Light);
        assert_eq!(Theme::from_stored("dark_mode"), Theme::Dark);
        assert_eq!(Theme::from_stored("garbage"), Theme::Dark);
        assert_eq!(Theme::from_stored(Theme::Light.as_str()), Theme::Light);
    }
}
