use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

/// Colours for one theme mode
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub user: Color,
    pub assistant: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub border_active: Color,
    pub code_bg: Color,
    pub code_fg: Color,
    pub code_caption: Color,
    pub error_bg: Color,
    pub error_fg: Color,
    pub header_bg: Color,
    /// Name of a theme bundled with syntect
    pub syntax_theme: &'static str,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Dark => "dark",
            ThemeMode::Light => "light",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dark" => Some(ThemeMode::Dark),
            "light" => Some(ThemeMode::Light),
            _ => None,
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            ThemeMode::Dark => Palette {
                user: Color::Cyan,
                assistant: Color::Yellow,
                text: Color::White,
                muted: Color::DarkGray,
                border: Color::DarkGray,
                border_active: Color::Cyan,
                code_bg: Color::Rgb(43, 48, 59),
                code_fg: Color::Rgb(192, 197, 206),
                code_caption: Color::Magenta,
                error_bg: Color::Rgb(90, 20, 20),
                error_fg: Color::Rgb(255, 200, 200),
                header_bg: Color::DarkGray,
                syntax_theme: "base16-ocean.dark",
            },
            ThemeMode::Light => Palette {
                user: Color::Blue,
                assistant: Color::Rgb(150, 90, 0),
                text: Color::Black,
                muted: Color::Gray,
                border: Color::Gray,
                border_active: Color::Blue,
                code_bg: Color::Rgb(240, 240, 240),
                code_fg: Color::Rgb(40, 40, 40),
                code_caption: Color::Rgb(120, 40, 140),
                error_bg: Color::Rgb(254, 226, 226),
                error_fg: Color::Rgb(153, 27, 27),
                header_bg: Color::Rgb(220, 220, 220),
                syntax_theme: "InspiredGitHub",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_mode() {
        assert_eq!(ThemeMode::Dark.toggle(), ThemeMode::Light);
        assert_eq!(ThemeMode::Light.toggle().toggle(), ThemeMode::Light);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(ThemeMode::from_str("Light"), Some(ThemeMode::Light));
        assert_eq!(ThemeMode::from_str("sepia"), None);
    }
}
