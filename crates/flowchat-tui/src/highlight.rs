use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use flowchat_core::DEFAULT_LANGUAGE;

/// Syntax highlighting for fenced code, backed by syntect's bundled assets
pub struct Highlighter {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
}

impl Highlighter {
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
        }
    }

    fn theme(&self, name: &str) -> Option<&Theme> {
        self.themes
            .themes
            .get(name)
            .or_else(|| self.themes.themes.values().next())
    }

    /// Highlight `code` line by line.
    ///
    /// Each returned line is a list of styled fragments without the trailing
    /// newline. Unknown languages and highlighting failures fall back to a
    /// single unstyled fragment per line.
    pub fn highlight(&self, code: &str, language: &str, theme_name: &str) -> Vec<Vec<Span<'static>>> {
        let syntax = if language == DEFAULT_LANGUAGE {
            self.syntaxes.find_syntax_plain_text()
        } else {
            self.syntaxes
                .find_syntax_by_token(language)
                .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
        };

        let Some(theme) = self.theme(theme_name) else {
            return plain_lines(code);
        };

        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut lines = Vec::new();

        for line in LinesWithEndings::from(code) {
            let Ok(ranges) = highlighter.highlight_line(line, &self.syntaxes) else {
                return plain_lines(code);
            };
            let spans = ranges
                .into_iter()
                .filter_map(|(style, fragment)| {
                    let fragment = fragment.trim_end_matches(['\n', '\r']);
                    (!fragment.is_empty()).then(|| Span::styled(fragment.to_string(), to_style(style)))
                })
                .collect();
            lines.push(spans);
        }

        if lines.is_empty() {
            lines.push(Vec::new());
        }
        lines
    }
}

fn plain_lines(code: &str) -> Vec<Vec<Span<'static>>> {
    let mut lines: Vec<Vec<Span<'static>>> = code
        .lines()
        .map(|line| vec![Span::raw(line.to_string())])
        .collect();
    if lines.is_empty() {
        lines.push(Vec::new());
    }
    lines
}

fn to_style(style: SynStyle) -> Style {
    let fg = style.foreground;
    let mut out = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    out
}
