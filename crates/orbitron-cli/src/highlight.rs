//! Syntax highlighting for the file viewer.

use std::path::Path;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::theme::Theme;

/// Syntax highlighter using syntect.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl Highlighter {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Pick a syntax from the language hint, then the file extension, then
    /// fall back to plain text.
    fn find_syntax(&self, language: &str, filename: &str) -> &SyntaxReference {
        let language = language.trim();
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        Some(language)
            .filter(|l| !l.is_empty())
            .and_then(|l| {
                self.syntax_set
                    .find_syntax_by_token(l)
                    .or_else(|| self.syntax_set.find_syntax_by_extension(l))
            })
            .or_else(|| self.syntax_set.find_syntax_by_extension(extension))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
    }

    /// Name of the syntax that would be used, for the panel title.
    pub fn syntax_name(&self, language: &str, filename: &str) -> &str {
        &self.find_syntax(language, filename).name
    }

    /// Highlight a whole file into numbered lines.
    pub fn highlight(
        &self,
        code: &str,
        language: &str,
        filename: &str,
        theme: Theme,
    ) -> Vec<Line<'static>> {
        let palette = theme.palette();
        let gutter_style = Style::default().fg(palette.gutter);
        let plain_style = Style::default().fg(palette.text);

        let line_count = code.lines().count().max(1);
        let number_width = line_count.to_string().len();

        let syntax = self.find_syntax(language, filename);
        let mut highlighter = self
            .theme_set
            .themes
            .get(theme.syntax_theme())
            .map(|t| HighlightLines::new(syntax, t));

        let mut result = Vec::with_capacity(line_count);

        for (i, line) in LinesWithEndings::from(code).enumerate() {
            let mut spans = vec![
                Span::styled(format!("{:>number_width$}", i + 1), gutter_style),
                Span::styled(" │ ", gutter_style),
            ];

            let ranges = highlighter
                .as_mut()
                .and_then(|h| h.highlight_line(line, &self.syntax_set).ok());

            match ranges {
                Some(ranges) => {
                    for (style, text) in ranges {
                        let text = text.trim_end_matches(['\n', '\r']);
                        if !text.is_empty() {
                            spans.push(Span::styled(text.to_string(), convert_style(style)));
                        }
                    }
                }
                None => {
                    let text = line.trim_end_matches(['\n', '\r']);
                    spans.push(Span::styled(text.to_string(), plain_style));
                }
            }

            result.push(Line::from(spans));
        }

        result
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_style(style: syntect::highlighting::Style) -> Style {
    let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
    let mut converted = Style::default().fg(fg);

    if style.font_style.contains(FontStyle::BOLD) {
        converted = converted.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        converted = converted.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        converted = converted.add_modifier(Modifier::UNDERLINED);
    }
    converted
}
