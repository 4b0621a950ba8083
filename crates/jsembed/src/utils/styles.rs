use anstyle::{AnsiColor, Color, Style};
use clap::builder::Styles;

use crate::utils::{CHECK, MARK};

const ACCENT: Style = Style::new()
    .bold()
    .fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
const LITERAL: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));
const FAILURE: Style = Style::new()
    .bold()
    .fg_color(Some(Color::Ansi(AnsiColor::BrightRed)));
const SUCCESS: Style = Style::new()
    .bold()
    .fg_color(Some(Color::Ansi(AnsiColor::BrightGreen)));

/// Help output colors for `jsembed --help`
pub fn get_styles() -> Styles {
    Styles::styled()
        .header(ACCENT.underline())
        .usage(ACCENT)
        .literal(LITERAL)
        .placeholder(Style::new().italic())
        .valid(SUCCESS)
        .invalid(FAILURE)
        .error(FAILURE)
}

fn paint(msg: &str, style: Style) -> String {
    format!("{style}{msg}{style:#}")
}

pub(crate) fn fmt_bold(msg: &str) -> String {
    paint(msg, Style::new().bold())
}

pub(crate) fn fmt_dimmed(msg: &str) -> String {
    paint(msg, Style::new().dimmed())
}

pub(crate) fn fmt_success(msg: &str) -> String {
    format!("{} {msg}", paint(CHECK, SUCCESS))
}

pub(crate) fn fmt_error(msg: &str) -> String {
    format!("{} {msg}", paint(MARK, FAILURE))
}
