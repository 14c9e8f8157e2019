//! ANSI color palette and per-source color rotation.
//!
//! Colors and styles are indexed by their SGR numeric code. The first and
//! last entry of each palette never come out of the allocator: index 0 is
//! black / normal (invisible or indistinct on most terminals) and the last
//! entry is the "leave unchanged" marker.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Environment variable that disables coloring when present.
pub const NOCOLOR_ENV: &str = "WATCHER_NOCOLOR";

const OPEN_ESCAPE: &str = "\x1b[";
const CLOSE_ESCAPE: &str = "m";

/// Terminal colors, in SGR code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    NoChange,
}

impl Color {
    pub const ALL: [Color; 9] = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::White,
        Color::NoChange,
    ];

    /// SGR digit appended to the foreground/background prefix.
    pub fn code(self) -> u8 {
        // NoChange lands on 8, which terminals treat as "no color".
        self as u8
    }
}

/// Text styles, in SGR code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Normal,
    Bold,
    Dim,
    Italic,
    Underline,
    Blink,
    FastBlink,
    Reverse,
    Hide,
    Strikethrough,
    NoChange,
}

impl Style {
    pub const ALL: [Style; 11] = [
        Style::Normal,
        Style::Bold,
        Style::Dim,
        Style::Italic,
        Style::Underline,
        Style::Blink,
        Style::FastBlink,
        Style::Reverse,
        Style::Hide,
        Style::Strikethrough,
        Style::NoChange,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Full decoration for one piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSpec {
    pub foreground: Color,
    pub background: Color,
    pub style: Style,
    /// Use the bright (90-range) foreground codes.
    pub bright_fg: bool,
    /// Use the bright (100-range) background codes.
    pub bright_bg: bool,
}

impl Default for ColorSpec {
    fn default() -> Self {
        Self {
            foreground: Color::NoChange,
            background: Color::NoChange,
            style: Style::NoChange,
            bright_fg: true,
            bright_bg: false,
        }
    }
}

impl ColorSpec {
    /// Foreground-only spec with the normal style, as assigned to new sources.
    pub fn foreground(color: Color) -> Self {
        Self {
            foreground: color,
            style: Style::Normal,
            ..Self::default()
        }
    }
}

/// Wrap `text` in an SGR open sequence and a reset sequence.
pub fn colorize(text: &str, spec: &ColorSpec) -> String {
    let fg_prefix = if spec.bright_fg { "9" } else { "3" };
    let bg_prefix = if spec.bright_bg { "10" } else { "4" };

    format!(
        "{OPEN_ESCAPE}{};{}{};{}{}{CLOSE_ESCAPE}{text}{OPEN_ESCAPE}0{CLOSE_ESCAPE}",
        spec.style.code(),
        fg_prefix,
        spec.foreground.code(),
        bg_prefix,
        spec.background.code(),
    )
}

/// Rotating color/style source.
///
/// Each call advances its own counter before indexing, so the first color
/// handed out is `Green`, then `Yellow`, and so on through `White` and
/// back to `Red`.
#[derive(Debug, Default)]
pub struct ColorAllocator {
    color_index: AtomicUsize,
    style_index: AtomicUsize,
}

impl ColorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next foreground color in the rotation.
    pub fn next_color(&self) -> Color {
        let n = self.color_index.fetch_add(1, Ordering::Relaxed) + 1;
        Color::ALL[1 + n % (Color::ALL.len() - 2)]
    }

    /// Next text style in the rotation.
    pub fn next_style(&self) -> Style {
        let n = self.style_index.fetch_add(1, Ordering::Relaxed) + 1;
        Style::ALL[1 + n % (Style::ALL.len() - 2)]
    }
}

/// Decide whether console output should carry color escapes.
pub fn should_color() -> bool {
    use std::io::IsTerminal;

    color_enabled(std::io::stdout().is_terminal(), |key| {
        std::env::var(key).ok()
    })
}

/// Color decision from a tty flag and an environment lookup.
///
/// `bazel run` and similar wrappers hide the tty, so a truecolor or
/// 256-color terminal declaration also turns color on.
pub fn color_enabled(is_tty: bool, env: impl Fn(&str) -> Option<String>) -> bool {
    let declared = env("COLORTERM").as_deref() == Some("truecolor")
        || env("TERM").as_deref() == Some("xterm-256color");
    (is_tty || declared) && env(NOCOLOR_ENV).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_color_rotation_skips_noop_entries() {
        let alloc = ColorAllocator::new();
        let seen: Vec<Color> = (0..8).map(|_| alloc.next_color()).collect();
        assert_eq!(
            seen,
            vec![
                Color::Green,
                Color::Yellow,
                Color::Blue,
                Color::Magenta,
                Color::Cyan,
                Color::White,
                Color::Red,
                Color::Green,
            ]
        );
        assert!(!seen.contains(&Color::Black));
        assert!(!seen.contains(&Color::NoChange));
    }

    #[test]
    fn test_style_rotation_skips_noop_entries() {
        let alloc = ColorAllocator::new();
        for _ in 0..30 {
            let style = alloc.next_style();
            assert_ne!(style, Style::Normal);
            assert_ne!(style, Style::NoChange);
        }
    }

    #[test]
    fn test_colorize_escape_layout() {
        let spec = ColorSpec::foreground(Color::Red);
        assert_eq!(colorize("hi", &spec), "\x1b[0;91;48mhi\x1b[0m");

        let spec = ColorSpec {
            foreground: Color::Cyan,
            background: Color::Blue,
            style: Style::Bold,
            bright_fg: false,
            bright_bg: true,
        };
        assert_eq!(colorize("x", &spec), "\x1b[1;36;104mx\x1b[0m");
    }

    #[test]
    fn test_color_enabled() {
        assert!(color_enabled(true, env_of(&[])));
        assert!(!color_enabled(false, env_of(&[])));
        assert!(color_enabled(false, env_of(&[("COLORTERM", "truecolor")])));
        assert!(color_enabled(false, env_of(&[("TERM", "xterm-256color")])));
        assert!(!color_enabled(false, env_of(&[("TERM", "dumb")])));
        assert!(!color_enabled(true, env_of(&[(NOCOLOR_ENV, "")])));
    }
}
