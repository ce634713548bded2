//! Styling of the ensemble reports printed to the terminal.

use owo_colors::{OwoColorize, colors::css};

/// Terminals narrower than this get the compact report layout.
const NARROW_WIDTH: u16 = 80;

/// How reports are rendered on the current terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    color: bool,
    narrow: bool,
}

impl Style {
    /// Inspects stdout for colour support and width.
    pub fn detect() -> Self {
        Self {
            color: supports_color::on(supports_color::Stream::Stdout).is_some(),
            narrow: terminal_size::terminal_size().is_some_and(|(width, _)| width.0 < NARROW_WIDTH),
        }
    }

    /// Whether the compact layout should be used.
    pub const fn is_narrow(self) -> bool {
        self.narrow
    }

    /// A table header or source-model label.
    pub fn heading(self, text: &str) -> String {
        if self.color {
            text.fg::<css::LightBlue>().bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Secondary detail, such as source names and magnitude ranges.
    pub fn muted(self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    /// Something the user probably did not expect, such as an empty result.
    pub fn warning(self, text: &str) -> String {
        if self.color {
            text.fg::<css::Orange>().to_string()
        } else {
            text.to_string()
        }
    }

    fn good(self, text: &str) -> String {
        if self.color {
            text.fg::<css::Green>().to_string()
        } else {
            text.to_string()
        }
    }

    /// A logic-tree weight with four decimals, left-aligned in `width`
    /// columns.
    ///
    /// Sampled branches have no weight and are shown as a muted `-`.
    pub fn weight(self, weight: Option<f64>, width: usize) -> String {
        match weight {
            Some(weight) => format!("{weight:<width$.4}"),
            None => self.muted(&format!("{:<width$}", "-")),
        }
    }

    /// The magnitude range of a region model, or `-` when it has no sources.
    pub fn magnitudes(self, min_mag: Option<f64>, max_mag: Option<f64>) -> String {
        match (min_mag, max_mag) {
            (Some(lo), Some(hi)) => self.muted(&format!("M{lo:.2}-{hi:.2}")),
            _ => self.muted("-"),
        }
    }

    /// A total that is suspicious when zero, like a number of realizations.
    pub fn count(self, count: usize) -> String {
        let text = count.to_string();
        if count == 0 {
            self.warning(&text)
        } else {
            self.good(&text)
        }
    }

    /// How many of `total` items survived a filter.
    pub fn kept(self, kept: usize, total: usize) -> String {
        let text = format!("{kept}/{total}");
        if kept == 0 && total > 0 {
            self.warning(&text)
        } else {
            self.good(&text)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const PLAIN: Style = Style {
        color: false,
        narrow: false,
    };

    const COLORED: Style = Style {
        color: true,
        narrow: false,
    };

    #[test_case(Some(0.25), 8, "0.2500  "; "weighted")]
    #[test_case(Some(1.0), 0, "1.0000"; "unpadded")]
    #[test_case(None, 4, "-   "; "sampled")]
    fn weights_are_padded_before_styling(weight: Option<f64>, width: usize, expected: &str) {
        assert_eq!(PLAIN.weight(weight, width), expected);
    }

    #[test]
    fn magnitude_range_needs_both_ends() {
        assert_eq!(PLAIN.magnitudes(Some(5.0), Some(6.25)), "M5.00-6.25");
        assert_eq!(PLAIN.magnitudes(None, None), "-");
    }

    #[test]
    fn plain_style_adds_no_escapes() {
        assert_eq!(PLAIN.count(0), "0");
        assert_eq!(PLAIN.kept(3, 10), "3/10");
        assert_eq!(PLAIN.heading("Ordinal"), "Ordinal");
    }

    #[test]
    fn zero_counts_are_highlighted_differently() {
        assert_ne!(COLORED.count(0), COLORED.good("0"));
        assert_eq!(COLORED.count(0), COLORED.warning("0"));
        assert_eq!(COLORED.count(4), COLORED.good("4"));
        assert!(COLORED.count(4).contains('\u{1b}'));
    }

    #[test]
    fn nothing_kept_out_of_nothing_is_not_a_warning() {
        assert_eq!(COLORED.kept(0, 0), COLORED.good("0/0"));
        assert_eq!(COLORED.kept(0, 5), COLORED.warning("0/5"));
    }
}
