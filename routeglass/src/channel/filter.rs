//! Output filtering: escape-sequence stripping and device noise removal.
//!
//! Devices interleave diagnostic output with banners, login notices, and
//! echoed prompts. Which lines count as noise depends on the device, so the
//! patterns come from configuration rather than from the filter itself.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A configured noise pattern. Matching is done on the trimmed line.
///
/// In JSON each pattern is a single-key object, e.g. `{"suffix": "@r1>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoisePattern {
    /// Line starts with the text.
    Prefix(String),
    /// Line ends with the text.
    Suffix(String),
    /// Line contains the text anywhere.
    Contains(String),
    /// Line matches the regular expression.
    Regex(String),
}

impl NoisePattern {
    pub fn prefix(text: impl Into<String>) -> Self {
        NoisePattern::Prefix(text.into())
    }

    pub fn suffix(text: impl Into<String>) -> Self {
        NoisePattern::Suffix(text.into())
    }

    pub fn contains(text: impl Into<String>) -> Self {
        NoisePattern::Contains(text.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        NoisePattern::Regex(pattern.into())
    }
}

#[derive(Debug, Clone)]
enum NoiseMatcher {
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(Regex),
}

impl NoiseMatcher {
    fn compile(pattern: &NoisePattern) -> Result<Self, regex::Error> {
        Ok(match pattern {
            NoisePattern::Prefix(s) => NoiseMatcher::Prefix(s.clone()),
            NoisePattern::Suffix(s) => NoiseMatcher::Suffix(s.clone()),
            NoisePattern::Contains(s) => NoiseMatcher::Contains(s.clone()),
            NoisePattern::Regex(p) => NoiseMatcher::Regex(Regex::new(p)?),
        })
    }

    fn matches(&self, line: &str) -> bool {
        match self {
            NoiseMatcher::Prefix(s) => line.starts_with(s.as_str()),
            NoiseMatcher::Suffix(s) => line.ends_with(s.as_str()),
            NoiseMatcher::Contains(s) => line.contains(s.as_str()),
            NoiseMatcher::Regex(re) => re.is_match(line),
        }
    }
}

/// Stateless line filter built from a set of noise patterns.
///
/// # Example
///
/// ```rust
/// use routeglass::channel::{NoisePattern, OutputFilter};
///
/// let filter = OutputFilter::new(&[NoisePattern::contains("through SSH")]).unwrap();
/// assert_eq!(filter.filter_line("\x1b[32mhello\x1b[0m").as_deref(), Some("hello"));
/// assert_eq!(filter.filter_line("user logged in through SSH"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OutputFilter {
    matchers: Vec<NoiseMatcher>,
}

impl OutputFilter {
    /// Compile a filter from noise patterns.
    pub fn new<'a>(
        patterns: impl IntoIterator<Item = &'a NoisePattern>,
    ) -> Result<Self, regex::Error> {
        let matchers = patterns
            .into_iter()
            .map(NoiseMatcher::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Check an already-clean, trimmed line against the noise patterns.
    pub fn is_noise(&self, line: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(line))
    }

    /// Clean a single raw line.
    ///
    /// Returns `None` when the line is empty after cleaning or is noise.
    /// Any line breaks left inside `raw` are folded into spaces.
    pub fn filter_line(&self, raw: impl AsRef<[u8]>) -> Option<String> {
        let stripped = strip_ansi(raw.as_ref());
        let line = if stripped.contains('\n') {
            stripped.split('\n').map(str::trim).collect::<Vec<_>>().join(" ")
        } else {
            stripped
        };

        let line = line.trim();
        if line.is_empty() || self.is_noise(line) {
            return None;
        }
        Some(line.to_string())
    }

    /// Clean a whole captured buffer.
    ///
    /// Line endings are normalised and escape sequences stripped line by
    /// line, then each line is trimmed and filtered. Surviving lines are
    /// joined with `\n`.
    pub fn filter_text(&self, raw: impl AsRef<[u8]>) -> String {
        let stripped = strip_ansi(raw.as_ref());
        stripped
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty() && !self.is_noise(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Strip terminal escape sequences, keeping printable text.
///
/// `\r\n`, `\r`, and `\n` all become `\n`; tabs are kept; every other
/// control byte is dropped. Each line gets a fresh parser, so an
/// unterminated OSC or DCS string swallows the rest of its own line only.
pub fn strip_ansi(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = memchr::memchr2(b'\r', b'\n', rest) {
        strip_line(&rest[..pos], &mut out);
        out.push('\n');
        let crlf = rest[pos] == b'\r' && rest.get(pos + 1) == Some(&b'\n');
        rest = &rest[pos + if crlf { 2 } else { 1 }..];
    }
    strip_line(rest, &mut out);
    out
}

fn strip_line(line: &[u8], out: &mut String) {
    let mut parser = vte::Parser::new();
    parser.advance(&mut Printable { out }, line);
}

struct Printable<'a> {
    out: &'a mut String,
}

impl vte::Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if byte == b'\t' {
            self.out.push('\t');
        }
    }
}
