//! Stack trace normalization.
//!
//! Removes runtime and third-party frames so the same logical failure
//! produces the same text regardless of dependency versions, install paths
//! or async executor depth. Headers, messages and application frames are
//! kept in their original order.
//!
//! Two frame syntaxes are recognised:
//! - `at <location>` lines (JavaScript/JVM traces), judged one line at a time
//! - Rust backtrace frames: an `N: <symbol>` line, any unnumbered inlined
//!   symbol lines, each followed by its `at <location>` lines. A frame is
//!   judged as a unit and dropped when either its symbol or its location is
//!   noise. Kept frames lose their index and hash suffix, so removing a
//!   runtime frame never renumbers the application frames around it.

use regex::Regex;
use std::sync::OnceLock;

/// Substrings that mark a frame location as runtime or dependency code.
pub const DEFAULT_PATH_MARKERS: &[&str] = &[
    "node:internal",
    "node:timers",
    "node_modules",
    "/rustc/",
    "/.cargo/registry/",
    "/.cargo/git/",
];

/// Crate roots of Rust runtime and plumbing frames.
pub const RUNTIME_CRATES: &[&str] = &[
    "std",
    "core",
    "alloc",
    "__rustc",
    "panic_unwind",
    "panic_abort",
    "backtrace",
    "backtrace_rs",
    "tokio",
    "futures",
    "futures_core",
    "futures_util",
    "futures_executor",
    "anyhow",
];

/// Whole symbol names of process entry and unwinding frames.
pub const RUNTIME_SYMBOLS: &[&str] = &[
    "<unknown>",
    "main",
    "_start",
    "__libc_start_main",
    "__libc_start_call_main",
    "rust_begin_unwind",
    "__rust_try",
    "start_thread",
    "clone",
    "clone3",
    "__clone",
    "thread_start",
    "BaseThreadInitThunk",
    "RtlUserThreadStart",
];

const RUST_LOCATION_INDENT: &str = "      ";
const RUST_SYMBOL_INDENT: &str = "  ";

fn numbered_frame() -> &'static Regex {
    static FRAME: OnceLock<Regex> = OnceLock::new();
    FRAME.get_or_init(|| Regex::new(r"^\d+:\s+(\S.*)$").expect("frame pattern is valid"))
}

fn symbol_hash() -> &'static Regex {
    static HASH: OnceLock<Regex> = OnceLock::new();
    HASH.get_or_init(|| Regex::new(r"::h[0-9a-f]{16}$").expect("hash pattern is valid"))
}

#[derive(Debug, Clone, Default)]
pub struct StackNormalizer {
    extra_markers: Vec<String>,
}

impl StackNormalizer {
    /// Extend the built-in noise markers with operator supplied substrings.
    pub fn with_extra_markers(extra_markers: Vec<String>) -> Self {
        Self {
            extra_markers: extra_markers
                .into_iter()
                .filter(|m| !m.trim().is_empty())
                .collect(),
        }
    }

    pub fn normalize(&self, raw_stack: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut lines = raw_stack.split('\n').peekable();
        let mut in_backtrace = false;

        while let Some(line) = lines.next() {
            let trimmed = line.trim();

            let symbol = match numbered_frame().captures(trimmed) {
                Some(caps) => caps.get(1).map(|m| m.as_str()),
                // Inlined frames repeat without an index under the same frame.
                None if in_backtrace
                    && line.starts_with(char::is_whitespace)
                    && !trimmed.is_empty()
                    && !trimmed.starts_with("at ") =>
                {
                    Some(trimmed)
                }
                None => None,
            };

            let Some(symbol) = symbol else {
                if !line.starts_with(char::is_whitespace) {
                    in_backtrace = false;
                }
                let noisy_location = trimmed
                    .strip_prefix("at ")
                    .is_some_and(|location| self.has_path_marker(location));
                if !noisy_location {
                    out.push(line.to_string());
                }
                continue;
            };

            in_backtrace = true;
            let mut locations = Vec::new();
            while let Some(location) = lines.peek().and_then(|l| l.trim().strip_prefix("at ")) {
                locations.push(location);
                lines.next();
            }

            let noise = self.is_runtime_symbol(symbol)
                || self.has_path_marker(symbol)
                || locations.iter().any(|l| self.has_path_marker(l));
            if noise {
                continue;
            }

            out.push(format!(
                "{}{}",
                RUST_SYMBOL_INDENT,
                symbol_hash().replace(symbol, "")
            ));
            for location in locations {
                out.push(format!("{}at {}", RUST_LOCATION_INDENT, location));
            }
        }

        out.join("\n")
    }

    fn is_runtime_symbol(&self, symbol: &str) -> bool {
        RUNTIME_SYMBOLS.contains(&symbol) || RUNTIME_CRATES.contains(&crate_root(symbol))
    }

    fn has_path_marker(&self, text: &str) -> bool {
        DEFAULT_PATH_MARKERS.iter().any(|m| text.contains(m))
            || self.extra_markers.iter().any(|m| text.contains(m.as_str()))
    }
}

/// Crate a demangled symbol belongs to.
///
/// For `<Subject as Trait>::method` this is the subject's crate, or the
/// trait's crate when the subject is not a path (`fn() -> T`, `&T`, a bare
/// generic parameter).
fn crate_root(symbol: &str) -> &str {
    if let Some(qualified) = symbol.strip_prefix('<') {
        if let Some((subject, trait_path)) = split_qualified(qualified) {
            let subject = subject
                .trim_start_matches(['&', '*'])
                .trim_start_matches("mut ")
                .trim_start_matches("const ")
                .trim_start_matches("dyn ");
            let subject_is_path = subject.contains("::")
                && subject.starts_with(|c: char| c.is_alphabetic() || c == '_')
                && !subject.starts_with("fn(");
            return if subject_is_path {
                first_segment(subject)
            } else {
                first_segment(trait_path)
            };
        }
        return first_segment(qualified);
    }
    first_segment(symbol)
}

/// Split `Subject as Trait>::rest` at the top-level ` as `.
fn split_qualified(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' | b')' | b']' => depth -= 1,
            b' ' if depth == 0 && s[i..].starts_with(" as ") => {
                return Some((&s[..i], &s[i + 4..]));
            }
            _ => {}
        }
    }
    None
}

fn first_segment(path: &str) -> &str {
    path.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or(path)
}

/// Normalize with the built-in markers only.
pub fn normalize(raw_stack: &str) -> String {
    StackNormalizer::default().normalize(raw_stack)
}
