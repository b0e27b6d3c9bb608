//! Parsers for the two tool outputs the container queries depend on.

use regex::Regex;

/// Extracts facts from `lsblk` and `cryptsetup status` output.
///
/// Implementations must be pure: the same text always yields the same answer.
pub trait OutputParser {
    /// Mapping name from `lsblk <device> -nlo type,name` output: the token after
    /// a `crypt` type column.
    fn container_name(&self, lsblk_output: &str) -> Option<String>;

    /// Backing device from `cryptsetup status <name>` output: the path after
    /// `device:`.
    fn mapped_device(&self, status_output: &str) -> Option<String>;
}

/// Default [`OutputParser`] built on two line-anchored regular expressions.
#[derive(Debug, Clone)]
pub struct RegexOutputParser {
    crypt_line: Regex,
    device_line: Regex,
}

impl RegexOutputParser {
    pub fn new() -> Self {
        Self {
            crypt_line: Regex::new(r"(?m)^[ \t]*crypt[ \t]+(\S+)")
                .expect("valid crypt line regex"),
            device_line: Regex::new(r"(?m)^[ \t]*device:[ \t]+(\S+)")
                .expect("valid device line regex"),
        }
    }
}

impl Default for RegexOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser for RegexOutputParser {
    fn container_name(&self, lsblk_output: &str) -> Option<String> {
        first_capture(&self.crypt_line, lsblk_output)
    }

    fn mapped_device(&self, status_output: &str) -> Option<String> {
        first_capture(&self.device_line, status_output)
    }
}

fn first_capture(regex: &Regex, haystack: &str) -> Option<String> {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
