//! Plugin pattern compiler
//!
//! Builds one anchored expression per plugin:
//!
//! ```text
//! ^(PREFIX|...)(COMMAND)\s+(ARG1)\s*,\s*(ARG2)...(?:\s*,\s*(REST))?\s*(?:SUFFIX|...)\s*$
//! ```
//!
//! Group 1 is the prefix, group 2 the command, groups 3.. the arguments and
//! the group after them the remainder.

use regex_lite::Regex;

/// Result of a successful match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    pub prefix: String,
    pub args: Vec<String>,
    pub rest: String,
}

#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    num_args: usize,
}

fn alternation(literals: &[String]) -> String {
    let mut sorted: Vec<&String> = literals.iter().collect();
    // Longest first so "!!" wins over "!".
    sorted.sort_by(|a, b| b.len().cmp(&a.len()));
    sorted
        .iter()
        .map(|l| regex_lite::escape(l))
        .collect::<Vec<_>>()
        .join("|")
}

impl Matcher {
    pub fn compile(
        prefixes: &[String],
        command: &str,
        num_args: usize,
        suffixes: &[String],
        case_insensitive: bool,
    ) -> Result<Self, regex_lite::Error> {
        let mut pattern = String::new();
        if case_insensitive {
            pattern.push_str("(?i)");
        }
        pattern.push('^');
        pattern.push_str(&format!("({})", alternation(prefixes)));
        pattern.push_str(&format!("({})", regex_lite::escape(command)));

        if num_args == 0 {
            pattern.push_str(r"(?:\s+(.*?))?");
        } else {
            pattern.push_str(r"\s+([^,]+?)");
            for _ in 1..num_args {
                pattern.push_str(r"\s*,\s*([^,]+?)");
            }
            pattern.push_str(r"(?:\s*,\s*(.*?))?");
        }

        if !suffixes.is_empty() {
            pattern.push_str(&format!(r"\s*(?:{})", alternation(suffixes)));
        }
        pattern.push_str(r"\s*$");

        Ok(Self {
            regex: Regex::new(&pattern)?,
            num_args,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn captures(&self, body: &str) -> Option<Captures> {
        let caps = self.regex.captures(body)?;
        let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();

        Some(Captures {
            prefix: group(1),
            args: (3..3 + self.num_args).map(|i| group(i).trim().to_string()).collect(),
            rest: group(3 + self.num_args).trim().to_string(),
        })
    }

    pub fn is_match(&self, body: &str) -> bool {
        self.regex.is_match(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_argument() {
        let m = Matcher::compile(&strings(&["!"]), "echo", 1, &[], false).unwrap();
        let caps = m.captures("!echo hello").unwrap();
        assert_eq!(caps.prefix, "!");
        assert_eq!(caps.args, vec!["hello"]);
        assert_eq!(caps.rest, "");
    }

    #[test]
    fn test_argument_count_must_be_met() {
        let m = Matcher::compile(&strings(&["!"]), "roll", 2, &[], false).unwrap();
        assert!(m.captures("!roll 1").is_none());
        let caps = m.captures("!roll 1, 6, then some").unwrap();
        assert_eq!(caps.args, vec!["1", "6"]);
        assert_eq!(caps.rest, "then some");
    }

    #[test]
    fn test_no_arguments_requires_word_boundary() {
        let m = Matcher::compile(&strings(&["."]), "hi", 0, &[], false).unwrap();
        assert!(m.is_match(".hi"));
        assert!(m.is_match(".hi everyone"));
        assert!(!m.is_match(".hint"));
        assert!(!m.is_match("hi"));
    }

    #[test]
    fn test_prefix_literals_are_escaped() {
        let m = Matcher::compile(&strings(&[".", "?"]), "help", 0, &[], false).unwrap();
        assert!(m.is_match("?help"));
        assert!(!m.is_match("xhelp"));
    }

    #[test]
    fn test_suffix_and_case() {
        let m = Matcher::compile(&strings(&["!"]), "hug", 1, &strings(&["please"]), true).unwrap();
        let caps = m.captures("!HUG bob please").unwrap();
        assert_eq!(caps.args, vec!["bob"]);
        assert!(!m.is_match("!hug bob"));

        let strict = Matcher::compile(&strings(&["!"]), "hug", 0, &[], false).unwrap();
        assert!(!strict.is_match("!HUG"));
    }
}
