// Pattern compilation: raw find string + match options -> executable matcher.
// Literal and regex modes share one regex-automata meta engine.

use regex_automata::{meta::Regex, util::syntax};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use tracing::debug;

/// Matching options captured from the pattern form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Interpret the pattern as a regular expression
    #[serde(rename = "is_regex")]
    pub use_regex: bool,
    pub case_sensitive: bool,
    /// Only honoured in literal mode
    pub whole_words_only: bool,
}

impl MatchOptions {
    pub fn literal() -> Self {
        Self::default()
    }

    pub fn regex() -> Self {
        Self { use_regex: true, ..Self::default() }
    }

    /// Whether the whole-word constraint takes part in compilation
    pub fn applies_whole_words(&self) -> bool {
        self.whole_words_only && !self.use_regex
    }
}

/// A find pattern bound to its options, rebuilt on every input change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSpec {
    pub pattern: String,
    pub options: MatchOptions,
}

impl SearchSpec {
    pub fn new(pattern: impl Into<String>, options: MatchOptions) -> Self {
        Self { pattern: pattern.into(), options }
    }

    pub fn compile(&self) -> Result<Matcher, PatternError> {
        compile(&self.pattern, self.options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternErrorKind {
    /// Compilation was asked to run on an empty pattern
    EmptyPattern,
    /// Malformed or unsupported regular expression
    InvalidPattern,
}

/// Failure to turn a pattern into a matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternError {
    pub kind: PatternErrorKind,
    pub message: String,
}

impl PatternError {
    fn empty() -> Self {
        Self {
            kind: PatternErrorKind::EmptyPattern,
            message: "pattern is empty".to_string(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: PatternErrorKind::InvalidPattern,
            message: message.into(),
        }
    }
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid pattern: {}", self.message)
    }
}

impl std::error::Error for PatternError {}

/// Compiled, executable form of a pattern
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    expand_captures: bool,
}

/// Compile `pattern` under `options`.
///
/// Matching is always global. Case folding is on unless `case_sensitive`.
/// In literal mode every metacharacter is escaped and `whole_words_only` wraps the
/// literal in word boundaries; in regex mode the pattern is used as written and
/// `whole_words_only` is ignored.
pub fn compile(pattern: &str, options: MatchOptions) -> Result<Matcher, PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::empty());
    }

    let source = if options.use_regex {
        pattern.to_string()
    } else {
        let escaped = regex_syntax::escape(pattern);
        if options.applies_whole_words() {
            format!(r"\b{escaped}\b")
        } else {
            escaped
        }
    };

    let regex = Regex::builder()
        .syntax(syntax::Config::new().case_insensitive(!options.case_sensitive))
        .build(&source)
        .map_err(|e| PatternError::invalid(e.to_string()))?;

    debug!(pattern = %source, ?options, "Compiled matcher");

    Ok(Matcher {
        regex,
        expand_captures: options.use_regex,
    })
}

impl Matcher {
    /// Byte ranges of all non-overlapping matches, left to right
    pub fn find_iter<'a>(&'a self, haystack: &'a str) -> impl Iterator<Item = Range<usize>> + 'a {
        self.regex.find_iter(haystack).map(|m| m.range())
    }

    pub fn count(&self, haystack: &str) -> usize {
        self.regex.find_iter(haystack).count()
    }

    /// Replace every match with `template`, returning the new text and the match count.
    ///
    /// In regex mode `$1`, `${1}`, `${name}` and `$0` refer to capture groups (a missing
    /// group expands to nothing) and `$$` is a literal dollar. An unbraced numbered
    /// reference ends at the first non-digit, so `$1_x` is group 1 then `_x`. In literal
    /// mode the template is inserted verbatim.
    pub fn replace_all(&self, haystack: &str, template: &str) -> (String, usize) {
        let mut out = String::with_capacity(haystack.len());
        let mut last = 0;
        let mut count = 0;

        if self.expand_captures {
            let template = brace_numbered_refs(template);
            for caps in self.regex.captures_iter(haystack) {
                let Some(m) = caps.get_match() else { continue };
                out.push_str(&haystack[last..m.start()]);
                caps.interpolate_string_into(haystack, &template, &mut out);
                last = m.end();
                count += 1;
            }
        } else {
            for m in self.regex.find_iter(haystack) {
                out.push_str(&haystack[last..m.start()]);
                out.push_str(template);
                last = m.end();
                count += 1;
            }
        }

        out.push_str(&haystack[last..]);
        (out, count)
    }
}

/// Rewrite unbraced `$<digits>` as `${<digits>}`. The interpolator otherwise reads
/// the longest run of word characters as the group name (`$1st` would be group "1st").
/// `$$` and existing `${...}` references pass through untouched.
fn brace_numbered_refs(template: &str) -> Cow<'_, str> {
    if !template.contains('$') {
        return Cow::Borrowed(template);
    }

    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len() + 8);
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'$') => i += 2,
            Some(b) if b.is_ascii_digit() => {
                let digits_end = bytes[i + 1..]
                    .iter()
                    .position(|b| !b.is_ascii_digit())
                    .map_or(bytes.len(), |n| i + 1 + n);
                out.push_str(&template[last..i]);
                out.push_str("${");
                out.push_str(&template[i + 1..digits_end]);
                out.push('}');
                last = digits_end;
                i = digits_end;
            }
            _ => i += 1,
        }
    }
    out.push_str(&template[last..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(use_regex: bool, case_sensitive: bool, whole_words_only: bool) -> MatchOptions {
        MatchOptions { use_regex, case_sensitive, whole_words_only }
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let matcher = compile("a.b*(c)", MatchOptions::literal()).unwrap();
        assert_eq!(matcher.count("a.b*(c) axbbc a.b*(c)"), 2);
        assert_eq!(matcher.count("axbbbc"), 0);
    }

    #[test]
    fn test_literal_is_case_insensitive_by_default() {
        let matcher = compile("hello", MatchOptions::literal()).unwrap();
        let ranges: Vec<_> = matcher.find_iter("Hello World, hello world!").collect();
        assert_eq!(ranges, vec![0..5, 13..18]);
    }

    #[test]
    fn test_case_sensitive_literal() {
        let matcher = compile("hello", opts(false, true, false)).unwrap();
        assert_eq!(matcher.count("Hello World, hello world!"), 1);
    }

    #[test]
    fn test_whole_word_constraint() {
        let whole = compile("cat", opts(false, false, true)).unwrap();
        let partial = compile("cat", opts(false, false, false)).unwrap();
        assert_eq!(whole.count("concatenate"), 0);
        assert_eq!(partial.count("concatenate"), 1);
        assert_eq!(whole.count("cat, cat_x and (cat)"), 2);
    }

    #[test]
    fn test_whole_word_ignored_in_regex_mode() {
        let matcher = compile("cat", opts(true, false, true)).unwrap();
        assert_eq!(matcher.count("concatenate"), 1);
    }

    #[test]
    fn test_regex_case_flag() {
        let insensitive = compile("[a-z]+", opts(true, false, false)).unwrap();
        let sensitive = compile("[a-z]+", opts(true, true, false)).unwrap();
        assert_eq!(insensitive.count("ABC"), 1);
        assert_eq!(sensitive.count("ABC"), 0);
    }

    #[test]
    fn test_empty_pattern_is_refused() {
        let err = compile("", MatchOptions::regex()).unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::EmptyPattern);
    }

    #[test]
    fn test_invalid_regex_reports_kind_and_message() {
        let err = compile("(unclosed", MatchOptions::regex()).unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::InvalidPattern);
        assert!(err.to_string().starts_with("Invalid pattern: "));
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_unbalanced_paren_is_fine_as_literal() {
        let matcher = compile("(unclosed", MatchOptions::literal()).unwrap();
        assert_eq!(matcher.count("x (unclosed y"), 1);
    }

    #[test]
    fn test_capture_expansion() {
        let matcher = compile(r"(\w+)@(\w+)", MatchOptions::regex()).unwrap();
        let (out, count) = matcher.replace_all("user@host", "$2$1");
        assert_eq!(out, "hostuser");
        assert_eq!(count, 1);

        let (out, _) = matcher.replace_all("user@host", "${2}.at.${1}");
        assert_eq!(out, "host.at.user");
    }

    #[test]
    fn test_numbered_reference_stops_at_first_non_digit() {
        let matcher = compile(r"(\w+)@(\w+)", MatchOptions::regex()).unwrap();
        assert_eq!(matcher.replace_all("user@host", "$2_$1").0, "host_user");
        assert_eq!(matcher.replace_all("user@host", "$1st").0, "userst");
        assert_eq!(matcher.replace_all("user@host", "$2-$1x$0").0, "host-userxuser@host");
    }

    #[test]
    fn test_dollar_escape_and_named_groups() {
        let matcher = compile(r"(?P<user>\w+)@(\w+)", MatchOptions::regex()).unwrap();
        assert_eq!(matcher.replace_all("user@host", "$$1").0, "$1");
        assert_eq!(matcher.replace_all("user@host", "${user}_$2").0, "user_host");
        assert_eq!(matcher.replace_all("user@host", "cost: $").0, "cost: $");
    }

    #[test]
    fn test_brace_numbered_refs() {
        assert_eq!(brace_numbered_refs("plain"), "plain");
        assert_eq!(brace_numbered_refs("$2_$1"), "${2}_${1}");
        assert_eq!(brace_numbered_refs("$12ab"), "${12}ab");
        assert_eq!(brace_numbered_refs("$$1 ${3}x $name"), "$$1 ${3}x $name");
        assert!(matches!(brace_numbered_refs("no refs"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_empty_width_matches() {
        let matcher = compile("x*", MatchOptions::regex()).unwrap();
        let (out, count) = matcher.replace_all("abc", "-");
        assert_eq!(out, "-a-b-c-");
        assert_eq!(count, 4);
    }

    #[test]
    fn test_missing_group_expands_to_empty() {
        let matcher = compile(r"(\w+)@(\w+)", MatchOptions::regex()).unwrap();
        let (out, _) = matcher.replace_all("user@host", "[$7]");
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_literal_template_is_verbatim() {
        let matcher = compile("x", MatchOptions::literal()).unwrap();
        let (out, count) = matcher.replace_all("axb", "$1.*");
        assert_eq!(out, "a$1.*b");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_spec_compile_matches_free_function() {
        let spec = SearchSpec::new("foo", opts(false, false, true));
        let matcher = spec.compile().unwrap();
        assert_eq!(matcher.count("foo bar foobar"), 1);
        let (out, _) = matcher.replace_all("foo", "$1");
        assert_eq!(out, "$1");
    }

    #[test]
    fn test_options_serialize_with_entity_field_names() {
        let json = serde_json::to_value(opts(true, false, true)).unwrap();
        assert_eq!(json["is_regex"], true);
        assert_eq!(json["case_sensitive"], false);
        assert_eq!(json["whole_words_only"], true);
    }
}
