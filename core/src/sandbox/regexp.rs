//! `RegExp` values backed by the `regex` crate
//!
//! Patterns are rewritten from JavaScript syntax into the crate's dialect
//! before compiling. Lookaround and backreferences have no counterpart in a
//! linear-time engine and are rejected with a `SyntaxError` when the pattern
//! is created. Match positions handed to programs are char indices.

use std::cell::Cell;
use std::fmt::Write as _;
use std::ops::Range;

use regex::{Captures, Regex, RegexBuilder};

use super::errors::{syntax_error, Control};

/// Flags in the order `flags` reports them
const KNOWN_FLAGS: &str = "dgimsuy";

pub struct RegExpVal {
    /// Pattern text as written (`source`)
    pub source: String,
    pub flags: String,
    regex: Regex,
    /// Char index the next global or sticky `exec` starts from
    pub last_index: Cell<usize>,
}

/// A single match
#[derive(Debug, Clone, PartialEq)]
pub struct RegExpMatch {
    /// Char index of the match
    pub index: usize,
    pub text: String,
    /// Numbered groups from 1; `None` for groups that did not take part
    pub groups: Vec<Option<String>>,
    pub named: Vec<(String, Option<String>)>,
    /// Byte range within the searched string
    pub bytes: Range<usize>,
}

impl RegExpMatch {
    /// A plain substring hit, used by string-pattern `replace`
    pub fn literal(haystack: &str, bytes: Range<usize>) -> Self {
        Self {
            index: haystack[..bytes.start].chars().count(),
            text: haystack[bytes.clone()].to_string(),
            groups: Vec::new(),
            named: Vec::new(),
            bytes,
        }
    }

    /// Char index just past the match
    pub fn end(&self) -> usize {
        self.index + self.text.chars().count()
    }
}

impl RegExpVal {
    pub fn compile(source: &str, flags: &str) -> Result<Self, Control> {
        let mut seen = String::new();
        for c in flags.chars() {
            if !KNOWN_FLAGS.contains(c) || seen.contains(c) {
                return syntax_error(format!("Invalid regular expression flags '{}'", flags));
            }
            seen.push(c);
        }
        let translated = match translate(source) {
            Ok(pattern) => pattern,
            Err(reason) => return invalid(source, &reason),
        };
        let built = RegexBuilder::new(&translated)
            .case_insensitive(seen.contains('i'))
            .multi_line(seen.contains('m'))
            .dot_matches_new_line(seen.contains('s'))
            .build();
        let regex = match built {
            Ok(regex) => regex,
            Err(regex::Error::CompiledTooBig(_)) => return invalid(source, "Regular expression too large"),
            Err(_) => return invalid(source, "Invalid pattern"),
        };
        Ok(Self {
            source: if source.is_empty() { "(?:)".to_string() } else { source.to_string() },
            flags: KNOWN_FLAGS.chars().filter(|c| seen.contains(*c)).collect(),
            regex,
            last_index: Cell::new(0),
        })
    }

    pub fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(flag)
    }

    pub fn global(&self) -> bool {
        self.has_flag('g')
    }

    pub fn sticky(&self) -> bool {
        self.has_flag('y')
    }

    /// First match at or after char index `from`; sticky patterns only match there
    pub fn match_from(&self, haystack: &str, from: usize) -> Option<RegExpMatch> {
        let start = byte_offset(haystack, from)?;
        let caps = self.regex.captures_at(haystack, start)?;
        let found = self.to_match(haystack, &caps)?;
        if self.sticky() && found.bytes.start != start {
            return None;
        }
        Some(found)
    }

    /// `exec`: global and sticky patterns resume from and update `lastIndex`
    pub fn exec(&self, haystack: &str) -> Option<RegExpMatch> {
        if !self.global() && !self.sticky() {
            return self.match_from(haystack, 0);
        }
        let found = self.match_from(haystack, self.last_index.get());
        self.last_index.set(found.as_ref().map_or(0, RegExpMatch::end));
        found
    }

    /// Every non-overlapping match from the start of the string
    pub fn match_all(&self, haystack: &str) -> Vec<RegExpMatch> {
        self.regex
            .captures_iter(haystack)
            .filter_map(|caps| self.to_match(haystack, &caps))
            .collect()
    }

    /// Pieces between matches, with captured groups spliced in (`split`)
    pub fn split(&self, haystack: &str) -> Vec<Option<String>> {
        if haystack.is_empty() {
            return if self.regex.is_match(haystack) {
                Vec::new()
            } else {
                vec![Some(String::new())]
            };
        }
        let mut out = Vec::new();
        let mut last = 0;
        for found in self.match_all(haystack) {
            // empty matches at either end do not split
            if found.bytes.is_empty() && (found.bytes.start == 0 || found.bytes.start >= haystack.len()) {
                continue;
            }
            out.push(Some(haystack[last..found.bytes.start].to_string()));
            out.extend(found.groups);
            last = found.bytes.end;
        }
        out.push(Some(haystack[last..].to_string()));
        out
    }

    fn to_match(&self, haystack: &str, caps: &Captures) -> Option<RegExpMatch> {
        let whole = caps.get(0)?;
        let groups = (1..caps.len())
            .map(|i| caps.get(i).map(|m| m.as_str().to_string()))
            .collect();
        let named = self
            .regex
            .capture_names()
            .flatten()
            .map(|name| (name.to_string(), caps.name(name).map(|m| m.as_str().to_string())))
            .collect();
        Some(RegExpMatch {
            index: haystack[..whole.start()].chars().count(),
            text: whole.as_str().to_string(),
            groups,
            named,
            bytes: whole.range(),
        })
    }
}

fn invalid<T>(source: &str, reason: &str) -> Result<T, Control> {
    syntax_error(format!("Invalid regular expression: /{}/: {}", source, reason))
}

/// Byte offset of char index `chars`, or `None` past the end
fn byte_offset(s: &str, chars: usize) -> Option<usize> {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .nth(chars)
}

/* ===================== Replacement ===================== */

/// Expand `$$`, `$&`, `` $` ``, `$'`, `$n`, `$nn` and `$<name>` in a replacement
pub fn expand_replacement(template: &str, found: &RegExpMatch, haystack: &str) -> String {
    let chars: Vec<char> = template.chars().collect();
    let group_count = found.groups.len();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 == chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '&' => {
                out.push_str(&found.text);
                i += 2;
            }
            '`' => {
                out.push_str(&haystack[..found.bytes.start]);
                i += 2;
            }
            '\'' => {
                out.push_str(&haystack[found.bytes.end..]);
                i += 2;
            }
            '<' if !found.named.is_empty() => {
                let close = chars[i + 2..].iter().position(|&c| c == '>');
                match close {
                    Some(len) => {
                        let name: String = chars[i + 2..i + 2 + len].iter().collect();
                        let value = found
                            .named
                            .iter()
                            .find(|(n, _)| *n == name)
                            .and_then(|(_, v)| v.as_deref());
                        out.push_str(value.unwrap_or(""));
                        i += len + 3;
                    }
                    None => {
                        out.push('$');
                        i += 1;
                    }
                }
            }
            d if d.is_ascii_digit() => {
                let digit = |c: char| c.to_digit(10).map_or(0, |v| v as usize);
                let one = digit(d);
                let two = chars
                    .get(i + 2)
                    .filter(|c| c.is_ascii_digit())
                    .map(|&c| one * 10 + digit(c));
                let (group, width) = match two {
                    Some(n) if n >= 1 && n <= group_count => (n, 3),
                    _ => (one, 2),
                };
                if group >= 1 && group <= group_count {
                    out.push_str(found.groups[group - 1].as_deref().unwrap_or(""));
                    i += width;
                } else {
                    out.push('$');
                    i += 1;
                }
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    out
}

/* ===================== Pattern Translation ===================== */

/// Rewrite a JavaScript pattern into `regex` syntax
fn translate(source: &str) -> Result<String, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 8);
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let (piece, used) = translate_escape(&chars, i + 1, in_class)?;
                out.push_str(&piece);
                i += 1 + used;
                continue;
            }
            '[' if !in_class => {
                let negated = chars.get(i + 1) == Some(&'^');
                let body = if negated { i + 2 } else { i + 1 };
                // `[]` matches nothing and `[^]` matches anything
                if chars.get(body) == Some(&']') {
                    out.push_str(if negated { r"[\s\S]" } else { r"[^\s\S]" });
                    i = body + 1;
                    continue;
                }
                in_class = true;
                out.push_str(if negated { "[^" } else { "[" });
                i = body;
                continue;
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '[' | '&' | '~' if in_class => push_hex(&mut out, c),
            '-' if in_class && double_dash(&chars, i) => push_hex(&mut out, c),
            ']' | '}' if !in_class => push_hex(&mut out, c),
            '{' if !in_class => {
                if !is_quantifier(&chars, i) {
                    push_hex(&mut out, c);
                    i += 1;
                    continue;
                }
                while i < chars.len() {
                    out.push(chars[i]);
                    i += 1;
                    if chars[i - 1] == '}' {
                        break;
                    }
                }
                continue;
            }
            '(' if !in_class && chars.get(i + 1) == Some(&'?') => {
                match (chars.get(i + 2), chars.get(i + 3)) {
                    (Some(':'), _) => out.push_str("(?:"),
                    (Some('='), _) | (Some('!'), _) | (Some('<'), Some('=')) | (Some('<'), Some('!')) => {
                        return Err("Lookaround assertions are not supported".to_string());
                    }
                    (Some('<'), _) => out.push_str("(?P<"),
                    _ => return Err("Invalid group".to_string()),
                }
                i += 3;
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }
    if in_class {
        return Err("Unterminated character class".to_string());
    }
    Ok(out)
}

/// `--` inside a class is a set operator for the crate; JavaScript reads it literally
fn double_dash(chars: &[char], i: usize) -> bool {
    chars.get(i + 1) == Some(&'-') || (i > 0 && chars[i - 1] == '-')
}

/// Whether the `{` at `i` opens a `{n}`, `{n,}` or `{n,m}` quantifier
fn is_quantifier(chars: &[char], i: usize) -> bool {
    let rest: String = chars[i + 1..].iter().take_while(|&&c| c != '}').collect();
    if i + 1 + rest.chars().count() >= chars.len() {
        return false;
    }
    let mut parts = rest.splitn(2, ',');
    let min = parts.next().unwrap_or("");
    let max = parts.next();
    !min.is_empty()
        && min.chars().all(|c| c.is_ascii_digit())
        && max.map_or(true, |m| m.chars().all(|c| c.is_ascii_digit()))
}

/// Translate the escape whose letter sits at `at`; returns the rewritten text
/// and how many pattern chars it used
fn translate_escape(chars: &[char], at: usize, in_class: bool) -> Result<(String, usize), String> {
    let Some(&c) = chars.get(at) else {
        return Err("\\ at end of pattern".to_string());
    };
    let text = |s: &str| -> Result<(String, usize), String> { Ok((s.to_string(), 1)) };
    match c {
        'd' if in_class => text("0-9"),
        'w' if in_class => text("0-9A-Za-z_"),
        'd' => text("[0-9]"),
        'D' => text("[^0-9]"),
        'w' => text("[0-9A-Za-z_]"),
        'W' => text("[^0-9A-Za-z_]"),
        's' | 'S' | 'n' | 'r' | 't' | 'f' | 'v' => text(&format!("\\{}", c)),
        'b' if in_class => text(r"\x08"),
        'b' | 'B' => text(&format!("\\{}", c)),
        '0' if !chars.get(at + 1).is_some_and(char::is_ascii_digit) => text(r"\x00"),
        '1'..='9' => Err("Backreferences are not supported".to_string()),
        'k' if chars.get(at + 1) == Some(&'<') => Err("Backreferences are not supported".to_string()),
        'c' => match chars.get(at + 1) {
            Some(letter) if letter.is_ascii_alphabetic() => {
                let mut out = String::new();
                push_hex(&mut out, char::from(*letter as u8 % 32));
                Ok((out, 2))
            }
            _ => text(r"\\c"),
        },
        'x' => {
            let hex: String = chars.iter().skip(at + 1).take(2).collect();
            match u32::from_str_radix(&hex, 16) {
                Ok(code) if hex.len() == 2 && hex.chars().all(|h| h.is_ascii_hexdigit()) => {
                    Ok((format!("\\x{{{:X}}}", code), 3))
                }
                _ => text("x"),
            }
        }
        'u' => unicode_escape(chars, at),
        'p' | 'P' => {
            let close = chars[at..].iter().position(|&c| c == '}');
            match (chars.get(at + 1), close) {
                (Some('{'), Some(len)) => Ok((format!("\\{}", chars[at..=at + len].iter().collect::<String>()), len + 1)),
                _ => text(&c.to_string()),
            }
        }
        other if other.is_ascii_punctuation() => {
            let mut out = String::new();
            push_hex(&mut out, other);
            Ok((out, 1))
        }
        // identity escapes of ordinary characters
        other => {
            let mut out = String::new();
            push_literal(&mut out, other);
            Ok((out, 1))
        }
    }
}

/// `\uXXXX` and `\u{X...}`
fn unicode_escape(chars: &[char], at: usize) -> Result<(String, usize), String> {
    if chars.get(at + 1) == Some(&'{') {
        let digits: String = chars[at + 2..].iter().take_while(|c| c.is_ascii_hexdigit()).collect();
        if !digits.is_empty() && chars.get(at + 2 + digits.len()) == Some(&'}') {
            let code = u32::from_str_radix(&digits, 16).map_err(|_| "Invalid Unicode escape".to_string())?;
            if char::from_u32(code).is_none() {
                return Err("Invalid Unicode escape".to_string());
            }
            return Ok((format!("\\x{{{:X}}}", code), digits.len() + 3));
        }
        return Ok(("u".to_string(), 1));
    }
    let hex: String = chars.iter().skip(at + 1).take(4).collect();
    match u32::from_str_radix(&hex, 16) {
        Ok(code) if hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()) && char::from_u32(code).is_some() => Ok((format!("\\x{{{:X}}}", code), 5)),
        _ => Ok(("u".to_string(), 1)),
    }
}

fn push_hex(out: &mut String, c: char) {
    let _ = write!(out, "\\x{{{:X}}}", c as u32);
}

fn push_literal(out: &mut String, c: char) {
    if c.is_alphanumeric() || c == '_' {
        out.push(c);
    } else {
        push_hex(out, c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str, flags: &str) -> RegExpVal {
        match RegExpVal::compile(source, flags) {
            Ok(re) => re,
            Err(e) => panic!("Expected /{}/{} to compile, got {:?}", source, flags, e),
        }
    }

    #[test]
    fn test_translate_escapes_and_groups() {
        assert_eq!(translate(r"\d+").unwrap(), "[0-9]+");
        assert_eq!(translate(r"[\d_]").unwrap(), "[0-9_]");
        assert_eq!(translate(r"a\/b").unwrap(), r"a\x{2F}b");
        assert_eq!(translate(r"(?<year>\d{4})").unwrap(), "(?P<year>[0-9]{4})");
        assert_eq!(translate(r"\x41\A").unwrap(), r"\x{41}A");
        assert_eq!(translate("a{").unwrap(), r"a\x{7B}");
        assert_eq!(translate("a{2,}").unwrap(), "a{2,}");
    }

    #[test]
    fn test_unsupported_constructs_are_syntax_errors() {
        for source in [r"(a)\1", "a(?=b)", "a(?!b)", "(?<=a)b", r"(?<x>a)\k<x>", "[a"] {
            let Err(Control::Throw(_)) = RegExpVal::compile(source, "") else {
                panic!("Expected SyntaxError for /{}/", source);
            };
        }
        assert!(RegExpVal::compile("a", "gg").is_err());
        assert!(RegExpVal::compile("a", "x").is_err());
    }

    #[test]
    fn test_flags_are_normalized() {
        let re = compile("a", "yig");
        assert_eq!(re.flags, "giy");
        assert_eq!(compile("", "").source, "(?:)");
    }

    #[test]
    fn test_match_positions_are_char_indices() {
        let re = compile("b", "");
        let found = re.match_from("ééb", 0).unwrap();
        assert_eq!(found.index, 2);
        assert_eq!(found.end(), 3);
    }

    #[test]
    fn test_global_exec_walks_last_index() {
        let re = compile(r"\d", "g");
        assert_eq!(re.exec("a1b2").map(|m| m.text), Some("1".to_string()));
        assert_eq!(re.last_index.get(), 2);
        assert_eq!(re.exec("a1b2").map(|m| m.text), Some("2".to_string()));
        assert_eq!(re.exec("a1b2"), None);
        assert_eq!(re.last_index.get(), 0);
    }

    #[test]
    fn test_sticky_only_matches_at_last_index() {
        let re = compile("a", "y");
        assert!(re.exec("ba").is_none());
        re.last_index.set(1);
        assert!(re.exec("ba").is_some());
    }

    #[test]
    fn test_expand_replacement() {
        let re = compile(r"(?<first>\w+) (\w+)", "");
        let found = re.match_from("ada lovelace!", 0).unwrap();
        let haystack = "ada lovelace!";
        assert_eq!(expand_replacement("$2, $1", &found, haystack), "lovelace, ada");
        assert_eq!(expand_replacement("$<first>|$&|$'|$$|$3", &found, haystack), "ada|ada lovelace|!|$|$3");
    }

    #[test]
    fn test_split_keeps_groups() {
        let re = compile(r"(,)\s*", "");
        let parts: Vec<String> = re.split("a, b,c").into_iter().map(Option::unwrap_or_default).collect();
        assert_eq!(parts, vec!["a", ",", "b", ",", "c"]);
        let chars = compile("", "");
        let parts: Vec<String> = chars.split("abc").into_iter().map(Option::unwrap_or_default).collect();
        assert_eq!(parts, vec!["a", "b", "c"]);
    }
}
