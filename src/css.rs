//! Lenient CSS stylesheet parser.
//!
//! Produces the rule tree the scanner needs: style rules (selectors plus
//! declarations), `@font-face` rules, and grouping at-rules such as `@media`.
//! Like a browser, the parser never fails: malformed constructs are dropped
//! and parsing resumes at the next rule.

use std::borrow::Cow;

use crate::selector::{parse_selector_list, Selector};

/// Parsed stylesheet in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stylesheet {
    /// Top-level rules in source order.
    pub rules: Vec<CssRule>,
}

impl Stylesheet {
    /// Number of top-level rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the stylesheet holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Top-level `@font-face` rules in source order.
    ///
    /// Faces nested in grouping rules are not returned, matching a CSSOM walk
    /// over `sheet.cssRules`.
    pub fn font_face_rules(&self) -> impl Iterator<Item = &FontFaceRule> {
        self.rules.iter().filter_map(|rule| match rule {
            CssRule::FontFace(face) => Some(face),
            _ => None,
        })
    }
}

/// One CSS rule.
#[derive(Clone, Debug, PartialEq)]
pub enum CssRule {
    /// Qualified rule: `selectors { declarations }`.
    Style(StyleRule),
    /// `@font-face { descriptors }`.
    FontFace(FontFaceRule),
    /// Grouping at-rule with nested rules (`@media`, `@supports`, ...).
    Group(GroupRule),
    /// Any other at-rule, kept only for bookkeeping.
    Other(AtRule),
}

/// Qualified style rule.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleRule {
    /// Raw selector text.
    pub selector_text: String,
    /// Parsed selector list.
    pub selectors: Vec<Selector>,
    /// Declaration block.
    pub declarations: DeclarationBlock,
}

/// Declared `@font-face` rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FontFaceRule {
    /// Descriptor declarations in source order.
    pub declarations: DeclarationBlock,
}

impl FontFaceRule {
    /// Build a rule from descriptor block text (without braces).
    ///
    /// `!important` is invalid in descriptor blocks, so such declarations
    /// are dropped.
    pub fn from_block(block: &str) -> Self {
        let mut declarations = DeclarationBlock::parse(block);
        declarations.declarations.retain(|decl| !decl.important);
        Self { declarations }
    }

    /// Descriptor value with `getPropertyValue` semantics, `""` when absent.
    pub fn property_value(&self, name: &str) -> &str {
        self.declarations.property_value(name)
    }
}

/// Grouping at-rule.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupRule {
    /// Lowercased at-keyword without `@`.
    pub keyword: String,
    /// Raw prelude, e.g. the media query list.
    pub prelude: String,
    /// Nested rules.
    pub rules: Vec<CssRule>,
}

impl GroupRule {
    /// Whether nested style rules apply to a screen rendering.
    ///
    /// Media features are not evaluated; only the media type is checked.
    pub fn applies_to_screen(&self) -> bool {
        if self.keyword != "media" {
            return true;
        }
        let prelude = self.prelude.to_ascii_lowercase();
        if prelude.trim().is_empty() {
            return true;
        }
        split_unnested(&prelude, b',').into_iter().any(|query| {
            let query = query.trim();
            let query = query.strip_prefix("only ").unwrap_or(query).trim_start();
            !(query.starts_with("print")
                || query.starts_with("speech")
                || query.starts_with("not screen")
                || query.starts_with("not all"))
        })
    }
}

/// Non-grouping at-rule such as `@import` or `@keyframes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtRule {
    /// Lowercased at-keyword without `@`.
    pub keyword: String,
    /// Raw prelude.
    pub prelude: String,
}

/// Single `name: value` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Property name; lowercased unless it is a custom property.
    pub name: String,
    /// Trimmed value without `!important`.
    pub value: String,
    /// Whether the declaration carried `!important`.
    pub important: bool,
}

/// Ordered declaration block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclarationBlock {
    declarations: Vec<Declaration>,
}

impl DeclarationBlock {
    /// Parse block text (the part between braces, or a `style` attribute).
    pub fn parse(block: &str) -> Self {
        let mut declarations = Vec::with_capacity(8);
        for raw in split_unnested(block, b';') {
            if raw.contains('{') {
                // Nested rule inside a declaration block.
                continue;
            }
            let Some(colon) = raw.find(':') else {
                continue;
            };
            let name = raw[..colon].trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                continue;
            }
            let name = if name.starts_with("--") {
                name.to_string()
            } else {
                name.to_ascii_lowercase()
            };
            let (value, important) = split_important(raw[colon + 1..].trim());
            if value.is_empty() {
                continue;
            }
            declarations.push(Declaration {
                name,
                value: value.to_string(),
                important,
            });
        }
        Self { declarations }
    }

    /// Iterate declarations in source order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Whether the block holds no declarations.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Winning value for `name`, `""` when absent.
    ///
    /// The last `!important` declaration wins over normal ones; otherwise the
    /// last declaration wins.
    pub fn property_value(&self, name: &str) -> &str {
        let mut winner: Option<&Declaration> = None;
        for decl in self.declarations.iter().filter(|d| d.name == name) {
            match winner {
                Some(current) if current.important && !decl.important => {}
                _ => winner = Some(decl),
            }
        }
        winner.map(|d| d.value.as_str()).unwrap_or("")
    }
}

/// Parse stylesheet text into rules.
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    let stripped = strip_comments(css);
    Stylesheet {
        rules: parse_rule_list(&stripped),
    }
}

fn parse_rule_list(text: &str) -> Vec<CssRule> {
    let bytes = text.as_bytes();
    let mut rules = Vec::with_capacity(8);
    let mut pos = 0usize;

    loop {
        pos = skip_junk(text, pos);
        if pos >= bytes.len() {
            break;
        }

        if bytes[pos] == b'@' {
            let kw_start = pos + 1;
            let mut kw_end = kw_start;
            while kw_end < bytes.len() && is_ident_byte(bytes[kw_end]) {
                kw_end += 1;
            }
            let keyword = text[kw_start..kw_end].to_ascii_lowercase();
            let Some(stop) = find_unnested(bytes, kw_end, |b| b == b'{' || b == b';') else {
                break;
            };
            let prelude = text[kw_end..stop].trim().to_string();
            if bytes[stop] == b';' {
                rules.push(CssRule::Other(AtRule { keyword, prelude }));
                pos = stop + 1;
                continue;
            }
            let close = matching_brace(bytes, stop);
            let body = &text[stop + 1..close];
            let rule = match keyword.as_str() {
                "font-face" => CssRule::FontFace(FontFaceRule::from_block(body)),
                "media" | "supports" | "layer" | "container" | "document" | "-moz-document" => {
                    CssRule::Group(GroupRule {
                        keyword,
                        prelude,
                        rules: parse_rule_list(body),
                    })
                }
                _ => CssRule::Other(AtRule { keyword, prelude }),
            };
            rules.push(rule);
            pos = close + 1;
            continue;
        }

        let Some(open) = find_unnested(bytes, pos, |b| b == b'{') else {
            break;
        };
        let close = matching_brace(bytes, open);
        let selector_text = text[pos..open].trim().to_string();
        let body = &text[open + 1..close];
        let selectors = parse_selector_list(&selector_text);
        if selectors.is_empty() {
            log::debug!("dropping style rule with unparsable selector '{}'", selector_text);
        } else {
            rules.push(CssRule::Style(StyleRule {
                selector_text,
                selectors,
                declarations: DeclarationBlock::parse(body),
            }));
        }
        pos = close + 1;
    }

    rules
}

/// Replace `/* ... */` comments outside strings with a single space.
pub(crate) fn strip_comments(css: &str) -> Cow<'_, str> {
    if !css.contains("/*") {
        return Cow::Borrowed(css);
    }
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len());
    let mut copy_from = 0usize;
    let mut i = 0usize;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'"' || b == b'\'' {
            quote = Some(b);
            i += 1;
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            out.push_str(&css[copy_from..i]);
            out.push(' ');
            let end = css[i + 2..]
                .find("*/")
                .map(|rel| i + 2 + rel + 2)
                .unwrap_or(bytes.len());
            i = end;
            copy_from = end;
            continue;
        }
        i += 1;
    }
    if copy_from < bytes.len() {
        out.push_str(&css[copy_from..]);
    }
    Cow::Owned(out)
}

/// Split on `sep` outside strings, parentheses, brackets and braces.
pub(crate) fn split_unnested(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(4);
    let mut start = 0usize;
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ if b == sep && depth == 0 => {
                    out.push(&text[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    if start <= bytes.len() {
        let tail = &text[start..];
        if !tail.trim().is_empty() || out.is_empty() {
            out.push(tail);
        }
    }
    out
}

fn split_important(value: &str) -> (&str, bool) {
    if let Some(bang) = value.rfind('!') {
        if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
            return (value[..bang].trim_end(), true);
        }
    }
    (value, false)
}

fn skip_junk(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() || bytes[pos] == b';' || bytes[pos] == b'}' {
            pos += 1;
        } else if text[pos..].starts_with("<!--") {
            pos += 4;
        } else if text[pos..].starts_with("-->") {
            pos += 3;
        } else {
            break;
        }
    }
    pos
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn find_unnested(bytes: &[u8], from: usize, stop: impl Fn(u8) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else if b == b'"' || b == b'\'' {
            quote = Some(b);
        } else if b == b'(' || b == b'[' {
            depth += 1;
        } else if b == b')' || b == b']' {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && stop(b) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Index of the `}` closing the block opened at `open`, or the input length
/// for an unterminated block.
fn matching_brace(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return i;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    bytes.len()
}
