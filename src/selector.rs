//! Static selector matching for computed-style resolution.
//!
//! Supports type, universal, id, class and attribute selectors, all four
//! combinators, and the pseudo-classes that do not depend on interaction
//! state: `:root`, `:is()`/`:where()`/`:not()`, the structural
//! `:*-child`/`:*-of-type` family, and `:link`/`:any-link`. Selectors that
//! depend on dynamic state or target pseudo-elements (`:hover`, `:focus`,
//! `::before`, ...) never match an element.

use smallvec::SmallVec;

use crate::dom::Element;

/// Deepest `:is(:not(...))` nesting parsed; deeper arguments match nothing.
const MAX_SELECTOR_NESTING: usize = 16;

/// Selector specificity as `(ids, classes, types)`.
///
/// Components saturate at `u16::MAX`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity(pub u16, pub u16, pub u16);

impl Specificity {
    const ID: Self = Self(1, 0, 0);
    const CLASS: Self = Self(0, 1, 0);
    const TYPE: Self = Self(0, 0, 1);

    /// Component-wise saturating sum.
    pub fn saturating_add(self, other: Self) -> Self {
        Self(
            self.0.saturating_add(other.0),
            self.1.saturating_add(other.1),
            self.2.saturating_add(other.2),
        )
    }
}

/// Relationship between two compound selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace.
    Descendant,
    /// `>`.
    Child,
    /// `+`.
    NextSibling,
    /// `~`.
    SubsequentSibling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
    ignore_case: bool,
}

impl AttrSelector {
    fn matches(&self, element: &Element) -> bool {
        let Some(actual) = element.attribute(&self.name) else {
            return false;
        };
        let (actual, expected) = if self.ignore_case {
            (actual.to_ascii_lowercase(), self.value.to_ascii_lowercase())
        } else {
            (actual.to_string(), self.value.clone())
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => actual.split_whitespace().any(|v| v == expected),
            AttrOp::DashMatch => {
                actual == expected || actual.starts_with(&format!("{}-", expected))
            }
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

/// Position pattern `an+b` of the structural pseudo-classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Nth {
    a: i64,
    b: i64,
    from_end: bool,
    of_type: bool,
}

impl Nth {
    fn matches(&self, elements: &[Element], index: usize) -> bool {
        let position = sibling_position(elements, index, self.from_end, self.of_type);
        if self.a == 0 {
            return position == self.b;
        }
        let diff = position - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PseudoClass {
    Root,
    Link,
    Nth(Nth),
    Only { of_type: bool },
    /// `:is()` and `:where()`.
    Any(Vec<Selector>),
    Not(Vec<Selector>),
}

impl PseudoClass {
    fn matches(&self, elements: &[Element], index: usize) -> bool {
        let Some(element) = elements.get(index) else {
            return false;
        };
        match self {
            Self::Root => element.parent.is_none() && element.tag == "html",
            Self::Link => {
                matches!(element.tag.as_str(), "a" | "area") && element.attribute("href").is_some()
            }
            Self::Nth(nth) => nth.matches(elements, index),
            Self::Only { of_type } => {
                sibling_position(elements, index, false, *of_type) == 1
                    && sibling_position(elements, index, true, *of_type) == 1
            }
            Self::Any(list) => list.iter().any(|s| s.matches(elements, index)),
            Self::Not(list) => !list.iter().any(|s| s.matches(elements, index)),
        }
    }
}

/// 1-based position among element siblings, counting from the end when
/// `from_end`, and only same-tag siblings when `of_type`.
fn sibling_position(elements: &[Element], index: usize, from_end: bool, of_type: bool) -> i64 {
    let Some(element) = elements.get(index) else {
        return 0;
    };
    let counts = |other: &Element| !of_type || other.tag == element.tag;
    let mut position = 1i64;
    if from_end {
        // Elements are in document order, so the parent's subtree ends at the
        // first element whose parent precedes ours.
        for later in &elements[index + 1..] {
            match (later.parent, element.parent) {
                (Some(p), Some(q)) if p == q => position += i64::from(counts(later)),
                (Some(p), Some(q)) if p < q => break,
                (None, Some(_)) => break,
                (None, None) => position += i64::from(counts(later)),
                _ => {}
            }
        }
    } else {
        let mut cursor = element.prev_sibling;
        while let Some(prev) = cursor.and_then(|i| elements.get(i)) {
            position += i64::from(counts(prev));
            cursor = prev.prev_sibling;
        }
    }
    position
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: SmallVec<[String; 2]>,
    attributes: Vec<AttrSelector>,
    pseudo_classes: Vec<PseudoClass>,
    never: bool,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.pseudo_classes.is_empty()
            && !self.never
    }

    fn matches(&self, elements: &[Element], index: usize) -> bool {
        if self.never {
            return false;
        }
        let Some(element) = elements.get(index) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && *tag != element.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self
            .classes
            .iter()
            .all(|class| element.classes.iter().any(|c| c == class))
        {
            return false;
        }
        self.attributes.iter().all(|attr| attr.matches(element))
            && self
                .pseudo_classes
                .iter()
                .all(|pseudo| pseudo.matches(elements, index))
    }
}

/// One complex selector, e.g. `main > p.lead`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
    specificity: Specificity,
}

impl Selector {
    /// Specificity of this selector.
    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    /// Whether the selector can never match (dynamic or pseudo-element parts).
    pub fn is_static_never(&self) -> bool {
        self.compounds.iter().any(|c| c.never)
    }

    /// Match against `elements[index]`.
    pub fn matches(&self, elements: &[Element], index: usize) -> bool {
        match self.compounds.len() {
            0 => false,
            n => self.match_at(n - 1, elements, index),
        }
    }

    fn match_at(&self, part: usize, elements: &[Element], index: usize) -> bool {
        let Some(element) = elements.get(index) else {
            return false;
        };
        if !self.compounds[part].matches(elements, index) {
            return false;
        }
        if part == 0 {
            return true;
        }
        match self.combinators[part - 1] {
            Combinator::Child => element
                .parent
                .is_some_and(|parent| self.match_at(part - 1, elements, parent)),
            Combinator::Descendant => {
                let mut cursor = element.parent;
                while let Some(ancestor) = cursor {
                    if self.match_at(part - 1, elements, ancestor) {
                        return true;
                    }
                    cursor = elements.get(ancestor).and_then(|e| e.parent);
                }
                false
            }
            Combinator::NextSibling => element
                .prev_sibling
                .is_some_and(|prev| self.match_at(part - 1, elements, prev)),
            Combinator::SubsequentSibling => {
                let mut cursor = element.prev_sibling;
                while let Some(prev) = cursor {
                    if self.match_at(part - 1, elements, prev) {
                        return true;
                    }
                    cursor = elements.get(prev).and_then(|e| e.prev_sibling);
                }
                false
            }
        }
    }
}

/// Parse a comma-separated selector list. Invalid members are dropped.
pub fn parse_selector_list(text: &str) -> Vec<Selector> {
    parse_nested_list(text, 0)
}

fn parse_nested_list(text: &str, depth: usize) -> Vec<Selector> {
    if depth > MAX_SELECTOR_NESTING {
        log::debug!("selector nesting deeper than {} ignored", MAX_SELECTOR_NESTING);
        return Vec::new();
    }
    crate::css::split_unnested(text, b',')
        .into_iter()
        .filter_map(|part| parse_selector(part.trim(), depth))
        .collect()
}

fn parse_selector(text: &str, depth: usize) -> Option<Selector> {
    if text.is_empty() {
        return None;
    }
    let chars: Vec<char> = text.chars().collect();
    let mut compounds = Vec::with_capacity(4);
    let mut combinators = Vec::with_capacity(4);
    let mut current = Compound::default();
    let mut pending: Option<Combinator> = None;
    let mut score = Specificity::default();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() || matches!(c, '>' | '+' | '~') => {
                let explicit = match c {
                    '>' => Some(Combinator::Child),
                    '+' => Some(Combinator::NextSibling),
                    '~' => Some(Combinator::SubsequentSibling),
                    _ => None,
                };
                if !current.is_empty() {
                    compounds.push(core::mem::take(&mut current));
                    pending = Some(Combinator::Descendant);
                }
                if let Some(comb) = explicit {
                    if compounds.is_empty() {
                        return None;
                    }
                    pending = Some(comb);
                }
                i += 1;
                continue;
            }
            _ => {}
        }

        if let Some(comb) = pending.take() {
            combinators.push(comb);
        }

        match c {
            '*' => {
                current.tag.get_or_insert_with(|| "*".to_string());
                i += 1;
            }
            '#' => {
                let (ident, next) = read_ident(&chars, i + 1);
                if ident.is_empty() {
                    return None;
                }
                current.id = Some(ident);
                score = score.saturating_add(Specificity::ID);
                i = next;
            }
            '.' => {
                let (ident, next) = read_ident(&chars, i + 1);
                if ident.is_empty() {
                    return None;
                }
                current.classes.push(ident);
                score = score.saturating_add(Specificity::CLASS);
                i = next;
            }
            '[' => {
                let close = find_char(&chars, i + 1, ']')?;
                let inner: String = chars[i + 1..close].iter().collect();
                match parse_attribute(&inner) {
                    Some(attr) => current.attributes.push(attr),
                    None => current.never = true,
                }
                score = score.saturating_add(Specificity::CLASS);
                i = close + 1;
            }
            ':' => {
                let pseudo_element = chars.get(i + 1) == Some(&':');
                let start = if pseudo_element { i + 2 } else { i + 1 };
                let (ident, mut next) = read_ident(&chars, start);
                let mut args: Option<String> = None;
                if chars.get(next) == Some(&'(') {
                    let end = skip_parens(&chars, next);
                    let inner_end = if end > next + 1 && chars.get(end - 1) == Some(&')') {
                        end - 1
                    } else {
                        end
                    };
                    args = Some(chars[next + 1..inner_end].iter().collect());
                    next = end;
                }
                let ident = ident.to_ascii_lowercase();
                if pseudo_element
                    || matches!(
                        ident.as_str(),
                        "before" | "after" | "first-line" | "first-letter"
                    )
                {
                    score = score.saturating_add(Specificity::TYPE);
                    current.never = true;
                } else {
                    match parse_pseudo_class(&ident, args.as_deref(), depth) {
                        Pseudo::Class(pseudo, specificity) => {
                            current.pseudo_classes.push(pseudo);
                            score = score.saturating_add(specificity);
                        }
                        Pseudo::Stateful => {
                            score = score.saturating_add(Specificity::CLASS);
                            current.never = true;
                        }
                        Pseudo::Invalid => return None,
                    }
                }
                i = next;
            }
            c if is_ident_start(c) => {
                let (ident, next) = read_ident(&chars, i);
                current.tag = Some(ident.to_ascii_lowercase());
                score = score.saturating_add(Specificity::TYPE);
                i = next;
            }
            _ => {
                // Namespaces, nesting selectors and other syntax we do not model.
                current.never = true;
                i += 1;
            }
        }
    }

    if pending.is_some() {
        // Dangling combinator, e.g. `a >`.
        return None;
    }
    if !current.is_empty() {
        compounds.push(current);
    }
    if compounds.is_empty() || combinators.len() + 1 != compounds.len() {
        return None;
    }
    if compounds.iter().any(|c| c.never) {
        log::debug!("selector '{}' depends on state that is not modeled", text);
    }
    Some(Selector {
        compounds,
        combinators,
        specificity: score,
    })
}

enum Pseudo {
    Class(PseudoClass, Specificity),
    /// Depends on interaction or history state; never matches.
    Stateful,
    /// Makes the whole selector invalid.
    Invalid,
}

fn parse_pseudo_class(name: &str, args: Option<&str>, depth: usize) -> Pseudo {
    let nth = |a: i64, b: i64, from_end: bool, of_type: bool| {
        Pseudo::Class(
            PseudoClass::Nth(Nth {
                a,
                b,
                from_end,
                of_type,
            }),
            Specificity::CLASS,
        )
    };
    match (name, args) {
        ("root" | "scope", None) => Pseudo::Class(PseudoClass::Root, Specificity::CLASS),
        ("link" | "any-link" | "-webkit-any-link", None) => {
            Pseudo::Class(PseudoClass::Link, Specificity::CLASS)
        }
        ("first-child", None) => nth(0, 1, false, false),
        ("last-child", None) => nth(0, 1, true, false),
        ("first-of-type", None) => nth(0, 1, false, true),
        ("last-of-type", None) => nth(0, 1, true, true),
        ("only-child", None) => Pseudo::Class(PseudoClass::Only { of_type: false }, Specificity::CLASS),
        ("only-of-type", None) => Pseudo::Class(PseudoClass::Only { of_type: true }, Specificity::CLASS),
        ("nth-child" | "nth-last-child" | "nth-of-type" | "nth-last-of-type", Some(args)) => {
            if args.to_ascii_lowercase().contains(" of ") {
                // `:nth-child(An+B of S)` filtering is not modeled.
                return Pseudo::Stateful;
            }
            match parse_nth(args) {
                Some((a, b)) => nth(a, b, name.contains("-last-"), name.ends_with("-of-type")),
                None => Pseudo::Invalid,
            }
        }
        ("is" | "where" | "matches" | "-webkit-any", Some(args)) => {
            let list = parse_nested_list(args, depth + 1);
            let specificity = if name == "where" {
                Specificity::default()
            } else {
                max_specificity(&list)
            };
            Pseudo::Class(PseudoClass::Any(list), specificity)
        }
        ("not", Some(args)) => {
            let list = parse_nested_list(args, depth + 1);
            if list.is_empty() {
                return Pseudo::Invalid;
            }
            let specificity = max_specificity(&list);
            Pseudo::Class(PseudoClass::Not(list), specificity)
        }
        _ => Pseudo::Stateful,
    }
}

fn max_specificity(list: &[Selector]) -> Specificity {
    list.iter().map(Selector::specificity).max().unwrap_or_default()
}

/// Parse `odd`, `even`, `B`, or `An+B`.
fn parse_nth(text: &str) -> Option<(i64, i64)> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match compact.as_str() {
        "odd" => return Some((2, 1)),
        "even" => return Some((2, 0)),
        _ => {}
    }
    let Some(n) = compact.find('n') else {
        return compact.parse::<i32>().ok().map(|b| (0, i64::from(b)));
    };
    let a = match &compact[..n] {
        "" | "+" => 1,
        "-" => -1,
        coefficient => i64::from(coefficient.parse::<i32>().ok()?),
    };
    let rest = &compact[n + 1..];
    let b = if rest.is_empty() {
        0
    } else if rest.starts_with(['+', '-']) {
        i64::from(rest.parse::<i32>().ok()?)
    } else {
        return None;
    };
    Some((a, b))
}

fn parse_attribute(inner: &str) -> Option<AttrSelector> {
    let inner = inner.trim();
    let ops = [
        ("~=", AttrOp::Includes),
        ("|=", AttrOp::DashMatch),
        ("^=", AttrOp::Prefix),
        ("$=", AttrOp::Suffix),
        ("*=", AttrOp::Substring),
        ("=", AttrOp::Equals),
    ];
    for (token, op) in ops {
        if let Some(idx) = inner.find(token) {
            let name = inner[..idx].trim().to_ascii_lowercase();
            if name.is_empty() || name.contains('|') {
                return None;
            }
            let mut rest = inner[idx + token.len()..].trim();
            let mut ignore_case = false;
            if let Some(stripped) = rest
                .strip_suffix(" i")
                .or_else(|| rest.strip_suffix(" I"))
            {
                rest = stripped.trim_end();
                ignore_case = true;
            } else if let Some(stripped) = rest
                .strip_suffix(" s")
                .or_else(|| rest.strip_suffix(" S"))
            {
                rest = stripped.trim_end();
            }
            let value = rest.trim_matches('"').trim_matches('\'').to_string();
            return Some(AttrSelector {
                name,
                op,
                value,
                ignore_case,
            });
        }
    }
    if inner.is_empty() || inner.contains('|') {
        return None;
    }
    Some(AttrSelector {
        name: inner.to_ascii_lowercase(),
        op: AttrOp::Exists,
        value: String::new(),
        ignore_case: false,
    })
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let mut out = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            if let Some(&escaped) = chars.get(i + 1) {
                out.push(escaped);
                i += 2;
                continue;
            }
            break;
        }
        if c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
            i += 1;
        } else {
            break;
        }
    }
    (out, i)
}

fn find_char(chars: &[char], from: usize, target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, &c) in chars[from.min(chars.len())..].iter().enumerate() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == target => return Some(from + offset),
            None => {}
        }
    }
    None
}

fn skip_parens(chars: &[char], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    chars.len()
}
