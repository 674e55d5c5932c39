//! Computed `font-family` resolution.
//!
//! A narrow cascade: only `font-family`, the `font` shorthand and custom
//! properties take part. Origin, `!important`, inline styles, specificity and
//! source order are honoured; `font-family` and custom properties inherit.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::css::{parse_stylesheet, split_unnested, CssRule, DeclarationBlock, Stylesheet};
use crate::dom::Element;
use crate::selector::{Selector, Specificity};

const USER_AGENT_CSS: &str =
    "pre, code, kbd, samp, tt, listing, plaintext, xmp, textarea { font-family: monospace; }";

const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "ui-serif",
    "ui-sans-serif",
    "ui-monospace",
    "ui-rounded",
    "math",
    "emoji",
    "fangsong",
];

const SYSTEM_FONT_KEYWORDS: &[&str] = &[
    "caption",
    "icon",
    "menu",
    "message-box",
    "small-caption",
    "status-bar",
];

const ABSOLUTE_SIZE_KEYWORDS: &[&str] = &[
    "xx-small", "x-small", "small", "medium", "large", "x-large", "xx-large", "xxx-large",
    "larger", "smaller", "math",
];

const MAX_VAR_DEPTH: usize = 16;

/// Default cap on the bytes one `var()` substitution may produce.
pub const DEFAULT_MAX_VAR_SUBSTITUTION_BYTES: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Priority {
    important: bool,
    author: bool,
    inline: bool,
    specificity: Specificity,
    order: usize,
    index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FamilySource {
    Longhand,
    Shorthand,
}

struct CandidateRule<'a> {
    selectors: &'a [Selector],
    declarations: &'a DeclarationBlock,
    author: bool,
}

type CustomProperties = Rc<BTreeMap<String, String>>;

/// Computes each element's `font-family` from a set of stylesheets.
pub struct StyleResolver<'a> {
    user_agent: Stylesheet,
    author: Vec<&'a Stylesheet>,
    default_family: String,
    max_var_bytes: usize,
}

impl<'a> StyleResolver<'a> {
    /// Create a resolver over author stylesheets in cascade order.
    pub fn new<I>(sheets: I, default_family: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = &'a Stylesheet>,
    {
        Self {
            user_agent: parse_stylesheet(USER_AGENT_CSS),
            author: sheets.into_iter().collect(),
            default_family: default_family.into(),
            max_var_bytes: DEFAULT_MAX_VAR_SUBSTITUTION_BYTES,
        }
    }

    /// Cap the output of one `var()` substitution. Values that would grow
    /// past it are invalid at computed-value time and the element inherits.
    pub fn with_var_substitution_limit(mut self, bytes: usize) -> Self {
        self.max_var_bytes = bytes;
        self
    }

    /// Computed `font-family` for every element, aligned with `elements`.
    ///
    /// Values are serialized the way browsers report them: comma-separated,
    /// names with spaces double-quoted, generic families bare.
    pub fn computed_font_families(&self, elements: &[Element]) -> Vec<String> {
        let mut rules = Vec::with_capacity(64);
        collect_candidate_rules(&self.user_agent.rules, false, &mut rules);
        for sheet in &self.author {
            collect_candidate_rules(&sheet.rules, true, &mut rules);
        }

        let root_family = normalize_family_list(&self.default_family);
        let empty: CustomProperties = Rc::new(BTreeMap::new());
        let mut families: Vec<String> = Vec::with_capacity(elements.len());
        let mut customs: Vec<CustomProperties> = Vec::with_capacity(elements.len());
        // Element that defined each element's custom property map, `None`
        // when no ancestor defines any.
        let mut custom_owners: Vec<Option<usize>> = Vec::with_capacity(elements.len());
        let mut substitutions: BTreeMap<(Option<usize>, String), Option<String>> = BTreeMap::new();

        for (index, element) in elements.iter().enumerate() {
            let parent_family = element
                .parent
                .and_then(|p| families.get(p))
                .map(String::as_str)
                .unwrap_or(root_family.as_str());
            let parent_customs = element
                .parent
                .and_then(|p| customs.get(p))
                .unwrap_or(&empty);

            let mut family: Option<(Priority, FamilySource, String)> = None;
            let mut own_customs: BTreeMap<String, (Priority, String)> = BTreeMap::new();

            let mut consider = |decl_name: &str, value: &str, priority: Priority| {
                let source = match decl_name {
                    "font-family" => FamilySource::Longhand,
                    "font" => FamilySource::Shorthand,
                    name if name.starts_with("--") => {
                        match own_customs.get(name) {
                            Some((current, _)) if *current > priority => {}
                            _ => {
                                own_customs.insert(name.to_string(), (priority, value.to_string()));
                            }
                        }
                        return;
                    }
                    _ => return,
                };
                match &family {
                    Some((current, _, _)) if *current > priority => {}
                    _ => family = Some((priority, source, value.to_string())),
                }
            };

            for (order, rule) in rules.iter().enumerate() {
                let specificity = rule
                    .selectors
                    .iter()
                    .filter(|selector| selector.matches(elements, index))
                    .map(Selector::specificity)
                    .max();
                let Some(specificity) = specificity else {
                    continue;
                };
                for (decl_index, decl) in rule.declarations.iter().enumerate() {
                    consider(
                        decl.name.as_str(),
                        decl.value.as_str(),
                        Priority {
                            important: decl.important,
                            author: rule.author,
                            inline: false,
                            specificity,
                            order,
                            index: decl_index,
                        },
                    );
                }
            }
            if let Some(inline) = &element.inline_style {
                for (decl_index, decl) in inline.iter().enumerate() {
                    consider(
                        decl.name.as_str(),
                        decl.value.as_str(),
                        Priority {
                            important: decl.important,
                            author: true,
                            inline: true,
                            specificity: Specificity::default(),
                            order: usize::MAX,
                            index: decl_index,
                        },
                    );
                }
            }

            let (element_customs, owner) = if own_customs.is_empty() {
                let owner = element.parent.and_then(|p| custom_owners.get(p).copied().flatten());
                (Rc::clone(parent_customs), owner)
            } else {
                let mut merged = (**parent_customs).clone();
                for (name, (_, value)) in own_customs {
                    merged.insert(name, value);
                }
                (Rc::new(merged), Some(index))
            };

            let computed = family
                .and_then(|(_, source, value)| {
                    let value = if value.to_ascii_lowercase().contains("var(") {
                        substitutions
                            .entry((owner, value))
                            .or_insert_with_key(|(_, value)| {
                                let mut budget = self.max_var_bytes;
                                let substituted =
                                    substitute_vars(value, &element_customs, 0, &mut budget);
                                if substituted.is_none() {
                                    log::debug!("var() substitution failed for '{}'", value);
                                }
                                substituted
                            })
                            .clone()?
                    } else {
                        value
                    };
                    compute_family(&value, source, parent_family, &root_family)
                })
                .unwrap_or_else(|| parent_family.to_string());

            families.push(computed);
            customs.push(element_customs);
            custom_owners.push(owner);
        }

        families
    }
}

fn collect_candidate_rules<'a>(
    rules: &'a [CssRule],
    author: bool,
    out: &mut Vec<CandidateRule<'a>>,
) {
    for rule in rules {
        match rule {
            CssRule::Style(style) => out.push(CandidateRule {
                selectors: &style.selectors,
                declarations: &style.declarations,
                author,
            }),
            CssRule::Group(group) if group.applies_to_screen() => {
                collect_candidate_rules(&group.rules, author, out);
            }
            _ => {}
        }
    }
}

/// Resolve one cascaded declaration, after `var()` substitution, to a
/// computed value. `None` means the declaration is invalid at computed-value
/// time and the property inherits.
fn compute_family(
    value: &str,
    source: FamilySource,
    parent_family: &str,
    root_family: &str,
) -> Option<String> {
    let value = value.trim();
    let family_text = match source {
        FamilySource::Longhand => value,
        FamilySource::Shorthand => family_from_font_shorthand(value)?,
    };
    match family_text.to_ascii_lowercase().as_str() {
        "inherit" | "unset" | "revert" | "revert-layer" => Some(parent_family.to_string()),
        "initial" => Some(root_family.to_string()),
        _ => {
            let normalized = normalize_family_list(family_text);
            if normalized.is_empty() {
                None
            } else {
                Some(normalized)
            }
        }
    }
}

/// Replace every `var(--name[, fallback])` reference.
///
/// Every call and every literal byte copied is charged to `budget`; the
/// substitution fails once it runs out.
fn substitute_vars(
    value: &str,
    customs: &BTreeMap<String, String>,
    depth: usize,
    budget: &mut usize,
) -> Option<String> {
    *budget = budget.checked_sub(1)?;
    let lower = value.to_ascii_lowercase();
    if !lower.contains("var(") {
        *budget = budget.checked_sub(value.len())?;
        return Some(value.to_string());
    }
    if depth > MAX_VAR_DEPTH {
        log::debug!("var() substitution too deep in '{}'", value);
        return None;
    }
    let mut out = String::with_capacity(value.len());
    let mut pos = 0usize;
    while let Some(rel) = lower[pos..].find("var(") {
        let start = pos + rel;
        let args_start = start + 4;
        let close = closing_paren(value, args_start)?;
        *budget = budget.checked_sub(start - pos)?;
        out.push_str(&value[pos..start]);
        let args = &value[args_start..close];
        let (name, fallback) = match args.find(',') {
            Some(comma) => (args[..comma].trim(), Some(args[comma + 1..].trim())),
            None => (args.trim(), None),
        };
        let replacement = match (customs.get(name), fallback) {
            (Some(custom), _) => substitute_vars(custom, customs, depth + 1, budget)?,
            (None, Some(fallback)) => substitute_vars(fallback, customs, depth + 1, budget)?,
            (None, None) => return None,
        };
        out.push_str(&replacement);
        pos = close + 1;
    }
    *budget = budget.checked_sub(value.len() - pos)?;
    out.push_str(&value[pos..]);
    Some(out)
}

/// Index of the `)` matching an already-consumed `(` whose contents start at
/// `from`.
fn closing_paren(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Family part of a `font` shorthand value.
fn family_from_font_shorthand(value: &str) -> Option<&str> {
    let lower = value.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "inherit" | "initial" | "unset" | "revert" | "revert-layer"
    ) {
        return Some(value);
    }
    if SYSTEM_FONT_KEYWORDS.contains(&lower.as_str()) {
        return None;
    }

    let tokens = top_level_tokens(value);
    for (idx, &(start, end)) in tokens.iter().enumerate() {
        let token = &value[start..end];
        let (size_part, has_line_height) = match token.find('/') {
            Some(slash) => (&token[..slash], true),
            None => (token, false),
        };
        if !is_font_size(size_part) {
            continue;
        }
        let mut family_idx = idx + 1;
        if !has_line_height {
            if let Some(&(s, e)) = tokens.get(family_idx) {
                let next = &value[s..e];
                if next == "/" {
                    family_idx += 2;
                } else if next.starts_with('/') {
                    family_idx += 1;
                }
            }
        }
        let &(family_start, _) = tokens.get(family_idx)?;
        let family = value[family_start..].trim();
        return if family.is_empty() { None } else { Some(family) };
    }
    None
}

fn is_font_size(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    if ABSOLUTE_SIZE_KEYWORDS.contains(&lower.as_str()) {
        return true;
    }
    if ["calc(", "clamp(", "min(", "max(", "var("]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
    {
        return true;
    }
    let numeric_end = lower
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-'))))
        .map(|(i, _)| i)
        .unwrap_or(lower.len());
    if numeric_end == 0 || !lower[..numeric_end].chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let unit = &lower[numeric_end..];
    unit == "%" || (!unit.is_empty() && unit.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Byte ranges of whitespace-separated tokens outside strings and parens.
fn top_level_tokens(value: &str) -> Vec<(usize, usize)> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(8);
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start: Option<usize> = None;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => {
                quote = Some(b);
                start.get_or_insert(i);
            }
            b'(' => {
                depth += 1;
                start.get_or_insert(i);
            }
            b')' => depth = depth.saturating_sub(1),
            b if b.is_ascii_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push((s, i));
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        out.push((s, bytes.len()));
    }
    out
}

/// Serialize a family list the way `getComputedStyle` reports it.
pub(crate) fn normalize_family_list(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for item in split_unnested(value, b',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let quoted = item.len() >= 2
            && ((item.starts_with('"') && item.ends_with('"'))
                || (item.starts_with('\'') && item.ends_with('\'')));
        let name = if quoted {
            item[1..item.len() - 1].to_string()
        } else {
            item.split_whitespace().collect::<Vec<_>>().join(" ")
        };
        if name.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str(", ");
        }
        let is_generic_name = GENERIC_FAMILIES.contains(&name.to_ascii_lowercase().as_str());
        let generic = !quoted && is_generic_name;
        let needs_quotes = !generic
            && ((quoted && is_generic_name)
                || name
                    .chars()
                    .any(|c| !(c.is_alphanumeric() || c == '-' || c == '_'))
                || name.starts_with(|c: char| c.is_ascii_digit()));
        if needs_quotes {
            out.push('"');
            out.push_str(&name.replace('"', "\\\""));
            out.push('"');
        } else {
            out.push_str(&name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LoadLimits;
    use crate::dom::parse_document;

    fn computed(html: &str, css: &str) -> Vec<(String, String)> {
        let doc = parse_document(html.as_bytes(), &LoadLimits::default()).expect("parse");
        let sheet = parse_stylesheet(css);
        let resolver = StyleResolver::new([&sheet], "serif");
        let families = resolver.computed_font_families(&doc.elements);
        doc.elements
            .iter()
            .map(|e| e.tag.clone())
            .zip(families)
            .collect()
    }

    fn family_of(result: &[(String, String)], tag: &str) -> String {
        result
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, f)| f.clone())
            .unwrap_or_else(|| panic!("no <{}> element", tag))
    }

    #[test]
    fn inherits_from_ancestors_and_defaults_at_root() {
        let result = computed(
            "<html><body><main><p>x</p></main></body></html>",
            "body { font-family: 'Inter', sans-serif }",
        );
        assert_eq!(family_of(&result, "html"), "serif");
        assert_eq!(family_of(&result, "p"), "Inter, sans-serif");
    }

    #[test]
    fn specificity_then_order_decide_the_winner() {
        let result = computed(
            r#"<html><body><p class="lead" id="x">a</p><span>b</span></body></html>"#,
            "#x { font-family: IdFont } p.lead { font-family: ClassFont } span { font-family: A } span { font-family: B }",
        );
        assert_eq!(family_of(&result, "p"), "IdFont");
        assert_eq!(family_of(&result, "span"), "B");
    }

    #[test]
    fn important_and_inline_styles_follow_cascade_order() {
        let result = computed(
            r#"<html><body><p style="font-family: Inline">a</p><em style="font-family: Inline">b</em></body></html>"#,
            "p { font-family: Important !important } em { font-family: Normal }",
        );
        assert_eq!(family_of(&result, "p"), "Important");
        assert_eq!(family_of(&result, "em"), "Inline");
    }

    #[test]
    fn font_shorthand_sets_family() {
        let result = computed(
            "<html><body><h1>a</h1><h2>b</h2><h3>c</h3></body></html>",
            r#"h1 { font: italic bold 2rem/1.2 "Playfair Display", serif }
               h2 { font: 16px / 20px Lora }
               h3 { font: menu }"#,
        );
        assert_eq!(family_of(&result, "h1"), "\"Playfair Display\", serif");
        assert_eq!(family_of(&result, "h2"), "Lora");
        assert_eq!(family_of(&result, "h3"), "serif");
    }

    #[test]
    fn custom_properties_resolve_through_inheritance() {
        let result = computed(
            "<html><body><p>a</p><div>b</div></body></html>",
            ":root { --brand: \"Brand Sans\", system-ui } p { font-family: var(--brand) } div { font-family: var(--missing, Fallback) }",
        );
        assert_eq!(family_of(&result, "p"), "\"Brand Sans\", system-ui");
        assert_eq!(family_of(&result, "div"), "Fallback");
    }

    #[test]
    fn unresolvable_var_inherits_parent_family() {
        let result = computed(
            "<html><body><p>a</p></body></html>",
            "body { font-family: Base } p { font-family: var(--nope) }",
        );
        assert_eq!(family_of(&result, "p"), "Base");
    }

    #[test]
    fn runaway_var_expansion_is_invalid_and_inherits() {
        let mut css = String::from("body { font-family: Base } :root { --v0: abcde }");
        for n in 1..=16 {
            css.push_str(&format!(" :root {{ --v{}: var(--v{}) var(--v{}) }}", n, n - 1, n - 1));
        }
        css.push_str(" p { font-family: var(--v16) } em { font-family: var(--v2) }");
        let result = computed("<html><body><p>a</p><p>b</p><em>c</em></body></html>", &css);
        assert_eq!(family_of(&result, "p"), "Base");
        assert_eq!(family_of(&result, "em"), "\"abcde abcde abcde abcde\"");
    }

    #[test]
    fn substitution_limit_is_configurable() {
        let doc = parse_document(b"<html><body><p>a</p></body></html>", &LoadLimits::default())
            .expect("parse");
        let sheet = parse_stylesheet(":root { --brand: \"Brand Sans\" } p { font-family: var(--brand) }");
        let tight = StyleResolver::new([&sheet], "serif")
            .with_var_substitution_limit(4)
            .computed_font_families(&doc.elements);
        assert_eq!(tight.last().map(String::as_str), Some("serif"));
        let roomy = StyleResolver::new([&sheet], "serif").computed_font_families(&doc.elements);
        assert_eq!(roomy.last().map(String::as_str), Some("\"Brand Sans\""));
    }

    #[test]
    fn user_agent_monospace_yields_to_author_rules() {
        let result = computed(
            "<html><body><pre>a</pre><code>b</code></body></html>",
            "code { font-family: Fira Code }",
        );
        assert_eq!(family_of(&result, "pre"), "monospace");
        assert_eq!(family_of(&result, "code"), "\"Fira Code\"");
    }

    #[test]
    fn print_media_rules_are_ignored() {
        let result = computed(
            "<html><body><p>a</p></body></html>",
            "@media print { p { font-family: PrintOnly } } @media (min-width: 1px) { p { font-family: Screen } }",
        );
        assert_eq!(family_of(&result, "p"), "Screen");
    }

    #[test]
    fn normalize_family_list_matches_browser_serialization() {
        assert_eq!(
            normalize_family_list("'Inter' ,  Open   Sans, \"serif\", monospace"),
            "Inter, \"Open Sans\", \"serif\", monospace"
        );
    }
}
