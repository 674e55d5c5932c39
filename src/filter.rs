//! Usage and identity filtering of declared font faces.

use std::collections::BTreeSet;

use crate::collect::CollectedRule;
use crate::dedupe::IdentityKeyKind;
use crate::descriptor::clean_family_name;
use crate::document::{LiveFontFace, RenderedElement};

/// Which declared faces count as relevant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UsagePolicy {
    /// Keep a family when some element's computed font list mentions it.
    #[default]
    RenderedUsage,
    /// Keep faces present in the document's active font set.
    LiveFontSet,
    /// Keep every declared face.
    Declared,
}

impl UsagePolicy {
    /// Identity key used when none is configured explicitly.
    pub fn default_identity_key(self) -> IdentityKeyKind {
        match self {
            Self::LiveFontSet => IdentityKeyKind::FamilyStyleWeightStretch,
            Self::RenderedUsage | Self::Declared => IdentityKeyKind::FamilyStyleWeight,
        }
    }
}

/// Distinct computed font lists across the rendered elements.
///
/// Built once per scan; membership stays a substring test against each
/// list, so `Inter` is found in `"Inter Display", sans-serif`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsedFamilies {
    lists: BTreeSet<String>,
}

impl UsedFamilies {
    /// Index the computed font lists of `elements`.
    pub fn from_elements(elements: &[RenderedElement]) -> Self {
        Self {
            lists: elements
                .iter()
                .map(|element| element.computed_font_family.clone())
                .collect(),
        }
    }

    /// Whether any computed font list contains `family`.
    pub fn contains(&self, family: &str) -> bool {
        self.lists.iter().any(|list| list.contains(family))
    }

    /// Number of distinct computed font lists.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Whether no element was indexed.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

/// Collapse live faces sharing (family, style, weight, stretch); first wins.
pub fn dedupe_live_faces(faces: &[LiveFontFace]) -> Vec<&LiveFontFace> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(faces.len());
    for face in faces {
        let key = (
            clean_family_name(&face.family),
            face.style.as_str(),
            face.weight.as_str(),
            face.stretch.as_str(),
        );
        if seen.insert(key) {
            out.push(face);
        } else {
            log::debug!("Skipping duplicate live face '{}'", face.family);
        }
    }
    out
}

/// Declared rule that provides resources for a live face.
///
/// Prefers a rule of the same family whose style, weight and stretch also
/// match (an absent rule descriptor reads as `normal`); otherwise the first
/// rule of that family.
pub fn match_rule_for_face<'r, 'a>(
    face: &LiveFontFace,
    rules: &'r [CollectedRule<'a>],
) -> Option<&'r CollectedRule<'a>> {
    let family = clean_family_name(&face.family);
    if family.is_empty() {
        return None;
    }
    let mut first = None;
    for collected in rules {
        if collected.family != family {
            continue;
        }
        if descriptor_or_normal(collected, "font-style") == face.style
            && descriptor_or_normal(collected, "font-weight") == face.weight
            && descriptor_or_normal(collected, "font-stretch") == face.stretch
        {
            return Some(collected);
        }
        first.get_or_insert(collected);
    }
    first
}

fn descriptor_or_normal<'a>(collected: &CollectedRule<'a>, name: &str) -> &'a str {
    match collected.rule.property_value(name) {
        "" => "normal",
        value => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::FontFaceRule;

    #[test]
    fn used_families_match_substrings_of_distinct_lists() {
        let elements = vec![
            RenderedElement::new("body", "\"Inter Display\", sans-serif"),
            RenderedElement::new("p", "\"Inter Display\", sans-serif"),
            RenderedElement::new("code", "monospace"),
        ];
        let used = UsedFamilies::from_elements(&elements);
        assert_eq!(used.len(), 2);
        assert!(used.contains("Inter"));
        assert!(used.contains("monospace"));
        assert!(!used.contains("Roboto"));
    }

    #[test]
    fn live_faces_dedupe_on_cleaned_family_and_variant() {
        let face = |family: &str, weight: &str| LiveFontFace {
            family: family.to_string(),
            weight: weight.to_string(),
            ..LiveFontFace::default()
        };
        let faces = vec![
            face("\"Inter\"", "400"),
            face("Inter", "400"),
            face("Inter", "700"),
        ];
        let unique = dedupe_live_faces(&faces);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].family, "\"Inter\"");
        assert_eq!(unique[1].weight, "700");
    }

    #[test]
    fn match_prefers_same_variant_then_first_family_rule() {
        let regular = FontFaceRule::from_block("font-family: Inter; src: url(r.woff2)");
        let bold = FontFaceRule::from_block("font-family: 'Inter'; font-weight: 700; src: url(b.woff2)");
        let rules = vec![
            CollectedRule::new(&regular, None),
            CollectedRule::new(&bold, None),
        ];

        let bold_face = LiveFontFace {
            family: "Inter".to_string(),
            weight: "700".to_string(),
            ..LiveFontFace::default()
        };
        let matched = match_rule_for_face(&bold_face, &rules).expect("match");
        assert!(std::ptr::eq(matched.rule, &bold));

        let italic_face = LiveFontFace {
            family: "Inter".to_string(),
            style: "italic".to_string(),
            ..LiveFontFace::default()
        };
        let matched = match_rule_for_face(&italic_face, &rules).expect("fallback");
        assert!(std::ptr::eq(matched.rule, &regular));

        let other = LiveFontFace {
            family: "Other".to_string(),
            ..LiveFontFace::default()
        };
        assert!(match_rule_for_face(&other, &rules).is_none());
    }

    #[test]
    fn live_font_set_defaults_to_stretch_key() {
        assert_eq!(
            UsagePolicy::LiveFontSet.default_identity_key(),
            IdentityKeyKind::FamilyStyleWeightStretch
        );
        assert_eq!(
            UsagePolicy::default().default_identity_key(),
            IdentityKeyKind::FamilyStyleWeight
        );
    }
}
