//! First-seen-wins deduplication of descriptors by identity key.

use std::collections::BTreeSet;

use crate::descriptor::NormalizedFontDescriptor;

/// Fields that make up a descriptor's identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdentityKeyKind {
    /// (family, style, weight).
    #[default]
    FamilyStyleWeight,
    /// (family, style, weight, stretch).
    FamilyStyleWeightStretch,
}

/// Identity of one descriptor. Fields are raw descriptor strings; an absent
/// descriptor is the empty string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey {
    family: String,
    style: String,
    weight: String,
    stretch: Option<String>,
}

impl IdentityKey {
    /// Key of `descriptor` under `kind`.
    pub fn of(descriptor: &NormalizedFontDescriptor, kind: IdentityKeyKind) -> Self {
        Self {
            family: descriptor.family.clone(),
            style: descriptor.style().to_string(),
            weight: descriptor.weight().to_string(),
            stretch: match kind {
                IdentityKeyKind::FamilyStyleWeight => None,
                IdentityKeyKind::FamilyStyleWeightStretch => Some(descriptor.stretch().to_string()),
            },
        }
    }
}

/// Tracks identity keys already emitted.
#[derive(Clone, Debug, Default)]
pub struct Deduplicator {
    kind: IdentityKeyKind,
    seen: BTreeSet<IdentityKey>,
}

impl Deduplicator {
    /// Create an empty deduplicator.
    pub fn new(kind: IdentityKeyKind) -> Self {
        Self {
            kind,
            seen: BTreeSet::new(),
        }
    }

    /// Configured key kind.
    pub fn kind(&self) -> IdentityKeyKind {
        self.kind
    }

    /// Record `descriptor`; `false` when its key was already seen.
    pub fn insert(&mut self, descriptor: &NormalizedFontDescriptor) -> bool {
        let inserted = self.seen.insert(IdentityKey::of(descriptor, self.kind));
        if !inserted {
            log::debug!(
                "Discarding duplicate @font-face '{}' ({} {})",
                descriptor.family,
                descriptor.style(),
                descriptor.weight()
            );
        }
        inserted
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing was inserted yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Keep the first descriptor per identity key, preserving order.
pub fn dedupe<I>(descriptors: I, kind: IdentityKeyKind) -> Vec<NormalizedFontDescriptor>
where
    I: IntoIterator<Item = NormalizedFontDescriptor>,
{
    let mut dedup = Deduplicator::new(kind);
    descriptors
        .into_iter()
        .filter(|descriptor| dedup.insert(descriptor))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::FontFaceRule;

    fn desc(block: &str) -> NormalizedFontDescriptor {
        NormalizedFontDescriptor::from_rule(&FontFaceRule::from_block(block)).expect("descriptor")
    }

    #[test]
    fn first_descriptor_per_key_wins() {
        let out = dedupe(
            vec![
                desc("font-family: Inter; font-weight: 400; src: url(first.woff2)"),
                desc("font-family: 'Inter '; font-weight: 400; src: url(second.woff2)"),
                desc("font-family: Inter; font-weight: 700; src: url(bold.woff2)"),
            ],
            IdentityKeyKind::FamilyStyleWeight,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].urls[0], "first.woff2");
        assert_eq!(out[1].urls[0], "bold.woff2");
    }

    #[test]
    fn stretch_only_splits_keys_when_configured() {
        let input = vec![
            desc("font-family: W; src: url(a.woff2)"),
            desc("font-family: W; font-stretch: condensed; src: url(b.woff2)"),
        ];
        assert_eq!(dedupe(input.clone(), IdentityKeyKind::FamilyStyleWeight).len(), 1);
        assert_eq!(dedupe(input, IdentityKeyKind::FamilyStyleWeightStretch).len(), 2);
    }

    #[test]
    fn keys_compare_raw_strings() {
        let input = vec![
            desc("font-family: B; font-weight: bold; src: url(a.woff2)"),
            desc("font-family: B; font-weight: 700; src: url(b.woff2)"),
            desc("font-family: B; src: url(c.woff2)"),
            desc("font-family: B; font-weight: normal; src: url(d.woff2)"),
        ];
        let mut dedup = Deduplicator::new(IdentityKeyKind::FamilyStyleWeight);
        let kept: Vec<bool> = input.iter().map(|d| dedup.insert(d)).collect();
        assert_eq!(kept, [true, true, true, true]);
        assert_eq!(dedup.len(), 4);
        assert!(!dedup.insert(&input[2]));
    }
}
