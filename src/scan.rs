//! The scan pipeline: collect, filter, extract, dedupe, render.

use crate::collect::{collect_font_face_rules, CollectedRule};
use crate::dedupe::{Deduplicator, IdentityKeyKind};
use crate::descriptor::{clean_family_name, NormalizedFontDescriptor};
use crate::document::DocumentSnapshot;
use crate::error::StylesheetAccessDenied;
use crate::filter::{dedupe_live_faces, match_rule_for_face, UsagePolicy, UsedFamilies};
use crate::render::{render_font_face_css, RenderOptions};

/// Scan configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Usage policy deciding which declared faces are kept.
    pub policy: UsagePolicy,
    /// Identity key override; `None` uses the policy's default.
    pub identity_key: Option<IdentityKeyKind>,
    /// Render `@font-face` CSS into [`ScanReport::css`].
    pub render_css: bool,
    /// Renderer settings.
    pub render: RenderOptions,
    /// Resolve relative font URLs against their stylesheet (or the document
    /// URL for inline sheets).
    pub resolve_urls: bool,
    /// Rewrite font URLs to `<prefix>/<file name>`, applied after
    /// resolution.
    pub localize_prefix: Option<String>,
}

impl ScanOptions {
    /// Set the usage policy.
    pub fn with_policy(mut self, policy: UsagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the identity key.
    pub fn with_identity_key(mut self, kind: IdentityKeyKind) -> Self {
        self.identity_key = Some(kind);
        self
    }

    /// Render CSS with the given renderer settings.
    pub fn with_css(mut self, render: RenderOptions) -> Self {
        self.render_css = true;
        self.render = render;
        self
    }

    /// Enable or disable URL resolution.
    pub fn with_resolved_urls(mut self, resolve: bool) -> Self {
        self.resolve_urls = resolve;
        self
    }

    /// Rewrite URLs into a local font directory.
    pub fn with_localized_urls(mut self, prefix: impl Into<String>) -> Self {
        self.localize_prefix = Some(prefix.into());
        self
    }

    /// Identity key in effect.
    pub fn effective_identity_key(&self) -> IdentityKeyKind {
        self.identity_key
            .unwrap_or_else(|| self.policy.default_identity_key())
    }
}

/// Result of one scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Deduplicated descriptors in collection order.
    pub descriptors: Vec<NormalizedFontDescriptor>,
    /// Stylesheets whose rules could not be read.
    pub skipped: Vec<StylesheetAccessDenied>,
    /// Rendered CSS when requested.
    pub css: Option<String>,
    /// Number of top-level `@font-face` rules read, or of input descriptors
    /// for [`FontScanner::process_descriptors`].
    pub declared_rules: usize,
}

/// Runs scans over document snapshots.
#[derive(Clone, Debug, Default)]
pub struct FontScanner {
    options: ScanOptions,
}

impl FontScanner {
    /// Create a scanner.
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Scanner configuration.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `snapshot` once.
    pub fn scan(&self, snapshot: &DocumentSnapshot) -> ScanReport {
        let collected = collect_font_face_rules(snapshot.style_sheets());
        let mut dedup = Deduplicator::new(self.options.effective_identity_key());
        let mut descriptors = Vec::with_capacity(collected.rules.len());
        let mut emit = |descriptor: Option<NormalizedFontDescriptor>, from: &CollectedRule<'_>| {
            let Some(mut descriptor) = descriptor else {
                return;
            };
            if dedup.insert(&descriptor) {
                self.finish_urls(&mut descriptor, from.sheet_href.or(snapshot.url()));
                descriptors.push(descriptor);
            }
        };

        match self.options.policy {
            UsagePolicy::RenderedUsage => {
                let used = UsedFamilies::from_elements(snapshot.elements());
                for collected_rule in &collected.rules {
                    if collected_rule.family.is_empty() {
                        continue;
                    }
                    if !used.contains(&collected_rule.family) {
                        log::debug!("Skipping unused family '{}'", collected_rule.family);
                        continue;
                    }
                    emit(
                        NormalizedFontDescriptor::from_rule(collected_rule.rule),
                        collected_rule,
                    );
                }
            }
            UsagePolicy::Declared => {
                for collected_rule in &collected.rules {
                    emit(
                        NormalizedFontDescriptor::from_rule(collected_rule.rule),
                        collected_rule,
                    );
                }
            }
            UsagePolicy::LiveFontSet => {
                for face in dedupe_live_faces(snapshot.font_set()) {
                    match match_rule_for_face(face, &collected.rules) {
                        Some(collected_rule) => emit(
                            NormalizedFontDescriptor::from_live_face(face, collected_rule.rule),
                            collected_rule,
                        ),
                        None => log::debug!("No declared rule for live face '{}'", face.family),
                    }
                }
            }
        }

        let css = self
            .options
            .render_css
            .then(|| render_font_face_css(&descriptors, &self.options.render));
        log::debug!(
            "Scan kept {} of {} declared faces ({} stylesheets skipped)",
            descriptors.len(),
            collected.rules.len(),
            collected.skipped.len()
        );
        ScanReport {
            declared_rules: collected.rules.len(),
            descriptors,
            skipped: collected.skipped,
            css,
        }
    }

    /// Run the stages after extraction over descriptors from an earlier
    /// scan: identity dedupe, URL post-processing and rendering.
    ///
    /// Relative URLs resolve against `base`; without one, only
    /// scheme-relative URLs change (to `https:`). Descriptors without a
    /// family or URLs are dropped. The usage policy is not applied.
    pub fn process_descriptors<I>(&self, descriptors: I, base: Option<&str>) -> ScanReport
    where
        I: IntoIterator<Item = NormalizedFontDescriptor>,
    {
        let mut dedup = Deduplicator::new(self.options.effective_identity_key());
        let mut kept = Vec::new();
        let mut total = 0usize;
        for mut descriptor in descriptors {
            total += 1;
            descriptor.family = clean_family_name(&descriptor.family);
            if descriptor.family.is_empty() || descriptor.urls.is_empty() {
                log::debug!("Dropping descriptor without family or urls");
                continue;
            }
            if dedup.insert(&descriptor) {
                self.finish_urls(&mut descriptor, Some(base.unwrap_or("")));
                kept.push(descriptor);
            }
        }
        let css = self
            .options
            .render_css
            .then(|| render_font_face_css(&kept, &self.options.render));
        ScanReport {
            descriptors: kept,
            skipped: Vec::new(),
            css,
            declared_rules: total,
        }
    }

    fn finish_urls(&self, descriptor: &mut NormalizedFontDescriptor, base: Option<&str>) {
        if self.options.resolve_urls {
            if let Some(base) = base {
                descriptor.resolve_urls(base);
            }
        }
        if let Some(prefix) = self.options.localize_prefix.as_deref() {
            descriptor.localize_urls(prefix);
        }
    }
}
