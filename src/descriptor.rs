//! Normalized font descriptors extracted from `@font-face` rules and live
//! font faces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::css::FontFaceRule;
use crate::document::LiveFontFace;
use crate::error::{ErrorPhase, ScanError};

/// Auxiliary descriptor carried by a [`NormalizedFontDescriptor`].
///
/// Variant order is the fixed output order used by the renderer and by JSON
/// serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DescriptorField {
    /// `font-style`.
    #[serde(rename = "font-style")]
    Style,
    /// `font-weight`.
    #[serde(rename = "font-weight")]
    Weight,
    /// `font-stretch`.
    #[serde(rename = "font-stretch")]
    Stretch,
    /// `unicode-range`.
    #[serde(rename = "unicode-range")]
    UnicodeRange,
    /// `font-feature-settings`.
    #[serde(rename = "font-feature-settings")]
    FeatureSettings,
    /// `font-display`.
    #[serde(rename = "font-display")]
    Display,
    /// `ascent-override`.
    #[serde(rename = "ascent-override")]
    AscentOverride,
    /// `descent-override`.
    #[serde(rename = "descent-override")]
    DescentOverride,
    /// `line-gap-override`.
    #[serde(rename = "line-gap-override")]
    LineGapOverride,
    /// `size-adjust`.
    #[serde(rename = "size-adjust")]
    SizeAdjust,
    /// `font-variant`.
    #[serde(rename = "font-variant")]
    Variant,
    /// Runtime load status of a live font face.
    #[serde(rename = "status")]
    Status,
}

impl DescriptorField {
    /// Fields copied from a declared `@font-face` rule.
    pub const RULE_FIELDS: [Self; 5] = [
        Self::Style,
        Self::Weight,
        Self::Stretch,
        Self::UnicodeRange,
        Self::FeatureSettings,
    ];

    /// Descriptor name as written in CSS (or `status` for the runtime field).
    pub fn css_name(self) -> &'static str {
        match self {
            Self::Style => "font-style",
            Self::Weight => "font-weight",
            Self::Stretch => "font-stretch",
            Self::UnicodeRange => "unicode-range",
            Self::FeatureSettings => "font-feature-settings",
            Self::Display => "font-display",
            Self::AscentOverride => "ascent-override",
            Self::DescentOverride => "descent-override",
            Self::LineGapOverride => "line-gap-override",
            Self::SizeAdjust => "size-adjust",
            Self::Variant => "font-variant",
            Self::Status => "status",
        }
    }
}

/// One distinct font variant found by a scan.
///
/// Serializes to a flat JSON object (`font-family`, `urls`, then one key per
/// descriptor) and reads the same shape back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedFontDescriptor {
    /// Family name with surrounding quotes and whitespace removed.
    #[serde(rename = "font-family")]
    pub family: String,
    /// Resource locations from `src`, in order of appearance.
    pub urls: SmallVec<[String; 2]>,
    /// Non-empty auxiliary descriptors.
    #[serde(flatten)]
    pub descriptors: BTreeMap<DescriptorField, String>,
}

impl NormalizedFontDescriptor {
    /// Build a descriptor from a declared rule.
    ///
    /// Returns `None` when the family is empty or `src` holds no `url(...)`.
    pub fn from_rule(rule: &FontFaceRule) -> Option<Self> {
        let family = clean_family_name(rule.property_value("font-family"));
        if family.is_empty() {
            return None;
        }
        let urls = extract_urls(rule.property_value("src"));
        if urls.is_empty() {
            log::debug!("Dropping @font-face for '{}': no url() in src", family);
            return None;
        }
        let mut descriptors = BTreeMap::new();
        for field in DescriptorField::RULE_FIELDS {
            insert_non_empty(&mut descriptors, field, rule.property_value(field.css_name()));
        }
        Some(Self {
            family,
            urls,
            descriptors,
        })
    }

    /// Build a descriptor from a live font face, taking resources from the
    /// declared rule it was paired with.
    pub fn from_live_face(face: &LiveFontFace, rule: &FontFaceRule) -> Option<Self> {
        let family = clean_family_name(&face.family);
        if family.is_empty() {
            return None;
        }
        let urls = extract_urls(rule.property_value("src"));
        if urls.is_empty() {
            log::debug!("Dropping live face '{}': paired rule has no url()", family);
            return None;
        }
        let mut descriptors = BTreeMap::new();
        for (field, value) in [
            (DescriptorField::Style, face.style.as_str()),
            (DescriptorField::Weight, face.weight.as_str()),
            (DescriptorField::Stretch, face.stretch.as_str()),
            (DescriptorField::UnicodeRange, face.unicode_range.as_str()),
            (DescriptorField::FeatureSettings, face.feature_settings.as_str()),
            (DescriptorField::Display, face.display.as_str()),
            (DescriptorField::AscentOverride, face.ascent_override.as_str()),
            (DescriptorField::DescentOverride, face.descent_override.as_str()),
            (DescriptorField::LineGapOverride, face.line_gap_override.as_str()),
            (DescriptorField::SizeAdjust, face.size_adjust.as_str()),
            (DescriptorField::Variant, face.variant.as_str()),
            (DescriptorField::Status, face.status.as_str()),
        ] {
            insert_non_empty(&mut descriptors, field, value);
        }
        Some(Self {
            family,
            urls,
            descriptors,
        })
    }

    /// Descriptor value, if present.
    pub fn descriptor(&self, field: DescriptorField) -> Option<&str> {
        self.descriptors.get(&field).map(String::as_str)
    }

    /// Raw `font-style` value, `""` when absent.
    pub fn style(&self) -> &str {
        self.descriptor(DescriptorField::Style).unwrap_or("")
    }

    /// Raw `font-weight` value, `""` when absent.
    pub fn weight(&self) -> &str {
        self.descriptor(DescriptorField::Weight).unwrap_or("")
    }

    /// Raw `font-stretch` value, `""` when absent.
    pub fn stretch(&self) -> &str {
        self.descriptor(DescriptorField::Stretch).unwrap_or("")
    }

    /// Resolve every relative URL against `base`.
    pub fn resolve_urls(&mut self, base: &str) {
        for url in &mut self.urls {
            *url = resolve_url(base, url);
        }
    }

    /// Point every URL at `prefix/<file name>`.
    pub fn localize_urls(&mut self, prefix: &str) {
        for url in &mut self.urls {
            *url = localize_url(prefix, url);
        }
    }
}

/// Parse a JSON array of descriptors, as printed by a previous scan.
pub fn descriptors_from_json(json: &str) -> Result<Vec<NormalizedFontDescriptor>, ScanError> {
    serde_json::from_str(json).map_err(|err| {
        ScanError::new(
            ErrorPhase::Parse,
            "DESCRIPTOR_JSON",
            format!("Invalid descriptor JSON: {}", err),
        )
    })
}

fn insert_non_empty(
    descriptors: &mut BTreeMap<DescriptorField, String>,
    field: DescriptorField,
    value: &str,
) {
    if !value.is_empty() {
        descriptors.insert(field, value.to_string());
    }
}

/// Strip surrounding whitespace and one pair of surrounding quotes.
///
/// `"Roboto "` and `'Roboto'` both clean to `Roboto`.
pub fn clean_family_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

/// Every location inside a `url(...)` token of a `src` value.
///
/// Matches `url(` case-sensitively, allows one optional quote on each side,
/// and keeps order and duplicates. A token whose body contains a quote or
/// `)` it cannot close over is skipped.
pub fn extract_urls(src: &str) -> SmallVec<[String; 2]> {
    let bytes = src.as_bytes();
    let is_quote = |b: u8| b == b'"' || b == b'\'';
    let mut out = SmallVec::new();
    let mut pos = 0usize;

    while let Some(rel) = src[pos..].find("url(") {
        let start = pos + rel;
        let mut i = start + 4;
        if bytes.get(i).copied().is_some_and(is_quote) {
            i += 1;
        }
        let body_start = i;
        while i < bytes.len() && !matches!(bytes[i], b'"' | b'\'' | b')') {
            i += 1;
        }
        let body_end = i;
        if bytes.get(i).copied().is_some_and(is_quote) {
            i += 1;
        }
        if body_end > body_start && bytes.get(i) == Some(&b')') {
            out.push(src[body_start..body_end].to_string());
            pos = i + 1;
        } else {
            pos = start + 1;
        }
    }
    out
}

/// Resolve `reference` against `base` the way a browser resolves a URL
/// against a stylesheet location.
///
/// Absolute URLs (any scheme, including `data:`) are returned unchanged.
/// Scheme-relative references take the base's scheme, or `https` when the
/// base has none. A base without scheme or leading `/` yields a relative
/// result.
pub fn resolve_url(base: &str, reference: &str) -> String {
    let reference = reference.trim();
    if reference.is_empty() || has_scheme(reference) {
        return reference.to_string();
    }
    if let Some(rest) = reference.strip_prefix("//") {
        let scheme = scheme_of(base).unwrap_or("https");
        return format!("{}://{}", scheme, rest);
    }

    let (origin, base_path) = split_origin(base);
    let base_path = base_path
        .split(['?', '#'])
        .next()
        .unwrap_or(base_path);
    if reference.starts_with('#') || reference.starts_with('?') {
        return format!("{}{}{}", origin, base_path, reference);
    }

    let suffix_at = reference.find(['?', '#']).unwrap_or(reference.len());
    let (ref_path, suffix) = reference.split_at(suffix_at);
    let rooted = !origin.is_empty() || base_path.starts_with('/');
    let mut joined = if ref_path.starts_with('/') {
        normalize_path(ref_path)
    } else {
        let base_dir = base_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        if base_dir.is_empty() {
            normalize_path(ref_path)
        } else {
            normalize_path(&format!("{}/{}", base_dir, ref_path))
        }
    };
    if ref_path.ends_with('/') && !joined.is_empty() {
        joined.push('/');
    }
    if rooted || ref_path.starts_with('/') {
        format!("{}/{}{}", origin, joined, suffix)
    } else {
        format!("{}{}", joined, suffix)
    }
}

/// Rewrite `url` to `prefix/<file name>`, the layout of a locally mirrored
/// font directory. `data:` URLs and URLs without a file name are kept.
pub fn localize_url(prefix: &str, url: &str) -> String {
    if url
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        return url.to_string();
    }
    let (_, path) = split_origin(url);
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.rsplit('/').next() {
        Some(file) if !file.is_empty() => format!("{}/{}", prefix.trim_end_matches('/'), file),
        _ => url.to_string(),
    }
}

pub(crate) fn has_scheme(url: &str) -> bool {
    scheme_of(url).is_some()
}

fn scheme_of(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(scheme)
    } else {
        None
    }
}

/// Split `scheme://host` from the path of a hierarchical URL.
pub(crate) fn split_origin(url: &str) -> (&str, &str) {
    let Some(scheme_end) = url.find("://") else {
        return ("", url);
    };
    let authority_start = scheme_end + 3;
    match url[authority_start..].find(['/', '?', '#']) {
        Some(rel) => url.split_at(authority_start + rel),
        None => (url, ""),
    }
}

fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(8);
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FontFaceStatus;

    fn rule(block: &str) -> FontFaceRule {
        FontFaceRule::from_block(block)
    }

    #[test]
    fn clean_family_name_strips_quotes_and_whitespace() {
        assert_eq!(clean_family_name("\"Roboto \""), "Roboto");
        assert_eq!(clean_family_name("'Roboto'"), "Roboto");
        assert_eq!(clean_family_name("  Open Sans "), "Open Sans");
        assert_eq!(clean_family_name("\"\""), "");
    }

    #[test]
    fn extract_urls_keeps_order_and_duplicates() {
        let urls = extract_urls(
            "url(\"a.woff2\") format(\"woff2\"), url('a.woff'), local(Inter), url(a.woff)",
        );
        assert_eq!(urls.as_slice(), ["a.woff2", "a.woff", "a.woff"]);
    }

    #[test]
    fn extract_urls_skips_malformed_tokens() {
        assert!(extract_urls("url()").is_empty());
        assert!(extract_urls("URL(a.woff)").is_empty());
        assert!(extract_urls("local('Inter')").is_empty());
        assert_eq!(extract_urls("url(x\"y) url(b.ttf)").as_slice(), ["b.ttf"]);
        assert_eq!(
            extract_urls("url(data:font/woff2;base64,AAAA)").as_slice(),
            ["data:font/woff2;base64,AAAA"]
        );
    }

    #[test]
    fn from_rule_copies_only_present_rule_fields() {
        let desc = NormalizedFontDescriptor::from_rule(&rule(
            "font-family: 'Inter'; src: url(/f/inter.woff2); font-weight: 400; font-display: swap",
        ))
        .expect("descriptor");
        assert_eq!(desc.family, "Inter");
        assert_eq!(desc.urls.as_slice(), ["/f/inter.woff2"]);
        assert_eq!(desc.weight(), "400");
        assert_eq!(desc.style(), "");
        assert_eq!(desc.descriptor(DescriptorField::Display), None);
        assert_eq!(desc.descriptors.len(), 1);
    }

    #[test]
    fn from_rule_drops_rules_without_urls_or_family() {
        assert!(NormalizedFontDescriptor::from_rule(&rule("font-family: A; src: local(A)")).is_none());
        assert!(NormalizedFontDescriptor::from_rule(&rule("src: url(a.woff)")).is_none());
    }

    #[test]
    fn from_live_face_carries_runtime_fields() {
        let face = LiveFontFace {
            family: "\"Inter\"".to_string(),
            weight: "700".to_string(),
            display: "swap".to_string(),
            status: FontFaceStatus::Loaded,
            ..LiveFontFace::default()
        };
        let desc = NormalizedFontDescriptor::from_live_face(
            &face,
            &rule("font-family: Inter; src: url(b.woff2)"),
        )
        .expect("descriptor");
        assert_eq!(desc.family, "Inter");
        assert_eq!(desc.weight(), "700");
        assert_eq!(desc.descriptor(DescriptorField::Display), Some("swap"));
        assert_eq!(desc.descriptor(DescriptorField::Status), Some("loaded"));
        assert_eq!(desc.descriptor(DescriptorField::SizeAdjust), Some("100%"));
    }

    #[test]
    fn serializes_with_css_descriptor_names() {
        let desc = NormalizedFontDescriptor::from_rule(&rule(
            "font-family: Inter; src: url(a.woff2); font-style: italic",
        ))
        .expect("descriptor");
        let json = serde_json::to_value(&desc).expect("json");
        assert_eq!(json["font-family"], "Inter");
        assert_eq!(json["urls"][0], "a.woff2");
        assert_eq!(json["font-style"], "italic");
    }

    #[test]
    fn json_output_reads_back_and_renders_the_same_css() {
        let original = vec![
            NormalizedFontDescriptor::from_rule(&rule(
                "font-family: 'Inter'; src: url(a.woff2), url(a.woff); font-weight: 700; unicode-range: U+0-FF",
            ))
            .expect("descriptor"),
            NormalizedFontDescriptor::from_live_face(
                &LiveFontFace {
                    family: "Mono".to_string(),
                    status: FontFaceStatus::Loading,
                    ..LiveFontFace::default()
                },
                &rule("font-family: Mono; src: url(m.ttf)"),
            )
            .expect("descriptor"),
        ];
        let json = serde_json::to_string_pretty(&original).expect("serialize");
        let parsed = descriptors_from_json(&json).expect("deserialize");
        assert_eq!(parsed, original);
        assert_eq!(parsed[1].descriptor(DescriptorField::Status), Some("loading"));

        let options = crate::render::RenderOptions::extended();
        assert_eq!(
            crate::render::render_font_face_css(&parsed, &options),
            crate::render::render_font_face_css(&original, &options)
        );
    }

    #[test]
    fn descriptor_json_errors_are_parse_errors() {
        let err = descriptors_from_json(r#"[{"font-family": "X", "urls": ["a"], "font-colour": "red"}]"#)
            .expect_err("unknown descriptor key");
        assert_eq!(err.phase, ErrorPhase::Parse);
        assert_eq!(err.code, "DESCRIPTOR_JSON");
        assert!(descriptors_from_json("{").is_err());
    }

    #[test]
    fn resolve_url_handles_relative_rooted_and_absolute_references() {
        assert_eq!(resolve_url("/css/site.css", "../fonts/a.woff2"), "/fonts/a.woff2");
        assert_eq!(resolve_url("/css/site.css", "/f/a.woff2"), "/f/a.woff2");
        assert_eq!(
            resolve_url("https://example.com/css/site.css", "b.woff?v=2#x"),
            "https://example.com/css/b.woff?v=2#x"
        );
        assert_eq!(
            resolve_url("https://example.com/css/site.css", "//cdn.test/a.woff"),
            "https://cdn.test/a.woff"
        );
        assert_eq!(resolve_url("css/site.css", "a.woff"), "css/a.woff");
        assert_eq!(resolve_url(&resolve_url("/blog/post.html", "/css/"), "site.css"), "/css/site.css");
        assert_eq!(resolve_url("/index.html", "data:font/woff2;base64,AA"), "data:font/woff2;base64,AA");
    }

    #[test]
    fn localize_url_keeps_only_the_file_name() {
        assert_eq!(
            localize_url("/fonts/", "https://cdn.test/s/inter.woff2?v=3"),
            "/fonts/inter.woff2"
        );
        assert_eq!(localize_url("/fonts", "../f/a.ttf"), "/fonts/a.ttf");
        assert_eq!(localize_url("/fonts", "https://cdn.test/"), "https://cdn.test/");
        assert_eq!(localize_url("/fonts", "data:font/woff2;base64,AA"), "data:font/woff2;base64,AA");
    }

    #[test]
    fn split_origin_separates_authority() {
        assert_eq!(
            split_origin("https://example.com/a/b.css"),
            ("https://example.com", "/a/b.css")
        );
        assert_eq!(split_origin("https://example.com"), ("https://example.com", ""));
        assert_eq!(split_origin("/a/b.css"), ("", "/a/b.css"));
    }
}
