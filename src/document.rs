//! Document snapshots: the stylesheet list, rendered elements, and active
//! font set a scan reads from.
//!
//! A snapshot is either assembled directly with the builder methods or
//! loaded from markup with [`DocumentSnapshot::from_html`] /
//! [`DocumentSnapshot::load_html_file`]. Loading never fetches from the
//! network: stylesheets outside the document origin are recorded as access
//! failures and skipped by the scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::css::{parse_stylesheet, CssRule, FontFaceRule, Stylesheet};
use crate::descriptor::{clean_family_name, has_scheme, resolve_url, split_origin};
use crate::dom::{parse_document, StylesheetRef};
use crate::error::{AccessDeniedReason, ErrorPhase, ScanError, StylesheetAccessDenied};
use crate::filter::UsedFamilies;
use crate::style::{StyleResolver, DEFAULT_MAX_VAR_SUBSTITUTION_BYTES};

/// Hard limits applied while loading a snapshot from markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadLimits {
    /// Maximum document size in bytes.
    pub max_html_bytes: usize,
    /// Maximum bytes for any one stylesheet. Larger sheets are skipped.
    pub max_css_bytes: usize,
    /// Maximum number of elements in the document tree.
    pub max_elements: usize,
    /// Maximum bytes for a single inline `style="..."` attribute.
    pub max_inline_style_bytes: usize,
    /// Maximum number of stylesheets (document plus user sheets).
    pub max_stylesheets: usize,
    /// Maximum bytes one `var()` substitution may expand to. Larger
    /// expansions make the declaration invalid at computed-value time.
    pub max_var_substitution_bytes: usize,
}

impl Default for LoadLimits {
    fn default() -> Self {
        Self {
            max_html_bytes: 8 * 1024 * 1024,
            max_css_bytes: 2 * 1024 * 1024,
            max_elements: 200_000,
            max_inline_style_bytes: 16 * 1024,
            max_stylesheets: 256,
            max_var_substitution_bytes: DEFAULT_MAX_VAR_SUBSTITUTION_BYTES,
        }
    }
}

/// Options for loading a snapshot from markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Byte and count limits.
    pub limits: LoadLimits,
    /// Document origin, e.g. `https://example.com`. Linked stylesheets on
    /// this origin are read from [`LoadOptions::root`]; others are
    /// cross-origin.
    pub origin: Option<String>,
    /// Directory that origin-absolute paths map to. Defaults to the HTML
    /// file's directory.
    pub root: Option<PathBuf>,
    /// Computed `font-family` of the root element when nothing sets one.
    pub default_family: String,
    /// Extra stylesheets appended after the document's own.
    pub user_stylesheets: Vec<PathBuf>,
    /// Derive an active font set from the declared faces.
    pub derive_font_set: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limits: LoadLimits::default(),
            origin: None,
            root: None,
            default_family: "serif".to_string(),
            user_stylesheets: Vec::new(),
            derive_font_set: true,
        }
    }
}

impl LoadOptions {
    /// Set the load limits.
    pub fn with_limits(mut self, limits: LoadLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the document origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the directory that origin-absolute paths map to.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set the root element's fallback family.
    pub fn with_default_family(mut self, family: impl Into<String>) -> Self {
        self.default_family = family.into();
        self
    }

    /// Append a user stylesheet.
    pub fn with_user_stylesheet(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_stylesheets.push(path.into());
        self
    }

    /// Enable or disable deriving the active font set from declared faces.
    pub fn with_derived_font_set(mut self, derive: bool) -> Self {
        self.derive_font_set = derive;
        self
    }
}

/// One stylesheet in document order.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleSheetHandle {
    href: Option<String>,
    disabled: bool,
    rules: Result<Stylesheet, StylesheetAccessDenied>,
}

impl StyleSheetHandle {
    /// Inline `<style>` sheet.
    pub fn inline(css: &str) -> Self {
        Self {
            href: None,
            disabled: false,
            rules: Ok(parse_stylesheet(css)),
        }
    }

    /// Linked sheet whose contents were read.
    pub fn linked(href: impl Into<String>, css: &str) -> Self {
        Self {
            href: Some(href.into()),
            disabled: false,
            rules: Ok(parse_stylesheet(css)),
        }
    }

    /// Sheet whose rule list cannot be read.
    pub fn denied(href: Option<String>, reason: AccessDeniedReason) -> Self {
        Self {
            rules: Err(StylesheetAccessDenied::new(href.clone(), reason)),
            href,
            disabled: false,
        }
    }

    /// Mark the sheet disabled: its rules stay readable but do not apply
    /// to rendered elements.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Whether the sheet is disabled (e.g. an alternate stylesheet).
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Sheet location, `None` for inline sheets.
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// The sheet's rules, or why they cannot be read.
    pub fn css_rules(&self) -> Result<&Stylesheet, &StylesheetAccessDenied> {
        self.rules.as_ref()
    }
}

/// An element of the rendered tree with its computed font list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedElement {
    /// Lowercased tag name.
    pub tag: String,
    /// Computed `font-family`, serialized as `getComputedStyle` reports it.
    pub computed_font_family: String,
}

impl RenderedElement {
    /// Create a rendered element.
    pub fn new(tag: impl Into<String>, computed_font_family: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            computed_font_family: computed_font_family.into(),
        }
    }
}

/// Load state of a live font face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFaceStatus {
    /// Declared but never requested.
    #[default]
    Unloaded,
    /// Fetch in flight.
    Loading,
    /// Available for rendering.
    Loaded,
    /// Fetch or decode failed.
    Error,
}

impl FontFaceStatus {
    /// Status keyword as `FontFace.status` reports it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
        }
    }
}

/// Entry of the document's active font set.
///
/// Deserializes from the objects a browser produces for `document.fonts`
/// (camelCase keys); absent fields take `FontFace` defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveFontFace {
    /// Family name as `FontFace.family` reports it, possibly quoted.
    pub family: String,
    /// `font-style` descriptor.
    pub style: String,
    /// `font-weight` descriptor.
    pub weight: String,
    /// `font-stretch` descriptor.
    pub stretch: String,
    /// `unicode-range` descriptor.
    pub unicode_range: String,
    /// `font-feature-settings` descriptor.
    pub feature_settings: String,
    /// `font-variant` descriptor.
    pub variant: String,
    /// `font-display` descriptor.
    pub display: String,
    /// `ascent-override` descriptor.
    pub ascent_override: String,
    /// `descent-override` descriptor.
    pub descent_override: String,
    /// `line-gap-override` descriptor.
    pub line_gap_override: String,
    /// `size-adjust` descriptor.
    pub size_adjust: String,
    /// Runtime load state.
    pub status: FontFaceStatus,
}

impl Default for LiveFontFace {
    fn default() -> Self {
        Self {
            family: String::new(),
            style: "normal".to_string(),
            weight: "normal".to_string(),
            stretch: "normal".to_string(),
            unicode_range: "U+0-10FFFF".to_string(),
            feature_settings: "normal".to_string(),
            variant: "normal".to_string(),
            display: "auto".to_string(),
            ascent_override: "normal".to_string(),
            descent_override: "normal".to_string(),
            line_gap_override: "normal".to_string(),
            size_adjust: "100%".to_string(),
            status: FontFaceStatus::Unloaded,
        }
    }
}

impl LiveFontFace {
    /// Build the face a browser would register for a declared rule.
    pub fn from_rule(rule: &FontFaceRule, status: FontFaceStatus) -> Self {
        let mut face = Self {
            family: clean_family_name(rule.property_value("font-family")),
            status,
            ..Self::default()
        };
        for (target, name) in [
            (&mut face.style, "font-style"),
            (&mut face.weight, "font-weight"),
            (&mut face.stretch, "font-stretch"),
            (&mut face.unicode_range, "unicode-range"),
            (&mut face.feature_settings, "font-feature-settings"),
            (&mut face.variant, "font-variant"),
            (&mut face.display, "font-display"),
            (&mut face.ascent_override, "ascent-override"),
            (&mut face.descent_override, "descent-override"),
            (&mut face.line_gap_override, "line-gap-override"),
            (&mut face.size_adjust, "size-adjust"),
        ] {
            let value = rule.property_value(name);
            if !value.is_empty() {
                *target = value.to_string();
            }
        }
        face
    }
}

/// Source of linked stylesheet text.
///
/// `path` is the origin-relative location (`/css/site.css`) or, for
/// documents without a rooted URL, a relative one (`css/site.css`).
pub trait StylesheetLoader {
    /// Read the stylesheet at `path`.
    fn load(&self, path: &str) -> Result<String, AccessDeniedReason>;
}

/// Reads stylesheets from a directory on disk.
#[derive(Clone, Debug)]
pub struct FsStylesheetLoader {
    root: PathBuf,
}

impl FsStylesheetLoader {
    /// Create a loader mapping `/` onto `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StylesheetLoader for FsStylesheetLoader {
    fn load(&self, path: &str) -> Result<String, AccessDeniedReason> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let file = self.root.join(path.trim_start_matches('/'));
        std::fs::read_to_string(&file)
            .map_err(|err| AccessDeniedReason::Unreadable(format!("{}: {}", file.display(), err)))
    }
}

impl StylesheetLoader for BTreeMap<String, String> {
    fn load(&self, path: &str) -> Result<String, AccessDeniedReason> {
        self.get(path)
            .cloned()
            .ok_or_else(|| AccessDeniedReason::Unreadable(format!("{}: not found", path)))
    }
}

/// Read-only view of a document for one scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentSnapshot {
    url: Option<String>,
    style_sheets: Vec<StyleSheetHandle>,
    elements: Vec<RenderedElement>,
    font_set: Vec<LiveFontFace>,
}

impl DocumentSnapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document URL used to resolve inline-sheet font URLs.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Append a stylesheet.
    pub fn with_style_sheet(mut self, sheet: StyleSheetHandle) -> Self {
        self.style_sheets.push(sheet);
        self
    }

    /// Append a rendered element.
    pub fn with_element(
        mut self,
        tag: impl Into<String>,
        computed_font_family: impl Into<String>,
    ) -> Self {
        self.elements
            .push(RenderedElement::new(tag, computed_font_family));
        self
    }

    /// Append a face to the active font set.
    pub fn with_live_face(mut self, face: LiveFontFace) -> Self {
        self.font_set.push(face);
        self
    }

    /// Replace the active font set.
    pub fn with_font_set(mut self, faces: Vec<LiveFontFace>) -> Self {
        self.font_set = faces;
        self
    }

    /// Replace the active font set with a JSON array of font faces.
    pub fn with_font_set_json(self, json: &str) -> Result<Self, ScanError> {
        let faces: Vec<LiveFontFace> = serde_json::from_str(json).map_err(|err| {
            ScanError::new(
                ErrorPhase::Parse,
                "FONT_SET_JSON",
                format!("Invalid font set JSON: {}", err),
            )
        })?;
        Ok(self.with_font_set(faces))
    }

    /// Document URL.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Stylesheets in document order.
    pub fn style_sheets(&self) -> &[StyleSheetHandle] {
        &self.style_sheets
    }

    /// Rendered elements in document order.
    pub fn elements(&self) -> &[RenderedElement] {
        &self.elements
    }

    /// Active font set.
    pub fn font_set(&self) -> &[LiveFontFace] {
        &self.font_set
    }

    /// Build a snapshot from markup.
    ///
    /// `url` is the document location (`https://example.com/index.html` or
    /// `/index.html`); linked stylesheet hrefs resolve against it (or
    /// against `<base href>`). Same-origin sheets are read through `loader`.
    pub fn from_html<L>(
        html: &[u8],
        url: Option<&str>,
        loader: &L,
        options: &LoadOptions,
    ) -> Result<Self, ScanError>
    where
        L: StylesheetLoader + ?Sized,
    {
        let limits = &options.limits;
        let doc = parse_document(html, limits)?;

        let sheet_count = doc.stylesheets.len() + options.user_stylesheets.len();
        if sheet_count > limits.max_stylesheets {
            return Err(ScanError::new(
                ErrorPhase::Style,
                "STYLESHEET_LIMIT",
                format!(
                    "Document references too many stylesheets ({} > {})",
                    sheet_count, limits.max_stylesheets
                ),
            )
            .with_limit("max_stylesheets", sheet_count, limits.max_stylesheets));
        }

        let doc_url = url.unwrap_or("");
        let base = match doc.base_href.as_deref() {
            Some(base_href) => resolve_url(doc_url, base_href),
            None => doc_url.to_string(),
        };

        let mut snapshot = Self {
            url: url.map(str::to_string),
            ..Self::default()
        };
        for sheet in &doc.stylesheets {
            let handle = match sheet {
                StylesheetRef::Inline { css } => match check_size(css, limits) {
                    Ok(()) => StyleSheetHandle::inline(css),
                    Err(reason) => StyleSheetHandle::denied(None, reason),
                },
                StylesheetRef::Linked { href, alternate } => {
                    let location = resolve_url(&base, href);
                    load_linked(location, options.origin.as_deref(), loader, limits)
                        .with_disabled(*alternate)
                }
            };
            snapshot.style_sheets.push(handle);
        }
        for path in &options.user_stylesheets {
            let href = path.display().to_string();
            let handle = match std::fs::read_to_string(path) {
                Ok(css) => match check_size(&css, limits) {
                    Ok(()) => StyleSheetHandle::linked(href, &css),
                    Err(reason) => StyleSheetHandle::denied(Some(href), reason),
                },
                Err(err) => StyleSheetHandle::denied(
                    Some(href),
                    AccessDeniedReason::Unreadable(err.to_string()),
                ),
            };
            snapshot.style_sheets.push(handle);
        }

        let readable: Vec<&Stylesheet> = snapshot
            .style_sheets
            .iter()
            .filter(|sheet| !sheet.is_disabled())
            .filter_map(|sheet| sheet.css_rules().ok())
            .collect();
        let families = StyleResolver::new(readable.iter().copied(), options.default_family.as_str())
            .with_var_substitution_limit(limits.max_var_substitution_bytes)
            .computed_font_families(&doc.elements);
        snapshot.elements = doc
            .elements
            .iter()
            .zip(families)
            .map(|(element, family)| RenderedElement::new(element.tag.as_str(), family))
            .collect();

        if options.derive_font_set {
            let used = UsedFamilies::from_elements(&snapshot.elements);
            let mut faces = Vec::with_capacity(8);
            for sheet in &readable {
                collect_all_font_faces(&sheet.rules, &mut faces);
            }
            snapshot.font_set = faces
                .into_iter()
                .map(|rule| {
                    let family = clean_family_name(rule.property_value("font-family"));
                    let status = if !family.is_empty() && used.contains(&family) {
                        FontFaceStatus::Loaded
                    } else {
                        FontFaceStatus::Unloaded
                    };
                    LiveFontFace::from_rule(rule, status)
                })
                .collect();
        }

        log::debug!(
            "Loaded snapshot: {} stylesheets, {} elements, {} live faces",
            snapshot.style_sheets.len(),
            snapshot.elements.len(),
            snapshot.font_set.len()
        );
        Ok(snapshot)
    }

    /// Load a snapshot from an HTML file, reading same-origin stylesheets
    /// from [`LoadOptions::root`] (or the file's directory).
    pub fn load_html_file(path: &Path, options: &LoadOptions) -> Result<Self, ScanError> {
        let html = std::fs::read(path).map_err(|err| {
            ScanError::new(
                ErrorPhase::Load,
                "HTML_READ_ERROR",
                format!("Failed to read document: {}", err),
            )
            .with_path(path.display().to_string())
        })?;
        let root = options
            .root
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let relative = path
            .strip_prefix(&root)
            .ok()
            .or_else(|| path.file_name().map(Path::new))
            .unwrap_or(path);
        let rooted_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!(
            "{}/{}",
            options.origin.as_deref().unwrap_or("").trim_end_matches('/'),
            rooted_path
        );
        let loader = FsStylesheetLoader::new(root);
        Self::from_html(&html, Some(&url), &loader, options)
            .map_err(|err| err.with_path(path.display().to_string()))
    }
}

fn check_size(css: &str, limits: &LoadLimits) -> Result<(), AccessDeniedReason> {
    if css.len() > limits.max_css_bytes {
        return Err(AccessDeniedReason::TooLarge {
            actual: css.len(),
            limit: limits.max_css_bytes,
        });
    }
    Ok(())
}

fn load_linked<L>(
    location: String,
    origin: Option<&str>,
    loader: &L,
    limits: &LoadLimits,
) -> StyleSheetHandle
where
    L: StylesheetLoader + ?Sized,
{
    let path = match same_origin_path(&location, origin) {
        Ok(path) => path,
        Err(reason) => return StyleSheetHandle::denied(Some(location), reason),
    };
    match loader.load(&path).and_then(|css| check_size(&css, limits).map(|()| css)) {
        Ok(css) => StyleSheetHandle::linked(location, &css),
        Err(reason) => StyleSheetHandle::denied(Some(location), reason),
    }
}

/// Loader path for a same-origin location.
fn same_origin_path(location: &str, origin: Option<&str>) -> Result<String, AccessDeniedReason> {
    if !has_scheme(location) {
        return Ok(location.to_string());
    }
    if location
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
    {
        return Err(AccessDeniedReason::Unreadable(
            "data: stylesheets are not decoded".to_string(),
        ));
    }
    let (location_origin, path) = split_origin(location);
    match origin {
        Some(origin) if location_origin.eq_ignore_ascii_case(origin.trim_end_matches('/')) => {
            Ok(if path.is_empty() { "/".to_string() } else { path.to_string() })
        }
        _ => Err(AccessDeniedReason::CrossOrigin),
    }
}

fn collect_all_font_faces<'a>(rules: &'a [CssRule], out: &mut Vec<&'a FontFaceRule>) {
    for rule in rules {
        match rule {
            CssRule::FontFace(face) => out.push(face),
            CssRule::Group(group) => collect_all_font_faces(&group.rules, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheets(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn live_font_face_json_uses_font_face_defaults() {
        let faces: Vec<LiveFontFace> = serde_json::from_str(
            r#"[{"family": "\"Inter\"", "weight": "700", "status": "loaded", "unicodeRange": "U+0-FF"}]"#,
        )
        .expect("json");
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].family, "\"Inter\"");
        assert_eq!(faces[0].weight, "700");
        assert_eq!(faces[0].style, "normal");
        assert_eq!(faces[0].unicode_range, "U+0-FF");
        assert_eq!(faces[0].status, FontFaceStatus::Loaded);
        assert_eq!(faces[0].size_adjust, "100%");
    }

    #[test]
    fn invalid_font_set_json_is_a_parse_error() {
        let err = DocumentSnapshot::new()
            .with_font_set_json("{not json")
            .expect_err("must fail");
        assert_eq!(err.phase, ErrorPhase::Parse);
        assert_eq!(err.code, "FONT_SET_JSON");
    }

    #[test]
    fn from_html_resolves_links_and_marks_cross_origin() {
        let html = br#"<html><head>
            <link rel="stylesheet" href="css/site.css">
            <link rel="stylesheet" href="https://cdn.example.net/fonts.css">
            <style>body { font-family: Local }</style>
        </head><body><p>x</p></body></html>"#;
        let loader = sheets(&[("/css/site.css", "p { font-family: Site }")]);
        let options = LoadOptions::default().with_origin("https://example.com");
        let snapshot = DocumentSnapshot::from_html(
            html,
            Some("https://example.com/index.html"),
            &loader,
            &options,
        )
        .expect("snapshot");

        let sheets = snapshot.style_sheets();
        assert_eq!(sheets.len(), 3);
        assert_eq!(sheets[0].href(), Some("https://example.com/css/site.css"));
        assert!(sheets[0].css_rules().is_ok());
        let denied = sheets[1].css_rules().expect_err("cross-origin");
        assert_eq!(denied.reason, AccessDeniedReason::CrossOrigin);
        assert_eq!(sheets[2].href(), None);

        let p = snapshot
            .elements()
            .iter()
            .find(|e| e.tag == "p")
            .expect("p element");
        assert_eq!(p.computed_font_family, "Site");
    }

    #[test]
    fn missing_and_oversized_sheets_are_denied() {
        let html = br#"<link rel="stylesheet" href="/missing.css"><link rel="stylesheet" href="/big.css">"#;
        let loader = sheets(&[("/big.css", "p { font-family: Big }")]);
        let options = LoadOptions::default().with_limits(LoadLimits {
            max_css_bytes: 4,
            ..LoadLimits::default()
        });
        let snapshot =
            DocumentSnapshot::from_html(html, Some("/index.html"), &loader, &options).expect("snapshot");
        let reasons: Vec<_> = snapshot
            .style_sheets()
            .iter()
            .map(|s| s.css_rules().expect_err("denied").reason.clone())
            .collect();
        assert!(matches!(reasons[0], AccessDeniedReason::Unreadable(_)));
        assert!(matches!(reasons[1], AccessDeniedReason::TooLarge { limit: 4, .. }));
    }

    #[test]
    fn stylesheet_count_limit_is_an_error() {
        let html = br#"<style>a{}</style><style>b{}</style>"#;
        let options = LoadOptions::default().with_limits(LoadLimits {
            max_stylesheets: 1,
            ..LoadLimits::default()
        });
        let err = DocumentSnapshot::from_html(html, None, &BTreeMap::<String, String>::new(), &options)
            .expect_err("limit");
        assert_eq!(err.code, "STYLESHEET_LIMIT");
        assert_eq!(err.limit.as_deref().map(|l| l.actual), Some(2));
    }

    #[test]
    fn var_substitution_limit_comes_from_load_limits() {
        let html = br#"<html><head><style>:root { --face: "Long Family Name" } p { font-family: var(--face) }</style></head><body><p>x</p></body></html>"#;
        let options = LoadOptions::default().with_limits(LoadLimits {
            max_var_substitution_bytes: 8,
            ..LoadLimits::default()
        });
        let snapshot =
            DocumentSnapshot::from_html(html, Some("/"), &BTreeMap::<String, String>::new(), &options)
                .expect("snapshot");
        let p = snapshot.elements().iter().find(|e| e.tag == "p").expect("p");
        assert_eq!(p.computed_font_family, "serif");
    }

    #[test]
    fn derived_font_set_marks_used_families_loaded() {
        let html = br#"<style>
            @font-face { font-family: "Used"; src: url(u.woff2); font-weight: 700 }
            @media screen { @font-face { font-family: Nested; src: url(n.woff2) } }
            body { font-family: Used, serif }
        </style><body><p>x</p></body>"#;
        let snapshot =
            DocumentSnapshot::from_html(html, Some("/"), &BTreeMap::<String, String>::new(), &LoadOptions::default())
                .expect("snapshot");
        let set = snapshot.font_set();
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].family, "Used");
        assert_eq!(set[0].weight, "700");
        assert_eq!(set[0].status, FontFaceStatus::Loaded);
        assert_eq!(set[1].family, "Nested");
        assert_eq!(set[1].status, FontFaceStatus::Unloaded);
    }

    #[test]
    fn same_origin_path_classifies_locations() {
        assert_eq!(same_origin_path("/a.css", None), Ok("/a.css".to_string()));
        assert_eq!(
            same_origin_path("https://Example.com/a.css", Some("https://example.com")),
            Ok("/a.css".to_string())
        );
        assert_eq!(
            same_origin_path("https://other.com/a.css", Some("https://example.com")),
            Err(AccessDeniedReason::CrossOrigin)
        );
        assert_eq!(
            same_origin_path("https://example.com/a.css", None),
            Err(AccessDeniedReason::CrossOrigin)
        );
        assert!(matches!(
            same_origin_path("data:text/css,a{}", None),
            Err(AccessDeniedReason::Unreadable(_))
        ));
    }
}
