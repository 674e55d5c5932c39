//! Enumerate the `@font-face` rules a document declares, keep the ones it
//! actually uses, deduplicate them, and optionally re-render them as CSS.
//!
//! A scan runs over a [`DocumentSnapshot`]: the ordered stylesheet list, the
//! rendered elements with their computed `font-family`, and the active font
//! set. Snapshots can be assembled directly or loaded from an HTML file and
//! its same-origin stylesheets.
//!
//! ```no_run
//! use std::path::Path;
//! use fontface_scan::{DocumentSnapshot, FontScanner, LoadOptions, RenderOptions, ScanOptions};
//!
//! # fn main() -> Result<(), fontface_scan::ScanError> {
//! let snapshot = DocumentSnapshot::load_html_file(Path::new("site/index.html"), &LoadOptions::default())?;
//! let report = FontScanner::new(ScanOptions::default().with_css(RenderOptions::default())).scan(&snapshot);
//! for face in &report.descriptors {
//!     println!("{} {:?}", face.family, face.urls);
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]
#![warn(missing_docs)]

pub mod collect;
pub mod css;
pub mod dedupe;
pub mod descriptor;
pub mod document;
pub mod dom;
pub mod error;
pub mod filter;
pub mod render;
pub mod scan;
pub mod selector;
pub mod style;

pub use collect::{collect_font_face_rules, CollectedRule, CollectedRules};
pub use css::{parse_stylesheet, CssRule, FontFaceRule, Stylesheet};
pub use dedupe::{dedupe, Deduplicator, IdentityKey, IdentityKeyKind};
pub use descriptor::{
    clean_family_name, descriptors_from_json, extract_urls, localize_url, resolve_url,
    DescriptorField, NormalizedFontDescriptor,
};
pub use document::{
    DocumentSnapshot, FontFaceStatus, FsStylesheetLoader, LiveFontFace, LoadLimits, LoadOptions,
    RenderedElement, StyleSheetHandle, StylesheetLoader,
};
pub use error::{AccessDeniedReason, ErrorLimitContext, ErrorPhase, ScanError, StylesheetAccessDenied};
pub use filter::{UsagePolicy, UsedFamilies};
pub use render::{font_format_for_url, render_font_face_css, write_font_face_css, RenderOptions};
pub use scan::{FontScanner, ScanOptions, ScanReport};
