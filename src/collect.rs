//! Collection of declared `@font-face` rules across a document's
//! stylesheets.

use crate::css::FontFaceRule;
use crate::descriptor::clean_family_name;
use crate::document::StyleSheetHandle;
use crate::error::StylesheetAccessDenied;

/// A declared rule together with the sheet it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectedRule<'a> {
    /// The `@font-face` rule.
    pub rule: &'a FontFaceRule,
    /// Location of the owning stylesheet, `None` for inline sheets.
    pub sheet_href: Option<&'a str>,
    /// Cleaned `font-family` value.
    pub family: String,
}

impl<'a> CollectedRule<'a> {
    /// Pair a rule with its sheet location.
    pub fn new(rule: &'a FontFaceRule, sheet_href: Option<&'a str>) -> Self {
        Self {
            family: clean_family_name(rule.property_value("font-family")),
            rule,
            sheet_href,
        }
    }
}

/// Output of [`collect_font_face_rules`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectedRules<'a> {
    /// Rules in stylesheet order, then in-sheet order.
    pub rules: Vec<CollectedRule<'a>>,
    /// Stylesheets whose rules could not be read.
    pub skipped: Vec<StylesheetAccessDenied>,
}

/// Collect top-level `@font-face` rules from `sheets` in order.
///
/// Unreadable stylesheets are logged, recorded in
/// [`CollectedRules::skipped`] and passed over.
pub fn collect_font_face_rules(sheets: &[StyleSheetHandle]) -> CollectedRules<'_> {
    let mut out = CollectedRules::default();
    for sheet in sheets {
        match sheet.css_rules() {
            Ok(stylesheet) => {
                out.rules.extend(
                    stylesheet
                        .font_face_rules()
                        .map(|rule| CollectedRule::new(rule, sheet.href())),
                );
            }
            Err(denied) => {
                log::warn!(
                    "Could not access stylesheet {}: {}",
                    denied.href.as_deref().unwrap_or("<inline>"),
                    denied.reason
                );
                out.skipped.push(denied.clone());
            }
        }
    }
    out
}
