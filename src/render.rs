//! Re-serialization of descriptors into `@font-face` CSS.

use core::fmt::{self, Write};

use crate::descriptor::{DescriptorField, NormalizedFontDescriptor};

const EXTENDED_FIELDS: [DescriptorField; 10] = [
    DescriptorField::Style,
    DescriptorField::Weight,
    DescriptorField::Stretch,
    DescriptorField::UnicodeRange,
    DescriptorField::FeatureSettings,
    DescriptorField::Display,
    DescriptorField::AscentOverride,
    DescriptorField::DescentOverride,
    DescriptorField::LineGapOverride,
    DescriptorField::SizeAdjust,
];

/// Renderer settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Also emit `font-display` and the metric override descriptors.
    pub extended: bool,
}

impl RenderOptions {
    /// Options emitting the extended descriptor set.
    pub fn extended() -> Self {
        Self { extended: true }
    }

    /// Descriptor lines emitted after `src`, in output order.
    pub fn fields(&self) -> &'static [DescriptorField] {
        if self.extended {
            &EXTENDED_FIELDS
        } else {
            &DescriptorField::RULE_FIELDS
        }
    }
}

/// `format()` keyword implied by a resource's file extension.
///
/// A `?query` or `#fragment` suffix is ignored and extensions match
/// case-insensitively.
pub fn font_format_for_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let (_, ext) = path.rsplit_once('.')?;
    if ext.contains('/') {
        return None;
    }
    match ext.to_ascii_lowercase().as_str() {
        "woff2" => Some("woff2"),
        "woff" => Some("woff"),
        "ttf" => Some("truetype"),
        "otf" => Some("opentype"),
        "eot" => Some("embedded-opentype"),
        "svg" => Some("svg"),
        _ => None,
    }
}

/// Write one `@font-face` block per descriptor, in order.
pub fn write_font_face_css<W: Write>(
    out: &mut W,
    descriptors: &[NormalizedFontDescriptor],
    options: &RenderOptions,
) -> fmt::Result {
    for descriptor in descriptors {
        out.write_str("@font-face {\n")?;
        writeln!(out, "  font-family: \"{}\";", escape_string(&descriptor.family))?;
        if !descriptor.urls.is_empty() {
            out.write_str("  src: ")?;
            for (i, url) in descriptor.urls.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "url(\"{}\")", escape_string(url))?;
                if let Some(format) = font_format_for_url(url) {
                    write!(out, " format(\"{}\")", format)?;
                }
            }
            out.write_str(";\n")?;
        }
        for &field in options.fields() {
            if let Some(value) = descriptor.descriptor(field) {
                writeln!(out, "  {}: {};", field.css_name(), value)?;
            }
        }
        out.write_str("}\n\n")?;
    }
    Ok(())
}

/// Render descriptors into a CSS string.
pub fn render_font_face_css(
    descriptors: &[NormalizedFontDescriptor],
    options: &RenderOptions,
) -> String {
    let mut css = String::with_capacity(descriptors.len() * 160);
    // Writing into a String cannot fail.
    let _ = write_font_face_css(&mut css, descriptors, options);
    css
}

fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::FontFaceRule;

    fn desc(block: &str) -> NormalizedFontDescriptor {
        NormalizedFontDescriptor::from_rule(&FontFaceRule::from_block(block)).expect("descriptor")
    }

    #[test]
    fn renders_src_alternatives_with_formats() {
        let css = render_font_face_css(
            &[desc("font-family: 'Inter'; src: url(a.woff2), url(a.woff); font-weight: 400")],
            &RenderOptions::default(),
        );
        assert_eq!(
            css,
            "@font-face {\n  font-family: \"Inter\";\n  src: url(\"a.woff2\") format(\"woff2\"), url(\"a.woff\") format(\"woff\");\n  font-weight: 400;\n}\n\n"
        );
    }

    #[test]
    fn format_inference_covers_known_extensions() {
        assert_eq!(font_format_for_url("a.ttf"), Some("truetype"));
        assert_eq!(font_format_for_url("a.OTF"), Some("opentype"));
        assert_eq!(font_format_for_url("/f/a.eot?#iefix"), Some("embedded-opentype"));
        assert_eq!(font_format_for_url("icons.svg#icons"), Some("svg"));
        assert_eq!(font_format_for_url("https://cdn.test/font?id=1"), None);
        assert_eq!(font_format_for_url("https://cdn.test.io/font"), None);
        assert_eq!(font_format_for_url("data:font/woff2;base64,AAAA"), None);
    }

    #[test]
    fn unknown_extension_has_no_format_token() {
        let css = render_font_face_css(
            &[desc("font-family: X; src: url(/x.bin)")],
            &RenderOptions::default(),
        );
        assert!(css.contains("  src: url(\"/x.bin\");\n"));
    }

    #[test]
    fn fields_follow_fixed_order_and_extended_set() {
        let d = desc(
            "font-family: X; src: url(x.woff); font-feature-settings: \"liga\" 0; font-display: swap; unicode-range: U+0-FF; font-style: italic",
        );
        let mut with_display = d.clone();
        with_display
            .descriptors
            .insert(DescriptorField::Display, "swap".to_string());
        with_display
            .descriptors
            .insert(DescriptorField::Status, "loaded".to_string());

        let basic = render_font_face_css(&[with_display.clone()], &RenderOptions::default());
        let style_at = basic.find("font-style").expect("style");
        let range_at = basic.find("unicode-range").expect("range");
        let feature_at = basic.find("font-feature-settings").expect("features");
        assert!(style_at < range_at && range_at < feature_at);
        assert!(!basic.contains("font-display"));

        let extended = render_font_face_css(&[with_display], &RenderOptions::extended());
        assert!(extended.contains("  font-display: swap;\n"));
        assert!(!extended.contains("status"));
    }

    #[test]
    fn blocks_keep_input_order() {
        let css = render_font_face_css(
            &[
                desc("font-family: B; src: url(b.woff)"),
                desc("font-family: A; src: url(a.woff)"),
            ],
            &RenderOptions::default(),
        );
        assert!(css.find("\"B\"").expect("B") < css.find("\"A\"").expect("A"));
        assert!(css.ends_with("}\n\n"));
    }
}
