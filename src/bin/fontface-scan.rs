use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use fontface_scan::{
    descriptors_from_json, DocumentSnapshot, FontScanner, IdentityKeyKind, LoadOptions,
    RenderOptions, ScanOptions, ScanReport, UsagePolicy,
};

/// Enumerate the @font-face rules an HTML document uses.
#[derive(Debug, Clone, Parser)]
#[clap(name = "fontface-scan", version, about)]
struct Cli {
    /// HTML document to scan.
    #[clap(value_name = "HTML", required_unless_present = "descriptors")]
    html: Option<PathBuf>,

    /// JSON descriptor list from an earlier run; skips loading a document
    /// and only dedupes, rewrites URLs and renders. Relative URLs resolve
    /// against --origin.
    #[clap(long = "descriptors", value_name = "JSON", conflicts_with_all = ["html", "font_set"])]
    descriptors: Option<PathBuf>,

    /// Which declared faces to keep.
    #[clap(long = "policy", value_enum, default_value = "rendered-usage")]
    policy: PolicyArg,

    /// Identity key for deduplication (default depends on the policy).
    #[clap(long = "key", value_enum)]
    key: Option<KeyArg>,

    /// JSON array of captured `document.fonts` entries; replaces the
    /// font set derived from declared faces.
    #[clap(long = "font-set", value_name = "JSON")]
    font_set: Option<PathBuf>,

    /// Document origin, e.g. https://example.com. Stylesheets on other
    /// origins are skipped.
    #[clap(long = "origin", env = "FONTFACE_SCAN_ORIGIN", value_name = "URL")]
    origin: Option<String>,

    /// Directory that origin-absolute paths map to (default: the HTML
    /// file's directory).
    #[clap(long = "root", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Extra stylesheet appended after the document's own.
    #[clap(long = "stylesheet", value_name = "CSS", action = ArgAction::Append)]
    stylesheets: Vec<PathBuf>,

    /// Emit generated @font-face CSS.
    #[clap(long)]
    css: bool,

    /// Emit descriptor JSON (the default when --css is not given).
    #[clap(long)]
    json: bool,

    /// Also emit font-display and metric override descriptors in CSS.
    #[clap(long)]
    extended: bool,

    /// Resolve relative font URLs against their stylesheet.
    #[clap(long = "resolve-urls")]
    resolve_urls: bool,

    /// Rewrite font URLs to <PREFIX>/<file name>.
    #[clap(long = "localize", value_name = "PREFIX")]
    localize: Option<String>,

    /// Computed font-family of the root element.
    #[clap(long = "default-family", value_name = "NAME", default_value = "serif")]
    default_family: String,

    /// Raise log verbosity (-v debug, -vv trace).
    #[clap(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum PolicyArg {
    /// Families referenced by some element's computed font list.
    RenderedUsage,
    /// Faces in the active font set.
    LiveFontSet,
    /// Every declared face.
    Declared,
}

impl From<PolicyArg> for UsagePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::RenderedUsage => Self::RenderedUsage,
            PolicyArg::LiveFontSet => Self::LiveFontSet,
            PolicyArg::Declared => Self::Declared,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum KeyArg {
    /// (family, style, weight).
    FamilyStyleWeight,
    /// (family, style, weight, stretch).
    FamilyStyleWeightStretch,
}

impl From<KeyArg> for IdentityKeyKind {
    fn from(arg: KeyArg) -> Self {
        match arg {
            KeyArg::FamilyStyleWeight => Self::FamilyStyleWeight,
            KeyArg::FamilyStyleWeightStretch => Self::FamilyStyleWeightStretch,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli, &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    use log::LevelFilter::*;

    let level = match verbose {
        0 => Warn,
        1 => Debug,
        _ => Trace,
    };
    let _ = env_logger::builder()
        .filter_module("fontface_scan", level)
        .parse_default_env()
        .try_init();
}

fn run<W: Write>(cli: Cli, out: &mut W) -> Result<(), String> {
    let mut options = ScanOptions::default()
        .with_policy(cli.policy.into())
        .with_resolved_urls(cli.resolve_urls);
    if let Some(key) = cli.key {
        options = options.with_identity_key(key.into());
    }
    if let Some(prefix) = cli.localize.as_deref() {
        options = options.with_localized_urls(prefix);
    }
    if cli.css {
        options = options.with_css(RenderOptions {
            extended: cli.extended,
        });
    }
    let scanner = FontScanner::new(options);

    let report = match (cli.descriptors.as_ref(), cli.html.as_ref()) {
        (Some(path), _) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
            let descriptors =
                descriptors_from_json(&json).map_err(|e| format!("{} ({})", e, path.display()))?;
            scanner.process_descriptors(descriptors, cli.origin.as_deref())
        }
        (None, Some(html)) => scan_document(&cli, html, &scanner)?,
        (None, None) => return Err("no HTML document or --descriptors given".to_string()),
    };
    for denied in &report.skipped {
        log::debug!("skipped: {}", denied);
    }
    write_report(&report, cli.json || !cli.css, out).map_err(|e| e.to_string())
}

fn scan_document(cli: &Cli, html: &Path, scanner: &FontScanner) -> Result<ScanReport, String> {
    let mut load = LoadOptions::default().with_default_family(cli.default_family.as_str());
    if let Some(origin) = cli.origin.as_deref() {
        load = load.with_origin(origin);
    }
    if let Some(root) = cli.root.as_ref() {
        load = load.with_root(root);
    }
    for sheet in &cli.stylesheets {
        load = load.with_user_stylesheet(sheet);
    }

    let mut snapshot = DocumentSnapshot::load_html_file(html, &load).map_err(|e| e.to_string())?;
    if let Some(path) = cli.font_set.as_ref() {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
        snapshot = snapshot
            .with_font_set_json(&json)
            .map_err(|e| format!("{} ({})", e, path.display()))?;
    }
    Ok(scanner.scan(&snapshot))
}

fn write_report<W: Write>(report: &ScanReport, json: bool, out: &mut W) -> io::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, &report.descriptors)?;
        writeln!(out)?;
    }
    if let Some(css) = report.css.as_deref() {
        out.write_all(css.as_bytes())?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "tests/fixtures/site/index.html";
    const CAPTURED: &str = "tests/fixtures/site/descriptors.json";

    fn output(args: &[&str]) -> Result<String, String> {
        let cli = Cli::try_parse_from(std::iter::once("fontface-scan").chain(args.iter().copied()))
            .map_err(|e| e.to_string())?;
        let mut buf = Vec::new();
        run(cli, &mut buf)?;
        Ok(String::from_utf8(buf).expect("utf-8 output"))
    }

    #[test]
    fn json_is_the_default_output() {
        let out = output(&[INDEX]).expect("run");
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("json output");
        assert_eq!(parsed.as_array().map(Vec::len), Some(4));
        assert_eq!(parsed[0]["font-family"], "Inter");
        assert!(!out.contains("@font-face"));
    }

    #[test]
    fn css_flag_replaces_json_and_json_flag_adds_it_back() {
        let css = output(&[INDEX, "--css"]).expect("run");
        assert!(css.starts_with("@font-face {\n"));
        assert_eq!(css.matches("@font-face {").count(), 4);

        let both = output(&[INDEX, "--css", "--json", "--resolve-urls"]).expect("run");
        let split = both.find("@font-face {").expect("css after json");
        let parsed: serde_json::Value = serde_json::from_str(&both[..split]).expect("json part");
        assert_eq!(parsed[0]["urls"][0], "/fonts/inter-regular.woff2");
        assert!(both[split..].contains("url(\"/fonts/inter-regular.woff2\")"));
    }

    #[test]
    fn font_set_errors_name_the_file() {
        let missing = output(&[INDEX, "--font-set", "tests/fixtures/site/none.json"])
            .expect_err("missing file");
        assert!(missing.starts_with("unable to read tests/fixtures/site/none.json"));

        let invalid = output(&[INDEX, "--font-set", "tests/fixtures/site/css/site.css"])
            .expect_err("not json");
        assert!(invalid.contains("FONT_SET_JSON"));
        assert!(invalid.ends_with("(tests/fixtures/site/css/site.css)"));
    }

    #[test]
    fn descriptors_mode_rerenders_captured_json() {
        let out = output(&["--descriptors", CAPTURED, "--css", "--localize", "fonts"]).expect("run");
        assert_eq!(out.matches("@font-face {").count(), 2);
        assert!(out.contains("url(\"fonts/lora.woff2\") format(\"woff2\")"));
        assert!(out.contains("url(\"fonts/lora-bold.ttf\") format(\"truetype\")"));

        let resolved = output(&["--descriptors", CAPTURED, "--resolve-urls"]).expect("run");
        let parsed: serde_json::Value = serde_json::from_str(&resolved).expect("json");
        assert_eq!(parsed[0]["urls"][0], "https://cdn.example.net/lora.woff2");
        assert_eq!(parsed[1]["status"], "loaded");
    }

    #[test]
    fn descriptors_mode_conflicts_with_a_document() {
        assert!(output(&[INDEX, "--descriptors", CAPTURED]).is_err());
        assert!(output(&[]).is_err());
    }
}
