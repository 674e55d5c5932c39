use std::path::{Path, PathBuf};

use fontface_scan::{DocumentSnapshot, LoadOptions};

pub const SITE_ROOT: &str = "tests/fixtures/site";
pub const INDEX_FIXTURE: &str = "tests/fixtures/site/index.html";
pub const POST_FIXTURE: &str = "tests/fixtures/site/blog/post.html";
pub const EXTRA_STYLESHEET: &str = "tests/fixtures/site/css/extra.css";
pub const FONT_SET_FIXTURE: &str = "tests/fixtures/site/font-set.json";

pub fn load_fixture(path: &str, options: &LoadOptions) -> DocumentSnapshot {
    DocumentSnapshot::load_html_file(Path::new(path), options)
        .unwrap_or_else(|e| panic!("load {}: {}", path, e))
}

pub fn site_options() -> LoadOptions {
    LoadOptions::default().with_root(SITE_ROOT)
}

pub fn discover_fixture_pages() -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut pending = vec![PathBuf::from(SITE_ROOT)];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
            {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}
