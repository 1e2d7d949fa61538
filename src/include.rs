//! Page assembly from shared HTML fragments.
//!
//! Pages mark placeholders with `include-html="<file>"`. Placeholders are
//! resolved one at a time in document order, so fragments may themselves
//! contain further placeholders. Once loading is done, the registered
//! post-load hooks run in order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use tracing::{debug, error, warn};

use crate::error::{SiteError, SiteResult};

const INCLUDE_ATTR: &str = "include-html";
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];
const INCLUDE_FAILED: &str = "Kunde inte ladda komponenten.";
/// Upper bound on substitutions per page; stops self-including fragments.
pub const MAX_INCLUDES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    LatestNews,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub name: String,
    pub html: String,
    pub features: HashSet<Feature>,
}

impl Page {
    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

/// Runs over every assembled page once its fragments are in place.
pub trait PostLoadHook: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, page: &mut Page);
}

/// Flags pages that carry the latest-news section.
pub struct LatestNewsDetector;

impl PostLoadHook for LatestNewsDetector {
    fn name(&self) -> &str {
        "latest-news-detector"
    }

    fn apply(&self, page: &mut Page) {
        if matches_selector(&page.html, ".latest-news-section") {
            page.features.insert(Feature::LatestNews);
        }
    }
}

pub struct Site {
    root: PathBuf,
    hooks: Vec<Box<dyn PostLoadHook>>,
}

impl Site {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: impl PostLoadHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a page, resolve its includes and run the hooks.
    pub async fn assemble(&self, name: &str) -> SiteResult<Page> {
        validate_page_name(name)?;

        let path = self.root.join(name);
        let mut html = match tokio::fs::read_to_string(&path).await {
            Ok(html) => html,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SiteError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        self.resolve_includes(&mut html).await;

        let mut page = Page {
            name: name.to_string(),
            html,
            features: HashSet::new(),
        };
        for hook in &self.hooks {
            debug!("Running post-load hook {} on {}", hook.name(), name);
            hook.apply(&mut page);
        }
        Ok(page)
    }

    async fn resolve_includes(&self, html: &mut String) {
        for _ in 0..MAX_INCLUDES {
            let Some(element) = find_element(html, INCLUDE_ATTR, 0) else {
                return;
            };
            let file = element.attr_value.clone();
            if element.close_start.is_none() {
                warn!("Element including {} cannot hold content, skipping", file);
                element.strip_attribute(html);
                continue;
            }
            let content = match self.load_fragment(&file).await {
                Ok(content) => content,
                Err(e) => {
                    error!("Error loading fragment {}: {}", file, e);
                    INCLUDE_FAILED.to_string()
                }
            };
            element.replace(html, &content);
        }

        if find_element(html, INCLUDE_ATTR, 0).is_some() {
            warn!(
                "Stopped resolving includes after {} fragments, leaving the rest",
                MAX_INCLUDES
            );
        }
    }

    async fn load_fragment(&self, file: &str) -> SiteResult<String> {
        if file.is_empty() || Path::new(file).components().any(|c| {
            !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir)
        }) {
            return Err(SiteError::InvalidPage(file.to_string()));
        }
        Ok(tokio::fs::read_to_string(self.root.join(file)).await?)
    }
}

fn validate_page_name(name: &str) -> SiteResult<()> {
    let valid = name.ends_with(".html")
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..");
    if valid {
        Ok(())
    } else {
        Err(SiteError::InvalidPage(name.to_string()))
    }
}

/// An element located by one of its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    open_end: usize,
    /// `None` for void, self-closing and unclosed elements
    close_start: Option<usize>,
    attr_start: usize,
    attr_end: usize,
    attr_value: String,
}

impl Element {
    /// Write `content` as the inner HTML and drop the locating attribute.
    fn replace(&self, html: &mut String, content: &str) {
        self.fill(html, content);
        self.strip_attribute(html);
    }

    /// Remove the locating attribute along with one leading space.
    fn strip_attribute(&self, html: &mut String) {
        let start = if html[..self.attr_start].ends_with(' ') {
            self.attr_start - 1
        } else {
            self.attr_start
        };
        html.replace_range(start..self.attr_end, "");
    }

    fn fill(&self, html: &mut String, content: &str) {
        if let Some(close_start) = self.close_start {
            html.replace_range(self.open_end..close_start, content);
        }
    }
}

/// First element at or after `from` carrying attribute `name` with a quoted
/// value. Occurrences outside an opening tag are skipped.
fn find_element(html: &str, name: &str, from: usize) -> Option<Element> {
    let needle = format!("{}=", name);
    let mut from = from;
    while let Some(offset) = html[from..].find(&needle) {
        let attr_start = from + offset;
        from = attr_start + needle.len();

        if !html[..attr_start].ends_with(char::is_whitespace) {
            continue;
        }
        // Must be inside an opening tag
        let Some(open_start) = html[..attr_start].rfind('<') else {
            continue;
        };
        if html[open_start..attr_start].contains('>') {
            continue;
        }
        let tag: String = html[open_start + 1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_ascii_lowercase();
        if tag.is_empty() {
            continue;
        }

        let Some(quote) = html[from..].chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let value_start = from + 1;
        let Some(value_len) = html[value_start..].find(quote) else {
            continue;
        };
        let attr_end = value_start + value_len + 1;
        let Some(tag_len) = html[attr_end..].find('>') else {
            continue;
        };
        let open_end = attr_end + tag_len + 1;

        let self_closing = html[..open_end - 1].ends_with('/');
        let close_start = if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
            None
        } else {
            matching_close(html, &tag, open_end)
        };

        return Some(Element {
            open_end,
            close_start,
            attr_start,
            attr_end,
            attr_value: html[value_start..value_start + value_len].to_string(),
        });
    }
    None
}

/// Position of the closing tag that balances an element opened before `from`.
fn matching_close(html: &str, tag: &str, from: usize) -> Option<usize> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut depth = 0usize;
    let mut pos = from;

    loop {
        let next_close = pos + html[pos..].find(&close)?;
        match html[pos..next_close].find(&open) {
            Some(offset) => {
                let after = pos + offset + open.len();
                let is_tag = html[after..]
                    .starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/');
                if is_tag {
                    depth += 1;
                }
                pos = after;
            }
            None if depth == 0 => return Some(next_close),
            None => {
                depth -= 1;
                pos = next_close + close.len();
            }
        }
    }
}

/// Write `content` as the inner HTML of the element with the given id.
/// Returns false when the document has no such element.
pub fn fill_element(html: &mut String, id: &str, content: &str) -> bool {
    if !matches_selector(html, &format!("#{}", id)) {
        return false;
    }

    let mut from = 0;
    while let Some(element) = find_element(html, "id", from) {
        if element.attr_value == id && element.close_start.is_some() {
            element.fill(html, content);
            return true;
        }
        from = element.attr_end;
    }
    false
}

/// Whether any element in `html` matches the CSS `selector`.
pub fn matches_selector(html: &str, selector: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn site_with(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    mod markup_tests {
        use super::*;

        #[test]
        fn test_find_include_element() {
            let html = r#"<body><div include-html="header.html"></div></body>"#;
            let element = find_element(html, INCLUDE_ATTR, 0).unwrap();
            assert_eq!(element.attr_value, "header.html");
            assert_eq!(&html[..element.open_end], r#"<body><div include-html="header.html">"#);
            let close_start = element.close_start.unwrap();
            assert_eq!(&html[close_start..], "</div></body>");
        }

        #[test]
        fn test_replace_removes_attribute() {
            let mut html = r#"<header class="top" include-html="nav.html">Laddar</header>"#.to_string();
            let element = find_element(&html, INCLUDE_ATTR, 0).unwrap();
            element.replace(&mut html, "<nav></nav>");
            assert_eq!(html, r#"<header class="top"><nav></nav></header>"#);
        }

        #[test]
        fn test_attribute_text_outside_tag_is_ignored() {
            let html = r#"<p>use include-html="x" to include</p>"#;
            assert!(find_element(html, INCLUDE_ATTR, 0).is_none());
        }

        #[test]
        fn test_fill_element_by_id() {
            let mut html =
                r#"<div id="latest-news-layout-wrapper"><div id="latest-news-layout"><p>Laddar...</p></div></div>"#
                    .to_string();
            assert!(fill_element(&mut html, "latest-news-layout", "<b>news</b>"));
            assert_eq!(
                html,
                r#"<div id="latest-news-layout-wrapper"><div id="latest-news-layout"><b>news</b></div></div>"#
            );
        }

        #[test]
        fn test_fill_element_with_nested_children() {
            let mut html = r#"<div id="latest-news-layout"><div class="news-loading"><div>...</div></div></div><footer></footer>"#
                .to_string();
            assert!(fill_element(&mut html, "latest-news-layout", "ny"));
            assert_eq!(html, r#"<div id="latest-news-layout">ny</div><footer></footer>"#);
        }

        #[test]
        fn test_fill_missing_element() {
            let mut html = "<div></div>".to_string();
            assert!(!fill_element(&mut html, "latest-news-layout", "x"));
            assert_eq!(html, "<div></div>");
        }

        #[test]
        fn test_single_quoted_attribute() {
            let html = "<div include-html='header.html'></div>";
            let element = find_element(html, INCLUDE_ATTR, 0).unwrap();
            assert_eq!(element.attr_value, "header.html");
        }

        #[test]
        fn test_void_element_has_no_close() {
            let html = r#"<img include-html="a.html"><br include-html="b.html"/>"#;
            let element = find_element(html, INCLUDE_ATTR, 0).unwrap();
            assert_eq!(element.attr_value, "a.html");
            assert!(element.close_start.is_none());
        }

        #[test]
        fn test_prefixed_attribute_is_not_matched() {
            let html = r#"<div data-include-html="x.html"></div>"#;
            assert!(find_element(html, INCLUDE_ATTR, 0).is_none());
        }

        #[test]
        fn test_fill_single_quoted_id() {
            let mut html = "<div id='latest-news-layout'>Laddar</div>".to_string();
            assert!(fill_element(&mut html, "latest-news-layout", "ny"));
            assert_eq!(html, "<div id='latest-news-layout'>ny</div>");
        }

        #[test]
        fn test_fill_ignores_id_prefix_match() {
            let mut html = r#"<div id="latest-news-layout-old">gammal</div>"#.to_string();
            assert!(!fill_element(&mut html, "latest-news-layout", "ny"));
            assert!(html.contains("gammal"));
        }

        #[test]
        fn test_matches_selector() {
            let html = r#"<section class="section latest-news-section dark"></section>"#;
            assert!(matches_selector(html, ".latest-news-section"));
            assert!(!matches_selector(html, ".latest-news"));
            assert!(!matches_selector("<section></section>", ".latest-news-section"));
        }

        #[test]
        fn test_selector_ignores_other_attributes() {
            let html = r#"<div data-class="latest-news-section"></div>"#;
            assert!(!matches_selector(html, ".latest-news-section"));

            let html = "<section class='latest-news-section'></section>";
            assert!(matches_selector(html, ".latest-news-section"));
        }

        #[test]
        fn test_invalid_selector_matches_nothing() {
            assert!(!matches_selector("<div></div>", "[[["));
        }

        #[test]
        fn test_page_name_validation() {
            assert!(validate_page_name("index.html").is_ok());
            assert!(validate_page_name("../secret.html").is_err());
            assert!(validate_page_name("a/b.html").is_err());
            assert!(validate_page_name("nyheter.json").is_err());
            assert!(validate_page_name(".hidden.html").is_err());
        }
    }

    mod assemble_tests {
        use super::*;

        #[tokio::test]
        async fn test_includes_are_resolved_in_order() {
            let dir = site_with(&[
                (
                    "index.html",
                    r#"<div include-html="components/header.html"></div><main>Hem</main><div include-html="components/footer.html"></div>"#,
                ),
                ("components/header.html", "<nav>Meny</nav>"),
                ("components/footer.html", "<footer>Sidfot</footer>"),
            ]);
            let site = Site::new(dir.path());

            let page = site.assemble("index.html").await.unwrap();

            assert_eq!(
                page.html,
                "<div><nav>Meny</nav></div><main>Hem</main><div><footer>Sidfot</footer></div>"
            );
        }

        #[tokio::test]
        async fn test_nested_includes() {
            let dir = site_with(&[
                ("index.html", r#"<div include-html="outer.html"></div>"#),
                ("outer.html", r#"<span include-html="inner.html"></span>"#),
                ("inner.html", "inre"),
            ]);
            let site = Site::new(dir.path());

            let page = site.assemble("index.html").await.unwrap();
            assert_eq!(page.html, "<div><span>inre</span></div>");
        }

        #[tokio::test]
        async fn test_missing_fragment_falls_back() {
            let dir = site_with(&[
                (
                    "index.html",
                    r#"<div include-html="missing.html"></div><div include-html="ok.html"></div>"#,
                ),
                ("ok.html", "ok"),
            ]);
            let site = Site::new(dir.path());

            let page = site.assemble("index.html").await.unwrap();
            assert_eq!(
                page.html,
                "<div>Kunde inte ladda komponenten.</div><div>ok</div>"
            );
        }

        #[tokio::test]
        async fn test_void_include_does_not_stop_later_includes() {
            let dir = site_with(&[
                (
                    "index.html",
                    r#"<img include-html="a.html"><div include-html="b.html"></div>"#,
                ),
                ("a.html", "A"),
                ("b.html", "B"),
            ]);
            let site = Site::new(dir.path());

            let page = site.assemble("index.html").await.unwrap();
            assert_eq!(page.html, "<img><div>B</div>");
        }

        #[tokio::test]
        async fn test_unclosed_include_is_skipped() {
            let dir = site_with(&[
                (
                    "index.html",
                    r#"<span include-html='b.html'></span><div include-html="a.html">"#,
                ),
                ("a.html", "A"),
                ("b.html", "B"),
            ]);
            let site = Site::new(dir.path());

            let page = site.assemble("index.html").await.unwrap();
            assert_eq!(page.html, "<span>B</span><div>");
        }

        #[tokio::test]
        async fn test_fragment_outside_root_is_refused() {
            let dir = site_with(&[("index.html", r#"<div include-html="../etc/passwd"></div>"#)]);
            let site = Site::new(dir.path());

            let page = site.assemble("index.html").await.unwrap();
            assert_eq!(page.html, "<div>Kunde inte ladda komponenten.</div>");
        }

        #[tokio::test]
        async fn test_self_include_terminates() {
            let dir = site_with(&[
                ("index.html", r#"<div include-html="loop.html"></div>"#),
                ("loop.html", r#"x<div include-html="loop.html"></div>"#),
            ]);
            let site = Site::new(dir.path());

            let page = site.assemble("index.html").await.unwrap();
            assert_eq!(page.html.matches('x').count(), MAX_INCLUDES);
        }

        #[tokio::test]
        async fn test_unknown_page() {
            let dir = site_with(&[]);
            let site = Site::new(dir.path());

            let result = site.assemble("nope.html").await;
            assert!(matches!(result, Err(SiteError::NotFound(_))));
        }

        #[tokio::test]
        async fn test_invalid_page_name() {
            let dir = site_with(&[]);
            let site = Site::new(dir.path());

            let result = site.assemble("../index.html").await;
            assert!(matches!(result, Err(SiteError::InvalidPage(_))));
        }
    }

    mod hook_tests {
        use super::*;

        struct Recorder {
            label: &'static str,
            log: Arc<Mutex<Vec<&'static str>>>,
        }

        impl PostLoadHook for Recorder {
            fn name(&self) -> &str {
                self.label
            }

            fn apply(&self, page: &mut Page) {
                self.log.lock().unwrap().push(self.label);
                page.html.push_str(self.label);
            }
        }

        #[tokio::test]
        async fn test_hooks_run_in_registration_order_after_includes() {
            let dir = site_with(&[
                ("index.html", r#"<div include-html="a.html"></div>"#),
                ("a.html", "A"),
            ]);
            let log = Arc::new(Mutex::new(Vec::new()));
            let site = Site::new(dir.path())
                .with_hook(Recorder {
                    label: "first",
                    log: log.clone(),
                })
                .with_hook(Recorder {
                    label: "second",
                    log: log.clone(),
                });

            let page = site.assemble("index.html").await.unwrap();

            assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
            assert_eq!(page.html, "<div>A</div>firstsecond");
        }

        #[tokio::test]
        async fn test_latest_news_detector() {
            let dir = site_with(&[
                ("index.html", r#"<div include-html="news.html"></div>"#),
                (
                    "news.html",
                    r#"<section class="latest-news-section"><div id="latest-news-layout"></div></section>"#,
                ),
                ("about.html", "<main>Om oss</main>"),
            ]);
            let site = Site::new(dir.path()).with_hook(LatestNewsDetector);

            let index = site.assemble("index.html").await.unwrap();
            let about = site.assemble("about.html").await.unwrap();

            assert!(index.has(Feature::LatestNews));
            assert!(!about.has(Feature::LatestNews));
        }
    }
}
