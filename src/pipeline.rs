//! Ties both passes together.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ast::{Element, Node, Span, TagName};
use crate::error::Result;
use crate::inline::{Rewriter, rewrite};
use crate::parser::{Delimiters, TagParser};
use crate::renderer::{Renderer, Stage};
use crate::rewriters::{DEFAULT_BASE_URL, SiteLinks, dtext_rewriters};

/// Conversion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Site root for wiki, tag search and user links.
    pub base_url: String,
    /// Also run the tag pass over `<b>`-style tags before the `[b]` pass.
    pub html_tags: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            base_url: DEFAULT_BASE_URL.to_string(),
            html_tags: false,
        }
    }
}

impl Options {
    /// Load options from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A compiled converter. Build once and share; conversion never mutates it.
#[derive(Debug)]
pub struct Pipeline {
    html: Option<TagParser>,
    bbcode: TagParser,
    rewriters: Vec<Rewriter>,
}

impl Pipeline {
    pub fn new(options: &Options) -> Result<Self> {
        let html = match options.html_tags {
            true => Some(TagParser::new(Delimiters::HTML)?),
            false => None,
        };
        let rewriters = dtext_rewriters(&SiteLinks::new(&options.base_url))?;
        log::debug!(
            "built pipeline with {} rewriters (html tags: {})",
            rewriters.len(),
            options.html_tags
        );

        Ok(Pipeline {
            html,
            bbcode: TagParser::new(Delimiters::BBCODE)?,
            rewriters,
        })
    }

    /// Convert DText to display markup. `None` converts to an empty string.
    pub fn to_markup(&self, dtext: Option<&str>) -> Result<String> {
        self.convert(dtext, false)
    }

    /// Strip all markup, keeping only the literal text.
    pub fn to_raw(&self, dtext: Option<&str>) -> Result<String> {
        self.convert(dtext, true)
    }

    /// The bracket tag tree of `dtext`, before any rendering.
    pub fn tag_tree(&self, dtext: &str) -> Result<Node> {
        self.bbcode.parse(&normalize(dtext))
    }

    fn convert(&self, dtext: Option<&str>, raw_text: bool) -> Result<String> {
        let Some(dtext) = dtext else {
            return Ok(String::new());
        };

        let mut text = normalize(dtext);
        if let Some(html) = &self.html {
            text = tag_pass(html, &text, raw_text)?;
        }
        let text = tag_pass(&self.bbcode, &text, raw_text)?;
        log::trace!("tag pass produced {} bytes", text.len());

        let span = Span::new(0, text.len());
        let mut root = Element::new(TagName::Root, span);
        root.children.push(Node::text(text, span));
        let root = rewrite(root, &self.rewriters);

        Renderer::new(raw_text, Stage::Inline).render(&root.into())
    }
}

fn normalize(dtext: &str) -> String {
    dtext.replace("\r\n", "\n")
}

fn tag_pass(parser: &TagParser, text: &str, raw_text: bool) -> Result<String> {
    let tree = parser.parse(text)?;
    Renderer::new(raw_text, Stage::Tags).render(&tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_options_default_missing_fields() {
        let options: Options = serde_json::from_str(r#"{"html_tags": true}"#).unwrap();
        assert_eq!(options.base_url, DEFAULT_BASE_URL);
        assert!(options.html_tags);
    }

    #[test]
    fn test_missing_document_is_empty() {
        let pipeline = Pipeline::new(&Options::default()).unwrap();
        assert_eq!(pipeline.to_markup(None).unwrap(), "");
        assert_eq!(pipeline.to_raw(None).unwrap(), "");
        assert_eq!(pipeline.to_markup(Some("")).unwrap(), "");
    }

    #[test]
    fn test_crlf_is_normalized() {
        let pipeline = Pipeline::new(&Options::default()).unwrap();
        assert_eq!(
            pipeline.to_markup(Some("[b]a\r\nb")).unwrap(),
            "<b>a</b>\nb"
        );
    }

    #[test]
    fn test_raw_text_drops_markup_and_links() {
        let pipeline = Pipeline::new(&Options::default()).unwrap();
        let raw = pipeline
            .to_raw(Some("[b]Bold[/b] see [[Kantai Collection|Kancolle]] [nodtext][i]x[/i][/nodtext]"))
            .unwrap();
        assert_eq!(raw, "Bold see Kancolle [i]x[/i]");
    }

    #[test]
    fn test_html_tags_are_opt_in() {
        let plain = Pipeline::new(&Options::default()).unwrap();
        assert_eq!(plain.to_markup(Some("<b>x</b>")).unwrap(), "<b>x</b>");

        let options = Options {
            html_tags: true,
            ..Options::default()
        };
        let html = Pipeline::new(&options).unwrap();
        assert_eq!(html.to_markup(Some("<u>x</u>")).unwrap(), "<ins>x</ins>");
        assert_eq!(html.to_raw(Some("<u>x</u> [b]y[/b]")).unwrap(), "x y");
    }

    #[test]
    fn test_base_url_is_configurable() {
        let options = Options {
            base_url: "https://wiki.example/".to_string(),
            ..Options::default()
        };
        let pipeline = Pipeline::new(&options).unwrap();
        assert_eq!(
            pipeline.to_markup(Some("@someone")).unwrap(),
            r#"<a href="https://wiki.example/users?name=someone">@someone</a>"#
        );
    }

    #[test]
    fn test_tag_tree_exposes_first_pass() {
        let pipeline = Pipeline::new(&Options::default()).unwrap();
        let Node::Tag(root) = pipeline.tag_tree("[b]x[/b]").unwrap() else {
            panic!("expected the root tag");
        };
        assert_eq!(root.name, TagName::Root);
        assert!(matches!(&root.children[0], Node::Tag(b) if b.name == TagName::B));
    }

    #[test]
    fn test_pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }
}
