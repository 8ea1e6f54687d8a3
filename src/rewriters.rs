//! The DText inline syntax, expressed as an ordered list of [`Rewriter`]s.
//!
//! Order matters: fenced content comes first so nothing inside it is touched,
//! then block constructs, then every link form from the most to the least
//! explicit. Each link becomes an opaque `url` node, which keeps later
//! rewriters (bare URLs, mentions) out of an already resolved link.
use crate::ast::{Element, Node, Span, TagName};
use crate::error::Result;
use crate::inline::{Context, Rewriter};

pub const DEFAULT_BASE_URL: &str = "https://danbooru.donmai.us";

/// Absolute link targets on the site hosting the wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLinks {
    base_url: String,
}

impl SiteLinks {
    pub fn new(base_url: &str) -> Self {
        SiteLinks {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `Kantai Collection` -> `{base}/wiki_pages/kantai_collection`
    pub fn wiki_page(&self, title: &str) -> String {
        let title = title.trim().to_lowercase().replace(' ', "_");
        format!("{}/wiki_pages/{title}", self.base_url)
    }

    pub fn post_search(&self, tags: &str) -> String {
        format!("{}/posts?tags={tags}", self.base_url)
    }

    pub fn user(&self, name: &str) -> String {
        format!("{}/users?name={name}", self.base_url)
    }
}

impl Default for SiteLinks {
    fn default() -> Self {
        SiteLinks::new(DEFAULT_BASE_URL)
    }
}

/// Build the rewriters in the order they must run.
pub fn dtext_rewriters(links: &SiteLinks) -> Result<Vec<Rewriter>> {
    let wiki = links.clone();
    let search = links.clone();
    let users = links.clone();

    Ok(vec![
        // One pattern, so whichever fence opens first owns the other's markers.
        Rewriter::new(
            "fence",
            "(?s)```\n(.*?)\n```|\\[nodtext\\](.*?)\\[/nodtext\\]",
            fence,
        )?,
        Rewriter::new("br", r"(?i)\[br\]", |cx| {
            Some(Element::new(TagName::Br, cx.span()).into())
        })?,
        Rewriter::new("hr", r"(?i)\[hr\]", |cx| {
            Some(Element::new(TagName::Hr, cx.span()).into())
        })?,
        Rewriter::new(
            "heading",
            r"(?m)^h([1-6])(?:#([\w-]+))?\.[ \t]*(.*)$",
            heading,
        )?,
        Rewriter::new(
            "list",
            r"(?m)^\*+[ \t]*[^\s*].*(?:\n\*+[ \t]*[^\s*].*)*(?:\n\z)?",
            list,
        )?,
        Rewriter::new("html anchor", r#"<a href="([^"]*)">(.*?)</a>"#, |cx| {
            Some(link(cx.get(1), cx.get(2), cx.span()))
        })?,
        Rewriter::new(
            "wiki link",
            r"([a-zA-Z0-9]*)\[\[(.+?)\]\]([a-zA-Z0-9]*)",
            move |cx| Some(wiki_link(&wiki, cx)),
        )?,
        Rewriter::new("tag search", r"\{\{(.+?)\}\}", move |cx| {
            let (tags, text) = match cx.get(1).split_once('|') {
                Some((tags, text)) => (tags.trim(), text.trim()),
                None => (cx.get(1).trim(), cx.get(1).trim()),
            };
            Some(link(&search.post_search(tags), text, cx.span()))
        })?,
        Rewriter::new("bracketed titled link", r#""([^"]+)":\[([^\]]+)\]"#, |cx| {
            Some(link(cx.get(2), cx.get(1), cx.span()))
        })?,
        Rewriter::new(
            "titled link",
            r#""([^"]+)":((?:https?://|/|#)[^\s<>"]*[^\s<>".,;:!?])"#,
            |cx| Some(link(cx.get(2), cx.get(1), cx.span())),
        )?,
        Rewriter::new(
            "markdown link",
            r"\[([^\[\]\n]+)\]\(([^()\n]+)\)",
            markdown_link,
        )?,
        Rewriter::new("angle url", r"<(https?://[^\s<>]+)>", |cx| {
            Some(link(cx.get(1), cx.get(1), cx.span()))
        })?,
        Rewriter::new("bare url", r#"https?://[^\s<>"]*[^\s<>".,;:!?]"#, |cx| {
            let quoted_before = matches!(cx.before(), Some('"' | '=' | '<'));
            let quoted_after = matches!(cx.after(), Some('"' | '>'));
            (!quoted_before && !quoted_after).then(|| link(cx.get(0), cx.get(0), cx.span()))
        })?,
        Rewriter::new("mention", r"@([\w\-]+)", move |cx| {
            let attached = cx
                .before()
                .is_some_and(|c| c.is_alphanumeric() || c == '"' || c == '\'');
            if attached || cx.after() == Some('"') {
                return None;
            }
            Some(link(&users.user(cx.get(1)), cx.get(0), cx.span()))
        })?,
    ])
}

fn fence(cx: &Context<'_>) -> Option<Node> {
    let element = match cx.matched(1) {
        true => Element::new(TagName::Code, cx.span()).with_text(cx.get(1)),
        false => Element::new(TagName::Nodtext, cx.span()).with_text(cx.get(2)),
    };
    Some(element.into())
}

/// An opaque `url` node holding `title` as its only child.
fn link(href: &str, title: &str, span: Span) -> Node {
    Element::new(TagName::Url, span)
        .with_attribute("url", href)
        .with_text(title)
        .into()
}

fn heading(cx: &Context<'_>) -> Option<Node> {
    let mut element = Element::new(TagName::H, cx.span()).with_attribute("type", cx.get(1));
    if cx.matched(2) {
        element = element.with_attribute("id", cx.get(2));
    }
    Some(element.with_text(cx.get(3).trim()).into())
}

/// A run of `*` lines. The number of stars is the nesting depth; a nested
/// `ul` sits next to the `li` it follows. The newline after the run is left
/// in place unless it ends the text.
fn list(cx: &Context<'_>) -> Option<Node> {
    let span = cx.span();
    let mut stack = vec![Element::new(TagName::Ul, span)];
    let mut offset = span.start;

    for line in cx.get(0).split_inclusive('\n') {
        let item = line.trim_end_matches('\n');
        let depth = item.chars().take_while(|&c| c == '*').count().max(1);
        let line_span = Span::new(offset, offset + item.len());
        offset += line.len();

        while stack.len() > depth {
            close_list(&mut stack);
        }
        while stack.len() < depth {
            stack.push(Element::new(TagName::Ul, line_span));
        }
        let entry = Element::new(TagName::Li, line_span).with_text(item[depth..].trim());
        stack.last_mut()?.children.push(entry.into());
    }

    while stack.len() > 1 {
        close_list(&mut stack);
    }
    stack.pop().map(Node::from)
}

fn close_list(stack: &mut Vec<Element>) {
    let Some(mut done) = stack.pop() else { return };
    let Some(parent) = stack.last_mut() else { return };
    if let Some(Node::Tag(last)) = done.children.last() {
        done.span.end = last.span.end;
    }
    parent.children.push(done.into());
}

fn wiki_link(links: &SiteLinks, cx: &Context<'_>) -> Node {
    let (left, contents, right) = (cx.get(1), cx.get(2), cx.get(3));
    let (mut title, mut label) = match contents.split_once('|') {
        Some((title, label)) => (title, Some(label)),
        None => (contents, None),
    };

    let mut anchor = "";
    if let Some((page, section)) = split_anchor(title) {
        title = page;
        anchor = section;
    } else if let Some((text, section)) = label.and_then(split_anchor) {
        label = Some(text);
        anchor = section;
    }

    let mut href = links.wiki_page(title);
    if !anchor.is_empty() {
        href.push_str("#dtext-");
        href.push_str(&anchor.to_lowercase().replace(' ', "-"));
    }

    let text = match label {
        None => title.trim().to_string(),
        Some(label) if label.trim().is_empty() => strip_qualifier(title).trim().to_string(),
        Some(label) => label.trim().to_string(),
    };
    link(&href, &format!("{left}{text}{right}"), cx.span())
}

/// `page#Section` splits only when the section starts with an uppercase letter.
fn split_anchor(text: &str) -> Option<(&str, &str)> {
    text.split_once('#')
        .filter(|(_, section)| section.chars().next().is_some_and(char::is_uppercase))
}

/// `Saber (Fate)` -> `Saber `
fn strip_qualifier(title: &str) -> String {
    match (title.find('('), title.rfind(')')) {
        (Some(open), Some(close)) if close > open + 1 => {
            format!("{}{}", &title[..open], &title[close + 1..])
        }
        _ => title.to_string(),
    }
}

/// `[title](url)`, or the reversed `[url](title)`.
fn markdown_link(cx: &Context<'_>) -> Option<Node> {
    let (mut title, mut href) = (cx.get(1), cx.get(2));
    if looks_like_url(title) && !looks_like_url(href) {
        std::mem::swap(&mut title, &mut href);
    }
    Some(link(href.trim(), title.trim(), cx.span()))
}

fn looks_like_url(text: &str) -> bool {
    let text = text.trim();
    text.starts_with("http://")
        || text.starts_with("https://")
        || text.starts_with('/')
        || text.starts_with('#')
}
