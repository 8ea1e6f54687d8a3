//! Second pass: rewrites text nodes into structured nodes, one regex at a time.
//!
//! A [`Rewriter`] pairs a pattern with a constructor. [`rewrite`] applies each
//! rewriter in order over the whole tree, splitting text nodes around every
//! accepted match. Opaque tags (`nodtext`, `code`, `url`) are never entered, so
//! whatever an earlier rewriter resolved is safe from the later ones.
use std::fmt;

use regex::{Captures, Regex};

use crate::ast::{Element, Node, Span, Text};
use crate::error::Result;

type Build = Box<dyn Fn(&Context<'_>) -> Option<Node> + Send + Sync>;

/// A single match handed to a rewriter's constructor.
pub struct Context<'h> {
    captures: Captures<'h>,
    span: Span,
    before: Option<char>,
    after: Option<char>,
}

impl<'h> Context<'h> {
    /// Capture group `index`, or `""` when it did not participate.
    pub fn get(&self, index: usize) -> &'h str {
        self.captures.get(index).map_or("", |m| m.as_str())
    }

    /// Whether capture group `index` participated in the match.
    pub fn matched(&self, index: usize) -> bool {
        self.captures.get(index).is_some()
    }

    /// Position of the whole match in the pass input.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Character right before the match inside its text node.
    pub fn before(&self) -> Option<char> {
        self.before
    }

    /// Character right after the match inside its text node.
    pub fn after(&self) -> Option<char> {
        self.after
    }
}

pub struct Rewriter {
    name: &'static str,
    pattern: Regex,
    build: Build,
}

impl Rewriter {
    /// Compile `pattern` and pair it with `build`. Returning `None` from
    /// `build` declines a match and leaves its text untouched.
    pub fn new<F>(name: &'static str, pattern: &str, build: F) -> Result<Self>
    where
        F: Fn(&Context<'_>) -> Option<Node> + Send + Sync + 'static,
    {
        Ok(Rewriter {
            name,
            pattern: Regex::new(pattern)?,
            build: Box::new(build),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Split `text` around accepted matches. `None` when nothing was accepted.
    fn rewrite_text(&self, text: &Text) -> Option<Vec<Node>> {
        let haystack = text.content.as_str();
        let base = text.span.start;
        let mut nodes = Vec::new();
        let mut last = 0;

        for captures in self.pattern.captures_iter(haystack) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let context = Context {
                span: Span::new(base + whole.start(), base + whole.end()),
                before: haystack[..whole.start()].chars().next_back(),
                after: haystack[whole.end()..].chars().next(),
                captures,
            };
            let Some(node) = (self.build)(&context) else {
                continue;
            };

            if whole.start() > last {
                nodes.push(Node::text(
                    &haystack[last..whole.start()],
                    Span::new(base + last, base + whole.start()),
                ));
            }
            nodes.push(node);
            last = whole.end();
        }

        if nodes.is_empty() {
            return None;
        }
        if last < haystack.len() {
            nodes.push(Node::text(
                &haystack[last..],
                Span::new(base + last, base + haystack.len()),
            ));
        }
        Some(nodes)
    }
}

impl fmt::Debug for Rewriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rewriter")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Run every rewriter, in order, over the tree rooted at `root`.
pub fn rewrite(mut root: Element, rewriters: &[Rewriter]) -> Element {
    for rewriter in rewriters {
        let count = visit(&mut root, rewriter);
        if count > 0 {
            log::trace!("rewriter `{}` replaced {count} text node(s)", rewriter.name());
        }
    }
    root
}

fn visit(element: &mut Element, rewriter: &Rewriter) -> usize {
    if element.name.is_literal() {
        return 0;
    }

    let mut count = 0;
    let children = std::mem::take(&mut element.children);
    let mut rewritten = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Node::Tag(mut child) => {
                count += visit(&mut child, rewriter);
                rewritten.push(Node::Tag(child));
            }
            Node::Text(text) => match rewriter.rewrite_text(&text) {
                Some(nodes) => {
                    count += 1;
                    rewritten.extend(nodes);
                }
                None => rewritten.push(Node::Text(text)),
            },
        }
    }
    element.children = rewritten;
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TagName;
    use pretty_assertions::assert_eq;

    fn document(text: &str) -> Element {
        let span = Span::new(0, text.len());
        let mut root = Element::new(TagName::Root, span);
        root.children.push(Node::text(text, span));
        root
    }

    fn bold_digits() -> Rewriter {
        Rewriter::new("digits", r"\d+", |cx| {
            Some(Element::new(TagName::B, cx.span()).with_text(cx.get(0)).into())
        })
        .unwrap()
    }

    #[test]
    fn test_matches_split_text() {
        let root = rewrite(document("a1b22"), &[bold_digits()]);
        assert_eq!(root.children.len(), 4);
        assert_eq!(root.children[0], Node::text("a", Span::new(0, 1)));
        assert_eq!(root.children[1].span(), Span::new(1, 2));
        assert_eq!(root.children[2], Node::text("b", Span::new(2, 3)));
        assert_eq!(root.children[3].span(), Span::new(3, 5));
    }

    #[test]
    fn test_no_match_leaves_node_untouched() {
        let untouched = document("abc");
        let root = rewrite(untouched.clone(), &[bold_digits()]);
        assert_eq!(root, untouched);
    }

    #[test]
    fn test_declined_match_stays_literal() {
        let odd_only = Rewriter::new("odd", r"\d", |cx| {
            let digit: u32 = cx.get(0).parse().ok()?;
            (digit % 2 == 1).then(|| Element::new(TagName::B, cx.span()).with_text(cx.get(0)).into())
        })
        .unwrap();

        let root = rewrite(document("2x3y4"), &[odd_only]);
        let texts: Vec<_> = root.children.iter().map(Node::as_text).collect();
        assert_eq!(texts, vec![Some("2x"), None, Some("y4")]);
    }

    #[test]
    fn test_context_sees_neighbours() {
        let quoted = Rewriter::new("quoted", r"x", |cx| {
            (cx.before() != Some('"')).then(|| Element::new(TagName::B, cx.span()).into())
        })
        .unwrap();

        let root = rewrite(document("\"x x"), &[quoted]);
        assert_eq!(root.children[0].as_text(), Some("\"x "));
        assert!(root.children[0].span().end == 3);
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn test_opaque_tags_are_skipped() {
        let mut root = document("1");
        root.children
            .push(Element::new(TagName::Url, Span::new(1, 2)).with_text("2").into());
        let mut quote = Element::new(TagName::Quote, Span::new(2, 3));
        quote.children.push(Node::text("3", Span::new(2, 3)));
        root.children.push(quote.into());

        let root = rewrite(root, &[bold_digits()]);
        let Node::Tag(url) = &root.children[1] else {
            panic!("expected the url tag");
        };
        assert_eq!(url.children[0].as_text(), Some("2"));
        let Node::Tag(quote) = &root.children[2] else {
            panic!("expected the quote tag");
        };
        assert!(matches!(&quote.children[0], Node::Tag(b) if b.name == TagName::B));
    }

    #[test]
    fn test_later_rewriters_skip_earlier_results() {
        let link = Rewriter::new("link", r"\d+", |cx| {
            Some(Element::new(TagName::Url, cx.span()).with_text(cx.get(0)).into())
        })
        .unwrap();

        let root = rewrite(document("7"), &[link, bold_digits()]);
        let Node::Tag(url) = &root.children[0] else {
            panic!("expected the url tag");
        };
        assert_eq!(url.name, TagName::Url);
        assert_eq!(url.children[0].as_text(), Some("7"));
    }
}
