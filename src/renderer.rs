//! Renders a node tree either as display markup or as its raw text.
use crate::ast::{Element, Node, TagName};
use crate::error::Result;

/// Which pass the tree came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Tag tree built from `[tag]` markers.
    Tags,
    /// Tree produced by the inline rewriters.
    Inline,
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    raw_text: bool,
    stage: Stage,
}

impl Renderer {
    pub fn new(raw_text: bool, stage: Stage) -> Self {
        Renderer { raw_text, stage }
    }

    pub fn render(&self, node: &Node) -> Result<String> {
        if self.raw_text {
            return self.raw(node);
        }
        self.node_full(node)
    }

    /// Only the literal text survives. `nodtext` keeps its markers after the
    /// tag pass so that the inline pass leaves its content alone. Breaks and
    /// list items stay on separate lines.
    fn raw(&self, node: &Node) -> Result<String> {
        let element = match node {
            Node::Text(text) => return Ok(text.content.clone()),
            Node::Tag(element) => element,
        };
        match element.name {
            TagName::Nodtext => self.nodtext(element),
            TagName::Br | TagName::Hr => Ok("\n".to_string()),
            TagName::Ul => Ok(element
                .children
                .iter()
                .map(|child| self.raw(child))
                .collect::<Result<Vec<_>>>()?
                .join("\n")),
            _ => element.children.iter().map(|child| self.raw(child)).collect(),
        }
    }

    fn node_full(&self, node: &Node) -> Result<String> {
        match node {
            Node::Text(text) => Ok(text.content.clone()),
            Node::Tag(element) => self.full(element),
        }
    }

    fn node_simple(&self, node: &Node) -> Result<String> {
        match node {
            Node::Text(text) => Ok(text.content.clone()),
            Node::Tag(element) => self.simple(element),
        }
    }

    fn children_full(&self, element: &Element) -> Result<String> {
        element
            .children
            .iter()
            .map(|child| self.node_full(child))
            .collect()
    }

    fn children_simple(&self, element: &Element) -> Result<String> {
        element
            .children
            .iter()
            .map(|child| self.node_simple(child))
            .collect()
    }

    /// Dispatch for top-level content, where block tags are allowed.
    fn full(&self, element: &Element) -> Result<String> {
        match element.name {
            TagName::Root | TagName::Spoilers => self.children_full(element),
            TagName::Code => code(element),
            TagName::Table => self.table(element),
            TagName::Expand => self.expand(element),
            _ => self.simple(element),
        }
    }

    /// Dispatch for constrained content (quotes, cells, inline wrappers).
    fn simple(&self, element: &Element) -> Result<String> {
        match element.name {
            TagName::Nodtext => self.nodtext(element),
            TagName::Quote => Ok(format!(
                "<blockquote>{}</blockquote>",
                self.children_simple(element)?
            )),
            TagName::Code => code(element),
            TagName::Expand => self.expand(element),
            TagName::Spoilers => self.children_full(element),
            TagName::B => self.wrap_lines(element, "<b>", "</b>"),
            TagName::I => self.wrap_lines(element, "<i>", "</i>"),
            TagName::U => self.wrap_lines(element, "<ins>", "</ins>"),
            TagName::S => self.wrap_lines(element, "<s>", "</s>"),
            TagName::Tn => self.wrap_lines(element, "<sub><sup>", "</sub></sup>"),
            TagName::Url => url(element),
            TagName::H => self.heading(element),
            TagName::Ul => self.list(element),
            TagName::Li => Ok(format!("<li>{}</li>", self.children_simple(element)?)),
            TagName::Br => Ok("<br>\n".to_string()),
            TagName::Hr => Ok("<hr>".to_string()),
            TagName::Col | TagName::Colgroup => Ok(String::new()),
            TagName::Root
            | TagName::Table
            | TagName::Thead
            | TagName::Tbody
            | TagName::Tr
            | TagName::Th
            | TagName::Td
            | TagName::Unknown => self.children_simple(element),
        }
    }

    fn nodtext(&self, element: &Element) -> Result<String> {
        let text = element.literal_text()?;
        Ok(match self.stage {
            Stage::Tags => format!("[nodtext]{text}[/nodtext]"),
            Stage::Inline => text.to_string(),
        })
    }

    fn expand(&self, element: &Element) -> Result<String> {
        let text = self.children_full(element)?;
        Ok(match element.attributes.get("expand").filter(|t| !t.is_empty()) {
            Some(title) => format!("<h5>{title}</h5>\n<hr>\n{text}"),
            None => text,
        })
    }

    /// Wrap every non-blank line separately; blank lines are dropped.
    fn wrap_lines(&self, element: &Element, open: &str, close: &str) -> Result<String> {
        let text = self.children_simple(element)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| format!("{open}{line}{close}"))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn table(&self, element: &Element) -> Result<String> {
        match element.name {
            TagName::Table => Ok(format!("<table>\n{}\n</table>", self.table_rows(element)?)),
            TagName::Thead | TagName::Tbody => Ok(format!("\n{}\n", self.table_rows(element)?)),
            TagName::Tr => Ok(format!("<tr>\n{}\n</tr>", self.table_rows(element)?)),
            TagName::Th => Ok(format!("<th>{}</th>", self.children_simple(element)?.trim())),
            TagName::Td => Ok(format!("<td>{}</td>", self.children_simple(element)?.trim())),
            _ => self.simple(element),
        }
    }

    /// Structural children of a table element; loose text is dropped.
    fn table_rows(&self, element: &Element) -> Result<String> {
        let mut rows = Vec::new();
        for child in &element.children {
            let Node::Tag(child) = child else { continue };
            if matches!(child.name, TagName::Col | TagName::Colgroup) {
                continue;
            }
            rows.push(self.table(child)?);
        }
        Ok(rows.join("\n"))
    }

    fn heading(&self, element: &Element) -> Result<String> {
        let level = element
            .attributes
            .get("type")
            .and_then(|level| level.parse::<u8>().ok())
            .unwrap_or(1)
            .clamp(1, 6);
        let text = self.children_simple(element)?;
        Ok(match element.attributes.get("id").filter(|id| !id.is_empty()) {
            Some(id) => format!("<h{level} id=\"{id}\">{text}</h{level}>"),
            None => format!("<h{level}>{text}</h{level}>"),
        })
    }

    fn list(&self, element: &Element) -> Result<String> {
        let mut out = String::from("<ul>\n");
        for child in &element.children {
            out.push_str(&self.node_simple(child)?);
            out.push('\n');
        }
        out.push_str("</ul>");
        Ok(out)
    }
}

/// Fenced block; one trailing newline of the content is dropped.
fn code(element: &Element) -> Result<String> {
    let text = element.literal_text()?;
    let text = text.strip_suffix('\n').unwrap_or(text);
    Ok(format!("```\n{text}\n```"))
}

fn url(element: &Element) -> Result<String> {
    let title = element.literal_text()?;
    let href = element
        .attributes
        .get("url")
        .filter(|href| !href.is_empty())
        .unwrap_or(title);
    Ok(format!("<a href=\"{href}\">{title}</a>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::error::Error;
    use crate::parser::{Delimiters, TagParser};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn render_tags(input: &str, raw_text: bool) -> String {
        let tree = TagParser::new(Delimiters::BBCODE)
            .unwrap()
            .parse(input)
            .unwrap();
        Renderer::new(raw_text, Stage::Tags).render(&tree).unwrap()
    }

    fn root(children: Vec<Node>) -> Node {
        let mut root = Element::new(TagName::Root, Span::default());
        root.children = children;
        root.into()
    }

    #[rstest]
    #[case("[b]bold[/b]", "<b>bold</b>")]
    #[case("[i]italics[/i]", "<i>italics</i>")]
    #[case("[u]underline[/u]", "<ins>underline</ins>")]
    #[case("[s]strike[/s]", "<s>strike</s>")]
    #[case("[tn]note[/tn]", "<sub><sup>note</sub></sup>")]
    #[case("[b]unterminated", "<b>unterminated</b>")]
    #[case("[spoilers]ssh![/spoilers]", "ssh!")]
    #[case("[quote]\nq\n[/quote]", "<blockquote>\nq\n</blockquote>")]
    #[case("[code]\nx = 1\n[/code]", "```\n\nx = 1\n```")]
    #[case("[nodtext][b]x[/b][/nodtext]", "[nodtext][b]x[/b][/nodtext]")]
    #[case("[expand]body[/expand]", "body")]
    #[case("[expand=Title]body[/expand]", "<h5>Title</h5>\n<hr>\nbody")]
    #[case("[url]https://a.b[/url]", "<a href=\"https://a.b\">https://a.b</a>")]
    #[case("[url=https://a.b]A[/url]", "<a href=\"https://a.b\">A</a>")]
    fn test_tag_rendering(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render_tags(input, false), expected);
    }

    #[test]
    fn test_wrapped_lines_drop_blank_lines() {
        let bold = Element::new(TagName::B, Span::default()).with_text(" a \n\n b ");
        let rendered = Renderer::new(false, Stage::Tags)
            .render(&root(vec![bold.into()]))
            .unwrap();
        assert_eq!(rendered, "<b>a</b>\n<b>b</b>");
    }

    #[test]
    fn test_table_ignores_loose_text() {
        let input = "[table]\n[colgroup][/colgroup]\n[tr]\n[td] a [/td]\n[td]b[/td]\n[/tr]\n[/table]";
        assert_eq!(
            render_tags(input, false),
            "<table>\n<tr>\n<td>a</td>\n<td>b</td>\n</tr>\n</table>"
        );
    }

    #[test]
    fn test_table_inside_quote_is_flattened() {
        assert_eq!(
            render_tags("[quote][table][tr][td]a[/td][/tr][/table][/quote]", false),
            "<blockquote>a</blockquote>"
        );
    }

    #[test]
    fn test_raw_text_keeps_only_strings() {
        assert_eq!(
            render_tags("[quote][b]a[/b] [url=https://x.y]b[/url][/quote]", true),
            "a b"
        );
        assert_eq!(
            render_tags("[nodtext][b]x[/b][/nodtext]", true),
            "[nodtext][b]x[/b][/nodtext]"
        );
    }

    #[test]
    fn test_raw_text_keeps_lines_apart() {
        let mut inner = Element::new(TagName::Ul, Span::default());
        inner
            .children
            .push(Element::new(TagName::Li, Span::default()).with_text("kitten").into());
        let mut list = Element::new(TagName::Ul, Span::default());
        list.children
            .push(Element::new(TagName::Li, Span::default()).with_text("cat").into());
        list.children.push(inner.into());
        list.children
            .push(Element::new(TagName::Li, Span::default()).with_text("dog").into());

        let tree = root(vec![
            Node::text("line", Span::default()),
            Element::new(TagName::Br, Span::default()).into(),
            Node::text("break\n", Span::default()),
            list.into(),
        ]);
        let rendered = Renderer::new(true, Stage::Inline).render(&tree).unwrap();
        assert_eq!(rendered, "line\nbreak\ncat\nkitten\ndog");
    }

    #[test]
    fn test_nodtext_is_unwrapped_inline() {
        let nodtext = Element::new(TagName::Nodtext, Span::default()).with_text("[b]x[/b]");
        let rendered = Renderer::new(false, Stage::Inline)
            .render(&root(vec![nodtext.into()]))
            .unwrap();
        assert_eq!(rendered, "[b]x[/b]");
    }

    #[test]
    fn test_heading_and_list() {
        let heading = Element::new(TagName::H, Span::default())
            .with_attribute("type", "2")
            .with_attribute("id", "top")
            .with_text("Title");
        let mut list = Element::new(TagName::Ul, Span::default());
        list.children
            .push(Element::new(TagName::Li, Span::default()).with_text("a").into());

        let rendered = Renderer::new(false, Stage::Inline)
            .render(&root(vec![heading.into(), Node::text("\n", Span::default()), list.into()]))
            .unwrap();
        assert_eq!(rendered, "<h2 id=\"top\">Title</h2>\n<ul>\n<li>a</li>\n</ul>");
    }

    #[test]
    fn test_code_with_tag_child_is_fatal() {
        let mut code = Element::new(TagName::Code, Span::new(3, 9));
        code.children
            .push(Element::new(TagName::B, Span::new(4, 8)).into());

        let result = Renderer::new(false, Stage::Tags).render(&root(vec![code.into()]));
        assert!(matches!(
            result,
            Err(Error::MalformedTree {
                tag: TagName::Code,
                position: 3,
                ..
            })
        ));
    }
}
