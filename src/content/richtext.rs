//! Rich text to HTML rendering
//!
//! Block text is entity-escaped. Hyperlink targets and embed HTML come from
//! the content repository and are emitted as-is.

use super::{RichTextBlock, Span};
use crate::helpers::html_escape;

/// Render a sequence of rich-text blocks as HTML
///
/// Consecutive `list-item` and `o-list-item` blocks are grouped into a
/// single `<ul>` or `<ol>`.
pub fn as_html(blocks: &[RichTextBlock]) -> String {
    let mut html = String::new();
    let mut open_list: Option<&'static str> = None;

    for block in blocks {
        let list = match block.kind.as_str() {
            "list-item" => Some("ul"),
            "o-list-item" => Some("ol"),
            _ => None,
        };

        if open_list != list {
            if let Some(tag) = open_list {
                html.push_str(&format!("</{}>", tag));
            }
            if let Some(tag) = list {
                html.push_str(&format!("<{}>", tag));
            }
            open_list = list;
        }

        html.push_str(&render_block(block));
    }

    if let Some(tag) = open_list {
        html.push_str(&format!("</{}>", tag));
    }

    html
}

fn render_block(block: &RichTextBlock) -> String {
    match block.kind.as_str() {
        "heading1" | "heading2" | "heading3" | "heading4" | "heading5" | "heading6" => {
            let level = &block.kind["heading".len()..];
            format!(
                "<h{}>{}</h{}>",
                level,
                render_spans(&block.text, &block.spans),
                level
            )
        }
        "preformatted" => format!("<pre>{}</pre>", render_spans(&block.text, &block.spans)),
        "list-item" | "o-list-item" => {
            format!("<li>{}</li>", render_spans(&block.text, &block.spans))
        }
        "image" => format!(
            r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
            html_escape(block.url.as_deref().unwrap_or("")),
            html_escape(block.alt.as_deref().unwrap_or(""))
        ),
        "embed" => match &block.oembed {
            Some(embed) => format!(
                r#"<div data-oembed="{}" data-oembed-type="{}">{}</div>"#,
                html_escape(&embed.embed_url),
                html_escape(&embed.kind),
                embed.html.as_deref().unwrap_or("")
            ),
            None => String::new(),
        },
        _ => format!("<p>{}</p>", render_spans(&block.text, &block.spans)),
    }
}

/// Render block text with its inline spans applied
///
/// Overlapping spans are closed and reopened so the output stays well nested.
fn render_spans(text: &str, spans: &[Span]) -> String {
    let len = text.encode_utf16().count();
    // Spans that cover no text would render as empty elements
    let mut order: Vec<usize> = (0..spans.len())
        .filter(|&i| spans[i].start < spans[i].end.min(len))
        .collect();
    // Wider spans open first so they enclose narrower ones starting at the same offset
    order.sort_by(|&a, &b| {
        spans[a]
            .start
            .cmp(&spans[b].start)
            .then(spans[b].end.cmp(&spans[a].end))
    });

    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<usize> = Vec::new();
    let mut next = 0;
    let mut pos = 0;
    let mut chars = text.chars();

    loop {
        if let Some(depth) = stack.iter().position(|&i| spans[i].end <= pos) {
            let closed: Vec<usize> = stack.drain(depth..).collect();
            for &i in closed.iter().rev() {
                out.push_str(close_tag(&spans[i]));
            }
            for &i in &closed {
                if spans[i].end > pos {
                    out.push_str(&open_tag(&spans[i]));
                    stack.push(i);
                }
            }
        }

        while next < order.len() && spans[order[next]].start <= pos {
            let i = order[next];
            if spans[i].end > pos {
                out.push_str(&open_tag(&spans[i]));
                stack.push(i);
            }
            next += 1;
        }

        match chars.next() {
            Some(c) => {
                push_escaped(&mut out, c);
                pos += c.len_utf16();
            }
            None => break,
        }
    }

    while let Some(i) = stack.pop() {
        out.push_str(close_tag(&spans[i]));
    }

    out
}

fn open_tag(span: &Span) -> String {
    match span.kind.as_str() {
        "strong" => "<strong>".to_string(),
        "em" => "<em>".to_string(),
        "hyperlink" => {
            let data = span.data.as_ref();
            let url = data.and_then(|d| d.url.as_deref()).unwrap_or("");
            match data.and_then(|d| d.target.as_deref()) {
                Some(target) => format!(
                    r#"<a href="{}" target="{}" rel="noopener">"#,
                    html_escape(url),
                    html_escape(target)
                ),
                None => format!(r#"<a href="{}">"#, html_escape(url)),
            }
        }
        "label" => {
            let label = span
                .data
                .as_ref()
                .and_then(|d| d.label.as_deref())
                .unwrap_or("");
            format!(r#"<span class="{}">"#, html_escape(label))
        }
        _ => "<span>".to_string(),
    }
}

fn close_tag(span: &Span) -> &'static str {
    match span.kind.as_str() {
        "strong" => "</strong>",
        "em" => "</em>",
        "hyperlink" => "</a>",
        _ => "</span>",
    }
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        '\n' => out.push_str("<br />"),
        _ => out.push(c),
    }
}
