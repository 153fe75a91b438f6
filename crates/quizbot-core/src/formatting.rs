//! Formatting utilities (Telegram HTML escaping, button labels, menu bodies).

use crate::domain::{Answer, Question};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Collapse whitespace and cut to `max_chars`, appending `…` when cut.
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    let one_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() <= max_chars {
        return one_line;
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = one_line.chars().take(keep).collect();
    out.push('…');
    out
}

pub fn question_card(question: &Question, answers: &[Answer]) -> String {
    let mut out = format!("<b>Question #{}</b>\n{}", question.id, question.text);
    if question.image.is_some() {
        out.push_str("\n\n🖼 image attached");
    }
    if question.is_sent {
        out.push_str("\n📤 already sent");
    }
    if answers.is_empty() {
        out.push_str("\n\n<i>No answers yet.</i>");
    } else {
        out.push_str("\n\n<b>Answers</b>");
        for a in answers {
            out.push_str(&format!("\n• {} ({} pts)", escape_html(&a.text), a.cost));
        }
    }
    out
}

/// Quiz body as posted to a channel: just the question.
pub fn quiz_body(question: &Question) -> String {
    question.text.clone()
}

/// Inline formatting span. Offsets and lengths count UTF-16 code units, the
/// way Telegram reports message entities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextStyle {
    pub kind: StyleKind,
    pub offset: usize,
    pub length: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StyleKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre(Option<String>),
    Link(String),
}

impl StyleKind {
    fn open_tag(&self) -> String {
        match self {
            StyleKind::Bold => "<b>".to_string(),
            StyleKind::Italic => "<i>".to_string(),
            StyleKind::Underline => "<u>".to_string(),
            StyleKind::Strikethrough => "<s>".to_string(),
            StyleKind::Spoiler => "<tg-spoiler>".to_string(),
            StyleKind::Code => "<code>".to_string(),
            StyleKind::Pre(None) => "<pre>".to_string(),
            StyleKind::Pre(Some(lang)) => {
                format!("<pre><code class=\"language-{}\">", escape_html(lang))
            }
            StyleKind::Link(url) => format!("<a href=\"{}\">", escape_html(url)),
        }
    }

    fn close_tag(&self) -> &'static str {
        match self {
            StyleKind::Bold => "</b>",
            StyleKind::Italic => "</i>",
            StyleKind::Underline => "</u>",
            StyleKind::Strikethrough => "</s>",
            StyleKind::Spoiler => "</tg-spoiler>",
            StyleKind::Code => "</code>",
            StyleKind::Pre(None) => "</pre>",
            StyleKind::Pre(Some(_)) => "</code></pre>",
            StyleKind::Link(_) => "</a>",
        }
    }
}

impl TextStyle {
    fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Render `text` with its formatting spans as Telegram HTML.
///
/// Spans that overlap without nesting are closed and reopened so the output
/// stays well formed.
pub fn styled_html(text: &str, styles: &[TextStyle]) -> String {
    let mut spans: Vec<&TextStyle> = styles.iter().filter(|s| s.length > 0).collect();
    spans.sort_by(|a, b| a.offset.cmp(&b.offset).then(b.length.cmp(&a.length)));
    let mut pending = spans.into_iter().peekable();

    let mut open: Vec<&TextStyle> = Vec::new();
    let mut out = String::with_capacity(text.len() + 16);
    let mut pos = 0usize;
    for ch in text.chars() {
        close_spans(&mut out, &mut open, pos);
        while let Some(span) = pending.next_if(|s| s.offset <= pos) {
            out.push_str(&span.kind.open_tag());
            open.push(span);
        }
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
        pos += ch.len_utf16();
    }
    close_spans(&mut out, &mut open, usize::MAX);
    out
}

fn close_spans<'a>(out: &mut String, open: &mut Vec<&'a TextStyle>, pos: usize) {
    let Some(first) = open.iter().position(|s| s.end() <= pos) else {
        return;
    };
    let unwound: Vec<&TextStyle> = open.drain(first..).collect();
    for span in unwound.iter().rev() {
        out.push_str(span.kind.close_tag());
    }
    for span in unwound {
        if span.end() > pos {
            out.push_str(&span.kind.open_tag());
            open.push(span);
        }
    }
}

/// Strip tags and entities from Telegram HTML, for button labels and exports.
pub fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
