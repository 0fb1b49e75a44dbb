// content-gate-broker/src/render.rs
// ============================================================================
// Module: Message Rendering
// Description: HTML text bodies for channel messages.
// Purpose: Keep message formatting identical across channels.
// Dependencies: content-gate-core
// ============================================================================

//! ## Overview
//! Titles and summaries are untrusted author input; every interpolated value
//! is HTML-escaped before it reaches a channel that renders markup.

use content_gate_core::ChannelMessage;
use content_gate_core::ContentType;

/// Broadcast caption limit for media posts.
pub(crate) const CAPTION_LIMIT: usize = 1024;

/// Broadcast text limit for plain posts.
pub(crate) const TEXT_LIMIT: usize = 4096;

/// Separator between post sections.
const PARAGRAPH: &str = "\n\n";

/// Marks a shortened title or summary.
const ELLIPSIS: char = '\u{2026}';

/// Escapes `&`, `<`, `>`, and `"`.
pub(crate) fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Human label for a content type.
const fn type_label(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Article => "New article",
        ContentType::Video => "New video",
        ContentType::Resource => "New resource",
    }
}

/// Renders the broadcast post body within `limit` characters of markup.
///
/// The link is always emitted whole. The title and then the summary give up
/// characters to fit, and are cut before escaping so no entity or tag is
/// split.
pub(crate) fn broadcast_text(message: &ChannelMessage, limit: usize) -> String {
    let label = type_label(message.content_type);
    let link = format!("<a href=\"{}\">Read more</a>", html_escape(&message.url));
    let link_len = link.chars().count();
    let frame_len = "<b>: </b>\n\n".chars().count() + label.chars().count() + link_len;
    let title = escape_within(&message.title, limit.saturating_sub(frame_len));
    let mut text = format!("<b>{label}: {title}</b>");

    if let Some(summary) = message.summary.as_deref().filter(|summary| !summary.is_empty()) {
        let used = text.chars().count() + PARAGRAPH.len() + link_len;
        let budget = limit.saturating_sub(used + PARAGRAPH.len());
        let summary = escape_within(summary, budget);
        if !summary.is_empty() {
            text.push_str(PARAGRAPH);
            text.push_str(&summary);
        }
    }
    text.push_str(PARAGRAPH);
    text.push_str(&link);
    text
}

/// Renders the email subject line.
pub(crate) fn email_subject(message: &ChannelMessage) -> String {
    format!("{}: {}", type_label(message.content_type), message.title)
}

/// Renders the email HTML body.
pub(crate) fn email_html(message: &ChannelMessage) -> String {
    let mut html = format!("<h1>{}</h1>", html_escape(&message.title));
    if let Some(media_url) = &message.media_url {
        html.push_str(&format!("<p><img src=\"{}\" alt=\"\"></p>", html_escape(media_url)));
    }
    if let Some(summary) = message.summary.as_deref().filter(|summary| !summary.is_empty()) {
        html.push_str(&format!("<p>{}</p>", html_escape(summary)));
    }
    html.push_str(&format!("<p><a href=\"{}\">Read more</a></p>", html_escape(&message.url)));
    html
}

/// Escapes `value`, keeping the escaped form within `budget` characters.
///
/// A shortened value ends in an ellipsis, or is empty when not even one
/// character fits. Escapes are never split.
fn escape_within(value: &str, budget: usize) -> String {
    let escaped = html_escape(value);
    if escaped.chars().count() <= budget {
        return escaped;
    }
    let mut out = String::new();
    let mut used = 0;
    let mut piece = [0_u8; 4];
    for ch in value.chars() {
        let escaped = html_escape(ch.encode_utf8(&mut piece));
        let len = escaped.chars().count();
        if used + len + 1 > budget {
            break;
        }
        out.push_str(&escaped);
        used += len;
    }
    if !out.is_empty() {
        out.push(ELLIPSIS);
    }
    out
}

#[cfg(test)]
mod tests {
    use content_gate_core::ChannelMessage;
    use content_gate_core::ContentId;
    use content_gate_core::ContentType;

    use super::CAPTION_LIMIT;
    use super::broadcast_text;
    use super::email_html;
    use super::html_escape;

    fn message() -> ChannelMessage {
        ChannelMessage {
            content_type: ContentType::Article,
            content_id: ContentId::new("a-1"),
            title: "Rust & <friends>".to_string(),
            summary: Some("Ownership \"explained\"".to_string()),
            url: "https://example.com/a?x=1&y=2".to_string(),
            media_url: None,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn broadcast_text_escapes_author_input() {
        let text = broadcast_text(&message(), 4096);
        assert!(text.starts_with("<b>New article: Rust &amp; &lt;friends&gt;</b>"));
        assert!(text.contains("Ownership &quot;explained&quot;"));
        assert!(text.contains("href=\"https://example.com/a?x=1&amp;y=2\""));
    }

    #[test]
    fn broadcast_text_respects_limit() {
        let mut long = message();
        long.summary = Some("é".repeat(5_000));
        let text = broadcast_text(&long, 1024);
        assert_eq!(text.chars().count(), 1024);
        assert!(text.ends_with("<a href=\"https://example.com/a?x=1&amp;y=2\">Read more</a>"));
    }

    #[test]
    fn caption_truncation_keeps_link_and_entities_whole() {
        let mut long = message();
        long.summary = Some("Tom & Jerry <3 ".repeat(66));
        assert_eq!(long.summary.as_deref().map(str::len), Some(990));
        let text = broadcast_text(&long, CAPTION_LIMIT);
        assert!(text.chars().count() <= CAPTION_LIMIT);
        assert!(text.ends_with("Read more</a>"));
        assert!(text.contains("<a href=\"https://example.com/a?x=1&amp;y=2\">"));
        assert!(text.contains('\u{2026}'));
        for (index, _) in text.match_indices('&') {
            let rest = &text[index..];
            assert!(
                ["&amp;", "&lt;", "&gt;", "&quot;"].iter().any(|entity| rest.starts_with(entity)),
                "split entity at {index}: {rest}"
            );
        }
    }

    #[test]
    fn oversized_title_still_leaves_room_for_link() {
        let mut long = message();
        long.title = "<".repeat(2_000);
        long.summary = Some("dropped".to_string());
        let text = broadcast_text(&long, CAPTION_LIMIT);
        assert!(text.chars().count() <= CAPTION_LIMIT);
        assert!(text.starts_with("<b>New article: &lt;"));
        assert!(text.contains("\u{2026}</b>\n\n<a href="));
        assert!(text.ends_with("Read more</a>"));
        assert!(!text.contains("dropped"));
    }

    #[test]
    fn short_message_is_untouched() {
        let text = broadcast_text(&message(), CAPTION_LIMIT);
        assert_eq!(
            text,
            "<b>New article: Rust &amp; &lt;friends&gt;</b>\n\nOwnership &quot;explained&quot;\n\n\
             <a href=\"https://example.com/a?x=1&amp;y=2\">Read more</a>"
        );
    }

    #[test]
    fn email_html_skips_empty_summary() {
        let mut msg = message();
        msg.summary = Some(String::new());
        let html = email_html(&msg);
        assert_eq!(html.matches("<p>").count(), 1);
    }
}
