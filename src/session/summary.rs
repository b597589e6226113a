//! Handoff digest for agents.

use super::{ChatMessage, ChatSession, Sender};

/// Messages shown in the digest.
const RECENT_MESSAGES: usize = 5;
/// Characters kept per message before `...` is appended.
const MAX_LINE_CHARS: usize = 100;

pub const EMPTY_SUMMARY: &str = "Tidak ada percakapan.";

/// Header with visitor identity and sentiment (when the session is known),
/// then the last few messages, one per line.
pub fn format_summary(session: Option<&ChatSession>, messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return EMPTY_SUMMARY.to_string();
    }

    let mut out = String::new();
    if let Some(s) = session {
        out.push_str(&format!(
            "Pengunjung: {} ({})\nSentimen: {}\n\n",
            s.visitor.visitor_name, s.visitor.visitor_email, s.sentiment
        ));
    }

    out.push_str("Ringkasan percakapan:\n");
    let start = messages.len().saturating_sub(RECENT_MESSAGES);
    for msg in &messages[start..] {
        out.push_str(&format!("{}: {}\n", prefix(msg.sender), truncate(&msg.content, MAX_LINE_CHARS)));
    }
    out
}

fn prefix(sender: Sender) -> &'static str {
    match sender {
        Sender::Visitor => "👤",
        Sender::Bot => "🤖",
        Sender::Admin => "👨‍💼",
        Sender::System => "⚙️",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::VisitorInfo;
    use chrono::Utc;

    fn msg(sender: Sender, content: &str) -> ChatMessage {
        ChatMessage::new("s1", sender, content)
    }

    #[test]
    fn empty_conversation() {
        assert_eq!(format_summary(None, &[]), EMPTY_SUMMARY);
    }

    #[test]
    fn keeps_last_five_with_prefixes() {
        let messages: Vec<_> = (0..7).map(|i| msg(Sender::Visitor, &format!("q{i}"))).collect();
        let out = format_summary(None, &messages);
        assert!(!out.contains("q1"));
        assert!(out.contains("👤: q2\n"));
        assert!(out.ends_with("👤: q6\n"));
        assert_eq!(out.lines().count(), 6);
    }

    #[test]
    fn header_from_session() {
        let mut visitor = VisitorInfo::new("v1", "Ani");
        visitor.visitor_email = "ani@example.com".into();
        let session = ChatSession::new(visitor, Utc::now());
        let out = format_summary(Some(&session), &[msg(Sender::Bot, "Halo"), msg(Sender::Admin, "Saya bantu")]);
        assert_eq!(
            out,
            "Pengunjung: Ani (ani@example.com)\nSentimen: neutral\n\nRingkasan percakapan:\n🤖: Halo\n👨‍💼: Saya bantu\n"
        );
    }

    #[test]
    fn truncation_is_char_safe() {
        let long = "é".repeat(150);
        let t = truncate(&long, MAX_LINE_CHARS);
        assert_eq!(t.chars().count(), 103);
        assert!(t.ends_with("..."));
        assert_eq!(truncate("pendek", MAX_LINE_CHARS), "pendek");
        assert_eq!(truncate(&"a".repeat(100), MAX_LINE_CHARS).len(), 100);
    }
}
