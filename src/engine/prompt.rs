//! Prompt assembly: system instruction + knowledge block + windowed history.

use crate::knowledge::KnowledgeItem;
use crate::llm::PromptMessage;

/// Built-in system instruction, used when `[engine] system_prompt_file` is unset.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../../config/prompts/system.txt");

const RELEVANT_HEADER: &str = "\n\nINFORMASI RELEVAN:\n";

/// System instruction, followed by a bulleted `topic: answer` block when any
/// knowledge item matched.
pub fn build_system_prompt(base: &str, relevant: &[&KnowledgeItem]) -> String {
    if relevant.is_empty() {
        return base.to_string();
    }

    let mut out = String::from(base);
    out.push_str(RELEVANT_HEADER);
    for item in relevant {
        out.push_str(&format!("- {}: {}\n", item.topic, item.answer));
    }
    out
}

/// `[system, last `window` history entries…, user]`.
pub fn assemble(system: String, history: &[PromptMessage], window: usize, user_message: &str) -> Vec<PromptMessage> {
    let start = history.len().saturating_sub(window);
    let mut messages = Vec::with_capacity(history.len() - start + 2);
    messages.push(PromptMessage::system(system));
    messages.extend_from_slice(&history[start..]);
    messages.push(PromptMessage::user(user_message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptRole;

    fn item(topic: &str, answer: &str) -> KnowledgeItem {
        KnowledgeItem {
            topic: topic.into(),
            question: String::new(),
            answer: answer.into(),
            keywords: vec![],
        }
    }

    #[test]
    fn no_knowledge_keeps_base() {
        assert_eq!(build_system_prompt("base", &[]), "base");
    }

    #[test]
    fn knowledge_block_appended() {
        let a = item("PT", "Akta + SK");
        let b = item("ISO", "9001");
        let out = build_system_prompt("base", &[&a, &b]);
        assert_eq!(out, "base\n\nINFORMASI RELEVAN:\n- PT: Akta + SK\n- ISO: 9001\n");
    }

    #[test]
    fn history_windowed_to_most_recent() {
        let history: Vec<_> = (0..15).map(|i| PromptMessage::user(format!("h{i}"))).collect();
        let msgs = assemble("sys".into(), &history, 10, "now");
        assert_eq!(msgs.len(), 12);
        assert_eq!(msgs[0].role, PromptRole::System);
        assert_eq!(msgs[1].content, "h5");
        assert_eq!(msgs[10].content, "h14");
        assert_eq!(msgs[11], PromptMessage::user("now"));
    }

    #[test]
    fn short_history_forwarded_whole() {
        let history = vec![PromptMessage::user("a"), PromptMessage::assistant("b")];
        let msgs = assemble("sys".into(), &history, 10, "c");
        let contents: Vec<_> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "a", "b", "c"]);
    }

    #[test]
    fn default_prompt_is_present() {
        assert!(!DEFAULT_SYSTEM_PROMPT.trim().is_empty());
    }
}
