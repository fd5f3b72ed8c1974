// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot-to-human escalation seam.

/// Decides whether an inbound message should pull the conversation out
/// of bot handling and onto a queue.
pub trait EscalationPolicy: Send + Sync + 'static {
    fn should_escalate(&self, content: &str) -> bool;
}

/// Case-insensitive substring matching against a fixed keyword list.
///
/// The stock policy: phrases like "falar com atendente" anywhere in the
/// message trigger escalation.
pub struct KeywordEscalation {
    keywords: Vec<String>,
}

impl KeywordEscalation {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        KeywordEscalation {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl EscalationPolicy for KeywordEscalation {
    fn should_escalate(&self, content: &str) -> bool {
        let content = content.to_lowercase();
        self.keywords.iter().any(|k| content.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_keyword_anywhere_in_message() {
        let policy = KeywordEscalation::new(["falar com atendente", "human"]);
        assert!(policy.should_escalate("quero falar com atendente por favor"));
        assert!(policy.should_escalate("HUMAN please"));
        assert!(!policy.should_escalate("qual o horario de funcionamento?"));
    }

    #[test]
    fn matching_ignores_case_on_both_sides() {
        let policy = KeywordEscalation::new(["Falar Com Atendente"]);
        assert!(policy.should_escalate("FALAR COM ATENDENTE"));
    }

    #[test]
    fn empty_keyword_list_never_escalates() {
        let policy = KeywordEscalation::new(Vec::<String>::new());
        assert!(!policy.should_escalate("falar com atendente"));
    }
}
