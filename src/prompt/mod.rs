//! Grounded prompt assembly
//!
//! Combines tier-specific instructions, worked exemplars, conversation
//! history, and retrieved evidence into a single instruction for the
//! language-model service. The tier decides how much latitude the model
//! gets: refusal when evidence is insufficient, strict grounding when it is
//! partial, flagged supplementation only when it is strong.

use crate::exemplars::Exemplar;
use crate::memory::{Role, Turn};
use crate::quality::{QualityAssessment, Tier};
use crate::retrieval::RetrievalResult;

pub struct PromptAssembler;

impl PromptAssembler {
    /// Build the full prompt for one turn
    pub fn build(
        query: &str,
        result: &RetrievalResult,
        assessment: &QualityAssessment,
        history: &[Turn],
        exemplars: &[Exemplar],
    ) -> String {
        let mut prompt = String::new();

        if !exemplars.is_empty() {
            prompt.push_str(&render_exemplars(exemplars));
        }

        let history_block = render_history(history);
        let evidence = render_evidence(result);

        if !assessment.should_answer {
            prompt.push_str(&refusal_prompt(query, &evidence, &history_block));
        } else if assessment.tier == Tier::Medium {
            prompt.push_str(&cautious_prompt(query, &evidence, &history_block));
        } else {
            prompt.push_str(&grounded_prompt(query, &evidence, &history_block));
        }

        prompt
    }
}

/// Worked examples, prepended before the instruction regardless of tier
fn render_exemplars(exemplars: &[Exemplar]) -> String {
    let mut block =
        String::from("Here are worked examples of the expected answer format and style:\n\n");

    for (i, exemplar) in exemplars.iter().enumerate() {
        block.push_str(&format!("[Example {}]\n", i + 1));
        block.push_str(&format!("Question: {}\n", exemplar.query));
        if let Some(context) = &exemplar.context {
            block.push_str(&format!("Evidence: {}\n", context));
        }
        block.push_str(&format!("Answer: {}\n\n", exemplar.answer));
    }

    block.push_str("---\n\n");
    block
}

/// Prior turns as alternating role-labelled lines
fn render_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut block = String::from("[Conversation history]\n");
    for turn in history {
        let label = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        block.push_str(&format!("{}: {}\n", label, turn.content));
    }
    block.push_str(
        "Use the history to resolve pronouns and references (\"he\", \"that book\").\n\n",
    );
    block
}

/// Passages concatenated with a blank-line separator
fn render_evidence(result: &RetrievalResult) -> String {
    result
        .passages()
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn refusal_prompt(query: &str, evidence: &str, history: &str) -> String {
    format!(
        "You are an honest knowledge-base assistant.\n\n\
         {history}[Knowledge base results]\n\
         {evidence}\n\n\
         [Important]\n\
         The knowledge base does not contain enough relevant information for this question.\n\
         - You must state clearly that no relevant information was found in the knowledge base.\n\
         - Do not invent or guess an answer.\n\
         - Do not answer from your general training knowledge.\n\n\
         [Question]\n\
         {query}",
        history = history,
        evidence = if evidence.is_empty() {
            "(no relevant passages found)"
        } else {
            evidence
        },
        query = query,
    )
}

fn cautious_prompt(query: &str, evidence: &str, history: &str) -> String {
    format!(
        "You are an honest knowledge-base assistant. Answer strictly from the evidence below.\n\n\
         {history}[Evidence]\n\
         {evidence}\n\n\
         [Rules]\n\
         1. Use only the evidence above.\n\
         2. The evidence is partial: when it cannot fully answer, say so explicitly \
         (\"based on the available material...\").\n\
         3. Do not invent anything that is not in the evidence.\n\
         4. Do not supplement from outside knowledge.\n\
         5. If unsure, say you are unsure rather than guessing.\n\n\
         [Question]\n\
         {query}",
        history = history,
        evidence = evidence,
        query = query,
    )
}

fn grounded_prompt(query: &str, evidence: &str, history: &str) -> String {
    format!(
        "You are a knowledge-base assistant. Answer the question from the evidence below.\n\n\
         {history}[Evidence]\n\
         {evidence}\n\n\
         [Rules]\n\
         1. Answer primarily from the evidence above.\n\
         2. You may add limited general knowledge only when clearly flagged as such.\n\
         3. Do not invent specific numbers, dates or names that are not in the evidence.\n\
         4. Quote short passages where helpful, and stay accurate to the source.\n\n\
         [Question]\n\
         {query}",
        history = history,
        evidence = evidence,
        query = query,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityConfig;
    use crate::quality::EvidenceGate;
    use crate::retrieval::Passage;

    fn assess(result: &RetrievalResult) -> QualityAssessment {
        EvidenceGate::new(&QualityConfig::default()).assess(result, "q")
    }

    fn passage(content: &str, score: f32) -> Passage {
        Passage::new(content, "work").with_score(score)
    }

    #[test]
    fn test_refusal_prompt_for_empty_evidence() {
        let result = RetrievalResult::empty();
        let assessment = assess(&result);

        let prompt = PromptAssembler::build("Who is Wu Song?", &result, &assessment, &[], &[]);

        assert!(prompt.contains("no relevant information was found"));
        assert!(prompt.contains("Do not answer from your general training knowledge"));
        assert!(prompt.contains("Who is Wu Song?"));
    }

    #[test]
    fn test_cautious_prompt_for_medium_tier() {
        let result = RetrievalResult::new(
            vec![
                passage(&"Wu Song killed a tiger on Jingyang Ridge. ".repeat(3), 0.65),
                passage(&"Wu Song is nicknamed the Pilgrim. ".repeat(3), 0.5),
            ],
            false,
        );
        let assessment = assess(&result);
        assert_eq!(assessment.tier, Tier::Medium);

        let prompt = PromptAssembler::build("Who is Wu Song?", &result, &assessment, &[], &[]);

        assert!(prompt.contains("Do not supplement from outside knowledge"));
        assert!(prompt.contains("Jingyang Ridge"));
    }

    #[test]
    fn test_grounded_prompt_for_good_tier() {
        let result = RetrievalResult::new(
            vec![
                passage(&"Evidence one about the tiger. ".repeat(4), 0.85),
                passage(&"Evidence two about the ridge. ".repeat(4), 0.8),
                passage(&"Evidence three about the hero. ".repeat(4), 0.7),
            ],
            false,
        );
        let assessment = assess(&result);
        assert_eq!(assessment.tier, Tier::Good);

        let prompt = PromptAssembler::build("Who is Wu Song?", &result, &assessment, &[], &[]);

        assert!(prompt.contains("limited general knowledge only when clearly flagged"));
    }

    #[test]
    fn test_evidence_joined_with_blank_lines() {
        let result = RetrievalResult::new(
            vec![
                passage(&"First passage text here. ".repeat(4), 0.85),
                passage(&"Second passage text here. ".repeat(4), 0.8),
                passage(&"Third passage text here. ".repeat(4), 0.7),
            ],
            false,
        );
        let assessment = assess(&result);
        let prompt = PromptAssembler::build("q", &result, &assessment, &[], &[]);

        assert!(prompt.contains("First passage text here."));
        assert!(prompt.contains("\n\nSecond passage text here."));
    }

    #[test]
    fn test_history_rendered_with_role_labels() {
        let result = RetrievalResult::empty();
        let assessment = assess(&result);
        let history = vec![
            Turn::user("Who is Lin Chong?"),
            Turn::assistant("An arms instructor forced to join Mount Liang."),
        ];

        let prompt =
            PromptAssembler::build("What happened to him?", &result, &assessment, &history, &[]);

        assert!(prompt.contains("User: Who is Lin Chong?"));
        assert!(prompt.contains("Assistant: An arms instructor"));
    }

    #[test]
    fn test_exemplars_prepended_regardless_of_tier() {
        let result = RetrievalResult::empty();
        let assessment = assess(&result);
        let exemplars = vec![Exemplar {
            query: "Who is Lu Zhishen?".to_string(),
            context: Some("Lu Zhishen uprooted a willow tree.".to_string()),
            answer: "Lu Zhishen is the Flowery Monk.".to_string(),
        }];

        let prompt = PromptAssembler::build("q", &result, &assessment, &[], &exemplars);

        assert!(prompt.starts_with("Here are worked examples"));
        assert!(prompt.contains("[Example 1]"));
        assert!(prompt.contains("Lu Zhishen is the Flowery Monk."));
        // exemplars come before the tier instruction
        let exemplar_pos = prompt.find("[Example 1]").unwrap();
        let instruction_pos = prompt.find("[Important]").unwrap();
        assert!(exemplar_pos < instruction_pos);
    }
}
