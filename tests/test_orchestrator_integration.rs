//! Orchestrator integration tests
//!
//! Runs the full answer pipeline against in-process collaborators: a seeded
//! vector index, a scripted LLM, and (where needed) an external search stub.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use loreqa::catalog::{TagCatalog, TagFilter};
use loreqa::config::Config;
use loreqa::error::LoreqaError;
use loreqa::exemplars::{ExemplarLibrary, QueryKind};
use loreqa::llm::{ChatMessage, ChunkStream, LlmError, LlmService};
use loreqa::orchestrator::Orchestrator;
use loreqa::quality::Tier;
use loreqa::retrieval::{IndexError, Passage, PassageIndex};

/// Index stub returning fixed passages and recording the requested fan-out
struct SeededIndex {
    passages: Vec<Passage>,
    last_k: AtomicUsize,
}

impl SeededIndex {
    fn new(passages: Vec<Passage>) -> Arc<Self> {
        Arc::new(Self {
            passages,
            last_k: AtomicUsize::new(0),
        })
    }

    fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl PassageIndex for SeededIndex {
    async fn query(
        &self,
        _text: &str,
        k: usize,
        filter: Option<&TagFilter>,
    ) -> Result<Vec<Passage>, IndexError> {
        self.last_k.store(k, Ordering::SeqCst);
        Ok(self
            .passages
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.tags)))
            .take(k)
            .cloned()
            .collect())
    }
}

/// LLM stub that records every prompt and answers with canned text
struct ScriptedLlm {
    prompts: Mutex<Vec<String>>,
    reply: String,
}

impl ScriptedLlm {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        Ok(self.reply.clone())
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        self.invoke(messages).await?;
        let chunks: Vec<Result<String, LlmError>> = self
            .reply
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// LLM stub whose calls always fail
struct BrokenLlm;

#[async_trait]
impl LlmService for BrokenLlm {
    async fn invoke(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        Err(LlmError::Status {
            status: 401,
            body: "invalid api key".to_string(),
        })
    }

    async fn stream(&self, _messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        Err(LlmError::Timeout)
    }
}

/// LLM stub whose stream dies midway through the response
struct InterruptedLlm;

#[async_trait]
impl LlmService for InterruptedLlm {
    async fn invoke(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        unreachable!("streaming only")
    }

    async fn stream(&self, _messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        let chunks: Vec<Result<String, LlmError>> = vec![
            Ok("partial ".to_string()),
            Err(LlmError::Stream("connection reset".to_string())),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

fn tagged_passage(content: &str, work: &str, score: f32) -> Passage {
    let catalog = TagCatalog::default();
    let mut passage = Passage::new(content, work).with_score(score);
    if let Some(entry) = catalog.work(work) {
        passage.tags = entry.tags(work);
    }
    passage
}

fn build_orchestrator(index: Arc<SeededIndex>, llm: Arc<dyn LlmService>) -> Orchestrator {
    let config = Config::default();
    Orchestrator::new(
        &config,
        &TagCatalog::default(),
        ExemplarLibrary::default(),
        index,
        None,
        llm,
    )
}

fn strong_evidence() -> Vec<Passage> {
    vec![
        tagged_passage(
            &"Wu Song came to Jingyang Ridge and met the tiger at dusk. ".repeat(2),
            "water-margin",
            0.85,
        ),
        tagged_passage(
            &"With his bare hands Wu Song beat the beast to death. ".repeat(2),
            "water-margin",
            0.82,
        ),
        tagged_passage(
            &"The county honored Wu Song as a hero for the deed. ".repeat(2),
            "water-margin",
            0.78,
        ),
    ]
}

#[tokio::test]
async fn test_empty_corpus_refuses() {
    // Scenario A: no passages, no external endpoint
    let llm = ScriptedLlm::new("I found no relevant information in the knowledge base.");
    let mut orchestrator = build_orchestrator(SeededIndex::empty(), llm.clone());

    let answer = orchestrator.answer("What is quantum entanglement?").await.unwrap();

    assert_eq!(answer.diagnostics.tier, Tier::Poor);
    assert!(!answer.diagnostics.external_consulted);
    assert_eq!(answer.diagnostics.passage_count, 0);

    let prompt = llm.last_prompt();
    assert!(prompt.contains("no relevant information was found"));
    assert!(prompt.contains("Do not answer from your general training knowledge"));
}

#[tokio::test]
async fn test_strong_evidence_answers() {
    // Scenario C: three passages, similarity 0.85
    let llm = ScriptedLlm::new("Wu Song killed the tiger bare-handed on Jingyang Ridge.");
    let index = SeededIndex::new(strong_evidence());
    let mut orchestrator = build_orchestrator(index, llm.clone());

    let answer = orchestrator.answer("Who is Wu Song?").await.unwrap();

    assert_eq!(answer.diagnostics.tier, Tier::Good);
    assert!((answer.diagnostics.confidence - 0.85).abs() < f32::EPSILON);
    assert_eq!(answer.diagnostics.passage_count, 3);
    assert_eq!(answer.text, "Wu Song killed the tiger bare-handed on Jingyang Ridge.");

    // exchange committed to memory
    assert_eq!(answer.diagnostics.memory_len, 2);
    assert_eq!(orchestrator.history().len(), 2);
}

#[tokio::test]
async fn test_fast_path_widens_fan_out() {
    // Scenario E: catalog keyword in the query raises k from 5 to 8
    let llm = ScriptedLlm::new("answer");
    let index = SeededIndex::new(strong_evidence());
    let mut orchestrator = build_orchestrator(index.clone(), llm);

    let answer = orchestrator.answer("Tell me about Wu Song").await.unwrap();

    assert!(answer.diagnostics.fast_path);
    assert_eq!(answer.diagnostics.requested_k, 8);
    assert_eq!(index.last_k.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_unrouted_query_uses_baseline_fan_out() {
    let llm = ScriptedLlm::new("answer");
    let index = SeededIndex::empty();
    let mut orchestrator = build_orchestrator(index.clone(), llm);

    let answer = orchestrator.answer("what is the meaning of life").await.unwrap();

    assert!(!answer.diagnostics.fast_path);
    assert_eq!(answer.diagnostics.requested_k, 5);
    assert_eq!(index.last_k.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_exemplar_category_in_diagnostics() {
    let llm = ScriptedLlm::new("answer");
    let mut orchestrator = build_orchestrator(SeededIndex::new(strong_evidence()), llm.clone());

    let answer = orchestrator.answer("Who is Wu Song?").await.unwrap();
    assert_eq!(answer.diagnostics.exemplar_kind, Some(QueryKind::Identity));

    // the worked examples land in the prompt
    assert!(llm.last_prompt().contains("worked examples"));
}

#[tokio::test]
async fn test_work_filter_restricts_retrieval() {
    let mut passages = strong_evidence();
    passages.push(tagged_passage(
        &"Sun Wukong leapt out of the stone egg on the mountain. ".repeat(2),
        "journey-to-the-west",
        0.9,
    ));

    let llm = ScriptedLlm::new("answer");
    let index = SeededIndex::new(passages);
    let mut orchestrator = build_orchestrator(index, llm.clone());

    let catalog = TagCatalog::default();
    let filter = catalog.work_filter("journey-to-the-west").unwrap();
    let answer = orchestrator
        .answer_filtered("Where was the Monkey King born?", Some(&filter))
        .await
        .unwrap();

    assert_eq!(answer.diagnostics.passage_count, 1);
    assert!(llm.last_prompt().contains("stone egg"));
    assert!(!llm.last_prompt().contains("Jingyang Ridge"));
}

#[tokio::test]
async fn test_generation_failure_is_typed_and_commits_nothing() {
    let mut orchestrator = build_orchestrator(SeededIndex::new(strong_evidence()), Arc::new(BrokenLlm));

    let result = orchestrator.answer("Who is Wu Song?").await;

    assert!(matches!(result, Err(LoreqaError::Llm(_))));
    assert!(orchestrator.history().is_empty());
}

#[tokio::test]
async fn test_streaming_commits_full_text_once() {
    let llm = ScriptedLlm::new("the tiger died on the ridge");
    let mut orchestrator = build_orchestrator(SeededIndex::new(strong_evidence()), llm);

    let mut seen = String::new();
    let answer = orchestrator
        .answer_streamed("Who is Wu Song?", |chunk| seen.push_str(chunk))
        .await
        .unwrap();

    assert_eq!(seen, "the tiger died on the ridge");
    assert_eq!(answer.text, seen);
    assert_eq!(orchestrator.history().len(), 2);
    assert_eq!(orchestrator.history()[1].content, seen);
}

#[tokio::test]
async fn test_interrupted_stream_commits_nothing() {
    let mut orchestrator =
        build_orchestrator(SeededIndex::new(strong_evidence()), Arc::new(InterruptedLlm));

    let mut seen = String::new();
    let result = orchestrator
        .answer_streamed("Who is Wu Song?", |chunk| seen.push_str(chunk))
        .await;

    assert!(result.is_err());
    assert_eq!(seen, "partial ");
    // no partial turn may reach memory
    assert!(orchestrator.history().is_empty());
}

#[tokio::test]
async fn test_memory_window_over_many_turns() {
    // Scenario D at the orchestrator level: window 5, 7 exchanges
    let llm = ScriptedLlm::new("noted");
    let mut orchestrator = build_orchestrator(SeededIndex::new(strong_evidence()), llm);

    let mut last = None;
    for i in 0..7 {
        last = Some(
            orchestrator
                .answer(&format!("question number {}", i))
                .await
                .unwrap(),
        );
    }

    let answer = last.unwrap();
    assert_eq!(answer.diagnostics.memory_len, 10);

    let history = orchestrator.history();
    assert_eq!(history.len(), 10);
    assert_eq!(history[0].content, "question number 2");
    assert_eq!(history[8].content, "question number 6");
}

#[tokio::test]
async fn test_history_flows_into_prompt() {
    let llm = ScriptedLlm::new("He was an arms instructor.");
    let mut orchestrator = build_orchestrator(SeededIndex::new(strong_evidence()), llm.clone());

    orchestrator.answer("Who is Lin Chong?").await.unwrap();
    orchestrator.answer("What happened to him?").await.unwrap();

    let prompt = llm.last_prompt();
    assert!(prompt.contains("[Conversation history]"));
    assert!(prompt.contains("User: Who is Lin Chong?"));
    assert!(prompt.contains("Assistant: He was an arms instructor."));
}

#[tokio::test]
async fn test_clear_memory() {
    let llm = ScriptedLlm::new("answer");
    let mut orchestrator = build_orchestrator(SeededIndex::new(strong_evidence()), llm);

    orchestrator.answer("Who is Wu Song?").await.unwrap();
    assert!(!orchestrator.history().is_empty());

    orchestrator.clear_memory();
    assert!(orchestrator.history().is_empty());
}
