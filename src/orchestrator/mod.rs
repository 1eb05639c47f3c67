//! Turn orchestration
//!
//! The top-level `answer(query)` entry point: route, retrieve, gate,
//! select exemplars, assemble the prompt, call the model, commit memory.
//! One orchestrator owns one conversation; calls against the same
//! orchestrator must be issued one at a time.

use crate::catalog::{TagCatalog, TagFilter};
use crate::config::Config;
use crate::error::Result;
use crate::exemplars::{ExemplarLibrary, ExemplarSelector, QueryKind};
use crate::llm::{ChatMessage, LlmService};
use crate::memory::{ConversationMemory, Turn};
use crate::prompt::PromptAssembler;
use crate::quality::{EvidenceGate, Tier};
use crate::retrieval::{ExternalSearch, HybridRetriever, PassageIndex};
use crate::routing::KeywordRouter;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Exemplars drawn per category when assembling a prompt
const MAX_EXEMPLARS_PER_CATEGORY: usize = 2;

/// Everything observable about how one turn was decided.
/// Returned by value with the answer; never stored as mutable state.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub session_id: Uuid,
    pub at: DateTime<Utc>,
    /// Retrieval fan-out actually requested
    pub requested_k: usize,
    pub fast_path: bool,
    pub route_reason: String,
    pub tier: Tier,
    pub confidence: f32,
    pub external_consulted: bool,
    pub exemplar_kind: Option<QueryKind>,
    pub passage_count: usize,
    /// Stored memory turns after this exchange committed
    pub memory_len: usize,
}

/// One answered turn
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub diagnostics: Diagnostics,
}

pub struct Orchestrator {
    session_id: Uuid,
    router: KeywordRouter,
    retriever: HybridRetriever,
    gate: EvidenceGate,
    selector: ExemplarSelector,
    memory: ConversationMemory,
    llm: Arc<dyn LlmService>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        catalog: &TagCatalog,
        exemplars: ExemplarLibrary,
        index: Arc<dyn PassageIndex>,
        external: Option<Arc<dyn ExternalSearch>>,
        llm: Arc<dyn LlmService>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        tracing::info!(%session_id, "orchestrator session started");

        Self {
            session_id,
            router: KeywordRouter::new(catalog, &config.retrieval),
            retriever: HybridRetriever::new(index, external, &config.retrieval),
            gate: EvidenceGate::new(&config.quality),
            selector: ExemplarSelector::new(exemplars),
            memory: ConversationMemory::new(config.memory.window),
            llm,
        }
    }

    /// Answer a query against the whole corpus
    pub async fn answer(&mut self, query: &str) -> Result<Answer> {
        self.answer_filtered(query, None).await
    }

    /// Answer a query, optionally constrained to one tag value
    pub async fn answer_filtered(
        &mut self,
        query: &str,
        filter: Option<&TagFilter>,
    ) -> Result<Answer> {
        let (prompt, partial) = self.prepare(query, filter).await;

        let messages = [ChatMessage::user(prompt)];
        let text = self.llm.invoke(&messages).await?;

        Ok(self.commit(query, text, partial))
    }

    /// Answer with incremental output: `on_chunk` receives each text chunk
    /// in order as it arrives. The exchange is committed to memory only once
    /// the stream finishes; a failure or a dropped stream commits nothing.
    pub async fn answer_streamed(
        &mut self,
        query: &str,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<Answer> {
        let (prompt, partial) = self.prepare(query, None).await;

        let messages = [ChatMessage::user(prompt)];
        let mut chunks = self.llm.stream(&messages).await?;

        let mut text = String::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            on_chunk(&chunk);
            text.push_str(&chunk);
        }

        Ok(self.commit(query, text, partial))
    }

    /// Everything up to the model call; retrieval failures degrade inside
    async fn prepare(
        &mut self,
        query: &str,
        filter: Option<&TagFilter>,
    ) -> (String, PartialDiagnostics) {
        let decision = self.router.route(query);
        let k = self.router.fan_out(&decision);
        tracing::debug!(
            fast_path = decision.fast_path,
            k,
            reason = %decision.reason,
            "routed query"
        );

        let result = self.retriever.retrieve(query, k, filter).await;
        let assessment = self.gate.assess(&result, query);
        tracing::info!(
            tier = %assessment.tier,
            confidence = assessment.confidence,
            passages = result.len(),
            should_answer = assessment.should_answer,
            "evidence gated"
        );

        let exemplar_kind = self.selector.classify(query);
        let exemplars = self
            .selector
            .select(exemplar_kind, MAX_EXEMPLARS_PER_CATEGORY);

        let prompt = PromptAssembler::build(
            query,
            &result,
            &assessment,
            self.memory.snapshot(),
            &exemplars,
        );

        let partial = PartialDiagnostics {
            requested_k: k,
            fast_path: decision.fast_path,
            route_reason: decision.reason,
            tier: assessment.tier,
            confidence: assessment.confidence,
            external_consulted: result.external_consulted(),
            exemplar_kind,
            passage_count: result.len(),
        };

        (prompt, partial)
    }

    /// Commit a completed exchange and finalize diagnostics
    fn commit(&mut self, query: &str, text: String, partial: PartialDiagnostics) -> Answer {
        self.memory.append(query, text.clone());

        let diagnostics = Diagnostics {
            session_id: self.session_id,
            at: Utc::now(),
            requested_k: partial.requested_k,
            fast_path: partial.fast_path,
            route_reason: partial.route_reason,
            tier: partial.tier,
            confidence: partial.confidence,
            external_consulted: partial.external_consulted,
            exemplar_kind: partial.exemplar_kind,
            passage_count: partial.passage_count,
            memory_len: self.memory.len(),
        };

        Answer { text, diagnostics }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Read-only view of the conversation so far
    pub fn history(&self) -> &[Turn] {
        self.memory.snapshot()
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
        tracing::info!(session_id = %self.session_id, "conversation memory cleared");
    }
}

struct PartialDiagnostics {
    requested_k: usize,
    fast_path: bool,
    route_reason: String,
    tier: Tier,
    confidence: f32,
    external_consulted: bool,
    exemplar_kind: Option<QueryKind>,
    passage_count: usize,
}
