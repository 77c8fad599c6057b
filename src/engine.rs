//! Core orchestrator for the search filtering funnel.
//!
//! The engine manages the full request lifecycle:
//!   1. Query planning: generate search queries + screening criteria (LLM)
//!   2. Search execution: retrieve results via adapters
//!   3. Result verification: validate each result against criteria (LLM)
//!   4. Classification: classify results as perfect / partial / reject
//!   5. Response assembly
//!
//! Output modes:
//!   - **Complete** ([`SiftEngine::search`]) - one `SearchResponse`.
//!   - **Streaming** ([`SiftEngine::search_stream`]) - `StreamEvent`s emitted
//!     as results are verified, in completion order.
//!   - **Plan-only** ([`SiftEngine::plan`]) and **batch**
//!     ([`SiftEngine::batch_search`]).

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use futures::Stream;
use rand::Rng;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tracing::{error, info, warn};

use crate::adapters::{AdapterRegistry, SearchAdapter};
use crate::classifier;
use crate::config::Settings;
use crate::error::{Result, SiftError};
use crate::llm::LlmClient;
use crate::models::{
    BatchSearchRequest, BatchSearchResponse, CriteriaResult, PlanResponse, RawVerifiedResult,
    ResultClassification, ResultItem, ScoredResult, SearchRequest, SearchResponse,
    StandardDocument, StreamEvent, ValidationResult,
};
use crate::planner::QueryPlanner;
use crate::verifier::{self, EvidenceVerifier};

/// Core orchestrator owning the planner, verifier, and adapter registry.
///
/// One engine instance serves the whole process; per-request state lives in
/// stack values, so the engine is re-entrant across concurrent requests.
pub struct SiftEngine {
    settings: Arc<Settings>,
    planner: QueryPlanner,
    verifier: Arc<EvidenceVerifier>,
    llm: Option<Arc<LlmClient>>,
    registry: RwLock<AdapterRegistry>,
}

impl SiftEngine {
    /// Build an engine from settings. One LLM client is created and shared
    /// by the planner and verifier; without an API key both fall back to
    /// heuristics.
    pub fn new(settings: Arc<Settings>) -> Self {
        let llm = if settings.ai.api_key.is_empty() || settings.ai.api_key == "test-key" {
            warn!("No LLM API key configured, planning and verification use fallbacks");
            None
        } else {
            match LlmClient::new(&settings.ai) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    error!(error = %e, "Failed to create LLM client, using fallbacks");
                    None
                }
            }
        };

        let planner = QueryPlanner::new(llm.clone(), settings.ai.model_planner.clone());
        let verifier = Arc::new(EvidenceVerifier::new(
            llm.clone(),
            settings.ai.model_verifier.clone(),
        ));

        Self {
            settings,
            planner,
            verifier,
            llm,
            registry: RwLock::new(AdapterRegistry::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Probe LLM connectivity for the planner and verifier models.
    ///
    /// Failures are logged loudly but do not abort startup; the pipeline
    /// degrades to heuristics.
    pub async fn initialize(&self) {
        if let Some(llm) = &self.llm {
            if !llm.verify_connection(&self.settings.ai.model_planner).await {
                error!(
                    "Planner LLM connectivity check FAILED, planning will fall back to heuristics. \
                     Check ai.api_key, ai.base_url and ai.model_planner."
                );
            }
            if self.settings.ai.model_verifier != self.settings.ai.model_planner
                && !llm.verify_connection(&self.settings.ai.model_verifier).await
            {
                error!(
                    "Verifier LLM connectivity check FAILED, verification will fall back. \
                     Check ai.api_key, ai.base_url and ai.model_verifier."
                );
            }
        }
        info!("Engine initialized");
    }

    /// Initialize and register an adapter.
    pub async fn register_adapter(&self, adapter: Arc<dyn SearchAdapter>) -> Result<()> {
        self.registry.write().await.register(adapter).await
    }

    /// Names of currently active adapters.
    pub async fn active_adapters(&self) -> Vec<String> {
        self.registry.read().await.active_adapters()
    }

    /// Run health checks on all registered adapters.
    pub async fn adapter_health(&self) -> Vec<(String, crate::adapters::AdapterHealth)> {
        self.registry.read().await.health_check_all().await
    }

    /// Gracefully shut down all components.
    pub async fn shutdown(&self) {
        self.registry.write().await.shutdown_all().await;
        info!("Engine shut down");
    }

    // ── Plan-only mode ───────────────────────────────────────────────────

    /// Execute only the query-planning stage (no search, no verification).
    pub async fn plan(&self, request: &SearchRequest) -> PlanResponse {
        let start = Instant::now();
        let request_id = request_id("plan");

        info!(query = %request.query, "Plan-only: generating criteria");
        let criteria_result = self.planner.plan(request).await;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            search_queries = criteria_result.search_queries.len(),
            criteria = criteria_result.criteria.len(),
            processing_time_ms = processing_time_ms,
            "Plan-only complete"
        );

        PlanResponse {
            request_id,
            query: request.query.clone(),
            criteria_result,
            processing_time_ms,
        }
    }

    // ── Complete mode ────────────────────────────────────────────────────

    /// Execute the full search filtering funnel (complete mode).
    ///
    /// Bounded by `options.timeout_seconds`; expiry cancels in-flight work
    /// and surfaces as an `Internal` error.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let timeout = Duration::from_secs_f64(request.options.timeout_seconds.max(0.001));
        match tokio::time::timeout(timeout, self.search_inner(request)).await {
            Ok(result) => result,
            Err(_) => Err(SiftError::Internal(format!(
                "Search timed out after {:.1}s",
                request.options.timeout_seconds
            ))),
        }
    }

    async fn search_inner(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        let request_id = request_id("req");

        // Stage 1: generate search queries + criteria
        info!(query = %request.query, "Stage 1: generating criteria");
        let criteria_result = self.planner.plan(request).await;
        info!(
            search_queries = criteria_result.search_queries.len(),
            criteria = criteria_result.criteria.len(),
            "Criteria generated"
        );
        if criteria_result.search_queries.is_empty() && criteria_result.criteria.is_empty() {
            let mut response = SearchResponse::empty(
                request_id,
                "no_results",
                request.query.clone(),
                criteria_result,
            );
            response.processing_time_ms = start.elapsed().as_millis() as u64;
            return Ok(response);
        }

        // Stage 2: execute search queries via adapters
        info!(
            queries = criteria_result.search_queries.len(),
            "Stage 2: executing searches"
        );
        let items = self
            .execute_searches(&criteria_result.search_queries, request)
            .await;
        info!(retrieved = items.len(), "Search complete");

        if items.is_empty() {
            let mut response = SearchResponse::empty(
                request_id,
                "no_results",
                request.query.clone(),
                criteria_result,
            );
            response.processing_time_ms = start.elapsed().as_millis() as u64;
            return Ok(response);
        }

        // Stage 3: verify results against criteria
        let question_lang = detect_language(&request.query);
        let validations: Vec<ValidationResult> = if request.options.verify {
            info!(count = items.len(), "Stage 3: verifying results");
            self.verifier
                .verify_batch(
                    &items,
                    &criteria_result.criteria,
                    &request.query,
                    question_lang,
                    self.settings.search.max_concurrent_queries,
                )
                .await
        } else {
            items
                .iter()
                .map(|_| verifier::fallback_validation(&criteria_result.criteria))
                .collect()
        };

        let total_scanned = items.len();
        let processing = |start: Instant| start.elapsed().as_millis() as u64;

        // Stage 4: classify (or return raw verified results)
        if request.options.classify {
            info!(count = items.len(), "Stage 4: classifying results");
            let scored = classifier::classify_batch(items, validations, &criteria_result.criteria);

            let mut perfect: Vec<ScoredResult> = Vec::new();
            let mut partial: Vec<ScoredResult> = Vec::new();
            let mut rejected_count = 0usize;
            for s in scored {
                match s.classification {
                    ResultClassification::Perfect => perfect.push(s),
                    ResultClassification::Partial => partial.push(s),
                    ResultClassification::Reject => rejected_count += 1,
                }
            }

            let processing_time_ms = processing(start);
            info!(
                perfect = perfect.len(),
                partial = partial.len(),
                rejected = rejected_count,
                processing_time_ms = processing_time_ms,
                "Search complete"
            );

            return Ok(SearchResponse {
                request_id,
                status: "completed".to_string(),
                processing_time_ms,
                query: request.query.clone(),
                criteria_result,
                perfect_results: perfect,
                partial_results: partial,
                rejected_count,
                raw_results: Vec::new(),
                total_scanned,
            });
        }

        info!(count = total_scanned, "Stage 4 skipped (classify=false)");
        let raw_results: Vec<RawVerifiedResult> = items
            .into_iter()
            .zip(validations)
            .map(|(result, validation)| RawVerifiedResult { result, validation })
            .collect();

        Ok(SearchResponse {
            request_id,
            status: "completed".to_string(),
            processing_time_ms: processing(start),
            query: request.query.clone(),
            criteria_result,
            perfect_results: Vec::new(),
            partial_results: Vec::new(),
            rejected_count: 0,
            raw_results,
            total_scanned,
        })
    }

    // ── Streaming mode ───────────────────────────────────────────────────

    /// Execute the filtering funnel in streaming mode.
    ///
    /// Event order: one `criteria`, one `search_complete`, one `result` per
    /// item in **verification completion order** (1-based `index`), one
    /// `done`. Any failure in planning or search produces a single `error`
    /// event and ends the stream. Events flow through a bounded channel so
    /// a slow consumer back-pressures verification. The whole pipeline,
    /// verification futures included, is polled inside one timeout-wrapped
    /// future, so expiry drops every in-flight LLM and adapter call.
    pub fn search_stream(
        self: Arc<Self>,
        request: SearchRequest,
    ) -> impl Stream<Item = StreamEvent> + Send {
        let (tx, rx) = mpsc::channel::<StreamEvent>(1);
        let engine = self;

        tokio::spawn(async move {
            let start = Instant::now();
            let request_id = request_id("req");
            let timeout = Duration::from_secs_f64(request.options.timeout_seconds.max(0.001));

            let outcome = tokio::time::timeout(
                timeout,
                engine.stream_inner(&request, &request_id, start, &tx),
            )
            .await;

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!(
                    "Search timed out after {:.1}s",
                    request.options.timeout_seconds
                )),
            };
            if let Some(message) = failure {
                error!(request_id = %request_id, error = %message, "Streaming search failed");
                let _ = tx
                    .send(StreamEvent::new(
                        "error",
                        serde_json::json!({
                            "request_id": request_id,
                            "error": message,
                            "processing_time_ms": start.elapsed().as_millis() as u64,
                        }),
                    ))
                    .await;
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    async fn stream_inner(
        &self,
        request: &SearchRequest,
        request_id: &str,
        start: Instant,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<()> {
        let send = move |event: StreamEvent| async move {
            tx.send(event)
                .await
                .map_err(|_| SiftError::Internal("stream consumer dropped".into()))
        };

        // Stage 1
        info!(query = %request.query, "[stream] Stage 1: generating criteria");
        let criteria_result = self.planner.plan(request).await;
        send(StreamEvent::new(
            "criteria",
            serde_json::json!({
                "request_id": request_id,
                "query": request.query,
                "criteria_result": &criteria_result,
            }),
        ))
        .await?;

        // Stage 2
        info!(
            queries = criteria_result.search_queries.len(),
            "[stream] Stage 2: executing searches"
        );
        let items = self
            .execute_searches(&criteria_result.search_queries, request)
            .await;
        info!(retrieved = items.len(), "[stream] Search complete");
        send(StreamEvent::new(
            "search_complete",
            serde_json::json!({
                "total_results": items.len(),
                "search_queries_count": criteria_result.search_queries.len(),
                "results": &items,
            }),
        ))
        .await?;

        if items.is_empty() {
            send(StreamEvent::new(
                "done",
                serde_json::json!({
                    "request_id": request_id,
                    "status": "no_results",
                    "total_scanned": 0,
                    "perfect_count": 0,
                    "partial_count": 0,
                    "rejected_count": 0,
                    "processing_time_ms": start.elapsed().as_millis() as u64,
                }),
            ))
            .await?;
            return Ok(());
        }

        // Stage 3 + 4: verify (and optionally classify) in completion order.
        // The verification futures are driven by this future itself, never
        // detached: dropping it (timeout, client gone) cancels every
        // in-flight call. The counting semaphore bounds concurrency, and a
        // slow SSE consumer back-pressures the pool between event sends.
        let question_lang = detect_language(&request.query);
        let criteria = &criteria_result.criteria;
        let query = request.query.as_str();
        let do_verify = request.options.verify;
        let do_classify = request.options.classify;
        let total = items.len();
        let max_concurrent = self.settings.search.max_concurrent_queries.max(1);

        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut completions = stream::iter(items)
            .map(|item| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore.acquire().await;
                    let validation = if do_verify {
                        match self
                            .verifier
                            .verify(&item, criteria, query, question_lang)
                            .await
                        {
                            Ok(v) => v,
                            Err(e) => {
                                warn!(title = %item.title, error = %e, "[stream] Verification failed, using fallback");
                                verifier::fallback_validation(criteria)
                            }
                        }
                    } else {
                        verifier::fallback_validation(criteria)
                    };
                    (item, validation)
                }
            })
            .buffer_unordered(max_concurrent);

        let mut perfect_count = 0usize;
        let mut partial_count = 0usize;
        let mut rejected_count = 0usize;
        let mut index = 0usize;

        while let Some((item, validation)) = completions.next().await {
            index += 1;
            let payload = if do_classify {
                let scored = classifier::classify(item, validation, criteria);
                match scored.classification {
                    ResultClassification::Perfect => perfect_count += 1,
                    ResultClassification::Partial => partial_count += 1,
                    ResultClassification::Reject => rejected_count += 1,
                }
                serde_json::json!({
                    "index": index,
                    "total": total,
                    "scored_result": scored,
                })
            } else {
                serde_json::json!({
                    "index": index,
                    "total": total,
                    "raw_result": RawVerifiedResult { result: item, validation },
                })
            };
            send(StreamEvent::new("result", payload)).await?;
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            perfect = perfect_count,
            partial = partial_count,
            rejected = rejected_count,
            processing_time_ms = processing_time_ms,
            "[stream] Search complete"
        );
        send(StreamEvent::new(
            "done",
            serde_json::json!({
                "request_id": request_id,
                "status": "completed",
                "total_scanned": total,
                "perfect_count": perfect_count,
                "partial_count": partial_count,
                "rejected_count": rejected_count,
                "processing_time_ms": processing_time_ms,
            }),
        ))
        .await?;

        Ok(())
    }

    // ── Batch mode ───────────────────────────────────────────────────────

    /// Execute multiple queries through the full funnel concurrently.
    ///
    /// Per-query failures yield an error-status `SearchResponse` and never
    /// cancel sibling queries.
    pub async fn batch_search(&self, request: &BatchSearchRequest) -> BatchSearchResponse {
        let start = Instant::now();

        let tasks = request.queries.iter().map(|query| {
            let sub_request = SearchRequest {
                query: query.clone(),
                options: request.options.clone(),
                context: request.context.clone(),
            };
            async move { self.search(&sub_request).await }
        });
        let outcomes = join_all(tasks).await;

        let results: Vec<SearchResponse> = outcomes
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| match outcome {
                Ok(response) => response,
                Err(e) => {
                    warn!(index = i, error = %e, "Batch query failed");
                    SearchResponse::empty(
                        format!("req_batch_{i}_error"),
                        "error",
                        request.queries[i].clone(),
                        CriteriaResult::empty(),
                    )
                }
            })
            .collect();

        let export_data = request
            .export_format
            .as_deref()
            .map(|fmt| export_results(&results, fmt));

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            queries = request.queries.len(),
            processing_time_ms = processing_time_ms,
            "Batch search complete"
        );

        BatchSearchResponse {
            status: "completed".to_string(),
            processing_time_ms,
            total_queries: request.queries.len(),
            results,
            export_format: request.export_format.clone(),
            export_data,
        }
    }

    // ── Shared internals ─────────────────────────────────────────────────

    /// Execute all search queries against the selected adapters and return
    /// the deduplicated union.
    ///
    /// `|queries| x |adapters|` tasks run concurrently. Adapters with the
    /// paper capability keep full academic metadata; others go through the
    /// standard-document projection. `max_results` is a per-query-per-adapter
    /// hint; the union is **not** trimmed afterwards. Dedup key is the
    /// trimmed lowercase title, first writer wins.
    async fn execute_searches(
        &self,
        search_queries: &[String],
        request: &SearchRequest,
    ) -> Vec<ResultItem> {
        let adapters = match self
            .registry
            .read()
            .await
            .get_adapters(&request.options.adapters)
        {
            Ok(adapters) => adapters,
            Err(e) => {
                warn!(error = %e, "No search adapter available, returning empty results");
                return Vec::new();
            }
        };

        let mut tasks = Vec::with_capacity(adapters.len() * search_queries.len());
        for adapter in &adapters {
            for query in search_queries {
                let adapter = Arc::clone(adapter);
                let query = query.clone();
                let options = request.options.clone();
                tasks.push(async move {
                    let name = adapter.name();
                    let outcome = match adapter.search_papers(&query, &options).await {
                        Ok(Some(papers)) => Ok(papers
                            .into_iter()
                            .map(|p| p.to_result_item())
                            .collect::<Vec<_>>()),
                        Ok(None) => adapter
                            .search_and_normalize(&query, &options)
                            .await
                            .map(|docs| docs.into_iter().map(doc_to_result_item).collect()),
                        Err(e) => Err(e),
                    };
                    (name, query, outcome)
                });
            }
        }

        let outcomes = join_all(tasks).await;

        let mut seen_titles = std::collections::HashSet::new();
        let mut items = Vec::new();
        for (adapter_name, query, outcome) in outcomes {
            let batch = match outcome {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(adapter = adapter_name, query = %query, error = %e, "Search query failed");
                    continue;
                }
            };
            for mut item in batch {
                item.source_adapter = adapter_name.to_string();
                if seen_titles.insert(item.dedup_key()) {
                    items.push(item);
                }
            }
        }

        items
    }
}

/// Project a [`StandardDocument`] onto the generic [`ResultItem`] shape.
pub fn doc_to_result_item(doc: StandardDocument) -> ResultItem {
    let mut item = ResultItem {
        result_type: "generic".to_string(),
        title: if doc.title.is_empty() {
            "N/A".to_string()
        } else {
            doc.title
        },
        content: if doc.content.is_empty() {
            "N/A".to_string()
        } else {
            doc.content
        },
        source_url: doc.metadata.url.unwrap_or_else(|| "N/A".to_string()),
        ..Default::default()
    };

    if let Some(author) = doc.metadata.author.filter(|a| !a.is_empty() && a != "N/A") {
        item.fields.insert("author".to_string(), author);
    }
    if !doc.metadata.source.is_empty() && doc.metadata.source != "N/A" {
        item.fields.insert("source".to_string(), doc.metadata.source);
    }
    if let Some(date) = doc.metadata.published_date {
        item.fields
            .insert("published_date".to_string(), date.to_rfc3339());
    }
    if !doc.metadata.tags.is_empty() {
        item.fields
            .insert("tags".to_string(), doc.metadata.tags.join("; "));
    }
    for (key, value) in doc.metadata.extra {
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => continue,
            other => other.to_string(),
        };
        if !text.is_empty() && text != "N/A" {
            item.fields.insert(key, text);
        }
    }

    item
}

/// Detect whether a query is primarily Chinese or English via CJK ratio.
pub fn detect_language(text: &str) -> &'static str {
    let total = text.chars().count();
    if total == 0 {
        return "English";
    }
    let cjk = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    if cjk * 10 > total {
        "中文"
    } else {
        "English"
    }
}

/// Fresh request id: `<prefix>_` + 12 random hex chars.
fn request_id(prefix: &str) -> String {
    let n: u64 = rand::thread_rng().gen();
    format!("{prefix}_{:012x}", n & 0xffff_ffff_ffff)
}

/// Serialize all perfect and partial results across the batch as CSV or
/// JSON rows. Unknown formats yield an empty string.
fn export_results(results: &[SearchResponse], format: &str) -> String {
    let rows: Vec<&ScoredResult> = results
        .iter()
        .flat_map(|r| r.perfect_results.iter().chain(r.partial_results.iter()))
        .collect();
    let queries: Vec<&str> = results
        .iter()
        .flat_map(|r| {
            std::iter::repeat(r.query.as_str())
                .take(r.perfect_results.len() + r.partial_results.len())
        })
        .collect();

    match format {
        "json" => {
            let data: Vec<serde_json::Value> = rows
                .iter()
                .zip(&queries)
                .map(|(scored, query)| {
                    serde_json::json!({
                        "query": query,
                        "classification": scored.classification.as_str(),
                        "weighted_score": scored.weighted_score,
                        "title": scored.result.title,
                        "content": scored.result.content.chars().take(200).collect::<String>(),
                        "source_url": scored.result.source_url,
                        "summary": scored.validation.summary,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&data).unwrap_or_default()
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            let header_ok = writer
                .write_record([
                    "query",
                    "classification",
                    "weighted_score",
                    "title",
                    "content_preview",
                    "source_url",
                    "summary",
                ])
                .is_ok();
            if header_ok {
                for (scored, query) in rows.iter().zip(&queries) {
                    let score = scored.weighted_score.to_string();
                    let preview: String = scored.result.content.chars().take(200).collect();
                    let _ = writer.write_record([
                        *query,
                        scored.classification.as_str(),
                        score.as_str(),
                        scored.result.title.as_str(),
                        preview.as_str(),
                        scored.result.source_url.as_str(),
                        scored.validation.summary.as_str(),
                    ]);
                }
            }
            writer
                .into_inner()
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .unwrap_or_default()
        }
        other => {
            warn!(format = other, "Unknown export format");
            String::new()
        }
    }
}
