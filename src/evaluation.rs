//! Retrieval quality and latency over a labelled question set

use crate::error::{DocQaError, Result};
use crate::retrieval::QueryOutcome;
use crate::service::DocumentService;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One labelled question
#[derive(Debug, Clone, Deserialize)]
pub struct EvalQuestion {
    pub question: String,
    /// Pages that answer the question
    pub relevant_pages: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question: String,
    pub top_pages: Vec<u32>,
    pub relevant_pages: Vec<u32>,
    pub top1_hit: bool,
    pub top3_hit: bool,
    pub latency_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub top1_accuracy: f64,
    pub top3_accuracy: f64,
    pub mean_latency_seconds: f64,
    pub p95_latency_seconds: f64,
    pub questions: Vec<QuestionResult>,
}

/// Read a JSON array of `{question, relevant_pages}`
pub fn load_questions(path: &Path) -> Result<Vec<EvalQuestion>> {
    let content = std::fs::read_to_string(path).map_err(|e| DocQaError::Io {
        source: e,
        context: format!("Failed to read question set: {}", path.display()),
    })?;

    serde_json::from_str(&content).map_err(|e| DocQaError::Json {
        source: e,
        context: format!("Failed to parse question set: {}", path.display()),
    })
}

/// Run every question through the query flow
pub async fn evaluate(
    service: &DocumentService,
    questions: &[EvalQuestion],
) -> Result<EvaluationReport> {
    if questions.is_empty() {
        return Err(DocQaError::InvalidQuery(
            "Question set is empty".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(questions.len());

    for item in questions {
        let answered = match service.query(&item.question).await? {
            QueryOutcome::Answered(answered) => answered,
            QueryOutcome::NoDocuments => return Err(DocQaError::IndexEmpty),
        };

        let top_pages: Vec<u32> = answered.results.iter().map(|r| r.page_number).collect();
        let top1_hit = top_pages
            .first()
            .is_some_and(|page| item.relevant_pages.contains(page));
        let top3_hit = top_pages
            .iter()
            .take(3)
            .any(|page| item.relevant_pages.contains(page));

        debug!(
            question = %item.question,
            ?top_pages,
            relevant = ?item.relevant_pages,
            "Evaluated question"
        );

        results.push(QuestionResult {
            question: item.question.clone(),
            top_pages,
            relevant_pages: item.relevant_pages.clone(),
            top1_hit,
            top3_hit,
            latency_seconds: answered.latency_seconds,
        });
    }

    let report = summarize(results);
    info!(
        total = report.total,
        top1 = report.top1_accuracy,
        top3 = report.top3_accuracy,
        p95 = report.p95_latency_seconds,
        "Evaluation complete"
    );
    Ok(report)
}

fn summarize(questions: Vec<QuestionResult>) -> EvaluationReport {
    let total = questions.len();
    let hits = |f: fn(&QuestionResult) -> bool| questions.iter().filter(|q| f(q)).count();
    let latencies: Vec<f64> = questions.iter().map(|q| q.latency_seconds).collect();

    EvaluationReport {
        total,
        top1_accuracy: ratio(hits(|q| q.top1_hit), total),
        top3_accuracy: ratio(hits(|q| q.top3_hit), total),
        mean_latency_seconds: mean(&latencies),
        p95_latency_seconds: percentile(&latencies, 0.95),
        questions,
    }
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolated percentile, `p` in `[0, 1]`
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
