/// Precision-mode reranking through a generative model
///
/// The model sees a numbered list of candidate summaries and answers with
/// `{"relevant": [i, ...]}`. The answer can only select and reorder candidates;
/// indices it invents are dropped.

use serde_json::Value;
use std::sync::Arc;

use super::SearchResult;
use crate::errors::TagscopeError;
use crate::generation::json::parse_model_json;
use crate::generation::GenerativeModel;

/// Result of a rerank call.
#[derive(Debug, Clone)]
pub enum RerankOutcome {
    /// Selected candidates in model order
    Ranked(Vec<SearchResult>),
    /// Model output could not be parsed at all
    Degraded,
}

pub fn build_rerank_prompt(query: &str, candidates: &[SearchResult]) -> String {
    let docs = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[{}] Summary: {}",
                i + 1,
                c.summary.as_deref().unwrap_or("No summary")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Search keyword: {query}\n\n\
         Candidate documents:\n{docs}\n\n\
         Tasks:\n\
         1. Judge whether each summary is directly related to the keyword.\n\
         2. Exclude every document that is unrelated or only weakly related.\n\
         3. Order the remaining documents from most to least relevant.\n\
         4. Output JSON containing only the selected document indices.\n\n\
         Example output:\n\
         {{\n  \"relevant\": [2, 5, 1]\n}}",
        query = query,
        docs = docs,
    )
}

/// Interpret one entry of the `relevant` array as a 1-based index.
fn coerce_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                return usize::try_from(i).ok();
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f >= 0.0 && f <= usize::MAX as f64 {
                Some(f as usize)
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Map the model's reply onto candidate positions (0-based), in reply order.
///
/// None when the reply holds no JSON object. A missing `relevant` array selects nothing.
pub fn parse_relevant_indices(raw: &str, candidate_count: usize) -> Option<Vec<usize>> {
    let reply: Value = parse_model_json(raw)?;
    let object = reply.as_object()?;

    let mut picked: Vec<usize> = Vec::new();
    if let Some(entries) = object.get("relevant").and_then(Value::as_array) {
        for entry in entries {
            let Some(index) = coerce_index(entry) else {
                continue;
            };
            if index == 0 || index > candidate_count {
                continue;
            }
            if !picked.contains(&(index - 1)) {
                picked.push(index - 1);
            }
        }
    }
    Some(picked)
}

pub struct Reranker {
    model: Arc<dyn GenerativeModel>,
}

impl Reranker {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Reranker { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Ask the model to filter and reorder `candidates` for `query`.
    ///
    /// Transport and API failures are errors; unparseable output is `Degraded`.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
    ) -> Result<RerankOutcome, TagscopeError> {
        if candidates.is_empty() {
            return Ok(RerankOutcome::Ranked(candidates));
        }

        let prompt = build_rerank_prompt(query, &candidates);
        let raw = self.model.generate(&prompt).await?;
        tracing::debug!(model = %self.model.model_name(), raw = %raw, "Rerank reply");

        let Some(order) = parse_relevant_indices(&raw, candidates.len()) else {
            return Ok(RerankOutcome::Degraded);
        };

        let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
        let ranked = order
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .collect();
        Ok(RerankOutcome::Ranked(ranked))
    }
}
