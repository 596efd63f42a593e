//! The fact-planner (§4.E.2): prompt construction and the typed decisions an
//! extraction/reconcile `B.plan` call returns. Grounded in the teacher's
//! preference for "explicit result values carrying the op kind and payload"
//! over exceptions for control flow (§9 redesign notes).

use memory_core::MemoryId;
use serde::{Deserialize, Serialize};

/// One role-tagged conversational turn, the `messages` shape of §4.E.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// `add`'s input is either raw text or a message list (§9: "model as a
/// tagged sum (Text | Messages)").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddInput {
    Text(String),
    Messages(Vec<Message>),
}

impl AddInput {
    /// Flatten to the text the extraction prompt is built over.
    pub fn as_prompt_text(&self) -> String {
        match self {
            AddInput::Text(text) => text.clone(),
            AddInput::Messages(messages) => messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Output of the extraction `B.plan` call (§4.E.2 step 1): a list of
/// concise third-person candidate facts. Empty means no store writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFacts {
    pub facts: Vec<String>,
}

/// One decision from the reconcile `B.plan` call (§4.E.2 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Add,
    Update,
    Delete,
    Noop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileDecision {
    /// Index into the candidate facts list this decision is about.
    pub candidate_index: usize,
    pub op: OpKind,
    /// Required for `Update`/`Delete`; ignored otherwise.
    pub target_id: Option<MemoryId>,
    /// New text for `Add`/`Update`; absent for `Delete`/`Noop`.
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileDecisions {
    pub decisions: Vec<ReconcileDecision>,
}

/// One `(source, predicate, target)` triple from the graph-extraction pass
/// (§4.E.2 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphTriple {
    pub source: String,
    pub predicate: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphTriples {
    pub triples: Vec<GraphTriple>,
}

/// Build the extraction prompt (§4.E.2 step 1). Language of extraction
/// follows the language of the input — the prompt does not translate.
pub fn extraction_prompt(input: &AddInput) -> String {
    format!(
        "Extract durable, concise, third-person factual statements from the \
         following conversation. Return JSON as {{\"facts\": [string, ...]}}. \
         If there is nothing durable to remember, return {{\"facts\": []}}. \
         Preserve the language of the input.\n\n---\n{}\n---",
        input.as_prompt_text()
    )
}

/// Build the reconcile prompt (§4.E.2 step 4) over the candidate facts and
/// their retrieved neighbor context.
pub fn reconcile_prompt(candidates: &[String], context: &[(MemoryId, String)]) -> String {
    let candidates_json = serde_json::to_string(candidates).unwrap_or_default();
    let context_json: Vec<serde_json::Value> = context
        .iter()
        .map(|(id, text)| serde_json::json!({ "id": id.to_string(), "text": text }))
        .collect();
    format!(
        "You are reconciling new candidate facts against a user's existing \
         memories. For each candidate (by its index in the input list), \
         decide exactly one operation: ADD (genuinely new), UPDATE (refines \
         an existing memory, include target_id and the new text), DELETE \
         (invalidates an existing memory, include target_id), or NOOP \
         (already represented). Return JSON as \
         {{\"decisions\": [{{\"candidate_index\": int, \"op\": \"add\"|\"update\"|\"delete\"|\"noop\", \
         \"target_id\": string|null, \"text\": string|null}}, ...]}} with \
         exactly one decision per candidate index.\n\n\
         Candidates: {candidates_json}\n\nExisting memories: {context_json:?}"
    )
}

/// Build the graph-triple extraction prompt (§4.E.2 step 6).
pub fn graph_extraction_prompt(candidates: &[String]) -> String {
    let candidates_json = serde_json::to_string(candidates).unwrap_or_default();
    format!(
        "Extract (source, predicate, target) relationship triples implied by \
         these facts. Return JSON as {{\"triples\": [{{\"source\": string, \
         \"predicate\": string, \"target\": string}}, ...]}}. Return an empty \
         list if none. Facts: {candidates_json}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_flatten_to_role_prefixed_lines() {
        let input = AddInput::Messages(vec![Message {
            role: "user".to_string(),
            content: "I love pizza".to_string(),
        }]);
        assert_eq!(input.as_prompt_text(), "user: I love pizza");
    }

    #[test]
    fn text_input_passes_through_unchanged() {
        let input = AddInput::Text("raw note".to_string());
        assert_eq!(input.as_prompt_text(), "raw note");
    }
}
