use crate::llm::LLMClient;
use crate::types::{AppError, Cadence, Persona, ReportKind, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Session metadata the planner conditions on.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest<'a> {
    pub task: &'a str,
    /// Parent task when planning for a sub-report of a detailed report.
    pub parent_topic: Option<&'a str>,
    pub report_kind: Option<ReportKind>,
    pub uploaded_files: &'a [String],
    /// Leading content of uploaded files, when planning against them.
    pub file_preview: Option<&'a str>,
    pub cadence: Cadence,
    pub retained: &'a str,
    pub deleted: &'a str,
}

/// Cut the outermost `open`..`close` span out of a model reply, dropping
/// code fences and chatter around it.
pub(crate) fn json_payload(reply: &str, open: char, close: char) -> Option<&str> {
    let start = reply.find(open)?;
    let end = reply.rfind(close)?;
    (end > start).then(|| &reply[start..=end])
}

/// Turns a task into an ordered list of search queries.
pub struct QueryPlanner {
    llm: Arc<dyn LLMClient>,
    max_queries: usize,
}

impl QueryPlanner {
    pub fn new(llm: Arc<dyn LLMClient>, max_queries: usize) -> Self {
        Self { llm, max_queries }
    }

    pub fn max_queries(&self) -> usize {
        self.max_queries
    }

    fn planning_prompt(&self, request: &PlanRequest<'_>) -> String {
        let task = match (request.report_kind, request.parent_topic) {
            (Some(ReportKind::DetailedReport | ReportKind::SubtopicReport), Some(parent)) => {
                format!("{} : {}", parent, request.task)
            }
            _ => request.task.to_string(),
        };
        let window = request.cadence.recency_window();

        let mut files_info = format!(
            "Questions may concern uploaded files. Uploaded files, if any: {:?}",
            request.uploaded_files
        );
        if let Some(preview) = request.file_preview {
            files_info.push_str(&format!("\nFile content preview:\n{}", preview));
        }

        let mut prompt = serde_json::json!({
            "task": format!(
                "Write {} web search queries that together form an objective view of the task: \"{}\".",
                self.max_queries, task
            ),
            "recency_requirement": format!("Restrict information to the {}. This is critical.", window),
            "date_needed": format!(
                "The current date is {}. Stay within the recency requirement.",
                crate::report::prompts::today()
            ),
            "files_info": files_info,
            "additional_instructions": "Include concrete task details such as locations and names in the queries.",
            "response_format": "Respond only with a JSON list of strings: [\"query 1\", \"query 2\", \"query 3\"].",
        });

        if !request.retained.is_empty() || !request.deleted.is_empty() {
            prompt["curation"] = serde_json::json!({
                "already_covered": request.retained,
                "excluded_topics": request.deleted,
            });
        }

        prompt.to_string()
    }

    /// Plan sub-queries; the task itself is appended as the final query.
    ///
    /// # Errors
    ///
    /// `AppError::Planning` when the reply is not a JSON list of strings.
    /// Generation failures propagate unchanged. Neither is recovered here.
    pub async fn plan(&self, request: &PlanRequest<'_>, persona: &Persona) -> Result<Vec<String>> {
        let reply = self
            .llm
            .generate_with_system(&persona.role_prompt, &self.planning_prompt(request))
            .await?;

        let mut queries = parse_query_list(&reply)?;
        queries.truncate(self.max_queries);
        queries.push(request.task.to_string());

        debug!(task = request.task, count = queries.len(), "Planned sub-queries");
        Ok(queries)
    }

    /// Derive the subtopics of a detailed report from research data.
    ///
    /// Falls back to the user-supplied list on any failure. The result is
    /// de-duplicated and capped at `max_subtopics`.
    pub async fn plan_subtopics(
        &self,
        task: &str,
        research_data: &str,
        user_subtopics: &[String],
        max_subtopics: usize,
        persona: &Persona,
    ) -> Vec<String> {
        let prompt = format!(
            "Main topic:\n{task}\n\nResearch data:\n{data}\n\n\
             - Build the list of subtopics that will head the sections of a detailed report on the main topic.\n\
             - Candidate subtopics: {candidates:?}.\n\
             - No duplicate subtopics, at most {max}.\n\
             - Order them as they should appear in the report.\n\
             - Every subtopic must relate to the main topic and the research data only.\n\n\
             Respond only with JSON: {{\"subtopics\": [{{\"task\": \"subtopic\"}}]}}",
            task = task,
            data = research_data,
            candidates = user_subtopics,
            max = max_subtopics,
        );

        let planned = match self.llm.generate_with_system(&persona.role_prompt, &prompt).await {
            Ok(reply) => parse_subtopics(&reply),
            Err(e) => Err(e),
        };

        let subtopics = match planned {
            Ok(list) if !list.is_empty() => list,
            Ok(_) => {
                warn!(task, "Subtopic planning returned nothing, using supplied subtopics");
                user_subtopics.to_vec()
            }
            Err(e) => {
                warn!(task, "Subtopic planning failed, using supplied subtopics: {}", e);
                user_subtopics.to_vec()
            }
        };

        dedup_capped(subtopics, max_subtopics)
    }
}

fn parse_query_list(reply: &str) -> Result<Vec<String>> {
    let payload = json_payload(reply, '[', ']').ok_or_else(|| {
        AppError::Planning(format!("Planner reply is not a list: {}", truncate(reply)))
    })?;
    serde_json::from_str::<Vec<String>>(payload)
        .map_err(|e| AppError::Planning(format!("Planner reply is not a list of strings: {}", e)))
}

#[derive(Deserialize)]
struct SubtopicList {
    subtopics: Vec<SubtopicEntry>,
}

#[derive(Deserialize)]
struct SubtopicEntry {
    task: String,
}

fn parse_subtopics(reply: &str) -> Result<Vec<String>> {
    let payload = json_payload(reply, '{', '}')
        .ok_or_else(|| AppError::Planning("Subtopic reply has no JSON object".to_string()))?;
    let list: SubtopicList = serde_json::from_str(payload)
        .map_err(|e| AppError::Planning(format!("Malformed subtopic reply: {}", e)))?;
    Ok(list.subtopics.into_iter().map(|s| s.task).collect())
}

fn dedup_capped(items: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .take(max)
        .collect()
}

fn truncate(reply: &str) -> String {
    reply.chars().take(120).collect()
}
