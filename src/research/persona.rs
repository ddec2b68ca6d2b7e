use crate::llm::LLMClient;
use crate::research::planner::json_payload;
use crate::types::{AppError, Persona, Result};
use std::sync::Arc;
use tracing::{debug, warn};

const PERSONA_INSTRUCTIONS: &str = r#"You route research tasks to a specialist agent. The task asks about tools, products or services that solve the user's problem. Pick the agent by the field of the task and give it a role prompt.

Examples:
task: "I struggle to make sense of financial market data"
response: {"server": "Finance Agent", "agent_role_prompt": "You are a seasoned finance analyst AI assistant. You write thorough, impartial and well organised reports on the financial tools and services available in the market."}

task: "Our sales numbers drop month over month."
response: {"server": "Sales Strategy Analyst Agent", "agent_role_prompt": "You are an experienced AI sales strategy analyst. You write thorough, impartial and structured reports evaluating market tools and services that lift sales performance."}

task: "Our unit tests miss bugs that reach production."
response: {"server": "DevOps Agent", "agent_role_prompt": "You are an experienced AI DevOps agent. You investigate CI and testing practice and the tools that automate and improve code quality."}

Respond only with the JSON object."#;

/// Picks the role that steers every generation call of a session.
pub struct PersonaSelector {
    llm: Arc<dyn LLMClient>,
}

impl PersonaSelector {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    /// Classify `task`; any failure yields [`Persona::fallback`].
    pub async fn select(&self, task: &str) -> Persona {
        match self.try_select(task).await {
            Ok(persona) => {
                debug!(persona = %persona.name, "Selected persona");
                persona
            }
            Err(e) => {
                warn!("Persona selection failed, using default: {}", e);
                Persona::fallback()
            }
        }
    }

    async fn try_select(&self, task: &str) -> Result<Persona> {
        let reply = self
            .llm
            .generate_with_system(PERSONA_INSTRUCTIONS, &format!("task: {}", task))
            .await?;

        let payload = json_payload(&reply, '{', '}')
            .ok_or_else(|| AppError::Generation("Persona reply has no JSON object".to_string()))?;
        let persona: Persona = serde_json::from_str(payload)
            .map_err(|e| AppError::Generation(format!("Malformed persona reply: {}", e)))?;

        if persona.name.trim().is_empty() || persona.role_prompt.trim().is_empty() {
            return Err(AppError::Generation("Empty persona".to_string()));
        }
        Ok(persona)
    }
}
