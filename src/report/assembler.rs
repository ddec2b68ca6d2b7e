use crate::llm::LLMClient;
use crate::report::markdown::{
    Header, add_references, demote_seen_headers, introduced_headers, table_of_contents,
};
use crate::report::prompts::{PromptContext, PromptRegistry, today};
use crate::transport::{Edits, EventSink, SessionEvent};
use crate::types::{AppError, Cadence, Persona, ReportKind, Result};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Inputs of one report-producing generation call.
#[derive(Debug, Clone, Copy)]
pub struct ReportRequest<'a> {
    pub kind: ReportKind,
    pub question: &'a str,
    pub context: &'a str,
    pub cadence: Cadence,
    pub edits: &'a Edits,
    pub main_topic: &'a str,
    pub existing_headers: &'a [String],
}

/// Turns accumulated context into report text via the prompt registry.
pub struct ReportAssembler {
    llm: Arc<dyn LLMClient>,
    prompts: PromptRegistry,
    report_format: String,
    total_words: usize,
}

impl ReportAssembler {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        prompts: PromptRegistry,
        report_format: impl Into<String>,
        total_words: usize,
    ) -> Self {
        Self {
            llm,
            prompts,
            report_format: report_format.into(),
            total_words,
        }
    }

    pub fn prompt(&self, request: &ReportRequest<'_>) -> Result<String> {
        let ctx = PromptContext {
            question: request.question,
            context: request.context,
            report_format: &self.report_format,
            total_words: self.total_words,
            cadence: request.cadence,
            retained: &request.edits.retained,
            deleted: &request.edits.deleted,
            main_topic: request.main_topic,
            existing_headers: request.existing_headers,
            today: today(),
        };
        self.prompts.build(request.kind, &ctx)
    }

    /// One generation call. With a sink the output is streamed as `report`
    /// events while it is produced.
    pub async fn write(
        &self,
        request: &ReportRequest<'_>,
        persona: &Persona,
        sink: Option<&dyn EventSink>,
    ) -> Result<String> {
        let prompt = self.prompt(request)?;
        debug!(kind = %request.kind, chars = prompt.len(), "Generating report");

        let Some(sink) = sink else {
            return self
                .llm
                .generate_with_system(&persona.role_prompt, &prompt)
                .await;
        };

        let mut stream = self
            .llm
            .stream_with_system(&persona.role_prompt, &prompt)
            .await?;
        let mut report = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            sink.emit(SessionEvent::Report {
                output: chunk.clone(),
            });
            report.push_str(&chunk);
        }
        Ok(report)
    }

    /// A flat report. An empty reply counts as a generation failure.
    pub async fn write_report(
        &self,
        request: &ReportRequest<'_>,
        persona: &Persona,
        sink: Option<&dyn EventSink>,
    ) -> Result<String> {
        let report = self.write(request, persona, sink).await?;
        if report.trim().is_empty() {
            return Err(AppError::Generation(format!(
                "No content produced for '{}'",
                request.question
            )));
        }
        Ok(report)
    }

    /// Introduction of a detailed report; failures yield an empty string.
    pub async fn write_introduction(
        &self,
        task: &str,
        context: &str,
        cadence: Cadence,
        persona: &Persona,
    ) -> String {
        let edits = Edits::default();
        let request = ReportRequest {
            kind: ReportKind::DetailedReport,
            question: task,
            context,
            cadence,
            edits: &edits,
            main_topic: task,
            existing_headers: &[],
        };
        match self.write(&request, persona, None).await {
            Ok(text) => text,
            Err(e) => {
                warn!(task, "Introduction generation failed: {}", e);
                String::new()
            }
        }
    }
}

/// One generated section of a composite report.
#[derive(Debug, Clone)]
pub struct SubtopicReport {
    pub subtopic: String,
    pub content: String,
    /// Headers this section introduced; never shared with earlier sections.
    pub headers: Vec<Header>,
}

/// Introduction plus sections, built strictly in subtopic order.
#[derive(Debug, Default)]
pub struct CompositeReport {
    pub introduction: String,
    sections: Vec<SubtopicReport>,
    seen: HashSet<String>,
}

impl CompositeReport {
    pub fn new(introduction: String) -> Self {
        Self {
            introduction,
            ..Default::default()
        }
    }

    /// Header texts of every section so far, in order.
    pub fn existing_headers(&self) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|s| s.headers.iter().map(|h| h.text.clone()))
            .collect()
    }

    pub fn sections(&self) -> &[SubtopicReport] {
        &self.sections
    }

    /// Fold a generated section in. Headings an earlier section already used
    /// are demoted to bold text; the rest are recorded as introduced.
    pub fn push(&mut self, subtopic: impl Into<String>, content: String) -> &SubtopicReport {
        let content = demote_seen_headers(&content, &self.seen);
        let headers = introduced_headers(&content, &self.seen);
        self.seen.extend(headers.iter().map(Header::key));
        self.sections.push(SubtopicReport {
            subtopic: subtopic.into(),
            content,
            headers,
        });
        &self.sections[self.sections.len() - 1]
    }

    /// Introduction, table of contents, sections and references.
    pub fn render(&self, references: &[String]) -> String {
        let mut parts = Vec::new();
        if !self.introduction.trim().is_empty() {
            parts.push(self.introduction.trim().to_string());
        }

        let all_headers: Vec<Header> = self
            .sections
            .iter()
            .flat_map(|s| s.headers.iter().cloned())
            .collect();
        let toc = table_of_contents(&all_headers);
        if !toc.is_empty() {
            parts.push(toc.trim_end().to_string());
        }

        parts.extend(self.sections.iter().map(|s| s.content.trim().to_string()));
        add_references(&parts.join("\n\n"), references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_tracks_introduced_headers() {
        let mut report = CompositeReport::new("# EV Supply Chain\nintro".into());
        report.push("Costs", "## Battery Costs\ntext\n## Outlook\n".into());
        let second = report.push("Policy", "## Subsidies\n## Outlook\n".into());

        let texts: Vec<_> = second.headers.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["Subsidies"]);
        assert_eq!(second.content, "## Subsidies\n**Outlook**\n");
        assert_eq!(
            report.existing_headers(),
            vec!["Battery Costs", "Outlook", "Subsidies"]
        );
    }

    #[test]
    fn test_rendered_report_has_no_repeated_headers() {
        let mut report = CompositeReport::new(String::new());
        report.push("Costs", "## Costs\n### Labor\nwages".into());
        report.push("Policy", "## Policy\n### Labor\nunions".into());

        let rendered = report.render(&[]);
        let labor: Vec<_> = crate::report::markdown::extract_headers(&rendered)
            .into_iter()
            .filter(|h| h.text == "Labor")
            .collect();
        // One heading in the body, none duplicated by the table of contents.
        assert_eq!(labor.len(), 1);
        assert!(rendered.contains("**Labor**\nunions"));
    }

    #[test]
    fn test_render_orders_parts() {
        let mut report = CompositeReport::new("# Title\nintro".into());
        report.push("A", "## Alpha\nbody a".into());
        report.push("B", "## Beta\nbody b".into());

        let rendered = report.render(&["https://a.example".into()]);
        let intro = rendered.find("intro").unwrap();
        let toc = rendered.find("## Table of Contents").unwrap();
        let alpha = rendered.find("body a").unwrap();
        let beta = rendered.find("body b").unwrap();
        let refs = rendered.find("## References").unwrap();
        assert!(intro < toc && toc < alpha && alpha < beta && beta < refs);
    }
}
