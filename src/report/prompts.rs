//! Prompt construction strategies, one per report kind.
//!
//! Dispatch is a registry lookup keyed by [`ReportKind`]; adding a report kind
//! means registering one more [`PromptBuilder`].

use crate::types::{AppError, Cadence, ReportKind, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum rows requested from the table builder.
const TABLE_MIN_ROWS: usize = 20;

/// Everything a prompt builder may draw on.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub question: &'a str,
    pub context: &'a str,
    pub report_format: &'a str,
    pub total_words: usize,
    pub cadence: Cadence,
    pub retained: &'a str,
    pub deleted: &'a str,
    /// Parent task, set for subtopic reports.
    pub main_topic: &'a str,
    /// Headers already used by earlier sub-reports.
    pub existing_headers: &'a [String],
    /// Human-readable current date, e.g. "October 17, 2026".
    pub today: String,
}

impl Default for PromptContext<'_> {
    fn default() -> Self {
        Self {
            question: "",
            context: "",
            report_format: "APA",
            total_words: 1000,
            cadence: Cadence::None,
            retained: "",
            deleted: "",
            main_topic: "",
            existing_headers: &[],
            today: today(),
        }
    }
}

pub fn today() -> String {
    chrono::Utc::now().format("%B %d, %Y").to_string()
}

pub trait PromptBuilder: Send + Sync {
    fn build(&self, ctx: &PromptContext<'_>) -> String;
}

fn hyperlink_rules(kind: &str) -> String {
    format!(
        "List every source url you used at the end of the {kind} as references, once per source.\n\
         Sources that are file paths are referenced by file name.\n\
         Hyperlink every url in markdown, for example: This is a sample text. ([url website](url))\n"
    )
}

fn date_line(ctx: &PromptContext<'_>) -> String {
    format!("Assume the current date is {}.", ctx.today)
}

fn recency_line(ctx: &PromptContext<'_>) -> String {
    format!(
        "This is delivered on a {} cadence: restrict information to the {}. The time window is critical.\n",
        ctx.cadence.as_str(),
        ctx.cadence.recency_window()
    )
}

fn curation_block(ctx: &PromptContext<'_>) -> String {
    format!(
        "EXISTING REPORT (preserve and expand): \"\"\"{}\"\"\"\n\
         REMOVED SECTIONS (do not cover these topics): \"\"\"{}\"\"\"\n",
        ctx.retained, ctx.deleted
    )
}

// ============= Flat Report Builders =============

pub struct ResearchReportPrompt;

impl PromptBuilder for ResearchReportPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "Information: \"\"\"{context}\"\"\"\n\n\
             Using only the information above, write a detailed report answering: \"{question}\".\n\
             The report must be well structured, informative and in depth, with facts and numbers where \
             available, and at least {words} words long.\n\
             Use markdown with headings and lists where appropriate, and keep an unbiased journalistic tone.\n\
             Reach a concrete opinion grounded in the information; avoid vague conclusions.\n\
             {links}Write the report in {format} format.\n{date}",
            context = ctx.context,
            question = ctx.question,
            words = ctx.total_words,
            links = hyperlink_rules("report"),
            format = ctx.report_format,
            date = date_line(ctx),
        )
    }
}

pub struct ParagraphPrompt;

impl PromptBuilder for ParagraphPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "Information: \"\"\"{context}\"\"\"\n\n\
             Using only the information above, answer \"{question}\" in a single detailed paragraph \
             of at least {words} words, written in markdown.\n\
             Be concise yet comprehensive, include facts and numbers, and reach a concrete opinion.\n\
             {links}Write the paragraph in {format} format.\n{date}",
            context = ctx.context,
            question = ctx.question,
            words = ctx.total_words,
            links = hyperlink_rules("paragraph"),
            format = ctx.report_format,
            date = date_line(ctx),
        )
    }
}

pub struct JsonPrompt;

impl PromptBuilder for JsonPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "Information: \"\"\"{context}\"\"\"\n\n\
             Using only the information above, list the tools, products or services that help with: \
             \"{question}\".\n\
             Respond with JSON only: an array of objects with keys \"name\" and \"reasoning\", where \
             reasoning explains how the item addresses the problem.\n\
             Keep an unbiased tone and include facts and numbers where available.\n{date}",
            context = ctx.context,
            question = ctx.question,
            date = date_line(ctx),
        )
    }
}

pub struct DetailedJsonPrompt;

impl PromptBuilder for DetailedJsonPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "Information: \"\"\"{context}\"\"\"\n\n\
             Using only the information above, describe the product, tool or service \"{question}\".\n\
             Respond with a flat JSON object with keys \"features\", \"pricing\" and \"reviews\". \
             Do not nest JSON.\n{date}",
            context = ctx.context,
            question = ctx.question,
            date = date_line(ctx),
        )
    }
}

pub struct ResourceReportPrompt;

impl PromptBuilder for ResourceReportPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "\"\"\"{context}\"\"\"\n\n\
             Based only on the information above, write a bibliography recommendation report for: \
             \"{question}\".\n\
             Analyse each recommended resource: its relevance, reliability and how it helps answer the \
             question. Use markdown and at least {words} words.\n{links}{date}",
            context = ctx.context,
            question = ctx.question,
            words = ctx.total_words,
            links = hyperlink_rules("report"),
            date = date_line(ctx),
        )
    }
}

pub struct OutlineReportPrompt;

impl PromptBuilder for OutlineReportPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "\"\"\"{context}\"\"\"\n\n\
             Using only the information above, write a markdown outline for a research report on: \
             \"{question}\".\n\
             Include the main sections, subsections and key points a detailed report of at least \
             {words} words would cover.\n{date}",
            context = ctx.context,
            question = ctx.question,
            words = ctx.total_words,
            date = date_line(ctx),
        )
    }
}

pub struct TablePrompt;

impl PromptBuilder for TablePrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "\"\"\"{context}\"\"\"\n\n\
             Using only the information above, produce a table for: \"{question}\".\n\
             Output valid CSV only: a header row followed by at least {rows} data rows. Replace commas \
             inside values with a space.\n{date}",
            context = ctx.context,
            question = ctx.question,
            rows = TABLE_MIN_ROWS,
            date = date_line(ctx),
        )
    }
}

/// The task itself is the instruction.
pub struct CustomReportPrompt;

impl PromptBuilder for CustomReportPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!("\"{}\"\n\n{}\n{}", ctx.context, date_line(ctx), ctx.question)
    }
}

// ============= Newsletter Builders =============

pub struct NewsletterReportPrompt {
    /// Long-form variant asks for twice the target length.
    pub extended: bool,
}

impl PromptBuilder for NewsletterReportPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        let words = if self.extended {
            ctx.total_words * 2
        } else {
            ctx.total_words
        };
        format!(
            "Information: \"\"\"{context}\"\"\"\n{curation}\n\
             Using only the information above, answer \"{question}\" as a topical newsletter report.\n{recency}\
             The report must be well structured and in depth, at least {words} words, written in markdown.\n\
             Preserve the EXISTING REPORT and add rich detail to it; never include topics from REMOVED SECTIONS.\n\
             {links}Write the report in {format} format.\n{date}",
            context = ctx.context,
            curation = curation_block(ctx),
            question = ctx.question,
            recency = recency_line(ctx),
            words = words,
            links = hyperlink_rules("report"),
            format = ctx.report_format,
            date = date_line(ctx),
        )
    }
}

pub struct NewsletterParagraphPrompt;

impl PromptBuilder for NewsletterParagraphPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "Information: \"\"\"{context}\"\"\"\n{curation}\n\
             Using only the information above, answer \"{question}\" in one detailed newsletter paragraph \
             of at least {words} words.\n{recency}\
             Keep what the EXISTING REPORT says and leave out anything in REMOVED SECTIONS.\n\
             {links}{date}",
            context = ctx.context,
            curation = curation_block(ctx),
            question = ctx.question,
            words = ctx.total_words,
            recency = recency_line(ctx),
            links = hyperlink_rules("paragraph"),
            date = date_line(ctx),
        )
    }
}

// ============= Composite Builders =============

/// Introduction of a detailed report.
pub struct IntroductionPrompt;

impl PromptBuilder for IntroductionPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            "{context}\n\n\
             Using only the latest information above, write a detailed introduction for a report on: \
             {question}.\n\
             - Restrict information to the {window}.\n\
             - Start with an H1 heading that titles the whole report.\n\
             - Write only the introduction; other sections are produced separately.\n\
             - Hyperlink sources inline in markdown ([url website](url)).\n{date}",
            context = ctx.context,
            question = ctx.question,
            window = ctx.cadence.recency_window(),
            date = date_line(ctx),
        )
    }
}

pub struct SubtopicReportPrompt;

impl PromptBuilder for SubtopicReportPrompt {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        let existing = if ctx.existing_headers.is_empty() {
            "(none yet)".to_string()
        } else {
            ctx.existing_headers.join("\n")
        };
        format!(
            "Context:\n\"{context}\"\n\n\
             Write a detailed report section on the subtopic \"{subtopic}\" of the main topic \"{main}\", \
             using only the context above.\n{recency}\
             Use markdown in {format} format. Include only the body: no introduction, conclusion or \
             references, and no H1 headings. Hyperlink sources inline.\n\n\
             Headers already used by other sections:\n{existing}\n\n\
             Do not reuse any of these headers or repeat their details.\n\
             Leave out anything unrelated to the main topic.\n{date}",
            context = ctx.context,
            subtopic = ctx.question,
            main = ctx.main_topic,
            recency = recency_line(ctx),
            format = ctx.report_format.to_uppercase(),
            existing = existing,
            date = date_line(ctx),
        )
    }
}

// ============= Registry =============

/// Report kind to prompt builder.
#[derive(Clone, Default)]
pub struct PromptRegistry {
    builders: HashMap<ReportKind, Arc<dyn PromptBuilder>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One builder for every report kind.
    pub fn with_default_builders() -> Self {
        let mut registry = Self::new();
        registry.register(ReportKind::ResearchReport, Arc::new(ResearchReportPrompt));
        registry.register(ReportKind::Paragraph, Arc::new(ParagraphPrompt));
        registry.register(ReportKind::Json, Arc::new(JsonPrompt));
        registry.register(ReportKind::DetailedJson, Arc::new(DetailedJsonPrompt));
        registry.register(ReportKind::ResourceReport, Arc::new(ResourceReportPrompt));
        registry.register(ReportKind::OutlineReport, Arc::new(OutlineReportPrompt));
        registry.register(ReportKind::Table, Arc::new(TablePrompt));
        registry.register(ReportKind::CustomReport, Arc::new(CustomReportPrompt));
        registry.register(
            ReportKind::NewsletterReport,
            Arc::new(NewsletterReportPrompt { extended: false }),
        );
        registry.register(
            ReportKind::LongNewsletterReport,
            Arc::new(NewsletterReportPrompt { extended: true }),
        );
        registry.register(ReportKind::NewsletterParagraph, Arc::new(NewsletterParagraphPrompt));
        registry.register(ReportKind::DetailedReport, Arc::new(IntroductionPrompt));
        registry.register(ReportKind::SubtopicReport, Arc::new(SubtopicReportPrompt));
        registry
    }

    pub fn register(&mut self, kind: ReportKind, builder: Arc<dyn PromptBuilder>) {
        self.builders.insert(kind, builder);
    }

    pub fn get(&self, kind: ReportKind) -> Result<Arc<dyn PromptBuilder>> {
        self.builders
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("No prompt builder for {}", kind)))
    }

    pub fn build(&self, kind: ReportKind, ctx: &PromptContext<'_>) -> Result<String> {
        Ok(self.get(kind)?.build(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ctx<'a>(cadence: Cadence) -> PromptContext<'a> {
        PromptContext {
            question: "Retail sector outlook",
            context: "Source: https://a.example\nTitle: A\nContent: body\n",
            retained: "Q3 revenue up 4%",
            deleted: "store closures",
            cadence,
            today: "October 17, 2026".to_string(),
            ..PromptContext::default()
        }
    }

    #[test]
    fn test_every_kind_has_a_builder() {
        let registry = PromptRegistry::with_default_builders();
        for kind in ReportKind::ALL {
            assert!(registry.get(kind).is_ok(), "missing builder for {}", kind);
        }
    }

    #[rstest]
    #[case(ReportKind::NewsletterReport)]
    #[case(ReportKind::LongNewsletterReport)]
    #[case(ReportKind::NewsletterParagraph)]
    fn test_newsletter_prompts_carry_curation_and_recency(#[case] kind: ReportKind) {
        let prompt = PromptRegistry::with_default_builders()
            .build(kind, &ctx(Cadence::Weekly))
            .unwrap();
        assert!(prompt.contains("Q3 revenue up 4%"));
        assert!(prompt.contains("store closures"));
        assert!(prompt.contains("previous week"));
    }

    #[test]
    fn test_subtopic_prompt_lists_existing_headers() {
        let headers = vec!["Supply Chains".to_string(), "Pricing".to_string()];
        let prompt = SubtopicReportPrompt.build(&PromptContext {
            question: "Labor",
            main_topic: "Retail sector outlook",
            existing_headers: &headers,
            ..ctx(Cadence::None)
        });
        assert!(prompt.contains("Supply Chains\nPricing"));
        assert!(prompt.contains("\"Labor\""));
        assert!(prompt.contains("no restrictions"));
    }

    #[test]
    fn test_custom_prompt_uses_task_as_instruction() {
        let prompt = CustomReportPrompt.build(&ctx(Cadence::None));
        assert!(prompt.ends_with("Retail sector outlook"));
    }

    #[test]
    fn test_every_prompt_states_the_date_once() {
        let registry = PromptRegistry::with_default_builders();
        for kind in ReportKind::ALL {
            let prompt = registry.build(kind, &ctx(Cadence::Weekly)).unwrap();
            assert_eq!(
                prompt.matches("October 17, 2026").count(),
                1,
                "date missing or repeated for {}",
                kind
            );
        }
    }
}
