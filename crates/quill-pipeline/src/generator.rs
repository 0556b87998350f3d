use std::collections::BTreeMap;
use std::sync::Arc;

use quill_core::config::GenerationConfig;
use quill_core::{Agent, ContentLength, NewPost, SeoMetadata};
use quill_llm::{Completion, CompletionRequest, CompletionService};
use quill_seo::SeoAnalyzer;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::prompts;
use crate::state::{PipelineRun, PipelineStep};
use crate::title::extract_title;

const META_TITLE_MAX_CHARS: usize = 70;
const META_DESCRIPTION_MAX_CHARS: usize = 160;
const PROMPT_EXCERPT_CHARS: usize = 1000;

/// Finished article plus everything needed to persist it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
    pub seo: SeoMetadata,
    /// Sum over all four completion calls of the run.
    pub tokens_used: u32,
    pub word_count: u32,
    /// Leading excerpt of the content prompt.
    pub generation_prompt: String,
}

impl GeneratedContent {
    pub fn into_new_post(self, agent_id: &str) -> NewPost {
        NewPost {
            agent_id: agent_id.to_string(),
            title: self.title,
            content: self.content,
            seo: self.seo,
            tokens_used: self.tokens_used,
            word_count: self.word_count,
            generation_prompt: Some(self.generation_prompt),
        }
    }
}

/// Drives [`PipelineRun`]s through the generation steps.
pub struct ContentGenerator {
    completion: Arc<dyn CompletionService>,
    seo: Arc<dyn SeoAnalyzer>,
    config: GenerationConfig,
}

impl ContentGenerator {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        seo: Arc<dyn SeoAnalyzer>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            completion,
            seo,
            config,
        }
    }

    /// Build a fresh run, filling in the default topic and keyword from the
    /// agent's expertise.
    pub fn prepare(
        &self,
        agent: &Agent,
        topic: Option<&str>,
        keyword: Option<&str>,
        length: Option<ContentLength>,
    ) -> PipelineRun {
        let topic = non_blank(topic)
            .map(String::from)
            .unwrap_or_else(|| format!("Latest trends in {}", agent.expertise));
        let keyword = non_blank(keyword)
            .or_else(|| non_blank(Some(agent.expertise.as_str())))
            .map(String::from);
        PipelineRun::new(
            agent.clone(),
            topic,
            keyword,
            length.unwrap_or(agent.content_length),
        )
    }

    /// Generate one article from scratch.
    pub async fn run(
        &self,
        agent: &Agent,
        topic: Option<&str>,
        keyword: Option<&str>,
    ) -> Result<GeneratedContent> {
        let mut run = self.prepare(agent, topic, keyword, None);
        self.execute(&mut run).await
    }

    /// Execute `run` until it is done or a step fails.
    ///
    /// A run in `Failed` resumes from the step that failed; call
    /// [`PipelineRun::restart`] first to start over instead.
    #[instrument(skip(self, run), fields(agent_id = %run.agent.id))]
    pub async fn execute(&self, run: &mut PipelineRun) -> Result<GeneratedContent> {
        run.resume();
        if run.step == PipelineStep::Failed {
            run.restart();
        }

        while !run.step.is_terminal() {
            let step = run.step;
            debug!(%step, "pipeline step");
            if let Err(e) = self.execute_step(run).await {
                warn!(%step, error = %e, "pipeline step failed");
                run.fail();
                return Err(e);
            }
            run.advance();
        }

        run.output.clone().ok_or(PipelineError::NoOutput)
    }

    async fn execute_step(&self, run: &mut PipelineRun) -> Result<()> {
        match run.step {
            PipelineStep::BuildSystemPrompt => {
                if run.agent.expertise.trim().is_empty() {
                    return Err(PipelineError::MissingField {
                        agent_id: run.agent.id.clone(),
                        field: "expertise",
                    });
                }
                let language = &self.config.language;
                run.system_prompt = Some(prompts::system_prompt(&run.agent, language));
                run.content_prompt = Some(prompts::content_prompt(
                    &run.topic,
                    run.keyword.as_deref(),
                    run.length,
                    language,
                ));
            }
            PipelineStep::GenerateContent => {
                let req = CompletionRequest::new(
                    run.content_prompt.clone().unwrap_or_default(),
                    self.config.max_tokens,
                    self.config.temperature,
                )
                .with_system(run.system_prompt.clone().unwrap_or_default());

                let completion = self.complete(PipelineStep::GenerateContent, &req).await?;
                run.tokens_used += completion.tokens_used;
                if completion.text.trim().is_empty() {
                    return Err(PipelineError::EmptyContent);
                }
                run.content = Some(completion.text);
            }
            PipelineStep::ExtractTitle => {
                run.title = Some(extract_title(content_of(run)));
            }
            PipelineStep::GenerateMetaTitle => {
                let prompt = prompts::meta_title_prompt(content_of(run), run.keyword.as_deref());
                let completion = self
                    .complete(PipelineStep::GenerateMetaTitle, &self.meta_request(prompt))
                    .await?;
                run.tokens_used += completion.tokens_used;
                run.meta_title = Some(truncate_chars(completion.text.trim(), META_TITLE_MAX_CHARS));
            }
            PipelineStep::GenerateMetaDescription => {
                let prompt =
                    prompts::meta_description_prompt(content_of(run), run.keyword.as_deref());
                let completion = self
                    .complete(PipelineStep::GenerateMetaDescription, &self.meta_request(prompt))
                    .await?;
                run.tokens_used += completion.tokens_used;
                run.meta_description = Some(truncate_chars(
                    completion.text.trim(),
                    META_DESCRIPTION_MAX_CHARS,
                ));
            }
            PipelineStep::ExtractKeywords => {
                let prompt = prompts::keywords_prompt(content_of(run));
                let completion = self
                    .complete(PipelineStep::ExtractKeywords, &self.meta_request(prompt))
                    .await?;
                run.tokens_used += completion.tokens_used;
                run.keywords = Some(parse_keywords(&completion.text));
            }
            PipelineStep::Aggregate => {
                run.output = Some(self.aggregate(run));
            }
            PipelineStep::Done | PipelineStep::Failed => {}
        }
        Ok(())
    }

    fn aggregate(&self, run: &PipelineRun) -> GeneratedContent {
        let content = content_of(run).to_string();
        let title = run
            .title
            .clone()
            .unwrap_or_else(|| extract_title(&content));
        let keywords = run.keywords.clone().unwrap_or_default();

        let keyword_density = if keywords.is_empty() {
            BTreeMap::new()
        } else {
            self.seo.keyword_density(&content, &keywords)
        };
        let seo = SeoMetadata {
            meta_title: run.meta_title.clone().unwrap_or_default(),
            meta_description: run.meta_description.clone().unwrap_or_default(),
            keywords,
            readability_score: self.seo.readability(&content),
            keyword_density,
            slug: self.seo.slug(&title),
        };
        let word_count = content.split_whitespace().count() as u32;
        let generation_prompt = prompts::excerpt(
            run.content_prompt.as_deref().unwrap_or_default(),
            PROMPT_EXCERPT_CHARS,
        )
        .to_string();

        info!(
            word_count,
            tokens_used = run.tokens_used,
            title = %title,
            "content generated"
        );

        GeneratedContent {
            title,
            content,
            seo,
            tokens_used: run.tokens_used,
            word_count,
            generation_prompt,
        }
    }

    fn meta_request(&self, prompt: String) -> CompletionRequest {
        CompletionRequest::new(prompt, self.config.meta_max_tokens, self.config.temperature)
    }

    async fn complete(&self, step: PipelineStep, req: &CompletionRequest) -> Result<Completion> {
        self.completion
            .complete(req)
            .await
            .map_err(|source| PipelineError::Completion { step, source })
    }
}

fn content_of(run: &PipelineRun) -> &str {
    run.content.as_deref().unwrap_or_default()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Keywords from a JSON array response. Anything else yields an empty list.
fn parse_keywords(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Ok(_) => {
            warn!("keyword response is not a JSON array, using empty list");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "failed to parse keyword JSON, using empty list");
            Vec::new()
        }
    }
}
