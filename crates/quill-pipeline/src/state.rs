use std::fmt;

use quill_core::{Agent, ContentLength};

use crate::generator::GeneratedContent;

/// One step of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    BuildSystemPrompt,
    GenerateContent,
    ExtractTitle,
    GenerateMetaTitle,
    GenerateMetaDescription,
    ExtractKeywords,
    Aggregate,
    Done,
    Failed,
}

impl PipelineStep {
    /// Transition table for the happy path. `Done` and `Failed` are absorbing.
    pub fn next(self) -> PipelineStep {
        use PipelineStep::*;
        match self {
            BuildSystemPrompt => GenerateContent,
            GenerateContent => ExtractTitle,
            ExtractTitle => GenerateMetaTitle,
            GenerateMetaTitle => GenerateMetaDescription,
            GenerateMetaDescription => ExtractKeywords,
            ExtractKeywords => Aggregate,
            Aggregate => Done,
            Done => Done,
            Failed => Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStep::Done | PipelineStep::Failed)
    }

    /// Steps that call the completion service.
    pub fn calls_completion(self) -> bool {
        matches!(
            self,
            PipelineStep::GenerateContent
                | PipelineStep::GenerateMetaTitle
                | PipelineStep::GenerateMetaDescription
                | PipelineStep::ExtractKeywords
        )
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStep::BuildSystemPrompt => "build_system_prompt",
            PipelineStep::GenerateContent => "generate_content",
            PipelineStep::ExtractTitle => "extract_title",
            PipelineStep::GenerateMetaTitle => "generate_meta_title",
            PipelineStep::GenerateMetaDescription => "generate_meta_description",
            PipelineStep::ExtractKeywords => "extract_keywords",
            PipelineStep::Aggregate => "aggregate",
            PipelineStep::Done => "done",
            PipelineStep::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Checkpoint of one pipeline execution: the inputs, the current step and
/// every output produced so far.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub agent: Agent,
    pub topic: String,
    pub keyword: Option<String>,
    pub length: ContentLength,
    pub step: PipelineStep,
    /// Step that was executing when the run entered `Failed`.
    pub failed_at: Option<PipelineStep>,

    pub system_prompt: Option<String>,
    pub content_prompt: Option<String>,
    pub content: Option<String>,
    pub title: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Option<Vec<String>>,
    /// Tokens spent by completed completion calls of this run.
    pub tokens_used: u32,
    pub output: Option<GeneratedContent>,
}

impl PipelineRun {
    pub fn new(
        agent: Agent,
        topic: String,
        keyword: Option<String>,
        length: ContentLength,
    ) -> Self {
        Self {
            agent,
            topic,
            keyword,
            length,
            step: PipelineStep::BuildSystemPrompt,
            failed_at: None,
            system_prompt: None,
            content_prompt: None,
            content: None,
            title: None,
            meta_title: None,
            meta_description: None,
            keywords: None,
            tokens_used: 0,
            output: None,
        }
    }

    pub(crate) fn advance(&mut self) {
        self.step = self.step.next();
    }

    pub(crate) fn fail(&mut self) {
        if self.step != PipelineStep::Failed {
            self.failed_at = Some(self.step);
            self.step = PipelineStep::Failed;
        }
    }

    /// Re-enter the step that failed, keeping earlier outputs.
    pub fn resume(&mut self) {
        if let (PipelineStep::Failed, Some(step)) = (self.step, self.failed_at.take()) {
            self.step = step;
        }
    }

    /// Discard all progress and start again from the first step.
    pub fn restart(&mut self) {
        *self = PipelineRun::new(
            self.agent.clone(),
            std::mem::take(&mut self.topic),
            self.keyword.take(),
            self.length,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_is_linear() {
        let mut step = PipelineStep::BuildSystemPrompt;
        let mut seen = vec![step];
        while !step.is_terminal() {
            step = step.next();
            seen.push(step);
        }
        assert_eq!(
            seen,
            vec![
                PipelineStep::BuildSystemPrompt,
                PipelineStep::GenerateContent,
                PipelineStep::ExtractTitle,
                PipelineStep::GenerateMetaTitle,
                PipelineStep::GenerateMetaDescription,
                PipelineStep::ExtractKeywords,
                PipelineStep::Aggregate,
                PipelineStep::Done,
            ]
        );
        assert_eq!(PipelineStep::Failed.next(), PipelineStep::Failed);
        assert_eq!(seen.iter().filter(|s| s.calls_completion()).count(), 4);
    }

    #[test]
    fn resume_and_restart() {
        let agent = Agent::new("Ada", "databases");
        let mut run = PipelineRun::new(agent, "Indexes".into(), None, ContentLength::Short);
        run.advance();
        run.content = Some("<h1>Indexes</h1>".into());
        run.tokens_used = 10;
        run.advance();
        run.advance();
        run.fail();
        assert_eq!(run.step, PipelineStep::Failed);
        assert_eq!(run.failed_at, Some(PipelineStep::GenerateMetaTitle));

        run.resume();
        assert_eq!(run.step, PipelineStep::GenerateMetaTitle);
        assert_eq!(run.tokens_used, 10);

        run.fail();
        run.restart();
        assert_eq!(run.step, PipelineStep::BuildSystemPrompt);
        assert_eq!(run.topic, "Indexes");
        assert!(run.content.is_none());
        assert_eq!(run.tokens_used, 0);
    }
}
