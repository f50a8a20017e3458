//! Prompt assembly from the named templates in `prompts.toml`.
//!
//! Every literal string sent to a provider is built here, so the other
//! modules never concatenate prompt text themselves. Templates are
//! compiled once in [`PromptBuilder::new`]; a syntax error is a startup
//! failure. Rendering runs with strict undefined handling, which turns a
//! misspelled substitution into an error instead of an empty string.

use crate::config::Language;
use crate::error::DocChatError;
use crate::resources::{Placeholders, PromptResources};
use crate::session::{Role, Turn};
use minijinja::{context, Environment, UndefinedBehavior};
use serde::Serialize;

/// Renders the system / query / followup / context / validation templates.
#[derive(Debug)]
pub struct PromptBuilder {
    env: Environment<'static>,
    placeholders: Placeholders,
    language: Language,
}

impl PromptBuilder {
    /// Compile every template variant.
    ///
    /// # Errors
    /// [`DocChatError::TemplateInvalid`] naming the first template that
    /// fails to compile.
    pub fn new(resources: &PromptResources, language: Language) -> Result<Self, DocChatError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        for (name, variants) in resources.templates.iter() {
            for lang in [Language::English, Language::Chinese] {
                let key = template_key(name, lang);
                let source = variants.get(lang).trim().to_string();
                env.add_template_owned(key.clone(), source)
                    .map_err(|e| DocChatError::TemplateInvalid {
                        name: key,
                        detail: e.to_string(),
                    })?;
            }
        }

        Ok(Self {
            env,
            placeholders: resources.placeholders.clone(),
            language,
        })
    }

    /// Language used by [`Self::build_query_prompt`] and
    /// [`Self::build_followup_prompt`].
    pub fn language(&self) -> Language {
        self.language
    }

    /// Switch the default language.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// `system ++ "\n\n" ++ query(text, query)`.
    ///
    /// Documents are joined with a blank line; an empty list renders the
    /// fixed "no content" placeholder.
    pub fn build_query_prompt(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<String, DocChatError> {
        let system = self.render("system", self.language, context! {})?;
        let body = self.render(
            "query",
            self.language,
            context! { text => self.document_text(documents), query => query },
        )?;
        Ok(format!("{system}\n\n{body}"))
    }

    /// Like [`Self::build_query_prompt`] but carries the prior turns.
    pub fn build_followup_prompt(
        &self,
        query: &str,
        documents: &[String],
        history: &[Turn],
    ) -> Result<String, DocChatError> {
        let system = self.render("system", self.language, context! {})?;
        let body = self.render(
            "followup",
            self.language,
            context! {
                text => self.document_text(documents),
                history => self.format_history(history),
                query => query,
            },
        )?;
        Ok(format!("{system}\n\n{body}"))
    }

    /// Ask for a structured analysis of a whole document.
    pub fn build_context_prompt(
        &self,
        content: &str,
        language: Language,
    ) -> Result<String, DocChatError> {
        let content = if content.trim().is_empty() {
            self.placeholders.no_content.get(language)
        } else {
            content
        };
        self.render("context", language, context! { content => content })
    }

    /// Ask the model to check `response` against `source`.
    pub fn build_validation_prompt(
        &self,
        response: &str,
        source: &str,
        language: Language,
    ) -> Result<String, DocChatError> {
        let source = if source.trim().is_empty() {
            self.placeholders.no_content.get(language)
        } else {
            source
        };
        self.render(
            "validation",
            language,
            context! { source => source, response => response },
        )
    }

    /// One `Label: content` line per turn, oldest first.
    pub fn format_history(&self, history: &[Turn]) -> String {
        let user = self.placeholders.user_label.get(self.language);
        let assistant = self.placeholders.assistant_label.get(self.language);
        let mut out = String::new();
        for turn in history {
            let label = match turn.role {
                Role::User => user,
                Role::Assistant => assistant,
            };
            out.push_str(label);
            out.push_str(": ");
            out.push_str(&turn.content);
            out.push('\n');
        }
        out
    }

    fn document_text(&self, documents: &[String]) -> String {
        let joined = documents
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if joined.is_empty() {
            self.placeholders.no_content.get(self.language).to_string()
        } else {
            joined
        }
    }

    fn render<S: Serialize>(
        &self,
        name: &str,
        language: Language,
        ctx: S,
    ) -> Result<String, DocChatError> {
        let key = template_key(name, language);
        let err = |e: minijinja::Error| DocChatError::PromptRender {
            name: key.clone(),
            detail: e.to_string(),
        };
        self.env.get_template(&key).map_err(err)?.render(ctx).map_err(err)
    }
}

fn template_key(name: &str, language: Language) -> String {
    format!("{name}.{}", language.tag())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Resources;

    fn builder(language: Language) -> PromptBuilder {
        let res = Resources::embedded().unwrap();
        PromptBuilder::new(&res.prompts, language).unwrap()
    }

    #[test]
    fn empty_documents_use_placeholder() {
        let b = builder(Language::English);
        let prompt = b.build_query_prompt("Q", &[]).unwrap();
        assert!(prompt.contains("No text content was provided."), "got: {prompt}");
        assert!(prompt.contains("Question: Q"));
    }

    #[test]
    fn blank_documents_use_placeholder() {
        let b = builder(Language::Chinese);
        let prompt = b.build_query_prompt("Q", &["   ".to_string()]).unwrap();
        assert!(prompt.contains("没有提供文本内容。"), "got: {prompt}");
    }

    #[test]
    fn system_prompt_comes_first() {
        let b = builder(Language::English);
        let prompt = b
            .build_query_prompt("What is the method?", &["Paper text".to_string()])
            .unwrap();
        let res = Resources::embedded().unwrap();
        let system = res.prompts.templates.system.en.trim();
        assert!(prompt.starts_with(system));
        assert!(prompt[system.len()..].starts_with("\n\n"));
        assert!(prompt.contains("Paper text"));
        assert!(prompt.contains("What is the method?"));
    }

    #[test]
    fn documents_joined_in_order() {
        let b = builder(Language::English);
        let docs = vec!["first".to_string(), "second".to_string()];
        let prompt = b.build_query_prompt("Q", &docs).unwrap();
        assert!(prompt.contains("first\n\nsecond"));
    }

    #[test]
    fn followup_renders_history_in_order() {
        let b = builder(Language::English);
        let history = vec![Turn::user("What is X?"), Turn::assistant("X is Y.")];
        let prompt = b
            .build_followup_prompt("And Z?", &["doc".to_string()], &history)
            .unwrap();
        let user_at = prompt.find("User: What is X?").unwrap();
        let assistant_at = prompt.find("Assistant: X is Y.").unwrap();
        assert!(user_at < assistant_at);
        assert!(prompt.contains("And Z?"));
    }

    #[test]
    fn history_labels_follow_language() {
        let b = builder(Language::Chinese);
        let text = b.format_history(&[Turn::user("你好"), Turn::assistant("您好")]);
        assert_eq!(text, "用户: 你好\n助手: 您好\n");
    }

    #[test]
    fn context_and_validation_prompts() {
        let b = builder(Language::English);
        let ctx = b.build_context_prompt("Abstract.", Language::Chinese).unwrap();
        assert!(ctx.contains("Abstract."));
        assert!(ctx.contains("研究问题"));

        let val = b
            .build_validation_prompt("The answer", "The source", Language::English)
            .unwrap();
        assert!(val.contains("The answer"));
        assert!(val.contains("The source"));
    }

    #[test]
    fn invalid_template_is_fatal() {
        let mut res = Resources::embedded().unwrap();
        res.prompts.templates.query.en = "{{ text ".to_string();
        let err = PromptBuilder::new(&res.prompts, Language::English).unwrap_err();
        assert!(matches!(err, DocChatError::TemplateInvalid { .. }), "got: {err}");
    }

    #[test]
    fn unknown_substitution_fails_render() {
        let mut res = Resources::embedded().unwrap();
        res.prompts.templates.query.en = "{{ txet }} {{ query }}".to_string();
        let b = PromptBuilder::new(&res.prompts, Language::English).unwrap();
        let err = b.build_query_prompt("Q", &[]).unwrap_err();
        assert!(matches!(err, DocChatError::PromptRender { .. }), "got: {err}");
    }
}
