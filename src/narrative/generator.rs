//! AI narrative generation with model fallback.
//!
//! Candidates are tried one at a time, in priority order, until one of them
//! returns usable text. Nothing here fails: the worst case is a placeholder.

use crate::config::AiConfig;
use crate::narrative::gemini::{BackendError, GenerativeBackend};
use futures::future;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// Placeholder when no API key is configured or AI is switched off.
pub const DISABLED_PLACEHOLDER: &str =
    "<p style='color: orange;'>Avertissement : GEMINI_API_KEY manquante ou analyse IA désactivée.</p>";

/// Placeholder when every model candidate failed.
pub const EXHAUSTED_PLACEHOLDER: &str = "<p style='color: red;'>Avertissement : tous les modèles Gemini ont échoué. \
     Vérifiez GEMINI_API_KEY (https://aistudio.google.com/app/apikey) et la liste des modèles.</p>";

/// The narrative attached to the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrative {
    /// HTML produced by `model`.
    Generated { model: String, html: String },
    /// No backend configured; no request was made.
    Disabled,
    /// Every candidate was tried and none produced text.
    Exhausted,
}

impl Narrative {
    /// Body to send: the generated HTML or the matching placeholder.
    pub fn html(&self) -> &str {
        match self {
            Narrative::Generated { html, .. } => html,
            Narrative::Disabled => DISABLED_PLACEHOLDER,
            Narrative::Exhausted => EXHAUSTED_PLACEHOLDER,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Narrative::Generated { .. })
    }
}

/// Produces a [`Narrative`] from the report and git context.
pub struct NarrativeGenerator {
    backend: Option<Box<dyn GenerativeBackend>>,
    models: Vec<String>,
    diff_char_limit: usize,
}

impl NarrativeGenerator {
    /// `backend` is `None` when the API key is missing.
    pub fn new(backend: Option<Box<dyn GenerativeBackend>>, config: &AiConfig) -> Self {
        Self {
            backend,
            models: config.models.clone(),
            diff_char_limit: config.diff_char_limit,
        }
    }

    /// Ask the candidates, in order, for an HTML narrative.
    pub async fn generate(&self, report: &str, diff: &str, changed_files: &[String]) -> Narrative {
        let Some(backend) = self.backend.as_deref() else {
            info!("No Gemini API key, skipping AI narrative");
            return Narrative::Disabled;
        };

        let prompt = build_prompt(report, truncate_chars(diff, self.diff_char_limit), changed_files);

        let generated = stream::iter(&self.models)
            .then(|model| attempt(backend, model, &prompt))
            .filter_map(future::ready);
        futures::pin_mut!(generated);

        match generated.next().await {
            Some((model, html)) => Narrative::Generated { model, html },
            None => {
                warn!("All {} Gemini model candidates failed", self.models.len());
                Narrative::Exhausted
            }
        }
    }
}

/// One request to one candidate. `Some((model, html))` on usable text.
async fn attempt(
    backend: &dyn GenerativeBackend,
    model: &str,
    prompt: &str,
) -> Option<(String, String)> {
    debug!("Trying model {}", model);

    match backend.generate(model, prompt).await {
        Ok(response) => {
            let html = strip_code_fences(response.text());
            if html.is_empty() {
                warn!("Model {} returned an empty response", model);
                None
            } else {
                info!("Narrative generated by {}", model);
                Some((model.to_string(), html))
            }
        }
        Err(BackendError::ModelNotFound(_)) => {
            debug!("Model {} not found, trying next candidate", model);
            None
        }
        Err(e) => {
            warn!("Model {} failed: {}", model, e);
            None
        }
    }
}

/// At most `limit` characters from the start of `text`.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Remove Markdown code fences the model wraps around its HTML.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```html", "").replace("```", "").trim().to_string()
}

/// Prompt sent to every candidate.
pub fn build_prompt(report: &str, diff: &str, changed_files: &[String]) -> String {
    let files = if changed_files.is_empty() {
        "Aucun".to_string()
    } else {
        changed_files.join(", ")
    };

    format!(
        r#"Tu es un expert en revue de code. Génère un **rapport HTML complet** :

**Fichiers modifiés** : {files}
**Diff Git** :
{diff}
**Rapport d'analyse** :
{report}

**Style** :
- Titre principal en <h1> (vert si succès, rouge si échec)
- Fond #f9f9fb
- Boîte blanche centrée avec ombre
- Code en <pre><code>
- Suggestions en bleu, concrètes et actionnables
- Ton professionnel, clair, actionnable
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::gemini::GenerateResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy)]
    enum Script {
        NotFound,
        Text(&'static str),
        Http(u16),
        Malformed,
    }

    /// Backend answering from a per-model script and recording every call.
    struct ScriptedBackend {
        script: HashMap<&'static str, Script>,
        calls: Arc<Mutex<Vec<String>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedBackend {
        fn new(script: &[(&'static str, Script)]) -> (Self, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let backend = Self {
                script: script.iter().copied().collect(),
                calls: calls.clone(),
                prompts: Arc::new(Mutex::new(Vec::new())),
            };
            (backend, calls)
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate(
            &self,
            model: &str,
            prompt: &str,
        ) -> Result<GenerateResponse, BackendError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.prompts.lock().unwrap().push(prompt.to_string());

            match self.script.get(model).copied().unwrap_or(Script::NotFound) {
                Script::NotFound => Err(BackendError::ModelNotFound(model.to_string())),
                Script::Text(text) => Ok(GenerateResponse::with_text(text)),
                Script::Http(status) => Err(BackendError::Http {
                    status,
                    body: "quota".to_string(),
                }),
                Script::Malformed => Err(BackendError::Decode("expected value".to_string())),
            }
        }
    }

    fn config(models: &[&str]) -> AiConfig {
        AiConfig {
            models: models.iter().map(|m| m.to_string()).collect(),
            ..AiConfig::default()
        }
    }

    fn files() -> Vec<String> {
        vec!["app/main.py".to_string()]
    }

    #[tokio::test]
    async fn test_falls_back_past_not_found_models() {
        let (backend, calls) = ScriptedBackend::new(&[
            ("m1", Script::NotFound),
            ("m2", Script::NotFound),
            ("m3", Script::Text("```html\n<h1>OK</h1>\n```")),
            ("m4", Script::Text("<h1>never</h1>")),
        ]);
        let generator =
            NarrativeGenerator::new(Some(Box::new(backend)), &config(&["m1", "m2", "m3", "m4"]));

        let narrative = generator.generate("report", "diff", &files()).await;

        assert_eq!(
            narrative,
            Narrative::Generated {
                model: "m3".to_string(),
                html: "<h1>OK</h1>".to_string()
            }
        );
        assert_eq!(*calls.lock().unwrap(), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_other_failures_also_fall_back() {
        let (backend, calls) = ScriptedBackend::new(&[
            ("m1", Script::Http(429)),
            ("m2", Script::Malformed),
            ("m3", Script::Text("   ")),
            ("m4", Script::Text("<p>fine</p>")),
        ]);
        let generator =
            NarrativeGenerator::new(Some(Box::new(backend)), &config(&["m1", "m2", "m3", "m4"]));

        let narrative = generator.generate("report", "diff", &files()).await;

        assert_eq!(narrative.html(), "<p>fine</p>");
        assert_eq!(calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_exhaustion_yields_placeholder() {
        let (backend, calls) =
            ScriptedBackend::new(&[("m1", Script::NotFound), ("m2", Script::Http(500))]);
        let generator = NarrativeGenerator::new(Some(Box::new(backend)), &config(&["m1", "m2"]));

        let narrative = generator.generate("report", "diff", &files()).await;

        assert_eq!(narrative, Narrative::Exhausted);
        assert_eq!(narrative.html(), EXHAUSTED_PLACEHOLDER);
        assert!(narrative.html().contains("GEMINI_API_KEY"));
        assert_eq!(*calls.lock().unwrap(), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_call() {
        let generator = NarrativeGenerator::new(None, &config(&["m1"]));

        let narrative = generator.generate("report", "diff", &files()).await;

        assert_eq!(narrative, Narrative::Disabled);
        assert_eq!(narrative.html(), DISABLED_PLACEHOLDER);
        assert!(!narrative.is_generated());
    }

    #[tokio::test]
    async fn test_prompt_carries_truncated_diff() {
        let (backend, _calls) = ScriptedBackend::new(&[("m1", Script::Text("<p>x</p>"))]);
        let prompts = backend.prompts.clone();
        let mut ai = config(&["m1"]);
        ai.diff_char_limit = 10;
        let generator = NarrativeGenerator::new(Some(Box::new(backend)), &ai);

        let diff = "0123456789ABCDEF";
        generator.generate("FULL REPORT", diff, &files()).await;

        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("0123456789"));
        assert!(!prompt.contains("ABCDEF"));
        assert!(prompt.contains("FULL REPORT"));
        assert!(prompt.contains("app/main.py"));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 3000), "abc");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```html\n<p>a</p>\n```"), "<p>a</p>");
        assert_eq!(strip_code_fences("<p>plain</p>"), "<p>plain</p>");
        assert_eq!(strip_code_fences("```\n```"), "");
    }

    #[test]
    fn test_build_prompt_sections() {
        let prompt = build_prompt("REPORT", "DIFF", &[]);
        assert!(prompt.contains("**Fichiers modifiés** : Aucun"));
        assert!(prompt.contains("DIFF"));
        assert!(prompt.contains("REPORT"));
        assert!(prompt.contains("<pre><code>"));
        assert!(prompt.contains("<h1>"));
    }
}
