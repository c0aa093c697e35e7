//! Image captioning: raw image bytes → one-sentence description.
//!
//! [`ImageCaptioner`] is the seam the analyzer talks to. Its contract is
//! total: `caption` always returns a string. Any failure (undecodable bytes,
//! provider error, timeout, empty answer) is logged and replaced by
//! [`FALLBACK_CAPTION`].
//!
//! [`VisionCaptioner`] is the production implementation. It resolves its VLM
//! provider once, on [`ImageCaptioner::warm_up`] or first use, and reuses
//! it for every call. Construct one per process and share it behind an
//! `Arc`; tests substitute their own `ImageCaptioner`.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, CaptionError};
use crate::pipeline::{encode, postprocess};
use crate::prompts::{CAPTION_REQUEST, DEFAULT_CAPTION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Caption substituted whenever generation fails.
pub const FALLBACK_CAPTION: &str = "Unable to describe this image.";

/// Default model when a provider is named without one.
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Turns image bytes into a caption. Never fails.
#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    /// Prepare whatever the captioner needs before the first page.
    ///
    /// An error here is fatal for the run. The default has nothing to prepare.
    async fn warm_up(&self) -> Result<(), AnalysisError> {
        Ok(())
    }

    async fn caption(&self, image: &[u8]) -> String;
}

/// A provider that failed to resolve, remembered so later calls fail fast.
#[derive(Debug, Clone)]
struct ResolveFailure {
    provider: String,
    hint: String,
}

impl From<AnalysisError> for ResolveFailure {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::ProviderNotConfigured { provider, hint } => Self { provider, hint },
            other => Self {
                provider: "auto".to_string(),
                hint: other.to_string(),
            },
        }
    }
}

impl From<ResolveFailure> for AnalysisError {
    fn from(f: ResolveFailure) -> Self {
        AnalysisError::ProviderNotConfigured {
            provider: f.provider,
            hint: f.hint,
        }
    }
}

/// Captioner backed by a vision-capable LLM provider.
pub struct VisionCaptioner {
    config: AnalysisConfig,
    provider: OnceCell<Result<Arc<dyn LLMProvider>, ResolveFailure>>,
}

impl VisionCaptioner {
    /// Create a captioner. The provider is not resolved until first use.
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
            provider: OnceCell::new(),
        }
    }

    /// Resolve the provider at most once. A failure is cached as well, so
    /// a misconfigured captioner never retries resolution per image.
    async fn provider(&self) -> Result<&Arc<dyn LLMProvider>, AnalysisError> {
        self.provider
            .get_or_init(|| async { resolve_provider(&self.config).map_err(ResolveFailure::from) })
            .await
            .as_ref()
            .map_err(|f| f.clone().into())
    }

    /// Caption with the error preserved; [`ImageCaptioner::caption`] maps it
    /// to the fallback.
    pub async fn try_caption(&self, image: &[u8]) -> Result<String, CaptionError> {
        let image_data =
            encode::encode_for_caption(image).map_err(|e| CaptionError::Decode(e.to_string()))?;

        let provider = self
            .provider()
            .await
            .map_err(|e| CaptionError::ProviderUnavailable(e.to_string()))?;

        let system_prompt = self
            .config
            .caption_prompt
            .as_deref()
            .unwrap_or(DEFAULT_CAPTION_PROMPT);
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images(CAPTION_REQUEST, vec![image_data]),
        ];
        let options = build_options(&self.config);

        let call = provider.chat(&messages, Some(&options));
        let response = match self.config.caption_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), call)
                .await
                .map_err(|_| CaptionError::Timeout { secs })?,
            None => call.await,
        }
        .map_err(|e| CaptionError::Provider(e.to_string()))?;

        debug!(
            "Caption: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        postprocess::clean_caption(&response.content).ok_or(CaptionError::EmptyResponse)
    }
}

#[async_trait]
impl ImageCaptioner for VisionCaptioner {
    /// Resolve the provider now, surfacing configuration errors as fatal,
    /// so a missing API key aborts the run instead of turning every caption
    /// into the fallback.
    async fn warm_up(&self) -> Result<(), AnalysisError> {
        self.provider().await?;
        info!(
            "Vision provider ready (model: {})",
            self.config.model.as_deref().unwrap_or("provider default")
        );
        Ok(())
    }

    async fn caption(&self, image: &[u8]) -> String {
        match self.try_caption(image).await {
            Ok(caption) => caption,
            Err(e) => {
                warn!("Caption generation failed, using fallback: {}", e);
                FALLBACK_CAPTION.to_string()
            }
        }
    }
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the VLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI key** (`OPENAI_API_KEY`) with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalysisError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
