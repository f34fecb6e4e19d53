//! Caption model abstraction and caption set generation.
//!
//! A caption set combines two passes against the same model:
//! - a deterministic pass (temperature 0, fixed seed) that asks for several
//!   hypotheses through different captioning prompts
//! - a stochastic pass that samples extra captions concurrently
//!
//! Duplicates are removed by exact match, keeping first-seen order.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures_util::future::join_all;
use rand::Rng;

use crate::config::CaptionConfig;
use crate::error::{PipelineError, PipelineResult};

use super::retry;

/// Prompts for the deterministic pass, cycled when more captions are asked for.
const CAPTION_PROMPTS: &[&str] = &[
    "Write a short caption for this image in one sentence.",
    "Describe the main subject of this image and what it is doing in one sentence.",
    "Describe this image in one sentence, mentioning clothing, hair and colors.",
    "Describe the setting and background of this image in one short sentence.",
];

/// Seed used by every deterministic request.
const DETERMINISTIC_SEED: u64 = 0;

/// Base64-encoded image ready to send to a caption model.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes and a format identifier
    /// ("jpeg", "png", "webp", ...).
    pub fn from_bytes(bytes: &[u8], format: &str) -> Self {
        let media_type = match format {
            "jpeg" | "jpg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            other => {
                tracing::warn!("Unknown image format '{other}', defaulting to image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }
}

/// How a caption request samples tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    /// Greedy decoding with a fixed seed
    Deterministic { seed: u64 },
    /// Temperature / top-k / top-p sampling
    Stochastic {
        temperature: f32,
        top_k: u32,
        top_p: f32,
        seed: u64,
    },
}

/// A single caption request.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub image: ImageInput,
    pub prompt: String,
    pub max_tokens: u32,
    pub sampling: Sampling,
}

/// Anything that can caption an image.
///
/// Uses `async_trait` so backends can hold an `Arc<dyn CaptionModel>`.
#[async_trait]
pub trait CaptionModel: Send + Sync {
    /// Model name for logging.
    fn name(&self) -> &str;

    /// Generate one caption.
    async fn caption(&self, request: &CaptionRequest) -> PipelineResult<String>;
}

/// Captions generated for one image, deduplicated in first-seen order.
///
/// Consumed by iteration; there is no way to restart it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionSet {
    captions: Vec<String>,
}

impl CaptionSet {
    /// Build a set from raw captions. Captions are trimmed; empty ones and
    /// exact duplicates are dropped.
    pub fn from_captions<I, S>(captions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for caption in captions {
            let caption: String = caption.into();
            let caption = caption.trim();
            if !caption.is_empty() && !unique.iter().any(|c| c == caption) {
                unique.push(caption.to_string());
            }
        }
        Self { captions: unique }
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }
}

impl IntoIterator for CaptionSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.captions.into_iter()
    }
}

/// Run both passes and collect a [`CaptionSet`].
///
/// A failed request is skipped with a warning. Fails only when no caption
/// at all was produced.
pub async fn generate_caption_set(
    model: &dyn CaptionModel,
    image: ImageInput,
    config: &CaptionConfig,
    path: &Path,
) -> PipelineResult<CaptionSet> {
    let mut captions = Vec::new();
    let mut last_error = None;

    for i in 0..config.deterministic_captions {
        let request = CaptionRequest {
            image: image.clone(),
            prompt: CAPTION_PROMPTS[i % CAPTION_PROMPTS.len()].to_string(),
            max_tokens: config.max_tokens,
            sampling: Sampling::Deterministic {
                seed: DETERMINISTIC_SEED,
            },
        };
        match caption_with_retry(model, &request, config, path).await {
            Ok(caption) => captions.push(caption),
            Err(e) => {
                tracing::warn!("Deterministic caption {} failed for {:?}: {e}", i + 1, path);
                last_error = Some(e);
            }
        }
    }

    let sampled: Vec<CaptionRequest> = {
        let mut rng = rand::thread_rng();
        (0..config.sampled_captions)
            .map(|_| CaptionRequest {
                image: image.clone(),
                prompt: CAPTION_PROMPTS[0].to_string(),
                max_tokens: config.max_tokens,
                sampling: Sampling::Stochastic {
                    temperature: config.temperature,
                    top_k: config.top_k,
                    top_p: config.top_p,
                    seed: rng.gen(),
                },
            })
            .collect()
    };

    let results = join_all(
        sampled
            .iter()
            .map(|request| caption_with_retry(model, request, config, path)),
    )
    .await;
    for result in results {
        match result {
            Ok(caption) => captions.push(caption),
            Err(e) => {
                tracing::warn!("Sampled caption failed for {:?}: {e}", path);
                last_error = Some(e);
            }
        }
    }

    let set = CaptionSet::from_captions(captions);
    if set.is_empty() {
        return Err(last_error.unwrap_or_else(|| PipelineError::Caption {
            message: format!("{} produced no captions", model.name()),
            status_code: None,
        }));
    }

    tracing::debug!("Generated {} unique captions for {:?}", set.len(), path);
    Ok(set)
}

/// One caption request with retries on transient failures.
async fn caption_with_retry(
    model: &dyn CaptionModel,
    request: &CaptionRequest,
    config: &CaptionConfig,
    path: &Path,
) -> PipelineResult<String> {
    let mut last_error = None;
    for attempt in 0..=config.retry_attempts {
        if attempt > 0 {
            let delay = retry::backoff_duration(attempt - 1, config.retry_delay_ms);
            tracing::debug!(
                "Retry {attempt}/{} for {:?} after {delay:?}",
                config.retry_attempts,
                path
            );
            tokio::time::sleep(delay).await;
        }

        let result = match config.request_timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    model.caption(request),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::Timeout {
                        path: path.to_path_buf(),
                        stage: "caption".to_string(),
                        timeout_ms,
                    }),
                }
            }
            None => model.caption(request).await,
        };

        match result {
            Ok(caption) => return Ok(caption),
            Err(e) => {
                let retryable = retry::is_retryable(&e);
                last_error = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| PipelineError::Caption {
        message: "No caption attempts were made".to_string(),
        status_code: None,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted caption model: deterministic requests return the scripted
    /// caption for their prompt index, sampled requests pop from a queue.
    pub(crate) struct ScriptedModel {
        pub deterministic: Vec<PipelineResult<String>>,
        pub sampled: Mutex<Vec<PipelineResult<String>>>,
        pub calls: AtomicU32,
        pub requests: Mutex<Vec<CaptionRequest>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(deterministic: &[&str], sampled: &[&str]) -> Self {
            Self {
                deterministic: deterministic.iter().map(|s| Ok(s.to_string())).collect(),
                sampled: Mutex::new(sampled.iter().map(|s| Ok(s.to_string())).collect()),
                calls: AtomicU32::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    fn clone_result(result: &PipelineResult<String>) -> PipelineResult<String> {
        match result {
            Ok(s) => Ok(s.clone()),
            Err(PipelineError::Caption {
                message,
                status_code,
            }) => Err(PipelineError::Caption {
                message: message.clone(),
                status_code: *status_code,
            }),
            Err(e) => Err(PipelineError::Caption {
                message: e.to_string(),
                status_code: None,
            }),
        }
    }

    #[async_trait]
    impl CaptionModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn caption(&self, request: &CaptionRequest) -> PipelineResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            match request.sampling {
                Sampling::Deterministic { .. } => {
                    let idx = CAPTION_PROMPTS
                        .iter()
                        .position(|p| *p == request.prompt)
                        .unwrap();
                    clone_result(&self.deterministic[idx])
                }
                Sampling::Stochastic { .. } => {
                    let mut queue = self.sampled.lock().unwrap();
                    if queue.is_empty() {
                        Ok(String::new())
                    } else {
                        queue.remove(0)
                    }
                }
            }
        }
    }

    fn config(deterministic: usize, sampled: usize) -> CaptionConfig {
        CaptionConfig {
            deterministic_captions: deterministic,
            sampled_captions: sampled,
            retry_attempts: 1,
            retry_delay_ms: 1,
            ..CaptionConfig::default()
        }
    }

    fn image() -> ImageInput {
        ImageInput::from_bytes(&[1, 2, 3], "png")
    }

    #[test]
    fn test_image_input_from_bytes() {
        let input = ImageInput::from_bytes(&[0xFF, 0xD8, 0xFF], "jpeg");
        assert_eq!(input.media_type, "image/jpeg");
        assert_eq!(input.data, "/9j/");
        assert_eq!(ImageInput::from_bytes(&[0], "tiff").media_type, "image/jpeg");
    }

    #[test]
    fn test_caption_set_dedups_in_first_seen_order() {
        let set = CaptionSet::from_captions(["a dog", "a cat", "a dog", "  ", "a cat ", "a bird"]);
        let captions: Vec<String> = set.into_iter().collect();
        assert_eq!(captions, vec!["a dog", "a cat", "a bird"]);
    }

    #[tokio::test]
    async fn test_both_passes_are_combined() {
        let model = ScriptedModel::new(
            &["a dog on grass", "a dog running", "a dog on grass", "green grass"],
            &["a happy dog", "a dog running"],
        );
        let set = generate_caption_set(&model, image(), &config(4, 2), Path::new("dog.png"))
            .await
            .unwrap();
        let captions: Vec<String> = set.into_iter().collect();
        assert_eq!(
            captions,
            vec!["a dog on grass", "a dog running", "green grass", "a happy dog"]
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 6);

        let requests = model.requests.lock().unwrap();
        let deterministic = requests
            .iter()
            .filter(|r| matches!(r.sampling, Sampling::Deterministic { seed: 0 }))
            .count();
        assert_eq!(deterministic, 4);
    }

    #[tokio::test]
    async fn test_failed_requests_are_skipped() {
        let mut model = ScriptedModel::new(&["a cat", "", "", ""], &[]);
        model.deterministic[1] = Err(PipelineError::Caption {
            message: "model not found".to_string(),
            status_code: Some(404),
        });
        let set = generate_caption_set(&model, image(), &config(2, 0), Path::new("cat.png"))
            .await
            .unwrap();
        assert_eq!(set.len(), 1);
        // 404 is not retried.
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let model = ScriptedModel::new(&[], &[]);
        *model.sampled.lock().unwrap() = vec![
            Err(PipelineError::Caption {
                message: "busy".to_string(),
                status_code: Some(503),
            }),
            Ok("a red car".to_string()),
        ];
        let set = generate_caption_set(&model, image(), &config(0, 1), Path::new("car.png"))
            .await
            .unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["a red car"]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_captions_is_an_error() {
        let model = ScriptedModel::new(&["", "  "], &[]);
        let result =
            generate_caption_set(&model, image(), &config(2, 0), Path::new("blank.png")).await;
        assert!(matches!(result, Err(PipelineError::Caption { .. })));
    }
}
