//! # Whisper Recognition Model
//!
//! Loads and runs Whisper models using Candle-rs. The recognizer consumes
//! 16kHz mono PCM produced by the audio decoder and emits the raw transcript
//! together with the detected language and per-window segments.
//!
//! ## Model Loading Process:
//! 1. Download model files from HuggingFace if not cached locally
//! 2. Load model weights and tokenizer
//! 3. Initialize the model on the CPU device
//!
//! ## Decoding:
//! Decoding is deterministic: greedy argmax with temperature 0 and a single
//! candidate per step, so the same audio always yields the same transcript.

use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use tokenizers::Tokenizer;

/// Audio sample rate the recognizer expects, in Hz.
pub const SAMPLE_RATE: usize = 16_000;

/// Maximum window Whisper processes at once, in seconds.
const WINDOW_SECONDS: usize = 30;

/// Available Whisper model sizes.
///
/// Larger models are more accurate but slower and heavier; `Base` is the
/// service default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace model repository for this size.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }

    /// Approximate on-disk model size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// Deterministic inference parameters for a single recognition call.
#[derive(Debug, Clone, Default)]
pub struct DecodingOptions {
    /// Language hint ("zh", "en", ...). `None` means detect automatically.
    pub language: Option<String>,
}

/// One decoded audio window.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Segment {
    /// Segment start within the file, in seconds.
    pub start: f64,
    /// Segment end within the file, in seconds.
    pub end: f64,
    /// Text decoded from this window.
    pub text: String,
}

/// Output of one recognition call over a whole file.
#[derive(Debug, Clone)]
pub struct RecognizerOutput {
    /// Concatenated transcript across all segments, untrimmed.
    pub text: String,
    /// Detected (or hinted) language code, e.g. "zh".
    pub language: String,
    /// Per-window segments in audio order.
    pub segments: Vec<Segment>,
}

/// A loaded Whisper model ready for recognition.
pub struct WhisperRecognizer {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
    mel_filters: Vec<f32>,
    size: ModelSize,
}

impl WhisperRecognizer {
    /// Download (if needed) and load a Whisper model from HuggingFace.
    ///
    /// ## Returns:
    /// - **Ok(WhisperRecognizer)**: model loaded and ready
    /// - **Err(anyhow::Error)**: download or deserialization failed
    pub async fn load(size: ModelSize) -> Result<Self> {
        tracing::info!("Loading Whisper {} model...", size);
        let start_time = std::time::Instant::now();
        let device = Device::Cpu;

        let api = {
            use hf_hub::api::tokio::ApiBuilder;
            let mut builder = ApiBuilder::new().with_progress(false);
            if let Ok(token) = std::env::var("HF_TOKEN") {
                builder = builder.with_token(Some(token));
            }
            if let Ok(cache_dir) = std::env::var("HF_HUB_CACHE") {
                builder = builder.with_cache_dir(cache_dir.into());
            }
            builder
                .build()
                .map_err(|e| anyhow!("Failed to initialize HuggingFace API client: {}", e))?
        };

        let repo = api.model(size.repo_name().to_string());

        let config_filename = repo
            .get("config.json")
            .await
            .map_err(|e| anyhow!("Failed to download config.json from {}: {}", size.repo_name(), e))?;
        let tokenizer_filename = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| anyhow!("Failed to download tokenizer.json from {}: {}", size.repo_name(), e))?;
        let model_filename = repo
            .get("model.safetensors")
            .await
            .map_err(|e| anyhow!("Failed to download model weights from {}: {}", size.repo_name(), e))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_filename)?)?;
        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        let mel_filters = Self::create_mel_filter_bank(&config);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[model_filename], m::DTYPE, &device)?
        };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        tracing::info!(
            "Whisper {} model loaded in {:.2}s",
            size,
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
            mel_filters,
            size,
        })
    }

    /// Size of the loaded model.
    pub fn size(&self) -> ModelSize {
        self.size
    }

    /// Transcribe 16kHz mono PCM to text.
    ///
    /// Audio is processed in 30-second windows, each producing one segment.
    /// Language is taken from the options when hinted, otherwise detected
    /// from the first window.
    pub fn transcribe(
        &mut self,
        samples: &[f32],
        options: &DecodingOptions,
    ) -> Result<RecognizerOutput> {
        if samples.is_empty() {
            return Err(anyhow!("Audio data is empty"));
        }

        let window_len = WINDOW_SECONDS * SAMPLE_RATE;
        let mut segments = Vec::new();
        let mut language: Option<u32> = options
            .language
            .as_deref()
            .and_then(language_token);

        for (index, window) in samples.chunks(window_len).enumerate() {
            let mel = self.pcm_to_mel(window)?;
            let mel = mel.unsqueeze(0)?;
            let encoder_output = self.model.encoder.forward(&mel, false)?;

            // Detect once, on the first window, when no hint was given.
            if language.is_none() {
                language = Some(self.detect_language(&encoder_output)?);
            }

            let text = self.decode_window(&encoder_output, language)?;
            let start = (index * window_len) as f64 / SAMPLE_RATE as f64;
            let end = (index * window_len + window.len()) as f64 / SAMPLE_RATE as f64;
            segments.push(Segment { start, end, text });
        }

        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let language = language
            .and_then(language_code)
            .unwrap_or("unknown")
            .to_string();

        Ok(RecognizerOutput {
            text,
            language,
            segments,
        })
    }

    /// Greedily decode one encoded window into text.
    fn decode_window(&mut self, encoder_output: &Tensor, language: Option<u32>) -> Result<String> {
        const MAX_TOKENS: usize = 224;

        let mut tokens = vec![SOT_TOKEN];
        if let Some(lang_token) = language {
            tokens.push(lang_token);
        }
        tokens.push(TRANSCRIBE_TOKEN);

        let mut output_tokens = Vec::new();
        for _ in 0..MAX_TOKENS {
            let token_tensor = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;
            let logits = self.model.decoder.forward(&token_tensor, encoder_output, false)?;
            let last_logits = logits.i((.., tokens.len() - 1, ..))?;
            let next_token = last_logits.argmax_keepdim(1)?.to_scalar::<u32>()?;

            if next_token == EOT_TOKEN {
                break;
            }
            if is_repetitive(&output_tokens, next_token) {
                break;
            }

            tokens.push(next_token);
            output_tokens.push(next_token);
        }

        self.decode_tokens(&output_tokens)
    }

    /// Pick the most probable language token for an encoded window.
    fn detect_language(&mut self, encoder_output: &Tensor) -> Result<u32> {
        let token_tensor = Tensor::new(&[SOT_TOKEN][..], &self.device)?.unsqueeze(0)?;
        let logits = self.model.decoder.forward(&token_tensor, encoder_output, false)?;
        let logits = logits.i((0, 0, ..))?.to_vec1::<f32>()?;

        let mut best: Option<(u32, f32)> = None;
        for &(_, token) in LANGUAGES {
            let score = logits
                .get(token as usize)
                .copied()
                .ok_or_else(|| anyhow!("Language token {} out of vocabulary range", token))?;
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((token, score));
            }
        }

        match best {
            Some((token, _)) => Ok(token),
            None => Err(anyhow!("Language detection produced no candidate")),
        }
    }

    /// Convert PCM to a log-mel tensor of shape (n_mels, 3000).
    ///
    /// Simplified energy-based features over a triangular filter bank;
    /// pads or truncates every window to 30 seconds.
    fn pcm_to_mel(&self, pcm_data: &[f32]) -> Result<Tensor> {
        let target_len = WINDOW_SECONDS * SAMPLE_RATE;
        let mut padded_audio = vec![0.0f32; target_len];
        let copy_len = pcm_data.len().min(target_len);
        padded_audio[..copy_len].copy_from_slice(&pcm_data[..copy_len]);

        let n_mels = self.config.num_mel_bins as usize;
        let n_frames = 3000;
        let mut mel_data = vec![0.0f32; n_mels * n_frames];

        let frame_size = padded_audio.len() / n_frames;
        for frame in 0..n_frames {
            let start = frame * frame_size;
            let end = (start + frame_size).min(padded_audio.len());

            for mel_bin in 0..n_mels {
                let filter_base = mel_bin * N_FFT;
                let mut energy = 0.0f32;
                for i in start..end {
                    let weight = self
                        .mel_filters
                        .get(filter_base + (i - start) % N_FFT)
                        .copied()
                        .unwrap_or(1.0);
                    energy += padded_audio[i].abs() * weight;
                }
                // -80 dB floor
                mel_data[mel_bin * n_frames + frame] =
                    (energy / frame_size as f32).ln().max(-11.5129);
            }
        }

        Ok(Tensor::from_vec(mel_data, (n_mels, n_frames), &self.device)?)
    }

    /// Triangular mel filter bank sized for this model's mel bin count.
    fn create_mel_filter_bank(config: &Config) -> Vec<f32> {
        let n_mels = config.num_mel_bins as usize;
        let mut filters = vec![0.0f32; N_FFT * n_mels];

        for i in 0..n_mels {
            let center = (i + 1) * N_FFT / (n_mels + 1);
            let width = N_FFT / (n_mels + 1);

            for j in 0..N_FFT {
                if j >= center.saturating_sub(width) && j <= center + width {
                    let distance = (j as i32 - center as i32).abs() as f32;
                    filters[i * N_FFT + j] = (1.0 - distance / width as f32).max(0.0);
                }
            }
        }

        filters
    }

    /// Decode token ids to text, stripping special-token artifacts.
    fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;

        let cleaned = text
            .replace("<|startoftranscript|>", "")
            .replace("<|endoftext|>", "")
            .replace("<|notimestamps|>", "");
        Ok(cleaned.trim().to_string())
    }
}

const N_FFT: usize = 400;

// Standard Whisper special-token ids.
const SOT_TOKEN: u32 = 50258;
const EOT_TOKEN: u32 = 50257;
const TRANSCRIBE_TOKEN: u32 = 50359;

/// Language codes and their Whisper token ids.
const LANGUAGES: &[(&str, u32)] = &[
    ("en", 50259),
    ("zh", 50260),
    ("de", 50261),
    ("es", 50262),
    ("ru", 50263),
    ("ko", 50264),
    ("fr", 50265),
    ("ja", 50266),
    ("pt", 50267),
    ("it", 50274),
];

/// Token id for a language code, if known.
fn language_token(language: &str) -> Option<u32> {
    let lowered = language.to_lowercase();
    let code = lowered.split(['-', '_']).next().unwrap_or(lowered.as_str());
    LANGUAGES
        .iter()
        .find(|(name, _)| *name == code)
        .map(|(_, token)| *token)
}

/// Language code for a token id, if known.
fn language_code(token: u32) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(_, t)| *t == token)
        .map(|(name, _)| *name)
}

/// Abort decoding when the tail of the sequence starts looping.
fn is_repetitive(tokens: &[u32], new_token: u32) -> bool {
    if tokens.len() >= 3 && tokens[tokens.len() - 3..] == [new_token, new_token, new_token] {
        return true;
    }
    if tokens.len() >= 6 {
        let last_3 = &tokens[tokens.len() - 3..];
        let prev_3 = &tokens[tokens.len() - 6..tokens.len() - 3];
        if last_3 == prev_3 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parsing() {
        assert_eq!("tiny".parse::<ModelSize>().unwrap(), ModelSize::Tiny);
        assert_eq!("BASE".parse::<ModelSize>().unwrap(), ModelSize::Base);
        assert!("invalid".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_display_round_trips() {
        for size in [
            ModelSize::Tiny,
            ModelSize::Base,
            ModelSize::Small,
            ModelSize::Medium,
            ModelSize::Large,
        ] {
            assert_eq!(size.to_string().parse::<ModelSize>().unwrap(), size);
        }
    }

    #[test]
    fn test_language_token_lookup() {
        assert_eq!(language_token("zh"), Some(50260));
        assert_eq!(language_token("zh-CN"), Some(50260));
        assert_eq!(language_token("xx"), None);
        assert_eq!(language_code(50260), Some("zh"));
        assert_eq!(language_code(1), None);
    }

    #[test]
    fn test_repetition_guard() {
        assert!(is_repetitive(&[5, 5, 5], 5));
        assert!(is_repetitive(&[1, 2, 3, 1, 2, 3], 9));
        assert!(!is_repetitive(&[1, 2, 3], 4));
        assert!(!is_repetitive(&[], 4));
    }
}
