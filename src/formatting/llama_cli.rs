use super::backend::{ChatMessage, Completion, GenerationParams, InferenceBackend, Role, SessionOptions};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info};

const BINARY_NAME: &str = if cfg!(windows) { "llama-cli.exe" } else { "llama-cli" };
const GGUF_MAGIC: &[u8; 4] = b"GGUF";
const END_OF_TEXT: &str = "[end of text]";

/// Runs completions through a local llama.cpp `llama-cli` executable.
pub struct LlamaCliBackend {
    llama_binary_path: PathBuf,
}

/// A model that passed the load checks. The weights are mapped by
/// `llama-cli` itself on every run.
#[derive(Debug, Clone)]
pub struct LlamaCliModel {
    model_path: PathBuf,
    options: SessionOptions,
}

impl LlamaCliBackend {
    /// Uses `explicit` if given, otherwise looks next to the executable and on `PATH`.
    pub fn new(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                anyhow::bail!("llama-cli binary not found at {:?}", path);
            }
            return Ok(Self::with_binary(path));
        }

        let possible_paths = candidate_paths()?;
        let llama_binary_path = possible_paths
            .iter()
            .find(|path| path.is_file())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "llama-cli binary not found. Tried:\n{}",
                    possible_paths
                        .iter()
                        .map(|p| format!("  - {:?}", p))
                        .collect::<Vec<_>>()
                        .join("\n")
                )
            })?
            .clone();

        info!(path = %llama_binary_path.display(), "Found llama-cli");
        Ok(Self::with_binary(llama_binary_path))
    }

    pub fn with_binary(llama_binary_path: PathBuf) -> Self {
        Self { llama_binary_path }
    }

    fn command_for(&self, model: &LlamaCliModel, prompt: &str, params: &GenerationParams) -> Command {
        let mut command = Command::new(&self.llama_binary_path);
        command
            .arg("-m")
            .arg(&model.model_path)
            .arg("-p")
            .arg(prompt)
            .arg("-n")
            .arg(params.max_tokens.to_string())
            .arg("--temp")
            .arg(params.temperature.to_string())
            .arg("-c")
            .arg(model.options.context_size.to_string())
            .arg("-ngl")
            .arg(model.options.gpu_layers.to_string())
            .arg("--no-display-prompt")
            .arg("-no-cnv");
        if model.options.use_mlock {
            command.arg("--mlock");
        }
        if params.ignore_eos {
            command.arg("--ignore-eos");
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

fn candidate_paths() -> Result<Vec<PathBuf>> {
    let exe_dir = std::env::current_exe()?
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Failed to get parent directory"))?
        .to_path_buf();

    let mut paths = vec![
        exe_dir.join(BINARY_NAME),
        // macOS app bundle
        exe_dir.join("../Resources").join(BINARY_NAME),
        exe_dir.join("../../resources").join(BINARY_NAME),
    ];
    if let Some(search_path) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&search_path).map(|dir| dir.join(BINARY_NAME)));
    }
    Ok(paths)
}

/// Renders messages with the Phi-3 chat template.
pub fn render_phi3_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let tag = match message.role {
            Role::System => "<|system|>",
            Role::User => "<|user|>",
            Role::Assistant => "<|assistant|>",
        };
        prompt.push_str(tag);
        prompt.push('\n');
        prompt.push_str(&message.content);
        prompt.push_str("<|end|>\n");
    }
    prompt.push_str("<|assistant|>\n");
    prompt
}

// Prefixes of llama.cpp's own log lines; model text never carries the underscore form.
const LOG_PREFIXES: [&str; 3] = ["llama_", "ggml_", "llm_load_"];

/// Drops llama.cpp log noise and cuts the text at the first stop sequence.
pub fn extract_completion(stdout: &str, stop: &[String]) -> String {
    let mut text = stdout
        .lines()
        .filter(|line| !LOG_PREFIXES.iter().any(|prefix| line.starts_with(prefix)))
        .collect::<Vec<_>>()
        .join("\n");

    let cut = stop
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(END_OF_TEXT))
        .filter_map(|s| text.find(s))
        .min();
    if let Some(idx) = cut {
        text.truncate(idx);
    }
    text.trim().to_string()
}

#[async_trait]
impl InferenceBackend for LlamaCliBackend {
    type Handle = LlamaCliModel;

    async fn load(&self, model_path: &Path, options: &SessionOptions) -> Result<LlamaCliModel> {
        let mut file = tokio::fs::File::open(model_path)
            .await
            .with_context(|| format!("Failed to open model {:?}", model_path))?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .await
            .with_context(|| format!("Model file {:?} is truncated", model_path))?;
        if &magic != GGUF_MAGIC {
            anyhow::bail!("{:?} is not a GGUF model file", model_path);
        }

        debug!(binary = %self.llama_binary_path.display(), "Model header ok");
        Ok(LlamaCliModel {
            model_path: model_path.to_path_buf(),
            options: options.clone(),
        })
    }

    async fn complete(
        &self,
        handle: &LlamaCliModel,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<Completion> {
        let prompt = render_phi3_prompt(messages);
        debug!(model = %handle.model_path.display(), "Running llama-cli");

        let output = self
            .command_for(handle, &prompt, params)
            .output()
            .await
            .context("Failed to execute llama-cli")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("llama-cli failed: {}", stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = extract_completion(&stdout, &params.stop);
        debug!(chars = text.len(), "llama-cli finished");

        Ok(Completion {
            text: if text.is_empty() { None } else { Some(text) },
        })
    }

    async fn release(&self, handle: LlamaCliModel) -> Result<()> {
        // Nothing stays resident between runs.
        debug!(model = %handle.model_path.display(), "Released llama-cli model");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::session::generation_params;

    #[test]
    fn phi3_prompt_layout() {
        let prompt = render_phi3_prompt(&[
            ChatMessage::system("sys"),
            ChatMessage::user("Translate the following: hi"),
        ]);
        assert_eq!(
            prompt,
            "<|system|>\nsys<|end|>\n<|user|>\nTranslate the following: hi<|end|>\n<|assistant|>\n"
        );
    }

    #[test]
    fn extract_stops_at_end_tag_and_drops_logs() {
        let stdout = "llama_model_loader: loaded\nOmg bestie <|end|> trailing junk";
        let stop = vec!["<|end|>".to_string()];
        assert_eq!(extract_completion(stdout, &stop), "Omg bestie");
    }

    #[test]
    fn extract_keeps_text_that_starts_like_a_log_tag() {
        let stdout = "ggml_metal_init: found device\nllamas are fluffy\nllama_model_loader: x\nggmlish vibes";
        assert_eq!(
            extract_completion(stdout, &[]),
            "llamas are fluffy\nggmlish vibes"
        );
    }

    #[test]
    fn extract_drops_end_of_text_marker() {
        assert_eq!(extract_completion("hello [end of text]\n", &[]), "hello");
    }

    #[tokio::test]
    async fn load_rejects_non_gguf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        tokio::fs::write(&path, b"<html>not a model</html>").await.unwrap();

        let backend = LlamaCliBackend::with_binary(PathBuf::from("llama-cli"));
        let err = backend
            .load(&path, &SessionOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a GGUF"));
    }

    #[tokio::test]
    async fn load_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        tokio::fs::write(&path, b"GG").await.unwrap();

        let backend = LlamaCliBackend::with_binary(PathBuf::from("llama-cli"));
        assert!(backend.load(&path, &SessionOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn load_accepts_gguf_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        tokio::fs::write(&path, b"GGUF\x03\x00\x00\x00").await.unwrap();

        let backend = LlamaCliBackend::with_binary(PathBuf::from("llama-cli"));
        let model = backend.load(&path, &SessionOptions::default()).await.unwrap();
        assert_eq!(model.model_path, path);
        assert!(backend.release(model).await.is_ok());
    }

    #[test]
    fn command_carries_generation_and_load_flags() {
        let backend = LlamaCliBackend::with_binary(PathBuf::from("/opt/llama-cli"));
        let model = LlamaCliModel {
            model_path: PathBuf::from("/m.gguf"),
            options: SessionOptions::default(),
        };
        let command = backend.command_for(&model, "p", &generation_params());
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        for expected in ["-n", "2048", "--temp", "0.8", "-c", "4096", "-ngl", "99", "--mlock"] {
            assert!(args.iter().any(|a| a == expected), "missing {expected}");
        }
        assert!(!args.iter().any(|a| a == "--ignore-eos"));
    }
}
