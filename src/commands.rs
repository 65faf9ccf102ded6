use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use colored::Colorize;
use indicatif::ProgressBar;
use tracing::error;

use crate::bridge;
use crate::cli::{GenerateArgs, ModelsArgs, RewriteArgs};
use crate::llm::media::{detect_mime_type, extension_for_mime};
use crate::llm::{
    extract_outcome, generate_content, hint_for_error, GenerateRequest, GenerationError,
    RenderOutcome,
};
use crate::session::{CatalogSource, Session};
use crate::utils::timing::{complete_request_timer, log_llm_timing, start_request_timer};

fn read_recipe_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("Failed to read recipe file {}", path.display())),
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read recipe from stdin")?;
            Ok(buffer)
        }
    }
}

fn choose_extension(mime_type: &str, bytes: &[u8]) -> &'static str {
    let extension = extension_for_mime(mime_type);
    if extension != "bin" {
        return extension;
    }
    detect_mime_type(bytes)
        .map(|sniffed| extension_for_mime(&sniffed))
        .unwrap_or("bin")
}

fn default_artifact_path(mime_type: &str, bytes: &[u8]) -> PathBuf {
    PathBuf::from(format!(
        "nanobanana-{}.{}",
        Utc::now().format("%Y%m%d-%H%M%S"),
        choose_extension(mime_type, bytes)
    ))
}

fn with_hint(err: GenerationError) -> anyhow::Error {
    let text = err.to_string();
    match hint_for_error(&text) {
        Some(hint) => anyhow!("{text}\nHint: {hint}"),
        None => err.into(),
    }
}

pub async fn generate(session: &Session, args: GenerateArgs) -> Result<()> {
    let mut timer = start_request_timer(
        "generate",
        args.recipe.as_ref().map(|path| path.display().to_string()),
    );

    let input = read_recipe_input(args.recipe.as_deref())?;
    if input.trim().is_empty() {
        complete_request_timer(&mut timer, "invalid", Some("empty recipe".to_string()));
        bail!("The recipe input is empty. Paste a recipe or pass a file path.");
    }
    session.config.require_api_key()?;

    let instruction = if args.raw {
        input
    } else {
        bridge::rewrite_prompt(&input)
    };

    let mut reference_images = Vec::new();
    for path in &args.images {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read reference image {}", path.display()))?;
        reference_images.push(bytes);
    }

    let model = args
        .model
        .as_deref()
        .unwrap_or(session.config.image_model.as_str());

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Nano Banana is rendering with {model}..."));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let request = GenerateRequest {
        instruction: &instruction,
        reference_images: &reference_images,
        aspect_ratio: args.aspect_ratio.as_deref(),
        image_size: args.image_size.as_deref(),
    };
    let result = log_llm_timing("gemini", model, "generate_content", None, || {
        generate_content(&session.config, model, request)
    })
    .await;
    spinner.finish_and_clear();

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            complete_request_timer(&mut timer, "error", Some(err.to_string()));
            error!(model = model, "Generation failed: {err}");
            return Err(with_hint(err));
        }
    };

    match extract_outcome(response) {
        RenderOutcome::Image { bytes, mime_type } => {
            let path = args
                .out
                .clone()
                .unwrap_or_else(|| default_artifact_path(&mime_type, &bytes));
            fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write image to {}", path.display()))?;

            let dimensions = image::load_from_memory(&bytes)
                .ok()
                .map(|decoded| format!(", {}x{}", decoded.width(), decoded.height()))
                .unwrap_or_default();
            println!(
                "{}",
                format!(
                    "Saved {} ({}{}, {} bytes)",
                    path.display(),
                    mime_type,
                    dimensions,
                    bytes.len()
                )
                .green()
            );
            complete_request_timer(
                &mut timer,
                "success",
                Some(format!("image {}", path.display())),
            );
        }
        RenderOutcome::Text(text) => {
            println!("{text}");
            complete_request_timer(&mut timer, "success", Some("text".to_string()));
        }
        RenderOutcome::Empty { diagnostic } => {
            let detail = diagnostic
                .unwrap_or_else(|| "the response carried no image or text".to_string());
            println!("{}", format!("No usable content returned: {detail}").yellow());
            complete_request_timer(&mut timer, "empty", Some(detail));
        }
    }

    Ok(())
}

pub async fn models(session: &Session, args: ModelsArgs) -> Result<()> {
    let catalog = if args.cached {
        session.cached_models().ok_or_else(|| {
            anyhow!(
                "No cached model list at {}. Run `nanobanana models` with the network available first.",
                session.config.model_cache_path.display()
            )
        })?
    } else {
        session.config.require_api_key()?;
        session.available_models().await?
    };

    if catalog.source == CatalogSource::Cache && !args.cached {
        println!(
            "{}",
            "Model listing unreachable; showing the cached list.".yellow()
        );
    }

    if catalog.models.is_empty() {
        println!("No generation-capable models available.");
        return Ok(());
    }

    for model in &catalog.models {
        if model.display_name.trim().is_empty() {
            println!("{}", model.short_name().bold());
        } else {
            println!(
                "{}  {}",
                model.short_name().bold(),
                model.display_name.dimmed()
            );
        }
    }

    Ok(())
}

pub fn rewrite(args: RewriteArgs) -> Result<()> {
    let input = read_recipe_input(args.recipe.as_deref())?;
    if input.trim().is_empty() {
        bail!("The recipe input is empty. Paste a recipe or pass a file path.");
    }
    println!("{}", bridge::rewrite_prompt(&input));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn extension_prefers_the_vendor_mime() {
        assert_eq!(choose_extension("image/png", b"whatever"), "png");
        assert_eq!(choose_extension("image/webp", b""), "webp");
    }

    #[test]
    fn unknown_mime_falls_back_to_sniffing() {
        let png_header = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert_eq!(choose_extension("application/octet-stream", png_header), "png");
        assert_eq!(choose_extension("application/octet-stream", b"junk"), "bin");
    }

    #[test]
    fn reads_recipe_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.json");
        fs::write(&path, "{\"a\": 1}").unwrap();
        let input = read_recipe_input(Some(&path)).unwrap();
        assert_eq!(input, "{\"a\": 1}");
    }

    #[test]
    fn missing_recipe_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(read_recipe_input(Some(&path)).is_err());
    }

    #[test]
    fn quota_errors_carry_a_hint() {
        let err = GenerationError::Api {
            status: StatusCode::TOO_MANY_REQUESTS,
            detail: "Resource has been exhausted".to_string(),
        };
        let rendered = format!("{:#}", with_hint(err));
        assert!(rendered.contains("429"));
        assert!(rendered.contains("Hint:"));
    }

    #[test]
    fn transport_errors_pass_through_without_a_hint() {
        let err = GenerationError::Transport("connection reset".to_string());
        let rendered = format!("{:#}", with_hint(err));
        assert!(!rendered.contains("Hint:"));
    }
}
