use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "nanobanana",
    version,
    about = "Nano Banana: paste a cinematography recipe, get back a rendered image"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite a recipe and render it through the generation endpoint
    Generate(GenerateArgs),
    /// List models that support content generation
    Models(ModelsArgs),
    /// Run the prompt rewriter alone and print the resulting instruction
    Rewrite(RewriteArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Recipe JSON file; reads stdin when omitted or "-"
    pub recipe: Option<PathBuf>,

    /// Model id; defaults to GEMINI_IMAGE_MODEL
    #[arg(long)]
    pub model: Option<String>,

    /// Output path for the image artifact; defaults to a timestamped file
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Aspect ratio for the rendered image, e.g. "16:9"
    #[arg(long)]
    pub aspect_ratio: Option<String>,

    /// Rendered image size, e.g. "2K"
    #[arg(long)]
    pub image_size: Option<String>,

    /// Reference image attached to the request; repeatable
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,

    /// Send the input verbatim, skipping the prompt rewriter
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct ModelsArgs {
    /// Print the cached list without a network call
    #[arg(long, default_value_t = false)]
    pub cached: bool,
}

#[derive(Args, Debug)]
pub struct RewriteArgs {
    /// Recipe JSON file; reads stdin when omitted or "-"
    pub recipe: Option<PathBuf>,
}
