use crate::app::App;
use crate::console::read_piped_stdin;
use crate::exceptions::ParleyError;
use crate::t2i::generators;
use crate::t2i::response::ImageData;
use std::path::PathBuf;

pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

pub async fn run(
    app: &App,
    prompt: Option<String>,
    model: Option<String>,
    output: Option<PathBuf>,
    url_only: bool,
) -> Result<(), ParleyError> {
    let prompt = prompt
        .or_else(read_piped_stdin)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ParleyError::InvalidInput("Prompt cannot be empty.".into()))?;
    let model = model.unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());

    let key = match generators::lookup(model.trim()) {
        Some(entry) => app
            .keys()?
            .lookup(entry.family.key_name(), entry.family.api_key_envs()),
        None => None,
    };

    let generator = generators::of(&model, key)?;
    let response = generator.generate(&prompt).await?;

    if let Some(revised) = &response.revised_prompt {
        eprintln!("Revised prompt: {}", revised);
    }

    if url_only && let ImageData::Url(url) = &response.image {
        println!("{}", url);
        return Ok(());
    }

    let written = response.save(output.as_deref()).await?;
    println!("{}", written.display());
    Ok(())
}
