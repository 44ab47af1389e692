use crate::app::App;
use crate::chat::{ReplyPlan, choose_model};
use crate::commands::LockedChat;
use crate::console::{
    display_usage_summary, get_terminal_width, is_stdout_terminal, read_piped_stdin,
};
use crate::exceptions::ParleyError;
use crate::llm::LlmService;
use crate::models::{LlmResponse, Message};
use crate::ui::live_display::LiveDisplay;
use std::io::{self, Write};

/// Streams one reply: live on a terminal, printed whole when piped.
async fn stream_reply(
    service: &LlmService<'_>,
    model: &str,
    context: &[Message],
) -> Result<LlmResponse, ParleyError> {
    let tty = is_stdout_terminal();
    let mut display = tty.then(|| LiveDisplay::new(get_terminal_width()));
    if let Some(d) = display.as_mut() {
        d.update_status(&format!("Waiting for {}", model));
    }

    let result = service
        .get_response(model, context, |delta| {
            if let Some(d) = display.as_mut() {
                d.render(delta);
            }
        })
        .await;

    if let Some(d) = display.as_mut() {
        d.finish();
    }
    let response = result?;

    if !tty {
        let mut stdout = io::stdout();
        write!(stdout, "{}", response.content)?;
        if !response.content.ends_with('\n') {
            writeln!(stdout)?;
        }
        stdout.flush()?;
    }

    display_usage_summary(
        &response.model,
        response.token_usage.as_ref(),
        response.duration_ms,
    );
    Ok(response)
}

/// `send`: the prompt (and piped stdin) becomes the user message, the
/// reply is appended. A failed request is stored as the reply text.
pub async fn send(
    app: &App,
    chat: &str,
    prompt: Option<String>,
    model: Option<String>,
) -> Result<(), ParleyError> {
    let prompt = match (prompt, read_piped_stdin()) {
        (Some(p), Some(piped)) => Some(format!("{}\n\n{}", p.trim_end(), piped.trim_end())),
        (Some(p), None) => Some(p),
        (None, Some(piped)) => Some(piped),
        (None, None) => None,
    };

    let mut locked = LockedChat::open(app, chat)?;
    let plan = locked.chat.prepare_send(prompt.as_deref())?;
    locked.save(app)?;

    let default = locked.chat.default_model(&app.config);
    let model = choose_model(None, model.as_deref(), &default);

    let keys = app.keys()?;
    let service = LlmService::new(&app.config, &keys);

    match stream_reply(&service, &model, &plan.context).await {
        Ok(response) => {
            locked.chat.apply_reply(&plan, response);
            locked.save(app)
        }
        Err(e) => {
            tracing::error!("Request to {} failed: {}", model, e);
            locked.chat.apply_error(&plan, &model, &e);
            locked.save(app)?;
            Err(e)
        }
    }
}

/// Answers `plan` again and overwrites its target. On failure the chat is
/// left as it was.
async fn replace_reply(
    app: &App,
    mut locked: LockedChat,
    plan: ReplyPlan,
    model: Option<String>,
) -> Result<(), ParleyError> {
    let default = locked.chat.default_model(&app.config);
    let model = choose_model(plan.recorded_model.as_deref(), model.as_deref(), &default);

    let keys = app.keys()?;
    let service = LlmService::new(&app.config, &keys);
    let response = stream_reply(&service, &model, &plan.context).await?;

    locked.chat.apply_reply(&plan, response);
    locked.save(app)
}

pub async fn regenerate(
    app: &App,
    chat: &str,
    index: isize,
    model: Option<String>,
) -> Result<(), ParleyError> {
    let locked = LockedChat::open(app, chat)?;
    let plan = locked.chat.regenerate_plan(index)?;
    replace_reply(app, locked, plan, model).await
}

pub async fn refine(
    app: &App,
    chat: &str,
    index: isize,
    comment: Option<String>,
    model: Option<String>,
) -> Result<(), ParleyError> {
    let comment = comment.or_else(read_piped_stdin).unwrap_or_default();
    let locked = LockedChat::open(app, chat)?;
    let plan = locked
        .chat
        .refine_plan(index, &comment, &app.config.general.refine_prompt)?;
    replace_reply(app, locked, plan, model).await
}

/// Stores a draft user message without sending it. Empty text removes it.
pub fn draft(app: &App, chat: &str, text: Option<String>) -> Result<(), ParleyError> {
    let text = text.or_else(read_piped_stdin).unwrap_or_default();
    let mut locked = LockedChat::open(app, chat)?;
    locked.chat.set_draft(&text);
    locked.save(app)?;

    if locked.chat.draft().is_some() {
        println!("Draft saved to '{}'.", locked.path);
    } else {
        println!("Draft cleared in '{}'.", locked.path);
    }
    Ok(())
}
