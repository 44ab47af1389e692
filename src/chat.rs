use crate::config::Config;
use crate::consts::ERROR_REPLY_PREFIX;
use crate::exceptions::ParleyError;
use crate::models::{ChatFile, LlmResponse, Message, Role};
use time::OffsetDateTime;

/// Messages to send and where the reply goes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyPlan {
    /// Position in `messages` of the assistant message to overwrite; `None`
    /// appends a new one.
    pub target: Option<usize>,
    pub context: Vec<Message>,
    /// Model recorded on the message being replaced.
    pub recorded_model: Option<String>,
}

/// Picks the model for a reply: recorded, then explicit, then the chat default.
pub fn choose_model(recorded: Option<&str>, explicit: Option<&str>, default: &str) -> String {
    recorded
        .or(explicit)
        .map(String::from)
        .unwrap_or_else(|| default.to_string())
}

impl ChatFile {
    /// Positions in `messages` of the non-system messages, in order.
    pub fn visible_positions(&self) -> Vec<usize> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role != Role::System)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn visible(&self) -> Vec<(usize, &Message)> {
        self.visible_positions()
            .into_iter()
            .enumerate()
            .map(|(vis, pos)| (vis, &self.messages[pos]))
            .collect()
    }

    /// Maps a visible index (negative counts from the end) to a position.
    pub fn resolve_index(&self, index: isize) -> Result<usize, ParleyError> {
        let positions = self.visible_positions();
        let count = positions.len();
        if count == 0 {
            return Err(ParleyError::InvalidInput("No messages found in chat.".into()));
        }

        let resolved = if index < 0 {
            count as isize + index
        } else {
            index
        };

        if resolved < 0 || resolved >= count as isize {
            let range = if count == 1 {
                "Valid indices are in the range 0 (or -1).".to_string()
            } else {
                format!(
                    "Valid indices are in the range 0 to {} (or -1 to -{})",
                    count - 1,
                    count
                )
            };
            return Err(ParleyError::InvalidInput(format!(
                "Index out of bounds. {}",
                range
            )));
        }

        Ok(positions[resolved as usize])
    }

    fn system_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::System)
    }

    pub fn system_message(&self) -> Option<&str> {
        self.system_messages().next().map(|m| m.content.as_str())
    }

    /// Replaces every system message with `text` at the front. Empty text clears.
    pub fn set_system_message(&mut self, text: &str) {
        self.messages.retain(|m| m.role != Role::System);
        let text = text.trim();
        if !text.is_empty() {
            self.messages.insert(0, Message::system(text));
        }
    }

    /// A trailing user message without a reply.
    pub fn draft(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.role == Role::User)
    }

    /// Stores `text` as the draft. Empty text removes the draft.
    pub fn set_draft(&mut self, text: &str) {
        if self.draft().is_some() {
            self.messages.pop();
        }
        let text = text.trim();
        if !text.is_empty() {
            self.messages.push(Message::user(text));
        }
    }

    /// Prepares a send: `prompt` replaces the draft, no prompt answers it.
    pub fn prepare_send(&mut self, prompt: Option<&str>) -> Result<ReplyPlan, ParleyError> {
        match prompt.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => self.set_draft(p),
            None if self.draft().is_some() => {}
            None => {
                return Err(ParleyError::InvalidInput(
                    "Nothing to send: give a prompt or store a draft first.".into(),
                ));
            }
        }

        Ok(ReplyPlan {
            target: None,
            context: self.messages.clone(),
            recorded_model: None,
        })
    }

    /// The last assistant model when it is curated, else the first curated model.
    pub fn default_model(&self, config: &Config) -> String {
        let last = self
            .messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.model.clone());

        if let Some(model) = last {
            if config.is_curated(&model) {
                return model;
            }
            tracing::warn!(
                "Model '{}' from chat history not found in model list.",
                model
            );
        }

        config
            .models()
            .first()
            .cloned()
            .unwrap_or_else(|| crate::consts::DEFAULT_MODELS[0].to_string())
    }

    /// Plan for regenerating the message at visible `index`. An assistant
    /// message is answered again from the last user message before it; a user
    /// message regenerates the next assistant reply.
    pub fn regenerate_plan(&self, index: isize) -> Result<ReplyPlan, ParleyError> {
        let pos = self.resolve_index(index)?;

        let (target, last_context) = match self.messages[pos].role {
            Role::Assistant => {
                let user_pos = (0..pos)
                    .rev()
                    .find(|&i| self.messages[i].role == Role::User)
                    .ok_or_else(|| {
                        ParleyError::Chat(
                            "Cannot regenerate: no user message precedes this reply.".into(),
                        )
                    })?;
                (pos, user_pos)
            }
            Role::User => {
                let assistant_pos = (pos + 1..self.messages.len())
                    .find(|&i| self.messages[i].role == Role::Assistant)
                    .ok_or_else(|| {
                        ParleyError::Chat(
                            "Cannot regenerate: no assistant reply follows this message.".into(),
                        )
                    })?;
                (assistant_pos, pos)
            }
            Role::System => {
                return Err(ParleyError::Chat("System messages cannot be regenerated.".into()));
            }
        };

        Ok(ReplyPlan {
            target: Some(target),
            context: self.context_through(last_context),
            recorded_model: self.messages[target].model.clone(),
        })
    }

    /// Plan for refining the assistant reply at `index` with `comment`. An
    /// empty comment regenerates.
    pub fn refine_plan(
        &self,
        index: isize,
        comment: &str,
        refine_prompt: &str,
    ) -> Result<ReplyPlan, ParleyError> {
        let comment = comment.trim();
        if comment.is_empty() {
            return self.regenerate_plan(index);
        }

        let pos = self.resolve_index(index)?;
        if self.messages[pos].role != Role::Assistant {
            return Err(ParleyError::InvalidInput(
                "Only assistant replies can be refined.".into(),
            ));
        }

        let mut context = self.context_through(pos);
        context.push(Message::user(format!("{}\n\n{}", refine_prompt, comment)));

        Ok(ReplyPlan {
            target: Some(pos),
            context,
            recorded_model: self.messages[pos].model.clone(),
        })
    }

    /// System messages plus every visible message up to and including `pos`.
    fn context_through(&self, pos: usize) -> Vec<Message> {
        let mut context: Vec<Message> = self.system_messages().cloned().collect();
        context.extend(
            self.messages[..=pos]
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );
        context
    }

    /// Writes a reply where `plan` says and returns its position.
    pub fn apply_reply(&mut self, plan: &ReplyPlan, response: LlmResponse) -> usize {
        let mut message = Message::assistant(response.content, Some(response.model));
        message.token_usage = response.token_usage;
        message.duration_ms = Some(response.duration_ms);
        self.place(plan.target, message)
    }

    /// Records a failed request as the reply text.
    pub fn apply_error(&mut self, plan: &ReplyPlan, model: &str, error: &ParleyError) -> usize {
        let message = Message::assistant(
            format!("{}{}", ERROR_REPLY_PREFIX, error),
            Some(model.to_string()),
        );
        self.place(plan.target, message)
    }

    fn place(&mut self, target: Option<usize>, message: Message) -> usize {
        match target {
            Some(pos) if pos < self.messages.len() => {
                self.messages[pos] = message;
                pos
            }
            _ => {
                self.messages.push(message);
                self.messages.len() - 1
            }
        }
    }

    /// Returns false when the content is unchanged.
    pub fn edit(&mut self, index: isize, content: &str) -> Result<bool, ParleyError> {
        let pos = self.resolve_index(index)?;
        let message = &mut self.messages[pos];
        if message.content == content {
            return Ok(false);
        }
        if message.original_content.is_none() {
            message.original_content = Some(message.content.clone());
        }
        message.content = content.to_string();
        message.timestamp = Some(OffsetDateTime::now_utc());
        Ok(true)
    }

    pub fn cut(&mut self, index: isize) -> Result<Vec<Message>, ParleyError> {
        let pos = self.resolve_index(index)?;
        Ok(vec![self.messages.remove(pos)])
    }

    /// Removes a user message and the next assistant reply after it.
    pub fn cut_pair(&mut self, index: isize) -> Result<Vec<Message>, ParleyError> {
        let pos = self.resolve_index(index)?;
        if self.messages[pos].role != Role::User {
            return Err(ParleyError::InvalidInput(
                "Cut pair must start at a user message.".into(),
            ));
        }

        let reply = (pos + 1..self.messages.len())
            .find(|&i| self.messages[i].role == Role::Assistant);

        let mut removed = Vec::new();
        if let Some(reply_pos) = reply {
            removed.push(self.messages.remove(reply_pos));
        }
        removed.insert(0, self.messages.remove(pos));
        Ok(removed)
    }

    /// Removes the message at `index` and everything after it. System
    /// messages stay.
    pub fn cut_below(&mut self, index: isize) -> Result<Vec<Message>, ParleyError> {
        let pos = self.resolve_index(index)?;
        let tail = self.messages.split_off(pos);
        let (kept, removed): (Vec<Message>, Vec<Message>) =
            tail.into_iter().partition(|m| m.role == Role::System);
        self.messages.extend(kept);
        Ok(removed)
    }

    /// Copy of this chat, truncated after visible index `until` when given.
    pub fn forked(&self, source: &str, until: Option<isize>) -> Result<ChatFile, ParleyError> {
        let messages = match until {
            Some(index) => {
                let pos = self.resolve_index(index)?;
                let mut kept = self.messages[..=pos].to_vec();
                kept.extend(
                    self.messages[pos + 1..]
                        .iter()
                        .filter(|m| m.role == Role::System)
                        .cloned(),
                );
                kept
            }
            None => self.messages.clone(),
        };

        Ok(ChatFile {
            messages,
            forked_from: Some(source.to_string()),
            created_at: Some(OffsetDateTime::now_utc()),
        })
    }
}
