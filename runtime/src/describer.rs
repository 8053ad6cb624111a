//! Model-driven page description: title, embedding, parts, actions.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use web_explorer::{Action, DescriptionPart, ExplorerError, ExplorerResult};

use crate::context::RunContext;
use crate::error::into_explorer;
use crate::html;
use crate::model::tool_arguments;
use crate::prompts::{DESCRIBE_HTML, IS_LOADING, PAGE_TITLE, SUGGEST_ACTIONS};
use crate::titles::TitleLog;

#[derive(Deserialize)]
struct TitleArgs {
    title: String,
}

#[derive(Deserialize)]
struct SuggestedAction {
    description: String,
    part: usize,
    priority: i32,
}

#[derive(Deserialize)]
struct SuggestArgs {
    actions: Vec<SuggestedAction>,
}

/// Render description parts the way the action prompt expects them.
pub fn format_description(description: &[DescriptionPart]) -> Result<String> {
    let parts = description
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let yaml = serde_yaml::to_string(part).context("failed to format description part")?;
            Ok(format!("----- PART {i} -----:\n{yaml}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("\n\n"))
}

/// Ask on `output` whether `title` is right, reading answers from `input`.
///
/// Anything but `y` prompts for a replacement, which is then confirmed in turn.
pub fn confirm_title<R: BufRead, W: Write>(mut title: String, input: &mut R, output: &mut W) -> Result<String> {
    loop {
        writeln!(output, "The page will have the following title:")?;
        writeln!(output, "{title}")?;
        write!(output, "Is this title correct? (y/n) ")?;
        output.flush()?;
        if read_answer(input)?.eq_ignore_ascii_case("y") {
            return Ok(title);
        }
        write!(output, "Please enter the correct title: ")?;
        output.flush()?;
        title = read_answer(input)?;
    }
}

fn read_answer<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        anyhow::bail!("input closed while confirming title");
    }
    Ok(line.trim().to_string())
}

/// Cut `s` to at most `max` bytes on a character boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// [`web_explorer::Describer`] backed by the model and the shared browser tab.
pub struct LlmDescriber {
    ctx: RunContext,
    titles: Option<TitleLog>,
}

impl LlmDescriber {
    /// Opens the title log when title storing is enabled.
    pub fn new(ctx: RunContext) -> Result<Self> {
        let titles = if ctx.config.store_titles {
            Some(TitleLog::open(&ctx.config.titles_path())?)
        } else {
            None
        };
        Ok(Self { ctx, titles })
    }

    /// Whether the model thinks the page is still loading.
    pub async fn is_loading(&self) -> Result<bool> {
        let parts = html::page_parts(&self.ctx.session, self.ctx.config.html_part_length).await?;
        let Some(first) = parts.first() else {
            return Ok(false);
        };
        let reply = self.ctx.ask(IS_LOADING, &[("html", first.as_str())], true).await?;
        Ok(reply.says("yes"))
    }

    /// Wait while the page reports loading, a bounded number of times.
    async fn ensure_loaded(&self) -> Result<()> {
        for attempt in 1..=self.ctx.config.ensure_loaded_tries {
            if !self.is_loading().await? {
                return Ok(());
            }
            tracing::info!(attempt, "page still loading, waiting");
            tokio::time::sleep(self.ctx.config.ensure_loaded_sleep).await;
        }
        tracing::warn!("page still loading, describing it anyway");
        Ok(())
    }

    async fn generate_title(&mut self) -> Result<String> {
        self.ensure_loaded().await?;

        let full = html::page_html(&self.ctx.session).await?;
        let page_html = truncate(&full, self.ctx.config.html_part_length * 2);
        let reply = self.ctx.ask(PAGE_TITLE, &[("html", page_html)], true).await?;
        let TitleArgs { mut title }: TitleArgs = tool_arguments(&reply, "set_title")?;

        if self.ctx.config.confirm_titles {
            title = tokio::task::spawn_blocking(move || {
                let stdin = std::io::stdin();
                let stdout = std::io::stdout();
                confirm_title(title, &mut stdin.lock(), &mut stdout.lock())
            })
            .await
            .context("title confirmation task failed")??;
        }

        if let Some(log) = self.titles.as_mut() {
            let url = self.ctx.session.url().await?;
            log.record(&url, page_html, &title)?;
        }

        tracing::info!(title = %title, "page titled");
        Ok(title)
    }

    async fn describe(&mut self) -> Result<Vec<DescriptionPart>> {
        let parts = html::page_parts(&self.ctx.session, self.ctx.config.html_part_length).await?;
        if parts.is_empty() {
            let url = self.ctx.session.url().await?;
            return Err(ExplorerError::PageNotLoaded(url).into());
        }

        let mut description = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            tracing::debug!(part = i, of = parts.len(), "describing page part");
            let reply = self.ctx.ask(DESCRIBE_HTML, &[("html_part", part.as_str())], true).await?;
            let args: serde_json::Value = tool_arguments(&reply, "describe_page")?;
            if !args.is_object() {
                return Err(ExplorerError::MalformedModelOutput(format!(
                    "description of part {i} is not an object"
                ))
                .into());
            }
            description.push(args);
        }
        Ok(description)
    }

    async fn suggest(&mut self, title: &str, description: &[DescriptionPart]) -> Result<Vec<Action>> {
        let formatted = format_description(description)?;
        let url = self.ctx.session.url().await?;
        let hints = self.ctx.config.action_hints();
        let reply = self
            .ctx
            .ask(
                SUGGEST_ACTIONS,
                &[
                    ("description", formatted.as_str()),
                    ("url", url.as_str()),
                    ("title", title),
                    ("additional_info", hints.as_str()),
                ],
                true,
            )
            .await?;
        let args: SuggestArgs = tool_arguments(&reply, "suggest_actions")?;
        let actions: Vec<Action> = args
            .actions
            .into_iter()
            .map(|a| Action::new(a.description, a.part, a.priority))
            .collect();
        tracing::info!(count = actions.len(), "actions suggested");
        Ok(actions)
    }
}

#[async_trait]
impl web_explorer::Describer for LlmDescriber {
    async fn title(&mut self) -> ExplorerResult<String> {
        self.generate_title().await.map_err(into_explorer)
    }

    async fn embedding(&mut self, title: &str) -> ExplorerResult<Vec<f32>> {
        self.ctx.model.embed(title).await.map_err(|e| into_explorer(e.into()))
    }

    async fn description(&mut self) -> ExplorerResult<Vec<DescriptionPart>> {
        self.describe().await.map_err(into_explorer)
    }

    async fn actions(&mut self, title: &str, description: &[DescriptionPart]) -> ExplorerResult<Vec<Action>> {
        self.suggest(title, description).await.map_err(into_explorer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_format_description_numbers_parts() {
        let text = format_description(&[json!({"summary": "Header"}), json!({"summary": "Footer"})]).unwrap();
        assert!(text.starts_with("----- PART 0 -----:\nsummary: Header\n"));
        assert!(text.contains("\n\n----- PART 1 -----:\nsummary: Footer"));
    }

    #[test]
    fn test_confirm_title_accepts() {
        let mut input = Cursor::new("y\n");
        let mut output = Vec::new();
        let title = confirm_title("Home page".into(), &mut input, &mut output).unwrap();
        assert_eq!(title, "Home page");
        assert!(String::from_utf8(output).unwrap().contains("Home page"));
    }

    #[test]
    fn test_confirm_title_replaces_until_accepted() {
        let mut input = Cursor::new("n\nCart page\nY\n");
        let mut output = Vec::new();
        let title = confirm_title("Home page".into(), &mut input, &mut output).unwrap();
        assert_eq!(title, "Cart page");
    }

    #[test]
    fn test_confirm_title_fails_on_closed_input() {
        let mut input = Cursor::new("");
        assert!(confirm_title("Home".into(), &mut input, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
