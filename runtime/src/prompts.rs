//! Prompt repository: templates, tool definitions, and sampling settings.
//!
//! Prompts ship built in and can be overridden by name from a YAML file
//! with the same layout as [`BUILTIN_PROMPTS`].

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{MAX_TOKENS_DEFAULT, MODEL_DEFAULT, TEMPERATURE_DEFAULT};

pub const PAGE_TITLE: &str = "page_title";
pub const DESCRIBE_HTML: &str = "describe_html";
pub const SUGGEST_ACTIONS: &str = "suggest_actions";
pub const EXECUTE_ACTION: &str = "execute_action";
pub const VERIFY_ACTION: &str = "verify_action";
pub const IS_LOADING: &str = "is_loading";
pub const SEARCH_COOKIES: &str = "search_cookies";
pub const ACCEPT_COOKIES_SELECTOR: &str = "accept_cookies_selector";

/// A function the model may call, in OpenAI tool format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prompt {
    #[serde(rename = "prompt")]
    pub template: String,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    TEMPERATURE_DEFAULT
}

fn default_model() -> String {
    MODEL_DEFAULT.to_string()
}

fn default_max_tokens() -> u32 {
    MAX_TOKENS_DEFAULT
}

impl Prompt {
    /// Fill `{name}` placeholders. Unknown placeholders are left as they are.
    pub fn render(&self, data: &[(&str, &str)]) -> String {
        let mut text = self.template.clone();
        for (key, value) in data {
            text = text.replace(&format!("{{{key}}}"), value);
        }
        text
    }

    /// The tool the model is forced to call, when the prompt defines exactly one.
    pub fn forced_tool(&self) -> Option<&str> {
        match self.functions.as_slice() {
            [only] => Some(only.name.as_str()),
            _ => None,
        }
    }
}

/// All prompts by name.
#[derive(Debug, Clone)]
pub struct PromptRepository {
    prompts: HashMap<String, Prompt>,
}

impl PromptRepository {
    /// Only the built-in prompts.
    pub fn builtin() -> Result<Self> {
        let prompts = serde_yaml::from_str(BUILTIN_PROMPTS).context("built-in prompts are invalid")?;
        Ok(Self { prompts })
    }

    /// Built-in prompts, overridden by the YAML file at `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut repo = Self::builtin()?;
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read prompts file: {}", path.display()))?;
            let count = repo.merge_yaml(&raw)?;
            tracing::info!(path = %path.display(), overridden = count, "prompts loaded");
        }
        Ok(repo)
    }

    /// Replace prompts by name with those in `yaml`. Returns how many were merged.
    pub fn merge_yaml(&mut self, yaml: &str) -> Result<usize> {
        let overrides: HashMap<String, Prompt> =
            serde_yaml::from_str(yaml).context("failed to parse prompts YAML")?;
        let count = overrides.len();
        for (name, prompt) in overrides {
            if !self.prompts.contains_key(&name) {
                tracing::warn!(prompt = %name, "prompts file defines an unused prompt");
            }
            self.prompts.insert(name, prompt);
        }
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Result<&Prompt> {
        self.prompts
            .get(name)
            .with_context(|| format!("prompt {name} not found"))
    }
}

/// Built-in prompts in the override file format.
pub const BUILTIN_PROMPTS: &str = r#"
page_title:
  prompt: |
    You are looking at one screen of a web application: a screenshot and its HTML.
    Give the screen a short title that names the kind of screen, not its particular
    content. Write "Product detail page", not the name of the product, so that every
    screen of the same kind gets the same title. Mention state that changes what the
    user can do, such as "Login page with error" or "Cart with items".

    HTML:
    {html}
  functions:
    - name: set_title
      description: Set the title of the current screen.
      parameters:
        type: object
        properties:
          title:
            type: string
            description: Short generic title of the screen.
        required: [title]

describe_html:
  prompt: |
    Describe this part of a web page so that someone who cannot see it knows what
    it shows and what can be done on it. List the sections you see and every
    interactive element (links, buttons, inputs, selects) with a CSS selector
    that finds it.

    HTML part:
    {html_part}
  functions:
    - name: describe_page
      description: Store the description of a part of the page.
      parameters:
        type: object
        properties:
          summary:
            type: string
            description: One or two sentences on what this part of the page is.
          sections:
            type: array
            items:
              type: string
          interactive_elements:
            type: array
            items:
              type: object
              properties:
                description:
                  type: string
                selector:
                  type: string
              required: [description, selector]
        required: [summary, sections, interactive_elements]

suggest_actions:
  prompt: |
    You are exploring the web application at {url}.
    The current screen is titled "{title}". Its description, split in parts:

    {description}

    Additional information:
    {additional_info}

    List the actions a user could take on this screen to reach other screens or
    change this one: following links, pressing buttons, filling and submitting
    forms. For each action give a description precise enough to carry it out, the
    number of the part that contains the element, and a priority from 1 to 15.
    Use 11 or more only for the one obvious next step (a lone "Next" or "Continue"
    button); otherwise rate how likely the action leads somewhere new.
  functions:
    - name: suggest_actions
      description: Store the actions available on the screen.
      parameters:
        type: object
        properties:
          actions:
            type: array
            items:
              type: object
              properties:
                description:
                  type: string
                part:
                  type: integer
                  minimum: 0
                priority:
                  type: integer
                  minimum: 1
                  maximum: 15
              required: [description, part, priority]
        required: [actions]

execute_action:
  prompt: |
    Carry out this action on the web page with the tools you have:
    {action}

    HTML of the part of the page where the action takes place:
    {html}

    Use CSS selectors that match exactly one element. Call several tools in order
    when the action needs it, for example filling a form and then submitting it.
    When the action is done, answer "success". If it cannot be done, answer
    "failure".
  functions:
    - name: click_element
      description: Click an element.
      parameters:
        type: object
        properties:
          selector:
            type: string
        required: [selector]
    - name: fill_text_input
      description: Replace the text of an input or textarea.
      parameters:
        type: object
        properties:
          selector:
            type: string
          text:
            type: string
        required: [selector, text]
    - name: select_option
      description: Choose an option of a select element by its value.
      parameters:
        type: object
        properties:
          selector:
            type: string
          value:
            type: string
        required: [selector, value]

verify_action:
  prompt: |
    The tool calls have been applied and their results are above. If the action is
    complete, answer "success". If something is still missing, call the tools
    again. If the action cannot be completed, answer "failure".

is_loading:
  prompt: |
    Here are a screenshot and the HTML of a web page. Is the page still loading,
    for example showing spinners, skeleton placeholders, or no content yet?
    Answer only "yes" or "no".

    HTML:
    {html}
  max_tokens: 8

search_cookies:
  prompt: |
    Does this HTML contain a cookie consent banner or dialog that is waiting for
    an answer? Answer only "yes" or "no".

    {html_part}
  max_tokens: 8

accept_cookies_selector:
  prompt: |
    This HTML contains a cookie consent banner. Give the CSS selector of the button
    that accepts the cookies.

    {html_part}
  functions:
    - name: accept_cookies
      description: Store the selector of the accept button.
      parameters:
        type: object
        properties:
          selector:
            type: string
        required: [selector]
"#;
