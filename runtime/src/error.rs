//! Runtime error types and the conversion into core errors.

use web_explorer::ExplorerError;

/// Failures talking to the model API.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response has no choices")]
    NoChoices,

    #[error("no call to tool '{0}' in model response")]
    MissingToolCall(String),

    #[error("arguments of tool '{tool}' do not match its schema: {source}")]
    BadArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("embedding response is empty")]
    EmptyEmbedding,
}

impl ModelError {
    /// Whether the model answered but the answer cannot be used.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::NoChoices
                | Self::MissingToolCall(_)
                | Self::BadArguments { .. }
                | Self::EmptyEmbedding
        )
    }
}

/// Convert an internal error into the core taxonomy at a collaborator boundary.
pub fn into_explorer(e: anyhow::Error) -> ExplorerError {
    let e = match e.downcast::<ExplorerError>() {
        Ok(explorer) => return explorer,
        Err(e) => e,
    };
    match e.downcast::<ModelError>() {
        Ok(model) if model.is_malformed() => ExplorerError::MalformedModelOutput(model.to_string()),
        Ok(model) => ExplorerError::Model(model.to_string()),
        Err(e) => ExplorerError::Browser(format!("{e:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_errors_map_to_core_taxonomy() {
        let e = into_explorer(ModelError::MissingToolCall("page_title".into()).into());
        assert!(matches!(e, ExplorerError::MalformedModelOutput(_)));

        let e = into_explorer(
            ModelError::Status {
                status: 500,
                body: "oops".into(),
            }
            .into(),
        );
        assert!(matches!(e, ExplorerError::Model(_)));
    }

    #[test]
    fn test_core_errors_pass_through() {
        let e = into_explorer(ExplorerError::PageNotLoaded("about:blank".into()).into());
        assert!(matches!(e, ExplorerError::PageNotLoaded(_)));
    }

    #[test]
    fn test_other_errors_are_browser_errors() {
        let e = into_explorer(anyhow::anyhow!("tab crashed").context("reading HTML"));
        match e {
            ExplorerError::Browser(msg) => assert_eq!(msg, "reading HTML: tab crashed"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
