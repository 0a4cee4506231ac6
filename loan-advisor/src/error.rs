use thiserror::Error;

/// Everything that can go wrong while producing advice or a prediction.
///
/// None of these are fatal to request handling: callers log the detail and
/// answer with [`AdvisorError::user_message`] or an empty result.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("Missing session context: {0}")]
    MissingSessionContext(String),

    #[error("Generative API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Request to generative API failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("No usable response: {0}")]
    ApiShape(String),

    #[error("Response is not valid JSON: {source}")]
    Parse {
        cleaned: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Model artifact error: {0}")]
    Model(String),
}

/// The request URL carries the API key in its query string, so it is
/// dropped before the error can reach a log line.
impl From<reqwest::Error> for AdvisorError {
    fn from(error: reqwest::Error) -> Self {
        AdvisorError::Transport(error.without_url())
    }
}

impl AdvisorError {
    /// Short label used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            AdvisorError::MissingSessionContext(_) => "missing_session_context",
            AdvisorError::Api { .. } => "api_error",
            AdvisorError::Transport(_) => "transport_error",
            AdvisorError::ApiShape(_) => "api_shape_error",
            AdvisorError::Parse { .. } => "parse_error",
            AdvisorError::Prediction(_) => "prediction_error",
            AdvisorError::Model(_) => "model_error",
        }
    }

    /// Message that is safe to hand back to an end user.
    pub fn user_message(&self) -> String {
        match self {
            AdvisorError::MissingSessionContext(what) => format!("{} not found in session.", what),
            AdvisorError::Api { status, .. } => format!("Error from Gemini API: {}", status),
            AdvisorError::Transport(_) => "Error making the request to Gemini API.".to_string(),
            AdvisorError::ApiShape(_) => "Sorry, I couldn't understand that.".to_string(),
            AdvisorError::Parse { .. } => "Invalid JSON response received.".to_string(),
            AdvisorError::Prediction(detail) => format!("Invalid prediction input: {}", detail),
            AdvisorError::Model(_) => "Prediction model unavailable.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AdvisorError>;
