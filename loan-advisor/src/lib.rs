pub mod advisor;
pub mod error;
pub mod extract;
pub mod followup;
pub mod gemini;
pub mod model;
pub mod prompts;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use advisor::{Advice, Advisor, FollowUp};
pub use error::{AdvisorError, Result};
pub use extract::{extract_json, strip_code_fences};
pub use followup::{MAX_CONTEXT_CHARS, build_followup_prompt};
pub use gemini::{DEFAULT_GEMINI_ENDPOINT, GeminiClient, TextGenerator};
pub use model::{
    Education, FEATURE_COLUMNS, ForestModel, LoanClassifier, LoanDecision, PredictionInput,
};
pub use prompts::{
    BusinessRequest, FinancialAdviceRequest, Funding, build_business_idea_prompt,
    build_financial_advice_prompt, build_loan_resource_prompt,
};
pub use session::{ConversationState, Exchange, Topic};
pub use storage::{InMemorySessionStorage, SessionStorage};
