use axum::{
    Extension, Form, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    response::Json,
    routing::{get, post},
};
use chrono::Duration;
use loan_advisor::{
    Advisor, AdvisorError, ConversationState, ForestModel, GeminiClient, InMemorySessionStorage,
    LoanClassifier, LoanDecision, SessionStorage, Topic,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::{
    config::ServiceConfig,
    middleware::{SessionId, session_middleware},
    models::{
        AdviceForm, AdviceResponse, ChatRequest, PredictForm, PredictResponse, QuestionForm,
        StartSessionForm, capitalize,
    },
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

const DEFAULT_USER_NAME: &str = "User";
const DEFAULT_COUNTRY: &str = "your country";

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub advisor: Advisor,
    pub classifier: Arc<dyn LoanClassifier>,
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let app_state = create_app_state(config)?;
    Ok(build_router(app_state))
}

fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let classifier = ForestModel::load(&config.model_path)?;
    let generator = GeminiClient::with_endpoint(&config.gemini_endpoint, &config.gemini_api_key);
    info!(endpoint = %generator.endpoint(), "Gemini client configured");

    Ok(AppState {
        session_storage: Arc::new(InMemorySessionStorage::new(Duration::minutes(
            config.session_ttl_minutes,
        ))),
        advisor: Advisor::new(Arc::new(generator)),
        classifier: Arc::new(classifier),
    })
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/next_session", post(next_session))
        .route("/chat_predict", post(chat_predict))
        .route("/business_idea", post(business_idea))
        .route("/financial_advice", post(financial_advice))
        .route("/further_predict_chat", post(further_predict_chat))
        .route("/further_business_chat", post(further_business_chat))
        .route("/further_finance_chat", post(further_finance_chat))
        .route("/get_gemini_response", post(get_gemini_response))
        .route("/session", get(get_session).delete(clear_session))
        .layer(from_fn(session_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Loan Advisor Service",
        "version": "0.1.0",
        "description": "Loan approval prediction with AI-generated financial guidance",
        "endpoints": {
            "POST /next_session": "Start a session with name and country",
            "POST /chat_predict": "Predict loan approval and list loan resources",
            "POST /business_idea": "Suggest business ideas",
            "POST /financial_advice": "Produce a financial breakdown",
            "POST /further_predict_chat": "Follow-up question on the prediction chat",
            "POST /further_business_chat": "Follow-up question on the business chat",
            "POST /further_finance_chat": "Follow-up question on the finance chat",
            "POST /get_gemini_response": "Free chat with the model",
            "GET /session": "Inspect the current session",
            "DELETE /session": "Clear the current session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Loads the caller's state, starting a fresh one if none is stored.
async fn load_state(state: &AppState, session_id: &str) -> Result<ConversationState, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(conversation)) => Ok(conversation),
        Ok(None) => {
            if let Ok(purged) = state.session_storage.purge_expired().await {
                if purged > 0 {
                    debug!(purged, "Purged expired sessions");
                }
            }
            Ok(ConversationState::new(session_id))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load session");
            Err(internal_error("Failed to load session"))
        }
    }
}

async fn save_state(state: &AppState, conversation: ConversationState) -> Result<(), ApiError> {
    let session_id = conversation.id.clone();
    state.session_storage.save(conversation).await.map_err(|e| {
        error!(session_id = %session_id, error = %e, "Failed to save session");
        internal_error("Failed to save session")
    })
}

fn is_empty_response(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

async fn next_session(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Form(form): Form<StartSessionForm>,
) -> ApiResult<Value> {
    let name = capitalize(form.name.trim());
    let country = form.country.trim().to_string();

    info!(session_id = %session_id, country = %country, "Starting user session");

    let mut conversation = load_state(&state, &session_id).await?;
    conversation.user_name = Some(name.clone());
    conversation.country = Some(country.clone());
    save_state(&state, conversation).await?;

    Ok(Json(json!({ "name": name, "country": country })))
}

async fn chat_predict(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Form(form): Form<PredictForm>,
) -> ApiResult<PredictResponse> {
    let input = form.to_input().map_err(|e| {
        warn!(session_id = %session_id, error = %e, "Rejected prediction form");
        bad_request_error(&e.user_message())
    })?;

    let decision = state.classifier.predict(&input).map_err(|e| {
        error!(session_id = %session_id, error = %e, "Loan model failed");
        internal_error(&e.user_message())
    })?;

    info!(
        session_id = %session_id,
        decision = %decision,
        marital_status = ?form.marital_status,
        property_area = ?form.property_area,
        "Loan prediction made"
    );

    let mut conversation = load_state(&state, &session_id).await?;
    let name = conversation
        .user_name
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_NAME.to_string());
    let country = conversation
        .country
        .clone()
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string());

    let (prompt, resources) = state
        .advisor
        .loan_resources(&country)
        .await
        .value_or_empty();

    conversation.last_prediction = Some(decision);
    conversation.record_exchange(Topic::LoanPrediction, prompt, resources.clone());
    save_state(&state, conversation).await?;

    Ok(Json(PredictResponse {
        prediction: decision.label(),
        approved: decision == LoanDecision::Approved,
        name,
        country,
        purpose: form.loan_purpose,
        email: form.email,
        phone: form.phone,
        response: resources,
    }))
}

async fn business_idea(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Form(form): Form<AdviceForm>,
) -> ApiResult<AdviceResponse> {
    let mut conversation = load_state(&state, &session_id).await?;
    let request = {
        let country = conversation
            .require_country()
            .map_err(|e| missing_context(&session_id, e))?;
        form.business_request(country)
            .map_err(|message| bad_request_error(&message))?
    };

    let (prompt, ideas) = state.advisor.business_ideas(&request).await.value_or_empty();
    if is_empty_response(&ideas) {
        return Err(internal_error("No response received."));
    }

    conversation.record_exchange(Topic::BusinessIdea, prompt, ideas.clone());
    save_state(&state, conversation).await?;

    Ok(Json(AdviceResponse { response: ideas }))
}

async fn financial_advice(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Form(form): Form<AdviceForm>,
) -> ApiResult<AdviceResponse> {
    let mut conversation = load_state(&state, &session_id).await?;
    let request = {
        let country = conversation
            .require_country()
            .map_err(|e| missing_context(&session_id, e))?;
        form.financial_request(country)
            .map_err(|message| bad_request_error(&message))?
    };

    let (prompt, advice) = state
        .advisor
        .financial_advice(&request)
        .await
        .value_or_empty();
    if is_empty_response(&advice) {
        return Err(internal_error("No response received from Gemini API."));
    }

    conversation.record_exchange(Topic::FinancialAdvice, prompt, advice.clone());
    save_state(&state, conversation).await?;

    Ok(Json(AdviceResponse { response: advice }))
}

fn missing_context(session_id: &str, error: AdvisorError) -> ApiError {
    warn!(session_id = %session_id, kind = error.kind(), error = %error, "Session context missing");
    bad_request_error(&error.user_message())
}

async fn further_predict_chat(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Form(form): Form<QuestionForm>,
) -> ApiResult<AdviceResponse> {
    further_chat(&state, &session_id, Topic::LoanPrediction, &form.question).await
}

async fn further_business_chat(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Form(form): Form<QuestionForm>,
) -> ApiResult<AdviceResponse> {
    further_chat(&state, &session_id, Topic::BusinessIdea, &form.question).await
}

async fn further_finance_chat(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Form(form): Form<QuestionForm>,
) -> ApiResult<AdviceResponse> {
    further_chat(&state, &session_id, Topic::FinancialAdvice, &form.question).await
}

async fn further_chat(
    state: &AppState,
    session_id: &str,
    topic: Topic,
    question: &str,
) -> ApiResult<AdviceResponse> {
    let question = question.trim();
    if question.is_empty() {
        return Err(bad_request_error("No question provided."));
    }

    let mut conversation = load_state(state, session_id).await?;
    // Only the prediction thread carries the approval outcome.
    let prior = match topic {
        Topic::LoanPrediction => conversation.last_prediction,
        Topic::BusinessIdea | Topic::FinancialAdvice => None,
    };

    let follow_up = state
        .advisor
        .follow_up(prior, question, conversation.exchange(topic))
        .await;

    match follow_up.outcome {
        Ok(answer) => {
            info!(
                session_id = %session_id,
                topic = ?topic,
                answer_length = answer.len(),
                "Follow-up answered"
            );
            conversation.record_exchange(topic, question, Value::String(answer.clone()));
            save_state(state, conversation).await?;
            Ok(Json(AdviceResponse {
                response: Value::String(answer),
            }))
        }
        Err(e) => Err(internal_error(&e.user_message())),
    }
}

async fn get_gemini_response(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<AdviceResponse> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(bad_request_error("No prompt provided."));
    }

    match state.advisor.chat(prompt).await {
        Ok(text) => Ok(Json(AdviceResponse {
            response: Value::String(text),
        })),
        Err(e @ AdvisorError::ApiShape(_)) => Ok(Json(AdviceResponse {
            response: Value::String(e.user_message()),
        })),
        Err(e) => Err(internal_error(&e.user_message())),
    }
}

async fn get_session(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> ApiResult<ConversationState> {
    match state.session_storage.get(&session_id).await {
        Ok(Some(conversation)) => Ok(Json(conversation)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Session not found" })),
        )),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to get session");
            Err(internal_error("Failed to load session"))
        }
    }
}

async fn clear_session(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> ApiResult<Value> {
    state.session_storage.delete(&session_id).await.map_err(|e| {
        error!(session_id = %session_id, error = %e, "Failed to clear session");
        internal_error("Failed to clear session")
    })?;
    info!(session_id = %session_id, "Session cleared");
    Ok(Json(json!({ "status": "cleared" })))
}
