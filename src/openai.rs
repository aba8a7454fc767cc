//! Minimal OpenAI client for our use-cases.
//!
//! We call chat.completions (plain text or a strict JSON object) and
//! audio.transcriptions for the reading room. Calls are instrumented and log
//! model names, latencies and response sizes (not contents).
//!
//! NOTE: We never log the API key, the student's answers or the audio.

use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Grade, LearningModule, LessonContent, MistakeRecord};
use crate::oracle::{
  complete_reading_analysis, parse_lesson, validate_grade, validate_passage, validate_placement_outcome,
  validate_placement_test, Oracle, OracleError, PlacementOutcome, PlacementQuestion, PlacementResult, RawGrade,
  RawPassage, RawPlacementOutcome, RawPlacementTest, ReadingAnalysis, ReadingPassage, ReadingRequest, TutorContext,
};
use crate::seeds::reading_reference;
use crate::util::{fill_template, trunc_for_log};

const CLIENT_UA: &str = "spellquest-backend/0.1";

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub transcribe_model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let transcribe_model =
      std::env::var("OPENAI_TRANSCRIBE_MODEL").unwrap_or_else(|_| "whisper-1".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(45))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model, transcribe_model, prompts })
  }

  async fn post_chat(&self, req: &ChatCompletionRequest) -> Result<String, OracleError> {
    let url = format!("{}/chat/completions", self.base_url);
    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(req).send().await?;

    if !res.status().is_success() {
      return Err(status_error(res).await);
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "oracle", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default())
  }

  /// Plain-text chat completion. Used for mistake analysis and tutor replies.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_plain(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<String, OracleError> {
    let req = ChatCompletionRequest::new(model, system, user, temperature, None);
    let start = Instant::now();
    let text = self.post_chat(&req).await?.trim().to_string();
    info!(target: "oracle", elapsed = ?start.elapsed(), len = text.len(), "Model text received");
    Ok(text)
  }

  /// JSON-object chat completion, returned as raw text for the caller's validator.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json_text(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<String, OracleError> {
    let req = ChatCompletionRequest::new(
      model, system, user, temperature,
      Some(ResponseFormat { r#type: "json_object".into() }),
    );
    let start = Instant::now();
    let text = self.post_chat(&req).await?;
    info!(target: "oracle", elapsed = ?start.elapsed(), len = text.len(), "Model JSON received");
    Ok(text)
  }

  /// JSON-object chat completion. Generic over the target type T.
  async fn chat_json<T: DeserializeOwned>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, OracleError> {
    let text = self.chat_json_text(model, system, user, temperature).await?;
    serde_json::from_str::<T>(&text).map_err(|e| {
      error!(target: "oracle", error = %e, body = %trunc_for_log(&text, 200), "Model JSON did not parse");
      OracleError::Parse(e.to_string())
    })
  }

  /// Speech-to-text over a base64 audio clip (a `data:` URL prefix is accepted).
  #[instrument(level = "info", skip(self, audio_base64), fields(model = %self.transcribe_model, mime = %mime, b64_len = audio_base64.len()))]
  async fn transcribe(&self, audio_base64: &str, mime: &str) -> Result<String, OracleError> {
    let payload = audio_base64
      .split_once(";base64,")
      .map(|(_, data)| data)
      .unwrap_or(audio_base64)
      .trim();
    let bytes = base64::engine::general_purpose::STANDARD
      .decode(payload)
      .map_err(|e| OracleError::InvalidInput(format!("audio is not valid base64: {e}")))?;
    if bytes.is_empty() {
      return Err(OracleError::InvalidInput("audio is empty".into()));
    }

    let part = reqwest::multipart::Part::bytes(bytes)
      .file_name(format!("reading.{}", audio_extension(mime)))
      .mime_str(mime)
      .map_err(|e| OracleError::InvalidInput(format!("bad audio mime type: {e}")))?;
    let form = reqwest::multipart::Form::new()
      .text("model", self.transcribe_model.clone())
      .text("language", "en")
      .part("file", part);

    let url = format!("{}/audio/transcriptions", self.base_url);
    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .multipart(form).send().await?;
    if !res.status().is_success() {
      return Err(status_error(res).await);
    }

    #[derive(Deserialize)]
    struct Transcription { #[serde(default)] text: String }
    let body: Transcription = res.json().await?;
    info!(target: "oracle", elapsed = ?start.elapsed(), len = body.text.len(), "Transcription received");
    Ok(body.text.trim().to_string())
  }

  fn lesson_context(&self, module: &LearningModule) -> String {
    if module.uses_custom_words() {
      let words = module.custom_words.join(", ");
      fill_template(&self.prompts.lesson_custom_context, &[("words", words.as_str())])
    } else {
      let theme = serde_json::to_value(module.theme)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
      fill_template(
        &self.prompts.lesson_standard_context,
        &[("level", module.level.as_str()), ("theme", theme.as_str()), ("rule", module.rule_explanation.as_str())],
      )
    }
  }
}

impl Oracle for OpenAI {
  #[instrument(level = "info", skip_all, fields(module_id = %module.id, custom = module.uses_custom_words(), model = %self.strong_model))]
  async fn generate_lesson(&self, module: &LearningModule) -> Result<LessonContent, OracleError> {
    let context = self.lesson_context(module);
    let user = fill_template(&self.prompts.lesson_user_template, &[("context", context.as_str())]);
    let text = self.chat_json_text(&self.strong_model, &self.prompts.lesson_system, &user, 0.7).await?;
    let lesson = parse_lesson(&text)?;
    info!(target: "oracle", practice = lesson.practice.len(), quiz = lesson.quiz.len(), "Lesson generated");
    Ok(lesson)
  }

  #[instrument(level = "info", skip_all, fields(question_len = question.len(), answer_len = answer.len()))]
  async fn grade_answer(&self, question: &str, answer: &str, guidance: &str) -> Result<Grade, OracleError> {
    let user = fill_template(
      &self.prompts.grade_user_template,
      &[("question", question), ("guidance", guidance), ("answer", answer)],
    );
    let raw: RawGrade = self.chat_json(&self.fast_model, &self.prompts.grade_system, &user, 0.2).await?;
    validate_grade(raw)
  }

  #[instrument(level = "info", skip_all, fields(mistakes = mistakes.len()))]
  async fn analyze_mistakes(&self, module_title: &str, mistakes: &[MistakeRecord]) -> Result<String, OracleError> {
    let listed = mistakes
      .iter()
      .map(|m| format!("Question: \"{}\". Their answer: \"{}\". Correct: \"{}\".", m.question, m.attempt, m.correct))
      .collect::<Vec<_>>()
      .join("\n");
    let user = fill_template(&self.prompts.analysis_user_template, &[("title", module_title), ("mistakes", listed.as_str())]);
    self.chat_plain(&self.fast_model, &self.prompts.analysis_system, &user, 0.5).await
  }

  #[instrument(level = "info", skip_all)]
  async fn generate_placement_test(&self) -> Result<Vec<PlacementQuestion>, OracleError> {
    let raw: RawPlacementTest = self
      .chat_json(&self.strong_model, &self.prompts.placement_system, &self.prompts.placement_user_template, 0.7)
      .await?;
    validate_placement_test(raw)
  }

  #[instrument(level = "info", skip_all, fields(results = results.len()))]
  async fn analyze_placement(&self, results: &[PlacementResult]) -> Result<PlacementOutcome, OracleError> {
    let correct = results.iter().filter(|r| r.is_correct).count().to_string();
    let total = results.len().to_string();
    let mistakes = results
      .iter()
      .filter(|r| !r.is_correct)
      .map(|r| format!("Level {} question: \"{}\". Target: \"{}\".", r.question.level, r.question.question, r.question.correct_answer))
      .collect::<Vec<_>>()
      .join("\n");
    let mistakes = if mistakes.is_empty() { "None. Perfect score.".to_string() } else { mistakes };
    let user = fill_template(
      &self.prompts.placement_analysis_user_template,
      &[("correct", correct.as_str()), ("total", total.as_str()), ("mistakes", mistakes.as_str())],
    );
    let raw: RawPlacementOutcome = self
      .chat_json(&self.fast_model, &self.prompts.placement_analysis_system, &user, 0.2)
      .await?;
    validate_placement_outcome(raw)
  }

  #[instrument(level = "info", skip_all, fields(year = level, theme = %theme))]
  async fn generate_reading_passage(&self, level: u32, theme: &str) -> Result<ReadingPassage, OracleError> {
    let (focus, reference) = reading_reference(level);
    let year = level.clamp(1, 13).to_string();
    let theme = if theme.trim().is_empty() || theme.eq_ignore_ascii_case("general") {
      "Mystery or adventure in New Zealand"
    } else {
      theme
    };
    let user = fill_template(
      &self.prompts.passage_user_template,
      &[("year", year.as_str()), ("theme", theme), ("reference", reference), ("focus", focus)],
    );
    let raw: RawPassage = self.chat_json(&self.strong_model, &self.prompts.passage_system, &user, 0.9).await?;
    validate_passage(raw)
  }

  #[instrument(level = "info", skip_all, fields(year = request.year_level, has_target = request.target_text.is_some()))]
  async fn analyze_reading(&self, request: &ReadingRequest<'_>) -> Result<ReadingAnalysis, OracleError> {
    let transcript = self.transcribe(request.audio_base64, request.mime).await?;
    if transcript.is_empty() {
      return Err(OracleError::Incomplete("transcript"));
    }
    let year = request.year_level.to_string();
    let target = request
      .target_text
      .map(|t| format!("\"{t}\""))
      .unwrap_or_else(|| "(free reading; judge by the vocabulary used)".to_string());
    let user = fill_template(
      &self.prompts.reading_user_template,
      &[("year", year.as_str()), ("target", target.as_str()), ("transcript", transcript.as_str())],
    );
    let mut analysis: ReadingAnalysis =
      self.chat_json(&self.fast_model, &self.prompts.reading_system, &user, 0.2).await?;
    analysis.transcript = Some(transcript);
    Ok(complete_reading_analysis(analysis, request.year_level))
  }

  #[instrument(level = "info", skip_all, fields(query_len = query.len(), has_question = context.current_question.is_some()))]
  async fn ask_tutor(&self, query: &str, context: &TutorContext) -> Result<String, OracleError> {
    let examples = if context.example_words.is_empty() {
      "(none)".to_string()
    } else {
      context.example_words.join(", ")
    };
    let user = fill_template(
      &self.prompts.tutor_user_template,
      &[
        ("title", context.module_title.as_str()),
        ("rule", context.rule.as_str()),
        ("question", context.current_question.as_deref().unwrap_or("General help")),
        ("answer", context.hidden_answer.as_deref().unwrap_or("(none for this phase)")),
        ("examples", examples.as_str()),
        ("query", query),
      ],
    );
    let reply = self.chat_plain(&self.fast_model, &self.prompts.tutor_system, &user, 0.6).await?;
    if reply.is_empty() {
      return Err(OracleError::Incomplete("reply"));
    }
    Ok(reply)
  }
}

fn audio_extension(mime: &str) -> &'static str {
  match mime.split(';').next().unwrap_or("").trim() {
    "audio/webm" => "webm",
    "audio/ogg" => "ogg",
    "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
    "audio/mpeg" | "audio/mp3" => "mp3",
    "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
    _ => "webm",
  }
}

async fn status_error(res: reqwest::Response) -> OracleError {
  let status = res.status();
  let body = res.text().await.unwrap_or_default();
  let message = extract_openai_error(&body).unwrap_or(body);
  error!(target: "oracle", status = status.as_u16(), message = %trunc_for_log(&message, 200), "OpenAI call failed");
  OracleError::Status { status: status.as_u16(), message }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

impl ChatCompletionRequest {
  fn new(model: &str, system: &str, user: &str, temperature: f32, response_format: Option<ResponseFormat>) -> Self {
    Self {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format,
    }
  }
}

#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> OpenAI {
    OpenAI {
      client: reqwest::Client::new(),
      api_key: "test".into(),
      base_url: "http://127.0.0.1:9".into(),
      fast_model: "fast".into(),
      strong_model: "strong".into(),
      transcribe_model: "whisper-1".into(),
      prompts: Prompts::default(),
    }
  }

  #[test]
  fn error_body_message_is_extracted() {
    let body = r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[test]
  fn custom_word_lists_change_the_lesson_context() {
    let mut module = crate::seeds::standard_modules().remove(0);
    let standard = client().lesson_context(&module);
    assert!(standard.contains(&module.level));

    module.is_custom = true;
    module.custom_words = vec!["kiwi".into(), "tui".into()];
    let custom = client().lesson_context(&module);
    assert!(custom.contains("kiwi, tui"));
  }

  #[test]
  fn audio_mime_maps_to_extension() {
    assert_eq!(audio_extension("audio/webm;codecs=opus"), "webm");
    assert_eq!(audio_extension("audio/wav"), "wav");
    assert_eq!(audio_extension("application/octet-stream"), "webm");
  }

  #[tokio::test]
  async fn bad_audio_is_rejected_before_any_request() {
    let err = client().transcribe("%%%not base64%%%", "audio/webm").await.unwrap_err();
    assert!(matches!(err, OracleError::InvalidInput(_)));
  }
}
