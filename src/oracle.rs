//! The content oracle: the seam between game rules and the language model.
//!
//! The model's output is untrusted. Raw payloads are deserialized into loose
//! `Raw*` shapes and then validated into domain types; anything structurally
//! incomplete becomes an `OracleError`, which callers replace with a fallback.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
  ActivityItem, ActivityType, ConceptCheck, DifficultWord, Grade, LearningModule, LessonContent,
  LessonIntro, MisreadWord, MistakeRecord, WorkedExample,
};

pub const DEFAULT_PROMPT: &str = "Solve this puzzle:";
pub const DEFAULT_CONCEPT_QUESTION: &str = "In your own words, what is the rule in this lesson?";
pub const DEFAULT_GRADING_GUIDANCE: &str = "Accept any answer that explains the rule's main idea.";

#[derive(Debug, Error)]
pub enum OracleError {
  #[error("oracle disabled (no API key configured)")]
  Disabled,
  #[error("transport error: {0}")]
  Transport(String),
  #[error("oracle HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("JSON parse error: {0}")]
  Parse(String),
  #[error("incomplete oracle response: missing {0}")]
  Incomplete(&'static str),
  #[error("invalid input: {0}")]
  InvalidInput(String),
}

impl From<reqwest::Error> for OracleError {
  fn from(e: reqwest::Error) -> Self {
    OracleError::Transport(e.to_string())
  }
}

impl From<serde_json::Error> for OracleError {
  fn from(e: serde_json::Error) -> Self {
    OracleError::Parse(e.to_string())
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementQuestion {
  pub question: String,
  pub correct_answer: String,
  #[serde(default)] pub distractors: Vec<String>,
  #[serde(default = "default_placement_level")] pub level: u32,
}

fn default_placement_level() -> u32 { 1 }

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementResult {
  pub question: PlacementQuestion,
  pub is_correct: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlacementOutcome {
  pub level: u32,
  pub analysis: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadingPassage {
  pub title: String,
  pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingAnalysis {
  #[serde(default)] pub difficult_words: Vec<DifficultWord>,
  #[serde(default)] pub misread_words: Vec<MisreadWord>,
  #[serde(default)] pub feedback: String,
  #[serde(default)] pub assessed_level: String,
  /// What the transcription heard, when available.
  #[serde(default)] pub transcript: Option<String>,
}

/// A recorded reading attempt.
#[derive(Clone, Debug)]
pub struct ReadingRequest<'a> {
  pub audio_base64: &'a str,
  pub mime: &'a str,
  pub year_level: u32,
  pub target_text: Option<&'a str>,
}

/// What the tutor may know about the current question. The target answer is
/// context for scaffolding and must never be echoed back.
#[derive(Clone, Debug, Default)]
pub struct TutorContext {
  pub module_title: String,
  pub rule: String,
  pub current_question: Option<String>,
  pub hidden_answer: Option<String>,
  pub example_words: Vec<String>,
}

/// Remote content generator and grader.
pub trait Oracle: Send + Sync {
  fn generate_lesson(&self, module: &LearningModule) -> impl Future<Output = Result<LessonContent, OracleError>> + Send;

  /// Grade an open answer on a 1-5 scale.
  fn grade_answer(&self, question: &str, answer: &str, guidance: &str) -> impl Future<Output = Result<Grade, OracleError>> + Send;

  fn analyze_mistakes(&self, module_title: &str, mistakes: &[MistakeRecord]) -> impl Future<Output = Result<String, OracleError>> + Send;

  fn generate_placement_test(&self) -> impl Future<Output = Result<Vec<PlacementQuestion>, OracleError>> + Send;

  fn analyze_placement(&self, results: &[PlacementResult]) -> impl Future<Output = Result<PlacementOutcome, OracleError>> + Send;

  fn generate_reading_passage(&self, level: u32, theme: &str) -> impl Future<Output = Result<ReadingPassage, OracleError>> + Send;

  fn analyze_reading(&self, request: &ReadingRequest<'_>) -> impl Future<Output = Result<ReadingAnalysis, OracleError>> + Send;

  fn ask_tutor(&self, query: &str, context: &TutorContext) -> impl Future<Output = Result<String, OracleError>> + Send;
}

/// An unconfigured oracle refuses every call, so callers take their fallback path.
impl<O: Oracle> Oracle for Option<O> {
  async fn generate_lesson(&self, module: &LearningModule) -> Result<LessonContent, OracleError> {
    match self {
      Some(o) => o.generate_lesson(module).await,
      None => Err(OracleError::Disabled),
    }
  }

  async fn grade_answer(&self, question: &str, answer: &str, guidance: &str) -> Result<Grade, OracleError> {
    match self {
      Some(o) => o.grade_answer(question, answer, guidance).await,
      None => Err(OracleError::Disabled),
    }
  }

  async fn analyze_mistakes(&self, module_title: &str, mistakes: &[MistakeRecord]) -> Result<String, OracleError> {
    match self {
      Some(o) => o.analyze_mistakes(module_title, mistakes).await,
      None => Err(OracleError::Disabled),
    }
  }

  async fn generate_placement_test(&self) -> Result<Vec<PlacementQuestion>, OracleError> {
    match self {
      Some(o) => o.generate_placement_test().await,
      None => Err(OracleError::Disabled),
    }
  }

  async fn analyze_placement(&self, results: &[PlacementResult]) -> Result<PlacementOutcome, OracleError> {
    match self {
      Some(o) => o.analyze_placement(results).await,
      None => Err(OracleError::Disabled),
    }
  }

  async fn generate_reading_passage(&self, level: u32, theme: &str) -> Result<ReadingPassage, OracleError> {
    match self {
      Some(o) => o.generate_reading_passage(level, theme).await,
      None => Err(OracleError::Disabled),
    }
  }

  async fn analyze_reading(&self, request: &ReadingRequest<'_>) -> Result<ReadingAnalysis, OracleError> {
    match self {
      Some(o) => o.analyze_reading(request).await,
      None => Err(OracleError::Disabled),
    }
  }

  async fn ask_tutor(&self, query: &str, context: &TutorContext) -> Result<String, OracleError> {
    match self {
      Some(o) => o.ask_tutor(query, context).await,
      None => Err(OracleError::Disabled),
    }
  }
}

// --- Raw (untrusted) payload shapes ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLesson {
  #[serde(default)] pub intro: Option<RawIntro>,
  #[serde(default)] pub practice: Option<Vec<RawItem>>,
  #[serde(default)] pub concept_check: Option<RawConceptCheck>,
  #[serde(default)] pub quiz: Option<Vec<RawItem>>,
  #[serde(default)] pub conclusion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawIntro {
  #[serde(default)] pub title: Option<String>,
  #[serde(default)] pub explanation: Option<String>,
  #[serde(default)] pub examples: Vec<WorkedExample>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConceptCheck {
  #[serde(default)] pub question: Option<String>,
  #[serde(default)] pub grading_guidance: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
  #[serde(default)] pub id: Option<String>,
  #[serde(default, rename = "type")] pub kind: Option<String>,
  #[serde(default)] pub prompt: Option<String>,
  #[serde(default)] pub correct_answer: Option<String>,
  #[serde(default)] pub options: Option<Vec<String>>,
  #[serde(default)] pub distractors: Option<Vec<String>>,
  #[serde(default)] pub explanation: Option<String>,
  #[serde(default)] pub hint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawGrade {
  #[serde(default)] pub score: Option<f64>,
  #[serde(default)] pub feedback: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
  s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Coerce one raw item into something the player can always present.
pub fn sanitize_item(raw: RawItem, fallback_id: String) -> ActivityItem {
  let mut kind = raw
    .kind
    .as_deref()
    .and_then(ActivityType::parse)
    .unwrap_or(ActivityType::BuildWord);
  let correct_answer = raw.correct_answer.unwrap_or_default().trim().to_string();
  // A distractor equal to the answer is not a real choice.
  let distractors: Vec<String> = raw
    .distractors
    .unwrap_or_default()
    .into_iter()
    .filter(|d| !d.trim().is_empty() && !d.trim().eq_ignore_ascii_case(&correct_answer))
    .collect();
  if kind.is_choice() && distractors.is_empty() {
    kind = ActivityType::BuildWord;
  }

  ActivityItem {
    id: non_empty(raw.id).unwrap_or(fallback_id),
    kind,
    prompt: non_empty(raw.prompt).unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
    correct_answer,
    options: raw.options.unwrap_or_default(),
    distractors,
    explanation: raw.explanation.unwrap_or_default(),
    hint: raw.hint.unwrap_or_default(),
  }
}

/// Validate a raw lesson. Missing intro or practice list is fatal; everything
/// else is patched with a generic default.
pub fn validate_lesson(raw: RawLesson) -> Result<LessonContent, OracleError> {
  let intro = raw.intro.ok_or(OracleError::Incomplete("intro"))?;
  let practice = raw.practice.ok_or(OracleError::Incomplete("practice"))?;

  let practice: Vec<ActivityItem> = practice
    .into_iter()
    .enumerate()
    .map(|(i, item)| sanitize_item(item, format!("p{}", i + 1)))
    .filter(|item| !item.correct_answer.is_empty())
    .collect();
  let quiz: Vec<ActivityItem> = raw
    .quiz
    .unwrap_or_default()
    .into_iter()
    .enumerate()
    .map(|(i, item)| sanitize_item(item, format!("q{}", i + 1)))
    .filter(|item| !item.correct_answer.is_empty())
    .collect();

  let concept = raw.concept_check.unwrap_or_default();
  Ok(LessonContent {
    intro: LessonIntro {
      title: non_empty(intro.title).unwrap_or_else(|| "Today's Rule".to_string()),
      explanation: intro.explanation.unwrap_or_default(),
      examples: intro.examples,
    },
    practice,
    concept_check: ConceptCheck {
      question: non_empty(concept.question).unwrap_or_else(|| DEFAULT_CONCEPT_QUESTION.to_string()),
      grading_guidance: non_empty(concept.grading_guidance).unwrap_or_else(|| DEFAULT_GRADING_GUIDANCE.to_string()),
    },
    quiz,
    conclusion: raw.conclusion.unwrap_or_default(),
  })
}

pub fn parse_lesson(text: &str) -> Result<LessonContent, OracleError> {
  let raw: RawLesson = serde_json::from_str(text)?;
  validate_lesson(raw)
}

/// Scores outside 1-5 are clamped; a missing score is a parse failure.
pub fn validate_grade(raw: RawGrade) -> Result<Grade, OracleError> {
  let score = raw.score.ok_or(OracleError::Incomplete("score"))?;
  let score = score.round().clamp(1.0, 5.0) as u8;
  let feedback = non_empty(raw.feedback).unwrap_or_else(|| "Good effort!".to_string());
  Ok(Grade { score, feedback })
}

pub const PLACEMENT_MAX_LEVEL: u32 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct RawPlacementTest {
  #[serde(default)] pub questions: Vec<RawPlacementQuestion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlacementQuestion {
  #[serde(default)] pub question: Option<String>,
  #[serde(default)] pub correct_answer: Option<String>,
  #[serde(default)] pub distractors: Option<Vec<String>>,
  #[serde(default)] pub level: Option<f64>,
}

fn clamp_level(level: f64) -> u32 {
  level.round().clamp(1.0, PLACEMENT_MAX_LEVEL as f64) as u32
}

/// Keep only answerable multiple-choice questions; none left is an error.
pub fn validate_placement_test(raw: RawPlacementTest) -> Result<Vec<PlacementQuestion>, OracleError> {
  let questions: Vec<PlacementQuestion> = raw
    .questions
    .into_iter()
    .filter_map(|q| {
      let correct_answer = non_empty(q.correct_answer)?;
      let distractors: Vec<String> = q
        .distractors
        .unwrap_or_default()
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case(&correct_answer))
        .collect();
      if distractors.is_empty() {
        return None;
      }
      Some(PlacementQuestion {
        question: non_empty(q.question).unwrap_or_else(|| "Select the correct spelling.".to_string()),
        correct_answer,
        distractors,
        level: clamp_level(q.level.unwrap_or(1.0)),
      })
    })
    .collect();
  if questions.is_empty() {
    return Err(OracleError::Incomplete("questions"));
  }
  Ok(questions)
}

#[derive(Debug, Default, Deserialize)]
pub struct RawPlacementOutcome {
  #[serde(default)] pub level: Option<f64>,
  #[serde(default)] pub analysis: Option<String>,
}

pub fn validate_placement_outcome(raw: RawPlacementOutcome) -> Result<PlacementOutcome, OracleError> {
  let level = raw.level.ok_or(OracleError::Incomplete("level"))?;
  Ok(PlacementOutcome {
    level: clamp_level(level),
    analysis: non_empty(raw.analysis).unwrap_or_else(|| "Let's start at the beginning!".to_string()),
  })
}

#[derive(Debug, Default, Deserialize)]
pub struct RawPassage {
  #[serde(default)] pub title: Option<String>,
  #[serde(default)] pub content: Option<String>,
}

pub fn validate_passage(raw: RawPassage) -> Result<ReadingPassage, OracleError> {
  let content = non_empty(raw.content).ok_or(OracleError::Incomplete("content"))?;
  Ok(ReadingPassage {
    title: non_empty(raw.title).unwrap_or_else(|| "Reading Time".to_string()),
    content,
  })
}

/// Fill blanks in a reading assessment; never fails.
pub fn complete_reading_analysis(mut analysis: ReadingAnalysis, year_level: u32) -> ReadingAnalysis {
  if analysis.feedback.trim().is_empty() {
    analysis.feedback = "Good reading!".to_string();
  }
  if analysis.assessed_level.trim().is_empty() {
    analysis.assessed_level = format!("Level {year_level}");
  }
  analysis.difficult_words.retain(|w| !w.word.trim().is_empty());
  analysis.misread_words.retain(|w| !w.word.trim().is_empty());
  analysis
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn incomplete_lesson_is_rejected() {
    let err = parse_lesson(r#"{"practice": []}"#).unwrap_err();
    assert!(matches!(err, OracleError::Incomplete("intro")));
    let err = parse_lesson(r#"{"intro": {"title": "x", "explanation": "y"}}"#).unwrap_err();
    assert!(matches!(err, OracleError::Incomplete("practice")));
    assert!(matches!(parse_lesson("not json"), Err(OracleError::Parse(_))));
  }

  #[test]
  fn items_are_coerced_into_presentable_shapes() {
    let text = r#"{
      "intro": {"title": "Magic E", "explanation": "e makes it long", "examples": []},
      "practice": [
        {"id": "p1", "type": "MATCHING", "prompt": "", "correctAnswer": "hope", "distractors": []},
        {"id": "p2", "type": "WIGGLE", "prompt": "Spell it", "correctAnswer": "kite"},
        {"type": "SORTING", "prompt": "Pick", "correctAnswer": "cake", "distractors": ["cak", "caek"]}
      ],
      "quiz": [
        {"id": "q1", "type": "BUILD_WORD", "prompt": "Spell", "correctAnswer": "  tape "},
        {"id": "q2", "type": "MATCHING", "prompt": "Pick", "correctAnswer": "hope", "distractors": ["hope", " HOPE "]},
        {"id": "q3", "type": "MATCHING", "prompt": "Pick", "correctAnswer": "hope", "distractors": ["Hope", "hop"]}
      ]
    }"#;
    let lesson = parse_lesson(text).unwrap();
    assert_eq!(lesson.practice[0].kind, ActivityType::BuildWord);
    assert_eq!(lesson.practice[0].prompt, DEFAULT_PROMPT);
    assert_eq!(lesson.practice[1].kind, ActivityType::BuildWord);
    assert_eq!(lesson.practice[2].kind, ActivityType::Sorting);
    assert_eq!(lesson.practice[2].id, "p3");
    assert_eq!(lesson.quiz[0].correct_answer, "tape");
    assert_eq!(lesson.quiz[1].kind, ActivityType::BuildWord);
    assert!(lesson.quiz[1].distractors.is_empty());
    assert_eq!(lesson.quiz[2].distractors, vec!["hop"]);
    assert_eq!(lesson.concept_check.question, DEFAULT_CONCEPT_QUESTION);
  }

  #[test]
  fn grades_are_clamped() {
    let g = validate_grade(RawGrade { score: Some(9.0), feedback: None }).unwrap();
    assert_eq!(g.score, 5);
    let g = validate_grade(RawGrade { score: Some(0.0), feedback: Some("meh".into()) }).unwrap();
    assert_eq!(g.score, 1);
    assert!(validate_grade(RawGrade::default()).is_err());
  }

  #[tokio::test]
  async fn missing_oracle_is_disabled() {
    struct Never;
    impl Oracle for Never {
      async fn generate_lesson(&self, _: &LearningModule) -> Result<LessonContent, OracleError> { unreachable!() }
      async fn grade_answer(&self, _: &str, _: &str, _: &str) -> Result<Grade, OracleError> { unreachable!() }
      async fn analyze_mistakes(&self, _: &str, _: &[MistakeRecord]) -> Result<String, OracleError> { unreachable!() }
      async fn generate_placement_test(&self) -> Result<Vec<PlacementQuestion>, OracleError> { unreachable!() }
      async fn analyze_placement(&self, _: &[PlacementResult]) -> Result<PlacementOutcome, OracleError> { unreachable!() }
      async fn generate_reading_passage(&self, _: u32, _: &str) -> Result<ReadingPassage, OracleError> { unreachable!() }
      async fn analyze_reading(&self, _: &ReadingRequest<'_>) -> Result<ReadingAnalysis, OracleError> { unreachable!() }
      async fn ask_tutor(&self, _: &str, _: &TutorContext) -> Result<String, OracleError> { unreachable!() }
    }
    let oracle: Option<Never> = None;
    let res = oracle.grade_answer("q", "a", "g").await;
    assert!(matches!(res, Err(OracleError::Disabled)));
  }

  #[test]
  fn placement_questions_need_distractors() {
    let raw: RawPlacementTest = serde_json::from_str(
      r#"{"questions": [
        {"question": "Pick one", "correctAnswer": "Because", "distractors": ["Becoz", "because"], "level": 9},
        {"question": "Pick one", "correctAnswer": "Cat", "distractors": []},
        {"correctAnswer": "", "distractors": ["x"]}
      ]}"#,
    )
    .unwrap();
    let qs = validate_placement_test(raw).unwrap();
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].distractors, vec!["Becoz"]);
    assert_eq!(qs[0].level, PLACEMENT_MAX_LEVEL);
    assert!(validate_placement_test(RawPlacementTest::default()).is_err());
  }

  #[test]
  fn placement_outcome_and_passage_defaults() {
    let o = validate_placement_outcome(RawPlacementOutcome { level: Some(0.2), analysis: None }).unwrap();
    assert_eq!(o.level, 1);
    assert!(validate_placement_outcome(RawPlacementOutcome::default()).is_err());
    assert!(validate_passage(RawPassage { title: Some("T".into()), content: Some("  ".into()) }).is_err());
  }

  #[test]
  fn reading_analysis_blanks_are_filled() {
    let raw: ReadingAnalysis = serde_json::from_str(r#"{"misreadWords": [{"word": "", "heard": "x"}]}"#).unwrap();
    let a = complete_reading_analysis(raw, 6);
    assert_eq!(a.assessed_level, "Level 6");
    assert_eq!(a.feedback, "Good reading!");
    assert!(a.misread_words.is_empty());
  }
}
