//! Lesson state machine.
//!
//! LOADING -> INTRO -> PRACTICE -> CONCEPT -> TEST -> RATING -> SUMMARY, with
//! ERROR reachable only from LOADING. The whole in-progress position lives in
//! a `LessonPhaseState`, so a session can be snapshotted on exit and restored
//! exactly. After loading, oracle failures never stall a lesson: each call
//! has a fixed fallback.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
  ActivityItem, Feedback, Grade, LearningModule, LessonContent, LessonPhase, LessonPhaseState, MistakeRecord,
  ModuleProgress,
};
use crate::fuzzy::{answers_match, hint_tone, HintTone};
use crate::oracle::{Oracle, TutorContext};
use crate::rewards::{completion_reward, CompletionReport};
use crate::seeds::{fallback_grade, fallback_lesson, FALLBACK_MISTAKE_ANALYSIS, PERFECT_RUN_ANALYSIS};

/// Concept-check grades at or above this pass.
pub const CONCEPT_PASS_SCORE: u8 = 3;
/// Failed concept gradings after which the student may move on anyway.
pub const CONCEPT_MAX_FAILS: u32 = 2;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LessonAction {
  Begin,
  SubmitAnswer { answer: String },
  Next,
  Rate { confidence: u8 },
  Finish,
  Exit,
}

impl LessonAction {
  pub fn name(&self) -> &'static str {
    match self {
      LessonAction::Begin => "begin",
      LessonAction::SubmitAnswer { .. } => "submit_answer",
      LessonAction::Next => "next",
      LessonAction::Rate { .. } => "rate",
      LessonAction::Finish => "finish",
      LessonAction::Exit => "exit",
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LessonError {
  #[error("'{action}' is not valid during {phase:?}")]
  InvalidAction { phase: LessonPhase, action: &'static str },
  #[error("answer must not be empty")]
  EmptyAnswer,
  #[error("check the current answer before moving on")]
  NotChecked,
  #[error("confidence must be between 1 and 5, got {0}")]
  ConfidenceOutOfRange(u8),
  #[error("pick a confidence rating first")]
  ConfidenceRequired,
  #[error("concept check not passed yet")]
  ConceptPending,
}

/// What a handled action produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LessonEvent {
  /// A new phase or item is current.
  Advanced { phase: LessonPhase, sub_index: usize },
  Answered { feedback: Feedback, title: String, message: String, correct_answer: Option<String> },
  Graded { grade: Grade, passed: bool, can_advance: bool },
  Rated { confidence: u8 },
  Summarized { analysis: String, test_score: u32, quiz_len: usize },
  Completed(CompletionReport),
  Exited,
}

/// An event plus the snapshot the caller should persist, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
  pub event: LessonEvent,
  pub checkpoint: Option<LessonPhaseState>,
}

impl Step {
  fn only(event: LessonEvent) -> Self {
    Self { event, checkpoint: None }
  }
}

pub struct LessonSession {
  module: LearningModule,
  state: LessonPhaseState,
  analysis: Option<String>,
  finished: bool,
}

impl LessonSession {
  /// LOADING: resume the stored snapshot, or generate fresh content.
  #[instrument(level = "info", skip_all, fields(module_id = %module.id))]
  pub async fn load<O: Oracle>(oracle: &O, module: LearningModule, progress: Option<&ModuleProgress>) -> Self {
    let resumable = progress
      .filter(|p| !p.completed)
      .and_then(|p| p.resume_state.as_ref())
      .filter(|s| s.phase.is_resumable());
    if let Some(snapshot) = resumable {
      info!(target: "lesson", phase = ?snapshot.phase, sub_index = snapshot.sub_index, "Resuming lesson");
      return Self { module, state: snapshot.clone(), analysis: None, finished: false };
    }

    let content = match oracle.generate_lesson(&module).await {
      Ok(content) => content,
      Err(e) => {
        warn!(target: "lesson", error = %e, "Lesson generation failed; using fallback lesson");
        fallback_lesson()
      }
    };

    let phase = if is_playable(&content) {
      LessonPhase::Intro
    } else {
      warn!(target: "lesson", "Lesson has no playable items");
      LessonPhase::Error
    };
    info!(target: "lesson", ?phase, practice = content.practice.len(), quiz = content.quiz.len(), "Lesson loaded");
    Self { module, state: LessonPhaseState::new(phase, content), analysis: None, finished: false }
  }

  pub fn state(&self) -> &LessonPhaseState {
    &self.state
  }

  pub fn phase(&self) -> LessonPhase {
    self.state.phase
  }

  /// The item currently shown in PRACTICE or TEST.
  pub fn current_item(&self) -> Option<&ActivityItem> {
    match self.state.phase {
      LessonPhase::Practice => self.state.content.practice.get(self.state.sub_index),
      LessonPhase::Test => self.state.content.quiz.get(self.state.sub_index),
      _ => None,
    }
  }

  /// What the tutor may see right now. The answer is passed as hidden context.
  pub fn tutor_context(&self) -> TutorContext {
    let content = &self.state.content;
    let mut words: Vec<String> = Vec::new();
    for w in content
      .intro
      .examples
      .iter()
      .map(|e| e.word.clone())
      .chain(content.practice.iter().chain(&content.quiz).map(|i| i.correct_answer.clone()))
    {
      if !words.iter().any(|x| x.eq_ignore_ascii_case(&w)) {
        words.push(w);
      }
    }

    let (current_question, hidden_answer) = match (self.state.phase, self.current_item()) {
      (_, Some(item)) => (Some(item.prompt.clone()), Some(item.correct_answer.clone())),
      (LessonPhase::Concept, None) => (Some(content.concept_check.question.clone()), None),
      _ => (None, None),
    };

    TutorContext {
      module_title: self.module.title.clone(),
      rule: self.module.rule_explanation.clone(),
      current_question,
      hidden_answer,
      example_words: words,
    }
  }

  /// Apply one action. Rejected actions leave the session untouched.
  #[instrument(level = "debug", skip_all, fields(module_id = %self.module.id, phase = ?self.state.phase, action = action.name()))]
  pub async fn handle<O: Oracle>(&mut self, oracle: &O, action: LessonAction) -> Result<Step, LessonError> {
    use LessonPhase as P;

    if action == LessonAction::Exit {
      return Ok(self.exit());
    }

    match (self.state.phase, action) {
      (P::Intro, LessonAction::Begin) => {
        let next = if self.state.content.practice.is_empty() { P::Concept } else { P::Practice };
        Ok(self.start_phase(next))
      }
      (P::Practice, LessonAction::SubmitAnswer { answer }) => self.check_item(&answer, false),
      (P::Practice, LessonAction::Next) => self.next_item(false),
      (P::Concept, LessonAction::SubmitAnswer { answer }) => self.grade_concept(oracle, &answer).await,
      (P::Concept, LessonAction::Next) => {
        if !self.concept_can_advance() {
          return Err(LessonError::ConceptPending);
        }
        let next = if self.state.content.quiz.is_empty() { P::Rating } else { P::Test };
        Ok(self.start_phase(next))
      }
      (P::Test, LessonAction::SubmitAnswer { answer }) => self.check_item(&answer, true),
      (P::Test, LessonAction::Next) => self.next_item(true),
      (P::Rating, LessonAction::Rate { confidence }) => {
        if !(1..=5).contains(&confidence) {
          return Err(LessonError::ConfidenceOutOfRange(confidence));
        }
        self.state.confidence = Some(confidence);
        Ok(Step::only(LessonEvent::Rated { confidence }))
      }
      (P::Rating, LessonAction::Next) => self.summarize(oracle).await,
      (P::Summary, LessonAction::Finish) if !self.finished => Ok(self.finish()),
      (phase, action) => Err(LessonError::InvalidAction { phase, action: action.name() }),
    }
  }

  fn exit(&self) -> Step {
    let checkpoint = self.state.phase.is_resumable().then(|| self.state.clone());
    info!(target: "lesson", module_id = %self.module.id, phase = ?self.state.phase, saved = checkpoint.is_some(), "Lesson exited");
    Step { event: LessonEvent::Exited, checkpoint }
  }

  /// Enter a phase with a clean per-item slate. Concept results and the
  /// running score carry over.
  fn start_phase(&mut self, phase: LessonPhase) -> Step {
    self.state.phase = phase;
    self.state.sub_index = 0;
    self.clear_item();
    debug!(target: "lesson", ?phase, "Phase started");
    Step {
      event: LessonEvent::Advanced { phase, sub_index: 0 },
      checkpoint: phase.is_resumable().then(|| self.state.clone()),
    }
  }

  fn clear_item(&mut self) {
    self.state.user_answer.clear();
    self.state.feedback = None;
    self.state.feedback_title.clear();
    self.state.attempts_for_current = 0;
  }

  fn items(&self, test: bool) -> &[ActivityItem] {
    if test {
      &self.state.content.quiz
    } else {
      &self.state.content.practice
    }
  }

  fn check_item(&mut self, answer: &str, test: bool) -> Result<Step, LessonError> {
    if matches!(self.state.feedback, Some(Feedback::Correct) | Some(Feedback::Incorrect)) {
      return Err(LessonError::InvalidAction { phase: self.state.phase, action: "submit_answer" });
    }
    if answer.trim().is_empty() {
      return Err(LessonError::EmptyAnswer);
    }
    let item = self
      .items(test)
      .get(self.state.sub_index)
      .cloned()
      .ok_or(LessonError::InvalidAction { phase: self.state.phase, action: "submit_answer" })?;

    self.state.user_answer = answer.to_string();

    let (feedback, title, message, correct_answer) = if answers_match(answer, &item.correct_answer) {
      if test {
        self.state.test_score += 1;
      }
      let title = if test { "Correct!" } else { "Spot on!" };
      (Feedback::Correct, title, item.explanation.clone(), None)
    } else if self.state.attempts_for_current == 0 {
      self.state.attempts_for_current = 1;
      let title = match (hint_tone(answer, &item.correct_answer), test) {
        (HintTone::Almost, false) => "Almost Correct!",
        (HintTone::NotQuite, false) => "Not quite right",
        (HintTone::Almost, true) => "So close!",
        (HintTone::NotQuite, true) => "Try again",
      };
      (Feedback::Hint, title, item.hint.clone(), None)
    } else {
      if test {
        self.state.mistakes.push(MistakeRecord {
          question: item.prompt.clone(),
          attempt: answer.to_string(),
          correct: item.correct_answer.clone(),
        });
      }
      let title = if test { "Incorrect" } else { "Let's learn from this." };
      (Feedback::Incorrect, title, item.explanation.clone(), Some(item.correct_answer.clone()))
    };

    self.state.feedback = Some(feedback);
    self.state.feedback_title = title.to_string();
    debug!(target: "lesson", item_id = %item.id, ?feedback, answer_len = answer.len(), "Answer checked");

    Ok(Step::only(LessonEvent::Answered { feedback, title: title.to_string(), message, correct_answer }))
  }

  fn next_item(&mut self, test: bool) -> Result<Step, LessonError> {
    if !matches!(self.state.feedback, Some(Feedback::Correct) | Some(Feedback::Incorrect)) {
      return Err(LessonError::NotChecked);
    }
    let len = self.items(test).len();
    if self.state.sub_index + 1 < len {
      self.state.sub_index += 1;
      self.clear_item();
      return Ok(Step {
        event: LessonEvent::Advanced { phase: self.state.phase, sub_index: self.state.sub_index },
        checkpoint: Some(self.state.clone()),
      });
    }
    Ok(self.start_phase(if test { LessonPhase::Rating } else { LessonPhase::Concept }))
  }

  fn concept_passed(&self) -> bool {
    self.state.concept_result.as_ref().is_some_and(|g| g.score >= CONCEPT_PASS_SCORE)
  }

  fn concept_can_advance(&self) -> bool {
    self.concept_passed() || self.state.concept_attempts >= CONCEPT_MAX_FAILS
  }

  async fn grade_concept<O: Oracle>(&mut self, oracle: &O, answer: &str) -> Result<Step, LessonError> {
    if self.concept_passed() {
      return Err(LessonError::InvalidAction { phase: LessonPhase::Concept, action: "submit_answer" });
    }
    if answer.trim().is_empty() {
      return Err(LessonError::EmptyAnswer);
    }

    let check = &self.state.content.concept_check;
    let grade = match oracle.grade_answer(&check.question, answer, &check.grading_guidance).await {
      Ok(g) => g,
      Err(e) => {
        warn!(target: "lesson", error = %e, "Concept grading failed; using fallback grade");
        fallback_grade()
      }
    };

    self.state.user_answer = answer.to_string();
    let passed = grade.score >= CONCEPT_PASS_SCORE;
    if !passed {
      self.state.concept_attempts += 1;
    }
    self.state.concept_result = Some(grade.clone());
    debug!(target: "lesson", score = grade.score, passed, attempts = self.state.concept_attempts, "Concept graded");

    Ok(Step::only(LessonEvent::Graded { grade, passed, can_advance: self.concept_can_advance() }))
  }

  async fn summarize<O: Oracle>(&mut self, oracle: &O) -> Result<Step, LessonError> {
    if self.state.confidence.is_none() {
      return Err(LessonError::ConfidenceRequired);
    }

    let analysis = if self.state.mistakes.is_empty() {
      PERFECT_RUN_ANALYSIS.to_string()
    } else {
      match oracle.analyze_mistakes(&self.module.title, &self.state.mistakes).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => FALLBACK_MISTAKE_ANALYSIS.to_string(),
        Err(e) => {
          warn!(target: "lesson", error = %e, "Mistake analysis failed; using fallback");
          FALLBACK_MISTAKE_ANALYSIS.to_string()
        }
      }
    };

    self.state.phase = LessonPhase::Summary;
    self.analysis = Some(analysis.clone());
    Ok(Step::only(LessonEvent::Summarized {
      analysis,
      test_score: self.state.test_score,
      quiz_len: self.state.content.quiz.len(),
    }))
  }

  fn finish(&mut self) -> Step {
    let final_percentage = final_percentage(self.state.test_score, self.state.content.quiz.len());
    let concept_score = self.state.concept_result.as_ref().map(|g| g.score);
    let report = CompletionReport {
      module_id: self.module.id.clone(),
      final_percentage,
      confidence: self.state.confidence,
      analysis: self.analysis.clone(),
      concept_score,
      reward: completion_reward(final_percentage, concept_score),
    };
    self.finished = true;
    info!(target: "lesson", module_id = %self.module.id, final_percentage, xp = report.reward.xp, stars = report.reward.stars, "Lesson completed");
    Step::only(LessonEvent::Completed(report))
  }
}

/// `round(score / len * 100)`, 0 for an empty quiz.
pub fn final_percentage(test_score: u32, quiz_len: usize) -> u32 {
  if quiz_len == 0 {
    return 0;
  }
  ((test_score as f64 / quiz_len as f64) * 100.0).round() as u32
}

/// At least one practice or quiz item.
pub fn is_playable(content: &LessonContent) -> bool {
  !content.practice.is_empty() || !content.quiz.is_empty()
}
