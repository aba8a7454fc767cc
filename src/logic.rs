//! Core behaviors shared by the HTTP and WebSocket handlers.
//!
//! Every operation that touches the oracle has a fixed fallback, so handlers
//! only fail on bad input or storage problems.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::{ClassGroup, LearningModule, ReadingSession, Student, Teacher};
use crate::lesson::{LessonAction, LessonError, LessonEvent, LessonSession};
use crate::oracle::{Oracle, PlacementOutcome, PlacementQuestion, PlacementResult, ReadingPassage, ReadingRequest, TutorContext};
use crate::protocol::{LessonActionOut, LessonOut};
use crate::rewards::{
  apply_completion, grant_custom_reward, record_placement, record_reading_session, set_assessment, skip_placement,
  toggle_assignment,
};
use crate::seeds::{
  fallback_placement_outcome, fallback_placement_test, fallback_reading_analysis, fallback_reading_passage,
  FALLBACK_TUTOR_REPLY,
};
use crate::shop::{purchase_or_toggle, ShopError, ShopOutcome};
use crate::state::AppState;
use crate::store::StoreError;

/// Reading year used when neither an assessment nor a year level is known.
pub const DEFAULT_READING_YEAR: u32 = 4;
pub const MAX_READING_YEAR: u32 = 13;

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Lesson(#[from] LessonError),
  #[error(transparent)]
  Shop(#[from] ShopError),
  #[error("{kind} not found: {id}")]
  NotFound { kind: &'static str, id: String },
  #[error("invalid credentials")]
  Unauthorized,
  #[error("{0}")]
  BadRequest(String),
}

async fn require_student(state: &AppState, id: &str) -> Result<Student, ServiceError> {
  state.store.student(id).await.ok_or_else(|| ServiceError::NotFound { kind: "student", id: id.to_string() })
}

async fn require_module(state: &AppState, id: &str) -> Result<LearningModule, ServiceError> {
  state.store.module(id).await.ok_or_else(|| ServiceError::NotFound { kind: "module", id: id.to_string() })
}

// --- Students ---

/// Log in by class code. The rules engine runs so the streak counts today.
#[instrument(level = "info", skip_all)]
pub async fn login_student(state: &AppState, code: &str) -> Result<Student, ServiceError> {
  let student = state.store.authenticate_student(code).await.ok_or(ServiceError::Unauthorized)?;
  let student = state.store.update_student(student).await?;
  info!(target: "spellquest_backend", student_id = %student.id, streak = student.current_streak, "Student logged in");
  Ok(student)
}

#[instrument(level = "info", skip(state))]
pub async fn assign_module_to_student(state: &AppState, student_id: &str, module_id: &str) -> Result<(bool, Student), ServiceError> {
  require_module(state, module_id).await?;
  let mut student = require_student(state, student_id).await?;
  let assigned = toggle_assignment(&mut student, module_id);
  let student = state.store.update_student(student).await?;
  Ok((assigned, student))
}

#[instrument(level = "info", skip(state, focus_areas))]
pub async fn assess_student(
  state: &AppState,
  student_id: &str,
  reading_level: u32,
  focus_areas: Vec<String>,
) -> Result<Student, ServiceError> {
  if !(1..=MAX_READING_YEAR).contains(&reading_level) {
    return Err(ServiceError::BadRequest(format!("reading level must be 1-{MAX_READING_YEAR}")));
  }
  let mut student = require_student(state, student_id).await?;
  set_assessment(&mut student, reading_level, focus_areas);
  let student = state.store.update_student(student).await?;
  info!(target: "rewards", %student_id, suggestions = student.suggested_module_ids.len(), "Assessment saved");
  Ok(student)
}

/// Teacher gift shown on the student's dashboard.
#[instrument(level = "info", skip(state, reward), fields(reward_len = reward.len()))]
pub async fn give_custom_reward(state: &AppState, student_id: &str, reward: &str) -> Result<Student, ServiceError> {
  let mut student = require_student(state, student_id).await?;
  if !grant_custom_reward(&mut student, reward) {
    return Err(ServiceError::BadRequest("reward text is empty".into()));
  }
  let student = state.store.update_student(student).await?;
  info!(target: "rewards", %student_id, rewards = student.custom_rewards.len(), "Custom reward granted");
  Ok(student)
}

// --- Lessons ---

/// Load (or resume) a lesson and register it as in flight.
#[instrument(level = "info", skip(state))]
pub async fn start_lesson(state: &AppState, student_id: &str, module_id: &str) -> Result<LessonOut, ServiceError> {
  let student = require_student(state, student_id).await?;
  let module = require_module(state, module_id).await?;
  let progress = student.progress.get(module_id);

  let resumed = progress
    .filter(|p| !p.completed)
    .and_then(|p| p.resume_state.as_ref())
    .is_some_and(|s| s.phase.is_resumable());
  let session = LessonSession::load(&state.openai, module, progress).await;
  let out = LessonOut { module_id: module_id.to_string(), resumed, state: session.state().clone() };

  // Fresh content is checkpointed at INTRO. A retry of a completed module
  // keeps no snapshot.
  let retry = progress.is_some_and(|p| p.completed);
  if !resumed && !retry && session.phase().is_resumable() {
    state.store.save_progress_state(student_id, module_id, session.state().clone()).await?;
  }
  state.insert_session(student_id, module_id, session).await;
  Ok(out)
}

/// Apply one action to an in-flight lesson and persist what it produced.
#[instrument(level = "info", skip(state, action), fields(action = action.name()))]
pub async fn lesson_action(
  state: &AppState,
  student_id: &str,
  module_id: &str,
  action: LessonAction,
) -> Result<LessonActionOut, ServiceError> {
  let shared = state
    .session(student_id, module_id)
    .await
    .ok_or_else(|| ServiceError::NotFound { kind: "lesson session", id: format!("{student_id}:{module_id}") })?;
  let mut session = shared.lock().await;
  let step = session.handle(&state.openai, action).await?;

  let mut updated = None;
  match &step.event {
    LessonEvent::Completed(report) => {
      let mut student = require_student(state, student_id).await?;
      apply_completion(&mut student, report);
      let student = state.store.update_student(student).await?;
      info!(target: "rewards", %student_id, %module_id, pct = report.final_percentage, xp = report.reward.xp, stars = report.reward.stars, "Lesson completed");
      updated = Some(student);
      state.remove_session(student_id, module_id).await;
    }
    LessonEvent::Exited => {
      if let Some(snapshot) = &step.checkpoint {
        state.store.save_progress_state(student_id, module_id, snapshot.clone()).await?;
      }
      state.remove_session(student_id, module_id).await;
    }
    _ => {
      if let Some(snapshot) = &step.checkpoint {
        state.store.save_progress_state(student_id, module_id, snapshot.clone()).await?;
      }
    }
  }

  Ok(LessonActionOut { event: step.event, phase: session.phase(), sub_index: session.state().sub_index, student: updated })
}

// --- Shop ---

#[instrument(level = "info", skip(state))]
pub async fn shop_purchase(state: &AppState, student_id: &str, item_id: &str) -> Result<(ShopOutcome, Student), ServiceError> {
  let mut student = require_student(state, student_id).await?;
  let outcome = purchase_or_toggle(&mut student, &state.shop, item_id)?;
  let student = state.store.update_student(student).await?;
  info!(target: "rewards", %student_id, %item_id, ?outcome, stars = student.stars, "Shop action");
  Ok((outcome, student))
}

// --- Placement ---

#[instrument(level = "info", skip(state))]
pub async fn placement_test(state: &AppState) -> Vec<PlacementQuestion> {
  match state.openai.generate_placement_test().await {
    Ok(questions) => questions,
    Err(e) => {
      warn!(target: "oracle", error = %e, "Placement test generation failed; using fallback test");
      fallback_placement_test()
    }
  }
}

#[instrument(level = "info", skip(state, results), fields(results = results.len()))]
pub async fn submit_placement(
  state: &AppState,
  student_id: &str,
  results: &[PlacementResult],
) -> Result<(PlacementOutcome, Student), ServiceError> {
  if results.is_empty() {
    return Err(ServiceError::BadRequest("no placement answers submitted".into()));
  }
  let mut student = require_student(state, student_id).await?;
  let outcome = match state.openai.analyze_placement(results).await {
    Ok(outcome) => outcome,
    Err(e) => {
      warn!(target: "oracle", error = %e, "Placement analysis failed; using fallback outcome");
      fallback_placement_outcome()
    }
  };
  record_placement(&mut student, &outcome);
  let student = state.store.update_student(student).await?;
  info!(target: "rewards", %student_id, level = outcome.level, "Placement recorded");
  Ok((outcome, student))
}

/// Opt out of the placement test. A completed test is left as it is.
#[instrument(level = "info", skip(state))]
pub async fn skip_placement_test(state: &AppState, student_id: &str) -> Result<Student, ServiceError> {
  let mut student = require_student(state, student_id).await?;
  if !skip_placement(&mut student) {
    return Ok(student);
  }
  let student = state.store.update_student(student).await?;
  info!(target: "rewards", %student_id, "Placement test skipped");
  Ok(student)
}

// --- Reading room ---

fn passage_year(student: Option<&Student>) -> u32 {
  student
    .and_then(|s| s.teacher_assessment.as_ref().map(|a| a.reading_level).or(s.year_level))
    .unwrap_or(DEFAULT_READING_YEAR)
}

/// An explicit level wins, then the student's assessment or year.
#[instrument(level = "info", skip(state))]
pub async fn reading_passage(
  state: &AppState,
  student_id: Option<&str>,
  level: Option<u32>,
  theme: Option<&str>,
) -> ReadingPassage {
  let student = match student_id {
    Some(id) => state.store.student(id).await,
    None => None,
  };
  let year = level.unwrap_or_else(|| passage_year(student.as_ref())).clamp(1, MAX_READING_YEAR);
  match state.openai.generate_reading_passage(year, theme.unwrap_or("general")).await {
    Ok(p) => p,
    Err(e) => {
      warn!(target: "oracle", error = %e, "Passage generation failed; using fallback passage");
      fallback_reading_passage()
    }
  }
}

#[instrument(level = "info", skip(state, audio_base64, target_text), fields(audio_len = audio_base64.len()))]
pub async fn analyze_reading(
  state: &AppState,
  student_id: &str,
  audio_base64: &str,
  mime: &str,
  target_text: Option<String>,
) -> Result<(ReadingSession, Student), ServiceError> {
  if audio_base64.trim().is_empty() {
    return Err(ServiceError::BadRequest("audio is required".into()));
  }
  let mut student = require_student(state, student_id).await?;
  let year_level = student.year_level.unwrap_or(DEFAULT_READING_YEAR);
  let request = ReadingRequest { audio_base64, mime, year_level, target_text: target_text.as_deref() };
  let analysis = match state.openai.analyze_reading(&request).await {
    Ok(a) => a,
    Err(e) => {
      warn!(target: "oracle", error = %e, "Reading analysis failed; using fallback analysis");
      fallback_reading_analysis(year_level)
    }
  };
  let session = record_reading_session(&mut student, analysis, target_text, Utc::now());
  let student = state.store.update_student(student).await?;
  info!(target: "rewards", %student_id, session_id = %session.id, level = %session.assessed_level, "Reading session recorded");
  Ok((session, student))
}

// --- Tutor ---

/// Answer a help request. An in-flight lesson gives the richest context; a
/// bare module id still gives the rule.
#[instrument(level = "info", skip(state, query), fields(query_len = query.len()))]
pub async fn ask_tutor(state: &AppState, student_id: &str, module_id: Option<&str>, query: &str) -> Result<String, ServiceError> {
  if query.trim().is_empty() {
    return Err(ServiceError::BadRequest("question is empty".into()));
  }
  let context = match module_id {
    Some(module_id) => match state.session(student_id, module_id).await {
      Some(shared) => shared.lock().await.tutor_context(),
      None => {
        let module = require_module(state, module_id).await?;
        TutorContext { module_title: module.title, rule: module.rule_explanation, ..Default::default() }
      }
    },
    None => TutorContext { module_title: "General spelling".into(), ..Default::default() },
  };

  match state.openai.ask_tutor(query, &context).await {
    Ok(reply) => Ok(reply),
    Err(e) => {
      warn!(target: "oracle", error = %e, "Tutor call failed; using fallback reply");
      Ok(FALLBACK_TUTOR_REPLY.to_string())
    }
  }
}

// --- Teachers and classes ---

#[instrument(level = "info", skip_all)]
pub async fn register_teacher(
  state: &AppState,
  name: &str,
  email: &str,
  password: &str,
  class_name: &str,
) -> Result<(Teacher, Vec<ClassGroup>), ServiceError> {
  let teacher = state.store.register_teacher(name, email, password, class_name).await?;
  let classes = state.store.classes(Some(&teacher.id)).await;
  info!(target: "spellquest_backend", teacher_id = %teacher.id, "Teacher registered");
  Ok((teacher, classes))
}

#[instrument(level = "info", skip_all)]
pub async fn login_teacher(state: &AppState, email: &str, password: &str) -> Result<(Teacher, Vec<ClassGroup>), ServiceError> {
  let teacher = state.store.login_teacher(email, password).await.ok_or(ServiceError::Unauthorized)?;
  let classes = state.store.classes(Some(&teacher.id)).await;
  Ok((teacher, classes))
}

/// Rename or re-avatar a teacher. Email and password stay as registered.
#[instrument(level = "info", skip(state, name, avatar))]
pub async fn update_teacher_profile(
  state: &AppState,
  teacher_id: &str,
  name: Option<String>,
  avatar: Option<String>,
) -> Result<Teacher, ServiceError> {
  let mut teacher = state
    .store
    .teachers()
    .await
    .into_iter()
    .find(|t| t.id == teacher_id)
    .ok_or_else(|| ServiceError::NotFound { kind: "teacher", id: teacher_id.to_string() })?;
  if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
    teacher.name = name.trim().to_string();
  }
  if avatar.is_some() {
    teacher.avatar = avatar;
  }
  state.store.update_teacher(teacher.clone()).await?;
  Ok(teacher)
}

#[instrument(level = "info", skip(state, name, avatar))]
pub async fn update_class_details(
  state: &AppState,
  class_id: &str,
  name: Option<String>,
  avatar: Option<String>,
) -> Result<ClassGroup, ServiceError> {
  let mut class = state
    .store
    .classes(None)
    .await
    .into_iter()
    .find(|c| c.id == class_id)
    .ok_or_else(|| ServiceError::NotFound { kind: "class", id: class_id.to_string() })?;
  if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
    class.name = name.trim().to_string();
  }
  if avatar.is_some() {
    class.avatar = avatar;
  }
  state.store.update_class(class.clone()).await?;
  Ok(class)
}

#[instrument(level = "info", skip(state))]
pub async fn add_student_to_class(state: &AppState, class_id: &str, name: &str) -> Result<Student, ServiceError> {
  let student = state.store.create_student(name, class_id).await?;
  info!(target: "spellquest_backend", %class_id, student_id = %student.id, "Student enrolled");
  Ok(student)
}

#[instrument(level = "info", skip(state))]
pub async fn assign_module_to_class(state: &AppState, class_id: &str, module_id: &str, assign: bool) -> Result<usize, ServiceError> {
  require_module(state, module_id).await?;
  Ok(state.store.bulk_assign_module(class_id, module_id, assign).await?)
}

#[instrument(level = "info", skip(state, words), fields(words = words.len()))]
pub async fn create_custom_module(
  state: &AppState,
  teacher_id: &str,
  title: &str,
  words: &[String],
) -> Result<LearningModule, ServiceError> {
  if !state.store.teachers().await.iter().any(|t| t.id == teacher_id) {
    return Err(ServiceError::NotFound { kind: "teacher", id: teacher_id.to_string() });
  }
  Ok(state.store.create_custom_module(teacher_id, title, words).await?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Feedback, LessonPhase, ModuleProgress, PlacementStatus};
  use crate::openai::OpenAI;
  use crate::store::Store;

  async fn state() -> (AppState, std::path::PathBuf) {
    let dir = std::env::temp_dir().join(format!("sq_logic_{}", uuid::Uuid::new_v4().simple()));
    let store = Store::open(&dir, "v23", Vec::new()).await.unwrap();
    (AppState::with_parts(store, None::<OpenAI>), dir)
  }

  async fn first_student(state: &AppState) -> Student {
    state.store.students().await.remove(0)
  }

  async fn act(state: &AppState, student_id: &str, module_id: &str, action: LessonAction) -> LessonActionOut {
    lesson_action(state, student_id, module_id, action).await.unwrap()
  }

  #[tokio::test]
  async fn offline_lesson_runs_to_completion_and_credits_rewards() {
    let (state, dir) = state().await;
    let student = first_student(&state).await;
    let module_id = state.store.all_modules().await[0].id.clone();

    let out = start_lesson(&state, &student.id, &module_id).await.unwrap();
    assert_eq!(out.state.phase, LessonPhase::Intro);
    assert!(!out.resumed);

    let content = out.state.content.clone();
    let (sid, mid) = (student.id.as_str(), module_id.as_str());
    act(&state, sid, mid, LessonAction::Begin).await;
    for item in &content.practice {
      act(&state, sid, mid, LessonAction::SubmitAnswer { answer: item.correct_answer.clone() }).await;
      act(&state, sid, mid, LessonAction::Next).await;
    }
    act(&state, sid, mid, LessonAction::SubmitAnswer { answer: "the rule explained".into() }).await;
    act(&state, sid, mid, LessonAction::Next).await;
    for item in &content.quiz {
      act(&state, sid, mid, LessonAction::SubmitAnswer { answer: item.correct_answer.clone() }).await;
      act(&state, sid, mid, LessonAction::Next).await;
    }
    act(&state, sid, mid, LessonAction::Rate { confidence: 4 }).await;
    act(&state, sid, mid, LessonAction::Next).await;
    let done = act(&state, sid, mid, LessonAction::Finish).await;

    let updated = done.student.unwrap();
    let progress = &updated.progress[&module_id];
    assert!(progress.completed);
    assert_eq!(progress.score, 100);
    assert!(progress.resume_state.is_none());
    assert!(updated.xp >= student.xp + 150);
    assert!(state.session(&student.id, &module_id).await.is_none());
    let _ = std::fs::remove_dir_all(dir);
  }

  #[tokio::test]
  async fn exit_saves_a_resumable_snapshot() {
    let (state, dir) = state().await;
    let student = first_student(&state).await;
    let module_id = state.store.all_modules().await[1].id.clone();

    start_lesson(&state, &student.id, &module_id).await.unwrap();
    act(&state, &student.id, &module_id, LessonAction::Begin).await;
    let exited = act(&state, &student.id, &module_id, LessonAction::Exit).await;
    assert_eq!(exited.event, LessonEvent::Exited);

    let again = start_lesson(&state, &student.id, &module_id).await.unwrap();
    assert!(again.resumed);
    assert_eq!(again.state.phase, LessonPhase::Practice);
    let _ = std::fs::remove_dir_all(dir);
  }

  #[tokio::test]
  async fn retrying_a_completed_module_keeps_no_snapshot() {
    let (state, dir) = state().await;
    let mut student = first_student(&state).await;
    let module_id = state.store.all_modules().await[1].id.clone();
    student
      .progress
      .insert(module_id.clone(), ModuleProgress { completed: true, score: 80, attempts: 1, ..Default::default() });
    state.store.update_student(student.clone()).await.unwrap();

    let out = start_lesson(&state, &student.id, &module_id).await.unwrap();
    assert!(!out.resumed);
    act(&state, &student.id, &module_id, LessonAction::Begin).await;
    act(&state, &student.id, &module_id, LessonAction::Exit).await;

    let stored = state.store.student(&student.id).await.unwrap();
    let progress = &stored.progress[&module_id];
    assert!(progress.completed);
    assert_eq!(progress.score, 80);
    assert!(progress.resume_state.is_none());

    let again = start_lesson(&state, &student.id, &module_id).await.unwrap();
    assert!(!again.resumed);
    assert_eq!(again.state.phase, LessonPhase::Intro);
    let _ = std::fs::remove_dir_all(dir);
  }

  #[tokio::test]
  async fn mid_test_exit_resumes_exactly_after_reopen() {
    let (state, dir) = state().await;
    let student = first_student(&state).await;
    let module_id = state.store.all_modules().await[0].id.clone();
    let (sid, mid) = (student.id.as_str(), module_id.as_str());

    let content = start_lesson(&state, sid, mid).await.unwrap().state.content;
    assert!(content.quiz.len() >= 3);
    act(&state, sid, mid, LessonAction::Begin).await;
    for item in &content.practice {
      act(&state, sid, mid, LessonAction::SubmitAnswer { answer: item.correct_answer.clone() }).await;
      act(&state, sid, mid, LessonAction::Next).await;
    }
    act(&state, sid, mid, LessonAction::SubmitAnswer { answer: "consonant vowel consonant".into() }).await;
    act(&state, sid, mid, LessonAction::Next).await;

    act(&state, sid, mid, LessonAction::SubmitAnswer { answer: content.quiz[0].correct_answer.clone() }).await;
    act(&state, sid, mid, LessonAction::Next).await;
    act(&state, sid, mid, LessonAction::SubmitAnswer { answer: "zzzz".into() }).await;
    act(&state, sid, mid, LessonAction::SubmitAnswer { answer: "qqqq".into() }).await;
    act(&state, sid, mid, LessonAction::Next).await;
    act(&state, sid, mid, LessonAction::SubmitAnswer { answer: "zzzz".into() }).await;

    let snapshot = state.session(sid, mid).await.unwrap().lock().await.state().clone();
    assert_eq!(snapshot.phase, LessonPhase::Test);
    assert_eq!(snapshot.sub_index, 2);
    assert_eq!(snapshot.test_score, 1);
    assert_eq!(snapshot.mistakes.len(), 1);
    assert_eq!(snapshot.mistakes[0].attempt, "qqqq");
    assert_eq!(snapshot.feedback, Some(Feedback::Hint));
    assert_eq!(snapshot.user_answer, "zzzz");
    assert_eq!(snapshot.attempts_for_current, 1);
    act(&state, sid, mid, LessonAction::Exit).await;
    drop(state);

    let reopened = AppState::with_parts(Store::open(&dir, "v23", Vec::new()).await.unwrap(), None::<OpenAI>);
    let resumed = start_lesson(&reopened, sid, mid).await.unwrap();
    assert!(resumed.resumed);
    assert_eq!(resumed.state, snapshot);

    // The restored hint still allows the second attempt.
    let out = act(&reopened, sid, mid, LessonAction::SubmitAnswer { answer: content.quiz[2].correct_answer.clone() }).await;
    assert!(matches!(out.event, LessonEvent::Answered { feedback: Feedback::Correct, .. }));
    let _ = std::fs::remove_dir_all(dir);
  }

  #[tokio::test]
  async fn custom_rewards_and_placement_skip() {
    let (state, dir) = state().await;
    let student = first_student(&state).await;

    let updated = give_custom_reward(&state, &student.id, "  Free Time ").await.unwrap();
    assert_eq!(updated.custom_rewards.first().map(String::as_str), Some("Free Time"));
    assert!(matches!(give_custom_reward(&state, &student.id, " ").await, Err(ServiceError::BadRequest(_))));
    assert!(matches!(give_custom_reward(&state, "ghost", "Sticker").await, Err(ServiceError::NotFound { .. })));

    let skipped = skip_placement_test(&state, &student.id).await.unwrap();
    assert_eq!(skipped.placement_test_status, PlacementStatus::Skipped);
    let _ = std::fs::remove_dir_all(dir);
  }

  #[tokio::test]
  async fn actions_without_a_session_are_not_found() {
    let (state, dir) = state().await;
    let err = lesson_action(&state, "nobody", "nothing", LessonAction::Next).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { kind: "lesson session", .. }));
    let _ = std::fs::remove_dir_all(dir);
  }

  #[tokio::test]
  async fn offline_placement_and_tutor_use_fallbacks() {
    let (state, dir) = state().await;
    let student = first_student(&state).await;

    let questions = placement_test(&state).await;
    assert!(!questions.is_empty());
    let results: Vec<PlacementResult> =
      questions.into_iter().map(|question| PlacementResult { question, is_correct: true }).collect();
    let (outcome, updated) = submit_placement(&state, &student.id, &results).await.unwrap();
    assert_eq!(updated.placement_test_status, PlacementStatus::Completed);
    assert_eq!(updated.placement_level, Some(outcome.level));

    let reply = ask_tutor(&state, &student.id, None, "help?").await.unwrap();
    assert_eq!(reply, FALLBACK_TUTOR_REPLY);
    assert!(matches!(ask_tutor(&state, &student.id, None, "  ").await, Err(ServiceError::BadRequest(_))));
    let _ = std::fs::remove_dir_all(dir);
  }

  #[tokio::test]
  async fn offline_reading_is_logged_and_rewarded() {
    let (state, dir) = state().await;
    let student = first_student(&state).await;
    let (session, updated) = analyze_reading(&state, &student.id, "AAAA", "audio/webm", Some("The kiwi".into()))
      .await
      .unwrap();
    assert_eq!(updated.reading_log[0].id, session.id);
    assert_eq!(updated.stars, student.stars + 1);
    let _ = std::fs::remove_dir_all(dir);
  }

  #[tokio::test]
  async fn assessment_level_is_bounded() {
    let (state, dir) = state().await;
    let student = first_student(&state).await;
    let err = assess_student(&state, &student.id, 0, vec![]).await.unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(_)));
    let ok = assess_student(&state, &student.id, 3, vec!["vowels".into()]).await.unwrap();
    assert_eq!(ok.teacher_assessment.unwrap().reading_level, 3);
    let _ = std::fs::remove_dir_all(dir);
  }
}
