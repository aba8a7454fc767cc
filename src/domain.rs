//! Domain models: students, teachers, classes, curriculum modules, lesson content
//! and the resumable lesson snapshot.
//!
//! Every record serializes as camelCase JSON so the stored blobs keep the same
//! shape across schema versions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visual theme of a curriculum module.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModuleTheme {
  #[default]
  Forest,
  Ocean,
  Volcano,
  Desert,
  Space,
}

/// How an activity item is answered.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
  /// Student types the word.
  #[default]
  BuildWord,
  /// Student picks the correct option.
  Matching,
  Sorting,
  /// Student rewrites a sentence correctly.
  FixSentence,
}

impl ActivityType {
  /// Multiple-choice kinds need at least one distractor to be presentable.
  pub fn is_choice(self) -> bool {
    matches!(self, ActivityType::Matching | ActivityType::Sorting)
  }

  pub fn parse(tag: &str) -> Option<Self> {
    match tag.trim().to_ascii_uppercase().as_str() {
      "BUILD_WORD" => Some(ActivityType::BuildWord),
      "MATCHING" => Some(ActivityType::Matching),
      "SORTING" => Some(ActivityType::Sorting),
      "FIX_SENTENCE" => Some(ActivityType::FixSentence),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
  pub id: String,
  pub title: String,
  pub icon: String,
  pub description: String,
  #[serde(default)] pub unlocked_at: Option<i64>,
}

/// Avatar slot a cosmetic item occupies.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShopSlot {
  Hat,
  Glasses,
  Background,
  Accessory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub slot: ShopSlot,
  pub icon: String,
  pub cost: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
  pub id: String,
  pub name: String,
  pub email: String,
  /// Compared verbatim on login.
  pub password: String,
  #[serde(default)] pub avatar: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
  pub id: String,
  pub teacher_id: String,
  pub name: String,
  #[serde(default)] pub student_ids: Vec<String>,
  #[serde(default)] pub avatar: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Equipped {
  #[serde(default, skip_serializing_if = "Option::is_none")] pub hat: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub glasses: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub background: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub accessory: Option<String>,
}

impl Equipped {
  pub fn slot_mut(&mut self, slot: ShopSlot) -> &mut Option<String> {
    match slot {
      ShopSlot::Hat => &mut self.hat,
      ShopSlot::Glasses => &mut self.glasses,
      ShopSlot::Background => &mut self.background,
      ShopSlot::Accessory => &mut self.accessory,
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementStatus {
  #[default]
  NotStarted,
  Completed,
  Skipped,
}

/// Teacher judgement of a student: reading year level plus focus-area tags.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAssessment {
  pub reading_level: u32,
  #[serde(default)] pub focus_areas: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DifficultWord {
  pub word: String,
  #[serde(default)] pub meaning: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MisreadWord {
  pub word: String,
  #[serde(default)] pub heard: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
  pub id: String,
  pub date: DateTime<Utc>,
  pub transcript: String,
  #[serde(default)] pub target_text: Option<String>,
  #[serde(default)] pub difficult_words: Vec<DifficultWord>,
  #[serde(default)] pub misread_words: Vec<MisreadWord>,
  pub feedback: String,
  pub assessed_level: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
  pub id: String,
  /// Class-issued code the student logs in with.
  pub login_code: String,
  pub name: String,
  pub avatar: String,
  #[serde(default)] pub year_level: Option<u32>,

  pub xp: u32,
  /// Derived from `xp` by the rules engine; never set by callers.
  pub level: u32,
  pub current_streak: u32,
  pub last_active_date: DateTime<Utc>,
  pub stars: u32,

  #[serde(default)] pub progress: BTreeMap<String, ModuleProgress>,
  #[serde(default)] pub achievements: Vec<Achievement>,
  #[serde(default)] pub assigned_module_ids: Vec<String>,
  #[serde(default)] pub suggested_module_ids: Vec<String>,
  #[serde(default)] pub custom_rewards: Vec<String>,

  #[serde(default)] pub placement_test_status: PlacementStatus,
  #[serde(default)] pub placement_level: Option<u32>,
  #[serde(default)] pub placement_analysis: Option<String>,
  #[serde(default)] pub teacher_assessment: Option<TeacherAssessment>,
  #[serde(default)] pub reading_log: Vec<ReadingSession>,

  #[serde(default)] pub inventory: Vec<String>,
  #[serde(default)] pub equipped: Equipped,
}

impl Student {
  /// Fresh enrolment: no progress, never active.
  pub fn new(id: impl Into<String>, login_code: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      login_code: login_code.into(),
      name: name.into(),
      avatar: "🐣".into(),
      year_level: None,
      xp: 0,
      level: 1,
      current_streak: 0,
      last_active_date: DateTime::<Utc>::default(),
      stars: 0,
      progress: BTreeMap::new(),
      achievements: Vec::new(),
      assigned_module_ids: Vec::new(),
      suggested_module_ids: Vec::new(),
      custom_rewards: Vec::new(),
      placement_test_status: PlacementStatus::NotStarted,
      placement_level: None,
      placement_analysis: None,
      teacher_assessment: None,
      reading_log: Vec::new(),
      inventory: Vec::new(),
      equipped: Equipped::default(),
    }
  }

  pub fn completed_module_count(&self) -> usize {
    self.progress.values().filter(|p| p.completed).count()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
  pub completed: bool,
  /// Best quiz percentage (0-100); only ever raised.
  pub score: u32,
  pub attempts: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub confidence: Option<u8>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub performance_analysis: Option<String>,
  /// Present only while `completed` is false.
  #[serde(default, skip_serializing_if = "Option::is_none")] pub resume_state: Option<LessonPhaseState>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningModule {
  pub id: String,
  pub title: String,
  /// Human-readable band, e.g. "Level 2 (Year 3-4)".
  pub level: String,
  #[serde(default)] pub theme: ModuleTheme,
  pub description: String,
  #[serde(default)] pub rule_explanation: String,
  #[serde(default)] pub is_custom: bool,
  #[serde(default)] pub custom_words: Vec<String>,
  #[serde(default)] pub created_by: Option<String>,
}

impl LearningModule {
  /// Parse the `Year N` or `Year N-M` band out of `level`.
  pub fn year_range(&self) -> Option<(u32, u32)> {
    let idx = self.level.find("Year ")?;
    let rest = &self.level[idx + "Year ".len()..];
    let start_digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let start: u32 = start_digits.parse().ok()?;
    let after = &rest[start_digits.len()..];
    let end = after
      .strip_prefix('-')
      .map(|tail| tail.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
      .and_then(|digits| digits.parse::<u32>().ok())
      .unwrap_or(start);
    Some((start, end))
  }

  pub fn uses_custom_words(&self) -> bool {
    self.is_custom && !self.custom_words.is_empty()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct WorkedExample {
  pub word: String,
  pub sentence: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct LessonIntro {
  pub title: String,
  pub explanation: String,
  #[serde(default)] pub examples: Vec<WorkedExample>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConceptCheck {
  pub question: String,
  pub grading_guidance: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: ActivityType,
  pub prompt: String,
  pub correct_answer: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")] pub options: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")] pub distractors: Vec<String>,
  /// Shown after the final miss.
  pub explanation: String,
  /// Shown after the first miss.
  pub hint: String,
}

/// Generated once per attempt and reused verbatim on resume.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
  pub intro: LessonIntro,
  pub practice: Vec<ActivityItem>,
  pub concept_check: ConceptCheck,
  pub quiz: Vec<ActivityItem>,
  pub conclusion: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonPhase {
  Loading,
  Intro,
  Practice,
  Concept,
  Test,
  Rating,
  Summary,
  Error,
}

impl LessonPhase {
  /// Phases whose state is worth persisting on exit.
  pub fn is_resumable(self) -> bool {
    matches!(
      self,
      LessonPhase::Intro | LessonPhase::Practice | LessonPhase::Concept | LessonPhase::Test | LessonPhase::Rating
    )
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
  Correct,
  Incorrect,
  Hint,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MistakeRecord {
  pub question: String,
  pub attempt: String,
  pub correct: String,
}

/// Score and comment for a free-text answer (score 1-5).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Grade {
  pub score: u8,
  pub feedback: String,
}

/// Snapshot of an in-progress lesson, stored as `ModuleProgress::resume_state`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonPhaseState {
  pub phase: LessonPhase,
  pub sub_index: usize,
  pub test_score: u32,
  pub content: LessonContent,
  #[serde(default)] pub mistakes: Vec<MistakeRecord>,

  #[serde(default)] pub user_answer: String,
  #[serde(default)] pub feedback: Option<Feedback>,
  #[serde(default)] pub feedback_title: String,
  #[serde(default)] pub attempts_for_current: u32,

  #[serde(default)] pub concept_attempts: u32,
  #[serde(default)] pub concept_result: Option<Grade>,
  #[serde(default)] pub confidence: Option<u8>,
}

impl LessonPhaseState {
  pub fn new(phase: LessonPhase, content: LessonContent) -> Self {
    Self {
      phase,
      sub_index: 0,
      test_score: 0,
      content,
      mistakes: Vec::new(),
      user_answer: String::new(),
      feedback: None,
      feedback_title: String::new(),
      attempts_for_current: 0,
      concept_attempts: 0,
      concept_result: None,
      confidence: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn module_with_level(level: &str) -> LearningModule {
    LearningModule {
      id: "m".into(),
      title: "t".into(),
      level: level.into(),
      theme: ModuleTheme::Forest,
      description: String::new(),
      rule_explanation: String::new(),
      is_custom: false,
      custom_words: vec![],
      created_by: None,
    }
  }

  #[test]
  fn year_range_parses_single_and_span() {
    assert_eq!(module_with_level("Level 1 (Year 0-1)").year_range(), Some((0, 1)));
    assert_eq!(module_with_level("NCEA Level 2 (Year 12)").year_range(), Some((12, 12)));
    assert_eq!(module_with_level("Custom").year_range(), None);
  }

  #[test]
  fn student_json_uses_stored_field_names() {
    let s = Student::new("s9", "KEA-101", "Aroha");
    let v = serde_json::to_value(&s).unwrap();
    assert_eq!(v["loginCode"], "KEA-101");
    assert_eq!(v["placementTestStatus"], "NOT_STARTED");
    assert!(v.get("lastActiveDate").is_some());
  }

  #[test]
  fn activity_item_reads_type_tag() {
    let raw = r#"{"id":"q1","type":"FIX_SENTENCE","prompt":"The sunn is hot.","correctAnswer":"sun","explanation":"","hint":""}"#;
    let item: ActivityItem = serde_json::from_str(raw).unwrap();
    assert_eq!(item.kind, ActivityType::FixSentence);
    assert!(item.distractors.is_empty());
  }
}
