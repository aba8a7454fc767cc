//! Progress and rewards rules.
//!
//! `derive_student_state` runs on every student write. Its steps are
//! order-dependent: suggestions, achievements, level, streak, activity stamp.
//! Everything here is pure; the clock is passed in.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::debug;

use crate::domain::{
  Achievement, LearningModule, ModuleProgress, PlacementStatus, ReadingSession, Student, TeacherAssessment,
};
use crate::oracle::{PlacementOutcome, ReadingAnalysis};

pub const XP_PER_LEVEL: u32 = 500;

pub const COMPLETION_XP: u32 = 100;
pub const COMPLETION_STARS: u32 = 20;
pub const PERFECT_XP: u32 = 50;
pub const PERFECT_STARS: u32 = 10;
pub const CONCEPT_XP_PER_POINT: u32 = 10;

pub const READING_XP: u32 = 20;
pub const READING_STARS: u32 = 1;

/// (every N days, bonus xp, bonus stars). Checked independently.
pub const STREAK_BONUSES: [(u32, u32, u32); 2] = [(7, 50, 5), (30, 200, 20)];

const SUGGEST_YEAR_MATCH: u32 = 5;
const SUGGEST_FOCUS_MATCH: u32 = 10;
const SUGGEST_THRESHOLD: u32 = 5;

struct AchievementRule {
  id: &'static str,
  title: &'static str,
  icon: &'static str,
  description: &'static str,
  unlocked: fn(&Student) -> bool,
}

const ACHIEVEMENTS: &[AchievementRule] = &[
  AchievementRule { id: "first_step", title: "First Step", icon: "👣", description: "Completed your first adventure!", unlocked: |s| s.completed_module_count() >= 1 },
  AchievementRule { id: "master_explorer", title: "Master Explorer", icon: "🗺️", description: "Completed 3 adventures!", unlocked: |s| s.completed_module_count() >= 3 },
  AchievementRule { id: "pro_speller", title: "Pro Speller", icon: "📚", description: "Completed 5 adventures!", unlocked: |s| s.completed_module_count() >= 5 },
  AchievementRule { id: "champion", title: "Champion", icon: "🏆", description: "Completed 10 adventures!", unlocked: |s| s.completed_module_count() >= 10 },
  AchievementRule { id: "novice", title: "Rising Star", icon: "🌟", description: "Earned 500 XP!", unlocked: |s| s.xp >= 500 },
  AchievementRule { id: "legend", title: "Spelling Legend", icon: "👑", description: "Earned 1000 XP!", unlocked: |s| s.xp >= 1000 },
  AchievementRule { id: "grandmaster", title: "Grandmaster", icon: "🧙", description: "Earned 2000 XP!", unlocked: |s| s.xp >= 2000 },
  AchievementRule { id: "on_fire", title: "On Fire", icon: "🔥", description: "3 Day Streak!", unlocked: |s| s.current_streak >= 3 },
  AchievementRule { id: "unstoppable", title: "Unstoppable", icon: "🚀", description: "7 Day Streak!", unlocked: |s| s.current_streak >= 7 },
];

pub fn level_for_xp(xp: u32) -> u32 {
  xp / XP_PER_LEVEL + 1
}

/// A module fits a year when `start <= year <= end + 1` (one year of revision grace).
pub fn module_fits_year(module: &LearningModule, year: u32) -> bool {
  match module.year_range() {
    Some((start, end)) => year >= start && year <= end + 1,
    None => false,
  }
}

pub fn suggestion_score(module: &LearningModule, assessment: &TeacherAssessment) -> u32 {
  let mut score = 0;
  if module_fits_year(module, assessment.reading_level) {
    score += SUGGEST_YEAR_MATCH;
  }
  let title = module.title.to_lowercase();
  let description = module.description.to_lowercase();
  for focus in &assessment.focus_areas {
    let term = focus.to_lowercase();
    if term.is_empty() {
      continue;
    }
    if title.contains(&term) || description.contains(&term) {
      score += SUGGEST_FOCUS_MATCH;
    }
  }
  score
}

pub fn suggest_modules(assessment: &TeacherAssessment, modules: &[LearningModule]) -> Vec<String> {
  modules
    .iter()
    .filter(|m| suggestion_score(m, assessment) >= SUGGEST_THRESHOLD)
    .map(|m| m.id.clone())
    .collect()
}

/// Unlock any newly earned achievements. Never revokes; ids are stable.
pub fn unlock_achievements(student: &mut Student, now_ms: i64) {
  for rule in ACHIEVEMENTS {
    let owned = student.achievements.iter().any(|a| a.id == rule.id);
    if !owned && (rule.unlocked)(student) {
      debug!(target: "rewards", student = %student.id, achievement = rule.id, "Achievement unlocked");
      student.achievements.push(Achievement {
        id: rule.id.into(),
        title: rule.title.into(),
        icon: rule.icon.into(),
        description: rule.description.into(),
        unlocked_at: Some(now_ms),
      });
    }
  }
}

/// Advance the day streak by comparing calendar dates in `now`'s time zone.
/// Returns true when a streak bonus was paid.
pub fn update_streak<Tz: TimeZone>(student: &mut Student, now: &DateTime<Tz>) -> bool {
  let today = now.date_naive();
  let last = student.last_active_date.with_timezone(&now.timezone()).date_naive();
  if last == today {
    return false;
  }

  let yesterday = today - Duration::days(1);
  if last != yesterday {
    student.current_streak = 1;
    return false;
  }

  student.current_streak += 1;
  let mut paid = false;
  for (every, xp, stars) in STREAK_BONUSES {
    if student.current_streak % every == 0 {
      student.xp += xp;
      student.stars += stars;
      paid = true;
      debug!(target: "rewards", student = %student.id, streak = student.current_streak, xp, stars, "Streak bonus");
    }
  }
  paid
}

/// Recompute every derived field of a student record about to be stored.
pub fn derive_student_state<Tz: TimeZone>(raw: Student, modules: &[LearningModule], now: DateTime<Tz>) -> Student {
  let mut student = raw;

  if let Some(assessment) = &student.teacher_assessment {
    student.suggested_module_ids = suggest_modules(assessment, modules);
  }

  unlock_achievements(&mut student, now.timestamp_millis());

  student.level = level_for_xp(student.xp);

  if update_streak(&mut student, &now) {
    // the bonus may have crossed a level boundary
    student.level = level_for_xp(student.xp);
  }

  student.last_active_date = now.with_timezone(&Utc);
  student
}

/// Currency and XP earned for finishing one lesson.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CompletionReward {
  pub xp: u32,
  pub stars: u32,
}

pub fn completion_reward(final_percentage: u32, concept_score: Option<u8>) -> CompletionReward {
  let mut xp = COMPLETION_XP + concept_score.map(|s| s as u32 * CONCEPT_XP_PER_POINT).unwrap_or(0);
  let mut stars = COMPLETION_STARS;
  if final_percentage == 100 {
    xp += PERFECT_XP;
    stars += PERFECT_STARS;
  }
  CompletionReward { xp, stars }
}

/// Outcome of a finished lesson, as produced by the lesson machine.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
  pub module_id: String,
  pub final_percentage: u32,
  pub confidence: Option<u8>,
  pub analysis: Option<String>,
  pub concept_score: Option<u8>,
  pub reward: CompletionReward,
}

/// Fold a finished lesson into the student: the stored score only rises, the
/// resume snapshot is dropped, and the reward is credited.
pub fn apply_completion(student: &mut Student, report: &CompletionReport) {
  let previous = student.progress.get(&report.module_id).cloned().unwrap_or_default();
  student.progress.insert(
    report.module_id.clone(),
    ModuleProgress {
      completed: true,
      score: previous.score.max(report.final_percentage),
      attempts: previous.attempts + 1,
      confidence: report.confidence,
      performance_analysis: report.analysis.clone(),
      resume_state: None,
    },
  );
  student.xp += report.reward.xp;
  student.stars += report.reward.stars;
}

/// Newest session first; reading earns a small flat reward.
pub fn record_reading_session(
  student: &mut Student,
  analysis: ReadingAnalysis,
  target_text: Option<String>,
  now: DateTime<Utc>,
) -> ReadingSession {
  let session = ReadingSession {
    id: format!("read_{}", now.timestamp_millis()),
    date: now,
    transcript: analysis
      .transcript
      .filter(|t| !t.trim().is_empty())
      .unwrap_or_else(|| "(Audio Analyzed)".to_string()),
    target_text,
    difficult_words: analysis.difficult_words,
    misread_words: analysis.misread_words,
    feedback: analysis.feedback,
    assessed_level: analysis.assessed_level,
  };
  student.reading_log.insert(0, session.clone());
  student.xp += READING_XP;
  student.stars += READING_STARS;
  session
}

pub fn record_placement(student: &mut Student, outcome: &PlacementOutcome) {
  student.placement_test_status = PlacementStatus::Completed;
  student.placement_level = Some(outcome.level);
  student.placement_analysis = Some(outcome.analysis.clone());
}

/// A completed test stays completed. Returns whether the status changed.
pub fn skip_placement(student: &mut Student) -> bool {
  if student.placement_test_status != PlacementStatus::NotStarted {
    return false;
  }
  student.placement_test_status = PlacementStatus::Skipped;
  true
}

/// Teacher gift, newest first. Blank text is ignored.
pub fn grant_custom_reward(student: &mut Student, reward: &str) -> bool {
  let reward = reward.trim();
  if reward.is_empty() {
    return false;
  }
  student.custom_rewards.insert(0, reward.to_string());
  true
}

/// Suggestions follow on the next `derive_student_state`.
pub fn set_assessment(student: &mut Student, reading_level: u32, focus_areas: Vec<String>) {
  let focus_areas = focus_areas
    .into_iter()
    .map(|f| f.trim().to_string())
    .filter(|f| !f.is_empty())
    .collect();
  student.teacher_assessment = Some(TeacherAssessment { reading_level, focus_areas });
}

/// Assign when absent, unassign when present. Returns the new state.
pub fn toggle_assignment(student: &mut Student, module_id: &str) -> bool {
  if let Some(pos) = student.assigned_module_ids.iter().position(|id| id == module_id) {
    student.assigned_module_ids.remove(pos);
    false
  } else {
    student.assigned_module_ids.push(module_id.to_string());
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ModuleTheme;
  use chrono::{FixedOffset, NaiveDate};

  fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
    let tz = FixedOffset::east_opt(12 * 3600).unwrap();
    tz.from_local_datetime(&NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap())
      .unwrap()
  }

  fn module(id: &str, title: &str, level: &str, description: &str) -> LearningModule {
    LearningModule {
      id: id.into(),
      title: title.into(),
      level: level.into(),
      theme: ModuleTheme::Space,
      description: description.into(),
      rule_explanation: String::new(),
      is_custom: false,
      custom_words: vec![],
      created_by: None,
    }
  }

  fn active_on(mut s: Student, when: DateTime<FixedOffset>, streak: u32) -> Student {
    s.last_active_date = when.with_timezone(&Utc);
    s.current_streak = streak;
    s
  }

  #[test]
  fn level_tracks_xp() {
    assert_eq!(level_for_xp(0), 1);
    assert_eq!(level_for_xp(499), 1);
    assert_eq!(level_for_xp(500), 2);
    assert_eq!(level_for_xp(1250), 3);
  }

  #[test]
  fn level_cannot_be_set_directly() {
    let mut s = Student::new("s", "X-1", "n");
    s.xp = 1200;
    s.level = 99;
    let out = derive_student_state(s, &[], at(2025, 3, 1, 9));
    assert_eq!(out.level, 3);
  }

  #[test]
  fn same_day_leaves_streak_alone() {
    let s = active_on(Student::new("s", "X-1", "n"), at(2025, 3, 1, 8), 4);
    let out = derive_student_state(s, &[], at(2025, 3, 1, 20));
    assert_eq!(out.current_streak, 4);
    assert_eq!(out.last_active_date, at(2025, 3, 1, 20).with_timezone(&Utc));
  }

  #[test]
  fn next_day_increments_and_gap_resets() {
    let s = active_on(Student::new("s", "X-1", "n"), at(2025, 3, 1, 23), 2);
    let out = derive_student_state(s, &[], at(2025, 3, 2, 1));
    assert_eq!(out.current_streak, 3);

    let s = active_on(Student::new("s", "X-1", "n"), at(2025, 3, 1, 12), 9);
    let out = derive_student_state(s, &[], at(2025, 3, 3, 12));
    assert_eq!(out.current_streak, 1);
  }

  #[test]
  fn calendar_day_is_taken_in_local_zone() {
    // 23:30 and 00:30 local are different days even though only an hour apart.
    let tz = FixedOffset::east_opt(12 * 3600).unwrap();
    let late = tz.with_ymd_and_hms(2025, 3, 1, 23, 30, 0).unwrap();
    let early = tz.with_ymd_and_hms(2025, 3, 2, 0, 30, 0).unwrap();
    let mut s = active_on(Student::new("s", "X-1", "n"), late, 1);
    update_streak(&mut s, &early);
    assert_eq!(s.current_streak, 2);
  }

  #[test]
  fn weekly_and_monthly_bonuses_are_checked_independently() {
    let mut s = active_on(Student::new("s", "X-1", "n"), at(2025, 3, 1, 9), 6);
    assert!(update_streak(&mut s, &at(2025, 3, 2, 9)));
    assert_eq!((s.current_streak, s.xp, s.stars), (7, 50, 5));

    let mut s = active_on(Student::new("s", "X-1", "n"), at(2025, 3, 1, 9), 29);
    update_streak(&mut s, &at(2025, 3, 2, 9));
    assert_eq!((s.current_streak, s.xp, s.stars), (30, 200, 20));

    // 210 is a multiple of both 7 and 30
    let mut s = active_on(Student::new("s", "X-1", "n"), at(2025, 3, 1, 9), 209);
    update_streak(&mut s, &at(2025, 3, 2, 9));
    assert_eq!((s.current_streak, s.xp, s.stars), (210, 250, 25));
  }

  #[test]
  fn streak_bonus_keeps_level_consistent() {
    let mut s = active_on(Student::new("s", "X-1", "n"), at(2025, 3, 1, 9), 6);
    s.xp = 480;
    let out = derive_student_state(s, &[], at(2025, 3, 2, 9));
    assert_eq!(out.xp, 530);
    assert_eq!(out.level, 2);
  }

  #[test]
  fn achievements_are_additive_and_idempotent() {
    let mut s = Student::new("s", "X-1", "n");
    s.xp = 1000;
    s.progress.insert("a".into(), ModuleProgress { completed: true, ..Default::default() });
    unlock_achievements(&mut s, 1);
    let ids: Vec<_> = s.achievements.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["first_step", "novice", "legend"]);

    s.xp = 0;
    unlock_achievements(&mut s, 2);
    assert_eq!(s.achievements.len(), 3);
    assert!(s.achievements.iter().all(|a| a.unlocked_at == Some(1)));
  }

  #[test]
  fn suggestions_score_year_band_and_focus_terms() {
    let modules = vec![
      module("a", "Scientific Vocabulary", "Level 5 (Year 10)", "Photosynthesis"),
      module("b", "Loan Words", "Level 5 (Year 9)", "French words"),
      module("c", "Blends Beach", "Level 1 (Year 2)", "st, bl"),
      module("d", "Critical Analysis", "NCEA Level 2 (Year 12)", "bias"),
    ];
    let assessment = TeacherAssessment { reading_level: 10, focus_areas: vec!["critical analysis".into()] };
    // a: year 10 in [10, 11]; b: year 10 in [9, 10] grace; d: focus match only
    assert_eq!(suggest_modules(&assessment, &modules), vec!["a", "b", "d"]);
  }

  #[test]
  fn assessment_drives_suggestions_on_next_write() {
    let modules = vec![module("a", "Blends Beach", "Level 1 (Year 2)", ""), module("b", "Other", "Level 5 (Year 9)", "")];
    let mut s = Student::new("s", "X-1", "n");
    set_assessment(&mut s, 3, vec![" ".into()]);
    assert!(s.teacher_assessment.as_ref().unwrap().focus_areas.is_empty());
    let out = derive_student_state(s, &modules, at(2025, 3, 1, 9));
    assert_eq!(out.suggested_module_ids, vec!["a"]);
  }

  #[test]
  fn suggestions_untouched_without_assessment() {
    let mut s = Student::new("s", "X-1", "n");
    s.suggested_module_ids = vec!["keep".into()];
    let out = derive_student_state(s, &[module("a", "A", "Level 1 (Year 1)", "")], at(2025, 3, 1, 9));
    assert_eq!(out.suggested_module_ids, vec!["keep"]);
  }

  #[test]
  fn stored_score_never_decreases() {
    let mut s = Student::new("s", "X-1", "n");
    for (pct, expected) in [(60, 60), (90, 90), (40, 90)] {
      let report = CompletionReport {
        module_id: "m".into(),
        final_percentage: pct,
        confidence: Some(4),
        analysis: None,
        concept_score: None,
        reward: completion_reward(pct, None),
      };
      apply_completion(&mut s, &report);
      assert_eq!(s.progress["m"].score, expected);
    }
    assert_eq!(s.progress["m"].attempts, 3);
    assert!(s.progress["m"].resume_state.is_none());
  }

  #[test]
  fn completion_reward_adds_concept_and_perfect_bonus() {
    assert_eq!(completion_reward(50, None), CompletionReward { xp: 100, stars: 20 });
    assert_eq!(completion_reward(50, Some(4)), CompletionReward { xp: 140, stars: 20 });
    assert_eq!(completion_reward(100, Some(5)), CompletionReward { xp: 200, stars: 30 });
  }

  #[test]
  fn reading_sessions_are_newest_first() {
    let mut s = Student::new("s", "X-1", "n");
    let analysis = |fb: &str| ReadingAnalysis {
      difficult_words: vec![],
      misread_words: vec![],
      feedback: fb.into(),
      assessed_level: "Fluent Level 4".into(),
      transcript: None,
    };
    record_reading_session(&mut s, analysis("first"), None, at(2025, 3, 1, 9).with_timezone(&Utc));
    record_reading_session(&mut s, analysis("second"), None, at(2025, 3, 1, 10).with_timezone(&Utc));
    assert_eq!(s.reading_log[0].feedback, "second");
    assert_eq!(s.reading_log[0].transcript, "(Audio Analyzed)");
    assert_eq!((s.xp, s.stars), (40, 2));
  }

  #[test]
  fn assignment_toggles() {
    let mut s = Student::new("s", "X-1", "n");
    assert!(toggle_assignment(&mut s, "m1"));
    assert!(!toggle_assignment(&mut s, "m1"));
    assert!(s.assigned_module_ids.is_empty());
  }

  #[test]
  fn placement_skip_only_from_not_started() {
    let mut s = Student::new("s", "X-1", "n");
    assert!(skip_placement(&mut s));
    assert_eq!(s.placement_test_status, PlacementStatus::Skipped);
    assert!(!skip_placement(&mut s));

    let mut done = Student::new("d", "X-2", "n");
    record_placement(&mut done, &PlacementOutcome { level: 3, analysis: "ok".into() });
    assert!(!skip_placement(&mut done));
    assert_eq!(done.placement_test_status, PlacementStatus::Completed);
  }

  #[test]
  fn custom_rewards_are_newest_first_and_trimmed() {
    let mut s = Student::new("s", "X-1", "n");
    assert!(grant_custom_reward(&mut s, " Sticker "));
    assert!(grant_custom_reward(&mut s, "Free Time"));
    assert!(!grant_custom_reward(&mut s, "   "));
    assert_eq!(s.custom_rewards, vec!["Free Time", "Sticker"]);
  }
}
