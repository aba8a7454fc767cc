//! Loading service configuration (storage, prompts, extra curriculum) from TOML.
//!
//! See `AppConfig` and `Prompts` for the expected schema. Every section is
//! optional; a missing or broken file means defaults.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{LearningModule, ModuleTheme};
use crate::store::DEFAULT_SCHEMA_VERSION;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub storage: StorageCfg,
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub modules: Vec<ModuleCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageCfg {
  #[serde(default = "default_data_dir")] pub data_dir: String,
  #[serde(default = "default_schema_version")] pub schema_version: String,
}

fn default_data_dir() -> String { "./data".into() }
fn default_schema_version() -> String { DEFAULT_SCHEMA_VERSION.into() }

impl Default for StorageCfg {
  fn default() -> Self {
    Self { data_dir: default_data_dir(), schema_version: default_schema_version() }
  }
}

impl StorageCfg {
  /// DATA_DIR wins over the file.
  pub fn resolved_data_dir(&self) -> String {
    std::env::var("DATA_DIR").ok().filter(|d| !d.trim().is_empty()).unwrap_or_else(|| self.data_dir.clone())
  }
}

/// Extra standard module accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ModuleCfg {
  pub id: String,
  pub title: String,
  pub level: String,
  #[serde(default)] pub theme: ModuleTheme,
  #[serde(default)] pub description: String,
  #[serde(default)] pub rule_explanation: String,
}

impl From<ModuleCfg> for LearningModule {
  fn from(m: ModuleCfg) -> Self {
    LearningModule {
      id: m.id,
      title: m.title,
      level: m.level,
      theme: m.theme,
      description: m.description,
      rule_explanation: m.rule_explanation,
      is_custom: false,
      custom_words: Vec::new(),
      created_by: None,
    }
  }
}

/// Prompts used by the OpenAI client. Placeholders in `{braces}` are filled
/// per call. Override any of them in TOML to tune tone or structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Lesson generation
  pub lesson_system: String,
  pub lesson_user_template: String,
  pub lesson_standard_context: String,
  pub lesson_custom_context: String,
  // Concept-check grading
  pub grade_system: String,
  pub grade_user_template: String,
  // Post-quiz mistake analysis
  pub analysis_system: String,
  pub analysis_user_template: String,
  // Placement
  pub placement_system: String,
  pub placement_user_template: String,
  pub placement_analysis_system: String,
  pub placement_analysis_user_template: String,
  // Reading room
  pub passage_system: String,
  pub passage_user_template: String,
  pub reading_system: String,
  pub reading_user_template: String,
  // Tutor chat
  pub tutor_system: String,
  pub tutor_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      lesson_system: "You are an expert literacy teacher for New Zealand primary schools. Every multiple-choice item has exactly one correct answer and three plausible wrong distractors. Respond ONLY with strict JSON.".into(),
      lesson_user_template: "Create a spelling and grammar lesson.\n\n{context}\n\nActivity types: BUILD_WORD (student types the word), MATCHING or SORTING (student picks from options; give 3 distractors), FIX_SENTENCE (student rewrites a sentence correctly).\n\nReturn JSON with fields:\n- intro: {title, explanation, examples: [{word, sentence}]} with 2-3 examples\n- practice: 4-6 items {id, type, prompt, correctAnswer, distractors, explanation, hint}; at least 2 ask about the rule itself\n- conceptCheck: {question, gradingGuidance}, one open \"What is...?\" or \"How does...?\" question\n- quiz: 4-6 items in the same shape; at least 1 about the rule, the rest BUILD_WORD\n- conclusion: a short encouraging wrap-up\nNo blanks or underscores in prompts. Tone: encouraging, fun, Kiwi English.".into(),
      lesson_standard_context: "Standard curriculum unit.\n- Level: {level}\n- Theme: {theme}\n- Rule: {rule}".into(),
      lesson_custom_context: "Teacher word list: {words}.\nFind the spelling pattern the words share, explain it in the intro, and build practice and quiz items mainly from these words (add 1-2 similar words only if the list is very short).".into(),
      grade_system: "You are a friendly primary school teacher grading short answers. Output JSON only.".into(),
      grade_user_template: "Question: \"{question}\"\nGrading guidance: \"{guidance}\"\nStudent answer: \"{answer}\"\n\nGrade understanding from 1 to 5. Meaning beats grammar and spelling; short answers and synonyms are fine; 1 is only for irrelevant or wrong answers.\nReturn JSON {\"score\": integer, \"feedback\": one short encouraging sentence}.".into(),
      analysis_system: "You are Tudor, a friendly Kiwi bird teacher. Reply in at most 2 sentences.".into(),
      analysis_user_template: "The student finished \"{title}\" with these mistakes:\n{mistakes}\n\nName the pattern behind them (e.g. silent letters, vowel mix-ups) and give ONE concise tip. Be encouraging.".into(),
      placement_system: "You write spelling placement tests for Years 1-8. Output JSON only.".into(),
      placement_user_template: "Create 10 multiple-choice spelling questions from very easy (level 1) to difficult (level 5), mixing phonics, irregular words and morphology.\nReturn JSON {\"questions\": [{\"question\": string, \"correctAnswer\": string, \"distractors\": [3 strings], \"level\": integer}]}.".into(),
      placement_analysis_system: "You place students on a 1-5 spelling level. Output JSON only.".into(),
      placement_analysis_user_template: "Score: {correct}/{total}.\nMistakes:\n{mistakes}\n\nPick the starting level (1-5) from where they began failing and write an encouraging analysis of at most 2 sentences.\nReturn JSON {\"level\": integer, \"analysis\": string}.".into(),
      passage_system: "You are an educational writer for New Zealand schools. Use NZ English spelling. Output JSON only.".into(),
      passage_user_template: "Write a complete short story (100-250 words) for a Year {year} reader. Theme: {theme}.\nMatch the sentence structure, vocabulary and tone of this reference, but make it a full story:\n\"{reference}\"\nFocus: {focus}\nReturn JSON {\"title\": string, \"content\": string}.".into(),
      reading_system: "You are Tudor, a New Zealand literacy specialist assessing a read-aloud. Do not penalise accent or self-corrections. Output JSON only.".into(),
      reading_user_template: "Student year level: {year}\nTarget text: {target}\nTranscript of what was read: {transcript}\n\nReturn JSON {\"difficultWords\": [{\"word\", \"meaning\"}] (2-3 advanced words), \"misreadWords\": [{\"word\", \"heard\"}] (only genuine struggles), \"feedback\": 2 encouraging sentences, \"assessedLevel\": \"<Fluent|Developing|Early> Level <n>\"}.\nIf the target was level X and there were fewer than 3 mistakes, assess Fluent Level X.".into(),
      tutor_system: "You are Tudor, a friendly Kiwi bird helping with spelling. NEVER say or spell the hidden target answer. Scaffold instead: a rhyme, another word with the same pattern, a definition, or the first letter if they are really stuck. Max 2-3 short sentences, a little NZ slang and emoji.".into(),
      tutor_user_template: "Module: \"{title}\"\nRule: \"{rule}\"\nCurrent question: \"{question}\"\nHidden target answer (never reveal): \"{answer}\"\nLesson words: {examples}\n\nStudent asks: \"{query}\"".into(),
    }
  }
}

/// Attempt to load `AppConfig` from SPELLQUEST_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("SPELLQUEST_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "spellquest_backend", %path, modules = cfg.modules.len(), "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "spellquest_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "spellquest_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
