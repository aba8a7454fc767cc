//! Persistence facade: versioned JSON collections on disk with an in-memory
//! cache and a change broadcast.
//!
//! Each collection is one file named `sq_<collection>_<version>.json` under the
//! data directory. Every mutation rewrites the whole collection (temp file +
//! rename) and emits `StoreEvent::DataUpdate`. Concurrent writers are not
//! coordinated beyond the in-process lock: last write wins.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{ClassGroup, LearningModule, LessonPhaseState, ModuleTheme, Student, Teacher};
use crate::rewards::derive_student_state;
use crate::seeds::{seed_classes, seed_students, seed_teachers, standard_modules};

pub const DEFAULT_SCHEMA_VERSION: &str = "v23";

/// How many older schema versions are probed for data to carry forward.
const LEGACY_DEPTH: u32 = 5;

const LOGIN_PREFIXES: [&str; 6] = ["KIWI", "KEA", "TUI", "FERN", "HAKA", "MOA"];
const LOGIN_CODE_ATTEMPTS: usize = 32;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("already exists: {0}")]
    Duplicate(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Broadcast to every subscriber after each successful write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    DataUpdate { timestamp_ms: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Collection {
    Students,
    Classes,
    Teachers,
    CustomModules,
}

impl Collection {
    fn key(self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Classes => "classes",
            Collection::Teachers => "teachers",
            Collection::CustomModules => "custom_modules",
        }
    }
}

fn collection_path(dir: &Path, collection: Collection, version: &str) -> PathBuf {
    dir.join(format!("sq_{}_{}.json", collection.key(), version))
}

/// "v23" -> ["v22", "v21", "v20", "v19", "v18"].
fn legacy_versions(version: &str) -> Vec<String> {
    let Some(n) = version.strip_prefix('v').and_then(|n| n.parse::<u32>().ok()) else {
        return Vec::new();
    };
    (1..=LEGACY_DEPTH)
        .filter_map(|back| n.checked_sub(back))
        .map(|v| format!("v{v}"))
        .collect()
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

fn generate_login_code() -> String {
    let mut rng = rand::thread_rng();
    let prefix = LOGIN_PREFIXES.choose(&mut rng).copied().unwrap_or("KIWI");
    let num: u32 = rng.gen_range(100..1000);
    format!("{prefix}-{num}")
}

#[derive(Default)]
struct Records {
    students: Vec<Student>,
    classes: Vec<ClassGroup>,
    teachers: Vec<Teacher>,
    custom_modules: Vec<LearningModule>,
}

pub struct Store {
    dir: PathBuf,
    version: String,
    standard_modules: Vec<LearningModule>,
    records: RwLock<Records>,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    /// Open (or initialise) the store in `dir` at schema `version`.
    ///
    /// When the current version has no students yet, the newest legacy version
    /// that has students donates its classes, teachers and custom modules.
    /// Missing collections are seeded.
    #[instrument(level = "info", skip_all, fields(version = %version))]
    pub async fn open(
        dir: impl AsRef<Path>,
        version: &str,
        extra_modules: Vec<LearningModule>,
    ) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        if tokio::fs::metadata(collection_path(&dir, Collection::Students, version)).await.is_err() {
            migrate_legacy(&dir, version).await;
        }

        let mut standard = standard_modules();
        for m in extra_modules {
            if standard.iter().any(|s| s.id == m.id) {
                warn!(target: "store", id = %m.id, "Skipping configured module: id already in curriculum");
                continue;
            }
            standard.push(m);
        }

        let students = load_or_seed(&dir, Collection::Students, version, seed_students).await?;
        let classes = load_or_seed(&dir, Collection::Classes, version, seed_classes).await?;
        let teachers = load_or_seed(&dir, Collection::Teachers, version, seed_teachers).await?;
        let custom_modules = load_or_seed(&dir, Collection::CustomModules, version, Vec::new).await?;

        info!(
            target: "store",
            %version,
            students = students.len(),
            classes = classes.len(),
            teachers = teachers.len(),
            custom_modules = custom_modules.len(),
            standard_modules = standard.len(),
            "Store opened"
        );

        let (events, _) = broadcast::channel(64);
        Ok(Self {
            dir,
            version: version.to_string(),
            standard_modules: standard,
            records: RwLock::new(Records { students, classes, teachers, custom_modules }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn notify(&self) {
        let timestamp_ms = Utc::now().timestamp_millis();
        // No receivers is fine.
        let _ = self.events.send(StoreEvent::DataUpdate { timestamp_ms });
    }

    /// Write one collection. Callers swap the new value into `records` only
    /// after this succeeds, so memory never runs ahead of disk.
    async fn persist<T: Serialize>(&self, collection: Collection, items: &[T]) -> Result<(), StoreError> {
        let path = collection_path(&self.dir, collection, &self.version);
        write_json(&path, items).await?;
        debug!(target: "store", collection = collection.key(), count = items.len(), "Collection written");
        Ok(())
    }

    /// Write two collections; if the second fails, the first file is put back.
    async fn persist_pair<A: Serialize, B: Serialize>(
        &self,
        first: Collection,
        first_new: &[A],
        first_old: &[A],
        second: Collection,
        second_new: &[B],
    ) -> Result<(), StoreError> {
        self.persist(first, first_new).await?;
        if let Err(e) = self.persist(second, second_new).await {
            if let Err(rollback) = self.persist(first, first_old).await {
                warn!(target: "store", collection = first.key(), error = %rollback, "Rollback write failed");
            }
            return Err(e);
        }
        Ok(())
    }

    // --- Reads ---

    pub async fn students(&self) -> Vec<Student> {
        self.records.read().await.students.clone()
    }

    pub async fn student(&self, id: &str) -> Option<Student> {
        self.records.read().await.students.iter().find(|s| s.id == id).cloned()
    }

    pub async fn classes(&self, teacher_id: Option<&str>) -> Vec<ClassGroup> {
        let records = self.records.read().await;
        records
            .classes
            .iter()
            .filter(|c| teacher_id.map_or(true, |t| c.teacher_id == t))
            .cloned()
            .collect()
    }

    pub async fn teachers(&self) -> Vec<Teacher> {
        self.records.read().await.teachers.clone()
    }

    pub async fn custom_modules(&self) -> Vec<LearningModule> {
        self.records.read().await.custom_modules.clone()
    }

    /// Standard curriculum followed by teacher-created modules.
    pub async fn all_modules(&self) -> Vec<LearningModule> {
        let mut all = self.standard_modules.clone();
        all.extend(self.records.read().await.custom_modules.iter().cloned());
        all
    }

    pub async fn module(&self, id: &str) -> Option<LearningModule> {
        if let Some(m) = self.standard_modules.iter().find(|m| m.id == id) {
            return Some(m.clone());
        }
        self.records.read().await.custom_modules.iter().find(|m| m.id == id).cloned()
    }

    /// Case-insensitive, whitespace-trimmed login code lookup.
    pub async fn authenticate_student(&self, code: &str) -> Option<Student> {
        let wanted = code.trim().to_uppercase();
        let records = self.records.read().await;
        records.students.iter().find(|s| s.login_code.to_uppercase() == wanted).cloned()
    }

    /// Everyone in the student's class (the student included), most XP first.
    pub async fn classmates(&self, student_id: &str) -> Vec<Student> {
        let records = self.records.read().await;
        let Some(class) = records.classes.iter().find(|c| c.student_ids.iter().any(|id| id == student_id)) else {
            return Vec::new();
        };
        let mut mates: Vec<Student> = records
            .students
            .iter()
            .filter(|s| class.student_ids.contains(&s.id))
            .cloned()
            .collect();
        mates.sort_by(|a, b| b.xp.cmp(&a.xp));
        mates
    }

    /// Plaintext comparison; email is matched case-insensitively.
    pub async fn login_teacher(&self, email: &str, password: &str) -> Option<Teacher> {
        let records = self.records.read().await;
        records
            .teachers
            .iter()
            .find(|t| t.email.eq_ignore_ascii_case(email.trim()) && t.password == password)
            .cloned()
    }

    // --- Teachers and classes ---

    #[instrument(level = "info", skip_all, fields(email_len = email.len()))]
    pub async fn register_teacher(
        &self,
        name: &str,
        email: &str,
        password: &str,
        class_name: &str,
    ) -> Result<Teacher, StoreError> {
        let email = email.trim();
        if name.trim().is_empty() || email.is_empty() || password.is_empty() {
            return Err(StoreError::InvalidInput("name, email and password are required".into()));
        }

        let mut records = self.records.write().await;
        if records.teachers.iter().any(|t| t.email.eq_ignore_ascii_case(email)) {
            return Err(StoreError::Duplicate(format!("teacher email {email}")));
        }

        let teacher = Teacher {
            id: new_id("t"),
            name: name.trim().to_string(),
            email: email.to_string(),
            password: password.to_string(),
            avatar: Some("👩‍🏫".into()),
        };
        let mut teachers = records.teachers.clone();
        teachers.push(teacher.clone());
        let mut classes = records.classes.clone();
        classes.push(ClassGroup {
            id: new_id("c"),
            teacher_id: teacher.id.clone(),
            name: class_name.trim().to_string(),
            student_ids: Vec::new(),
            avatar: Some("🏫".into()),
        });
        self.persist_pair(Collection::Teachers, &teachers, &records.teachers, Collection::Classes, &classes)
            .await?;
        records.teachers = teachers;
        records.classes = classes;
        drop(records);

        info!(target: "store", teacher_id = %teacher.id, "Teacher registered");
        self.notify();
        Ok(teacher)
    }

    pub async fn update_teacher(&self, teacher: Teacher) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let mut teachers = records.teachers.clone();
        let slot = teachers
            .iter_mut()
            .find(|t| t.id == teacher.id)
            .ok_or_else(|| StoreError::NotFound { kind: "teacher", id: teacher.id.clone() })?;
        *slot = teacher;
        self.persist(Collection::Teachers, &teachers).await?;
        records.teachers = teachers;
        drop(records);
        self.notify();
        Ok(())
    }

    pub async fn create_class(&self, name: &str, teacher_id: &str) -> Result<ClassGroup, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("class name is required".into()));
        }
        let mut records = self.records.write().await;
        if !records.teachers.iter().any(|t| t.id == teacher_id) {
            return Err(StoreError::NotFound { kind: "teacher", id: teacher_id.to_string() });
        }
        let class = ClassGroup {
            id: new_id("c"),
            teacher_id: teacher_id.to_string(),
            name: name.trim().to_string(),
            student_ids: Vec::new(),
            avatar: Some("🏫".into()),
        };
        let mut classes = records.classes.clone();
        classes.push(class.clone());
        self.persist(Collection::Classes, &classes).await?;
        records.classes = classes;
        drop(records);
        self.notify();
        Ok(class)
    }

    pub async fn update_class(&self, class: ClassGroup) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let mut classes = records.classes.clone();
        let slot = classes
            .iter_mut()
            .find(|c| c.id == class.id)
            .ok_or_else(|| StoreError::NotFound { kind: "class", id: class.id.clone() })?;
        *slot = class;
        self.persist(Collection::Classes, &classes).await?;
        records.classes = classes;
        drop(records);
        self.notify();
        Ok(())
    }

    /// Assign or unassign a module for every student in a class. Returns how
    /// many students changed; nothing is written when none did.
    #[instrument(level = "info", skip(self))]
    pub async fn bulk_assign_module(&self, class_id: &str, module_id: &str, assign: bool) -> Result<usize, StoreError> {
        let mut records = self.records.write().await;
        let members = records
            .classes
            .iter()
            .find(|c| c.id == class_id)
            .map(|c| c.student_ids.clone())
            .ok_or_else(|| StoreError::NotFound { kind: "class", id: class_id.to_string() })?;

        let mut students = records.students.clone();
        let mut changed = 0;
        for s in students.iter_mut().filter(|s| members.contains(&s.id)) {
            let has = s.assigned_module_ids.iter().any(|id| id == module_id);
            if assign && !has {
                s.assigned_module_ids.push(module_id.to_string());
                changed += 1;
            } else if !assign && has {
                s.assigned_module_ids.retain(|id| id != module_id);
                changed += 1;
            }
        }

        if changed > 0 {
            self.persist(Collection::Students, &students).await?;
            records.students = students;
            drop(records);
            self.notify();
        }
        Ok(changed)
    }

    // --- Modules ---

    /// Teacher word list. Empty words are dropped; at least one must remain.
    pub async fn create_custom_module(
        &self,
        teacher_id: &str,
        title: &str,
        words: &[String],
    ) -> Result<LearningModule, StoreError> {
        let words: Vec<String> = words
            .iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        if title.trim().is_empty() || words.is_empty() {
            return Err(StoreError::InvalidInput("a title and at least one word are required".into()));
        }

        let module = LearningModule {
            id: new_id("custom"),
            title: title.trim().to_string(),
            level: "Custom List".into(),
            theme: ModuleTheme::Space,
            description: format!("Teacher created: {} words", words.len()),
            rule_explanation: "Custom teacher list.".into(),
            is_custom: true,
            custom_words: words,
            created_by: Some(teacher_id.to_string()),
        };

        let mut records = self.records.write().await;
        let mut custom_modules = records.custom_modules.clone();
        custom_modules.push(module.clone());
        self.persist(Collection::CustomModules, &custom_modules).await?;
        records.custom_modules = custom_modules;
        drop(records);
        self.notify();
        Ok(module)
    }

    // --- Students ---

    /// Enrol a student in a class with a fresh unique login code.
    #[instrument(level = "info", skip(self, name), fields(name_len = name.len()))]
    pub async fn create_student(&self, name: &str, class_id: &str) -> Result<Student, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("student name is required".into()));
        }

        let mut records = self.records.write().await;
        let class_idx = records
            .classes
            .iter()
            .position(|c| c.id == class_id)
            .ok_or_else(|| StoreError::NotFound { kind: "class", id: class_id.to_string() })?;

        let mut code = generate_login_code();
        for _ in 0..LOGIN_CODE_ATTEMPTS {
            if !records.students.iter().any(|s| s.login_code.eq_ignore_ascii_case(&code)) {
                break;
            }
            code = generate_login_code();
        }
        if records.students.iter().any(|s| s.login_code.eq_ignore_ascii_case(&code)) {
            return Err(StoreError::Duplicate("no free login code".into()));
        }

        let student = Student::new(new_id("s"), code, name.trim());
        let mut students = records.students.clone();
        students.push(student.clone());
        let mut classes = records.classes.clone();
        classes[class_idx].student_ids.push(student.id.clone());
        self.persist_pair(Collection::Students, &students, &records.students, Collection::Classes, &classes)
            .await?;
        records.students = students;
        records.classes = classes;
        drop(records);

        info!(target: "store", student_id = %student.id, %class_id, "Student enrolled");
        self.notify();
        Ok(student)
    }

    /// Run the rules engine over `student` and store the result.
    pub async fn update_student(&self, student: Student) -> Result<Student, StoreError> {
        self.update_student_at(student, Local::now()).await
    }

    #[instrument(level = "debug", skip_all, fields(student_id = %student.id))]
    pub async fn update_student_at<Tz: TimeZone>(
        &self,
        student: Student,
        now: DateTime<Tz>,
    ) -> Result<Student, StoreError> {
        let modules = self.all_modules().await;
        let mut records = self.records.write().await;
        let idx = records
            .students
            .iter()
            .position(|s| s.id == student.id)
            .ok_or_else(|| StoreError::NotFound { kind: "student", id: student.id.clone() })?;

        let derived = derive_student_state(student, &modules, now);
        let mut students = records.students.clone();
        students[idx] = derived.clone();
        self.persist(Collection::Students, &students).await?;
        records.students = students;
        drop(records);

        debug!(target: "store", xp = derived.xp, level = derived.level, streak = derived.current_streak, "Student updated");
        self.notify();
        Ok(derived)
    }

    /// Raw resume checkpoint; derived fields are left alone. A completed
    /// module keeps no snapshot, so nothing is written for it and `false`
    /// is returned.
    pub async fn save_progress_state(
        &self,
        student_id: &str,
        module_id: &str,
        state: LessonPhaseState,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let idx = records
            .students
            .iter()
            .position(|s| s.id == student_id)
            .ok_or_else(|| StoreError::NotFound { kind: "student", id: student_id.to_string() })?;
        if records.students[idx].progress.get(module_id).is_some_and(|p| p.completed) {
            debug!(target: "store", %student_id, %module_id, "Completed module; checkpoint skipped");
            return Ok(false);
        }

        let mut students = records.students.clone();
        students[idx].progress.entry(module_id.to_string()).or_default().resume_state = Some(state);
        self.persist(Collection::Students, &students).await?;
        records.students = students;
        drop(records);
        self.notify();
        Ok(true)
    }
}

async fn load_or_seed<T, F>(dir: &Path, collection: Collection, version: &str, seed: F) -> Result<Vec<T>, StoreError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Vec<T>,
{
    let path = collection_path(dir, collection, version);
    if let Some(existing) = read_json::<Vec<T>>(&path).await? {
        return Ok(existing);
    }
    let seeded = seed();
    write_json(&path, &seeded).await?;
    debug!(target: "store", collection = collection.key(), count = seeded.len(), "Seeded collection");
    Ok(seeded)
}

/// Copy classes, teachers and custom modules forward from the newest legacy
/// version that has a students file. Students always start fresh.
async fn migrate_legacy(dir: &Path, version: &str) {
    for legacy in legacy_versions(version) {
        if tokio::fs::metadata(collection_path(dir, Collection::Students, &legacy)).await.is_err() {
            continue;
        }
        for collection in [Collection::Classes, Collection::Teachers, Collection::CustomModules] {
            let from = collection_path(dir, collection, &legacy);
            let to = collection_path(dir, collection, version);
            match tokio::fs::copy(&from, &to).await {
                Ok(_) => info!(target: "store", from = %legacy, to = %version, collection = collection.key(), "Migrated legacy collection"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(target: "store", from = %legacy, collection = collection.key(), error = %e, "Legacy migration failed"),
            }
        }
        return;
    }
}
