//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ClassGroup, LessonPhase, LessonPhaseState, ReadingSession, Student, Teacher};
use crate::lesson::{LessonAction, LessonEvent};
use crate::oracle::{PlacementOutcome, PlacementQuestion, PlacementResult};
use crate::shop::ShopOutcome;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
}

/// Messages the server sends over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    /// Something in the store changed; views should refetch.
    DataUpdate {
        timestamp: i64,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub oracle: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Deserialize)]
pub struct StudentLoginIn {
    pub code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentIn {
    pub module_id: String,
}
#[derive(Serialize)]
pub struct AssignmentOut {
    pub assigned: bool,
    pub student: Student,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentIn {
    pub reading_level: u32,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

#[derive(Deserialize)]
pub struct CustomRewardIn {
    pub reward: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonStartIn {
    pub student_id: String,
    pub module_id: String,
}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonOut {
    pub module_id: String,
    pub resumed: bool,
    pub state: LessonPhaseState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonActionIn {
    pub student_id: String,
    pub module_id: String,
    pub action: LessonAction,
}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonActionOut {
    pub event: LessonEvent,
    pub phase: LessonPhase,
    pub sub_index: usize,
    /// Present once the lesson is completed and rewards are credited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<Student>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseIn {
    pub student_id: String,
    pub item_id: String,
}
#[derive(Serialize)]
pub struct PurchaseOut {
    pub outcome: ShopOutcome,
    pub student: Student,
}

#[derive(Serialize)]
pub struct PlacementTestOut {
    pub questions: Vec<PlacementQuestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSkipIn {
    pub student_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSubmitIn {
    pub student_id: String,
    pub results: Vec<PlacementResult>,
}
#[derive(Serialize)]
pub struct PlacementSubmitOut {
    pub outcome: PlacementOutcome,
    pub student: Student,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageQuery {
    pub student_id: Option<String>,
    pub level: Option<u32>,
    pub theme: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingAnalyzeIn {
    pub student_id: String,
    pub audio_base64: String,
    #[serde(default = "default_audio_mime")]
    pub mime: String,
    #[serde(default)]
    pub target_text: Option<String>,
}

fn default_audio_mime() -> String {
    "audio/webm".into()
}

#[derive(Serialize)]
pub struct ReadingAnalyzeOut {
    pub session: ReadingSession,
    pub student: Student,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorIn {
    pub student_id: String,
    #[serde(default)]
    pub module_id: Option<String>,
    pub query: String,
}
#[derive(Serialize)]
pub struct TutorOut {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRegisterIn {
    pub name: String,
    pub email: String,
    pub password: String,
    pub class_name: String,
}

#[derive(Deserialize)]
pub struct TeacherLoginIn {
    pub email: String,
    pub password: String,
}

/// Teacher as sent to clients (no password).
#[derive(Serialize)]
pub struct TeacherOut {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl From<Teacher> for TeacherOut {
    fn from(t: Teacher) -> Self {
        Self { id: t.id, name: t.name, email: t.email, avatar: t.avatar }
    }
}

#[derive(Serialize)]
pub struct TeacherSessionOut {
    pub teacher: TeacherOut,
    pub classes: Vec<ClassGroup>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCreateIn {
    pub name: String,
    pub teacher_id: String,
}

/// Partial update for a teacher profile or a class.
#[derive(Deserialize)]
pub struct ProfilePatchIn {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
pub struct ClassStudentIn {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAssignIn {
    pub module_id: String,
    #[serde(default = "default_true")]
    pub assign: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct ClassAssignOut {
    pub updated: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomModuleIn {
    pub teacher_id: String,
    pub title: String,
    pub words: Vec<String>,
}
