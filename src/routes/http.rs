//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; errors map to a status code plus `{ "error" }`.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument};

use crate::lesson::LessonError;
use crate::logic::*;
use crate::protocol::*;
use crate::shop::ShopError;
use crate::state::AppState;
use crate::store::StoreError;

impl ServiceError {
  fn status(&self) -> StatusCode {
    match self {
      ServiceError::Store(StoreError::NotFound { .. }) | ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
      ServiceError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
      ServiceError::Store(StoreError::InvalidInput(_)) | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ServiceError::Lesson(LessonError::EmptyAnswer | LessonError::ConfidenceOutOfRange(_)) => StatusCode::BAD_REQUEST,
      ServiceError::Lesson(_) => StatusCode::CONFLICT,
      ServiceError::Shop(ShopError::UnknownItem(_)) => StatusCode::NOT_FOUND,
      ServiceError::Shop(ShopError::InsufficientStars { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
      ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
    }
  }
}

impl IntoResponse for ServiceError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(target: "spellquest_backend", error = %self, "Request failed");
    } else {
      info!(target: "spellquest_backend", status = status.as_u16(), error = %self, "Request rejected");
    }
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

type ApiResult<T> = Result<Json<T>, ServiceError>;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, oracle: state.openai.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_modules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.store.all_modules().await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_shop_items(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.shop.clone())
}

// --- Students ---

#[instrument(level = "info", skip_all)]
pub async fn http_post_student_login(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StudentLoginIn>,
) -> ApiResult<crate::domain::Student> {
  Ok(Json(login_student(&state, &body.code).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_students(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.store.students().await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_student(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<crate::domain::Student> {
  state
    .store
    .student(&id)
    .await
    .map(Json)
    .ok_or(ServiceError::NotFound { kind: "student", id })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_classmates(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  Json(state.store.classmates(&id).await)
}

#[instrument(level = "info", skip(state, body), fields(module_id = %body.module_id))]
pub async fn http_post_assignment(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AssignmentIn>,
) -> ApiResult<AssignmentOut> {
  let (assigned, student) = assign_module_to_student(&state, &id, &body.module_id).await?;
  Ok(Json(AssignmentOut { assigned, student }))
}

#[instrument(level = "info", skip(state, body), fields(reading_level = body.reading_level))]
pub async fn http_post_assessment(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AssessmentIn>,
) -> ApiResult<crate::domain::Student> {
  Ok(Json(assess_student(&state, &id, body.reading_level, body.focus_areas).await?))
}

#[instrument(level = "info", skip(state, body), fields(reward_len = body.reward.len()))]
pub async fn http_post_custom_reward(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<CustomRewardIn>,
) -> ApiResult<crate::domain::Student> {
  Ok(Json(give_custom_reward(&state, &id, &body.reward).await?))
}

// --- Lessons ---

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id, module_id = %body.module_id))]
pub async fn http_post_lesson_start(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LessonStartIn>,
) -> ApiResult<LessonOut> {
  let out = start_lesson(&state, &body.student_id, &body.module_id).await?;
  info!(target: "lesson", resumed = out.resumed, phase = ?out.state.phase, "HTTP lesson started");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id, module_id = %body.module_id, action = body.action.name()))]
pub async fn http_post_lesson_action(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LessonActionIn>,
) -> ApiResult<LessonActionOut> {
  Ok(Json(lesson_action(&state, &body.student_id, &body.module_id, body.action).await?))
}

// --- Shop ---

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id, item_id = %body.item_id))]
pub async fn http_post_purchase(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PurchaseIn>,
) -> ApiResult<PurchaseOut> {
  let (outcome, student) = shop_purchase(&state, &body.student_id, &body.item_id).await?;
  Ok(Json(PurchaseOut { outcome, student }))
}

// --- Placement ---

#[instrument(level = "info", skip(state))]
pub async fn http_get_placement_test(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(PlacementTestOut { questions: placement_test(&state).await })
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id))]
pub async fn http_post_placement_skip(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PlacementSkipIn>,
) -> ApiResult<crate::domain::Student> {
  Ok(Json(skip_placement_test(&state, &body.student_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id, results = body.results.len()))]
pub async fn http_post_placement_submit(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PlacementSubmitIn>,
) -> ApiResult<PlacementSubmitOut> {
  let (outcome, student) = submit_placement(&state, &body.student_id, &body.results).await?;
  Ok(Json(PlacementSubmitOut { outcome, student }))
}

// --- Reading room ---

#[instrument(level = "info", skip(state))]
pub async fn http_get_reading_passage(
  State(state): State<Arc<AppState>>,
  Query(q): Query<PassageQuery>,
) -> impl IntoResponse {
  Json(reading_passage(&state, q.student_id.as_deref(), q.level, q.theme.as_deref()).await)
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id, mime = %body.mime, audio_len = body.audio_base64.len()))]
pub async fn http_post_reading_analyze(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ReadingAnalyzeIn>,
) -> ApiResult<ReadingAnalyzeOut> {
  let (session, student) =
    analyze_reading(&state, &body.student_id, &body.audio_base64, &body.mime, body.target_text).await?;
  Ok(Json(ReadingAnalyzeOut { session, student }))
}

// --- Tutor ---

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id, query_len = body.query.len()))]
pub async fn http_post_tutor(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TutorIn>,
) -> ApiResult<TutorOut> {
  let text = ask_tutor(&state, &body.student_id, body.module_id.as_deref(), &body.query).await?;
  Ok(Json(TutorOut { text }))
}

// --- Teachers and classes ---

#[instrument(level = "info", skip_all)]
pub async fn http_post_teacher_register(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TeacherRegisterIn>,
) -> ApiResult<TeacherSessionOut> {
  let (teacher, classes) =
    register_teacher(&state, &body.name, &body.email, &body.password, &body.class_name).await?;
  Ok(Json(TeacherSessionOut { teacher: teacher.into(), classes }))
}

#[instrument(level = "info", skip_all)]
pub async fn http_post_teacher_login(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TeacherLoginIn>,
) -> ApiResult<TeacherSessionOut> {
  let (teacher, classes) = login_teacher(&state, &body.email, &body.password).await?;
  Ok(Json(TeacherSessionOut { teacher: teacher.into(), classes }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_teacher_classes(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  Json(state.store.classes(Some(&id)).await)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_put_teacher(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ProfilePatchIn>,
) -> ApiResult<TeacherOut> {
  Ok(Json(update_teacher_profile(&state, &id, body.name, body.avatar).await?.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_classes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.store.classes(None).await)
}

#[instrument(level = "info", skip(state, body), fields(teacher_id = %body.teacher_id))]
pub async fn http_post_class(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ClassCreateIn>,
) -> ApiResult<crate::domain::ClassGroup> {
  Ok(Json(state.store.create_class(&body.name, &body.teacher_id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_put_class(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ProfilePatchIn>,
) -> ApiResult<crate::domain::ClassGroup> {
  Ok(Json(update_class_details(&state, &id, body.name, body.avatar).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_class_student(
  State(state): State<Arc<AppState>>,
  Path(class_id): Path<String>,
  Json(body): Json<ClassStudentIn>,
) -> ApiResult<crate::domain::Student> {
  Ok(Json(add_student_to_class(&state, &class_id, &body.name).await?))
}

#[instrument(level = "info", skip(state, body), fields(module_id = %body.module_id, assign = body.assign))]
pub async fn http_post_class_assign(
  State(state): State<Arc<AppState>>,
  Path(class_id): Path<String>,
  Json(body): Json<ClassAssignIn>,
) -> ApiResult<ClassAssignOut> {
  let updated = assign_module_to_class(&state, &class_id, &body.module_id, body.assign).await?;
  Ok(Json(ClassAssignOut { updated }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_custom_modules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.store.custom_modules().await)
}

#[instrument(level = "info", skip(state, body), fields(teacher_id = %body.teacher_id, words = body.words.len()))]
pub async fn http_post_custom_module(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CustomModuleIn>,
) -> ApiResult<crate::domain::LearningModule> {
  Ok(Json(create_custom_module(&state, &body.teacher_id, &body.title, &body.words).await?))
}
