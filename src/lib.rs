pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::course_service::CourseService;
use crate::services::media::MediaCoordinator;
use crate::services::password_reset::PasswordResetService;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::password_reset,
        api::handlers::auth::password_reset_confirm,
        api::handlers::users::get_me,
        api::handlers::courses::list_courses,
        api::handlers::courses::list_instructor_courses,
        api::handlers::courses::create_course,
        api::handlers::courses::get_course,
        api::handlers::courses::update_course,
        api::handlers::courses::delete_course,
        api::handlers::courses::course_curriculum,
        api::handlers::courses::course_code_questions,
        api::handlers::courses::course_assignments,
        api::handlers::intended_learners::get_intended_learners,
        api::handlers::intended_learners::save_intended_learners,
        api::handlers::categories::list_categories,
        api::handlers::categories::create_category,
        api::handlers::categories::get_category,
        api::handlers::categories::update_category,
        api::handlers::categories::delete_category,
        api::handlers::subcategories::list_subcategories,
        api::handlers::subcategories::subcategories_by_category,
        api::handlers::subcategories::create_subcategory,
        api::handlers::subcategories::get_subcategory,
        api::handlers::subcategories::update_subcategory,
        api::handlers::subcategories::delete_subcategory,
        api::handlers::instructors::list_instructors,
        api::handlers::instructors::create_instructor,
        api::handlers::instructors::get_instructor,
        api::handlers::instructors::update_instructor,
        api::handlers::instructors::delete_instructor,
        api::handlers::instructors::rate_instructor,
        api::handlers::curriculum::create_curriculum_item,
        api::handlers::curriculum::update_curriculum_item,
        api::handlers::curriculum::delete_curriculum_item,
        api::handlers::quizzes::create_quiz,
        api::handlers::quizzes::get_quiz,
        api::handlers::quizzes::delete_quiz,
        api::handlers::quizzes::add_question,
        api::handlers::quizzes::add_option,
        api::handlers::code_questions::create_code_question,
        api::handlers::code_questions::delete_code_question,
        api::handlers::assignments::create_assignment,
        api::handlers::assignments::delete_assignment,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::RegisterResponse,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::LoginResponse,
            api::handlers::auth::LoginUser,
            api::handlers::auth::TokenPair,
            api::handlers::auth::PasswordResetRequest,
            api::handlers::auth::PasswordResetConfirm,
            api::handlers::auth::DetailResponse,
            api::handlers::users::UserProfileResponse,
            api::handlers::courses::CourseForm,
            services::course_service::CourseView,
            services::course_service::CourseDeleted,
            services::media::CleanupReport,
            api::handlers::intended_learners::IntendedLearnersRequest,
            api::handlers::intended_learners::IntendedLearnersResponse,
            api::handlers::categories::CategoryRequest,
            api::handlers::categories::CategoryResponse,
            api::handlers::subcategories::SubcategoryRequest,
            api::handlers::subcategories::UpdateSubcategoryRequest,
            api::handlers::subcategories::SubcategoryResponse,
            api::handlers::instructors::CreateInstructorRequest,
            api::handlers::instructors::UpdateInstructorRequest,
            api::handlers::instructors::RateInstructorRequest,
            api::handlers::instructors::RateInstructorResponse,
            api::handlers::instructors::InstructorResponse,
            api::handlers::curriculum::CurriculumItemRequest,
            api::handlers::curriculum::UpdateCurriculumItemRequest,
            api::handlers::curriculum::CurriculumItemResponse,
            api::handlers::quizzes::CreateQuizRequest,
            api::handlers::quizzes::CreateQuestionRequest,
            api::handlers::quizzes::CreateOptionRequest,
            api::handlers::quizzes::QuizResponse,
            api::handlers::quizzes::QuestionResponse,
            api::handlers::quizzes::OptionResponse,
            api::handlers::code_questions::CodeQuestionRequest,
            api::handlers::code_questions::CodeQuestionResponse,
            api::handlers::assignments::AssignmentRequest,
            api::handlers::assignments::AssignmentResponse,
            models::CurriculumKind,
            models::QuestionKind,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and password reset"),
        (name = "users", description = "Current user"),
        (name = "courses", description = "Courses, their media and course content"),
        (name = "taxonomy", description = "Categories and subcategories"),
        (name = "instructors", description = "Instructor profiles and ratings"),
        (name = "curriculum", description = "Curriculum items"),
        (name = "quizzes", description = "Quizzes, questions and options"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub media: Arc<MediaCoordinator>,
    pub courses: Arc<CourseService>,
    pub password_reset: Arc<PasswordResetService>,
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);
    if origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn create_app(state: AppState) -> Router {
    use api::handlers::*;

    // Multipart overhead on top of the largest accepted file.
    let body_limit = state.config.max_video_size + 10 * 1024 * 1024;

    let protected = Router::new()
        .route("/user/me", get(users::get_me))
        .route(
            "/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route("/instructor/courses", get(courses::list_instructor_courses))
        .route(
            "/courses/:id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route(
            "/courses/:id/curriculum",
            get(courses::course_curriculum).post(curriculum::create_curriculum_item),
        )
        .route(
            "/courses/:id/code-questions",
            get(courses::course_code_questions).post(code_questions::create_code_question),
        )
        .route(
            "/courses/:id/assignments",
            get(courses::course_assignments).post(assignments::create_assignment),
        )
        .route(
            "/courses/:id/intended-learners",
            get(intended_learners::get_intended_learners)
                .post(intended_learners::save_intended_learners),
        )
        .route("/courses/:id/quizzes", post(quizzes::create_quiz))
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/subcategories",
            get(subcategories::list_subcategories).post(subcategories::create_subcategory),
        )
        .route(
            "/subcategories/by-category",
            get(subcategories::subcategories_by_category),
        )
        .route(
            "/subcategories/:id",
            get(subcategories::get_subcategory)
                .put(subcategories::update_subcategory)
                .delete(subcategories::delete_subcategory),
        )
        .route(
            "/instructors",
            get(instructors::list_instructors).post(instructors::create_instructor),
        )
        .route(
            "/instructors/:id",
            get(instructors::get_instructor)
                .put(instructors::update_instructor)
                .delete(instructors::delete_instructor),
        )
        .route("/instructors/:id/rate", post(instructors::rate_instructor))
        .route(
            "/curriculum/:id",
            put(curriculum::update_curriculum_item).delete(curriculum::delete_curriculum_item),
        )
        .route(
            "/quizzes/:id",
            get(quizzes::get_quiz).delete(quizzes::delete_quiz),
        )
        .route("/quizzes/:id/questions", post(quizzes::add_question))
        .route("/questions/:id/options", post(quizzes::add_option))
        .route(
            "/code-questions/:id",
            delete(code_questions::delete_code_question),
        )
        .route("/assignments/:id", delete(assignments::delete_assignment))
        .route_layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/password-reset", post(auth::password_reset))
        .route("/password-reset-confirm", post(auth::password_reset_confirm))
        .merge(protected)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
