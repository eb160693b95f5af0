pub mod prelude;

pub mod roles;
pub mod users;

pub mod course_file_managers;
pub mod courses;
pub mod media_intents;

pub mod categories;
pub mod course_categories;
pub mod course_subcategories;
pub mod subcategories;

pub mod assignments;
pub mod code_questions;
pub mod curriculum_items;
pub mod instructors;
pub mod intended_learners;
pub mod question_options;
pub mod questions;
pub mod quizzes;
