pub mod assignments;
pub mod auth;
pub mod categories;
pub mod code_questions;
pub mod courses;
pub mod curriculum;
pub mod health;
pub mod instructors;
pub mod intended_learners;
pub mod quizzes;
pub mod subcategories;
pub mod users;
