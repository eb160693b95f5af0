pub use super::assignments::Entity as Assignments;
pub use super::categories::Entity as Categories;
pub use super::code_questions::Entity as CodeQuestions;
pub use super::course_categories::Entity as CourseCategories;
pub use super::course_file_managers::Entity as CourseFileManagers;
pub use super::course_subcategories::Entity as CourseSubcategories;
pub use super::courses::Entity as Courses;
pub use super::curriculum_items::Entity as CurriculumItems;
pub use super::instructors::Entity as Instructors;
pub use super::intended_learners::Entity as IntendedLearners;
pub use super::media_intents::Entity as MediaIntents;
pub use super::question_options::Entity as QuestionOptions;
pub use super::questions::Entity as Questions;
pub use super::quizzes::Entity as Quizzes;
pub use super::roles::Entity as Roles;
pub use super::subcategories::Entity as Subcategories;
pub use super::users::Entity as Users;
