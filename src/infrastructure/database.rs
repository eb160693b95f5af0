use crate::entities::{prelude::*, *};
use crate::models::Role;
use sea_orm::sea_query::{Alias, Index, IndexCreateStatement};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    Schema, Set,
};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url =
        env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;
    seed_roles(&db).await?;

    Ok(db)
}

fn unique_index(name: &str, table: &str, columns: &[&str]) -> IndexCreateStatement {
    let mut index = Index::create();
    index
        .name(name)
        .table(Alias::new(table))
        .unique()
        .if_not_exists();
    for column in columns {
        index.col(Alias::new(*column));
    }
    index
}

/// Creates every table that does not exist yet, then the composite unique
/// indexes the entity definitions cannot express.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Parents before children so foreign keys resolve.
    let stmts = vec![
        ("roles", schema.create_table_from_entity(Roles).if_not_exists().to_owned()),
        ("users", schema.create_table_from_entity(Users).if_not_exists().to_owned()),
        ("courses", schema.create_table_from_entity(Courses).if_not_exists().to_owned()),
        (
            "course_file_managers",
            schema
                .create_table_from_entity(CourseFileManagers)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "media_intents",
            schema
                .create_table_from_entity(MediaIntents)
                .if_not_exists()
                .to_owned(),
        ),
        ("categories", schema.create_table_from_entity(Categories).if_not_exists().to_owned()),
        (
            "subcategories",
            schema
                .create_table_from_entity(Subcategories)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "course_categories",
            schema
                .create_table_from_entity(CourseCategories)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "course_subcategories",
            schema
                .create_table_from_entity(CourseSubcategories)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "intended_learners",
            schema
                .create_table_from_entity(IntendedLearners)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "curriculum_items",
            schema
                .create_table_from_entity(CurriculumItems)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "code_questions",
            schema
                .create_table_from_entity(CodeQuestions)
                .if_not_exists()
                .to_owned(),
        ),
        ("assignments", schema.create_table_from_entity(Assignments).if_not_exists().to_owned()),
        ("instructors", schema.create_table_from_entity(Instructors).if_not_exists().to_owned()),
        ("quizzes", schema.create_table_from_entity(Quizzes).if_not_exists().to_owned()),
        ("questions", schema.create_table_from_entity(Questions).if_not_exists().to_owned()),
        (
            "question_options",
            schema
                .create_table_from_entity(QuestionOptions)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        match db.execute(stmt).await {
            Ok(_) => info!("   - Table '{}' checked/created", name),
            Err(e) => tracing::warn!("   - Failed to create table '{}': {}", name, e),
        }
    }

    info!("🔄 Checking unique indexes...");

    let indexes = vec![
        unique_index(
            "idx_subcategories_name_category",
            "subcategories",
            &["name", "category_id"],
        ),
        unique_index(
            "idx_curriculum_items_course_position",
            "curriculum_items",
            &["course_id", "position"],
        ),
        unique_index(
            "idx_questions_quiz_position",
            "questions",
            &["quiz_id", "position"],
        ),
        unique_index(
            "idx_question_options_question_position",
            "question_options",
            &["question_id", "position"],
        ),
        unique_index(
            "idx_course_categories_course_category",
            "course_categories",
            &["course_id", "category_id"],
        ),
        unique_index(
            "idx_course_subcategories_course_subcategory",
            "course_subcategories",
            &["course_id", "subcategory_id"],
        ),
    ];

    for index in indexes {
        let stmt = builder.build(&index);
        if let Err(e) = db.execute(stmt).await {
            tracing::warn!("   - Unique index warning: {}", e);
        }
    }

    Ok(())
}

/// Inserts the fixed role rows that are missing.
pub async fn seed_roles(db: &DatabaseConnection) -> anyhow::Result<()> {
    for role in Role::ALL {
        if Roles::find_by_id(role.id()).one(db).await?.is_some() {
            continue;
        }
        roles::ActiveModel {
            id: Set(role.id()),
            name: Set(role.name().to_string()),
            description: Set(None),
        }
        .insert(db)
        .await?;
        info!("   - Seeded role '{}'", role.name());
    }
    Ok(())
}
