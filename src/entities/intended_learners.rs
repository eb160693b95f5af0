use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

// List fields are stored as JSON-encoded string arrays.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "intended_learners")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub course_id: String,
    #[sea_orm(column_type = "Text")]
    pub learning_outcomes: String,
    #[sea_orm(column_type = "Text")]
    pub skills_needed: String,
    #[sea_orm(column_type = "Text")]
    pub target_audience: String,
    #[sea_orm(column_type = "Text")]
    pub career_goals: String,
    #[sea_orm(column_type = "Text")]
    pub participation_encouragement: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::courses::Entity",
        from = "Column::CourseId",
        to = "super::courses::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Courses,
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Courses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
