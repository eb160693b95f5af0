use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub level_info: String,
    pub instructor_id: Option<String>,
    /// Direct-view link derived from the Drive content link.
    pub image_url: Option<String>,
    pub image_view_url: Option<String>,
    pub video_url: Option<String>,
    pub video_thumbnail_url: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::InstructorId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Instructor,
    #[sea_orm(has_one = "super::course_file_managers::Entity")]
    FileManager,
    #[sea_orm(has_many = "super::curriculum_items::Entity")]
    CurriculumItems,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructor.def()
    }
}

impl Related<super::course_file_managers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileManager.def()
    }
}

impl Related<super::curriculum_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CurriculumItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
