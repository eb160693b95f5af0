use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Remote ids for a course's media. One row per course once any media
/// operation has started.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "course_file_managers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub course_id: String,
    pub drive_folder_id: Option<String>,
    pub drive_folder_url: Option<String>,
    pub drive_images_folder_id: Option<String>,
    pub drive_images_folder_url: Option<String>,
    pub image_file_id: Option<String>,
    /// Numeric Vimeo id, stored at upload time.
    pub video_file_id: Option<String>,
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
