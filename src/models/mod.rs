use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Fixed role table. Ids are stable and referenced by `users.role_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Administration = 1,
    Instructor = 2,
    Student = 3,
    Staff = 4,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Administration,
        Role::Instructor,
        Role::Student,
        Role::Staff,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Administration => "Administration",
            Role::Instructor => "Instructor",
            Role::Student => "Student",
            Role::Staff => "Staff",
        }
    }

    /// Roles allowed to author courses.
    pub fn can_author_courses(self) -> bool {
        matches!(self, Role::Instructor | Role::Administration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Expert,
    #[serde(rename = "All Level")]
    AllLevel,
}

impl CourseLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseLevel::Beginner => "Beginner",
            CourseLevel::Intermediate => "Intermediate",
            CourseLevel::Expert => "Expert",
            CourseLevel::AllLevel => "All Level",
        }
    }
}

impl fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseLevel {
    type Err = String;

    /// Case-insensitive; "All Level", "all-level" and "All_Level" are equivalent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match normalized.as_str() {
            "beginner" => Ok(CourseLevel::Beginner),
            "intermediate" => Ok(CourseLevel::Intermediate),
            "expert" => Ok(CourseLevel::Expert),
            "alllevel" | "alllevels" => Ok(CourseLevel::AllLevel),
            _ => Err(
                "Level info must be one of: Beginner, Intermediate, Expert, All Level".to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CurriculumKind {
    Video,
    Reading,
    Quiz,
    Assignment,
    Other,
}

impl CurriculumKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CurriculumKind::Video => "video",
            CurriculumKind::Reading => "reading",
            CurriculumKind::Quiz => "quiz",
            CurriculumKind::Assignment => "assignment",
            CurriculumKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum QuestionKind {
    #[serde(rename = "MCQ")]
    MultipleChoice,
    #[serde(rename = "TF")]
    TrueFalse,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "MCQ",
            QuestionKind::TrueFalse => "TF",
        }
    }
}

/// What an entry in the media intent log is about to do (or did).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    ImageUpload,
    VideoUpload,
    DeleteImage,
    DeleteVideo,
    DeleteFolder,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::ImageUpload => "image_upload",
            IntentKind::VideoUpload => "video_upload",
            IntentKind::DeleteImage => "delete_image",
            IntentKind::DeleteVideo => "delete_video",
            IntentKind::DeleteFolder => "delete_folder",
        }
    }
}

impl FromStr for IntentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_upload" => Ok(IntentKind::ImageUpload),
            "video_upload" => Ok(IntentKind::VideoUpload),
            "delete_image" => Ok(IntentKind::DeleteImage),
            "delete_video" => Ok(IntentKind::DeleteVideo),
            "delete_folder" => Ok(IntentKind::DeleteFolder),
            other => Err(format!("unknown intent kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Pending,
    Done,
    Failed,
}

impl IntentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentStatus::Pending => "pending",
            IntentStatus::Done => "done",
            IntentStatus::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing_is_lenient() {
        assert_eq!("beginner".parse::<CourseLevel>(), Ok(CourseLevel::Beginner));
        assert_eq!("All Level".parse::<CourseLevel>(), Ok(CourseLevel::AllLevel));
        assert_eq!("all-level".parse::<CourseLevel>(), Ok(CourseLevel::AllLevel));
        assert!("guru".parse::<CourseLevel>().is_err());
    }

    #[test]
    fn test_role_ids_are_fixed() {
        assert_eq!(Role::from_id(1), Some(Role::Administration));
        assert_eq!(Role::from_id(3), Some(Role::Student));
        assert_eq!(Role::from_id(9), None);
        assert!(Role::Instructor.can_author_courses());
        assert!(!Role::Student.can_author_courses());
    }

    #[test]
    fn test_intent_kind_round_trip() {
        for kind in [
            IntentKind::ImageUpload,
            IntentKind::VideoUpload,
            IntentKind::DeleteImage,
            IntentKind::DeleteVideo,
            IntentKind::DeleteFolder,
        ] {
            assert_eq!(kind.as_str().parse::<IntentKind>(), Ok(kind));
        }
    }
}
