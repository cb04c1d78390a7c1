use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Difficulty bucket a definition is filed under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Beginner,
    Intermediate,
    Advanced,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Beginner,
        Category::Intermediate,
        Category::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Beginner => "beginner",
            Category::Intermediate => "intermediate",
            Category::Advanced => "advanced",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "beginner" => Ok(Category::Beginner),
            "intermediate" => Ok(Category::Intermediate),
            "advanced" => Ok(Category::Advanced),
            _ => Err(format!("Invalid category: {}", value)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel the phishing artifact arrives through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    Email,
    Sms,
    Website,
}

impl Medium {
    pub fn as_str(&self) -> &'static str {
        match self {
            Medium::Email => "email",
            Medium::Sms => "sms",
            Medium::Website => "website",
        }
    }
}

impl FromStr for Medium {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "email" => Ok(Medium::Email),
            "sms" => Ok(Medium::Sms),
            "website" => Ok(Medium::Website),
            _ => Err(format!("Invalid medium: {}", value)),
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedFlag {
    pub id: String,
    pub label: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionOption {
    pub id: String,
    pub label: String,
    pub correct: bool,
    pub feedback: String,
}

/// A validated exercise. Only the catalog constructs these.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExerciseDefinition {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub medium: Medium,
    pub description: String,
    pub context: String,
    pub content: serde_json::Value,
    pub red_flags: Vec<RedFlag>,
    pub actions: Vec<ActionOption>,
    pub learning_notes: Vec<String>,
}

impl ExerciseDefinition {
    pub fn action(&self, action_id: &str) -> Option<&ActionOption> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    pub fn red_flag(&self, flag_id: &str) -> Option<&RedFlag> {
        self.red_flags.iter().find(|f| f.id == flag_id)
    }

    pub fn has_red_flag(&self, flag_id: &str) -> bool {
        self.red_flag(flag_id).is_some()
    }

    pub fn summary(&self) -> DefinitionSummary {
        DefinitionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            category: self.category,
            medium: self.medium,
            description: self.description.clone(),
        }
    }
}

/// Listing view without content, actions or flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefinitionSummary {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub medium: Medium,
    pub description: String,
}

/// Definition as delivered by a content source, before validation.
///
/// Every field is optional so that a missing key becomes a reported
/// violation instead of a deserialization failure. The keys used by the
/// legacy scenario files (`difficulty`, `type`, `is_correct`,
/// `learning_objectives`) are accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RawDefinition {
    #[validate(length(min = 1, message = "id must not be empty"))]
    pub id: Option<String>,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    #[serde(alias = "difficulty")]
    pub category: Option<String>,
    #[serde(alias = "type")]
    pub medium: Option<String>,
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: Option<String>,
    pub context: Option<String>,
    pub content: Option<serde_json::Value>,
    pub red_flags: Option<Vec<RawRedFlag>>,
    pub actions: Option<Vec<RawActionOption>>,
    #[serde(alias = "learning_objectives")]
    pub learning_notes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RawRedFlag {
    #[validate(length(min = 1, message = "id must not be empty"))]
    pub id: Option<String>,
    pub label: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RawActionOption {
    #[validate(length(min = 1, message = "id must not be empty"))]
    pub id: Option<String>,
    pub label: Option<String>,
    #[serde(alias = "is_correct")]
    pub correct: Option<bool>,
    pub feedback: Option<String>,
}
