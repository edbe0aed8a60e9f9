//! Row types and read models.
//!
//! Field names mirror the relational columns (`lang_from`, `text_to`, ...)
//! so rows map one-to-one onto existing data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string, never serialized
    #[serde(skip)]
    #[sqlx(rename = "password")]
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Phrasebook {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    pub public: bool,
    pub lang_from: String,
    pub lang_to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Translation {
    pub id: i64,
    pub lang_from: String,
    pub lang_to: String,
    pub text_from: String,
    pub text_to: String,
}

/// A (phrasebook, translation) membership carrying its own note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Association {
    pub phrasebook_id: i64,
    pub translation_id: i64,
    pub note: Option<String>,
}

/// A translation fetched from the provider but not yet persisted.
///
/// Handed to the client after `/translate` and posted back verbatim when
/// the user saves it, so no per-request state lives on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTranslation {
    pub lang_from: String,
    pub lang_to: String,
    pub text_from: String,
    pub text_to: String,
}

/// Association joined with the translation content it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SavedTranslation {
    pub translation_id: i64,
    pub lang_from: String,
    pub lang_to: String,
    pub text_from: String,
    pub text_to: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhrasebookView {
    #[serde(flatten)]
    pub phrasebook: Phrasebook,
    pub translations: Vec<SavedTranslation>,
}

/// Ordering for phrasebook listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Insertion order
    #[default]
    Id,
    Name,
}

impl SortKey {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            SortKey::Id => "id ASC",
            SortKey::Name => "name COLLATE NOCASE ASC, id ASC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPhrasebook {
    pub name: String,
    pub lang_from: String,
    pub lang_to: String,
    #[serde(default)]
    pub public: bool,
}

/// Editable phrasebook fields; languages are fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhrasebookEdit {
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_hides_password() {
        let user = User {
            id: 1,
            username: "testuser".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
        };

        let json = serde_json::to_string(&user).expect("serialize");
        assert!(json.contains("testuser"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_sort_key_parsing() {
        let key: SortKey = serde_json::from_str("\"name\"").expect("deserialize");
        assert_eq!(key, SortKey::Name);
        let key: SortKey = serde_json::from_str("\"id\"").expect("deserialize");
        assert_eq!(key, SortKey::Id);
        assert!(serde_json::from_str::<SortKey>("\"date\"").is_err());
        assert_eq!(SortKey::default(), SortKey::Id);
    }

    #[test]
    fn test_phrasebook_view_flattens_phrasebook() {
        let view = PhrasebookView {
            phrasebook: Phrasebook {
                id: 7,
                name: "Food".to_string(),
                user_id: 1,
                public: true,
                lang_from: "EN".to_string(),
                lang_to: "ES".to_string(),
            },
            translations: vec![],
        };

        let value = serde_json::to_value(&view).expect("serialize");
        assert_eq!(value["id"], 7);
        assert_eq!(value["name"], "Food");
        assert_eq!(value["public"], true);
        assert!(value["translations"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_new_phrasebook_defaults_to_private() {
        let input: NewPhrasebook =
            serde_json::from_str(r#"{"name":"Food","lang_from":"EN","lang_to":"ES"}"#)
                .expect("deserialize");
        assert!(!input.public);
    }
}
