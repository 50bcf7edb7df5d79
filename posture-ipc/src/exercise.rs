use serde::{Deserialize, Serialize};

/// A stretching exercise from the static catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub title: String,
    pub description: String,
    #[serde(default = "general_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn general_category() -> String {
    "general".to_string()
}

impl Exercise {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: description.into(),
            category: category.into(),
            image_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_entries_without_category_are_general() {
        let ex: Exercise = serde_json::from_str(
            r#"{"id": 3, "title": "Eye rest", "description": "Look far away", "imageUrl": "eye.png"}"#,
        )
        .expect("exercise");
        assert_eq!(ex.category, "general");
        assert_eq!(ex.image_url.as_deref(), Some("eye.png"));
    }
}
