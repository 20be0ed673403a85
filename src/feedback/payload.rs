use serde_json::{json, Map, Value};

use super::Feedback;
use crate::config::FeedbackSettings;

/// Submission body with the answers keyed by the form's own question names.
pub fn create_submission(settings: &FeedbackSettings, instance_id: &str, feedback: &Feedback) -> Value {
    let name = match feedback.name.trim() {
        "" => "Anonyme",
        name => name,
    };

    let mut submission = Map::new();
    submission.insert(
        "meta".to_string(),
        json!({ "instanceId": format!("uuid:{}", instance_id) }),
    );
    submission.insert(settings.name_field.clone(), json!(name));
    submission.insert(settings.rating_field.clone(), json!(feedback.rating));
    submission.insert(settings.comment_field.clone(), json!(feedback.comment.trim()));

    json!({
        "id": settings.form_id,
        "submission": submission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn answers_use_form_question_names() {
        let settings = FeedbackSettings {
            form_id: "form42".to_string(),
            ..FeedbackSettings::default()
        };
        let feedback = Feedback {
            name: "  ".to_string(),
            rating: 8,
            comment: " Très utile \n".to_string(),
        };
        let payload = create_submission(&settings, "abc", &feedback);

        assert_eq!(
            payload,
            json!({
                "id": "form42",
                "submission": {
                    "meta": { "instanceId": "uuid:abc" },
                    "Votre_nom": "Anonyme",
                    "Noter_l_application_de_1_a_10": 8,
                    "Votre_commentaire": "Très utile",
                }
            })
        );
    }

    #[test]
    fn question_names_follow_settings() {
        let settings = FeedbackSettings {
            form_id: "f".to_string(),
            name_field: "who".to_string(),
            rating_field: "score".to_string(),
            comment_field: "notes".to_string(),
            ..FeedbackSettings::default()
        };
        let feedback = Feedback {
            name: "Awa".to_string(),
            rating: 3,
            comment: String::new(),
        };
        let submission = &create_submission(&settings, "x", &feedback)["submission"];

        assert_eq!(submission["who"], json!("Awa"));
        assert_eq!(submission["score"], json!(3));
        assert_eq!(submission["notes"], json!(""));
        assert!(submission.get("Votre_nom").is_none());
    }
}
