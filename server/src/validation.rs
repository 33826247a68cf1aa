use chrono::{DateTime, FixedOffset};
use platform_api::FieldError;
use platform_db::NewActivity;
use serde::Deserialize;

const REQUIRED: &str = "is required";
const ONE_OF_CATEGORIES: &str = "must be one of TASK EVENT";
/// `0001-01-01T00:00:00Z`, the zero value clients send for an unset date.
const ZERO_DATE_SECS: i64 = -62_135_596_800;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Task,
    Event,
}

impl Category {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "TASK" => Some(Category::Task),
            "EVENT" => Some(Category::Event),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Task => "TASK",
            Category::Event => "EVENT",
        }
    }
}

/// Request body for create and update. `id` and `created_at` are server-owned and ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ActivityPayload {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub activity_date: Option<DateTime<FixedOffset>>,
    pub status: Option<String>,
}

/// Check every required field and report all failures at once.
pub fn validate_activity(payload: ActivityPayload) -> Result<NewActivity, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = required_text("title", payload.title, &mut errors);
    let category = match payload.category.as_deref() {
        None | Some("") => {
            errors.push(FieldError::new("category", REQUIRED));
            None
        }
        Some(raw) => {
            let parsed = Category::parse(raw);
            if parsed.is_none() {
                errors.push(FieldError::new("category", ONE_OF_CATEGORIES));
            }
            parsed
        }
    };
    let description = required_text("description", payload.description, &mut errors);
    let activity_date = payload.activity_date.filter(|date| !is_zero_date(date));
    if activity_date.is_none() {
        errors.push(FieldError::new("activity_date", REQUIRED));
    }

    match (title, category, description, activity_date) {
        (Some(title), Some(category), Some(description), Some(activity_date)) => {
            Ok(NewActivity {
                title,
                category: category.as_str().to_string(),
                description,
                activity_date,
                status: payload.status.unwrap_or_default(),
            })
        }
        _ => Err(errors),
    }
}

fn is_zero_date(date: &DateTime<FixedOffset>) -> bool {
    date.timestamp() == ZERO_DATE_SECS && date.timestamp_subsec_nanos() == 0
}

fn required_text(
    field: &'static str,
    value: Option<String>,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match value {
        Some(text) if !text.is_empty() => Some(text),
        _ => {
            errors.push(FieldError::new(field, REQUIRED));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> ActivityPayload {
        serde_json::from_value(value).unwrap()
    }

    fn fields(errors: &[FieldError]) -> Vec<&'static str> {
        errors.iter().map(|err| err.field).collect()
    }

    #[test]
    fn complete_payload_passes() {
        let activity = validate_activity(payload(json!({
            "id": 42,
            "title": "Buy milk",
            "category": "TASK",
            "description": "2%",
            "activity_date": "2024-01-01T00:00:00Z",
            "created_at": "1999-01-01T00:00:00Z"
        })))
        .unwrap();
        assert_eq!(activity.title, "Buy milk");
        assert_eq!(activity.category, "TASK");
        assert_eq!(activity.status, "");
        assert_eq!(activity.activity_date.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn status_is_passed_through_unchecked() {
        let activity = validate_activity(payload(json!({
            "title": "Standup",
            "category": "EVENT",
            "description": "daily",
            "activity_date": "2024-03-04T09:00:00+07:00",
            "status": "whatever goes"
        })))
        .unwrap();
        assert_eq!(activity.status, "whatever goes");
    }

    #[test]
    fn empty_body_reports_every_required_field() {
        let errors = validate_activity(ActivityPayload::default()).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["title", "category", "description", "activity_date"]
        );
        assert!(errors.iter().all(|err| err.reason == REQUIRED));
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let errors = validate_activity(payload(json!({
            "title": "",
            "category": "",
            "description": "",
            "activity_date": "2024-01-01T00:00:00Z"
        })))
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["title", "category", "description"]);
    }

    #[test]
    fn category_outside_enumeration_is_rejected() {
        for category in ["NOTE", "task", "Event", " TASK"] {
            let errors = validate_activity(payload(json!({
                "title": "t",
                "category": category,
                "description": "d",
                "activity_date": "2024-01-01T00:00:00Z"
            })))
            .unwrap_err();
            assert_eq!(errors, vec![FieldError::new("category", ONE_OF_CATEGORIES)]);
        }
    }

    #[test]
    fn zero_date_is_missing() {
        for date in ["0001-01-01T00:00:00Z", "0001-01-01T02:00:00+02:00"] {
            let errors = validate_activity(payload(json!({
                "title": "t",
                "category": "TASK",
                "description": "d",
                "activity_date": date
            })))
            .unwrap_err();
            assert_eq!(errors, vec![FieldError::new("activity_date", REQUIRED)]);
        }
        assert!(
            validate_activity(payload(json!({
                "title": "t",
                "category": "TASK",
                "description": "d",
                "activity_date": "0001-01-01T00:00:01Z"
            })))
            .is_ok()
        );
    }

    #[test]
    fn null_date_is_missing() {
        let errors = validate_activity(payload(json!({
            "title": "t",
            "category": "EVENT",
            "description": "d",
            "activity_date": null
        })))
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["activity_date"]);
    }
}
