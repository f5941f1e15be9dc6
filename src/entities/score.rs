// 🏅 Score Entity - A judge's recorded result for one selection
//
// Scores are the irreplaceable artifact. Nothing in the merge creates,
// rewrites or deletes them; they follow their selection wherever it moves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: String,
    pub selection_id: String,
    pub judge_name: String,

    /// Points or time as entered on the score sheet
    pub result: f64,

    pub recorded_at: DateTime<Utc>,
}

impl Score {
    pub fn new(selection_id: &str, judge_name: &str, result: f64) -> Self {
        Score {
            id: uuid::Uuid::new_v4().to_string(),
            selection_id: selection_id.to_string(),
            judge_name: judge_name.to_string(),
            result,
            recorded_at: Utc::now(),
        }
    }
}
