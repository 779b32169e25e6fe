use serde::Serialize;

use crate::error::ServiceError;

pub const TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScore {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_class: String,
    pub confidence: f32,
    pub top_3_predictions: Vec<ClassScore>,
}

/// Indices of `scores` from highest to lowest. Equal scores keep their
/// original order.
pub fn rank(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

pub fn format_prediction(
    scores: &[f32],
    labels: &[String],
) -> Result<PredictionResult, ServiceError> {
    if scores.is_empty() {
        return Err(ServiceError::Inference("model returned no scores".into()));
    }
    if scores.len() != labels.len() {
        return Err(ServiceError::Inference(format!(
            "model returned {} scores for {} classes",
            scores.len(),
            labels.len()
        )));
    }

    let ranked = rank(scores);
    let top = ranked[0];

    let top_3_predictions = ranked
        .iter()
        .take(TOP_K)
        .map(|&idx| ClassScore {
            class_name: labels[idx].clone(),
            confidence: scores[idx],
        })
        .collect();

    Ok(PredictionResult {
        predicted_class: labels[top].clone(),
        confidence: scores[top],
        top_3_predictions,
    })
}
