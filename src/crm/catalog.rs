//! Pipeline catalog rules: stage-order validation and the built-in default
//! pipeline installed on an empty database.

use std::collections::HashSet;

use dealflow_common::{CreatePipelineRequest, NewStage, Stage};

use crate::errors::CrmError;

/// Check the invariants a pipeline's stage list must satisfy before it is
/// written: dense unique `sort_order` from 0, `is_won` only on final stages,
/// a non-final first stage, probabilities in 0..=100 and non-empty names.
///
/// An empty list is valid; deals simply cannot be created in that pipeline.
pub fn validate_stages(stages: &[NewStage]) -> Result<(), CrmError> {
    let mut seen = HashSet::new();
    for stage in stages {
        if stage.name.trim().is_empty() {
            return Err(CrmError::InvalidInput("stage name must not be empty".into()));
        }
        if !(0..=100).contains(&stage.win_probability) {
            return Err(CrmError::InvalidInput(format!(
                "stage '{}': win_probability must be between 0 and 100, got {}",
                stage.name, stage.win_probability
            )));
        }
        if stage.is_won && !stage.is_final {
            return Err(CrmError::InvalidInput(format!(
                "stage '{}': a won stage must also be final",
                stage.name
            )));
        }
        if !seen.insert(stage.sort_order) {
            return Err(CrmError::InvalidInput(format!(
                "duplicate sort_order {}",
                stage.sort_order
            )));
        }
    }

    let len = stages.len() as i32;
    if let Some(gap) = (0..len).find(|order| !seen.contains(order)) {
        return Err(CrmError::InvalidInput(format!(
            "sort_order must be dense from 0 to {}; {} is missing",
            len - 1,
            gap
        )));
    }

    if let Some(first) = stages.iter().find(|s| s.sort_order == 0) {
        if first.is_final {
            return Err(CrmError::InvalidInput(format!(
                "first stage '{}' must not be final",
                first.name
            )));
        }
    }

    Ok(())
}

pub fn validate_pipeline(req: &CreatePipelineRequest) -> Result<(), CrmError> {
    if req.name.trim().is_empty() {
        return Err(CrmError::InvalidInput("pipeline name must not be empty".into()));
    }
    validate_stages(&req.stages)
}

/// The writable fields of a stored stage.
pub fn draft(stage: &Stage) -> NewStage {
    NewStage {
        name: stage.name.clone(),
        description: stage.description.clone(),
        color: stage.color.clone(),
        sort_order: stage.sort_order,
        win_probability: stage.win_probability,
        is_final: stage.is_final,
        is_won: stage.is_won,
    }
}

/// Index at which a stage asking for `sort_order` goes into an ordered list
/// of `len` other stages. Positions past the end would leave a gap.
pub fn insert_position(sort_order: i32, len: usize) -> Result<usize, CrmError> {
    usize::try_from(sort_order)
        .ok()
        .filter(|position| *position <= len)
        .ok_or_else(|| {
            CrmError::InvalidInput(format!(
                "sort_order must be between 0 and {}, got {}",
                len, sort_order
            ))
        })
}

/// Give every stage its index as `sort_order`.
pub fn renumber<'a>(stages: impl IntoIterator<Item = &'a mut NewStage>) {
    for (order, stage) in stages.into_iter().enumerate() {
        stage.sort_order = order as i32;
    }
}

fn stage(name: &str, description: &str, color: &str, sort_order: i32, win_probability: i32) -> NewStage {
    NewStage {
        name: name.to_string(),
        description: Some(description.to_string()),
        color: color.to_string(),
        sort_order,
        win_probability,
        is_final: false,
        is_won: false,
    }
}

/// The pipeline installed when neither the database nor the configuration
/// defines one.
pub fn default_pipeline() -> CreatePipelineRequest {
    let mut won = stage("Won", "Deal closed successfully", "#059669", 5, 100);
    won.is_final = true;
    won.is_won = true;
    let mut lost = stage("Lost", "Deal fell through", "#EF4444", 6, 0);
    lost.is_final = true;

    CreatePipelineRequest {
        name: "Main pipeline".to_string(),
        description: Some("Standard sales pipeline".to_string()),
        sort_order: 0,
        stages: vec![
            stage("New lead", "First contact", "#94A3B8", 0, 10),
            stage("Qualification", "Needs discovery", "#3B82F6", 1, 25),
            stage("Proposal", "Commercial offer sent", "#8B5CF6", 2, 50),
            stage("Negotiation", "Terms under discussion", "#F59E0B", 3, 75),
            stage("Contract", "Preparing and signing", "#10B981", 4, 90),
            won,
            lost,
        ],
    }
}
