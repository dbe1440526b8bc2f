//! Recomposition Config Builder
//!
//! Maps the operations of an EditPlan onto clip, transition and overlay
//! instructions for the rendering backend.

use tracing::debug;

use super::config::{
    ClipEditInstruction, CompositionConfig, OverlayEditInstruction, RenderOverrides,
    RenderSettings, TransitionEditInstruction, UpdatedCompositionConfig,
};
use crate::core::edit::{EditOperation, EditPlan, OperationParams, TargetType};

/// Builds an `UpdatedCompositionConfig` from a plan
#[derive(Clone, Debug)]
pub struct RecompositionConfigBuilder {
    composition_id: String,
    generation_id: String,
    original: CompositionConfig,
    overrides: RenderOverrides,
}

impl RecompositionConfigBuilder {
    pub fn new(composition_id: &str, generation_id: &str, original: CompositionConfig) -> Self {
        Self {
            composition_id: composition_id.to_string(),
            generation_id: generation_id.to_string(),
            original,
            overrides: RenderOverrides::default(),
        }
    }

    /// Overrides top-level render settings
    pub fn with_overrides(mut self, overrides: RenderOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn build(&self, plan: &EditPlan) -> UpdatedCompositionConfig {
        let mut config = UpdatedCompositionConfig {
            composition_id: self.composition_id.clone(),
            generation_id: self.generation_id.clone(),
            clip_edits: Vec::new(),
            transition_edits: Vec::new(),
            overlay_edits: Vec::new(),
            render_settings: RenderSettings::resolve(&self.original, &self.overrides),
            original_config: self.original.clone(),
        };

        for (index, op) in plan.operations.iter().enumerate() {
            match op.target_type {
                TargetType::Clip | TargetType::Audio => {
                    config.clip_edits.extend(clip_edits(index, op));
                }
                TargetType::Transition => {
                    if let Some(edit) = transition_edit(op) {
                        config.transition_edits.push(edit);
                    }
                }
                TargetType::Visual => {
                    if let Some(edit) = overlay_edit(index, op) {
                        config.overlay_edits.push(edit);
                    }
                }
                TargetType::Timeline => {
                    debug!(
                        "Operation {} ({}) targets the whole timeline; no instruction emitted",
                        index,
                        op.operation_type()
                    );
                }
            }
        }

        debug!(
            "Built recomposition config for {}: {} clip, {} transition, {} overlay edit(s)",
            self.composition_id,
            config.clip_edits.len(),
            config.transition_edits.len(),
            config.overlay_edits.len()
        );
        config
    }
}

fn clip_edits(operation_index: usize, op: &EditOperation) -> Vec<ClipEditInstruction> {
    let template = ClipEditInstruction {
        clip_index: 0,
        operation_index,
        ..Default::default()
    };

    let template = match &op.params {
        OperationParams::Trim(p) => ClipEditInstruction {
            trim_end: p.end_time,
            duration: p.duration.or(p.end_time),
            ..template
        },
        OperationParams::Speed(p) => ClipEditInstruction {
            speed: p.factor,
            ..template
        },
        OperationParams::Volume(p) => ClipEditInstruction {
            volume: p.level,
            fade_in: p.fade_in,
            fade_out: p.fade_out,
            ..template
        },
        OperationParams::Filter(p) => ClipEditInstruction {
            filter: p.filter_name.clone(),
            ..template
        },
        // An overlay aimed at a clip still belongs to the overlay layer
        _ => template,
    };

    if template.is_empty() {
        return Vec::new();
    }

    op.distinct_targets()
        .into_iter()
        .map(|clip_index| ClipEditInstruction {
            clip_index,
            ..template.clone()
        })
        .collect()
}

fn transition_edit(op: &EditOperation) -> Option<TransitionEditInstruction> {
    let (from_clip, to_clip) = match op.target_clips.as_slice() {
        [from, to, ..] => (*from, *to),
        [from] => (*from, from.checked_add(1)?),
        [] => return None,
    };

    let (transition_type, duration, easing) = match &op.params {
        OperationParams::Transition(p) => (p.transition_type.clone(), p.duration, p.easing.clone()),
        _ => (None, None, None),
    };

    Some(TransitionEditInstruction {
        from_clip,
        to_clip,
        transition_type,
        duration,
        easing,
    })
}

fn overlay_edit(operation_index: usize, op: &EditOperation) -> Option<OverlayEditInstruction> {
    let OperationParams::Overlay(p) = &op.params else {
        return None;
    };

    Some(OverlayEditInstruction {
        overlay_id: p
            .overlay_id
            .clone()
            .unwrap_or_else(|| format!("overlay_{}", operation_index)),
        text: p.text.clone(),
        position: p.position.clone(),
        start_time: p.start_time,
        end_time: p.end_time,
        duration: p.duration,
        style: p.style.clone(),
    })
}
