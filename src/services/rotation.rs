//! Maps a container rotation tag to the pixel operations that undo it.
//!
//! A tag of N degrees tells players to display the frames rotated by N
//! degrees clockwise. Baking that orientation into the pixels means applying
//! the matching transform and clearing the tag on the output.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransposeDirection {
    Clockwise,
    CounterClockwise,
}

/// One pixel-level operation, applied in plan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "direction")]
pub enum TransformOp {
    Transpose(TransposeDirection),
    FlipHorizontal,
    FlipVertical,
}

impl TransformOp {
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, TransformOp::Transpose(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformPlan {
    pub operations: Vec<TransformOp>,
    pub clear_rotation_flag: bool,
}

impl TransformPlan {
    pub fn is_identity(&self) -> bool {
        self.operations.is_empty()
    }

    /// Frame size after every operation in the plan has been applied.
    pub fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        self.operations
            .iter()
            .fold((width, height), |(w, h), op| {
                if op.swaps_dimensions() { (h, w) } else { (w, h) }
            })
    }
}

/// Resolves the correction plan for a detected rotation.
///
/// Multiples of 90 outside `[0, 360)` are folded into range first. Anything
/// that is not a right angle passes through untouched; the tag is cleared
/// either way.
pub fn resolve(rotation_degrees: i32) -> TransformPlan {
    let operations = match rotation_degrees.rem_euclid(360) {
        0 => Vec::new(),
        90 => vec![TransformOp::Transpose(TransposeDirection::CounterClockwise)],
        270 => vec![TransformOp::Transpose(TransposeDirection::Clockwise)],
        180 => vec![TransformOp::FlipHorizontal, TransformOp::FlipVertical],
        _ => {
            tracing::warn!(
                "Unsupported rotation {}°, passing pixels through unchanged",
                rotation_degrees
            );
            Vec::new()
        }
    };

    TransformPlan {
        operations,
        clear_rotation_flag: true,
    }
}
