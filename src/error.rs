//! Error types for broad-phase computation.

use thiserror::Error;

/// Configuration problems the caller must fix before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    /// An explicit cell size was not a positive finite number.
    #[error("cell size must be positive and finite, got {0}")]
    NonPositiveCellSize(f32),

    /// A stage that maps positions to cells ran before an origin was configured.
    #[error("spatial hash origin was not configured")]
    OriginNotSet,

    /// The configured origin has a NaN or infinite component.
    #[error("spatial hash origin must be finite")]
    NonFiniteOrigin,

    /// Automatic cell sizing produced a non-positive size.
    ///
    /// Happens when every sphere has a zero radius; pass an explicit cell
    /// size for point sets.
    #[error("cannot derive a cell size from max radius {max_radius}")]
    DegenerateCellSize { max_radius: f32 },

    /// An input sphere has a negative or NaN radius.
    #[error("sphere {object_id} has invalid radius {radius}")]
    InvalidRadius { object_id: usize, radius: f32 },
}

/// Errors that can occur while building the partition or collecting pairs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BroadPhaseError {
    /// Invalid spatial hash configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A device buffer could not grow to the requested length.
    #[error("failed to allocate {requested} elements for {what}")]
    Capacity { requested: usize, what: &'static str },

    /// A pipeline stage was invoked before the stage it depends on.
    #[error("pipeline stage `{found}` called before `{expected}`")]
    StageOrder {
        expected: &'static str,
        found: &'static str,
    },
}
