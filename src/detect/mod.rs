mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{DetectionCapability, DetectorBackend};
pub use backends::{ScriptedBackend, SyntheticBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{
    filter_class, BoundingBox, Detection, ObjectClass, Point, BALL_CLASS_ID, GOALKEEPER_CLASS_ID,
    PLAYER_CLASS_ID, REFEREE_CLASS_ID,
};
