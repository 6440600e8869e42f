pub mod arbiter;
pub mod config;
pub mod debug;
pub mod ecs;
pub mod error;
pub mod events;
pub mod gesture;
pub mod math;
pub mod placement;
pub mod registry;
pub mod session;
pub mod templates;
pub mod tracking;

pub use config::CoreConfig;
pub use ecs::components::{BehaviorPhase, InstanceId, Transform};
pub use error::{ConfigError, CoreError};
pub use events::{CoreEvent, SceneCommand};
pub use gesture::{MouseSample, SurfaceRaycaster, Touch, TouchPhase};
pub use math::{Camera, Pose};
pub use session::{ArSession, FrameInput, PointerInput};
pub use templates::{Template, TemplateDatabase, TemplateTable};
pub use tracking::{AnchorEvent, TrackingConfidence};
