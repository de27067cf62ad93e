pub mod error;
pub mod executor;
pub mod resource;
pub mod target;

pub use error::{RavenError, RavenResult};
pub use executor::{BooleanMode, ExecArgument, ExecArgumentKind, Executor, TargetRule};
pub use resource::{Resource, ResourceMetadata, ResourceProperty, ResourcePropertyType};
pub use target::{match_fragment, ExecutionTarget, OneOrMany, TagGroup, TagRule};
