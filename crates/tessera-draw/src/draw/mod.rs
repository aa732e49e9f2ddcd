//! Frame recording and replay.
//!
//! Responsibilities:
//! - record passes, shading groups, commands and bindings into arenas
//! - own the per-object matrices and infos addressed by resource handles
//! - replay a closed frame against a `CommandDevice`
//! - record data refinement jobs through a capability-selected strategy
//!
//! Everything recorded lives in [`DrawData`] until its next `reset`.

mod command;
mod data;
mod pass;
mod refine;
mod replay;
mod resources;
mod shgroup;
mod state;
mod uniform;

pub use command::{Command, CommandChunk, CommandKind, MAX_COMMANDS_PER_CHUNK};
pub use data::{DrawData, PassId, Phase, ShadingGroupId};
pub use refine::{select_refiner, ComputeRefiner, DataRefiner, RefineJob, SerialRefiner};
pub use replay::ReplayEnv;
pub use resources::{invert, Mat4, ObjectInfos, ObjectMatrix, ResourceStore, IDENTITY};
pub use shgroup::{BuiltinLocations, PipelineInfo};
pub use state::DrawState;
pub use uniform::{BindRef, Uniform, UniformBinding};
