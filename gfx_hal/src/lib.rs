//! A graphics abstraction with a single engine thread.
//!
//! A [`Context`] owns the engine thread and the [`Backend`] running on it. Resources are shared
//! through reference-counted [`Handle`]s that can be created, recorded into
//! [`CommandBuffer`]s and dropped from any thread; every backend call is made by tasks executing
//! on the engine thread in queue order.
//!
//! ```no_run
//! use gfx_hal::backend::headless::HeadlessBackend;
//! use gfx_hal::{Commands, Config, Context, ErrorChannel, QueueClass};
//!
//! let errors = ErrorChannel::new(|message| eprintln!("{}", message));
//! let context = Context::start(&Config::default(), errors, HeadlessBackend::new).unwrap();
//!
//! let pipeline = context.new_graphics_pipeline();
//! let buffer = context.new_command_buffer();
//!
//! let mut recording = buffer.begin_recording().unwrap();
//! recording.bind_graphics_pipeline(&pipeline).unwrap();
//! recording
//!     .draw_vertices(gfx_hal::DrawPrimitive::Triangles, 3, 0, 1, 0)
//!     .unwrap();
//! recording.end_recording();
//!
//! context.submit_command_buffer(&buffer, QueueClass::General).unwrap();
//! context.stop();
//! ```

pub mod backend;
pub mod config;

mod binding;
mod command_buffer;
mod context;
mod device;
mod engine;
mod error;
mod fence;
mod handle;
mod pipeline_cache;
mod resources;
mod types;

pub use backend::{Backend, Limits, ObjectId};
pub use binding::{MAX_DESCRIPTOR_SLOTS, MAX_VERTEX_BINDINGS};
pub use command_buffer::{CommandBuffer, CommandBufferObject, Commands, Immediate, Recording};
pub use config::Config;
pub use context::Context;
pub use engine::EngineState;
pub use error::{Error, ErrorChannel};
pub use fence::{wait_multiple, Fence, FenceObject};
pub use gfx_tasks::QueueClass;
pub use handle::{Handle, Resource, ResourceKind};
pub use resources::*;
pub use types::*;
