//! Resource objects owned by [`Handle`]s.
//!
//! Objects wrapping a backend object delete it from their destructor by enqueuing a deletion
//! task. The backend object itself is created lazily by the first task that needs it.
//!
//! [`Handle`]: crate::Handle

mod buffer;
mod descriptor;
mod frame_buffer;
mod pipeline;
mod sampler;
mod shader;
mod texture;

pub use buffer::{Buffer, BufferObject};
pub use descriptor::{DescriptorResource, ResourcesDescriptor, ResourcesDescriptorObject};
pub use frame_buffer::{FrameBuffer, FrameBufferObject};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig, GraphicsPipelineObject, ShaderStages};
pub use sampler::{Sampler, SamplerObject};
pub use shader::{Shader, ShaderBinding, ShaderObject};
pub use texture::{Texture, TextureObject};
