use crate::handle::{Handle, Resource, ResourceKind};
use crate::resources::Shader;
use crate::types::{DepthStencilConfig, RasterizationConfig, VertexAttributeConfig};

pub type GraphicsPipeline = Handle<GraphicsPipelineObject>;

/// The shaders of a graphics pipeline. Only the vertex stage is required.
#[derive(Clone, Debug, Default)]
pub struct ShaderStages {
    pub vertex: Shader,
    pub pixel: Shader,
    pub geometry: Shader,
}

#[derive(Clone, Debug, Default)]
pub struct GraphicsPipelineConfig {
    pub vertex_layout: Vec<VertexAttributeConfig>,
    pub shaders: ShaderStages,
    pub rasterization: RasterizationConfig,
    pub depth_stencil: DepthStencilConfig,
}

#[derive(Debug, Default)]
pub struct GraphicsPipelineObject {
    pub(crate) config: Option<GraphicsPipelineConfig>,
    /// Incremented on every reconfiguration.
    pub(crate) version: u64,
}

impl GraphicsPipelineObject {
    pub fn config(&self) -> Option<&GraphicsPipelineConfig> {
        self.config.as_ref()
    }

    pub(crate) fn configure(&mut self, config: GraphicsPipelineConfig) {
        self.config = Some(config);
        self.version += 1;
    }
}

impl Resource for GraphicsPipelineObject {
    const KIND: ResourceKind = ResourceKind::GraphicsPipeline;
}
