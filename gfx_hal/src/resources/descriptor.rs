use crate::backend::BoundResource;
use crate::error::Error;
use crate::handle::{Handle, Resource, ResourceKind};
use crate::resources::{Buffer, Sampler, Texture};
use crate::types::DescriptorBindingType;

pub type ResourcesDescriptor = Handle<ResourcesDescriptorObject>;

#[derive(Clone, Debug)]
pub enum DescriptorResource {
    UniformBuffer(Buffer),
    StorageBuffer(Buffer),
    SampledTexture { texture: Texture, sampler: Sampler },
}

impl DescriptorResource {
    pub fn binding_type(&self) -> DescriptorBindingType {
        match self {
            Self::UniformBuffer(_) => DescriptorBindingType::UniformBuffer,
            Self::StorageBuffer(_) => DescriptorBindingType::StorageBuffer,
            Self::SampledTexture { .. } => DescriptorBindingType::SampledTexture,
        }
    }

    /// Resolves the backend objects of the resource.
    pub(crate) fn resolve(&self) -> Result<BoundResource, Error> {
        match self {
            Self::UniformBuffer(buffer) => buffer
                .read()?
                .id()
                .map(BoundResource::UniformBuffer)
                .ok_or(Error::NotReady(ResourceKind::Buffer)),
            Self::StorageBuffer(buffer) => buffer
                .read()?
                .id()
                .map(BoundResource::StorageBuffer)
                .ok_or(Error::NotReady(ResourceKind::Buffer)),
            Self::SampledTexture { texture, sampler } => {
                let texture = texture
                    .read()?
                    .id()
                    .ok_or(Error::NotReady(ResourceKind::Texture))?;
                let sampler = sampler
                    .read()?
                    .id()
                    .ok_or(Error::NotReady(ResourceKind::Sampler))?;
                Ok(BoundResource::SampledTexture { texture, sampler })
            }
        }
    }
}

/// A set of resources bound to shaders together.
///
/// The layout is set exactly once. Resources bound afterwards must match the layout.
#[derive(Debug, Default)]
pub struct ResourcesDescriptorObject {
    pub(crate) layout: Option<Vec<DescriptorBindingType>>,
    pub(crate) resources: Vec<DescriptorResource>,
    /// Incremented whenever resources are bound.
    pub(crate) version: u64,
}

impl ResourcesDescriptorObject {
    pub fn layout(&self) -> Option<&[DescriptorBindingType]> {
        self.layout.as_deref()
    }

    pub fn resources(&self) -> &[DescriptorResource] {
        &self.resources
    }

    pub(crate) fn set_layout(&mut self, layout: Vec<DescriptorBindingType>) -> Result<(), Error> {
        if self.layout.is_some() {
            return Err(Error::DescriptorLayoutAlreadySet);
        }

        self.layout = Some(layout);
        Ok(())
    }

    pub(crate) fn bind(&mut self, resources: Vec<DescriptorResource>) -> Result<(), Error> {
        let Some(layout) = &self.layout else {
            return Err(Error::DescriptorLayoutNotSet);
        };

        if layout.len() != resources.len() {
            return Err(Error::DescriptorLayoutMismatch(format!(
                "expected {} resources, got {}",
                layout.len(),
                resources.len()
            )));
        }

        for (index, (expected, resource)) in layout.iter().zip(&resources).enumerate() {
            if *expected != resource.binding_type() {
                return Err(Error::DescriptorLayoutMismatch(format!(
                    "binding {} expects {:?}, got {:?}",
                    index,
                    expected,
                    resource.binding_type()
                )));
            }
        }

        self.resources = resources;
        self.version += 1;
        Ok(())
    }
}

impl Resource for ResourcesDescriptorObject {
    const KIND: ResourceKind = ResourceKind::ResourcesDescriptor;
}
