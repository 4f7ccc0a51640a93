use crate::backend::ObjectId;
use crate::device::Device;
use crate::handle::{Handle, Resource, ResourceKind};
use crate::types::TextureDescriptor;

pub type Texture = Handle<TextureObject>;

#[derive(Debug)]
pub struct TextureObject {
    device: Device,
    pub(crate) id: Option<ObjectId>,
    pub(crate) descriptor: Option<TextureDescriptor>,
}

impl TextureObject {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            device,
            id: None,
            descriptor: None,
        }
    }

    pub fn descriptor(&self) -> Option<&TextureDescriptor> {
        self.descriptor.as_ref()
    }

    #[inline]
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }
}

impl Resource for TextureObject {
    const KIND: ResourceKind = ResourceKind::Texture;
}

impl Drop for TextureObject {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.device.enqueue_deletion(Self::KIND, move |engine| {
                engine.backend().delete_texture(id);
            });
        }
    }
}
