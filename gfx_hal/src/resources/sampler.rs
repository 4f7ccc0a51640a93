use crate::backend::ObjectId;
use crate::device::Device;
use crate::handle::{Handle, Resource, ResourceKind};

pub type Sampler = Handle<SamplerObject>;

#[derive(Debug)]
pub struct SamplerObject {
    device: Device,
    pub(crate) id: Option<ObjectId>,
}

impl SamplerObject {
    pub(crate) fn new(device: Device) -> Self {
        Self { device, id: None }
    }

    #[inline]
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }
}

impl Resource for SamplerObject {
    const KIND: ResourceKind = ResourceKind::Sampler;
}

impl Drop for SamplerObject {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.device.enqueue_deletion(Self::KIND, move |engine| {
                engine.backend().delete_sampler(id);
            });
        }
    }
}
