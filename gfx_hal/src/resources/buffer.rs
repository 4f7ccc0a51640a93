use crate::backend::ObjectId;
use crate::device::Device;
use crate::handle::{Handle, Resource, ResourceKind};
use crate::types::{BufferAccessProfile, BufferMemoryProfile};

pub type Buffer = Handle<BufferObject>;

#[derive(Debug)]
pub struct BufferObject {
    device: Device,
    pub(crate) id: Option<ObjectId>,
    pub(crate) size: usize,
    pub(crate) profile: Option<(BufferMemoryProfile, BufferAccessProfile)>,
}

impl BufferObject {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            device,
            id: None,
            size: 0,
            profile: None,
        }
    }

    /// Returns the size assigned by the last recorded `assign_buffer_memory`.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn memory_profile(&self) -> Option<BufferMemoryProfile> {
        self.profile.map(|(memory, _)| memory)
    }

    pub fn access_profile(&self) -> Option<BufferAccessProfile> {
        self.profile.map(|(_, access)| access)
    }

    /// Returns the backend object, if it was created yet.
    #[inline]
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }
}

impl Resource for BufferObject {
    const KIND: ResourceKind = ResourceKind::Buffer;
}

impl Drop for BufferObject {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.device.enqueue_deletion(Self::KIND, move |engine| {
                engine.backend().delete_buffer(id);
            });
        }
    }
}
