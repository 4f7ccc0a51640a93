use std::collections::HashMap;

use crate::backend::ObjectId;
use crate::device::Device;
use crate::handle::{Handle, Resource, ResourceKind};
use crate::resources::Texture;
use crate::types::FrameBufferAttachment;

/// A render target.
///
/// The empty handle refers to the default frame buffer.
pub type FrameBuffer = Handle<FrameBufferObject>;

#[derive(Debug)]
pub struct FrameBufferObject {
    device: Device,
    pub(crate) id: Option<ObjectId>,
    pub(crate) attachments: HashMap<FrameBufferAttachment, Texture>,
}

impl FrameBufferObject {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            device,
            id: None,
            attachments: HashMap::new(),
        }
    }

    pub fn attachment(&self, attachment: FrameBufferAttachment) -> Option<&Texture> {
        self.attachments.get(&attachment)
    }

    #[inline]
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }
}

impl Resource for FrameBufferObject {
    const KIND: ResourceKind = ResourceKind::FrameBuffer;
}

impl Drop for FrameBufferObject {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.device.enqueue_deletion(Self::KIND, move |engine| {
                engine.backend().delete_frame_buffer(id);
            });
        }
    }
}
