use std::collections::HashMap;

use crate::backend::ObjectId;
use crate::device::Device;
use crate::handle::{Handle, Resource, ResourceKind};
use crate::pipeline_cache::ShaderKey;
use crate::types::ShaderType;

pub type Shader = Handle<ShaderObject>;

/// Maps a binding of a resources descriptor to a named binding in a shader.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderBinding {
    pub slot: usize,
    pub binding: usize,
    pub name: String,
}

#[derive(Debug)]
pub struct ShaderObject {
    device: Device,
    pub(crate) id: Option<ObjectId>,
    pub(crate) ty: Option<ShaderType>,
    pub(crate) compiled: bool,
    /// `(descriptor slot, binding index) -> location`
    pub(crate) locations: HashMap<(usize, usize), u32>,
}

impl ShaderObject {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            device,
            id: None,
            ty: None,
            compiled: false,
            locations: HashMap::new(),
        }
    }

    pub fn ty(&self) -> Option<ShaderType> {
        self.ty
    }

    /// Returns `true` if the last compilation succeeded.
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    #[inline]
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub fn location(&self, slot: usize, binding: usize) -> Option<u32> {
        self.locations.get(&(slot, binding)).copied()
    }

    #[inline]
    pub(crate) fn key(&self) -> ShaderKey {
        ShaderKey(self as *const Self as usize)
    }
}

impl Resource for ShaderObject {
    const KIND: ResourceKind = ResourceKind::Shader;
}

impl Drop for ShaderObject {
    fn drop(&mut self) {
        // The cache must forget this shader before its address can be reused.
        let programs = self.device.programs().invalidate_for(self.key());
        let id = self.id;

        if programs.is_empty() && id.is_none() {
            return;
        }

        self.device.enqueue_deletion(Self::KIND, move |engine| {
            for program in programs {
                engine.backend().delete_program(program);
            }

            if let Some(id) = id {
                engine.backend().delete_shader(id);
            }
        });
    }
}
