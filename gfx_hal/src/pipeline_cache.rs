use std::collections::HashMap;

use parking_lot::Mutex;

use crate::backend::ObjectId;

/// Identity of a shader object, derived from its address.
///
/// The address stays valid while the shader is alive. Every cache entry referencing a shader
/// is removed before the shader is freed, so a reused address never hits a stale entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ShaderKey(pub(crate) usize);

/// The shader stages a program is linked from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ShaderSetKey {
    pub(crate) vertex: ShaderKey,
    pub(crate) pixel: Option<ShaderKey>,
    pub(crate) geometry: Option<ShaderKey>,
}

impl ShaderSetKey {
    fn contains(&self, shader: ShaderKey) -> bool {
        self.vertex == shader || self.pixel == Some(shader) || self.geometry == Some(shader)
    }
}

/// A cache of linked programs keyed by the shader objects they were linked from.
#[derive(Debug, Default)]
pub(crate) struct ProgramCache {
    programs: Mutex<HashMap<ShaderSetKey, ObjectId>>,
    /// Programs linked while another thread inserted the same key. They were never handed
    /// out and are deleted at teardown.
    orphans: Mutex<Vec<ObjectId>>,
}

impl ProgramCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the program for `key`, calling `link` to create it if it does not exist.
    ///
    /// The shaders in `key` must be kept alive for the duration of the call.
    pub(crate) fn get_or_link<F>(&self, key: ShaderSetKey, link: F) -> Result<ObjectId, String>
    where
        F: FnOnce() -> Result<ObjectId, String>,
    {
        if let Some(program) = self.programs.lock().get(&key) {
            return Ok(*program);
        }

        // Don't hold the lock while linking, shaders may be destroyed on other threads
        // in the meantime.
        let program = link()?;

        let mut programs = self.programs.lock();
        if let Some(existing) = programs.get(&key) {
            self.orphans.lock().push(program);
            return Ok(*existing);
        }

        tracing::debug!("linked program {:?} for {:?}", program, key);
        programs.insert(key, program);
        Ok(program)
    }

    /// Removes all programs linked from `shader` and returns them for deletion.
    pub(crate) fn invalidate_for(&self, shader: ShaderKey) -> Vec<ObjectId> {
        let mut removed = Vec::new();
        self.programs.lock().retain(|key, program| {
            if key.contains(shader) {
                removed.push(*program);
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            tracing::debug!("invalidated {} programs of {:?}", removed.len(), shader);
        }

        removed
    }

    /// Removes all cached and orphaned programs and returns them for deletion.
    pub(crate) fn drain(&self) -> Vec<ObjectId> {
        let mut programs: Vec<_> = self.programs.lock().drain().map(|(_, id)| id).collect();
        programs.append(&mut self.orphans.lock());
        programs
    }

    pub(crate) fn len(&self) -> usize {
        self.programs.lock().len()
    }
}
