use crate::device::{
    Attachment, CommandDevice, FramebufferDesc, FramebufferId, ReleaseQueue, Released, ResourceDevice,
};

/// Owned attachment set.
///
/// An incomplete attachment set leaves the wrapper invalid; callers are
/// expected to disable the feature that needed it.
#[derive(Debug, Default)]
pub struct Framebuffer {
    label: &'static str,
    id: Option<FramebufferId>,
    desc: Option<FramebufferDesc>,
    release: Option<ReleaseQueue>,
}

impl Framebuffer {
    pub fn new(label: &'static str) -> Self {
        let mut this = Self::default();
        this.label = label;
        this
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.id.is_some()
    }

    #[inline]
    pub fn id(&self) -> Option<FramebufferId> {
        self.id
    }

    /// Makes sure a framebuffer with exactly these attachments exists.
    ///
    /// Returns `true` only when it was (re)created.
    pub fn ensure(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        depth: Option<Attachment>,
        colors: &[Attachment],
    ) -> bool {
        let desc = FramebufferDesc {
            depth,
            colors: colors.to_vec(),
        };
        if self.is_valid() && self.desc.as_ref() == Some(&desc) {
            return false;
        }

        self.free(device);
        self.release = Some(device.release_queue().clone());
        match device.create_framebuffer(&desc) {
            Some(id) => {
                self.id = Some(id);
                self.desc = Some(desc);
                true
            }
            None => {
                log::warn!("framebuffer '{}' is incomplete and was not created", self.label);
                false
            }
        }
    }

    /// Binds the framebuffer. Does nothing and returns `false` when invalid.
    pub fn bind(&self, device: &mut (impl CommandDevice + ?Sized)) -> bool {
        match self.id {
            Some(id) => {
                device.bind_framebuffer(id);
                true
            }
            None => false,
        }
    }

    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        if let Some(id) = self.id.take() {
            device.destroy_framebuffer(id);
        }
        self.desc = None;
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        if let (Some(queue), Some(id)) = (&self.release, self.id.take()) {
            queue.push(Released::Framebuffer(id));
        }
    }
}
