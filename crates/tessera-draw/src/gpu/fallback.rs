use crate::device::{ResourceDevice, TextureId};

use super::Texture;

/// 1×1 stand-in textures bound when the real one is missing, so shaders never
/// sample an unbound slot.
#[derive(Debug)]
pub struct FallbackTextures {
    zero: Texture,
    one: Texture,
}

impl FallbackTextures {
    pub fn new() -> Self {
        Self {
            zero: Texture::new("fallback zero"),
            one: Texture::new("fallback one"),
        }
    }

    /// Transparent black, created on first use.
    pub fn zero(&mut self, device: &mut (impl ResourceDevice + ?Sized)) -> Option<TextureId> {
        Self::ensure(&mut self.zero, device, [0; 4])
    }

    /// Opaque white, created on first use.
    pub fn one(&mut self, device: &mut (impl ResourceDevice + ?Sized)) -> Option<TextureId> {
        Self::ensure(&mut self.one, device, [0xFF; 4])
    }

    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        self.zero.free(device);
        self.one.free(device);
    }

    fn ensure(texture: &mut Texture, device: &mut (impl ResourceDevice + ?Sized), texel: [u8; 4]) -> Option<TextureId> {
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if texture.ensure_2d(device, wgpu::TextureFormat::Rgba8Unorm, 1, 1, usage, 1) {
            texture.update(device, 0, &texel);
        }
        texture.id()
    }
}

impl Default for FallbackTextures {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, RecordingDevice};

    #[test]
    fn textures_are_created_once_and_filled() {
        let mut dev = RecordingDevice::new();
        let mut fallback = FallbackTextures::new();

        let zero = fallback.zero(&mut dev).unwrap();
        assert_eq!(fallback.zero(&mut dev), Some(zero));
        let one = fallback.one(&mut dev).unwrap();
        assert_ne!(zero, one);

        assert_eq!(dev.textures_created(), 2);
        let uploads = dev
            .calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::UpdateTexture { len: 4, .. }))
            .count();
        assert_eq!(uploads, 2);
    }

    #[test]
    fn creation_failure_yields_none() {
        let mut dev = RecordingDevice::new();
        let mut fallback = FallbackTextures::new();
        dev.fail_next_creations(1);
        assert!(fallback.zero(&mut dev).is_none());
        assert!(fallback.zero(&mut dev).is_some());
    }
}
