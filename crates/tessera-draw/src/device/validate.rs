//! Descriptor checks shared by the backends.

use super::types::{Attachment, FramebufferDesc, TextureDesc, TextureDimension, TextureId};
use super::Capabilities;

pub(crate) fn texture_desc(caps: &Capabilities, desc: &TextureDesc) -> Result<(), &'static str> {
    let e = desc.extent;
    if e.is_empty() {
        return Err("zero extent");
    }
    if e.width > caps.max_texture_size || e.height > caps.max_texture_size {
        return Err("extent exceeds max_texture_size");
    }
    let full_chain = 32 - e.width.max(e.height).leading_zeros();
    if desc.mip_count == 0 || desc.mip_count > full_chain {
        return Err("invalid mip count");
    }
    match desc.dimension {
        TextureDimension::Cube | TextureDimension::CubeArray if e.width != e.height || e.depth % 6 != 0 => {
            Err("cube faces must be square and come in sets of 6")
        }
        TextureDimension::D1 | TextureDimension::D1Array if e.height != 1 => Err("1D textures have height 1"),
        TextureDimension::D1 | TextureDimension::D2 if e.depth != 1 => Err("non-layered texture with depth"),
        _ => Ok(()),
    }
}

fn attachment_extent<'a>(
    att: &Attachment,
    lookup: &impl Fn(TextureId) -> Option<&'a TextureDesc>,
) -> Option<(u32, u32)> {
    let desc = lookup(att.texture)?;
    if att.mip >= desc.mip_count {
        return None;
    }
    if let Some(layer) = att.layer {
        let addressable = desc.dimension.is_layered() || desc.dimension == TextureDimension::D3;
        if !addressable || layer >= desc.extent.depth {
            return None;
        }
    }
    let e = desc.extent.mip(att.mip, desc.dimension);
    Some((e.width, e.height))
}

/// Checks framebuffer completeness and returns the common attachment size.
pub(crate) fn framebuffer_desc<'a>(
    desc: &FramebufferDesc,
    lookup: impl Fn(TextureId) -> Option<&'a TextureDesc>,
) -> Result<(u32, u32), String> {
    let mut extent = None;
    for att in desc.depth.iter().chain(desc.colors.iter()) {
        let Some(e) = attachment_extent(att, &lookup) else {
            return Err(format!("invalid attachment {att:?}"));
        };
        match extent {
            None => extent = Some(e),
            Some(prev) if prev != e => {
                return Err(format!("attachment extents differ ({prev:?} vs {e:?})"));
            }
            Some(_) => {}
        }
    }
    if let Some(depth) = &desc.depth {
        if !lookup(depth.texture).is_some_and(|t| t.format.has_depth_aspect()) {
            return Err("depth attachment without depth aspect".into());
        }
    }
    for color in &desc.colors {
        if lookup(color.texture).is_some_and(|t| t.format.is_depth_stencil_format()) {
            return Err("color attachment with a depth format".into());
        }
    }
    extent.ok_or_else(|| "no attachments".into())
}
