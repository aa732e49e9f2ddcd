use bitflags::bitflags;

bitflags! {
    /// Pipeline state mask of a pass (write masks, depth test, culling, blending).
    ///
    /// Exactly one depth test and one blend mode are expected at a time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawState: u32 {
        const WRITE_COLOR = 1 << 0;
        const WRITE_DEPTH = 1 << 1;
        const WRITE_STENCIL = 1 << 2;

        const DEPTH_ALWAYS = 1 << 3;
        const DEPTH_LESS = 1 << 4;
        const DEPTH_LESS_EQUAL = 1 << 5;
        const DEPTH_EQUAL = 1 << 6;
        const DEPTH_GREATER = 1 << 7;
        const DEPTH_GREATER_EQUAL = 1 << 8;

        const CULL_BACK = 1 << 9;
        const CULL_FRONT = 1 << 10;

        const STENCIL_ALWAYS = 1 << 11;
        const STENCIL_EQUAL = 1 << 12;
        const STENCIL_NEQUAL = 1 << 13;

        const BLEND_ALPHA = 1 << 14;
        const BLEND_ALPHA_PREMUL = 1 << 15;
        const BLEND_ADD = 1 << 16;
        const BLEND_ADD_FULL = 1 << 17;
        const BLEND_MUL = 1 << 18;

        const CLIP_PLANES = 1 << 19;
        const PROGRAM_POINT_SIZE = 1 << 20;

        const DEPTH_TEST = Self::DEPTH_ALWAYS.bits()
            | Self::DEPTH_LESS.bits()
            | Self::DEPTH_LESS_EQUAL.bits()
            | Self::DEPTH_EQUAL.bits()
            | Self::DEPTH_GREATER.bits()
            | Self::DEPTH_GREATER_EQUAL.bits();
        const BLEND = Self::BLEND_ALPHA.bits()
            | Self::BLEND_ALPHA_PREMUL.bits()
            | Self::BLEND_ADD.bits()
            | Self::BLEND_ADD_FULL.bits()
            | Self::BLEND_MUL.bits();
        const STENCIL_TEST = Self::STENCIL_ALWAYS.bits()
            | Self::STENCIL_EQUAL.bits()
            | Self::STENCIL_NEQUAL.bits();

        const DEFAULT = Self::WRITE_COLOR.bits() | Self::WRITE_DEPTH.bits() | Self::DEPTH_LESS_EQUAL.bits();
    }
}

impl DrawState {
    /// Applies a recorded `enable`/`disable` pair.
    ///
    /// Enabling a depth test or blend mode replaces the previous one.
    pub fn apply(self, enable: DrawState, disable: DrawState) -> DrawState {
        let mut state = self;
        if enable.intersects(DrawState::DEPTH_TEST) {
            state.remove(DrawState::DEPTH_TEST);
        }
        if enable.intersects(DrawState::BLEND) {
            state.remove(DrawState::BLEND);
        }
        if enable.intersects(DrawState::STENCIL_TEST) {
            state.remove(DrawState::STENCIL_TEST);
        }
        (state | enable) - disable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabling_a_depth_test_replaces_the_current_one() {
        let s = DrawState::DEFAULT.apply(DrawState::DEPTH_ALWAYS, DrawState::empty());
        assert!(s.contains(DrawState::DEPTH_ALWAYS));
        assert!(!s.contains(DrawState::DEPTH_LESS_EQUAL));
        assert!(s.contains(DrawState::WRITE_COLOR));
    }

    #[test]
    fn disable_wins_over_enable() {
        let s = DrawState::empty().apply(DrawState::WRITE_DEPTH, DrawState::WRITE_DEPTH);
        assert!(!s.contains(DrawState::WRITE_DEPTH));
    }
}
