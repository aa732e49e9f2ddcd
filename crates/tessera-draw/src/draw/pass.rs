use crate::error::Result;
use crate::memory::ArenaIndex;

use super::command::Command;
use super::data::{DrawData, PassData, PassId, ShadingGroupId};
use super::state::DrawState;

/// Iterates the groups of a pass in replay order.
pub(crate) struct GroupIter<'a> {
    data: &'a DrawData,
    next: Option<ArenaIndex>,
}

impl Iterator for GroupIter<'_> {
    type Item = ArenaIndex;

    fn next(&mut self) -> Option<ArenaIndex> {
        let current = self.next?;
        self.next = self.data.group_at(current).next;
        Some(current)
    }
}

impl DrawData {
    /// Creates an empty pass. No device calls are made.
    pub fn create_pass(&mut self, name: impl Into<String>, state: DrawState) -> Result<PassId> {
        self.assert_recording();
        let index = self.passes.alloc(PassData {
            name: name.into(),
            state,
            first_group: None,
            last_group: None,
            original: None,
            next: None,
        })?;
        Ok(self.pass_id(index))
    }

    /// Creates a pass that replays the groups of `original` with its own state.
    ///
    /// Shading groups cannot be added to the new pass.
    pub fn create_pass_instance(&mut self, name: impl Into<String>, original: PassId, state: DrawState) -> Result<PassId> {
        let original = self.resolve_original(original);
        let pass = self.create_pass(name, state)?;
        self.pass_data_mut(pass).original = Some(original);
        Ok(pass)
    }

    /// Makes replaying `first` continue with `second`.
    pub fn link_passes(&mut self, first: PassId, second: PassId) {
        assert_ne!(first, second, "a pass cannot be linked to itself");
        self.pass_data(second);
        self.pass_data_mut(first).next = Some(second);
    }

    pub fn pass_name(&self, pass: PassId) -> &str {
        &self.pass_data(pass).name
    }

    pub fn pass_state(&self, pass: PassId) -> DrawState {
        self.pass_data(pass).state
    }

    pub fn set_pass_state(&mut self, pass: PassId, state: DrawState) {
        self.assert_recording();
        self.pass_data_mut(pass).state = state;
    }

    /// Whether replaying the pass would issue no draw.
    pub fn pass_is_empty(&self, pass: PassId) -> bool {
        self.pass_groups(pass).all(|g| self.shading_group_is_empty(self.group_id(g)))
    }

    /// Calls `f` for every shading group of the pass in replay order.
    pub fn foreach_shading_group(&self, pass: PassId, mut f: impl FnMut(ShadingGroupId)) {
        for g in self.pass_groups(pass) {
            f(self.group_id(g));
        }
    }

    /// Orders groups back to front along `view_forward`.
    ///
    /// The depth of a group is the origin of the object used by its first
    /// draw. Groups without a draw sort as if at `view_origin`. Ties keep
    /// their current order.
    pub fn sort_shading_groups_z(&mut self, pass: PassId, view_origin: [f32; 3], view_forward: [f32; 3]) {
        let groups: Vec<_> = self.own_groups(pass).collect();
        let mut keyed: Vec<(ArenaIndex, f32)> = groups
            .into_iter()
            .map(|g| {
                let depth = self
                    .first_draw_handle(g)
                    .map(|h| {
                        let p = self.resources.matrix(h).position();
                        (0..3).map(|i| (p[i] - view_origin[i]) * view_forward[i]).sum()
                    })
                    .unwrap_or(0.0);
                (g, depth)
            })
            .collect();

        keyed.sort_by(|a, b| b.1.total_cmp(&a.1));
        let order: Vec<_> = keyed.into_iter().map(|(g, _)| g).collect();
        self.relink_groups(pass, &order);
    }

    /// Reverses the replay order of the groups of a pass.
    pub fn sort_shading_groups_reverse(&mut self, pass: PassId) {
        let mut order: Vec<_> = self.own_groups(pass).collect();
        order.reverse();
        self.relink_groups(pass, &order);
    }

    /// Pass whose groups are replayed for `pass`.
    pub(crate) fn resolve_original(&self, pass: PassId) -> PassId {
        self.pass_data(pass).original.unwrap_or(pass)
    }

    /// Groups replayed for `pass`, following its original.
    pub(crate) fn pass_groups(&self, pass: PassId) -> GroupIter<'_> {
        let source = self.resolve_original(pass);
        GroupIter {
            data: self,
            next: self.pass_data(source).first_group,
        }
    }

    fn own_groups(&self, pass: PassId) -> GroupIter<'_> {
        let data = self.pass_data(pass);
        assert!(data.original.is_none(), "cannot reorder the groups of an aliased pass");
        GroupIter {
            data: self,
            next: data.first_group,
        }
    }

    fn first_draw_handle(&self, group: ArenaIndex) -> Option<crate::memory::ResourceHandle> {
        self.group_chunks(group)
            .flat_map(|chunk| chunk.commands().iter())
            .find_map(Command::handle)
    }

    fn relink_groups(&mut self, pass: PassId, order: &[ArenaIndex]) {
        self.assert_recording();
        for pair in order.windows(2) {
            self.group_at_mut(pair[0]).next = Some(pair[1]);
        }
        if let Some(&last) = order.last() {
            self.group_at_mut(last).next = None;
        }
        let data = self.pass_data_mut(pass);
        data.first_group = order.first().copied();
        data.last_group = order.last().copied();
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DrawConfig;
    use crate::device::{BatchId, Capabilities, PipelineId};
    use crate::draw::resources::IDENTITY;
    use crate::draw::{DrawData, DrawState};

    fn data() -> DrawData {
        DrawData::new(DrawConfig::default(), Capabilities::default()).unwrap()
    }

    fn at_z(z: f32) -> [[f32; 4]; 4] {
        let mut m = IDENTITY;
        m[3][2] = z;
        m
    }

    fn order(d: &DrawData, pass: crate::draw::PassId) -> Vec<crate::draw::ShadingGroupId> {
        let mut out = Vec::new();
        d.foreach_shading_group(pass, |g| out.push(g));
        out
    }

    // ── aliasing / linking ────────────────────────────────────────────────

    #[test]
    fn instance_pass_replays_original_groups() {
        let mut d = data();
        let p = d.create_pass("main", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        let inst = d.create_pass_instance("copy", p, DrawState::WRITE_COLOR).unwrap();

        assert_eq!(order(&d, inst), vec![g]);
        assert_eq!(d.pass_state(inst), DrawState::WRITE_COLOR);
        assert_eq!(d.pass_name(inst), "copy");
    }

    #[test]
    fn instance_of_instance_points_at_root() {
        let mut d = data();
        let p = d.create_pass("main", DrawState::DEFAULT).unwrap();
        let a = d.create_pass_instance("a", p, DrawState::DEFAULT).unwrap();
        let b = d.create_pass_instance("b", a, DrawState::DEFAULT).unwrap();
        assert_eq!(d.resolve_original(b), p);
    }

    #[test]
    #[should_panic(expected = "aliased pass")]
    fn groups_cannot_be_added_to_instances() {
        let mut d = data();
        let p = d.create_pass("main", DrawState::DEFAULT).unwrap();
        let inst = d.create_pass_instance("copy", p, DrawState::DEFAULT).unwrap();
        let _ = d.create_shading_group(inst, PipelineId(1));
    }

    // ── emptiness ─────────────────────────────────────────────────────────

    #[test]
    fn pass_is_empty_until_a_draw_is_recorded() {
        let mut d = data();
        let p = d.create_pass("main", DrawState::DEFAULT).unwrap();
        assert!(d.pass_is_empty(p));

        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        d.dispatch(g, [1, 1, 1]).unwrap();
        assert!(d.pass_is_empty(p));

        d.draw(g, BatchId(0), crate::memory::ResourceHandle::UNIT).unwrap();
        assert!(!d.pass_is_empty(p));
        let inst = d.create_pass_instance("copy", p, DrawState::DEFAULT).unwrap();
        assert!(!d.pass_is_empty(inst));
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn z_sort_orders_back_to_front_and_keeps_ties() {
        let mut d = data();
        let p = d.create_pass("transparent", DrawState::DEFAULT).unwrap();

        let mut groups = Vec::new();
        for z in [1.0, 5.0, 3.0, 5.0] {
            let g = d.create_shading_group(p, PipelineId(1)).unwrap();
            let h = d.resource_handle_new(at_z(z), false).unwrap();
            d.draw(g, BatchId(0), h).unwrap();
            groups.push(g);
        }

        d.sort_shading_groups_z(p, [0.0; 3], [0.0, 0.0, 1.0]);
        assert_eq!(order(&d, p), vec![groups[1], groups[3], groups[2], groups[0]]);
    }

    #[test]
    fn reverse_sort_flips_order() {
        let mut d = data();
        let p = d.create_pass("main", DrawState::DEFAULT).unwrap();
        let a = d.create_shading_group(p, PipelineId(1)).unwrap();
        let b = d.create_shading_group(p, PipelineId(2)).unwrap();
        d.sort_shading_groups_reverse(p);
        assert_eq!(order(&d, p), vec![b, a]);

        let c = d.create_shading_group(p, PipelineId(3)).unwrap();
        assert_eq!(order(&d, p), vec![b, a, c]);
    }
}
