use crate::device::{BarrierFlags, BatchId, BufferId, ClearBits, Geometry, PrimitiveType, StencilState};
use crate::error::{DrawError, Result};
use crate::memory::{ArenaIndex, ResourceHandle};

use super::state::DrawState;
use super::uniform::BindRef;

/// Upper bound of command slots in one chunk (fits the kind bitmask).
pub const MAX_COMMANDS_PER_CHUNK: usize = 96;

const KIND_BITS: usize = 4;
const KINDS_PER_WORD: usize = u64::BITS as usize / KIND_BITS;
const KIND_WORDS: usize = MAX_COMMANDS_PER_CHUNK / KINDS_PER_WORD;

/// 4-bit command tag. Draw kinds come first so `is_draw` is one compare.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    Draw = 0,
    DrawRange,
    DrawInstance,
    DrawInstanceRange,
    DrawProcedural,
    DrawIndirect,
    Compute,
    ComputeRef,
    ComputeIndirect,
    Barrier,
    Clear,
    SetState,
    SetStencil,
    SetSelectId,
}

impl CommandKind {
    const LAST_DRAW: CommandKind = CommandKind::DrawIndirect;

    const ALL: [CommandKind; 14] = [
        CommandKind::Draw,
        CommandKind::DrawRange,
        CommandKind::DrawInstance,
        CommandKind::DrawInstanceRange,
        CommandKind::DrawProcedural,
        CommandKind::DrawIndirect,
        CommandKind::Compute,
        CommandKind::ComputeRef,
        CommandKind::ComputeIndirect,
        CommandKind::Barrier,
        CommandKind::Clear,
        CommandKind::SetState,
        CommandKind::SetStencil,
        CommandKind::SetSelectId,
    ];

    #[inline]
    pub const fn is_draw(self) -> bool {
        self as u8 <= Self::LAST_DRAW as u8
    }

    #[inline]
    fn from_bits(bits: u8) -> CommandKind {
        Self::ALL[bits as usize]
    }
}

/// One recorded device operation.
///
/// Draw kinds carry the [`ResourceHandle`] of the per-object data they use.
#[derive(Debug, Clone)]
pub enum Command {
    Draw {
        batch: BatchId,
        handle: ResourceHandle,
    },
    DrawRange {
        batch: BatchId,
        handle: ResourceHandle,
        vertex_first: u32,
        vertex_count: u32,
    },
    DrawInstance {
        batch: BatchId,
        handle: ResourceHandle,
        instance_count: u32,
    },
    DrawInstanceRange {
        batch: BatchId,
        handle: ResourceHandle,
        instance_first: u32,
        instance_count: u32,
    },
    DrawProcedural {
        primitive: PrimitiveType,
        handle: ResourceHandle,
        vertex_count: u32,
    },
    DrawIndirect {
        geometry: Geometry,
        handle: ResourceHandle,
        buffer: BufferId,
        offset: u64,
    },
    Compute {
        groups: [u32; 3],
    },
    /// Group counts read when the command is replayed.
    ComputeRef {
        groups: BindRef<[u32; 3]>,
    },
    ComputeIndirect {
        buffer: BufferId,
        offset: u64,
    },
    Barrier {
        flags: BarrierFlags,
    },
    Clear {
        bits: ClearBits,
        color: [f32; 4],
        depth: f32,
        stencil: u8,
    },
    SetState {
        enable: DrawState,
        disable: DrawState,
    },
    SetStencil(StencilState),
    SetSelectId(u32),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Draw { .. } => CommandKind::Draw,
            Command::DrawRange { .. } => CommandKind::DrawRange,
            Command::DrawInstance { .. } => CommandKind::DrawInstance,
            Command::DrawInstanceRange { .. } => CommandKind::DrawInstanceRange,
            Command::DrawProcedural { .. } => CommandKind::DrawProcedural,
            Command::DrawIndirect { .. } => CommandKind::DrawIndirect,
            Command::Compute { .. } => CommandKind::Compute,
            Command::ComputeRef { .. } => CommandKind::ComputeRef,
            Command::ComputeIndirect { .. } => CommandKind::ComputeIndirect,
            Command::Barrier { .. } => CommandKind::Barrier,
            Command::Clear { .. } => CommandKind::Clear,
            Command::SetState { .. } => CommandKind::SetState,
            Command::SetStencil(_) => CommandKind::SetStencil,
            Command::SetSelectId(_) => CommandKind::SetSelectId,
        }
    }

    /// Per-object data handle of draw commands.
    pub fn handle(&self) -> Option<ResourceHandle> {
        match self {
            Command::Draw { handle, .. }
            | Command::DrawRange { handle, .. }
            | Command::DrawInstance { handle, .. }
            | Command::DrawInstanceRange { handle, .. }
            | Command::DrawProcedural { handle, .. }
            | Command::DrawIndirect { handle, .. } => Some(*handle),
            _ => None,
        }
    }

    pub fn batch(&self) -> Option<BatchId> {
        match self {
            Command::Draw { batch, .. }
            | Command::DrawRange { batch, .. }
            | Command::DrawInstance { batch, .. }
            | Command::DrawInstanceRange { batch, .. } => Some(*batch),
            Command::DrawIndirect {
                geometry: Geometry::Batch(batch),
                ..
            } => Some(*batch),
            _ => None,
        }
    }
}

/// Fixed-capacity block of commands, singly linked to the next block of the
/// same shading group.
#[derive(Debug)]
pub struct CommandChunk {
    commands: Vec<Command>,
    capacity: usize,
    kinds: [u64; KIND_WORDS],
    pub(crate) next: Option<ArenaIndex>,
}

impl CommandChunk {
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        assert!(
            capacity > 0 && capacity <= MAX_COMMANDS_PER_CHUNK,
            "command chunk capacity out of range"
        );
        let mut commands = Vec::new();
        commands
            .try_reserve_exact(capacity)
            .map_err(|_| DrawError::OutOfMemory {
                requested_bytes: capacity * std::mem::size_of::<Command>(),
            })?;
        Ok(Self {
            commands,
            capacity,
            kinds: [0; KIND_WORDS],
            next: None,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.commands.len() == self.capacity
    }

    pub fn next(&self) -> Option<ArenaIndex> {
        self.next
    }

    pub(crate) fn push(&mut self, command: Command) {
        assert!(!self.is_full(), "command chunk overflow");
        let slot = self.commands.len();
        let kind = command.kind() as u64;
        self.kinds[slot / KINDS_PER_WORD] |= kind << ((slot % KINDS_PER_WORD) * KIND_BITS);
        self.commands.push(command);
    }

    /// Kind of the command in `slot`, read from the packed tag array.
    #[inline]
    pub fn kind(&self, slot: usize) -> CommandKind {
        debug_assert!(slot < self.commands.len());
        let bits = (self.kinds[slot / KINDS_PER_WORD] >> ((slot % KINDS_PER_WORD) * KIND_BITS)) & 0xF;
        CommandKind::from_bits(bits as u8)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn has_draw(&self) -> bool {
        (0..self.len()).any(|i| self.kind(i).is_draw())
    }

    /// Whether every slot holds a plain `Draw`, the only kind safe to reorder.
    pub fn only_plain_draws(&self) -> bool {
        !self.is_empty() && (0..self.len()).all(|i| self.kind(i) == CommandKind::Draw)
    }

    /// Stable sort by geometry batch. Only applies to chunks of plain draws.
    pub(crate) fn sort_by_batch(&mut self) -> bool {
        if !self.only_plain_draws() {
            return false;
        }
        self.commands.sort_by_key(|c| c.batch());
        true
    }
}
