//! Free memory estimate
//!
//! The estimate is the gap between the current stack pointer and the top
//! of the heap. It is a diagnostic, not an allocator guarantee.

/// Memory layout probe
pub trait MemoryProbe {
    /// Current stack pointer address
    fn stack_pointer(&self) -> usize;

    /// Highest address in use by the heap (or static data when there is
    /// no heap)
    fn heap_end(&self) -> usize;
}

/// Bytes between the stack pointer and the heap end
///
/// Saturates at zero when the stack has already grown into the heap.
pub fn free_memory<P: MemoryProbe + ?Sized>(probe: &P) -> usize {
    let sp = probe.stack_pointer();
    let heap = probe.heap_end();
    let free = sp.saturating_sub(heap);
    if free == 0 {
        warn!("Stack at {=usize:#x} reached heap end {=usize:#x}", sp, heap);
    }
    free
}

/// Portable probe using the address of a local as the stack pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameProbe {
    heap_end: usize,
}

impl FrameProbe {
    /// Probe with a known heap end address
    pub const fn new(heap_end: usize) -> Self {
        Self { heap_end }
    }
}

impl MemoryProbe for FrameProbe {
    #[inline(never)]
    fn stack_pointer(&self) -> usize {
        let marker = 0u8;
        core::hint::black_box(&marker) as *const u8 as usize
    }

    fn heap_end(&self) -> usize {
        self.heap_end
    }
}
