//! Stack and heap probe

use kinetic_hal::memory::MemoryProbe;

extern "C" {
    // End of .bss/.uninit, provided by the cortex-m-rt linker script
    static __sheap: u8;
}

/// Probe reading the main stack pointer
#[derive(Debug, Clone, Copy)]
pub struct CortexMMemory {
    heap_end: usize,
}

impl CortexMMemory {
    /// Firmware without a heap: static RAM ends at `__sheap`
    pub fn from_linker() -> Self {
        let heap_end = unsafe { core::ptr::addr_of!(__sheap) } as usize;
        Self { heap_end }
    }

    /// Firmware with a heap allocator whose top is known
    pub const fn with_heap_end(heap_end: usize) -> Self {
        Self { heap_end }
    }
}

impl MemoryProbe for CortexMMemory {
    fn stack_pointer(&self) -> usize {
        cortex_m::register::msp::read() as usize
    }

    fn heap_end(&self) -> usize {
        self.heap_end
    }
}
