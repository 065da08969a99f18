use std::sync::Mutex;

use classifier_common::{PacketContext, Staging};

/// One scratch slot per logical CPU.
///
/// Writers never block: a slot that is busy or out of range is reported as a
/// staging failure, the same way a failed per-CPU map lookup is in the kernel.
pub struct StagingBuffer {
    slots: Box<[Mutex<Option<PacketContext>>]>,
}

impl StagingBuffer {
    pub fn new(cpus: usize) -> Self {
        Self {
            slots: (0..cpus).map(|_| Mutex::new(None)).collect(),
        }
    }

    pub fn cpus(&self) -> usize {
        self.slots.len()
    }

    /// Current content of `cpu`'s slot.
    pub fn read(&self, cpu: u32) -> Option<PacketContext> {
        let slot = self.slots.get(cpu as usize)?;
        match slot.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Staging for StagingBuffer {
    fn stage(&self, cpu: u32, ctx: &PacketContext) -> Result<(), ()> {
        let slot = self.slots.get(cpu as usize).ok_or(())?;
        let mut guard = slot.try_lock().map_err(|_| ())?;
        *guard = Some(*ctx);
        Ok(())
    }
}
