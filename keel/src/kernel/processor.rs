use crate::config::MAX_PROCESSORS;
use crate::kernel::instance::InstanceId;
use crate::kernel::thread::ThreadId;
use bit_field::BitField;

/// Index of a processor in the per-processor table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcessorId(pub usize);

/// An opaque set of processors.
///
/// Backed by a single word; [`MAX_PROCESSORS`] bounds the valid indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProcessorMask(u64);

impl ProcessorMask {
    pub const EMPTY: ProcessorMask = ProcessorMask(0);

    pub fn from_indices(indices: &[usize]) -> ProcessorMask {
        let mut mask = ProcessorMask::EMPTY;
        for &index in indices {
            mask.add(ProcessorId(index));
        }
        mask
    }

    pub fn add(&mut self, processor: ProcessorId) {
        debug_assert!(processor.0 < MAX_PROCESSORS);
        self.0.set_bit(processor.0, true);
    }

    pub fn remove(&mut self, processor: ProcessorId) {
        debug_assert!(processor.0 < MAX_PROCESSORS);
        self.0.set_bit(processor.0, false);
    }

    pub fn contains(&self, processor: ProcessorId) -> bool {
        debug_assert!(processor.0 < MAX_PROCESSORS);
        self.0.get_bit(processor.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn intersects(&self, other: &ProcessorMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessorId> + '_ {
        let bits = self.0;
        (0..MAX_PROCESSORS.min(64)).filter_map(move |index| {
            if bits.get_bit(index) {
                Some(ProcessorId(index))
            } else {
                None
            }
        })
    }
}

/// Per-processor scheduling state.
///
/// The heir pointer and the dispatch-necessary flag form the dispatch
/// trigger: scheduling decisions update them under the scheduler lock, and
/// the platform's dispatcher consumes them at its next safe preemption
/// point. The executing pointer is not touched by scheduling decisions.
#[derive(Debug)]
pub struct PerCpu {
    pub(crate) executing: Option<ThreadId>,
    pub(crate) heir: Option<ThreadId>,
    pub(crate) dispatch_necessary: bool,
    pub(crate) instance: Option<InstanceId>,
}

impl PerCpu {
    pub(crate) const fn new() -> PerCpu {
        PerCpu {
            executing: None,
            heir: None,
            dispatch_necessary: false,
            instance: None,
        }
    }

    pub fn executing(&self) -> Option<ThreadId> {
        self.executing
    }

    pub fn heir(&self) -> Option<ThreadId> {
        self.heir
    }

    pub fn dispatch_necessary(&self) -> bool {
        self.dispatch_necessary
    }

    pub fn instance(&self) -> Option<InstanceId> {
        self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_membership() {
        let mut mask = ProcessorMask::from_indices(&[0, 2]);
        assert!(mask.contains(ProcessorId(0)));
        assert!(!mask.contains(ProcessorId(1)));
        assert_eq!(mask.count(), 2);

        mask.remove(ProcessorId(0));
        assert!(!mask.contains(ProcessorId(0)));
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn mask_intersection() {
        let a = ProcessorMask::from_indices(&[0, 1]);
        let b = ProcessorMask::from_indices(&[1, 2]);
        let c = ProcessorMask::from_indices(&[3]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(ProcessorMask::EMPTY.is_empty());
    }

    #[test]
    fn mask_iteration() {
        let mask = ProcessorMask::from_indices(&[1, 4, 7]);
        let indices: alloc::vec::Vec<usize> = mask.iter().map(|p| p.0).collect();
        assert_eq!(indices, [1, 4, 7]);
    }
}
