use serde::{Deserialize, Serialize};

use crate::compiler::compile_error::CompileError;
use crate::lang::ValueType;

/// The four scope segments of the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Global,
    Local,
    Constant,
    Temporary,
}

impl Segment {
    pub fn name(self) -> &'static str {
        match self {
            Segment::Global => "global",
            Segment::Local => "local",
            Segment::Constant => "constant",
            Segment::Temporary => "temporary",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The fixed address-range layout shared by the compiler and the VM.
///
/// Each segment is an inclusive `(start, end)` range, quartered into
/// int/float/char/bool partitions. An address's numeric value alone
/// determines its segment and type; no side table is consulted at run time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub global: (u32, u32),
    pub local: (u32, u32),
    pub constant: (u32, u32),
    pub temporary: (u32, u32),
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            global: (1_000, 4_999),
            local: (5_000, 8_999),
            constant: (9_000, 12_999),
            temporary: (13_000, 16_999),
        }
    }
}

impl MemoryConfig {
    pub fn range(&self, segment: Segment) -> (u32, u32) {
        match segment {
            Segment::Global => self.global,
            Segment::Local => self.local,
            Segment::Constant => self.constant,
            Segment::Temporary => self.temporary,
        }
    }

    /// Size of one type partition inside `segment` (a quarter of the range).
    pub fn partition_size(&self, segment: Segment) -> u32 {
        let (start, end) = self.range(segment);
        (end - start + 1) / 4
    }

    /// Which segment an absolute address belongs to, if any.
    pub fn segment_of(&self, addr: u32) -> Option<Segment> {
        for segment in [
            Segment::Global,
            Segment::Local,
            Segment::Constant,
            Segment::Temporary,
        ] {
            let (start, end) = self.range(segment);
            if (start..=end).contains(&addr) {
                return Some(segment);
            }
        }
        None
    }

    /// True when every segment range is ordered, wide enough for four
    /// non-empty type partitions, and disjoint from the others. The VM
    /// checks this before trusting a decoded layout; partition arithmetic
    /// divides by the quarter size and assumes non-overlapping ranges.
    pub fn is_well_formed(&self) -> bool {
        let mut ranges = [self.global, self.local, self.constant, self.temporary];
        for &(start, end) in &ranges {
            // `end - start + 1` must itself fit in u32
            if start > end || end - start < 3 || (start, end) == (0, u32::MAX) {
                return false;
            }
        }
        ranges.sort_unstable();
        ranges.windows(2).all(|pair| pair[0].1 < pair[1].0)
    }

    /// Which data type an absolute address holds, determined purely by
    /// range containment.
    pub fn type_of(&self, addr: u32) -> Option<ValueType> {
        let segment = self.segment_of(addr)?;
        let (start, _) = self.range(segment);
        let partition = ((addr - start) / self.partition_size(segment)) as usize;
        ValueType::from_partition_index(partition)
    }
}

/// Compile-time address allocator for one segment: four bump cursors, one
/// per type partition.
#[derive(Debug, Clone)]
pub struct AddressBlock {
    segment: Segment,
    start: u32,
    partition_size: u32,
    cursors: [u32; 4],
}

impl AddressBlock {
    pub fn new(segment: Segment, start: u32, end: u32) -> Self {
        AddressBlock {
            segment,
            start,
            partition_size: (end - start + 1) / 4,
            cursors: [0; 4],
        }
    }

    /// Hands out `count` contiguous addresses in the partition for `ty`.
    pub fn allocate(&mut self, ty: ValueType, count: u32) -> Result<u32, CompileError> {
        let idx = ty.partition_index();
        match self.cursors[idx].checked_add(count) {
            Some(needed) if needed <= self.partition_size => {}
            _ => {
                return Err(CompileError::OutOfMemory {
                    segment: self.segment,
                    ty,
                });
            }
        }
        let addr = self.start + idx as u32 * self.partition_size + self.cursors[idx];
        self.cursors[idx] += count;
        Ok(addr)
    }
}

/// Owns the four compile-time address blocks.
#[derive(Debug, Clone)]
pub struct VirtualMemoryManager {
    config: MemoryConfig,
    global: AddressBlock,
    local: AddressBlock,
    constant: AddressBlock,
    temporary: AddressBlock,
}

impl VirtualMemoryManager {
    pub fn new(config: MemoryConfig) -> Self {
        let block = |segment| {
            let (start, end) = config.range(segment);
            AddressBlock::new(segment, start, end)
        };
        VirtualMemoryManager {
            config,
            global: block(Segment::Global),
            local: block(Segment::Local),
            constant: block(Segment::Constant),
            temporary: block(Segment::Temporary),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn allocate(
        &mut self,
        segment: Segment,
        ty: ValueType,
        count: u32,
    ) -> Result<u32, CompileError> {
        let block = match segment {
            Segment::Global => &mut self.global,
            Segment::Local => &mut self.local,
            Segment::Constant => &mut self.constant,
            Segment::Temporary => &mut self.temporary,
        };
        block.allocate(ty, count)
    }

    /// Rewinds the local and temporary cursors to their range starts.
    /// Called whenever compilation returns to global scope: each function's
    /// locals and temporaries are laid out independently.
    pub fn reset_local_and_temp(&mut self) {
        let (start, end) = self.config.range(Segment::Local);
        self.local = AddressBlock::new(Segment::Local, start, end);
        let (start, end) = self.config.range(Segment::Temporary);
        self.temporary = AddressBlock::new(Segment::Temporary, start, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_monotonic_within_partition() {
        let mut block = AddressBlock::new(Segment::Global, 1_000, 4_999);
        let a = block.allocate(ValueType::Int, 1).unwrap();
        let b = block.allocate(ValueType::Int, 1).unwrap();
        let c = block.allocate(ValueType::Int, 3).unwrap();
        let d = block.allocate(ValueType::Int, 1).unwrap();
        assert_eq!(a, 1_000);
        assert_eq!(b, 1_001);
        assert_eq!(c, 1_002);
        assert_eq!(d, 1_005);
    }

    #[test]
    fn test_partitions_are_disjoint() {
        let mut block = AddressBlock::new(Segment::Global, 1_000, 4_999);
        let int = block.allocate(ValueType::Int, 1).unwrap();
        let float = block.allocate(ValueType::Float, 1).unwrap();
        let ch = block.allocate(ValueType::Char, 1).unwrap();
        let boolean = block.allocate(ValueType::Bool, 1).unwrap();
        assert_eq!(int, 1_000);
        assert_eq!(float, 2_000);
        assert_eq!(ch, 3_000);
        assert_eq!(boolean, 4_000);
    }

    #[test]
    fn test_allocations_never_overlap() {
        let mut block = AddressBlock::new(Segment::Local, 5_000, 8_999);
        let mut seen = Vec::new();
        for ty in ValueType::all() {
            for _ in 0..10 {
                let addr = block.allocate(ty, 2).unwrap();
                seen.push((addr, addr + 1));
            }
        }
        for (i, a) in seen.iter().enumerate() {
            for b in seen.iter().skip(i + 1) {
                assert!(a.1 < b.0 || b.1 < a.0, "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_exhausting_a_partition_fails() {
        // 40 addresses total, 10 per partition
        let mut block = AddressBlock::new(Segment::Temporary, 0, 39);
        for _ in 0..10 {
            block.allocate(ValueType::Bool, 1).unwrap();
        }
        let err = block.allocate(ValueType::Bool, 1).unwrap_err();
        assert!(matches!(
            err,
            CompileError::OutOfMemory {
                segment: Segment::Temporary,
                ty: ValueType::Bool,
            }
        ));
        // Other partitions are unaffected
        assert!(block.allocate(ValueType::Int, 1).is_ok());
    }

    #[test]
    fn test_block_request_exceeding_partition_fails() {
        let mut block = AddressBlock::new(Segment::Global, 0, 39);
        assert!(block.allocate(ValueType::Int, 11).is_err());
        assert!(block.allocate(ValueType::Int, 10).is_ok());
    }

    #[test]
    fn test_huge_block_request_fails_cleanly() {
        let mut block = AddressBlock::new(Segment::Global, 1_000, 4_999);
        block.allocate(ValueType::Int, 5).unwrap();
        assert!(block.allocate(ValueType::Int, u32::MAX).is_err());
    }

    #[test]
    fn test_default_config_is_well_formed() {
        assert!(MemoryConfig::default().is_well_formed());
    }

    #[test]
    fn test_degenerate_configs_are_rejected() {
        let mut config = MemoryConfig::default();
        config.local = (5_000, 5_001); // narrower than four partitions
        assert!(!config.is_well_formed());

        let mut config = MemoryConfig::default();
        config.local = (5_000, 4_000); // inverted
        assert!(!config.is_well_formed());

        let mut config = MemoryConfig::default();
        config.constant = (4_000, 7_999); // overlaps global and local
        assert!(!config.is_well_formed());
    }

    #[test]
    fn test_reset_local_and_temp_rewinds_cursors() {
        let mut manager = VirtualMemoryManager::new(MemoryConfig::default());
        let first = manager.allocate(Segment::Local, ValueType::Int, 1).unwrap();
        manager.allocate(Segment::Temporary, ValueType::Float, 4).unwrap();
        manager.reset_local_and_temp();
        assert_eq!(
            manager.allocate(Segment::Local, ValueType::Int, 1).unwrap(),
            first
        );
    }

    #[test]
    fn test_reset_leaves_global_and_constant_alone() {
        let mut manager = VirtualMemoryManager::new(MemoryConfig::default());
        manager.allocate(Segment::Global, ValueType::Int, 1).unwrap();
        manager.allocate(Segment::Constant, ValueType::Int, 1).unwrap();
        manager.reset_local_and_temp();
        assert_eq!(
            manager.allocate(Segment::Global, ValueType::Int, 1).unwrap(),
            1_001
        );
        assert_eq!(
            manager.allocate(Segment::Constant, ValueType::Int, 1).unwrap(),
            9_001
        );
    }

    #[test]
    fn test_segment_of_routes_by_range() {
        let config = MemoryConfig::default();
        assert_eq!(config.segment_of(1_000), Some(Segment::Global));
        assert_eq!(config.segment_of(4_999), Some(Segment::Global));
        assert_eq!(config.segment_of(5_000), Some(Segment::Local));
        assert_eq!(config.segment_of(9_000), Some(Segment::Constant));
        assert_eq!(config.segment_of(13_000), Some(Segment::Temporary));
        assert_eq!(config.segment_of(17_000), None);
        assert_eq!(config.segment_of(0), None);
    }

    #[test]
    fn test_type_of_reads_the_partition_quarter() {
        let config = MemoryConfig::default();
        assert_eq!(config.type_of(1_000), Some(ValueType::Int));
        assert_eq!(config.type_of(2_000), Some(ValueType::Float));
        assert_eq!(config.type_of(3_000), Some(ValueType::Char));
        assert_eq!(config.type_of(4_000), Some(ValueType::Bool));
        assert_eq!(config.type_of(13_500), Some(ValueType::Int));
        assert_eq!(config.type_of(20_000), None);
    }

    #[test]
    fn test_allocator_agrees_with_type_classification() {
        let config = MemoryConfig::default();
        let mut manager = VirtualMemoryManager::new(config);
        for segment in [
            Segment::Global,
            Segment::Local,
            Segment::Constant,
            Segment::Temporary,
        ] {
            for ty in ValueType::all() {
                let addr = manager.allocate(segment, ty, 1).unwrap();
                assert_eq!(config.segment_of(addr), Some(segment));
                assert_eq!(config.type_of(addr), Some(ty));
            }
        }
    }
}
