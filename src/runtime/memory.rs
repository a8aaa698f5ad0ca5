use crate::compiler::memory::{MemoryConfig, Segment};
use crate::lang::{Value, ValueType};
use crate::runtime::vm_error::VmFault;

/// Run-time storage for one memory segment: four typed partitions of
/// `Option` cells, mirroring the compile-time address layout. A cell stays
/// `None` until its first write, so reading garbage is a fault instead of a
/// default value.
#[derive(Debug, Clone)]
pub struct MemoryBlock {
    start: u32,
    partition_size: u32,
    ints: Vec<Option<i64>>,
    floats: Vec<Option<f64>>,
    chars: Vec<Option<char>>,
    bools: Vec<Option<bool>>,
}

impl MemoryBlock {
    pub fn new(config: &MemoryConfig, segment: Segment) -> Self {
        let (start, _) = config.range(segment);
        let size = config.partition_size(segment) as usize;
        MemoryBlock {
            start,
            partition_size: config.partition_size(segment),
            ints: vec![None; size],
            floats: vec![None; size],
            chars: vec![None; size],
            bools: vec![None; size],
        }
    }

    /// (partition type, offset within partition) for an absolute address.
    fn locate(&self, addr: u32) -> Result<(ValueType, usize), VmFault> {
        if addr < self.start {
            return Err(VmFault::AddressOutOfBounds { addr });
        }
        let offset = addr - self.start;
        let partition = (offset / self.partition_size) as usize;
        let ty = ValueType::from_partition_index(partition)
            .ok_or(VmFault::AddressOutOfBounds { addr })?;
        Ok((ty, (offset % self.partition_size) as usize))
    }

    pub fn read(&self, addr: u32) -> Result<Value, VmFault> {
        let (ty, index) = self.locate(addr)?;
        let value = match ty {
            ValueType::Int => self.ints[index].map(Value::Int),
            ValueType::Float => self.floats[index].map(Value::Float),
            ValueType::Char => self.chars[index].map(Value::Char),
            ValueType::Bool => self.bools[index].map(Value::Bool),
        };
        value.ok_or(VmFault::UninitializedMemory { addr })
    }

    /// Stores `value` at `addr`. The only coercion is the widening the
    /// type system permits: an int written into a float cell. Anything else
    /// mismatched is a fault, since the compiler never emits it.
    pub fn write(&mut self, addr: u32, value: Value) -> Result<(), VmFault> {
        let (ty, index) = self.locate(addr)?;
        match (ty, value) {
            (ValueType::Int, Value::Int(n)) => self.ints[index] = Some(n),
            (ValueType::Float, Value::Float(x)) => self.floats[index] = Some(x),
            (ValueType::Float, Value::Int(n)) => self.floats[index] = Some(n as f64),
            (ValueType::Char, Value::Char(c)) => self.chars[index] = Some(c),
            (ValueType::Bool, Value::Bool(b)) => self.bools[index] = Some(b),
            (expected, found) => {
                return Err(VmFault::TypeFault {
                    addr,
                    expected,
                    found: found.value_type(),
                });
            }
        }
        Ok(())
    }
}
