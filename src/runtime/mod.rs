pub mod memory;
pub mod vm;
pub mod vm_error;

pub use vm::Vm;
pub use vm_error::{VmError, VmFault};
