use std::io::{self, BufRead, Write};

use crate::compiler::memory::Segment;
use crate::compiler::quad::{CompiledProgram, Operand, Operator};
use crate::lang::{Value, ValueType};
use crate::runtime::memory::MemoryBlock;
use crate::runtime::vm_error::{VmError, VmFault};

/// One activation: a function's local and temporary storage plus where to
/// resume when it returns. Main runs in the base frame, which is never
/// popped.
#[derive(Debug)]
struct Frame {
    locals: MemoryBlock,
    temps: MemoryBlock,
    return_ip: usize,
}

impl Frame {
    fn new(program: &CompiledProgram) -> Self {
        Frame {
            locals: MemoryBlock::new(&program.config, Segment::Local),
            temps: MemoryBlock::new(&program.config, Segment::Temporary),
            return_ip: 0,
        }
    }
}

/// A frame under construction between `era` and `gosub`. A nested call in
/// an argument expression completes its whole protocol before the outer
/// `era` runs, so one pending slot is enough.
#[derive(Debug)]
struct PendingCall {
    frame: Frame,
    function: usize,
}

/// The quadruple interpreter.
///
/// Execution is a plain instruction-pointer loop over the sealed program;
/// every address is classified by value alone through the shared
/// `MemoryConfig`. I/O goes through injected handles so tests can run
/// programs against in-memory buffers.
pub struct Vm<'a> {
    program: &'a CompiledProgram,
    globals: MemoryBlock,
    constants: MemoryBlock,
    frames: Vec<Frame>,
    pending: Option<PendingCall>,
    input: Box<dyn BufRead + 'a>,
    output: Box<dyn Write + 'a>,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a CompiledProgram) -> Result<Self, VmError> {
        Self::with_io(
            program,
            Box::new(io::BufReader::new(io::stdin())),
            Box::new(io::stdout()),
        )
    }

    pub fn with_io(
        program: &'a CompiledProgram,
        input: Box<dyn BufRead + 'a>,
        output: Box<dyn Write + 'a>,
    ) -> Result<Self, VmError> {
        // A decoded object file can carry any layout; partition arithmetic
        // below needs ordered, four-wide, disjoint ranges.
        if !program.config.is_well_formed() {
            return Err(VmFault::MalformedMemoryLayout.at(0));
        }
        let mut constants = MemoryBlock::new(&program.config, Segment::Constant);
        for &(value, addr) in &program.constants {
            constants.write(addr, value).map_err(|f| f.at(0))?;
        }
        Ok(Vm {
            program,
            globals: MemoryBlock::new(&program.config, Segment::Global),
            constants,
            frames: vec![Frame::new(program)],
            pending: None,
            input,
            output,
        })
    }

    pub fn run(&mut self) -> Result<(), VmError> {
        let mut ip = 0;
        while ip < self.program.quads.len() {
            match self.step(ip).map_err(|fault| fault.at(ip))? {
                Some(next) => ip = next,
                None => ip += 1,
            }
        }
        self.output
            .flush()
            .map_err(|e| VmFault::Io(e.to_string()).at(self.program.quads.len()))?;
        Ok(())
    }

    /// Executes one quadruple. `Some(next)` is an explicit transfer of
    /// control; `None` falls through to the next instruction.
    fn step(&mut self, ip: usize) -> Result<Option<usize>, VmFault> {
        let quad = self.program.quads[ip].clone();
        match quad.operator {
            Operator::Plus
            | Operator::Minus
            | Operator::Times
            | Operator::Divide
            | Operator::Lt
            | Operator::Gt
            | Operator::Eq
            | Operator::Neq
            | Operator::And
            | Operator::Or => {
                let left = self.read_addr(addr_of(quad.left)?)?;
                let right = self.read_addr(addr_of(quad.right)?)?;
                let value = apply_binary(quad.operator, left, right)?;
                self.write_addr(addr_of(quad.result)?, value)?;
                Ok(None)
            }
            Operator::Assign => {
                let value = self.read_addr(addr_of(quad.left)?)?;
                self.write_addr(addr_of(quad.result)?, value)?;
                Ok(None)
            }
            Operator::Goto => Ok(Some(self.jump_target(quad.result)?)),
            Operator::GotoF => {
                let target = self.jump_target(quad.result)?;
                if self.condition(quad.left)? {
                    Ok(None)
                } else {
                    Ok(Some(target))
                }
            }
            Operator::GotoT => {
                let target = self.jump_target(quad.result)?;
                if self.condition(quad.left)? {
                    Ok(Some(target))
                } else {
                    Ok(None)
                }
            }
            Operator::Read => {
                let addr = addr_of(quad.result)?;
                let ty = self
                    .program
                    .config
                    .type_of(addr)
                    .ok_or(VmFault::AddressOutOfBounds { addr })?;
                let value = self.read_input(ty)?;
                self.write_addr(addr, value)?;
                Ok(None)
            }
            Operator::Write => {
                let value = self.read_addr(addr_of(quad.result)?)?;
                writeln!(self.output, "{}", value).map_err(|e| VmFault::Io(e.to_string()))?;
                Ok(None)
            }
            Operator::Era => {
                let id = imm_of(quad.result)?;
                if self.program.functions.get(id as usize).is_none() {
                    return Err(VmFault::UnknownFunction { id });
                }
                self.pending = Some(PendingCall {
                    frame: Frame::new(self.program),
                    function: id as usize,
                });
                Ok(None)
            }
            Operator::Parameter => {
                let value = self.read_addr(addr_of(quad.left)?)?;
                let slot = imm_of(quad.result)? as usize;
                let pending = self.pending.as_mut().ok_or(VmFault::NoPendingFrame)?;
                let param_addr = *self.program.functions[pending.function]
                    .param_addresses
                    .get(slot)
                    .ok_or(VmFault::InvalidOperand {
                        expected: "parameter slot",
                    })?;
                pending.frame.locals.write(param_addr, value)?;
                Ok(None)
            }
            Operator::Gosub => {
                let target = self.jump_target(quad.result)?;
                let mut call = self.pending.take().ok_or(VmFault::NoPendingFrame)?;
                call.frame.return_ip = ip;
                self.frames.push(call.frame);
                Ok(Some(target))
            }
            Operator::EndFun => {
                if self.frames.len() <= 1 {
                    return Err(VmFault::CallStackUnderflow);
                }
                // len > 1 was just checked
                let frame = match self.frames.pop() {
                    Some(frame) => frame,
                    None => return Err(VmFault::CallStackUnderflow),
                };
                Ok(Some(frame.return_ip + 1))
            }
        }
    }

    // =========================================================================
    // Memory routing
    // =========================================================================

    fn read_addr(&self, addr: u32) -> Result<Value, VmFault> {
        match self.program.config.segment_of(addr) {
            Some(Segment::Global) => self.globals.read(addr),
            Some(Segment::Constant) => self.constants.read(addr),
            Some(Segment::Local) => self.current_frame()?.locals.read(addr),
            Some(Segment::Temporary) => self.current_frame()?.temps.read(addr),
            None => Err(VmFault::AddressOutOfBounds { addr }),
        }
    }

    fn write_addr(&mut self, addr: u32, value: Value) -> Result<(), VmFault> {
        match self.program.config.segment_of(addr) {
            Some(Segment::Global) => self.globals.write(addr, value),
            Some(Segment::Constant) => Err(VmFault::ReadOnlyMemoryViolation { addr }),
            Some(Segment::Local) => self.current_frame_mut()?.locals.write(addr, value),
            Some(Segment::Temporary) => self.current_frame_mut()?.temps.write(addr, value),
            None => Err(VmFault::AddressOutOfBounds { addr }),
        }
    }

    fn current_frame(&self) -> Result<&Frame, VmFault> {
        self.frames.last().ok_or(VmFault::CallStackUnderflow)
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame, VmFault> {
        self.frames.last_mut().ok_or(VmFault::CallStackUnderflow)
    }

    // =========================================================================
    // Operand helpers
    // =========================================================================

    /// A target one past the last quadruple is the halt address.
    fn jump_target(&self, operand: Operand) -> Result<usize, VmFault> {
        let target = imm_of(operand)?;
        if (0..=self.program.quads.len() as i64).contains(&target) {
            Ok(target as usize)
        } else {
            Err(VmFault::InvalidJumpTarget { target })
        }
    }

    fn condition(&self, operand: Operand) -> Result<bool, VmFault> {
        match self.read_addr(addr_of(operand)?)? {
            Value::Bool(b) => Ok(b),
            other => Err(VmFault::NonBooleanJumpCondition {
                found: other.value_type(),
            }),
        }
    }

    fn read_input(&mut self, ty: ValueType) -> Result<Value, VmFault> {
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .map_err(|e| VmFault::Io(e.to_string()))?;
        let text = line.trim();
        let invalid = || VmFault::InvalidInput {
            input: text.to_string(),
            expected: ty,
        };
        let value = match ty {
            ValueType::Int => Value::Int(text.parse().map_err(|_| invalid())?),
            ValueType::Float => Value::Float(text.parse().map_err(|_| invalid())?),
            ValueType::Char => Value::Char(text.chars().next().ok_or_else(invalid)?),
            ValueType::Bool => match text {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(invalid()),
            },
        };
        Ok(value)
    }
}

fn addr_of(operand: Operand) -> Result<u32, VmFault> {
    match operand {
        Operand::Address(addr) => Ok(addr),
        _ => Err(VmFault::InvalidOperand {
            expected: "address",
        }),
    }
}

fn imm_of(operand: Operand) -> Result<i64, VmFault> {
    match operand {
        Operand::Imm(n) => Ok(n),
        _ => Err(VmFault::InvalidOperand {
            expected: "immediate",
        }),
    }
}

fn as_f64(value: Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(n as f64),
        Value::Float(x) => Some(x),
        _ => None,
    }
}

fn truthy(value: Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(b),
        Value::Int(n) => Some(n != 0),
        Value::Float(x) => Some(x != 0.0),
        Value::Char(_) => None,
    }
}

/// Evaluates one typed binary operation. Mirrors the compile-time type
/// rules: mixed numerics promote to float, division is always real
/// division, char arithmetic moves through code points.
fn apply_binary(operator: Operator, left: Value, right: Value) -> Result<Value, VmFault> {
    let type_fault = || VmFault::InvalidOperand {
        expected: "typed operands",
    };
    match operator {
        Operator::Plus | Operator::Minus | Operator::Times => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                let n = match operator {
                    Operator::Plus => a.wrapping_add(b),
                    Operator::Minus => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                };
                Ok(Value::Int(n))
            }
            (Value::Char(a), Value::Char(b)) => {
                let code = match operator {
                    Operator::Plus => a as i64 + b as i64,
                    Operator::Minus => a as i64 - b as i64,
                    _ => return Err(type_fault()),
                };
                u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .map(Value::Char)
                    .ok_or(VmFault::InvalidCharResult { code })
            }
            _ => {
                let a = as_f64(left).ok_or_else(type_fault)?;
                let b = as_f64(right).ok_or_else(type_fault)?;
                let x = match operator {
                    Operator::Plus => a + b,
                    Operator::Minus => a - b,
                    _ => a * b,
                };
                Ok(Value::Float(x))
            }
        },
        Operator::Divide => {
            let a = as_f64(left).ok_or_else(type_fault)?;
            let b = as_f64(right).ok_or_else(type_fault)?;
            if b == 0.0 {
                return Err(VmFault::DivisionByZero);
            }
            Ok(Value::Float(a / b))
        }
        Operator::Lt | Operator::Gt => match (left, right) {
            // Integers compare exactly; f64 loses precision past 2^53
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(if operator == Operator::Lt {
                a < b
            } else {
                a > b
            })),
            (Value::Char(a), Value::Char(b)) => Ok(Value::Bool(if operator == Operator::Lt {
                a < b
            } else {
                a > b
            })),
            _ => {
                let a = as_f64(left).ok_or_else(type_fault)?;
                let b = as_f64(right).ok_or_else(type_fault)?;
                Ok(Value::Bool(if operator == Operator::Lt {
                    a < b
                } else {
                    a > b
                }))
            }
        },
        Operator::Eq | Operator::Neq => {
            let equal = match (left, right) {
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Char(a), Value::Char(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                _ => {
                    let a = as_f64(left).ok_or_else(type_fault)?;
                    let b = as_f64(right).ok_or_else(type_fault)?;
                    a == b
                }
            };
            Ok(Value::Bool(if operator == Operator::Eq {
                equal
            } else {
                !equal
            }))
        }
        Operator::And | Operator::Or => {
            let a = truthy(left).ok_or_else(type_fault)?;
            let b = truthy(right).ok_or_else(type_fault)?;
            Ok(Value::Bool(if operator == Operator::And {
                a && b
            } else {
                a || b
            }))
        }
        _ => Err(type_fault()),
    }
}
