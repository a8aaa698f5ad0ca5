use std::collections::HashMap;

use crate::compiler::compile_error::CompileError;
use crate::compiler::cube;
use crate::compiler::directory::ScopeDirectory;
use crate::compiler::memory::{MemoryConfig, Segment, VirtualMemoryManager};
use crate::compiler::quad::{CompiledProgram, Operand, Operator, QuadProgram, Quadruple};
use crate::lang::{ReturnType, Value, ValueType};

/// Entry on the operator stack. `Paren` is the sentinel pushed at `(` so
/// reductions never reach across a parenthesized subexpression.
#[derive(Debug, Clone, Copy, PartialEq)]
enum StackedOperator {
    Op(Operator),
    Paren,
}

/// The semantic action engine.
///
/// The parser recognizes sentence structure and calls one method here per
/// neuralgic point; everything else (type checking through the cube,
/// address allocation, scope bookkeeping, quadruple emission and jump
/// backpatching) happens in this struct. One instance per compilation;
/// `seal` consumes it.
///
/// Operator precedence is not encoded here: it lives in *where* the parser
/// calls `reduce_pending` and with which operator set.
pub struct SemanticActions {
    directory: ScopeDirectory,
    memory: VirtualMemoryManager,
    quads: QuadProgram,
    operands: Vec<u32>,
    types: Vec<ValueType>,
    operators: Vec<StackedOperator>,
    jumps: Vec<usize>,
    temp_count: usize,
    const_index: HashMap<(ValueType, u64), u32>,
    const_list: Vec<(Value, u32)>,
    main_jump: Option<usize>,
}

impl SemanticActions {
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        SemanticActions {
            directory: ScopeDirectory::new(),
            memory: VirtualMemoryManager::new(config),
            quads: QuadProgram::new(),
            operands: Vec::new(),
            types: Vec::new(),
            operators: Vec::new(),
            jumps: Vec::new(),
            temp_count: 0,
            const_index: HashMap::new(),
            const_list: Vec::new(),
            main_jump: None,
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn quads(&self) -> &[Quadruple] {
        self.quads.quads()
    }

    pub fn quad_count(&self) -> usize {
        self.quads.len()
    }

    pub fn temp_count(&self) -> usize {
        self.temp_count
    }

    /// (operands, types, operators, jumps) depths, for stack-balance checks.
    pub fn stack_depths(&self) -> (usize, usize, usize, usize) {
        (
            self.operands.len(),
            self.types.len(),
            self.operators.len(),
            self.jumps.len(),
        )
    }

    // =========================================================================
    // Program structure
    // =========================================================================

    /// Quadruple 0 is an unconditional jump over all function bodies into
    /// `main`; its target is unknown until `start_main`.
    pub fn begin_program(&mut self) {
        let idx = self.quads.push(Quadruple::new(
            Operator::Goto,
            Operand::Empty,
            Operand::Empty,
            Operand::Empty,
        ));
        self.main_jump = Some(idx);
    }

    /// Main begins here: resolve the prologue jump.
    pub fn start_main(&mut self) -> Result<(), CompileError> {
        if let Some(idx) = self.main_jump.take() {
            let target = self.quads.len();
            self.quads.patch_result(idx, target)?;
        }
        Ok(())
    }

    pub fn declare_variable(
        &mut self,
        name: &str,
        ty: ValueType,
        dims: &[u32],
    ) -> Result<u32, CompileError> {
        self.directory
            .declare_variable(name, ty, dims, &mut self.memory)
    }

    pub fn enter_function(
        &mut self,
        name: &str,
        return_type: ReturnType,
    ) -> Result<(), CompileError> {
        self.directory
            .enter_function_scope(name, return_type, &mut self.memory)?;
        Ok(())
    }

    pub fn declare_parameters(
        &mut self,
        params: &[(String, ValueType)],
    ) -> Result<(), CompileError> {
        self.directory.declare_parameters(params, &mut self.memory)
    }

    /// The next emitted quadruple is the first of the current function's
    /// body; record it as the entry address (before the body compiles, so
    /// self-recursion resolves).
    pub fn mark_function_entry(&mut self) {
        self.directory.mark_entry(self.quads.len());
    }

    /// Closes the current function: emit `endfun`, return to global scope
    /// and rewind the local/temporary allocators.
    pub fn end_function(&mut self) {
        self.quads.push(Quadruple::new(
            Operator::EndFun,
            Operand::Empty,
            Operand::Empty,
            Operand::Empty,
        ));
        self.directory.enter_global_scope();
        self.memory.reset_local_and_temp();
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn push_variable(&mut self, name: &str) -> Result<(), CompileError> {
        let var = self.directory.lookup_variable(name)?;
        self.operands.push(var.address);
        self.types.push(var.ty);
        Ok(())
    }

    pub fn push_literal(&mut self, value: Value) -> Result<(), CompileError> {
        let ty = value.value_type();
        let addr = self.const_address(value)?;
        self.operands.push(addr);
        self.types.push(ty);
        Ok(())
    }

    pub fn push_operator(&mut self, operator: Operator) {
        self.operators.push(StackedOperator::Op(operator));
    }

    pub fn open_paren(&mut self) {
        self.operators.push(StackedOperator::Paren);
    }

    pub fn close_paren(&mut self) -> Result<(), CompileError> {
        match self.operators.pop() {
            Some(StackedOperator::Paren) => Ok(()),
            _ => Err(CompileError::StackUnderflow { stack: "operator" }),
        }
    }

    /// Reduces while the top of the operator stack belongs to `pending`.
    /// The parser calls this right after parsing an operand of the matching
    /// precedence tier, which is how precedence is enforced without a
    /// precedence table. Each reduction consults the cube and lands its
    /// result in a fresh temporary.
    pub fn reduce_pending(&mut self, pending: &[Operator]) -> Result<(), CompileError> {
        while let Some(StackedOperator::Op(op)) = self.operators.last().copied() {
            if !pending.contains(&op) {
                break;
            }
            self.operators.pop();
            self.reduce_binary(op)?;
        }
        Ok(())
    }

    fn reduce_binary(&mut self, operator: Operator) -> Result<(), CompileError> {
        let (right, right_ty) = self.pop_operand()?;
        let (left, left_ty) = self.pop_operand()?;
        let result_ty = self.type_match(left_ty, right_ty, operator)?;
        let temp = self.new_temp(result_ty)?;
        self.quads.push(Quadruple::new(
            operator,
            Operand::Address(left),
            Operand::Address(right),
            Operand::Address(temp),
        ));
        self.operands.push(temp);
        self.types.push(result_ty);
        Ok(())
    }

    /// Pops the just-parsed value and the assignment target beneath it and
    /// emits the copy. The target was pushed before the expression began.
    pub fn finish_assignment(&mut self) -> Result<(), CompileError> {
        let (value, value_ty) = self.pop_operand()?;
        let (target, target_ty) = self.pop_operand()?;
        self.type_match(target_ty, value_ty, Operator::Assign)?;
        self.quads.push(Quadruple::new(
            Operator::Assign,
            Operand::Address(value),
            Operand::Empty,
            Operand::Address(target),
        ));
        Ok(())
    }

    /// Removes the top operand/type pair (an expression result a statement
    /// consumes: write arguments, call arguments, conditions).
    pub fn pop_operand(&mut self) -> Result<(u32, ValueType), CompileError> {
        let addr = self
            .operands
            .pop()
            .ok_or(CompileError::StackUnderflow { stack: "operand" })?;
        let ty = self
            .types
            .pop()
            .ok_or(CompileError::StackUnderflow { stack: "type" })?;
        Ok((addr, ty))
    }

    // =========================================================================
    // I/O statements
    // =========================================================================

    pub fn read_into(&mut self, name: &str) -> Result<(), CompileError> {
        let var = self.directory.lookup_variable(name)?;
        let address = var.address;
        self.quads.push(Quadruple::new(
            Operator::Read,
            Operand::Empty,
            Operand::Empty,
            Operand::Address(address),
        ));
        Ok(())
    }

    pub fn write_value(&mut self) -> Result<(), CompileError> {
        let (addr, _) = self.pop_operand()?;
        self.quads.push(Quadruple::new(
            Operator::Write,
            Operand::Empty,
            Operand::Empty,
            Operand::Address(addr),
        ));
        Ok(())
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    /// Condition parsed; emit the false-jump and remember it for patching.
    pub fn start_if(&mut self) -> Result<(), CompileError> {
        let idx = self.emit_condition_jump()?;
        self.jumps.push(idx);
        Ok(())
    }

    /// At the `else` keyword: jump over the alternative from the end of the
    /// `then` block, and land the false-jump right after it.
    pub fn start_else(&mut self) -> Result<(), CompileError> {
        let goto_idx = self.quads.push(Quadruple::new(
            Operator::Goto,
            Operand::Empty,
            Operand::Empty,
            Operand::Empty,
        ));
        let false_idx = self.pop_jump()?;
        self.jumps.push(goto_idx);
        let target = self.quads.len();
        self.quads.patch_result(false_idx, target)
    }

    /// End of `if` (or of its `else` block): the recorded jump lands here.
    pub fn end_if(&mut self) -> Result<(), CompileError> {
        let idx = self.pop_jump()?;
        let target = self.quads.len();
        self.quads.patch_result(idx, target)
    }

    // =========================================================================
    // while
    // =========================================================================

    /// Before the condition: remember where to loop back to.
    pub fn start_while(&mut self) {
        self.jumps.push(self.quads.len());
    }

    /// Condition parsed: emit the exit jump.
    pub fn while_condition(&mut self) -> Result<(), CompileError> {
        let idx = self.emit_condition_jump()?;
        self.jumps.push(idx);
        Ok(())
    }

    /// Body done: jump back to the condition, then resolve the exit jump to
    /// just past this goto.
    pub fn end_while(&mut self) -> Result<(), CompileError> {
        let exit_idx = self.pop_jump()?;
        let loop_start = self.pop_jump()?;
        self.quads.push(Quadruple::new(
            Operator::Goto,
            Operand::Empty,
            Operand::Empty,
            Operand::Imm(loop_start as i64),
        ));
        let target = self.quads.len();
        self.quads.patch_result(exit_idx, target)
    }

    // =========================================================================
    // for
    // =========================================================================

    /// `for id = ...`: the control variable must be numeric. It rides the
    /// operand stack through the whole statement.
    pub fn start_for(&mut self, name: &str) -> Result<(), CompileError> {
        let var = self.directory.lookup_variable(name)?;
        if !matches!(var.ty, ValueType::Int | ValueType::Float) {
            return Err(CompileError::NonNumericControl {
                name: name.to_string(),
                found: var.ty,
            });
        }
        self.operands.push(var.address);
        self.types.push(var.ty);
        Ok(())
    }

    /// Initial value parsed: assign it to the control variable.
    pub fn for_initial(&mut self) -> Result<(), CompileError> {
        let (init, init_ty) = self.pop_operand()?;
        let (control, control_ty) = self.pop_operand()?;
        self.type_match(control_ty, init_ty, Operator::Assign)?;
        self.quads.push(Quadruple::new(
            Operator::Assign,
            Operand::Address(init),
            Operand::Empty,
            Operand::Address(control),
        ));
        self.operands.push(control);
        self.types.push(control_ty);
        Ok(())
    }

    /// Upper bound parsed: the bound is inclusive, so freeze `bound + 1`
    /// into a temporary and emit the `<` comparison against it (recorded as
    /// the loop start), then the exit jump.
    pub fn for_bound(&mut self) -> Result<(), CompileError> {
        let (bound, bound_ty) = self.pop_operand()?;
        let (control, control_ty) = self.pop_operand()?;
        let limit_ty = self.type_match(control_ty, bound_ty, Operator::Assign)?;
        let limit_ty = self.type_match(limit_ty, ValueType::Int, Operator::Plus)?;

        let one = self.const_address(Value::Int(1))?;
        let limit = self.new_temp(limit_ty)?;
        self.quads.push(Quadruple::new(
            Operator::Plus,
            Operand::Address(bound),
            Operand::Address(one),
            Operand::Address(limit),
        ));

        let cmp_ty = self.type_match(control_ty, limit_ty, Operator::Lt)?;
        let cmp_temp = self.new_temp(cmp_ty)?;
        let cmp_idx = self.quads.push(Quadruple::new(
            Operator::Lt,
            Operand::Address(control),
            Operand::Address(limit),
            Operand::Address(cmp_temp),
        ));
        self.jumps.push(cmp_idx);

        let exit_idx = self.quads.push(Quadruple::new(
            Operator::GotoF,
            Operand::Address(cmp_temp),
            Operand::Empty,
            Operand::Empty,
        ));
        self.jumps.push(exit_idx);

        self.operands.push(control);
        self.types.push(control_ty);
        Ok(())
    }

    /// Body done: increment the control variable, loop back to the
    /// comparison, resolve the exit jump.
    pub fn end_for(&mut self) -> Result<(), CompileError> {
        let (control, control_ty) = self.pop_operand()?;
        let one = self.const_address(Value::Int(1))?;
        let inc_ty = self.type_match(control_ty, ValueType::Int, Operator::Plus)?;
        let inc_temp = self.new_temp(inc_ty)?;
        self.quads.push(Quadruple::new(
            Operator::Plus,
            Operand::Address(control),
            Operand::Address(one),
            Operand::Address(inc_temp),
        ));
        self.quads.push(Quadruple::new(
            Operator::Assign,
            Operand::Address(inc_temp),
            Operand::Empty,
            Operand::Address(control),
        ));

        let exit_idx = self.pop_jump()?;
        let loop_start = self.pop_jump()?;
        self.quads.push(Quadruple::new(
            Operator::Goto,
            Operand::Empty,
            Operand::Empty,
            Operand::Imm(loop_start as i64),
        ));
        let target = self.quads.len();
        self.quads.patch_result(exit_idx, target)
    }

    // =========================================================================
    // Calls and returns
    // =========================================================================

    /// Validates a call against the directory and emits the protocol:
    /// `era` (prepare a frame), one `param` per argument, `gosub`.
    /// Argument types must match the declared parameter types exactly; no
    /// widening crosses the call boundary.
    pub fn call_function(
        &mut self,
        name: &str,
        args: &[(u32, ValueType)],
    ) -> Result<usize, CompileError> {
        let (id, entry) = {
            let (id, fun) = self.directory.lookup_function(name)?;
            let entry = fun.entry.ok_or(CompileError::UnresolvedFunctionEntry {
                name: name.to_string(),
            })?;
            if fun.param_types.len() != args.len() {
                return Err(CompileError::ArgumentCountMismatch {
                    function: name.to_string(),
                    expected: fun.param_types.len(),
                    got: args.len(),
                });
            }
            for (index, (&expected, &(_, got))) in
                fun.param_types.iter().zip(args.iter()).enumerate()
            {
                if expected != got {
                    return Err(CompileError::ArgumentTypeMismatch {
                        function: name.to_string(),
                        index,
                        expected,
                        got,
                    });
                }
            }
            (id, entry)
        };

        self.quads.push(Quadruple::new(
            Operator::Era,
            Operand::Empty,
            Operand::Empty,
            Operand::Imm(id as i64),
        ));
        for (slot, &(addr, _)) in args.iter().enumerate() {
            self.quads.push(Quadruple::new(
                Operator::Parameter,
                Operand::Address(addr),
                Operand::Empty,
                Operand::Imm(slot as i64),
            ));
        }
        self.quads.push(Quadruple::new(
            Operator::Gosub,
            Operand::Imm(id as i64),
            Operand::Empty,
            Operand::Imm(entry as i64),
        ));
        Ok(id)
    }

    /// A call in operand position: run the protocol, then immediately copy
    /// the `fun_<name>` return slot into a fresh temporary so a nested call
    /// cannot clobber it, and push that temporary.
    pub fn call_expression(
        &mut self,
        name: &str,
        args: &[(u32, ValueType)],
    ) -> Result<(), CompileError> {
        let id = self.call_function(name, args)?;
        let return_ty = self.directory.functions()[id]
            .return_type
            .value_type()
            .ok_or_else(|| CompileError::VoidInExpression {
                function: name.to_string(),
            })?;
        let slot = self.directory.lookup_variable(&format!("fun_{}", name))?;
        let slot_addr = slot.address;
        let temp = self.new_temp(return_ty)?;
        self.quads.push(Quadruple::new(
            Operator::Assign,
            Operand::Address(slot_addr),
            Operand::Empty,
            Operand::Address(temp),
        ));
        self.operands.push(temp);
        self.types.push(return_ty);
        Ok(())
    }

    /// `return expr;` assigns into the function's return slot and leaves
    /// the activation immediately.
    pub fn return_value(&mut self) -> Result<(), CompileError> {
        if self.directory.in_global_scope() {
            return Err(CompileError::ReturnOutsideFunction);
        }
        let scope = self.directory.current_scope().to_string();
        let (_, fun) = self.directory.lookup_function(&scope)?;
        let return_ty =
            fun.return_type
                .value_type()
                .ok_or_else(|| CompileError::ReturnInVoidFunction {
                    function: scope.clone(),
                })?;
        let (value, value_ty) = self.pop_operand()?;
        self.type_match(return_ty, value_ty, Operator::Assign)?;
        let slot = self.directory.lookup_variable(&format!("fun_{}", scope))?;
        let slot_addr = slot.address;
        self.quads.push(Quadruple::new(
            Operator::Assign,
            Operand::Address(value),
            Operand::Empty,
            Operand::Address(slot_addr),
        ));
        self.quads.push(Quadruple::new(
            Operator::EndFun,
            Operand::Empty,
            Operand::Empty,
            Operand::Empty,
        ));
        Ok(())
    }

    // =========================================================================
    // Sealing
    // =========================================================================

    /// Ends the compilation: all four stacks must have drained and every
    /// jump must be resolved. Yields the complete compiler-to-VM contract.
    pub fn seal(self) -> Result<CompiledProgram, CompileError> {
        for (stack, depth) in [
            ("operand", self.operands.len()),
            ("type", self.types.len()),
            ("operator", self.operators.len()),
            ("jump", self.jumps.len()),
        ] {
            if depth != 0 {
                return Err(CompileError::UnbalancedStacks { stack, depth });
            }
        }
        let config = *self.memory.config();
        let quads = self.quads.seal()?;
        Ok(CompiledProgram {
            quads,
            functions: self.directory.into_functions(),
            constants: self.const_list,
            config,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn type_match(
        &self,
        left: ValueType,
        right: ValueType,
        operator: Operator,
    ) -> Result<ValueType, CompileError> {
        cube::result_type(left, right, operator).ok_or_else(|| CompileError::TypeMismatch {
            operator,
            left,
            right,
            scope: self.directory.current_scope().to_string(),
        })
    }

    fn new_temp(&mut self, ty: ValueType) -> Result<u32, CompileError> {
        let addr = self.memory.allocate(Segment::Temporary, ty, 1)?;
        self.temp_count += 1;
        Ok(addr)
    }

    /// Deduplicating constant registration: identical literals share one
    /// address in the constant segment.
    fn const_address(&mut self, value: Value) -> Result<u32, CompileError> {
        let key = value.dedup_key();
        if let Some(&addr) = self.const_index.get(&key) {
            return Ok(addr);
        }
        let addr = self
            .memory
            .allocate(Segment::Constant, value.value_type(), 1)?;
        self.const_index.insert(key, addr);
        self.const_list.push((value, addr));
        Ok(addr)
    }

    /// Pops the condition (must be bool) and emits a `gotof` with an
    /// unresolved target; returns its index for the jump stack.
    fn emit_condition_jump(&mut self) -> Result<usize, CompileError> {
        let (cond, cond_ty) = self.pop_operand()?;
        if cond_ty != ValueType::Bool {
            return Err(CompileError::NonBooleanCondition {
                found: cond_ty,
                scope: self.directory.current_scope().to_string(),
            });
        }
        Ok(self.quads.push(Quadruple::new(
            Operator::GotoF,
            Operand::Address(cond),
            Operand::Empty,
            Operand::Empty,
        )))
    }

    fn pop_jump(&mut self) -> Result<usize, CompileError> {
        self.jumps
            .pop()
            .ok_or(CompileError::StackUnderflow { stack: "jump" })
    }
}

impl Default for SemanticActions {
    fn default() -> Self {
        Self::new()
    }
}
