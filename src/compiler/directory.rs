use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compiler::compile_error::CompileError;
use crate::compiler::memory::{Segment, VirtualMemoryManager};
use crate::lang::{ReturnType, ValueType};

pub const GLOBAL_SCOPE: &str = "global";

/// One declared variable. Addresses are assigned at declaration time and
/// never move afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarEntry {
    pub name: String,
    pub ty: ValueType,
    /// (0, 0) means scalar; (n, 0) a vector; (n, m) a matrix.
    pub dims: (u32, u32),
    pub size: u32,
    pub address: u32,
}

/// One function directory entry. `entry` stays `None` until the function's
/// body begins, which is what makes self-recursive calls resolvable while
/// still rejecting calls to functions that have not been compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    pub return_type: ReturnType,
    pub param_types: Vec<ValueType>,
    /// Local address of each parameter, in declaration order. The VM uses
    /// these to place arguments into a not-yet-active activation frame.
    pub param_addresses: Vec<u32>,
    pub entry: Option<usize>,
}

/// The combined global/local variable tables and the function directory.
///
/// Mutated during compilation only. The local table belongs to whichever
/// function is currently being compiled; returning to global scope clears
/// it (compile-time locals of different functions never coexist).
#[derive(Debug, Default)]
pub struct ScopeDirectory {
    global_vars: HashMap<String, VarEntry>,
    local_vars: HashMap<String, VarEntry>,
    functions: Vec<FunctionEntry>,
    function_ids: HashMap<String, usize>,
    current_scope: String,
    current_function: Option<usize>,
}

impl ScopeDirectory {
    pub fn new() -> Self {
        ScopeDirectory {
            global_vars: HashMap::new(),
            local_vars: HashMap::new(),
            functions: Vec::new(),
            function_ids: HashMap::new(),
            current_scope: GLOBAL_SCOPE.to_string(),
            current_function: None,
        }
    }

    pub fn current_scope(&self) -> &str {
        &self.current_scope
    }

    pub fn in_global_scope(&self) -> bool {
        self.current_function.is_none()
    }

    /// Back to global scope: the active table becomes the global one and
    /// the local table is dropped.
    pub fn enter_global_scope(&mut self) {
        self.local_vars.clear();
        self.current_scope = GLOBAL_SCOPE.to_string();
        self.current_function = None;
    }

    /// Opens a fresh function scope. Registers the directory entry (so the
    /// function can call itself) and, for non-void functions, the synthetic
    /// global `fun_<name>` that carries the return value.
    pub fn enter_function_scope(
        &mut self,
        name: &str,
        return_type: ReturnType,
        memory: &mut VirtualMemoryManager,
    ) -> Result<usize, CompileError> {
        if self.function_ids.contains_key(name) {
            return Err(CompileError::DuplicateFunction {
                name: name.to_string(),
            });
        }

        let id = self.functions.len();
        self.functions.push(FunctionEntry {
            name: name.to_string(),
            return_type,
            param_types: Vec::new(),
            param_addresses: Vec::new(),
            entry: None,
        });
        self.function_ids.insert(name.to_string(), id);
        self.local_vars.clear();
        self.current_scope = name.to_string();
        self.current_function = Some(id);

        if let Some(ty) = return_type.value_type() {
            let slot_name = format!("fun_{}", name);
            if self.global_vars.contains_key(&slot_name) {
                return Err(CompileError::DuplicateVariable {
                    name: slot_name,
                    scope: GLOBAL_SCOPE.to_string(),
                });
            }
            let address = memory.allocate(Segment::Global, ty, 1)?;
            self.global_vars.insert(
                slot_name.clone(),
                VarEntry {
                    name: slot_name,
                    ty,
                    dims: (0, 0),
                    size: 1,
                    address,
                },
            );
        }

        Ok(id)
    }

    /// Declares a variable in the active table, sized from its dimensions,
    /// and allocates its address block in the matching scope segment.
    pub fn declare_variable(
        &mut self,
        name: &str,
        ty: ValueType,
        dims: &[u32],
        memory: &mut VirtualMemoryManager,
    ) -> Result<u32, CompileError> {
        let segment = if self.in_global_scope() {
            Segment::Global
        } else {
            Segment::Local
        };

        let (dimensions, size) = match dims {
            [] => ((0, 0), 1),
            [d0] => ((*d0, 0), *d0),
            [d0, d1, ..] => {
                // The element count must stay addressable; a product past
                // u32::MAX can never fit a partition either way.
                let size = d0
                    .checked_mul(*d1)
                    .ok_or(CompileError::OutOfMemory { segment, ty })?;
                ((*d0, *d1), size)
            }
        };
        let table = if self.in_global_scope() {
            &mut self.global_vars
        } else {
            &mut self.local_vars
        };

        if table.contains_key(name) {
            return Err(CompileError::DuplicateVariable {
                name: name.to_string(),
                scope: self.current_scope.clone(),
            });
        }

        let address = memory.allocate(segment, ty, size.max(1))?;
        table.insert(
            name.to_string(),
            VarEntry {
                name: name.to_string(),
                ty,
                dims: dimensions,
                size: size.max(1),
                address,
            },
        );
        Ok(address)
    }

    /// Registers the current function's parameters, in declaration order:
    /// each becomes a scalar local and its type/address are appended to the
    /// directory entry. Parameters may not be arrays.
    pub fn declare_parameters(
        &mut self,
        params: &[(String, ValueType)],
        memory: &mut VirtualMemoryManager,
    ) -> Result<(), CompileError> {
        let id = self
            .current_function
            .ok_or(CompileError::StackUnderflow {
                stack: "function scope",
            })?;
        for (name, ty) in params {
            let address = self.declare_variable(name, *ty, &[], memory)?;
            let entry = &mut self.functions[id];
            entry.param_types.push(*ty);
            entry.param_addresses.push(address);
        }
        Ok(())
    }

    /// Records where the current function's body starts in the quadruple
    /// program.
    pub fn mark_entry(&mut self, entry: usize) {
        if let Some(id) = self.current_function {
            self.functions[id].entry = Some(entry);
        }
    }

    /// Active table first, then the global table.
    pub fn lookup_variable(&self, name: &str) -> Result<&VarEntry, CompileError> {
        self.local_vars
            .get(name)
            .or_else(|| self.global_vars.get(name))
            .ok_or_else(|| CompileError::UndeclaredVariable {
                name: name.to_string(),
                scope: self.current_scope.clone(),
            })
    }

    pub fn lookup_function(&self, name: &str) -> Result<(usize, &FunctionEntry), CompileError> {
        match self.function_ids.get(name) {
            Some(&id) => Ok((id, &self.functions[id])),
            None => Err(CompileError::UndeclaredFunction {
                name: name.to_string(),
            }),
        }
    }

    pub fn functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    pub fn into_functions(self) -> Vec<FunctionEntry> {
        self.functions
    }
}
