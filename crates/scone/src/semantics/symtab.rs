use std::collections::HashMap;

use scone_util::make_type_idx;
use thiserror::Error;

use crate::codegen::bytecode::Address;

use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub ty: Type,
    pub address: Address,
}

#[derive(Debug)]
pub struct Scope {
    kind: ScopeKind,
    // lexical parent, used for lookups
    parent: Option<ScopeId>,
    // scope that becomes current again once this one closes; differs from the
    // parent for functions declared inside blocks
    resume: Option<ScopeId>,
    // global or function scope owning the slots
    frame: ScopeId,
    bindings: HashMap<String, Binding>,
    next_slot: u32,
    high_water: u32,
}

make_type_idx!(pub ScopeId, Scope);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("`{0}` is already declared in this scope")]
    Redeclared(String),
    #[error("attempted to close the global scope")]
    ClosedGlobalScope,
    #[error("{0} scopes still open at end of input")]
    UnclosedScopes(usize),
}

/// Arena of every scope opened during a compilation. Scopes are never removed,
/// closing one only moves the cursor back out.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        let global = Scope {
            kind: ScopeKind::Global,
            parent: None,
            resume: None,
            frame: ScopeId::new(0),
            bindings: HashMap::new(),
            next_slot: 0,
            high_water: 0,
        };
        SymbolTable {
            scopes: vec![global],
            current: ScopeId::new(0),
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId::new(0)
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope].kind
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope].parent
    }

    /// Nested block; its slots continue after the enclosing scope's and are
    /// free again once it closes.
    pub fn open_block(&mut self) -> ScopeId {
        let enclosing = &self.scopes[self.current];
        let scope = Scope {
            kind: ScopeKind::Block,
            parent: Some(self.current),
            resume: Some(self.current),
            frame: enclosing.frame,
            bindings: HashMap::new(),
            next_slot: enclosing.next_slot,
            high_water: 0,
        };
        self.current = ScopeId::from_push(&mut self.scopes, scope);
        self.current
    }

    /// Function body scope. Functions only see globals, so the parent is the
    /// global scope wherever the function is declared.
    pub fn open_function(&mut self) -> ScopeId {
        let id = ScopeId::new(self.scopes.len());
        let scope = Scope {
            kind: ScopeKind::Function,
            parent: Some(self.global()),
            resume: Some(self.current),
            frame: id,
            bindings: HashMap::new(),
            next_slot: 0,
            high_water: 0,
        };
        self.current = ScopeId::from_push(&mut self.scopes, scope);
        self.current
    }

    /// Closes the current scope and returns the size of the frame it belongs to
    /// so far.
    pub fn close_scope(&mut self) -> Result<u32, ScopeError> {
        let scope = &self.scopes[self.current];
        let Some(resume) = scope.resume else {
            return Err(ScopeError::ClosedGlobalScope);
        };
        let frame_size = self.scopes[scope.frame].high_water;
        self.current = resume;
        Ok(frame_size)
    }

    /// Ends the compilation unit and returns the size of the global frame.
    pub fn close_global(&mut self) -> Result<u32, ScopeError> {
        let mut depth = 0;
        let mut scope = self.current;
        while let Some(resume) = self.scopes[scope].resume {
            depth += 1;
            scope = resume;
        }
        if depth > 0 {
            return Err(ScopeError::UnclosedScopes(depth));
        }
        Ok(self.scopes[self.global()].high_water)
    }

    pub fn declare(&mut self, name: &str, ty: Type) -> Result<Address, ScopeError> {
        if self.scopes[self.current].bindings.contains_key(name) {
            return Err(ScopeError::Redeclared(name.to_string()));
        }
        let address = self.temporary();
        self.scopes[self.current]
            .bindings
            .insert(name.to_string(), Binding { ty, address });
        Ok(address)
    }

    /// Unnamed slot in the current scope.
    pub fn temporary(&mut self) -> Address {
        let scope = &mut self.scopes[self.current];
        let slot = scope.next_slot;
        scope.next_slot += 1;
        let frame = scope.frame;

        let frame = &mut self.scopes[frame];
        frame.high_water = frame.high_water.max(slot + 1);
        match frame.kind {
            ScopeKind::Global => Address::Global(slot),
            _ => Address::Local(slot),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            if let Some(binding) = self.scopes[id].bindings.get(name) {
                return Some(binding);
            }
            scope = self.scopes[id].parent;
        }
        None
    }
}
