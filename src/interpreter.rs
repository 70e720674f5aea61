//! Minimal threaded-code interpreter (external collaborator, spec.md
//! §1: "everything else is an external collaborator"). Just enough of a
//! Forth-style dispatch loop and data stack to give [`crate::hooks`]'s
//! `pre_execute`/`post_execute` and [`crate::vm::Vm`]'s
//! `find_word`/`create_word` a realistic caller — this is not a parallel
//! deliverable and deliberately does not grow a full word set.
//!
//! The interpreter keeps its own dispatch table (name/ID -> [`Behavior`])
//! alongside the `Vm`'s dictionary: the `Vm` only ever sees the physics
//! side of a word (heat, temperature, transitions), never its behavior,
//! so something has to remember how to actually run it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dictionary::{Behavior, WordId};
use crate::error::{PhysicsError, Result};
use crate::vm::Vm;

/// A native primitive: a plain Rust function operating on the
/// interpreter's data stack.
pub type NativeFn = fn(&mut Interpreter) -> Result<()>;

/// A threaded-code dispatch loop over one [`Vm`].
///
/// Holds the data stack and the name-to-behavior dispatch table; delegates
/// everything about execution physics (heat, decay, heartbeat, mode
/// selection) to the `Vm` around every word it runs.
pub struct Interpreter {
    vm: Arc<Vm>,
    stack: Vec<i64>,
    dispatch: HashMap<WordId, Behavior>,
    last_executed: Option<WordId>,
}

impl Interpreter {
    /// Builds an interpreter over `vm` with an empty stack and dispatch
    /// table.
    pub fn new(vm: Arc<Vm>) -> Self {
        Interpreter {
            vm,
            stack: Vec::new(),
            dispatch: HashMap::new(),
            last_executed: None,
        }
    }

    /// The `Vm` this interpreter drives.
    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    /// Defines a native primitive, registering it with both the `Vm`
    /// (for physics bookkeeping) and this interpreter's dispatch table
    /// (for actually running it).
    pub fn define_native(&mut self, name: &[u8], f: NativeFn) -> Result<WordId> {
        let id = self.vm.create_word(name.to_vec(), Behavior::Native(f))?;
        self.dispatch.insert(id, Behavior::Native(f));
        Ok(id)
    }

    /// Defines a colon word whose body is a sequence of previously
    /// defined word IDs, executed in turn.
    pub fn define_colon(&mut self, name: &[u8], body: Vec<WordId>) -> Result<WordId> {
        let id = self.vm.create_word(name.to_vec(), Behavior::Colon(body.clone()))?;
        self.dispatch.insert(id, Behavior::Colon(body));
        Ok(id)
    }

    /// Resolves a name to a word ID through the `Vm`'s dictionary.
    pub fn find(&self, name: &[u8]) -> Option<WordId> {
        self.vm.find_word(name)
    }

    /// Executes `id`, sequencing the `Vm`'s pre/post hooks around the
    /// word's own behavior. A colon body recurses one level per cell; a
    /// native primitive runs directly.
    pub fn execute(&mut self, id: WordId) -> Result<()> {
        self.vm.pre_execute(id, self.last_executed);

        let behavior = self
            .dispatch
            .get(&id)
            .cloned()
            .ok_or_else(|| PhysicsError::VmErrored(format!("word {id} has no registered behavior")))?;

        match behavior {
            Behavior::Native(f) => f(self)?,
            Behavior::Colon(body) => {
                for cell in body {
                    self.execute(cell)?;
                }
            }
        }

        self.vm.post_execute(id);
        self.last_executed = Some(id);
        Ok(())
    }

    /// Looks up and executes a word by name; `Ok(false)` if undefined.
    pub fn interpret_word(&mut self, name: &[u8]) -> Result<bool> {
        let Some(id) = self.find(name) else {
            return Ok(false);
        };
        self.execute(id)?;
        Ok(true)
    }

    /// Pushes a cell onto the data stack.
    pub fn push(&mut self, value: i64) {
        self.stack.push(value);
    }

    /// Pops a cell off the data stack.
    pub fn pop(&mut self) -> Result<i64> {
        self.stack.pop().ok_or(PhysicsError::VmErrored("data stack underflow".to_string()))
    }

    /// Current stack depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
