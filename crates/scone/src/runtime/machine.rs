use std::io::{self, Write};

use thiserror::Error;

use crate::codegen::bytecode::{Address, ArithmeticOp, CompareOp, Instruction, LogicOp, Program};

use super::value::Value;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 4096;
pub const DEFAULT_MAX_STACK_SLOTS: usize = 1 << 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineOptions {
    pub max_call_depth: usize,
    /// Upper bound on the value stack, globals included.
    pub max_stack_slots: usize,
}

impl Default for MachineOptions {
    fn default() -> Self {
        MachineOptions {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_stack_slots: DEFAULT_MAX_STACK_SLOTS,
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("read of uninitialised slot {0}")]
    UninitializedRead(Address),
    #[error("expected {expected} operand, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("function returned without a value")]
    MissingReturnValue,
    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),
    #[error("stack of {requested} slots exceeds the limit of {limit}")]
    StackOverflow { requested: usize, limit: usize },
    #[error("jump to {0} is outside the program")]
    InvalidJump(u32),
    #[error("slot {0} is outside the current frame")]
    InvalidAddress(Address),
    #[error("return outside of a function call")]
    InvalidReturn,
    #[error("failed to write output")]
    Io(#[from] io::Error),
}

// activation record of one call
#[derive(Debug)]
struct Frame {
    return_pc: usize,
    caller_base: usize,
    result: Option<Address>,
}

/// Executes a [`Program`]. The value stack holds the global frame followed by
/// one frame per active call; `echo` output goes to `output`.
pub struct Machine<'p, W: Write> {
    program: &'p Program,
    options: MachineOptions,
    output: W,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    base: usize,
    pc: usize,
}

impl<'p, W: Write> Machine<'p, W> {
    pub fn new(program: &'p Program, output: W) -> Machine<'p, W> {
        Machine::with_options(program, MachineOptions::default(), output)
    }

    pub fn with_options(program: &'p Program, options: MachineOptions, output: W) -> Machine<'p, W> {
        Machine {
            program,
            options,
            output,
            stack: Vec::new(),
            frames: Vec::new(),
            base: 0,
            pc: 0,
        }
    }

    /// Index of the instruction being executed, or that faulted.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn globals(&self) -> &[Value] {
        let globals = (self.program.globals as usize).min(self.stack.len());
        &self.stack[..globals]
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs from the first instruction until `Halt` or the end of the code.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        self.stack.clear();
        self.grow_stack(self.program.globals as usize)?;
        self.frames.clear();
        self.base = self.stack.len();
        self.pc = 0;

        let program = self.program;
        let mut steps = 0u64;
        while let Some(instruction) = program.code.get(self.pc) {
            steps += 1;
            if !self.execute(instruction)? {
                break;
            }
        }
        self.output.flush()?;
        log::debug!("executed {} instructions", steps);
        Ok(())
    }

    // returns false once the machine halts
    fn execute(&mut self, instruction: &Instruction) -> Result<bool, RuntimeError> {
        let mut next = self.pc + 1;
        match instruction {
            Instruction::LoadInt { dest, value } => self.write(*dest, Value::Int(*value))?,
            Instruction::LoadBool { dest, value } => self.write(*dest, Value::Bool(*value))?,
            Instruction::Copy { src, dest } => {
                let value = self.read(*src)?;
                self.write(*dest, value)?;
            }
            Instruction::Arithmetic { op, lhs, rhs, dest } => {
                let lhs = self.read_int(*lhs)?;
                let rhs = self.read_int(*rhs)?;
                let result = match op {
                    ArithmeticOp::Add => lhs.wrapping_add(rhs),
                    ArithmeticOp::Sub => lhs.wrapping_sub(rhs),
                    ArithmeticOp::Mul => lhs.wrapping_mul(rhs),
                    ArithmeticOp::Div | ArithmeticOp::Mod if rhs == 0 => {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    ArithmeticOp::Div => lhs.wrapping_div(rhs),
                    ArithmeticOp::Mod => lhs.wrapping_rem(rhs),
                };
                self.write(*dest, Value::Int(result))?;
            }
            Instruction::Compare { op, lhs, rhs, dest } => {
                let result = self.compare(*op, *lhs, *rhs)?;
                self.write(*dest, Value::Bool(result))?;
            }
            Instruction::Logic { op, lhs, rhs, dest } => {
                let lhs = self.read_bool(*lhs)?;
                let rhs = self.read_bool(*rhs)?;
                let result = match op {
                    LogicOp::And => lhs && rhs,
                    LogicOp::Or => lhs || rhs,
                };
                self.write(*dest, Value::Bool(result))?;
            }
            Instruction::Not { src, dest } => {
                let value = self.read_bool(*src)?;
                self.write(*dest, Value::Bool(!value))?;
            }
            Instruction::Jump { target } => next = self.jump_target(*target)?,
            Instruction::JumpUnless { condition, target } => {
                if !self.read_bool(*condition)? {
                    next = self.jump_target(*target)?;
                }
            }
            Instruction::Call { target, args, result } => {
                if self.frames.len() >= self.options.max_call_depth {
                    return Err(RuntimeError::CallDepthExceeded(self.options.max_call_depth));
                }
                let target = self.jump_target(*target)?;
                let args = args.iter().map(|arg| self.read(*arg)).collect::<Result<Vec<_>, _>>()?;

                self.frames.push(Frame {
                    return_pc: next,
                    caller_base: self.base,
                    result: *result,
                });
                self.base = self.stack.len();
                self.grow_stack(self.base + args.len())?;
                self.stack[self.base..].copy_from_slice(&args);
                next = target;
            }
            Instruction::Enter { frame_size } => {
                let size = self.base.saturating_add(*frame_size as usize);
                self.grow_stack(size)?;
            }
            Instruction::Return { value } => {
                let value = value.map(|value| self.read(value)).transpose()?;
                let frame = self.frames.pop().ok_or(RuntimeError::InvalidReturn)?;
                self.stack.truncate(self.base);
                self.base = frame.caller_base;
                if let Some(result) = frame.result {
                    let value = value.ok_or(RuntimeError::MissingReturnValue)?;
                    self.write(result, value)?;
                }
                next = frame.return_pc;
            }
            Instruction::Echo { value } => {
                let value = self.read(*value)?;
                writeln!(self.output, "{}", value)?;
            }
            Instruction::Halt => return Ok(false),
        }
        self.pc = next;
        Ok(true)
    }

    fn compare(&self, op: CompareOp, lhs: Address, rhs: Address) -> Result<bool, RuntimeError> {
        if op.is_ordering() {
            let lhs = self.read_int(lhs)?;
            let rhs = self.read_int(rhs)?;
            return Ok(match op {
                CompareOp::Less => lhs < rhs,
                CompareOp::LessEqual => lhs <= rhs,
                CompareOp::Greater => lhs > rhs,
                _ => lhs >= rhs,
            });
        }

        let lhs = self.read(lhs)?;
        let rhs = self.read(rhs)?;
        if lhs.type_name() != rhs.type_name() {
            return Err(RuntimeError::TypeMismatch {
                expected: lhs.type_name(),
                found: rhs.type_name(),
            });
        }
        Ok((lhs == rhs) == (op == CompareOp::Equal))
    }

    // sizes come from possibly untrusted bytecode, so check before allocating
    fn grow_stack(&mut self, size: usize) -> Result<(), RuntimeError> {
        if size <= self.stack.len() {
            return Ok(());
        }
        if size > self.options.max_stack_slots {
            return Err(RuntimeError::StackOverflow {
                requested: size,
                limit: self.options.max_stack_slots,
            });
        }
        self.stack.resize(size, Value::Unset);
        Ok(())
    }

    fn jump_target(&self, target: u32) -> Result<usize, RuntimeError> {
        if target as usize > self.program.code.len() {
            return Err(RuntimeError::InvalidJump(target));
        }
        Ok(target as usize)
    }

    fn slot(&self, address: Address) -> Result<usize, RuntimeError> {
        let (index, limit) = match address {
            Address::Global(slot) => (slot as usize, self.program.globals as usize),
            Address::Local(slot) if self.frames.is_empty() => {
                return Err(RuntimeError::InvalidAddress(Address::Local(slot)));
            }
            Address::Local(slot) => (self.base + slot as usize, self.stack.len()),
        };
        if index >= limit {
            return Err(RuntimeError::InvalidAddress(address));
        }
        Ok(index)
    }

    fn read(&self, address: Address) -> Result<Value, RuntimeError> {
        match self.stack[self.slot(address)?] {
            Value::Unset => Err(RuntimeError::UninitializedRead(address)),
            value => Ok(value),
        }
    }

    fn read_int(&self, address: Address) -> Result<i64, RuntimeError> {
        match self.read(address)? {
            Value::Int(value) => Ok(value),
            other => Err(RuntimeError::TypeMismatch {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    fn read_bool(&self, address: Address) -> Result<bool, RuntimeError> {
        match self.read(address)? {
            Value::Bool(value) => Ok(value),
            other => Err(RuntimeError::TypeMismatch {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }

    fn write(&mut self, address: Address, value: Value) -> Result<(), RuntimeError> {
        let index = self.slot(address)?;
        self.stack[index] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(program: &Program) -> Result<String, RuntimeError> {
        let mut machine = Machine::new(program, Vec::new());
        machine.run()?;
        Ok(String::from_utf8(machine.into_output()).unwrap())
    }

    #[test]
    fn arithmetic_and_echo() {
        let program = Program {
            code: vec![
                Instruction::LoadInt { dest: Address::Global(0), value: 7 },
                Instruction::LoadInt { dest: Address::Global(1), value: -2 },
                Instruction::Arithmetic {
                    op: ArithmeticOp::Div,
                    lhs: Address::Global(0),
                    rhs: Address::Global(1),
                    dest: Address::Global(2),
                },
                Instruction::Echo { value: Address::Global(2) },
                Instruction::Arithmetic {
                    op: ArithmeticOp::Mod,
                    lhs: Address::Global(0),
                    rhs: Address::Global(1),
                    dest: Address::Global(2),
                },
                Instruction::Echo { value: Address::Global(2) },
                Instruction::Halt,
            ],
            globals: 3,
            labels: Vec::new(),
        };
        assert_eq!(run(&program).unwrap(), "-3\n1\n");
    }

    #[test]
    fn call_passes_arguments_and_result() {
        // double(x) = x + x
        let program = Program {
            code: vec![
                Instruction::Jump { target: 4 },
                Instruction::Enter { frame_size: 2 },
                Instruction::Arithmetic {
                    op: ArithmeticOp::Add,
                    lhs: Address::Local(0),
                    rhs: Address::Local(0),
                    dest: Address::Local(1),
                },
                Instruction::Return { value: Some(Address::Local(1)) },
                Instruction::LoadInt { dest: Address::Global(0), value: 21 },
                Instruction::Call {
                    target: 1,
                    args: vec![Address::Global(0)],
                    result: Some(Address::Global(1)),
                },
                Instruction::Echo { value: Address::Global(1) },
                Instruction::Halt,
            ],
            globals: 2,
            labels: vec![("double".to_string(), 1)],
        };
        let mut machine = Machine::new(&program, Vec::new());
        machine.run().unwrap();
        assert_eq!(machine.globals(), &[Value::Int(21), Value::Int(42)]);
        assert_eq!(machine.into_output(), b"42\n");
    }

    #[test]
    fn faults() {
        let divide = Program {
            code: vec![
                Instruction::LoadInt { dest: Address::Global(0), value: 0 },
                Instruction::Arithmetic {
                    op: ArithmeticOp::Mod,
                    lhs: Address::Global(0),
                    rhs: Address::Global(0),
                    dest: Address::Global(0),
                },
            ],
            globals: 1,
            labels: Vec::new(),
        };
        assert!(matches!(run(&divide), Err(RuntimeError::DivisionByZero)));

        let unset = Program {
            code: vec![Instruction::Echo { value: Address::Global(0) }],
            globals: 1,
            labels: Vec::new(),
        };
        assert!(matches!(
            run(&unset),
            Err(RuntimeError::UninitializedRead(Address::Global(0)))
        ));

        let stray = Program {
            code: vec![Instruction::Return { value: None }],
            globals: 0,
            labels: Vec::new(),
        };
        assert!(matches!(run(&stray), Err(RuntimeError::InvalidReturn)));

        let jump = Program {
            code: vec![Instruction::Jump { target: 9 }],
            globals: 0,
            labels: Vec::new(),
        };
        assert!(matches!(run(&jump), Err(RuntimeError::InvalidJump(9))));
    }

    #[test]
    fn unbounded_recursion_hits_the_depth_limit() {
        let program = Program {
            code: vec![
                Instruction::Enter { frame_size: 0 },
                Instruction::Call { target: 0, args: Vec::new(), result: None },
            ],
            globals: 0,
            labels: Vec::new(),
        };
        let options = MachineOptions {
            max_call_depth: 16,
            ..Default::default()
        };
        let mut machine = Machine::with_options(&program, options, io::sink());
        assert!(matches!(machine.run(), Err(RuntimeError::CallDepthExceeded(16))));
    }

    #[test]
    fn oversized_global_frame_from_bytecode_is_refused() {
        let program = Program {
            code: vec![Instruction::Halt],
            globals: u32::MAX,
            labels: Vec::new(),
        };
        let decoded = Program::from_bytes(&program.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.globals, u32::MAX);
        assert!(matches!(
            run(&decoded),
            Err(RuntimeError::StackOverflow {
                requested,
                limit: DEFAULT_MAX_STACK_SLOTS,
            }) if requested == u32::MAX as usize
        ));
    }

    #[test]
    fn frames_respect_the_stack_limit() {
        let huge = Program {
            code: vec![
                Instruction::Call { target: 2, args: Vec::new(), result: None },
                Instruction::Halt,
                Instruction::Enter { frame_size: u32::MAX },
                Instruction::Return { value: None },
            ],
            globals: 0,
            labels: Vec::new(),
        };
        assert!(matches!(run(&huge), Err(RuntimeError::StackOverflow { .. })));

        // each level holds one argument and one local
        let deep = Program {
            code: vec![
                Instruction::LoadInt { dest: Address::Global(0), value: 1 },
                Instruction::Enter { frame_size: 2 },
                Instruction::Call { target: 1, args: vec![Address::Global(0)], result: None },
            ],
            globals: 1,
            labels: Vec::new(),
        };
        let options = MachineOptions {
            max_stack_slots: 64,
            ..Default::default()
        };
        let mut machine = Machine::with_options(&deep, options, io::sink());
        assert!(matches!(
            machine.run(),
            Err(RuntimeError::StackOverflow { limit: 64, .. })
        ));
    }
}
