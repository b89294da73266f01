use std::fmt::Display;

/// Slot in either the global frame or the frame of the running function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    Global(u32),
    Local(u32),
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Global(slot) => write!(f, "g{}", slot),
            Address::Local(slot) => write!(f, "l{}", slot),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOp {
    /// Orderings only make sense on ints; equality works on any value.
    pub fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    LoadInt {
        dest: Address,
        value: i64,
    },
    LoadBool {
        dest: Address,
        value: bool,
    },
    Copy {
        src: Address,
        dest: Address,
    },
    Arithmetic {
        op: ArithmeticOp,
        lhs: Address,
        rhs: Address,
        dest: Address,
    },
    Compare {
        op: CompareOp,
        lhs: Address,
        rhs: Address,
        dest: Address,
    },
    Logic {
        op: LogicOp,
        lhs: Address,
        rhs: Address,
        dest: Address,
    },
    Not {
        src: Address,
        dest: Address,
    },
    Jump {
        target: u32,
    },
    JumpUnless {
        condition: Address,
        target: u32,
    },
    /// Arguments are read in the caller's frame and become slots `0..n` of the
    /// callee's frame.
    Call {
        target: u32,
        args: Vec<Address>,
        result: Option<Address>,
    },
    /// First instruction of every function; sizes the new frame.
    Enter {
        frame_size: u32,
    },
    Return {
        value: Option<Address>,
    },
    Echo {
        value: Address,
    },
    Halt,
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::LoadInt { dest, value } => write!(f, "load.int {}, {}", dest, value),
            Instruction::LoadBool { dest, value } => write!(f, "load.bool {}, {}", dest, value),
            Instruction::Copy { src, dest } => write!(f, "copy {} -> {}", src, dest),
            Instruction::Arithmetic { op, lhs, rhs, dest } => {
                let name = match op {
                    ArithmeticOp::Add => "add",
                    ArithmeticOp::Sub => "sub",
                    ArithmeticOp::Mul => "mul",
                    ArithmeticOp::Div => "div",
                    ArithmeticOp::Mod => "mod",
                };
                write!(f, "{} {}, {} -> {}", name, lhs, rhs, dest)
            }
            Instruction::Compare { op, lhs, rhs, dest } => {
                let name = match op {
                    CompareOp::Equal => "eq",
                    CompareOp::NotEqual => "ne",
                    CompareOp::Less => "lt",
                    CompareOp::LessEqual => "le",
                    CompareOp::Greater => "gt",
                    CompareOp::GreaterEqual => "ge",
                };
                write!(f, "cmp.{} {}, {} -> {}", name, lhs, rhs, dest)
            }
            Instruction::Logic { op, lhs, rhs, dest } => {
                let name = match op {
                    LogicOp::And => "and",
                    LogicOp::Or => "or",
                };
                write!(f, "{} {}, {} -> {}", name, lhs, rhs, dest)
            }
            Instruction::Not { src, dest } => write!(f, "not {} -> {}", src, dest),
            Instruction::Jump { target } => write!(f, "jump {}", target),
            Instruction::JumpUnless { condition, target } => {
                write!(f, "jump.unless {}, {}", condition, target)
            }
            Instruction::Call { target, args, result } => {
                write!(f, "call {}(", target)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")?;
                if let Some(result) = result {
                    write!(f, " -> {}", result)?;
                }
                Ok(())
            }
            Instruction::Enter { frame_size } => write!(f, "enter {}", frame_size),
            Instruction::Return { value: Some(value) } => write!(f, "return {}", value),
            Instruction::Return { value: None } => write!(f, "return"),
            Instruction::Echo { value } => write!(f, "echo {}", value),
            Instruction::Halt => write!(f, "halt"),
        }
    }
}

/// A compiled program. Execution starts at instruction 0 with a global frame of
/// `globals` slots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub code: Vec<Instruction>,
    pub globals: u32,
    /// Function names and their entry points, kept for disassembly.
    pub labels: Vec<(String, u32)>,
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "; globals: {}", self.globals)?;
        for (i, instruction) in self.code.iter().enumerate() {
            for (name, _) in self.labels.iter().filter(|(_, entry)| *entry as usize == i) {
                writeln!(f, "{}:", name)?;
            }
            writeln!(f, "{:>5}  {}", i, instruction)?;
        }
        Ok(())
    }
}
