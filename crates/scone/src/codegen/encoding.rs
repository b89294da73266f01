// Binary container for compiled programs. All integers are little endian.
//
//   magic "SCNB" | version: u16 | flags: u16 | globals: u32 | count: u32
//   count x instruction (opcode: u8, operands)
//   [labels: count: u32, count x (name length: u32, name bytes, entry: u32)]

use std::io::{Read, Write};

use bitflags::bitflags;
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use thiserror::Error;

use super::bytecode::{Address, ArithmeticOp, CompareOp, Instruction, LogicOp, Program};

const MAGIC: &[u8; 4] = b"SCNB";
const VERSION: u16 = 1;

#[derive(Error, Debug)]
pub enum BytecodeError {
    #[error("not a scone bytecode file")]
    BadMagic,
    #[error("unsupported bytecode version {0}")]
    UnsupportedVersion(u16),
    #[error("unrecognized header flags {0:#x}")]
    UnknownFlags(u16),
    #[error("bad or unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("bad operator {1} for opcode {0:?}")]
    UnknownOperator(Opcode, u8),
    #[error("bad address kind {0}")]
    UnknownAddressKind(u8),
    #[error("label name is not valid utf-8")]
    BadLabel,
    #[error("unexpected eof while decoding")]
    UnexpectedEof,
    #[error("i/o error while encoding or decoding")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for BytecodeError {
    fn from(value: std::io::Error) -> Self {
        match value.kind() {
            std::io::ErrorKind::UnexpectedEof => BytecodeError::UnexpectedEof,
            _ => BytecodeError::Io(value),
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ProgramFlags: u16 {
        const LABELS = 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    LoadInt,
    LoadBool,
    Copy,
    Arithmetic,
    Compare,
    Logic,
    Not,
    Jump,
    JumpUnless,
    Call,
    Enter,
    Return,
    Echo,
    Halt,
}

impl TryFrom<u8> for Opcode {
    type Error = BytecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::LoadInt),
            1 => Ok(Opcode::LoadBool),
            2 => Ok(Opcode::Copy),
            3 => Ok(Opcode::Arithmetic),
            4 => Ok(Opcode::Compare),
            5 => Ok(Opcode::Logic),
            6 => Ok(Opcode::Not),
            7 => Ok(Opcode::Jump),
            8 => Ok(Opcode::JumpUnless),
            9 => Ok(Opcode::Call),
            10 => Ok(Opcode::Enter),
            11 => Ok(Opcode::Return),
            12 => Ok(Opcode::Echo),
            13 => Ok(Opcode::Halt),
            _ => Err(BytecodeError::UnknownOpcode(value)),
        }
    }
}

impl Instruction {
    fn opcode(&self) -> Opcode {
        match self {
            Instruction::LoadInt { .. } => Opcode::LoadInt,
            Instruction::LoadBool { .. } => Opcode::LoadBool,
            Instruction::Copy { .. } => Opcode::Copy,
            Instruction::Arithmetic { .. } => Opcode::Arithmetic,
            Instruction::Compare { .. } => Opcode::Compare,
            Instruction::Logic { .. } => Opcode::Logic,
            Instruction::Not { .. } => Opcode::Not,
            Instruction::Jump { .. } => Opcode::Jump,
            Instruction::JumpUnless { .. } => Opcode::JumpUnless,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Enter { .. } => Opcode::Enter,
            Instruction::Return { .. } => Opcode::Return,
            Instruction::Echo { .. } => Opcode::Echo,
            Instruction::Halt => Opcode::Halt,
        }
    }
}

fn write_address<W: Write>(writer: &mut W, address: Address) -> Result<(), BytecodeError> {
    let (kind, slot) = match address {
        Address::Global(slot) => (0, slot),
        Address::Local(slot) => (1, slot),
    };
    writer.write_u8(kind)?;
    writer.write_u32::<LE>(slot)?;
    Ok(())
}

fn read_address<R: Read>(reader: &mut R) -> Result<Address, BytecodeError> {
    let kind = reader.read_u8()?;
    let slot = reader.read_u32::<LE>()?;
    match kind {
        0 => Ok(Address::Global(slot)),
        1 => Ok(Address::Local(slot)),
        _ => Err(BytecodeError::UnknownAddressKind(kind)),
    }
}

fn write_optional_address<W: Write>(writer: &mut W, address: Option<Address>) -> Result<(), BytecodeError> {
    match address {
        Some(address) => {
            writer.write_u8(1)?;
            write_address(writer, address)
        }
        None => Ok(writer.write_u8(0)?),
    }
}

fn read_optional_address<R: Read>(reader: &mut R) -> Result<Option<Address>, BytecodeError> {
    match reader.read_u8()? {
        0 => Ok(None),
        _ => Ok(Some(read_address(reader)?)),
    }
}

// operands of the three-address forms: op byte, lhs, rhs, dest
fn write_binary<W: Write>(writer: &mut W, op: u8, lhs: Address, rhs: Address, dest: Address) -> Result<(), BytecodeError> {
    writer.write_u8(op)?;
    write_address(writer, lhs)?;
    write_address(writer, rhs)?;
    write_address(writer, dest)
}

fn write_instruction<W: Write>(writer: &mut W, instruction: &Instruction) -> Result<(), BytecodeError> {
    writer.write_u8(instruction.opcode() as u8)?;
    match instruction {
        Instruction::LoadInt { dest, value } => {
            write_address(writer, *dest)?;
            writer.write_i64::<LE>(*value)?;
        }
        Instruction::LoadBool { dest, value } => {
            write_address(writer, *dest)?;
            writer.write_u8(*value as u8)?;
        }
        Instruction::Copy { src, dest } | Instruction::Not { src, dest } => {
            write_address(writer, *src)?;
            write_address(writer, *dest)?;
        }
        Instruction::Arithmetic { op, lhs, rhs, dest } => {
            write_binary(writer, *op as u8, *lhs, *rhs, *dest)?;
        }
        Instruction::Compare { op, lhs, rhs, dest } => {
            write_binary(writer, *op as u8, *lhs, *rhs, *dest)?;
        }
        Instruction::Logic { op, lhs, rhs, dest } => {
            write_binary(writer, *op as u8, *lhs, *rhs, *dest)?;
        }
        Instruction::Jump { target } => writer.write_u32::<LE>(*target)?,
        Instruction::JumpUnless { condition, target } => {
            write_address(writer, *condition)?;
            writer.write_u32::<LE>(*target)?;
        }
        Instruction::Call { target, args, result } => {
            writer.write_u32::<LE>(*target)?;
            writer.write_u32::<LE>(args.len() as u32)?;
            for arg in args {
                write_address(writer, *arg)?;
            }
            write_optional_address(writer, *result)?;
        }
        Instruction::Enter { frame_size } => writer.write_u32::<LE>(*frame_size)?,
        Instruction::Return { value } => write_optional_address(writer, *value)?,
        Instruction::Echo { value } => write_address(writer, *value)?,
        Instruction::Halt => {}
    }
    Ok(())
}

fn read_instruction<R: Read>(reader: &mut R) -> Result<Instruction, BytecodeError> {
    let opcode: Opcode = reader.read_u8()?.try_into()?;
    let instruction = match opcode {
        Opcode::LoadInt => Instruction::LoadInt {
            dest: read_address(reader)?,
            value: reader.read_i64::<LE>()?,
        },
        Opcode::LoadBool => Instruction::LoadBool {
            dest: read_address(reader)?,
            value: reader.read_u8()? != 0,
        },
        Opcode::Copy => Instruction::Copy {
            src: read_address(reader)?,
            dest: read_address(reader)?,
        },
        Opcode::Not => Instruction::Not {
            src: read_address(reader)?,
            dest: read_address(reader)?,
        },
        Opcode::Arithmetic => {
            let op = match reader.read_u8()? {
                0 => ArithmeticOp::Add,
                1 => ArithmeticOp::Sub,
                2 => ArithmeticOp::Mul,
                3 => ArithmeticOp::Div,
                4 => ArithmeticOp::Mod,
                other => return Err(BytecodeError::UnknownOperator(opcode, other)),
            };
            Instruction::Arithmetic {
                op,
                lhs: read_address(reader)?,
                rhs: read_address(reader)?,
                dest: read_address(reader)?,
            }
        }
        Opcode::Compare => {
            let op = match reader.read_u8()? {
                0 => CompareOp::Equal,
                1 => CompareOp::NotEqual,
                2 => CompareOp::Less,
                3 => CompareOp::LessEqual,
                4 => CompareOp::Greater,
                5 => CompareOp::GreaterEqual,
                other => return Err(BytecodeError::UnknownOperator(opcode, other)),
            };
            Instruction::Compare {
                op,
                lhs: read_address(reader)?,
                rhs: read_address(reader)?,
                dest: read_address(reader)?,
            }
        }
        Opcode::Logic => {
            let op = match reader.read_u8()? {
                0 => LogicOp::And,
                1 => LogicOp::Or,
                other => return Err(BytecodeError::UnknownOperator(opcode, other)),
            };
            Instruction::Logic {
                op,
                lhs: read_address(reader)?,
                rhs: read_address(reader)?,
                dest: read_address(reader)?,
            }
        }
        Opcode::Jump => Instruction::Jump {
            target: reader.read_u32::<LE>()?,
        },
        Opcode::JumpUnless => Instruction::JumpUnless {
            condition: read_address(reader)?,
            target: reader.read_u32::<LE>()?,
        },
        Opcode::Call => {
            let target = reader.read_u32::<LE>()?;
            let n_args = reader.read_u32::<LE>()?;
            let mut args = Vec::new();
            for _ in 0..n_args {
                args.push(read_address(reader)?);
            }
            Instruction::Call {
                target,
                args,
                result: read_optional_address(reader)?,
            }
        }
        Opcode::Enter => Instruction::Enter {
            frame_size: reader.read_u32::<LE>()?,
        },
        Opcode::Return => Instruction::Return {
            value: read_optional_address(reader)?,
        },
        Opcode::Echo => Instruction::Echo {
            value: read_address(reader)?,
        },
        Opcode::Halt => Instruction::Halt,
    };
    Ok(instruction)
}

pub fn write_program<W: Write>(writer: &mut W, program: &Program) -> Result<(), BytecodeError> {
    let mut flags = ProgramFlags::empty();
    if !program.labels.is_empty() {
        flags |= ProgramFlags::LABELS;
    }

    writer.write_all(MAGIC)?;
    writer.write_u16::<LE>(VERSION)?;
    writer.write_u16::<LE>(flags.bits())?;
    writer.write_u32::<LE>(program.globals)?;
    writer.write_u32::<LE>(program.code.len() as u32)?;
    for instruction in &program.code {
        write_instruction(writer, instruction)?;
    }

    if flags.contains(ProgramFlags::LABELS) {
        writer.write_u32::<LE>(program.labels.len() as u32)?;
        for (name, entry) in &program.labels {
            writer.write_u32::<LE>(name.len() as u32)?;
            writer.write_all(name.as_bytes())?;
            writer.write_u32::<LE>(*entry)?;
        }
    }
    Ok(())
}

pub fn read_program<R: Read>(reader: &mut R) -> Result<Program, BytecodeError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(BytecodeError::BadMagic);
    }

    let version = reader.read_u16::<LE>()?;
    if version != VERSION {
        return Err(BytecodeError::UnsupportedVersion(version));
    }
    let raw_flags = reader.read_u16::<LE>()?;
    let flags = ProgramFlags::from_bits(raw_flags).ok_or(BytecodeError::UnknownFlags(raw_flags))?;

    let globals = reader.read_u32::<LE>()?;
    let count = reader.read_u32::<LE>()?;
    let mut code = Vec::new();
    for _ in 0..count {
        code.push(read_instruction(reader)?);
    }

    let mut labels = Vec::new();
    if flags.contains(ProgramFlags::LABELS) {
        let n_labels = reader.read_u32::<LE>()?;
        for _ in 0..n_labels {
            let len = reader.read_u32::<LE>()?;
            let mut name = Vec::new();
            reader.by_ref().take(len as u64).read_to_end(&mut name)?;
            if name.len() != len as usize {
                return Err(BytecodeError::UnexpectedEof);
            }
            let name = String::from_utf8(name).map_err(|_| BytecodeError::BadLabel)?;
            labels.push((name, reader.read_u32::<LE>()?));
        }
    }

    Ok(Program { code, globals, labels })
}

impl Program {
    pub fn to_bytes(&self) -> Result<Vec<u8>, BytecodeError> {
        let mut bytes = Vec::new();
        write_program(&mut bytes, self)?;
        Ok(bytes)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Program, BytecodeError> {
        read_program(&mut bytes)
    }
}
