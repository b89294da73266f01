use std::collections::HashMap;

use thiserror::Error;

use crate::{
    codegen::bytecode::{Address, ArithmeticOp, CompareOp, Instruction, LogicOp, Program},
    language::Rule,
    parser::{driver::SemanticActions, grammar::ProductionId},
    scanner::token::Token,
};

use super::{
    symtab::{ScopeError, SymbolTable},
    types::{FunctionSignature, Type},
};

const ECHO: &str = "echo";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operand {
    pub ty: Type,
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub ty: Type,
    pub name: String,
}

/// Value attached to each parse stack entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SemanticValue {
    Lexeme(String),
    Operand(Operand),
    Type(Type),
    Comparison(CompareOp),
    Arguments(Vec<Operand>),
    Parameters(Vec<Parameter>),
    /// Statements, scope markers and calls to void functions.
    Unit,
}

impl SemanticValue {
    fn kind(&self) -> &'static str {
        match self {
            SemanticValue::Lexeme(_) => "lexeme",
            SemanticValue::Operand(_) => "operand",
            SemanticValue::Type(_) => "type",
            SemanticValue::Comparison(_) => "comparison",
            SemanticValue::Arguments(_) => "argument list",
            SemanticValue::Parameters(_) => "parameter list",
            SemanticValue::Unit => "unit",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SemanticError {
    #[error("use of undeclared variable `{0}`")]
    UndeclaredVariable(String),
    #[error("call to undefined function `{0}`")]
    UndefinedFunction(String),
    #[error("function `{0}` is already defined")]
    FunctionRedefined(String),
    #[error("expected `{expected}` in {context}, found `{found}`")]
    TypeMismatch {
        context: &'static str,
        expected: Type,
        found: Type,
    },
    #[error("operator `{operator}` cannot be applied to `{lhs}` and `{rhs}`")]
    InvalidOperands {
        operator: &'static str,
        lhs: Type,
        rhs: Type,
    },
    #[error("operator `{operator}` cannot be applied to `{operand}`")]
    InvalidOperand { operator: &'static str, operand: Type },
    #[error("`{function}` takes {expected} arguments but {found} were given")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("void value used in an expression")]
    VoidValue,
    #[error("parameter `{0}` cannot have type void")]
    VoidParameter(String),
    #[error("`return` outside of a function")]
    ReturnOutsideFunction,
    #[error("`return;` in function `{function}` which returns `{ty}`")]
    MissingReturnValue { function: String, ty: Type },
    #[error("integer literal `{0}` out of range")]
    BadIntegerLiteral(String),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("expected {expected} on the parse stack, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },
    #[error("internal emitter error: {0}")]
    Internal(&'static str),
}

// right-hand side values of one reduction, consumed left to right
struct Values(std::vec::IntoIter<SemanticValue>);

impl Values {
    fn next(&mut self) -> Result<SemanticValue, SemanticError> {
        self.0.next().ok_or(SemanticError::Internal("missing right-hand side value"))
    }

    fn skip(&mut self) -> Result<(), SemanticError> {
        self.next().map(|_| ())
    }

    fn lexeme(&mut self) -> Result<String, SemanticError> {
        match self.next()? {
            SemanticValue::Lexeme(lexeme) => Ok(lexeme),
            other => Err(unexpected("lexeme", &other)),
        }
    }

    /// Operand of a non-void expression.
    fn operand(&mut self) -> Result<Operand, SemanticError> {
        match self.next()? {
            SemanticValue::Operand(operand) => Ok(operand),
            SemanticValue::Unit => Err(SemanticError::VoidValue),
            other => Err(unexpected("operand", &other)),
        }
    }

    fn ty(&mut self) -> Result<Type, SemanticError> {
        match self.next()? {
            SemanticValue::Type(ty) => Ok(ty),
            other => Err(unexpected("type", &other)),
        }
    }

    fn comparison(&mut self) -> Result<CompareOp, SemanticError> {
        match self.next()? {
            SemanticValue::Comparison(op) => Ok(op),
            other => Err(unexpected("comparison", &other)),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Operand>, SemanticError> {
        match self.next()? {
            SemanticValue::Arguments(args) => Ok(args),
            other => Err(unexpected("argument list", &other)),
        }
    }

    fn parameters(&mut self) -> Result<Vec<Parameter>, SemanticError> {
        match self.next()? {
            SemanticValue::Parameters(params) => Ok(params),
            other => Err(unexpected("parameter list", &other)),
        }
    }
}

fn unexpected(expected: &'static str, found: &SemanticValue) -> SemanticError {
    SemanticError::UnexpectedValue {
        expected,
        found: found.kind(),
    }
}

struct FunctionContext {
    name: String,
    ret: Type,
    // index of the jump over the body and of the `Enter` to patch on close
    skip_jump: usize,
    enter: usize,
}

// one if / else if / else chain
#[derive(Default)]
struct BranchChain {
    // conditional jump of the branch being compiled, taken when its condition fails
    pending: Option<usize>,
    // jumps from the end of each finished branch to the end of the chain
    exits: Vec<usize>,
}

/// Semantic actions for the scone language: type checks every reduction and
/// emits bytecode as it goes.
pub struct Emitter {
    code: Vec<Instruction>,
    scopes: SymbolTable,
    functions: HashMap<String, FunctionSignature>,
    labels: Vec<(String, u32)>,
    function_stack: Vec<FunctionContext>,
    branches: Vec<BranchChain>,
    // set by `else` when it is followed by `if`
    continue_chain: bool,
}

impl Default for Emitter {
    fn default() -> Self {
        Emitter::new()
    }
}

impl Emitter {
    pub fn new() -> Emitter {
        Emitter {
            code: Vec::new(),
            scopes: SymbolTable::new(),
            functions: HashMap::new(),
            labels: Vec::new(),
            function_stack: Vec::new(),
            branches: Vec::new(),
            continue_chain: false,
        }
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.code.push(instruction);
        self.code.len() - 1
    }

    fn next_index(&self) -> u32 {
        self.code.len() as u32
    }

    fn patch_jump(&mut self, at: usize, to: u32) -> Result<(), SemanticError> {
        match self.code.get_mut(at) {
            Some(Instruction::Jump { target }) | Some(Instruction::JumpUnless { target, .. }) => {
                *target = to;
                Ok(())
            }
            _ => Err(SemanticError::Internal("patched instruction is not a jump")),
        }
    }

    fn temporary(&mut self, ty: Type) -> Operand {
        Operand {
            ty,
            address: self.scopes.temporary(),
        }
    }

    fn arithmetic(&mut self, op: ArithmeticOp, operator: &'static str, values: &mut Values) -> Result<SemanticValue, SemanticError> {
        let lhs = values.operand()?;
        values.skip()?;
        let rhs = values.operand()?;
        if lhs.ty != Type::Int || rhs.ty != Type::Int {
            return Err(SemanticError::InvalidOperands { operator, lhs: lhs.ty, rhs: rhs.ty });
        }
        let dest = self.temporary(Type::Int);
        self.emit(Instruction::Arithmetic {
            op,
            lhs: lhs.address,
            rhs: rhs.address,
            dest: dest.address,
        });
        Ok(SemanticValue::Operand(dest))
    }

    fn logic(&mut self, op: LogicOp, operator: &'static str, values: &mut Values) -> Result<SemanticValue, SemanticError> {
        let lhs = values.operand()?;
        values.skip()?;
        let rhs = values.operand()?;
        if lhs.ty != Type::Bool || rhs.ty != Type::Bool {
            return Err(SemanticError::InvalidOperands { operator, lhs: lhs.ty, rhs: rhs.ty });
        }
        let dest = self.temporary(Type::Bool);
        self.emit(Instruction::Logic {
            op,
            lhs: lhs.address,
            rhs: rhs.address,
            dest: dest.address,
        });
        Ok(SemanticValue::Operand(dest))
    }

    fn compare(&mut self, values: &mut Values) -> Result<SemanticValue, SemanticError> {
        let lhs = values.operand()?;
        let op = values.comparison()?;
        let rhs = values.operand()?;
        if lhs.ty != rhs.ty || (op.is_ordering() && lhs.ty != Type::Int) {
            let operator = match op {
                CompareOp::Equal => "==",
                CompareOp::NotEqual => "!=",
                CompareOp::Less => "<",
                CompareOp::LessEqual => "<=",
                CompareOp::Greater => ">",
                CompareOp::GreaterEqual => ">=",
            };
            return Err(SemanticError::InvalidOperands { operator, lhs: lhs.ty, rhs: rhs.ty });
        }
        let dest = self.temporary(Type::Bool);
        self.emit(Instruction::Compare {
            op,
            lhs: lhs.address,
            rhs: rhs.address,
            dest: dest.address,
        });
        Ok(SemanticValue::Operand(dest))
    }

    fn declare(&mut self, ty: Type, values: &mut Values) -> Result<SemanticValue, SemanticError> {
        values.skip()?;
        let name = values.lexeme()?;
        values.skip()?;
        let value = values.operand()?;
        if value.ty != ty {
            return Err(SemanticError::TypeMismatch {
                context: "declaration",
                expected: ty,
                found: value.ty,
            });
        }
        let dest = self.scopes.declare(&name, ty)?;
        self.emit(Instruction::Copy { src: value.address, dest });
        Ok(SemanticValue::Unit)
    }

    fn call(&mut self, name: String, args: Vec<Operand>) -> Result<SemanticValue, SemanticError> {
        if name == ECHO {
            if args.len() != 1 {
                return Err(SemanticError::ArgumentCount { function: name, expected: 1, found: args.len() });
            }
            self.emit(Instruction::Echo { value: args[0].address });
            return Ok(SemanticValue::Unit);
        }

        let signature = self
            .functions
            .get(&name)
            .cloned()
            .ok_or_else(|| SemanticError::UndefinedFunction(name.clone()))?;
        if signature.params.len() != args.len() {
            return Err(SemanticError::ArgumentCount {
                function: name,
                expected: signature.params.len(),
                found: args.len(),
            });
        }
        for (expected, arg) in signature.params.iter().zip(&args) {
            if *expected != arg.ty {
                return Err(SemanticError::TypeMismatch {
                    context: "argument",
                    expected: *expected,
                    found: arg.ty,
                });
            }
        }

        let args = args.iter().map(|arg| arg.address).collect();
        if signature.ret == Type::Void {
            self.emit(Instruction::Call { target: signature.entry, args, result: None });
            Ok(SemanticValue::Unit)
        } else {
            let result = self.temporary(signature.ret);
            self.emit(Instruction::Call {
                target: signature.entry,
                args,
                result: Some(result.address),
            });
            Ok(SemanticValue::Operand(result))
        }
    }

    fn define_function(&mut self, name: String, params: Vec<Parameter>, ret: Type) -> Result<SemanticValue, SemanticError> {
        if name == ECHO || self.functions.contains_key(&name) {
            return Err(SemanticError::FunctionRedefined(name));
        }
        if let Some(param) = params.iter().find(|param| param.ty == Type::Void) {
            return Err(SemanticError::VoidParameter(param.name.clone()));
        }

        let skip_jump = self.emit(Instruction::Jump { target: 0 });
        let entry = self.next_index();
        let enter = self.emit(Instruction::Enter { frame_size: 0 });

        self.functions.insert(
            name.clone(),
            FunctionSignature {
                params: params.iter().map(|param| param.ty).collect(),
                ret,
                entry,
            },
        );
        self.labels.push((name.clone(), entry));

        self.scopes.open_function();
        for param in &params {
            self.scopes.declare(&param.name, param.ty)?;
        }
        self.function_stack.push(FunctionContext { name, ret, skip_jump, enter });
        Ok(SemanticValue::Unit)
    }

    fn close_function(&mut self) -> Result<SemanticValue, SemanticError> {
        let context = self
            .function_stack
            .pop()
            .ok_or(SemanticError::Internal("function close without a function"))?;
        self.emit(Instruction::Return { value: None });
        let frame_size = self.scopes.close_scope()?;
        self.code[context.enter] = Instruction::Enter { frame_size };
        let end = self.next_index();
        self.patch_jump(context.skip_jump, end)?;
        Ok(SemanticValue::Unit)
    }

    fn if_header(&mut self, values: &mut Values) -> Result<SemanticValue, SemanticError> {
        values.skip()?;
        let condition = values.operand()?;
        if condition.ty != Type::Bool {
            return Err(SemanticError::TypeMismatch {
                context: "if condition",
                expected: Type::Bool,
                found: condition.ty,
            });
        }
        let jump = self.emit(Instruction::JumpUnless { condition: condition.address, target: 0 });

        if self.continue_chain {
            self.continue_chain = false;
            let chain = self
                .branches
                .last_mut()
                .ok_or(SemanticError::Internal("else if without an open chain"))?;
            chain.pending = Some(jump);
        } else {
            self.branches.push(BranchChain { pending: Some(jump), exits: Vec::new() });
        }
        Ok(SemanticValue::Unit)
    }

    // end of a branch that is followed by another one
    fn end_branch(&mut self) -> Result<SemanticValue, SemanticError> {
        let exit = self.emit(Instruction::Jump { target: 0 });
        let next = self.next_index();
        let chain = self
            .branches
            .last_mut()
            .ok_or(SemanticError::Internal("branch end without an open chain"))?;
        chain.exits.push(exit);
        if let Some(pending) = chain.pending.take() {
            self.patch_jump(pending, next)?;
        }
        Ok(SemanticValue::Unit)
    }

    fn finish_chain(&mut self) -> Result<SemanticValue, SemanticError> {
        let chain = self
            .branches
            .pop()
            .ok_or(SemanticError::Internal("chain end without an open chain"))?;
        let end = self.next_index();
        for jump in chain.pending.into_iter().chain(chain.exits) {
            self.patch_jump(jump, end)?;
        }
        Ok(SemanticValue::Unit)
    }

    fn return_statement(&mut self, value: Option<Operand>) -> Result<SemanticValue, SemanticError> {
        let context = self
            .function_stack
            .last()
            .ok_or(SemanticError::ReturnOutsideFunction)?;
        let ret = context.ret;
        match value {
            Some(value) if value.ty != ret => {
                return Err(SemanticError::TypeMismatch {
                    context: "return",
                    expected: ret,
                    found: value.ty,
                });
            }
            None if ret != Type::Void => {
                return Err(SemanticError::MissingReturnValue {
                    function: context.name.clone(),
                    ty: ret,
                });
            }
            _ => {}
        }
        self.emit(Instruction::Return { value: value.map(|value| value.address) });
        Ok(SemanticValue::Unit)
    }

    fn apply(&mut self, rule: Rule, values: &mut Values) -> Result<SemanticValue, SemanticError> {
        match rule {
            Rule::Goal
            | Rule::StatementListSingle
            | Rule::StatementListCons
            | Rule::Block
            | Rule::FunctionDeclaration
            | Rule::IfElse
            | Rule::WithElseIf
            | Rule::FunctionBody
            | Rule::FunctionOpen => Ok(SemanticValue::Unit),

            Rule::DeclareInt => self.declare(Type::Int, values),
            Rule::DeclareBool => self.declare(Type::Bool, values),
            Rule::Assign => {
                let name = values.lexeme()?;
                values.skip()?;
                let value = values.operand()?;
                let binding = *self
                    .scopes
                    .lookup(&name)
                    .ok_or(SemanticError::UndeclaredVariable(name))?;
                if binding.ty != value.ty {
                    return Err(SemanticError::TypeMismatch {
                        context: "assignment",
                        expected: binding.ty,
                        found: value.ty,
                    });
                }
                self.emit(Instruction::Copy { src: value.address, dest: binding.address });
                Ok(SemanticValue::Unit)
            }
            Rule::ExprStatement => match values.next()? {
                SemanticValue::Operand(_) | SemanticValue::Unit => Ok(SemanticValue::Unit),
                other => Err(unexpected("expression", &other)),
            },
            Rule::ReturnValue => {
                values.skip()?;
                let value = values.operand()?;
                self.return_statement(Some(value))
            }
            Rule::ReturnVoid => self.return_statement(None),
            Rule::If | Rule::WithElseIfLast | Rule::WithElse => self.finish_chain(),

            Rule::ExprOr => self.logic(LogicOp::Or, "|", values),
            Rule::AndTermAnd => self.logic(LogicOp::And, "&", values),
            Rule::NotTermNot => {
                values.skip()?;
                let operand = values.operand()?;
                if operand.ty != Type::Bool {
                    return Err(SemanticError::InvalidOperand { operator: "!", operand: operand.ty });
                }
                let dest = self.temporary(Type::Bool);
                self.emit(Instruction::Not { src: operand.address, dest: dest.address });
                Ok(SemanticValue::Operand(dest))
            }
            Rule::RelExprCompare => self.compare(values),
            Rule::NExprAdd => self.arithmetic(ArithmeticOp::Add, "+", values),
            Rule::NExprSub => self.arithmetic(ArithmeticOp::Sub, "-", values),
            Rule::TermMul => self.arithmetic(ArithmeticOp::Mul, "*", values),
            Rule::TermDiv => self.arithmetic(ArithmeticOp::Div, "/", values),
            Rule::TermMod => self.arithmetic(ArithmeticOp::Mod, "%", values),

            Rule::ExprAndTerm
            | Rule::AndTermNotTerm
            | Rule::NotTermRelExpr
            | Rule::RelExprNExpr
            | Rule::NExprTerm
            | Rule::TermFactor
            | Rule::FactorCall
            | Rule::ParamListSingle => values.next(),

            Rule::RelsEqual => Ok(SemanticValue::Comparison(CompareOp::Equal)),
            Rule::RelsNotEqual => Ok(SemanticValue::Comparison(CompareOp::NotEqual)),
            Rule::RelsLess => Ok(SemanticValue::Comparison(CompareOp::Less)),
            Rule::RelsLessEqual => Ok(SemanticValue::Comparison(CompareOp::LessEqual)),
            Rule::RelsGreater => Ok(SemanticValue::Comparison(CompareOp::Greater)),
            Rule::RelsGreaterEqual => Ok(SemanticValue::Comparison(CompareOp::GreaterEqual)),

            Rule::FactorParens => {
                values.skip()?;
                values.next()
            }
            Rule::FactorNumber => {
                let literal = values.lexeme()?;
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| SemanticError::BadIntegerLiteral(literal))?;
                let dest = self.temporary(Type::Int);
                self.emit(Instruction::LoadInt { dest: dest.address, value });
                Ok(SemanticValue::Operand(dest))
            }
            Rule::FactorIdentifier => {
                let name = values.lexeme()?;
                let binding = self
                    .scopes
                    .lookup(&name)
                    .ok_or(SemanticError::UndeclaredVariable(name))?;
                Ok(SemanticValue::Operand(Operand { ty: binding.ty, address: binding.address }))
            }
            Rule::FactorTrue | Rule::FactorFalse => {
                let dest = self.temporary(Type::Bool);
                self.emit(Instruction::LoadBool { dest: dest.address, value: rule == Rule::FactorTrue });
                Ok(SemanticValue::Operand(dest))
            }

            Rule::CallArgs => {
                let name = values.lexeme()?;
                values.skip()?;
                let args = values.arguments()?;
                self.call(name, args)
            }
            Rule::CallNoArgs => {
                let name = values.lexeme()?;
                self.call(name, Vec::new())
            }
            Rule::ArgListCons => {
                let mut args = values.arguments()?;
                values.skip()?;
                args.push(values.operand()?);
                Ok(SemanticValue::Arguments(args))
            }
            Rule::ArgListSingle => Ok(SemanticValue::Arguments(vec![values.operand()?])),

            Rule::ScopeBegin | Rule::LabelledScopeBegin => {
                self.scopes.open_block();
                Ok(SemanticValue::Unit)
            }
            Rule::ScopeClose | Rule::LabelledScopeClose => {
                self.scopes.close_scope()?;
                Ok(SemanticValue::Unit)
            }

            Rule::FunctionDefinitionParams => {
                let name = values.lexeme()?;
                values.skip()?;
                let params = values.parameters()?;
                values.skip()?;
                let ret = values.ty()?;
                self.define_function(name, params, ret)
            }
            Rule::FunctionDefinitionNoParams => {
                let name = values.lexeme()?;
                values.skip()?;
                values.skip()?;
                let ret = values.ty()?;
                self.define_function(name, Vec::new(), ret)
            }
            Rule::ParamListCons => {
                let mut params = values.parameters()?;
                values.skip()?;
                params.extend(values.parameters()?);
                Ok(SemanticValue::Parameters(params))
            }
            Rule::Param => {
                let ty = values.ty()?;
                let name = values.lexeme()?;
                Ok(SemanticValue::Parameters(vec![Parameter { ty, name }]))
            }
            Rule::VarTypeInt => Ok(SemanticValue::Type(Type::Int)),
            Rule::VarTypeBool => Ok(SemanticValue::Type(Type::Bool)),
            Rule::VarTypeVoid => Ok(SemanticValue::Type(Type::Void)),
            Rule::FunctionClose => self.close_function(),

            Rule::IfHeader => self.if_header(values),
            Rule::EndConditionalScope => self.end_branch(),
            Rule::BeginElseIf => {
                self.continue_chain = true;
                Ok(SemanticValue::Unit)
            }
        }
    }
}

impl SemanticActions for Emitter {
    type Value = SemanticValue;
    type Output = Program;
    type Error = SemanticError;

    fn shift(&mut self, token: Token) -> Self::Value {
        SemanticValue::Lexeme(token.lexeme)
    }

    fn reduce(&mut self, production: ProductionId, values: Vec<Self::Value>) -> Result<Self::Value, Self::Error> {
        let rule = Rule::from_production(production)
            .ok_or(SemanticError::Internal("production does not belong to the scone grammar"))?;
        self.apply(rule, &mut Values(values.into_iter()))
    }

    fn accept(&mut self, _value: Option<Self::Value>) -> Result<Self::Output, Self::Error> {
        if !self.function_stack.is_empty() || !self.branches.is_empty() {
            return Err(SemanticError::Internal("unterminated function or conditional"));
        }
        let globals = self.scopes.close_global()?;
        self.emit(Instruction::Halt);
        log::debug!("emitted {} instructions, {} globals", self.code.len(), globals);

        Ok(Program {
            code: std::mem::take(&mut self.code),
            globals,
            labels: std::mem::take(&mut self.labels),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        language::Language,
        parser::{
            driver::{ParseError, Parser},
            first::FirstSets,
            lr_table::{LRTables, TableOptions},
        },
        scanner::Scanner,
    };

    use super::*;

    fn emit(source: &str) -> Result<Program, ParseError<SemanticError>> {
        let language = Language::new().unwrap();
        let first = FirstSets::compute(language.grammar());
        let tables = LRTables::from_grammar(language.grammar(), &first, &TableOptions::default()).unwrap();
        let parser = Parser::new(language.grammar(), &tables);
        parser.parse(Scanner::new(source), &mut Emitter::new())
    }

    fn semantic_error(source: &str) -> SemanticError {
        match emit(source) {
            Err(ParseError::Action(error)) => error,
            other => panic!("expected a semantic error, got {:?}", other),
        }
    }

    #[test]
    fn declaration_emits_load_and_copy() {
        let program = emit("int x = 4;").unwrap();
        assert_eq!(
            program.code,
            vec![
                Instruction::LoadInt { dest: Address::Global(0), value: 4 },
                Instruction::Copy { src: Address::Global(0), dest: Address::Global(1) },
                Instruction::Halt,
            ]
        );
        assert_eq!(program.globals, 2);
    }

    #[test]
    fn function_is_skipped_and_sized() {
        let program = emit("func add(int a, int b) int { return a + b; } int r = add(1, 2);").unwrap();
        assert_eq!(program.labels, vec![("add".to_string(), 1)]);
        assert_eq!(program.code[0], Instruction::Jump { target: 5 });
        assert_eq!(program.code[1], Instruction::Enter { frame_size: 3 });
        assert_eq!(program.code[3], Instruction::Return { value: Some(Address::Local(2)) });
        assert_eq!(program.code[4], Instruction::Return { value: None });
        assert!(program.code.iter().any(|instruction| matches!(
            instruction,
            Instruction::Call { target: 1, args, result: Some(_) } if args.len() == 2
        )));
    }

    #[test]
    fn if_chain_jumps_to_the_end() {
        let program = emit("bool b = true; if b { echo(1); } else if !b { echo(2); } else { echo(3); }").unwrap();
        let end = (program.code.len() - 1) as u32;
        let exits: Vec<u32> = program
            .code
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Jump { target } => Some(*target),
                _ => None,
            })
            .collect();
        assert_eq!(exits, vec![end, end]);

        let conditions: Vec<u32> = program
            .code
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::JumpUnless { target, .. } => Some(*target),
                _ => None,
            })
            .collect();
        assert_eq!(conditions.len(), 2);
        assert!(conditions.iter().all(|target| *target < end));
    }

    #[test]
    fn type_errors() {
        assert_eq!(
            semantic_error("int x = true;"),
            SemanticError::TypeMismatch { context: "declaration", expected: Type::Int, found: Type::Bool }
        );
        assert_eq!(
            semantic_error("bool b = 1 < true;"),
            SemanticError::InvalidOperands { operator: "<", lhs: Type::Int, rhs: Type::Bool }
        );
        assert_eq!(
            semantic_error("int x = !3;"),
            SemanticError::InvalidOperand { operator: "!", operand: Type::Int }
        );
        assert_eq!(semantic_error("if 1 { echo(1); }"), SemanticError::TypeMismatch {
            context: "if condition",
            expected: Type::Bool,
            found: Type::Int,
        });
    }

    #[test]
    fn name_errors() {
        assert_eq!(semantic_error("y = 2;"), SemanticError::UndeclaredVariable("y".to_string()));
        assert_eq!(semantic_error("f();"), SemanticError::UndefinedFunction("f".to_string()));
        assert_eq!(
            semantic_error("func f() void { return; } func f() void { return; }"),
            SemanticError::FunctionRedefined("f".to_string())
        );
        assert_eq!(
            semantic_error("int x = 1; int x = 2;"),
            SemanticError::Scope(ScopeError::Redeclared("x".to_string()))
        );
        assert_eq!(
            semantic_error("int g = 1; { int hidden = 2; func f() int { return hidden; } }"),
            SemanticError::UndeclaredVariable("hidden".to_string())
        );
    }

    #[test]
    fn function_errors() {
        assert_eq!(semantic_error("return 1;"), SemanticError::ReturnOutsideFunction);
        assert_eq!(
            semantic_error("func f() int { return; }"),
            SemanticError::MissingReturnValue { function: "f".to_string(), ty: Type::Int }
        );
        assert_eq!(
            semantic_error("func f(int a) void { return; } f(1, 2);"),
            SemanticError::ArgumentCount { function: "f".to_string(), expected: 1, found: 2 }
        );
        assert_eq!(
            semantic_error("func f(void a) void { return; }"),
            SemanticError::VoidParameter("a".to_string())
        );
        assert_eq!(semantic_error("func f() void { return; } int x = f();"), SemanticError::VoidValue);
        assert_eq!(
            semantic_error("int x = 99999999999999999999;"),
            SemanticError::BadIntegerLiteral("99999999999999999999".to_string())
        );
    }
}
