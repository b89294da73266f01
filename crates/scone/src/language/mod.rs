use crate::{
    parser::grammar::{Grammar, GrammarBuilder, GrammarError, ProductionId, Symbol},
    scanner::{lexeme_sets::scone_lexemes::SconeLexemes, lexemes::LexemeSet},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NonTerminal {
    Goal,
    StatementList,
    Statement,
    Expr,
    AndTerm,
    NotTerm,
    RelExpr,
    Rels,
    NExpr,
    Term,
    Factor,
    Call,
    ArgList,
    ScopeBegin,
    ScopeClose,
    FunctionDefinition,
    FunctionBody,
    FunctionOpen,
    FunctionClose,
    ParamList,
    Param,
    VarType,
    IfHeader,
    WithElse,
    EndConditionalScope,
    BeginElseIf,
    LabelledScopeBegin,
    LabelledScopeClose,
}

impl NonTerminal {
    pub const ALL: [NonTerminal; 28] = [
        NonTerminal::Goal,
        NonTerminal::StatementList,
        NonTerminal::Statement,
        NonTerminal::Expr,
        NonTerminal::AndTerm,
        NonTerminal::NotTerm,
        NonTerminal::RelExpr,
        NonTerminal::Rels,
        NonTerminal::NExpr,
        NonTerminal::Term,
        NonTerminal::Factor,
        NonTerminal::Call,
        NonTerminal::ArgList,
        NonTerminal::ScopeBegin,
        NonTerminal::ScopeClose,
        NonTerminal::FunctionDefinition,
        NonTerminal::FunctionBody,
        NonTerminal::FunctionOpen,
        NonTerminal::FunctionClose,
        NonTerminal::ParamList,
        NonTerminal::Param,
        NonTerminal::VarType,
        NonTerminal::IfHeader,
        NonTerminal::WithElse,
        NonTerminal::EndConditionalScope,
        NonTerminal::BeginElseIf,
        NonTerminal::LabelledScopeBegin,
        NonTerminal::LabelledScopeClose,
    ];

    pub fn symbol(self) -> Symbol {
        Symbol::nonterminal(self as usize)
    }
}

impl From<NonTerminal> for Symbol {
    fn from(nonterminal: NonTerminal) -> Symbol {
        nonterminal.symbol()
    }
}

impl From<SconeLexemes> for Symbol {
    fn from(lexeme: SconeLexemes) -> Symbol {
        lexeme.symbol()
    }
}

/// One variant per production; a rule's position in [`Rule::ALL`] is its
/// production id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    Goal,
    StatementListSingle,
    StatementListCons,
    DeclareInt,
    DeclareBool,
    Assign,
    ExprStatement,
    Block,
    FunctionDeclaration,
    ReturnValue,
    ReturnVoid,
    If,
    IfElse,
    ExprOr,
    ExprAndTerm,
    AndTermAnd,
    AndTermNotTerm,
    NotTermNot,
    NotTermRelExpr,
    RelExprCompare,
    RelExprNExpr,
    RelsEqual,
    RelsNotEqual,
    RelsLess,
    RelsLessEqual,
    RelsGreater,
    RelsGreaterEqual,
    NExprAdd,
    NExprSub,
    NExprTerm,
    TermMul,
    TermDiv,
    TermMod,
    TermFactor,
    FactorParens,
    FactorNumber,
    FactorIdentifier,
    FactorTrue,
    FactorFalse,
    FactorCall,
    CallArgs,
    CallNoArgs,
    ArgListCons,
    ArgListSingle,
    ScopeBegin,
    ScopeClose,
    FunctionDefinitionParams,
    FunctionDefinitionNoParams,
    ParamListCons,
    ParamListSingle,
    Param,
    VarTypeInt,
    VarTypeBool,
    VarTypeVoid,
    FunctionBody,
    FunctionOpen,
    FunctionClose,
    IfHeader,
    WithElseIf,
    WithElseIfLast,
    WithElse,
    EndConditionalScope,
    BeginElseIf,
    LabelledScopeBegin,
    LabelledScopeClose,
}

macro_rules! rhs {
    ($($symbol:expr),* $(,)?) => {
        vec![$(Symbol::from($symbol)),*]
    };
}

impl Rule {
    pub const ALL: [Rule; 65] = [
        Rule::Goal,
        Rule::StatementListSingle,
        Rule::StatementListCons,
        Rule::DeclareInt,
        Rule::DeclareBool,
        Rule::Assign,
        Rule::ExprStatement,
        Rule::Block,
        Rule::FunctionDeclaration,
        Rule::ReturnValue,
        Rule::ReturnVoid,
        Rule::If,
        Rule::IfElse,
        Rule::ExprOr,
        Rule::ExprAndTerm,
        Rule::AndTermAnd,
        Rule::AndTermNotTerm,
        Rule::NotTermNot,
        Rule::NotTermRelExpr,
        Rule::RelExprCompare,
        Rule::RelExprNExpr,
        Rule::RelsEqual,
        Rule::RelsNotEqual,
        Rule::RelsLess,
        Rule::RelsLessEqual,
        Rule::RelsGreater,
        Rule::RelsGreaterEqual,
        Rule::NExprAdd,
        Rule::NExprSub,
        Rule::NExprTerm,
        Rule::TermMul,
        Rule::TermDiv,
        Rule::TermMod,
        Rule::TermFactor,
        Rule::FactorParens,
        Rule::FactorNumber,
        Rule::FactorIdentifier,
        Rule::FactorTrue,
        Rule::FactorFalse,
        Rule::FactorCall,
        Rule::CallArgs,
        Rule::CallNoArgs,
        Rule::ArgListCons,
        Rule::ArgListSingle,
        Rule::ScopeBegin,
        Rule::ScopeClose,
        Rule::FunctionDefinitionParams,
        Rule::FunctionDefinitionNoParams,
        Rule::ParamListCons,
        Rule::ParamListSingle,
        Rule::Param,
        Rule::VarTypeInt,
        Rule::VarTypeBool,
        Rule::VarTypeVoid,
        Rule::FunctionBody,
        Rule::FunctionOpen,
        Rule::FunctionClose,
        Rule::IfHeader,
        Rule::WithElseIf,
        Rule::WithElseIfLast,
        Rule::WithElse,
        Rule::EndConditionalScope,
        Rule::BeginElseIf,
        Rule::LabelledScopeBegin,
        Rule::LabelledScopeClose,
    ];

    pub fn from_production(production: ProductionId) -> Option<Rule> {
        Rule::ALL.get(production.index()).copied()
    }

    pub fn definition(self) -> (NonTerminal, Vec<Symbol>) {
        use NonTerminal as N;
        use SconeLexemes as L;

        match self {
            Rule::Goal => (N::Goal, rhs![N::StatementList]),
            Rule::StatementListSingle => (N::StatementList, rhs![N::Statement]),
            Rule::StatementListCons => (N::StatementList, rhs![N::Statement, N::StatementList]),
            Rule::DeclareInt => (
                N::Statement,
                rhs![L::Int, L::Identifier, L::Assign, N::Expr, L::Semicolon],
            ),
            Rule::DeclareBool => (
                N::Statement,
                rhs![L::Bool, L::Identifier, L::Assign, N::Expr, L::Semicolon],
            ),
            Rule::Assign => (N::Statement, rhs![L::Identifier, L::Assign, N::Expr, L::Semicolon]),
            Rule::ExprStatement => (N::Statement, rhs![N::Expr, L::Semicolon]),
            Rule::Block => (N::Statement, rhs![N::ScopeBegin, N::StatementList, N::ScopeClose]),
            Rule::FunctionDeclaration => (
                N::Statement,
                rhs![L::Func, N::FunctionDefinition, N::FunctionBody],
            ),
            Rule::ReturnValue => (N::Statement, rhs![L::Return, N::Expr, L::Semicolon]),
            Rule::ReturnVoid => (N::Statement, rhs![L::Return, L::Semicolon]),
            Rule::If => (
                N::Statement,
                rhs![N::IfHeader, N::ScopeBegin, N::StatementList, N::LabelledScopeClose],
            ),
            Rule::IfElse => (
                N::Statement,
                rhs![
                    N::IfHeader,
                    N::ScopeBegin,
                    N::StatementList,
                    N::EndConditionalScope,
                    N::WithElse
                ],
            ),
            Rule::ExprOr => (N::Expr, rhs![N::Expr, L::Or, N::AndTerm]),
            Rule::ExprAndTerm => (N::Expr, rhs![N::AndTerm]),
            Rule::AndTermAnd => (N::AndTerm, rhs![N::AndTerm, L::And, N::NotTerm]),
            Rule::AndTermNotTerm => (N::AndTerm, rhs![N::NotTerm]),
            Rule::NotTermNot => (N::NotTerm, rhs![L::Not, N::RelExpr]),
            Rule::NotTermRelExpr => (N::NotTerm, rhs![N::RelExpr]),
            Rule::RelExprCompare => (N::RelExpr, rhs![N::NExpr, N::Rels, N::NExpr]),
            Rule::RelExprNExpr => (N::RelExpr, rhs![N::NExpr]),
            Rule::RelsEqual => (N::Rels, rhs![L::Equal]),
            Rule::RelsNotEqual => (N::Rels, rhs![L::NotEqual]),
            Rule::RelsLess => (N::Rels, rhs![L::Less]),
            Rule::RelsLessEqual => (N::Rels, rhs![L::LessEqual]),
            Rule::RelsGreater => (N::Rels, rhs![L::Greater]),
            Rule::RelsGreaterEqual => (N::Rels, rhs![L::GreaterEqual]),
            Rule::NExprAdd => (N::NExpr, rhs![N::NExpr, L::Plus, N::Term]),
            Rule::NExprSub => (N::NExpr, rhs![N::NExpr, L::Minus, N::Term]),
            Rule::NExprTerm => (N::NExpr, rhs![N::Term]),
            Rule::TermMul => (N::Term, rhs![N::Term, L::Star, N::Factor]),
            Rule::TermDiv => (N::Term, rhs![N::Term, L::Slash, N::Factor]),
            Rule::TermMod => (N::Term, rhs![N::Term, L::Percent, N::Factor]),
            Rule::TermFactor => (N::Term, rhs![N::Factor]),
            Rule::FactorParens => (N::Factor, rhs![L::LeftParen, N::Expr, L::RightParen]),
            Rule::FactorNumber => (N::Factor, rhs![L::Number]),
            Rule::FactorIdentifier => (N::Factor, rhs![L::Identifier]),
            Rule::FactorTrue => (N::Factor, rhs![L::True]),
            Rule::FactorFalse => (N::Factor, rhs![L::False]),
            Rule::FactorCall => (N::Factor, rhs![N::Call]),
            Rule::CallArgs => (
                N::Call,
                rhs![L::Identifier, L::LeftParen, N::ArgList, L::RightParen],
            ),
            Rule::CallNoArgs => (N::Call, rhs![L::Identifier, L::LeftParen, L::RightParen]),
            Rule::ArgListCons => (N::ArgList, rhs![N::ArgList, L::Comma, N::Expr]),
            Rule::ArgListSingle => (N::ArgList, rhs![N::Expr]),
            Rule::ScopeBegin => (N::ScopeBegin, rhs![L::LeftBrace]),
            Rule::ScopeClose => (N::ScopeClose, rhs![L::RightBrace]),
            Rule::FunctionDefinitionParams => (
                N::FunctionDefinition,
                rhs![L::Identifier, L::LeftParen, N::ParamList, L::RightParen, N::VarType],
            ),
            Rule::FunctionDefinitionNoParams => (
                N::FunctionDefinition,
                rhs![L::Identifier, L::LeftParen, L::RightParen, N::VarType],
            ),
            Rule::ParamListCons => (N::ParamList, rhs![N::ParamList, L::Comma, N::Param]),
            Rule::ParamListSingle => (N::ParamList, rhs![N::Param]),
            Rule::Param => (N::Param, rhs![N::VarType, L::Identifier]),
            Rule::VarTypeInt => (N::VarType, rhs![L::Int]),
            Rule::VarTypeBool => (N::VarType, rhs![L::Bool]),
            Rule::VarTypeVoid => (N::VarType, rhs![L::Void]),
            Rule::FunctionBody => (
                N::FunctionBody,
                rhs![N::FunctionOpen, N::StatementList, N::FunctionClose],
            ),
            Rule::FunctionOpen => (N::FunctionOpen, rhs![L::LeftBrace]),
            Rule::FunctionClose => (N::FunctionClose, rhs![L::RightBrace]),
            Rule::IfHeader => (N::IfHeader, rhs![L::If, N::Expr]),
            Rule::WithElseIf => (
                N::WithElse,
                rhs![
                    N::BeginElseIf,
                    N::IfHeader,
                    N::ScopeBegin,
                    N::StatementList,
                    N::EndConditionalScope,
                    N::WithElse
                ],
            ),
            Rule::WithElseIfLast => (
                N::WithElse,
                rhs![
                    N::BeginElseIf,
                    N::IfHeader,
                    N::ScopeBegin,
                    N::StatementList,
                    N::LabelledScopeClose
                ],
            ),
            Rule::WithElse => (
                N::WithElse,
                rhs![
                    L::Else,
                    N::LabelledScopeBegin,
                    N::StatementList,
                    N::LabelledScopeClose
                ],
            ),
            Rule::EndConditionalScope => (N::EndConditionalScope, rhs![N::ScopeClose]),
            Rule::BeginElseIf => (N::BeginElseIf, rhs![L::Else]),
            Rule::LabelledScopeBegin => (N::LabelledScopeBegin, rhs![L::LeftBrace]),
            Rule::LabelledScopeClose => (N::LabelledScopeClose, rhs![L::RightBrace]),
        }
    }
}

/// The grammar of the scone language, with production ids that map back onto
/// [`Rule`]s.
#[derive(Debug, Clone)]
pub struct Language {
    grammar: Grammar,
}

impl Language {
    pub fn new() -> Result<Language, GrammarError> {
        let mut builder = GrammarBuilder::new();
        builder.declare_lexemes::<SconeLexemes>()?;
        for nonterminal in NonTerminal::ALL {
            let symbol = builder.nonterminal(format!("{:?}", nonterminal))?;
            debug_assert_eq!(symbol, nonterminal.symbol());
        }
        for rule in Rule::ALL {
            let (lhs, rhs) = rule.definition();
            let id = builder.add_production(lhs.symbol(), rhs)?;
            debug_assert_eq!(Rule::from_production(id), Some(rule));
        }

        Ok(Language {
            grammar: builder.compile(NonTerminal::Goal.symbol())?,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{
        first::FirstSets,
        lr_table::{ConflictPolicy, LRTables, TableOptions},
    };

    use super::*;

    #[test]
    fn rules_map_onto_productions() {
        let language = Language::new().unwrap();
        let grammar = language.grammar();
        assert_eq!(grammar.n_productions(), Rule::ALL.len());
        assert_eq!(grammar.n_nonterminals(), NonTerminal::ALL.len());
        assert_eq!(grammar.n_terminals(), SconeLexemes::size() as usize);

        for (id, production) in grammar.productions() {
            let rule = Rule::from_production(id).unwrap();
            let (lhs, rhs) = rule.definition();
            assert_eq!(production.lhs(), lhs.symbol());
            assert_eq!(production.rhs(), rhs.as_slice());
        }
        assert_eq!(
            grammar.format_production(ProductionId::new(Rule::ReturnVoid as usize)),
            "Statement -> return ;"
        );
    }

    #[test]
    fn grammar_is_lr1() {
        let language = Language::new().unwrap();
        let first = FirstSets::compute(language.grammar());
        let options = TableOptions { conflict_policy: ConflictPolicy::Reject };
        let tables = LRTables::from_grammar(language.grammar(), &first, &options).unwrap();
        assert!(tables.n_states() > 50);
    }
}
