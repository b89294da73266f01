use std::convert::Infallible;

use scone::{
    parser::{
        driver::{ParseError, Parser, SemanticActions},
        first::FirstSets,
        grammar::{Grammar, GrammarBuilder, ProductionId, Symbol},
        lr_table::{LRTables, TableOptions},
    },
    scanner::token::{Position, Token},
};

struct Arithmetic {
    grammar: Grammar,
    num: Symbol,
    plus: Symbol,
    star: Symbol,
    semicolon: Symbol,
}

// Goal -> Expr ;
// Expr -> Expr + Term | Term
// Term -> Term * Factor | Factor
// Factor -> num
fn arithmetic() -> Arithmetic {
    let mut builder = GrammarBuilder::new();
    let num = builder.terminal("num").unwrap();
    let plus = builder.terminal("+").unwrap();
    let star = builder.terminal("*").unwrap();
    let semicolon = builder.terminal(";").unwrap();
    let goal = builder.nonterminal("Goal").unwrap();
    let expr = builder.nonterminal("Expr").unwrap();
    let term = builder.nonterminal("Term").unwrap();
    let factor = builder.nonterminal("Factor").unwrap();

    builder.add_production(goal, vec![expr, semicolon]).unwrap();
    builder.add_production(expr, vec![expr, plus, term]).unwrap();
    builder.add_production(expr, vec![term]).unwrap();
    builder.add_production(term, vec![term, star, factor]).unwrap();
    builder.add_production(term, vec![factor]).unwrap();
    builder.add_production(factor, vec![num]).unwrap();

    Arithmetic {
        grammar: builder.compile(goal).unwrap(),
        num,
        plus,
        star,
        semicolon,
    }
}

fn tables(grammar: &Grammar) -> LRTables {
    let first = FirstSets::compute(grammar);
    LRTables::from_grammar(grammar, &first, &TableOptions::default()).unwrap()
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Evaluates as it reduces and remembers every reduction.
#[derive(Default)]
struct Evaluator {
    reductions: Vec<usize>,
    last: i64,
}

impl SemanticActions for Evaluator {
    type Value = i64;
    type Output = i64;
    type Error = Infallible;

    fn shift(&mut self, token: Token) -> i64 {
        token.lexeme.parse().unwrap_or(0)
    }

    fn reduce(&mut self, production: ProductionId, values: Vec<i64>) -> Result<i64, Infallible> {
        self.reductions.push(production.index());
        let value = match production.index() {
            1 => values[0] + values[2],
            3 => values[0] * values[2],
            _ => values[0],
        };
        self.last = value;
        Ok(value)
    }

    fn accept(&mut self, _value: Option<i64>) -> Result<i64, Infallible> {
        Ok(self.last)
    }
}

fn tokens(pairs: &[(Symbol, &str)]) -> Vec<Token> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, (symbol, lexeme))| {
            Token::new(*symbol, *lexeme).at(Position {
                line: 1,
                column: i as u32 + 1,
            })
        })
        .chain(std::iter::once(Token::eof()))
        .collect()
}

#[test]
fn evaluates_with_precedence() {
    init();
    let a = arithmetic();
    let tables = tables(&a.grammar);
    let input = tokens(&[
        (a.num, "12"),
        (a.star, "*"),
        (a.num, "19"),
        (a.plus, "+"),
        (a.num, "40"),
        (a.star, "*"),
        (a.num, "83"),
        (a.semicolon, ";"),
    ]);

    let mut evaluator = Evaluator::default();
    let result = Parser::new(&a.grammar, &tables).parse(input, &mut evaluator).unwrap();
    assert_eq!(result, 12 * 19 + 40 * 83);
    // both products reduce before the sum; the goal production is never reduced
    assert_eq!(evaluator.reductions, vec![5, 4, 5, 3, 2, 5, 4, 5, 3, 1]);
}

#[test]
fn single_number_reduction_order() {
    let a = arithmetic();
    let tables = tables(&a.grammar);
    let mut evaluator = Evaluator::default();
    let result = Parser::new(&a.grammar, &tables)
        .parse(tokens(&[(a.num, "3"), (a.semicolon, ";")]), &mut evaluator)
        .unwrap();

    assert_eq!(result, 3);
    // Factor -> num, Term -> Factor, Expr -> Term; the goal production is never reduced
    assert_eq!(evaluator.reductions, vec![5, 4, 2]);
}

#[test]
fn missing_terminator_is_rejected() {
    let a = arithmetic();
    let tables = tables(&a.grammar);
    let error = Parser::new(&a.grammar, &tables)
        .parse(tokens(&[(a.num, "3"), (a.plus, "+"), (a.num, "4")]), &mut Evaluator::default())
        .unwrap_err();

    match error {
        ParseError::UnexpectedToken { category, lexeme, .. } => {
            assert_eq!(category, "$");
            assert_eq!(lexeme, "");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn unexpected_token_reports_position() {
    let a = arithmetic();
    let tables = tables(&a.grammar);
    let error = Parser::new(&a.grammar, &tables)
        .parse(tokens(&[(a.num, "3"), (a.star, "*"), (a.plus, "+")]), &mut Evaluator::default())
        .unwrap_err();

    match error {
        ParseError::UnexpectedToken { category, position, .. } => {
            assert_eq!(category, "+");
            assert_eq!(position, Position { line: 1, column: 3 });
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn error_token_stops_the_parse() {
    let a = arithmetic();
    let tables = tables(&a.grammar);
    let input = vec![
        Token::new(a.num, "3"),
        Token::error("unexpected character `#`").at(Position { line: 2, column: 7 }),
        Token::eof(),
    ];
    let error = Parser::new(&a.grammar, &tables)
        .parse(input, &mut Evaluator::default())
        .unwrap_err();

    match error {
        ParseError::Lexical { message, position } => {
            assert_eq!(message, "unexpected character `#`");
            assert_eq!(position, Position { line: 2, column: 7 });
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn stream_without_end_marker() {
    let a = arithmetic();
    let tables = tables(&a.grammar);
    let input = vec![Token::new(a.num, "3"), Token::new(a.plus, "+")];
    let error = Parser::new(&a.grammar, &tables)
        .parse(input, &mut Evaluator::default())
        .unwrap_err();
    assert!(matches!(error, ParseError::UnterminatedStream));

    let error = Parser::new(&a.grammar, &tables)
        .parse(Vec::new(), &mut Evaluator::default())
        .unwrap_err();
    assert!(matches!(error, ParseError::UnterminatedStream));
}

// S -> E
// E -> n - E | n
#[test]
fn right_recursion_associates_right() {
    let mut builder = GrammarBuilder::new();
    let n = builder.terminal("n").unwrap();
    let minus = builder.terminal("-").unwrap();
    let s = builder.nonterminal("S").unwrap();
    let e = builder.nonterminal("E").unwrap();
    builder.add_production(s, vec![e]).unwrap();
    builder.add_production(e, vec![n, minus, e]).unwrap();
    builder.add_production(e, vec![n]).unwrap();
    let grammar = builder.compile(s).unwrap();
    let tables = tables(&grammar);

    struct Subtract(Vec<usize>);

    impl SemanticActions for Subtract {
        type Value = i64;
        type Output = Option<i64>;
        type Error = Infallible;

        fn shift(&mut self, token: Token) -> i64 {
            token.lexeme.parse().unwrap_or(0)
        }

        fn reduce(&mut self, production: ProductionId, values: Vec<i64>) -> Result<i64, Infallible> {
            self.0.push(production.index());
            Ok(match values.as_slice() {
                [lhs, _, rhs] => lhs - rhs,
                [value] => *value,
                _ => unreachable!(),
            })
        }

        fn accept(&mut self, value: Option<i64>) -> Result<Option<i64>, Infallible> {
            Ok(value)
        }
    }

    let input = tokens(&[(n, "1"), (minus, "-"), (n, "2"), (minus, "-"), (n, "3")]);
    let mut actions = Subtract(Vec::new());
    let result = Parser::new(&grammar, &tables).parse(input, &mut actions).unwrap();

    assert_eq!(result, Some(2));
    assert_eq!(actions.0, vec![2, 1, 1]);
}

#[derive(Debug, thiserror::Error)]
#[error("refused to reduce production {0}")]
struct Refused(usize);

struct Refuse;

impl SemanticActions for Refuse {
    type Value = ();
    type Output = ();
    type Error = Refused;

    fn shift(&mut self, _token: Token) {}

    fn reduce(&mut self, production: ProductionId, _values: Vec<()>) -> Result<(), Refused> {
        Err(Refused(production.index()))
    }

    fn accept(&mut self, _value: Option<()>) -> Result<(), Refused> {
        Ok(())
    }
}

#[test]
fn action_errors_abort_the_parse() {
    let a = arithmetic();
    let tables = tables(&a.grammar);
    let error = Parser::new(&a.grammar, &tables)
        .parse(tokens(&[(a.num, "3"), (a.semicolon, ";")]), &mut Refuse)
        .unwrap_err();
    match error {
        ParseError::Action(Refused(production)) => assert_eq!(production, 5),
        other => panic!("unexpected error {:?}", other),
    }
}
