use scone::{
    codegen::bytecode::Program,
    parser::{
        driver::ParseError,
        lr_table::{ConflictPolicy, TableOptions},
    },
    runtime::machine::{Machine, RuntimeError},
    semantics::emitter::SemanticError,
    Compiler,
};

fn run_program(program: &Program) -> Result<String, RuntimeError> {
    let mut machine = Machine::new(program, Vec::new());
    machine.run()?;
    Ok(String::from_utf8(machine.into_output()).unwrap())
}

fn run(source: &str) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    let compiler = Compiler::new().unwrap();
    let program = compiler.compile(source).unwrap();
    run_program(&program).unwrap()
}

#[test]
fn arithmetic() {
    let output = run("
        echo(1 + 2 * 3);
        echo((1 + 2) * 3);
        echo(7 % 3 - 10 / 3);
    ");
    assert_eq!(output, "7\n9\n-2\n");
}

#[test]
fn booleans() {
    let output = run("
        bool t = true;
        bool f = false;
        echo(t & !f);
        echo(t & f | f);
        echo(1 == 1 & 2 != 3);
        echo(t == f);
    ");
    assert_eq!(output, "true\nfalse\ntrue\nfalse\n");
}

#[test]
fn recursion() {
    let output = run("
        // n! for small n
        func fact(int n) int {
            if n <= 1 {
                return 1;
            }
            return n * fact(n - 1);
        }
        echo(fact(10));
    ");
    assert_eq!(output, "3628800\n");
}

#[test]
fn else_if_chains() {
    let output = run("
        func sign(int n) int {
            if n < 0 {
                return 0 - 1;
            } else if n == 0 {
                return 0;
            } else {
                return 1;
            }
        }
        echo(sign(0 - 5));
        echo(sign(0));
        echo(sign(7));

        int x = 3;
        if x > 5 {
            echo(1);
        } else if x > 2 {
            echo(2);
        } else if x > 1 {
            echo(3);
        }
    ");
    assert_eq!(output, "-1\n0\n1\n2\n");
}

#[test]
fn block_scopes_shadow() {
    let output = run("
        int x = 1;
        {
            int x = 2;
            echo(x);
        }
        echo(x);
        x = x + 10;
        echo(x);
    ");
    assert_eq!(output, "2\n1\n11\n");
}

#[test]
fn functions_share_globals() {
    let output = run("
        int counter = 0;
        func bump(int by) void {
            counter = counter + by;
        }
        func show(int a, bool b) void {
            if b {
                echo(a);
            }
        }
        bump(2);
        bump(3);
        show(counter, true);
        show(99, false);
    ");
    assert_eq!(output, "5\n");
}

#[test]
fn compiled_bytecode_runs_the_same() {
    let compiler = Compiler::new().unwrap();
    let program = compiler
        .compile("func twice(int a) int { return a + a; } echo(twice(twice(5)));")
        .unwrap();
    let decoded = Program::from_bytes(&program.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, program);
    assert_eq!(run_program(&decoded).unwrap(), "20\n");
}

#[test]
fn strict_tables_build() {
    let options = TableOptions { conflict_policy: ConflictPolicy::Reject };
    let compiler = Compiler::with_options(&options).unwrap();
    assert_eq!(compiler.tables().n_states(), compiler.collection().n_states());
}

#[test]
fn runtime_faults() {
    let compiler = Compiler::new().unwrap();

    let program = compiler.compile("int z = 0; echo(1 / z);").unwrap();
    assert!(matches!(run_program(&program), Err(RuntimeError::DivisionByZero)));

    let program = compiler
        .compile("func pick(bool b) int { if b { return 1; } } echo(pick(false));")
        .unwrap();
    assert!(matches!(run_program(&program), Err(RuntimeError::MissingReturnValue)));

    let program = compiler.compile("func forever() void { forever(); } forever();").unwrap();
    assert!(matches!(run_program(&program), Err(RuntimeError::CallDepthExceeded(_))));
}

#[test]
fn compile_errors() {
    let compiler = Compiler::new().unwrap();

    match compiler.compile("echo(x);") {
        Err(ParseError::Action(SemanticError::UndeclaredVariable(name))) => assert_eq!(name, "x"),
        other => panic!("unexpected result {:?}", other),
    }

    match compiler.compile("int x = ;") {
        Err(ParseError::UnexpectedToken { lexeme, position, .. }) => {
            assert_eq!(lexeme, ";");
            assert_eq!(position.column, 9);
        }
        other => panic!("unexpected result {:?}", other),
    }

    match compiler.compile("int x = 3 # 4;") {
        Err(ParseError::Lexical { message, .. }) => assert_eq!(message, "unexpected character `#`"),
        other => panic!("unexpected result {:?}", other),
    }

    match compiler.compile("int x = 1") {
        Err(ParseError::UnexpectedToken { category, .. }) => assert_eq!(category, "$"),
        other => panic!("unexpected result {:?}", other),
    }
}
