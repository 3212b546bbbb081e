use std::io::{self, Write};

use crate::ast::ASTNode;
use crate::codegen::Codegen;
use crate::config::Config;
use crate::exec::Executor;
use crate::lexer::CharSource;
use crate::parser::Parser;

/// what happened over one run of the driver
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Summary {
    pub statements: usize,
    pub parse_errors: usize,
    pub codegen_errors: usize,
    pub exec_errors: usize,
}

impl Summary {
    pub fn is_clean(&self) -> bool {
        self.parse_errors == 0 && self.codegen_errors == 0 && self.exec_errors == 0
    }
}

/// Parses, lowers and evaluates every statement from `parser`, writing the
/// value of each top-level expression to `out`. Errors are logged and the
/// run continues with the next statement.
pub fn run<S: CharSource, W: Write>(
    parser: Parser<S>,
    config: &Config,
    out: &mut W,
) -> io::Result<Summary> {
    let mut codegen = Codegen::new("kaleidoscope");
    let mut summary = Summary::default();

    for result in parser {
        summary.statements += 1;
        let node = match result {
            Ok(node) => node,
            Err(err) => {
                tracing::error!("syntax error: {}", err);
                summary.parse_errors += 1;
                continue;
            }
        };

        if config.emit_ast {
            writeln!(out, "{}", node)?;
        }

        let name = match codegen.lower(&node) {
            Ok(name) => name,
            Err(err) => {
                tracing::error!("codegen error: {}", err);
                summary.codegen_errors += 1;
                continue;
            }
        };

        if config.emit_ir {
            if let Some(func) = codegen.module.get_function(&name) {
                write!(out, "{}", func)?;
            }
        }

        if let ASTNode::TopLevel(_) = node {
            match Executor::new(&codegen.module).run(&name, &[]) {
                Ok(value) => writeln!(out, "{}", value)?,
                Err(err) => {
                    tracing::error!("evaluation error: {}", err);
                    summary.exec_errors += 1;
                }
            }
        }
    }

    tracing::info!(
        "processed {} statements, {} parse errors, {} codegen errors, {} evaluation errors",
        summary.statements,
        summary.parse_errors,
        summary.codegen_errors,
        summary.exec_errors
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{Lexer, ReaderSource};
    use crate::parser::MAX_EXPR_DEPTH;
    use pretty_assertions::assert_eq;

    fn run_str(src: &str, config: &Config) -> (String, Summary) {
        let mut out = Vec::new();
        let summary = run(Parser::from_str(src), config, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn prints_top_level_values() {
        let (out, summary) = run_str(
            "def double(x) x + x; extern sqrt(x); double(4); sqrt(double(8))",
            &Config::default(),
        );
        assert_eq!(out, "8\n4\n");
        assert!(summary.is_clean());
        assert_eq!(summary.statements, 4);
    }

    #[test]
    fn keeps_going_after_errors() {
        let (out, summary) = run_str("def (x) 1; y; 1 + ; 2 * 3", &Config::default());
        // `x` and `y` parse but are unbound, so only `1` and `2 * 3` evaluate
        assert_eq!(out, "1\n6\n");
        assert_eq!(summary.parse_errors, 3);
        assert_eq!(summary.codegen_errors, 2);
    }

    #[test]
    fn counts_evaluation_errors() {
        let (out, summary) = run_str("extern nope(x); nope(1); 2", &Config::default());
        assert_eq!(out, "2\n");
        assert_eq!(summary.exec_errors, 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn invalid_utf8_in_a_comment_does_not_end_input() {
        let input = std::io::Cursor::new(b"1 + 1;\n# caf\xE9\n2 + 2;\n".to_vec());
        let parser = Parser::new(Lexer::new(ReaderSource::new(input)));
        let mut out = Vec::new();
        let summary = run(parser, &Config::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2\n4\n");
        assert!(summary.is_clean());
    }

    #[test]
    fn long_expressions_stay_within_the_depth_limit() {
        let at_limit = format!("1{}", "+1".repeat(MAX_EXPR_DEPTH - 1));
        let (out, summary) = run_str(&at_limit, &Config::default());
        assert_eq!(out, format!("{}\n", MAX_EXPR_DEPTH));
        assert!(summary.is_clean());

        let too_long = format!("1{}; 7", "+1".repeat(200_000));
        let (out, summary) = run_str(&too_long, &Config::default());
        assert!(out.ends_with("7\n"));
        assert!(summary.parse_errors > 0);
    }

    #[test]
    fn emits_ast_and_ir() {
        let config = Config {
            emit_ast: true,
            emit_ir: true,
            ..Config::default()
        };
        let (out, _) = run_str("extern sin(x)", &config);
        assert_eq!(out, "Prototype: Signature = sin(x)\nextern sin(x)\n");
    }
}
