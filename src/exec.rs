use std::collections::HashMap;
use std::io::Write;

use lazy_static::lazy_static;

use crate::codegen::{Instruction, IrFunction, Module};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ExecError {
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("no native implementation for extern {0}")]
    UnresolvedExtern(String),
    #[error("invalid number of args in call {0} expected {1} found {2}")]
    InvalidCall(String, usize, usize),
    #[error("function {0} does not return a value")]
    MissingReturn(String),
    #[error("call depth exceeded {0}")]
    StackOverflow(usize),
}

struct Native {
    arity: usize,
    func: fn(&[f64]) -> f64,
}

fn putchard(args: &[f64]) -> f64 {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{}", args[0] as u8 as char);
    0.0
}

fn printd(args: &[f64]) -> f64 {
    eprintln!("{}", args[0]);
    0.0
}

lazy_static! {
    static ref NATIVES: HashMap<&'static str, Native> = {
        let mut natives: HashMap<&'static str, Native> = HashMap::new();
        let mut unary = |name: &'static str, func: fn(&[f64]) -> f64| {
            natives.insert(name, Native { arity: 1, func });
        };
        unary("sin", |a| a[0].sin());
        unary("cos", |a| a[0].cos());
        unary("tan", |a| a[0].tan());
        unary("exp", |a| a[0].exp());
        unary("log", |a| a[0].ln());
        unary("sqrt", |a| a[0].sqrt());
        unary("fabs", |a| a[0].abs());
        unary("putchard", putchard);
        unary("printd", printd);
        natives.insert("pow", Native { arity: 2, func: |a| a[0].powf(a[1]) });
        natives
    };
}

pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Interprets the functions of a lowered [`Module`].
pub struct Executor<'m> {
    module: &'m Module,
    max_depth: usize,
}

impl<'m> Executor<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn run(&self, name: &str, args: &[f64]) -> Result<f64, ExecError> {
        self.call(name, args, 0)
    }

    fn call(&self, name: &str, args: &[f64], depth: usize) -> Result<f64, ExecError> {
        if depth >= self.max_depth {
            return Err(ExecError::StackOverflow(self.max_depth));
        }

        let func = self
            .module
            .get_function(name)
            .ok_or_else(|| ExecError::UnknownFunction(name.to_string()))?;
        if func.params.len() != args.len() {
            return Err(ExecError::InvalidCall(
                name.to_string(),
                func.params.len(),
                args.len(),
            ));
        }

        match &func.body {
            Some(body) => self.eval(func, body, args, depth),
            None => {
                let native = NATIVES
                    .get(name)
                    .filter(|native| native.arity == args.len())
                    .ok_or_else(|| ExecError::UnresolvedExtern(name.to_string()))?;
                Ok((native.func)(args))
            }
        }
    }

    fn eval(
        &self,
        func: &IrFunction,
        body: &[Instruction],
        args: &[f64],
        depth: usize,
    ) -> Result<f64, ExecError> {
        let mut regs: Vec<f64> = Vec::with_capacity(body.len());
        for inst in body {
            let value = match inst {
                Instruction::Const(value) => *value,
                Instruction::Param(index) => args[*index],
                Instruction::Binary(op, lhs, rhs) => op.apply(regs[lhs.0], regs[rhs.0]),
                Instruction::Call(callee, call_args) => {
                    let call_args: Vec<f64> = call_args.iter().map(|reg| regs[reg.0]).collect();
                    self.call(callee, &call_args, depth + 1)?
                }
                Instruction::Return(value) => return Ok(regs[value.0]),
            };
            regs.push(value);
        }
        Err(ExecError::MissingReturn(func.name.clone()))
    }
}
