use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::ast::{ASTNode, Prototype};
use crate::visitor::Visitor;

/// name the anonymous wrapper of a top-level expression is lowered under
pub const ANON_FN_NAME: &str = "__anon_expr";

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown variable referenced {0}")]
    UnknownVariable(String),
    #[error("unknown operator {0}")]
    UnknownOperator(char),
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("invalid number of args in call {0} expected {1} found {2}")]
    InvalidCall(String, usize, usize),
    #[error("function {0} cannot be redefined")]
    Redefinition(String),
    #[error("function {0} was declared with {1} parameters, not {2}")]
    ConflictingDeclaration(String, usize, usize),
    #[error("parameter {1} appears more than once in function {0}")]
    DuplicateParameter(String, String),
}

/// Register defined by the instruction at the same index of a function body.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Reg(pub usize);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// 1.0 if lhs < rhs, else 0.0
    Lt,
}

impl BinaryOp {
    pub fn from_char(op: char) -> Option<Self> {
        match op {
            '+' => Some(BinaryOp::Add),
            '-' => Some(BinaryOp::Sub),
            '*' => Some(BinaryOp::Mul),
            '<' => Some(BinaryOp::Lt),
            _ => None,
        }
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Lt => {
                if lhs < rhs {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Lt => "lt",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Instruction {
    Const(f64),
    Param(usize),
    Binary(BinaryOp, Reg, Reg),
    Call(String, Vec<Reg>),
    Return(Reg),
}

/// A function in the module. Externs are declared without a body.
#[derive(Debug, PartialEq, Clone)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Option<Vec<Instruction>>,
}

impl IrFunction {
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_declaration() { "extern" } else { "define" };
        write!(f, "{} {}({})", keyword, self.name, self.params.join(", "))?;

        let body = match &self.body {
            Some(body) => body,
            None => return writeln!(f),
        };
        writeln!(f, " {{")?;
        for (i, inst) in body.iter().enumerate() {
            let reg = Reg(i);
            match inst {
                Instruction::Const(value) => writeln!(f, "  {} = const {}", reg, value)?,
                Instruction::Param(index) => writeln!(f, "  {} = param {}", reg, index)?,
                Instruction::Binary(op, lhs, rhs) => {
                    writeln!(f, "  {} = {} {}, {}", reg, op, lhs, rhs)?
                }
                Instruction::Call(callee, args) => {
                    let args: Vec<String> = args.iter().map(Reg::to_string).collect();
                    writeln!(f, "  {} = call {}({})", reg, callee, args.join(", "))?
                }
                Instruction::Return(value) => writeln!(f, "  ret {}", value)?,
            }
        }
        writeln!(f, "}}")
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Module {
    pub name: String,
    functions: IndexMap<String, IrFunction>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            functions: IndexMap::new(),
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &IrFunction> {
        self.functions.values()
    }

    fn remove_function(&mut self, name: &str) -> Option<IrFunction> {
        self.functions.shift_remove(name)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for func in self.functions.values() {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}

/// Lowers parsed statements into a [`Module`].
pub struct Codegen {
    pub module: Module,
    named_values: HashMap<String, Reg>,
    instructions: Vec<Instruction>,
}

impl Codegen {
    pub fn new(module_name: &str) -> Self {
        Self {
            module: Module::new(module_name),
            named_values: HashMap::new(),
            instructions: Vec::new(),
        }
    }

    fn push(&mut self, inst: Instruction) -> Reg {
        self.instructions.push(inst);
        Reg(self.instructions.len() - 1)
    }

    /// Lowers one statement and returns the name of the function it produced.
    /// A definition that fails to lower leaves the module as it was.
    pub fn lower(&mut self, node: &ASTNode) -> Result<String, CodegenError> {
        let name = match node {
            ASTNode::Definition(func) => Some(func.prototype.name.as_str()),
            ASTNode::TopLevel(_) => Some(ANON_FN_NAME),
            ASTNode::Extern(_) => None,
        };
        let previous = name.and_then(|name| self.module.get_function(name).cloned());

        let result = node.accept(self);
        match &result {
            Ok(name) => tracing::debug!("lowered function {}", name),
            Err(err) => {
                tracing::debug!("lowering failed: {}", err);
                if let Some(name) = name {
                    match previous {
                        Some(previous) => {
                            self.module.functions.insert(name.to_string(), previous);
                        }
                        None => {
                            self.module.remove_function(name);
                        }
                    }
                }
            }
        }
        result
    }

    pub fn codegen(&mut self, ast_nodes: &[ASTNode]) -> Result<(), CodegenError> {
        for node in ast_nodes {
            self.lower(node)?;
        }
        Ok(())
    }
}

impl Visitor for Codegen {
    type Value = Reg;
    type Function = String;
    type Error = CodegenError;

    fn on_number(&mut self, value: f64) -> Result<Reg, CodegenError> {
        Ok(self.push(Instruction::Const(value)))
    }

    fn on_variable(&mut self, name: &str) -> Result<Reg, CodegenError> {
        match self.named_values.get(name) {
            Some(reg) => Ok(*reg),
            None => Err(CodegenError::UnknownVariable(name.to_string())),
        }
    }

    fn on_binary(&mut self, op: char, lhs: Reg, rhs: Reg) -> Result<Reg, CodegenError> {
        match BinaryOp::from_char(op) {
            Some(op) => Ok(self.push(Instruction::Binary(op, lhs, rhs))),
            None => Err(CodegenError::UnknownOperator(op)),
        }
    }

    fn on_call(&mut self, callee: &str, args: Vec<Reg>) -> Result<Reg, CodegenError> {
        let func = match self.module.get_function(callee) {
            Some(func) => func,
            None => return Err(CodegenError::UnknownFunction(callee.to_string())),
        };
        if func.params.len() != args.len() {
            return Err(CodegenError::InvalidCall(
                callee.to_string(),
                func.params.len(),
                args.len(),
            ));
        }
        Ok(self.push(Instruction::Call(callee.to_string(), args)))
    }

    fn on_prototype(&mut self, proto: &Prototype) -> Result<String, CodegenError> {
        let name = if proto.is_anonymous() {
            self.module.remove_function(ANON_FN_NAME);
            ANON_FN_NAME.to_string()
        } else {
            proto.name.clone()
        };

        if let Some(existing) = self.module.get_function(&name) {
            if existing.params.len() != proto.args.len() {
                return Err(CodegenError::ConflictingDeclaration(
                    name,
                    existing.params.len(),
                    proto.args.len(),
                ));
            }
        }

        // the body that follows sees exactly these parameters
        self.named_values.clear();
        self.instructions.clear();
        for (i, arg) in proto.args.iter().enumerate() {
            let reg = self.push(Instruction::Param(i));
            if self.named_values.insert(arg.clone(), reg).is_some() {
                return Err(CodegenError::DuplicateParameter(name, arg.clone()));
            }
        }

        let func = self
            .module
            .functions
            .entry(name.clone())
            .or_insert_with(|| IrFunction {
                name: name.clone(),
                params: Vec::new(),
                body: None,
            });
        // an extern may rename the parameters, the arity is already checked
        func.params = proto.args.clone();

        Ok(name)
    }

    fn on_function(&mut self, name: String, body: Reg) -> Result<String, CodegenError> {
        self.push(Instruction::Return(body));
        let instructions = std::mem::take(&mut self.instructions);

        let func = match self.module.functions.get_mut(&name) {
            Some(func) => func,
            None => return Err(CodegenError::UnknownFunction(name)),
        };
        if func.body.is_some() {
            return Err(CodegenError::Redefinition(name));
        }
        func.body = Some(instructions);
        self.named_values.clear();

        Ok(name)
    }
}
