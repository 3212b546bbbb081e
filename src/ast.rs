use std::fmt;

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(char, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn binary(op: char, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn variable(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }
}

/// Name and parameter names of a function. An empty name marks the anonymous
/// wrapper around a top-level expression.
#[derive(Debug, PartialEq, Clone)]
pub struct Prototype {
    pub name: String,
    pub args: Vec<String>,
}

impl Prototype {
    pub fn new(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            name: String::new(),
            args: Vec::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub prototype: Prototype,
    pub body: Expr,
}

/// A single parsed statement.
#[derive(Debug, PartialEq, Clone)]
pub enum ASTNode {
    Definition(Function),
    Extern(Prototype),
    TopLevel(Function),
}

/// Borrowed view over any node kind, so nodes of different kinds can be
/// compared; mismatched kinds are simply unequal.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Node<'a> {
    Expr(&'a Expr),
    Prototype(&'a Prototype),
    Function(&'a Function),
}

impl<'a> From<&'a Expr> for Node<'a> {
    fn from(expr: &'a Expr) -> Self {
        Node::Expr(expr)
    }
}

impl<'a> From<&'a Prototype> for Node<'a> {
    fn from(proto: &'a Prototype) -> Self {
        Node::Prototype(proto)
    }
}

impl<'a> From<&'a Function> for Node<'a> {
    fn from(func: &'a Function) -> Self {
        Node::Function(func)
    }
}

impl<'a> From<&'a ASTNode> for Node<'a> {
    fn from(node: &'a ASTNode) -> Self {
        match node {
            ASTNode::Definition(func) | ASTNode::TopLevel(func) => Node::Function(func),
            ASTNode::Extern(proto) => Node::Prototype(proto),
        }
    }
}

/// structural equality between any two nodes
pub fn same_structure<'a>(a: impl Into<Node<'a>>, b: impl Into<Node<'a>>) -> bool {
    a.into() == b.into()
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "Number: Value = {}", value),
            Expr::Variable(name) => write!(f, "Variable: Name = {}", name),
            Expr::Binary(op, lhs, rhs) => write!(
                f,
                "Binary: LHS = ({}), Operator = {}, RHS = ({})",
                lhs, op, rhs
            ),
            Expr::Call(callee, args) => {
                write!(f, "Call: Signature = {}(", callee)?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prototype: Signature = {}(", self.name)?;
        write_list(f, &self.args)?;
        write!(f, ")")
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Function: Prototype = ({}), Body = ({})",
            self.prototype, self.body
        )
    }
}

impl fmt::Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ASTNode::Definition(func) | ASTNode::TopLevel(func) => fmt::Display::fmt(func, f),
            ASTNode::Extern(proto) => fmt::Display::fmt(proto, f),
        }
    }
}
