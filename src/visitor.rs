//! Lowering protocol for the AST.
//!
//! A backend implements [`Visitor`] and hands itself to `accept` on a node.
//! Every node is visited exactly once and children always go first, so each
//! operation receives the already lowered values of the node's children.

use crate::ast::{ASTNode, Expr, Function, Prototype};

pub trait Visitor {
    /// lowered form of an expression
    type Value;
    /// lowered form of a prototype or function
    type Function;
    type Error;

    fn on_number(&mut self, value: f64) -> Result<Self::Value, Self::Error>;

    fn on_variable(&mut self, name: &str) -> Result<Self::Value, Self::Error>;

    fn on_binary(
        &mut self,
        op: char,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> Result<Self::Value, Self::Error>;

    fn on_call(
        &mut self,
        callee: &str,
        args: Vec<Self::Value>,
    ) -> Result<Self::Value, Self::Error>;

    fn on_prototype(&mut self, proto: &Prototype) -> Result<Self::Function, Self::Error>;

    /// `proto` is the result of `on_prototype` for this function's prototype,
    /// `body` the lowered body expression
    fn on_function(
        &mut self,
        proto: Self::Function,
        body: Self::Value,
    ) -> Result<Self::Function, Self::Error>;
}

impl Expr {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> Result<V::Value, V::Error> {
        match self {
            Expr::Number(value) => visitor.on_number(*value),
            Expr::Variable(name) => visitor.on_variable(name),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.accept(visitor)?;
                let rhs = rhs.accept(visitor)?;
                visitor.on_binary(*op, lhs, rhs)
            }
            Expr::Call(callee, args) => {
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(arg.accept(visitor)?);
                }
                visitor.on_call(callee, lowered)
            }
        }
    }
}

impl Prototype {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> Result<V::Function, V::Error> {
        visitor.on_prototype(self)
    }
}

impl Function {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> Result<V::Function, V::Error> {
        let proto = self.prototype.accept(visitor)?;
        let body = self.body.accept(visitor)?;
        visitor.on_function(proto, body)
    }
}

impl ASTNode {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> Result<V::Function, V::Error> {
        match self {
            ASTNode::Definition(func) | ASTNode::TopLevel(func) => func.accept(visitor),
            ASTNode::Extern(proto) => proto.accept(visitor),
        }
    }
}
