//! Front-end for the kaleidoscope language: a pull-based lexer, a precedence
//! climbing parser, the AST, and a visitor protocol for lowering it, with a
//! small register IR backend and interpreter built on top.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod driver;
pub mod exec;
pub mod lexer;
pub mod logger;
pub mod parser;
pub mod visitor;
