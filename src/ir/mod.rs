//! Three-address IR model (spec.md §3 "Three-address IR", C6).
//!
//! A linear, label-and-jump form with unlimited virtual names. Unary and
//! binary operators are shared with the syntax tree's (`ast::UnaryOperator`,
//! `ast::BinaryOperator`) rather than re-declared, since they mean exactly
//! the same thing at this level.

pub mod generator;

use crate::ast::{BinaryOperator, ConstantValue, UnaryOperator};
use crate::symbol_table::StaticInit;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Constant(ConstantValue),
    TemporaryVariable(String),
}

impl Value {
    pub fn ty(&self) -> Option<Type> {
        match self {
            Value::Constant(c) => Some(c.ty()),
            Value::TemporaryVariable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Return(Value),
    Unary(UnaryOperator, Value, Value),
    Binary(BinaryOperator, Value, Value, Value),
    Copy(Value, Value),
    Jump(String),
    JumpIfZero(Value, String),
    JumpIfNotZero(Value, String),
    Label(String),
    FunctionCall {
        name: String,
        args: Vec<Value>,
        dst: Value,
    },
    SignExtend(Value, Value),
    Truncate(Value, Value),
    /// A numeric conversion between an integer and a `double`, distinct from
    /// `SignExtend`/`Truncate`: the bit pattern changes, not just the width.
    IntToDouble(Value, Value),
    DoubleToInt(Value, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub global: bool,
    pub parameters: Vec<String>,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticVariable {
    pub name: String,
    pub global: bool,
    pub ty: Type,
    pub initial: StaticInit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    Function(FunctionDefinition),
    StaticVariable(StaticVariable),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub top_level: Vec<TopLevel>,
}
