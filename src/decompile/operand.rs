use crate::error::RevEngineError;

use super::descriptor::JvmType;
use super::op::CompareOp;

/// Operator precedence levels. Lower binds tighter.
pub mod prec {
    pub const ATOM: u8 = 0;
    pub const UNARY: u8 = 1;
    pub const MUL: u8 = 2;
    pub const ADD: u8 = 3;
    pub const SHIFT: u8 = 4;
    pub const REL: u8 = 5;
    pub const EQ: u8 = 6;
    pub const BITAND: u8 = 7;
    pub const XOR: u8 = 8;
    pub const BITOR: u8 = 9;
    pub const LAND: u8 = 10;
    pub const LOR: u8 = 11;
    pub const TERNARY: u8 = 12;
    pub const ASSIGN: u8 = 13;
}

/// Bookkeeping attached to an operand beyond its text.
#[derive(Clone, Debug, PartialEq)]
pub enum OperandKind {
    Plain,
    /// Result of a method call or `new Foo(..)`; discarding it is a statement.
    Invocation,
    /// Object created by `new` whose constructor has not run yet.
    Uninit(String),
    /// Result of `lcmp`/`fcmpx`/`dcmpx`, kept apart so the following jump can compare
    /// the original operands directly.
    Compare(Box<(Operand, Operand)>),
    /// A `StringBuilder`/`StringBuffer` being used for string concatenation.
    Concat(Vec<Operand>),
    /// Value read from a local variable slot.
    Local(u16),
    /// Return address pushed at a subroutine entry.
    ReturnAddress,
    /// Exception object pushed at a handler entry.
    Exception,
}

/// One entry of the simulated operand stack: the source text of the value, its type
/// and the precedence of its outermost operator.
#[derive(Clone, Debug, PartialEq)]
pub struct Operand {
    pub value: String,
    pub ty: JvmType,
    pub prec: u8,
    pub kind: OperandKind,
}

impl Operand {
    pub fn new(value: impl Into<String>, ty: JvmType, prec: u8) -> Self {
        Operand {
            value: value.into(),
            ty,
            prec,
            kind: OperandKind::Plain,
        }
    }

    pub fn atom(value: impl Into<String>, ty: JvmType) -> Self {
        Operand::new(value, ty, prec::ATOM)
    }

    pub fn with_kind(mut self, kind: OperandKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_wide(&self) -> bool {
        self.ty.is_wide()
    }

    /// Text for the left operand of an operator of precedence `p`.
    pub fn left_of(&self, p: u8) -> String {
        if self.prec > p {
            format!("({})", self.value)
        } else {
            self.value.clone()
        }
    }

    /// Text for the right operand of an operator of precedence `p`.
    pub fn right_of(&self, p: u8) -> String {
        if self.prec >= p && self.prec != prec::ATOM {
            format!("({})", self.value)
        } else {
            self.value.clone()
        }
    }

    /// Text for the operand of a prefix operator or cast.
    pub fn unary_operand(&self) -> String {
        if self.prec > prec::UNARY || self.value.starts_with('-') {
            format!("({})", self.value)
        } else {
            self.value.clone()
        }
    }

    /// Text of the value once stored into something of type `target`; int constants
    /// become `true`/`false` or char literals where the target needs them.
    pub fn coerced(&self, target: &JvmType) -> String {
        match (target, self.value.as_str()) {
            (JvmType::Boolean, "0") => "false".into(),
            (JvmType::Boolean, "1") => "true".into(),
            (JvmType::Char, text) if self.prec == prec::ATOM && self.ty == JvmType::Int => {
                match text.parse::<u32>().ok().and_then(char::from_u32) {
                    Some(c) => char_literal(c).unwrap_or_else(|| text.to_string()),
                    None => text.to_string(),
                }
            }
            _ => self.value.clone(),
        }
    }
}

fn char_literal(c: char) -> Option<String> {
    Some(match c {
        '\'' => "'\\''".into(),
        '\\' => "'\\\\'".into(),
        '\n' => "'\\n'".into(),
        '\t' => "'\\t'".into(),
        '\r' => "'\\r'".into(),
        c if c.is_ascii_graphic() || c == ' ' => format!("'{}'", c),
        _ => return None,
    })
}

/// Renders `left op right` with minimal parentheses.
pub fn binary(left: &Operand, op: &str, right: &Operand, p: u8, ty: JvmType) -> Operand {
    Operand::new(
        format!("{} {} {}", left.left_of(p), op, right.right_of(p)),
        ty,
        p,
    )
}

/// Joins two boolean expressions with `&&` or `||`. Both are associative, so an
/// operand with the same connective needs no parentheses on either side.
pub fn logical(left: &Operand, op: &str, right: &Operand) -> Operand {
    let p = if op == "&&" { prec::LAND } else { prec::LOR };
    let side = |o: &Operand| {
        if o.prec > p {
            format!("({})", o.value)
        } else {
            o.value.clone()
        }
    };
    Operand::new(
        format!("{} {} {}", side(left), op, side(right)),
        JvmType::Boolean,
        p,
    )
}

/// Logical negation of a rendered boolean expression.
pub fn not(expr: &Operand) -> Operand {
    if let Some(inner) = expr.value.strip_prefix('!') {
        if expr.prec == prec::UNARY && !inner.starts_with('(') {
            return Operand::atom(inner, JvmType::Boolean);
        }
    }
    Operand::new(format!("!{}", expr.unary_operand()), JvmType::Boolean, prec::UNARY)
}

/// Joins the two arms of a `?:` whose condition is `cond`. Arms `1`/`0` collapse to
/// the condition itself.
pub fn conditional(cond: &Operand, a: &Operand, b: &Operand) -> Operand {
    match (a.value.as_str(), b.value.as_str()) {
        ("1", "0") | ("true", "false") => Operand::new(cond.value.clone(), JvmType::Boolean, cond.prec),
        ("0", "1") | ("false", "true") => not(cond),
        _ => {
            let ty = if a.ty == JvmType::Null { b.ty.clone() } else { a.ty.clone() };
            Operand::new(
                format!(
                    "{} ? {} : {}",
                    cond.left_of(prec::LOR),
                    a.left_of(prec::LOR),
                    b.left_of(prec::TERNARY)
                ),
                ty,
                prec::TERNARY,
            )
        }
    }
}

/// The simulated JVM operand stack.
#[derive(Clone, Debug, Default)]
pub struct OperandStack {
    items: Vec<Operand>,
}

impl OperandStack {
    pub fn push(&mut self, operand: Operand) {
        self.items.push(operand);
    }

    pub fn pop(&mut self, pc: usize) -> Result<Operand, RevEngineError> {
        self.items.pop().ok_or(RevEngineError::StackUnderflow { pc })
    }

    pub fn peek(&self, depth: usize) -> Option<&Operand> {
        self.items.iter().rev().nth(depth)
    }

    pub fn peek_mut(&mut self, depth: usize) -> Option<&mut Operand> {
        self.items.iter_mut().rev().nth(depth)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The test performed by a conditional jump, in terms of the jump being taken.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub left: Operand,
    pub right: Operand,
    pub op: CompareOp,
    /// A zero test of a boolean value, rendered as `x` / `!x`.
    pub boolean: bool,
}

impl Condition {
    pub fn new(left: Operand, op: CompareOp, right: Operand) -> Self {
        Condition {
            left,
            right,
            op,
            boolean: false,
        }
    }

    /// A zero test of a boolean operand.
    pub fn truth(value: Operand, op: CompareOp) -> Self {
        Condition {
            left: value,
            right: Operand::atom("0", JvmType::Int),
            op,
            boolean: true,
        }
    }

    pub fn negate(&self) -> Self {
        Condition {
            op: self.op.negate(),
            ..self.clone()
        }
    }

    pub fn to_operand(&self) -> Operand {
        if self.boolean {
            return match self.op {
                CompareOp::Eq => not(&self.left),
                _ => Operand::new(self.left.value.clone(), JvmType::Boolean, self.left.prec),
            };
        }
        let p = if self.op.is_equality() {
            prec::EQ
        } else {
            prec::REL
        };
        let right = self.right.coerced(&self.left.ty);
        let right = Operand {
            value: right,
            ..self.right.clone()
        };
        binary(&self.left, self.op.as_str(), &right, p, JvmType::Boolean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: &str) -> Operand {
        Operand::atom(v, JvmType::Int)
    }

    #[test]
    fn test_minimal_parentheses() {
        let sum = binary(&int("a"), "+", &int("b"), prec::ADD, JvmType::Int);
        let left = binary(&sum, "*", &int("c"), prec::MUL, JvmType::Int);
        assert_eq!(left.value, "(a + b) * c");
        let chained = binary(&sum, "+", &int("c"), prec::ADD, JvmType::Int);
        assert_eq!(chained.value, "a + b + c");
        let right = binary(&int("c"), "-", &sum, prec::ADD, JvmType::Int);
        assert_eq!(right.value, "c - (a + b)");
    }

    #[test]
    fn test_boolean_conditions() {
        let flag = Operand::atom("done", JvmType::Boolean);
        let cond = Condition::truth(flag, CompareOp::Eq);
        assert_eq!(cond.to_operand().value, "!done");
        assert_eq!(cond.negate().to_operand().value, "done");
        let cmp = Condition::new(int("a"), CompareOp::Le, int("b"));
        assert_eq!(cmp.negate().to_operand().value, "a > b");
    }

    #[test]
    fn test_logical_grouping() {
        let a = Operand::atom("a", JvmType::Boolean);
        let b = Operand::atom("b", JvmType::Boolean);
        let c = Operand::atom("c", JvmType::Boolean);
        let or = logical(&a, "||", &b);
        assert_eq!(logical(&or, "&&", &c).value, "(a || b) && c");
        let and = logical(&a, "&&", &b);
        assert_eq!(logical(&and, "||", &c).value, "a && b || c");
        assert_eq!(not(&and).value, "!(a && b)");
        assert_eq!(not(&not(&a)).value, "a");
    }

    #[test]
    fn test_conditional() {
        let cond = Operand::new("a > b", JvmType::Boolean, prec::REL);
        assert_eq!(conditional(&cond, &int("a"), &int("b")).value, "a > b ? a : b");
        assert_eq!(conditional(&cond, &int("1"), &int("0")).value, "a > b");
        assert_eq!(conditional(&cond, &int("0"), &int("1")).value, "!(a > b)");
    }

    #[test]
    fn test_coercion() {
        assert_eq!(int("1").coerced(&JvmType::Boolean), "true");
        assert_eq!(int("65").coerced(&JvmType::Char), "'A'");
        assert_eq!(int("7").coerced(&JvmType::Int), "7");
    }

    #[test]
    fn test_underflow_is_reported() {
        let mut stack = OperandStack::default();
        assert!(matches!(
            stack.pop(4),
            Err(RevEngineError::StackUnderflow { pc: 4 })
        ));
    }
}
