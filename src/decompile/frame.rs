use log::trace;

use crate::constant_info::{ConstantInfo, ConstantPool, Literal};
use crate::error::RevEngineError;

use super::descriptor::{class_constant_type, parse_method_descriptor, parse_type_descriptor, JvmType};
use super::imports::Imports;
use super::op::{BinOp, IfOperands, InvokeKind, Op};
use super::operand::{binary, prec, Condition, Operand, OperandKind, OperandStack};

const STRING: &str = "java/lang/String";

/// Supplies the name and type of local variables read by load instructions.
pub trait LocalResolver {
    /// Name and type of the variable in `slot` as read by the instruction at `pc`;
    /// `ty` is the type the load instruction itself implies.
    fn load(&mut self, slot: u16, pc: usize, ty: &JvmType) -> (String, JvmType);
}

/// What executing one instruction produced besides its effect on the operand stack.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    None,
    /// A complete statement, terminated with `;`.
    Statement(String),
    Store {
        slot: u16,
        ty: JvmType,
        value: Operand,
    },
    Iinc {
        slot: u16,
        delta: i16,
    },
    /// A conditional jump; the condition holds when the jump is taken.
    Condition(Condition),
    Goto(usize),
    /// A switch on the given key.
    Switch(Operand),
    Jsr(usize),
    Ret(u16),
    MonitorEnter(Operand),
    MonitorExit,
}

/// Executes instructions against the simulated operand stack, rendering every value
/// as Java source text.
pub struct RunTimeFrame<'a> {
    pool: &'a ConstantPool,
    imports: &'a Imports,
    this_class: &'a str,
    return_type: JvmType,
    pub stack: OperandStack,
}

impl<'a> RunTimeFrame<'a> {
    pub fn new(
        pool: &'a ConstantPool,
        imports: &'a Imports,
        this_class: &'a str,
        return_type: JvmType,
    ) -> Self {
        RunTimeFrame {
            pool,
            imports,
            this_class,
            return_type,
            stack: OperandStack::default(),
        }
    }

    pub fn execute(
        &mut self,
        pc: usize,
        op: &Op,
        locals: &mut dyn LocalResolver,
    ) -> Result<Effect, RevEngineError> {
        trace!("pc {}: {:?} (depth {})", pc, op, self.stack.len());
        self.step(pc, op, locals).map_err(|e| e.at(pc))
    }

    fn push(&mut self, operand: Operand) {
        self.stack.push(operand);
    }

    fn pop(&mut self, pc: usize) -> Result<Operand, RevEngineError> {
        self.stack.pop(pc)
    }

    fn step(
        &mut self,
        pc: usize,
        op: &Op,
        locals: &mut dyn LocalResolver,
    ) -> Result<Effect, RevEngineError> {
        match op {
            Op::Nop => {}
            Op::AconstNull => self.push(Operand::atom("null", JvmType::Null)),
            Op::Iconst(v) => self.push(Operand::atom(v.to_string(), JvmType::Int)),
            Op::Lconst(v) => self.push(Operand::atom(Literal::Long(*v).to_source(), JvmType::Long)),
            Op::Fconst(v) => {
                self.push(Operand::atom(Literal::Float(*v).to_source(), JvmType::Float))
            }
            Op::Dconst(v) => {
                self.push(Operand::atom(Literal::Double(*v).to_source(), JvmType::Double))
            }
            Op::Ldc(index) => {
                let operand = self.ldc(*index)?;
                self.push(operand);
            }
            Op::Load(ty, slot) => {
                let (name, ty) = locals.load(*slot, pc, ty);
                self.push(Operand::atom(name, ty).with_kind(OperandKind::Local(*slot)));
            }
            Op::Store(ty, slot) => {
                let value = self.pop(pc)?;
                let ty = if (ty.is_reference() && value.ty.is_reference() && value.ty != JvmType::Null)
                    || (ty.is_int_like() && value.ty.is_int_like())
                    || value.ty == JvmType::Address
                {
                    value.ty.clone()
                } else {
                    ty.clone()
                };
                return Ok(Effect::Store {
                    slot: *slot,
                    ty,
                    value,
                });
            }
            Op::ArrayLoad(elem) => {
                let index = self.pop(pc)?;
                let array = self.pop(pc)?;
                let ty = match &array.ty {
                    JvmType::Array(inner) => (**inner).clone(),
                    _ => elem.clone(),
                };
                self.push(Operand::atom(
                    format!("{}[{}]", array.left_of(prec::ATOM), index.value),
                    ty,
                ));
            }
            Op::ArrayStore(elem) => {
                let value = self.pop(pc)?;
                let index = self.pop(pc)?;
                let array = self.pop(pc)?;
                let ty = match &array.ty {
                    JvmType::Array(inner) => (**inner).clone(),
                    _ => elem.clone(),
                };
                return Ok(Effect::Statement(format!(
                    "{}[{}] = {};",
                    array.left_of(prec::ATOM),
                    index.value,
                    value.coerced(&ty)
                )));
            }
            Op::Pop => {
                let value = self.pop(pc)?;
                return Ok(discard(value));
            }
            Op::Pop2 => {
                let value = self.pop(pc)?;
                if !value.is_wide() {
                    self.pop(pc)?;
                }
                return Ok(discard(value));
            }
            Op::Dup => {
                let v1 = self.pop(pc)?;
                self.push(v1.clone());
                self.push(v1);
            }
            Op::DupX1 => {
                let v1 = self.pop(pc)?;
                let v2 = self.pop(pc)?;
                self.push(v1.clone());
                self.push(v2);
                self.push(v1);
            }
            Op::DupX2 => {
                let v1 = self.pop(pc)?;
                let v2 = self.pop(pc)?;
                if v2.is_wide() {
                    self.push(v1.clone());
                    self.push(v2);
                } else {
                    let v3 = self.pop(pc)?;
                    self.push(v1.clone());
                    self.push(v3);
                    self.push(v2);
                }
                self.push(v1);
            }
            Op::Dup2 => {
                let v1 = self.pop(pc)?;
                if v1.is_wide() {
                    self.push(v1.clone());
                } else {
                    let v2 = self.pop(pc)?;
                    self.push(v2.clone());
                    self.push(v1.clone());
                    self.push(v2);
                }
                self.push(v1);
            }
            Op::Dup2X1 => {
                let v1 = self.pop(pc)?;
                let v2 = self.pop(pc)?;
                if v1.is_wide() {
                    self.push(v1.clone());
                    self.push(v2);
                } else {
                    let v3 = self.pop(pc)?;
                    self.push(v2.clone());
                    self.push(v1.clone());
                    self.push(v3);
                    self.push(v2);
                }
                self.push(v1);
            }
            Op::Dup2X2 => self.dup2_x2(pc)?,
            Op::Swap => {
                let v1 = self.pop(pc)?;
                let v2 = self.pop(pc)?;
                self.push(v1);
                self.push(v2);
            }
            Op::Binary(bin, ty) => {
                let right = self.pop(pc)?;
                let left = self.pop(pc)?;
                let result = if *bin == BinOp::Xor && (right.value == "-1" || right.value == "-1L") {
                    Operand::new(format!("~{}", left.unary_operand()), ty.clone(), prec::UNARY)
                } else {
                    let ty = if ty.is_int_like()
                        && left.ty == JvmType::Boolean
                        && right.ty == JvmType::Boolean
                    {
                        JvmType::Boolean
                    } else {
                        ty.clone()
                    };
                    binary(&left, bin.as_str(), &right, binary_prec(*bin), ty)
                };
                self.push(result);
            }
            Op::Neg(ty) => {
                let value = self.pop(pc)?;
                self.push(Operand::new(
                    format!("-{}", value.unary_operand()),
                    ty.clone(),
                    prec::UNARY,
                ));
            }
            Op::Iinc(slot, delta) => {
                return Ok(Effect::Iinc {
                    slot: *slot,
                    delta: *delta,
                })
            }
            Op::Convert(to) => {
                let value = self.pop(pc)?;
                self.push(Operand::new(
                    format!(
                        "({}) {}",
                        to.primitive_name().unwrap_or("Object"),
                        value.unary_operand()
                    ),
                    to.clone(),
                    prec::UNARY,
                ));
            }
            Op::Compare(ty) => {
                let right = self.pop(pc)?;
                let left = self.pop(pc)?;
                let boxed = match ty {
                    JvmType::Long => "Long",
                    JvmType::Float => "Float",
                    _ => "Double",
                };
                let text = format!("{}.compare({}, {})", boxed, left.value, right.value);
                self.push(
                    Operand::atom(text, JvmType::Int)
                        .with_kind(OperandKind::Compare(Box::new((left, right)))),
                );
            }
            Op::If { cmp, operands, .. } => {
                let condition = match operands {
                    IfOperands::Zero => {
                        let value = self.pop(pc)?;
                        match value.kind {
                            OperandKind::Compare(pair) => {
                                let (left, right) = *pair;
                                Condition::new(left, *cmp, right)
                            }
                            _ if value.ty == JvmType::Boolean && cmp.is_equality() => {
                                Condition::truth(value, *cmp)
                            }
                            _ => Condition::new(value, *cmp, Operand::atom("0", JvmType::Int)),
                        }
                    }
                    IfOperands::Null => {
                        let value = self.pop(pc)?;
                        Condition::new(value, *cmp, Operand::atom("null", JvmType::Null))
                    }
                    IfOperands::Pair => {
                        let right = self.pop(pc)?;
                        let left = self.pop(pc)?;
                        Condition::new(left, *cmp, right)
                    }
                };
                return Ok(Effect::Condition(condition));
            }
            Op::Goto(target) => return Ok(Effect::Goto(*target)),
            Op::Jsr(target) => return Ok(Effect::Jsr(*target)),
            Op::Ret(slot) => return Ok(Effect::Ret(*slot)),
            Op::Switch(_) => {
                let key = self.pop(pc)?;
                return Ok(Effect::Switch(key));
            }
            Op::Return(None) => return Ok(Effect::Statement("return;".into())),
            Op::Return(Some(_)) => {
                let value = self.pop(pc)?;
                return Ok(Effect::Statement(format!(
                    "return {};",
                    value.coerced(&self.return_type)
                )));
            }
            Op::GetStatic(index) => {
                let (text, ty) = self.static_field(*index)?;
                self.push(Operand::atom(text, ty));
            }
            Op::PutStatic(index) => {
                let value = self.pop(pc)?;
                let (text, ty) = self.static_field(*index)?;
                return Ok(Effect::Statement(format!("{} = {};", text, value.coerced(&ty))));
            }
            Op::GetField(index) => {
                let member = self.pool.member_ref(*index)?;
                let object = self.pop(pc)?;
                let ty = parse_type_descriptor(&member.descriptor).unwrap_or(JvmType::Unknown);
                self.push(Operand::atom(
                    format!("{}.{}", object.left_of(prec::ATOM), member.name),
                    ty,
                ));
            }
            Op::PutField(index) => {
                let member = self.pool.member_ref(*index)?;
                let value = self.pop(pc)?;
                let object = self.pop(pc)?;
                let ty = parse_type_descriptor(&member.descriptor).unwrap_or(JvmType::Unknown);
                return Ok(Effect::Statement(format!(
                    "{}.{} = {};",
                    object.left_of(prec::ATOM),
                    member.name,
                    value.coerced(&ty)
                )));
            }
            Op::Invoke(kind, index) => return self.invoke(pc, *kind, *index),
            Op::InvokeDynamic(index) => return self.invoke_dynamic(pc, *index),
            Op::New(index) => {
                let class = self.pool.class_name(*index)?.to_string();
                self.push(
                    Operand::atom(
                        format!("new {}", self.imports.class_name(&class)),
                        JvmType::Reference(class.clone()),
                    )
                    .with_kind(OperandKind::Uninit(class)),
                );
            }
            Op::NewArray(elem) => {
                let count = self.pop(pc)?;
                let text = self.new_array_text(elem, &[count]);
                self.push(Operand::atom(text, JvmType::Array(Box::new(elem.clone()))));
            }
            Op::ANewArray(index) => {
                let elem = class_constant_type(self.pool.class_name(*index)?);
                let count = self.pop(pc)?;
                let text = self.new_array_text(&elem, &[count]);
                self.push(Operand::atom(text, JvmType::Array(Box::new(elem))));
            }
            Op::MultiANewArray(index, dims) => {
                let ty = class_constant_type(self.pool.class_name(*index)?);
                let mut counts = Vec::with_capacity(usize::from(*dims));
                for _ in 0..*dims {
                    counts.push(self.pop(pc)?);
                }
                counts.reverse();
                let mut elem = &ty;
                for _ in 0..*dims {
                    if let JvmType::Array(inner) = elem {
                        elem = inner;
                    }
                }
                let text = self.new_array_text(elem, &counts);
                self.push(Operand::atom(text, ty.clone()));
            }
            Op::ArrayLength => {
                let array = self.pop(pc)?;
                self.push(Operand::atom(
                    format!("{}.length", array.left_of(prec::ATOM)),
                    JvmType::Int,
                ));
            }
            Op::Athrow => {
                let value = self.pop(pc)?;
                return Ok(Effect::Statement(format!("throw {};", value.value)));
            }
            Op::CheckCast(index) => {
                let ty = class_constant_type(self.pool.class_name(*index)?);
                let value = self.pop(pc)?;
                if value.ty == ty {
                    self.push(value);
                } else {
                    self.push(Operand::new(
                        format!("({}) {}", self.imports.type_name(&ty), value.unary_operand()),
                        ty,
                        prec::UNARY,
                    ));
                }
            }
            Op::InstanceOf(index) => {
                let ty = class_constant_type(self.pool.class_name(*index)?);
                let value = self.pop(pc)?;
                self.push(Operand::new(
                    format!(
                        "{} instanceof {}",
                        value.left_of(prec::REL),
                        self.imports.type_name(&ty)
                    ),
                    JvmType::Boolean,
                    prec::REL,
                ));
            }
            Op::MonitorEnter => {
                let lock = self.pop(pc)?;
                return Ok(Effect::MonitorEnter(lock));
            }
            Op::MonitorExit => {
                self.pop(pc)?;
                return Ok(Effect::MonitorExit);
            }
        }
        Ok(Effect::None)
    }

    /// `dup2_x2` in all four of its category-1/category-2 forms.
    fn dup2_x2(&mut self, pc: usize) -> Result<(), RevEngineError> {
        let v1 = self.pop(pc)?;
        let mut top = vec![v1];
        if !top[0].is_wide() {
            top.insert(0, self.pop(pc)?);
        }
        let next = self.pop(pc)?;
        let mut below = vec![next];
        if !below[0].is_wide() {
            below.insert(0, self.pop(pc)?);
        }
        for operand in top.iter().cloned().chain(below).chain(top.iter().cloned()) {
            self.push(operand);
        }
        Ok(())
    }

    fn ldc(&self, index: u16) -> Result<Operand, RevEngineError> {
        let literal = self.pool.literal(index)?;
        let ty = match &literal {
            Literal::Int(_) => JvmType::Int,
            Literal::Float(_) => JvmType::Float,
            Literal::Long(_) => JvmType::Long,
            Literal::Double(_) => JvmType::Double,
            Literal::String(_) => JvmType::Reference(STRING.into()),
            Literal::Class(name) => {
                let class = self.imports.type_name(&class_constant_type(name));
                return Ok(Operand::atom(
                    format!("{}.class", class),
                    JvmType::Reference("java/lang/Class".into()),
                ));
            }
        };
        Ok(Operand::atom(literal.to_source(), ty))
    }

    fn static_field(&self, index: u16) -> Result<(String, JvmType), RevEngineError> {
        let member = self.pool.member_ref(index)?;
        let ty = parse_type_descriptor(&member.descriptor).unwrap_or(JvmType::Unknown);
        let text = if member.class == self.this_class {
            member.name
        } else {
            format!("{}.{}", self.imports.class_name(&member.class), member.name)
        };
        Ok((text, ty))
    }

    fn pop_arguments(
        &mut self,
        pc: usize,
        params: &[JvmType],
    ) -> Result<Vec<Operand>, RevEngineError> {
        let mut args = Vec::with_capacity(params.len());
        for _ in params {
            args.push(self.pop(pc)?);
        }
        args.reverse();
        Ok(args)
    }

    fn invoke(&mut self, pc: usize, kind: InvokeKind, index: u16) -> Result<Effect, RevEngineError> {
        let member = self.pool.member_ref(index)?;
        let (params, ret) =
            parse_method_descriptor(&member.descriptor).ok_or(RevEngineError::ConstantPool {
                index,
                expected: "method descriptor",
            })?;
        let args = self.pop_arguments(pc, &params)?;
        let arg_text = args
            .iter()
            .zip(&params)
            .map(|(arg, ty)| arg.coerced(ty))
            .collect::<Vec<_>>()
            .join(", ");

        let text = if kind == InvokeKind::Static {
            if member.class == self.this_class {
                format!("{}({})", member.name, arg_text)
            } else {
                format!(
                    "{}.{}({})",
                    self.imports.class_name(&member.class),
                    member.name,
                    arg_text
                )
            }
        } else {
            let receiver = self.pop(pc)?;
            let is_this = receiver.value == "this";
            if member.name == "<init>" {
                return self.construct(receiver, &member.class, args, arg_text);
            }
            if let OperandKind::Concat(parts) = &receiver.kind {
                if member.name == "append" && args.len() == 1 {
                    let mut parts = parts.clone();
                    let mut part = args[0].clone();
                    part.value = arg_text.clone();
                    parts.push(part);
                    self.push(Operand {
                        value: format!("{}.append({})", receiver.value, arg_text),
                        ty: ret,
                        prec: prec::ATOM,
                        kind: OperandKind::Concat(parts),
                    });
                    return Ok(Effect::None);
                }
                if member.name == "toString" && args.is_empty() {
                    self.push(concatenation(parts));
                    return Ok(Effect::None);
                }
            }
            if is_this && kind == InvokeKind::Special && member.class != self.this_class {
                format!("super.{}({})", member.name, arg_text)
            } else if is_this {
                format!("{}({})", member.name, arg_text)
            } else {
                format!(
                    "{}.{}({})",
                    receiver.left_of(prec::ATOM),
                    member.name,
                    arg_text
                )
            }
        };
        if ret == JvmType::Void {
            Ok(Effect::Statement(format!("{};", text)))
        } else {
            self.push(Operand::atom(text, ret).with_kind(OperandKind::Invocation));
            Ok(Effect::None)
        }
    }

    /// `invokespecial <init>`: either completes a `new` or is a `this(..)`/`super(..)` call.
    fn construct(
        &mut self,
        receiver: Operand,
        owner: &str,
        args: Vec<Operand>,
        arg_text: String,
    ) -> Result<Effect, RevEngineError> {
        let class = match receiver.kind {
            OperandKind::Uninit(class) => class,
            _ if receiver.value == "this" => {
                if owner == self.this_class {
                    return Ok(Effect::Statement(format!("this({});", arg_text)));
                }
                if args.is_empty() {
                    return Ok(Effect::None);
                }
                return Ok(Effect::Statement(format!("super({});", arg_text)));
            }
            _ => {
                return Ok(Effect::Statement(format!(
                    "{}.<init>({});",
                    receiver.value, arg_text
                )))
            }
        };
        let text = format!("new {}({})", self.imports.class_name(&class), arg_text);
        let created = if is_string_builder(&class) {
            let parts = args
                .into_iter()
                .filter(|a| a.ty == JvmType::Reference(STRING.into()))
                .collect();
            Operand::atom(text, JvmType::Reference(class.clone())).with_kind(OperandKind::Concat(parts))
        } else {
            Operand::atom(text, JvmType::Reference(class.clone())).with_kind(OperandKind::Invocation)
        };
        // the copy left by `dup` becomes the constructed object
        match self.stack.peek_mut(0) {
            Some(top) if top.kind == OperandKind::Uninit(class.clone()) => {
                *top = created;
                Ok(Effect::None)
            }
            _ => Ok(Effect::Statement(format!("{};", created.value))),
        }
    }

    fn invoke_dynamic(&mut self, pc: usize, index: u16) -> Result<Effect, RevEngineError> {
        let nat_index = match self.pool.get(index) {
            Some(ConstantInfo::InvokeDynamic(c)) => c.name_and_type_index,
            _ => {
                return Err(RevEngineError::ConstantPool {
                    index,
                    expected: "InvokeDynamic",
                })
            }
        };
        let (name, descriptor) = self.pool.name_and_type(nat_index)?;
        let (params, ret) = parse_method_descriptor(descriptor).ok_or(
            RevEngineError::ConstantPool {
                index,
                expected: "method descriptor",
            },
        )?;
        let name = name.to_string();
        let args = self.pop_arguments(pc, &params)?;
        let text = format!(
            "{}({})",
            name,
            args.iter().map(|a| a.value.as_str()).collect::<Vec<_>>().join(", ")
        );
        if ret == JvmType::Void {
            Ok(Effect::Statement(format!("{};", text)))
        } else {
            self.push(Operand::atom(text, ret).with_kind(OperandKind::Invocation));
            Ok(Effect::None)
        }
    }

    fn new_array_text(&self, elem: &JvmType, counts: &[Operand]) -> String {
        let mut base = elem;
        let mut extra = 0;
        while let JvmType::Array(inner) = base {
            base = inner;
            extra += 1;
        }
        let dims: String = counts.iter().map(|c| format!("[{}]", c.value)).collect();
        format!("new {}{}{}", self.imports.type_name(base), dims, "[]".repeat(extra))
    }
}

fn binary_prec(op: BinOp) -> u8 {
    match op {
        BinOp::Mul | BinOp::Div | BinOp::Rem => prec::MUL,
        BinOp::Add | BinOp::Sub => prec::ADD,
        BinOp::Shl | BinOp::Shr | BinOp::Ushr => prec::SHIFT,
        BinOp::And => prec::BITAND,
        BinOp::Xor => prec::XOR,
        BinOp::Or => prec::BITOR,
    }
}

fn is_string_builder(class: &str) -> bool {
    class == "java/lang/StringBuilder" || class == "java/lang/StringBuffer"
}

/// A discarded value is a statement only if computing it had side effects.
fn discard(value: Operand) -> Effect {
    match value.kind {
        OperandKind::Invocation | OperandKind::Concat(_) => {
            Effect::Statement(format!("{};", value.value))
        }
        _ => Effect::None,
    }
}

/// Renders the parts of a compiler-generated concatenation as `a + b + ..`.
fn concatenation(parts: &[Operand]) -> Operand {
    let string = JvmType::Reference(STRING.into());
    let Some(first) = parts.first() else {
        return Operand::atom("\"\"", string);
    };
    let starts_with_string =
        first.ty == string || parts.get(1).is_some_and(|second| second.ty == string);
    let mut text = if starts_with_string {
        first.left_of(prec::ADD)
    } else {
        format!("\"\" + {}", first.right_of(prec::ADD))
    };
    for part in &parts[1..] {
        text.push_str(" + ");
        text.push_str(&part.right_of(prec::ADD));
    }
    if parts.len() == 1 && starts_with_string {
        return Operand {
            value: text,
            ty: string,
            prec: first.prec,
            kind: OperandKind::Plain,
        };
    }
    Operand::new(text, string, prec::ADD)
}
