use crate::compiler::{BinaryOp, CompiledString, Fmt, Op};
use crate::{Error, Int};

/// A value on the evaluation stack: the `%` language traffics in integers
/// and byte strings. Coercions follow printf conventions — a string read as
/// a number is 0, a number read as a string formats as decimal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Num(Int),
    Str(Vec<u8>),
}

impl Value {
    pub fn as_num(&self) -> Int {
        match self {
            Self::Num(n) => *n,
            Self::Str(_) => 0,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Num(n) => n.to_string().into_bytes(),
            Self::Str(s) => s,
        }
    }
}

impl From<Int> for Value {
    fn from(n: Int) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(s: Vec<u8>) -> Self {
        Self::Str(s)
    }
}

impl From<&[u8]> for Value {
    fn from(s: &[u8]) -> Self {
        Self::Str(s.to_vec())
    }
}

/// Twenty-six variable slots, `a..z` or `A..Z`. Empty slots read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarBank {
    slots: [Option<Value>; 26],
}

impl VarBank {
    pub fn get(&self, index: u8) -> Value {
        self.slots[index as usize].clone().unwrap_or(Value::Num(0))
    }

    pub fn set(&mut self, index: u8, value: Value) {
        self.slots[index as usize] = Some(value);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Compile and evaluate a capability string with fresh variable banks.
pub fn expand(source: &str, params: &[Value]) -> Result<Vec<u8>, Error> {
    let compiled = crate::compile(source)?;
    let mut dynamics = VarBank::default();
    let mut statics = VarBank::default();
    Ok(compiled.eval(params, &mut dynamics, &mut statics))
}

pub(crate) fn execute(
    compiled: &CompiledString,
    params: &[Value],
    dynamics: &mut VarBank,
    statics: &mut VarBank,
) -> Vec<u8> {
    // Parameter positions that feed %s/%l keep their caller-supplied string;
    // numeric positions coerce, with strings reading as 0.
    let mut locals: Vec<Value> = (0..9)
        .map(|i| match params.get(i) {
            Some(value) if compiled.str_params[i] => value.clone(),
            Some(value) => Value::Num(value.as_num()),
            None => Value::Num(0),
        })
        .collect();

    let mut stack: Vec<Value> = Vec::new();
    if compiled.termcap_params {
        // termcap-style template: naked pops consume parameters left to
        // right, so seed the stack in reverse
        for value in params.iter().rev() {
            stack.push(value.clone());
        }
    }

    let mut out: Vec<u8> = Vec::new();
    let mut pc = 0;
    while pc < compiled.ops.len() {
        match &compiled.ops[pc] {
            Op::Literal(bytes) => out.extend_from_slice(bytes),
            Op::PushParam(i) => stack.push(locals[*i as usize].clone()),
            Op::PushConst(n) => stack.push(Value::Num(*n)),
            Op::LoadDyn(i) => stack.push(dynamics.get(*i)),
            Op::StoreDyn(i) => {
                let value = pop(&mut stack);
                dynamics.set(*i, value);
            }
            Op::LoadStatic(i) => stack.push(statics.get(*i)),
            Op::StoreStatic(i) => {
                let value = pop(&mut stack);
                statics.set(*i, value);
            }
            Op::StrLen => {
                let len = pop(&mut stack).into_bytes().len();
                stack.push(Value::Num(len as Int));
            }
            Op::Binary(op) => {
                let right = pop(&mut stack).as_num();
                let left = pop(&mut stack).as_num();
                stack.push(Value::Num(binary(*op, left, right)));
            }
            Op::Not => {
                let value = pop(&mut stack).as_num();
                stack.push(Value::Num(Int::from(value == 0)));
            }
            Op::Complement => {
                let value = pop(&mut stack).as_num();
                stack.push(Value::Num(!value));
            }
            Op::IncrementParams => {
                for slot in locals.iter_mut().take(2) {
                    if let Value::Num(n) = slot {
                        *n += 1;
                    }
                }
            }
            Op::PrintChar => {
                let value = pop(&mut stack).as_num();
                // 0 emits 0x80, the "not NUL" convention
                out.push(if value == 0 { 0x80 } else { value as u8 });
            }
            Op::Format(fmt) => {
                let value = pop(&mut stack);
                format_value(&mut out, value, fmt);
            }
            Op::JumpIfZero(target) => {
                if pop(&mut stack).as_num() == 0 {
                    pc = *target;
                    continue;
                }
            }
            Op::Jump(target) => {
                pc = *target;
                continue;
            }
        }
        pc += 1;
    }
    out
}

fn pop(stack: &mut Vec<Value>) -> Value {
    stack.pop().unwrap_or(Value::Num(0))
}

fn binary(op: BinaryOp, left: Int, right: Int) -> Int {
    match op {
        BinaryOp::Add => left.wrapping_add(right),
        BinaryOp::Sub => left.wrapping_sub(right),
        BinaryOp::Mul => left.wrapping_mul(right),
        BinaryOp::Div => {
            if right == 0 {
                log::debug!("%/ with zero divisor");
                0
            } else {
                left.wrapping_div(right)
            }
        }
        BinaryOp::Mod => {
            if right == 0 {
                log::debug!("%m with zero divisor");
                0
            } else {
                left.wrapping_rem(right)
            }
        }
        BinaryOp::BitAnd => left & right,
        BinaryOp::BitOr => left | right,
        BinaryOp::BitXor => left ^ right,
        BinaryOp::Equal => Int::from(left == right),
        BinaryOp::Greater => Int::from(left > right),
        BinaryOp::Less => Int::from(left < right),
        BinaryOp::And => Int::from(left != 0 && right != 0),
        BinaryOp::Or => Int::from(left != 0 || right != 0),
    }
}

/// The terminfo printf subset: `d o x X s` with `- + space # 0` flags,
/// width, and precision.
fn format_value(out: &mut Vec<u8>, value: Value, fmt: &Fmt) {
    if fmt.conv == 's' {
        let mut bytes = value.into_bytes();
        if let Some(precision) = fmt.precision {
            bytes.truncate(precision);
        }
        emit_padded(out, Vec::new(), bytes, fmt, false);
        return;
    }

    let n = value.as_num();
    let negative = fmt.conv == 'd' && n < 0;
    let magnitude = if fmt.conv == 'd' {
        n.unsigned_abs()
    } else {
        n as u64
    };

    let mut digits = match fmt.conv {
        'o' => format!("{:o}", magnitude),
        'x' => format!("{:x}", magnitude),
        'X' => format!("{:X}", magnitude),
        _ => magnitude.to_string(),
    };
    if let Some(precision) = fmt.precision {
        while digits.len() < precision {
            digits.insert(0, '0');
        }
    }

    let mut prefix = String::new();
    if negative {
        prefix.push('-');
    } else if fmt.plus && fmt.conv == 'd' {
        prefix.push('+');
    } else if fmt.space && fmt.conv == 'd' {
        prefix.push(' ');
    }
    if fmt.alternate {
        match fmt.conv {
            'o' if !digits.starts_with('0') => digits.insert(0, '0'),
            'x' if n != 0 => prefix.push_str("0x"),
            'X' if n != 0 => prefix.push_str("0X"),
            _ => {}
        }
    }

    let zero_pad = fmt.zero && !fmt.left && fmt.precision.is_none();
    emit_padded(out, prefix.into_bytes(), digits.into_bytes(), fmt, zero_pad);
}

fn emit_padded(out: &mut Vec<u8>, prefix: Vec<u8>, body: Vec<u8>, fmt: &Fmt, zero_pad: bool) {
    let content = prefix.len() + body.len();
    let fill = fmt.width.saturating_sub(content);
    if fmt.left {
        out.extend_from_slice(&prefix);
        out.extend_from_slice(&body);
        out.extend(std::iter::repeat(b' ').take(fill));
    } else if zero_pad {
        out.extend_from_slice(&prefix);
        out.extend(std::iter::repeat(b'0').take(fill));
        out.extend_from_slice(&body);
    } else {
        out.extend(std::iter::repeat(b' ').take(fill));
        out.extend_from_slice(&prefix);
        out.extend_from_slice(&body);
    }
}
