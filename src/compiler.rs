//! Compiles the raw value of a string capability into a flat opcode vector.
//! The `%` stack language is lowered here once; evaluation is a linear walk
//! over [`Op`]s with branches already resolved to jump targets.

use nom::{
    character::complete::{char, digit0, digit1, one_of},
    combinator::opt,
    multi::many0,
    sequence::preceded,
    IResult,
};

use crate::escapes;
use crate::vm::{VarBank, Value};
use crate::{Error, Int};

use core::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// A `%'` or `%{` constant with no closing delimiter.
    Unterminated { directive: char, text: String },
    BadConstant { text: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unterminated { directive, text } => {
                write!(f, "unterminated `%{}` in \"{}\"", directive, text)
            }
            Self::BadConstant { text } => {
                write!(f, "`%{{{}}}` is not an integer constant", text)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Literal(Vec<u8>),
    /// Push parameter `i` (0-based).
    PushParam(u8),
    PushConst(Int),
    LoadDyn(u8),
    StoreDyn(u8),
    LoadStatic(u8),
    StoreStatic(u8),
    /// Pop a string, push its byte length.
    StrLen,
    Binary(BinaryOp),
    Not,
    Complement,
    /// `%i`: add one to the first two parameters, in place.
    IncrementParams,
    /// Pop, emit as a single byte.
    PrintChar,
    /// Pop, emit with printf-style formatting.
    Format(Fmt),
    /// Pop; jump when zero. Targets are op indices.
    JumpIfZero(usize),
    Jump(usize),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Equal,
    Greater,
    Less,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fmt {
    pub conv: char,
    pub left: bool,
    pub plus: bool,
    pub space: bool,
    pub alternate: bool,
    pub zero: bool,
    pub width: usize,
    pub precision: Option<usize>,
}

impl Fmt {
    fn new(conv: char) -> Self {
        Fmt {
            conv,
            left: false,
            plus: false,
            space: false,
            alternate: false,
            zero: false,
            width: 0,
            precision: None,
        }
    }
}

/// A capability string lowered to opcodes, plus the two facts the VM needs
/// up front: which parameter positions carry strings, and whether the string
/// is a termcap-style template (conversions but no `%p`), in which case the
/// stack is pre-seeded with all parameters in reverse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledString {
    pub(crate) ops: Vec<Op>,
    pub(crate) termcap_params: bool,
    pub(crate) str_params: [bool; 9],
}

impl CompiledString {
    pub fn eval(&self, params: &[Value], dynamics: &mut VarBank, statics: &mut VarBank) -> Vec<u8> {
        crate::vm::execute(self, params, dynamics, statics)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }
}

#[derive(Default)]
struct CondFrame {
    /// Index of the unpatched `JumpIfZero` from the most recent `%t`.
    then_jump: Option<usize>,
    /// Indices of `Jump`s that exit finished branches.
    end_jumps: Vec<usize>,
}

pub fn compile(source: &str) -> Result<CompiledString, Error> {
    let mut ops: Vec<Op> = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let mut frames: Vec<CondFrame> = Vec::new();

    let mut bytes = source.as_bytes();
    while !bytes.is_empty() {
        if bytes[0] == b'%' {
            bytes = directive(&bytes[1..], source, &mut ops, &mut literal, &mut frames)?;
        } else {
            let (byte, used) = escapes::decode(bytes);
            if let Some(byte) = byte {
                literal.push(byte);
            }
            bytes = &bytes[used..];
        }
    }
    flush(&mut literal, &mut ops);

    // an open conditional at end-of-string closes as if `%;` were present
    while let Some(frame) = frames.pop() {
        close_frame(frame, &mut ops);
    }

    let mut str_params = [false; 9];
    for pair in ops.windows(2) {
        if let [Op::PushParam(i), consumer] = pair {
            let stringy = matches!(consumer, Op::StrLen)
                || matches!(consumer, Op::Format(fmt) if fmt.conv == 's');
            if stringy {
                str_params[*i as usize] = true;
            }
        }
    }
    let termcap_params = !ops.iter().any(|op| matches!(op, Op::PushParam(_)))
        && ops
            .iter()
            .any(|op| matches!(op, Op::Format(_) | Op::PrintChar));

    Ok(CompiledString {
        ops,
        termcap_params,
        str_params,
    })
}

fn flush(literal: &mut Vec<u8>, ops: &mut Vec<Op>) {
    if !literal.is_empty() {
        ops.push(Op::Literal(std::mem::take(literal)));
    }
}

fn emit(op: Op, ops: &mut Vec<Op>, literal: &mut Vec<u8>) {
    flush(literal, ops);
    ops.push(op);
}

fn directive<'a>(
    bytes: &'a [u8],
    source: &str,
    ops: &mut Vec<Op>,
    literal: &mut Vec<u8>,
    frames: &mut Vec<CondFrame>,
) -> Result<&'a [u8], Error> {
    let first = match bytes.first() {
        Some(&b) => b,
        None => {
            log::warn!("dangling `%` at end of \"{}\"", source);
            return Ok(bytes);
        }
    };

    match first {
        b'%' => {
            literal.push(b'%');
            Ok(&bytes[1..])
        }
        b'c' => {
            emit(Op::PrintChar, ops, literal);
            Ok(&bytes[1..])
        }
        b'p' => match bytes.get(1) {
            Some(&d @ b'1'..=b'9') => {
                emit(Op::PushParam(d - b'1'), ops, literal);
                Ok(&bytes[2..])
            }
            _ => {
                log::warn!("`%p` without a parameter digit in \"{}\"", source);
                Ok(&bytes[1..])
            }
        },
        b'P' => match bytes.get(1) {
            Some(&v @ b'a'..=b'z') => {
                emit(Op::StoreDyn(v - b'a'), ops, literal);
                Ok(&bytes[2..])
            }
            Some(&v @ b'A'..=b'Z') => {
                emit(Op::StoreStatic(v - b'A'), ops, literal);
                Ok(&bytes[2..])
            }
            _ => {
                log::warn!("`%P` without a variable letter in \"{}\"", source);
                Ok(&bytes[1..])
            }
        },
        b'g' => match bytes.get(1) {
            Some(&v @ b'a'..=b'z') => {
                emit(Op::LoadDyn(v - b'a'), ops, literal);
                Ok(&bytes[2..])
            }
            Some(&v @ b'A'..=b'Z') => {
                emit(Op::LoadStatic(v - b'A'), ops, literal);
                Ok(&bytes[2..])
            }
            _ => {
                log::warn!("`%g` without a variable letter in \"{}\"", source);
                Ok(&bytes[1..])
            }
        },
        b'l' => {
            emit(Op::StrLen, ops, literal);
            Ok(&bytes[1..])
        }
        b'\'' => {
            let close = bytes[1..]
                .iter()
                .position(|&b| b == b'\'')
                .ok_or(CompileError::Unterminated {
                    directive: '\'',
                    text: source.to_string(),
                })?;
            let inner = std::str::from_utf8(&bytes[1..1 + close]).unwrap_or("");
            match escapes::unescape(inner).first() {
                Some(&byte) => emit(Op::PushConst(Int::from(byte)), ops, literal),
                None => log::warn!("empty character constant in \"{}\"", source),
            }
            Ok(&bytes[2 + close..])
        }
        b'{' => {
            let close = bytes[1..]
                .iter()
                .position(|&b| b == b'}')
                .ok_or(CompileError::Unterminated {
                    directive: '{',
                    text: source.to_string(),
                })?;
            let digits = std::str::from_utf8(&bytes[1..1 + close]).unwrap_or("");
            let value = digits
                .parse::<Int>()
                .map_err(|_| CompileError::BadConstant {
                    text: digits.to_string(),
                })?;
            emit(Op::PushConst(value), ops, literal);
            Ok(&bytes[2 + close..])
        }
        b'+' | b'-' | b'*' | b'/' | b'm' | b'&' | b'|' | b'^' | b'=' | b'>' | b'<' | b'A'
        | b'O' => {
            let op = match first {
                b'+' => BinaryOp::Add,
                b'-' => BinaryOp::Sub,
                b'*' => BinaryOp::Mul,
                b'/' => BinaryOp::Div,
                b'm' => BinaryOp::Mod,
                b'&' => BinaryOp::BitAnd,
                b'|' => BinaryOp::BitOr,
                b'^' => BinaryOp::BitXor,
                b'=' => BinaryOp::Equal,
                b'>' => BinaryOp::Greater,
                b'<' => BinaryOp::Less,
                b'A' => BinaryOp::And,
                _ => BinaryOp::Or,
            };
            emit(Op::Binary(op), ops, literal);
            Ok(&bytes[1..])
        }
        b'!' => {
            emit(Op::Not, ops, literal);
            Ok(&bytes[1..])
        }
        b'~' => {
            emit(Op::Complement, ops, literal);
            Ok(&bytes[1..])
        }
        b'i' => {
            emit(Op::IncrementParams, ops, literal);
            Ok(&bytes[1..])
        }
        b'?' => {
            frames.push(CondFrame::default());
            Ok(&bytes[1..])
        }
        b't' => {
            match frames.last_mut() {
                Some(frame) => {
                    flush(literal, ops);
                    ops.push(Op::JumpIfZero(usize::MAX));
                    frame.then_jump = Some(ops.len() - 1);
                }
                None => log::warn!("`%t` outside a conditional in \"{}\"", source),
            }
            Ok(&bytes[1..])
        }
        b'e' => {
            match frames.last_mut() {
                Some(frame) => {
                    flush(literal, ops);
                    ops.push(Op::Jump(usize::MAX));
                    let exit = ops.len() - 1;
                    if let Some(at) = frame.then_jump.take() {
                        ops[at] = Op::JumpIfZero(ops.len());
                    }
                    frame.end_jumps.push(exit);
                }
                None => log::warn!("`%e` outside a conditional in \"{}\"", source),
            }
            Ok(&bytes[1..])
        }
        b';' => {
            match frames.pop() {
                Some(frame) => {
                    flush(literal, ops);
                    close_frame(frame, ops);
                }
                None => log::warn!("`%;` outside a conditional in \"{}\"", source),
            }
            Ok(&bytes[1..])
        }
        _ => match format_spec(bytes) {
            Ok((rest, fmt)) => {
                emit(Op::Format(fmt), ops, literal);
                Ok(rest)
            }
            Err(_) => {
                log::warn!(
                    "unknown directive `%{}` in \"{}\"",
                    char::from(first),
                    source
                );
                Ok(&bytes[1..])
            }
        },
    }
}

fn close_frame(frame: CondFrame, ops: &mut Vec<Op>) {
    let join = ops.len();
    if let Some(at) = frame.then_jump {
        ops[at] = Op::JumpIfZero(join);
    }
    for at in frame.end_jumps {
        ops[at] = Op::Jump(join);
    }
}

/// `%[[:]flags][width[.precision]]{d,o,x,X,s}`. The optional leading `:`
/// only escapes the dispatcher (so `-` and `+` can be flags); it carries no
/// meaning of its own.
fn format_spec(input: &[u8]) -> IResult<&[u8], Fmt> {
    let (input, _) = opt(char(':'))(input)?;
    let (input, flags) = many0(one_of("-+ #0"))(input)?;
    let (input, width) = digit0(input)?;
    let (input, precision) = opt(preceded(char('.'), digit1))(input)?;
    let (input, conv) = one_of("doxXs")(input)?;

    let mut fmt = Fmt::new(conv);
    for flag in flags {
        match flag {
            '-' => fmt.left = true,
            '+' => fmt.plus = true,
            ' ' => fmt.space = true,
            '#' => fmt.alternate = true,
            _ => fmt.zero = true,
        }
    }
    fmt.width = ascii_to_usize(width);
    fmt.precision = precision.map(ascii_to_usize);
    Ok((input, fmt))
}

fn ascii_to_usize(digits: &[u8]) -> usize {
    digits
        .iter()
        .fold(0usize, |acc, b| acc * 10 + usize::from(b - b'0'))
}
