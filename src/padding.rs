//! The `$<ms[*][/]>` padding directive, scanned out of already-expanded
//! output. Kept apart from the `%` language on purpose: padding is a
//! post-expansion concern.

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    combinator::opt,
    sequence::preceded,
    IResult,
};

use crate::Int;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PadDirective {
    /// Requested delay in tenths of a millisecond.
    pub tenths_ms: Int,
    /// `*`: scale by the number of affected lines.
    pub proportional: bool,
    /// `/`: the delay must happen even when padding bytes cannot.
    pub mandatory: bool,
}

pub(crate) fn directive(input: &[u8]) -> IResult<&[u8], PadDirective> {
    let (input, _) = tag("$<")(input)?;
    let (input, whole) = take_while1(|b: u8| b.is_ascii_digit())(input)?;
    let (input, fraction) = opt(preceded(tag("."), take_while1(|b: u8| b.is_ascii_digit())))(input)?;
    let (input, flags) = take_while(|b| b == b'*' || b == b'/')(input)?;
    let (input, _) = tag(">")(input)?;

    let mut tenths = whole
        .iter()
        .fold(0, |acc: Int, &b| acc.saturating_mul(10) + Int::from(b - b'0'))
        .saturating_mul(10);
    // only one decimal place is meaningful
    if let Some(frac) = fraction {
        tenths += Int::from(frac[0] - b'0');
    }

    Ok((
        input,
        PadDirective {
            tenths_ms: tenths,
            proportional: flags.contains(&b'*'),
            mandatory: flags.contains(&b'/'),
        },
    ))
}
