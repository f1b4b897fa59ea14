use crate::Int;

use common_macros::b_tree_map;
use lazy_static::lazy_static;

use std::collections::BTreeMap;

lazy_static! {
    /// Encoded ospeed → bits per second. The low codes are the classic
    /// sixteen; the 4097+ block is the extended range.
    static ref BAUDRATES: BTreeMap<Int, Int> = b_tree_map! {
        0 => 0,
        1 => 50,
        2 => 75,
        3 => 110,
        4 => 134,
        5 => 150,
        6 => 200,
        7 => 300,
        8 => 600,
        9 => 1200,
        10 => 1800,
        11 => 2400,
        12 => 4800,
        13 => 9600,
        14 => 19200,
        15 => 38400,
        4097 => 57600,
        4098 => 115_200,
        4099 => 230_400,
        4100 => 460_800,
        4101 => 500_000,
        4102 => 576_000,
        4103 => 921_600,
        4104 => 1_000_000,
        4105 => 1_152_000,
        4107 => 2_000_000,
        4108 => 2_500_000,
        4109 => 3_000_000,
        4110 => 3_500_000,
        4111 => 4_000_000,
    };
}

pub fn baudrate_for_ospeed(ospeed: Int) -> Int {
    match BAUDRATES.get(&ospeed) {
        Some(&baudrate) => baudrate,
        None => {
            log::warn!("unknown ospeed code {}, assuming baudrate 0", ospeed);
            0
        }
    }
}

pub fn valid_ospeed(code: Int) -> bool {
    matches!(code, 0..=15 | 4097..=4105 | 4107..=4111)
}

/// Query the output speed of the terminal on `fd`. Absence of a terminal is
/// not an error; the caller falls back to ospeed 0.
#[cfg(unix)]
pub fn ospeed_from_fd(fd: i32) -> Option<Int> {
    unsafe {
        let mut attrs: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut attrs) != 0 {
            return None;
        }
        Some(libc::cfgetospeed(&attrs) as Int)
    }
}

#[cfg(not(unix))]
pub fn ospeed_from_fd(_fd: i32) -> Option<Int> {
    None
}
