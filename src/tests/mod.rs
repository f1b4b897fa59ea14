mod parse;
mod runtime;

/// Fixture terminal descriptions, shaped like the real database: a dumb
/// tty, a status-line terminal with a cancelled capability, an ANSI-style
/// workalike, a pre-ANSI terminal with xor cursor addressing and padding,
/// and a small `use=` family including a cycle.
pub(crate) const SOURCE: &str = r"
# fixture terminal descriptions

dumb|80-column dumb tty,
    am,
    cols#80,
    bel=^G, cr=\r, cud1=\n, ind=\n,

nsterm-16color|Terminal.app with 16 colors,
    am, bw@,
    cols#80, lines#24, wsl#50,
    bel=^G, fsl=^G, tsl=\E]2;,

ibcs2|Intel svr3 workalike,
    am,
    cols#80, lines#25,
    clear=\E[H\E[J, cup=\E[%i%p1%d;%p2%dH, el=\E[K,

dm2500|datamedia 2500,
    cols#80, lines#24,
    bel=^G, cup=\014%p2%{96}%^%c%p1%{96}%^%c$<1>, pad=\377,

base-entry|capabilities shared by the fixtures,
    am, bw, xenl,
    cols#132, lines#24,
    bel=^G, cuu1=\EM,

heir|entry inheriting from base-entry,
    bw@, lines#50, use=base-entry,
    cr=\r,

heir-late-cancel|entry cancelling after the use,
    lines#50, use=base-entry, bw@,

orphan|entry with a dangling reference,
    use=no-such-terminal,

loop-a|first half of a use cycle,
    use=loop-b,

loop-b|second half of a use cycle,
    use=loop-a,
";

/// Fixture translation table in the Caps column layout:
/// variable, terminfo name, type, termcap name, then key columns and a
/// description.
pub(crate) const CAPS: &str = "\
# variable            terminfo  type  termcap  keyname  keyvalue  translation  description
auto_right_margin     am        bool  am       -        -         YB   cursor wraps at right margin
auto_left_margin      bw        bool  bw       -        -         -    cub1 wraps from column 0
eat_newline_glitch    xenl      bool  xn       -        -         -    newline ignored after 80 cols
no_pad_char           npc       bool  NP       -        -         -    pad character does not exist
columns               cols      num   co       -        -         -    number of columns in a line
lines                 lines     num   li       -        -         -    number of lines on screen
width_status_line     wsl       num   ws       -        -         -    number of columns in status line
bell                  bel       str   bl       -        -         -    audible signal
carriage_return       cr        str   cr       -        -         -    carriage return
clear_screen          clear     str   cl       -        -         -    clear screen and home cursor
cursor_address        cup       str   cm       -        -         -    move to row #1 col #2
cursor_down           cud1      str   do       -        -         -    down one line
cursor_up             cuu1      str   up       -        -         -    up one line
clr_eol               el        str   ce       -        -         -    clear to end of line
from_status_line      fsl       str   fs       -        -         -    return from status line
to_status_line        tsl       str   ts       -        -         -    go to status line
scroll_forward        ind       str   sf       -        -         -    scroll text up
pad_char              pad       str   pc       -        -         -    padding char
backspace_if_not_bs   OTbc      str   bc       -        -         -    backspace if not ^H
key_backspace         kbs       strx  kb       -        -         -    row with a broken type column
capalias bl2 bl BSD alternate bell spelling
infoalias font0 s0ds sysv alias with an unknown target
";

/// A runtime over the fixture database and table, configured explicitly so
/// the tests never read the process environment.
pub(crate) fn fixture_runtime() -> crate::Runtime {
    let options = crate::Options {
        database_text: Some(SOURCE.to_string()),
        ..Default::default()
    };
    let mut runtime = crate::Runtime::with_options(options);
    runtime.load_translation_text(CAPS);
    runtime
}
