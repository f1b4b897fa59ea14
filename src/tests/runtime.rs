use crate::vm::Value;
use crate::{
    parse_database, resolve, CapTable, Error, Options, Runtime, Selection, StringQuery,
};

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::{fixture_runtime, CAPS, SOURCE};

#[test]
fn selection_codes() {
    let mut empty = Runtime::with_options(Options::default());
    assert_eq!(
        empty.select_terminal(Some("dumb"), None),
        Selection::DatabaseUnavailable
    );
    assert_eq!(Selection::DatabaseUnavailable.code(), -1);

    let mut rt = fixture_runtime();
    assert_eq!(rt.select_terminal(Some("xterm"), None), Selection::NotFound);
    assert_eq!(Selection::NotFound.code(), 0);
    assert_eq!(rt.select_terminal(Some("dumb"), None), Selection::Selected);
    assert_eq!(Selection::Selected.code(), 1);
}

#[test]
fn selecting_falls_back_to_dumb_when_defaulted() {
    let mut rt = fixture_runtime();
    assert_eq!(rt.select_terminal(None, None), Selection::Selected);
    assert!(rt.current().unwrap().aliases.iter().any(|a| a == "dumb"));
}

#[test]
fn configured_term_is_the_default_name() {
    let options = Options {
        database_text: Some(SOURCE.to_string()),
        term: Some("ibcs2".to_string()),
        ..Default::default()
    };
    let mut rt = Runtime::with_options(options);
    rt.load_translation_text(CAPS);
    assert_eq!(rt.select_terminal(None, None), Selection::Selected);
    assert!(rt.current().unwrap().aliases.iter().any(|a| a == "ibcs2"));
}

#[test]
fn dangling_use_is_not_found() {
    let mut rt = fixture_runtime();
    assert_eq!(rt.select_terminal(Some("orphan"), None), Selection::NotFound);
}

#[test]
fn use_cycles_are_rejected() {
    let db = parse_database(SOURCE).unwrap();
    assert!(matches!(
        resolve(&db, None, "loop-a", 0, 0),
        Err(Error::CyclicUse(_))
    ));
    let mut rt = fixture_runtime();
    assert_eq!(rt.select_terminal(Some("loop-a"), None), Selection::NotFound);
}

#[test]
fn use_inheritance_cancellation_and_first_wins() {
    let db = parse_database(SOURCE).unwrap();
    let table = CapTable::parse(CAPS);
    let entry = resolve(&db, Some(&table), "heir", 0, 0).unwrap();

    assert_eq!(entry.flag_terminfo("am"), 1); // inherited
    assert_eq!(entry.flag_terminfo("bw"), 0); // cancelled before the use=
    assert_eq!(entry.number_terminfo("lines"), 50); // first definition wins
    assert_eq!(entry.number_terminfo("cols"), 132); // inherited
    assert_eq!(entry.string_terminfo("cuu1").ok(), Some(r"\EM"));
    assert_eq!(entry.string_terminfo("cr").ok(), Some(r"\r"));

    // a cancelled name appears in no index at all
    assert!(entry.cancellations.contains("bw"));
    assert!(!entry.terminfo.contains_key("bw"));
    assert!(!entry.termcap.contains_key("bw"));
    assert!(!entry.variable.contains_key("auto_left_margin"));
}

#[test]
fn cancellation_after_use_still_purges_inherited_caps() {
    let db = parse_database(SOURCE).unwrap();
    let table = CapTable::parse(CAPS);
    let entry = resolve(&db, Some(&table), "heir-late-cancel", 0, 0).unwrap();

    // bw was spliced in from base-entry before the marker was reached; the
    // final purge still drops it from every index
    assert!(entry.cancellations.contains("bw"));
    assert!(!entry.terminfo.contains_key("bw"));
    assert!(!entry.termcap.contains_key("bw"));
    assert!(!entry.variable.contains_key("auto_left_margin"));
    assert_eq!(entry.flag_terminfo("bw"), 0);

    // the rest of the inherited entry survives
    assert_eq!(entry.flag_terminfo("am"), 1);
    assert_eq!(entry.number_terminfo("lines"), 50);
    assert_eq!(entry.number_terminfo("cols"), 132);
}

#[test]
fn dumb_bell_as_termcap_with_area() {
    let mut rt = fixture_runtime();
    assert_eq!(rt.select_terminal(Some("dumb"), None), Selection::Selected);

    let mut area = crate::Area::new();
    let bell = rt.get_string_termcap("bl", Some(&mut area));
    assert_eq!(bell, Some("^G"));
    assert_eq!(area.as_str(), "^G");
    assert_eq!(area.position(), 2);

    // a second string splices in at the advanced cursor
    let cr = rt.get_string_termcap("cr", Some(&mut area));
    assert_eq!(cr, Some(r"\r"));
    assert_eq!(area.as_str(), "^G\\r");
    assert_eq!(area.position(), 4);
}

#[test]
fn dumb_columns_as_termcap() {
    let mut rt = fixture_runtime();
    rt.select_terminal(Some("dumb"), None);
    assert_eq!(rt.get_number_termcap("co"), 80);
    assert_eq!(rt.get_number_termcap("absent"), -1);
    // the termcap interface folds wrong-type into its single "no" answer
    assert_eq!(rt.get_number_termcap("bl"), -1);
    assert!(rt.get_flag_termcap("am"));
    assert!(!rt.get_flag_termcap("bw"));
}

#[test]
fn nsterm_tri_state_queries() {
    let mut rt = fixture_runtime();
    assert_eq!(
        rt.select_terminal(Some("nsterm-16color"), None),
        Selection::Selected
    );

    assert_eq!(rt.get_flag_terminfo("am"), 1);
    assert_eq!(rt.get_flag_terminfo("cols"), -1); // wrong type
    assert_eq!(rt.get_flag_terminfo("absentcap"), 0);
    assert_eq!(rt.get_flag_terminfo("bw"), 0); // cancelled

    assert_eq!(rt.get_number_terminfo("wsl"), 50);
    assert_eq!(rt.get_number_terminfo("fsl"), -2); // wrong type
    assert_eq!(rt.get_number_terminfo("absentcap"), -1);
    assert_eq!(rt.get_number_terminfo("bw"), -1); // cancelled

    assert_eq!(rt.get_string_terminfo("fsl").ok(), Some("^G"));
    assert_eq!(rt.get_string_terminfo("wsl"), StringQuery::WrongType);
    assert_eq!(rt.get_string_terminfo("absentcap"), StringQuery::Absent);
}

#[test]
fn termcap_and_terminfo_views_agree() {
    let mut rt = fixture_runtime();
    rt.select_terminal(Some("dumb"), None);
    assert_eq!(
        rt.get_number_termcap("co"),
        rt.get_number_terminfo("cols")
    );
    assert_eq!(
        rt.get_flag_termcap("am"),
        rt.get_flag_terminfo("am") == 1
    );
    assert_eq!(
        rt.get_string_termcap("bl", None),
        rt.get_string_terminfo("bel").ok()
    );
}

#[test]
fn ibcs2_cursor_address() {
    let mut rt = fixture_runtime();
    rt.select_terminal(Some("ibcs2"), None);
    let cup = rt.get_string_terminfo("cup").ok().unwrap().to_string();
    let bytes = rt
        .expand(&cup, &[Value::Num(18), Value::Num(40)])
        .unwrap();
    assert_eq!(bytes, b"\x1b[19;41H");
}

#[test]
fn padding_without_pad_char_really_sleeps() {
    let mut rt = fixture_runtime();
    rt.select_terminal(Some("ibcs2"), None);

    let sleeps = Rc::new(RefCell::new(Vec::new()));
    let recorder = sleeps.clone();
    rt.set_sleep(move |d| recorder.borrow_mut().push(d));

    let cup = rt.get_string_terminfo("cup").ok().unwrap().to_string();
    let mut expanded = rt
        .expand(&cup, &[Value::Num(18), Value::Num(40)])
        .unwrap();
    expanded.extend_from_slice(b"$<1000>");

    let mut emitted = Vec::new();
    rt.apply_padding(&expanded, 1, &mut |b| emitted.push(b));

    assert_eq!(
        emitted,
        [0x1B, 0x5B, 0x31, 0x39, 0x3B, 0x34, 0x31, 0x48, 0x00]
    );
    assert_eq!(sleeps.borrow().as_slice(), &[Duration::from_millis(1000)]);
}

#[test]
fn padding_with_pad_char_emits_pc_bytes() {
    let options = Options {
        database_text: Some(SOURCE.to_string()),
        baudrate: Some(45_000),
        ..Default::default()
    };
    let mut rt = Runtime::with_options(options);
    rt.load_translation_text(CAPS);
    assert_eq!(rt.select_terminal(Some("dm2500"), None), Selection::Selected);
    assert_eq!(rt.baudrate(), 45_000);
    assert_eq!(rt.get_number_variable("baudrate"), 45_000);

    let flushes = Rc::new(RefCell::new(0));
    let counter = flushes.clone();
    rt.set_flush(move || *counter.borrow_mut() += 1);

    let cup = rt.get_string_terminfo("cup").ok().unwrap().to_string();
    let expanded = rt
        .expand(&cup, &[Value::Num(18), Value::Num(40)])
        .unwrap();
    // the padding directive rides along as plain text until tputs time
    assert!(expanded.ends_with(b"$<1>"));

    let mut emitted = Vec::new();
    rt.apply_padding(&expanded, 1, &mut |b| emitted.push(b));
    assert_eq!(
        emitted,
        [0x0C, 0x48, 0x72, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]
    );
    assert_eq!(*flushes.borrow(), 1);
}

#[test]
fn npc_forces_a_real_sleep_even_with_a_pad_char() {
    let source = "padless|pad char present but unusable,\n    npc,\n    pad=\\377, bel=^G,\n";
    let options = Options {
        database_text: Some(source.to_string()),
        baudrate: Some(9600),
        ..Default::default()
    };
    let mut rt = Runtime::with_options(options);
    rt.load_translation_text(CAPS);
    assert_eq!(rt.select_terminal(Some("padless"), None), Selection::Selected);

    let sleeps = Rc::new(RefCell::new(Vec::new()));
    let recorder = sleeps.clone();
    rt.set_sleep(move |d| recorder.borrow_mut().push(d));

    let mut emitted = Vec::new();
    rt.apply_padding(b"X$<10>", 1, &mut |b| emitted.push(b));
    assert_eq!(emitted, [b'X', 0x00]);
    assert_eq!(sleeps.borrow().as_slice(), &[Duration::from_millis(10)]);
}

#[test]
fn proportional_padding_scales_with_affected_lines() {
    let mut rt = fixture_runtime();
    rt.select_terminal(Some("dumb"), None);

    let sleeps = Rc::new(RefCell::new(Vec::new()));
    let recorder = sleeps.clone();
    rt.set_sleep(move |d| recorder.borrow_mut().push(d));

    let mut emitted = Vec::new();
    rt.apply_padding(b"$<2*>", 3, &mut |b| emitted.push(b));
    assert_eq!(emitted, [0x00]);
    assert_eq!(sleeps.borrow().as_slice(), &[Duration::from_millis(6)]);
}

#[test]
fn malformed_padding_is_skipped() {
    let mut rt = fixture_runtime();
    rt.select_terminal(Some("dumb"), None);

    let sleeps = Rc::new(RefCell::new(Vec::new()));
    let recorder = sleeps.clone();
    rt.set_sleep(move |d| recorder.borrow_mut().push(d));

    let mut emitted = Vec::new();
    rt.apply_padding(b"a$<xy>b", 1, &mut |b| emitted.push(b));
    assert_eq!(emitted, b"ab");
    assert!(sleeps.borrow().is_empty());

    emitted.clear();
    rt.apply_padding(b"a$<12", 1, &mut |b| emitted.push(b));
    assert_eq!(emitted, b"a12");
}

#[test]
fn dynamic_bank_resets_per_expansion_static_bank_persists() {
    let mut rt = fixture_runtime();
    rt.select_terminal(Some("dumb"), None);

    rt.expand("%p1%Pa", &[Value::Num(9)]).unwrap();
    assert_eq!(rt.expand("%ga%d", &[]).unwrap(), b"0");

    rt.expand("%p1%PA", &[Value::Num(9)]).unwrap();
    assert_eq!(rt.expand("%gA%d", &[]).unwrap(), b"9");

    // a fresh selection starts with fresh banks
    rt.select_terminal(Some("dumb"), None);
    assert_eq!(rt.expand("%gA%d", &[]).unwrap(), b"0");
}

#[test]
fn pseudo_variables() {
    let options = Options {
        database_text: Some(SOURCE.to_string()),
        ospeed: Some(13),
        ..Default::default()
    };
    let mut rt = Runtime::with_options(options);
    rt.load_translation_text(CAPS);
    rt.select_terminal(Some("dm2500"), None);

    assert_eq!(rt.ospeed(), 13);
    assert_eq!(rt.baudrate(), 9600);
    assert_eq!(rt.get_number_variable("ospeed"), 13);
    assert_eq!(rt.get_number_variable("baudrate"), 9600);
    assert_eq!(rt.get_string_variable("PC").ok(), Some(r"\377"));

    rt.select_terminal(Some("heir"), None);
    assert_eq!(rt.get_string_variable("UP").ok(), Some(r"\EM"));
    assert_eq!(rt.get_string_variable("BC"), StringQuery::Absent);
}

#[test]
fn ospeed_to_baudrate_table() {
    assert_eq!(crate::baudrate_for_ospeed(0), 0);
    assert_eq!(crate::baudrate_for_ospeed(13), 9600);
    assert_eq!(crate::baudrate_for_ospeed(15), 38_400);
    assert_eq!(crate::baudrate_for_ospeed(4098), 115_200);
    assert_eq!(crate::baudrate_for_ospeed(4111), 4_000_000);
    assert_eq!(crate::baudrate_for_ospeed(4106), 0); // unknown code
    assert!(crate::valid_ospeed(15));
    assert!(crate::valid_ospeed(4105));
    assert!(!crate::valid_ospeed(16));
    assert!(!crate::valid_ospeed(4106));
}

#[test]
fn stub_cache_round_trip() {
    let mut rt = fixture_runtime();
    rt.expand("%p1%d", &[Value::Num(1)]).unwrap();
    rt.expand(r"\E[H", &[]).unwrap();

    let path = std::env::temp_dir().join("tinfo-stub-cache-test.json");
    rt.save_stubs(&path).unwrap();
    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains("%p1%d"));

    let mut warmed = fixture_runtime();
    warmed.load_stubs_blob(&path).unwrap();
    assert_eq!(warmed.expand("%p1%d", &[Value::Num(4)]).unwrap(), b"4");

    std::fs::remove_file(&path).ok();
}

#[test]
fn options_from_env() {
    std::env::set_var(crate::ENV_DATABASE_TXT, "tiny,\n    am,\n");
    std::env::set_var(crate::ENV_TERM, "tiny");
    std::env::set_var(crate::ENV_OSPEED, "13");
    std::env::set_var(crate::ENV_BAUDRATE, "45000");
    std::env::set_var(crate::ENV_CACHE_STUBS, "0");

    let options = Options::from_env();
    assert_eq!(options.database_text.as_deref(), Some("tiny,\n    am,\n"));
    assert_eq!(options.term.as_deref(), Some("tiny"));
    assert_eq!(options.ospeed, Some(13));
    assert_eq!(options.baudrate, Some(45_000));
    assert!(!options.cache_stubs);

    std::env::remove_var(crate::ENV_DATABASE_TXT);
    std::env::remove_var(crate::ENV_TERM);
    std::env::remove_var(crate::ENV_OSPEED);
    std::env::remove_var(crate::ENV_BAUDRATE);
    std::env::remove_var(crate::ENV_CACHE_STUBS);
}
