use crate::{
    parse_database, CapKind, CapTable, CapValue, Database, Error, SyntaxError, TokenKind,
};

use super::{CAPS, SOURCE};

fn entry<'a>(db: &'a Database, name: &str) -> &'a crate::Entry {
    db.lookup(name)
        .unwrap_or_else(|| panic!("fixture entry {} missing", name))
}

#[test]
fn tokenize_header_and_features() {
    let tokens = crate::tokenize("vt|dec vt, alias,\n    am, cols#80, bel=^G,\n").unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::AliasInColumnOne,
            TokenKind::Pipe,
            TokenKind::Longname,
            TokenKind::Comma,
            TokenKind::Newline,
            TokenKind::Whitespace,
            TokenKind::Boolean,
            TokenKind::Comma,
            TokenKind::Numeric,
            TokenKind::Comma,
            TokenKind::String,
            TokenKind::Comma,
            TokenKind::Newline,
        ]
    );
    // the longname swallows the inner comma, anchored to the closing one
    assert_eq!(tokens[2].text, "dec vt, alias");
    assert_eq!(tokens[6].line, 2);
}

#[test]
fn parses_the_fixture_database() {
    let db = parse_database(SOURCE).unwrap();
    assert_eq!(db.entries.len(), 10);

    let dumb = entry(&db, "dumb");
    assert_eq!(dumb.aliases, vec!["dumb".to_string()]);
    assert_eq!(dumb.longname.as_deref(), Some("80-column dumb tty"));
    assert_eq!(dumb.caps.len(), 6);
    assert_eq!(
        dumb.caps[1].value,
        CapValue::Numeric(80),
    );

    // lookup by any alias is first-match
    assert!(db.lookup("loop-b").is_some());
    assert!(db.lookup("no-such-terminal").is_none());
}

#[test]
fn header_aliases_and_longname() {
    let db = parse_database("a1|a2|a3|multi word, name,\n    am,\n").unwrap();
    let e = &db.entries[0];
    assert_eq!(e.aliases, vec!["a1", "a2", "a3"]);
    assert_eq!(e.longname.as_deref(), Some("multi word, name"));
}

#[test]
fn header_without_longname() {
    let db = parse_database("solo,\n    am,\n").unwrap();
    assert_eq!(db.entries[0].aliases, vec!["solo"]);
    assert_eq!(db.entries[0].longname, None);
}

#[test]
fn duplicate_alias_is_rejected() {
    let err = parse_database("twin|twin|double vision,\n    am,\n").unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(SyntaxError::DuplicateAlias { line: 1, .. })
    ));
}

#[test]
fn header_must_end_with_a_comma() {
    let err = parse_database("dangling\n").unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(SyntaxError::Tokenize(
            crate::TokenizeError::MissingComma { line: 1 }
        ))
    ));
}

#[test]
fn comma_inside_a_middle_field_is_rejected() {
    assert!(parse_database("a|b,c|d,\n    am,\n").is_err());
}

#[test]
fn numeric_constant_forms() {
    let db = parse_database("n1,\n    hex#0x1b, oct#017, dec#42, chr#'A', suf#10l,\n").unwrap();
    let values: Vec<&CapValue> = db.entries[0].caps.iter().map(|c| &c.value).collect();
    assert_eq!(
        values,
        vec![
            &CapValue::Numeric(27),
            &CapValue::Numeric(15),
            &CapValue::Numeric(42),
            &CapValue::Numeric(65),
            &CapValue::Numeric(10),
        ]
    );
}

#[test]
fn bad_numeric_constant_is_rejected() {
    assert!(parse_database("n1,\n    bad#1x2,\n").is_err());
    assert!(parse_database("n1,\n    bad#,\n").is_err());
}

#[test]
fn string_values_stay_raw() {
    let db = parse_database("s1,\n    empty=, esc=\\E[H, comma=a\\,b,\n").unwrap();
    let caps = &db.entries[0].caps;
    assert_eq!(caps[0].value, CapValue::String(String::new()));
    assert_eq!(caps[1].value, CapValue::String("\\E[H".to_string()));
    assert_eq!(caps[2].value, CapValue::String("a\\,b".to_string()));
}

#[test]
fn cancellation_markers_are_kept_verbatim() {
    let db = parse_database("c1,\n    bw@, am,\n").unwrap();
    let caps = &db.entries[0].caps;
    assert!(caps[0].is_cancellation());
    assert_eq!(caps[0].base_name(), "bw");
    assert_eq!(caps[0].value, CapValue::Boolean(false));
    assert!(!caps[1].is_cancellation());
}

#[test]
fn whitespace_inside_a_feature_is_rejected() {
    let err = parse_database("w1,\n    am foo,\n").unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(SyntaxError::Tokenize(
            crate::TokenizeError::InvalidFeature { line: 2, .. }
        ))
    ));
}

#[test]
fn lone_comma_continuation_lines_are_fine() {
    let db = parse_database("e1,\n    ,\n    am,\n").unwrap();
    assert_eq!(db.entries[0].caps.len(), 1);
}

#[test]
fn blob_round_trip_preserves_the_entry_list() {
    let db = parse_database(SOURCE).unwrap();
    let again = Database::from_blob(&db.to_blob()).unwrap();
    assert_eq!(db, again);
}

#[test]
fn garbage_blob_is_database_unavailable() {
    assert!(matches!(
        Database::from_blob(b"not json"),
        Err(Error::DatabaseUnavailable)
    ));
    assert!(matches!(
        Database::from_blob(b"{\"an\":\"object\"}"),
        Err(Error::DatabaseUnavailable)
    ));
}

#[test]
fn caps_table_rows_and_indexes() {
    let table = CapTable::parse(CAPS);

    let bel = table.by_terminfo("bel").unwrap();
    assert_eq!(bel.variable, "bell");
    assert_eq!(bel.termcap.as_deref(), Some("bl"));
    assert_eq!(bel.kind, CapKind::String);

    let cols = table.by_variable("columns").unwrap();
    assert_eq!(cols.terminfo, "cols");
    assert_eq!(cols.kind, CapKind::Numeric);

    assert_eq!(table.by_termcap("cm").unwrap().terminfo, "cup");
}

#[test]
fn caps_aliases_and_bad_rows() {
    let table = CapTable::parse(CAPS);
    // capalias points at the same row as the canonical name
    assert_eq!(table.by_termcap("bl2").unwrap().terminfo, "bel");
    // the row with a broken type column was skipped
    assert!(table.by_terminfo("kbs").is_none());
    // infoalias with an unknown target resolves to nothing
    assert!(table.by_terminfo("font0").is_none());
}

#[test]
fn caps_dash_means_no_termcap_name() {
    let table = CapTable::parse("magic_cookie_glitch xmc num - - - - no termcap name\n");
    let row = table.by_terminfo("xmc").unwrap();
    assert_eq!(row.termcap, None);
    assert!(table.by_termcap("-").is_none());
}
