use crate::vm::VarBank;
use crate::{CapTable, CapValue, Capability, Database, Entry, Error, Int};

use std::collections::{HashMap, HashSet};

/// The answer of a string-capability query. The classic C interface returns
/// `-1` for a wrong-typed name and `0` for an absent one; here those are
/// variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StringQuery<'a> {
    Found(&'a str),
    WrongType,
    Absent,
}

impl<'a> StringQuery<'a> {
    pub fn ok(self) -> Option<&'a str> {
        match self {
            Self::Found(s) => Some(s),
            _ => None,
        }
    }
}

/// A terminal entry after `use=` inheritance and cancellation, indexed by
/// terminfo name, termcap name, and variable name, with the variable banks
/// the `%` language mutates.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub aliases: Vec<String>,
    pub longname: Option<String>,
    pub terminfo: HashMap<String, Capability>,
    pub termcap: HashMap<String, Capability>,
    pub variable: HashMap<String, Capability>,
    pub cancellations: HashSet<String>,
    pub(crate) statics: VarBank,
    pub(crate) dynamics: VarBank,
}

/// Resolve `name` against the database. `ospeed` and `baudrate` come from
/// the caller's boundary (environment override or terminal query) and become
/// numeric pseudo-variables.
pub fn resolve(
    db: &Database,
    table: Option<&CapTable>,
    name: &str,
    ospeed: Int,
    baudrate: Int,
) -> Result<ResolvedEntry, Error> {
    let entry = db
        .lookup(name)
        .ok_or_else(|| Error::TerminalNotFound(name.to_string()))?;
    check_cycles(db, entry)?;

    // Pass A: walk the capability list front to back, accumulating
    // cancellations and splicing `use=` targets in place. The cancellation
    // set is never reset between splices, and the `featured` set makes the
    // first definition of a name win.
    let mut list: Vec<Capability> = entry.caps.clone();
    let mut cancellations: HashSet<String> = HashSet::new();
    let mut featured: HashSet<String> = HashSet::new();
    let mut i = 0;
    while i < list.len() {
        let cap = &list[i];
        if cap.is_cancellation() {
            cancellations.insert(cap.base_name().to_string());
            i += 1;
        } else if cap.name == "use" {
            let target = match &cap.value {
                CapValue::String(s) => s.clone(),
                _ => {
                    featured.insert(cap.base_name().to_string());
                    i += 1;
                    continue;
                }
            };
            let other = db
                .lookup(&target)
                .ok_or_else(|| Error::TerminalNotFound(target.clone()))?;
            let splice: Vec<Capability> = other
                .caps
                .iter()
                .filter(|c| {
                    !cancellations.contains(c.base_name()) && !featured.contains(c.base_name())
                })
                .cloned()
                .collect();
            // the `use=` capability itself is consumed; the spliced caps are
            // walked next, so nested `use=` and cancellations still apply
            list.splice(i..=i, splice);
        } else {
            featured.insert(cap.base_name().to_string());
            i += 1;
        }
    }

    // Pass B: residual cancellation markers, and anything the cancellation
    // set covers — a marker written after a `use=` still suppresses what the
    // splice already brought in. Pass C: `.name` source comments.
    list.retain(|c| {
        !c.is_cancellation()
            && !c.name.starts_with('.')
            && !cancellations.contains(c.base_name())
    });

    let mut resolved = ResolvedEntry {
        aliases: entry.aliases.clone(),
        longname: entry.longname.clone(),
        terminfo: HashMap::new(),
        termcap: HashMap::new(),
        variable: HashMap::new(),
        cancellations,
        statics: VarBank::default(),
        dynamics: VarBank::default(),
    };

    for cap in list {
        match table.and_then(|t| t.by_terminfo(&cap.name)) {
            Some(row) if row.kind != cap.kind() => {
                log::warn!(
                    "capability \"{}\" is {:?} but the translation table says {:?}; mapping skipped",
                    cap.name,
                    cap.kind(),
                    row.kind
                );
            }
            Some(row) => {
                if let Some(tc) = &row.termcap {
                    resolved
                        .termcap
                        .entry(tc.clone())
                        .or_insert_with(|| cap.clone());
                }
                resolved
                    .variable
                    .entry(row.variable.clone())
                    .or_insert_with(|| cap.clone());
            }
            None => {
                if table.is_some() {
                    log::trace!("capability \"{}\" has no translation", cap.name);
                }
            }
        }
        resolved.terminfo.entry(cap.name.clone()).or_insert(cap);
    }

    // synthetic variables: they live in the variable index only
    for (pseudo, source) in [
        ("PC", "pad_char"),
        ("UP", "cursor_up"),
        ("BC", "backspace_if_not_bs"),
    ] {
        if let Some(CapValue::String(value)) = resolved.variable.get(source).map(|c| &c.value) {
            let value = value.clone();
            resolved.variable.insert(
                pseudo.to_string(),
                Capability {
                    name: pseudo.to_string(),
                    value: CapValue::String(value),
                },
            );
        }
    }
    for (pseudo, value) in [("ospeed", ospeed), ("baudrate", baudrate)] {
        resolved.variable.insert(
            pseudo.to_string(),
            Capability {
                name: pseudo.to_string(),
                value: CapValue::Numeric(value),
            },
        );
    }

    Ok(resolved)
}

fn check_cycles(db: &Database, entry: &Entry) -> Result<(), Error> {
    let mut active: HashSet<String> = HashSet::new();
    active.insert(entry.primary().to_string());
    visit(db, entry, &mut active)
}

fn visit(db: &Database, entry: &Entry, active: &mut HashSet<String>) -> Result<(), Error> {
    for cap in &entry.caps {
        if cap.name != "use" {
            continue;
        }
        let target = match &cap.value {
            CapValue::String(s) => s,
            _ => continue,
        };
        let other = db
            .lookup(target)
            .ok_or_else(|| Error::TerminalNotFound(target.clone()))?;
        if !active.insert(other.primary().to_string()) {
            return Err(Error::CyclicUse(target.clone()));
        }
        visit(db, other, active)?;
        active.remove(other.primary());
    }
    Ok(())
}

impl ResolvedEntry {
    pub fn flag_terminfo(&self, name: &str) -> Int {
        Self::flag(&self.terminfo, &self.cancellations, name)
    }

    pub fn flag_termcap(&self, name: &str) -> Int {
        Self::flag(&self.termcap, &self.cancellations, name)
    }

    pub fn flag_variable(&self, name: &str) -> Int {
        Self::flag(&self.variable, &self.cancellations, name)
    }

    pub fn number_terminfo(&self, name: &str) -> Int {
        Self::number(&self.terminfo, &self.cancellations, name)
    }

    pub fn number_termcap(&self, name: &str) -> Int {
        Self::number(&self.termcap, &self.cancellations, name)
    }

    pub fn number_variable(&self, name: &str) -> Int {
        Self::number(&self.variable, &self.cancellations, name)
    }

    pub fn string_terminfo(&self, name: &str) -> StringQuery<'_> {
        Self::string(&self.terminfo, &self.cancellations, name)
    }

    pub fn string_termcap(&self, name: &str) -> StringQuery<'_> {
        Self::string(&self.termcap, &self.cancellations, name)
    }

    pub fn string_variable(&self, name: &str) -> StringQuery<'_> {
        Self::string(&self.variable, &self.cancellations, name)
    }

    /// 1 set, 0 absent or cancelled, -1 wrong type.
    fn flag(map: &HashMap<String, Capability>, cancels: &HashSet<String>, name: &str) -> Int {
        if cancels.contains(name) {
            return 0;
        }
        match map.get(name).map(|c| &c.value) {
            Some(CapValue::Boolean(b)) => Int::from(*b),
            Some(_) => -1,
            None => 0,
        }
    }

    /// The value, -1 absent or cancelled, -2 wrong type.
    fn number(map: &HashMap<String, Capability>, cancels: &HashSet<String>, name: &str) -> Int {
        if cancels.contains(name) {
            return -1;
        }
        match map.get(name).map(|c| &c.value) {
            Some(CapValue::Numeric(n)) => *n,
            Some(_) => -2,
            None => -1,
        }
    }

    fn string<'a>(
        map: &'a HashMap<String, Capability>,
        cancels: &HashSet<String>,
        name: &str,
    ) -> StringQuery<'a> {
        if cancels.contains(name) {
            return StringQuery::Absent;
        }
        match map.get(name).map(|c| &c.value) {
            Some(CapValue::String(s)) => StringQuery::Found(s),
            Some(_) => StringQuery::WrongType,
            None => StringQuery::Absent,
        }
    }
}
