//! The public face of the library: load a database and translation table,
//! select a terminal, query capabilities, expand parameterized strings, and
//! apply padding delays.

use crate::padding;
use crate::vm::{VarBank, Value};
use crate::{
    compile, parse_database, resolve, speed, CapTable, CompiledString, Database, Error, Int,
    ResolvedEntry, StringQuery,
};

use json::JsonValue;
use lru::LruCache;

use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

pub const ENV_DATABASE_FILE: &str = "MARPAX_DATABASE_TERMINFO_FILE";
pub const ENV_DATABASE_TXT: &str = "MARPAX_DATABASE_TERMINFO_TXT";
pub const ENV_DATABASE_BIN: &str = "MARPAX_DATABASE_TERMINFO_BIN";
pub const ENV_CAPS: &str = "MARPAX_DATABASE_TERMINFO_CAPS";
pub const ENV_STUBS_TXT: &str = "MARPAX_DATABASE_TERMINFO_STUBS_TXT";
pub const ENV_STUBS_BIN: &str = "MARPAX_DATABASE_TERMINFO_STUBS_BIN";
pub const ENV_CACHE_STUBS: &str = "MARPAX_DATABASE_TERMINFO_CACHE_STUBS";
pub const ENV_CACHE_STUBS_AS_TXT: &str = "MARPAX_DATABASE_TERMINFO_CACHE_STUBS_AS_TXT";
pub const ENV_TERM: &str = "TERM";
pub const ENV_OSPEED: &str = "TERMINFO_OSPEED";
pub const ENV_BAUDRATE: &str = "TERMINFO_BAUDRATE";

const CACHE_CAPACITY: usize = 256;

/// Construction-time configuration. Every field mirrors one environment
/// variable; [`Options::from_env`] reads them all, and explicit fields set
/// afterwards override. [`Runtime::with_options`] itself never consults the
/// environment.
#[derive(Debug, Clone)]
pub struct Options {
    pub database_file: Option<PathBuf>,
    pub database_text: Option<String>,
    pub database_blob: Option<PathBuf>,
    pub caps_file: Option<PathBuf>,
    pub stubs_text: Option<PathBuf>,
    pub stubs_blob: Option<PathBuf>,
    pub cache_stubs: bool,
    pub cache_as_text: bool,
    pub term: Option<String>,
    pub ospeed: Option<Int>,
    pub baudrate: Option<Int>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            database_file: None,
            database_text: None,
            database_blob: None,
            caps_file: None,
            stubs_text: None,
            stubs_blob: None,
            cache_stubs: true,
            cache_as_text: false,
            term: None,
            ospeed: None,
            baudrate: None,
        }
    }
}

impl Options {
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.database_file = env::var_os(ENV_DATABASE_FILE).map(PathBuf::from);
        options.database_text = env::var(ENV_DATABASE_TXT).ok();
        options.database_blob = env::var_os(ENV_DATABASE_BIN).map(PathBuf::from);
        options.caps_file = env::var_os(ENV_CAPS).map(PathBuf::from);
        options.stubs_text = env::var_os(ENV_STUBS_TXT).map(PathBuf::from);
        options.stubs_blob = env::var_os(ENV_STUBS_BIN).map(PathBuf::from);
        if let Ok(value) = env::var(ENV_CACHE_STUBS) {
            options.cache_stubs = truthy(&value);
        }
        if let Ok(value) = env::var(ENV_CACHE_STUBS_AS_TXT) {
            options.cache_as_text = truthy(&value);
        }
        options.term = env::var(ENV_TERM).ok();
        options.ospeed = env::var(ENV_OSPEED).ok().and_then(|v| v.parse().ok());
        options.baudrate = env::var(ENV_BAUDRATE).ok().and_then(|v| v.parse().ok());
        options
    }
}

fn truthy(value: &str) -> bool {
    !matches!(value, "" | "0" | "false" | "no")
}

/// A caller-visible scratch buffer with a write cursor: strings returned by
/// [`Runtime::get_string_termcap`] splice in at the cursor and advance it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Area {
    buf: String,
    pos: usize,
}

impl Area {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn append(&mut self, s: &str) {
        self.buf.insert_str(self.pos, s);
        self.pos += s.len();
    }
}

/// Outcome of [`Runtime::select_terminal`], `code()` giving the classic
/// tgetent values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Selection {
    DatabaseUnavailable,
    NotFound,
    Selected,
}

impl Selection {
    pub fn code(self) -> Int {
        match self {
            Self::DatabaseUnavailable => -1,
            Self::NotFound => 0,
            Self::Selected => 1,
        }
    }
}

pub struct Runtime {
    db: Option<Database>,
    caps: Option<CapTable>,
    current: Option<ResolvedEntry>,
    cache: LruCache<String, Rc<CompiledString>>,
    cache_enabled: bool,
    cache_as_text: bool,
    term_default: Option<String>,
    ospeed_override: Option<Int>,
    baudrate_override: Option<Int>,
    ospeed: Int,
    baudrate: Int,
    flush: Option<Box<dyn FnMut()>>,
    sleep: Box<dyn FnMut(Duration)>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Build a runtime from the process environment.
    pub fn new() -> Self {
        Self::with_options(Options::from_env())
    }

    pub fn with_options(options: Options) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        let mut runtime = Runtime {
            db: None,
            caps: None,
            current: None,
            cache: LruCache::new(capacity),
            cache_enabled: options.cache_stubs,
            cache_as_text: options.cache_as_text,
            term_default: options.term.clone(),
            ospeed_override: options.ospeed,
            baudrate_override: options.baudrate,
            ospeed: 0,
            baudrate: 0,
            flush: None,
            sleep: Box::new(std::thread::sleep),
        };

        // text file > inline text > blob
        let loaded = if let Some(path) = &options.database_file {
            runtime.load_database_file(path)
        } else if let Some(text) = &options.database_text {
            runtime.load_database_text(text)
        } else if let Some(path) = &options.database_blob {
            runtime.load_database_blob(path)
        } else {
            Ok(())
        };
        if let Err(err) = loaded {
            log::warn!("could not load the terminal database: {}", err);
        }

        if let Some(path) = &options.caps_file {
            if let Err(err) = runtime.load_translation(path) {
                log::warn!("could not load the translation table: {}", err);
            }
        }

        if runtime.cache_enabled {
            let stubs = if runtime.cache_as_text {
                [&options.stubs_text, &options.stubs_blob]
            } else {
                [&options.stubs_blob, &options.stubs_text]
            };
            for (path, as_text) in stubs
                .into_iter()
                .zip([runtime.cache_as_text, !runtime.cache_as_text])
            {
                if let Some(path) = path {
                    let result = if as_text {
                        runtime.load_stubs_text(path)
                    } else {
                        runtime.load_stubs_blob(path)
                    };
                    if let Err(err) = result {
                        log::warn!("could not load compiled-string stubs: {}", err);
                    }
                    break;
                }
            }
        }

        runtime
    }

    pub fn load_database_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let text = fs::read_to_string(path)?;
        self.load_database_text(&text)
    }

    pub fn load_database_text(&mut self, text: &str) -> Result<(), Error> {
        self.db = Some(parse_database(text)?);
        self.current = None;
        Ok(())
    }

    pub fn load_database_blob<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let bytes = fs::read(path)?;
        self.db = Some(Database::from_blob(&bytes)?);
        self.current = None;
        Ok(())
    }

    pub fn load_translation<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        self.caps = Some(CapTable::from_path(path)?);
        Ok(())
    }

    pub fn load_translation_text(&mut self, text: &str) {
        self.caps = Some(CapTable::parse(text));
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    pub fn current(&self) -> Option<&ResolvedEntry> {
        self.current.as_ref()
    }

    pub fn ospeed(&self) -> Int {
        self.ospeed
    }

    pub fn baudrate(&self) -> Int {
        self.baudrate
    }

    /// Select the current terminal. With no `name`, the configured `TERM`
    /// applies; with neither, `"unknown"` is tried and then `"dumb"`.
    /// `fd` names the terminal used for the output-speed query.
    pub fn select_terminal(&mut self, name: Option<&str>, fd: Option<i32>) -> Selection {
        let db = match &self.db {
            Some(db) => db,
            None => return Selection::DatabaseUnavailable,
        };

        let ospeed = match self.ospeed_override {
            Some(code) if speed::valid_ospeed(code) => code,
            Some(code) => {
                log::warn!("ignoring out-of-range ospeed override {}", code);
                speed::ospeed_from_fd(fd.unwrap_or(0)).unwrap_or(0)
            }
            None => speed::ospeed_from_fd(fd.unwrap_or(0)).unwrap_or(0),
        };
        let baudrate = self
            .baudrate_override
            .unwrap_or_else(|| speed::baudrate_for_ospeed(ospeed));

        let (candidate, defaulted) = match (name, &self.term_default) {
            (Some(n), _) => (n.to_string(), false),
            (None, Some(term)) => (term.clone(), false),
            (None, None) => ("unknown".to_string(), true),
        };

        let mut outcome = resolve(db, self.caps.as_ref(), &candidate, ospeed, baudrate);
        if outcome.is_err() && defaulted {
            outcome = resolve(db, self.caps.as_ref(), "dumb", ospeed, baudrate);
        }
        match outcome {
            Ok(entry) => {
                self.current = Some(entry);
                self.ospeed = ospeed;
                self.baudrate = baudrate;
                Selection::Selected
            }
            Err(Error::TerminalNotFound(_)) => Selection::NotFound,
            Err(err) => {
                log::warn!("could not resolve \"{}\": {}", candidate, err);
                Selection::NotFound
            }
        }
    }

    pub fn get_flag_termcap(&self, id: &str) -> bool {
        self.current
            .as_ref()
            .map(|e| e.flag_termcap(id) == 1)
            .unwrap_or(false)
    }

    pub fn get_flag_terminfo(&self, id: &str) -> Int {
        self.current
            .as_ref()
            .map(|e| e.flag_terminfo(id))
            .unwrap_or(0)
    }

    pub fn get_flag_variable(&self, id: &str) -> Int {
        self.current
            .as_ref()
            .map(|e| e.flag_variable(id))
            .unwrap_or(0)
    }

    pub fn get_number_termcap(&self, id: &str) -> Int {
        match self.current.as_ref().map(|e| e.number_termcap(id)) {
            // the termcap interface has a single "no" answer
            Some(-2) | None => -1,
            Some(n) => n,
        }
    }

    pub fn get_number_terminfo(&self, id: &str) -> Int {
        self.current
            .as_ref()
            .map(|e| e.number_terminfo(id))
            .unwrap_or(-1)
    }

    pub fn get_number_variable(&self, id: &str) -> Int {
        self.current
            .as_ref()
            .map(|e| e.number_variable(id))
            .unwrap_or(-1)
    }

    /// Returns the raw capability value; with an `area`, the value is also
    /// spliced in at the area's cursor, advancing it.
    pub fn get_string_termcap(&self, id: &str, area: Option<&mut Area>) -> Option<&str> {
        let value = self.current.as_ref()?.string_termcap(id).ok()?;
        if let Some(area) = area {
            area.append(value);
        }
        Some(value)
    }

    pub fn get_string_terminfo(&self, id: &str) -> StringQuery<'_> {
        match &self.current {
            Some(entry) => entry.string_terminfo(id),
            None => StringQuery::Absent,
        }
    }

    pub fn get_string_variable(&self, id: &str) -> StringQuery<'_> {
        match &self.current {
            Some(entry) => entry.string_variable(id),
            None => StringQuery::Absent,
        }
    }

    /// Compile (through the cache) and evaluate a capability string. The
    /// static bank of the current terminal persists across calls; the
    /// dynamic bank starts empty on every call.
    pub fn expand(&mut self, source: &str, params: &[Value]) -> Result<Vec<u8>, Error> {
        let compiled = self.compiled(source)?;
        match &mut self.current {
            Some(ResolvedEntry {
                dynamics, statics, ..
            }) => {
                dynamics.clear();
                Ok(compiled.eval(params, dynamics, statics))
            }
            None => {
                let mut dynamics = VarBank::default();
                let mut statics = VarBank::default();
                Ok(compiled.eval(params, &mut dynamics, &mut statics))
            }
        }
    }

    fn compiled(&mut self, source: &str) -> Result<Rc<CompiledString>, Error> {
        if !self.cache_enabled {
            return Ok(Rc::new(compile(source)?));
        }
        if let Some(hit) = self.cache.get(source) {
            return Ok(hit.clone());
        }
        let compiled = Rc::new(compile(source)?);
        self.cache.put(source.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Warm the compiled-string cache from a text stub file, one capability
    /// string per line.
    pub fn load_stubs_text<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let text = fs::read_to_string(path)?;
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            if let Err(err) = self.compiled(line) {
                log::warn!("stub \"{}\" does not compile: {}", line, err);
            }
        }
        Ok(())
    }

    /// Warm the compiled-string cache from a JSON stub file (an array of
    /// capability strings).
    pub fn load_stubs_blob<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let text = fs::read_to_string(path)?;
        let value = json::parse(&text).map_err(|_| Error::DatabaseUnavailable)?;
        for member in value.members() {
            if let Some(source) = member.as_str() {
                let source = source.to_string();
                if let Err(err) = self.compiled(&source) {
                    log::warn!("stub \"{}\" does not compile: {}", source, err);
                }
            }
        }
        Ok(())
    }

    /// Persist the cache keys. Compilation is deterministic, so the sources
    /// alone reproduce the cache on the next run.
    pub fn save_stubs<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut sources: Vec<&str> = self.cache.iter().map(|(k, _)| k.as_str()).collect();
        sources.sort_unstable();
        let contents = if self.cache_as_text {
            let mut text = sources.join("\n");
            text.push('\n');
            text
        } else {
            JsonValue::Array(sources.into_iter().map(JsonValue::from).collect()).dump()
        };
        fs::write(path, contents)?;
        Ok(())
    }

    /// Register a callback run whenever padding flushes buffered output.
    pub fn set_flush(&mut self, callback: impl FnMut() + 'static) {
        self.flush = Some(Box::new(callback));
    }

    /// Replace the delay implementation (the default really sleeps).
    pub fn set_sleep(&mut self, callback: impl FnMut(Duration) + 'static) {
        self.sleep = Box::new(callback);
    }

    /// Emit an expanded string byte by byte, honoring `$<…>` padding.
    /// Delays either really sleep (no pad char, or `npc` set) or emit the
    /// right number of PC bytes for the selected baudrate; either way a 0x00
    /// marker closes the delay.
    pub fn apply_padding(&mut self, bytes: &[u8], affected_lines: Int, emit: &mut dyn FnMut(u8)) {
        let pad_byte = self.current.as_ref().and_then(pad_char);
        let no_pad = self
            .current
            .as_ref()
            .map(|e| e.flag_variable("no_pad_char") == 1 || e.flag_terminfo("npc") == 1)
            .unwrap_or(false);

        let mut rest = bytes;
        while let Some(&byte) = rest.first() {
            if byte == b'$' && rest.get(1) == Some(&b'<') {
                match padding::directive(rest) {
                    Ok((after, pad)) => {
                        let mut tenths = pad.tenths_ms;
                        if pad.proportional {
                            tenths = tenths.saturating_mul(affected_lines.max(0));
                        }
                        if tenths > 0 {
                            let count = tenths.saturating_mul(self.baudrate) / (9 * 1000 * 10);
                            match (no_pad, pad_byte) {
                                (false, Some(pc)) if count > 0 || !pad.mandatory => {
                                    for _ in 0..count {
                                        emit(pc);
                                    }
                                    emit(0);
                                    if let Some(flush) = self.flush.as_mut() {
                                        flush();
                                    }
                                }
                                _ => {
                                    if let Some(flush) = self.flush.as_mut() {
                                        flush();
                                    }
                                    (self.sleep)(Duration::from_micros(tenths as u64 * 100));
                                    emit(0);
                                }
                            }
                        }
                        rest = after;
                        continue;
                    }
                    Err(_) => {
                        log::warn!("malformed padding directive; skipped");
                        let skip = rest
                            .iter()
                            .position(|&b| b == b'>')
                            .map(|p| p + 1)
                            .unwrap_or(2);
                        rest = &rest[skip..];
                        continue;
                    }
                }
            }
            emit(byte);
            rest = &rest[1..];
        }
    }
}

fn pad_char(entry: &ResolvedEntry) -> Option<u8> {
    let raw = entry.string_variable("PC").ok()?;
    crate::escapes::unescape(raw).first().copied()
}
