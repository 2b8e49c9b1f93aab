//! Restricted guest environment.
//!
//! A fresh engine per instance with only the `table`, `string`, `math` and
//! `utf8` libraries. Everything that can load code, touch the process, or
//! outlive a call is removed or wrapped before guest source runs.

use crate::allocation::AllocationWatch;
use crate::instance::InstanceId;
use crate::interrupt::{Trip, TripCell};
use mlua::{Lua, LuaOptions, StdLib, Value, Variadic};
use resources::SandboxLimits;

/// Base-library globals a guest must not reach
const REMOVED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "collectgarbage", "require"];

/// Longest guest `print` line forwarded to the log
const MAX_PRINT_LEN: usize = 1024;

/// Work ceiling for one plain `string.find`, in byte comparisons
pub(crate) const MAX_FIND_WORK: i64 = 1 << 26;

/// Longest list `table.sort` accepts
pub(crate) const MAX_SORT_LEN: i64 = 1 << 15;

/// Widest index range the other bulk table functions accept
pub(crate) const MAX_BULK_LEN: i64 = 1 << 20;

/// Runs once per instance, before guest code.
///
/// `pcall`/`xpcall` rethrow whatever the host guard flags (interrupts and
/// ceiling breaches), so guest error handling cannot swallow them. `__gc`
/// metamethods are refused because finalizers may run outside any armed
/// call. The string pattern functions are reduced to plain `find`: the
/// backtracking matcher runs as a single VM instruction and cannot be
/// interrupted. For the same reason the library loops that run without
/// returning to the VM get their operands capped before they start.
const PRELUDE: &str = r#"
local guard, caps = __sandbox_guard, __sandbox_caps
__sandbox_guard, __sandbox_caps = nil, nil

local raw_pcall, raw_xpcall, raw_setmetatable = pcall, xpcall, setmetatable
local error, rawget, tonumber, tostring, type = error, rawget, tonumber, tostring, type
local math_min = math.min
local raw_find, raw_rep = string.find, string.rep
local raw_sort, raw_move, raw_concat = table.sort, table.move, table.concat
local raw_insert, raw_remove = table.insert, table.remove

local function checked(ok, ...)
  if not ok and guard() then
    error((...), 0)
  end
  return ok, ...
end

pcall = function(f, ...)
  return checked(raw_pcall(f, ...))
end

xpcall = function(f, handler, ...)
  return checked(raw_xpcall(f, handler, ...))
end

setmetatable = function(t, mt)
  if type(mt) == "table" and rawget(mt, "__gc") ~= nil then
    error("__gc metamethods are not available", 2)
  end
  return raw_setmetatable(t, mt)
end

local function too_large(name)
  error(name .. ": operands too large", 3)
end

local function length(v)
  local kind = type(v)
  if kind == "string" then return #v end
  if kind == "number" then return #tostring(v) end
  return 0
end

local function span(first, last)
  if type(first) ~= "number" or type(last) ~= "number" then return 0 end
  return (last + 0.0) - first
end

string.find = function(s, text, init)
  local ls, lt = length(s), length(text)
  if lt > 1 and ls >= lt and (ls - lt + 1) * lt > caps.find then
    too_large("find")
  end
  return raw_find(s, text, init, true)
end
string.match = nil
string.gmatch = nil
string.gsub = nil
string.dump = nil

string.rep = function(s, n, sep)
  local count = tonumber(n)
  if s == "" and (sep == nil or sep == "") and count then
    return raw_rep(s, math_min(count, 1), sep)
  end
  return raw_rep(s, n, sep)
end

table.sort = function(t, comp)
  if type(t) == "table" and #t > caps.sort then
    too_large("sort")
  end
  return raw_sort(t, comp)
end

table.move = function(a1, f, e, t, a2)
  if span(f, e) >= caps.bulk then
    too_large("move")
  end
  return raw_move(a1, f, e, t, a2)
end

table.concat = function(list, sep, i, j)
  local last = j
  if last == nil and type(list) == "table" then last = #list end
  if span(i or 1, last) >= caps.bulk then
    too_large("concat")
  end
  return raw_concat(list, sep, i, j)
end

table.insert = function(t, ...)
  if type(t) == "table" and #t >= caps.bulk then
    too_large("insert")
  end
  return raw_insert(t, ...)
end

table.remove = function(t, ...)
  if type(t) == "table" and #t >= caps.bulk then
    too_large("remove")
  end
  return raw_remove(t, ...)
end
"#;

fn describe(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

/// A configured engine and the watch on its allocator
pub(crate) struct Engine {
    pub lua: Lua,
    pub allocations: AllocationWatch,
}

/// Creates the engine for one instance with limits and restrictions applied
pub(crate) fn create_engine(
    limits: &SandboxLimits,
    trip: TripCell,
    instance: InstanceId,
) -> mlua::Result<Engine> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
        LuaOptions::default(),
    )?;
    lua.set_memory_limit(limits.memory.as_usize())?;
    let allocations = AllocationWatch::install(&lua)?;

    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
        globals.raw_set(*name, Value::Nil)?;
    }

    let print = lua.create_function(move |_, args: Variadic<Value>| {
        let mut line = args.iter().map(describe).collect::<Vec<_>>().join("\t");
        if line.len() > MAX_PRINT_LEN {
            let mut cut = MAX_PRINT_LEN;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
        }
        tracing::info!(target: "guest", instance = %instance, "{}", line);
        Ok(())
    })?;
    globals.raw_set("print", print)?;

    // only engine state decides; the caught error value is never inspected
    let refusal = allocations.refusal();
    let guard = lua.create_function(move |_, ()| {
        let mut tripped = trip.borrow_mut();
        if tripped.is_none() && refusal.take().is_some() {
            *tripped = Some(Trip::Memory);
        }
        Ok(tripped.is_some())
    })?;
    globals.raw_set("__sandbox_guard", guard)?;

    let caps = lua.create_table()?;
    caps.raw_set("find", MAX_FIND_WORK)?;
    caps.raw_set("sort", MAX_SORT_LEN)?;
    caps.raw_set("bulk", MAX_BULK_LEN)?;
    globals.raw_set("__sandbox_caps", caps)?;

    lua.load(PRELUDE).set_name("=sandbox").exec()?;
    Ok(Engine { lua, allocations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine() -> (Engine, TripCell) {
        let trip: TripCell = Rc::new(RefCell::new(None));
        let engine =
            create_engine(&SandboxLimits::default(), trip.clone(), InstanceId::new()).unwrap();
        (engine, trip)
    }

    #[test]
    fn test_dangerous_globals_removed() {
        let (engine, _) = engine();
        let missing: bool = engine
            .lua
            .load(
                "return load == nil and dofile == nil and loadfile == nil \
                 and collectgarbage == nil and require == nil and io == nil \
                 and os == nil and debug == nil and coroutine == nil \
                 and package == nil and string.dump == nil",
            )
            .eval()
            .unwrap();
        assert!(missing);
    }

    #[test]
    fn test_safe_libraries_available() {
        let (engine, _) = engine();
        let out: String = engine
            .lua
            .load(
                "local t = {3, 1, 2} table.sort(t) \
                 table.insert(t, 4) table.remove(t, 1) \
                 return string.format('%d-%d-%d', t[1], t[2], math.floor(t[3] + 0.5)) \
                 .. utf8.char(33) .. table.concat({'a', 'b'}, ',') .. ('ab'):rep(2, '-')",
            )
            .eval()
            .unwrap();
        assert_eq!(out, "2-3-4!a,bab-ab");
    }

    #[test]
    fn test_sandbox_globals_removed() {
        let (engine, _) = engine();
        let gone: bool = engine
            .lua
            .load("return __sandbox_guard == nil and __sandbox_caps == nil")
            .eval()
            .unwrap();
        assert!(gone);
    }

    #[test]
    fn test_pcall_still_catches_ordinary_errors() {
        let (engine, trip) = engine();
        let (ok, msg): (bool, String) = engine
            .lua
            .load("local ok, err = pcall(error, 'boom', 0) return ok, err")
            .eval()
            .unwrap();
        assert!(!ok);
        assert_eq!(msg, "boom");
        assert!(trip.borrow().is_none());
    }

    #[test]
    fn test_pcall_keeps_error_values() {
        let (engine, _) = engine();
        let code: i64 = engine
            .lua
            .load("local ok, err = pcall(error, { code = 7 }) return err.code")
            .eval()
            .unwrap();
        assert_eq!(code, 7);
        let handled: String = engine
            .lua
            .load("local ok, err = xpcall(error, function(e) return 'handled ' .. e end, 'x', 0) return err")
            .eval()
            .unwrap();
        assert_eq!(handled, "handled x");
    }

    #[test]
    fn test_breach_text_in_guest_errors_is_ordinary() {
        let (engine, trip) = engine();
        let (ok, msg): (bool, String) = engine
            .lua
            .load(
                "local a = pcall(error, 'not enough memory', 0) \
                 local b = pcall(assert, false, 'stack overflow') \
                 local c, msg = pcall(error, 'player fell into stack overflow pit', 0) \
                 return a or b or c, msg",
            )
            .eval()
            .unwrap();
        assert!(!ok);
        assert_eq!(msg, "player fell into stack overflow pit");
        assert!(trip.borrow().is_none());
    }

    #[test]
    fn test_pcall_rethrows_refused_allocation() {
        let (engine, trip) = engine();
        let result = engine
            .lua
            .load("local ok = pcall(string.rep, 'x', 64 * 1024 * 1024) return ok")
            .exec();
        assert!(result.is_err());
        assert_eq!(*trip.borrow(), Some(Trip::Memory));
    }

    #[test]
    fn test_gc_metamethods_refused() {
        let (engine, _) = engine();
        let result = engine
            .lua
            .load("setmetatable({}, { __gc = function() while true do end end })")
            .exec();
        assert!(result.is_err());
        let plain: bool = engine
            .lua
            .load("return getmetatable(setmetatable({}, { __index = {} })) ~= nil")
            .eval()
            .unwrap();
        assert!(plain);
    }

    #[test]
    fn test_string_find_is_plain() {
        let (engine, _) = engine();
        let pos: i64 = engine.lua.load("return ('a.b'):find('.', 1)").eval().unwrap();
        assert_eq!(pos, 2);
        let gone: bool = engine.lua.load("return string.gsub == nil").eval().unwrap();
        assert!(gone);
    }

    #[test]
    fn test_find_work_is_capped() {
        let (engine, _) = engine();
        let (ok, msg): (bool, String) = engine
            .lua
            .load(
                "local s = string.rep('a', 1 << 20) \
                 return pcall(string.find, s, string.rep('a', 4096) .. 'b')",
            )
            .eval()
            .unwrap();
        assert!(!ok);
        assert!(msg.contains("find: operands too large"), "{msg}");

        let missing: bool = engine
            .lua
            .load("return string.rep('a', 1 << 20):find('aab') == nil")
            .eval()
            .unwrap();
        assert!(missing);
    }

    #[test]
    fn test_empty_rep_returns_at_once() {
        let (engine, _) = engine();
        let out: String = engine
            .lua
            .load("return string.rep('', math.maxinteger) .. ('').rep('', 1e18, '')")
            .eval()
            .unwrap();
        assert_eq!(out, "");
        let kept: String = engine.lua.load("return string.rep('', 3, '-')").eval().unwrap();
        assert_eq!(kept, "--");
    }

    #[test]
    fn test_bulk_table_calls_capped() {
        let (engine, _) = engine();
        let refused: bool = engine
            .lua
            .load(&format!(
                "local t = {{}} for i = 1, {} do t[i] = i end \
                 local long = setmetatable({{}}, {{ __len = function() return math.maxinteger - 1 end }}) \
                 return not pcall(table.sort, t) \
                 and not pcall(table.move, {{}}, 1, math.maxinteger, 2) \
                 and not pcall(table.concat, {{}}, '', 1, math.maxinteger) \
                 and not pcall(table.insert, long, 1, 'x') \
                 and not pcall(table.remove, long, 1)",
                MAX_SORT_LEN + 1
            ))
            .eval()
            .unwrap();
        assert!(refused);
    }
}
