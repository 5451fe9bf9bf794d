use std::path::Path;

use mlua::prelude::*;

use crate::lua::globals;

/// Create a new Lua runtime with the `ic` globals registered.
pub fn create_runtime() -> LuaResult<Lua> {
  let lua = Lua::new();
  globals::register_globals(&lua)?;
  Ok(lua)
}

/// Evaluate a brick chunk and return the function it yields.
pub fn load_chunk(lua: &Lua, source: &str, chunk_name: &str) -> LuaResult<LuaFunction> {
  match lua.load(source).set_name(chunk_name).eval::<LuaValue>()? {
    LuaValue::Function(func) => Ok(func),
    other => Err(LuaError::external(format!(
      "brick chunk '{}' must return a function, got {}",
      chunk_name,
      other.type_name()
    ))),
  }
}

/// Load a brick file. Its directory is prepended to `package.path` so the
/// brick can `require` sibling modules.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<LuaFunction> {
  let canonical_path = path
    .canonicalize()
    .map_err(|e| LuaError::external(format!("cannot canonicalize '{}': {}", path.display(), e)))?;
  let content = std::fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;

  if let Some(dir) = canonical_path.parent() {
    let package = lua.globals().get::<LuaTable>("package")?;
    let package_path = package.get::<String>("path")?;
    package.set(
      "path",
      format!("{}/?.lua;{}/?/init.lua;{}", dir.display(), dir.display(), package_path),
    )?;
  }

  load_chunk(lua, &content, &format!("@{}", canonical_path.display()))
}
