// ABOUTME: Registry of safe, pre-approved container runtime profiles
// ABOUTME: The single source of truth for what a runtime may contain and execute

use botdock_models::BotRuntime;
use botdock_security::split_extension;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Unsupported runtime: {0}")]
    Unsupported(String),
}

/// Immutable descriptor of one execution profile.
///
/// No code path may construct containers or accept files for a runtime
/// except through the values published here.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub image: &'static str,
    pub working_dir: &'static str,
    pub default_start: &'static str,
    pub build_cmd: &'static str,
    pub allowed_extensions: &'static [&'static str],
}

const PYTHON: RuntimeConfig = RuntimeConfig {
    image: "python:3.11-slim",
    working_dir: "/app",
    default_start: "python main.py",
    build_cmd: "pip install --no-cache-dir -r requirements.txt",
    allowed_extensions: &[".py", ".txt", ".json", ".yaml", ".yml"],
};

// .ts is accepted without a transpile step; bots relying on it must bring a
// runner that understands TypeScript (e.g. via their package.json)
const NODE: RuntimeConfig = RuntimeConfig {
    image: "node:20-alpine",
    working_dir: "/app",
    default_start: "node index.js",
    build_cmd: "npm install",
    allowed_extensions: &[".js", ".json", ".ts"],
};

/// Descriptor for a registered runtime. Total over the enum, so callers
/// holding a parsed `BotRuntime` cannot miss.
pub fn runtime_config(runtime: BotRuntime) -> &'static RuntimeConfig {
    match runtime {
        BotRuntime::Python => &PYTHON,
        BotRuntime::Node => &NODE,
    }
}

/// Resolve a raw runtime tag. Unknown tags fail with `Unsupported`.
pub fn lookup(tag: &str) -> Result<(BotRuntime, &'static RuntimeConfig), RuntimeError> {
    let runtime =
        BotRuntime::from_str(tag).map_err(|_| RuntimeError::Unsupported(tag.to_string()))?;
    Ok((runtime, runtime_config(runtime)))
}

/// Whether a filename's extension is acceptable for the runtime.
///
/// `require_extension` distinguishes single-file ingest (the one file must
/// be recognizable) from archive members (extension-less files such as
/// dotfiles pass).
pub fn extension_allowed(config: &RuntimeConfig, filename: &str, require_extension: bool) -> bool {
    let (_, ext) = split_extension(filename);
    if ext.is_empty() {
        return !require_extension;
    }
    config.allowed_extensions.contains(&ext)
}
