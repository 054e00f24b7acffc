use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use bootbin::global::cache::clean_cache;
use bootbin::{builtin, builtin_names, cache_root_for, get_user_base_dir, BootstrapResolver, CancelToken, Installer, Lookup, NoInstall, PathLookup, ReleaseInstaller, Resolution, SearchPath, ToolSpec};
use crate::cli::{BootbinCommand, ToolArgs, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    match cli.command {
        BootbinCommand::Ensure { tool, json, offline } => {
            let cancel = cancel_token(cli.timeout)?;
            execute_ensure(&tool, base_dir(cli.base_dir)?, &cancel, json, offline)
        }
        BootbinCommand::Which { name } => {
            execute_which(&name)
        }
        BootbinCommand::Run { tool, args } => {
            let cancel = cancel_token(cli.timeout)?;
            execute_run(&tool, base_dir(cli.base_dir)?, &cancel, args)
        }
        BootbinCommand::Clean { tool } => {
            execute_clean(&tool, base_dir(cli.base_dir)?)
        }
        BootbinCommand::Tools => {
            execute_tools()
        }
    }
}

fn base_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match flag {
        Some(dir) => dir,
        None => get_user_base_dir()?,
    };
    std::path::absolute(&dir)
        .with_context(|| format!("Invalid base directory {}", dir.display()))
}

/// Token tripped by Ctrl-C, bounded by `--timeout` when given.
///
/// A second Ctrl-C exits right away with status 130.
fn cancel_token(timeout: Option<u64>) -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        handler_token.cancel();
    })
    .context("Could not install Ctrl-C handler")?;
    Ok(match timeout {
        Some(secs) => cancel.with_timeout(Duration::from_secs(secs)),
        None => cancel,
    })
}

fn load_tool(args: &ToolArgs) -> Result<ToolSpec> {
    let spec = match (&args.name, &args.file) {
        (_, Some(file)) => ToolSpec::load(file)?,
        (Some(name), None) => builtin(name).ok_or_else(|| {
            anyhow!("Unknown tool: {}. Built-in tools: {}", name, builtin_names().join(", "))
        })?,
        (None, None) => bail!("Either a tool name or --file is required"),
    };
    match &args.pin {
        Some(version) => spec.with_version(version),
        None => Ok(spec),
    }
}

fn resolve(spec: &ToolSpec, base_dir: PathBuf, cancel: &CancelToken, offline: bool) -> Result<Resolution> {
    let installer: Box<dyn Installer> = if offline {
        Box::new(NoInstall)
    } else {
        Box::new(ReleaseInstaller::new())
    };
    let resolver = BootstrapResolver::new(SearchPath::from_env(), installer, base_dir);
    Ok(resolver.resolve(spec, cancel)?)
}

#[derive(Serialize)]
struct EnsureOutput<'a> {
    name: &'a str,
    #[serde(flatten)]
    resolution: &'a Resolution,
}

pub fn execute_ensure(tool: &ToolArgs, base_dir: PathBuf, cancel: &CancelToken, json: bool, offline: bool) -> Result<()> {
    let spec = load_tool(tool)?;
    let resolution = resolve(&spec, base_dir, cancel, offline)?;
    if json {
        let output = EnsureOutput { name: spec.name(), resolution: &resolution };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", resolution.executable_path.display());
    }
    Ok(())
}

pub fn execute_which(name: &str) -> Result<()> {
    match SearchPath::from_env().lookup(name) {
        Lookup::Found(path) => {
            println!("{}", path.display());
            Ok(())
        }
        Lookup::Missing => bail!("{} not found on the search path", name),
    }
}

pub fn execute_run(tool: &ToolArgs, base_dir: PathBuf, cancel: &CancelToken, args: Vec<String>) -> Result<()> {
    let spec = load_tool(tool)?;
    let resolution = resolve(&spec, base_dir, cancel, false)?;
    let status = Command::new(&resolution.executable_path)
        .args(args)
        .status()
        .with_context(|| format!("Could not run {}", resolution.executable_path.display()))?;
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}

pub fn execute_clean(tool: &ToolArgs, base_dir: PathBuf) -> Result<()> {
    let spec = load_tool(tool)?;
    let cache_root = cache_root_for(&base_dir, &spec);
    clean_cache(&cache_root)?;
    println!("{} {}", "Cleaned".green(), cache_root.display());
    Ok(())
}

pub fn execute_tools() -> Result<()> {
    for name in builtin_names() {
        let spec = builtin(name).ok_or_else(|| anyhow!("Invalid built-in descriptor: {}", name))?;
        println!("{}@{}", spec.name().bold(), spec.version());
        if let Some(release) = spec.release() {
            println!("  {}", release.url);
        }
    }
    Ok(())
}
