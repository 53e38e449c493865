//! Subcommand implementations

use anyhow::{Context, Result};
use lens_core::{CacheStatistics, Demangled, DemangledName, InspectorConfig};
use lens_demangle::{innermost_view_name, Demangler};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info};

pub struct DemangleOptions {
    pub json: bool,
    pub swiftui: bool,
    pub stats: bool,
}

/// Outcome for one input symbol
#[derive(Debug, Serialize)]
pub struct DemangleRecord {
    pub input: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demangled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<DemangledName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Full,
    Partial,
    Failed,
}

impl DemangleRecord {
    /// One output line: the name, `(partial)` when recovered heuristically, the input when it failed.
    pub fn text(&self, swiftui: bool) -> String {
        let name = match (&self.view, &self.demangled) {
            (Some(view), _) if swiftui => view.clone(),
            (_, Some(demangled)) => demangled.clone(),
            _ => return self.input.clone(),
        };
        match self.status {
            Status::Partial => format!("{} (partial)", name),
            _ => name,
        }
    }
}

pub fn demangle_symbol(demangler: &Demangler, symbol: &str) -> DemangleRecord {
    match demangler.demangle(symbol) {
        Ok(result) => {
            let status = match result {
                Demangled::Full(_) => Status::Full,
                Demangled::Partial(_) => Status::Partial,
            };
            let name = result.into_name();
            DemangleRecord {
                input: symbol.to_string(),
                status,
                demangled: Some(name.to_string()),
                view: Some(innermost_view_name(&name, &demangler.config().swiftui)),
                name: Some(name),
                error: None,
            }
        }
        Err(e) => {
            debug!(symbol, error = %e, "Symbol not demangled");
            DemangleRecord {
                input: symbol.to_string(),
                status: Status::Failed,
                demangled: None,
                view: None,
                name: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Demangle `symbols`, or every non-empty line of `input` when there are none
pub fn demangle(
    demangler: &Demangler,
    symbols: &[String],
    input: impl BufRead,
    mut out: impl Write,
    options: &DemangleOptions,
) -> Result<()> {
    let from_stdin;
    let symbols: &[String] = if symbols.is_empty() {
        from_stdin = input
            .lines()
            .map(|line| line.map(|l| l.trim().to_string()))
            .filter(|line| !matches!(line, Ok(l) if l.is_empty()))
            .collect::<std::io::Result<Vec<_>>>()
            .context("Failed to read symbols from stdin")?;
        &from_stdin
    } else {
        symbols
    };

    let mut failed = 0usize;
    for symbol in symbols {
        let record = demangle_symbol(demangler, symbol);
        if record.status == Status::Failed {
            failed += 1;
        }
        if options.json {
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
        } else {
            writeln!(out, "{}", record.text(options.swiftui))?;
        }
    }
    info!(symbols = symbols.len(), failed, "Demangling complete");

    if options.stats {
        write_statistics(&mut out, &demangler.cache().statistics(), options.json)?;
    }
    Ok(())
}

fn write_statistics(out: &mut impl Write, stats: &CacheStatistics, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(stats)?)?;
    } else {
        for (namespace, counts) in [("demangling", &stats.demangling), ("metadata", &stats.metadata)] {
            writeln!(
                out,
                "{}: {} hits, {} misses, {} entries",
                namespace, counts.hits, counts.misses, counts.entries
            )?;
        }
    }
    Ok(())
}

/// Write `config` to `output`, or pretty JSON to `out`
pub fn write_config(config: &InspectorConfig, output: Option<&Path>, mut out: impl Write) -> Result<()> {
    match output {
        Some(path) => {
            config
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Configuration written");
        }
        None => writeln!(out, "{}", serde_json::to_string_pretty(config)?)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::InspectorCache;
    use std::sync::Arc;

    fn demangler(fallback: bool) -> Demangler {
        let config = InspectorConfig {
            fallback_demangling: fallback,
            ..InspectorConfig::default()
        };
        Demangler::new(Arc::new(InspectorCache::new()), config)
    }

    fn run(demangler: &Demangler, symbols: &[&str], stdin: &str, options: DemangleOptions) -> String {
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        demangle(demangler, &symbols, stdin.as_bytes(), &mut out, &options).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn text() -> DemangleOptions {
        DemangleOptions {
            json: false,
            swiftui: false,
            stats: false,
        }
    }

    #[test]
    fn test_text_output() {
        let demangler = demangler(true);
        let out = run(&demangler, &["$sSaySiGD", "hello", "$s4main3FooVQQ"], "", text());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Swift.Array<Swift.Int>");
        assert_eq!(lines[1], "hello");
        assert_eq!(lines[2], "main.Foo (partial)");
    }

    #[test]
    fn test_no_fallback_echoes_input() {
        let demangler = demangler(false);
        let out = run(&demangler, &["$s4main3FooVQQ"], "", text());
        assert_eq!(out.trim(), "$s4main3FooVQQ");
    }

    #[test]
    fn test_reads_stdin_and_prints_stats() {
        let demangler = demangler(true);
        let options = DemangleOptions {
            stats: true,
            ..text()
        };
        let out = run(&demangler, &[], "$sSiD\n\n$sSiD\n", options);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Swift.Int");
        assert_eq!(lines[1], "Swift.Int");
        assert_eq!(lines[2], "demangling: 1 hits, 1 misses, 1 entries");
    }

    #[test]
    fn test_json_and_view_output() {
        let demangler = demangler(true);
        let symbol = "$s7SwiftUI15ModifiedContentVy4main11ContentViewVAA14_PaddingLayoutVGD";
        let options = DemangleOptions {
            json: true,
            ..text()
        };
        let out = run(&demangler, &[symbol, "x"], "", options);
        let records: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records[0]["status"], "full");
        assert_eq!(records[0]["view"], "ContentView");
        assert_eq!(records[0]["name"]["type_name"], "ModifiedContent");
        assert_eq!(records[1]["status"], "failed");
        assert!(records[1].get("demangled").is_none());

        let swiftui = DemangleOptions {
            swiftui: true,
            ..text()
        };
        assert_eq!(run(&demangler, &[symbol], "", swiftui).trim(), "ContentView");
    }

    #[test]
    fn test_write_config_to_stdout() {
        let mut out = Vec::new();
        write_config(&InspectorConfig::default(), None, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["fallback_demangling"], true);
        assert_eq!(value["limits"]["max_hierarchy_depth"], 3);
    }
}
