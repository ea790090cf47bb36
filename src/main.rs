use clap::Parser;
use serde_json::{Map, Value};

use kingpin::{ActorRegistry, EngineConfig, RunMode, Runner};

/// Deployment automation: runs a declarative tree of actors with a
/// mandatory dry-run rehearsal before the real pass.
#[derive(Parser, Debug)]
#[command(name = "kingpin", version, about)]
struct Cli {
    /// Path or URL of the script to run.
    #[arg(short, long)]
    script: Option<String>,

    /// Run a single ad-hoc actor by identifier instead of a script.
    #[arg(short, long)]
    actor: Option<String>,

    /// Option for the ad-hoc actor, as KEY=VALUE. Repeatable.
    #[arg(short, long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// Top-level parameter for the ad-hoc actor (desc, condition,
    /// warn_on_failure, timeout), as KEY=VALUE. Repeatable.
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Execute the rehearsal pass only.
    #[arg(short, long)]
    dry: bool,

    /// Print the documentation of the actor given with --actor.
    #[arg(long)]
    explain: bool,

    /// Construct the actor tree and exit without executing it.
    #[arg(long)]
    build_only: bool,

    /// Root log level when RUST_LOG is unset.
    #[arg(short, long, default_value = "info")]
    level: String,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.level.clone())),
        )
        .init();

    let config = EngineConfig::from_env();
    let runner = Runner::new(config, ActorRegistry::with_builtins());

    let mode = if cli.build_only {
        RunMode::BuildOnly
    } else if cli.dry {
        RunMode::DryOnly
    } else {
        RunMode::Full
    };

    let code = if cli.explain {
        match &cli.actor {
            Some(actor) => explain(&runner, actor),
            None => {
                tracing::error!("--explain requires --actor");
                1
            }
        }
    } else if let Some(actor) = &cli.actor {
        match adhoc_node(actor, &cli.options, &cli.params) {
            Ok(node) => runner.execute_node(node, mode).await,
            Err(e) => {
                tracing::error!("{}", e);
                1
            }
        }
    } else if let Some(script) = &cli.script {
        runner.execute_script(script, mode).await
    } else {
        tracing::error!("one of --script or --actor is required");
        1
    };

    std::process::ExitCode::from(code as u8)
}

fn explain(runner: &Runner, actor: &str) -> i32 {
    match runner.registry().explain(actor) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    }
}

/// Build a single-actor root node from the command line: `--option` pairs
/// populate `options`, `--param` pairs populate top-level node keys.
fn adhoc_node(actor: &str, options: &[String], params: &[String]) -> Result<Value, String> {
    let mut node = Map::new();
    node.insert("actor".to_string(), Value::String(actor.to_string()));

    let mut option_map = Map::new();
    for pair in options {
        let (key, value) = parse_pair(pair)?;
        option_map.insert(key, value);
    }
    node.insert("options".to_string(), Value::Object(option_map));

    for pair in params {
        let (key, value) = parse_pair(pair)?;
        node.insert(key, value);
    }
    Ok(Value::Object(node))
}

/// Split `KEY=VALUE`, parsing the value as JSON where possible so numbers,
/// booleans and structures come through typed.
fn parse_pair(pair: &str) -> Result<(String, Value), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{}\"", pair))?;
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pair_types() {
        assert_eq!(parse_pair("a=5").unwrap(), ("a".to_string(), json!(5)));
        assert_eq!(
            parse_pair("b=true").unwrap(),
            ("b".to_string(), json!(true))
        );
        assert_eq!(
            parse_pair("c=plain text").unwrap(),
            ("c".to_string(), json!("plain text"))
        );
        assert!(parse_pair("broken").is_err());
    }

    #[test]
    fn test_adhoc_node_shape() {
        let node = adhoc_node(
            "misc.Sleep",
            &["sleep=0.5".to_string()],
            &["desc=nap".to_string(), "warn_on_failure=true".to_string()],
        )
        .unwrap();
        assert_eq!(
            node,
            json!({
                "actor": "misc.Sleep",
                "options": {"sleep": 0.5},
                "desc": "nap",
                "warn_on_failure": true
            })
        );
    }
}
