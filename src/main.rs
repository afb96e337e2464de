use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use serde_json::Value;
use std::io::Read;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use kafka_entity_synthesis::{
    RawSample, SynthesisConfig, TransformationPipeline, TransformationResult, VERSION,
};

fn main() -> Result<()> {
    let matches = Command::new("entity-synth")
        .version(VERSION)
        .author("Kafka Entity Synthesis Team")
        .about("Transform Kafka broker, topic and consumer-group samples into normalized entities")
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .value_name("PATH")
                .help("JSON array or JSON-lines file of samples, '-' for stdin (default: stdin)")
                .default_value("-"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("YAML or JSON configuration file")
                .required(false),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Reject samples with missing identity fields or invalid metrics")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_validation")
                .long("no-validation")
                .help("Skip metric range validation")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_per_broker_topics")
                .long("no-per-broker-topics")
                .help("Emit one topic entity per cluster instead of one per reporting broker")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("topic_views")
                .long("topic-views")
                .help("Also emit cluster-wide views of per-broker topics")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Pretty-print the JSON output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .help("Print a batch summary to stderr")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fail_on_error")
                .long("fail-on-error")
                .help("Exit with code 2 if any sample or cluster failed")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => SynthesisConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => SynthesisConfig::default(),
    };
    config.apply_env();
    if matches.get_flag("strict") {
        config.strict_mode = true;
    }
    if matches.get_flag("no_validation") {
        config.enable_validation = false;
    }
    if matches.get_flag("no_per_broker_topics") {
        config.enable_per_topic_broker_metrics = false;
    }
    config.validate().context("Invalid configuration")?;

    let input = matches
        .get_one::<String>("input")
        .map(String::as_str)
        .unwrap_or("-");
    let content = read_input(input)?;
    let samples = parse_samples(&content).with_context(|| format!("Failed to parse samples from {}", input))?;
    info!("Loaded {} samples from {}", samples.len(), input);

    let pipeline = TransformationPipeline::new(config).context("Failed to build pipeline")?;
    let result = pipeline.transform(&samples);

    let mut output = serde_json::to_value(&result).context("Failed to serialize result")?;
    if matches.get_flag("topic_views") {
        let views = serde_json::to_value(pipeline.topic_views())?;
        if let Value::Object(map) = &mut output {
            map.insert("topicViews".to_string(), views);
        }
    }

    let rendered = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);

    if matches.get_flag("summary") {
        print_summary(&result);
    }

    if matches.get_flag("fail_on_error") && !result.errors.is_empty() {
        std::process::exit(2);
    }

    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read samples from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
    }
}

/// Accept either a JSON array of samples or one JSON object per line
fn parse_samples(content: &str) -> Result<Vec<RawSample>> {
    let trimmed = content.trim_start();
    let values: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).context("Invalid JSON array")?
    } else {
        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).with_context(|| format!("Invalid JSON on line {}", n + 1))
            })
            .collect::<Result<_>>()?
    };
    debug!("Parsed {} JSON values", values.len());

    values
        .into_iter()
        .enumerate()
        .map(|(n, value)| {
            RawSample::from_value(value).with_context(|| format!("Sample {} is not an object", n))
        })
        .collect()
}

#[cfg(feature = "colored-output")]
fn print_summary(result: &TransformationResult) {
    use colored::Colorize;

    let report = &result.report;
    let counts = &report.entities_created;
    eprintln!("{}", "Transformation summary".bold());
    eprintln!("  samples:   {}", report.samples_processed);
    eprintln!(
        "  entities:  {} ({} clusters, {} brokers, {} topics, {} consumer groups)",
        counts.total().to_string().green(),
        counts.clusters,
        counts.brokers,
        counts.topics,
        counts.consumer_groups
    );
    let warnings = report.validation_warnings.len().to_string();
    eprintln!(
        "  warnings:  {}",
        if report.validation_warnings.is_empty() { warnings.normal() } else { warnings.yellow() }
    );
    let errors = report.error_count.to_string();
    eprintln!(
        "  errors:    {}",
        if report.error_count == 0 { errors.green() } else { errors.red() }
    );
    for entry in &result.errors {
        let location = match (entry.index, &entry.cluster_name) {
            (Some(index), _) => format!("sample {}", index),
            (None, Some(cluster)) => format!("cluster {}", cluster),
            (None, None) => "batch".to_string(),
        };
        eprintln!("    {} [{}] {}", location.red(), entry.code, entry.message);
    }
    eprintln!("  duration:  {:.2}ms", report.duration_ms);
}

#[cfg(not(feature = "colored-output"))]
fn print_summary(result: &TransformationResult) {
    let report = &result.report;
    eprintln!("Transformation summary");
    eprintln!("  samples:   {}", report.samples_processed);
    eprintln!("  entities:  {}", report.entities_created.total());
    eprintln!("  warnings:  {}", report.validation_warnings.len());
    eprintln!("  errors:    {}", report.error_count);
    for entry in &result.errors {
        eprintln!("    {:?} [{}] {}", entry.index, entry.code, entry.message);
    }
    eprintln!("  duration:  {:.2}ms", report.duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let samples = parse_samples(r#"[{"kind": "broker"}, {"kind": "topic"}]"#).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_parse_json_lines() {
        let content = "{\"kind\": \"broker\"}\n\n{\"kind\": \"topic\"}\n";
        assert_eq!(parse_samples(content).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(parse_samples("[1, 2]").is_err());
        assert!(parse_samples("{not json}").is_err());
    }
}
