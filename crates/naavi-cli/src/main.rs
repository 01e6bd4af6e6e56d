//! `naavi`: offline questionnaire tooling
//!
//! Lists the schema, validates a persisted draft and reports its progress
//! without talking to the backend.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use naavi_draft::DraftDocument;
use naavi_model::{AnswerSet, QuestionId, SchemaRegistry, SectionId};
use naavi_session::{init_tracing, LogFormat, QuestionnaireProgress};
use naavi_validation::{AnswerSources, CrossSectionAggregator, ValidationSummary};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn cli() -> Command {
    let draft_arg = Arg::new("draft")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Draft document (JSON, formData layout)");
    let json_arg = Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON");

    Command::new("naavi")
        .version(naavi_session::VERSION)
        .about("NAAVI questionnaire tooling")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("schema")
                .long("schema")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Schema registry YAML (defaults to the built-in questionnaire)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("plain")
                .value_parser(value_parser!(LogFormat))
                .help("Log line format: plain or json"),
        )
        .subcommand(
            Command::new("schema")
                .about("List sections and question ids")
                .arg(json_arg.clone()),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a draft; exits with 1 when sections are incomplete")
                .arg(draft_arg.clone())
                .arg(json_arg.clone()),
        )
        .subcommand(
            Command::new("progress")
                .about("Completion and automation metrics of a draft")
                .arg(draft_arg)
                .arg(json_arg),
        )
}

fn load_registry(matches: &ArgMatches) -> Result<SchemaRegistry> {
    match matches.get_one::<PathBuf>("schema") {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read schema {}", path.display()))?;
            SchemaRegistry::from_yaml_str(&raw)
                .with_context(|| format!("invalid schema {}", path.display()))
        }
        None => Ok(SchemaRegistry::builtin()
            .context("built-in schema is invalid")?
            .clone()),
    }
}

fn load_draft(path: &Path) -> Result<DraftDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read draft {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("malformed draft {}", path.display()))
}

/// Validate a persisted draft as the wizard would after a reload
fn validate_draft(registry: &SchemaRegistry, draft: &DraftDocument) -> ValidationSummary {
    let answers: BTreeMap<SectionId, AnswerSet> = registry
        .iter()
        .map(|schema| (schema.section_id, draft.answers_for(&schema.section_name)))
        .collect();
    CrossSectionAggregator::new().validate_all_with(registry, |schema| {
        let mut sources =
            AnswerSources::empty().with_persisted_files(draft.files_for(&schema.section_name));
        if let Some(answers) = answers.get(&schema.section_id) {
            sources = sources.with_persisted(answers);
        }
        sources
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to encode output")?
    );
    Ok(())
}

fn run_schema(registry: &SchemaRegistry, json: bool) -> Result<()> {
    if json {
        let listing: Vec<_> = registry
            .iter()
            .map(|s| {
                serde_json::json!({
                    "sectionId": s.section_id,
                    "sectionName": s.section_name,
                    "sectionTitle": s.section_title,
                    "questions": s.questions.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        return print_json(&listing);
    }
    for section in registry.iter() {
        println!(
            "{:>2}  {:<18} {}",
            section.section_id, section.section_name, section.section_title
        );
        for question in &section.questions {
            let marker = if question.required { "*" } else { " " };
            println!("      {marker} {}", question.id);
        }
    }
    Ok(())
}

fn run_validate(registry: &SchemaRegistry, draft: &DraftDocument, json: bool) -> Result<bool> {
    let summary = validate_draft(registry, draft);
    tracing::info!(
        key = %draft.key(),
        invalid_sections = summary.invalid_section_count(),
        "draft validated"
    );
    if json {
        print_json(&summary)?;
    } else if summary.is_valid {
        println!("{}: all sections complete", draft.key());
    } else {
        println!(
            "{}: {} missing across {} sections",
            draft.key(),
            summary.total_missing_fields(),
            summary.invalid_section_count()
        );
        for (section, fields) in &summary.invalid_sections {
            let title = registry
                .get(*section)
                .map_or("?", |s| s.section_title.as_str());
            let ids: Vec<&str> = fields.iter().map(QuestionId::as_str).collect();
            println!("  {section:>2} {title}: {}", ids.join(", "));
        }
    }
    Ok(summary.is_valid)
}

fn run_progress(registry: &SchemaRegistry, draft: &DraftDocument, json: bool) -> Result<()> {
    let progress = QuestionnaireProgress::compute(registry, draft);
    if json {
        return print_json(&progress);
    }
    for section in &progress.sections {
        println!(
            "{:>2}  {:<40} {:>3}%  {:?}",
            section.section_id, section.title, section.completion, section.status
        );
    }
    let automation = progress.automation();
    println!();
    println!("Completion: {}%", progress.completion());
    println!(
        "Automation: {}% ({} of {} steps)",
        automation.automation_percentage(),
        automation.automated_steps,
        automation.total_steps
    );
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<bool> {
    let registry = load_registry(matches)?;
    match matches.subcommand() {
        Some(("schema", args)) => {
            run_schema(&registry, args.get_flag("json"))?;
            Ok(true)
        }
        Some(("validate", args)) => {
            let path = args
                .get_one::<PathBuf>("draft")
                .context("missing draft path")?;
            run_validate(&registry, &load_draft(path)?, args.get_flag("json"))
        }
        Some(("progress", args)) => {
            let path = args
                .get_one::<PathBuf>("draft")
                .context("missing draft path")?;
            run_progress(&registry, &load_draft(path)?, args.get_flag("json"))?;
            Ok(true)
        }
        _ => Ok(true),
    }
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let format = matches
        .get_one::<LogFormat>("log-format")
        .copied()
        .unwrap_or_default();
    init_tracing(format);

    if !run(&matches)? {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const DRAFT: &str = r#"{
        "nfName": "Nokia - 5G CHF ME",
        "version": "v1.0.0",
        "sections": [
            {
                "sectionName": "healthcheck",
                "questions": [
                    {"questionId": "healthCheckPerformed", "questionText": "", "answer": "no"},
                    {"questionId": "notPerformedReason", "questionText": "", "answer": "n/a"}
                ]
            }
        ]
    }"#;

    fn draft_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DRAFT.as_bytes()).unwrap();
        file
    }

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn validates_persisted_draft() {
        let file = draft_file();
        let registry = SchemaRegistry::builtin().unwrap();
        let draft = load_draft(file.path()).unwrap();

        let summary = validate_draft(registry, &draft);
        assert!(summary.invalid_fields(SectionId(0)).is_empty());
        assert_eq!(summary.first_invalid_section(), Some(SectionId(1)));
        assert!(!run_validate(registry, &draft, true).unwrap());
    }

    #[test]
    fn parses_subcommands() {
        let matches = cli()
            .try_get_matches_from(["naavi", "progress", "draft.json", "--log-format", "json"])
            .unwrap();
        assert_eq!(
            matches.get_one::<LogFormat>("log-format"),
            Some(&LogFormat::Json)
        );
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "progress");
        assert_eq!(
            args.get_one::<PathBuf>("draft"),
            Some(&PathBuf::from("draft.json"))
        );
    }

    #[test]
    fn missing_draft_has_context() {
        let err = load_draft(Path::new("/nonexistent/draft.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read draft"));
    }
}
