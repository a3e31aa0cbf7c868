//! `rawcss`: inspect a RawCSS wiki stored as a directory
//!
//! Pages live at `<wiki>/<Namespace>/<Title>`; main-namespace pages sit in
//! the root.

use anyhow::{anyhow, bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rawcss_application::{
    validate_style_page, ApplicationBundle, ApplicationId, ApplicationRepository, EntryStatus, MemoryCacheStore,
    OutputContext, RawCssConfig,
};
use rawcss_compiler::{LessCompiler, StyleCompiler, Variables};
use rawcss_page::{DirectoryPageStore, Namespace, PageStore, StyleLanguage};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Repository = ApplicationRepository<Arc<DirectoryPageStore>, LessCompiler, MemoryCacheStore>;

fn cli() -> Command {
    Command::new("rawcss")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Validate, resolve and compile RawCSS applications")
        .subcommand_required(true)
        .arg(
            Arg::new("wiki")
                .long("wiki")
                .global(true)
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the wiki pages"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .subcommand(
            Command::new("validate")
                .about("Check specification text the way a save would")
                .arg(
                    Arg::new("file")
                        .value_parser(value_parser!(PathBuf))
                        .help("Specification text to check instead of the stored page"),
                )
                .arg(
                    Arg::new("style")
                        .long("style")
                        .action(ArgAction::Append)
                        .help("Also check the syntax of this Less page"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve every application on the specification page")
                .arg(
                    Arg::new("id")
                        .long("id")
                        .value_parser(value_parser!(ApplicationId))
                        .help("Only this application (page id or `*`)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("compile")
                .about("Compile one style page")
                .arg(Arg::new("page").required(true).help("Style page name"))
                .arg(
                    Arg::new("var")
                        .long("var")
                        .action(ArgAction::Append)
                        .value_parser(parse_variable)
                        .help("Variable override, `name=value`"),
                ),
        )
        .subcommand(
            Command::new("output")
                .about("Show which applications a rendered page would load")
                .arg(Arg::new("page").required(true).help("Rendered page"))
                .arg(
                    Arg::new("template")
                        .long("template")
                        .short('t')
                        .action(ArgAction::Append)
                        .help("Template transcluded on the page"),
                )
                .arg(
                    Arg::new("skin")
                        .long("skin")
                        .default_value("vector")
                        .help("Active skin"),
                ),
        )
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match run(&matches) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(matches: &ArgMatches) -> Result<bool> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => RawCssConfig::from_toml_file(path)?,
        None => RawCssConfig::default(),
    };
    let root = matches
        .get_one::<PathBuf>("wiki")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let store = DirectoryPageStore::open(&root, config.model_defaults()?)
        .with_context(|| format!("cannot open wiki at {}", root.display()))?;
    debug!(wiki = %root.display(), pages = store.titles().len(), "opened wiki");
    let repository = ApplicationRepository::new(Arc::new(store), LessCompiler::new(), MemoryCacheStore::new(), &config)?;

    match matches.subcommand() {
        Some(("validate", args)) => validate(&repository, args),
        Some(("resolve", args)) => resolve(&repository, args),
        Some(("compile", args)) => compile(&repository, args),
        Some(("output", args)) => output(&repository, args),
        _ => bail!("unknown subcommand"),
    }
}

fn validate(repository: &Repository, args: &ArgMatches) -> Result<bool> {
    let text = match args.get_one::<PathBuf>("file") {
        Some(path) => fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?,
        None => {
            let page = repository.specification_page();
            repository
                .accessor()
                .store()
                .page(page)
                .and_then(|record| record.latest)
                .map(|revision| revision.text)
                .ok_or_else(|| anyhow!("{} does not exist or is unreadable", page.prefixed_text()))?
        }
    };

    let mut clean = match repository.validate_specification(&text) {
        Ok(specifications) => {
            println!("ok: {} application(s)", specifications.len());
            true
        }
        Err(err) => {
            println!("invalid: {err}");
            false
        }
    };

    for name in args.get_many::<String>("style").into_iter().flatten() {
        let page = repository.accessor().resolve(name, Namespace::RAWCSS)?;
        if page.language != StyleLanguage::Less {
            println!("{}: not a Less page, nothing to check", page.title.prefixed_text());
            continue;
        }
        match validate_style_page(&page.text) {
            Ok(()) => println!("{}: ok", page.title.prefixed_text()),
            Err(err) => {
                println!("{}: {err}", page.title.prefixed_text());
                clean = false;
            }
        }
    }
    Ok(clean)
}

fn resolve(repository: &Repository, args: &ArgMatches) -> Result<bool> {
    let mut applications = repository.applications();
    if let Some(id) = args.get_one::<ApplicationId>("id") {
        applications.retain(|key, _| key == id);
        if applications.is_empty() {
            bail!("no application {id}");
        }
    }

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&applications)?);
        return Ok(true);
    }

    if let Some(report) = repository.parse_specification() {
        for diagnostic in &report.diagnostics {
            println!("skipped: {diagnostic}");
        }
        if let Err(err) = &report.outcome {
            println!("rejected: {err}");
        }
    }
    for bundle in applications.values() {
        print_bundle(bundle);
    }
    Ok(applications.values().all(|b| b.placeholder_count() == 0))
}

fn print_bundle(bundle: &ApplicationBundle) {
    println!("{} [{}]", bundle.id.module_name(), bundle.definition_summary().short());
    for entry in &bundle.entries {
        match &entry.status {
            EntryStatus::Compiled | EntryStatus::Passthrough => {
                println!("  {} ({} bytes)", entry.page, entry.css.len());
            }
            EntryStatus::NotFound { reason } | EntryStatus::CompileFailed { reason } => {
                println!("  {} placeholder: {reason}", entry.page);
            }
        }
    }
    for directive in &bundle.preload {
        println!("  preload {}", directive.to_link_header());
    }
}

fn compile(repository: &Repository, args: &ArgMatches) -> Result<bool> {
    let name = args
        .get_one::<String>("page")
        .ok_or_else(|| anyhow!("missing page"))?;
    let variables: Variables = args
        .get_many::<(String, String)>("var")
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    let page = repository.accessor().resolve(name, Namespace::RAWCSS)?;
    let css = match page.language {
        StyleLanguage::Css => page.text,
        StyleLanguage::Less => repository
            .compiler()
            .compile(&page.text, &variables)
            .with_context(|| format!("compiling {}", page.title.prefixed_text()))?,
    };
    println!("{css}");
    Ok(true)
}

fn output(repository: &Repository, args: &ArgMatches) -> Result<bool> {
    let titles = repository.accessor().titles();
    let page = args
        .get_one::<String>("page")
        .ok_or_else(|| anyhow!("missing page"))?;
    let templates = args
        .get_many::<String>("template")
        .into_iter()
        .flatten()
        .map(|name| titles.parse(name, Namespace::TEMPLATE))
        .collect::<Result<Vec<_>, _>>()?;
    let skin = args
        .get_one::<String>("skin")
        .map_or("vector", String::as_str);

    let context = OutputContext::new(skin, titles.parse(page, Namespace::MAIN)?).with_templates(templates);
    let bundles = repository.applications_for_output(&context);
    if bundles.is_empty() {
        println!("no applications");
    }
    for bundle in &bundles {
        println!("{}", bundle.id.module_name());
        if let Some(header) = repository.link_header(bundle.id) {
            println!("  Link: {header}");
        }
    }
    Ok(true)
}

fn parse_variable(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let name = name.trim().trim_start_matches('@');
    if name.is_empty() {
        return Err("variable name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn variables_parse_with_optional_at() {
        assert_eq!(parse_variable("@c=red").unwrap(), ("c".to_string(), "red".to_string()));
        assert_eq!(parse_variable("w = 1em").unwrap(), ("w".to_string(), "1em".to_string()));
        assert!(parse_variable("novalue").is_err());
        assert!(parse_variable("=x").is_err());
    }

    #[test]
    fn subcommands_parse() {
        let matches = cli()
            .try_get_matches_from(["rawcss", "--wiki", "/tmp/w", "compile", "Theme.less", "--var", "c=red"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "compile");
        assert_eq!(args.get_one::<String>("page").map(String::as_str), Some("Theme.less"));
        assert_eq!(matches.get_one::<PathBuf>("wiki"), Some(&PathBuf::from("/tmp/w")));
    }
}
