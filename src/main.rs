use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::SystemTime;
use textweave::fs_utils::{modified_time, read_file_contents};
use textweave::{
    Document, FlattenOptions, MissingIncludePolicy, MissingVariablePolicy, RenderConfig, Renderer,
    Result, find_includes, find_variables, flatten, parse_page,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LONG_HELP: &str = r#"
Syntax:
  {% include "partials/nav.html" %}  - Inline another file (resolved against --base-dir)
  {{ title }}                       - Substitute a variable
  {{ site.nav.0 }}                  - Reach into nested variables

Examples:
  # Render a template with variables
  textweave page.html --var title=Home --var year=2026
  # Render from stdin
  echo '{% include "footer.html" %}' | textweave -b site/
  # Variables from JSON records, flattened with dotted keys
  textweave page.html --vars site.json
  # Use the page's own header comment as variables
  textweave page.html --front-matter --require title --require url
  # Only write when the page or one of its includes changed
  textweave page.html -o out/page.html --skip-fresh
  # Check that every include exists
  textweave page.html --dry-run
  # List all directives as JSON
  textweave page.html --list=json
"#;

/// Include and variable preprocessor for build pipelines.
#[derive(Parser, Debug)]
#[command(
    name = "textweave",
    version,
    about = "Include and variable preprocessor for build pipelines.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Template file to render. Use '-' or omit for stdin.
    #[arg(value_name = "TEMPLATE")]
    template: Option<PathBuf>,

    /// Base directory for resolving include paths
    #[arg(short, long, value_name = "DIR", env = "TEXTWEAVE_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// JSON configuration file (patterns and policies)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Set a variable (repeatable)
    #[arg(
        long = "var",
        value_name = "KEY=VALUE",
        value_parser = parse_var,
        action = clap::ArgAction::Append
    )]
    vars: Vec<(String, String)>,

    /// JSON file with a record or an array of records, flattened into variables (repeatable)
    #[arg(long = "vars", value_name = "FILE", action = clap::ArgAction::Append)]
    var_files: Vec<PathBuf>,

    /// Separator between parent and child keys when flattening
    #[arg(long, value_name = "SEP", default_value = ".")]
    separator: String,

    /// Suffix after each child key when flattening
    #[arg(long, value_name = "SUFFIX", default_value = "")]
    suffix: String,

    /// Add the template's header comment fields to the variables
    #[arg(long)]
    front_matter: bool,

    /// Header field that must be present (repeatable, implies --front-matter)
    #[arg(long = "require", value_name = "FIELD", action = clap::ArgAction::Append)]
    required: Vec<String>,

    /// Log every variable left unresolved
    #[arg(long)]
    strict: bool,

    /// Leave missing includes unexpanded instead of failing
    #[arg(long)]
    lenient_includes: bool,

    /// Maximum include nesting depth
    #[arg(short = 'd', long, value_name = "DEPTH")]
    max_depth: Option<usize>,

    /// Skip writing when the output is not older than the template and its includes
    #[arg(long, requires = "output")]
    skip_fresh: bool,

    /// Validate include targets without rendering
    #[arg(long, conflicts_with = "list")]
    dry_run: bool,

    /// List directives in the template (optionally with format: plain, json)
    #[arg(
        long,
        value_name = "FORMAT",
        num_args = 0..=1,
        default_missing_value = "plain",
        conflicts_with = "dry_run"
    )]
    list: Option<ListFormat>,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// One directive per line
    Plain,
    /// JSON output for scripting
    Json,
}

#[derive(Serialize)]
struct DirectiveInfo {
    kind: &'static str,
    reference: String,
    start: usize,
    end: usize,
}

fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Log level is controlled by `-q`/`-v`; with neither, `RUST_LOG` applies
/// and the default is WARN.
fn init_tracing(quiet: bool, verbose: u8) {
    let filter = match (quiet, verbose) {
        (true, _) => EnvFilter::new("textweave=error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("textweave=warn"))
        }
        (false, 1) => EnvFilter::new("textweave=info"),
        (false, 2) => EnvFilter::new("textweave=debug"),
        (false, _) => EnvFilter::new("textweave=trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    tracing::debug!("textweave starting with args: {:?}", cli);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = build_config(cli)?;
    let mut document = load_template(cli.template.as_deref())?;
    let mut renderer = Renderer::new(config)?;

    if cli.dry_run {
        return Ok(if dry_run(&mut renderer, &document)? {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }
    if let Some(format) = cli.list {
        let directives = collect_directives(&renderer, &document.contents);
        print!("{}", format_directives(&directives, format)?);
        return Ok(ExitCode::SUCCESS);
    }

    let variables = build_variables(cli, &document)?;
    let rendered = renderer.render_document(&mut document, &Value::Object(variables))?;
    tracing::info!(
        "rendered {} ({} unresolved variables)",
        document.path.display(),
        rendered.missing.len()
    );

    match &cli.output {
        Some(output) => {
            if cli.skip_fresh && is_up_to_date(output, document.modified) {
                tracing::info!("{} is up to date", output.display());
                return Ok(ExitCode::SUCCESS);
            }
            if let Some(parent) = output.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!("Writing output to {}", output.display());
            std::fs::write(output, &document.contents)?;
        }
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(document.contents.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_config(cli: &Cli) -> Result<RenderConfig> {
    let mut config = match &cli.config {
        Some(path) => RenderConfig::from_json_file(path)?,
        None => RenderConfig::default(),
    };
    if let Some(dir) = &cli.base_dir {
        config.base_dir = dir.canonicalize().unwrap_or_else(|_| dir.clone());
    }
    if let Some(depth) = cli.max_depth {
        config.max_include_depth = depth;
    }
    if cli.strict {
        config.missing_variable = MissingVariablePolicy::Report;
    }
    if cli.lenient_includes {
        config.missing_include = MissingIncludePolicy::Warn;
    }
    Ok(config)
}

fn load_template(template: Option<&Path>) -> Result<Document> {
    match template {
        Some(path) if path != Path::new("-") => {
            tracing::info!("Reading template from {}", path.display());
            Document::load(path)
        }
        _ => {
            tracing::info!("Reading template from stdin...");
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Document::new("<stdin>", buffer, SystemTime::UNIX_EPOCH))
        }
    }
}

/// Variables from `--vars` files, then the header, then `--var`; later sources win.
fn build_variables(cli: &Cli, document: &Document) -> Result<Map<String, Value>> {
    let options = FlattenOptions {
        separator: cli.separator.clone(),
        suffix: cli.suffix.clone(),
    };
    let mut variables = Map::new();

    for path in &cli.var_files {
        let records: Value = serde_json::from_str(&read_file_contents(path)?)?;
        variables.extend(flatten(&records, &options)?);
    }

    if cli.front_matter || !cli.required.is_empty() {
        let required: Vec<&str> = cli.required.iter().map(String::as_str).collect();
        variables.extend(parse_page(document, &required)?);
    }

    for (key, value) in &cli.vars {
        variables.insert(key.clone(), Value::String(value.clone()));
    }
    Ok(variables)
}

fn is_up_to_date(output: &Path, newest_input: SystemTime) -> bool {
    modified_time(output).is_ok_and(|written| written >= newest_input)
}

/// Checks every include reachable from the document; true when all exist.
fn dry_run(renderer: &mut Renderer, document: &Document) -> Result<bool> {
    tracing::info!("Performing dry run - validating includes...");

    let total = find_includes(&document.contents, renderer.syntax()).len();
    let missing = renderer.missing_includes(&document.contents)?;
    for path in &missing {
        tracing::warn!("✗ {} (not found)", path.display());
    }

    println!("\nSummary: {total} includes found in {}", document.path.display());
    if missing.is_empty() {
        println!("  ✓ all includes resolved");
        return Ok(true);
    }
    println!("  ✗ {} missing", missing.len());
    Ok(false)
}

fn collect_directives(renderer: &Renderer, text: &str) -> Vec<DirectiveInfo> {
    let mut directives: Vec<DirectiveInfo> = find_includes(text, renderer.syntax())
        .into_iter()
        .map(|r| DirectiveInfo {
            kind: "include",
            reference: r.reference,
            start: r.start,
            end: r.end,
        })
        .chain(
            find_variables(text, renderer.syntax())
                .into_iter()
                .map(|r| DirectiveInfo {
                    kind: "variable",
                    reference: r.reference,
                    start: r.start,
                    end: r.end,
                }),
        )
        .collect();
    directives.sort_by_key(|d| d.start);
    directives
}

fn format_directives(directives: &[DirectiveInfo], format: ListFormat) -> Result<String> {
    Ok(match format {
        ListFormat::Plain => directives
            .iter()
            .map(|d| format!("{} {}\n", d.kind, d.reference))
            .collect(),
        ListFormat::Json => format!("{}\n", serde_json::to_string_pretty(directives)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn site_renderer(temp_dir: &TempDir) -> Renderer {
        let config = RenderConfig {
            base_dir: temp_dir.path().to_path_buf(),
            ..RenderConfig::default()
        };
        Renderer::new(config).unwrap()
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("title=Hello = World").unwrap(),
            ("title".to_string(), "Hello = World".to_string())
        );
        assert_eq!(parse_var("empty=").unwrap(), ("empty".to_string(), String::new()));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "textweave",
            "page.html",
            "--var",
            "a=1",
            "--var",
            "b=2",
            "--vars",
            "site.json",
            "--strict",
            "-o",
            "out.html",
            "--skip-fresh",
        ])
        .unwrap();
        assert_eq!(cli.vars.len(), 2);
        assert_eq!(cli.var_files, vec![PathBuf::from("site.json")]);
        assert!(cli.strict);

        let config = build_config(&cli).unwrap();
        assert_eq!(config.missing_variable, MissingVariablePolicy::Report);
        assert_eq!(config.missing_include, MissingIncludePolicy::Fail);
    }

    #[test]
    fn test_skip_fresh_requires_output() {
        assert!(Cli::try_parse_from(["textweave", "page.html", "--skip-fresh"]).is_err());
    }

    #[test]
    fn test_build_variables_precedence() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let vars_path = temp_dir.path().join("site.json");
        std::fs::write(
            &vars_path,
            r#"{ "site": { "name": "Docs" }, "title": "from file" }"#,
        )
        .unwrap();

        let vars_arg = vars_path.display().to_string();
        let cli = Cli::try_parse_from([
            "textweave",
            "page.html",
            "--vars",
            vars_arg.as_str(),
            "--front-matter",
            "--var",
            "url=/override",
        ])
        .unwrap();
        let doc = Document::new(
            "page.html",
            "<!--\ntitle: from header\nurl: /page\n-->\nbody",
            SystemTime::UNIX_EPOCH,
        );

        let vars = build_variables(&cli, &doc).unwrap();
        assert_eq!(vars["site.name"], "Docs");
        assert_eq!(vars["title"], "from header");
        assert_eq!(vars["url"], "/override");
        assert_eq!(vars["path"], "page.html");
    }

    #[test]
    fn test_dry_run_checks_nested_includes() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("layout.html"), r#"[{% include "gone.html" %}]"#)
            .unwrap();
        let mut renderer = site_renderer(&temp_dir);
        let doc = Document::new(
            "page.html",
            r#"{% include "layout.html" %}"#,
            SystemTime::UNIX_EPOCH,
        );

        assert!(!dry_run(&mut renderer, &doc).unwrap());

        fs::write(temp_dir.path().join("gone.html"), "here now").unwrap();
        assert!(dry_run(&mut renderer, &doc).unwrap());
    }

    #[test]
    fn test_dry_run_fails_on_cycle() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.html"), r#"{% include "b.html" %}"#).unwrap();
        fs::write(temp_dir.path().join("b.html"), r#"{% include "a.html" %}"#).unwrap();
        let mut renderer = site_renderer(&temp_dir);
        let doc = Document::new("page.html", r#"{% include "a.html" %}"#, SystemTime::UNIX_EPOCH);

        assert!(dry_run(&mut renderer, &doc).is_err());
    }

    #[test]
    fn test_list_directives_plain_and_json() {
        let temp_dir = TempDir::new().unwrap();
        let renderer = site_renderer(&temp_dir);
        let text = r#"{{ title }} {% include "nav.html" %} {{ site.name }}"#;
        let directives = collect_directives(&renderer, text);

        let plain = format_directives(&directives, ListFormat::Plain).unwrap();
        assert_eq!(plain, "variable title\ninclude nav.html\nvariable site.name\n");

        let json: Value =
            serde_json::from_str(&format_directives(&directives, ListFormat::Json).unwrap())
                .unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
        assert_eq!(json[0]["kind"], "variable");
        assert_eq!(json[0]["start"], 0);
        assert_eq!(json[1]["kind"], "include");
        assert_eq!(json[1]["reference"], "nav.html");
        assert_eq!(json[1]["start"], 12);
    }

    #[test]
    fn test_list_empty_template() {
        let temp_dir = TempDir::new().unwrap();
        let renderer = site_renderer(&temp_dir);
        let directives = collect_directives(&renderer, "plain text");
        assert_eq!(format_directives(&directives, ListFormat::Plain).unwrap(), "");
        assert_eq!(format_directives(&directives, ListFormat::Json).unwrap(), "[]\n");
    }

    #[test]
    fn test_is_up_to_date() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.html");
        assert!(!is_up_to_date(&output, at(100)));

        fs::write(&output, "rendered").unwrap();
        fs::File::options()
            .write(true)
            .open(&output)
            .unwrap()
            .set_modified(at(200))
            .unwrap();

        assert!(is_up_to_date(&output, at(100)));
        assert!(is_up_to_date(&output, at(200)));
        assert!(!is_up_to_date(&output, at(300)));
    }
}
