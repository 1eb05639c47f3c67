use std::io::Write;
use std::sync::Arc;

use loreqa::catalog::TagCatalog;
use loreqa::cli::{Cli, Commands, ConfigAction};
use loreqa::config::Config;
use loreqa::error::{LoreqaError, Result};
use loreqa::exemplars::{ExemplarLibrary, ExemplarSelector};
use loreqa::llm::OpenAiCompatClient;
use loreqa::orchestrator::Orchestrator;
use loreqa::retrieval::{ExternalSearch, HttpExternalSearch, HttpPassageIndex};
use loreqa::routing::KeywordRouter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Ask {
            query,
            work,
            diagnostics,
        } => cmd_ask(cli.config, &query, work, diagnostics)?,
        Commands::Chat => cmd_chat(cli.config)?,
        Commands::Route { query } => cmd_route(cli.config, &query)?,
        Commands::Config { action } => cmd_config(cli.config, action)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "loreqa=debug" } else { "loreqa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

/// Build the full engine from config: catalog, exemplars, index client,
/// optional external search, LLM client.
fn build_orchestrator(config: &Config) -> Result<(Orchestrator, TagCatalog)> {
    let catalog = load_catalog(config)?;
    let exemplars = load_exemplars(config)?;

    let index = HttpPassageIndex::new(&config.index)
        .map_err(|e| LoreqaError::Config(format!("index client: {}", e)))?;
    let external: Option<Arc<dyn ExternalSearch>> = HttpExternalSearch::from_config(&config.external)
        .map(|client| Arc::new(client) as Arc<dyn ExternalSearch>);
    let llm = OpenAiCompatClient::from_config(&config.llm)?;

    let orchestrator = Orchestrator::new(
        config,
        &catalog,
        exemplars,
        Arc::new(index),
        external,
        Arc::new(llm),
    );

    Ok((orchestrator, catalog))
}

fn load_catalog(config: &Config) -> Result<TagCatalog> {
    let path = expand_path(&config.catalog.works_file)?;
    if path.exists() {
        TagCatalog::load(&path)
    } else {
        tracing::debug!(path = %path.display(), "works file not found, using built-in catalog");
        Ok(TagCatalog::default())
    }
}

fn load_exemplars(config: &Config) -> Result<ExemplarLibrary> {
    let path = expand_path(&config.catalog.exemplars_file)?;
    if path.exists() {
        ExemplarLibrary::load(&path)
    } else {
        tracing::debug!(path = %path.display(), "exemplar file not found, using built-in library");
        Ok(ExemplarLibrary::default())
    }
}

fn cmd_ask(
    config_path: Option<std::path::PathBuf>,
    query: &str,
    work: Option<String>,
    show_diagnostics: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let (mut orchestrator, catalog) = build_orchestrator(&config)?;

    let filter = work.map(|id| catalog.work_filter(&id)).transpose()?;

    let runtime = runtime()?;
    let answer = runtime.block_on(orchestrator.answer_filtered(query, filter.as_ref()))?;

    println!("{}", answer.text);

    if show_diagnostics {
        let json =
            serde_json::to_string_pretty(&answer.diagnostics).map_err(|e| LoreqaError::Json {
                source: e,
                context: "Failed to serialize diagnostics".to_string(),
            })?;
        eprintln!("\n{}", json);
    }

    Ok(())
}

fn cmd_chat(config_path: Option<std::path::PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let (mut orchestrator, _catalog) = build_orchestrator(&config)?;
    let runtime = runtime()?;

    println!("loreqa chat — /clear resets memory, /quit leaves");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().map_err(|e| LoreqaError::Io {
            source: e,
            context: "Failed to flush stdout".to_string(),
        })?;

        let mut line = String::new();
        let read = stdin.read_line(&mut line).map_err(|e| LoreqaError::Io {
            source: e,
            context: "Failed to read from stdin".to_string(),
        })?;
        if read == 0 {
            break;
        }

        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                orchestrator.clear_memory();
                println!("memory cleared");
                continue;
            }
            query => {
                let result = runtime.block_on(orchestrator.answer_streamed(query, |chunk| {
                    print!("{}", chunk);
                    let _ = std::io::stdout().flush();
                }));

                match result {
                    Ok(answer) => {
                        println!();
                        tracing::debug!(
                            tier = %answer.diagnostics.tier,
                            k = answer.diagnostics.requested_k,
                            "turn complete"
                        );
                    }
                    Err(e) => eprintln!("\nerror: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn cmd_route(config_path: Option<std::path::PathBuf>, query: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = load_catalog(&config)?;
    let exemplars = load_exemplars(&config)?;

    let router = KeywordRouter::new(&catalog, &config.retrieval);
    let selector = ExemplarSelector::new(exemplars);

    let decision = router.route(query);
    let kind = selector.classify(query);

    println!("query:        {}", query);
    println!("fast path:    {}", decision.fast_path);
    println!("reason:       {}", decision.reason);
    println!("fan-out:      {}", router.fan_out(&decision));
    println!(
        "exemplars:    {}",
        kind.map(|k| k.to_string()).unwrap_or_else(|| "unclassified".to_string())
    );

    Ok(())
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| LoreqaError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = Config::default_path()?;

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| LoreqaError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());

            let config_dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            install_templates(config_dir, force)?;
            println!("✓ Catalog templates installed");
            println!("  - works.toml: tag catalog and router keywords");
            println!("  - exemplars.toml: few-shot answer exemplars");
        }
    }

    Ok(())
}

/// Write the compiled-in catalog templates next to the config file
fn install_templates(config_dir: &std::path::Path, force: bool) -> Result<()> {
    let works_path = config_dir.join("works.toml");
    let exemplars_path = config_dir.join("exemplars.toml");

    if force || !works_path.exists() {
        let content = include_str!("../config-templates/works.toml");
        std::fs::write(&works_path, content).map_err(|e| LoreqaError::Io {
            source: e,
            context: format!("Failed to write works.toml: {:?}", works_path),
        })?;
    }

    if force || !exemplars_path.exists() {
        let content = include_str!("../config-templates/exemplars.toml");
        std::fs::write(&exemplars_path, content).map_err(|e| LoreqaError::Io {
            source: e,
            context: format!("Failed to write exemplars.toml: {:?}", exemplars_path),
        })?;
    }

    Ok(())
}

fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'loreqa config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| LoreqaError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn expand_path(path: &std::path::Path) -> Result<std::path::PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| LoreqaError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| LoreqaError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
