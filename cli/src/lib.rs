use anyhow::{anyhow, Error, Result};
use clap::{Parser, Subcommand};
use log::info;
use oxigraph::model::Term;
use serde_json::{json, Map, Value};
use sparqlrepo::formats::SPARQL_RESULTS_JSON;
use sparqlrepo::{
    AuthScheme, Credentials, Dialect, GraphFormat, Purpose, RepoConfig, Repository, ResultSet,
};
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sparqlrepo")]
#[command(about = "Send SPARQL queries and updates to an RDF triple store")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, default_value = "false", global = true)]
    verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, default_value = "false", global = true)]
    debug: bool,
    /// JSON repository config file; flags given on the command line override its values
    #[clap(long, short, global = true)]
    config: Option<PathBuf>,
    /// SPARQL endpoint URL
    #[clap(long, short, global = true)]
    endpoint: Option<String>,
    /// Backend dialect: sparql, ontotext or oracle
    #[clap(long, global = true)]
    dialect: Option<String>,
    /// Request timeout in seconds
    #[clap(long, global = true)]
    timeout: Option<u64>,
    /// Username for HTTP authentication
    #[clap(long, short, global = true, requires = "password")]
    user: Option<String>,
    /// Password for HTTP authentication
    #[clap(long, global = true, requires = "user")]
    password: Option<String>,
    /// Authentication scheme for --user/--password: digest (default) or basic
    #[clap(long, global = true, requires = "user")]
    auth: Option<String>,
}

#[derive(Debug, clap::Args)]
struct QueryText {
    /// Query text; use `-` to read from stdin
    #[clap(conflicts_with = "file")]
    text: Option<String>,
    /// Read the query from a file
    #[clap(long, short)]
    file: Option<PathBuf>,
}

impl QueryText {
    fn read(&self) -> Result<String> {
        match (&self.text, &self.file) {
            (_, Some(path)) => Ok(std::fs::read_to_string(path)?),
            (Some(text), None) if text == "-" => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                Ok(buf)
            }
            (Some(text), None) => Ok(text.clone()),
            (None, None) => Err(anyhow!("No query given. Pass it as an argument or with --file")),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a SELECT or ASK query and print the results as JSON
    Query {
        #[command(flatten)]
        query: QueryText,
    },
    /// Run a CONSTRUCT query and print the response body
    Construct {
        #[command(flatten)]
        query: QueryText,
        /// Media type to request, e.g. text/turtle or application/n-quads
        #[clap(long, default_value = "text/turtle")]
        format: String,
        /// Parse the response and print the number of triples instead of the body
        #[clap(long, action)]
        count: bool,
    },
    /// Send a SPARQL update
    Update {
        #[command(flatten)]
        query: QueryText,
    },
    /// Print the HTTP request that would be sent, without sending it
    Encode {
        #[command(flatten)]
        query: QueryText,
        /// Accept header to encode
        #[clap(long, default_value = SPARQL_RESULTS_JSON)]
        accept: String,
        /// Encode as an update regardless of the query text
        #[clap(long, action)]
        write: bool,
    },
}

pub fn run() -> Result<()> {
    let cmd = Cli::parse();
    execute(cmd)
}

pub fn run_from_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cmd = Cli::try_parse_from(args).map_err(Error::from)?;
    execute(cmd)
}

fn init_logging(cmd: &Cli) {
    // CLI flags take precedence over RUST_LOG; default to "warn"
    if cmd.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if cmd.verbose {
        std::env::set_var("RUST_LOG", "info");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = env_logger::try_init();
}

fn build_config(cmd: &Cli) -> Result<RepoConfig> {
    let base = match &cmd.config {
        Some(path) => Some(RepoConfig::from_file(path)?),
        None => None,
    };
    let endpoint = cmd
        .endpoint
        .clone()
        .or_else(|| base.as_ref().map(|c| c.endpoint.clone()))
        .ok_or_else(|| anyhow!("No endpoint given. Use --endpoint or --config"))?;

    let mut builder = RepoConfig::builder();
    builder.endpoint(endpoint);
    if let Some(base) = &base {
        builder.dialect(base.dialect);
        if let Some(secs) = base.timeout_secs {
            builder.timeout_secs(secs);
        }
        if let Some(creds) = &base.credentials {
            builder.credentials(creds.clone());
        }
    }
    if let Some(name) = &cmd.dialect {
        builder.dialect(name.parse::<Dialect>()?);
    }
    if let Some(secs) = cmd.timeout {
        builder.timeout_secs(secs);
    }
    if let (Some(user), Some(password)) = (&cmd.user, &cmd.password) {
        let mut creds = Credentials::new(user, password);
        if let Some(scheme) = &cmd.auth {
            creds = creds.with_scheme(scheme.parse::<AuthScheme>().map_err(|e| anyhow!(e))?);
        }
        builder.credentials(creds);
    }
    Ok(builder.build()?)
}

fn term_to_json(term: &Term) -> Value {
    Value::String(term.to_string())
}

/// Renders results as `{"vars": [...], "rows": [{var: term}]}` or `{"boolean": b}` for ASK.
fn results_to_json(results: &ResultSet) -> Value {
    if let Some(answer) = results.boolean() {
        return json!({ "boolean": answer });
    }
    let rows: Vec<Value> = results
        .iter()
        .map(|row| {
            let obj: Map<String, Value> = row
                .iter()
                .map(|(var, term)| (var.to_string(), term_to_json(term)))
                .collect();
            Value::Object(obj)
        })
        .collect();
    json!({ "vars": results.variables(), "rows": rows })
}

fn execute(cmd: Cli) -> Result<()> {
    init_logging(&cmd);
    let config = build_config(&cmd)?;
    info!("Endpoint {} ({} dialect)", config.endpoint, config.dialect);

    match &cmd.command {
        Commands::Query { query } => {
            let repo = Repository::new(&config)?;
            let results = repo.query(&query.read()?)?;
            println!("{}", serde_json::to_string_pretty(&results_to_json(&results))?);
        }
        Commands::Construct {
            query,
            format,
            count,
        } => {
            let format: GraphFormat = format.parse().map_err(|e: String| anyhow!(e))?;
            let repo = Repository::new(&config)?;
            let text = query.read()?;
            if *count {
                let quads = repo.construct_quads(&text, format)?;
                println!("{}", quads.len());
            } else {
                let body = repo.construct_format(&text, format)?;
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&body)?;
                stdout.flush()?;
            }
        }
        Commands::Update { query } => {
            let repo = Repository::new(&config)?;
            repo.update(&query.read()?)?;
            info!("Update accepted");
        }
        Commands::Encode {
            query,
            accept,
            write,
        } => {
            let text = query.read()?;
            let purpose = if *write {
                Purpose::Write
            } else {
                Purpose::classify(&text)
            };
            let request = config
                .dialect
                .encode(&config.endpoint_url()?, &text, purpose, accept)?;
            println!("{} {}", request.method, request.url);
            for (name, value) in request.headers.iter() {
                println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
            if !request.body.is_empty() {
                println!();
                println!("{}", request.body_str());
            }
        }
    }
    Ok(())
}
