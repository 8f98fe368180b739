use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use url::Url;

use kb::build::build_site;
use kb::config::Config;
use kb::list::list_notes;
use kb::new::create_note;
use kb::note::Visibility;
use kb::serve::{serve, serve_and_open};

const DEFAULT_EDITOR: &str = "vi";

#[derive(Parser)]
#[command(name = "kb")]
#[command(author, version, about = "A personal knowledge base", long_about = None)]
struct Cli {
    /// Root directory holding `src/` and `www/`
    #[arg(long, env = "KB_ROOT", default_value = ".", global = true)]
    root: PathBuf,

    /// Directory with markdown files [default: <root>/src]
    #[arg(long, global = true)]
    src: Option<PathBuf>,

    /// Directory with generated html files [default: <root>/www]
    #[arg(long, global = true)]
    www: Option<PathBuf>,

    /// Site name, used for the page titles and the feeds
    #[arg(long, env = "KB_NAME", global = true)]
    site_name: Option<String>,

    /// Public URL of the generated site, used for feed links
    #[arg(long, env = "KB_URL", global = true)]
    base_url: Option<Url>,

    /// Project file [default: kb.yaml in <root> or one of its parents]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the notes in the source directory
    List {
        /// Include private notes
        #[arg(long)]
        private: bool,
    },

    /// Generate the site
    #[command(visible_alias = "gen", alias = "generate")]
    Build {
        /// Render private notes
        #[arg(long)]
        private: bool,
    },

    /// Generate the site, then rebuild on changes and serve it over HTTP
    Serve {
        #[command(flatten)]
        server: ServerArgs,

        /// Open the home page in the browser
        #[arg(long)]
        open: bool,
    },

    /// Create a new note and open it in $EDITOR
    New {
        /// Title of the note
        name: String,

        /// Visibility of the note
        #[arg(long, default_value_t = Visibility::Published)]
        visibility: Visibility,

        #[command(flatten)]
        server: ServerArgs,

        /// Don't serve the site while editing
        #[arg(long)]
        no_serve: bool,
    },
}

#[derive(Args)]
struct ServerArgs {
    /// Address to listen to
    #[arg(long)]
    addr: Option<String>,

    /// Render private notes
    #[arg(long)]
    private: bool,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let source_directory = self.src.clone().unwrap_or_else(|| self.root.join("src"));
        let output_directory = self.www.clone().unwrap_or_else(|| self.root.join("www"));
        let mut config = Config::new(&source_directory, &output_directory)?;

        let project_file = match &self.config {
            Some(path) => Some(path.clone()),
            None => Config::find_project_file(&self.root),
        };
        if let Some(path) = project_file {
            tracing::debug!("Using project file {}", path.display());
            config = config.with_project_file(&path)?;
        }

        if let Some(site_name) = &self.site_name {
            config.site_name = site_name.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.set_base_url(base_url.clone());
        }
        Ok(config)
    }
}

impl ServerArgs {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(addr) = &self.addr {
            config.listen_address = addr.clone();
        }
        config.include_private = self.private;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.config()?;
    match &cli.command {
        Commands::List { private } => {
            for note in list_notes(&config.source_directory, *private)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    note.path.display(),
                    note.visibility,
                    note.formatted_date(),
                    note.title
                );
            }
            Ok(())
        }
        Commands::Build { private } => {
            let mut config = config;
            config.include_private = *private;
            build_site(&config).with_context(|| {
                format!("Building site from {}", config.source_directory.display())
            })
        }
        Commands::Serve { server, open } => {
            let config = server.apply(config);
            if *open {
                serve_and_open(config, "").await?;
            } else {
                serve(config).await?;
            }
            Ok(())
        }
        Commands::New {
            name,
            visibility,
            server,
            no_serve,
        } => {
            let today = chrono::Local::now().date_naive();
            let path = create_note(&config.source_directory, name, *visibility, today)?;
            println!("{}", path.display());

            let mut editor = open_editor(&path)?;
            if *no_serve {
                let status = editor.wait().context("Waiting for the editor")?;
                if !status.success() {
                    bail!("Editor exited with {}", status);
                }
                return Ok(());
            }

            let page = page_for(&path)?;
            serve_and_open(server.apply(config), &page).await?;
            Ok(())
        }
    }
}

/// Starts `$EDITOR` (or [`DEFAULT_EDITOR`]) on `path` without waiting for it.
fn open_editor(path: &Path) -> Result<std::process::Child> {
    let editor = match std::env::var("EDITOR") {
        Ok(editor) if !editor.is_empty() => editor,
        _ => {
            tracing::warn!("No $EDITOR, falling back to {:?}", DEFAULT_EDITOR);
            DEFAULT_EDITOR.to_owned()
        }
    };
    Command::new(&editor)
        .arg(path)
        .spawn()
        .with_context(|| format!("Starting editor `{}`", editor))
}

fn page_for(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("Invalid note path {}", path.display()))?;
    Ok(format!("{}{}", stem, kb::note::HTML_EXTENSION))
}
