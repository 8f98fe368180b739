//! The [`Config`] value threaded through every entry point. It is built once
//! at startup, from defaults, an optional `kb.yaml` project file and
//! command-line overrides, and never changes afterwards.

use crate::feed::FeedConfig;
use crate::page::DEFAULT_INTRO;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the optional project file.
pub const PROJECT_FILE: &str = "kb.yaml";

pub const DEFAULT_SITE_NAME: &str = "kb";
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:8000";

/// The author credited in the feeds.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct Project {
    site_name: Option<String>,
    base_url: Option<Url>,
    intro: Option<String>,
    author: Option<Author>,
    page_template: Option<PathBuf>,
    listen_address: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// The directory holding the markdown sources.
    pub source_directory: PathBuf,

    /// The directory the site is generated into. It is deleted and recreated
    /// on every build.
    pub output_directory: PathBuf,

    /// The `host:port` the server listens on.
    pub listen_address: String,

    pub site_name: String,

    /// The public URL of the output directory, always ending in a slash.
    pub base_url: Url,

    /// HTML shown at the top of the home page.
    pub intro: String,

    pub author: Option<Author>,

    /// A gtmpl page template replacing the built-in one.
    pub page_template: Option<PathBuf>,

    /// Whether private notes are rendered and listed.
    pub include_private: bool,
}

impl Config {
    /// Constructs a [`Config`] with default settings for the given source
    /// and output directories.
    pub fn new(source_directory: &Path, output_directory: &Path) -> Result<Config> {
        Ok(Config {
            source_directory: source_directory.to_owned(),
            output_directory: output_directory.to_owned(),
            listen_address: DEFAULT_LISTEN_ADDRESS.to_owned(),
            site_name: DEFAULT_SITE_NAME.to_owned(),
            base_url: Url::parse(&format!("http://{}/", DEFAULT_LISTEN_ADDRESS))?,
            intro: DEFAULT_INTRO.to_owned(),
            author: None,
            page_template: None,
            include_private: false,
        })
    }

    /// Looks for [`PROJECT_FILE`] in `dir` and then in each of its parents.
    pub fn find_project_file(dir: &Path) -> Option<PathBuf> {
        let path = dir.join(PROJECT_FILE);
        if path.is_file() {
            Some(path)
        } else {
            dir.parent().and_then(Config::find_project_file)
        }
    }

    /// Applies the settings of the project file at `path`. A relative
    /// `page_template` is resolved against the project file's directory.
    pub fn with_project_file(mut self, path: &Path) -> Result<Config> {
        let file = File::open(path)
            .with_context(|| format!("Opening project file `{}`", path.display()))?;
        let project: Project = serde_yaml::from_reader(file)
            .with_context(|| format!("Loading configuration from `{}`", path.display()))?;
        let project_root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )
        })?;

        if let Some(site_name) = project.site_name {
            self.site_name = site_name;
        }
        if let Some(base_url) = project.base_url {
            self.set_base_url(base_url);
        }
        if let Some(intro) = project.intro {
            self.intro = intro;
        }
        if let Some(listen_address) = project.listen_address {
            self.listen_address = listen_address;
        }
        if project.author.is_some() {
            self.author = project.author;
        }
        if let Some(page_template) = project.page_template {
            self.page_template = Some(project_root.join(page_template));
        }
        Ok(self)
    }

    /// Sets the base URL, adding a trailing slash if it's missing so that
    /// page links join onto it rather than replacing its last segment.
    pub fn set_base_url(&mut self, mut base_url: Url) {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        self.base_url = base_url;
    }

    pub fn feed_config(&self) -> FeedConfig<'_> {
        FeedConfig {
            title: &self.site_name,
            description: &self.site_name,
            author: self.author.as_ref(),
            base_url: &self.base_url,
        }
    }
}
