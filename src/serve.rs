//! The watch-and-serve loop. The site is built once up front, then rebuilt
//! whenever a markdown source changes while the output directory is served
//! over HTTP.
//!
//! The server reads the output directory without any coordination with the
//! rebuilds, so a request that lands mid-rebuild may see a missing or partially
//! written file. Reloading the page after the rebuild completes fixes it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::build::{build_site, Error as BuildError};
use crate::config::Config;
use crate::note::MARKDOWN_EXTENSION;

/// Builds the site, then watches the source directory and serves the output
/// directory until the process is terminated. A failure of the initial build
/// is returned; failures of later rebuilds are logged and the last output
/// stays up.
pub async fn serve(config: Config) -> Result<()> {
    run(config, None).await
}

/// Like [`serve`], and once the server is listening opens `page` (a path
/// relative to the site root, e.g. `0042-groceries.html`) in the default
/// browser.
pub async fn serve_and_open(config: Config, page: &str) -> Result<()> {
    run(config, Some(page)).await
}

async fn run(config: Config, page: Option<&str>) -> Result<()> {
    build_site(&config)?;
    let config = Arc::new(config);

    let (tx, rx) = mpsc::unbounded_channel();
    let mut _watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )?;
    _watcher.watch(&config.source_directory, RecursiveMode::Recursive)?;
    tracing::info!("Watching {}", config.source_directory.display());

    tokio::spawn({
        let config = config.clone();
        rebuild_on_change(rx, move || build_site(&config))
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_address)
        .await
        .map_err(|err| Error::Bind {
            address: config.listen_address.clone(),
            err,
        })?;
    let url = format!("http://{}/", config.listen_address);
    tracing::info!("Serving at {}", url);

    if let Some(page) = page {
        let url = format!("{}{}", url, page);
        if let Err(err) = open::that(&url) {
            tracing::warn!("Failed to open browser: {}", err);
        }
    }

    axum::serve(listener, router(&config.output_directory)).await?;
    Ok(())
}

/// Runs `rebuild` for every event that passes [`is_rebuild_event`] until the
/// channel closes. Events queued while a rebuild runs are coalesced into the
/// next one. Rebuild and watcher failures are logged and the loop carries on,
/// leaving whatever the last successful rebuild wrote.
pub async fn rebuild_on_change<F>(
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    rebuild: F,
) where
    F: Fn() -> std::result::Result<(), BuildError> + Send + Sync + 'static,
{
    let rebuild = Arc::new(rebuild);
    while let Some(event) = rx.recv().await {
        match event {
            Ok(event) if is_rebuild_event(&event) => {
                while rx.try_recv().is_ok() {}
                tracing::info!("Change detected, rebuilding site...");
                let res = tokio::task::spawn_blocking({
                    let rebuild = rebuild.clone();
                    move || rebuild()
                })
                .await;

                match res {
                    Ok(Ok(())) => tracing::info!("Rebuild complete"),
                    Ok(Err(err)) => tracing::error!("Rebuild failed: {}", err),
                    Err(err) => tracing::error!("Rebuild task panicked: {}", err),
                }
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("Watcher error: {}", err),
        }
    }
}

/// The HTTP application: static files from `output_directory`, with `/`
/// answered by `index.html` and unknown paths by a 404.
pub fn router(output_directory: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(output_directory))
        .layer(TraceLayer::new_for_http())
}

/// Reports whether a filesystem event should trigger a rebuild: a creation
/// or modification touching a markdown file.
pub fn is_rebuild_event(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|path| {
            path.to_string_lossy().ends_with(MARKDOWN_EXTENSION)
        })
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for serving a site.
#[derive(Debug)]
pub enum Error {
    /// Returned when the initial build fails.
    Build(BuildError),

    /// Returned when the source directory can't be watched.
    Watch(notify::Error),

    /// Returned when the listen address can't be bound.
    Bind { address: String, err: std::io::Error },

    /// Returned when the server stops with an I/O error.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Build(err) => write!(f, "Building site: {}", err),
            Error::Watch(err) => write!(f, "Watching sources: {}", err),
            Error::Bind { address, err } => write!(f, "Binding to {}: {}", address, err),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Build(err) => Some(err),
            Error::Watch(err) => Some(err),
            Error::Bind { address: _, err } => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<BuildError> for Error {
    fn from(err: BuildError) -> Error {
        Error::Build(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Error {
        Error::Watch(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use std::fs;
    use tower::ServiceExt;

    fn event(kind: EventKind, path: impl AsRef<Path>) -> Event {
        Event::new(kind).add_path(path.as_ref().to_owned())
    }

    #[test]
    fn test_rebuild_events() {
        assert!(is_rebuild_event(&event(
            EventKind::Create(CreateKind::File),
            "/notes/0001-a.md"
        )));
        assert!(is_rebuild_event(&event(
            EventKind::Modify(ModifyKind::Any),
            "/notes/0001-a.md"
        )));
        assert!(!is_rebuild_event(&event(
            EventKind::Modify(ModifyKind::Any),
            "/notes/.0001-a.md.swp"
        )));
        assert!(!is_rebuild_event(&event(
            EventKind::Remove(RemoveKind::File),
            "/notes/0001-a.md"
        )));
        assert!(!is_rebuild_event(&event(
            EventKind::Access(AccessKind::Any),
            "/notes/0001-a.md"
        )));
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_router_serves_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        std::fs::write(dir.path().join("0001-a.html"), "<p>a</p>").unwrap();

        let (status, body) = get(router(dir.path()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>home</p>");

        let (status, body) = get(router(dir.path()), "/0001-a.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>a</p>");

        let (status, _) = get(router(dir.path()), "/missing.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_fails_when_initial_build_fails() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("src");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("0001-a.md"), "no delimiter").unwrap();
        let config = Config::new(&source, &root.path().join("www")).unwrap();

        assert!(matches!(serve(config).await, Err(Error::Build(_))));
    }

    #[tokio::test]
    async fn test_rebuild_on_change_survives_failed_rebuilds() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("src");
        fs::create_dir(&source).unwrap();
        let config = Config::new(&source, &root.path().join("www")).unwrap();
        let output = config.output_directory.clone();

        let (tx, rx) = mpsc::unbounded_channel();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(rebuild_on_change(rx, move || {
            let res = build_site(&config);
            let _ = done_tx.send(res.is_ok());
            res
        }));

        // Ignored events never trigger a rebuild.
        fs::write(
            source.join("0001-a.md"),
            "title: A\nvisibility: published\n---\nfirst\n",
        )
        .unwrap();
        tx.send(Ok(event(EventKind::Access(AccessKind::Any), source.join("0001-a.md"))))
            .unwrap();
        tx.send(Ok(event(EventKind::Create(CreateKind::File), source.join("0001-a.md"))))
            .unwrap();
        assert_eq!(done_rx.recv().await, Some(true));
        let (status, index) = get(router(&output), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(index.contains("0001-a.html"));

        fs::write(source.join("0002-b.md"), "title: B\nno delimiter\n").unwrap();
        tx.send(Ok(event(EventKind::Modify(ModifyKind::Any), source.join("0002-b.md"))))
            .unwrap();
        assert_eq!(done_rx.recv().await, Some(false));
        let (status, stale) = get(router(&output), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stale, index);

        tx.send(Err(notify::Error::generic("watch failed"))).unwrap();
        fs::write(
            source.join("0002-b.md"),
            "title: B\nvisibility: published\n---\nsecond\n",
        )
        .unwrap();
        tx.send(Ok(event(EventKind::Modify(ModifyKind::Any), source.join("0002-b.md"))))
            .unwrap();
        assert_eq!(done_rx.recv().await, Some(true));
        let (status, _) = get(router(&output), "/0002-b.html").await;
        assert_eq!(status, StatusCode::OK);

        drop(tx);
        handle.await.unwrap();
        assert!(done_rx.recv().await.is_none());
    }
}
