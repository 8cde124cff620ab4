use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use log::debug;
use reqwest::{Url, blocking::Client};

use super::AudioFetcher;

/// Fetches audio over http(s), or copies it when the URI names a local file.
///
/// Every fetch lands in a fresh file under `temp_dir`, keeping the
/// extension of the URI so tag codecs can recognise the container.
pub struct HttpFetcher {
    client: Client,
    temp_dir: PathBuf,
}

enum Source {
    Remote(Url),
    Local(PathBuf),
}

impl HttpFetcher {
    pub fn new<P: AsRef<Path>>(temp_dir: P) -> Self {
        Self {
            client: Client::new(),
            temp_dir: temp_dir.as_ref().to_path_buf(),
        }
    }

    fn source(uri: &str) -> anyhow::Result<Source> {
        match Url::parse(uri) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(Source::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Source::Local)
                .map_err(|_| anyhow::anyhow!("'{uri}' is not a valid file URI")),
            Ok(url) => anyhow::bail!("unsupported URI scheme '{}'", url.scheme()),
            // no scheme at all, treat as a plain path
            Err(_) => Ok(Source::Local(PathBuf::from(uri))),
        }
    }

    /// `.ext` of the last path segment, or empty
    fn suffix(source: &Source) -> String {
        let path = match source {
            Source::Remote(url) => PathBuf::from(url.path()),
            Source::Local(path) => path.clone(),
        };
        path.extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }
}

impl AudioFetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> anyhow::Result<PathBuf> {
        let source = Self::source(uri)?;

        std::fs::create_dir_all(&self.temp_dir).with_context(|| {
            format!(
                "failed to create temp dir {}",
                self.temp_dir.to_string_lossy()
            )
        })?;
        let mut tmp = tempfile::Builder::new()
            .prefix("muselib-")
            .suffix(&Self::suffix(&source))
            .tempfile_in(&self.temp_dir)?;

        match &source {
            Source::Remote(url) => {
                let mut response = self
                    .client
                    .get(url.clone())
                    .send()
                    .with_context(|| format!("request to {url} failed"))?
                    .error_for_status()?;
                response
                    .copy_to(&mut tmp)
                    .with_context(|| format!("failed to read body of {url}"))?;
            }
            Source::Local(path) => {
                let mut file = File::open(path)
                    .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
                io::copy(&mut file, &mut tmp)?;
            }
        }

        let (_, path) = tmp.keep()?;
        debug!("fetched {uri} into {}", path.to_string_lossy());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn fetches_local_path_keeping_extension() -> anyhow::Result<()> {
        let src_dir = tempdir()?;
        let tmp_dir = tempdir()?;
        let song = src_dir.path().join("song.flac");
        std::fs::write(&song, b"fLaC data")?;

        let fetcher = HttpFetcher::new(tmp_dir.path());
        let fetched = fetcher.fetch(&song.to_string_lossy())?;

        assert!(fetched.starts_with(tmp_dir.path()));
        assert_eq!(fetched.extension().unwrap(), "flac");
        assert_eq!(std::fs::read(&fetched)?, b"fLaC data");
        Ok(())
    }

    #[test]
    fn fetches_file_uri() -> anyhow::Result<()> {
        let src_dir = tempdir()?;
        let tmp_dir = tempdir()?;
        let song = src_dir.path().join("track.mp3");
        std::fs::write(&song, b"ID3")?;

        let uri = Url::from_file_path(&song).unwrap().to_string();
        let fetched = HttpFetcher::new(tmp_dir.path()).fetch(&uri)?;

        assert_eq!(std::fs::read(&fetched)?, b"ID3");
        assert_eq!(fetched.extension().unwrap(), "mp3");
        Ok(())
    }

    #[test]
    fn missing_local_file_is_a_diagnosed_error() -> anyhow::Result<()> {
        let tmp_dir = tempdir()?;

        let err = HttpFetcher::new(tmp_dir.path())
            .fetch("/no/such/song.mp3")
            .unwrap_err();

        assert!(format!("{err:#}").contains("failed to open"));
        // nothing left behind
        assert_eq!(std::fs::read_dir(tmp_dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn unsupported_scheme_is_rejected() -> anyhow::Result<()> {
        let tmp_dir = tempdir()?;
        let err = HttpFetcher::new(tmp_dir.path())
            .fetch("ftp://example.com/song.mp3")
            .unwrap_err();
        assert!(err.to_string().contains("unsupported URI scheme"));
        Ok(())
    }

    #[test]
    fn suffix_ignores_query_string() {
        let source = HttpFetcher::source("https://cdn.example/a/b/song.m4a?sig=abc").unwrap();
        assert_eq!(HttpFetcher::suffix(&source), ".m4a");
    }
}
