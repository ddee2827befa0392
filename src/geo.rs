use std::fs;
use std::io::{Read, Write};
use std::time::Duration;

use camino::Utf8Path;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::cancel::CancelToken;
use crate::domain::{GeoSeriesAccession, GeoSeriesGroup};
use crate::error::KiraError;

pub const DEFAULT_BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov";

pub trait GeoClient: Send + Sync {
    /// Fetches `{name}_RAW.tar` into `destination`, returning the byte count.
    /// Nothing is left at `destination` unless the whole body arrived.
    fn download_series_archive(
        &self,
        series: &GeoSeriesGroup,
        name: &GeoSeriesAccession,
        destination: &Utf8Path,
        cancel: &CancelToken,
    ) -> Result<u64, KiraError>;
}

#[derive(Clone)]
pub struct GeoHttpClient {
    client: Client,
    base_url: String,
}

impl GeoHttpClient {
    /// `timeout` bounds the whole request including the body; `None` waits
    /// for as long as the transfer takes.
    pub fn new(timeout: Option<Duration>) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gp/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::Transfer(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::Transfer(err.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn archive_url(&self, series: &GeoSeriesGroup, name: &GeoSeriesAccession) -> String {
        series_archive_url(&self.base_url, series, name)
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Utf8Path,
        cancel: &CancelToken,
    ) -> Result<u64, KiraError> {
        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let message = response
                .text()
                .map(|body| body.chars().take(200).collect())
                .unwrap_or_else(|_| "GEO request failed".to_string());
            return Err(KiraError::TransferStatus { status, message });
        }

        let parent = destination
            .parent()
            .ok_or_else(|| KiraError::Filesystem(format!("invalid destination {destination}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {parent}: {err}")))?;
        let mut temp = tempfile::Builder::new()
            .prefix("kira-gp-download")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;

        let mut written = 0u64;
        let mut buffer = vec![0u8; 256 * 1024];
        loop {
            cancel.check()?;
            let read = response
                .read(&mut buffer)
                .map_err(|err| KiraError::Transfer(err.to_string()))?;
            if read == 0 {
                break;
            }
            temp.write_all(&buffer[..read])
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            written += read as u64;
        }
        temp.flush()
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.persist(destination.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(written)
    }
}

impl GeoClient for GeoHttpClient {
    fn download_series_archive(
        &self,
        series: &GeoSeriesGroup,
        name: &GeoSeriesAccession,
        destination: &Utf8Path,
        cancel: &CancelToken,
    ) -> Result<u64, KiraError> {
        let url = self.archive_url(series, name);
        tracing::debug!(%url, "requesting series archive");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| KiraError::Transfer(err.to_string()))?;
        self.write_response_to_file(response, destination, cancel)
    }
}

/// `{base}/geo/series/{series}/{name}/suppl/{name}_RAW.tar`
pub fn series_archive_url(
    base_url: &str,
    series: &GeoSeriesGroup,
    name: &GeoSeriesAccession,
) -> String {
    format!(
        "{base}/geo/series/{series}/{name}/suppl/{name}_RAW.tar",
        base = base_url.trim_end_matches('/'),
        series = series.as_str(),
        name = name.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_url_layout() {
        let name: GeoSeriesAccession = "GSE68849".parse().unwrap();
        let url = series_archive_url(DEFAULT_BASE_URL, &name.series_group(), &name);
        assert_eq!(
            url,
            "https://ftp.ncbi.nlm.nih.gov/geo/series/GSE68nnn/GSE68849/suppl/GSE68849_RAW.tar"
        );
    }

    #[test]
    fn archive_url_tolerates_trailing_slash() {
        let name: GeoSeriesAccession = "GSE1000".parse().unwrap();
        let series: GeoSeriesGroup = "GSE1nnn".parse().unwrap();
        let url = series_archive_url("http://127.0.0.1:8080/", &series, &name);
        assert_eq!(
            url,
            "http://127.0.0.1:8080/geo/series/GSE1nnn/GSE1000/suppl/GSE1000_RAW.tar"
        );
    }

    #[test]
    fn client_uses_injected_base_url() {
        let name: GeoSeriesAccession = "GSE68849".parse().unwrap();
        let client = GeoHttpClient::new(None).unwrap();
        assert!(client
            .archive_url(&name.series_group(), &name)
            .starts_with(DEFAULT_BASE_URL));

        let client = client.with_base_url("http://127.0.0.1:8080");
        assert_eq!(
            client.archive_url(&name.series_group(), &name),
            "http://127.0.0.1:8080/geo/series/GSE68nnn/GSE68849/suppl/GSE68849_RAW.tar"
        );
    }
}
