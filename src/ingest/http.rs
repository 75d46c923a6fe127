//! HTTP snapshot source.
//!
//! Issues one bounded-timeout GET per frame against a camera endpoint that
//! serves a single JPEG. Only an HTTP 200 response is stored; the body lands
//! in a sibling temp file first and is renamed into place once complete.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use super::FrameSource;

const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Camera endpoint polled by the acquisition loop.
pub struct HttpSource {
    agent: ureq::Agent,
    url: String,
    frames_fetched: u64,
    failures: u64,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            url: url.to_string(),
            frames_fetched: 0,
            failures: 0,
        }
    }

    pub fn stats(&self) -> HttpStats {
        HttpStats {
            frames_fetched: self.frames_fetched,
            failures: self.failures,
            url: self.url.clone(),
        }
    }
}

impl FrameSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&mut self, destination: &Path) -> bool {
        let ok = download_image(&self.agent, &self.url, destination, &[]);
        if ok {
            self.frames_fetched += 1;
        } else {
            self.failures += 1;
        }
        ok
    }
}

/// Fetch statistics for an HTTP source.
#[derive(Clone, Debug)]
pub struct HttpStats {
    pub frames_fetched: u64,
    pub failures: u64,
    pub url: String,
}

/// Agent whose connect, read and write phases are all bounded by `timeout`.
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

/// Download `url` into `destination`, sending the extra `headers`.
///
/// Logs and returns `false` on transport errors, timeouts and any status
/// other than 200. The destination is untouched unless the download succeeds.
pub fn download_image(
    agent: &ureq::Agent,
    url: &str,
    destination: &Path,
    headers: &[(&str, &str)],
) -> bool {
    match try_download(agent, url, destination, headers) {
        Ok(bytes) => {
            log::info!(
                "downloaded {} ({} bytes)",
                display_name(destination),
                bytes
            );
            true
        }
        Err(e) => {
            log::warn!("failed to download {}: {:#}", display_name(destination), e);
            false
        }
    }
}

fn try_download(
    agent: &ureq::Agent,
    url: &str,
    destination: &Path,
    headers: &[(&str, &str)],
) -> Result<usize> {
    let mut request = agent.get(url);
    for (name, value) in headers {
        request = request.set(name, value);
    }
    let response = match request.call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            return Err(anyhow!("{} {} from {}", code, response.status_text(), url))
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!("request to {} failed", url)))
        }
    };
    if response.status() != 200 {
        return Err(anyhow!(
            "{} {} from {}",
            response.status(),
            response.status_text(),
            url
        ));
    }

    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_IMAGE_BYTES + 1)
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read body from {}", url))?;
    if bytes.len() as u64 > MAX_IMAGE_BYTES {
        return Err(anyhow!("image from {} exceeds {} bytes", url, MAX_IMAGE_BYTES));
    }

    write_new_file(destination, &bytes)?;
    Ok(bytes.len())
}

fn write_new_file(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("part");
    let written = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("failed to write {}", path.display()));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serve a single canned HTTP response and hand back the request head.
    fn serve_once(status: &str, body: &'static [u8]) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = std::io::BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            let mut stream = stream;
            let header = format!(
                "HTTP/1.1 {}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(header.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
            let _ = tx.send(head);
        });
        (format!("http://{}/snapshot.jpg", addr), rx)
    }

    #[test]
    fn stores_body_on_200() -> Result<()> {
        let (url, _head) = serve_once("200 OK", b"\xFF\xD8jpeg-bytes\xFF\xD9");
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("20240517090000.jpg");

        let mut source = HttpSource::new(&url, Duration::from_secs(5));
        assert!(source.fetch(&dest));
        assert_eq!(fs::read(&dest)?, b"\xFF\xD8jpeg-bytes\xFF\xD9");
        assert_eq!(source.stats().frames_fetched, 1);
        Ok(())
    }

    #[test]
    fn not_found_leaves_directory_unchanged() -> Result<()> {
        let (url, _head) = serve_once("404 Not Found", b"missing");
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("20240517090000.jpg");

        let mut source = HttpSource::new(&url, Duration::from_secs(5));
        assert!(!source.fetch(&dest));
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        assert_eq!(source.stats().failures, 1);
        Ok(())
    }

    #[test]
    fn non_200_success_is_rejected() -> Result<()> {
        let (url, _head) = serve_once("204 No Content", b"");
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("frame.jpg");

        let agent = build_agent(Duration::from_secs(5));
        assert!(!download_image(&agent, &url, &dest, &[]));
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn unreachable_endpoint_reports_failure() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}/snapshot.jpg", listener.local_addr()?);
        drop(listener);
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("frame.jpg");

        let agent = build_agent(Duration::from_secs(2));
        assert!(!download_image(&agent, &url, &dest, &[]));
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn sends_extra_headers() -> Result<()> {
        let (url, head) = serve_once("200 OK", b"img");
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("labelled.jpg");

        let agent = build_agent(Duration::from_secs(5));
        assert!(download_image(
            &agent,
            &url,
            &dest,
            &[("Authorization", "Token abc123")]
        ));
        let head = head.recv_timeout(Duration::from_secs(5))?;
        assert!(head.to_lowercase().contains("authorization: token abc123"));
        Ok(())
    }
}
