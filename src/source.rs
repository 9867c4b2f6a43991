//! Loading class files from disk, memory, jars and URLs.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::class_info::ClassInfo;
use crate::error::{Error, Result};

pub fn load_bytes(bytes: &[u8]) -> Result<ClassInfo> {
    Ok(ClassInfo::parse(bytes)?)
}

pub fn load_reader(mut reader: impl Read) -> Result<ClassInfo> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    load_bytes(&bytes)
}

pub fn load_path(path: impl AsRef<Path>) -> Result<ClassInfo> {
    let path = path.as_ref();
    debug!("loading {}", path.display());
    load_reader(BufReader::new(File::open(path)?))
}

/// Loads `entry` (e.g. `com/acme/Sample.class`) from the jar at `jar`.
#[cfg(feature = "jar")]
pub fn load_jar_entry(jar: impl AsRef<Path>, entry: &str) -> Result<ClassInfo> {
    let jar = jar.as_ref();
    debug!("loading {} from {}", entry, jar.display());
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(jar)?))?;
    let mut file = archive.by_name(entry)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    load_bytes(&bytes)
}

/// Loads a class from a `file:`, `jar:file:<jar>!/<entry>` or `http(s):` URL.
pub fn load_url(url: &str) -> Result<ClassInfo> {
    if let Some(rest) = url.strip_prefix("jar:") {
        let (jar, entry) = rest
            .split_once("!/")
            .ok_or_else(|| Error::UnsupportedUrl(url.to_string()))?;
        let jar = file_path(jar).ok_or_else(|| Error::UnsupportedUrl(url.to_string()))?;
        return load_jar_url(jar, entry, url);
    }
    if let Some(path) = file_path(url) {
        return load_path(path);
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return fetch(url);
    }
    Err(Error::UnsupportedUrl(url.to_string()))
}

fn file_path(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("file:")?;
    Some(rest.strip_prefix("//").unwrap_or(rest))
}

#[cfg(feature = "jar")]
fn load_jar_url(jar: &str, entry: &str, _url: &str) -> Result<ClassInfo> {
    load_jar_entry(jar, entry)
}

#[cfg(not(feature = "jar"))]
fn load_jar_url(_jar: &str, _entry: &str, url: &str) -> Result<ClassInfo> {
    Err(Error::UnsupportedUrl(url.to_string()))
}

#[cfg(feature = "http")]
fn fetch(url: &str) -> Result<ClassInfo> {
    debug!("fetching {}", url);
    let bytes = ureq::get(url).call()?.body_mut().read_to_vec()?;
    load_bytes(&bytes)
}

#[cfg(not(feature = "http"))]
fn fetch(url: &str) -> Result<ClassInfo> {
    Err(Error::UnsupportedUrl(url.to_string()))
}
