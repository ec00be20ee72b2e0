//! Read-only keyed collections filled in while a request is built.

use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use ahash::AHashMap;
use compact_str::CompactString;
use derive_more::Deref;
use strum::{AsRefStr, IntoStaticStr};
use tempfile::NamedTempFile;

#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr)]
#[non_exhaustive]
pub enum Header {
    #[strum(serialize = "accept")]
    ACCEPT,
    #[strum(serialize = "content-length")]
    CONTENT_LENGTH,
    #[strum(serialize = "content-type")]
    CONTENT_TYPE,
    #[strum(serialize = "host")]
    HOST,
    #[strum(serialize = "user-agent")]
    USER_AGENT,
    #[strum(serialize = "x-forwarded-for")]
    X_FORWARDED_FOR,
    #[strum(serialize = "x-http-method-override")]
    X_HTTP_METHOD_OVERRIDE,
    #[strum(serialize = "transfer-encoding")]
    TRANSFER_ENCODING,
    #[strum(serialize = "x-requested-with")]
    X_REQUESTED_WITH,
}

/// Header names compare case-insensitively; insertion order and repeated values are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    entries: Vec<(CompactString, Vec<CompactString>)>,
}

impl HeaderBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: &str, value: &str) {
        let value = CompactString::from(value.trim());
        match self.position(name) {
            Some(idx) => self.entries[idx].1.push(value),
            None => self.entries.push((name.into(), vec![value])),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(c, _)| unicase::eq(c.as_str(), name))
    }

    /// First value of `name`.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        self.get_all(name).first().map(|c| c.as_str())
    }

    pub fn get_all(&self, name: impl AsRef<str>) -> &[CompactString] {
        self.position(name.as_ref())
            .map(|idx| self.entries[idx].1.as_slice())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.position(name.as_ref()).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[CompactString])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for HeaderBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut bag = Self::new();
        for (name, value) in iter {
            bag.append(name.as_ref(), value.as_ref());
        }
        bag
    }
}

impl From<&http::HeaderMap> for HeaderBag {
    fn from(headers: &http::HeaderMap) -> Self {
        headers
            .iter()
            .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes())))
            .collect()
    }
}

/// Decoded key/value parameters; a repeated key keeps its last value.
#[derive(Debug, Clone, Default, Deref)]
pub struct ParameterBag(AHashMap<CompactString, CompactString>);

impl ParameterBag {
    pub fn from_urlencoded(input: &[u8]) -> Self {
        form_urlencoded::parse(input)
            .map(|(key, value)| (CompactString::from(key), CompactString::from(value)))
            .collect()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|c| c.as_str())
    }

    pub(crate) fn insert(&mut self, name: CompactString, value: CompactString) {
        self.0.insert(name, value);
    }
}

impl<K: Into<CompactString>, V: Into<CompactString>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// A file part of a multipart body, stored in a temporary file removed on drop.
#[derive(Debug)]
pub struct UploadedFile {
    client_name: CompactString,
    mime_type: CompactString,
    size: u64,
    file: NamedTempFile,
}

impl UploadedFile {
    pub fn new(
        file: NamedTempFile,
        client_name: impl Into<CompactString>,
        mime_type: impl Into<CompactString>,
    ) -> std::io::Result<Self> {
        let size = file.as_file().metadata()?.len();
        Ok(Self {
            client_name: client_name.into(),
            mime_type: mime_type.into(),
            size,
            file,
        })
    }

    /// Writes `content` to a fresh temporary file.
    pub fn persist(
        content: &[u8],
        client_name: impl Into<CompactString>,
        mime_type: impl Into<CompactString>,
    ) -> std::io::Result<Self> {
        let mut file = NamedTempFile::new()?;
        file.write_all(content)?;
        file.flush()?;
        Self::new(file, client_name, mime_type)
    }

    /// File name as sent by the client.
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Debug, Default, Deref)]
pub struct FileBag(AHashMap<CompactString, UploadedFile>);

impl FileBag {
    pub(crate) fn insert(&mut self, field: CompactString, file: UploadedFile) {
        self.0.insert(field, file);
    }
}

impl<K: Into<CompactString>> FromIterator<(K, UploadedFile)> for FileBag {
    fn from_iter<T: IntoIterator<Item = (K, UploadedFile)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(key, file)| (key.into(), file)).collect())
    }
}

#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum ServerKey {
    REMOTE_ADDR,
    REMOTE_PORT,
    SERVER_PROTOCOL,
    SERVER_NAME,
    REQUEST_METHOD,
    REQUEST_URI,
    QUERY_STRING,
    REQUEST_TIME,
}

impl ServerKey {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Transport and environment metadata, keyed like CGI variables.
#[derive(Debug, Clone, Default, Deref)]
pub struct ServerBag(AHashMap<CompactString, CompactString>);

impl ServerBag {
    pub fn get_key(&self, key: ServerKey) -> Option<&str> {
        self.0.get(key.as_str()).map(|c| c.as_str())
    }

    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.get_key(ServerKey::REMOTE_ADDR)
            .and_then(|c| IpAddr::from_str(c).ok())
    }

    pub(crate) fn insert(&mut self, key: impl Into<CompactString>, value: impl Into<CompactString>) {
        self.0.insert(key.into(), value.into());
    }

    pub(crate) fn insert_missing(&mut self, key: ServerKey, value: impl Into<CompactString>) {
        self.0
            .entry(key.as_str().into())
            .or_insert_with(|| value.into());
    }
}

impl<K: Into<CompactString>, V: Into<CompactString>> FromIterator<(K, V)> for ServerBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let bag: HeaderBag = [
            ("Content-Type", "application/json"),
            ("X-Forwarded-For", "10.0.0.1"),
            ("x-forwarded-for", "10.0.0.2"),
        ]
        .into_iter()
        .collect();

        assert_eq!(bag.len(), 2);
        assert_eq!(bag.get(Header::CONTENT_TYPE), Some("application/json"));
        assert_eq!(bag.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(bag.get_all(Header::X_FORWARDED_FOR), ["10.0.0.1", "10.0.0.2"]);
        assert!(bag.get_all("missing").is_empty());
        assert_eq!(bag.iter().next().map(|(name, _)| name), Some("Content-Type"));
    }

    #[test]
    fn header_bag_from_http() {
        let mut map = http::HeaderMap::new();
        map.append("accept", "text/html".parse().unwrap());
        map.append("accept", "*/*".parse().unwrap());

        let bag = HeaderBag::from(&map);
        assert_eq!(bag.get_all(Header::ACCEPT), ["text/html", "*/*"]);
    }

    #[test]
    fn urlencoded_parameters() {
        let bag = ParameterBag::from_urlencoded(b"q=hello+world&page=1&page=2&e=%C3%A9");
        assert_eq!(bag.get_str("q"), Some("hello world"));
        assert_eq!(bag.get_str("page"), Some("2"));
        assert_eq!(bag.get_str("e"), Some("é"));
        assert_eq!(bag.len(), 3);
    }

    #[test]
    fn uploaded_file_is_persisted() {
        let file = UploadedFile::persist(b"hello", "hello.txt", "text/plain").unwrap();
        assert_eq!(file.size(), 5);
        assert_eq!(file.client_name(), "hello.txt");
        assert_eq!(std::fs::read(file.path()).unwrap(), b"hello");

        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn server_remote_addr() {
        let bag: ServerBag = [("REMOTE_ADDR", "192.168.0.7")].into_iter().collect();
        assert_eq!(bag.remote_addr(), Some("192.168.0.7".parse().unwrap()));
        assert_eq!(bag.get_key(ServerKey::REMOTE_PORT), None);
        assert_eq!(ServerKey::REQUEST_TIME.as_str(), "REQUEST_TIME");
    }
}
