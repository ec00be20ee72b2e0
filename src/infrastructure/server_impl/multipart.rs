//! `multipart/form-data` bodies.

use compact_str::CompactString;
use httparse::Status;
use log::trace;
use memchr::memmem;

use crate::domain::errors::RequestError;
use crate::infrastructure::bags::{FileBag, ParameterBag, UploadedFile};

const MAX_PART_HEADERS: usize = 8;
const DEFAULT_FILE_MIME: &str = "application/octet-stream";

/// Boundary of a `multipart/form-data` content type.
pub fn boundary(content_type: &str) -> Option<&str> {
    let (mime, params) = content_type.split_once(';')?;
    if !unicase::eq(mime.trim(), "multipart/form-data") {
        return None;
    }

    params
        .split(';')
        .filter_map(|c| c.split_once('='))
        .find(|(key, _)| unicase::eq(key.trim(), "boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|c| !c.is_empty())
}

/// Splits `body` into text fields and uploaded files.
pub fn parse_multipart(
    body: &[u8],
    boundary: &str,
) -> Result<(ParameterBag, FileBag), RequestError> {
    // a delimiter only counts at the start of the body or of a line
    let delimiter = format!("\r\n--{boundary}");
    let finder = memmem::Finder::new(delimiter.as_bytes());

    let mut fields = ParameterBag::default();
    let mut files = FileBag::default();

    let mut rest = match body.strip_prefix(&delimiter.as_bytes()[2..]) {
        Some(rest) => rest,
        None => {
            let start = finder
                .find(body)
                .ok_or(RequestError::Multipart("missing boundary"))?;
            &body[start + delimiter.len()..]
        }
    };

    loop {
        if rest.starts_with(b"--") {
            return Ok((fields, files));
        }

        rest = rest
            .strip_prefix(b"\r\n")
            .ok_or(RequestError::Multipart("malformed boundary line"))?;
        let end = finder
            .find(rest)
            .ok_or(RequestError::Multipart("unterminated part"))?;

        parse_part(&rest[..end], &mut fields, &mut files)?;
        rest = &rest[end + delimiter.len()..];
    }
}

fn parse_part(
    part: &[u8],
    fields: &mut ParameterBag,
    files: &mut FileBag,
) -> Result<(), RequestError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
    let (offset, headers) = match httparse::parse_headers(part, &mut headers)? {
        Status::Complete(c) => c,
        Status::Partial => return Err(RequestError::Multipart("incomplete part headers")),
    };
    let content = &part[offset..];

    let header = |name: &str| {
        headers
            .iter()
            .find(|c| unicase::eq(c.name, name))
            .map(|c| String::from_utf8_lossy(c.value))
    };

    let disposition = header("content-disposition")
        .ok_or(RequestError::Multipart("part without content-disposition"))?;
    let (name, file_name) = disposition_params(&disposition);

    let Some(name) = name else {
        trace!("skipping unnamed multipart part");
        return Ok(());
    };

    match file_name {
        // a file input submitted without a file
        Some("") => {}
        Some(file_name) => {
            let mime = header("content-type");
            let mime = mime.as_deref().map_or(DEFAULT_FILE_MIME, str::trim);
            let file = UploadedFile::persist(content, file_name, mime)?;
            trace!("stored upload `{name}` ({} bytes)", file.size());
            files.insert(name.into(), file);
        }
        None => {
            let value = CompactString::from(String::from_utf8_lossy(content));
            fields.insert(name.into(), value);
        }
    }

    Ok(())
}

/// `name` and `filename` of a `form-data` disposition.
fn disposition_params(disposition: &str) -> (Option<&str>, Option<&str>) {
    let mut name = None;
    let mut file_name = None;

    for (key, value) in disposition
        .split(';')
        .skip(1)
        .filter_map(|c| c.split_once('='))
    {
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "name" => name = Some(value),
            "filename" => file_name = Some(value),
            _ => {}
        }
    }

    (name, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"--XyZ\r\n\
        Content-Disposition: form-data; name=\"title\"\r\n\
        \r\n\
        hello world\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n\
        Content-Type: image/png\r\n\
        \r\n\
        \x89PNG\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"empty\"; filename=\"\"\r\n\
        \r\n\
        \r\n\
        --XyZ--\r\n";

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(boundary("multipart/form-data; boundary=XyZ"), Some("XyZ"));
        assert_eq!(
            boundary("Multipart/Form-Data; charset=utf-8; boundary=\"a b\""),
            Some("a b")
        );
        assert_eq!(boundary("application/json; boundary=XyZ"), None);
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn fields_and_files() {
        let (fields, files) = parse_multipart(BODY, "XyZ").unwrap();

        assert_eq!(fields.get_str("title"), Some("hello world"));
        assert_eq!(files.len(), 1);

        let avatar = &files["avatar"];
        assert_eq!(avatar.client_name(), "me.png");
        assert_eq!(avatar.mime_type(), "image/png");
        assert_eq!(avatar.size(), 4);
        assert_eq!(std::fs::read(avatar.path()).unwrap(), b"\x89PNG");
    }

    #[test]
    fn boundary_inside_content_is_data() {
        let body = b"preamble\r\n--XyZ\r\n\
            Content-Disposition: form-data; name=\"t\"\r\n\
            \r\n\
            see --XyZ here\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"f\"; filename=\"f.bin\"\r\n\
            \r\n\
            a\n--XyZ\r\n\
            --XyZ--\r\n";
        let (fields, files) = parse_multipart(body, "XyZ").unwrap();

        assert_eq!(fields.get_str("t"), Some("see --XyZ here"));
        assert_eq!(std::fs::read(files["f"].path()).unwrap(), b"a\n--XyZ");
    }

    #[test]
    fn missing_boundary() {
        assert!(matches!(
            parse_multipart(b"no parts here", "XyZ"),
            Err(RequestError::Multipart(_))
        ));
    }

    #[test]
    fn unterminated_part() {
        let body = b"--XyZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue";
        assert!(matches!(
            parse_multipart(body, "XyZ"),
            Err(RequestError::Multipart("unterminated part"))
        ));
    }
}
