//! POST body readers.

use bytes::Bytes;

use crate::media::mime::DataKind;

/// A decoded request body handed to the application message hook.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyReader {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    /// Unstructured content, delivered as (lossy) UTF-8 text.
    Raw(String),
}

impl BodyReader {
    /// Build a structured reader for `subtype`, or `None` when no structured
    /// reader applies (unknown sub-type, or content that does not parse).
    pub fn structured(subtype: &str, content: &Bytes) -> Option<Self> {
        match DataKind::from_subtype(subtype)? {
            DataKind::Json => match serde_json::from_slice(content) {
                Ok(value) => Some(BodyReader::Json(value)),
                Err(e) => {
                    tracing::debug!(error = %e, "JSON body does not parse, reading raw");
                    None
                }
            },
            DataKind::Form => Some(BodyReader::Form(
                url::form_urlencoded::parse(content)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect(),
            )),
        }
    }

    pub fn raw(content: &Bytes) -> Self {
        BodyReader::Raw(String::from_utf8_lossy(content).into_owned())
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, BodyReader::Raw(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body() {
        let reader = BodyReader::structured("json", &Bytes::from_static(b"{\"a\":1}")).unwrap();
        assert_eq!(reader, BodyReader::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_form_body() {
        let reader =
            BodyReader::structured("x-www-form-urlencoded", &Bytes::from_static(b"a=1&b=x+y"))
                .unwrap();
        assert_eq!(
            reader,
            BodyReader::Form(vec![("a".into(), "1".into()), ("b".into(), "x y".into())])
        );
    }

    #[test]
    fn test_unstructured_falls_back() {
        assert!(BodyReader::structured("plain", &Bytes::from_static(b"hi")).is_none());
        assert!(BodyReader::structured("json", &Bytes::from_static(b"{oops")).is_none());
        assert!(BodyReader::raw(&Bytes::from_static(b"hi")).is_raw());
    }
}
