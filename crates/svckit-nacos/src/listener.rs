// Long-poll listener protocol
//
// Request form field `Listening-Configs`:
//
//   dataId ^2 group ^2 md5 [^2 tenant] ^1
//
// where ^2 is U+0002 and ^1 is U+0001. The server holds the request for up
// to `Long-Pulling-Timeout` milliseconds and answers with the URL-encoded
// list of changed configs in the same shape (without the md5), or an empty
// body when nothing changed.

use md5::{Digest, Md5};
use percent_encoding::percent_decode_str;

/// Separates fields within one entry
const WORD_SEPARATOR: char = '\u{2}';

/// Terminates each entry
const LINE_SEPARATOR: char = '\u{1}';

/// Form field carrying the watched configs
pub const LISTENING_CONFIGS_FIELD: &str = "Listening-Configs";

/// Header carrying the hold time in milliseconds
pub const LONG_PULLING_TIMEOUT_HEADER: &str = "Long-Pulling-Timeout";

/// Lowercase hex MD5 of a config's content
pub fn content_md5(content: &str) -> String {
    format!("{:x}", Md5::digest(content.as_bytes()))
}

/// Encode one watched config for the `Listening-Configs` field
pub fn listening_configs(data_id: &str, group: &str, md5: &str, tenant: &str) -> String {
    if tenant.is_empty() {
        format!("{data_id}{WORD_SEPARATOR}{group}{WORD_SEPARATOR}{md5}{LINE_SEPARATOR}")
    } else {
        format!(
            "{data_id}{WORD_SEPARATOR}{group}{WORD_SEPARATOR}{md5}{WORD_SEPARATOR}{tenant}{LINE_SEPARATOR}"
        )
    }
}

/// A config the server reported as changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedConfig {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
}

/// Parse a listener response body
///
/// Malformed entries are skipped.
pub fn parse_changed_configs(body: &str) -> Vec<ChangedConfig> {
    let decoded = percent_decode_str(body.trim()).decode_utf8_lossy();

    decoded
        .split(LINE_SEPARATOR)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut fields = line.split(WORD_SEPARATOR);
            let data_id = fields.next()?;
            let group = fields.next()?;
            let tenant = fields.next().unwrap_or_default();
            Some(ChangedConfig {
                data_id: data_id.to_string(),
                group: group.to_string(),
                tenant: tenant.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_md5() {
        assert_eq!(content_md5(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(content_md5("{}"), "99914b932bd37a50b983c5e7c90ae93b");
    }

    #[test]
    fn test_listening_configs_without_tenant() {
        assert_eq!(
            listening_configs("app.json", "DEFAULT_GROUP", "abc", ""),
            "app.json\u{2}DEFAULT_GROUP\u{2}abc\u{1}"
        );
    }

    #[test]
    fn test_listening_configs_with_tenant() {
        assert_eq!(
            listening_configs("app.json", "DEFAULT_GROUP", "", "dev"),
            "app.json\u{2}DEFAULT_GROUP\u{2}\u{2}dev\u{1}"
        );
    }

    #[test]
    fn test_parse_changed_configs() {
        let changed = parse_changed_configs("app.json%02DEFAULT_GROUP%01db.json%02infra%02dev%01\n");
        assert_eq!(
            changed,
            vec![
                ChangedConfig {
                    data_id: "app.json".to_string(),
                    group: "DEFAULT_GROUP".to_string(),
                    tenant: String::new(),
                },
                ChangedConfig {
                    data_id: "db.json".to_string(),
                    group: "infra".to_string(),
                    tenant: "dev".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_empty_and_malformed() {
        assert!(parse_changed_configs("").is_empty());
        assert!(parse_changed_configs("only-data-id%01").is_empty());
    }
}
