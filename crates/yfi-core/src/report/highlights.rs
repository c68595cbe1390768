//! Highlight rules: the digest lines pulled out of the narrative.

use regex::Regex;
use yfi_config::{FormattingStrategy, HighlightRule};

use crate::collect::extract::find_all;

/// A highlight rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: HighlightRule,
    pub regex: Regex,
}

/// Compile rules in order, failing on the first invalid pattern.
pub fn compile_rules(rules: &[HighlightRule]) -> Result<Vec<CompiledRule>, regex::Error> {
    rules
        .iter()
        .map(|rule| {
            Ok(CompiledRule {
                regex: Regex::new(&rule.pattern)?,
                rule: rule.clone(),
            })
        })
        .collect()
}

impl CompiledRule {
    /// The text this rule contributes to the digest, if any.
    pub fn apply(&self, narrative: &str) -> Option<String> {
        let matches = find_all(&self.regex, narrative);
        let description = &self.rule.description;

        match &self.rule.strategy {
            FormattingStrategy::Suppressed => None,

            FormattingStrategy::Failures => {
                (!matches.is_empty()).then(|| format!("\n{}\n{}", description, matches.join("\n")))
            }

            FormattingStrategy::AddressList { missing_message } => {
                match (matches.is_empty(), missing_message) {
                    (true, Some(message)) => Some(message.clone()),
                    _ => Some(format!("{} {}", description, matches.join(" "))),
                }
            }

            FormattingStrategy::Regroup {
                width,
                max_groups,
                separator,
                failure_message,
            } => Some(match matches.first() {
                Some(first) => format!(
                    "{} {}",
                    description,
                    regroup(first, *width, *max_groups, separator)
                ),
                None => failure_message.clone(),
            }),

            FormattingStrategy::Count {
                failure_sentinel,
                failure_message,
                none_message,
            } => Some(if narrative.contains(failure_sentinel.as_str()) {
                failure_message.clone()
            } else if !matches.is_empty() {
                format!("{} {}", description, matches.len())
            } else {
                none_message.clone()
            }),

            FormattingStrategy::FreeText { leading_blank } => {
                let line = format!("{} {}", description, matches.join(" "));
                Some(if *leading_blank { format!("\n{}", line) } else { line })
            }
        }
    }
}

/// Split `value` into `max_groups` slots of `width` chars joined by
/// `separator`. Slots past the end of a short value stay empty.
pub fn regroup(value: &str, width: usize, max_groups: usize, separator: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    (0..max_groups)
        .map(|i| {
            let start = (i * width).min(chars.len());
            let end = (start + width).min(chars.len());
            chars[start..end].iter().collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// Every rule's non-empty output in rule order, each prefixed with `\n`.
pub fn highlight_lines(rules: &[CompiledRule], narrative: &str) -> Vec<String> {
    rules
        .iter()
        .filter_map(|rule| rule.apply(narrative))
        .filter(|piece| !piece.is_empty())
        .map(|piece| format!("\n{}", piece))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(pattern: &str, description: &str, strategy: FormattingStrategy) -> CompiledRule {
        compile_rules(&[HighlightRule {
            id: "r".to_string(),
            pattern: pattern.to_string(),
            description: description.to_string(),
            strategy,
        }])
        .unwrap()
        .remove(0)
    }

    const NARRATIVE: &str = "\n====Diagnostics====\n--- \nTask: ifconfig\
        \nCommand: ifconfig en0\na4:83:e7:12:34:56\ninet6 fe80::1\ninet6 2001:db8::5\
        \n\n====Tests====\n--- \nTest: google_com\
        \nCommand: ping -c 20 google.com\nOK\
        \nCommand: ping6 -c 20 google.com\nNot OK\
        \nCommand: curl -6Is http://google.com\nNot OK\
        \n\n====Tcpdump====\nFilter: icmp6\nNo RA messages captured";

    #[test]
    fn test_suppressed_never_emits() {
        let rule = compiled(r"Command: (.*)\nOK", "OK:", FormattingStrategy::Suppressed);
        assert_eq!(rule.apply(NARRATIVE), None);
    }

    #[test]
    fn test_failures_list_every_match() {
        let rule = compiled(r"Command: (.*)\nNot OK", "Not OK:", FormattingStrategy::Failures);
        assert_eq!(
            rule.apply(NARRATIVE).unwrap(),
            "\nNot OK:\nping6 -c 20 google.com\ncurl -6Is http://google.com"
        );
        let quiet = compiled(r"Command: (.*)\nError", "Error:", FormattingStrategy::Failures);
        assert_eq!(quiet.apply(NARRATIVE), None);
    }

    #[test]
    fn test_address_list_and_missing_warning() {
        let rule = compiled(
            r"inet6 (2\S+)",
            "IPv6 addresses:",
            FormattingStrategy::AddressList {
                missing_message: Some("! No valid IPv6 address".into()),
            },
        );
        assert_eq!(rule.apply(NARRATIVE).unwrap(), "IPv6 addresses: 2001:db8::5");
        assert_eq!(rule.apply("nothing here").unwrap(), "! No valid IPv6 address");

        let bare = compiled(
            r"inet (\S+)",
            "IPv4 addresses:",
            FormattingStrategy::AddressList {
                missing_message: None,
            },
        );
        assert_eq!(bare.apply(NARRATIVE).unwrap(), "IPv4 addresses: ");
    }

    #[test]
    fn test_regroup_bssid() {
        assert_eq!(regroup("a483e7123456", 2, 6, ":"), "a4:83:e7:12:34:56");
        assert_eq!(regroup("a483", 2, 6, ":"), "a4:83::::");

        let rule = compiled(
            r"bssid=(\w{12})",
            "BSSID:",
            FormattingStrategy::Regroup {
                width: 2,
                max_groups: 6,
                separator: ":".into(),
                failure_message: "! Failed parsing BSSID from logs".into(),
            },
        );
        assert_eq!(
            rule.apply("bssid=a483e7123456 bssid=000000000000").unwrap(),
            "BSSID: a4:83:e7:12:34:56"
        );
        assert_eq!(rule.apply(NARRATIVE).unwrap(), "! Failed parsing BSSID from logs");
    }

    #[test]
    fn test_count_prefers_failure_sentinel() {
        let strategy = FormattingStrategy::Count {
            failure_sentinel: "Tcpdump error".into(),
            failure_message: "! Tcpdump error - check logs".into(),
            none_message: "! No RA messages captured".into(),
        };
        let rule = compiled(r"router advertisement", "RA messages received:", strategy);

        assert_eq!(rule.apply(NARRATIVE).unwrap(), "! No RA messages captured");
        assert_eq!(
            rule.apply("router advertisement\nrouter advertisement").unwrap(),
            "RA messages received: 2"
        );
        assert_eq!(
            rule.apply("router advertisement\nTcpdump error").unwrap(),
            "! Tcpdump error - check logs"
        );
    }

    #[test]
    fn test_free_text_leading_blank() {
        let rule = compiled(
            r"Test: (\S+)",
            "Tested:",
            FormattingStrategy::FreeText { leading_blank: true },
        );
        assert_eq!(rule.apply(NARRATIVE).unwrap(), "\nTested: google_com");
    }

    #[test]
    fn test_highlight_lines_keep_rule_order() {
        let rules = compile_rules(&[
            HighlightRule {
                id: "ssid".into(),
                pattern: r"Test: (\S+)".into(),
                description: "Test:".into(),
                strategy: FormattingStrategy::FreeText { leading_blank: false },
            },
            HighlightRule {
                id: "ok".into(),
                pattern: r"Command: (.*)\nOK".into(),
                description: "OK:".into(),
                strategy: FormattingStrategy::Suppressed,
            },
            HighlightRule {
                id: "mac".into(),
                pattern: r"([0-9a-f]{2}(?::[0-9a-f]{2}){5})".into(),
                description: "MAC:".into(),
                strategy: FormattingStrategy::FreeText { leading_blank: false },
            },
        ])
        .unwrap();

        assert_eq!(
            highlight_lines(&rules, NARRATIVE),
            vec!["\nTest: google_com", "\nMAC: a4:83:e7:12:34:56"]
        );
    }

    #[test]
    fn test_invalid_rule_fails_compile() {
        let rules = [HighlightRule {
            id: "bad".into(),
            pattern: "(".into(),
            description: String::new(),
            strategy: FormattingStrategy::Suppressed,
        }];
        assert!(compile_rules(&rules).is_err());
    }
}
