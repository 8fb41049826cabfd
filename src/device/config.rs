//! Per-device rule files
//!
//! One rule per line:
//!
//! ```text
//! ACTION TYPE CODE VALUE
//! ```
//!
//! `ACTION` is taken verbatim. `TYPE`, `CODE` and `VALUE` are integer
//! literals or names from `<linux/input-event-codes.h>`:
//!
//! ```text
//! nextPage EV_KEY KEY_PAGEDOWN 1
//! prevPage 1      0x68         1
//! ```
//!
//! A single bad line rejects the whole file. Blank lines are skipped.

use super::error::{DeviceError, Result, RuleField};
use super::InputEvent;
use crate::event_codes;

/// One event-to-action mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Event type to match
    pub event_type: u16,
    /// Event code to match
    pub code: u16,
    /// Event value to match
    pub value: i32,
    /// Action invoked on the host when the event matches
    pub action: String,
}

impl Rule {
    /// Exact match on type, code and value
    pub fn matches(&self, event: &InputEvent) -> bool {
        self.event_type == event.event_type && self.code == event.code && self.value == event.value
    }
}

/// Ordered rules of one device, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    rules: Vec<Rule>,
}

impl DeviceConfig {
    /// Parse a rule file
    pub fn parse(text: &str) -> Result<Self> {
        let mut rules = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let fields: Vec<&str> = line
                .split(|c: char| c == ' ' || c == '\t')
                .filter(|f| !f.is_empty())
                .collect();

            if fields.is_empty() {
                continue;
            }

            let &[action, event_type, code, value] = fields.as_slice() else {
                return Err(DeviceError::FieldCount {
                    line: line_no,
                    found: fields.len(),
                    text: line.to_string(),
                });
            };

            rules.push(Rule {
                event_type: resolve_u16(line_no, RuleField::Type, event_type)?,
                code: resolve_u16(line_no, RuleField::Code, code)?,
                value: resolve(line_no, RuleField::Value, value)?,
                action: action.to_string(),
            });
        }

        Ok(Self { rules })
    }

    /// Rules in file order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if the file had no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule matching `event`, in file order
    pub fn matching<'a>(&'a self, event: &'a InputEvent) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |rule| rule.matches(event))
    }
}

fn resolve(line: usize, field: RuleField, token: &str) -> Result<i32> {
    event_codes::resolve(token).ok_or_else(|| DeviceError::InvalidToken {
        line,
        field,
        token: token.to_string(),
    })
}

/// Type and code are stored in the 16-bit fields of an input event; wider
/// values wrap rather than rejecting the file.
fn resolve_u16(line: usize, field: RuleField, token: &str) -> Result<u16> {
    resolve(line, field, token).map(|value| value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ErrorKind;

    #[test]
    fn test_parse_symbolic_and_numeric() {
        let config = DeviceConfig::parse(
            "nextPage EV_KEY KEY_PAGEDOWN 1\nprevPage 1 0x68 1\nmenu 01 036 -1\n",
        )
        .unwrap();

        assert_eq!(
            config.rules(),
            &[
                Rule {
                    event_type: 1,
                    code: 109,
                    value: 1,
                    action: "nextPage".to_string()
                },
                Rule {
                    event_type: 1,
                    code: 104,
                    value: 1,
                    action: "prevPage".to_string()
                },
                Rule {
                    event_type: 1,
                    code: 30,
                    value: -1,
                    action: "menu".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_blank_lines_and_repeated_spaces() {
        let config = DeviceConfig::parse("\n\nnext  1   30 1\n   \n\tprev\t1 48 1\n").unwrap();
        assert_eq!(config.len(), 2);
        assert_eq!(config.rules()[1].action, "prev");
    }

    #[test]
    fn test_empty_file_has_no_rules() {
        assert!(DeviceConfig::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_wrong_field_count_rejects_file() {
        let err = DeviceConfig::parse("next 1 30 1\nprev 1 48\n").unwrap_err();
        assert!(matches!(err, DeviceError::FieldCount { line: 2, found: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::ConfigMalformed);

        assert!(DeviceConfig::parse("next 1 30 1 extra\n").is_err());
    }

    #[test]
    fn test_unresolvable_tokens() {
        let err = DeviceConfig::parse("next EV_NOPE 30 1").unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidToken {
                field: RuleField::Type,
                ..
            }
        ));

        let err = DeviceConfig::parse("next 1 KEY_NOPE 1").unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidToken {
                field: RuleField::Code,
                ..
            }
        ));

        let err = DeviceConfig::parse("next 1 30 pressed").unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidToken {
                field: RuleField::Value,
                ..
            }
        ));
    }

    #[test]
    fn test_wide_type_and_code_wrap() {
        let config = DeviceConfig::parse("nextPage 1 30 1\nodd 1 70000 1\nneg -1 30 1\n").unwrap();
        assert_eq!(config.len(), 3);
        assert_eq!(config.rules()[0].code, 30);
        assert_eq!(config.rules()[1].code, 70000u32 as u16);
        assert_eq!(config.rules()[2].event_type, u16::MAX);

        let event = InputEvent::new(1, 30, 1);
        let actions: Vec<&str> = config.matching(&event).map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["nextPage"]);
    }

    #[test]
    fn test_all_matching_rules_in_order() {
        let config = DeviceConfig::parse("next 1 2 3\nother 1 2 4\nprev 1 2 3\n").unwrap();
        let event = InputEvent::new(1, 2, 3);
        let actions: Vec<&str> = config.matching(&event).map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["next", "prev"]);

        let miss = InputEvent::new(1, 2, 5);
        assert_eq!(config.matching(&miss).count(), 0);
    }
}
