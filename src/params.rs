//! Flat `key=value;key=value` parameter strings exchanged with the framework.

/// Device routing bitmask, decimal.
pub const KEY_ROUTING: &str = "routing";
/// Bluetooth headset noise reduction, `on` or `off`.
pub const KEY_BT_NREC: &str = "bt_headset_nrec";
/// Value enabling a boolean parameter.
pub const VALUE_ON: &str = "on";

/// Parsed parameter string.
///
/// Parsing never fails: empty segments are skipped, a key without `=` gets an
/// empty value and a repeated key keeps its last value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrParms {
    pairs: Vec<(String, String)>,
}

impl StrParms {
    /// Parse `kvpairs`.
    pub fn parse(kvpairs: &str) -> Self {
        let pairs = kvpairs
            .split(';')
            .filter(|segment| !segment.is_empty())
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
                (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect();
        Self { pairs }
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `key` parsed as a decimal integer.
    ///
    /// Device masks travel both as unsigned and as sign-extended values, so
    /// the full `i64` range is accepted.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.trim().parse().ok()
    }

    /// Whether no pair was parsed.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
